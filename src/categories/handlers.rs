use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{error::AppError, state::AppState};

use super::repo::Category;

pub fn routes() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories))
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = Category::list(&state.db).await?;
    Ok(Json(categories))
}

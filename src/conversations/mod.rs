use axum::Router;

use crate::state::AppState;

mod dto;
pub mod handlers;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::start_routes())
        .merge(handlers::inbox_routes())
}

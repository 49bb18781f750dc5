use axum::Router;

use crate::state::AppState;

mod dto;
pub mod claims;
pub(crate) mod extractors;
pub mod handlers;
pub mod password;
pub mod repo;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}

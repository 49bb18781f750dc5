use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use uuid::Uuid;

use crate::state::AppState;
use crate::{auth, categories, conversations, items, pages};

pub const API_PREFIX: &str = "/api/v1";

/// Targets for `Location` headers and redirects. Kept next to the router
/// so they stay in step with the nesting prefix.
pub fn item_path(id: Uuid) -> String {
    format!("{API_PREFIX}/items/{id}")
}

pub fn inbox_path(id: Uuid) -> String {
    format!("{API_PREFIX}/inbox/{id}")
}

pub fn dashboard_path() -> String {
    format!("{API_PREFIX}/dashboard")
}

pub fn build_app(state: AppState) -> Router {
    let media_root = state.config.media_root.clone();
    Router::new()
        .nest(
            API_PREFIX,
            Router::new()
                .merge(auth::router())
                .merge(categories::router())
                .merge(items::router())
                .merge(conversations::router())
                .merge(pages::router())
                .route("/health", get(|| async { "ok" })),
        )
        .nest_service("/media", ServeDir::new(media_root))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_targets_live_under_the_api_prefix() {
        let id = Uuid::new_v4();
        assert_eq!(item_path(id), format!("/api/v1/items/{id}"));
        assert_eq!(inbox_path(id), format!("/api/v1/inbox/{id}"));
        assert_eq!(dashboard_path(), "/api/v1/dashboard");
    }
}

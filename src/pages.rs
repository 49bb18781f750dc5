use axum::{extract::Path, routing::get, Json, Router};
use serde::Serialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Serialize)]
pub struct Page {
    pub slug: &'static str,
    pub title: &'static str,
    pub body: &'static str,
}

const PAGES: &[Page] = &[
    Page {
        slug: "contact",
        title: "Contact",
        body: "Questions about the marketplace? Reach the team at support@bazar.example.",
    },
    Page {
        slug: "about",
        title: "About",
        body: "Bazar is a small community marketplace for second-hand items.",
    },
    Page {
        slug: "privacy",
        title: "Privacy policy",
        body: "We store only the account and listing data you give us, and never share it.",
    },
    Page {
        slug: "terms",
        title: "Terms of service",
        body: "List only items you own, describe them honestly, and be civil in conversations.",
    },
];

pub fn router() -> Router<AppState> {
    Router::new().route("/pages/:slug", get(page))
}

pub async fn page(Path(slug): Path<String>) -> Result<Json<&'static Page>, AppError> {
    PAGES
        .iter()
        .find(|p| p.slug == slug)
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_static_page_resolves() {
        for slug in ["contact", "about", "privacy", "terms"] {
            let page = page(Path(slug.to_string())).await.expect(slug);
            assert_eq!(page.0.slug, slug);
        }
    }

    #[tokio::test]
    async fn unknown_page_is_not_found() {
        let err = page(Path("careers".to_string())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

impl Category {
    /// All categories, name ascending.
    pub async fn list(db: &PgPool) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name
            FROM categories
            ORDER BY name ASC
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await?;
        Ok(row.is_some())
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: Uuid,
    pub category_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub is_sold: bool,
    pub created_at: OffsetDateTime,
}

/// Item joined with its owner's username, for the detail view.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ItemWithOwner {
    pub id: Uuid,
    pub category_id: Uuid,
    pub owner_id: Uuid,
    pub owner_username: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub image: Option<String>,
    pub is_sold: bool,
    pub created_at: OffsetDateTime,
}

const ITEM_COLUMNS: &str =
    "id, category_id, owner_id, name, description, price, image, is_sold, created_at";

impl Item {
    /// Unsold items, name ascending, capped at `limit`.
    pub async fn list_available(db: &PgPool, limit: i64) -> anyhow::Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE is_sold = FALSE
            ORDER BY name ASC
            LIMIT $1
            "#,
        ))
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE id = $1
            "#,
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn get_with_owner(db: &PgPool, id: Uuid) -> anyhow::Result<Option<ItemWithOwner>> {
        let row = sqlx::query_as::<_, ItemWithOwner>(
            r#"
            SELECT i.id, i.category_id, i.owner_id, u.username AS owner_username,
                   i.name, i.description, i.price, i.image, i.is_sold, i.created_at
            FROM items i
            JOIN users u ON u.id = i.owner_id
            WHERE i.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Lookup scoped to the owner; missing and not-owned are the same None.
    pub async fn get_owned(db: &PgPool, id: Uuid, owner_id: Uuid) -> anyhow::Result<Option<Item>> {
        let row = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE id = $1 AND owner_id = $2
            "#,
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Unsold items in the same category, excluding the item itself.
    pub async fn list_related(
        db: &PgPool,
        category_id: Uuid,
        exclude_id: Uuid,
        limit: i64,
    ) -> anyhow::Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE category_id = $1 AND is_sold = FALSE AND id <> $2
            ORDER BY name ASC
            LIMIT $3
            "#,
        ))
        .bind(category_id)
        .bind(exclude_id)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_by_owner(db: &PgPool, owner_id: Uuid) -> anyhow::Result<Vec<Item>> {
        let rows = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE owner_id = $1
            ORDER BY name ASC
            "#,
        ))
        .bind(owner_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Unsold items, optionally narrowed to a category, optionally matched
    /// case-insensitively against name or description.
    pub async fn search(
        db: &PgPool,
        query: Option<&str>,
        category_id: Option<Uuid>,
    ) -> anyhow::Result<Vec<Item>> {
        let mut qb = search_query(query, category_id);
        let rows = qb.build_query_as::<Item>().fetch_all(db).await?;
        Ok(rows)
    }

    pub async fn create(
        db: &PgPool,
        owner_id: Uuid,
        category_id: Uuid,
        name: &str,
        description: Option<&str>,
        price: Decimal,
    ) -> anyhow::Result<Item> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (category_id, owner_id, name, description, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(category_id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .bind(price)
        .fetch_one(db)
        .await?;
        Ok(item)
    }

    /// Owner-scoped update; `created_at` and `owner_id` are never touched.
    pub async fn update(
        db: &PgPool,
        id: Uuid,
        owner_id: Uuid,
        name: &str,
        description: Option<&str>,
        price: Decimal,
        is_sold: bool,
    ) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
            SET name = $3, description = $4, price = $5, is_sold = $6
            WHERE id = $1 AND owner_id = $2
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(is_sold)
        .fetch_optional(db)
        .await?;
        Ok(item)
    }

    pub async fn set_image(
        db: &PgPool,
        id: Uuid,
        owner_id: Uuid,
        image: &str,
    ) -> anyhow::Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            UPDATE items
            SET image = $3
            WHERE id = $1 AND owner_id = $2
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(id)
        .bind(owner_id)
        .bind(image)
        .fetch_optional(db)
        .await?;
        Ok(item)
    }

    /// Owner-scoped delete. Conversations and their messages go with it
    /// via the schema cascades. Returns the removed image key, if any,
    /// so the caller can clean up the media store.
    pub async fn delete(
        db: &PgPool,
        id: Uuid,
        owner_id: Uuid,
    ) -> anyhow::Result<Option<Option<String>>> {
        let deleted: Option<(Option<String>,)> = sqlx::query_as(
            r#"
            DELETE FROM items
            WHERE id = $1 AND owner_id = $2
            RETURNING image
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
        Ok(deleted.map(|(image,)| image))
    }
}

fn search_query(
    query: Option<&str>,
    category_id: Option<Uuid>,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!(
        "SELECT {ITEM_COLUMNS} FROM items WHERE is_sold = FALSE"
    ));
    if let Some(category_id) = category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(query) = query.filter(|q| !q.trim().is_empty()) {
        let pattern = format!("%{}%", query.trim());
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb.push(" ORDER BY name ASC");
    qb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_sql_without_filters_only_excludes_sold() {
        let sql = search_query(None, None).into_sql();
        assert!(sql.contains("is_sold = FALSE"));
        assert!(!sql.contains("category_id"));
        assert!(!sql.contains("ILIKE"));
        assert!(sql.ends_with("ORDER BY name ASC"));
    }

    #[test]
    fn search_sql_with_category_narrows_by_category() {
        let sql = search_query(None, Some(Uuid::new_v4())).into_sql();
        assert!(sql.contains("category_id = $1"));
    }

    #[test]
    fn search_sql_matches_name_and_description() {
        let sql = search_query(Some("chair"), None).into_sql();
        assert!(sql.contains("name ILIKE $1"));
        assert!(sql.contains("description ILIKE $2"));
    }

    #[test]
    fn search_sql_ignores_blank_query() {
        let sql = search_query(Some("   "), Some(Uuid::new_v4())).into_sql();
        assert!(!sql.contains("ILIKE"));
        assert!(sql.contains("category_id = $1"));
    }
}

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// A two-party thread about one item. The members are the buyer and the
/// item's owner, reached through `items.owner_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub item_id: Uuid,
    pub buyer_id: Uuid,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
}

/// Conversation joined with item and membership context.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ConversationThread {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub buyer_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
}

/// One row of the inbox listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct InboxEntry {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub counterpart: String,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_username: String,
    pub content: String,
    pub created_at: OffsetDateTime,
}

const CONVERSATION_COLUMNS: &str = "id, item_id, buyer_id, created_at, modified_at";

impl Conversation {
    pub async fn find_for_buyer(
        db: &PgPool,
        item_id: Uuid,
        buyer_id: Uuid,
    ) -> anyhow::Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS}
            FROM conversations
            WHERE item_id = $1 AND buyer_id = $2
            "#,
        ))
        .bind(item_id)
        .bind(buyer_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Membership-scoped lookup; non-members see the same None as an
    /// unknown id.
    pub async fn get_for_member(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<ConversationThread>> {
        let row = sqlx::query_as::<_, ConversationThread>(
            r#"
            SELECT c.id, c.item_id, i.name AS item_name, c.buyer_id, i.owner_id,
                   c.created_at, c.modified_at
            FROM conversations c
            JOIN items i ON i.id = c.item_id
            WHERE c.id = $1 AND (c.buyer_id = $2 OR i.owner_id = $2)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Conversations the user takes part in, newest activity first.
    pub async fn list_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<InboxEntry>> {
        let rows = sqlx::query_as::<_, InboxEntry>(
            r#"
            SELECT c.id, c.item_id, i.name AS item_name,
                   CASE WHEN c.buyer_id = $1 THEN owner_u.username
                        ELSE buyer_u.username END AS counterpart,
                   c.created_at, c.modified_at
            FROM conversations c
            JOIN items i ON i.id = c.item_id
            JOIN users buyer_u ON buyer_u.id = c.buyer_id
            JOIN users owner_u ON owner_u.id = i.owner_id
            WHERE c.buyer_id = $1 OR i.owner_id = $1
            ORDER BY c.modified_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Creates the conversation together with its first message in one
    /// transaction, so a failed message insert never leaves an empty
    /// conversation behind. Returns None when a concurrent request for
    /// the same (item, buyer) pair got there first.
    pub async fn create_with_first_message(
        db: &PgPool,
        item_id: Uuid,
        buyer_id: Uuid,
        content: &str,
    ) -> anyhow::Result<Option<Conversation>> {
        let mut tx = db.begin().await?;

        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            r#"
            INSERT INTO conversations (item_id, buyer_id)
            VALUES ($1, $2)
            ON CONFLICT (item_id, buyer_id) DO NOTHING
            RETURNING {CONVERSATION_COLUMNS}
            "#,
        ))
        .bind(item_id)
        .bind(buyer_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(conversation) = conversation else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO conversation_messages (conversation_id, sender_id, content)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(conversation.id)
        .bind(buyer_id)
        .bind(content)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(conversation))
    }
}

impl Message {
    pub async fn list(db: &PgPool, conversation_id: Uuid) -> anyhow::Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT m.id, m.conversation_id, m.sender_id, u.username AS sender_username,
                   m.content, m.created_at
            FROM conversation_messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.conversation_id = $1
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Appends a message and bumps the conversation's `modified_at` in the
    /// same transaction.
    pub async fn append(
        db: &PgPool,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> anyhow::Result<Message> {
        let mut tx = db.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            r#"
            WITH inserted AS (
                INSERT INTO conversation_messages (conversation_id, sender_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, conversation_id, sender_id, content, created_at
            )
            SELECT inserted.id, inserted.conversation_id, inserted.sender_id,
                   u.username AS sender_username, inserted.content, inserted.created_at
            FROM inserted
            JOIN users u ON u.id = inserted.sender_id
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET modified_at = now() WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }
}

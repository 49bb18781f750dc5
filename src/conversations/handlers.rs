use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    items::repo::Item,
    state::AppState,
};

use super::dto::{ComposeState, ConversationDetail, SendMessageRequest};
use super::repo::{Conversation, Message};

pub fn start_routes() -> Router<AppState> {
    Router::new().route(
        "/conversations/:item_id",
        get(start_conversation_state).post(start_conversation),
    )
}

pub fn inbox_routes() -> Router<AppState> {
    Router::new()
        .route("/inbox", get(inbox))
        .route("/inbox/:id", get(get_conversation).post(send_message))
}

/// Outcome of the start-conversation state machine, before any write.
#[derive(Debug, PartialEq, Eq)]
enum StartDecision {
    /// Owners cannot message themselves.
    RedirectDashboard,
    /// A thread already exists for this (item, requester) pair.
    RedirectConversation(Uuid),
    /// No thread yet; the requester may compose the first message.
    Compose,
}

fn start_decision(owner_id: Uuid, requester: Uuid, existing: Option<Uuid>) -> StartDecision {
    if owner_id == requester {
        return StartDecision::RedirectDashboard;
    }
    match existing {
        Some(id) => StartDecision::RedirectConversation(id),
        None => StartDecision::Compose,
    }
}

fn validate_content(content: &str) -> Result<&str, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::validation("content", "Message content is required"));
    }
    Ok(content)
}

async fn decide(
    state: &AppState,
    item_id: Uuid,
    requester: Uuid,
) -> Result<(Item, StartDecision), AppError> {
    let item = Item::get(&state.db, item_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let existing = Conversation::find_for_buyer(&state.db, item_id, requester)
        .await?
        .map(|c| c.id);
    let decision = start_decision(item.owner_id, requester, existing);
    Ok((item, decision))
}

#[instrument(skip(state))]
pub async fn start_conversation_state(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let (item, decision) = decide(&state, item_id, user_id).await?;
    match decision {
        StartDecision::RedirectDashboard => Ok(Redirect::to(&crate::app::dashboard_path()).into_response()),
        StartDecision::RedirectConversation(id) => {
            Ok(Redirect::to(&crate::app::inbox_path(id)).into_response())
        }
        StartDecision::Compose => {
            let owner = crate::auth::repo::User::find_by_id(&state.db, item.owner_id)
                .await?
                .ok_or(AppError::NotFound)?;
            Ok(Json(ComposeState {
                item_id: item.id,
                item_name: item.name,
                owner_username: owner.username,
            })
            .into_response())
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn start_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Response, AppError> {
    let (item, decision) = decide(&state, item_id, user_id).await?;
    match decision {
        StartDecision::RedirectDashboard => Ok(Redirect::to(&crate::app::dashboard_path()).into_response()),
        StartDecision::RedirectConversation(id) => {
            Ok(Redirect::to(&crate::app::inbox_path(id)).into_response())
        }
        StartDecision::Compose => {
            let content = validate_content(&payload.content)?;
            let created =
                Conversation::create_with_first_message(&state.db, item.id, user_id, content)
                    .await?;
            let Some(conversation) = created else {
                // Lost a concurrent race for the same pair; resume the
                // winner's thread.
                let existing = Conversation::find_for_buyer(&state.db, item.id, user_id)
                    .await?
                    .ok_or(AppError::NotFound)?;
                return Ok(Redirect::to(&crate::app::inbox_path(existing.id)).into_response());
            };

            info!(
                conversation_id = %conversation.id,
                item_id = %item.id,
                buyer_id = %user_id,
                "conversation started"
            );

            let mut headers = HeaderMap::new();
            headers.insert(
                axum::http::header::LOCATION,
                crate::app::item_path(item.id)
                    .parse()
                    .map_err(anyhow::Error::from)?,
            );
            Ok((StatusCode::CREATED, headers, Json(conversation)).into_response())
        }
    }
}

#[instrument(skip(state))]
pub async fn inbox(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<super::repo::InboxEntry>>, AppError> {
    let conversations = Conversation::list_for_user(&state.db, user_id).await?;
    Ok(Json(conversations))
}

#[instrument(skip(state))]
pub async fn get_conversation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationDetail>, AppError> {
    let conversation = Conversation::get_for_member(&state.db, id, user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    let messages = Message::list(&state.db, id).await?;
    Ok(Json(ConversationDetail {
        conversation,
        messages,
    }))
}

#[instrument(skip(state, payload))]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let content = validate_content(&payload.content)?;
    let conversation = Conversation::get_for_member(&state.db, id, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let message = Message::append(&state.db, conversation.id, user_id, content).await?;
    info!(conversation_id = %id, sender_id = %user_id, "message sent");
    Ok((StatusCode::CREATED, Json(message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_sent_to_dashboard_even_with_existing_thread() {
        let owner = Uuid::new_v4();
        assert_eq!(
            start_decision(owner, owner, None),
            StartDecision::RedirectDashboard
        );
        assert_eq!(
            start_decision(owner, owner, Some(Uuid::new_v4())),
            StartDecision::RedirectDashboard
        );
    }

    #[test]
    fn existing_thread_is_resumed_not_duplicated() {
        let conversation = Uuid::new_v4();
        assert_eq!(
            start_decision(Uuid::new_v4(), Uuid::new_v4(), Some(conversation)),
            StartDecision::RedirectConversation(conversation)
        );
    }

    #[test]
    fn first_contact_offers_the_composer() {
        assert_eq!(
            start_decision(Uuid::new_v4(), Uuid::new_v4(), None),
            StartDecision::Compose
        );
    }

    #[test]
    fn message_content_must_not_be_blank() {
        assert!(validate_content("  \n ").is_err());
        assert_eq!(validate_content(" Is this available? ").unwrap(), "Is this available?");
    }
}

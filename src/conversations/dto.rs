use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo::{ConversationThread, Message};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// State of the start-conversation route for a non-owner without an
/// existing thread: enough to render a composer client-side.
#[derive(Debug, Serialize)]
pub struct ComposeState {
    pub item_id: Uuid,
    pub item_name: String,
    pub owner_username: String,
}

#[derive(Debug, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: ConversationThread,
    pub messages: Vec<Message>,
}

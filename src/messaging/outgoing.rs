use crate::client::RealtimeClient;
use crate::types::Result;
use crate::types::constants::client_events;
use serde::Serialize;

/// Kind of content carried by an outgoing chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    File,
}

/// Payload of `send-message`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub session_id: u64,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendee_id: Option<u64>,
    pub sender_id: u64,
}

impl OutgoingMessage {
    pub fn text(session_id: u64, sender_id: u64, content: impl Into<String>) -> Self {
        Self {
            session_id,
            content: content.into(),
            kind: MessageKind::Text,
            attendee_id: None,
            sender_id,
        }
    }

    pub fn to_attendee(mut self, attendee_id: u64) -> Self {
        self.attendee_id = Some(attendee_id);
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConversationRef {
    session_id: u64,
    user_id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TypingState {
    session_id: u64,
    user_id: u64,
    is_typing: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadMark {
    message_id: u64,
    user_id: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    session_id: u64,
    user_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<u32>,
}

/// Session chat helpers. Each one emits a single application event and fails
/// with [`RealtimeError::NotConnected`](crate::RealtimeError::NotConnected)
/// while the client is not connected.
impl RealtimeClient {
    pub async fn join_conversation(&self, session_id: u64, user_id: u64) -> Result<()> {
        self.emit_json(
            client_events::JOIN_CONVERSATION,
            &ConversationRef {
                session_id,
                user_id,
            },
        )
        .await
    }

    pub async fn leave_conversation(&self, session_id: u64, user_id: u64) -> Result<()> {
        self.emit_json(
            client_events::LEAVE_CONVERSATION,
            &ConversationRef {
                session_id,
                user_id,
            },
        )
        .await
    }

    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<()> {
        self.emit_json(client_events::SEND_MESSAGE, message).await
    }

    pub async fn set_typing(&self, session_id: u64, user_id: u64, is_typing: bool) -> Result<()> {
        self.emit_json(
            client_events::TYPING,
            &TypingState {
                session_id,
                user_id,
                is_typing,
            },
        )
        .await
    }

    pub async fn stop_typing(&self, session_id: u64, user_id: u64) -> Result<()> {
        self.emit_json(
            client_events::STOP_TYPING,
            &ConversationRef {
                session_id,
                user_id,
            },
        )
        .await
    }

    pub async fn mark_message_read(&self, message_id: u64, user_id: u64) -> Result<()> {
        self.emit_json(
            client_events::MARK_MESSAGE_READ,
            &ReadMark {
                message_id,
                user_id,
            },
        )
        .await
    }

    /// Ask the backend to push a page of conversation history
    pub async fn request_conversation_history(
        &self,
        session_id: u64,
        user_id: u64,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<()> {
        self.emit_json(
            client_events::GET_CONVERSATION_HISTORY,
            &HistoryQuery {
                session_id,
                user_id,
                limit,
                offset,
            },
        )
        .await
    }

    async fn emit_json<T: Serialize>(&self, event: &str, payload: &T) -> Result<()> {
        let data = serde_json::to_value(payload)?;
        self.emit(event, data).await
    }
}

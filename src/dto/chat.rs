//! REST payloads for the chat thread endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::chat::{
        AnswerKind, ChatMessage, ChatThread, MessageKind, QuestionRef, Reaction, ThreadStatus,
    },
};

/// Payload recording an answer to a shared question, creating the thread on
/// first use.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    /// The answering partner.
    pub user_id: Uuid,
    /// The other half of the couple.
    pub partner_id: Uuid,
    /// Topic the question came from.
    pub source_topic: String,
    /// Which question this thread is anchored to.
    pub question_ref: QuestionRef,
    /// Display text of the question.
    pub question_text: String,
    /// The answer content.
    #[validate(length(min = 1, max = 2000, message = "answer must be 1-2000 characters"))]
    pub answer: String,
    /// Media type of the answer.
    #[serde(default = "default_answer_kind")]
    pub answer_kind: AnswerKind,
}

/// Payload appending a message to an existing thread.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PostMessageRequest {
    /// The sending partner.
    pub user_id: Uuid,
    /// Message body.
    #[validate(length(max = 2000, message = "message must be at most 2000 characters"))]
    pub content: String,
    /// Message kind.
    #[serde(default = "default_message_kind")]
    pub kind: MessageKind,
}

fn default_message_kind() -> MessageKind {
    MessageKind::Text
}

fn default_answer_kind() -> AnswerKind {
    AnswerKind::Text
}

/// Payload identifying the reader.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    /// The partner marking the thread read.
    pub user_id: Uuid,
}

/// Payload toggling an emoji reaction on one message.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReactionRequest {
    /// The reacting partner.
    pub user_id: Uuid,
    /// Target message.
    pub message_id: Uuid,
    /// Emoji to toggle.
    #[validate(length(min = 1, message = "emoji must not be empty"))]
    pub emoji: String,
}

/// One reaction on a message.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReactionSummary {
    pub user_id: Uuid,
    pub emoji: String,
    pub created_at: String,
}

impl From<&Reaction> for ReactionSummary {
    fn from(reaction: &Reaction) -> Self {
        Self {
            user_id: reaction.user_id,
            emoji: reaction.emoji.clone(),
            created_at: format_system_time(reaction.created_at),
        }
    }
}

/// One message of a thread.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatMessageSummary {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub answer_kind: Option<AnswerKind>,
    pub is_read: bool,
    pub read_at: Option<String>,
    pub reactions: Vec<ReactionSummary>,
    pub created_at: String,
}

impl From<&ChatMessage> for ChatMessageSummary {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            kind: message.kind,
            answer_kind: message.answer_kind,
            is_read: message.is_read,
            read_at: message.read_at.map(format_system_time),
            reactions: message.reactions.iter().map(Into::into).collect(),
            created_at: format_system_time(message.created_at),
        }
    }
}

/// Full projection of a thread, annotated with the caller's unread count.
#[derive(Debug, Serialize, ToSchema)]
pub struct ChatThreadSummary {
    pub id: Uuid,
    pub partner1: Uuid,
    pub partner2: Uuid,
    pub source_topic: String,
    pub question_ref: QuestionRef,
    pub question_text: String,
    pub status: ThreadStatus,
    pub messages: Vec<ChatMessageSummary>,
    pub last_message_at: String,
    pub last_message_preview: String,
    pub message_count: usize,
    /// Unread messages for the requesting partner.
    pub unread_count: usize,
    pub created_at: String,
}

impl ChatThreadSummary {
    /// Build the projection for `viewer`.
    pub fn for_viewer(thread: &ChatThread, viewer: Uuid) -> Self {
        Self {
            id: thread.id,
            partner1: thread.partner1,
            partner2: thread.partner2,
            source_topic: thread.source_topic.clone(),
            question_ref: thread.question_ref.clone(),
            question_text: thread.question_text.clone(),
            status: thread.status,
            messages: thread.messages.iter().map(Into::into).collect(),
            last_message_at: format_system_time(thread.last_message_at),
            last_message_preview: thread.last_message_preview.clone(),
            message_count: thread.message_count,
            unread_count: thread.unread_for(viewer),
            created_at: format_system_time(thread.created_at),
        }
    }
}

/// Compact thread entry for the per-user listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct ThreadListItem {
    pub id: Uuid,
    pub source_topic: String,
    pub question_text: String,
    pub last_message_at: String,
    pub last_message_preview: String,
    pub message_count: usize,
    pub unread_count: usize,
}

impl ThreadListItem {
    /// Build the list entry for `viewer`.
    pub fn for_viewer(thread: &ChatThread, viewer: Uuid) -> Self {
        Self {
            id: thread.id,
            source_topic: thread.source_topic.clone(),
            question_text: thread.question_text.clone(),
            last_message_at: format_system_time(thread.last_message_at),
            last_message_preview: thread.last_message_preview.clone(),
            message_count: thread.message_count,
            unread_count: thread.unread_for(viewer),
        }
    }
}

/// Aggregate unread badge count across all active threads.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub total: usize,
}

/// Read receipt returned by the mark-read endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadReceiptResponse {
    pub read_by: Uuid,
    pub read_at: String,
}

/// Reactions of one message after a toggle.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReactionUpdateResponse {
    pub message_id: Uuid,
    pub reactions: Vec<ReactionSummary>,
}

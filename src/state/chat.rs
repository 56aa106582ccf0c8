//! Per-couple, per-question chat thread aggregate: append-only message log
//! with unread counters, read receipts, and reaction toggles.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::state::channels::couple_key;

/// Longest accepted message body, in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;
/// Longest stored preview of the latest message.
const PREVIEW_LENGTH: usize = 100;

/// Which question a thread is anchored to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QuestionRef {
    /// A standalone question document.
    Freeform {
        /// Id of the question document.
        question_id: Uuid,
    },
    /// One task inside a daily challenge.
    ChallengeTask {
        /// Id of the challenge document.
        challenge_id: Uuid,
        /// Index of the task within the challenge.
        task_index: u32,
    },
}

impl QuestionRef {
    /// Stable string form used as part of storage uniqueness keys.
    pub fn storage_key(&self) -> String {
        match self {
            QuestionRef::Freeform { question_id } => format!("q:{question_id}"),
            QuestionRef::ChallengeTask {
                challenge_id,
                task_index,
            } => format!("c:{challenge_id}:{task_index}"),
        }
    }
}

/// What kind of content a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain chat text.
    Text,
    /// A standalone reaction message.
    Reaction,
    /// An image attachment reference.
    Image,
    /// Server-generated notice.
    System,
    /// A question answer that seeded or extended the thread.
    Answer,
}

/// Media type of an answer message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// Text answer.
    Text,
    /// Photo answer; previews render a placeholder.
    Photo,
    /// Video answer; previews render a placeholder.
    Video,
}

/// An emoji reaction left on a message by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Reaction {
    /// User who reacted.
    pub user_id: Uuid,
    /// The emoji itself.
    pub emoji: String,
    /// When the reaction was added.
    #[schema(value_type = String)]
    pub created_at: SystemTime,
}

/// One message in a thread's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message id.
    pub id: Uuid,
    /// Author of the message.
    pub sender_id: Uuid,
    /// Message body, at most [`MAX_MESSAGE_LENGTH`] characters.
    pub content: String,
    /// Content kind.
    pub kind: MessageKind,
    /// Present for `Answer` messages.
    pub answer_kind: Option<AnswerKind>,
    /// Whether the other partner has read the message.
    pub is_read: bool,
    /// When the other partner read the message.
    pub read_at: Option<SystemTime>,
    /// Emoji reactions on this message.
    pub reactions: Vec<Reaction>,
    /// When the message was appended.
    pub created_at: SystemTime,
}

impl ChatMessage {
    /// Build an answer message for the question flow.
    pub fn answer(sender_id: Uuid, content: &str, answer_kind: AnswerKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            content: content.to_owned(),
            kind: MessageKind::Answer,
            answer_kind: Some(answer_kind),
            is_read: false,
            read_at: None,
            reactions: Vec::new(),
            created_at: SystemTime::now(),
        }
    }
}

/// Lifecycle status of a thread. Threads are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    /// Visible in thread lists.
    Active,
    /// Soft-hidden.
    Archived,
}

/// A mutation rejected by the aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The sender is not a party to the thread.
    #[error("access denied: not a participant in this chat")]
    NotAParticipant,
    /// Message body empty after trimming.
    #[error("message cannot be empty")]
    EmptyMessage,
    /// Message body exceeds [`MAX_MESSAGE_LENGTH`].
    #[error("message too long (max {MAX_MESSAGE_LENGTH} characters)")]
    MessageTooLong,
    /// Referenced message does not exist in this thread.
    #[error("message not found")]
    MessageNotFound,
}

/// The message thread anchored to one question between one couple.
///
/// Invariant: at most one thread exists per `(couple_key, question_ref)`
/// pair; creation goes through the storage layer's atomic find-or-create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatThread {
    /// Unique thread id.
    pub id: Uuid,
    /// Sorted-pair key identifying the couple.
    pub couple_key: String,
    /// Lexicographically smaller partner id.
    pub partner1: Uuid,
    /// Lexicographically larger partner id.
    pub partner2: Uuid,
    /// Topic the question came from ("future", "dailychallenge", ...).
    pub source_topic: String,
    /// The anchoring question.
    pub question_ref: QuestionRef,
    /// Denormalized question text for display.
    pub question_text: String,
    /// Lifecycle status.
    pub status: ThreadStatus,
    /// Append-only message log.
    pub messages: Vec<ChatMessage>,
    /// Timestamp of the latest message.
    pub last_message_at: SystemTime,
    /// Short preview of the latest message.
    pub last_message_preview: String,
    /// Total messages in the log.
    pub message_count: usize,
    /// Unread counter for partner1.
    pub partner1_unread: usize,
    /// Unread counter for partner2.
    pub partner2_unread: usize,
    /// Creation time.
    pub created_at: SystemTime,
}

impl ChatThread {
    /// Create a thread seeded with its first answer message.
    pub fn new_for_question(
        user_id: Uuid,
        partner_id: Uuid,
        source_topic: &str,
        question_ref: QuestionRef,
        question_text: &str,
        answer: &str,
        answer_kind: AnswerKind,
    ) -> Self {
        let (partner1, partner2) = if user_id < partner_id {
            (user_id, partner_id)
        } else {
            (partner_id, user_id)
        };
        let now = SystemTime::now();

        let mut thread = Self {
            id: Uuid::new_v4(),
            couple_key: couple_key(user_id, partner_id),
            partner1,
            partner2,
            source_topic: source_topic.to_owned(),
            question_ref,
            question_text: question_text.to_owned(),
            status: ThreadStatus::Active,
            messages: Vec::new(),
            last_message_at: now,
            last_message_preview: String::new(),
            message_count: 0,
            partner1_unread: 0,
            partner2_unread: 0,
            created_at: now,
        };

        // The creator's own answer does not count as unread for them; it
        // does for the partner.
        thread.append_answer(user_id, answer, answer_kind);
        thread
    }

    /// Whether `user_id` is one of the two partners.
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.partner1 == user_id || self.partner2 == user_id
    }

    /// The other partner, given one participant.
    pub fn partner_of(&self, user_id: Uuid) -> Uuid {
        if self.partner1 == user_id {
            self.partner2
        } else {
            self.partner1
        }
    }

    /// Unread message count for `user_id`.
    pub fn unread_for(&self, user_id: Uuid) -> usize {
        if self.partner1 == user_id {
            self.partner1_unread
        } else {
            self.partner2_unread
        }
    }

    /// Append an answer message for `user_id`, bumping the partner's unread
    /// counter and refreshing preview metadata. Participant and content
    /// checks are the caller's concern (answers come pre-validated from the
    /// question flow).
    pub fn append_answer(&mut self, user_id: Uuid, answer: &str, answer_kind: AnswerKind) {
        self.push_message(ChatMessage::answer(user_id, answer, answer_kind));
    }

    /// Append a regular message after validating sender and content.
    /// Returns the stored message.
    pub fn post_message(
        &mut self,
        sender_id: Uuid,
        content: &str,
        kind: MessageKind,
    ) -> Result<&ChatMessage, ChatError> {
        if !self.is_participant(sender_id) {
            return Err(ChatError::NotAParticipant);
        }
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong);
        }

        self.push_message(ChatMessage {
            id: Uuid::new_v4(),
            sender_id,
            content: trimmed.to_owned(),
            kind,
            answer_kind: None,
            is_read: false,
            read_at: None,
            reactions: Vec::new(),
            created_at: SystemTime::now(),
        });
        Ok(self.messages.last().expect("message just pushed"))
    }

    /// Mark every message not authored by `user_id` as read and zero that
    /// user's unread counter. Idempotent.
    pub fn mark_read(&mut self, user_id: Uuid) -> Result<SystemTime, ChatError> {
        if !self.is_participant(user_id) {
            return Err(ChatError::NotAParticipant);
        }
        let read_at = SystemTime::now();
        for message in &mut self.messages {
            if message.sender_id != user_id && !message.is_read {
                message.is_read = true;
                message.read_at = Some(read_at);
            }
        }
        if self.partner1 == user_id {
            self.partner1_unread = 0;
        } else {
            self.partner2_unread = 0;
        }
        Ok(read_at)
    }

    /// Toggle the `(user_id, emoji)` reaction on a message: remove it when
    /// present, add it otherwise. Returns the message's reaction list.
    pub fn toggle_reaction(
        &mut self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> Result<&[Reaction], ChatError> {
        if !self.is_participant(user_id) {
            return Err(ChatError::NotAParticipant);
        }
        let message = self
            .messages
            .iter_mut()
            .find(|message| message.id == message_id)
            .ok_or(ChatError::MessageNotFound)?;

        if let Some(index) = message
            .reactions
            .iter()
            .position(|reaction| reaction.user_id == user_id && reaction.emoji == emoji)
        {
            message.reactions.remove(index);
        } else {
            message.reactions.push(Reaction {
                user_id,
                emoji: emoji.to_owned(),
                created_at: SystemTime::now(),
            });
        }
        Ok(&message.reactions)
    }

    /// Append an already-validated message, bumping the recipient's unread
    /// counter and refreshing preview metadata.
    pub(crate) fn push_message(&mut self, message: ChatMessage) {
        self.last_message_at = message.created_at;
        self.last_message_preview = preview_of(&message);
        if message.sender_id == self.partner1 {
            self.partner2_unread += 1;
        } else {
            self.partner1_unread += 1;
        }
        self.messages.push(message);
        self.message_count = self.messages.len();
    }
}

/// Derive the list-view preview for a message: media answers render a
/// placeholder, text is truncated to [`PREVIEW_LENGTH`] characters.
pub fn preview_of(message: &ChatMessage) -> String {
    match message.answer_kind {
        Some(AnswerKind::Photo) => "[photo]".to_owned(),
        Some(AnswerKind::Video) => "[video]".to_owned(),
        _ => message.content.chars().take(PREVIEW_LENGTH).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thread() -> (ChatThread, Uuid, Uuid) {
        let user = Uuid::new_v4();
        let partner = Uuid::new_v4();
        let thread = ChatThread::new_for_question(
            user,
            partner,
            "future",
            QuestionRef::Freeform {
                question_id: Uuid::new_v4(),
            },
            "Where do you see us in ten years?",
            "On a beach somewhere",
            AnswerKind::Text,
        );
        (thread, user, partner)
    }

    #[test]
    fn creation_seeds_first_answer_and_partner_unread() {
        let (thread, user, partner) = thread();

        assert_eq!(thread.message_count, 1);
        assert_eq!(thread.messages[0].kind, MessageKind::Answer);
        assert_eq!(thread.unread_for(user), 0);
        assert_eq!(thread.unread_for(partner), 1);
        assert_eq!(thread.last_message_preview, "On a beach somewhere");
        assert_eq!(thread.couple_key, couple_key(partner, user));
    }

    #[test]
    fn media_answers_use_placeholder_previews() {
        let (mut thread, _, partner) = thread();
        thread.append_answer(partner, "https://cdn/answer.jpg", AnswerKind::Photo);
        assert_eq!(thread.last_message_preview, "[photo]");

        thread.append_answer(partner, "https://cdn/answer.mp4", AnswerKind::Video);
        assert_eq!(thread.last_message_preview, "[video]");
    }

    #[test]
    fn post_message_validates_sender_and_content() {
        let (mut thread, user, _) = thread();

        assert!(matches!(
            thread.post_message(Uuid::new_v4(), "hello", MessageKind::Text),
            Err(ChatError::NotAParticipant)
        ));
        assert!(matches!(
            thread.post_message(user, "   ", MessageKind::Text),
            Err(ChatError::EmptyMessage)
        ));
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(
            thread.post_message(user, &long, MessageKind::Text),
            Err(ChatError::MessageTooLong)
        ));
        assert_eq!(thread.message_count, 1);
    }

    #[test]
    fn posting_increments_only_the_recipient_unread() {
        let (mut thread, user, partner) = thread();
        thread.post_message(user, "you there?", MessageKind::Text).unwrap();
        thread.post_message(user, "hello?", MessageKind::Text).unwrap();

        assert_eq!(thread.unread_for(partner), 3);
        assert_eq!(thread.unread_for(user), 0);
        assert_eq!(thread.message_count, 3);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let (mut thread, user, partner) = thread();
        thread.post_message(user, "ping", MessageKind::Text).unwrap();

        thread.mark_read(partner).unwrap();
        assert_eq!(thread.unread_for(partner), 0);
        assert!(thread.messages.iter().all(|message| message.is_read));

        thread.mark_read(partner).unwrap();
        assert_eq!(thread.unread_for(partner), 0);
    }

    #[test]
    fn mark_read_leaves_own_messages_alone() {
        let (mut thread, _user, partner) = thread();
        thread.post_message(partner, "mine", MessageKind::Text).unwrap();

        thread.mark_read(partner).unwrap();
        let own = thread
            .messages
            .iter()
            .find(|message| message.sender_id == partner)
            .unwrap();
        assert!(!own.is_read);
    }

    #[test]
    fn reaction_toggles_on_and_off() {
        let (mut thread, user, partner) = thread();
        let message_id = thread.messages[0].id;

        let reactions = thread.toggle_reaction(message_id, partner, "❤️").unwrap();
        assert_eq!(reactions.len(), 1);

        // Same emoji from the other partner coexists.
        let reactions = thread.toggle_reaction(message_id, user, "❤️").unwrap();
        assert_eq!(reactions.len(), 2);

        // Repeating the first toggle removes only that user's reaction.
        let reactions = thread.toggle_reaction(message_id, partner, "❤️").unwrap();
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].user_id, user);
    }

    #[test]
    fn reaction_on_unknown_message_errors() {
        let (mut thread, user, _) = thread();
        assert_eq!(
            thread
                .toggle_reaction(Uuid::new_v4(), user, "👍")
                .map(|_| ()),
            Err(ChatError::MessageNotFound)
        );
    }

    #[test]
    fn question_ref_storage_keys_are_distinct() {
        let question_id = Uuid::new_v4();
        let challenge_id = Uuid::new_v4();
        let freeform = QuestionRef::Freeform { question_id };
        let task0 = QuestionRef::ChallengeTask {
            challenge_id,
            task_index: 0,
        };
        let task1 = QuestionRef::ChallengeTask {
            challenge_id,
            task_index: 1,
        };

        assert_ne!(freeform.storage_key(), task0.storage_key());
        assert_ne!(task0.storage_key(), task1.storage_key());
    }
}

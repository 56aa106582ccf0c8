use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::chat::{AnswerKind, QuestionRef};

/// User record as persisted. The core treats users as an external entity:
/// identity, volatile partner pointer, and a durable presence mirror.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserEntity {
    /// Primary key of the user.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional avatar URL.
    pub avatar: Option<String>,
    /// Current partner, absent while unpaired. Can change while a realtime
    /// session is live.
    pub partner_id: Option<Uuid>,
    /// Durable mirror of realtime presence.
    pub is_online: bool,
    /// Last time the user connected or disconnected.
    pub last_seen: Option<SystemTime>,
    /// The mood the user last shared with their partner.
    #[serde(default)]
    pub current_mood: Option<MoodEntry>,
    /// Latest drawing the partner sent, kept until the next one replaces it
    /// so it survives the recipient being offline.
    #[serde(default)]
    pub last_scribble: Option<ScribbleNote>,
}

/// A short emoji status a user shares with their partner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodEntry {
    /// The mood emoji.
    pub emoji: String,
    /// Human-readable mood label.
    pub label: String,
    /// When the mood was set.
    pub updated_at: SystemTime,
}

/// A drawing relayed between partners. Stored on the recipient's record for
/// offline delivery; only the most recent one is kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScribbleNote {
    /// Author of the drawing.
    pub from_user_id: Uuid,
    /// Author's display name at send time.
    pub from_user_name: String,
    /// Client-defined stroke data, passed through untouched.
    pub paths: serde_json::Value,
    /// When the recipient's record received the drawing.
    pub received_at: SystemTime,
}

/// Outcome of an atomic create-if-absent storage call.
#[derive(Debug, Clone)]
pub enum CreateOutcome<T> {
    /// No competing record existed; the supplied one was stored.
    Created(T),
    /// An existing record won; the caller gets it back instead.
    Existing(T),
}

impl<T> CreateOutcome<T> {
    /// The stored or pre-existing record, either way.
    pub fn into_inner(self) -> T {
        match self {
            CreateOutcome::Created(value) | CreateOutcome::Existing(value) => value,
        }
    }

    /// Borrow the stored or pre-existing record, either way.
    pub fn as_inner(&self) -> &T {
        match self {
            CreateOutcome::Created(value) | CreateOutcome::Existing(value) => value,
        }
    }

    /// Whether the supplied record was the one stored.
    pub fn was_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }
}

/// Everything needed to atomically find-or-create a chat thread for a
/// question answer and append the answer message to it.
#[derive(Debug, Clone)]
pub struct AnswerSeed {
    /// User submitting the answer.
    pub user_id: Uuid,
    /// Their partner.
    pub partner_id: Uuid,
    /// Topic the question came from.
    pub source_topic: String,
    /// The anchoring question.
    pub question_ref: QuestionRef,
    /// Denormalized question text.
    pub question_text: String,
    /// The answer content.
    pub answer: String,
    /// Media type of the answer.
    pub answer_kind: AnswerKind,
}

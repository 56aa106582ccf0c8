//! Wire projections for the couple-channel extras: shared moods and
//! scribble drawings.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{MoodEntry, ScribbleNote},
    dto::format_system_time,
};

/// A shared mood as pushed to the partner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MoodSummary {
    /// The mood emoji.
    pub emoji: String,
    /// Human-readable mood label.
    pub label: String,
    /// RFC 3339 timestamp of when the mood was set.
    pub updated_at: String,
}

impl From<&MoodEntry> for MoodSummary {
    fn from(value: &MoodEntry) -> Self {
        Self {
            emoji: value.emoji.clone(),
            label: value.label.clone(),
            updated_at: format_system_time(value.updated_at),
        }
    }
}

/// A stored scribble as delivered to its recipient.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScribbleSummary {
    /// Author of the drawing.
    pub from_user_id: Uuid,
    /// Author's display name at send time.
    pub from_user_name: String,
    /// Client-defined stroke data, passed through untouched.
    #[schema(value_type = Object)]
    pub paths: serde_json::Value,
    /// RFC 3339 timestamp of when the drawing arrived.
    pub received_at: String,
}

impl From<&ScribbleNote> for ScribbleSummary {
    fn from(value: &ScribbleNote) -> Self {
        Self {
            from_user_id: value.from_user_id,
            from_user_name: value.from_user_name.clone(),
            paths: value.paths.clone(),
            received_at: format_system_time(value.received_at),
        }
    }
}

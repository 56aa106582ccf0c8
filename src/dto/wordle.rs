//! REST payloads for the Wordle endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::wordle::{GuessOutcome, LetterResult, WordleGame, WordleStatus},
};

/// Payload used to start a new word game; the partner is the guesser.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateWordleRequest {
    /// The player picking the secret word.
    pub user_id: Uuid,
    /// The partner who will guess.
    pub partner_id: Uuid,
    /// Secret word, exactly five letters and dictionary-valid.
    #[validate(length(min = 5, max = 5, message = "word must be exactly 5 letters"))]
    pub word: String,
}

/// Payload for one guess attempt.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct GuessRequest {
    /// The guessing player.
    pub user_id: Uuid,
    /// Guessed word, exactly five letters.
    #[validate(length(min = 5, max = 5, message = "word must be exactly 5 letters"))]
    pub word: String,
}

/// Payload identifying the caller for lookups and notifications.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActorRequest {
    /// The requesting player.
    pub user_id: Uuid,
}

/// One scored guess in the game history.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessSummary {
    pub word: String,
    pub result: Vec<LetterResult>,
    pub at: String,
}

/// Projection of a game tailored to the requesting viewer.
///
/// The secret word is present only when the viewer is the creator or the
/// game is terminal.
#[derive(Debug, Serialize, ToSchema)]
pub struct WordleGameSummary {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub partner_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_word: Option<String>,
    pub status: WordleStatus,
    pub guesses: Vec<GuessSummary>,
    pub max_attempts: usize,
    pub attempts_remaining: usize,
    pub winner_id: Option<Uuid>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl WordleGameSummary {
    /// Build the projection for `viewer`, applying secret-word redaction.
    pub fn for_viewer(game: &WordleGame, viewer: Uuid) -> Self {
        let secret_word = game
            .secret_visible_to(viewer)
            .then(|| game.secret_word.clone());
        Self {
            id: game.id,
            creator_id: game.creator_id,
            partner_id: game.partner_id,
            secret_word,
            status: game.status,
            guesses: game
                .guesses
                .iter()
                .map(|record| GuessSummary {
                    word: record.word.clone(),
                    result: record.result.clone(),
                    at: format_system_time(record.at),
                })
                .collect(),
            max_attempts: game.max_attempts,
            attempts_remaining: game.max_attempts.saturating_sub(game.guesses.len()),
            winner_id: game.winner_id,
            created_at: format_system_time(game.created_at),
            completed_at: game.completed_at.map(format_system_time),
        }
    }
}

/// Result of an accepted guess.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuessResponse {
    pub result: Vec<LetterResult>,
    pub is_correct: bool,
    pub game_complete: bool,
    pub attempts_remaining: usize,
    pub game: WordleGameSummary,
}

impl GuessResponse {
    /// Build the response from the engine outcome and updated game.
    pub fn new(outcome: GuessOutcome, game: &WordleGame, viewer: Uuid) -> Self {
        Self {
            result: outcome.result,
            is_correct: outcome.is_correct,
            game_complete: outcome.game_complete,
            attempts_remaining: outcome.attempts_remaining,
            game: WordleGameSummary::for_viewer(game, viewer),
        }
    }
}

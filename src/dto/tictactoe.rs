//! REST payloads for the TicTacToe endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::tictactoe::{MoveOutcome, Symbol, TicTacToeGame, TicTacToeStatus, Turn},
};

/// Payload used to start a new game for a couple.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateTicTacToeRequest {
    /// The creating player.
    pub user_id: Uuid,
    /// The other half of the couple.
    pub partner_id: Uuid,
    /// Symbol the creator plays as; the partner gets the complement.
    #[serde(default = "default_symbol")]
    pub symbol: Symbol,
    /// Optional opening move applied atomically with creation.
    #[validate(range(min = 0, max = 8))]
    pub first_move: Option<usize>,
}

fn default_symbol() -> Symbol {
    Symbol::X
}

/// Payload for a single move.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct MoveRequest {
    /// The acting player.
    pub user_id: Uuid,
    /// Board cell index, row-major 0..=8.
    pub position: usize,
}

/// Payload identifying the caller for lookups and notifications.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ActorRequest {
    /// The requesting player.
    pub user_id: Uuid,
}

/// One entry of the move log.
#[derive(Debug, Serialize, ToSchema)]
pub struct MoveSummary {
    pub position: usize,
    pub symbol: Symbol,
    pub player_id: Uuid,
    pub at: String,
}

/// Full projection of a game as exposed to both players.
#[derive(Debug, Serialize, ToSchema)]
pub struct TicTacToeGameSummary {
    pub id: Uuid,
    pub creator_id: Uuid,
    pub partner_id: Uuid,
    /// Row-major cells; `null` marks an empty cell.
    pub board: Vec<Option<Symbol>>,
    pub current_turn: Turn,
    pub creator_symbol: Symbol,
    pub partner_symbol: Symbol,
    pub status: TicTacToeStatus,
    pub winner_id: Option<Uuid>,
    pub move_count: usize,
    pub moves: Vec<MoveSummary>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<&TicTacToeGame> for TicTacToeGameSummary {
    fn from(game: &TicTacToeGame) -> Self {
        Self {
            id: game.id,
            creator_id: game.creator_id,
            partner_id: game.partner_id,
            board: game.board.to_vec(),
            current_turn: game.current_turn,
            creator_symbol: game.creator_symbol,
            partner_symbol: game.partner_symbol,
            status: game.status,
            winner_id: game.winner_id,
            move_count: game.move_count,
            moves: game
                .move_history
                .iter()
                .map(|record| MoveSummary {
                    position: record.position,
                    symbol: record.symbol,
                    player_id: record.player_id,
                    at: format_system_time(record.at),
                })
                .collect(),
            created_at: format_system_time(game.created_at),
            completed_at: game.completed_at.map(format_system_time),
        }
    }
}

/// Result of an accepted move.
#[derive(Debug, Serialize, ToSchema)]
pub struct MoveResponse {
    /// `continue`, `won`, or `draw`.
    pub outcome: String,
    pub game: TicTacToeGameSummary,
}

impl MoveResponse {
    /// Build the response from the engine outcome and updated game.
    pub fn new(outcome: MoveOutcome, game: &TicTacToeGame) -> Self {
        let outcome = match outcome {
            MoveOutcome::Continue => "continue",
            MoveOutcome::Won => "won",
            MoveOutcome::Draw => "draw",
        };
        Self {
            outcome: outcome.to_owned(),
            game: game.into(),
        }
    }
}

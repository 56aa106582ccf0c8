use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::{chat::ChatError, tictactoe::MoveError, wordle::GuessError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Malformed input (bad length, bad enum value, empty content).
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Caller is not a party to the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A non-terminal game already exists for this couple.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The acting player moved out of turn.
    #[error("it's not your turn")]
    WrongTurn,
    /// The targeted board cell already holds a symbol.
    #[error("cell is already occupied")]
    CellOccupied,
    /// The board position is outside the 0..=8 range.
    #[error("invalid position: must be 0-8")]
    InvalidPosition,
    /// The word is not five letters or is missing from the dictionary.
    #[error("{0}")]
    InvalidWord(String),
    /// The guesser has no attempts left.
    #[error("maximum attempts reached")]
    AttemptsExhausted,
    /// The game or thread has already reached a terminal status.
    #[error("{0}")]
    TerminalState(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<MoveError> for ServiceError {
    fn from(err: MoveError) -> Self {
        match err {
            MoveError::TerminalState => ServiceError::TerminalState(err.to_string()),
            MoveError::InvalidPosition => ServiceError::InvalidPosition,
            MoveError::CellOccupied => ServiceError::CellOccupied,
            MoveError::NotAPlayer => ServiceError::Forbidden(err.to_string()),
            MoveError::WrongTurn => ServiceError::WrongTurn,
        }
    }
}

impl From<GuessError> for ServiceError {
    fn from(err: GuessError) -> Self {
        match err {
            GuessError::TerminalState => ServiceError::TerminalState(err.to_string()),
            GuessError::NotTheGuesser => ServiceError::Forbidden(err.to_string()),
            GuessError::WrongLength => ServiceError::InvalidWord(err.to_string()),
            GuessError::AttemptsExhausted => ServiceError::AttemptsExhausted,
        }
    }
}

impl From<ChatError> for ServiceError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotAParticipant => ServiceError::Forbidden(err.to_string()),
            ChatError::EmptyMessage | ChatError::MessageTooLong => {
                ServiceError::InvalidInput(err.to_string())
            }
            ChatError::MessageNotFound => ServiceError::NotFound(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Caller is not allowed to act on the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidPosition => AppError::BadRequest(err.to_string()),
            ServiceError::InvalidWord(message) => AppError::BadRequest(message),
            ServiceError::WrongTurn
            | ServiceError::CellOccupied
            | ServiceError::AttemptsExhausted => AppError::Conflict(err.to_string()),
            ServiceError::TerminalState(message) => AppError::Conflict(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_turn_maps_to_conflict() {
        assert!(matches!(
            AppError::from(ServiceError::WrongTurn),
            AppError::Conflict(_)
        ));
    }

    #[test]
    fn invalid_position_maps_to_bad_request() {
        assert!(matches!(
            AppError::from(ServiceError::InvalidPosition),
            AppError::BadRequest(_)
        ));
    }

    #[test]
    fn forbidden_maps_through() {
        assert!(matches!(
            AppError::from(ServiceError::Forbidden("not a player".into())),
            AppError::Forbidden(_)
        ));
    }
}

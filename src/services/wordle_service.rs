//! Orchestration for the Wordle endpoints: dictionary checks, storage
//! round-trips, and realtime fan-out around the guessing engine.

use serde_json::json;
use uuid::Uuid;

use crate::{
    dao::models::CreateOutcome,
    dto::{
        wordle::{GuessResponse, WordleGameSummary},
        ws::ServerFrame,
    },
    error::ServiceError,
    services::push::notify_user,
    state::{
        SharedState,
        channels::{couple_channel_for, wordle_channel},
        wordle::{GuessOutcome, WordleGame},
    },
};

/// Default number of finished games returned by the history endpoint.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

fn validate_word(state: &SharedState, word: &str) -> Result<(), ServiceError> {
    if !state.config().is_valid_word(word) {
        return Err(ServiceError::InvalidWord(
            "this word is not in our dictionary".into(),
        ));
    }
    Ok(())
}

/// Start a new word game; the partner becomes the guesser.
///
/// Unlike TicTacToe creation this is not idempotent: picking a new secret
/// while a game is still running is a client error, surfaced as a conflict.
pub async fn create_game(
    state: &SharedState,
    user_id: Uuid,
    partner_id: Uuid,
    word: &str,
) -> Result<CreateOutcome<WordleGame>, ServiceError> {
    if user_id == partner_id {
        return Err(ServiceError::InvalidInput(
            "cannot start a game against yourself".into(),
        ));
    }
    validate_word(state, word)?;

    let game = WordleGame::new(user_id, partner_id, word);
    let store = state.require_store().await?;
    let outcome = store.create_wordle_if_no_active(game).await?;

    if let CreateOutcome::Created(game) = &outcome {
        if let Some(channel) = couple_channel_for(user_id, Some(partner_id)) {
            state.channels().emit_to_channel(
                &channel,
                &ServerFrame::WordleNewGameBroadcast {
                    game: WordleGameSummary::for_viewer(game, partner_id),
                },
                Some(user_id),
            );
        }
        notify_user(
            state.push(),
            partner_id,
            "New Wordle challenge",
            "Your partner picked a secret word for you!",
            json!({ "game_id": game.id, "kind": "wordle" }),
        );
    }

    Ok(outcome)
}

/// Score one guess, persist the result, and fan it out to the game room.
pub async fn submit_guess(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
    word: &str,
) -> Result<(GuessOutcome, WordleGame), ServiceError> {
    validate_word(state, word)?;

    let store = state.require_store().await?;
    let mut game = store
        .find_wordle(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;

    let outcome = game.submit_guess(user_id, word)?;
    store.save_wordle(game.clone()).await?;

    state.channels().emit_to_channel(
        &wordle_channel(game_id),
        &ServerFrame::WordleGuessBroadcast {
            player_id: user_id,
            // The creator watches along, so the room projection keeps the
            // secret visible to them only via their own fetches.
            guess: GuessResponse::new(outcome.clone(), &game, user_id),
        },
        Some(user_id),
    );

    if outcome.game_complete {
        state.channels().emit_to_channel(
            &wordle_channel(game_id),
            &ServerFrame::WordleGameComplete {
                game_id,
                winner_id: game.winner_id,
                secret_word: game.secret_word.clone(),
            },
            None,
        );
    }

    Ok((outcome, game))
}

/// Load a game, enforcing that the requester is one of its players.
pub async fn game_for_player(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
) -> Result<WordleGame, ServiceError> {
    let store = state.require_store().await?;
    let game = store
        .find_wordle(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;

    if !game.is_player(user_id) {
        return Err(ServiceError::Forbidden(
            "you are not a player in this game".into(),
        ));
    }

    Ok(game)
}

/// The caller's current non-terminal game, if any.
pub async fn active_game(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Option<WordleGame>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store.find_active_wordle(user_id).await?)
}

/// Finished games for the caller, most recent first.
pub async fn history(
    state: &SharedState,
    user_id: Uuid,
    limit: Option<usize>,
) -> Result<Vec<WordleGame>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_finished_wordle(user_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await?)
}

/// Push a reminder to the guesser that a word is waiting.
pub async fn notify_guesser(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    let game = game_for_player(state, game_id, user_id).await?;
    if game.status.is_terminal() {
        return Err(ServiceError::TerminalState("game is already complete".into()));
    }

    notify_user(
        state.push(),
        game.partner_id,
        "Wordle is waiting",
        "Your partner's secret word is still unsolved.",
        json!({ "game_id": game.id, "kind": "wordle" }),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::memory::MemoryCoupleStore,
        services::push::NoopPush,
        state::{AppState, wordle::WordleStatus},
    };

    async fn state_with_store() -> SharedState {
        let state = AppState::new(
            AppConfig::from_word_list("crane\nrobin\nloyal\nalloy"),
            Arc::new(NoopPush),
        );
        state
            .install_store(Arc::new(MemoryCoupleStore::new()))
            .await;
        state
    }

    #[tokio::test]
    async fn unknown_word_is_rejected_at_creation() {
        let state = state_with_store().await;
        let result = create_game(&state, Uuid::new_v4(), Uuid::new_v4(), "zzzzz").await;
        assert!(matches!(result, Err(ServiceError::InvalidWord(_))));
    }

    #[tokio::test]
    async fn second_active_game_returns_existing() {
        let state = state_with_store().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let first = create_game(&state, alice, bob, "crane").await.unwrap();
        assert!(first.was_created());

        let second = create_game(&state, alice, bob, "robin").await.unwrap();
        assert!(!second.was_created());
        assert_eq!(second.into_inner().id, first.into_inner().id);
    }

    #[tokio::test]
    async fn only_the_guesser_may_guess() {
        let state = state_with_store().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let game = create_game(&state, alice, bob, "crane")
            .await
            .unwrap()
            .into_inner();

        let result = submit_guess(&state, game.id, alice, "robin").await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn winning_guess_completes_the_game() {
        let state = state_with_store().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let game = create_game(&state, alice, bob, "crane")
            .await
            .unwrap()
            .into_inner();

        let (outcome, updated) = submit_guess(&state, game.id, bob, "crane").await.unwrap();
        assert!(outcome.is_correct);
        assert!(outcome.game_complete);
        assert_eq!(updated.status, WordleStatus::Won);
        assert_eq!(updated.winner_id, Some(bob));

        let result = submit_guess(&state, game.id, bob, "robin").await;
        assert!(matches!(result, Err(ServiceError::TerminalState(_))));
    }

    #[tokio::test]
    async fn guesses_must_be_dictionary_words() {
        let state = state_with_store().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let game = create_game(&state, alice, bob, "crane")
            .await
            .unwrap()
            .into_inner();

        let result = submit_guess(&state, game.id, bob, "qwxyz").await;
        assert!(matches!(result, Err(ServiceError::InvalidWord(_))));
    }
}

//! Orchestration for the TicTacToe endpoints: storage round-trips, realtime
//! fan-out, and partner notifications around the board engine.

use serde_json::json;
use uuid::Uuid;

use crate::{
    dto::{tictactoe::TicTacToeGameSummary, ws::ServerFrame},
    error::ServiceError,
    services::push::notify_user,
    state::{
        SharedState,
        channels::{couple_channel_for, tictactoe_channel},
        tictactoe::{MoveOutcome, Symbol, TicTacToeGame},
    },
};

use crate::dao::models::CreateOutcome;

/// Default number of finished games returned by the history endpoint.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Start a new game for a couple, or return the existing active one.
///
/// Creation is idempotent per unordered pair: when an active game already
/// exists, the storage layer returns it instead of inserting a duplicate.
pub async fn create_game(
    state: &SharedState,
    user_id: Uuid,
    partner_id: Uuid,
    symbol: Symbol,
    first_move: Option<usize>,
) -> Result<CreateOutcome<TicTacToeGame>, ServiceError> {
    if user_id == partner_id {
        return Err(ServiceError::InvalidInput(
            "cannot start a game against yourself".into(),
        ));
    }

    let game = TicTacToeGame::new(user_id, partner_id, symbol, first_move)?;
    let store = state.require_store().await?;
    let outcome = store.create_tictactoe_if_no_active(game).await?;

    if let CreateOutcome::Created(game) = &outcome {
        if let Some(channel) = couple_channel_for(user_id, Some(partner_id)) {
            state.channels().emit_to_channel(
                &channel,
                &ServerFrame::TicTacToeNewGameBroadcast { game: game.into() },
                Some(user_id),
            );
        }
        notify_user(
            state.push(),
            partner_id,
            "New TicTacToe game",
            "Your partner challenged you to TicTacToe!",
            json!({ "game_id": game.id, "kind": "tictactoe" }),
        );
    }

    Ok(outcome)
}

/// Apply one move, persist the result, and fan it out to the game room.
pub async fn make_move(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
    position: usize,
) -> Result<(MoveOutcome, TicTacToeGame), ServiceError> {
    let store = state.require_store().await?;
    let mut game = store
        .find_tictactoe(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}` not found")))?;

    let outcome = game.apply_move(user_id, position)?;
    store.save_tictactoe(game.clone()).await?;

    let symbol = game
        .move_history
        .last()
        .map(|record| record.symbol)
        .unwrap_or(game.creator_symbol);
    state.channels().emit_to_channel(
        &tictactoe_channel(game_id),
        &ServerFrame::TicTacToeMoveBroadcast {
            position,
            symbol,
            player_id: user_id,
            outcome: outcome_label(outcome).to_owned(),
            game: TicTacToeGameSummary::from(&game),
        },
        Some(user_id),
    );

    if outcome != MoveOutcome::Continue {
        state.channels().emit_to_channel(
            &tictactoe_channel(game_id),
            &ServerFrame::TicTacToeGameComplete {
                game_id,
                winner_id: game.winner_id,
                outcome: outcome_label(outcome).to_owned(),
            },
            None,
        );
    }

    Ok((outcome, game))
}

fn outcome_label(outcome: MoveOutcome) -> &'static str {
    match outcome {
        MoveOutcome::Continue => "continue",
        MoveOutcome::Won => "won",
        MoveOutcome::Draw => "draw",
    }
}

/// Load a game, enforcing that the requester is one of its players.
pub async fn game_for_player(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
) -> Result<TicTacToeGame, ServiceError> {
    let store = state.require_store().await?;
    let game = store
        .find_tictactoe(game_id)
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
) -> Result<Option<TicTacToeGame>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store.find_active_tictactoe(user_id).await?)
}

/// Finished games for the caller, most recent first.
pub async fn history(
    state: &SharedState,
    user_id: Uuid,
    limit: Option<usize>,
) -> Result<Vec<TicTacToeGame>, ServiceError> {
    let store = state.require_store().await?;
    Ok(store
        .list_finished_tictactoe(user_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
        .await?)
}

/// Push a "your turn" reminder to the other player.
pub async fn notify_turn(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    let game = game_for_player(state, game_id, user_id).await?;
    if game.status.is_terminal() {
        return Err(ServiceError::TerminalState("game is already complete".into()));
    }

    let other = if game.creator_id == user_id {
        game.partner_id
    } else {
        game.creator_id
    };
    notify_user(
        state.push(),
        other,
        "Your turn!",
        "Your partner is waiting for your TicTacToe move.",
        json!({ "game_id": game.id, "kind": "tictactoe" }),
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
        state::{AppState, tictactoe::TicTacToeStatus},
    };

    async fn state_with_store() -> SharedState {
        let state = AppState::new(
            AppConfig::from_word_list("crane"),
            Arc::new(NoopPush),
        );
        state
            .install_store(Arc::new(MemoryCoupleStore::new()))
            .await;
        state
    }

    #[tokio::test]
    async fn create_is_idempotent_while_active() {
        let state = state_with_store().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let first = create_game(&state, alice, bob, Symbol::X, None)
            .await
            .unwrap();
        assert!(first.was_created());
        let first_id = first.into_inner().id;

        let second = create_game(&state, bob, alice, Symbol::O, None)
            .await
            .unwrap();
        assert!(!second.was_created());
        assert_eq!(second.into_inner().id, first_id);
    }

    #[tokio::test]
    async fn self_game_is_rejected() {
        let state = state_with_store().await;
        let alice = Uuid::new_v4();
        let result = create_game(&state, alice, alice, Symbol::X, None).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn move_on_missing_game_is_not_found() {
        let state = state_with_store().await;
        let result = make_move(&state, Uuid::new_v4(), Uuid::new_v4(), 0).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn full_game_reaches_history() {
        let state = state_with_store().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let game = create_game(&state, alice, bob, Symbol::X, Some(0))
            .await
            .unwrap()
            .into_inner();

        // Alice takes the top row while Bob fills the middle.
        let moves = [(bob, 3), (alice, 1), (bob, 4), (alice, 2)];
        let mut last = None;
        for (player, position) in moves {
            last = Some(make_move(&state, game.id, player, position).await.unwrap());
        }
        let (outcome, finished) = last.unwrap();
        assert_eq!(outcome, MoveOutcome::Won);
        assert_eq!(finished.status, TicTacToeStatus::WonCreator);
        assert_eq!(finished.winner_id, Some(alice));

        assert!(active_game(&state, alice).await.unwrap().is_none());
        let past = history(&state, bob, None).await.unwrap();
        assert_eq!(past.len(), 1);
        assert_eq!(past[0].id, game.id);
    }

    #[tokio::test]
    async fn winning_move_fans_out_a_complete_frame() {
        let state = state_with_store().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let game = create_game(&state, alice, bob, Symbol::X, Some(0))
            .await
            .unwrap()
            .into_inner();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        state.channels().join(&tictactoe_channel(game.id), bob, tx);

        for (player, position) in [(bob, 3), (alice, 1), (bob, 4), (alice, 2)] {
            make_move(&state, game.id, player, position).await.unwrap();
        }

        let mut seen = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let axum::extract::ws::Message::Text(text) = message {
                let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
                seen.push(value["type"].as_str().unwrap_or_default().to_owned());
            }
        }
        assert!(seen.iter().any(|kind| kind == "tictactoe.moveBroadcast"));
        assert!(seen.iter().any(|kind| kind == "tictactoe.gameComplete"));
    }

    #[tokio::test]
    async fn degraded_mode_rejects_operations() {
        let state = AppState::new(
            AppConfig::from_word_list("crane"),
            Arc::new(NoopPush),
        );
        let result = create_game(&state, Uuid::new_v4(), Uuid::new_v4(), Symbol::X, None).await;
        assert!(matches!(result, Err(ServiceError::Degraded)));
    }
}

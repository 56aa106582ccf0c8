use axum::Router;

use crate::state::SharedState;

pub mod chat;
pub mod docs;
pub mod health;
pub mod tictactoe;
pub mod websocket;
pub mod wordle;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(tictactoe::router())
        .merge(wordle::router())
        .merge(chat::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}

//! WebSocket session lifecycle: auth handshake, presence bookkeeping, event
//! dispatch to the game/chat services, and channel fan-out.

use std::time::{Duration, SystemTime};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{MoodEntry, ScribbleNote},
    dto::{
        chat::{ChatMessageSummary, ReactionSummary},
        couple::{MoodSummary, ScribbleSummary},
        format_system_time,
        tictactoe::TicTacToeGameSummary,
        wordle::{GuessResponse, WordleGameSummary},
        ws::{ClientFrame, ServerFrame},
    },
    error::ServiceError,
    services::{chat_service, push::notify_user, tictactoe_service, wordle_service},
    state::{
        SharedState,
        channels::{chat_channel, couple_channel_for, tictactoe_channel, wordle_channel},
        chat::MessageKind,
        tictactoe::{MoveOutcome, Symbol},
    },
};

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for one realtime connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(AUTH_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket auth timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let frame = match serde_json::from_str::<ClientFrame>(&initial_message) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "failed to parse websocket frame");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let ClientFrame::Auth { user_id } = frame else {
        warn!("first frame was not auth");
        send_frame(
            &outbound_tx,
            &ServerFrame::AuthError {
                message: "first frame must be auth".into(),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    };

    let session = match open_session(&state, user_id, &outbound_tx).await {
        Ok(session) => session,
        Err(err) => {
            warn!(user_id = %user_id, error = %err, "websocket auth rejected");
            send_frame(
                &outbound_tx,
                &ServerFrame::AuthError {
                    message: err.to_string(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    info!(user_id = %user_id, "realtime session opened");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(frame) => dispatch(&state, &session, frame).await,
                Err(err) => {
                    warn!(user_id = %user_id, error = %err, "failed to parse websocket frame");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    close_session(&state, &session).await;
    info!(user_id = %user_id, "realtime session closed");

    finalize(writer_task, outbound_tx).await;
}

/// Live connection context carried through the dispatch loop.
struct Session {
    user_id: Uuid,
    tx: mpsc::UnboundedSender<Message>,
}

/// Authenticate the user, register presence, join the couple channel, and
/// announce the user to their partner.
async fn open_session(
    state: &SharedState,
    user_id: Uuid,
    tx: &mpsc::UnboundedSender<Message>,
) -> Result<Session, ServiceError> {
    let store = state.require_store().await?;
    let user = store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("user `{user_id}` not found")))?;

    // A replaced connection may still be winding down; its room memberships
    // must not survive into this one, or fan-out targets a dead sender.
    state.channels().leave_all(user_id);
    state
        .presence()
        .register(user_id, user.partner_id, user.name.clone(), tx.clone());

    // Durable mirror so REST callers see presence without a socket.
    if let Err(err) = store
        .set_user_presence(user_id, true, SystemTime::now())
        .await
    {
        warn!(user_id = %user_id, error = %err, "failed to persist online flag");
    }

    if let Some(channel) = couple_channel_for(user_id, user.partner_id) {
        state.channels().join(&channel, user_id, tx.clone());
        state.channels().emit_to_channel(
            &channel,
            &ServerFrame::PresenceOnline {
                user_id,
                user_name: user.name,
                timestamp: format_system_time(SystemTime::now()),
            },
            Some(user_id),
        );
    }

    send_frame(tx, &ServerFrame::AuthOk { user_id });

    Ok(Session {
        user_id,
        tx: tx.clone(),
    })
}

/// Tear down the session, unless a newer connection already replaced it.
async fn close_session(state: &SharedState, session: &Session) {
    let still_current = state
        .presence()
        .get(session.user_id)
        .is_some_and(|entry| entry.tx.same_channel(&session.tx));
    if !still_current {
        return;
    }

    let partner_id = state
        .presence()
        .get(session.user_id)
        .and_then(|entry| entry.partner_id);

    state.presence().unregister(session.user_id);
    state.channels().leave_all(session.user_id);

    let last_seen = SystemTime::now();
    if let Some(store) = state.store().await {
        if let Err(err) = store
            .set_user_presence(session.user_id, false, last_seen)
            .await
        {
            warn!(user_id = %session.user_id, error = %err, "failed to persist offline flag");
        }
    }

    if let Some(channel) = couple_channel_for(session.user_id, partner_id) {
        state.channels().emit_to_channel(
            &channel,
            &ServerFrame::PresenceOffline {
                user_id: session.user_id,
                last_seen: format_system_time(last_seen),
            },
            Some(session.user_id),
        );
    }
}

/// Route one inbound frame, converting failures into scoped error frames.
async fn dispatch(state: &SharedState, session: &Session, frame: ClientFrame) {
    let result = match frame {
        ClientFrame::Auth { .. } => {
            warn!(user_id = %session.user_id, "ignoring duplicate auth frame");
            Ok(())
        }
        ClientFrame::PresenceStatusRequest => handle_presence_status(state, session).await,
        ClientFrame::MoodUpdate { emoji, label } => {
            handle_mood_update(state, session, &emoji, &label).await
        }
        ClientFrame::MoodRequest => handle_mood_request(state, session).await,
        ClientFrame::ScribbleSend { paths } => handle_scribble_send(state, session, paths).await,
        ClientFrame::ScribbleRequest => handle_scribble_request(state, session).await,
        ClientFrame::TicTacToeJoin { game_id } => {
            handle_tictactoe_join(state, session, game_id).await
        }
        ClientFrame::TicTacToeMove { game_id, position } => {
            handle_tictactoe_move(state, session, game_id, position).await
        }
        ClientFrame::TicTacToeNewGame { symbol, first_move } => {
            handle_tictactoe_new_game(state, session, symbol, first_move).await
        }
        ClientFrame::WordleJoin { game_id } => handle_wordle_join(state, session, game_id).await,
        ClientFrame::WordleGuess { game_id, word } => {
            handle_wordle_guess(state, session, game_id, &word).await
        }
        ClientFrame::WordleNewGame { word } => {
            handle_wordle_new_game(state, session, &word).await
        }
        ClientFrame::ChatJoin { chat_id } => handle_chat_join(state, session, chat_id).await,
        ClientFrame::ChatLeave { chat_id } => handle_chat_leave(state, session, chat_id).await,
        ClientFrame::ChatMessage {
            chat_id,
            content,
            kind,
        } => handle_chat_message(state, session, chat_id, &content, kind).await,
        ClientFrame::ChatTyping { chat_id, is_typing } => {
            handle_chat_typing(state, session, chat_id, is_typing).await
        }
        ClientFrame::ChatRead { chat_id } => handle_chat_read(state, session, chat_id).await,
        ClientFrame::ChatReaction {
            chat_id,
            message_id,
            emoji,
        } => handle_chat_reaction(state, session, chat_id, message_id, &emoji).await,
        ClientFrame::Unknown => {
            warn!(user_id = %session.user_id, "ignoring unknown frame type");
            Ok(())
        }
    };

    if let Err(scoped) = result {
        send_frame(&session.tx, &scoped.into_frame());
    }
}

/// A service failure paired with the feature that raised it, so the error
/// frame lands on the right client-side listener.
enum ScopedError {
    Presence(ServiceError),
    Mood(ServiceError),
    Scribble(ServiceError),
    TicTacToe(ServiceError),
    Wordle(ServiceError),
    Chat(ServiceError),
}

impl ScopedError {
    fn into_frame(self) -> ServerFrame {
        match self {
            ScopedError::Presence(err) => ServerFrame::PresenceError {
                message: err.to_string(),
            },
            ScopedError::Mood(err) => ServerFrame::MoodError {
                message: err.to_string(),
            },
            ScopedError::Scribble(err) => ServerFrame::ScribbleError {
                message: err.to_string(),
            },
            ScopedError::TicTacToe(err) => ServerFrame::TicTacToeError {
                message: err.to_string(),
            },
            ScopedError::Wordle(err) => ServerFrame::WordleError {
                message: err.to_string(),
            },
            ScopedError::Chat(err) => ServerFrame::ChatError {
                message: err.to_string(),
            },
        }
    }
}

async fn handle_presence_status(
    state: &SharedState,
    session: &Session,
) -> Result<(), ScopedError> {
    let store = state.require_store().await.map_err(ScopedError::Presence)?;
    let partner_id = store
        .find_user(session.user_id)
        .await
        .map_err(|err| ScopedError::Presence(err.into()))?
        .and_then(|user| user.partner_id);
    // Pairing can change server-side while the connection is live; keep the
    // session in sync before answering.
    state.presence().update_partner(session.user_id, partner_id);
    let partner_id = partner_id.ok_or_else(|| {
        ScopedError::Presence(ServiceError::NotFound("no partner paired".into()))
    })?;

    let record = store
        .find_user(partner_id)
        .await
        .map_err(|err| ScopedError::Presence(err.into()))?;

    let frame = ServerFrame::PresenceStatus {
        partner_id,
        is_online: state.presence().is_online(partner_id),
        last_seen: record
            .and_then(|user| user.last_seen)
            .map(format_system_time),
    };
    send_frame(&session.tx, &frame);
    Ok(())
}

async fn handle_mood_update(
    state: &SharedState,
    session: &Session,
    emoji: &str,
    label: &str,
) -> Result<(), ScopedError> {
    if emoji.trim().is_empty() || label.trim().is_empty() {
        return Err(ScopedError::Mood(ServiceError::InvalidInput(
            "emoji and label are required".into(),
        )));
    }

    let mood = MoodEntry {
        emoji: emoji.to_owned(),
        label: label.to_owned(),
        updated_at: SystemTime::now(),
    };
    let store = state.require_store().await.map_err(ScopedError::Mood)?;
    store
        .set_user_mood(session.user_id, mood.clone())
        .await
        .map_err(|err| ScopedError::Mood(err.into()))?;

    let Some(entry) = state.presence().get(session.user_id) else {
        return Ok(());
    };
    if let Some(channel) = couple_channel_for(session.user_id, entry.partner_id) {
        state.channels().emit_to_channel(
            &channel,
            &ServerFrame::MoodChanged {
                user_id: session.user_id,
                user_name: entry.display_name,
                mood: MoodSummary::from(&mood),
            },
            Some(session.user_id),
        );
    }
    Ok(())
}

async fn handle_mood_request(state: &SharedState, session: &Session) -> Result<(), ScopedError> {
    let partner_id = state
        .presence()
        .get(session.user_id)
        .and_then(|entry| entry.partner_id)
        .ok_or_else(|| ScopedError::Mood(ServiceError::NotFound("no partner paired".into())))?;

    let partner = state
        .require_store()
        .await
        .map_err(ScopedError::Mood)?
        .find_user(partner_id)
        .await
        .map_err(|err| ScopedError::Mood(err.into()))?
        .ok_or_else(|| ScopedError::Mood(ServiceError::NotFound("partner not found".into())))?;

    send_frame(
        &session.tx,
        &ServerFrame::PartnerMood {
            mood: partner.current_mood.as_ref().map(Into::into),
            is_online: state.presence().is_online(partner_id),
            last_seen: partner.last_seen.map(format_system_time),
        },
    );
    Ok(())
}

async fn handle_scribble_send(
    state: &SharedState,
    session: &Session,
    paths: serde_json::Value,
) -> Result<(), ScopedError> {
    if !paths.as_array().is_some_and(|paths| !paths.is_empty()) {
        return Err(ScopedError::Scribble(ServiceError::InvalidInput(
            "scribble paths must be a non-empty array".into(),
        )));
    }

    let entry = state.presence().get(session.user_id);
    let partner_id = entry
        .as_ref()
        .and_then(|entry| entry.partner_id)
        .ok_or_else(|| {
            ScopedError::Scribble(ServiceError::InvalidInput("no partner paired".into()))
        })?;
    let user_name = entry.map(|entry| entry.display_name).unwrap_or_default();

    // Stored on the recipient's record first, so an offline partner still
    // gets the drawing on their next request.
    let note = ScribbleNote {
        from_user_id: session.user_id,
        from_user_name: user_name.clone(),
        paths,
        received_at: SystemTime::now(),
    };
    state
        .require_store()
        .await
        .map_err(ScopedError::Scribble)?
        .set_last_scribble(partner_id, note.clone())
        .await
        .map_err(|err| ScopedError::Scribble(err.into()))?;

    if let Some(channel) = couple_channel_for(session.user_id, Some(partner_id)) {
        state.channels().emit_to_channel(
            &channel,
            &ServerFrame::ScribbleReceived {
                scribble: ScribbleSummary::from(&note),
            },
            Some(session.user_id),
        );
    }
    notify_user(
        state.push(),
        partner_id,
        "New scribble",
        format!("{user_name} sent you a scribble!"),
        json!({ "kind": "scribble" }),
    );

    send_frame(
        &session.tx,
        &ServerFrame::ScribbleSent {
            delivered: state.presence().is_online(partner_id),
        },
    );
    Ok(())
}

async fn handle_scribble_request(
    state: &SharedState,
    session: &Session,
) -> Result<(), ScopedError> {
    let user = state
        .require_store()
        .await
        .map_err(ScopedError::Scribble)?
        .find_user(session.user_id)
        .await
        .map_err(|err| ScopedError::Scribble(err.into()))?
        .ok_or_else(|| ScopedError::Scribble(ServiceError::NotFound("user not found".into())))?;

    send_frame(
        &session.tx,
        &ServerFrame::PartnerScribble {
            scribble: user.last_scribble.as_ref().map(Into::into),
        },
    );
    Ok(())
}

async fn handle_tictactoe_join(
    state: &SharedState,
    session: &Session,
    game_id: Uuid,
) -> Result<(), ScopedError> {
    let game = tictactoe_service::game_for_player(state, game_id, session.user_id)
        .await
        .map_err(ScopedError::TicTacToe)?;

    let channel = tictactoe_channel(game_id);
    state
        .channels()
        .join(&channel, session.user_id, session.tx.clone());
    send_frame(
        &session.tx,
        &ServerFrame::TicTacToeJoined {
            game: TicTacToeGameSummary::from(&game),
        },
    );
    state.channels().emit_to_channel(
        &channel,
        &ServerFrame::TicTacToePlayerJoined {
            game_id,
            user_id: session.user_id,
        },
        Some(session.user_id),
    );
    Ok(())
}

async fn handle_tictactoe_move(
    state: &SharedState,
    session: &Session,
    game_id: Uuid,
    position: usize,
) -> Result<(), ScopedError> {
    let (outcome, game) = tictactoe_service::make_move(state, game_id, session.user_id, position)
        .await
        .map_err(ScopedError::TicTacToe)?;

    // The service fan-out excludes the actor; echo the accepted move back.
    let symbol = game
        .move_history
        .last()
        .map(|record| record.symbol)
        .unwrap_or(game.creator_symbol);
    send_frame(
        &session.tx,
        &ServerFrame::TicTacToeMoveBroadcast {
            position,
            symbol,
            player_id: session.user_id,
            outcome: match outcome {
                MoveOutcome::Continue => "continue".to_owned(),
                MoveOutcome::Won => "won".to_owned(),
                MoveOutcome::Draw => "draw".to_owned(),
            },
            game: TicTacToeGameSummary::from(&game),
        },
    );
    Ok(())
}

async fn handle_tictactoe_new_game(
    state: &SharedState,
    session: &Session,
    symbol: Symbol,
    first_move: Option<usize>,
) -> Result<(), ScopedError> {
    let partner_id = require_partner(state, session).map_err(ScopedError::TicTacToe)?;
    let outcome =
        tictactoe_service::create_game(state, session.user_id, partner_id, symbol, first_move)
            .await
            .map_err(ScopedError::TicTacToe)?;

    send_frame(
        &session.tx,
        &ServerFrame::TicTacToeNewGameBroadcast {
            game: TicTacToeGameSummary::from(outcome.as_inner()),
        },
    );
    Ok(())
}

async fn handle_wordle_join(
    state: &SharedState,
    session: &Session,
    game_id: Uuid,
) -> Result<(), ScopedError> {
    let game = wordle_service::game_for_player(state, game_id, session.user_id)
        .await
        .map_err(ScopedError::Wordle)?;

    state
        .channels()
        .join(&wordle_channel(game_id), session.user_id, session.tx.clone());
    send_frame(
        &session.tx,
        &ServerFrame::WordleJoined {
            game: WordleGameSummary::for_viewer(&game, session.user_id),
        },
    );
    Ok(())
}

async fn handle_wordle_guess(
    state: &SharedState,
    session: &Session,
    game_id: Uuid,
    word: &str,
) -> Result<(), ScopedError> {
    let (outcome, game) = wordle_service::submit_guess(state, game_id, session.user_id, word)
        .await
        .map_err(ScopedError::Wordle)?;

    send_frame(
        &session.tx,
        &ServerFrame::WordleGuessBroadcast {
            player_id: session.user_id,
            guess: GuessResponse::new(outcome, &game, session.user_id),
        },
    );
    Ok(())
}

async fn handle_wordle_new_game(
    state: &SharedState,
    session: &Session,
    word: &str,
) -> Result<(), ScopedError> {
    let partner_id = require_partner(state, session).map_err(ScopedError::Wordle)?;
    let outcome = wordle_service::create_game(state, session.user_id, partner_id, word)
        .await
        .map_err(ScopedError::Wordle)?;

    send_frame(
        &session.tx,
        &ServerFrame::WordleNewGameBroadcast {
            game: WordleGameSummary::for_viewer(outcome.as_inner(), session.user_id),
        },
    );
    Ok(())
}

async fn handle_chat_join(
    state: &SharedState,
    session: &Session,
    chat_id: Uuid,
) -> Result<(), ScopedError> {
    chat_service::thread_for_participant(state, chat_id, session.user_id)
        .await
        .map_err(ScopedError::Chat)?;

    let channel = chat_channel(chat_id);
    state
        .channels()
        .join(&channel, session.user_id, session.tx.clone());
    info!(
        user_id = %session.user_id,
        chat_id = %chat_id,
        members = state.channels().member_count(&channel),
        "chat room joined"
    );
    send_frame(&session.tx, &ServerFrame::ChatJoined { chat_id });
    state.channels().emit_to_channel(
        &channel,
        &ServerFrame::ChatUserJoined {
            chat_id,
            user_id: session.user_id,
        },
        Some(session.user_id),
    );
    Ok(())
}

async fn handle_chat_leave(
    state: &SharedState,
    session: &Session,
    chat_id: Uuid,
) -> Result<(), ScopedError> {
    let channel = chat_channel(chat_id);
    state.channels().leave(&channel, session.user_id);
    state.channels().emit_to_channel(
        &channel,
        &ServerFrame::ChatUserLeft {
            chat_id,
            user_id: session.user_id,
        },
        Some(session.user_id),
    );
    Ok(())
}

async fn handle_chat_message(
    state: &SharedState,
    session: &Session,
    chat_id: Uuid,
    content: &str,
    kind: Option<MessageKind>,
) -> Result<(), ScopedError> {
    let thread = chat_service::post_message(
        state,
        chat_id,
        session.user_id,
        content,
        kind.unwrap_or(MessageKind::Text),
    )
    .await
    .map_err(ScopedError::Chat)?;

    // The service fan-out excludes the sender; echo the stored message back.
    if let Some(message) = thread.messages.last() {
        send_frame(
            &session.tx,
            &ServerFrame::ChatNewMessage {
                chat_id,
                message: ChatMessageSummary::from(message),
            },
        );
    }
    Ok(())
}

async fn handle_chat_typing(
    state: &SharedState,
    session: &Session,
    chat_id: Uuid,
    is_typing: bool,
) -> Result<(), ScopedError> {
    // Ephemeral relay; membership of the room is the authorization.
    let channel = chat_channel(chat_id);
    if !state.channels().contains_user(&channel, session.user_id) {
        return Err(ScopedError::Chat(ServiceError::Forbidden(
            "join the chat before typing".into(),
        )));
    }
    state.channels().emit_to_channel(
        &channel,
        &ServerFrame::ChatTyping {
            chat_id,
            user_id: session.user_id,
            is_typing,
        },
        Some(session.user_id),
    );
    Ok(())
}

async fn handle_chat_read(
    state: &SharedState,
    session: &Session,
    chat_id: Uuid,
) -> Result<(), ScopedError> {
    chat_service::mark_read(state, chat_id, session.user_id)
        .await
        .map_err(ScopedError::Chat)?;
    Ok(())
}

async fn handle_chat_reaction(
    state: &SharedState,
    session: &Session,
    chat_id: Uuid,
    message_id: Uuid,
    emoji: &str,
) -> Result<(), ScopedError> {
    let reactions: Vec<ReactionSummary> =
        chat_service::toggle_reaction(state, chat_id, session.user_id, message_id, emoji)
            .await
            .map_err(ScopedError::Chat)?;

    send_frame(
        &session.tx,
        &ServerFrame::ChatReactionUpdate {
            chat_id,
            message_id,
            reactions,
        },
    );
    Ok(())
}

fn require_partner(state: &SharedState, session: &Session) -> Result<Uuid, ServiceError> {
    state
        .presence()
        .get(session.user_id)
        .and_then(|entry| entry.partner_id)
        .ok_or_else(|| ServiceError::InvalidInput("no partner paired".into()))
}

/// Serialize a frame and push it onto the connection's writer channel.
fn send_frame(tx: &mpsc::UnboundedSender<Message>, frame: &ServerFrame) {
    match serde_json::to_string(frame) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize server frame");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{memory::MemoryCoupleStore, models::UserEntity, store::CoupleStore},
        dto::chat::AnswerRequest,
        services::push::NoopPush,
        state::{
            AppState,
            chat::{AnswerKind, QuestionRef},
        },
    };

    fn user(id: Uuid, name: &str, partner_id: Uuid) -> UserEntity {
        UserEntity {
            id,
            name: name.into(),
            avatar: None,
            partner_id: Some(partner_id),
            is_online: false,
            last_seen: None,
            current_mood: None,
            last_scribble: None,
        }
    }

    async fn state_with_couple() -> (SharedState, MemoryCoupleStore, Uuid, Uuid) {
        let state = AppState::new(AppConfig::from_word_list("crane"), Arc::new(NoopPush));
        let store = MemoryCoupleStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        store.put_user(user(alice, "Alice", bob)).await;
        store.put_user(user(bob, "Bob", alice)).await;
        state.install_store(Arc::new(store.clone())).await;
        (state, store, alice, bob)
    }

    /// Drain every frame queued on a connection's writer channel.
    fn frames(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<serde_json::Value> {
        let mut drained = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                drained.push(serde_json::from_str(text.as_str()).unwrap());
            }
        }
        drained
    }

    #[tokio::test]
    async fn reconnect_clears_the_replaced_connection_memberships() {
        let (state, _store, alice, bob) = state_with_couple().await;
        let chat_id = Uuid::new_v4();

        // A connection whose socket died without running its cleanup.
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        state
            .presence()
            .register(alice, Some(bob), "Alice".into(), dead_tx.clone());
        state.channels().join(&chat_channel(chat_id), alice, dead_tx);

        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        open_session(&state, alice, &live_tx).await.unwrap();

        assert!(!state.channels().contains_user(&chat_channel(chat_id), alice));
        assert!(
            frames(&mut live_rx)
                .iter()
                .any(|frame| frame["type"] == "auth.ok")
        );
    }

    #[tokio::test]
    async fn message_after_reconnect_reaches_the_live_session() {
        let (state, _store, alice, bob) = state_with_couple().await;

        let thread = chat_service::record_answer(
            &state,
            AnswerRequest {
                user_id: bob,
                partner_id: alice,
                source_topic: "daily".into(),
                question_ref: QuestionRef::Freeform {
                    question_id: Uuid::new_v4(),
                },
                question_text: "Plans tonight?".into(),
                answer: "Cooking.".into(),
                answer_kind: AnswerKind::Text,
            },
        )
        .await
        .unwrap()
        .into_inner();

        // Alice's previous connection joined the chat room, then its socket
        // died and a reconnect replaced it before cleanup ran.
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        state
            .presence()
            .register(alice, Some(bob), "Alice".into(), dead_tx.clone());
        state.channels().join(&chat_channel(thread.id), alice, dead_tx);

        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        open_session(&state, alice, &live_tx).await.unwrap();
        frames(&mut live_rx);

        chat_service::post_message(&state, thread.id, bob, "home by six", MessageKind::Text)
            .await
            .unwrap();

        assert!(
            frames(&mut live_rx)
                .iter()
                .any(|frame| frame["type"] == "chat.notification")
        );
    }

    #[tokio::test]
    async fn mood_update_reaches_partner_and_persists() {
        let (state, store, alice, bob) = state_with_couple().await;

        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let alice_session = open_session(&state, alice, &alice_tx).await.unwrap();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        open_session(&state, bob, &bob_tx).await.unwrap();
        frames(&mut alice_rx);
        frames(&mut bob_rx);

        dispatch(
            &state,
            &alice_session,
            ClientFrame::MoodUpdate {
                emoji: "🌤️".into(),
                label: "hopeful".into(),
            },
        )
        .await;

        let received = frames(&mut bob_rx);
        let changed = received
            .iter()
            .find(|frame| frame["type"] == "mood.changed")
            .unwrap();
        assert_eq!(changed["mood"]["label"], "hopeful");

        let stored = store.find_user(alice).await.unwrap().unwrap();
        assert_eq!(stored.current_mood.unwrap().label, "hopeful");
        // No echo and no error lands on the sender.
        assert!(frames(&mut alice_rx).is_empty());
    }

    #[tokio::test]
    async fn scribble_waits_for_an_offline_partner() {
        let (state, _store, alice, bob) = state_with_couple().await;

        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let alice_session = open_session(&state, alice, &alice_tx).await.unwrap();
        frames(&mut alice_rx);

        let paths = json!([{"points": [1, 2, 3]}]);
        dispatch(
            &state,
            &alice_session,
            ClientFrame::ScribbleSend {
                paths: paths.clone(),
            },
        )
        .await;

        let sent = frames(&mut alice_rx);
        let ack = sent
            .iter()
            .find(|frame| frame["type"] == "scribble.sent")
            .unwrap();
        assert_eq!(ack["delivered"], false);

        // Bob connects later and asks for the drawing.
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        let bob_session = open_session(&state, bob, &bob_tx).await.unwrap();
        frames(&mut bob_rx);
        dispatch(&state, &bob_session, ClientFrame::ScribbleRequest).await;

        let received = frames(&mut bob_rx);
        let stored = received
            .iter()
            .find(|frame| frame["type"] == "scribble.partnerScribble")
            .unwrap();
        assert_eq!(stored["scribble"]["from_user_id"], json!(alice));
        assert_eq!(stored["scribble"]["paths"], paths);
    }

    #[tokio::test]
    async fn empty_scribble_is_rejected() {
        let (state, _store, alice, _bob) = state_with_couple().await;

        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let alice_session = open_session(&state, alice, &alice_tx).await.unwrap();
        frames(&mut alice_rx);

        dispatch(
            &state,
            &alice_session,
            ClientFrame::ScribbleSend { paths: json!([]) },
        )
        .await;

        assert!(
            frames(&mut alice_rx)
                .iter()
                .any(|frame| frame["type"] == "scribble.error")
        );
    }
}

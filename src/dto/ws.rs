//! WebSocket frame definitions.
//!
//! Frames are tagged JSON objects; the `type` field names the event. Error
//! frames are scoped to the feature that rejected the event so clients can
//! route them without parsing messages.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::{
        chat::{ChatMessageSummary, ReactionSummary, ThreadListItem},
        couple::{MoodSummary, ScribbleSummary},
        tictactoe::TicTacToeGameSummary,
        wordle::{GuessResponse, WordleGameSummary},
    },
    state::{chat::MessageKind, tictactoe::Symbol},
};

/// Messages accepted from realtime clients.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// First frame of every connection; identifies the user.
    #[serde(rename = "auth")]
    Auth { user_id: Uuid },
    /// Ask for the partner's current presence.
    #[serde(rename = "presence.statusRequest")]
    PresenceStatusRequest,
    /// Share a new mood with the partner.
    #[serde(rename = "mood.update")]
    MoodUpdate { emoji: String, label: String },
    /// Ask for the partner's current mood.
    #[serde(rename = "mood.request")]
    MoodRequest,
    /// Send a drawing to the partner.
    #[serde(rename = "scribble.send")]
    ScribbleSend {
        #[schema(value_type = Object)]
        paths: serde_json::Value,
    },
    /// Ask for the latest drawing the partner sent, typically on connect.
    #[serde(rename = "scribble.request")]
    ScribbleRequest,
    /// Subscribe to a TicTacToe game room.
    #[serde(rename = "tictactoe.join")]
    TicTacToeJoin { game_id: Uuid },
    /// Play one move.
    #[serde(rename = "tictactoe.move")]
    TicTacToeMove { game_id: Uuid, position: usize },
    /// Start a fresh game against the partner.
    #[serde(rename = "tictactoe.newGame")]
    TicTacToeNewGame {
        symbol: Symbol,
        #[serde(default)]
        first_move: Option<usize>,
    },
    /// Subscribe to a Wordle game room.
    #[serde(rename = "wordle.join")]
    WordleJoin { game_id: Uuid },
    /// Submit one guess.
    #[serde(rename = "wordle.guess")]
    WordleGuess { game_id: Uuid, word: String },
    /// Start a fresh word game; the partner becomes the guesser.
    #[serde(rename = "wordle.newGame")]
    WordleNewGame { word: String },
    /// Subscribe to a chat thread room.
    #[serde(rename = "chat.join")]
    ChatJoin { chat_id: Uuid },
    /// Leave a chat thread room.
    #[serde(rename = "chat.leave")]
    ChatLeave { chat_id: Uuid },
    /// Post a message to a joined thread.
    #[serde(rename = "chat.message")]
    ChatMessage {
        chat_id: Uuid,
        content: String,
        #[serde(default)]
        kind: Option<MessageKind>,
    },
    /// Relay a typing indicator to the partner.
    #[serde(rename = "chat.typing")]
    ChatTyping { chat_id: Uuid, is_typing: bool },
    /// Mark the thread read.
    #[serde(rename = "chat.read")]
    ChatRead { chat_id: Uuid },
    /// Toggle an emoji reaction on one message.
    #[serde(rename = "chat.reaction")]
    ChatReaction {
        chat_id: Uuid,
        message_id: Uuid,
        emoji: String,
    },
    /// Any frame type this server version does not recognize.
    #[serde(other)]
    Unknown,
}

/// Messages pushed to realtime clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Positive acknowledgement of the auth frame.
    #[serde(rename = "auth.ok")]
    AuthOk { user_id: Uuid },
    /// Auth rejection; the connection closes afterwards.
    #[serde(rename = "auth.error")]
    AuthError { message: String },
    /// The partner came online.
    #[serde(rename = "presence.online")]
    PresenceOnline {
        user_id: Uuid,
        user_name: String,
        timestamp: String,
    },
    /// The partner went offline.
    #[serde(rename = "presence.offline")]
    PresenceOffline { user_id: Uuid, last_seen: String },
    /// Answer to `presence.statusRequest`.
    #[serde(rename = "presence.status")]
    PresenceStatus {
        partner_id: Uuid,
        is_online: bool,
        last_seen: Option<String>,
    },
    /// A rejected presence event.
    #[serde(rename = "presence.error")]
    PresenceError { message: String },
    /// The partner shared a new mood.
    #[serde(rename = "mood.changed")]
    MoodChanged {
        user_id: Uuid,
        user_name: String,
        mood: MoodSummary,
    },
    /// Answer to `mood.request`.
    #[serde(rename = "mood.partnerMood")]
    PartnerMood {
        mood: Option<MoodSummary>,
        is_online: bool,
        last_seen: Option<String>,
    },
    /// A rejected mood event.
    #[serde(rename = "mood.error")]
    MoodError { message: String },
    /// A drawing from the partner, relayed live.
    #[serde(rename = "scribble.received")]
    ScribbleReceived { scribble: ScribbleSummary },
    /// Acknowledgement of `scribble.send`; `delivered` is false when the
    /// partner was offline and will see the drawing on their next request.
    #[serde(rename = "scribble.sent")]
    ScribbleSent { delivered: bool },
    /// Answer to `scribble.request`.
    #[serde(rename = "scribble.partnerScribble")]
    PartnerScribble { scribble: Option<ScribbleSummary> },
    /// A rejected scribble event.
    #[serde(rename = "scribble.error")]
    ScribbleError { message: String },
    /// Game snapshot sent to the joiner.
    #[serde(rename = "tictactoe.joined")]
    TicTacToeJoined { game: TicTacToeGameSummary },
    /// The other player entered the game room.
    #[serde(rename = "tictactoe.playerJoined")]
    TicTacToePlayerJoined { game_id: Uuid, user_id: Uuid },
    /// An accepted move, fanned out to the game room.
    #[serde(rename = "tictactoe.moveBroadcast")]
    TicTacToeMoveBroadcast {
        position: usize,
        symbol: Symbol,
        player_id: Uuid,
        outcome: String,
        game: TicTacToeGameSummary,
    },
    /// Terminal transition of a board game.
    #[serde(rename = "tictactoe.gameComplete")]
    TicTacToeGameComplete {
        game_id: Uuid,
        winner_id: Option<Uuid>,
        outcome: String,
    },
    /// A fresh game, fanned out to the couple channel.
    #[serde(rename = "tictactoe.newGameBroadcast")]
    TicTacToeNewGameBroadcast { game: TicTacToeGameSummary },
    /// A rejected tictactoe event.
    #[serde(rename = "tictactoe.error")]
    TicTacToeError { message: String },
    /// Game snapshot sent to the joiner, secret redacted per viewer.
    #[serde(rename = "wordle.joined")]
    WordleJoined { game: WordleGameSummary },
    /// An accepted guess, fanned out to the game room.
    #[serde(rename = "wordle.guessBroadcast")]
    WordleGuessBroadcast {
        player_id: Uuid,
        guess: GuessResponse,
    },
    /// Terminal transition of a word game.
    #[serde(rename = "wordle.gameComplete")]
    WordleGameComplete {
        game_id: Uuid,
        winner_id: Option<Uuid>,
        secret_word: String,
    },
    /// A fresh word game, fanned out to the couple channel.
    #[serde(rename = "wordle.newGameBroadcast")]
    WordleNewGameBroadcast { game: WordleGameSummary },
    /// A rejected wordle event.
    #[serde(rename = "wordle.error")]
    WordleError { message: String },
    /// Membership acknowledgement for a chat room.
    #[serde(rename = "chat.joined")]
    ChatJoined { chat_id: Uuid },
    /// The partner entered the chat room.
    #[serde(rename = "chat.userJoined")]
    ChatUserJoined { chat_id: Uuid, user_id: Uuid },
    /// The partner left the chat room.
    #[serde(rename = "chat.userLeft")]
    ChatUserLeft { chat_id: Uuid, user_id: Uuid },
    /// A persisted message, fanned out to the chat room.
    #[serde(rename = "chat.newMessage")]
    ChatNewMessage {
        chat_id: Uuid,
        message: ChatMessageSummary,
    },
    /// Typing indicator relay.
    #[serde(rename = "chat.typing")]
    ChatTyping {
        chat_id: Uuid,
        user_id: Uuid,
        is_typing: bool,
    },
    /// Read receipt after a partner marked the thread read.
    #[serde(rename = "chat.readReceipt")]
    ChatReadReceipt {
        chat_id: Uuid,
        read_by: Uuid,
        read_at: String,
    },
    /// Updated reaction set of one message.
    #[serde(rename = "chat.reactionUpdate")]
    ChatReactionUpdate {
        chat_id: Uuid,
        message_id: Uuid,
        reactions: Vec<ReactionSummary>,
    },
    /// Thread activity notice for users not joined to the chat room.
    #[serde(rename = "chat.notification")]
    ChatNotification { thread: ThreadListItem },
    /// A rejected chat event.
    #[serde(rename = "chat.error")]
    ChatError { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_frame_round_trips() {
        let user_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"auth","user_id":"{user_id}"}}"#);
        let frame: ClientFrame = serde_json::from_str(&raw).unwrap();
        assert!(matches!(frame, ClientFrame::Auth { user_id: id } if id == user_id));
    }

    #[test]
    fn unrecognized_type_parses_as_unknown() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"jigsaw.shuffle"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Unknown));
    }

    #[test]
    fn server_frames_carry_scoped_type_tags() {
        let frame = ServerFrame::ChatError {
            message: "not a participant".into(),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "chat.error");
        assert_eq!(value["message"], "not a participant");
    }

    #[test]
    fn presence_status_serializes_optional_last_seen() {
        let partner_id = Uuid::new_v4();
        let frame = ServerFrame::PresenceStatus {
            partner_id,
            is_online: true,
            last_seen: None,
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "presence.status");
        assert_eq!(value["is_online"], true);
        assert!(value["last_seen"].is_null());
    }
}

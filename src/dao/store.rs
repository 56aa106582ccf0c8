use std::time::SystemTime;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::{
        models::{AnswerSeed, CreateOutcome, MoodEntry, ScribbleNote, UserEntity},
        storage::StorageResult,
    },
    state::{
        chat::{ChatMessage, ChatThread},
        tictactoe::TicTacToeGame,
        wordle::WordleGame,
    },
};

/// Abstraction over the persistence layer for users, games, and chat threads.
///
/// Backends must provide two atomic primitives the services rely on:
/// create-if-no-active-game per couple key, and find-or-create per
/// `(couple_key, question_ref)` for chat threads. Neither may be emulated
/// with a non-atomic read-then-write.
pub trait CoupleStore: Send + Sync {
    /// Look up a user by id.
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>>;
    /// Persist the durable presence mirror for a user.
    fn set_user_presence(
        &self,
        id: Uuid,
        is_online: bool,
        last_seen: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist the user's shared mood. A missing user is a no-op.
    fn set_user_mood(&self, id: Uuid, mood: MoodEntry) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist the latest scribble received by `recipient_id`, replacing any
    /// earlier one. A missing recipient is a no-op.
    fn set_last_scribble(
        &self,
        recipient_id: Uuid,
        scribble: ScribbleNote,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Store `game` unless a non-terminal TicTacToe game already exists for
    /// its couple key; the existing game is returned in that case.
    fn create_tictactoe_if_no_active(
        &self,
        game: TicTacToeGame,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<TicTacToeGame>>>;
    /// Look up a TicTacToe game by id.
    fn find_tictactoe(&self, id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<TicTacToeGame>>>;
    /// The current non-terminal TicTacToe game involving `user_id`, if any.
    fn find_active_tictactoe(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TicTacToeGame>>>;
    /// Persist the full state of a TicTacToe game.
    fn save_tictactoe(&self, game: TicTacToeGame) -> BoxFuture<'static, StorageResult<()>>;
    /// Terminal TicTacToe games involving `user_id`, most recent first.
    fn list_finished_tictactoe(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<TicTacToeGame>>>;

    /// Store `game` unless a non-terminal Wordle game already exists for its
    /// couple key; the existing game is returned in that case.
    fn create_wordle_if_no_active(
        &self,
        game: WordleGame,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<WordleGame>>>;
    /// Look up a Wordle game by id.
    fn find_wordle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<WordleGame>>>;
    /// The current non-terminal Wordle game involving `user_id`, if any.
    fn find_active_wordle(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WordleGame>>>;
    /// Persist the full state of a Wordle game.
    fn save_wordle(&self, game: WordleGame) -> BoxFuture<'static, StorageResult<()>>;
    /// Terminal Wordle games involving `user_id`, most recent first.
    fn list_finished_wordle(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<WordleGame>>>;

    /// Atomically find the thread for the seed's `(couple_key,
    /// question_ref)` and append the answer, or create the thread seeded
    /// with it. Safe under concurrent first answers from both partners.
    fn record_answer(
        &self,
        seed: AnswerSeed,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<ChatThread>>>;
    /// Look up a chat thread by id.
    fn find_thread(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ChatThread>>>;
    /// Append a validated message to the thread, bumping `recipient_id`'s
    /// unread counter and refreshing preview metadata. Must use an in-place
    /// append so concurrent posts cannot overwrite each other. Returns the
    /// updated thread, or `None` when it no longer exists.
    fn append_message(
        &self,
        thread_id: Uuid,
        message: ChatMessage,
        recipient_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ChatThread>>>;
    /// Persist the full state of a chat thread.
    fn save_thread(&self, thread: ChatThread) -> BoxFuture<'static, StorageResult<()>>;
    /// Active threads the user participates in, latest activity first.
    fn list_threads_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatThread>>>;

    /// Verify the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}

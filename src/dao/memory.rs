//! In-memory `CoupleStore` backend.
//!
//! Every operation runs under a single async mutex, which makes the two
//! atomic primitives (create-if-no-active, record-answer) trivially
//! race-free. Used by tests and as the storage seam for single-process runs.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    dao::{
        models::{AnswerSeed, CreateOutcome, MoodEntry, ScribbleNote, UserEntity},
        storage::StorageResult,
        store::CoupleStore,
    },
    state::{
        chat::{ChatMessage, ChatThread, ThreadStatus},
        tictactoe::TicTacToeGame,
        wordle::WordleGame,
    },
};

#[derive(Default)]
struct MemoryInner {
    users: HashMap<Uuid, UserEntity>,
    tictactoe: HashMap<Uuid, TicTacToeGame>,
    wordle: HashMap<Uuid, WordleGame>,
    threads: HashMap<Uuid, ChatThread>,
}

/// Process-local store backed by hash maps.
#[derive(Clone, Default)]
pub struct MemoryCoupleStore {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryCoupleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record. Test/bootstrap helper.
    pub async fn put_user(&self, user: UserEntity) {
        self.inner.lock().await.users.insert(user.id, user);
    }
}

impl CoupleStore for MemoryCoupleStore {
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.users.get(&id).cloned()) })
    }

    fn set_user_presence(
        &self,
        id: Uuid,
        is_online: bool,
        last_seen: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(user) = inner.lock().await.users.get_mut(&id) {
                user.is_online = is_online;
                user.last_seen = Some(last_seen);
            }
            Ok(())
        })
    }

    fn set_user_mood(&self, id: Uuid, mood: MoodEntry) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(user) = inner.lock().await.users.get_mut(&id) {
                user.current_mood = Some(mood);
            }
            Ok(())
        })
    }

    fn set_last_scribble(
        &self,
        recipient_id: Uuid,
        scribble: ScribbleNote,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            if let Some(user) = inner.lock().await.users.get_mut(&recipient_id) {
                user.last_scribble = Some(scribble);
            }
            Ok(())
        })
    }

    fn create_tictactoe_if_no_active(
        &self,
        game: TicTacToeGame,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<TicTacToeGame>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            if let Some(existing) = guard
                .tictactoe
                .values()
                .find(|candidate| {
                    candidate.couple_key == game.couple_key && !candidate.status.is_terminal()
                })
                .cloned()
            {
                return Ok(CreateOutcome::Existing(existing));
            }
            guard.tictactoe.insert(game.id, game.clone());
            Ok(CreateOutcome::Created(game))
        })
    }

    fn find_tictactoe(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TicTacToeGame>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.tictactoe.get(&id).cloned()) })
    }

    fn find_active_tictactoe(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TicTacToeGame>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .lock()
                .await
                .tictactoe
                .values()
                .find(|game| game.is_player(user_id) && !game.status.is_terminal())
                .cloned())
        })
    }

    fn save_tictactoe(&self, game: TicTacToeGame) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.lock().await.tictactoe.insert(game.id, game);
            Ok(())
        })
    }

    fn list_finished_tictactoe(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<TicTacToeGame>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().await;
            let mut games: Vec<TicTacToeGame> = guard
                .tictactoe
                .values()
                .filter(|game| game.is_player(user_id) && game.status.is_terminal())
                .cloned()
                .collect();
            games.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
            games.truncate(limit);
            Ok(games)
        })
    }

    fn create_wordle_if_no_active(
        &self,
        game: WordleGame,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<WordleGame>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            if let Some(existing) = guard
                .wordle
                .values()
                .find(|candidate| {
                    candidate.couple_key == game.couple_key && !candidate.status.is_terminal()
                })
                .cloned()
            {
                return Ok(CreateOutcome::Existing(existing));
            }
            guard.wordle.insert(game.id, game.clone());
            Ok(CreateOutcome::Created(game))
        })
    }

    fn find_wordle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<WordleGame>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.wordle.get(&id).cloned()) })
    }

    fn find_active_wordle(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WordleGame>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            Ok(inner
                .lock()
                .await
                .wordle
                .values()
                .find(|game| game.is_player(user_id) && !game.status.is_terminal())
                .cloned())
        })
    }

    fn save_wordle(&self, game: WordleGame) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.lock().await.wordle.insert(game.id, game);
            Ok(())
        })
    }

    fn list_finished_wordle(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<WordleGame>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().await;
            let mut games: Vec<WordleGame> = guard
                .wordle
                .values()
                .filter(|game| game.is_player(user_id) && game.status.is_terminal())
                .cloned()
                .collect();
            games.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
            games.truncate(limit);
            Ok(games)
        })
    }

    fn record_answer(
        &self,
        seed: AnswerSeed,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<ChatThread>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            let couple_key = crate::state::channels::couple_key(seed.user_id, seed.partner_id);

            if let Some(thread) = guard.threads.values_mut().find(|thread| {
                thread.couple_key == couple_key && thread.question_ref == seed.question_ref
            }) {
                thread.append_answer(seed.user_id, &seed.answer, seed.answer_kind);
                return Ok(CreateOutcome::Existing(thread.clone()));
            }

            let thread = ChatThread::new_for_question(
                seed.user_id,
                seed.partner_id,
                &seed.source_topic,
                seed.question_ref,
                &seed.question_text,
                &seed.answer,
                seed.answer_kind,
            );
            guard.threads.insert(thread.id, thread.clone());
            Ok(CreateOutcome::Created(thread))
        })
    }

    fn find_thread(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ChatThread>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.lock().await.threads.get(&id).cloned()) })
    }

    fn append_message(
        &self,
        thread_id: Uuid,
        message: ChatMessage,
        _recipient_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ChatThread>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut guard = inner.lock().await;
            let Some(thread) = guard.threads.get_mut(&thread_id) else {
                return Ok(None);
            };
            thread.push_message(message);
            Ok(Some(thread.clone()))
        })
    }

    fn save_thread(&self, thread: ChatThread) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.lock().await.threads.insert(thread.id, thread);
            Ok(())
        })
    }

    fn list_threads_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatThread>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.lock().await;
            let mut threads: Vec<ChatThread> = guard
                .threads
                .values()
                .filter(|thread| {
                    thread.is_participant(user_id) && thread.status == ThreadStatus::Active
                })
                .cloned()
                .collect();
            threads.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
            Ok(threads)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        chat::{AnswerKind, QuestionRef},
        tictactoe::Symbol,
    };

    #[tokio::test]
    async fn duplicate_active_game_returns_existing() {
        let store = MemoryCoupleStore::new();
        let creator = Uuid::new_v4();
        let partner = Uuid::new_v4();

        let first = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();
        let first_id = first.id;
        assert!(store
            .create_tictactoe_if_no_active(first)
            .await
            .unwrap()
            .was_created());

        // Partner tries to create from the mirrored perspective.
        let second = TicTacToeGame::new(partner, creator, Symbol::O, None).unwrap();
        let outcome = store.create_tictactoe_if_no_active(second).await.unwrap();
        assert!(!outcome.was_created());
        assert_eq!(outcome.into_inner().id, first_id);
    }

    #[tokio::test]
    async fn terminal_game_unblocks_new_creation() {
        let store = MemoryCoupleStore::new();
        let creator = Uuid::new_v4();
        let partner = Uuid::new_v4();

        let mut game = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();
        game.apply_move(creator, 0).unwrap();
        game.apply_move(partner, 3).unwrap();
        game.apply_move(creator, 1).unwrap();
        game.apply_move(partner, 4).unwrap();
        game.apply_move(creator, 2).unwrap();
        assert!(game.status.is_terminal());
        store
            .create_tictactoe_if_no_active(game)
            .await
            .unwrap();

        let fresh = TicTacToeGame::new(creator, partner, Symbol::X, None).unwrap();
        assert!(store
            .create_tictactoe_if_no_active(fresh)
            .await
            .unwrap()
            .was_created());
    }

    #[tokio::test]
    async fn concurrent_first_answers_share_one_thread() {
        let store = MemoryCoupleStore::new();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let question_ref = QuestionRef::Freeform {
            question_id: Uuid::new_v4(),
        };

        let seed = |user: Uuid, partner: Uuid, answer: &str| AnswerSeed {
            user_id: user,
            partner_id: partner,
            source_topic: "future".into(),
            question_ref: question_ref.clone(),
            question_text: "Where next?".into(),
            answer: answer.into(),
            answer_kind: AnswerKind::Text,
        };

        let (left, right) = tokio::join!(
            store.record_answer(seed(user_a, user_b, "Rome")),
            store.record_answer(seed(user_b, user_a, "Lisbon")),
        );
        let left = left.unwrap().into_inner();
        let right = right.unwrap().into_inner();

        assert_eq!(left.id, right.id);
        let thread = store.find_thread(left.id).await.unwrap().unwrap();
        assert_eq!(thread.message_count, 2);
        assert_eq!(store.list_threads_for_user(user_a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn presence_mirror_updates_user_record() {
        let store = MemoryCoupleStore::new();
        let user = UserEntity {
            id: Uuid::new_v4(),
            name: "Ann".into(),
            avatar: None,
            partner_id: None,
            is_online: false,
            last_seen: None,
            current_mood: None,
            last_scribble: None,
        };
        let id = user.id;
        store.put_user(user).await;

        store
            .set_user_presence(id, true, SystemTime::now())
            .await
            .unwrap();
        let stored = store.find_user(id).await.unwrap().unwrap();
        assert!(stored.is_online);
        assert!(stored.last_seen.is_some());
    }
}

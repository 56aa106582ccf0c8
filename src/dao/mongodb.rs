//! MongoDB-backed [`CoupleStore`].
//!
//! Documents mirror the domain entities, converting ids and top-level
//! timestamps to native BSON types. The two race-sensitive operations lean
//! on unique indexes: a partial unique index on `(couple_key, active)` per
//! game collection, and a unique `(couple_key, question_key)` index on chat
//! threads with duplicate-key inserts converted into append-to-existing.

use std::time::SystemTime;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, Uuid as BsonUuid, doc, serialize_to_bson},
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{IndexOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dao::{
        models::{AnswerSeed, CreateOutcome, MoodEntry, ScribbleNote, UserEntity},
        storage::{StorageError, StorageResult},
        store::CoupleStore,
    },
    state::{
        channels::couple_key,
        chat::{self, ChatMessage, ChatThread, QuestionRef, ThreadStatus},
        tictactoe::{MoveRecord, Symbol, TicTacToeGame, TicTacToeStatus, Turn},
        wordle::{GuessRecord, WordleGame, WordleStatus},
    },
};

const USER_COLLECTION: &str = "users";
const TICTACTOE_COLLECTION: &str = "tictactoe_games";
const WORDLE_COLLECTION: &str = "wordle_games";
const THREAD_COLLECTION: &str = "chat_threads";

/// Result alias for MongoDB operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Errors raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// The offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Client construction failed.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The health-check ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index bootstrap failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection the index belongs to.
        collection: &'static str,
        /// Index key description.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A read or write against a collection failed.
    #[error("{operation} failed on `{collection}`")]
    Operation {
        /// What was being attempted.
        operation: &'static str,
        /// Target collection.
        collection: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A value could not be converted to BSON.
    #[error("failed to encode value for `{collection}`")]
    Encode {
        /// Target collection.
        collection: &'static str,
        /// Serializer error.
        #[source]
        source: mongodb::bson::error::Error,
    },
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// MongoDB implementation of [`CoupleStore`].
#[derive(Clone)]
pub struct MongoCoupleStore {
    database: Database,
}

impl MongoCoupleStore {
    /// Connect to MongoDB, verify connectivity, and ensure indexes.
    pub async fn connect(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let options = mongodb::options::ClientOptions::parse(uri).await.map_err(
            |source| MongoDaoError::InvalidUri {
                uri: uri.to_owned(),
                source,
            },
        )?;
        let client =
            Client::with_options(options).map_err(|source| MongoDaoError::ClientConstruction {
                source,
            })?;
        let database = client.database(db_name.unwrap_or("pairlink"));

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;

        let store = Self { database };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        for collection_name in [TICTACTOE_COLLECTION, WORDLE_COLLECTION] {
            let collection = self.database.collection::<Document>(collection_name);
            // At most one non-terminal game per couple; the insert loser gets
            // a duplicate-key error and returns the winner's game.
            let index = IndexModel::builder()
                .keys(doc! {"couple_key": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some("active_couple_idx".to_owned()))
                        .unique(Some(true))
                        .partial_filter_expression(Some(doc! {"active": true}))
                        .build(),
                )
                .build();
            collection
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: collection_name,
                    index: "couple_key(active)",
                    source,
                })?;
        }

        let threads = self.database.collection::<Document>(THREAD_COLLECTION);
        let index = IndexModel::builder()
            .keys(doc! {"couple_key": 1, "question_key": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("couple_question_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        threads
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: THREAD_COLLECTION,
                index: "couple_key,question_key",
                source,
            })?;

        Ok(())
    }

    fn users(&self) -> Collection<UserDocument> {
        self.database.collection::<UserDocument>(USER_COLLECTION)
    }

    fn tictactoe(&self) -> Collection<TicTacToeDocument> {
        self.database
            .collection::<TicTacToeDocument>(TICTACTOE_COLLECTION)
    }

    fn wordle(&self) -> Collection<WordleDocument> {
        self.database.collection::<WordleDocument>(WORDLE_COLLECTION)
    }

    fn threads(&self) -> Collection<ChatThreadDocument> {
        self.database
            .collection::<ChatThreadDocument>(THREAD_COLLECTION)
    }

    /// Append an answer message to the existing thread for the seed's key,
    /// if one exists, using update operators so concurrent appends cannot
    /// lose each other.
    async fn append_answer_to_existing(
        &self,
        seed: &AnswerSeed,
        key: &str,
    ) -> MongoResult<Option<ChatThread>> {
        let message = ChatMessage::answer(seed.user_id, &seed.answer, seed.answer_kind);
        let preview = chat::preview_of(&message);
        let message_bson = serialize_to_bson(&message).map_err(|source| MongoDaoError::Encode {
            collection: THREAD_COLLECTION,
            source,
        })?;

        // partner1 is the lexicographically smaller id; the sender's
        // counterpart takes the unread bump.
        let unread_field = if seed.user_id < seed.partner_id {
            "partner2_unread"
        } else {
            "partner1_unread"
        };

        let updated = self
            .threads()
            .find_one_and_update(
                doc! {
                    "couple_key": couple_key(seed.user_id, seed.partner_id),
                    "question_key": key,
                },
                doc! {
                    "$push": {"messages": message_bson},
                    "$set": {
                        "last_message_at": DateTime::from_system_time(message.created_at),
                        "last_message_preview": preview,
                    },
                    "$inc": {"message_count": 1, unread_field: 1},
                },
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Operation {
                operation: "append answer",
                collection: THREAD_COLLECTION,
                source,
            })?;

        Ok(updated.map(Into::into))
    }
}

/// Whether the driver error is a duplicate-key write rejection.
fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}

/// Ids are stored and queried as BSON Binary subtype 4; the document structs
/// and every filter must go through these conversions so the two
/// representations stay identical.
fn bson_uuid(id: Uuid) -> BsonUuid {
    BsonUuid::from_bytes(id.into_bytes())
}

fn domain_uuid(id: BsonUuid) -> Uuid {
    Uuid::from_bytes(id.bytes())
}

fn doc_id(id: Uuid) -> Document {
    doc! {"_id": bson_uuid(id)}
}

fn player_filter(user_id: Uuid) -> Document {
    doc! {"$or": [
        {"creator_id": bson_uuid(user_id)},
        {"partner_id": bson_uuid(user_id)},
    ]}
}

impl CoupleStore for MongoCoupleStore {
    fn find_user(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<UserEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .users()
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "load user",
                    collection: USER_COLLECTION,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn set_user_presence(
        &self,
        id: Uuid,
        is_online: bool,
        last_seen: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .users()
                .update_one(
                    doc_id(id),
                    doc! {"$set": {
                        "is_online": is_online,
                        "last_seen": DateTime::from_system_time(last_seen),
                    }},
                )
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "update presence",
                    collection: USER_COLLECTION,
                    source,
                })?;
            Ok(())
        })
    }

    fn set_user_mood(&self, id: Uuid, mood: MoodEntry) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mood_bson = serialize_to_bson(&mood).map_err(|source| MongoDaoError::Encode {
                collection: USER_COLLECTION,
                source,
            })?;
            store
                .users()
                .update_one(doc_id(id), doc! {"$set": {"current_mood": mood_bson}})
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "update mood",
                    collection: USER_COLLECTION,
                    source,
                })?;
            Ok(())
        })
    }

    fn set_last_scribble(
        &self,
        recipient_id: Uuid,
        scribble: ScribbleNote,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let scribble_bson =
                serialize_to_bson(&scribble).map_err(|source| MongoDaoError::Encode {
                    collection: USER_COLLECTION,
                    source,
                })?;
            store
                .users()
                .update_one(
                    doc_id(recipient_id),
                    doc! {"$set": {"last_scribble": scribble_bson}},
                )
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "update scribble",
                    collection: USER_COLLECTION,
                    source,
                })?;
            Ok(())
        })
    }

    fn create_tictactoe_if_no_active(
        &self,
        game: TicTacToeGame,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<TicTacToeGame>>> {
        let store = self.clone();
        Box::pin(async move {
            let document: TicTacToeDocument = game.clone().into();
            match store.tictactoe().insert_one(&document).await {
                Ok(_) => Ok(CreateOutcome::Created(game)),
                Err(err) if is_duplicate_key(&err) => {
                    let existing = store
                        .tictactoe()
                        .find_one(doc! {"couple_key": &game.couple_key, "active": true})
                        .await
                        .map_err(|source| MongoDaoError::Operation {
                            operation: "load conflicting game",
                            collection: TICTACTOE_COLLECTION,
                            source,
                        })?;
                    match existing {
                        Some(existing) => Ok(CreateOutcome::Existing(existing.into())),
                        // The winner finished between our insert and lookup;
                        // surface the original rejection.
                        None => Err(MongoDaoError::Operation {
                            operation: "create game",
                            collection: TICTACTOE_COLLECTION,
                            source: err,
                        }
                        .into()),
                    }
                }
                Err(source) => Err(MongoDaoError::Operation {
                    operation: "create game",
                    collection: TICTACTOE_COLLECTION,
                    source,
                }
                .into()),
            }
        })
    }

    fn find_tictactoe(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TicTacToeGame>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .tictactoe()
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "load game",
                    collection: TICTACTOE_COLLECTION,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn find_active_tictactoe(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<TicTacToeGame>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = player_filter(user_id);
            filter.insert("active", true);
            let document = store
                .tictactoe()
                .find_one(filter)
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "load active game",
                    collection: TICTACTOE_COLLECTION,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn save_tictactoe(&self, game: TicTacToeGame) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = game.id;
            let document: TicTacToeDocument = game.into();
            store
                .tictactoe()
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "save game",
                    collection: TICTACTOE_COLLECTION,
                    source,
                })?;
            Ok(())
        })
    }

    fn list_finished_tictactoe(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<TicTacToeGame>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = player_filter(user_id);
            filter.insert("active", false);
            let documents: Vec<TicTacToeDocument> = store
                .tictactoe()
                .find(filter)
                .sort(doc! {"completed_at": -1})
                .limit(limit as i64)
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "list finished games",
                    collection: TICTACTOE_COLLECTION,
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "list finished games",
                    collection: TICTACTOE_COLLECTION,
                    source,
                })?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn create_wordle_if_no_active(
        &self,
        game: WordleGame,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<WordleGame>>> {
        let store = self.clone();
        Box::pin(async move {
            let document: WordleDocument = game.clone().into();
            match store.wordle().insert_one(&document).await {
                Ok(_) => Ok(CreateOutcome::Created(game)),
                Err(err) if is_duplicate_key(&err) => {
                    let existing = store
                        .wordle()
                        .find_one(doc! {"couple_key": &game.couple_key, "active": true})
                        .await
                        .map_err(|source| MongoDaoError::Operation {
                            operation: "load conflicting game",
                            collection: WORDLE_COLLECTION,
                            source,
                        })?;
                    match existing {
                        Some(existing) => Ok(CreateOutcome::Existing(existing.into())),
                        None => Err(MongoDaoError::Operation {
                            operation: "create game",
                            collection: WORDLE_COLLECTION,
                            source: err,
                        }
                        .into()),
                    }
                }
                Err(source) => Err(MongoDaoError::Operation {
                    operation: "create game",
                    collection: WORDLE_COLLECTION,
                    source,
                }
                .into()),
            }
        })
    }

    fn find_wordle(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<WordleGame>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .wordle()
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "load game",
                    collection: WORDLE_COLLECTION,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn find_active_wordle(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WordleGame>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = player_filter(user_id);
            filter.insert("active", true);
            let document = store
                .wordle()
                .find_one(filter)
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "load active game",
                    collection: WORDLE_COLLECTION,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn save_wordle(&self, game: WordleGame) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = game.id;
            let document: WordleDocument = game.into();
            store
                .wordle()
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "save game",
                    collection: WORDLE_COLLECTION,
                    source,
                })?;
            Ok(())
        })
    }

    fn list_finished_wordle(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<WordleGame>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut filter = player_filter(user_id);
            filter.insert("active", false);
            let documents: Vec<WordleDocument> = store
                .wordle()
                .find(filter)
                .sort(doc! {"completed_at": -1})
                .limit(limit as i64)
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "list finished games",
                    collection: WORDLE_COLLECTION,
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "list finished games",
                    collection: WORDLE_COLLECTION,
                    source,
                })?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn record_answer(
        &self,
        seed: AnswerSeed,
    ) -> BoxFuture<'static, StorageResult<CreateOutcome<ChatThread>>> {
        let store = self.clone();
        Box::pin(async move {
            let key = seed.question_ref.storage_key();

            if let Some(thread) = store.append_answer_to_existing(&seed, &key).await? {
                return Ok(CreateOutcome::Existing(thread));
            }

            let thread = ChatThread::new_for_question(
                seed.user_id,
                seed.partner_id,
                &seed.source_topic,
                seed.question_ref.clone(),
                &seed.question_text,
                &seed.answer,
                seed.answer_kind,
            );
            let document: ChatThreadDocument = thread.clone().into();
            match store.threads().insert_one(&document).await {
                Ok(_) => Ok(CreateOutcome::Created(thread)),
                Err(err) if is_duplicate_key(&err) => {
                    // Lost the creation race; the partner's thread exists now.
                    warn!(couple_key = %thread.couple_key, "thread creation raced, appending instead");
                    match store.append_answer_to_existing(&seed, &key).await? {
                        Some(existing) => Ok(CreateOutcome::Existing(existing)),
                        None => Err(MongoDaoError::Operation {
                            operation: "create thread",
                            collection: THREAD_COLLECTION,
                            source: err,
                        }
                        .into()),
                    }
                }
                Err(source) => Err(MongoDaoError::Operation {
                    operation: "create thread",
                    collection: THREAD_COLLECTION,
                    source,
                }
                .into()),
            }
        })
    }

    fn find_thread(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ChatThread>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .threads()
                .find_one(doc_id(id))
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "load thread",
                    collection: THREAD_COLLECTION,
                    source,
                })?;
            Ok(document.map(Into::into))
        })
    }

    fn append_message(
        &self,
        thread_id: Uuid,
        message: ChatMessage,
        recipient_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ChatThread>>> {
        let store = self.clone();
        Box::pin(async move {
            let preview = chat::preview_of(&message);
            let message_bson =
                serialize_to_bson(&message).map_err(|source| MongoDaoError::Encode {
                    collection: THREAD_COLLECTION,
                    source,
                })?;
            // The recipient is partner1 exactly when their id is the smaller
            // of the pair.
            let unread_field = if recipient_id < message.sender_id {
                "partner1_unread"
            } else {
                "partner2_unread"
            };

            let updated = store
                .threads()
                .find_one_and_update(
                    doc_id(thread_id),
                    doc! {
                        "$push": {"messages": message_bson},
                        "$set": {
                            "last_message_at": DateTime::from_system_time(message.created_at),
                            "last_message_preview": preview,
                        },
                        "$inc": {"message_count": 1, unread_field: 1},
                    },
                )
                .return_document(ReturnDocument::After)
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "append message",
                    collection: THREAD_COLLECTION,
                    source,
                })?;

            Ok(updated.map(Into::into))
        })
    }

    fn save_thread(&self, thread: ChatThread) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = thread.id;
            let document: ChatThreadDocument = thread.into();
            store
                .threads()
                .replace_one(doc_id(id), &document)
                .upsert(true)
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "save thread",
                    collection: THREAD_COLLECTION,
                    source,
                })?;
            Ok(())
        })
    }

    fn list_threads_for_user(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ChatThread>>> {
        let store = self.clone();
        Box::pin(async move {
            let filter = doc! {
                "$or": [
                    {"partner1": bson_uuid(user_id)},
                    {"partner2": bson_uuid(user_id)},
                ],
                "status": "active",
            };
            let documents: Vec<ChatThreadDocument> = store
                .threads()
                .find(filter)
                .sort(doc! {"last_message_at": -1})
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "list threads",
                    collection: THREAD_COLLECTION,
                    source,
                })?
                .try_collect()
                .await
                .map_err(|source| MongoDaoError::Operation {
                    operation: "list threads",
                    collection: THREAD_COLLECTION,
                    source,
                })?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .database
                .run_command(doc! { "ping": 1 })
                .await
                .map_err(|source| MongoDaoError::HealthPing { source })?;
            Ok(())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: BsonUuid,
    name: String,
    avatar: Option<String>,
    partner_id: Option<BsonUuid>,
    #[serde(default)]
    is_online: bool,
    last_seen: Option<DateTime>,
    #[serde(default)]
    current_mood: Option<MoodEntry>,
    #[serde(default)]
    last_scribble: Option<ScribbleNote>,
}

impl From<UserDocument> for UserEntity {
    fn from(value: UserDocument) -> Self {
        Self {
            id: domain_uuid(value.id),
            name: value.name,
            avatar: value.avatar,
            partner_id: value.partner_id.map(domain_uuid),
            is_online: value.is_online,
            last_seen: value.last_seen.map(DateTime::to_system_time),
            current_mood: value.current_mood,
            last_scribble: value.last_scribble,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TicTacToeDocument {
    #[serde(rename = "_id")]
    id: BsonUuid,
    couple_key: String,
    /// Denormalized `!status.is_terminal()`; target of the partial unique
    /// index.
    active: bool,
    creator_id: BsonUuid,
    partner_id: BsonUuid,
    board: [Option<Symbol>; 9],
    current_turn: Turn,
    creator_symbol: Symbol,
    partner_symbol: Symbol,
    status: TicTacToeStatus,
    winner_id: Option<BsonUuid>,
    move_history: Vec<MoveRecord>,
    move_count: usize,
    created_at: DateTime,
    completed_at: Option<DateTime>,
}

impl From<TicTacToeGame> for TicTacToeDocument {
    fn from(value: TicTacToeGame) -> Self {
        Self {
            id: bson_uuid(value.id),
            couple_key: value.couple_key,
            active: !value.status.is_terminal(),
            creator_id: bson_uuid(value.creator_id),
            partner_id: bson_uuid(value.partner_id),
            board: value.board,
            current_turn: value.current_turn,
            creator_symbol: value.creator_symbol,
            partner_symbol: value.partner_symbol,
            status: value.status,
            winner_id: value.winner_id.map(bson_uuid),
            move_history: value.move_history,
            move_count: value.move_count,
            created_at: DateTime::from_system_time(value.created_at),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl From<TicTacToeDocument> for TicTacToeGame {
    fn from(value: TicTacToeDocument) -> Self {
        Self {
            id: domain_uuid(value.id),
            couple_key: value.couple_key,
            creator_id: domain_uuid(value.creator_id),
            partner_id: domain_uuid(value.partner_id),
            board: value.board,
            current_turn: value.current_turn,
            creator_symbol: value.creator_symbol,
            partner_symbol: value.partner_symbol,
            status: value.status,
            winner_id: value.winner_id.map(domain_uuid),
            move_history: value.move_history,
            move_count: value.move_count,
            created_at: value.created_at.to_system_time(),
            completed_at: value.completed_at.map(DateTime::to_system_time),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WordleDocument {
    #[serde(rename = "_id")]
    id: BsonUuid,
    couple_key: String,
    active: bool,
    creator_id: BsonUuid,
    partner_id: BsonUuid,
    secret_word: String,
    status: WordleStatus,
    guesses: Vec<GuessRecord>,
    max_attempts: usize,
    winner_id: Option<BsonUuid>,
    created_at: DateTime,
    completed_at: Option<DateTime>,
}

impl From<WordleGame> for WordleDocument {
    fn from(value: WordleGame) -> Self {
        Self {
            id: bson_uuid(value.id),
            couple_key: value.couple_key,
            active: !value.status.is_terminal(),
            creator_id: bson_uuid(value.creator_id),
            partner_id: bson_uuid(value.partner_id),
            secret_word: value.secret_word,
            status: value.status,
            guesses: value.guesses,
            max_attempts: value.max_attempts,
            winner_id: value.winner_id.map(bson_uuid),
            created_at: DateTime::from_system_time(value.created_at),
            completed_at: value.completed_at.map(DateTime::from_system_time),
        }
    }
}

impl From<WordleDocument> for WordleGame {
    fn from(value: WordleDocument) -> Self {
        Self {
            id: domain_uuid(value.id),
            couple_key: value.couple_key,
            creator_id: domain_uuid(value.creator_id),
            partner_id: domain_uuid(value.partner_id),
            secret_word: value.secret_word,
            status: value.status,
            guesses: value.guesses,
            max_attempts: value.max_attempts,
            winner_id: value.winner_id.map(domain_uuid),
            created_at: value.created_at.to_system_time(),
            completed_at: value.completed_at.map(DateTime::to_system_time),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatThreadDocument {
    #[serde(rename = "_id")]
    id: BsonUuid,
    couple_key: String,
    /// Stable string form of the question ref; part of the unique index.
    question_key: String,
    partner1: BsonUuid,
    partner2: BsonUuid,
    source_topic: String,
    question_ref: QuestionRef,
    question_text: String,
    status: ThreadStatus,
    messages: Vec<ChatMessage>,
    last_message_at: DateTime,
    last_message_preview: String,
    message_count: usize,
    partner1_unread: usize,
    partner2_unread: usize,
    created_at: DateTime,
}

impl From<ChatThread> for ChatThreadDocument {
    fn from(value: ChatThread) -> Self {
        Self {
            id: bson_uuid(value.id),
            couple_key: value.couple_key,
            question_key: value.question_ref.storage_key(),
            partner1: bson_uuid(value.partner1),
            partner2: bson_uuid(value.partner2),
            source_topic: value.source_topic,
            question_ref: value.question_ref,
            question_text: value.question_text,
            status: value.status,
            messages: value.messages,
            last_message_at: DateTime::from_system_time(value.last_message_at),
            last_message_preview: value.last_message_preview,
            message_count: value.message_count,
            partner1_unread: value.partner1_unread,
            partner2_unread: value.partner2_unread,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<ChatThreadDocument> for ChatThread {
    fn from(value: ChatThreadDocument) -> Self {
        Self {
            id: domain_uuid(value.id),
            couple_key: value.couple_key,
            partner1: domain_uuid(value.partner1),
            partner2: domain_uuid(value.partner2),
            source_topic: value.source_topic,
            question_ref: value.question_ref,
            question_text: value.question_text,
            status: value.status,
            messages: value.messages,
            last_message_at: value.last_message_at.to_system_time(),
            last_message_preview: value.last_message_preview,
            message_count: value.message_count,
            partner1_unread: value.partner1_unread,
            partner2_unread: value.partner2_unread,
            created_at: value.created_at.to_system_time(),
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::bson::{Bson, deserialize_from_document, serialize_to_document};

    use super::*;
    use crate::state::tictactoe::Symbol;

    #[test]
    fn stored_ids_use_the_same_binary_form_as_filters() {
        let game = TicTacToeGame::new(Uuid::new_v4(), Uuid::new_v4(), Symbol::X, None).unwrap();
        let document = serialize_to_document(&TicTacToeDocument::from(game.clone())).unwrap();

        // A lookup by id must hit the document the insert wrote.
        assert_eq!(document.get("_id"), doc_id(game.id).get("_id"));
        assert!(matches!(document.get("_id"), Some(Bson::Binary(_))));

        let filter = player_filter(game.creator_id);
        let arms = filter.get_array("$or").unwrap();
        assert_eq!(
            document.get("creator_id"),
            arms[0].as_document().unwrap().get("creator_id"),
        );
        assert_eq!(
            document.get("partner_id"),
            Some(&Bson::from(bson_uuid(game.partner_id))),
        );
    }

    #[test]
    fn game_documents_round_trip_their_ids() {
        let game = TicTacToeGame::new(Uuid::new_v4(), Uuid::new_v4(), Symbol::O, Some(4)).unwrap();
        let document = serialize_to_document(&TicTacToeDocument::from(game.clone())).unwrap();
        let restored = TicTacToeGame::from(
            deserialize_from_document::<TicTacToeDocument>(document).unwrap(),
        );

        assert_eq!(restored.id, game.id);
        assert_eq!(restored.creator_id, game.creator_id);
        assert_eq!(restored.partner_id, game.partner_id);
        assert_eq!(restored.board, game.board);
    }
}

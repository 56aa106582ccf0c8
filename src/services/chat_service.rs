//! Orchestration for the chat thread endpoints: persistence, realtime
//! fan-out, and the presence-aware push fallback.

use serde_json::json;
use uuid::Uuid;

use crate::{
    dao::models::{AnswerSeed, CreateOutcome},
    dto::{
        chat::{AnswerRequest, ChatMessageSummary, ReactionSummary, ThreadListItem},
        ws::ServerFrame,
    },
    dto::format_system_time,
    error::ServiceError,
    services::push::notify_user,
    state::{
        SharedState,
        channels::chat_channel,
        chat::{ChatThread, MessageKind},
    },
};

/// Record an answer to a shared question, creating the thread on first use.
///
/// Safe under the race where both partners answer the same question at once:
/// the storage layer serializes creation per `(couple_key, question_ref)`
/// and the loser's call appends to the winner's thread.
pub async fn record_answer(
    state: &SharedState,
    request: AnswerRequest,
) -> Result<CreateOutcome<ChatThread>, ServiceError> {
    if request.user_id == request.partner_id {
        return Err(ServiceError::InvalidInput(
            "cannot answer into a thread with yourself".into(),
        ));
    }

    let store = state.require_store().await?;
    let sender_id = request.user_id;
    let outcome = store
        .record_answer(AnswerSeed {
            user_id: request.user_id,
            partner_id: request.partner_id,
            source_topic: request.source_topic,
            question_ref: request.question_ref,
            question_text: request.question_text,
            answer: request.answer,
            answer_kind: request.answer_kind,
        })
        .await?;

    deliver_last_message(state, outcome.as_inner(), sender_id);
    Ok(outcome)
}

/// Load a thread, enforcing that the requester is a participant.
pub async fn thread_for_participant(
    state: &SharedState,
    thread_id: Uuid,
    user_id: Uuid,
) -> Result<ChatThread, ServiceError> {
    let store = state.require_store().await?;
    let thread = store
        .find_thread(thread_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("chat `{thread_id}` not found")))?;

    if !thread.is_participant(user_id) {
        return Err(ServiceError::Forbidden(
            "access denied: not a participant in this chat".into(),
        ));
    }

    Ok(thread)
}

/// Append a message, persist, and fan out with the push fallback.
///
/// Validation runs against a loaded copy, but persistence goes through the
/// storage layer's in-place append so two concurrent posts both land.
pub async fn post_message(
    state: &SharedState,
    thread_id: Uuid,
    user_id: Uuid,
    content: &str,
    kind: MessageKind,
) -> Result<ChatThread, ServiceError> {
    let store = state.require_store().await?;
    let mut thread = store
        .find_thread(thread_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("chat `{thread_id}` not found")))?;

    let message = thread.post_message(user_id, content, kind)?.clone();
    let recipient_id = thread.partner_of(user_id);
    let thread = store
        .append_message(thread_id, message, recipient_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("chat `{thread_id}` not found")))?;

    deliver_last_message(state, &thread, user_id);
    Ok(thread)
}

/// Mark every partner-authored message read, returning the receipt time.
pub async fn mark_read(
    state: &SharedState,
    thread_id: Uuid,
    user_id: Uuid,
) -> Result<String, ServiceError> {
    let store = state.require_store().await?;
    let mut thread = store
        .find_thread(thread_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("chat `{thread_id}` not found")))?;

    let read_at = thread.mark_read(user_id)?;
    store.save_thread(thread.clone()).await?;

    let read_at = format_system_time(read_at);
    state.channels().emit_to_channel(
        &chat_channel(thread_id),
        &ServerFrame::ChatReadReceipt {
            chat_id: thread_id,
            read_by: user_id,
            read_at: read_at.clone(),
        },
        Some(user_id),
    );

    Ok(read_at)
}

/// Toggle an emoji reaction, persist, and fan out the updated reaction set.
pub async fn toggle_reaction(
    state: &SharedState,
    thread_id: Uuid,
    user_id: Uuid,
    message_id: Uuid,
    emoji: &str,
) -> Result<Vec<ReactionSummary>, ServiceError> {
    let store = state.require_store().await?;
    let mut thread = store
        .find_thread(thread_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("chat `{thread_id}` not found")))?;

    let reactions: Vec<ReactionSummary> = thread
        .toggle_reaction(message_id, user_id, emoji)?
        .iter()
        .map(Into::into)
        .collect();
    store.save_thread(thread).await?;

    state.channels().emit_to_channel(
        &chat_channel(thread_id),
        &ServerFrame::ChatReactionUpdate {
            chat_id: thread_id,
            message_id,
            reactions: reactions.clone(),
        },
        Some(user_id),
    );

    Ok(reactions)
}

/// Active threads for the caller's *current* pairing, newest activity first.
///
/// Threads left over from a previous pairing are filtered out so they never
/// leak into the list.
pub async fn list_for_user(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<ThreadListItem>, ServiceError> {
    let threads = current_threads(state, user_id).await?;
    Ok(threads
        .iter()
        .map(|thread| ThreadListItem::for_viewer(thread, user_id))
        .collect())
}

/// Total unread badge count across the caller's active threads.
pub async fn unread_count(state: &SharedState, user_id: Uuid) -> Result<usize, ServiceError> {
    let threads = current_threads(state, user_id).await?;
    Ok(threads
        .iter()
        .map(|thread| thread.unread_for(user_id))
        .sum())
}

async fn current_threads(
    state: &SharedState,
    user_id: Uuid,
) -> Result<Vec<ChatThread>, ServiceError> {
    let store = state.require_store().await?;
    let current_partner = store
        .find_user(user_id)
        .await?
        .and_then(|user| user.partner_id);

    let mut threads = store.list_threads_for_user(user_id).await?;
    threads.retain(|thread| Some(thread.partner_of(user_id)) == current_partner);
    Ok(threads)
}

/// Fan the thread's newest message out to the chat room; when the partner is
/// not joined to the room, fall back to a push notification plus a direct
/// notice to their session if one is live.
fn deliver_last_message(state: &SharedState, thread: &ChatThread, sender_id: Uuid) {
    let Some(message) = thread.messages.last() else {
        return;
    };
    let channel = chat_channel(thread.id);
    let partner_id = thread.partner_of(sender_id);

    state.channels().emit_to_channel(
        &channel,
        &ServerFrame::ChatNewMessage {
            chat_id: thread.id,
            message: ChatMessageSummary::from(message),
        },
        Some(sender_id),
    );

    if state.channels().contains_user(&channel, partner_id) {
        return;
    }

    if let Some(session) = state.presence().get(partner_id) {
        let frame = ServerFrame::ChatNotification {
            thread: ThreadListItem::for_viewer(thread, partner_id),
        };
        if let Ok(payload) = serde_json::to_string(&frame) {
            let _ = session
                .tx
                .send(axum::extract::ws::Message::Text(payload.into()));
        }
    }

    notify_user(
        state.push(),
        partner_id,
        "New message",
        thread.last_message_preview.clone(),
        json!({ "chat_id": thread.id, "kind": "chat" }),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{memory::MemoryCoupleStore, models::UserEntity},
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

    fn answer_request(user_id: Uuid, partner_id: Uuid, question_id: Uuid) -> AnswerRequest {
        AnswerRequest {
            user_id,
            partner_id,
            source_topic: "daily".into(),
            question_ref: QuestionRef::Freeform { question_id },
            question_text: "What made you smile today?".into(),
            answer: "The rain stopped.".into(),
            answer_kind: AnswerKind::Text,
        }
    }

    #[tokio::test]
    async fn both_answers_land_in_one_thread() {
        let (state, _store, alice, bob) = state_with_couple().await;
        let question_id = Uuid::new_v4();

        let first = record_answer(&state, answer_request(alice, bob, question_id))
            .await
            .unwrap();
        assert!(first.was_created());

        let second = record_answer(&state, answer_request(bob, alice, question_id))
            .await
            .unwrap();
        assert!(!second.was_created());

        let thread = second.into_inner();
        assert_eq!(thread.id, first.into_inner().id);
        assert_eq!(thread.message_count, 2);
        assert_eq!(thread.unread_for(alice), 1);
        assert_eq!(thread.unread_for(bob), 1);
    }

    #[tokio::test]
    async fn outsiders_cannot_read_threads() {
        let (state, _store, alice, bob) = state_with_couple().await;
        let thread = record_answer(&state, answer_request(alice, bob, Uuid::new_v4()))
            .await
            .unwrap()
            .into_inner();

        let result = thread_for_participant(&state, thread.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn mark_read_is_idempotent() {
        let (state, _store, alice, bob) = state_with_couple().await;
        let thread = record_answer(&state, answer_request(alice, bob, Uuid::new_v4()))
            .await
            .unwrap()
            .into_inner();

        mark_read(&state, thread.id, bob).await.unwrap();
        mark_read(&state, thread.id, bob).await.unwrap();

        let fresh = thread_for_participant(&state, thread.id, bob).await.unwrap();
        assert_eq!(fresh.unread_for(bob), 0);
    }

    #[tokio::test]
    async fn stale_pairing_threads_are_filtered() {
        let (state, store, alice, bob) = state_with_couple().await;
        record_answer(&state, answer_request(alice, bob, Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(list_for_user(&state, alice).await.unwrap().len(), 1);

        // Alice re-pairs with someone new; the old thread must not leak.
        let charlie = Uuid::new_v4();
        store.put_user(user(alice, "Alice", charlie)).await;

        assert!(list_for_user(&state, alice).await.unwrap().is_empty());
        // Bob is still paired with Alice, so his view keeps the thread.
        assert_eq!(list_for_user(&state, bob).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unread_badge_sums_across_threads() {
        let (state, _store, alice, bob) = state_with_couple().await;
        record_answer(&state, answer_request(alice, bob, Uuid::new_v4()))
            .await
            .unwrap();
        record_answer(&state, answer_request(alice, bob, Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(unread_count(&state, bob).await.unwrap(), 2);
        assert_eq!(unread_count(&state, alice).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_posts_keep_both_messages() {
        let (state, _store, alice, bob) = state_with_couple().await;
        let thread = record_answer(&state, answer_request(alice, bob, Uuid::new_v4()))
            .await
            .unwrap()
            .into_inner();

        // Both loads observe the same snapshot; the in-place append must
        // keep both messages anyway.
        let (first, second) = tokio::join!(
            post_message(&state, thread.id, alice, "saw a fox today", MessageKind::Text),
            post_message(&state, thread.id, bob, "photo or it didn't happen", MessageKind::Text),
        );
        first.unwrap();
        second.unwrap();

        let fresh = thread_for_participant(&state, thread.id, alice).await.unwrap();
        assert_eq!(fresh.message_count, 3);
        assert_eq!(fresh.messages.len(), 3);
    }

    #[tokio::test]
    async fn reaction_toggle_round_trip() {
        let (state, _store, alice, bob) = state_with_couple().await;
        let thread = record_answer(&state, answer_request(alice, bob, Uuid::new_v4()))
            .await
            .unwrap()
            .into_inner();
        let message_id = thread.messages[0].id;

        let reactions = toggle_reaction(&state, thread.id, bob, message_id, "❤️")
            .await
            .unwrap();
        assert_eq!(reactions.len(), 1);

        let reactions = toggle_reaction(&state, thread.id, bob, message_id, "❤️")
            .await
            .unwrap();
        assert!(reactions.is_empty());
    }
}

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::chat::{
        AnswerRequest, ChatThreadSummary, MarkReadRequest, PostMessageRequest, ReactionRequest,
        ReactionUpdateResponse, ReadReceiptResponse, ThreadListItem, UnreadCountResponse,
    },
    error::AppError,
    services::chat_service,
    state::SharedState,
};

/// Routes handling question-anchored chat threads.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/chats/answer", post(record_answer))
        .route("/chats/{id}", get(get_thread))
        .route("/chats/{id}/messages", post(post_message))
        .route("/chats/{id}/read", post(mark_read))
        .route("/chats/{id}/reactions", post(toggle_reaction))
        .route("/chats/user/{user_id}", get(list_threads))
        .route("/chats/user/{user_id}/unread-count", get(unread_count))
}

/// Record an answer, creating the thread for this question on first use.
#[utoipa::path(
    post,
    path = "/chats/answer",
    tag = "chat",
    request_body = AnswerRequest,
    responses(
        (status = 201, description = "Thread created", body = ChatThreadSummary),
        (status = 200, description = "Answer appended to existing thread", body = ChatThreadSummary)
    )
)]
pub async fn record_answer(
    State(state): State<SharedState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<(StatusCode, Json<ChatThreadSummary>), AppError> {
    payload.validate()?;
    let viewer = payload.user_id;
    let outcome = chat_service::record_answer(&state, payload).await?;

    let status = if outcome.was_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ChatThreadSummary::for_viewer(&outcome.into_inner(), viewer)),
    ))
}

/// Fetch one thread the caller participates in.
#[utoipa::path(
    get,
    path = "/chats/{id}",
    tag = "chat",
    params(
        ("id" = Uuid, Path, description = "Thread identifier"),
        ("user_id" = Uuid, Query, description = "Requesting partner")
    ),
    responses((status = 200, description = "Thread with messages", body = ChatThreadSummary))
)]
pub async fn get_thread(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MarkReadRequest>,
) -> Result<Json<ChatThreadSummary>, AppError> {
    let thread = chat_service::thread_for_participant(&state, id, query.user_id).await?;
    Ok(Json(ChatThreadSummary::for_viewer(&thread, query.user_id)))
}

/// Append a follow-up message to a thread.
#[utoipa::path(
    post,
    path = "/chats/{id}/messages",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Thread identifier")),
    request_body = PostMessageRequest,
    responses((status = 201, description = "Message appended", body = ChatThreadSummary))
)]
pub async fn post_message(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ChatThreadSummary>), AppError> {
    payload.validate()?;
    let thread =
        chat_service::post_message(&state, id, payload.user_id, &payload.content, payload.kind)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(ChatThreadSummary::for_viewer(&thread, payload.user_id)),
    ))
}

/// Mark every message from the other partner as read.
#[utoipa::path(
    post,
    path = "/chats/{id}/read",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Thread identifier")),
    request_body = MarkReadRequest,
    responses((status = 200, description = "Messages marked read", body = ReadReceiptResponse))
)]
pub async fn mark_read(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<Json<ReadReceiptResponse>, AppError> {
    let read_at = chat_service::mark_read(&state, id, payload.user_id).await?;
    Ok(Json(ReadReceiptResponse {
        read_by: payload.user_id,
        read_at,
    }))
}

/// Toggle an emoji reaction on one message of the thread.
#[utoipa::path(
    post,
    path = "/chats/{id}/reactions",
    tag = "chat",
    params(("id" = Uuid, Path, description = "Thread identifier")),
    request_body = ReactionRequest,
    responses((status = 200, description = "Updated reactions", body = ReactionUpdateResponse))
)]
pub async fn toggle_reaction(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReactionRequest>,
) -> Result<Json<ReactionUpdateResponse>, AppError> {
    payload.validate()?;
    let reactions = chat_service::toggle_reaction(
        &state,
        id,
        payload.user_id,
        payload.message_id,
        &payload.emoji,
    )
    .await?;
    Ok(Json(ReactionUpdateResponse {
        message_id: payload.message_id,
        reactions,
    }))
}

/// Threads of the caller's current pairing, most recent first.
#[utoipa::path(
    get,
    path = "/chats/user/{user_id}",
    tag = "chat",
    params(("user_id" = Uuid, Path, description = "Requesting partner")),
    responses((status = 200, description = "Thread listing", body = Vec<ThreadListItem>))
)]
pub async fn list_threads(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ThreadListItem>>, AppError> {
    let threads = chat_service::list_for_user(&state, user_id).await?;
    Ok(Json(threads))
}

/// Aggregate unread count across the caller's current threads.
#[utoipa::path(
    get,
    path = "/chats/user/{user_id}/unread-count",
    tag = "chat",
    params(("user_id" = Uuid, Path, description = "Requesting partner")),
    responses((status = 200, description = "Unread badge count", body = UnreadCountResponse))
)]
pub async fn unread_count(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let total = chat_service::unread_count(&state, user_id).await?;
    Ok(Json(UnreadCountResponse { total }))
}

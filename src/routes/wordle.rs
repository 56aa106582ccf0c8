use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::CreateOutcome,
    dto::wordle::{
        ActorRequest, CreateWordleRequest, GuessRequest, GuessResponse, WordleGameSummary,
    },
    error::AppError,
    services::wordle_service,
    state::SharedState,
};

/// Query string accepted by the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of finished games to return.
    pub limit: Option<usize>,
}

/// Routes handling Wordle game management.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/wordle", post(create_game))
        .route("/wordle/{id}", get(get_game))
        .route("/wordle/{id}/guess", post(submit_guess))
        .route("/wordle/{id}/notify", post(notify_guesser))
        .route("/wordle/active/{user_id}", get(active_game))
        .route("/wordle/history/{user_id}", get(history))
}

/// Start a word game with the caller as word-setter.
///
/// Unlike TicTacToe, a duplicate create is a conflict: the existing active
/// game comes back with a 409 so the client can surface it.
#[utoipa::path(
    post,
    path = "/wordle",
    tag = "wordle",
    request_body = CreateWordleRequest,
    responses(
        (status = 201, description = "Game created", body = WordleGameSummary),
        (status = 409, description = "Active game already exists", body = WordleGameSummary)
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateWordleRequest>,
) -> Result<(StatusCode, Json<WordleGameSummary>), AppError> {
    payload.validate()?;
    let outcome = wordle_service::create_game(
        &state,
        payload.user_id,
        payload.partner_id,
        &payload.word,
    )
    .await?;

    let (status, game) = match outcome {
        CreateOutcome::Created(game) => (StatusCode::CREATED, game),
        CreateOutcome::Existing(game) => (StatusCode::CONFLICT, game),
    };
    Ok((
        status,
        Json(WordleGameSummary::for_viewer(&game, payload.user_id)),
    ))
}

/// Fetch a game with the secret word redacted for the guesser.
#[utoipa::path(
    get,
    path = "/wordle/{id}",
    tag = "wordle",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("user_id" = Uuid, Query, description = "Requesting player")
    ),
    responses((status = 200, description = "Game state", body = WordleGameSummary))
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorRequest>,
) -> Result<Json<WordleGameSummary>, AppError> {
    let game = wordle_service::game_for_player(&state, id, query.user_id).await?;
    Ok(Json(WordleGameSummary::for_viewer(&game, query.user_id)))
}

/// Score one guess for the guessing player.
#[utoipa::path(
    post,
    path = "/wordle/{id}/guess",
    tag = "wordle",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = GuessRequest,
    responses((status = 200, description = "Guess scored", body = GuessResponse))
)]
pub async fn submit_guess(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GuessRequest>,
) -> Result<Json<GuessResponse>, AppError> {
    payload.validate()?;
    let (outcome, game) =
        wordle_service::submit_guess(&state, id, payload.user_id, &payload.word).await?;
    Ok(Json(GuessResponse::new(outcome, &game, payload.user_id)))
}

/// Remind the guesser that a word is waiting for them.
#[utoipa::path(
    post,
    path = "/wordle/{id}/notify",
    tag = "wordle",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = ActorRequest,
    responses((status = 204, description = "Reminder dispatched"))
)]
pub async fn notify_guesser(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActorRequest>,
) -> Result<StatusCode, AppError> {
    wordle_service::notify_guesser(&state, id, payload.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's current non-terminal game, or `null`.
#[utoipa::path(
    get,
    path = "/wordle/active/{user_id}",
    tag = "wordle",
    params(("user_id" = Uuid, Path, description = "Requesting player")),
    responses((status = 200, description = "Active game if any", body = Option<WordleGameSummary>))
)]
pub async fn active_game(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Option<WordleGameSummary>>, AppError> {
    let game = wordle_service::active_game(&state, user_id).await?;
    Ok(Json(
        game.as_ref()
            .map(|game| WordleGameSummary::for_viewer(game, user_id)),
    ))
}

/// Finished games for the caller, most recent first.
#[utoipa::path(
    get,
    path = "/wordle/history/{user_id}",
    tag = "wordle",
    params(
        ("user_id" = Uuid, Path, description = "Requesting player"),
        ("limit" = Option<usize>, Query, description = "Maximum number of games to return")
    ),
    responses((status = 200, description = "Finished games", body = Vec<WordleGameSummary>))
)]
pub async fn history(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<WordleGameSummary>>, AppError> {
    let games = wordle_service::history(&state, user_id, query.limit).await?;
    Ok(Json(
        games
            .iter()
            .map(|game| WordleGameSummary::for_viewer(game, user_id))
            .collect(),
    ))
}

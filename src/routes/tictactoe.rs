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
    dto::tictactoe::{
        ActorRequest, CreateTicTacToeRequest, MoveRequest, MoveResponse, TicTacToeGameSummary,
    },
    error::AppError,
    services::tictactoe_service,
    state::SharedState,
};

/// Query string accepted by the history endpoint.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of finished games to return.
    pub limit: Option<usize>,
}

/// Routes handling TicTacToe game management.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/tictactoe", post(create_game))
        .route("/tictactoe/{id}", get(get_game))
        .route("/tictactoe/{id}/move", post(make_move))
        .route("/tictactoe/{id}/notify", post(notify_turn))
        .route("/tictactoe/active/{user_id}", get(active_game))
        .route("/tictactoe/history/{user_id}", get(history))
}

/// Start a game for a couple, or hand back the one already in progress.
#[utoipa::path(
    post,
    path = "/tictactoe",
    tag = "tictactoe",
    request_body = CreateTicTacToeRequest,
    responses(
        (status = 201, description = "Game created", body = TicTacToeGameSummary),
        (status = 200, description = "Active game already exists", body = TicTacToeGameSummary)
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Json(payload): Json<CreateTicTacToeRequest>,
) -> Result<(StatusCode, Json<TicTacToeGameSummary>), AppError> {
    payload.validate()?;
    let outcome = tictactoe_service::create_game(
        &state,
        payload.user_id,
        payload.partner_id,
        payload.symbol,
        payload.first_move,
    )
    .await?;

    let status = if outcome.was_created() {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json((&outcome.into_inner()).into())))
}

/// Fetch a game the caller participates in.
#[utoipa::path(
    get,
    path = "/tictactoe/{id}",
    tag = "tictactoe",
    params(
        ("id" = Uuid, Path, description = "Game identifier"),
        ("user_id" = Uuid, Query, description = "Requesting player")
    ),
    responses((status = 200, description = "Game state", body = TicTacToeGameSummary))
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActorRequest>,
) -> Result<Json<TicTacToeGameSummary>, AppError> {
    let game = tictactoe_service::game_for_player(&state, id, query.user_id).await?;
    Ok(Json((&game).into()))
}

/// Apply one move for the acting player.
#[utoipa::path(
    post,
    path = "/tictactoe/{id}/move",
    tag = "tictactoe",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = MoveRequest,
    responses((status = 200, description = "Move accepted", body = MoveResponse))
)]
pub async fn make_move(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveRequest>,
) -> Result<Json<MoveResponse>, AppError> {
    payload.validate()?;
    let (outcome, game) =
        tictactoe_service::make_move(&state, id, payload.user_id, payload.position).await?;
    Ok(Json(MoveResponse::new(outcome, &game)))
}

/// Remind the other player that it is their turn.
#[utoipa::path(
    post,
    path = "/tictactoe/{id}/notify",
    tag = "tictactoe",
    params(("id" = Uuid, Path, description = "Game identifier")),
    request_body = ActorRequest,
    responses((status = 204, description = "Reminder dispatched"))
)]
pub async fn notify_turn(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ActorRequest>,
) -> Result<StatusCode, AppError> {
    tictactoe_service::notify_turn(&state, id, payload.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's current non-terminal game, or `null`.
#[utoipa::path(
    get,
    path = "/tictactoe/active/{user_id}",
    tag = "tictactoe",
    params(("user_id" = Uuid, Path, description = "Requesting player")),
    responses((status = 200, description = "Active game if any", body = Option<TicTacToeGameSummary>))
)]
pub async fn active_game(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Option<TicTacToeGameSummary>>, AppError> {
    let game = tictactoe_service::active_game(&state, user_id).await?;
    Ok(Json(game.as_ref().map(TicTacToeGameSummary::from)))
}

/// Finished games for the caller, most recent first.
#[utoipa::path(
    get,
    path = "/tictactoe/history/{user_id}",
    tag = "tictactoe",
    params(
        ("user_id" = Uuid, Path, description = "Requesting player"),
        ("limit" = Option<usize>, Query, description = "Maximum number of games to return")
    ),
    responses((status = 200, description = "Finished games", body = Vec<TicTacToeGameSummary>))
)]
pub async fn history(
    State(state): State<SharedState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<TicTacToeGameSummary>>, AppError> {
    let games = tictactoe_service::history(&state, user_id, query.limit).await?;
    Ok(Json(games.iter().map(TicTacToeGameSummary::from).collect()))
}

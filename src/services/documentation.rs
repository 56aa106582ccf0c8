use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for PairLink Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::tictactoe::create_game,
        crate::routes::tictactoe::get_game,
        crate::routes::tictactoe::make_move,
        crate::routes::tictactoe::notify_turn,
        crate::routes::tictactoe::active_game,
        crate::routes::tictactoe::history,
        crate::routes::wordle::create_game,
        crate::routes::wordle::get_game,
        crate::routes::wordle::submit_guess,
        crate::routes::wordle::notify_guesser,
        crate::routes::wordle::active_game,
        crate::routes::wordle::history,
        crate::routes::chat::record_answer,
        crate::routes::chat::get_thread,
        crate::routes::chat::post_message,
        crate::routes::chat::mark_read,
        crate::routes::chat::toggle_reaction,
        crate::routes::chat::list_threads,
        crate::routes::chat::unread_count,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::tictactoe::CreateTicTacToeRequest,
            crate::dto::tictactoe::MoveRequest,
            crate::dto::tictactoe::ActorRequest,
            crate::dto::tictactoe::MoveSummary,
            crate::dto::tictactoe::TicTacToeGameSummary,
            crate::dto::tictactoe::MoveResponse,
            crate::dto::wordle::CreateWordleRequest,
            crate::dto::wordle::GuessRequest,
            crate::dto::wordle::GuessSummary,
            crate::dto::wordle::WordleGameSummary,
            crate::dto::wordle::GuessResponse,
            crate::dto::chat::AnswerRequest,
            crate::dto::chat::PostMessageRequest,
            crate::dto::chat::MarkReadRequest,
            crate::dto::chat::ReactionRequest,
            crate::dto::chat::ReactionSummary,
            crate::dto::chat::ChatMessageSummary,
            crate::dto::chat::ChatThreadSummary,
            crate::dto::chat::ThreadListItem,
            crate::dto::chat::UnreadCountResponse,
            crate::dto::chat::ReadReceiptResponse,
            crate::dto::chat::ReactionUpdateResponse,
            crate::dto::couple::MoodSummary,
            crate::dto::couple::ScribbleSummary,
            crate::dto::ws::ClientFrame,
            crate::dto::ws::ServerFrame,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "tictactoe", description = "Turn-based TicTacToe games between partners"),
        (name = "wordle", description = "Word-guessing games between partners"),
        (name = "chat", description = "Question-anchored chat threads"),
        (name = "realtime", description = "WebSocket session for presence and live play"),
    )
)]
pub struct ApiDoc;

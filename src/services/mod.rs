/// Chat thread orchestration.
pub mod chat_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Best-effort push notification delivery.
pub mod push;
/// WebSocket session lifecycle and event dispatch.
pub mod realtime_service;
/// Storage connection supervisor with reconnect backoff.
pub mod storage_supervisor;
/// TicTacToe orchestration.
pub mod tictactoe_service;
/// Wordle orchestration.
pub mod wordle_service;

//! Persistence layer: storage abstraction plus backends.

/// In-memory store used by tests and single-process runs without MongoDB.
pub mod memory;
/// Durable entity definitions shared across backends.
pub mod models;
#[cfg(feature = "mongo-store")]
/// MongoDB-backed store.
pub mod mongodb;
/// Storage abstraction layer for database operations.
pub mod storage;
/// The `CoupleStore` trait consumed by services.
pub mod store;

//! Error types for the Listkeeper domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each collaborator has its own error enum.

use thiserror::Error;

/// The top-level error type for all Listkeeper operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Storage errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Calendar errors ---
    #[error("Calendar error: {0}")]
    Calendar(#[from] CalendarError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Collaborator errors ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid update payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Error)]
pub enum CalendarError {
    #[error("Calendar request failed: {0}")]
    Request(String),

    #[error("Calendar feed could not be parsed: {0}")]
    Parse(String),
}

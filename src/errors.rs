//! Unified error types for the import pipeline.
//!
//! Feed problems are reported through [`ParseError`] so callers can tell a bad
//! document apart from a store failure. Everything else funnels into [`Error`].

use crate::entities::import_batch::BatchStatus;
use crate::entities::import_item::ItemStatus;
use thiserror::Error;

/// Reasons a feed document is rejected. A rejected document produces no records.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The bytes are not valid JSON
    #[error("Feed is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// The JSON does not follow the `feed.rss.channel.item` layout
    #[error("Invalid feed structure: {reason}")]
    InvalidStructure {
        /// What the validator tripped over
        reason: String,
    },
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// The feed document was rejected
    #[error(transparent)]
    Feed(#[from] ParseError),

    /// The feed could not be read from its file or URL
    #[error("Failed to load feed from {source_name}: {message}")]
    Fetch {
        /// File name or URL that failed
        source_name: String,
        /// Underlying failure
        message: String,
    },

    /// Any store read or write failed. Safe to retry the whole operation.
    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[from] sea_orm::DbErr),

    /// No import item with this id
    #[error("Import item {id} not found")]
    ItemNotFound {
        /// Item id
        id: i64,
    },

    /// No import batch with this id
    #[error("Import batch {id} not found")]
    BatchNotFound {
        /// Batch id
        id: i64,
    },

    /// The requested action is not allowed from the item's current status
    #[error("Cannot {action} an item that is {from}")]
    InvalidTransition {
        /// Status the item was in
        from: ItemStatus,
        /// Action that was attempted
        action: &'static str,
    },

    /// The batch no longer accepts this change
    #[error("Import batch {id} is {status}")]
    BatchClosed {
        /// Batch id
        id: i64,
        /// Status that blocks the change
        status: BatchStatus,
    },

    /// The remote place-search function failed
    #[error("Place search failed: {message}")]
    PlaceSearch {
        /// Underlying failure
        message: String,
    },

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An environment variable is set but unreadable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

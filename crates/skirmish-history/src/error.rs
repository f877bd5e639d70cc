//! Error types for skirmish-history

use skirmish_core::ActionId;
use thiserror::Error;

/// History/undo error type
#[derive(Debug, Error)]
pub enum Error {
    /// No entry in the log qualifies for undo
    #[error("nothing to undo")]
    NothingToUndo,

    /// The targeted entry was already reversed
    #[error("action {0} was already undone")]
    AlreadyUndone(ActionId),

    /// The targeted entry is not reversible
    #[error("action {0} cannot be undone")]
    NotUndoable(ActionId),

    /// The targeted entry does not exist
    #[error("action not found: {0}")]
    EntryNotFound(ActionId),

    /// Export error
    #[error("export error: {0}")]
    Export(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Engine error surfaced while reversing an entry
    #[error(transparent)]
    Engine(#[from] skirmish_core::Error),
}

/// Result type for history operations
pub type Result<T> = std::result::Result<T, Error>;

//! Error types for skirmish-core

use crate::identity::UnitId;
use crate::state::BattleStatus;
use thiserror::Error;

/// Engine error type
///
/// Every variant is a locally detected precondition failure; the engine
/// touches no external I/O, so there is no transient error class. State is
/// only mutated after all preconditions for an operation pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("not your turn to activate")]
    NotYourTurn,

    #[error("unit {unit} is not eligible: {reason}")]
    UnitNotEligible { unit: UnitId, reason: String },

    #[error("unit {0} has already activated this round")]
    UnitAlreadyActivated(UnitId),

    #[error("a round is already in progress")]
    RoundAlreadyInProgress,

    #[error("insufficient command points: available {available}, required {required}")]
    InsufficientCommandPoints { available: u32, required: u32 },

    #[error("cannot test a destroyed {0}")]
    InvalidTestOnDestroyedEntity(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("battle is not active (status: {0:?})")]
    BattleNotActive(BattleStatus),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

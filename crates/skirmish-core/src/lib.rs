//! Skirmish Core - Battle state engine for One Page Rules games
//!
//! This crate provides the per-battle mutable state machine:
//! - Battle/army/unit/model aggregate (`BattleState`)
//! - Pure dice and test resolver with deterministic RNG
//! - Morale and quality state machine (Steady -> Shaken -> Routed -> Destroyed)
//! - Command point ledger with pure allotment calculation
//! - Alternating activation scheduler with a deterministic interleave
//! - Append-only action history feeding the undo engine
//!
//! The engine is a synchronous read-modify-write over a [`BattleState`]
//! value; the surrounding system owns persistence, transport, and the
//! at-most-one-writer-per-battle guarantee. Every mutating operation
//! returns the domain events it produced for the caller to broadcast.
//!
//! Undo, suggestions, and history export live in the `skirmish-history`
//! crate.

pub mod activation;
pub mod command;
pub mod damage;
mod dice;
mod error;
pub mod event;
pub mod history;
mod identity;
pub mod morale;
mod rng;
pub mod state;

pub use activation::{
    activate_unit, activation_order, activation_status, available_units_for_activation,
    compute_activation_order, pass_activation, start_new_round, ActivationResult, ActivationSlot,
    ActivationState, ActivationStatus, RoundStartResult, UnitAction,
};
pub use command::{
    calculate_command_points, command_point_history, refund_command_points, reset_command_points,
    spend_command_points, CommandPointCalculation, CommandPointMethod, CommandPointSpendResult,
    CommandPointTransaction,
};
pub use damage::{apply_damage, DamageResult};
pub use dice::{describe_test, resolve_test, roll_or_forced, TestOutcome};
pub use error::{Error, Result};
pub use event::{BattleEvent, EventKind};
pub use history::{
    ActionEntry, ActionId, ActionKind, ActionLog, ActivationCursor, HistoryQuery, ModelHealth,
    RoundCarryover, UndoComplexity, UnitCondition,
};
pub use identity::{ArmyId, BattleId, ModelId, UnitId, UserId};
pub use morale::{
    morale_test_modifier, perform_morale_test, perform_quality_test, should_take_morale_test,
    should_take_rout_recovery_test, MoraleState, MoraleTestKind, MoraleTestResult,
    QualityTestKind, QualityTestResult,
};
pub use rng::DiceRng;
pub use state::{Army, BattlePhase, BattleState, BattleStatus, Model, Unit};

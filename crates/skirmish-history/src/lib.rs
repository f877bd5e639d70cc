//! Skirmish History - Undo engine, suggestions, and history export
//!
//! This crate builds on `skirmish-core`'s action log to provide:
//!
//! - **Undo**: reverse single entries or ordered cascades, replaying the
//!   captured "before" payloads back onto the battle state
//! - **Suggestions**: canned "undo last action / turn / phase" proposals
//!   derived from the log tail
//! - **Export**: serialize the history to RON, JSON, CSV, or text for
//!   battle reports
//!
//! # Example
//!
//! ```rust,ignore
//! use skirmish_core::{spend_command_points, BattleState, UserId, ArmyId};
//! use skirmish_history::{undo_action, undo_suggestions, Exporter, ExportFormat};
//!
//! let mut state: BattleState = load_battle();
//! let caller = UserId::new("alice");
//!
//! spend_command_points(&mut state, &caller, &ArmyId::new("a1"), 2, "reroll", None)?;
//!
//! // Change of heart: reverse the most recent undoable entry
//! let undone = undo_action(&mut state, &caller, None)?;
//! println!("undid {}", undone.kind.describe());
//!
//! // Offer the player the canned options
//! for suggestion in undo_suggestions(&state) {
//!     println!("{} ({:?})", suggestion.description, suggestion.complexity);
//! }
//!
//! // Export the full history for the battle report
//! let json = Exporter::new(&state).export(ExportFormat::Json)?;
//! ```

mod error;
mod export;
mod suggest;
mod undo;
mod view;

pub use error::{Error, Result};
pub use export::{export_action_history, ExportFormat, Exporter};
pub use suggest::{undo_suggestions, SuggestionScope, UndoSuggestion};
pub use undo::{undo_action, undo_cascade, CascadeUndoResult};
pub use view::battle_action_history;

// Re-export the log types callers need alongside the undo engine
pub use skirmish_core::{ActionEntry, ActionId, ActionKind, ActionLog, HistoryQuery, UndoComplexity};

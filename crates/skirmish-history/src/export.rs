//! Export a battle's action history to external formats

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use skirmish_core::{ActionEntry, BattleId, BattleState, UserId};
use std::io::Write;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RON format (Rust Object Notation)
    Ron,
    /// JSON format
    Json,
    /// CSV format, one row per entry
    Csv,
    /// Human-readable text format
    Text,
}

#[derive(Serialize)]
struct ExportData<'a> {
    battle_id: &'a BattleId,
    exported_at: DateTime<Utc>,
    entry_count: usize,
    entries: &'a [ActionEntry],
}

impl<'a> ExportData<'a> {
    fn from_state(state: &'a BattleState) -> Self {
        Self {
            battle_id: &state.battle_id,
            exported_at: Utc::now(),
            entry_count: state.history.len(),
            entries: state.history.entries(),
        }
    }
}

/// Exporter for a battle's action history
pub struct Exporter<'a> {
    state: &'a BattleState,
}

impl<'a> Exporter<'a> {
    /// Create a new exporter
    pub fn new(state: &'a BattleState) -> Self {
        Self { state }
    }

    /// Export to a string in the specified format
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Ron => self.to_ron(),
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => Ok(self.to_csv()),
            ExportFormat::Text => Ok(self.to_text()),
        }
    }

    /// Export to a writer
    pub fn export_to<W: Write>(&self, writer: &mut W, format: ExportFormat) -> Result<()> {
        let content = self.export(format)?;
        writer
            .write_all(content.as_bytes())
            .map_err(|e| Error::Export(e.to_string()))?;
        Ok(())
    }

    /// Export to RON format
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(
            &ExportData::from_state(self.state),
            ron::ser::PrettyConfig::default(),
        )
        .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export to JSON format
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&ExportData::from_state(self.state))
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export to CSV format
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("id,timestamp,round,phase,user,action,can_undo,undone,description\n");

        for entry in self.state.history.entries() {
            let description = entry.kind.describe().replace('"', "\"\"");
            output.push_str(&format!(
                "{},{},{},{:?},{},{},{},{},\"{}\"\n",
                entry.id.raw(),
                entry.timestamp.to_rfc3339(),
                entry.round,
                entry.phase,
                entry.user,
                entry.kind.label(),
                entry.can_undo,
                entry.undone_at.is_some(),
                description
            ));
        }
        output
    }

    /// Export to a human-readable battle report
    pub fn to_text(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("Action history for {}\n", self.state.battle_id));
        output.push_str(&format!("Entries: {}\n\n", self.state.history.len()));

        for entry in self.state.history.entries() {
            let undone = if entry.undone_at.is_some() {
                " [undone]"
            } else {
                ""
            };
            output.push_str(&format!(
                "[round {} | {:?}] {} {}{}\n",
                entry.round,
                entry.phase,
                entry.user,
                entry.kind.describe(),
                undone
            ));
        }
        output
    }
}

/// Access-checked export entry point: only battle participants (or the
/// system user) may export the history.
pub fn export_action_history(
    state: &BattleState,
    caller: &UserId,
    format: ExportFormat,
) -> Result<String> {
    if !caller.is_system() && state.army_of_user(caller).is_none() {
        return Err(Error::Engine(skirmish_core::Error::EntityNotFound(
            caller.to_string(),
        )));
    }
    Exporter::new(state).export(format)
}

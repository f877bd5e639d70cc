//! Canned undo suggestions
//!
//! Derives up to three suggestions from the tail of the action log: undo
//! the last action, undo the last turn (everything since the round
//! started), and undo the last phase (cascade back through the most
//! recent phase change). Each suggestion lists the exact entry ids to
//! feed the cascade path and the worst undo complexity among them.

use serde::Serialize;
use skirmish_core::{ActionEntry, ActionId, BattleState, UndoComplexity};

/// Which canned suggestion this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionScope {
    LastAction,
    LastTurn,
    LastPhase,
}

/// One suggested undo operation
#[derive(Debug, Clone, Serialize)]
pub struct UndoSuggestion {
    pub scope: SuggestionScope,
    pub description: String,
    /// Entry ids to reverse, newest first
    pub action_ids: Vec<ActionId>,
    /// Worst complexity among the listed entries
    pub complexity: UndoComplexity,
}

fn worst_complexity(entries: &[&ActionEntry]) -> UndoComplexity {
    let mut worst = UndoComplexity::Simple;
    for entry in entries {
        match entry.complexity() {
            UndoComplexity::Cascade => return UndoComplexity::Cascade,
            UndoComplexity::Complex => worst = UndoComplexity::Complex,
            UndoComplexity::Simple => {}
        }
    }
    worst
}

fn suggestion_from(scope: SuggestionScope, description: String, entries: Vec<&ActionEntry>) -> Option<UndoSuggestion> {
    if entries.is_empty() {
        return None;
    }
    Some(UndoSuggestion {
        scope,
        description,
        complexity: worst_complexity(&entries),
        action_ids: entries.iter().map(|e| e.id).collect(),
    })
}

/// Derive undo suggestions from the current log tail
pub fn undo_suggestions(state: &BattleState) -> Vec<UndoSuggestion> {
    let mut suggestions = Vec::new();

    if let Some(last) = state.history.latest_undoable() {
        suggestions.extend(suggestion_from(
            SuggestionScope::LastAction,
            format!("undo: {}", last.kind.describe()),
            vec![last],
        ));
    }

    // Last turn: undoable entries after the most recent round start or
    // phase change, newest first
    let mut turn_entries = Vec::new();
    for entry in state.history.entries().iter().rev() {
        if matches!(entry.kind.label(), "round_started" | "phase_changed") {
            break;
        }
        if entry.is_undoable() {
            turn_entries.push(entry);
        }
    }
    suggestions.extend(suggestion_from(
        SuggestionScope::LastTurn,
        format!("undo the last {} action(s) this round", turn_entries.len()),
        turn_entries,
    ));

    // Last phase: cascade back through the most recent phase change
    let phase_boundary = state
        .history
        .entries()
        .iter()
        .rposition(|e| e.kind.label() == "phase_changed" && e.is_undoable());
    if let Some(boundary) = phase_boundary {
        let phase_entries: Vec<&ActionEntry> = state.history.entries()[boundary..]
            .iter()
            .rev()
            .filter(|e| e.is_undoable())
            .collect();
        suggestions.extend(suggestion_from(
            SuggestionScope::LastPhase,
            format!("undo back through the last phase change ({} entries)", phase_entries.len()),
            phase_entries,
        ));
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::{
        activate_unit, spend_command_points, start_new_round, Army, ArmyId, Model, Unit,
        UnitAction, UnitId, UserId,
    };

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn battle() -> BattleState {
        let mut state = BattleState::new("b1");
        let mut army = Army::new("a1", "alice", "Raiders", "Orcs", 1000).with_command_points(4);
        army.add_unit(Unit::new(
            "au0",
            "Squad",
            vec![Model::new("au0-m1", "Trooper", 4, 1)],
        ));
        state.add_army(army).unwrap();
        state.start(&alice()).unwrap();
        state.advance_phase(&alice()).unwrap();
        state
    }

    #[test]
    fn test_no_turn_suggestion_immediately_after_round_start() {
        let mut state = battle();
        start_new_round(&mut state, &alice()).unwrap();

        let suggestions = undo_suggestions(&state);
        let scopes: Vec<SuggestionScope> = suggestions.iter().map(|s| s.scope).collect();
        assert!(scopes.contains(&SuggestionScope::LastAction));
        assert!(!scopes.contains(&SuggestionScope::LastTurn));
        // Round start is a cascade-class entry
        assert_eq!(suggestions[0].complexity, UndoComplexity::Cascade);
    }

    #[test]
    fn test_turn_suggestion_collects_entries_since_round_start() {
        let mut state = battle();
        start_new_round(&mut state, &alice()).unwrap();
        spend_command_points(&mut state, &alice(), &ArmyId::new("a1"), 1, "reroll", None)
            .unwrap();
        activate_unit(&mut state, &alice(), &UnitId::new("au0"), vec![UnitAction::Hold])
            .unwrap();

        let suggestions = undo_suggestions(&state);
        let turn = suggestions
            .iter()
            .find(|s| s.scope == SuggestionScope::LastTurn)
            .unwrap();
        assert_eq!(turn.action_ids.len(), 2);
        // Newest first, ready for the cascade path
        assert!(turn.action_ids[0] > turn.action_ids[1]);
        assert_eq!(turn.complexity, UndoComplexity::Simple);
    }

    #[test]
    fn test_phase_suggestion_spans_the_phase_change() {
        let mut state = battle();
        spend_command_points(&mut state, &alice(), &ArmyId::new("a1"), 1, "reroll", None)
            .unwrap();

        let suggestions = undo_suggestions(&state);
        let phase = suggestions
            .iter()
            .find(|s| s.scope == SuggestionScope::LastPhase)
            .unwrap();
        // The phase change itself plus the spend after it
        assert_eq!(phase.action_ids.len(), 2);
        assert_eq!(phase.complexity, UndoComplexity::Cascade);
    }

    #[test]
    fn test_empty_log_yields_no_suggestions() {
        let state = BattleState::new("b1");
        assert!(undo_suggestions(&state).is_empty());
    }
}

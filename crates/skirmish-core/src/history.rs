//! Record side of the action history
//!
//! Every mutating engine operation appends one [`ActionEntry`] to the
//! battle's [`ActionLog`] before returning. Entries are never deleted (the
//! log is the audit trail) and are only touched again to stamp `undone_at`
//! when an entry is reversed. Each [`ActionKind`] variant carries exactly
//! the captured "before" data its inverse needs, so undo replays minimal
//! diffs instead of whole-state copies, and undo complexity is derived
//! from the variant rather than guessed at runtime.
//!
//! The undo engine itself lives in the `skirmish-history` crate.

use crate::activation::{ActivationState, UnitAction};
use crate::identity::{ArmyId, ModelId, UnitId, UserId};
use crate::morale::MoraleTestKind;
use crate::state::{BattlePhase, Unit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique, monotonically increasing identifier for a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub u64);

impl ActionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action:{}", self.0)
    }
}

/// How involved reversing an action is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoComplexity {
    /// Touched one entity with a direct inverse
    Simple,
    /// Touched multiple entities, each with a direct inverse
    Complex,
    /// Later entries causally depend on this one; reverse via the
    /// cascade path, not single undo
    Cascade,
}

/// Captured health of a single model, for undo payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelHealth {
    pub model_id: ModelId,
    pub tough: u32,
    pub destroyed: bool,
}

impl ModelHealth {
    fn capture(model: &crate::state::Model) -> Self {
        Self {
            model_id: model.model_id.clone(),
            tough: model.current_tough,
            destroyed: model.destroyed,
        }
    }
}

/// Captured condition of a unit before a mutation, sufficient to
/// reverse damage and morale outcomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCondition {
    pub shaken: bool,
    pub routed: bool,
    pub current_size: u32,
    pub models: Vec<ModelHealth>,
    pub hero: Option<ModelHealth>,
}

impl UnitCondition {
    /// Snapshot a unit's reversible condition
    pub fn capture(unit: &Unit) -> Self {
        Self {
            shaken: unit.shaken,
            routed: unit.routed,
            current_size: unit.current_size,
            models: unit.models.iter().map(ModelHealth::capture).collect(),
            hero: unit.joined_hero.as_ref().map(ModelHealth::capture),
        }
    }

    /// Write the captured condition back onto a unit
    pub fn restore_onto(&self, unit: &mut Unit) {
        unit.shaken = self.shaken;
        unit.routed = self.routed;
        unit.current_size = self.current_size;
        for saved in &self.models {
            if let Some(model) = unit.models.iter_mut().find(|m| m.model_id == saved.model_id) {
                model.restore(saved.tough, saved.destroyed);
            }
        }
        if let (Some(saved), Some(hero)) = (&self.hero, unit.joined_hero.as_mut()) {
            hero.restore(saved.tough, saved.destroyed);
        }
    }
}

/// Per-round unit state replaced at round start, kept for undo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCarryover {
    pub unit_id: UnitId,
    pub actions: Vec<UnitAction>,
    pub fatigued: bool,
    pub spell_tokens: u32,
}

/// Captured scheduler cursor before an activation-advancing mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationCursor {
    pub current_turn: u32,
    pub activating_player: Option<UserId>,
    pub round_complete: bool,
    pub in_progress: bool,
}

impl ActivationCursor {
    /// Snapshot the advancing fields of the scheduler
    pub fn capture(activation: &ActivationState) -> Self {
        Self {
            current_turn: activation.current_turn,
            activating_player: activation.activating_player.clone(),
            round_complete: activation.round_complete,
            in_progress: activation.in_progress,
        }
    }

    /// Write the captured cursor back onto the scheduler
    pub fn restore_onto(&self, activation: &mut ActivationState) {
        activation.current_turn = self.current_turn;
        activation.activating_player = self.activating_player.clone();
        activation.round_complete = self.round_complete;
        activation.in_progress = self.in_progress;
    }
}

/// Tagged action payloads; one variant per mutating operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionKind {
    RoundStarted {
        round: u32,
        previous_round: u32,
        previous_activation: ActivationState,
        /// Per-unit round state replaced at round start
        previous_units: Vec<RoundCarryover>,
    },
    UnitActivated {
        unit_id: UnitId,
        actions: Vec<UnitAction>,
        /// Index of the order slot this activation filled
        slot_index: usize,
        cursor: ActivationCursor,
        /// The unit's `activated_in_round` before this activation
        previous_round_mark: u32,
        previous_actions: Vec<UnitAction>,
        /// Fatigue flag before this activation (charging fatigues)
        previous_fatigued: bool,
    },
    ActivationPassed {
        player: UserId,
        slot_index: usize,
        cursor: ActivationCursor,
        /// Whether this pass added the player to the passed list
        newly_passed: bool,
    },
    CommandPointsSpent {
        army_id: ArmyId,
        amount: u32,
        purpose: String,
        target_unit: Option<UnitId>,
    },
    CommandPointsReset {
        /// Current totals per army before the reset
        previous: Vec<(ArmyId, u32)>,
    },
    MoraleTest {
        unit_id: UnitId,
        test: MoraleTestKind,
        passed: bool,
        before: UnitCondition,
    },
    DamageApplied {
        unit_id: UnitId,
        damage: u32,
        before: UnitCondition,
    },
    PhaseChanged {
        from: BattlePhase,
        to: BattlePhase,
    },
}

impl ActionKind {
    /// Stable label used for filtering and export
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::RoundStarted { .. } => "round_started",
            ActionKind::UnitActivated { .. } => "unit_activated",
            ActionKind::ActivationPassed { .. } => "activation_passed",
            ActionKind::CommandPointsSpent { .. } => "command_points_spent",
            ActionKind::CommandPointsReset { .. } => "command_points_reset",
            ActionKind::MoraleTest { .. } => "morale_test",
            ActionKind::DamageApplied { .. } => "damage_applied",
            ActionKind::PhaseChanged { .. } => "phase_changed",
        }
    }

    /// Undo complexity, derived from what the variant touches
    pub fn complexity(&self) -> UndoComplexity {
        match self {
            ActionKind::UnitActivated { .. }
            | ActionKind::ActivationPassed { .. }
            | ActionKind::CommandPointsSpent { .. }
            | ActionKind::DamageApplied { .. } => UndoComplexity::Simple,
            ActionKind::CommandPointsReset { .. } | ActionKind::MoraleTest { .. } => {
                UndoComplexity::Complex
            }
            ActionKind::RoundStarted { .. } | ActionKind::PhaseChanged { .. } => {
                UndoComplexity::Cascade
            }
        }
    }

    /// Short human-readable summary
    pub fn describe(&self) -> String {
        match self {
            ActionKind::RoundStarted { round, .. } => format!("started round {round}"),
            ActionKind::UnitActivated { unit_id, .. } => format!("activated {unit_id}"),
            ActionKind::ActivationPassed { player, .. } => format!("{player} passed activation"),
            ActionKind::CommandPointsSpent {
                amount, purpose, ..
            } => format!("spent {amount} CP for {purpose}"),
            ActionKind::CommandPointsReset { .. } => "reset command points".to_string(),
            ActionKind::MoraleTest {
                unit_id, passed, ..
            } => {
                let verdict = if *passed { "passed" } else { "failed" };
                format!("{unit_id} {verdict} a morale test")
            }
            ActionKind::DamageApplied {
                unit_id, damage, ..
            } => format!("applied {damage} damage to {unit_id}"),
            ActionKind::PhaseChanged { from, to } => format!("phase {from:?} -> {to:?}"),
        }
    }
}

/// One immutable record of a mutating action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEntry {
    pub id: ActionId,
    pub timestamp: DateTime<Utc>,
    pub round: u32,
    pub phase: BattlePhase,
    /// The user who performed the action
    pub user: UserId,
    pub kind: ActionKind,
    pub can_undo: bool,
    pub undone_at: Option<DateTime<Utc>>,
    pub undone_by: Option<UserId>,
}

impl ActionEntry {
    /// Whether this entry currently qualifies for undo
    pub fn is_undoable(&self) -> bool {
        self.can_undo && self.undone_at.is_none()
    }

    /// Undo complexity derived from the payload variant
    pub fn complexity(&self) -> UndoComplexity {
        self.kind.complexity()
    }
}

/// Query options for reading the log
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    /// Maximum number of entries returned
    pub limit: usize,
    /// Include entries that were already undone
    pub include_undone: bool,
    /// Restrict to the given action labels (see [`ActionKind::label`])
    pub kinds: Option<Vec<String>>,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            limit: 50,
            include_undone: true,
            kinds: None,
        }
    }
}

/// Append-only log of mutating actions for one battle
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActionLog {
    entries: Vec<ActionEntry>,
    next_id: u64,
}

impl ActionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new entry and return its id
    pub fn record(
        &mut self,
        round: u32,
        phase: BattlePhase,
        user: UserId,
        kind: ActionKind,
        can_undo: bool,
    ) -> ActionId {
        let id = ActionId::new(self.next_id);
        self.next_id += 1;

        log::debug!("recorded {} ({})", kind.label(), id);
        self.entries.push(ActionEntry {
            id,
            timestamp: Utc::now(),
            round,
            phase,
            user,
            kind,
            can_undo,
            undone_at: None,
            undone_by: None,
        });
        id
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[ActionEntry] {
        &self.entries
    }

    /// Look up an entry by id
    pub fn get(&self, id: ActionId) -> Option<&ActionEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// The most recent entry that qualifies for undo
    pub fn latest_undoable(&self) -> Option<&ActionEntry> {
        self.entries.iter().rev().find(|e| e.is_undoable())
    }

    /// Stamp an entry as undone. Returns false if the id is unknown.
    pub fn mark_undone(&mut self, id: ActionId, by: &UserId) -> bool {
        match self.entries.iter_mut().find(|e| e.id == id) {
            Some(entry) => {
                entry.undone_at = Some(Utc::now());
                entry.undone_by = Some(by.clone());
                true
            }
            None => false,
        }
    }

    /// Query entries, newest first
    pub fn query(&self, query: &HistoryQuery) -> Vec<&ActionEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| query.include_undone || e.undone_at.is_none())
            .filter(|e| match &query.kinds {
                Some(kinds) => kinds.iter().any(|k| k == e.kind.label()),
                None => true,
            })
            .take(query.limit)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spend_kind(amount: u32) -> ActionKind {
        ActionKind::CommandPointsSpent {
            army_id: ArmyId::new("a1"),
            amount,
            purpose: "test".to_string(),
            target_unit: None,
        }
    }

    #[test]
    fn test_record_assigns_monotonic_ids() {
        let mut log = ActionLog::new();
        let a = log.record(
            1,
            BattlePhase::BattleRounds,
            UserId::new("alice"),
            spend_kind(1),
            true,
        );
        let b = log.record(
            1,
            BattlePhase::BattleRounds,
            UserId::new("alice"),
            spend_kind(2),
            true,
        );
        assert!(b > a);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_query_newest_first_with_limit() {
        let mut log = ActionLog::new();
        for i in 0..5 {
            log.record(
                1,
                BattlePhase::BattleRounds,
                UserId::new("alice"),
                spend_kind(i),
                true,
            );
        }

        let results = log.query(&HistoryQuery {
            limit: 3,
            ..Default::default()
        });
        assert_eq!(results.len(), 3);
        assert!(results[0].id > results[1].id);
        assert!(results[1].id > results[2].id);
    }

    #[test]
    fn test_query_filters_kinds_and_undone() {
        let mut log = ActionLog::new();
        let spend = log.record(
            1,
            BattlePhase::BattleRounds,
            UserId::new("alice"),
            spend_kind(1),
            true,
        );
        log.record(
            1,
            BattlePhase::BattleRounds,
            UserId::new("alice"),
            ActionKind::PhaseChanged {
                from: BattlePhase::Deployment,
                to: BattlePhase::BattleRounds,
            },
            true,
        );

        let only_spends = log.query(&HistoryQuery {
            kinds: Some(vec!["command_points_spent".to_string()]),
            ..Default::default()
        });
        assert_eq!(only_spends.len(), 1);

        log.mark_undone(spend, &UserId::new("alice"));
        let active = log.query(&HistoryQuery {
            include_undone: false,
            ..Default::default()
        });
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind.label(), "phase_changed");
    }

    #[test]
    fn test_latest_undoable_skips_locked_and_undone() {
        let mut log = ActionLog::new();
        let a = log.record(
            1,
            BattlePhase::BattleRounds,
            UserId::new("alice"),
            spend_kind(1),
            true,
        );
        let b = log.record(
            1,
            BattlePhase::BattleRounds,
            UserId::new("alice"),
            spend_kind(2),
            false,
        );

        // b is locked, so a is the latest undoable
        assert_eq!(log.latest_undoable().unwrap().id, a);
        let _ = b;

        log.mark_undone(a, &UserId::new("alice"));
        assert!(log.latest_undoable().is_none());
    }

    #[test]
    fn test_complexity_derived_from_variant() {
        assert_eq!(spend_kind(1).complexity(), UndoComplexity::Simple);
        assert_eq!(
            ActionKind::PhaseChanged {
                from: BattlePhase::GameSetup,
                to: BattlePhase::Deployment,
            }
            .complexity(),
            UndoComplexity::Cascade
        );
        assert_eq!(
            ActionKind::CommandPointsReset { previous: vec![] }.complexity(),
            UndoComplexity::Complex
        );
    }
}

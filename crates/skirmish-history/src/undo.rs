//! Undo engine
//!
//! Reverses history entries by replaying the "before" payload each
//! [`ActionKind`] variant captured when it was recorded. Single undo
//! targets one entry (the most recent undoable one by default); cascade
//! undo walks a caller-supplied list newest first and stops at the first
//! failure, reporting how far it got.

use crate::error::{Error, Result};
use skirmish_core::{
    refund_command_points, ActionEntry, ActionId, ActionKind, BattleState, UserId,
};

/// Outcome of a cascade undo; `undone` lists the entries reversed before
/// any failure occurred
#[derive(Debug)]
pub struct CascadeUndoResult {
    pub undone: Vec<ActionId>,
    /// The entry that stopped the cascade, with its error
    pub failure: Option<(ActionId, Error)>,
}

impl CascadeUndoResult {
    /// True when every requested entry was reversed
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

fn ensure_participant(state: &BattleState, caller: &UserId) -> Result<()> {
    if caller.is_system() || state.army_of_user(caller).is_some() {
        Ok(())
    } else {
        Err(Error::Engine(skirmish_core::Error::EntityNotFound(
            caller.to_string(),
        )))
    }
}

/// Undo one history entry.
///
/// Without an explicit id the most recent undoable entry is reversed.
/// Returns a snapshot of the entry after it was stamped as undone.
pub fn undo_action(
    state: &mut BattleState,
    caller: &UserId,
    action_id: Option<ActionId>,
) -> Result<ActionEntry> {
    ensure_participant(state, caller)?;

    let entry = match action_id {
        Some(id) => {
            let entry = state
                .history
                .get(id)
                .ok_or(Error::EntryNotFound(id))?;
            if entry.undone_at.is_some() {
                return Err(Error::AlreadyUndone(id));
            }
            if !entry.can_undo {
                return Err(Error::NotUndoable(id));
            }
            entry.clone()
        }
        None => state
            .history
            .latest_undoable()
            .cloned()
            .ok_or(Error::NothingToUndo)?,
    };

    apply_inverse(state, &entry.kind)?;
    state.history.mark_undone(entry.id, caller);
    log::info!("undid {} ({})", entry.kind.label(), entry.id);

    // Re-read so the returned snapshot carries the undone stamps
    state
        .history
        .get(entry.id)
        .cloned()
        .ok_or(Error::EntryNotFound(entry.id))
}

/// Undo a list of entries, newest first, stopping at the first failure.
pub fn undo_cascade(
    state: &mut BattleState,
    caller: &UserId,
    action_ids: &[ActionId],
) -> Result<CascadeUndoResult> {
    ensure_participant(state, caller)?;

    let mut ids: Vec<ActionId> = action_ids.to_vec();
    ids.sort();
    ids.dedup();
    ids.reverse();

    let mut undone = Vec::new();
    for id in ids {
        match undo_action(state, caller, Some(id)) {
            Ok(_) => undone.push(id),
            Err(err) => {
                log::warn!("cascade undo stopped at {id}: {err}");
                return Ok(CascadeUndoResult {
                    undone,
                    failure: Some((id, err)),
                });
            }
        }
    }
    Ok(CascadeUndoResult {
        undone,
        failure: None,
    })
}

fn apply_inverse(state: &mut BattleState, kind: &ActionKind) -> Result<()> {
    match kind {
        ActionKind::CommandPointsSpent {
            army_id,
            amount,
            purpose,
            ..
        } => {
            refund_command_points(state, army_id, *amount, format!("undo: {purpose}"))?;
        }
        ActionKind::CommandPointsReset { previous } => {
            for (army_id, total) in previous {
                state.army_mut(army_id)?.current_command_points = *total;
            }
        }
        ActionKind::MoraleTest {
            unit_id, before, ..
        }
        | ActionKind::DamageApplied {
            unit_id, before, ..
        } => {
            before.restore_onto(state.unit_mut(unit_id)?);
        }
        ActionKind::UnitActivated {
            unit_id,
            slot_index,
            cursor,
            previous_round_mark,
            previous_actions,
            previous_fatigued,
            ..
        } => {
            let unit = state.unit_mut(unit_id)?;
            unit.activated_in_round = *previous_round_mark;
            unit.actions_used = previous_actions.clone();
            unit.fatigued = *previous_fatigued;
            if let Some(slot) = state.activation.order.get_mut(*slot_index) {
                slot.activated_unit = None;
            }
            if let Some(pos) = state
                .activation
                .activated_units
                .iter()
                .rposition(|u| u == unit_id)
            {
                state.activation.activated_units.remove(pos);
            }
            cursor.restore_onto(&mut state.activation);
        }
        ActionKind::ActivationPassed {
            player,
            slot_index,
            cursor,
            newly_passed,
        } => {
            if let Some(slot) = state.activation.order.get_mut(*slot_index) {
                slot.passed = false;
            }
            if *newly_passed {
                state.activation.passed_players.retain(|p| p != player);
            }
            cursor.restore_onto(&mut state.activation);
        }
        ActionKind::RoundStarted {
            previous_round,
            previous_activation,
            previous_units,
            ..
        } => {
            state.current_round = *previous_round;
            state.activation = previous_activation.clone();
            for carry in previous_units {
                let unit = state.unit_mut(&carry.unit_id)?;
                unit.actions_used = carry.actions.clone();
                unit.fatigued = carry.fatigued;
                unit.spell_tokens = carry.spell_tokens;
            }
        }
        ActionKind::PhaseChanged { from, .. } => {
            state.phase = *from;
        }
    }
    Ok(())
}

//! Activation scheduler
//!
//! One Page Rules alternates activations: each round every surviving unit
//! acts exactly once, and the order interleaves the armies one unit at a
//! time so no army activates twice in a row while an opponent still has
//! eligible units. The order is computed once at round start and consumed
//! slot by slot; the interleave must be deterministic so replays and tests
//! agree on whose turn it is.

use crate::error::{Error, Result};
use crate::event::{BattleEvent, EventKind};
use crate::history::{ActionKind, ActivationCursor, RoundCarryover};
use crate::identity::{ArmyId, UnitId, UserId};
use crate::state::{Army, BattlePhase, BattleState, Unit};
use serde::{Deserialize, Serialize};

/// What a unit does with its activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitAction {
    Hold,
    Advance,
    Rush,
    Charge,
}

/// One position in the round's activation order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationSlot {
    /// The player whose turn this slot is
    pub player: UserId,
    pub army_id: ArmyId,
    /// 1-based position in the order
    pub turn_number: u32,
    /// The unit activated in this slot, once consumed
    pub activated_unit: Option<UnitId>,
    /// True when the slot was consumed by a pass instead of an activation
    pub passed: bool,
}

/// Scheduler state for the current round
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActivationState {
    /// True from round start until the next round starts
    pub in_progress: bool,
    /// 1-based turn about to be consumed
    pub current_turn: u32,
    /// Total slots in the order
    pub max_turns: u32,
    pub order: Vec<ActivationSlot>,
    /// Whose turn it is; `None` once the round completes
    pub activating_player: Option<UserId>,
    /// Units that already activated this round, in activation order
    pub activated_units: Vec<UnitId>,
    /// Players that passed at least one slot this round
    pub passed_players: Vec<UserId>,
    pub round_complete: bool,
}

impl ActivationState {
    /// State before any round has started
    pub fn idle() -> Self {
        Self::default()
    }

    /// The slot the current turn will consume
    pub fn current_slot(&self) -> Option<&ActivationSlot> {
        if !self.in_progress || self.round_complete {
            return None;
        }
        self.order.get(self.current_turn as usize - 1)
    }

    fn advance_cursor(&mut self) {
        self.current_turn += 1;
        if self.current_turn > self.max_turns {
            self.round_complete = true;
            self.activating_player = None;
        } else {
            self.activating_player = self
                .order
                .get(self.current_turn as usize - 1)
                .map(|s| s.player.clone());
        }
    }
}

/// Result of starting a round
#[derive(Debug, Clone)]
pub struct RoundStartResult {
    pub round: u32,
    pub next_activating_player: Option<UserId>,
    pub events: Vec<BattleEvent>,
}

/// Result of an activation or a pass
#[derive(Debug, Clone)]
pub struct ActivationResult {
    pub next_activating_player: Option<UserId>,
    pub round_complete: bool,
    pub events: Vec<BattleEvent>,
}

/// Build the round's activation order by interleaving each army's
/// surviving units one at a time, round-robin across armies in join
/// order. Destroyed units contribute no slots; armies that run out of
/// units drop out of later passes.
pub fn compute_activation_order(armies: &[Army]) -> Vec<ActivationSlot> {
    let counts: Vec<usize> = armies.iter().map(|a| a.eligible_unit_count()).collect();
    let max_units = counts.iter().copied().max().unwrap_or(0);

    let mut order = Vec::new();
    for pass in 1..=max_units {
        for (army, count) in armies.iter().zip(&counts) {
            if pass <= *count {
                order.push(ActivationSlot {
                    player: army.user_id.clone(),
                    army_id: army.army_id.clone(),
                    turn_number: order.len() as u32 + 1,
                    activated_unit: None,
                    passed: false,
                });
            }
        }
    }
    order
}

/// Tokens a caster unit gains each round, parsed from a `Caster(n)` tag
fn caster_rating(unit: &Unit) -> u32 {
    unit.special_rules
        .iter()
        .find_map(|rule| {
            rule.strip_prefix("Caster(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|n| n.parse().ok())
        })
        .unwrap_or(0)
}

/// Start a new round: bump the round counter, clear per-round unit
/// marks (declared actions, fatigue), grant caster tokens, and compute
/// a fresh activation order.
pub fn start_new_round(state: &mut BattleState, caller: &UserId) -> Result<RoundStartResult> {
    state.ensure_phase(BattlePhase::BattleRounds)?;
    if state.activation.in_progress && !state.activation.round_complete {
        return Err(Error::RoundAlreadyInProgress);
    }

    let previous_round = state.current_round;
    let previous_activation = state.activation.clone();
    let mut previous_units = Vec::new();
    for army in &mut state.armies {
        for unit in army.units.values_mut() {
            if unit.is_destroyed() {
                continue;
            }
            previous_units.push(RoundCarryover {
                unit_id: unit.unit_id.clone(),
                actions: std::mem::take(&mut unit.actions_used),
                fatigued: unit.fatigued,
                spell_tokens: unit.spell_tokens,
            });
            unit.fatigued = false;
            let rating = caster_rating(unit);
            if rating > 0 {
                // Token pools cap at 6 per the casting rules
                unit.spell_tokens = (unit.spell_tokens + rating).min(6);
            }
        }
    }

    state.current_round += 1;
    let round = state.current_round;

    let order = compute_activation_order(&state.armies);
    let max_turns = order.len() as u32;
    let next_player = order.first().map(|s| s.player.clone());
    state.activation = ActivationState {
        in_progress: true,
        current_turn: 1,
        max_turns,
        activating_player: next_player.clone(),
        // An order with no slots is a round that is already over
        round_complete: order.is_empty(),
        order,
        activated_units: Vec::new(),
        passed_players: Vec::new(),
    };
    log::info!("round {round} started with {max_turns} activation slots");

    state.history.record(
        round,
        state.phase,
        caller.clone(),
        ActionKind::RoundStarted {
            round,
            previous_round,
            previous_activation,
            previous_units,
        },
        true,
    );

    Ok(RoundStartResult {
        round,
        next_activating_player: next_player,
        events: vec![BattleEvent::new(
            round,
            state.phase,
            caller.clone(),
            EventKind::RoundStarted {
                round,
                total_turns: max_turns,
            },
        )],
    })
}

fn ensure_callers_turn(state: &BattleState, caller: &UserId) -> Result<usize> {
    if !state.activation.in_progress || state.activation.round_complete {
        return Err(Error::InvalidOperation(
            "no round is in progress".to_string(),
        ));
    }
    let slot = state
        .activation
        .current_slot()
        .ok_or_else(|| Error::InvalidOperation("no round is in progress".to_string()))?;
    if &slot.player != caller {
        return Err(Error::NotYourTurn);
    }
    Ok(state.activation.current_turn as usize - 1)
}

fn check_unit_eligible(unit: &Unit, slot_army: &ArmyId, owner: &ArmyId, round: u32) -> Result<()> {
    if owner != slot_army {
        return Err(Error::UnitNotEligible {
            unit: unit.unit_id.clone(),
            reason: "unit does not belong to the activating army".to_string(),
        });
    }
    if unit.is_destroyed() {
        return Err(Error::UnitNotEligible {
            unit: unit.unit_id.clone(),
            reason: "unit is destroyed".to_string(),
        });
    }
    if unit.has_activated_in(round) {
        return Err(Error::UnitAlreadyActivated(unit.unit_id.clone()));
    }
    Ok(())
}

/// Activate a unit in the caller's current turn slot.
///
/// Shaken and routed units may still activate (typically to do nothing
/// useful); only destroyed units are excluded.
pub fn activate_unit(
    state: &mut BattleState,
    caller: &UserId,
    unit_id: &UnitId,
    actions: Vec<UnitAction>,
) -> Result<ActivationResult> {
    state.ensure_phase(BattlePhase::BattleRounds)?;
    let slot_index = ensure_callers_turn(state, caller)?;

    let round = state.current_round;
    let slot_army = state.activation.order[slot_index].army_id.clone();
    let (owner_army, _) = state.owner_of_unit(unit_id)?;
    let owner_army = owner_army.clone();
    check_unit_eligible(state.unit(unit_id)?, &slot_army, &owner_army, round)?;

    let cursor = ActivationCursor::capture(&state.activation);
    let turn = state.activation.current_turn;

    let unit = state.unit_mut(unit_id)?;
    let previous_round_mark = unit.activated_in_round;
    let previous_fatigued = unit.fatigued;
    let previous_actions = std::mem::replace(&mut unit.actions_used, actions.clone());
    unit.activated_in_round = round;
    // Charging into melee fatigues the unit until the next round
    if actions.contains(&UnitAction::Charge) {
        unit.fatigued = true;
    }

    state.activation.order[slot_index].activated_unit = Some(unit_id.clone());
    state.activation.activated_units.push(unit_id.clone());
    state.activation.advance_cursor();
    log::debug!("{unit_id} activated on turn {turn} of round {round}");

    state.history.record(
        round,
        state.phase,
        caller.clone(),
        ActionKind::UnitActivated {
            unit_id: unit_id.clone(),
            actions: actions.clone(),
            slot_index,
            cursor,
            previous_round_mark,
            previous_actions,
            previous_fatigued,
        },
        true,
    );

    Ok(ActivationResult {
        next_activating_player: state.activation.activating_player.clone(),
        round_complete: state.activation.round_complete,
        events: vec![BattleEvent::new(
            round,
            state.phase,
            caller.clone(),
            EventKind::UnitActivated {
                unit_id: unit_id.clone(),
                turn,
                actions,
            },
        )],
    })
}

/// Consume the caller's current turn slot without activating a unit.
pub fn pass_activation(
    state: &mut BattleState,
    caller: &UserId,
    reason: Option<String>,
) -> Result<ActivationResult> {
    state.ensure_phase(BattlePhase::BattleRounds)?;
    let slot_index = ensure_callers_turn(state, caller)?;

    let round = state.current_round;
    let cursor = ActivationCursor::capture(&state.activation);
    let turn = state.activation.current_turn;

    state.activation.order[slot_index].passed = true;
    let newly_passed = !state.activation.passed_players.contains(caller);
    if newly_passed {
        state.activation.passed_players.push(caller.clone());
    }
    state.activation.advance_cursor();
    log::debug!("{caller} passed turn {turn} of round {round}");

    state.history.record(
        round,
        state.phase,
        caller.clone(),
        ActionKind::ActivationPassed {
            player: caller.clone(),
            slot_index,
            cursor,
            newly_passed,
        },
        true,
    );

    Ok(ActivationResult {
        next_activating_player: state.activation.activating_player.clone(),
        round_complete: state.activation.round_complete,
        events: vec![BattleEvent::new(
            round,
            state.phase,
            caller.clone(),
            EventKind::ActivationPassed {
                player: caller.clone(),
                turn,
                reason,
            },
        )],
    })
}

/// Units the given user could activate right now
pub fn available_units_for_activation<'a>(
    state: &'a BattleState,
    user: &UserId,
) -> Vec<&'a Unit> {
    let round = state.current_round;
    state
        .army_of_user(user)
        .map(|army| {
            army.surviving_units()
                .filter(|u| !u.has_activated_in(round))
                .collect()
        })
        .unwrap_or_default()
}

/// The full activation order for the current round
pub fn activation_order(state: &BattleState) -> &[ActivationSlot] {
    &state.activation.order
}

/// Point-in-time summary of the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationStatus {
    pub in_progress: bool,
    pub current_turn: u32,
    pub max_turns: u32,
    pub activating_player: Option<UserId>,
    /// Units that have activated so far this round
    pub activated_count: u32,
    pub round_complete: bool,
}

/// Where the current round stands
pub fn activation_status(state: &BattleState) -> ActivationStatus {
    let activation = &state.activation;
    ActivationStatus {
        in_progress: activation.in_progress,
        current_turn: activation.current_turn,
        max_turns: activation.max_turns,
        activating_player: activation.activating_player.clone(),
        activated_count: activation.activated_units.len() as u32,
        round_complete: activation.round_complete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Model;

    fn unit(id: &str) -> Unit {
        Unit::new(id, "Squad", vec![Model::new(format!("{id}-m1"), "Trooper", 4, 1)])
    }

    fn two_army_battle(alice_units: usize, bob_units: usize) -> BattleState {
        let mut state = BattleState::new("b1");
        let mut a1 = Army::new("a1", "alice", "Raiders", "Orcs", 1000);
        for i in 0..alice_units {
            a1.add_unit(unit(&format!("au{i}")));
        }
        let mut a2 = Army::new("a2", "bob", "Defenders", "Elves", 1000);
        for i in 0..bob_units {
            a2.add_unit(unit(&format!("bu{i}")));
        }
        state.add_army(a1).unwrap();
        state.add_army(a2).unwrap();
        state.start(&UserId::new("alice")).unwrap();
        state.advance_phase(&UserId::new("alice")).unwrap();
        state
    }

    #[test]
    fn test_order_interleaves_armies() {
        let state = two_army_battle(3, 2);
        let order = compute_activation_order(&state.armies);
        let players: Vec<&str> = order.iter().map(|s| s.player.as_str()).collect();
        // Bob drops out once his two units are placed
        assert_eq!(players, vec!["alice", "bob", "alice", "bob", "alice"]);
        assert_eq!(order.last().unwrap().turn_number, 5);
    }

    #[test]
    fn test_order_excludes_destroyed_units() {
        let mut state = two_army_battle(2, 2);
        state.unit_mut(&UnitId::new("au0")).unwrap().destroy();
        let order = compute_activation_order(&state.armies);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn test_start_round_twice_fails() {
        let mut state = two_army_battle(1, 1);
        let result = start_new_round(&mut state, &UserId::new("alice")).unwrap();
        assert_eq!(result.round, 1);
        assert_eq!(
            result.next_activating_player.as_ref().unwrap().as_str(),
            "alice"
        );

        assert!(matches!(
            start_new_round(&mut state, &UserId::new("alice")),
            Err(Error::RoundAlreadyInProgress)
        ));
    }

    #[test]
    fn test_out_of_turn_activation_fails() {
        let mut state = two_army_battle(1, 1);
        start_new_round(&mut state, &UserId::new("alice")).unwrap();

        // Alice is at the head of the order, Bob must wait
        assert!(matches!(
            activate_unit(
                &mut state,
                &UserId::new("bob"),
                &UnitId::new("bu0"),
                vec![UnitAction::Hold],
            ),
            Err(Error::NotYourTurn)
        ));
    }

    #[test]
    fn test_full_round_flow() {
        let mut state = two_army_battle(2, 1);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        start_new_round(&mut state, &alice).unwrap();

        let result = activate_unit(&mut state, &alice, &UnitId::new("au0"), vec![UnitAction::Advance]).unwrap();
        assert_eq!(result.next_activating_player.as_ref().unwrap().as_str(), "bob");
        assert!(!result.round_complete);

        // The same unit cannot act twice in a round
        let result = activate_unit(&mut state, &bob, &UnitId::new("bu0"), vec![UnitAction::Hold]).unwrap();
        assert!(!result.round_complete);
        assert!(matches!(
            activate_unit(&mut state, &alice, &UnitId::new("au0"), vec![UnitAction::Hold]),
            Err(Error::UnitAlreadyActivated(_))
        ));

        let result = activate_unit(&mut state, &alice, &UnitId::new("au1"), vec![UnitAction::Charge]).unwrap();
        assert!(result.round_complete);
        assert!(result.next_activating_player.is_none());

        // Next round resets per-round marks
        start_new_round(&mut state, &alice).unwrap();
        assert!(activate_unit(&mut state, &alice, &UnitId::new("au0"), vec![UnitAction::Hold]).is_ok());
    }

    #[test]
    fn test_cannot_activate_opponents_unit() {
        let mut state = two_army_battle(1, 1);
        let alice = UserId::new("alice");
        start_new_round(&mut state, &alice).unwrap();

        assert!(matches!(
            activate_unit(&mut state, &alice, &UnitId::new("bu0"), vec![UnitAction::Hold]),
            Err(Error::UnitNotEligible { .. })
        ));
    }

    #[test]
    fn test_pass_consumes_slot() {
        let mut state = two_army_battle(1, 1);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        start_new_round(&mut state, &alice).unwrap();

        let result = pass_activation(&mut state, &alice, Some("no eligible units".to_string())).unwrap();
        assert_eq!(result.next_activating_player.as_ref().unwrap().as_str(), "bob");
        assert!(state.activation.passed_players.contains(&alice));
        assert!(state.activation.order[0].passed);

        let result = pass_activation(&mut state, &bob, None).unwrap();
        assert!(result.round_complete);
    }

    #[test]
    fn test_routed_units_remain_activatable() {
        let mut state = two_army_battle(1, 1);
        let alice = UserId::new("alice");
        start_new_round(&mut state, &alice).unwrap();
        state.unit_mut(&UnitId::new("au0")).unwrap().routed = true;

        assert!(activate_unit(&mut state, &alice, &UnitId::new("au0"), vec![UnitAction::Hold]).is_ok());
    }

    #[test]
    fn test_status_tracks_round_progress() {
        let mut state = two_army_battle(1, 1);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        let status = activation_status(&state);
        assert!(!status.in_progress);
        assert!(status.activating_player.is_none());

        start_new_round(&mut state, &alice).unwrap();
        let status = activation_status(&state);
        assert!(status.in_progress);
        assert_eq!(status.current_turn, 1);
        assert_eq!(status.max_turns, 2);
        assert_eq!(status.activating_player.as_ref().unwrap().as_str(), "alice");
        assert_eq!(status.activated_count, 0);

        activate_unit(&mut state, &alice, &UnitId::new("au0"), vec![UnitAction::Hold]).unwrap();
        let status = activation_status(&state);
        assert_eq!(status.current_turn, 2);
        assert_eq!(status.activated_count, 1);
        assert!(!status.round_complete);

        pass_activation(&mut state, &bob, None).unwrap();
        let status = activation_status(&state);
        assert!(status.round_complete);
        assert!(status.activating_player.is_none());
    }

    #[test]
    fn test_charge_fatigues_until_next_round() {
        let mut state = two_army_battle(1, 1);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        start_new_round(&mut state, &alice).unwrap();

        activate_unit(&mut state, &alice, &UnitId::new("au0"), vec![UnitAction::Charge]).unwrap();
        assert!(state.unit(&UnitId::new("au0")).unwrap().fatigued);

        pass_activation(&mut state, &bob, None).unwrap();
        start_new_round(&mut state, &alice).unwrap();
        assert!(!state.unit(&UnitId::new("au0")).unwrap().fatigued);
    }

    #[test]
    fn test_casters_gain_tokens_at_round_start_capped() {
        let mut state = two_army_battle(1, 1);
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");
        state
            .unit_mut(&UnitId::new("au0"))
            .unwrap()
            .special_rules
            .push("Caster(2)".to_string());

        start_new_round(&mut state, &alice).unwrap();
        assert_eq!(state.unit(&UnitId::new("au0")).unwrap().spell_tokens, 2);

        for _ in 0..3 {
            activate_unit(&mut state, &alice, &UnitId::new("au0"), vec![UnitAction::Hold])
                .unwrap();
            pass_activation(&mut state, &bob, None).unwrap();
            start_new_round(&mut state, &alice).unwrap();
        }
        // Token pool caps at 6
        assert_eq!(state.unit(&UnitId::new("au0")).unwrap().spell_tokens, 6);
        // Non-casters gain nothing
        assert_eq!(state.unit(&UnitId::new("bu0")).unwrap().spell_tokens, 0);
    }

    #[test]
    fn test_available_units_projection() {
        let mut state = two_army_battle(2, 1);
        let alice = UserId::new("alice");
        start_new_round(&mut state, &alice).unwrap();
        assert_eq!(available_units_for_activation(&state, &alice).len(), 2);

        activate_unit(&mut state, &alice, &UnitId::new("au0"), vec![UnitAction::Hold]).unwrap();
        assert_eq!(available_units_for_activation(&state, &alice).len(), 1);

        state.unit_mut(&UnitId::new("au1")).unwrap().destroy();
        assert!(available_units_for_activation(&state, &alice).is_empty());
    }
}

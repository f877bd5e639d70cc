//! Morale and quality state machine
//!
//! Applies resolved test outcomes to unit and model state. Units escalate
//! through `Steady -> Shaken -> Routed -> Destroyed` on failed morale
//! tests; quality tests are pass/fail checks that never touch morale
//! flags. Every test produces a [`BattleEvent`] for broadcast, and state
//! changing tests append a history entry with the unit's prior condition.

use crate::dice::{describe_test, resolve_test, roll_or_forced, TestOutcome};
use crate::error::{Error, Result};
use crate::event::{BattleEvent, EventKind};
use crate::history::{ActionKind, UnitCondition};
use crate::identity::{ModelId, UnitId, UserId};
use crate::state::{BattleState, Unit};
use crate::DiceRng;
use serde::{Deserialize, Serialize};

/// Morale condition of a unit, derived from its flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoraleState {
    Steady,
    Shaken,
    Routed,
}

/// Unit-level test types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoraleTestKind {
    /// Standard morale test; failures escalate the unit's state
    Morale,
    /// Pass/fail check for ability use; never alters morale state
    Quality,
    /// Recovery attempt for a routed unit; success clears shaken and routed
    RoutRecovery,
    /// Taken when activating under certain rules; failure marks the unit shaken
    Activation,
}

/// Model-level quality test types; the caller decides what pass/fail implies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTestKind {
    Activation,
    SpecialAbility,
    InstantKill,
    SpellResist,
}

/// Result of a unit-level morale test
#[derive(Debug, Clone)]
pub struct MoraleTestResult {
    pub outcome: TestOutcome,
    /// Unit flags after the test
    pub shaken: bool,
    pub routed: bool,
    /// True when a shaken or routed unit returned to a better state
    pub recovered: bool,
    /// True when the failure destroyed the unit
    pub destroyed: bool,
    pub description: String,
    pub events: Vec<BattleEvent>,
}

/// Result of a model-level quality test
#[derive(Debug, Clone)]
pub struct QualityTestResult {
    pub outcome: TestOutcome,
    pub description: String,
    pub event: BattleEvent,
}

impl MoraleTestKind {
    /// Label used in test descriptions
    pub fn label(&self) -> &'static str {
        match self {
            MoraleTestKind::Morale => "Morale",
            MoraleTestKind::Quality => "Quality",
            MoraleTestKind::RoutRecovery => "Rout recovery",
            MoraleTestKind::Activation => "Activation",
        }
    }
}

/// Sum of situational morale modifiers for a unit.
///
/// All contributions are additive: `-1` while shaken, `-2` while routed,
/// `-1` at half strength or below, `+2` for Fearless, `+1` for Stubborn.
pub fn morale_test_modifier(unit: &Unit) -> i32 {
    let mut modifier = 0;
    if unit.shaken {
        modifier -= 1;
    }
    if unit.routed {
        modifier -= 2;
    }
    // Half strength rounds up: a 5-man unit is at half strength at 3 lost
    if unit.current_size <= unit.original_size.div_ceil(2) {
        modifier -= 1;
    }
    if unit.has_rule("Fearless") {
        modifier += 2;
    }
    if unit.has_rule("Stubborn") {
        modifier += 1;
    }
    modifier
}

/// Whether a unit owes a morale test after taking casualties
pub fn should_take_morale_test(unit: &Unit, models_lost: u32) -> bool {
    models_lost > 0 || unit.shaken || unit.routed
}

/// Whether a routed unit can attempt recovery
pub fn should_take_rout_recovery_test(unit: &Unit) -> bool {
    unit.routed && unit.current_size > 0
}

/// Perform a unit-level test and apply the state transition it implies.
///
/// The target number is the best quality among the unit's surviving
/// models. A `None` modifier means "use the situational modifiers for the
/// unit's current condition"; pass `Some` to override. Tests mutate state
/// only for the `Morale`, `RoutRecovery`, and `Activation` kinds.
pub fn perform_morale_test(
    state: &mut BattleState,
    caller: &UserId,
    unit_id: &UnitId,
    kind: MoraleTestKind,
    modifier: Option<i32>,
    reason: &str,
    forced_roll: Option<u8>,
    rng: &mut DiceRng,
) -> Result<MoraleTestResult> {
    state.ensure_active()?;

    let round = state.current_round;
    let phase = state.phase;

    let unit = state.unit(unit_id)?;
    if unit.is_destroyed() {
        return Err(Error::InvalidTestOnDestroyedEntity(unit_id.to_string()));
    }
    if kind == MoraleTestKind::RoutRecovery && !unit.routed {
        return Err(Error::InvalidOperation(format!(
            "unit {unit_id} is not routed; rout recovery does not apply"
        )));
    }

    let target = unit.best_quality();
    let modifier = modifier.unwrap_or_else(|| morale_test_modifier(unit));
    let before = UnitCondition::capture(unit);
    let was = unit.morale_state();

    let roll = roll_or_forced(rng, forced_roll);
    let outcome = resolve_test(target, modifier, roll);

    let unit = state.unit_mut(unit_id)?;
    let mut recovered = false;
    let mut destroyed = false;
    match (kind, outcome.passed, was) {
        (MoraleTestKind::Quality, _, _) => {}
        (MoraleTestKind::Morale, true, MoraleState::Shaken) => {
            unit.shaken = false;
            recovered = true;
        }
        (MoraleTestKind::Morale, true, _) => {}
        (MoraleTestKind::Morale, false, MoraleState::Steady) => unit.shaken = true,
        (MoraleTestKind::Morale, false, MoraleState::Shaken) => unit.routed = true,
        (MoraleTestKind::Morale, false, MoraleState::Routed) => {
            unit.destroy();
            destroyed = true;
        }
        (MoraleTestKind::RoutRecovery, true, _) => {
            unit.shaken = false;
            unit.routed = false;
            recovered = true;
        }
        (MoraleTestKind::RoutRecovery, false, _) => {}
        (MoraleTestKind::Activation, false, _) => unit.shaken = true,
        (MoraleTestKind::Activation, true, _) => {}
    }

    let shaken = unit.shaken;
    let routed = unit.routed;
    let description = describe_test(kind.label(), reason, &outcome);
    log::info!("{unit_id}: {description}");

    let mut events = vec![BattleEvent::new(
        round,
        phase,
        caller.clone(),
        EventKind::MoraleTestResult {
            unit_id: unit_id.clone(),
            test: kind,
            roll: outcome.roll,
            modifier: outcome.modifier,
            total: outcome.total,
            target: outcome.target,
            passed: outcome.passed,
            shaken,
            routed,
            destroyed,
        },
    )];
    if destroyed {
        events.push(BattleEvent::new(
            round,
            phase,
            caller.clone(),
            EventKind::UnitDestroyed {
                unit_id: unit_id.clone(),
            },
        ));
    } else if routed && was != MoraleState::Routed {
        events.push(BattleEvent::new(
            round,
            phase,
            caller.clone(),
            EventKind::UnitRouted {
                unit_id: unit_id.clone(),
            },
        ));
    } else if shaken && was == MoraleState::Steady {
        events.push(BattleEvent::new(
            round,
            phase,
            caller.clone(),
            EventKind::UnitShaken {
                unit_id: unit_id.clone(),
            },
        ));
    }

    // Quality tests touched nothing, so there is nothing to undo
    if kind != MoraleTestKind::Quality {
        state.history.record(
            round,
            phase,
            caller.clone(),
            ActionKind::MoraleTest {
                unit_id: unit_id.clone(),
                test: kind,
                passed: outcome.passed,
                before,
            },
            true,
        );
    }

    Ok(MoraleTestResult {
        outcome,
        shaken,
        routed,
        recovered,
        destroyed,
        description,
        events,
    })
}

/// Perform a model-level quality test against the model's own quality.
///
/// Never mutates state; the caller decides what the pass/fail implies.
pub fn perform_quality_test(
    state: &BattleState,
    caller: &UserId,
    unit_id: &UnitId,
    model_id: &ModelId,
    kind: QualityTestKind,
    modifier: i32,
    reason: &str,
    forced_roll: Option<u8>,
    rng: &mut DiceRng,
) -> Result<QualityTestResult> {
    state.ensure_active()?;

    let unit = state.unit(unit_id)?;
    let model = unit
        .all_models()
        .find(|m| &m.model_id == model_id)
        .ok_or_else(|| Error::EntityNotFound(model_id.to_string()))?;
    if model.destroyed {
        return Err(Error::InvalidTestOnDestroyedEntity(model_id.to_string()));
    }

    let roll = roll_or_forced(rng, forced_roll);
    let outcome = resolve_test(model.quality, modifier, roll);
    let description = describe_test("Quality", reason, &outcome);
    log::info!("{model_id}: {description}");

    let event = BattleEvent::new(
        state.current_round,
        state.phase,
        caller.clone(),
        EventKind::QualityTestResult {
            unit_id: unit_id.clone(),
            model_id: model_id.clone(),
            test: kind,
            roll: outcome.roll,
            modifier: outcome.modifier,
            total: outcome.total,
            target: outcome.target,
            passed: outcome.passed,
        },
    );

    Ok(QualityTestResult {
        outcome,
        description,
        event,
    })
}

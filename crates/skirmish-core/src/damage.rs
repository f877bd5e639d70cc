//! Damage application
//!
//! Wounds land on one model at a time and spill over to the next when a
//! model is destroyed. Regular models absorb wounds before a joined hero
//! unless the caller targets a specific model. Destroying models shrinks
//! the unit and usually obliges a follow-up morale test; the engine
//! reports that obligation but leaves taking the test to the caller.

use crate::error::{Error, Result};
use crate::event::{BattleEvent, EventKind};
use crate::history::{ActionKind, UnitCondition};
use crate::identity::{ModelId, UnitId, UserId};
use crate::morale::should_take_morale_test;
use crate::state::BattleState;

/// Outcome of applying damage to a unit
#[derive(Debug, Clone)]
pub struct DamageResult {
    /// Models destroyed by this application
    pub models_destroyed: Vec<ModelId>,
    /// Unit size after the damage
    pub remaining_size: u32,
    /// True when the whole unit was destroyed
    pub unit_destroyed: bool,
    /// True when the unit now owes a morale test
    pub morale_test_required: bool,
    pub events: Vec<BattleEvent>,
}

/// Apply wounds to a unit.
///
/// With `target_model` the wounds go to that model first; otherwise they
/// fall on regular models in list order, the joined hero last. Excess
/// wounds spill to the next model in the same order.
pub fn apply_damage(
    state: &mut BattleState,
    caller: &UserId,
    unit_id: &UnitId,
    damage: u32,
    target_model: Option<&ModelId>,
) -> Result<DamageResult> {
    state.ensure_active()?;
    if damage == 0 {
        return Err(Error::InvalidOperation(
            "cannot apply zero damage".to_string(),
        ));
    }

    let round = state.current_round;
    let phase = state.phase;

    let unit = state.unit(unit_id)?;
    if unit.is_destroyed() {
        return Err(Error::InvalidTestOnDestroyedEntity(unit_id.to_string()));
    }
    if let Some(model_id) = target_model {
        if !unit.all_models().any(|m| &m.model_id == model_id) {
            return Err(Error::EntityNotFound(model_id.to_string()));
        }
    }
    let before = UnitCondition::capture(unit);

    let unit = state.unit_mut(unit_id)?;
    let mut remaining = damage;
    let mut destroyed = Vec::new();

    // Allocation order: targeted model, then regular models, hero last
    let mut order: Vec<ModelId> = Vec::new();
    if let Some(model_id) = target_model {
        order.push(model_id.clone());
    }
    for model in unit.models.iter().chain(unit.joined_hero.iter()) {
        if Some(&model.model_id) != target_model {
            order.push(model.model_id.clone());
        }
    }

    for model_id in &order {
        if remaining == 0 {
            break;
        }
        let hit = unit
            .all_models_mut()
            .find(|m| &m.model_id == model_id && !m.destroyed)
            .map(|model| {
                let absorbed = remaining.min(model.current_tough);
                (absorbed, model.apply_wounds(absorbed))
            });
        if let Some((absorbed, newly_destroyed)) = hit {
            remaining -= absorbed;
            if newly_destroyed {
                destroyed.push(model_id.clone());
                unit.current_size = unit.current_size.saturating_sub(1);
            }
        }
    }

    let remaining_size = unit.current_size;
    let unit_destroyed = unit.is_destroyed();
    let morale_test_required =
        !unit_destroyed && should_take_morale_test(unit, destroyed.len() as u32);
    log::info!(
        "{unit_id} took {damage} damage ({} models destroyed, {remaining_size} left)",
        destroyed.len()
    );

    let mut events = vec![BattleEvent::new(
        round,
        phase,
        caller.clone(),
        EventKind::DamageApplied {
            unit_id: unit_id.clone(),
            damage,
            models_destroyed: destroyed.len() as u32,
        },
    )];
    for model_id in &destroyed {
        events.push(BattleEvent::new(
            round,
            phase,
            caller.clone(),
            EventKind::ModelDestroyed {
                unit_id: unit_id.clone(),
                model_id: model_id.clone(),
            },
        ));
    }
    if unit_destroyed {
        events.push(BattleEvent::new(
            round,
            phase,
            caller.clone(),
            EventKind::UnitDestroyed {
                unit_id: unit_id.clone(),
            },
        ));
    }

    state.history.record(
        round,
        phase,
        caller.clone(),
        ActionKind::DamageApplied {
            unit_id: unit_id.clone(),
            damage,
            before,
        },
        true,
    );

    Ok(DamageResult {
        models_destroyed: destroyed,
        remaining_size,
        unit_destroyed,
        morale_test_required,
        events,
    })
}

//! Command point ledger
//!
//! Command points are a per-army resource spent on rerolls and stratagem
//! style effects. The allotment calculation is a pure function of army
//! points and the chosen method; spending is the only operation here that
//! mutates shared state, and it is all-or-nothing within the enclosing
//! [`BattleState`] update.

use crate::error::{Error, Result};
use crate::event::{BattleEvent, EventKind};
use crate::history::ActionKind;
use crate::identity::{ArmyId, UnitId, UserId};
use crate::state::BattleState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an army's command point pool is generated and refreshed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CommandPointMethod {
    /// Full pool once per battle
    #[default]
    Fixed,
    /// Pool grows by the allotment each round
    Growing,
    /// Allotment each round, unspent points discarded at round end
    Temporary,
    /// Fixed pool scaled by a D3 roll
    FixedRandom,
    /// Growing allotment scaled by a D3 roll
    GrowingRandom,
    /// Temporary allotment scaled by a D3 roll
    TemporaryRandom,
}

impl CommandPointMethod {
    /// Base command points per full 1000 army points
    pub fn rate(&self) -> f64 {
        match self {
            CommandPointMethod::Fixed => 4.0,
            CommandPointMethod::Growing | CommandPointMethod::Temporary => 1.0,
            CommandPointMethod::FixedRandom => 2.0,
            CommandPointMethod::GrowingRandom | CommandPointMethod::TemporaryRandom => 0.5,
        }
    }

    /// Whether the allotment is scaled by a D3 roll
    pub fn is_random(&self) -> bool {
        matches!(
            self,
            CommandPointMethod::FixedRandom
                | CommandPointMethod::GrowingRandom
                | CommandPointMethod::TemporaryRandom
        )
    }

    /// Whether unspent points are discarded at round end
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            CommandPointMethod::Temporary | CommandPointMethod::TemporaryRandom
        )
    }
}

/// Result of the pure allotment calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPointCalculation {
    pub base: u32,
    pub bonus: u32,
    pub total: u32,
    /// Human-readable breakdown of the arithmetic
    pub steps: Vec<String>,
    /// True when the method is random and no D3 roll was supplied
    pub requires_d3: bool,
}

/// One spend or refund against an army's pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandPointTransaction {
    /// Negative for spends, positive for refunds
    pub delta: i64,
    pub purpose: String,
    pub target_unit: Option<UnitId>,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a successful spend
#[derive(Debug, Clone)]
pub struct CommandPointSpendResult {
    pub remaining: u32,
    pub events: Vec<BattleEvent>,
}

/// Calculate an army's command point allotment.
///
/// Base is `floor(armyPoints / 1000) * rate`; half-point rates round the
/// product up so small armies still get at least their fraction. Random
/// methods multiply the base by a caller-supplied D3 roll; without one the
/// unscaled base is returned and `requires_d3` is set.
pub fn calculate_command_points(
    army_points: u32,
    method: CommandPointMethod,
    bonus: u32,
    d3_roll: Option<u8>,
) -> CommandPointCalculation {
    let thousands = army_points / 1000;
    let rate = method.rate();
    let mut base = (f64::from(thousands) * rate).ceil() as u32;

    let mut steps = vec![
        format!("army points: {army_points}"),
        format!("base: floor({army_points}/1000) x {rate} = {base}"),
    ];

    let rolled = method.is_random() && matches!(d3_roll, Some(1..=3));
    if rolled {
        let roll = u32::from(d3_roll.unwrap_or(1));
        base *= roll;
        steps.push(format!("d3 roll: {roll} (multiplier applied)"));
    } else if method.is_random() {
        steps.push("random method requires a d3 roll".to_string());
    }

    let total = base + bonus;
    if bonus > 0 {
        steps.push(format!("bonus: +{bonus}"));
    }
    steps.push(format!("total: {total}"));

    CommandPointCalculation {
        base,
        bonus,
        total,
        steps,
        requires_d3: method.is_random() && !rolled,
    }
}

/// Spend command points from an army the caller controls.
///
/// Fails before any mutation; on success decrements the pool, appends a
/// ledger transaction and a history entry, and returns the new total with
/// the broadcast event.
pub fn spend_command_points(
    state: &mut BattleState,
    caller: &UserId,
    army_id: &ArmyId,
    amount: u32,
    purpose: impl Into<String>,
    target_unit: Option<UnitId>,
) -> Result<CommandPointSpendResult> {
    state.ensure_active()?;
    if amount == 0 {
        return Err(Error::InvalidOperation(
            "cannot spend zero command points".to_string(),
        ));
    }

    let round = state.current_round;
    let phase = state.phase;
    let purpose = purpose.into();

    let army = state.army(army_id)?;
    // Spending is owner-only; other participants do not see the army here
    if &army.user_id != caller {
        return Err(Error::EntityNotFound(army_id.to_string()));
    }
    if amount > army.current_command_points {
        return Err(Error::InsufficientCommandPoints {
            available: army.current_command_points,
            required: amount,
        });
    }

    let army = state.army_mut(army_id)?;
    army.current_command_points -= amount;
    let remaining = army.current_command_points;
    army.cp_ledger.push(CommandPointTransaction {
        delta: -i64::from(amount),
        purpose: purpose.clone(),
        target_unit: target_unit.clone(),
        round,
        timestamp: Utc::now(),
    });
    log::info!("{army_id} spent {amount} CP for {purpose} ({remaining} left)");

    state.history.record(
        round,
        phase,
        caller.clone(),
        ActionKind::CommandPointsSpent {
            army_id: army_id.clone(),
            amount,
            purpose: purpose.clone(),
            target_unit,
        },
        true,
    );

    Ok(CommandPointSpendResult {
        remaining,
        events: vec![BattleEvent::new(
            round,
            phase,
            caller.clone(),
            EventKind::CommandPointsSpent {
                army_id: army_id.clone(),
                amount,
                purpose,
                remaining,
            },
        )],
    })
}

/// Return points to an army's pool, capped at its maximum.
///
/// Used by the undo path; appends a ledger transaction but no history
/// entry of its own. Returns the new total.
pub fn refund_command_points(
    state: &mut BattleState,
    army_id: &ArmyId,
    amount: u32,
    purpose: impl Into<String>,
) -> Result<u32> {
    let round = state.current_round;
    let army = state.army_mut(army_id)?;
    let restored = (army.current_command_points + amount).min(army.max_command_points);
    let credited = restored - army.current_command_points;
    army.current_command_points = restored;
    army.cp_ledger.push(CommandPointTransaction {
        delta: i64::from(credited),
        purpose: purpose.into(),
        target_unit: None,
        round,
        timestamp: Utc::now(),
    });
    Ok(restored)
}

/// Reset every army's pool to its maximum; used at round boundaries for
/// temporary methods.
pub fn reset_command_points(state: &mut BattleState, caller: &UserId) -> Result<Vec<BattleEvent>> {
    state.ensure_active()?;

    let previous: Vec<(ArmyId, u32)> = state
        .armies
        .iter()
        .map(|a| (a.army_id.clone(), a.current_command_points))
        .collect();
    for army in &mut state.armies {
        army.current_command_points = army.max_command_points;
    }
    log::info!("command points reset for {} armies", previous.len());

    state.history.record(
        state.current_round,
        state.phase,
        caller.clone(),
        ActionKind::CommandPointsReset { previous },
        true,
    );

    Ok(vec![BattleEvent::new(
        state.current_round,
        state.phase,
        caller.clone(),
        EventKind::CommandPointsReset,
    )])
}

/// Ledger transactions for an army, newest first.
///
/// Access-checked: only the controlling player (or the system user) may
/// read an army's ledger. As with spending, an army the caller does not
/// control is reported as not found rather than as access denied.
pub fn command_point_history<'a>(
    state: &'a BattleState,
    caller: &UserId,
    army_id: &ArmyId,
) -> Result<Vec<&'a CommandPointTransaction>> {
    let army = state.army(army_id)?;
    if &army.user_id != caller && !caller.is_system() {
        return Err(Error::EntityNotFound(army_id.to_string()));
    }
    Ok(army.cp_ledger.iter().rev().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Army;

    fn battle_with_army(points: u32, cp: u32) -> BattleState {
        let mut state = BattleState::new("b1");
        state
            .add_army(Army::new("a1", "alice", "Raiders", "Orcs", points).with_command_points(cp))
            .unwrap();
        state.start(&UserId::new("alice")).unwrap();
        state
    }

    #[test]
    fn test_calculation_per_method() {
        // 2000-point army: fixed gives 4/1000
        let calc = calculate_command_points(2000, CommandPointMethod::Fixed, 0, None);
        assert_eq!(calc.base, 8);
        assert_eq!(calc.total, 8);
        assert!(!calc.requires_d3);

        // Partial thousands are floored away
        let calc = calculate_command_points(1999, CommandPointMethod::Fixed, 0, None);
        assert_eq!(calc.base, 4);

        // Half-point rates round the product up
        let calc = calculate_command_points(1000, CommandPointMethod::GrowingRandom, 0, Some(2));
        assert_eq!(calc.base, 2);

        // Random method without a roll reports the unscaled base
        let calc = calculate_command_points(2000, CommandPointMethod::FixedRandom, 0, None);
        assert_eq!(calc.base, 4);
        assert!(calc.requires_d3);

        let calc = calculate_command_points(2000, CommandPointMethod::FixedRandom, 1, Some(3));
        assert_eq!(calc.base, 12);
        assert_eq!(calc.total, 13);
    }

    #[test]
    fn test_spend_and_insufficient() {
        let mut state = battle_with_army(1000, 4);
        let alice = UserId::new("alice");
        let a1 = ArmyId::new("a1");

        let result = spend_command_points(&mut state, &alice, &a1, 3, "reroll", None).unwrap();
        assert_eq!(result.remaining, 1);
        assert_eq!(state.army(&a1).unwrap().cp_ledger.len(), 1);
        assert_eq!(state.army(&a1).unwrap().cp_ledger[0].delta, -3);

        assert!(matches!(
            spend_command_points(&mut state, &alice, &a1, 2, "reroll", None),
            Err(Error::InsufficientCommandPoints {
                available: 1,
                required: 2,
            })
        ));
        // Failed spend left the pool untouched
        assert_eq!(state.army(&a1).unwrap().current_command_points, 1);
    }

    #[test]
    fn test_spend_requires_ownership() {
        let mut state = battle_with_army(1000, 4);
        assert!(matches!(
            spend_command_points(
                &mut state,
                &UserId::new("bob"),
                &ArmyId::new("a1"),
                1,
                "reroll",
                None,
            ),
            Err(Error::EntityNotFound(_))
        ));
    }

    #[test]
    fn test_refund_caps_at_maximum() {
        let mut state = battle_with_army(1000, 4);
        let alice = UserId::new("alice");
        let a1 = ArmyId::new("a1");
        spend_command_points(&mut state, &alice, &a1, 2, "reroll", None).unwrap();

        assert_eq!(refund_command_points(&mut state, &a1, 5, "undo").unwrap(), 4);
        let army = state.army(&a1).unwrap();
        assert_eq!(army.current_command_points, 4);
        // Only the credited amount is recorded
        assert_eq!(army.cp_ledger.last().unwrap().delta, 2);
    }

    #[test]
    fn test_reset_restores_all_armies() {
        let mut state = BattleState::new("b1");
        state
            .add_army(Army::new("a1", "alice", "Raiders", "Orcs", 1000).with_command_points(4))
            .unwrap();
        state
            .add_army(Army::new("a2", "bob", "Defenders", "Elves", 1000).with_command_points(4))
            .unwrap();
        let alice = UserId::new("alice");
        state.start(&alice).unwrap();

        spend_command_points(&mut state, &alice, &ArmyId::new("a1"), 4, "reroll", None).unwrap();
        let events = reset_command_points(&mut state, &alice).unwrap();
        assert!(state
            .armies
            .iter()
            .all(|a| a.current_command_points == a.max_command_points));
        assert!(matches!(events[0].kind, EventKind::CommandPointsReset));
    }

    #[test]
    fn test_history_is_owner_only_and_newest_first() {
        let mut state = battle_with_army(1000, 4);
        let alice = UserId::new("alice");
        let a1 = ArmyId::new("a1");
        spend_command_points(&mut state, &alice, &a1, 1, "first", None).unwrap();
        spend_command_points(&mut state, &alice, &a1, 2, "second", None).unwrap();

        let history = command_point_history(&state, &alice, &a1).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].purpose, "second");

        assert!(command_point_history(&state, &UserId::new("bob"), &a1).is_err());
        assert!(command_point_history(&state, &UserId::system(), &a1).is_ok());
    }
}

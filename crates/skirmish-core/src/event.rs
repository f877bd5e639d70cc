//! Domain events returned to the caller for broadcast
//!
//! The engine never pushes events to a callback; every mutating operation
//! returns the events it produced and the surrounding system broadcasts
//! them (fire-and-forget) after the state mutation has committed. Failure
//! to deliver an event must not roll back the mutation.

use crate::activation::UnitAction;
use crate::identity::{ArmyId, ModelId, UnitId, UserId};
use crate::morale::{MoraleTestKind, QualityTestKind};
use crate::state::BattlePhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A broadcastable domain event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleEvent {
    pub timestamp: DateTime<Utc>,
    pub round: u32,
    pub phase: BattlePhase,
    /// The user whose operation produced this event
    pub user: UserId,
    pub kind: EventKind,
}

impl BattleEvent {
    /// Create an event stamped with the current time
    pub fn new(round: u32, phase: BattlePhase, user: UserId, kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            round,
            phase,
            user,
            kind,
        }
    }
}

/// Tagged event payloads, one variant per broadcastable action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    RoundStarted {
        round: u32,
        total_turns: u32,
    },
    UnitActivated {
        unit_id: UnitId,
        turn: u32,
        actions: Vec<UnitAction>,
    },
    ActivationPassed {
        player: UserId,
        turn: u32,
        reason: Option<String>,
    },
    MoraleTestResult {
        unit_id: UnitId,
        test: MoraleTestKind,
        roll: u8,
        modifier: i32,
        total: i32,
        target: u8,
        passed: bool,
        shaken: bool,
        routed: bool,
        destroyed: bool,
    },
    QualityTestResult {
        unit_id: UnitId,
        model_id: ModelId,
        test: QualityTestKind,
        roll: u8,
        modifier: i32,
        total: i32,
        target: u8,
        passed: bool,
    },
    CommandPointsSpent {
        army_id: ArmyId,
        amount: u32,
        purpose: String,
        remaining: u32,
    },
    CommandPointsReset,
    DamageApplied {
        unit_id: UnitId,
        damage: u32,
        models_destroyed: u32,
    },
    ModelDestroyed {
        unit_id: UnitId,
        model_id: ModelId,
    },
    UnitDestroyed {
        unit_id: UnitId,
    },
    UnitShaken {
        unit_id: UnitId,
    },
    UnitRouted {
        unit_id: UnitId,
    },
    PhaseChanged {
        from: BattlePhase,
        to: BattlePhase,
    },
}

impl EventKind {
    /// Short human-readable summary for logs and battle reports
    pub fn describe(&self) -> String {
        match self {
            EventKind::RoundStarted { round, total_turns } => {
                format!("round {round} started ({total_turns} activations)")
            }
            EventKind::UnitActivated { unit_id, turn, .. } => {
                format!("{unit_id} activated on turn {turn}")
            }
            EventKind::ActivationPassed { player, turn, .. } => {
                format!("{player} passed activation on turn {turn}")
            }
            EventKind::MoraleTestResult {
                unit_id, passed, ..
            } => {
                let verdict = if *passed { "passed" } else { "failed" };
                format!("{unit_id} {verdict} a morale test")
            }
            EventKind::QualityTestResult {
                model_id, passed, ..
            } => {
                let verdict = if *passed { "passed" } else { "failed" };
                format!("{model_id} {verdict} a quality test")
            }
            EventKind::CommandPointsSpent {
                army_id,
                amount,
                purpose,
                ..
            } => format!("{army_id} spent {amount} CP for {purpose}"),
            EventKind::CommandPointsReset => "command points reset for all armies".to_string(),
            EventKind::DamageApplied {
                unit_id,
                damage,
                models_destroyed,
            } => format!("{unit_id} took {damage} damage ({models_destroyed} models destroyed)"),
            EventKind::ModelDestroyed { model_id, .. } => format!("{model_id} destroyed"),
            EventKind::UnitDestroyed { unit_id } => format!("{unit_id} destroyed"),
            EventKind::UnitShaken { unit_id } => format!("{unit_id} is shaken"),
            EventKind::UnitRouted { unit_id } => format!("{unit_id} is routed"),
            EventKind::PhaseChanged { from, to } => {
                format!("phase changed {from:?} -> {to:?}")
            }
        }
    }
}

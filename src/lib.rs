//! a deterministic forest-carbon stand simulation kernel in the
//! CBM-CFS3 style: a pool/flux compute engine (§4.A-§4.B) driven by
//! growth/turnover/decay/disturbance providers (§4.D-§4.F), a per-stand
//! state machine (§4.G), a spinup automaton that brings a stand to
//! steady state before stepping begins (§4.H), and a rule-based event
//! processor that selects and splits stands to meet disturbance targets
//! (§4.I). See DESIGN.md for the module-by-module grounding ledger.

pub mod classifiers;
pub mod decay;
pub mod disturbance;
pub mod error;
pub mod events;
pub mod growth;
pub mod inventory;
pub mod kernel;
pub mod layout;
pub mod ops;
pub mod params;
pub mod pools;
pub mod spinup;
pub mod state;
pub mod turnover;

use std::collections::HashMap;

use classifiers::ClassifierKey;
use error::{EngineError, EngineResult};
use layout::PoolLayout;
use ops::{FluxIndicatorSet, Operation};
use params::{DisturbanceTypeId, ParameterStore, SpatialUnitId, SpeciesId};
use pools::{FluxMatrix, PoolSet, Population};
use state::{StandState, StepContext};

pub type LandClassId = inventory::LandClassId;

/// spec §9(a): whether a disabled stand skips every operation, or only
/// the growth/turnover/decay chain while still receiving disturbances
/// (the peatland exception named in DESIGN.md's Open Question (a)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisabledStandPolicy {
    #[default]
    SkipAll,
    DisturbanceOnly,
}

/// per-stand, per-step inputs the caller supplies; everything that isn't
/// carried on `StandState` itself (spec §3 "Stand state" vs. §4.D-§4.F
/// provider inputs).
#[derive(Debug, Clone, Copy)]
pub struct StandInputs<'a> {
    pub classifiers: &'a ClassifierKey,
    pub species: SpeciesId,
    pub spatial_unit: SpatialUnitId,
    pub disturbance_type: DisturbanceTypeId,
    /// years of regrowth delay this stand's inventory record specifies,
    /// applied whenever a stand-replacing disturbance fires (spec §4.G).
    pub delay_years: u32,
    pub smoothed_growth: bool,
    pub temperature_override: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct StepReport {
    pub stands_disturbed: usize,
    pub land_class_transitions: usize,
}

/// ties the parameter store, pool layout, and flux indicator
/// configuration together and exposes the three synchronous top-level
/// calls spec §5 describes: `step`, `spinup`, `rule_based_event`.
pub struct Engine {
    pub pools: PoolSet,
    pub layout: PoolLayout,
    pub store: ParameterStore,
    pub indicators: FluxIndicatorSet,
    pub disabled_stand_policy: DisabledStandPolicy,
    land_classes: HashMap<String, LandClassId>,
    next_land_class: LandClassId,
}

impl Engine {
    pub fn new(pools: PoolSet, store: ParameterStore, indicators: FluxIndicatorSet) -> EngineResult<Self> {
        let layout = PoolLayout::resolve(&pools)?;
        Ok(Self {
            pools,
            layout,
            store,
            indicators,
            disabled_stand_policy: DisabledStandPolicy::default(),
            land_classes: HashMap::new(),
            next_land_class: 1,
        })
    }

    pub fn with_disabled_stand_policy(mut self, policy: DisabledStandPolicy) -> Self {
        self.disabled_stand_policy = policy;
        self
    }

    fn intern_land_class(&mut self, name: &str) -> LandClassId {
        if let Some(&id) = self.land_classes.get(name) {
            return id;
        }
        let id = self.next_land_class;
        self.next_land_class += 1;
        self.land_classes.insert(name.to_string(), id);
        id
    }

    fn step_context(&mut self, state: &StandState, input: &StandInputs) -> EngineResult<StepContext> {
        let dt = input.disturbance_type;
        let (stand_replacing, reset_age, land_class_transition) = if dt > 0 {
            let params = self.store.disturbance_type(dt)?;
            let land_class = match &params.land_class_transition {
                Some(name) => Some(self.intern_land_class(name)),
                None => None,
            };
            (params.stand_replacing, params.reset_age, land_class)
        } else {
            (false, None, None)
        };
        let _ = state;
        Ok(StepContext {
            disturbance_type: dt,
            stand_replacing,
            reset_age,
            delay_years: input.delay_years,
            land_class_transition,
            transition_rule: None,
        })
    }

    /// spec §4.H, §5: one annual time step for every stand in
    /// `population`, in the fixed order growth(half) → turnover →
    /// overmature-decline → growth(half) → decay → disturbance.
    pub fn step(
        &mut self,
        population: &mut Population,
        flux: &mut FluxMatrix,
        states: &mut [StandState],
        inputs: &[StandInputs],
    ) -> EngineResult<StepReport> {
        let n = population.rows();
        if states.len() != n || inputs.len() != n {
            return Err(EngineError::shape(
                "Engine::step",
                format!("population has {n} rows but states={}, inputs={}", states.len(), inputs.len()),
            ));
        }

        for (state, input) in states.iter_mut().zip(inputs.iter()) {
            let ctx = self.step_context(state, input)?;
            state::advance_stand_state(state, &ctx);
        }

        let biomass_pools = self.layout.biomass_pools();
        let growth_inputs: Vec<growth::GrowthInput> = states
            .iter()
            .zip(inputs.iter())
            .map(|(state, input)| growth::GrowthInput {
                classifiers: input.classifiers,
                age: state.age,
                species: input.species,
                growth_multiplier: state.growth_multiplier * if state.growth_enabled { 1.0 } else { 0.0 },
                smoothed: input.smoothed_growth,
            })
            .collect();
        let current_rows: Vec<&[f64]> = (0..n).map(|r| population.row(r)).collect();
        let (growth_op, decline_op) =
            growth::build_growth_operations(&self.store, &biomass_pools, &growth_inputs, &current_rows)?;

        let spatial_units: Vec<SpatialUnitId> = inputs.iter().map(|i| i.spatial_unit).collect();
        let (turnover_biomass_op, turnover_snag_op) =
            turnover::build_turnover_operations(&self.store, &self.layout, &spatial_units)?;

        let temperature_overrides: Vec<Option<f64>> = inputs.iter().map(|i| i.temperature_override).collect();
        let (dom_decay_op, slow_decay_op, slow_mixing_op) =
            decay::build_decay_operations(&self.store, &self.layout, &spatial_units, &temperature_overrides)?;

        let disturbance_types: Vec<DisturbanceTypeId> = inputs.iter().map(|i| i.disturbance_type).collect();
        let disturbance_op =
            disturbance::build_disturbance_operation(&self.store, &self.pools, &disturbance_types, &spatial_units)?;

        let enabled: Vec<bool> = states.iter().map(|s| s.enabled).collect();
        let disturbance_enabled: Vec<bool> = states
            .iter()
            .map(|s| s.enabled || self.disabled_stand_policy == DisabledStandPolicy::DisturbanceOnly)
            .collect();

        let non_disturbance: Vec<&Operation> = vec![
            &growth_op,
            &turnover_biomass_op,
            &turnover_snag_op,
            &decline_op,
            &growth_op,
            &dom_decay_op,
            &slow_decay_op,
            &slow_mixing_op,
        ];
        kernel::compute_flux(&non_disturbance, population, flux, &self.indicators, Some(&enabled))?;
        kernel::compute_flux(&[&disturbance_op], population, flux, &self.indicators, Some(&disturbance_enabled))?;

        for state in states.iter_mut() {
            state::end_step(state);
        }

        let stands_disturbed = disturbance_types.iter().filter(|&&dt| dt > 0).count();
        log::debug!("step complete: {stands_disturbed}/{n} stands disturbed");

        Ok(StepReport { stands_disturbed, land_class_transitions: 0 })
    }

    /// spec §4.H: runs one stand through the spinup automaton to
    /// completion, driving it with [`Self::step`] under spinup's own
    /// disturbance/growth schedule.
    pub fn spinup_stand(
        &mut self,
        population: &mut Population,
        flux: &mut FluxMatrix,
        state: &mut StandState,
        base_input: &StandInputs,
        config: &spinup::SpinupConfig,
    ) -> EngineResult<spinup::SpinupState> {
        let mut spinup_state = spinup::SpinupState::new(config);
        log::info!("spinup start (historical dt={}, last-pass dt={})", config.historical_disturbance_type, config.last_pass_disturbance_type);

        let mut iterations = 0u32;
        while !spinup_state.is_done() {
            iterations += 1;
            if iterations > 100_000 {
                return Err(EngineError::domain("Engine::spinup_stand", "spinup did not converge within a sane iteration bound"));
            }
            let plan = spinup::plan_step(&spinup_state, config);
            state.growth_multiplier = if plan.growth_active { 1.0 } else { 0.0 };
            let step_input = StandInputs {
                disturbance_type: plan.disturbance_type,
                temperature_override: config.temperature_override_for(spinup_state.mode),
                ..*base_input
            };
            self.step(population, flux, std::slice::from_mut(state), std::slice::from_ref(&step_input))?;

            let slow_total =
                population.row(0)[self.layout.above_ground_slow_dom] + population.row(0)[self.layout.below_ground_slow_dom];
            log::trace!("spinup rotation {} mode {:?} age {} slow {slow_total}", spinup_state.rotation, spinup_state.mode, state.age);
            spinup::complete_step(&mut spinup_state, config, state.age, slow_total);
        }

        if spinup_state.rotation >= config.max_rotations {
            log::warn!("spinup reached the rotation cap ({}) without convergence", config.max_rotations);
        }
        log::info!("spinup done after {} rotations, final age {}", spinup_state.rotation, state.age);
        Ok(spinup_state)
    }

    /// spec §4.G: called once after spinup, once per stand. Derives the
    /// stepping state from inventory and the pool state spinup left
    /// behind, and — for an afforestation stand — seeds `population`'s
    /// row with that pre-type's initial soil pools (SPEC_FULL §14).
    pub fn initialize_stand(
        &self,
        inventory: &inventory::InventoryRecord,
        population: &mut Population,
        row: usize,
    ) -> EngineResult<StandState> {
        state::apply_afforestation_soil(&self.store, &self.pools, population, row, inventory)?;
        Ok(state::initialize_land_state(inventory))
    }

    /// spec §4.I: runs one rule-based event against the given stands and
    /// returns its outcome. does not itself mutate population/state —
    /// callers apply `EventOutcome.splits` (full disturbance for
    /// proportion 1.0 rows, `Population::push_copies` + area rescaling
    /// for partial rows) since row duplication also touches
    /// caller-owned classifier/area storage this engine does not own.
    pub fn rule_based_event<'a>(
        &self,
        event: &events::EventRecord,
        views: &[events::StandView<'a>],
        production_matrix: impl Fn(usize) -> EngineResult<Vec<ops::Entry>>,
        rng: &mut rand::rngs::SmallRng,
    ) -> EngineResult<events::target::EventOutcome> {
        let outcome = events::run_event(event, views, &self.pools, &self.layout, production_matrix, rng)?;
        if outcome.shortfall > 0.0 {
            log::warn!(
                "rule-based event for disturbance type {}: shortfall {} of target {}",
                event.disturbance_type,
                outcome.shortfall,
                outcome.total_achieved + outcome.shortfall
            );
        } else {
            log::info!(
                "rule-based event for disturbance type {}: achieved {} across {} record(s), {} split(s)",
                event.disturbance_type,
                outcome.total_achieved,
                outcome.num_records_disturbed,
                outcome.num_splits
            );
        }
        Ok(outcome)
    }
}

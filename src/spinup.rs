//! the spinup state machine (spec §4.H): cycles a stand through
//! historical disturbance rotations until slow-pool convergence or a
//! rotation cap, then a last-pass disturbance and a delay-and-regrow
//! phase to reach the stand's declared inventory age.

use crate::params::DisturbanceTypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinupMode {
    AnnualProcesses,
    HistoricalDisturbance,
    LastPassDisturbance,
    GrowToFinalAge,
    Delay,
    Done,
}

#[derive(Debug, Clone)]
pub struct SpinupConfig {
    pub return_interval: u32,
    pub final_age: u32,
    pub delay: u32,
    pub historical_disturbance_type: DisturbanceTypeId,
    pub last_pass_disturbance_type: DisturbanceTypeId,
    pub min_rotations: u32,
    pub max_rotations: u32,
    /// overrides the spatial unit's mean annual temperature while
    /// `mode` is `AnnualProcesses` or `HistoricalDisturbance`, modelling a
    /// long-term historical climate normal distinct from the contemporary
    /// one used once stepping forward begins (spec §4.E, §4.H).
    pub historical_mean_annual_temperature: Option<f64>,
}

impl SpinupConfig {
    /// the decay temperature override to use while in `mode`, per the
    /// historical-vs-contemporary distinction above.
    pub fn temperature_override_for(&self, mode: SpinupMode) -> Option<f64> {
        match mode {
            SpinupMode::AnnualProcesses | SpinupMode::HistoricalDisturbance => self.historical_mean_annual_temperature,
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpinupState {
    pub mode: SpinupMode,
    pub rotation: u32,
    pub delay_remaining: u32,
    pub last_rotation_slow: f64,
    pub this_rotation_slow: f64,
}

impl SpinupState {
    /// spec §9(b): a stand with neither a historical nor a last-pass
    /// disturbance type is immediately `Done`, unchanged.
    pub fn new(config: &SpinupConfig) -> Self {
        let mode = if config.historical_disturbance_type <= 0 && config.last_pass_disturbance_type <= 0 {
            SpinupMode::Done
        } else {
            SpinupMode::AnnualProcesses
        };
        Self { mode, rotation: 0, delay_remaining: config.delay, last_rotation_slow: 0.0, this_rotation_slow: 0.0 }
    }

    pub fn is_done(&self) -> bool {
        self.mode == SpinupMode::Done
    }
}

/// what this step should do, decided from the mode left behind by the
/// previous step's [`complete_step`] call (spec §4.H point 1).
#[derive(Debug, Clone, Copy)]
pub struct StepPlan {
    pub disturbance_type: DisturbanceTypeId,
    pub growth_active: bool,
}

pub fn plan_step(state: &SpinupState, config: &SpinupConfig) -> StepPlan {
    match state.mode {
        SpinupMode::Done => StepPlan { disturbance_type: 0, growth_active: false },
        SpinupMode::AnnualProcesses | SpinupMode::GrowToFinalAge => {
            StepPlan { disturbance_type: 0, growth_active: true }
        }
        SpinupMode::HistoricalDisturbance => {
            StepPlan { disturbance_type: config.historical_disturbance_type, growth_active: true }
        }
        SpinupMode::LastPassDisturbance => {
            StepPlan { disturbance_type: config.last_pass_disturbance_type, growth_active: true }
        }
        SpinupMode::Delay => StepPlan { disturbance_type: 0, growth_active: false },
    }
}

/// `converged ⇔ rotation ≥ min_rotations AND |last−this| / ((last+this)/2) < 0.001`,
/// guarded against division by zero (spec §4.H).
fn converged(state: &SpinupState, config: &SpinupConfig) -> bool {
    if state.rotation < config.min_rotations {
        return false;
    }
    let (last, this) = (state.last_rotation_slow, state.this_rotation_slow);
    let denom = (last + this) / 2.0;
    if denom == 0.0 {
        return true;
    }
    ((last - this).abs() / denom) < 0.001
}

/// called once per step after the kernel has applied this step's
/// operations (and after `end_step` has advanced the stand's age). `age`
/// is the stand's age as of right now; `slow_pool_total` is the
/// post-operation sum of above+below ground slow DOM, only consulted
/// when this step ran the historical disturbance (spec §4.H point 4).
pub fn complete_step(state: &mut SpinupState, config: &SpinupConfig, age: u32, slow_pool_total: f64) {
    match state.mode {
        SpinupMode::Done => {}
        SpinupMode::AnnualProcesses => {
            if age + 1 >= config.return_interval {
                state.mode = SpinupMode::HistoricalDisturbance;
            }
        }
        SpinupMode::HistoricalDisturbance => {
            state.last_rotation_slow = state.this_rotation_slow;
            state.this_rotation_slow = slow_pool_total;
            let is_converged = converged(state, config);
            state.rotation += 1;
            state.mode = if is_converged || state.rotation >= config.max_rotations {
                SpinupMode::LastPassDisturbance
            } else {
                SpinupMode::AnnualProcesses
            };
        }
        SpinupMode::LastPassDisturbance => {
            state.mode =
                if age < config.final_age { SpinupMode::GrowToFinalAge } else { SpinupMode::Done };
        }
        SpinupMode::GrowToFinalAge => {
            if age >= config.final_age {
                state.mode = if config.delay > 0 { SpinupMode::Delay } else { SpinupMode::Done };
            }
        }
        SpinupMode::Delay => {
            if state.delay_remaining == 0 {
                state.mode = SpinupMode::Done;
            } else {
                state.delay_remaining -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SpinupConfig {
        SpinupConfig {
            return_interval: 125,
            final_age: 50,
            delay: 0,
            historical_disturbance_type: 1,
            last_pass_disturbance_type: 2,
            min_rotations: 5,
            max_rotations: 30,
            historical_mean_annual_temperature: Some(1.0),
        }
    }

    #[test]
    fn neither_disturbance_type_means_immediately_done() {
        let c = SpinupConfig { historical_disturbance_type: 0, last_pass_disturbance_type: 0, ..config() };
        let state = SpinupState::new(&c);
        assert!(state.is_done());
    }

    #[test]
    fn reaching_return_interval_schedules_historical_disturbance() {
        let c = config();
        let mut state = SpinupState::new(&c);
        complete_step(&mut state, &c, 123, 0.0);
        assert_eq!(state.mode, SpinupMode::AnnualProcesses);
        complete_step(&mut state, &c, 124, 0.0);
        assert_eq!(state.mode, SpinupMode::HistoricalDisturbance);
        let plan = plan_step(&state, &c);
        assert_eq!(plan.disturbance_type, 1);
    }

    #[test]
    fn convergence_moves_to_last_pass_after_min_rotations() {
        let c = config();
        let mut state = SpinupState::new(&c);
        state.mode = SpinupMode::HistoricalDisturbance;
        state.rotation = c.min_rotations;
        state.this_rotation_slow = 100.0;
        complete_step(&mut state, &c, 0, 100.0001);
        assert_eq!(state.mode, SpinupMode::LastPassDisturbance);
    }

    #[test]
    fn rotation_cap_forces_last_pass_even_without_convergence() {
        let c = config();
        let mut state = SpinupState::new(&c);
        state.mode = SpinupMode::HistoricalDisturbance;
        state.rotation = c.max_rotations - 1;
        state.last_rotation_slow = 10.0;
        complete_step(&mut state, &c, 0, 1000.0);
        assert_eq!(state.mode, SpinupMode::LastPassDisturbance);
    }

    #[test]
    fn last_pass_then_grow_to_final_age_then_done() {
        let c = config();
        let mut state = SpinupState::new(&c);
        state.mode = SpinupMode::LastPassDisturbance;
        complete_step(&mut state, &c, 0, 0.0);
        assert_eq!(state.mode, SpinupMode::GrowToFinalAge);
        complete_step(&mut state, &c, c.final_age, 0.0);
        assert_eq!(state.mode, SpinupMode::Done);
    }

    #[test]
    fn grow_to_final_age_routes_through_delay_when_configured() {
        let c = SpinupConfig { delay: 3, ..config() };
        let mut state = SpinupState::new(&c);
        state.mode = SpinupMode::GrowToFinalAge;
        complete_step(&mut state, &c, c.final_age, 0.0);
        assert_eq!(state.mode, SpinupMode::Delay);
        for _ in 0..3 {
            complete_step(&mut state, &c, 0, 0.0);
        }
        assert_eq!(state.mode, SpinupMode::Done);
    }
}

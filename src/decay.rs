//! decay provider (spec §4.E, second half): DOM-decay, slow-decay, and
//! slow-mixing matrices, governed by the Q10 temperature-response rate
//! law.

use crate::error::{EngineError, EngineResult};
use crate::layout::PoolLayout;
use crate::ops::{Entry, Operation, Process, SparseMatrix};
use crate::params::{DecayParameter, ParameterStore, SpatialUnitId};

/// `rate(T) = min(base_rate * exp((T - T_ref) * ln(Q10) / 10), max_rate)`
/// (spec §4.E).
pub fn decay_rate(p: &DecayParameter, mean_annual_temperature: f64) -> f64 {
    let raw = p.base_rate * ((mean_annual_temperature - p.reference_temperature) * p.q10.ln() / 10.0).exp();
    raw.min(p.max_rate)
}

/// the pool each DOM pool (other than the slow pools) decays *toward*
/// when its mass doesn't go to the atmosphere. fixed topology, not
/// configured per spatial unit, matching how the chain is wired in the
/// source parameter database.
fn decay_chain_target(layout: &PoolLayout, pool: usize) -> usize {
    let (ags, bgs) = layout.slow_pools();
    if pool == layout.below_ground_fast_dom {
        bgs
    } else {
        ags
    }
}

/// `temperature_override` takes precedence over the spatial unit's
/// default mean annual temperature, used during spinup's historical mode
/// (spec §4.E, §4.H).
pub fn dom_decay_entries(
    layout: &PoolLayout,
    spatial_unit: &crate::params::SpatialUnitParameters,
    temperature_override: Option<f64>,
) -> EngineResult<Vec<Entry>> {
    let temp = temperature_override.unwrap_or(spatial_unit.mean_annual_temperature);
    let mut entries = Vec::new();
    for &pool in &layout.dom_pools_for_decay() {
        let name = pool_name_for(layout, pool);
        let params = spatial_unit
            .decay_for(name)
            .ok_or_else(|| EngineError::configuration("dom_decay_entries", format!("missing decay parameters for {name}")))?;
        let rate = decay_rate(params, temp);
        let to_atmosphere = rate * params.prop_to_atmosphere;
        let to_next = rate * (1.0 - params.prop_to_atmosphere);
        let retain = 1.0 - rate;
        let next_pool = decay_chain_target(layout, pool);
        if to_atmosphere > 0.0 {
            entries.push((pool, layout.co2, to_atmosphere));
        }
        if to_next > 0.0 {
            entries.push((pool, next_pool, to_next));
        }
        entries.push((pool, pool, retain));
    }
    Ok(entries)
}

/// slow-decay: above/below-ground slow pools lose mass only to the
/// atmosphere (they are the end of the DOM decay chain); the remainder
/// is retained.
pub fn slow_decay_entries(
    layout: &PoolLayout,
    spatial_unit: &crate::params::SpatialUnitParameters,
    temperature_override: Option<f64>,
) -> EngineResult<Vec<Entry>> {
    let temp = temperature_override.unwrap_or(spatial_unit.mean_annual_temperature);
    let (ags, bgs) = layout.slow_pools();
    let mut entries = Vec::new();
    for (pool, name) in [(ags, "AboveGroundSlowDOM"), (bgs, "BelowGroundSlowDOM")] {
        let params = spatial_unit
            .decay_for(name)
            .ok_or_else(|| EngineError::configuration("slow_decay_entries", format!("missing decay parameters for {name}")))?;
        let rate = decay_rate(params, temp);
        if rate > 0.0 {
            entries.push((pool, layout.co2, rate));
        }
        entries.push((pool, pool, 1.0 - rate));
    }
    Ok(entries)
}

/// above-ground-slow -> below-ground-slow at a fixed annual rate.
pub fn slow_mixing_entries(layout: &PoolLayout, rate: f64) -> Vec<Entry> {
    let (ags, bgs) = layout.slow_pools();
    vec![(ags, bgs, rate), (ags, ags, 1.0 - rate)]
}

fn pool_name_for(layout: &PoolLayout, pool: usize) -> &'static str {
    if pool == layout.above_ground_fast_dom {
        "AboveGroundFastDOM"
    } else if pool == layout.below_ground_fast_dom {
        "BelowGroundFastDOM"
    } else if pool == layout.stem_snag {
        "StemSnag"
    } else if pool == layout.branch_snag {
        "BranchSnag"
    } else {
        "MediumDOM"
    }
}

pub fn build_decay_operations(
    store: &ParameterStore,
    layout: &PoolLayout,
    spatial_units: &[SpatialUnitId],
    temperature_overrides: &[Option<f64>],
) -> EngineResult<(Operation, Operation, Operation)> {
    let mut dom = Vec::with_capacity(spatial_units.len());
    let mut slow = Vec::with_capacity(spatial_units.len());
    let mut mixing = Vec::with_capacity(spatial_units.len());
    for (su, temp) in spatial_units.iter().zip(temperature_overrides.iter()) {
        let params = store.spatial_unit(*su)?;
        dom.push(SparseMatrix::new(dom_decay_entries(layout, params, *temp)?));
        slow.push(SparseMatrix::new(slow_decay_entries(layout, params, *temp)?));
        mixing.push(SparseMatrix::new(slow_mixing_entries(layout, params.slow_mixing_rate)));
    }
    let idx: Vec<usize> = (0..spatial_units.len()).collect();
    let dom_op = Operation::from_matrix_list(Process::Decay, dom, idx.clone())?;
    let slow_op = Operation::from_matrix_list(Process::Decay, slow, idx.clone())?;
    let mixing_op = Operation::from_matrix_list(Process::Decay, mixing, idx)?;
    Ok((dom_op, slow_op, mixing_op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DecayParameter;
    use crate::pools::PoolSet;

    fn layout() -> PoolLayout {
        PoolLayout::resolve(&PoolSet::new(crate::layout::default_pool_names()).unwrap()).unwrap()
    }

    #[test]
    fn rate_is_capped_at_max_rate() {
        let p = DecayParameter {
            pool: "x".into(),
            base_rate: 1.0,
            q10: 10.0,
            reference_temperature: 0.0,
            max_rate: 0.5,
            prop_to_atmosphere: 0.5,
        };
        assert_eq!(decay_rate(&p, 50.0), 0.5);
    }

    #[test]
    fn rate_increases_with_temperature_above_reference() {
        let p = DecayParameter {
            pool: "x".into(),
            base_rate: 0.1,
            q10: 2.0,
            reference_temperature: 10.0,
            max_rate: 1.0,
            prop_to_atmosphere: 0.5,
        };
        assert!(decay_rate(&p, 20.0) > decay_rate(&p, 10.0));
    }

    #[test]
    fn dom_decay_rows_sum_to_one() {
        let layout = layout();
        let su = crate::params::SpatialUnitParameters {
            spatial_unit: 1,
            mean_annual_temperature: 2.0,
            random_return_interval: 125.0,
            slow_mixing_rate: 0.006,
            turnover: crate::params::TurnoverParameter {
                foliage_fall: 0.95,
                branch_fall: 0.03,
                stem_fall: 0.01,
                root_fall: 0.02,
                branch_snag_split: 0.25,
                above_to_below_fast: 0.5,
                stem_snag_rate: 0.1,
                branch_snag_rate: 0.1,
            },
            decay: ["AboveGroundFastDOM", "BelowGroundFastDOM", "StemSnag", "BranchSnag", "MediumDOM"]
                .iter()
                .map(|name| DecayParameter {
                    pool: name.to_string(),
                    base_rate: 0.1,
                    q10: 2.0,
                    reference_temperature: 2.0,
                    max_rate: 1.0,
                    prop_to_atmosphere: 0.4,
                })
                .collect(),
        };
        let entries = dom_decay_entries(&layout, &su, None).unwrap();
        for &pool in &layout.dom_pools_for_decay() {
            let sum: f64 = entries.iter().filter(|&&(r, _, _)| r == pool).map(|&(_, _, v)| v).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }
}

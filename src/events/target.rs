//! sorted disturbance targeting (spec §4.I points 2-5): rank eligible
//! stands, then greedily consume a target variable until the target is
//! met, splitting the record that crosses it. grounded on
//! `original_source/libcbm/model/cbm/rule_based/rule_target.py`'s
//! `sorted_disturbance_target`.

use crate::error::{EngineError, EngineResult};
use crate::layout::PoolLayout;
use crate::ops::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortType {
    ProportionOfEveryRecord,
    SortBySwAge,
    SortByHwAge,
    TotalStemSnag,
    SwStemSnag,
    HwStemSnag,
    RandomSort,
    Svoid,
    MerchCSortTotal,
    MerchCSortSw,
    MerchCSortHw,
}

impl SortType {
    pub fn is_production_based(self) -> bool {
        matches!(self, SortType::MerchCSortTotal | SortType::MerchCSortSw | SortType::MerchCSortHw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    Area,
    Merch,
    Proportion,
}

/// one eligible stand's contribution to the sort and the target sum.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub index: usize,
    pub sort_value: f64,
    pub target_var: f64,
}

#[derive(Debug, Clone)]
pub struct SplitRecord {
    pub index: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone, Default)]
pub struct EventOutcome {
    pub splits: Vec<SplitRecord>,
    pub total_eligible_value: f64,
    pub total_achieved: f64,
    pub shortfall: f64,
    pub num_splits: usize,
    pub num_records_disturbed: usize,
    pub num_eligible: usize,
}

/// spec §4.I: "for Proportion, target_value is a fraction of the eligible
/// area" — the caller converts that fraction into an absolute target
/// before the generic greedy split runs, using the same `target_var`
/// (area) as an Area target.
pub fn effective_target(target_type: TargetType, target_value: f64, total_eligible_area: f64) -> f64 {
    match target_type {
        TargetType::Proportion => target_value * total_eligible_area,
        TargetType::Area | TargetType::Merch => target_value,
    }
}

/// spec §4.I points 3-5. `target` and every candidate's `target_var` must
/// be non-negative (domain errors otherwise, spec §7).
pub fn sorted_disturbance_target(mut candidates: Vec<Candidate>, target: f64) -> EngineResult<EventOutcome> {
    if target < 0.0 {
        return Err(EngineError::domain("sorted_disturbance_target", "target < 0"));
    }
    for c in &candidates {
        if c.target_var < 0.0 {
            return Err(EngineError::domain("sorted_disturbance_target", "target_var < 0"));
        }
    }

    candidates.sort_by(|a, b| b.sort_value.partial_cmp(&a.sort_value).unwrap().then(a.index.cmp(&b.index)));

    let num_eligible = candidates.len();
    let total_eligible_value: f64 = candidates.iter().map(|c| c.target_var).sum();

    let mut splits = Vec::with_capacity(candidates.len());
    let mut cumulative = 0.0_f64;
    for c in &candidates {
        if cumulative >= target {
            break;
        }
        if c.target_var <= 0.0 {
            splits.push(SplitRecord { index: c.index, proportion: 1.0 });
            continue;
        }
        let remaining = target - cumulative;
        if cumulative + c.target_var <= target {
            splits.push(SplitRecord { index: c.index, proportion: 1.0 });
            cumulative += c.target_var;
        } else {
            let proportion = (remaining / c.target_var).clamp(0.0, 1.0);
            splits.push(SplitRecord { index: c.index, proportion });
            cumulative += remaining;
        }
    }

    let total_achieved = cumulative;
    let num_splits = splits.iter().filter(|s| s.proportion < 1.0).count();
    let num_records_disturbed = splits.len();
    Ok(EventOutcome {
        splits,
        total_eligible_value,
        total_achieved,
        shortfall: (target - total_achieved).max(0.0),
        num_splits,
        num_records_disturbed,
        num_eligible,
    })
}

/// production-based sort value (spec §4.I: "Production is computed by
/// applying the disturbance matrix in flux-accumulation mode to a copy of
/// pools and summing DisturbanceSoftProduction + DisturbanceHardProduction
/// + DisturbanceDOMProduction"). Under this crate's single-dominant-species
/// pool layout, both product components are captured as mass moved into
/// either products pool, regardless of whether the source was live biomass
/// or DOM — so softwood/hardwood-specific sorts and the total sort
/// coincide; see DESIGN.md.
pub fn disturbance_production(layout: &PoolLayout, matrix_entries: &[Entry], current_row: &[f64]) -> f64 {
    matrix_entries
        .iter()
        .filter(|&&(i, j, _)| i != j && (j == layout.products_softwood || j == layout.products_hardwood))
        .map(|&(i, _, v)| current_row[i] * v)
        .sum()
}

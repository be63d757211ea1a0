//! volume-to-biomass growth (spec §4.D): merchantable-volume curves,
//! keyed by classifier set, converted to per-stand growth and
//! overmature-decline matrices.

use crate::classifiers::ClassifierKey;
use crate::error::{EngineError, EngineResult};
use crate::ops::{Entry, Operation, Process, SparseMatrix};
use crate::params::{BiomassConversionCoefficients, ParameterStore, SpeciesId};
use serde::Deserialize;

/// the five biomass pool roles a volume curve is converted into. the
/// caller's `PoolSet` supplies the concrete pool index for each.
#[derive(Debug, Clone, Copy)]
pub struct BiomassPools {
    pub merch: usize,
    pub foliage: usize,
    pub other: usize,
    pub coarse_root: usize,
    pub fine_root: usize,
}

impl BiomassPools {
    fn as_array(&self) -> [usize; 5] {
        [self.merch, self.foliage, self.other, self.coarse_root, self.fine_root]
    }
}

/// one `(age, volume)` breakpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VolumePoint {
    pub age: u32,
    pub volume: f64,
}

/// a merchantable-volume-by-age curve for one species component. ages
/// beyond the last breakpoint clamp to the last value (spec §4.D.1).
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeCurve {
    pub species: SpeciesId,
    pub points: Vec<VolumePoint>,
}

impl VolumeCurve {
    pub fn volume_at(&self, age: u32) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        if age <= self.points[0].age {
            return self.points[0].volume;
        }
        for w in self.points.windows(2) {
            let (a, b) = (&w[0], &w[1]);
            if age >= a.age && age <= b.age {
                if b.age == a.age {
                    return b.volume;
                }
                let t = (age - a.age) as f64 / (b.age - a.age) as f64;
                return a.volume + t * (b.volume - a.volume);
            }
        }
        self.points.last().unwrap().volume
    }
}

/// a stand's growth curve(s): softwood and/or hardwood components keyed
/// by a classifier pattern (which may include wildcards).
#[derive(Debug, Clone, Deserialize)]
pub struct YieldCurveEntry {
    pub pattern: Vec<u32>,
    pub softwood: Option<VolumeCurve>,
    pub hardwood: Option<VolumeCurve>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeCurveSet {
    pub entries: Vec<YieldCurveEntry>,
}

impl VolumeCurveSet {
    /// exact match wins; otherwise the most specific wildcard pattern
    /// that matches (spec §4.D.1).
    pub fn lookup(&self, classifiers: &ClassifierKey) -> EngineResult<&YieldCurveEntry> {
        self.entries
            .iter()
            .filter_map(|e| {
                classifiers
                    .specificity(&ClassifierKey::new(e.pattern.clone()))
                    .map(|score| (score, e))
            })
            .max_by_key(|(score, _)| *score)
            .map(|(_, e)| e)
            .ok_or_else(|| {
                EngineError::domain("VolumeCurveSet::lookup", "no yield curve matches stand classifiers")
            })
    }
}

/// smooths a raw per-age biomass target across the age domain: a 3-point
/// moving blend of `(age-1, age, age+1)` targets, weighted 1:2:1. agrees
/// with the unsmoothed form at the curve endpoints because at age 0 there
/// is no `age-1` sample to blend in (spec §9).
fn smoothed_target(curve: &VolumeCurve, coefficient: f64, age: u32) -> f64 {
    let raw = |a: u32| curve.volume_at(a) * coefficient;
    if age == 0 {
        return raw(0);
    }
    let prev = raw(age - 1);
    let mid = raw(age);
    let next = raw(age + 1);
    (prev + 2.0 * mid + next) / 4.0
}

/// per-stand inputs needed to compute this step's growth/decline
/// matrices (spec §4.D).
pub struct GrowthInput<'a> {
    pub classifiers: &'a ClassifierKey,
    pub age: u32,
    pub species: SpeciesId,
    pub growth_multiplier: f64,
    pub smoothed: bool,
}

fn component_targets(
    curve: &VolumeCurve,
    coeffs: &BiomassConversionCoefficients,
    age: u32,
    smoothed: bool,
) -> [f64; 5] {
    let merch_coef = 1.0;
    let ratios = [
        merch_coef,
        coeffs.merch_to_foliage,
        coeffs.merch_to_other,
        coeffs.merch_to_coarse_root,
        coeffs.merch_to_fine_root,
    ];
    let mut out = [0.0; 5];
    for (i, ratio) in ratios.iter().enumerate() {
        out[i] = if smoothed {
            smoothed_target(curve, *ratio, age)
        } else {
            curve.volume_at(age) * ratio
        };
    }
    out
}

/// builds one stand's `(growth_half, decline)` matrix entries, given its
/// current biomass pool values (needed to clamp the decline and to
/// measure the delta relative to what's actually in the pools, not just
/// the curve's own age-to-age delta).
pub fn stand_growth_matrices(
    store: &ParameterStore,
    pools: &BiomassPools,
    input: &GrowthInput,
    current: &[f64],
) -> EngineResult<(Vec<Entry>, Vec<Entry>)> {
    let entry = store.volume_curves.lookup(input.classifiers)?;
    let curve = entry
        .softwood
        .as_ref()
        .or(entry.hardwood.as_ref())
        .ok_or_else(|| EngineError::configuration("stand_growth_matrices", "yield curve entry has no components"))?;
    let coeffs = store.biomass_coefficients(input.species)?;

    let this_year = component_targets(curve, coeffs, input.age, input.smoothed);
    let next_year = component_targets(curve, coeffs, input.age + 1, input.smoothed);

    let pool_indices = pools.as_array();
    let mut growth = vec![(0, 0, 1.0)]; // Input pool retains its own 1.0
    let mut decline = Vec::new();

    for i in 0..5 {
        let delta = (next_year[i] - this_year[i]) * input.growth_multiplier;
        let pool_idx = pool_indices[i];
        if delta > 0.0 {
            growth.push((0, pool_idx, delta));
        } else if delta < 0.0 {
            let have = current[pool_idx];
            if have > 0.0 {
                let target = (have + delta).max(0.0);
                let retain_fraction = (target / have).clamp(0.0, 1.0);
                decline.push((pool_idx, pool_idx, retain_fraction));
            }
        }
    }

    Ok((growth, decline))
}

/// `Operation`s can only hold full matrices, but growth is applied as two
/// half-steps; this halves the additive (Input-row) entries, leaving any
/// explicit self-retention (the `(0,0,1.0)` Input diagonal) untouched.
pub fn halve_growth(entries: &[Entry]) -> Vec<Entry> {
    entries
        .iter()
        .map(|&(r, c, v)| if r == 0 && c == 0 { (r, c, v) } else { (r, c, v * 0.5) })
        .collect()
}

/// assembles per-stand growth/decline matrices into the two `Operation`s
/// a step schedules (the half-growth operation is reused twice in the
/// step's operation list; see spec §4.D, §4.H).
pub fn build_growth_operations(
    store: &ParameterStore,
    pools: &BiomassPools,
    inputs: &[GrowthInput],
    current_pools: &[&[f64]],
) -> EngineResult<(Operation, Operation)> {
    let mut growth_matrices = Vec::with_capacity(inputs.len());
    let mut decline_matrices = Vec::with_capacity(inputs.len());
    for (input, current) in inputs.iter().zip(current_pools.iter()) {
        let (growth, decline) = stand_growth_matrices(store, pools, input, current)?;
        growth_matrices.push(SparseMatrix::new(halve_growth(&growth)));
        decline_matrices.push(SparseMatrix::new(decline));
    }
    let stand_to_matrix: Vec<usize> = (0..inputs.len()).collect();
    let growth_op = Operation::from_matrix_list(Process::Growth, growth_matrices, stand_to_matrix.clone())?;
    let decline_op = Operation::from_matrix_list(Process::Growth, decline_matrices, stand_to_matrix)?;
    Ok((growth_op, decline_op))
}

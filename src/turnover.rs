//! turnover provider (spec §4.E, first half): moves live biomass into DOM
//! pools, and snag pools into medium/fast DOM, at spatial-unit-specific
//! annual rates.

use crate::error::EngineResult;
use crate::layout::PoolLayout;
use crate::ops::{Entry, Operation, Process, SparseMatrix};
use crate::params::{ParameterStore, SpatialUnitId, TurnoverParameter};

/// biomass-turnover: foliage/fine-roots -> below/above-ground fast,
/// branches -> above-ground fast (with a share to branch snag),
/// coarse-roots -> above/below-ground fast, stem -> stem snag.
pub fn biomass_turnover_entries(layout: &PoolLayout, p: &TurnoverParameter) -> Vec<Entry> {
    let mut e = Vec::new();

    // foliage -> above-ground fast DOM
    push_split(&mut e, layout.foliage, layout.above_ground_fast_dom, p.foliage_fall);

    // fine roots -> above/below ground fast DOM split by the parameter's
    // above/below split (`above_to_below_fast` gives the below share).
    let fine_above = p.root_fall * (1.0 - p.above_to_below_fast);
    let fine_below = p.root_fall * p.above_to_below_fast;
    if fine_above > 0.0 {
        e.push((layout.fine_root, layout.above_ground_fast_dom, fine_above));
    }
    if fine_below > 0.0 {
        e.push((layout.fine_root, layout.below_ground_fast_dom, fine_below));
    }

    // coarse roots -> above/below ground fast DOM, same split convention.
    let coarse_above = p.root_fall * (1.0 - p.above_to_below_fast);
    let coarse_below = p.root_fall * p.above_to_below_fast;
    if coarse_above > 0.0 {
        e.push((layout.coarse_root, layout.above_ground_fast_dom, coarse_above));
    }
    if coarse_below > 0.0 {
        e.push((layout.coarse_root, layout.below_ground_fast_dom, coarse_below));
    }

    // "other" (branches) -> above-ground fast DOM, with a share peeled
    // off to branch snag.
    let branch_to_snag = p.branch_fall * p.branch_snag_split;
    let branch_to_fast = p.branch_fall * (1.0 - p.branch_snag_split);
    if branch_to_fast > 0.0 {
        e.push((layout.other, layout.above_ground_fast_dom, branch_to_fast));
    }
    if branch_to_snag > 0.0 {
        e.push((layout.other, layout.branch_snag, branch_to_snag));
    }

    // stem -> stem snag (stem is tracked as part of merch in this layout;
    // the stem-fall rate governs merch -> stem snag turnover).
    push_split(&mut e, layout.merch, layout.stem_snag, p.stem_fall);

    close_retained_rows(&mut e, &[layout.foliage, layout.fine_root, layout.coarse_root, layout.other, layout.merch]);
    e
}

/// snag-turnover: stem snag and branch snag decay into medium/fast DOM
/// at their own rates (independent of the DOM-decay process, spec §4.E).
pub fn snag_turnover_entries(layout: &PoolLayout, p: &TurnoverParameter) -> Vec<Entry> {
    let mut e = Vec::new();
    push_split(&mut e, layout.stem_snag, layout.medium_dom, p.stem_snag_rate);
    push_split(&mut e, layout.branch_snag, layout.above_ground_fast_dom, p.branch_snag_rate);
    close_retained_rows(&mut e, &[layout.stem_snag, layout.branch_snag]);
    e
}

fn push_split(e: &mut Vec<Entry>, from: usize, to: usize, rate: f64) {
    if rate > 0.0 {
        e.push((from, to, rate));
    }
}

/// every source row touched above needs an explicit self-retention entry
/// (spec §4.B: "no implicit normalisation") equal to whatever fraction
/// hasn't already been pushed out of that row.
fn close_retained_rows(e: &mut Vec<Entry>, rows: &[usize]) {
    for &row in rows {
        let outflow: f64 = e.iter().filter(|&&(r, _, _)| r == row).map(|&(_, _, v)| v).sum();
        if outflow < 1.0 {
            e.push((row, row, 1.0 - outflow));
        }
    }
}

pub fn build_turnover_operations(
    store: &ParameterStore,
    layout: &PoolLayout,
    spatial_units: &[SpatialUnitId],
) -> EngineResult<(Operation, Operation)> {
    let mut biomass_matrices = Vec::with_capacity(spatial_units.len());
    let mut snag_matrices = Vec::with_capacity(spatial_units.len());
    for &su in spatial_units {
        let params = &store.spatial_unit(su)?.turnover;
        biomass_matrices.push(SparseMatrix::new(biomass_turnover_entries(layout, params)));
        snag_matrices.push(SparseMatrix::new(snag_turnover_entries(layout, params)));
    }
    let idx: Vec<usize> = (0..spatial_units.len()).collect();
    let biomass_op = Operation::from_matrix_list(Process::Turnover, biomass_matrices, idx.clone())?;
    let snag_op = Operation::from_matrix_list(Process::Turnover, snag_matrices, idx)?;
    Ok((biomass_op, snag_op))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::PoolSet;

    fn layout() -> PoolLayout {
        PoolLayout::resolve(&PoolSet::new(crate::layout::default_pool_names()).unwrap()).unwrap()
    }

    fn params() -> TurnoverParameter {
        TurnoverParameter {
            foliage_fall: 0.95,
            branch_fall: 0.03,
            stem_fall: 0.01,
            root_fall: 0.02,
            branch_snag_split: 0.25,
            above_to_below_fast: 0.5,
            stem_snag_rate: 0.1,
            branch_snag_rate: 0.1,
        }
    }

    #[test]
    fn biomass_turnover_rows_sum_to_one() {
        let layout = layout();
        let p = params();
        let entries = biomass_turnover_entries(&layout, &p);
        for &row in &[layout.foliage, layout.fine_root, layout.coarse_root, layout.other, layout.merch] {
            let sum: f64 = entries.iter().filter(|&&(r, _, _)| r == row).map(|&(_, _, v)| v).sum();
            assert!((sum - 1.0).abs() < 1e-9, "row {row} sums to {sum}");
        }
    }

    #[test]
    fn snag_turnover_rows_sum_to_one() {
        let layout = layout();
        let p = params();
        let entries = snag_turnover_entries(&layout, &p);
        for &row in &[layout.stem_snag, layout.branch_snag] {
            let sum: f64 = entries.iter().filter(|&&(r, _, _)| r == row).map(|&(_, _, v)| v).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }
}

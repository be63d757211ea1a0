//! the pool/flux compute engine (spec §4.A): applies an ordered sequence
//! of per-stand transition matrices to a population, optionally
//! accumulating flux indicators.
//!
//! each stand row is independent (spec §5), so the row loop may be run
//! in parallel behind the `parallel` feature with no synchronization.

use crate::error::{EngineError, EngineResult};
use crate::ops::{Entry, FluxIndicatorSet, Operation};
use crate::pools::{FluxMatrix, Population};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// replace `population` in place with the result of applying every
/// operation, in order, to each enabled stand's pool row. disabled
/// stands are left unchanged. pool 0 is re-asserted to 1.0 before return.
pub fn compute_pools(ops: &[&Operation], population: &mut Population, enabled: Option<&[bool]>) -> EngineResult<()> {
    validate_shapes(ops, population.rows(), enabled)?;
    let cols = population.cols();
    let rows = population.rows();
    let data = population.as_mut_slice();

    let body = |stand: usize, row: &mut [f64]| {
        if enabled.map(|e| e[stand]).unwrap_or(true) {
            let mut scratch = vec![0.0_f64; cols];
            for op in ops {
                apply_operation(op, stand, row, &mut scratch);
            }
        }
    };

    #[cfg(feature = "parallel")]
    data.par_chunks_mut(cols).enumerate().for_each(|(s, row)| body(s, row));
    #[cfg(not(feature = "parallel"))]
    for (s, row) in data.chunks_mut(cols).enumerate() {
        body(s, row);
    }
    let _ = rows;

    population.reassert_input_pool();
    Ok(())
}

/// as `compute_pools`, but also accumulates flux into `flux` for every
/// indicator in `indicators`, measured against the pool row as it stood
/// immediately before each operation. `flux` must already be zeroed by
/// the caller for this step (it is added to, not overwritten).
pub fn compute_flux(
    ops: &[&Operation],
    population: &mut Population,
    flux: &mut FluxMatrix,
    indicators: &FluxIndicatorSet,
    enabled: Option<&[bool]>,
) -> EngineResult<()> {
    validate_shapes(ops, population.rows(), enabled)?;
    if flux.rows() != population.rows() {
        return Err(EngineError::shape(
            "compute_flux",
            format!("flux has {} rows, population has {} rows", flux.rows(), population.rows()),
        ));
    }
    if flux.cols() != indicators.len() {
        return Err(EngineError::shape(
            "compute_flux",
            format!("flux has {} columns, expected {} indicators", flux.cols(), indicators.len()),
        ));
    }

    let cols = population.cols();
    let flux_cols = flux.cols();
    let pool_data = population.as_mut_slice();
    let flux_data = flux.as_mut_slice();

    let body = |stand: usize, pool_row: &mut [f64], flux_row: &mut [f64]| {
        if enabled.map(|e| e[stand]).unwrap_or(true) {
            let mut scratch = vec![0.0_f64; cols];
            for op in ops {
                apply_operation_with_flux(op, stand, pool_row, &mut scratch, flux_row, indicators);
            }
        }
    };

    #[cfg(feature = "parallel")]
    {
        pool_data
            .par_chunks_mut(cols)
            .zip(flux_data.par_chunks_mut(flux_cols))
            .enumerate()
            .for_each(|(s, (pool_row, flux_row))| body(s, pool_row, flux_row));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for (s, (pool_row, flux_row)) in pool_data
            .chunks_mut(cols)
            .zip(flux_data.chunks_mut(flux_cols))
            .enumerate()
        {
            body(s, pool_row, flux_row);
        }
    }

    population.reassert_input_pool();
    Ok(())
}

/// `p_new[j] = sum_i p[i] * entries[i,j]`, with any row that has no
/// explicit entry at all treated as identity (spec §3).
fn fold_matrix(entries: &[Entry], row: &[f64], scratch: &mut [f64]) {
    scratch.iter_mut().for_each(|v| *v = 0.0);
    let mut touched = vec![false; row.len()];
    for &(i, j, v) in entries {
        scratch[j] += row[i] * v;
        touched[i] = true;
    }
    for (i, t) in touched.iter().enumerate() {
        if !t {
            scratch[i] += row[i];
        }
    }
}

fn apply_operation(op: &Operation, stand: usize, row: &mut [f64], scratch: &mut [f64]) {
    let entries = op.entries_for_stand(stand);
    fold_matrix(&entries, row, scratch);
    row.copy_from_slice(scratch);
}

fn apply_operation_with_flux(
    op: &Operation,
    stand: usize,
    row: &mut [f64],
    scratch: &mut [f64],
    flux_row: &mut [f64],
    indicators: &FluxIndicatorSet,
) {
    let entries = op.entries_for_stand(stand);
    let process = op.process();
    for &(i, j, v) in &entries {
        if i != j {
            let mass = row[i] * v;
            if mass != 0.0 {
                indicators.accumulate(i, j, mass, process, flux_row);
            }
        }
    }
    fold_matrix(&entries, row, scratch);
    row.copy_from_slice(scratch);
}

fn validate_shapes(ops: &[&Operation], rows: usize, enabled: Option<&[bool]>) -> EngineResult<()> {
    for op in ops {
        if op.stand_count() != rows {
            return Err(EngineError::shape(
                "compute_pools",
                format!("operation covers {} stands, population has {rows}", op.stand_count()),
            ));
        }
    }
    if let Some(flags) = enabled {
        if flags.len() != rows {
            return Err(EngineError::shape(
                "compute_pools",
                format!("enabled mask has {} entries, population has {rows} rows", flags.len()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{FluxIndicator, Process, SparseMatrix};

    fn pop(rows: Vec<Vec<f64>>) -> Population {
        let cols = rows[0].len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Population::from_rows(flat.len() / cols, cols, flat).unwrap()
    }

    #[test]
    fn identity_only_leaves_population_unchanged() {
        let mut p = pop(vec![vec![1.0, 2.0, 3.0], vec![1.0, 5.0, 7.0]]);
        let op = Operation::from_matrix_list(
            Process::Growth,
            vec![SparseMatrix::identity()],
            vec![0, 0],
        )
        .unwrap();
        let before = p.as_slice().to_vec();
        compute_pools(&[&op], &mut p, None).unwrap();
        assert_eq!(p.as_slice(), before.as_slice());
    }

    #[test]
    fn transfer_moves_mass_between_pools() {
        // pool 1 -> pool 2 at 50%, pool 1 retains the other 50% explicitly.
        let mut p = pop(vec![vec![1.0, 10.0, 0.0]]);
        let m = SparseMatrix::new(vec![(1, 1, 0.5), (1, 2, 0.5)]);
        let op = Operation::from_matrix_list(Process::Turnover, vec![m], vec![0]).unwrap();
        compute_pools(&[&op], &mut p, None).unwrap();
        assert_eq!(p.row(0), &[1.0, 5.0, 5.0]);
    }

    #[test]
    fn disabled_stand_is_skipped() {
        let mut p = pop(vec![vec![1.0, 10.0], vec![1.0, 10.0]]);
        let m = SparseMatrix::new(vec![(1, 1, 0.0)]); // would zero pool 1
        let op = Operation::from_matrix_list(Process::Disturbance, vec![m], vec![0, 0]).unwrap();
        compute_pools(&[&op], &mut p, Some(&[true, false])).unwrap();
        assert_eq!(p.row(0)[1], 0.0);
        assert_eq!(p.row(1)[1], 10.0);
    }

    #[test]
    fn flux_excludes_self_flow_and_sums_matching_process() {
        let mut p = pop(vec![vec![1.0, 10.0, 0.0]]);
        let m = SparseMatrix::new(vec![(1, 1, 0.5), (1, 2, 0.5)]);
        let op = Operation::from_matrix_list(Process::Decay, vec![m], vec![0]).unwrap();
        let indicators =
            FluxIndicatorSet::new(vec![FluxIndicator::new("decay_to_2", Process::Decay, vec![1], vec![2])])
                .unwrap();
        let mut flux = FluxMatrix::zeros(1, 1);
        compute_flux(&[&op], &mut p, &mut flux, &indicators, None).unwrap();
        assert_eq!(flux.row(0)[0], 5.0);
        assert_eq!(p.row(0), &[1.0, 5.0, 5.0]);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let mut p = pop(vec![vec![1.0, 10.0]]);
        let op = Operation::from_matrix_list(Process::Decay, vec![SparseMatrix::identity()], vec![0, 0])
            .unwrap();
        let err = compute_pools(&[&op], &mut p, None).unwrap_err();
        assert!(matches!(err, EngineError::ShapeMismatch { .. }));
    }
}

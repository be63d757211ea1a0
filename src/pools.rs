//! the pool set and the population matrix (spec §3).
//!
//! pool index 0 is always the "Input" pool, held at 1.0. everything else
//! is whatever the caller's parameter bundle declares.

use crate::error::{EngineError, EngineResult};
use std::collections::HashMap;

pub const INPUT_POOL: usize = 0;

/// the fixed, shared set of carbon pools for a simulation. built once at
/// engine construction and never mutated after.
#[derive(Debug, Clone)]
pub struct PoolSet {
    names: Vec<String>,
    index_of: HashMap<String, usize>,
}

impl PoolSet {
    /// `names[0]` must be the Input pool by convention; callers are free to
    /// name it whatever they like but it is always index 0.
    pub fn new(names: Vec<String>) -> EngineResult<Self> {
        if names.is_empty() {
            return Err(EngineError::configuration("PoolSet::new", "pool set is empty"));
        }
        let mut index_of = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if index_of.insert(name.clone(), i).is_some() {
                return Err(EngineError::configuration(
                    "PoolSet::new",
                    format!("duplicate pool name {name}"),
                ));
            }
        }
        Ok(Self { names, index_of })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index(&self, name: &str) -> EngineResult<usize> {
        self.index_of
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::configuration("PoolSet::index", format!("unknown pool {name}")))
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// the stacked pool vectors for every stand: N rows, `pool_count` columns,
/// row-major and contiguous, matching the caller-owned buffer contract of
/// spec §6.
#[derive(Debug, Clone)]
pub struct Population {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Population {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    /// build from a caller-owned flat buffer; pool 0 is immediately
    /// reasserted to 1.0 for every row (spec §3 invariant).
    pub fn from_rows(rows: usize, cols: usize, mut data: Vec<f64>) -> EngineResult<Self> {
        if data.len() != rows * cols {
            return Err(EngineError::shape(
                "Population::from_rows",
                format!("expected {} elements, got {}", rows * cols, data.len()),
            ));
        }
        for r in 0..rows {
            data[r * cols + INPUT_POOL] = 1.0;
        }
        Ok(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// pool 0 ≡ 1.0 at every step boundary.
    pub fn reassert_input_pool(&mut self) {
        for r in 0..self.rows {
            self.data[r * self.cols + INPUT_POOL] = 1.0;
        }
    }

    /// append `count` duplicate rows copied from `source_row`, used by the
    /// rule-based event processor to split a stand. returns the index of
    /// the first appended row.
    pub fn push_copies(&mut self, source_row: usize, count: usize) -> usize {
        let first = self.rows;
        let src: Vec<f64> = self.row(source_row).to_vec();
        for _ in 0..count {
            self.data.extend_from_slice(&src);
        }
        self.rows += count;
        first
    }
}

/// flux accumulator: same row shape as `Population`, one column per flux
/// indicator, zeroed by the caller before each step (spec §4.A).
pub type FluxMatrix = Population;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_set_rejects_duplicates() {
        let err = PoolSet::new(vec!["Input".into(), "Input".into()]).unwrap_err();
        assert!(matches!(err, EngineError::Configuration { .. }));
    }

    #[test]
    fn population_reasserts_input_pool() {
        let mut p = Population::from_rows(2, 3, vec![0.0, 1.0, 2.0, 5.0, 6.0, 7.0]).unwrap();
        assert_eq!(p.row(0)[0], 1.0);
        assert_eq!(p.row(1)[0], 1.0);
        p.row_mut(0)[0] = 0.0;
        p.reassert_input_pool();
        assert_eq!(p.row(0)[0], 1.0);
    }

    #[test]
    fn push_copies_duplicates_row() {
        let mut p = Population::from_rows(1, 2, vec![1.0, 9.0]).unwrap();
        let first = p.push_copies(0, 2);
        assert_eq!(first, 1);
        assert_eq!(p.rows(), 3);
        assert_eq!(p.row(1), p.row(0));
        assert_eq!(p.row(2), p.row(0));
    }
}

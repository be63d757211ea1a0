//! operations: owned blocks of per-stand sparse transition matrices, plus
//! the arena that owns them (spec §3 "Operation", §4.B "Operation Store").

use crate::error::{EngineError, EngineResult};

/// the process an operation is tagged with, for flux attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Process {
    Growth,
    Turnover,
    Decay,
    Disturbance,
}

/// a single sparse entry of a transition matrix: mass flows from `row` to
/// `col` scaled by `value`. row == col is a self-retention entry.
pub type Entry = (usize, usize, f64);

/// one transition matrix, stored as its explicit non-default entries. a
/// pool index that never appears as a `row` in any entry is implicitly
/// identity (spec §3: "Diagonal entries default to 1"); a pool index that
/// does appear is governed entirely by its listed entries — the provider
/// is responsible for including explicit self-retention where needed
/// (spec §4.B: "no implicit normalisation").
#[derive(Debug, Clone, Default)]
pub struct SparseMatrix {
    entries: Vec<Entry>,
}

impl SparseMatrix {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn identity() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        self.entries.push((row, col, value));
    }
}

/// two physical storage forms for the matrices backing an operation.
#[derive(Debug, Clone)]
enum Storage {
    /// full list of distinct matrices, each held explicitly.
    List(Vec<SparseMatrix>),
    /// one coordinate template shared by every matrix, with a parallel
    /// value array per matrix. used when many stands share structure but
    /// differ in values (typical for growth).
    Repeating { coords: Vec<(usize, usize)>, values: Vec<Vec<f64>> },
}

impl Storage {
    fn matrix_count(&self) -> usize {
        match self {
            Storage::List(m) => m.len(),
            Storage::Repeating { values, .. } => values.len(),
        }
    }

    fn entries_for(&self, matrix_index: usize) -> Vec<Entry> {
        match self {
            Storage::List(m) => m[matrix_index].entries().to_vec(),
            Storage::Repeating { coords, values } => coords
                .iter()
                .zip(values[matrix_index].iter())
                .map(|(&(r, c), &v)| (r, c, v))
                .collect(),
        }
    }
}

/// an owned block of matrices, one per distinct matrix, plus a per-stand
/// index mapping each stand to one matrix in the block. carries the
/// process tag used for flux attribution.
#[derive(Debug, Clone)]
pub struct Operation {
    process: Process,
    storage: Storage,
    stand_to_matrix: Vec<usize>,
}

impl Operation {
    pub fn from_matrix_list(
        process: Process,
        matrices: Vec<SparseMatrix>,
        stand_to_matrix: Vec<usize>,
    ) -> EngineResult<Self> {
        Self::validate_index(&stand_to_matrix, matrices.len())?;
        Ok(Self { process, storage: Storage::List(matrices), stand_to_matrix })
    }

    pub fn from_repeating_coordinates(
        process: Process,
        coords: Vec<(usize, usize)>,
        values: Vec<Vec<f64>>,
        stand_to_matrix: Vec<usize>,
    ) -> EngineResult<Self> {
        for (i, v) in values.iter().enumerate() {
            if v.len() != coords.len() {
                return Err(EngineError::shape(
                    "Operation::from_repeating_coordinates",
                    format!("matrix {i} has {} values, expected {}", v.len(), coords.len()),
                ));
            }
        }
        Self::validate_index(&stand_to_matrix, values.len())?;
        Ok(Self { process, storage: Storage::Repeating { coords, values }, stand_to_matrix })
    }

    fn validate_index(stand_to_matrix: &[usize], matrix_count: usize) -> EngineResult<()> {
        for (stand, &idx) in stand_to_matrix.iter().enumerate() {
            if idx >= matrix_count {
                return Err(EngineError::shape(
                    "Operation::validate_index",
                    format!("stand {stand} maps to matrix {idx}, but only {matrix_count} exist"),
                ));
            }
        }
        Ok(())
    }

    pub fn process(&self) -> Process {
        self.process
    }

    pub fn stand_count(&self) -> usize {
        self.stand_to_matrix.len()
    }

    /// the explicit entries of the matrix assigned to `stand`.
    pub fn entries_for_stand(&self, stand: usize) -> Vec<Entry> {
        let idx = self.stand_to_matrix[stand];
        self.storage.entries_for(idx)
    }

    pub fn matrix_count(&self) -> usize {
        self.storage.matrix_count()
    }
}

/// a named flow meter: accumulates, per stand per step, the mass flowing
/// from any of `sources` to any of `sinks` under operations tagged
/// `process`. self-flows are excluded (spec §3).
#[derive(Debug, Clone)]
pub struct FluxIndicator {
    pub name: String,
    pub process: Process,
    pub sources: Vec<usize>,
    pub sinks: Vec<usize>,
}

impl FluxIndicator {
    pub fn new(name: impl Into<String>, process: Process, sources: Vec<usize>, sinks: Vec<usize>) -> Self {
        Self { name: name.into(), process, sources, sinks }
    }

    fn matches(&self, row: usize, col: usize) -> bool {
        row != col && self.sources.contains(&row) && self.sinks.contains(&col)
    }
}

/// the stable, ordered list of flux indicators for a simulation, loaded
/// once at construction (spec §6). produces a stable column order for
/// the flux matrix.
#[derive(Debug, Clone, Default)]
pub struct FluxIndicatorSet {
    indicators: Vec<FluxIndicator>,
}

impl FluxIndicatorSet {
    pub fn new(indicators: Vec<FluxIndicator>) -> EngineResult<Self> {
        if indicators.iter().any(|i| i.name.trim().is_empty()) {
            return Err(EngineError::configuration(
                "FluxIndicatorSet::new",
                "flux indicator with empty name",
            ));
        }
        Ok(Self { indicators })
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FluxIndicator> {
        self.indicators.iter()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.indicators.iter().position(|i| i.name == name)
    }

    /// indices (and references) of indicators tagged with `process`.
    pub(crate) fn for_process(&self, process: Process) -> impl Iterator<Item = (usize, &FluxIndicator)> {
        self.indicators
            .iter()
            .enumerate()
            .filter(move |(_, i)| i.process == process)
    }

    pub(crate) fn accumulate(&self, row: usize, col: usize, mass: f64, process: Process, out: &mut [f64]) {
        for (i, indicator) in self.for_process(process) {
            if indicator.matches(row, col) {
                out[i] += mass;
            }
        }
    }
}

/// a simple arena owning operations by handle, mirroring spec §4.B's
/// `allocate` / `set_matrices` / `free` contract. in this in-process Rust
/// form the "handle" is just an index and `free` drops the slot.
#[derive(Debug, Default)]
pub struct OperationStore {
    slots: Vec<Option<Operation>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpHandle(usize);

impl OperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, op: Operation) -> OpHandle {
        self.slots.push(Some(op));
        OpHandle(self.slots.len() - 1)
    }

    pub fn get(&self, handle: OpHandle) -> EngineResult<&Operation> {
        self.slots
            .get(handle.0)
            .and_then(|s| s.as_ref())
            .ok_or_else(|| EngineError::shape("OperationStore::get", "operation handle freed or invalid"))
    }

    pub fn free(&mut self, handle: OpHandle) {
        if let Some(slot) = self.slots.get_mut(handle.0) {
            *slot = None;
        }
    }
}

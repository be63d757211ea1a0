//! disturbance provider (spec §4.F): looks up each stand's disturbance
//! matrix by disturbance type and spatial unit.

use crate::error::EngineResult;
use crate::ops::{Entry, Operation, Process, SparseMatrix};
use crate::params::{DisturbanceTypeId, ParameterStore, SpatialUnitId};
use crate::pools::PoolSet;

/// converts a parameter-store disturbance matrix (named source/sink
/// pools) into sparse entries against the caller's concrete `PoolSet`.
pub fn matrix_entries(store: &ParameterStore, pools: &PoolSet, disturbance_type: DisturbanceTypeId, spatial_unit: SpatialUnitId) -> EngineResult<Vec<Entry>> {
    if disturbance_type <= 0 {
        return Ok(Vec::new()); // identity: no flow (spec §4.F)
    }
    let matrix = store.disturbance_matrix_for(disturbance_type, spatial_unit)?;
    let mut entries = Vec::with_capacity(matrix.rows.len());
    for row in &matrix.rows {
        let src = pools.index(&row.source)?;
        let dst = pools.index(&row.sink)?;
        entries.push((src, dst, row.proportion));
    }
    Ok(entries)
}

pub fn build_disturbance_operation(
    store: &ParameterStore,
    pools: &PoolSet,
    disturbance_types: &[DisturbanceTypeId],
    spatial_units: &[SpatialUnitId],
) -> EngineResult<Operation> {
    let mut matrices = Vec::with_capacity(disturbance_types.len());
    for (&dt, &su) in disturbance_types.iter().zip(spatial_units.iter()) {
        matrices.push(SparseMatrix::new(matrix_entries(store, pools, dt, su)?));
    }
    let idx: Vec<usize> = (0..disturbance_types.len()).collect();
    Operation::from_matrix_list(Process::Disturbance, matrices, idx)
}

/// whether this disturbance type resets stand age (spec §4.F, §4.G).
pub fn is_stand_replacing(store: &ParameterStore, disturbance_type: DisturbanceTypeId) -> EngineResult<bool> {
    if disturbance_type <= 0 {
        return Ok(false);
    }
    Ok(store.disturbance_type(disturbance_type)?.stand_replacing)
}

/// target land class for a deforestation-style disturbance, if any
/// (spec §4.F: "consumed by the stand state engine on the next advance").
pub fn land_class_transition(store: &ParameterStore, disturbance_type: DisturbanceTypeId) -> EngineResult<Option<String>> {
    if disturbance_type <= 0 {
        return Ok(None);
    }
    Ok(store.disturbance_type(disturbance_type)?.land_class_transition.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::default_pool_names;
    use crate::params::{DisturbanceMatrix, DisturbanceMatrixRow, DisturbanceTypeParameters};
    use std::collections::HashMap;

    #[test]
    fn non_positive_disturbance_type_is_identity() {
        let pools = PoolSet::new(default_pool_names()).unwrap();
        let store = ParameterStore::build(crate::params::ParameterBundle {
            spatial_units: vec![],
            disturbance_types: vec![],
            disturbance_matrices: vec![],
            biomass_coefficients: vec![],
            afforestation_soil: vec![],
            volume_curves: Default::default(),
            min_rotations: 1,
            max_rotations: 1,
        })
        .unwrap();
        assert!(matrix_entries(&store, &pools, 0, 1).unwrap().is_empty());
    }

    #[test]
    fn lookup_resolves_named_pools_to_indices() {
        let pools = PoolSet::new(default_pool_names()).unwrap();
        let bundle = crate::params::ParameterBundle {
            spatial_units: vec![],
            disturbance_types: vec![DisturbanceTypeParameters {
                disturbance_type: 1,
                stand_replacing: true,
                reset_age: None,
                land_class_transition: None,
                matrix_by_spatial_unit: HashMap::new(),
                default_matrix: 1,
            }],
            disturbance_matrices: vec![DisturbanceMatrix {
                id: 1,
                rows: vec![DisturbanceMatrixRow { source: "Merch".into(), sink: "CO2".into(), proportion: 0.3 }],
            }],
            biomass_coefficients: vec![],
            afforestation_soil: vec![],
            volume_curves: Default::default(),
            min_rotations: 1,
            max_rotations: 1,
        };
        let store = ParameterStore::build(bundle).unwrap();
        let entries = matrix_entries(&store, &pools, 1, 99).unwrap();
        assert_eq!(entries, vec![(pools.index("Merch").unwrap(), pools.index("CO2").unwrap(), 0.3)]);
        assert!(is_stand_replacing(&store, 1).unwrap());
    }
}

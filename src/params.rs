//! the read-only parameter store (spec §4.C): decay, turnover, disturbance
//! matrix, and biomass conversion coefficients, keyed by spatial unit /
//! disturbance type / species as the spec describes. loaded once at
//! engine construction from a `serde`-deserializable bundle and never
//! mutated after (spec §5: "Parameter store ... may be freely shared").

use crate::error::{EngineError, EngineResult};
use crate::growth::VolumeCurveSet;
use serde::Deserialize;
use std::collections::HashMap;

pub type SpatialUnitId = u32;
pub type DisturbanceTypeId = i32;
pub type SpeciesId = u32;

#[derive(Debug, Clone, Deserialize)]
pub struct DecayParameter {
    pub pool: String,
    pub base_rate: f64,
    pub q10: f64,
    pub reference_temperature: f64,
    pub max_rate: f64,
    pub prop_to_atmosphere: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnoverParameter {
    pub foliage_fall: f64,
    pub branch_fall: f64,
    pub stem_fall: f64,
    pub root_fall: f64,
    pub branch_snag_split: f64,
    pub above_to_below_fast: f64,
    pub stem_snag_rate: f64,
    pub branch_snag_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpatialUnitParameters {
    pub spatial_unit: SpatialUnitId,
    pub mean_annual_temperature: f64,
    pub random_return_interval: f64,
    pub slow_mixing_rate: f64,
    pub decay: Vec<DecayParameter>,
    pub turnover: TurnoverParameter,
}

impl SpatialUnitParameters {
    pub fn decay_for(&self, pool_name: &str) -> Option<&DecayParameter> {
        self.decay.iter().find(|d| d.pool == pool_name)
    }
}

/// `(source_pool, sink_pool, proportion)` triplets, summing to 1.0 per
/// source pool (spec §4.C).
#[derive(Debug, Clone, Deserialize)]
pub struct DisturbanceMatrixRow {
    pub source: String,
    pub sink: String,
    pub proportion: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisturbanceMatrix {
    pub id: u32,
    pub rows: Vec<DisturbanceMatrixRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisturbanceTypeParameters {
    pub disturbance_type: DisturbanceTypeId,
    pub stand_replacing: bool,
    pub reset_age: Option<u32>,
    pub land_class_transition: Option<String>,
    /// matrix id by spatial unit; falls back to `default_matrix` when a
    /// spatial unit has no specific override.
    pub matrix_by_spatial_unit: HashMap<SpatialUnitId, u32>,
    pub default_matrix: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BiomassConversionCoefficients {
    pub species: SpeciesId,
    pub merch_to_foliage: f64,
    pub merch_to_other: f64,
    pub merch_to_coarse_root: f64,
    pub merch_to_fine_root: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AfforestationPreTypeSoil {
    pub pre_type: String,
    pub pool: String,
    pub initial_mass: f64,
}

/// everything the parameter store serves, gathered into one bundle that
/// deserializes as a unit (spec §6 "Parameter input").
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterBundle {
    pub spatial_units: Vec<SpatialUnitParameters>,
    pub disturbance_types: Vec<DisturbanceTypeParameters>,
    pub disturbance_matrices: Vec<DisturbanceMatrix>,
    pub biomass_coefficients: Vec<BiomassConversionCoefficients>,
    pub afforestation_soil: Vec<AfforestationPreTypeSoil>,
    pub volume_curves: VolumeCurveSet,
    pub min_rotations: u32,
    pub max_rotations: u32,
}

/// the indexed, query-ready form of a `ParameterBundle`. construction
/// validates referenced ids exist (spec §7: "the core performs no schema
/// validation beyond checking that referenced ids exist at lookup time" —
/// here we additionally catch dangling matrix ids up front since that is
/// cheap and the bundle is loaded once).
pub struct ParameterStore {
    spatial_units: HashMap<SpatialUnitId, SpatialUnitParameters>,
    disturbance_types: HashMap<DisturbanceTypeId, DisturbanceTypeParameters>,
    disturbance_matrices: HashMap<u32, DisturbanceMatrix>,
    biomass_coefficients: HashMap<SpeciesId, BiomassConversionCoefficients>,
    afforestation_soil: Vec<AfforestationPreTypeSoil>,
    pub volume_curves: VolumeCurveSet,
    pub min_rotations: u32,
    pub max_rotations: u32,
}

impl ParameterStore {
    pub fn build(bundle: ParameterBundle) -> EngineResult<Self> {
        let disturbance_matrices: HashMap<u32, DisturbanceMatrix> =
            bundle.disturbance_matrices.into_iter().map(|m| (m.id, m)).collect();

        for dt in &bundle.disturbance_types {
            if !disturbance_matrices.contains_key(&dt.default_matrix) {
                return Err(EngineError::configuration(
                    "ParameterStore::build",
                    format!(
                        "disturbance type {} references unknown default matrix {}",
                        dt.disturbance_type, dt.default_matrix
                    ),
                ));
            }
            for (&su, &mid) in &dt.matrix_by_spatial_unit {
                if !disturbance_matrices.contains_key(&mid) {
                    return Err(EngineError::configuration(
                        "ParameterStore::build",
                        format!(
                            "disturbance type {} spatial unit {su} references unknown matrix {mid}",
                            dt.disturbance_type
                        ),
                    ));
                }
            }
        }

        Ok(Self {
            spatial_units: bundle.spatial_units.into_iter().map(|s| (s.spatial_unit, s)).collect(),
            disturbance_types: bundle
                .disturbance_types
                .into_iter()
                .map(|d| (d.disturbance_type, d))
                .collect(),
            disturbance_matrices,
            biomass_coefficients: bundle.biomass_coefficients.into_iter().map(|b| (b.species, b)).collect(),
            afforestation_soil: bundle.afforestation_soil,
            volume_curves: bundle.volume_curves,
            min_rotations: bundle.min_rotations,
            max_rotations: bundle.max_rotations,
        })
    }

    pub fn spatial_unit(&self, id: SpatialUnitId) -> EngineResult<&SpatialUnitParameters> {
        self.spatial_units
            .get(&id)
            .ok_or_else(|| EngineError::domain("ParameterStore::spatial_unit", format!("unknown spatial unit {id}")))
    }

    pub fn disturbance_type(&self, id: DisturbanceTypeId) -> EngineResult<&DisturbanceTypeParameters> {
        self.disturbance_types
            .get(&id)
            .ok_or_else(|| EngineError::domain("ParameterStore::disturbance_type", format!("unmapped disturbance type {id}")))
    }

    pub fn disturbance_matrix_for(&self, disturbance_type: DisturbanceTypeId, spatial_unit: SpatialUnitId) -> EngineResult<&DisturbanceMatrix> {
        let dt = self.disturbance_type(disturbance_type)?;
        let matrix_id = dt.matrix_by_spatial_unit.get(&spatial_unit).copied().unwrap_or(dt.default_matrix);
        self.disturbance_matrices
            .get(&matrix_id)
            .ok_or_else(|| EngineError::configuration("ParameterStore::disturbance_matrix_for", format!("matrix {matrix_id} not found")))
    }

    pub fn biomass_coefficients(&self, species: SpeciesId) -> EngineResult<&BiomassConversionCoefficients> {
        self.biomass_coefficients
            .get(&species)
            .ok_or_else(|| EngineError::domain("ParameterStore::biomass_coefficients", format!("unknown species {species}")))
    }

    pub fn afforestation_soil(&self, pre_type: &str) -> impl Iterator<Item = &AfforestationPreTypeSoil> {
        self.afforestation_soil.iter().filter(move |s| s.pre_type == pre_type)
    }
}

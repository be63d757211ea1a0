//! inventory records (spec §3): the per-stand starting configuration fed
//! in from the (out-of-scope) SIT importer.

use crate::classifiers::ClassifierKey;
use crate::params::{DisturbanceTypeId, SpatialUnitId};
use serde::Deserialize;

pub type LandClassId = u32;

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryRecord {
    pub classifiers: Vec<u32>,
    pub age: u32,
    pub area: f64,
    pub delay: u32,
    pub land_class: LandClassId,
    pub afforestation_pre_type: Option<String>,
    pub spatial_unit: SpatialUnitId,
    pub historical_disturbance_type: DisturbanceTypeId,
    pub last_pass_disturbance_type: DisturbanceTypeId,
}

impl InventoryRecord {
    pub fn classifier_key(&self) -> ClassifierKey {
        ClassifierKey::new(self.classifiers.clone())
    }
}

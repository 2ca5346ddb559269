//! Observation data containers (spec.md §3 `typeValueMap`, `satTypeValueMap`,
//! observation record).
mod observation;
mod sat_type_value_map;
mod type_value_map;

pub use observation::ObservationEpoch;
pub use sat_type_value_map::SatTypeValueMap;
pub use type_value_map::TypeValueMap;

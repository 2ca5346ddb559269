//! Closed-vocabulary identifiers used throughout the pipeline/filter/ambiguity
//! modules (spec.md §3 `Epoch`, `SatID`, `SourceID`, `TypeID`).
mod sat;
mod source;
mod type_id;

pub use sat::SatId;
pub use source::SourceId;
pub use type_id::{tracking_priority, Bands, ObsKind, Signal, TypeId};

pub use hifitime::Epoch;
pub use gnss::prelude::Constellation;

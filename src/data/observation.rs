use hifitime::Epoch;

use crate::data::SatTypeValueMap;
use crate::identifiers::SourceId;

/// One epoch's worth of raw receiver observations, spec.md §3 "Observation
/// record". This is the unit the pipeline's first stage consumes; every
/// later stage both reads and rewrites the `data` map in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationEpoch {
    /// Sampling instant, in the receiver's native time scale.
    pub epoch: Epoch,
    /// A priori receiver position estimate (ECEF meters), refined epoch to
    /// epoch by the filter in kinematic mode, constant in static mode.
    pub apriori_position: (f64, f64, f64),
    /// Reference position used to compute ENU displacements for output,
    /// typically the surveyed/marker position.
    pub reference_position: (f64, f64, f64),
    pub marker_name: String,
    pub source: SourceId,
    /// Per-satellite observation data.
    pub data: SatTypeValueMap,
    /// True for the very first epoch seen in the stream.
    pub is_first_epoch: bool,
    /// Nominal sampling interval, used for gap/decimation checks.
    pub interval: hifitime::Duration,
}

impl ObservationEpoch {
    pub fn satellite_count(&self) -> usize {
        self.data.len()
    }
}

//! External-collaborator contracts (spec.md §6), reified as narrow Rust
//! traits instead of left as prose. Grounded on the teacher's own seam:
//! `Solver::interpolator: fn(Epoch, SV, usize) -> Option<InterpolationResult>`
//! and `Solver::tropo_components: fn(Epoch, f64, f64) -> Option<TropoComponents>`.
//! This crate only consumes these traits; it never parses a file.
use hifitime::Epoch;

use crate::identifiers::{SatId, TypeId};
use crate::vector::Vector3D;

/// Satellite position/velocity/clock source (spec.md §6 "ORBIT/CLOCK":
/// SP3, CLK, or broadcast NAV). Implemented by the host application over
/// whichever precise-product reader it has chosen.
pub trait OrbitClockSource {
    /// Interpolated satellite position at transmission time `t`, ECEF
    /// meters, using up to `interp_order` surrounding SP3 epochs.
    fn sat_position(&self, t: Epoch, sat: SatId, interp_order: usize) -> Option<Vector3D>;
    /// Interpolated satellite clock offset, seconds.
    fn sat_clock_offset(&self, t: Epoch, sat: SatId) -> Option<f64>;
}

/// Antenna phase-center model (spec.md §6 "ANTEX"): PCO/PCV corrections
/// for both satellite and receiver antennas.
pub trait AntennaModel {
    /// Satellite antenna phase-center offset, body-frame meters, for the
    /// given signal.
    fn satellite_pco(&self, sat: SatId, signal: &TypeId, t: Epoch) -> Option<Vector3D>;
    /// Satellite antenna phase-center variation, meters, at nadir angle
    /// `nadir_rad`.
    fn satellite_pcv(&self, sat: SatId, signal: &TypeId, nadir_rad: f64) -> Option<f64>;
    /// Receiver antenna phase-center offset, local ENU meters.
    fn receiver_pco(&self, signal: &TypeId) -> Option<Vector3D>;
    /// Receiver antenna phase-center variation, meters, at elevation/azimuth.
    fn receiver_pcv(&self, signal: &TypeId, elevation_rad: f64, azimuth_rad: f64) -> Option<f64>;
}

/// Ocean-loading displacement source (spec.md §6 "BLQ").
pub trait OceanLoadingModel {
    /// Ocean-loading displacement at `t`, local ENU meters.
    fn displacement(&self, t: Epoch) -> Option<Vector3D>;
}

/// Earth-orientation parameter source (spec.md §6 "ERP").
pub trait ErpSource {
    /// Polar motion coordinates (x, y), radians, and `dut1`, seconds.
    fn polar_motion(&self, t: Epoch) -> Option<(f64, f64, f64)>;
}

/// Widelane/integer-recovery-clock product source, used by ambiguity
/// resolution (spec.md §6 "UPD/IRC").
pub trait UpdSource {
    /// Uncalibrated phase delay correction for `sat`/`signal` at `t`, cycles.
    fn upd(&self, sat: SatId, signal: &TypeId, t: Epoch) -> Option<f64>;
}

/// Troposphere mapping/zenith-delay source the host may override
/// (spec.md §6 `tropo_components` seam, generalized from the teacher's
/// `fn(Epoch, f64, f64) -> Option<TropoComponents>` field into a trait).
pub trait TropoModelSource {
    /// Zenith dry and wet delay, meters, at `(lat_ddeg, alt_above_sea_m)`.
    fn zenith_delays(&self, t: Epoch, lat_ddeg: f64, alt_above_sea_m: f64) -> Option<(f64, f64)>;
}

//! Code and phase bias correction (spec.md §2 step 3, §4.5 step 2, §6
//! BIAS row), grounded on
//! `original_source/src/FileHandling/BiasDataReader.{hpp,cpp}` and
//! `CorrectRecBias.{hpp,cpp}`/`CorrectPhaseBiases.{hpp,cpp}` for the
//! absolute-vs-relative composition algebra. This crate only consumes
//! the [BiasStore] trait; the host supplies OSB/DSB/UPD/IRC values read
//! from whichever product file it parsed.
use hifitime::Epoch;

use crate::identifiers::{SatId, TypeId};

/// Observable-specific (absolute, OSB) or differential (relative, DSB)
/// code-bias and phase-bias source (spec.md §6 "BIAS").
pub trait BiasStore {
    /// Observable-specific code bias, meters, to apply to `signal` so it
    /// refers to the same reference as the precise clock product.
    fn osb(&self, sat: SatId, signal: &TypeId, t: Epoch) -> Option<f64>;

    /// Differential code bias between two signals, meters
    /// (`signal_a - signal_b` sense).
    fn dsb(&self, sat: SatId, signal_a: &TypeId, signal_b: &TypeId, t: Epoch) -> Option<f64>;

    /// Uncalibrated/integer-recovery phase bias, cycles.
    fn phase_bias(&self, sat: SatId, signal: &TypeId, t: Epoch) -> Option<f64>;
}

/// Applies an OSB correction directly (spec.md §2 step 3 "absolute"
/// case): `corrected = raw - osb`.
pub fn apply_osb(raw: f64, osb_meters: f64) -> f64 {
    raw - osb_meters
}

/// Composes a DSB-only correction onto `signal` referenced against
/// `reference_signal` (spec.md §2 step 3 "relative" case), grounded on
/// `CorrectRecBias.cpp`'s "reconstruct the absolute bias from a chain of
/// differentials anchored at the reference signal" algebra: when only a
/// DSB between `signal` and `reference_signal` is available, and the
/// reference signal is assumed bias-free by convention,
/// `osb(signal) ~= dsb(signal, reference_signal)`.
pub fn osb_from_dsb_chain(dsb_signal_minus_reference: f64) -> f64 {
    dsb_signal_minus_reference
}

/// Applies a phase bias correction, cycles converted to meters via the
/// signal's wavelength (spec.md §4.5 step 2 "optionally correct phase
/// biases too").
pub fn apply_phase_bias(raw_meters: f64, bias_cycles: f64, wavelength_m: f64) -> f64 {
    raw_meters - bias_cycles * wavelength_m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn osb_correction_subtracts_bias() {
        assert_eq!(apply_osb(100.0, 0.5), 99.5);
    }

    #[test]
    fn phase_bias_converts_cycles_to_meters() {
        let corrected = apply_phase_bias(1000.0, 2.0, 0.19);
        assert!((corrected - (1000.0 - 0.38)).abs() < 1e-9);
    }
}

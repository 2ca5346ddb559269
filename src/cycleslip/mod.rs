//! Cycle-slip detection (spec.md §4.1). The Melbourne-Wubbena detector's
//! Welford running mean/variance update, thresholds, and reset-on-slip
//! transition are grounded on
//! `original_source/src/ProceFrame/DetectCSMW.cpp`; the geometry-free
//! detector's piecewise-linear elevation/gap threshold is grounded on
//! spec.md §4.1 directly, generalizing the teacher's
//! `rinex::cs::OptsThreshold { a0, a1 }` single-exponential idiom to the
//! spec's explicit lookup table.
use hifitime::{Duration, Epoch};

/// Default maximum gap tolerated before a combination resets cold
/// (spec.md §4.1 `DtMax = 61 s`).
pub const DEFAULT_DT_MAX_SECONDS: f64 = 61.0;
/// Default cycle-slip multiplier on the wide-lane wavelength (`k = 1`).
pub const DEFAULT_K_CYCLES: f64 = 1.0;

/// Per (satellite, MW combination) running statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MwDetector {
    former_epoch: Option<Epoch>,
    mean: f64,
    variance: f64,
    initial_variance: f64,
    count: u32,
    dt_max_seconds: f64,
    k_cycles: f64,
}

impl MwDetector {
    pub fn new(initial_variance: f64) -> Self {
        Self {
            former_epoch: None,
            mean: 0.0,
            variance: initial_variance,
            initial_variance,
            count: 0,
            dt_max_seconds: DEFAULT_DT_MAX_SECONDS,
            k_cycles: DEFAULT_K_CYCLES,
        }
    }

    pub fn with_thresholds(mut self, dt_max_seconds: f64, k_cycles: f64) -> Self {
        self.dt_max_seconds = dt_max_seconds;
        self.k_cycles = k_cycles;
        self
    }

    /// Feeds one epoch's MW value. Returns `true` if a slip was detected,
    /// implementing spec.md §4.1 steps 1-5 verbatim.
    pub fn update(&mut self, epoch: Epoch, mw: f64, wide_lane_wavelength_m: f64) -> bool {
        let dt = self
            .former_epoch
            .map(|prev| (epoch - prev).to_seconds())
            .unwrap_or(f64::INFINITY);
        self.former_epoch = Some(epoch);

        if self.count == 0 {
            self.mean = mw;
            self.variance = self.initial_variance;
            self.count = 1;
            return false;
        }

        let bias = (mw - self.mean).abs();
        let slip = dt > self.dt_max_seconds
            || (bias > self.k_cycles * wide_lane_wavelength_m && bias > 4.0 * self.variance.sqrt());

        if slip {
            self.mean = mw;
            self.variance = self.initial_variance;
            self.count = 1;
        } else {
            self.count += 1;
            let n = self.count as f64;
            let prev_mean = self.mean;
            self.mean += (mw - self.mean) / n;
            self.variance += ((mw - prev_mean).powi(2) - self.variance) / n;
        }
        slip
    }
}

/// Per (satellite, GF combination) last-value tracker.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GfDetector {
    former_epoch: Option<Epoch>,
    last_value: Option<f64>,
}

impl GfDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Piecewise-linear threshold, in meters, spec.md §4.1: `bGF = 0.05 m`
    /// for `dt <= 1 s`, linear up to `0.15 m` at `20 s`, `0.25 m` at
    /// `60 s`, `0.35 m` above `100 s`, then scaled up to `2*bGF` for
    /// elevations below 15 degrees, linear to the horizon.
    pub fn threshold(dt_seconds: f64, elevation_rad: f64) -> f64 {
        let b_gf = if dt_seconds <= 1.0 {
            0.05
        } else if dt_seconds <= 20.0 {
            lerp(dt_seconds, 1.0, 20.0, 0.05, 0.15)
        } else if dt_seconds <= 60.0 {
            lerp(dt_seconds, 20.0, 60.0, 0.15, 0.25)
        } else if dt_seconds <= 100.0 {
            lerp(dt_seconds, 60.0, 100.0, 0.25, 0.35)
        } else {
            0.35
        };

        let elevation_deg = elevation_rad.to_degrees();
        if elevation_deg >= 15.0 {
            b_gf
        } else {
            let scale = lerp(elevation_deg, 0.0, 15.0, 2.0, 1.0);
            b_gf * scale
        }
    }

    /// Feeds one epoch's GF value (meters). Returns `true` on slip.
    pub fn update(&mut self, epoch: Epoch, gf: f64, elevation_rad: f64) -> bool {
        let dt = self
            .former_epoch
            .map(|prev| (epoch - prev).to_seconds())
            .unwrap_or(f64::INFINITY);
        self.former_epoch = Some(epoch);

        let slip = match self.last_value {
            None => false,
            Some(prev) => (gf - prev).abs() > Self::threshold(dt, elevation_rad),
        };
        self.last_value = Some(gf);
        slip
    }
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if (x1 - x0).abs() < f64::EPSILON {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Per-satellite cycle-slip flag: logical OR over every MW and GF
/// detector result (spec.md §4.1).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsFlag(bool);

impl CsFlag {
    pub fn clear() -> Self {
        Self(false)
    }

    pub fn or(&mut self, slipped: bool) {
        self.0 |= slipped;
    }

    pub fn is_set(&self) -> bool {
        self.0
    }
}

/// Default sampling interval assumed when seeding a fresh detector
/// (pipeline stages override this from the observation header).
pub fn default_interval() -> Duration {
    Duration::from_seconds(30.0)
}

//! Stochastic models driving the filter's time update (spec.md §3
//! `StochasticModel`, §4.4). A closed `enum` dispatch rather than
//! `Box<dyn StochasticModel>`, matching the teacher's preference for
//! inherent `match`-dispatch over trait objects (`Mode`/`Combination` in
//! `gnss-rtk`/`rinex` are the same shape).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One parameter's noise model. Owned by an arena (`Vec<StochasticModel>`)
/// indexed from [crate::variable::Variable] rather than referenced by
/// pointer (spec.md §9 "Cyclic references").
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StochasticModel {
    /// No temporal correlation: `phi = 0`, full re-initialization every
    /// epoch (e.g. slant ionosphere in uncombined mode, when not mapped).
    WhiteNoise { variance: f64 },
    /// First-order Gauss-Markov-free random walk: `phi = 1`,
    /// `q = sigma^2 * dt` (e.g. troposphere wet delay, receiver clock).
    RandomWalk { sigma: f64 },
    /// Time-invariant parameter: `phi = 1`, `q = 0` (e.g. static receiver
    /// coordinates, inter-frequency biases assumed constant over a pass).
    Constant,
    /// Float ambiguity: behaves like [StochasticModel::Constant] between
    /// cycle slips, but exposes [StochasticModel::should_reinitialize] to
    /// let the arc manager reset it to `initialVariance`/`x = 0`.
    PhaseAmbiguity { initial_variance: f64 },
    /// Troposphere wet delay random walk, kept distinct from the generic
    /// [StochasticModel::RandomWalk] variant so the default `sigma` can
    /// differ (spec.md §4.3 lists tropo wet delay as its own unknown).
    TropoRandomWalk { sigma: f64 },
}

impl StochasticModel {
    /// State-transition scalar applied during the time update:
    /// `x_pred = phi() * x_prev`.
    pub fn phi(&self) -> f64 {
        match self {
            StochasticModel::WhiteNoise { .. } => 0.0,
            StochasticModel::RandomWalk { .. } => 1.0,
            StochasticModel::Constant => 1.0,
            StochasticModel::PhaseAmbiguity { .. } => 1.0,
            StochasticModel::TropoRandomWalk { .. } => 1.0,
        }
    }

    /// Process noise variance to add to the diagonal this step.
    pub fn q(&self, dt_seconds: f64) -> f64 {
        match self {
            StochasticModel::WhiteNoise { variance } => *variance,
            StochasticModel::RandomWalk { sigma } => sigma * sigma * dt_seconds.max(0.0),
            StochasticModel::Constant => 0.0,
            StochasticModel::PhaseAmbiguity { .. } => 0.0,
            StochasticModel::TropoRandomWalk { sigma } => sigma * sigma * dt_seconds.max(0.0),
        }
    }

    /// Variance to (re)seed a freshly (re)initialized Variable with.
    pub fn reset_variance(&self) -> f64 {
        match self {
            StochasticModel::WhiteNoise { variance } => *variance,
            StochasticModel::PhaseAmbiguity { initial_variance } => *initial_variance,
            _ => 0.0,
        }
    }

    /// Only [StochasticModel::PhaseAmbiguity] reinitializes on a cycle
    /// slip; every other model persists across epochs.
    pub fn should_reinitialize(&self, cs_flag: bool) -> bool {
        matches!(self, StochasticModel::PhaseAmbiguity { .. }) && cs_flag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_noise_has_no_memory() {
        let m = StochasticModel::WhiteNoise { variance: 4.0 };
        assert_eq!(m.phi(), 0.0);
        assert_eq!(m.q(30.0), 4.0);
    }

    #[test]
    fn random_walk_scales_with_dt() {
        let m = StochasticModel::RandomWalk { sigma: 1e-3 };
        assert_eq!(m.phi(), 1.0);
        assert!((m.q(4.0) - 1e-6 * 4.0).abs() < 1e-12);
    }

    #[test]
    fn only_ambiguity_reinitializes_on_slip() {
        let amb = StochasticModel::PhaseAmbiguity {
            initial_variance: 1.0e4,
        };
        let cst = StochasticModel::Constant;
        assert!(amb.should_reinitialize(true));
        assert!(!amb.should_reinitialize(false));
        assert!(!cst.should_reinitialize(true));
    }
}

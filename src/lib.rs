#![doc = include_str!("../README.md")]
#![cfg_attr(docrs, feature(doc_cfg))]

extern crate gnss_rs as gnss;

pub mod ambiguity;
pub mod apriori;
pub mod arc;
pub mod bias;
pub mod cfg;
pub mod combinations;
pub mod cycleslip;
pub mod data;
pub mod equation;
pub mod error;
pub mod estimate;
pub mod filter;
pub mod identifiers;
pub mod modeling;
pub mod output;
pub mod pipeline;
pub mod solver;
pub mod stochastic;
pub mod variable;
pub mod vector;

/// Commonly imported types, mirroring the crate's own internal imports.
pub mod prelude {
    pub use crate::apriori::AprioriPosition;
    pub use crate::cfg::{AmbFixMode, Config, IonoOpt, Mode};
    pub use crate::data::ObservationEpoch;
    pub use crate::error::Error;
    pub use crate::modeling::traits::{AntennaModel, OceanLoadingModel, OrbitClockSource};
    pub use crate::output::EpochSolution;
    pub use crate::solver::Solver;
    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::{Duration, Epoch, TimeScale};
}

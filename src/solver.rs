//! Orchestrates one station's worth of epochs through the pipeline and
//! filter (spec.md §2 end-to-end flow), grounded on the teacher's own
//! `Solver::run` entry point generalized from its single SPP pass into
//! the multi-stage PPP/PPP-AR flow.
use std::collections::BTreeMap;

use hifitime::Epoch;

use crate::bias::BiasStore;
use crate::cfg::Config;
use crate::data::ObservationEpoch;
use crate::equation::EquationOrderCounter;
use crate::error::{Error, PipelineError};
use crate::identifiers::TypeId;
use crate::modeling::traits::{AntennaModel, OceanLoadingModel, OrbitClockSource};
use crate::output::{CoordinateSolution, EpochSolution};
use crate::pipeline::{self, ElevationTable, PipelineContext, StationMemory, STAGE_ORDER};
use crate::stochastic::StochasticModel;
use crate::vector::Vector3D;

/// Assigns each distinct unknown-type a stable slot in the filter's
/// stochastic-model arena (spec.md §9 "model index replaces a raw
/// pointer"). Every Variable sharing a canonical type (position
/// component, per-system clock, ambiguity of a given signal) shares the
/// same model parameters, even though their `x_hat`/`P` entries differ.
#[derive(Debug, Default)]
struct ModelRegistry {
    index_of: BTreeMap<TypeId, usize>,
    models: Vec<StochasticModel>,
}

impl ModelRegistry {
    fn canonical_key(type_id: &TypeId) -> TypeId {
        match type_id {
            TypeId::Ambiguity(inner) => TypeId::Ambiguity(Box::new((**inner).shorten())),
            other => other.clone(),
        }
    }

    fn default_model(type_id: &TypeId) -> StochasticModel {
        match type_id {
            TypeId::Dn | TypeId::De | TypeId::Du => StochasticModel::Constant,
            TypeId::Cdt(_) => StochasticModel::WhiteNoise { variance: 1.0e8 },
            TypeId::WetTropo => StochasticModel::TropoRandomWalk { sigma: 1.0e-4 },
            TypeId::SlantIono(_) => StochasticModel::RandomWalk { sigma: 1.0e-2 },
            TypeId::Ambiguity(_) | TypeId::AmbiguityWl(..) | TypeId::AmbiguityLc(..) => {
                StochasticModel::PhaseAmbiguity {
                    initial_variance: 1.0e4,
                }
            }
            _ => StochasticModel::Constant,
        }
    }

    fn index_for(&mut self, type_id: &TypeId) -> usize {
        let key = Self::canonical_key(type_id);
        if let Some(idx) = self.index_of.get(&key) {
            return *idx;
        }
        let idx = self.models.len();
        self.models.push(Self::default_model(&key));
        self.index_of.insert(key, idx);
        idx
    }
}

/// Per-station orchestrator tying the [pipeline] stages, [crate::filter]
/// and (when enabled) [crate::ambiguity] resolution together (spec.md §2
/// full data flow, §5 "one instance per station").
pub struct Solver<'a> {
    cfg: Config,
    orbit_clock: &'a dyn OrbitClockSource,
    antenna: &'a dyn AntennaModel,
    ocean_loading: &'a dyn OceanLoadingModel,
    bias_store: &'a dyn BiasStore,
    memory: StationMemory,
    models: ModelRegistry,
    order_counter: EquationOrderCounter,
    last_epoch: Option<Epoch>,
}

impl<'a> Solver<'a> {
    pub fn new(
        cfg: Config,
        orbit_clock: &'a dyn OrbitClockSource,
        antenna: &'a dyn AntennaModel,
        ocean_loading: &'a dyn OceanLoadingModel,
        bias_store: &'a dyn BiasStore,
    ) -> Result<Self, Error> {
        cfg.validate()?;
        let interval = crate::cycleslip::default_interval();
        let max_gap = interval + interval;
        Ok(Self {
            cfg,
            orbit_clock,
            antenna,
            ocean_loading,
            bias_store,
            memory: StationMemory::new(max_gap),
            models: ModelRegistry::default(),
            order_counter: EquationOrderCounter::new(),
            last_epoch: None,
        })
    }

    /// Runs one [ObservationEpoch] through every [Stage], updates the
    /// filter, and produces its output record (spec.md §2 steps 1-11).
    pub fn run_epoch(&mut self, epoch: &mut ObservationEpoch) -> Result<EpochSolution, Error> {
        if let Some(prev) = self.last_epoch {
            if epoch.epoch <= prev {
                return Err(Error::Pipeline(PipelineError::EpochNotMonotonic(epoch.epoch, prev)));
            }
        }
        let dt_seconds = self
            .last_epoch
            .map(|prev| (epoch.epoch - prev).to_seconds())
            .unwrap_or(epoch.interval.to_seconds());

        let elevations = self.elevation_table(epoch);

        let mut ctx = PipelineContext {
            cfg: &self.cfg,
            orbit_clock: self.orbit_clock,
            antenna: self.antenna,
            ocean_loading: self.ocean_loading,
            bias_store: self.bias_store,
            memory: &mut self.memory,
            elevations,
            cs_flags: BTreeMap::new(),
        };

        for stage in STAGE_ORDER {
            match stage.apply(epoch, &mut ctx) {
                Ok(()) => {}
                Err(PipelineError::EpochDecimated(_)) => return Err(Error::Pipeline(PipelineError::EpochDecimated(epoch.epoch))),
                Err(e) => return Err(Error::Pipeline(e)),
            }
        }

        compute_prefit(&self.cfg, epoch, &ctx.elevations);

        let equations = {
            let models = &mut self.models;
            pipeline::assemble_equations(epoch, &self.cfg, &mut self.order_counter, |t| models.index_for(t))
        };

        if equations.is_empty() {
            return Err(Error::Pipeline(PipelineError::InsufficientObservations(epoch.epoch, epoch.satellite_count())));
        }

        ctx.memory.filter.models = self.models.models.clone();
        let report = pipeline::run_float_update(&equations, &mut ctx, dt_seconds)?;

        let fixed = pipeline::run_ambiguity_resolution(&self.cfg, &ctx);
        let ambiguities_fixed = !fixed.is_empty();

        let solution = build_solution(&self.cfg, epoch, &ctx.memory.filter, &report, ambiguities_fixed);
        self.last_epoch = Some(epoch.epoch);
        Ok(solution)
    }

    fn elevation_table(&self, epoch: &ObservationEpoch) -> ElevationTable {
        let rcv = Vector3D {
            x: epoch.apriori_position.0,
            y: epoch.apriori_position.1,
            z: epoch.apriori_position.2,
        };
        let apriori = crate::apriori::AprioriPosition::from_ecef(rcv);
        let mut table = ElevationTable::new();
        for sat in epoch.data.satellites() {
            if let Some(sat_pos) = self.orbit_clock.sat_position(epoch.epoch, sat, self.cfg.interp_order) {
                let ea = crate::modeling::elevation_azimuth(
                    sat_pos,
                    rcv,
                    apriori.latitude_rad(),
                    apriori.longitude_rad(),
                );
                table.insert(sat, ea.elevation_rad);
            }
        }
        table
    }
}

/// Builds each satellite's `prefit{C1}` independent term: observed range
/// minus every modeled correction accumulated by the earlier stages
/// (spec.md §2 step 9 "prefit residual"). Satellites below the
/// configured elevation mask are dropped rather than weighted down,
/// since their geometry is still missing at this point in the flow.
/// A free function, not a `Solver` method, so it can run while
/// [PipelineContext] still holds the station's borrowed memory.
fn compute_prefit(cfg: &Config, epoch: &mut ObservationEpoch, elevations: &ElevationTable) {
    let elevation_mask = cfg.elevation_mask_rad();
    for sat in epoch.data.satellites() {
        let elevation = *elevations.get(&sat).unwrap_or(&std::f64::consts::FRAC_PI_2);
        if elevation < elevation_mask {
            continue;
        }
        let values = match epoch.data.get(&sat) {
            Some(v) => v,
            None => continue,
        };
        let system = pipeline_system_char(sat);
        let signal_type = match pipeline::prefit_signal_type(cfg, system) {
            Some(t) => t,
            None => continue,
        };
        let code = match values.get(&signal_type) {
            Some(v) => v,
            None => continue,
        };
        // No Rho means ComputeRange couldn't resolve this satellite's
        // position this epoch (ephemeris gap, interpolation edge) -- skip
        // it rather than feed a ~code-magnitude bogus prefit into the filter.
        let rho = match values.get(&TypeId::Rho) {
            Some(v) => v,
            None => continue,
        };
        let tropo_slant = values.get(&TypeId::TropoSlant).unwrap_or(0.0);
        let grav_delay = values.get(&TypeId::GravDelay).unwrap_or(0.0);

        let prefit = code - rho - tropo_slant - grav_delay;
        let prefit_type = TypeId::prefit_of(signal_type);
        epoch.data.entry(sat).insert(prefit_type, prefit);
    }
}

/// Reads the filter's updated state back into a per-epoch output record
/// (spec.md §2 step 11). A free function for the same borrow-shape
/// reason as [compute_prefit].
fn build_solution(
    cfg: &Config,
    epoch: &ObservationEpoch,
    filter: &crate::filter::FilterState,
    _report: &crate::filter::MeasurementUpdateReport,
    ambiguities_fixed: bool,
) -> EpochSolution {
    let position_delta = |type_id: &TypeId| -> f64 {
        filter
            .variables
            .iter()
            .position(|v| v.type_id == *type_id)
            .and_then(|idx| filter.x_hat.get(idx).copied())
            .unwrap_or(0.0)
    };

    let dn = position_delta(&TypeId::Dn);
    let de = position_delta(&TypeId::De);
    let du = position_delta(&TypeId::Du);

    let mut receiver_clocks = BTreeMap::new();
    for sys in cfg.system.iter() {
        let cdt = position_delta(&TypeId::Cdt(*sys));
        receiver_clocks.insert(*sys, cdt);
    }

    let wet_tropo_delay_m = position_delta(&TypeId::WetTropo);
    // PDOP from the position block of the updated covariance, not from
    // the realized residuals: P+ depends only on H/R/prior-P, so this is
    // geometry-only and reproducible across runs with identical geometry.
    let position_indices: Vec<usize> = [TypeId::Dn, TypeId::De, TypeId::Du]
        .iter()
        .filter_map(|t| filter.variables.iter().position(|v| v.type_id == *t))
        .collect();
    let pdop = if position_indices.len() == 3 {
        position_indices.iter().map(|&i| filter.p[(i, i)]).sum::<f64>().sqrt()
    } else {
        0.0
    };

    let coordinates = if cfg.out_enu {
        CoordinateSolution::Enu(Vector3D { x: de, y: dn, z: du })
    } else {
        CoordinateSolution::Ecef(Vector3D {
            x: epoch.apriori_position.0 + dn,
            y: epoch.apriori_position.1 + de,
            z: epoch.apriori_position.2 + du,
        })
    };

    EpochSolution {
        epoch: epoch.epoch,
        coordinates,
        receiver_clocks,
        wet_tropo_delay_m,
        num_satellites: epoch.satellite_count(),
        pdop,
        ambiguities_fixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ObservationEpoch, SatTypeValueMap, TypeValueMap};
    use crate::identifiers::{ObsKind, Signal};
    use gnss::prelude::Constellation;
    use hifitime::Duration;

    struct NoopCollaborators {
        sat_ecef: Vector3D,
    }

    impl OrbitClockSource for NoopCollaborators {
        fn sat_position(&self, _t: Epoch, _sat: crate::identifiers::SatId, _interp_order: usize) -> Option<Vector3D> {
            Some(self.sat_ecef)
        }
        fn sat_clock_offset(&self, _t: Epoch, _sat: crate::identifiers::SatId) -> Option<f64> {
            Some(0.0)
        }
    }

    impl AntennaModel for NoopCollaborators {
        fn satellite_pco(&self, _sat: crate::identifiers::SatId, _signal: &TypeId, _t: Epoch) -> Option<Vector3D> {
            None
        }
        fn satellite_pcv(&self, _sat: crate::identifiers::SatId, _signal: &TypeId, _nadir_rad: f64) -> Option<f64> {
            None
        }
        fn receiver_pco(&self, _signal: &TypeId) -> Option<Vector3D> {
            None
        }
        fn receiver_pcv(&self, _signal: &TypeId, _elevation_rad: f64, _azimuth_rad: f64) -> Option<f64> {
            None
        }
    }

    impl OceanLoadingModel for NoopCollaborators {
        fn displacement(&self, _t: Epoch) -> Option<Vector3D> {
            None
        }
    }

    impl BiasStore for NoopCollaborators {
        fn osb(&self, _sat: crate::identifiers::SatId, _signal: &TypeId, _t: Epoch) -> Option<f64> {
            None
        }
        fn dsb(&self, _sat: crate::identifiers::SatId, _a: &TypeId, _b: &TypeId, _t: Epoch) -> Option<f64> {
            None
        }
        fn phase_bias(&self, _sat: crate::identifiers::SatId, _signal: &TypeId, _t: Epoch) -> Option<f64> {
            None
        }
    }

    fn station_epoch(epoch: Epoch) -> ObservationEpoch {
        let gps1 = crate::identifiers::SatId::new(Constellation::GPS, 1);
        let mut values = TypeValueMap::new();
        values.insert(TypeId::Obs(Signal::canonical(ObsKind::PseudoRange, 1, 'G')), 2.23e7);
        let mut data = SatTypeValueMap::new();
        data.insert(gps1, values);

        ObservationEpoch {
            epoch,
            apriori_position: (6_378_137.0, 0.0, 0.0),
            reference_position: (6_378_137.0, 0.0, 0.0),
            marker_name: "TEST".to_string(),
            source: crate::identifiers::SourceId::new("TEST", "GEODETIC"),
            data,
            is_first_epoch: true,
            interval: Duration::from_seconds(30.0),
        }
    }

    #[test]
    fn code_only_epoch_produces_a_solution() {
        let mut cfg = Config::default();
        cfg.code_only = true;
        cfg.system = std::collections::BTreeSet::from(['G']);

        let collaborators = NoopCollaborators {
            sat_ecef: Vector3D { x: 6_378_137.0 + 2.0e7, y: 0.0, z: 0.0 },
        };
        let mut solver = Solver::new(cfg, &collaborators, &collaborators, &collaborators, &collaborators).unwrap();

        let mut epoch1 = station_epoch(Epoch::from_gpst_seconds(0.0));
        let solution = solver.run_epoch(&mut epoch1).unwrap();
        assert_eq!(solution.num_satellites, 1);
        assert!(!solution.ambiguities_fixed);

        let mut epoch2 = station_epoch(Epoch::from_gpst_seconds(30.0));
        let solution2 = solver.run_epoch(&mut epoch2).unwrap();
        assert_eq!(solution2.num_satellites, 1);
    }

    #[test]
    fn non_monotonic_epoch_is_rejected() {
        let mut cfg = Config::default();
        cfg.code_only = true;
        let collaborators = NoopCollaborators {
            sat_ecef: Vector3D { x: 6_378_137.0 + 2.0e7, y: 0.0, z: 0.0 },
        };
        let mut solver = Solver::new(cfg, &collaborators, &collaborators, &collaborators, &collaborators).unwrap();

        let mut first = station_epoch(Epoch::from_gpst_seconds(30.0));
        solver.run_epoch(&mut first).unwrap();

        let mut stale = station_epoch(Epoch::from_gpst_seconds(0.0));
        let err = solver.run_epoch(&mut stale).unwrap_err();
        assert!(matches!(err, Error::Pipeline(PipelineError::EpochNotMonotonic(_, _))));
    }
}

fn pipeline_system_char(sat: crate::identifiers::SatId) -> char {
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

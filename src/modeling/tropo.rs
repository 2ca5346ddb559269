//! UNB3 tropospheric zenith-delay model plus elevation mapping, grounded
//! on the teacher's own `model::tropo` (same lookup tables and closed-form
//! UNB3 expressions) and, for the mapping-function shape,
//! `original_source/src/Geomatics/ViennaTropModel.{hpp,cpp}` (VMF1/GPT2
//! style elevation mapping is approximated here by the same
//! `1.001/sqrt(0.002001 + sin^2(E))` global mapping the teacher used,
//! since the full VMF1 grid is itself an external collaborator).
use std::f64::consts::PI;

use hifitime::Epoch;

#[derive(Copy, Clone, Debug)]
enum Unb3Param {
    Pressure = 0,
    Temperature = 1,
    WaterVapourPressure = 2,
    Beta = 3,
    Lambda = 4,
}

fn lookup(lut: [(f64, [f64; 5]); 5], prm: Unb3Param, lat_ddeg: f64) -> f64 {
    let prm = (prm as u8) as usize;
    let lat_ddeg = lat_ddeg.abs();
    if lat_ddeg <= 15.0 {
        lut[0].1[prm]
    } else if lat_ddeg >= 75.0 {
        lut[4].1[prm]
    } else {
        let mut nearest = 0;
        let mut min_delta = 180.0;
        for (i, (lat, _)) in lut.iter().enumerate() {
            let delta = (lat - lat_ddeg).abs();
            if delta < min_delta {
                min_delta = delta;
                nearest = i;
            }
        }
        let next = (nearest + 1).min(lut.len() - 1);
        let (lat0, vals0) = lut[nearest];
        let (lat1, vals1) = lut[next];
        if (lat1 - lat0).abs() < f64::EPSILON {
            vals0[prm]
        } else {
            vals0[prm] + (vals1[prm] - vals0[prm]) * (lat_ddeg - lat0) / (lat1 - lat0)
        }
    }
}

fn annual_average(prm: Unb3Param, lat_ddeg: f64) -> f64 {
    const LUT: [(f64, [f64; 5]); 5] = [
        (15.0, [1013.25, 299.65, 26.31, 6.30e-3, 2.77]),
        (30.0, [1017.25, 294.15, 21.79, 6.05e-3, 3.15]),
        (45.0, [1015.75, 283.15, 11.66, 5.58e-3, 2.57]),
        (60.0, [1011.75, 272.15, 6.78, 5.39e-3, 1.81]),
        (75.0, [1013.00, 263.65, 4.11, 4.53e-3, 1.55]),
    ];
    lookup(LUT, prm, lat_ddeg)
}

fn average_amplitude(prm: Unb3Param, lat_ddeg: f64) -> f64 {
    const LUT: [(f64, [f64; 5]); 5] = [
        (15.0, [0.0, 0.0, 0.0, 0.0, 0.0]),
        (30.0, [-3.75, 7.0, 8.85, 0.25e-3, 0.33]),
        (45.0, [-2.25, 11.0, 7.24, 0.32e-3, 0.46]),
        (60.0, [-1.75, 15.0, 5.36, 0.81e-3, 0.74]),
        (75.0, [-0.50, 14.5, 3.39, 0.62e-3, 0.30]),
    ];
    lookup(LUT, prm, lat_ddeg)
}

fn unb3_parameter(prm: Unb3Param, lat_ddeg: f64, day_of_year: f64) -> f64 {
    let dmin = if lat_ddeg.is_sign_positive() { 28.0 } else { 211.0 };
    let annual = annual_average(prm, lat_ddeg);
    let amplitude = average_amplitude(prm, lat_ddeg);
    annual - amplitude * ((day_of_year - dmin) * 2.0 * PI / 365.25).cos()
}

/// Zenith dry/wet delay (meters) at `(t, lat_ddeg, alt_above_sea_m)`,
/// valid at any epoch/latitude (no external data needed).
pub fn unb3_delay_components(t: Epoch, lat_ddeg: f64, alt_above_sea_m: f64) -> (f64, f64) {
    const K1: f64 = 77.064;
    const K2: f64 = 382_000.0;
    const RD: f64 = 287.054;
    const G: f64 = 9.806_65;
    const GM: f64 = 9.784;

    let day_of_year = t.day_of_year();

    let beta = unb3_parameter(Unb3Param::Beta, lat_ddeg, day_of_year);
    let p = unb3_parameter(Unb3Param::Pressure, lat_ddeg, day_of_year);
    let temp = unb3_parameter(Unb3Param::Temperature, lat_ddeg, day_of_year);
    let e = unb3_parameter(Unb3Param::WaterVapourPressure, lat_ddeg, day_of_year);
    let lambda = unb3_parameter(Unb3Param::Lambda, lat_ddeg, day_of_year);

    let z0_zdd = 1.0e-6 * K1 * RD * p / GM;
    let denom = (lambda + 1.0) * GM - beta * RD;
    let z0_zwd = 1.0e-6 * K2 * RD * e / temp / denom;

    let value = 1.0 - beta * alt_above_sea_m / temp;
    let zdd = value.powf(G / RD / beta) * z0_zdd;
    let zwd = value.powf((lambda + 1.0) * G / RD / beta - 1.0) * z0_zwd;

    (zdd, zwd)
}

/// Global mapping function turning zenith delays into a slant delay at
/// elevation `elev_rad` (spec.md §4 "troposphere (... or Saastamoinen +
/// mapping)"), shared across dry and wet components for simplicity.
pub fn global_mapping(elev_rad: f64) -> f64 {
    1.001 / (0.002_001 + elev_rad.sin().powi(2)).sqrt()
}

/// Slant tropospheric delay, meters.
pub fn slant_delay(elev_rad: f64, zwd: f64, zdd: f64) -> f64 {
    global_mapping(elev_rad) * (zwd + zdd)
}

/// Dry/wet mapping function values, used as design-matrix coefficients
/// for the troposphere wet-delay unknown (spec.md §4.3 `dryMap`, `wetMap`).
pub fn mapping_functions(elev_rad: f64) -> (f64, f64) {
    let m = global_mapping(elev_rad);
    (m, m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zenith_delays_are_finite_at_any_latitude() {
        let t = Epoch::from_gpst_seconds(0.0);
        for lat in [-80.0, -10.0, 0.0, 10.0, 80.0] {
            let (zdd, zwd) = unb3_delay_components(t, lat, 100.0);
            assert!(zdd.is_finite() && zdd > 0.0);
            assert!(zwd.is_finite() && zwd > 0.0);
        }
    }

    #[test]
    fn mapping_grows_at_low_elevation() {
        let high = global_mapping(std::f64::consts::FRAC_PI_2);
        let low = global_mapping(10.0_f64.to_radians());
        assert!(low > high);
    }
}

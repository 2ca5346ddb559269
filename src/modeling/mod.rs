//! Observation modeling helpers (spec.md §2 step 6, §6), exposed as pure
//! functions over plain `f64`/`Epoch`/[Vector3D] arguments so pipeline
//! stages depend only on the abstract traits in [traits], never on a
//! concrete file-parser type. Grounded on
//! `original_source/src/ProceFrame/ComputeWindUp.hpp` (wind-up),
//! `ComputeSatPCenter.hpp` (satellite PCO/PCV), `ComputeStaTides.{hpp,cpp}`
//! (solid+ocean+pole tides), and `GNSSCore` (relativity, gravitational
//! delay); troposphere is in [tropo].
pub mod traits;
pub mod tropo;

use crate::vector::Vector3D;

const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Earth gravitational constant, m^3/s^2 (WGS84).
const GM_EARTH: f64 = 3.986_004_418e14;

fn dot(a: Vector3D, b: Vector3D) -> f64 {
    a.x * b.x + a.y * b.y + a.z * b.z
}

fn norm(v: Vector3D) -> f64 {
    dot(v, v).sqrt()
}

fn sub(a: Vector3D, b: Vector3D) -> Vector3D {
    Vector3D {
        x: a.x - b.x,
        y: a.y - b.y,
        z: a.z - b.z,
    }
}

/// Relativistic clock correction for an eccentric orbit, seconds:
/// `-2 (r . v) / c^2`, grounded on `GNSSCore`'s periodic relativity term.
pub fn relativistic_clock_correction(sat_position: Vector3D, sat_velocity: Vector3D) -> f64 {
    -2.0 * dot(sat_position, sat_velocity) / (SPEED_OF_LIGHT * SPEED_OF_LIGHT)
}

/// Gravitational (Shapiro) delay, meters, grounded on `GNSSCore`'s
/// `2GM/c^2 * ln((r_sat + r_rcv + r_sat_rcv) / (r_sat + r_rcv - r_sat_rcv))`.
pub fn gravitational_delay(sat_position: Vector3D, rcv_position: Vector3D) -> f64 {
    let r_sat = norm(sat_position);
    let r_rcv = norm(rcv_position);
    let r_rel = norm(sub(sat_position, rcv_position));
    if r_sat + r_rcv - r_rel <= 0.0 {
        return 0.0;
    }
    2.0 * GM_EARTH / (SPEED_OF_LIGHT * SPEED_OF_LIGHT)
        * ((r_sat + r_rcv + r_rel) / (r_sat + r_rcv - r_rel)).ln()
}

/// Phase wind-up correction, cycles, accumulated from the previous
/// epoch's value `prev_windup` to stay continuous across epochs
/// (`ComputeWindUp.hpp`'s running-total design, since the raw
/// `atan2`-based angle is only defined modulo one cycle).
pub fn wind_up(
    sat_attitude_x: Vector3D,
    sat_attitude_y: Vector3D,
    rcv_attitude_x: Vector3D,
    rcv_attitude_y: Vector3D,
    los: Vector3D,
    prev_windup: f64,
) -> f64 {
    let dpr = sub(sat_attitude_x, {
        let k = dot(los, sat_attitude_x);
        Vector3D {
            x: los.x * k,
            y: los.y * k,
            z: los.z * k,
        }
    });
    let dpy = sub(sat_attitude_y, {
        let k = dot(los, sat_attitude_y);
        Vector3D {
            x: los.x * k,
            y: los.y * k,
            z: los.z * k,
        }
    });
    let d_sat = Vector3D {
        x: dpr.x - dpy.y,
        y: dpr.y + dpy.x,
        z: dpr.z,
    };

    let rpr = sub(rcv_attitude_x, {
        let k = dot(los, rcv_attitude_x);
        Vector3D {
            x: los.x * k,
            y: los.y * k,
            z: los.z * k,
        }
    });
    let rpy = sub(rcv_attitude_y, {
        let k = dot(los, rcv_attitude_y);
        Vector3D {
            x: los.x * k,
            y: los.y * k,
            z: los.z * k,
        }
    });
    let d_rcv = Vector3D {
        x: rpr.x - rpy.y,
        y: rpr.y + rpy.x,
        z: rpr.z,
    };

    let cos_psi = (dot(d_sat, d_rcv) / (norm(d_sat) * norm(d_rcv))).clamp(-1.0, 1.0);
    let sign = dot(los, cross(d_sat, d_rcv)).signum();
    let psi_cycles = sign * cos_psi.acos() / (2.0 * std::f64::consts::PI);

    // the raw arccos only resolves the wind-up angle modulo one full
    // cycle; pick whichever integer-cycle branch stays closest to the
    // previous epoch's accumulated value, so the series stays continuous.
    let candidate_low = prev_windup.floor() + psi_cycles;
    let candidate_high = prev_windup.ceil() + psi_cycles;
    if (candidate_low - prev_windup).abs() <= (candidate_high - prev_windup).abs() {
        candidate_low
    } else {
        candidate_high
    }
}

fn cross(a: Vector3D, b: Vector3D) -> Vector3D {
    Vector3D {
        x: a.y * b.z - a.z * b.y,
        y: a.z * b.x - a.x * b.z,
        z: a.x * b.y - a.y * b.x,
    }
}

/// Solid-earth tide displacement at the receiver, local ENU meters, using
/// the degree-2 tidal potential approximation (`ComputeStaTides.{hpp,cpp}`'s
/// leading term; ocean/pole loading are supplied by the host through
/// [traits::OceanLoadingModel]/[traits::ErpSource] instead of reimplemented
/// here, since their coefficient grids are external collaborators).
pub fn solid_earth_tide(rcv_position: Vector3D, moon_position: Vector3D, sun_position: Vector3D) -> Vector3D {
    const H2: f64 = 0.6078;
    const L2: f64 = 0.0847;
    const GM_MOON_OVER_GM_EARTH: f64 = 0.0123_0002_77;
    const GM_SUN_OVER_GM_EARTH: f64 = 332_946.05;

    let displacement = |body: Vector3D, mass_ratio: f64| -> Vector3D {
        let r = norm(rcv_position);
        let rb = norm(body);
        if rb <= 0.0 {
            return Vector3D::default();
        }
        let cos_theta = dot(rcv_position, body) / (r * rb);
        let scale = mass_ratio * r.powi(4) / rb.powi(3);
        let radial = H2 * (1.5 * cos_theta * cos_theta - 0.5);
        let tangential = 3.0 * L2 * cos_theta;
        Vector3D {
            x: scale * (radial * rcv_position.x / r + tangential * (body.x / rb - cos_theta * rcv_position.x / r)),
            y: scale * (radial * rcv_position.y / r + tangential * (body.y / rb - cos_theta * rcv_position.y / r)),
            z: scale * (radial * rcv_position.z / r + tangential * (body.z / rb - cos_theta * rcv_position.z / r)),
        }
    };

    let moon = displacement(moon_position, GM_MOON_OVER_GM_EARTH);
    let sun = displacement(sun_position, GM_SUN_OVER_GM_EARTH);
    Vector3D {
        x: moon.x + sun.x,
        y: moon.y + sun.y,
        z: moon.z + sun.z,
    }
}

/// Projects a satellite antenna phase-center offset (body frame) and
/// variation onto the line of sight, meters, grounded on
/// `ComputeSatPCenter.hpp`.
pub fn satellite_pcenter_correction(pco_body_frame: Vector3D, los: Vector3D, pcv: f64) -> f64 {
    dot(pco_body_frame, los) + pcv
}

/// Geometric range between a satellite and the receiver, meters.
pub fn geometric_range(sat_position: Vector3D, rcv_position: Vector3D) -> f64 {
    norm(sub(sat_position, rcv_position))
}

/// Negated unit line-of-sight components in the receiver's local ENU
/// frame: the partials of the geometric range with respect to a
/// north/east/up receiver position perturbation (spec.md §4.3
/// "coefficients for Dn/De/Du"). Zero when the satellite and receiver
/// coincide.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionCosines {
    pub north: f64,
    pub east: f64,
    pub up: f64,
}

pub fn direction_cosines(sat_position: Vector3D, rcv_position: Vector3D, lat_rad: f64, lon_rad: f64) -> DirectionCosines {
    let los = sub(sat_position, rcv_position);
    let range = norm(los);
    if range <= 0.0 {
        return DirectionCosines { north: 0.0, east: 0.0, up: 0.0 };
    }

    let (east, north, up) = enu_components(los, lat_rad, lon_rad);
    DirectionCosines {
        north: -north / range,
        east: -east / range,
        up: -up / range,
    }
}

/// East/north/up components of `los` (ECEF) in the local tangent frame
/// at `lat_rad`/`lon_rad`, shared by [direction_cosines] and
/// [elevation_azimuth] so their rotation stays in lockstep.
fn enu_components(los: Vector3D, lat_rad: f64, lon_rad: f64) -> (f64, f64, f64) {
    let (sin_lat, cos_lat) = lat_rad.sin_cos();
    let (sin_lon, cos_lon) = lon_rad.sin_cos();

    let east = -sin_lon * los.x + cos_lon * los.y;
    let north = -sin_lat * cos_lon * los.x - sin_lat * sin_lon * los.y + cos_lat * los.z;
    let up = cos_lat * cos_lon * los.x + cos_lat * sin_lon * los.y + sin_lat * los.z;
    (east, north, up)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationAzimuth {
    pub elevation_rad: f64,
    pub azimuth_rad: f64,
}

/// Elevation/azimuth of `sat_position` as seen from `rcv_position`, both
/// ECEF meters, via a local ENU rotation at `rcv_position`'s geodetic
/// latitude/longitude.
pub fn elevation_azimuth(sat_position: Vector3D, rcv_position: Vector3D, lat_rad: f64, lon_rad: f64) -> ElevationAzimuth {
    let los = sub(sat_position, rcv_position);
    let (east, north, up) = enu_components(los, lat_rad, lon_rad);

    let horiz = (east * east + north * north).sqrt();
    ElevationAzimuth {
        elevation_rad: up.atan2(horiz),
        azimuth_rad: east.atan2(north).rem_euclid(2.0 * std::f64::consts::PI),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravitational_delay_is_small_and_positive() {
        let sat = Vector3D { x: 2.0e7, y: 0.0, z: 0.0 };
        let rcv = Vector3D { x: 6.378e6, y: 0.0, z: 0.0 };
        let d = gravitational_delay(sat, rcv);
        assert!(d >= 0.0 && d < 0.1);
    }

    #[test]
    fn elevation_is_positive_for_zenith_satellite() {
        let rcv = Vector3D { x: 6.378e6, y: 0.0, z: 0.0 };
        let sat = Vector3D { x: 6.378e6 + 2.0e7, y: 0.0, z: 0.0 };
        let ea = elevation_azimuth(sat, rcv, 0.0, 0.0);
        assert!(ea.elevation_rad > 1.5);
    }

    #[test]
    fn relativistic_correction_is_antisymmetric_in_velocity() {
        let r = Vector3D { x: 2.0e7, y: 0.0, z: 0.0 };
        let v = Vector3D { x: 0.0, y: 3000.0, z: 0.0 };
        let fwd = relativistic_clock_correction(r, v);
        let bwd = relativistic_clock_correction(r, Vector3D { x: 0.0, y: -3000.0, z: 0.0 });
        assert!((fwd + bwd).abs() < 1e-20);
    }

    #[test]
    fn direction_cosines_are_distinct_for_an_oblique_satellite() {
        let rcv = Vector3D { x: 6.378e6, y: 0.0, z: 0.0 };
        let sat = Vector3D { x: 6.378e6 + 1.0e7, y: 1.0e7, z: 1.0e7 };
        let dc = direction_cosines(sat, rcv, 0.0, 0.0);
        assert!((dc.north - dc.east).abs() > 1e-9);
        assert!((dc.north - dc.up).abs() > 1e-9);
        let magnitude = (dc.north * dc.north + dc.east * dc.east + dc.up * dc.up).sqrt();
        assert!((magnitude - 1.0).abs() < 1e-9);
    }

    #[test]
    fn direction_cosines_point_up_for_zenith_satellite() {
        let rcv = Vector3D { x: 6.378e6, y: 0.0, z: 0.0 };
        let sat = Vector3D { x: 6.378e6 + 2.0e7, y: 0.0, z: 0.0 };
        let dc = direction_cosines(sat, rcv, 0.0, 0.0);
        assert!((dc.up + 1.0).abs() < 1e-9);
        assert!(dc.north.abs() < 1e-9);
        assert!(dc.east.abs() < 1e-9);
    }

    #[test]
    fn geometric_range_matches_euclidean_distance() {
        let rcv = Vector3D { x: 0.0, y: 0.0, z: 0.0 };
        let sat = Vector3D { x: 3.0, y: 4.0, z: 0.0 };
        assert_eq!(geometric_range(sat, rcv), 5.0);
    }
}

use crate::vector::Vector3D;
use map_3d::{deg2rad, ecef2geodetic, geodetic2ecef, rad2deg, Ellipsoid};

/// Receiver a priori position, carried in both ECEF and geodetic form so
/// downstream modeling (troposphere, elevation/azimuth, tides) can use
/// whichever it needs without repeated conversions.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub struct AprioriPosition {
    pub ecef: Vector3D,
    pub geodetic: Vector3D,
}

impl AprioriPosition {
    /// Builds Self from ECEF position, meters.
    pub fn from_ecef(ecef: Vector3D) -> Self {
        let (x, y, z) = (ecef.x, ecef.y, ecef.z);
        let (lat_rad, lon_rad, alt) = ecef2geodetic(x, y, z, Ellipsoid::WGS84);
        Self {
            ecef,
            geodetic: Vector3D {
                x: rad2deg(lat_rad),
                y: rad2deg(lon_rad),
                z: alt,
            },
        }
    }

    /// Builds Self from geodetic coordinates: latitude/longitude in
    /// decimal degrees, altitude above sea level in meters.
    pub fn from_geodetic(geodetic: Vector3D) -> Self {
        let (lat, lon, alt) = (geodetic.x, geodetic.y, geodetic.z);
        Self {
            ecef: geodetic2ecef(deg2rad(lat), deg2rad(lon), alt, Ellipsoid::WGS84).into(),
            geodetic,
        }
    }

    pub fn latitude_rad(&self) -> f64 {
        self.geodetic.x.to_radians()
    }

    pub fn longitude_rad(&self) -> f64 {
        self.geodetic.y.to_radians()
    }

    pub fn altitude_m(&self) -> f64 {
        self.geodetic.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geodetic_round_trips_through_ecef() {
        let origin = AprioriPosition::from_geodetic(Vector3D {
            x: 48.8,
            y: 2.3,
            z: 100.0,
        });
        let back = AprioriPosition::from_ecef(origin.ecef);
        assert!((back.geodetic.x - 48.8).abs() < 1.0e-6);
        assert!((back.geodetic.y - 2.3).abs() < 1.0e-6);
        assert!((back.geodetic.z - 100.0).abs() < 1.0e-3);
    }

    #[test]
    fn latitude_rad_matches_degrees() {
        let pos = AprioriPosition::from_geodetic(Vector3D {
            x: 45.0,
            y: 0.0,
            z: 0.0,
        });
        assert!((pos.latitude_rad() - std::f64::consts::FRAC_PI_4).abs() < 1.0e-9);
    }
}

//! Per-epoch output record (spec.md §2 step 11, §6 ".pos file"),
//! grounded on the teacher's own `.pos`-line writer in
//! `rinex-cli/src/positioning` for field layout, generalized to the
//! richer PPP/PPP-AR set of columns.
use std::collections::BTreeMap;
use std::fmt;

use hifitime::Epoch;

use crate::vector::Vector3D;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coordinate solution, either ECEF or an ENU displacement from the
/// reference position (spec.md §6 `outENU`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoordinateSolution {
    Ecef(Vector3D),
    Enu(Vector3D),
}

/// One line of the `.pos` output (spec.md §6 "Outputs produced").
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpochSolution {
    pub epoch: Epoch,
    pub coordinates: CoordinateSolution,
    /// Per-system receiver clock offset, meters, keyed by system char.
    pub receiver_clocks: BTreeMap<char, f64>,
    pub wet_tropo_delay_m: f64,
    pub num_satellites: usize,
    pub pdop: f64,
    pub ambiguities_fixed: bool,
}

impl fmt::Display for EpochSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b, c) = match self.coordinates {
            CoordinateSolution::Ecef(v) => (v.x, v.y, v.z),
            CoordinateSolution::Enu(v) => (v.x, v.y, v.z),
        };
        let clocks: String = self
            .receiver_clocks
            .iter()
            .map(|(sys, dt)| format!("{sys}:{dt:.4}"))
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "{} {:.4} {:.4} {:.4} {} {:.4} {} {:.2} {}",
            self.epoch,
            a,
            b,
            c,
            clocks,
            self.wet_tropo_delay_m,
            self.num_satellites,
            self.pdop,
            if self.ambiguities_fixed { "FIXED" } else { "FLOAT" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_fix_status() {
        let mut clocks = BTreeMap::new();
        clocks.insert('G', 1.234);
        let sol = EpochSolution {
            epoch: Epoch::from_gpst_seconds(0.0),
            coordinates: CoordinateSolution::Ecef(Vector3D {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            }),
            receiver_clocks: clocks,
            wet_tropo_delay_m: 0.12,
            num_satellites: 8,
            pdop: 1.9,
            ambiguities_fixed: true,
        };
        assert!(format!("{sol}").contains("FIXED"));
    }
}

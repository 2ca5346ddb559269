use std::cmp::Ordering;
use std::fmt;

use gnss::prelude::{Constellation, SV};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Satellite identity: constellation + PRN, validity range per system
/// (spec.md §3 `SatID`). Thin wrapper around [gnss_rs::sv::SV], re-ordered
/// so that `system` sorts before `prn` (the upstream [SV] orders by `prn`
/// first, which does not match the per-system grouping this crate needs
/// when building the deterministic parameter ordering of §4.4).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SatId(pub SV);

impl SatId {
    pub fn new(constellation: Constellation, prn: u8) -> Self {
        Self(SV::new(constellation, prn))
    }

    pub fn constellation(&self) -> Constellation {
        self.0.constellation
    }

    pub fn prn(&self) -> u8 {
        self.0.prn
    }
}

impl From<SV> for SatId {
    fn from(sv: SV) -> Self {
        Self(sv)
    }
}

impl fmt::Display for SatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for SatId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SatId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .constellation
            .cmp(&other.0.constellation)
            .then(self.0.prn.cmp(&other.0.prn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_system_first() {
        let mut v = vec![
            SatId::new(Constellation::Galileo, 1),
            SatId::new(Constellation::GPS, 32),
            SatId::new(Constellation::GPS, 1),
        ];
        v.sort();
        assert_eq!(v[0], SatId::new(Constellation::GPS, 1));
        assert_eq!(v[1], SatId::new(Constellation::GPS, 32));
        assert_eq!(v[2], SatId::new(Constellation::Galileo, 1));
    }
}

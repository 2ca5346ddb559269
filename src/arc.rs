//! Arc counter management (spec.md §4.6), grounded on
//! `original_source/src/ProceFrame/MarkArc.hpp` and `Counter.{hpp,cpp}`:
//! an integer counter keyed by `(SatID, ambiguity TypeID)`, incremented on
//! every cycle slip, dropped once the satellite disappears for longer
//! than a configurable gap.
use std::collections::BTreeMap;

use hifitime::{Duration, Epoch};

use crate::identifiers::{SatId, TypeId};

#[derive(Debug, Clone, Copy, PartialEq)]
struct ArcEntry {
    arc: f64,
    last_epoch: Epoch,
}

/// Tracks the live arc counter for every `(SatID, ambiguity TypeID)` pair
/// seen so far (spec.md §4.6).
#[derive(Debug, Clone, Default)]
pub struct ArcManager {
    entries: BTreeMap<(SatId, TypeId), ArcEntry>,
    max_gap: Duration,
}

impl ArcManager {
    pub fn new(max_gap: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_gap,
        }
    }

    /// Advances (or creates) the arc counter for `(sat, ambiguity_type)`
    /// at `epoch`. `cs_flag` is this satellite's combined cycle-slip flag
    /// for the current epoch. Returns the arc counter to tag the
    /// corresponding [crate::variable::Variable] with.
    pub fn observe(&mut self, sat: SatId, ambiguity_type: TypeId, epoch: Epoch, cs_flag: bool) -> f64 {
        let key = (sat, ambiguity_type);
        match self.entries.get_mut(&key) {
            None => {
                self.entries.insert(
                    key,
                    ArcEntry {
                        arc: 1.0,
                        last_epoch: epoch,
                    },
                );
                1.0
            }
            Some(entry) => {
                let gap = epoch - entry.last_epoch;
                if gap > self.max_gap {
                    entry.arc = 1.0;
                } else if cs_flag {
                    entry.arc += 1.0;
                }
                entry.last_epoch = epoch;
                entry.arc
            }
        }
    }

    /// Drops every tuple whose last observation is older than `max_gap`
    /// relative to `now` (spec.md §4.6 "removed" on prolonged absence).
    pub fn prune_stale(&mut self, now: Epoch) {
        let max_gap = self.max_gap;
        self.entries
            .retain(|_, entry| now - entry.last_epoch <= max_gap);
    }

    pub fn current_arc(&self, sat: SatId, ambiguity_type: &TypeId) -> Option<f64> {
        self.entries
            .get(&(sat, ambiguity_type.clone()))
            .map(|e| e.arc)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss::prelude::Constellation;

    fn gps(prn: u8) -> SatId {
        SatId::new(Constellation::GPS, prn)
    }

    #[test]
    fn first_appearance_starts_at_one() {
        let mut mgr = ArcManager::new(Duration::from_seconds(120.0));
        let arc = mgr.observe(gps(1), TypeId::Arc, Epoch::from_gpst_seconds(0.0), false);
        assert_eq!(arc, 1.0);
    }

    #[test]
    fn slip_increments_arc() {
        let mut mgr = ArcManager::new(Duration::from_seconds(120.0));
        mgr.observe(gps(1), TypeId::Arc, Epoch::from_gpst_seconds(0.0), false);
        let arc = mgr.observe(gps(1), TypeId::Arc, Epoch::from_gpst_seconds(30.0), true);
        assert_eq!(arc, 2.0);
    }

    #[test]
    fn gap_beyond_max_resets_to_one() {
        let mut mgr = ArcManager::new(Duration::from_seconds(60.0));
        mgr.observe(gps(1), TypeId::Arc, Epoch::from_gpst_seconds(0.0), false);
        let arc = mgr.observe(gps(1), TypeId::Arc, Epoch::from_gpst_seconds(500.0), false);
        assert_eq!(arc, 1.0);
    }

    #[test]
    fn prune_drops_tuples_absent_too_long() {
        let mut mgr = ArcManager::new(Duration::from_seconds(60.0));
        mgr.observe(gps(1), TypeId::Arc, Epoch::from_gpst_seconds(0.0), false);
        mgr.prune_stale(Epoch::from_gpst_seconds(1000.0));
        assert!(mgr.is_empty());
    }
}

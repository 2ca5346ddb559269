//! Symbolic unknowns of the estimation problem (spec.md §3 `Variable`),
//! grounded on `original_source/src/ProceFrame/Variable.{hpp,cpp}` but
//! re-architected per spec.md §9: the stochastic model is referenced by
//! an arena index rather than a raw pointer.
use std::cmp::Ordering;
use std::fmt;

use crate::identifiers::{SatId, SourceId, TypeId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// `source ∈ SourceID ∪ {ALL, SOME}` (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceScope {
    One(SourceId),
    All,
    Some,
}

impl PartialOrd for SourceScope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceScope {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(s: &SourceScope) -> u8 {
            match s {
                SourceScope::One(_) => 0,
                SourceScope::All => 1,
                SourceScope::Some => 2,
            }
        }
        match (self, other) {
            (SourceScope::One(a), SourceScope::One(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

/// `satellite ∈ SatID ∪ {ALL, SOME}` (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SatScope {
    One(SatId),
    All,
    Some,
}

impl PartialOrd for SatScope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SatScope {
    fn cmp(&self, other: &Self) -> Ordering {
        fn rank(s: &SatScope) -> u8 {
            match s {
                SatScope::One(_) => 0,
                SatScope::All => 1,
                SatScope::Some => 2,
            }
        }
        match (self, other) {
            (SatScope::One(a), SatScope::One(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

/// A symbolic unknown (spec.md §3 `Variable`). `arc` is carried as `f64`
/// per the spec's literal wording, though in practice it is always an
/// integer count.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Variable {
    pub type_id: TypeId,
    pub source: SourceScope,
    pub satellite: SatScope,
    pub arc: f64,
    pub is_source_indexed: bool,
    pub is_sat_indexed: bool,
    pub is_arc_indexed: bool,
    pub initial_variance: f64,
    /// Index into the filter's stochastic-model arena
    /// (`Vec<StochasticModel>`), replacing the original's raw pointer.
    pub model_index: usize,
    /// Position in the current epoch's state vector, `None` once retired.
    pub now_index: Option<usize>,
    /// Position in the previous epoch's state vector.
    pub pre_index: Option<usize>,
    /// Stabilizes the deterministic ordering convention: receiver
    /// coordinates and clocks sort before tropospheric and ionospheric
    /// parameters, which sort before ambiguities (see [type_order]).
    pub type_order: i32,
}

impl Variable {
    pub fn new(
        type_id: TypeId,
        source: SourceScope,
        satellite: SatScope,
        arc: f64,
        model_index: usize,
        initial_variance: f64,
    ) -> Self {
        let is_source_indexed = !matches!(source, SourceScope::All);
        let is_sat_indexed = !matches!(satellite, SatScope::All);
        Self {
            type_order: type_order(&type_id),
            type_id,
            is_arc_indexed: is_sat_indexed && matches!(satellite, SatScope::One(_)),
            source,
            satellite,
            arc,
            is_source_indexed,
            is_sat_indexed,
            initial_variance,
            model_index,
            now_index: None,
            pre_index: None,
        }
    }

    /// `(typeOrder, type, source, satellite, arc)` total order, per
    /// spec.md §3. `arc` compares via `total_cmp` since it is an `f64`.
    fn sort_key(&self) -> (i32, &TypeId, &SourceScope, &SatScope, f64) {
        (
            self.type_order,
            &self.type_id,
            &self.source,
            &self.satellite,
            self.arc,
        )
    }
}

impl Eq for Variable {}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().partial_cmp(&other.sort_key()).unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/arc{}", self.type_id, self.arc)
    }
}

/// Deterministic `typeOrder` convention (spec.md §9 Open Question:
/// "document the convention explicitly rather than guessing").
/// Lower values sort first: receiver position, then clocks, then
/// troposphere, then ionosphere, then ambiguities, then everything else.
pub fn type_order(type_id: &TypeId) -> i32 {
    match type_id {
        TypeId::Dn | TypeId::De | TypeId::Du => 0,
        TypeId::Cdt(_) => 1,
        TypeId::WetTropo | TypeId::GradN | TypeId::GradE => 2,
        TypeId::IonoMap => 3,
        TypeId::SlantIono(_) => 3,
        TypeId::Ifb(_) => 4,
        TypeId::Ambiguity(_) | TypeId::AmbiguityWl(..) | TypeId::AmbiguityLc(..) => 5,
        _ => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss::prelude::Constellation;

    #[test]
    fn ordering_follows_type_order_first() {
        let clock = Variable::new(
            TypeId::Cdt('G'),
            SourceScope::All,
            SatScope::All,
            0.0,
            0,
            1.0e8,
        );
        let amb = Variable::new(
            TypeId::Ambiguity(Box::new(TypeId::Rho)),
            SourceScope::All,
            SatScope::One(SatId::new(Constellation::GPS, 1)),
            1.0,
            1,
            1.0e4,
        );
        assert!(clock < amb);
    }

    #[test]
    fn ambiguity_variable_is_arc_indexed() {
        let amb = Variable::new(
            TypeId::Ambiguity(Box::new(TypeId::Rho)),
            SourceScope::All,
            SatScope::One(SatId::new(Constellation::GPS, 1)),
            2.0,
            0,
            1.0e4,
        );
        assert!(amb.is_arc_indexed);
    }
}

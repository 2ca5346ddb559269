//! Design equations assembled per satellite/signal per epoch (spec.md §3
//! `Equation`, §4.3), grounded on
//! `original_source/src/ProceFrame/ComputeResidual.{hpp,cpp}` and
//! `RequiredObs.{hpp,cpp}`.
use std::collections::BTreeMap;

use hifitime::Epoch;

use crate::identifiers::{SatId, TypeId};
use crate::variable::Variable;

/// A coefficient attached to a [Variable] inside an [Equation]'s body.
/// Either pinned to a literal value, or pulled from the satellite's
/// `typeValueMap` at assembly time (spec.md §3 `Coefficient`).
#[derive(Debug, Clone, PartialEq)]
pub enum Coefficient {
    Forced(f64),
    FromType(TypeId),
}

impl Coefficient {
    /// Resolves the numeric value, looking up `FromType` in `values`.
    pub fn resolve(&self, values: &crate::data::TypeValueMap) -> Option<f64> {
        match self {
            Coefficient::Forced(v) => Some(*v),
            Coefficient::FromType(t) => values.get(t),
        }
    }
}

/// Ordered `Variable -> Coefficient` map (spec.md §3 `VarCoeffMap`).
/// Backed by a `Vec` rather than a map keyed on [Variable] (which is not
/// `Hash`/`Ord`-cheap to index by) — insertion order is preserved and is
/// exactly the order the equation builder appends unknowns in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarCoeffMap(Vec<(Variable, Coefficient)>);

impl VarCoeffMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, variable: Variable, coefficient: Coefficient) {
        self.0.push((variable, coefficient));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Variable, Coefficient)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.0.iter().map(|(v, _)| v)
    }
}

/// Header metadata of an [Equation] (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct EquationHeader {
    /// Independent-term TypeID: the prefit residual this equation models.
    pub independent_term: TypeId,
    /// Numeric value of the independent term (the prefit residual itself),
    /// i.e. the observed minus computed quantity `y` fed to the filter.
    pub residual: f64,
    pub epoch: Epoch,
    pub satellite: SatId,
    pub system: char,
    pub weight: f64,
    pub order_index: usize,
}

/// One row of the design matrix (spec.md §3 `Equation`).
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub header: EquationHeader,
    pub body: VarCoeffMap,
}

impl Equation {
    pub fn new(header: EquationHeader) -> Self {
        Self {
            header,
            body: VarCoeffMap::new(),
        }
    }

    pub fn add_unknown(&mut self, variable: Variable, coefficient: Coefficient) {
        self.body.push(variable, coefficient);
    }

    /// Elevation-dependent measurement variance, spec.md §4.3:
    /// `sigma0^2 / (2 sin E)^p`.
    pub fn elevation_variance(sigma0: f64, elevation_rad: f64, exponent: f64) -> f64 {
        let s = (2.0 * elevation_rad.sin()).max(1.0e-3);
        sigma0 * sigma0 / s.powf(exponent)
    }
}

/// Per-(sat, order_index) bookkeeping used while assembling a full epoch's
/// worth of equations, so `order_index` stays stable and monotonic.
#[derive(Debug, Default)]
pub struct EquationOrderCounter(BTreeMap<SatId, usize>);

impl EquationOrderCounter {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn next(&mut self, sat: SatId) -> usize {
        let entry = self.0.entry(sat).or_insert(0);
        let idx = *entry;
        *entry += 1;
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TypeValueMap;
    use crate::variable::{SatScope, SourceScope};
    use gnss::prelude::Constellation;

    #[test]
    fn coefficient_resolves_from_type_value_map() {
        let mut values = TypeValueMap::new();
        values.insert(TypeId::Rho, 2.0e7);
        let coeff = Coefficient::FromType(TypeId::Rho);
        assert_eq!(coeff.resolve(&values), Some(2.0e7));
        assert_eq!(
            Coefficient::FromType(TypeId::Relativity).resolve(&values),
            None
        );
    }

    #[test]
    fn elevation_variance_grows_at_low_elevation() {
        let high = Equation::elevation_variance(0.3, std::f64::consts::FRAC_PI_2, 2.0);
        let low = Equation::elevation_variance(0.3, 10.0_f64.to_radians(), 2.0);
        assert!(low > high);
    }

    #[test]
    fn order_counter_is_monotonic_per_satellite() {
        let mut counter = EquationOrderCounter::new();
        let g1 = SatId::new(Constellation::GPS, 1);
        assert_eq!(counter.next(g1), 0);
        assert_eq!(counter.next(g1), 1);
        let g2 = SatId::new(Constellation::GPS, 2);
        assert_eq!(counter.next(g2), 0);
    }

    #[test]
    fn body_preserves_insertion_order() {
        let mut body = VarCoeffMap::new();
        let v1 = Variable::new(
            TypeId::Dn,
            SourceScope::All,
            SatScope::All,
            0.0,
            0,
            1.0e6,
        );
        let v2 = Variable::new(
            TypeId::De,
            SourceScope::All,
            SatScope::All,
            0.0,
            0,
            1.0e6,
        );
        body.push(v1.clone(), Coefficient::Forced(1.0));
        body.push(v2.clone(), Coefficient::Forced(2.0));
        let vars: Vec<_> = body.variables().collect();
        assert_eq!(vars, vec![&v1, &v2]);
    }
}

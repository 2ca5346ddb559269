use std::collections::BTreeMap;

use nalgebra::DMatrix;

use crate::data::TypeValueMap;
use crate::identifiers::{SatId, TypeId};

/// `SatID -> typeValueMap` mapping, spec.md §3 `satTypeValueMap`. Backed by
/// a `BTreeMap<SatId, _>` so satellites always iterate in the sorted-SatID
/// order the filter's deterministic parameter ordering depends on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SatTypeValueMap(BTreeMap<SatId, TypeValueMap>);

impl SatTypeValueMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, sat: SatId, values: TypeValueMap) {
        self.0.insert(sat, values);
    }

    pub fn get(&self, sat: &SatId) -> Option<&TypeValueMap> {
        self.0.get(sat)
    }

    pub fn get_mut(&mut self, sat: &SatId) -> Option<&mut TypeValueMap> {
        self.0.get_mut(sat)
    }

    pub fn entry(&mut self, sat: SatId) -> &mut TypeValueMap {
        self.0.entry(sat).or_insert_with(TypeValueMap::new)
    }

    /// Enumerates satellites, in sorted `SatID` order.
    pub fn satellites(&self) -> Vec<SatId> {
        self.0.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SatId, &TypeValueMap)> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SatId, &mut TypeValueMap)> {
        self.0.iter_mut()
    }

    /// Keeps only the given satellites.
    pub fn keep_only_sat_id(&mut self, sats: &[SatId]) {
        self.0.retain(|s, _| sats.contains(s));
    }

    /// Extracts a copy restricted to the given satellites, without
    /// mutating self (spec.md §8: `extractSatID` then `keepOnlySatID` is
    /// equivalent on the input).
    pub fn extract_sat_id(&self, sats: &[SatId]) -> SatTypeValueMap {
        let mut out = SatTypeValueMap::new();
        for s in sats {
            if let Some(v) = self.get(s) {
                out.insert(*s, v.clone());
            }
        }
        out
    }

    /// Removes the given satellites.
    pub fn remove_sat_id(&mut self, sats: &[SatId]) {
        self.0.retain(|s, _| !sats.contains(s));
    }

    /// Keeps only the given types in every satellite's map, dropping
    /// satellites left empty is *not* performed here (caller decides).
    pub fn keep_only_types(&mut self, types: &[TypeId]) {
        for (_, v) in self.0.iter_mut() {
            v.keep_only_types(types);
        }
    }

    pub fn remove_types(&mut self, types: &[TypeId]) {
        for (_, v) in self.0.iter_mut() {
            v.remove_types(types);
        }
    }

    /// Builds a dense matrix whose rows follow the sorted-SatID order and
    /// columns follow `types`. Missing cells are zero (spec.md §3 contract
    /// of the matrix extractor).
    pub fn matrix_of_types(&self, types: &[TypeId]) -> DMatrix<f64> {
        let sats = self.satellites();
        let mut m = DMatrix::<f64>::zeros(sats.len(), types.len());
        for (row, sat) in sats.iter().enumerate() {
            let values = self.get(sat).expect("sat just enumerated from self");
            for (col, t) in types.iter().enumerate() {
                if let Some(v) = values.get(t) {
                    m[(row, col)] = v;
                }
            }
        }
        m
    }

    /// Inserts a matrix column back, ordered to match the current
    /// sorted-SatID order (spec.md §3 "insert a column of values").
    pub fn insert_column(&mut self, type_id: TypeId, column: &[f64]) {
        let sats = self.satellites();
        assert_eq!(
            sats.len(),
            column.len(),
            "column length must match satellite count"
        );
        for (sat, value) in sats.into_iter().zip(column.iter()) {
            self.entry(sat).insert(type_id.clone(), *value);
        }
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
    fn extract_then_keep_only_is_equivalent() {
        let mut map = SatTypeValueMap::new();
        map.insert(gps(1), TypeValueMap::new());
        map.insert(gps(2), TypeValueMap::new());
        map.insert(gps(3), TypeValueMap::new());

        let extracted = map.extract_sat_id(&[gps(1), gps(2)]);

        let mut kept = map.clone();
        kept.keep_only_sat_id(&[gps(1), gps(2)]);

        assert_eq!(extracted.satellites(), kept.satellites());
    }

    #[test]
    fn matrix_extraction_zero_fills_missing_cells() {
        let mut map = SatTypeValueMap::new();
        let mut v1 = TypeValueMap::new();
        v1.insert(TypeId::Rho, 10.0);
        map.insert(gps(1), v1);

        let mut v2 = TypeValueMap::new();
        v2.insert(TypeId::Relativity, 5.0);
        map.insert(gps(2), v2);

        let m = map.matrix_of_types(&[TypeId::Rho, TypeId::Relativity]);
        assert_eq!(m[(0, 0)], 10.0);
        assert_eq!(m[(0, 1)], 0.0); // missing cell -> zero
        assert_eq!(m[(1, 0)], 0.0);
        assert_eq!(m[(1, 1)], 5.0);
    }

    #[test]
    fn insert_column_matches_sorted_order() {
        let mut map = SatTypeValueMap::new();
        map.insert(gps(3), TypeValueMap::new());
        map.insert(gps(1), TypeValueMap::new());
        map.insert(gps(2), TypeValueMap::new());

        map.insert_column(TypeId::Rho, &[100.0, 200.0, 300.0]);
        // sorted order is G01, G02, G03
        assert_eq!(map.get(&gps(1)).unwrap().get(&TypeId::Rho), Some(100.0));
        assert_eq!(map.get(&gps(2)).unwrap().get(&TypeId::Rho), Some(200.0));
        assert_eq!(map.get(&gps(3)).unwrap().get(&TypeId::Rho), Some(300.0));
    }
}

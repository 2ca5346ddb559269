use std::collections::BTreeMap;

use crate::error::TypeMissingInMap;
use crate::identifiers::TypeId;

/// `TypeID -> f64` mapping, spec.md §3 `typeValueMap`. Backed by a
/// `BTreeMap` rather than a `HashMap` so that iteration order is
/// deterministic (needed when building the design matrix column order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeValueMap(BTreeMap<TypeId, f64>);

impl TypeValueMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, type_id: TypeId, value: f64) -> Option<f64> {
        self.0.insert(type_id, value)
    }

    pub fn get(&self, type_id: &TypeId) -> Option<f64> {
        self.0.get(type_id).copied()
    }

    /// Value lookup raising a typed error on miss (spec.md §3).
    pub fn get_or_err(&self, type_id: &TypeId) -> Result<f64, TypeMissingInMap> {
        self.get(type_id)
            .ok_or_else(|| TypeMissingInMap(type_id.clone()))
    }

    pub fn contains(&self, type_id: &TypeId) -> bool {
        self.0.contains_key(type_id)
    }

    pub fn remove(&mut self, type_id: &TypeId) -> Option<f64> {
        self.0.remove(type_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeId, &f64)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TypeId> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keeps only the given types, discarding everything else.
    pub fn keep_only_types(&mut self, types: &[TypeId]) {
        self.0.retain(|t, _| types.contains(t));
    }

    /// Removes the given types, keeping everything else.
    pub fn remove_types(&mut self, types: &[TypeId]) {
        self.0.retain(|t, _| !types.contains(t));
    }

    /// Extracts (copies out) values for the given types, without mutating self.
    pub fn extract_types(&self, types: &[TypeId]) -> TypeValueMap {
        let mut out = TypeValueMap::new();
        for t in types {
            if let Some(v) = self.get(t) {
                out.insert(t.clone(), v);
            }
        }
        out
    }
}

impl FromIterator<(TypeId, f64)> for TypeValueMap {
    fn from_iter<I: IntoIterator<Item = (TypeId, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::{ObsKind, Signal};

    #[test]
    fn missing_type_raises_typed_error() {
        let map = TypeValueMap::new();
        let t = TypeId::Obs(Signal::canonical(ObsKind::PseudoRange, 1, 'G'));
        assert_eq!(map.get_or_err(&t), Err(TypeMissingInMap(t)));
    }

    #[test]
    fn keep_then_extract_is_equivalent_on_kept_set() {
        // spec.md §8 round-trip: getMatrixOfTypes then insertMatrix restores
        // values for cells in T, leaves others untouched -- the scalar analogue
        // for TypeValueMap is keep/extract commuting on the retained set.
        let mut map = TypeValueMap::new();
        let t1 = TypeId::Rho;
        let t2 = TypeId::Relativity;
        let t3 = TypeId::GravDelay;
        map.insert(t1.clone(), 1.0);
        map.insert(t2.clone(), 2.0);
        map.insert(t3.clone(), 3.0);

        let extracted = map.extract_types(&[t1.clone(), t2.clone()]);
        assert_eq!(extracted.get(&t1), Some(1.0));
        assert_eq!(extracted.get(&t2), Some(2.0));
        assert_eq!(extracted.get(&t3), None);

        let mut kept = map.clone();
        kept.keep_only_types(&[t1.clone(), t2.clone()]);
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&t1) && kept.contains(&t2));
    }
}

//! Sparse parameter fact tables.

use crate::error::{EmodError, EmodResult};
use crate::sets::Dimension;
use std::collections::HashMap;

/// A key tuple of dimension values.
pub type Key = Vec<String>;

/// Build an owned key from borrowed parts.
pub fn key<S: AsRef<str>>(parts: &[S]) -> Key {
    parts.iter().map(|part| part.as_ref().to_string()).collect()
}

/// Sparse mapping from a key tuple to a value, with an optional default
/// substituted for tuples that have no explicit row.
#[derive(Debug, Clone)]
pub struct ParamTable {
    name: String,
    dims: Vec<Dimension>,
    default: Option<f64>,
    values: HashMap<Key, f64>,
}

impl ParamTable {
    pub fn new(name: impl Into<String>, dims: Vec<Dimension>, default: Option<f64>) -> Self {
        Self {
            name: name.into(),
            dims,
            default,
            values: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    pub fn default_value(&self) -> Option<f64> {
        self.default
    }

    pub fn set_default(&mut self, default: Option<f64>) {
        self.default = default;
    }

    pub fn insert(&mut self, key: Key, value: f64) -> EmodResult<()> {
        if key.len() != self.dims.len() {
            return Err(EmodError::Input(format!(
                "parameter {} expects {} key columns, got {}",
                self.name,
                self.dims.len(),
                key.len()
            )));
        }
        if !value.is_finite() {
            return Err(EmodError::Input(format!(
                "parameter {} has non-finite value for {:?}",
                self.name, key
            )));
        }
        self.values.insert(key, value);
        Ok(())
    }

    /// Explicit value, ignoring the default.
    pub fn explicit<S: AsRef<str>>(&self, key_parts: &[S]) -> Option<f64> {
        self.values.get(&key(key_parts)).copied()
    }

    /// Explicit value or the declared default.
    pub fn get<S: AsRef<str>>(&self, key_parts: &[S]) -> Option<f64> {
        self.explicit(key_parts).or(self.default)
    }

    /// Explicit value, declared default, or `fallback`.
    pub fn value_or<S: AsRef<str>>(&self, key_parts: &[S], fallback: f64) -> f64 {
        self.get(key_parts).unwrap_or(fallback)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Explicit rows in lexicographic key order.
    pub fn sorted_rows(&self) -> Vec<(&Key, f64)> {
        let mut rows: Vec<(&Key, f64)> = self.values.iter().map(|(k, v)| (k, *v)).collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        rows
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, f64)> {
        self.values.iter().map(|(k, v)| (k, *v))
    }

    pub fn any_positive(&self) -> bool {
        self.values.values().any(|v| *v > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capital_cost() -> ParamTable {
        let mut table = ParamTable::new(
            "CapitalCost",
            vec![Dimension::Region, Dimension::Technology, Dimension::Year],
            Some(0.0),
        );
        table.insert(key(&["R1", "T1", "2020"]), 100.0).unwrap();
        table.insert(key(&["R1", "T1", "2021"]), 90.0).unwrap();
        table
    }

    #[test]
    fn default_applies_to_missing_rows() {
        let table = capital_cost();
        assert_eq!(table.get(&["R1", "T1", "2020"]), Some(100.0));
        assert_eq!(table.get(&["R1", "T2", "2020"]), Some(0.0));
        assert_eq!(table.explicit(&["R1", "T2", "2020"]), None);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut table = capital_cost();
        assert!(table.insert(key(&["R1", "T1"]), 1.0).is_err());
    }

    #[test]
    fn sorted_rows_are_lexicographic() {
        let table = capital_cost();
        let years: Vec<&str> = table
            .sorted_rows()
            .iter()
            .map(|(k, _)| k[2].as_str())
            .collect();
        assert_eq!(years, vec!["2020", "2021"]);
    }
}

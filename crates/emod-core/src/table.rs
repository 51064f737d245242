//! In-memory tabular query results.
//!
//! Every catalogued query returns a [`Table`]: a block of rows, each made of a
//! textual key tuple followed by numeric payload columns. Rows are sorted by
//! key so that the streaming assembler can consume them in one pass.

use crate::error::{EmodError, EmodResult};
use crate::params::Key;

/// One query result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: Key,
    pub values: Vec<f64>,
}

impl Row {
    pub fn new(key: Key, values: Vec<f64>) -> Self {
        Self { key, values }
    }

    pub fn keyed(key: Key) -> Self {
        Self {
            key,
            values: Vec::new(),
        }
    }

    /// Key column `idx`.
    pub fn at(&self, idx: usize) -> &str {
        self.key.get(idx).map(String::as_str).unwrap_or_default()
    }

    /// Payload column `idx`; absent payloads read as zero.
    pub fn value(&self, idx: usize) -> f64 {
        self.values.get(idx).copied().unwrap_or_default()
    }

    /// The first `len` key columns.
    pub fn prefix(&self, len: usize) -> &[String] {
        &self.key[..len.min(self.key.len())]
    }
}

/// Immutable result of one named query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    key_columns: Vec<String>,
    value_columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new<K, V>(key_columns: &[K], value_columns: &[V]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            key_columns: key_columns.iter().map(|c| c.as_ref().to_string()).collect(),
            value_columns: value_columns
                .iter()
                .map(|c| c.as_ref().to_string())
                .collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Row) -> EmodResult<()> {
        if row.key.len() != self.key_columns.len() || row.values.len() != self.value_columns.len()
        {
            return Err(EmodError::Assembly(format!(
                "row shape {}+{} does not match table shape {}+{}",
                row.key.len(),
                row.values.len(),
                self.key_columns.len(),
                self.value_columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Sort rows lexicographically by key and drop exact duplicate keys,
    /// keeping the first occurrence.
    pub fn sort(&mut self) {
        self.rows.sort_by(|a, b| a.key.cmp(&b.key));
        self.rows.dedup_by(|b, a| a.key == b.key);
    }

    pub fn sorted(mut self) -> Self {
        self.sort();
        self
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn value_columns(&self) -> &[String] {
        &self.value_columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn key_index(&self, column: &str) -> Option<usize> {
        self.key_columns.iter().position(|c| c == column)
    }

    pub fn is_sorted(&self) -> bool {
        self.rows.windows(2).all(|pair| pair[0].key <= pair[1].key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::key;

    #[test]
    fn push_rejects_wrong_shape() {
        let mut table = Table::new(&["r", "y"], &["value"]);
        assert!(table.push(Row::new(key(&["R1"]), vec![1.0])).is_err());
        assert!(table.push(Row::new(key(&["R1", "2020"]), vec![])).is_err());
        assert!(table.push(Row::new(key(&["R1", "2020"]), vec![1.0])).is_ok());
    }

    #[test]
    fn sort_orders_and_dedups_keys() {
        let mut table = Table::new(&["r"], &["value"]);
        table.push(Row::new(key(&["B"]), vec![2.0])).unwrap();
        table.push(Row::new(key(&["A"]), vec![1.0])).unwrap();
        table.push(Row::new(key(&["B"]), vec![3.0])).unwrap();
        table.sort();
        assert_eq!(table.len(), 2);
        assert!(table.is_sorted());
        assert_eq!(table.rows()[1].value(0), 2.0);
    }

    #[test]
    fn row_accessors_tolerate_short_rows() {
        let row = Row::keyed(key(&["R1", "T1"]));
        assert_eq!(row.at(1), "T1");
        assert_eq!(row.at(5), "");
        assert_eq!(row.value(0), 0.0);
        assert_eq!(row.prefix(5).len(), 2);
    }
}

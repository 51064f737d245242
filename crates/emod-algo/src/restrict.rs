//! Index restriction: the legal domain of a variable family, derived from the
//! key combinations that actually occur in a query result.
//!
//! [`IndexLevels`] holds one dictionary per key column. Level `i` maps the
//! tuple of the first `i` key values to the set of values seen in column `i`
//! after that prefix, so the family is declared over exactly the observed
//! continuations instead of the Cartesian product of its dimensions.

use emod_core::{EmodResult, Key, Row};
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::pool::build_pool;

/// Prefix-to-continuation dictionaries for `depth` key columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexLevels {
    levels: Vec<HashMap<Key, BTreeSet<String>>>,
}

impl IndexLevels {
    pub fn new(depth: usize) -> Self {
        Self {
            levels: vec![HashMap::new(); depth],
        }
    }

    /// Unrestricted domain: every combination of the given members.
    pub fn full(dims: &[&[String]]) -> Self {
        let mut levels = Self::new(dims.len());
        let mut prefixes: Vec<Key> = vec![Vec::new()];
        for (depth, members) in dims.iter().enumerate() {
            if members.is_empty() {
                return Self::new(dims.len());
            }
            let continuation: BTreeSet<String> = members.iter().cloned().collect();
            let mut next = Vec::with_capacity(prefixes.len() * members.len());
            for prefix in prefixes {
                if depth + 1 < dims.len() {
                    for member in members.iter() {
                        let mut extended = prefix.clone();
                        extended.push(member.clone());
                        next.push(extended);
                    }
                }
                levels.levels[depth].insert(prefix, continuation.clone());
            }
            prefixes = next;
        }
        levels
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.first().map_or(true, HashMap::is_empty)
    }

    pub fn level(&self, idx: usize) -> Option<&HashMap<Key, BTreeSet<String>>> {
        self.levels.get(idx)
    }

    /// Record the first `depth` values of `key`.
    pub fn insert(&mut self, key: &[String]) {
        if key.len() < self.levels.len() {
            return;
        }
        for (idx, level) in self.levels.iter_mut().enumerate() {
            let prefix = &key[..idx];
            match level.get_mut(prefix) {
                Some(values) => {
                    values.insert(key[idx].clone());
                }
                None => {
                    level.insert(prefix.to_vec(), BTreeSet::from([key[idx].clone()]));
                }
            }
        }
    }

    /// Union `other` into `self`, level by level.
    pub fn merge(&mut self, other: IndexLevels) {
        if self.levels.len() < other.levels.len() {
            self.levels.resize(other.levels.len(), HashMap::new());
        }
        for (mine, theirs) in self.levels.iter_mut().zip(other.levels) {
            for (prefix, values) in theirs {
                mine.entry(prefix).or_default().extend(values);
            }
        }
    }

    /// Observed values following `prefix`.
    pub fn continuations(&self, prefix: &[String]) -> Option<&BTreeSet<String>> {
        self.levels.get(prefix.len())?.get(prefix)
    }

    pub fn contains<S: AsRef<str>>(&self, key: &[S]) -> bool {
        if key.len() != self.levels.len() || self.is_empty() {
            return false;
        }
        let mut prefix: Key = Vec::with_capacity(key.len());
        for part in key {
            let part = part.as_ref();
            match self.continuations(&prefix) {
                Some(values) if values.contains(part) => prefix.push(part.to_string()),
                _ => return false,
            }
        }
        true
    }

    /// Every legal full key tuple, depth-first in sorted order.
    pub fn tuples(&self) -> Vec<Key> {
        let mut out = Vec::new();
        if !self.is_empty() {
            let mut prefix = Vec::with_capacity(self.depth());
            self.walk(&mut prefix, &mut out);
        }
        out
    }

    fn walk(&self, prefix: &mut Key, out: &mut Vec<Key>) {
        if prefix.len() == self.depth() {
            out.push(prefix.clone());
            return;
        }
        let Some(values) = self.continuations(prefix) else {
            return;
        };
        for value in values {
            prefix.push(value.clone());
            self.walk(prefix, out);
            prefix.pop();
        }
    }
}

/// Sequential single pass over `rows`, keyed by their first `depth` columns.
pub fn restrict_rows(rows: &[Row], depth: usize) -> IndexLevels {
    let mut levels = IndexLevels::new(depth);
    for row in rows {
        levels.insert(&row.key);
    }
    levels
}

/// Run the sequential pass on `blocks` contiguous blocks and merge the results.
pub fn restrict_blocks(rows: &[Row], depth: usize, blocks: usize) -> IndexLevels {
    let blocks = blocks.max(1);
    let chunk = rows.len().div_ceil(blocks).max(1);
    rows.chunks(chunk)
        .map(|block| restrict_rows(block, depth))
        .fold(IndexLevels::new(depth), |mut acc, part| {
            acc.merge(part);
            acc
        })
}

/// Restriction that partitions large inputs across a worker pool.
///
/// Runs in parallel only when `rows.len() > threshold` and `workers > 1`.
pub fn restrict(
    rows: &[Row],
    depth: usize,
    workers: usize,
    threshold: usize,
) -> EmodResult<IndexLevels> {
    if workers <= 1 || rows.len() <= threshold {
        return Ok(restrict_rows(rows, depth));
    }

    let pool = build_pool(workers)?;
    let chunk = rows.len().div_ceil(workers);
    debug!(rows = rows.len(), workers, chunk, "partitioned index restriction");
    let levels = pool.install(|| {
        rows.par_chunks(chunk)
            .map(|block| restrict_rows(block, depth))
            .reduce(
                || IndexLevels::new(depth),
                |mut acc, part| {
                    acc.merge(part);
                    acc
                },
            )
    });
    Ok(levels)
}

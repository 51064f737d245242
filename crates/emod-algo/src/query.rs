//! Parallel query executor.
//!
//! Runs a fixed catalogue of independent, named queries against the fact
//! store and gathers their results into a [`QueryResults`] map. With more than
//! one worker the queries are spread over a rayon pool; otherwise they run in
//! order on the calling thread. Any failing query fails the whole run.

use emod_core::{EmodError, EmodResult, Table};
use emod_io::FactStore;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};
use web_time::Instant;

use crate::pool::build_pool;

pub type QueryFn = fn(&FactStore) -> EmodResult<Table>;

/// One catalogued query.
#[derive(Clone, Copy)]
pub struct NamedQuery {
    pub name: &'static str,
    pub run: QueryFn,
}

impl std::fmt::Debug for NamedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedQuery").field("name", &self.name).finish()
    }
}

/// Read-only name → table map produced by [`execute_queries`].
#[derive(Debug, Default)]
pub struct QueryResults {
    tables: HashMap<&'static str, Table>,
}

impl QueryResults {
    pub fn get(&self, name: &str) -> EmodResult<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| EmodError::query(name, "no result for query"))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.tables.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

fn run_query(store: &FactStore, query: &NamedQuery) -> EmodResult<(&'static str, Table)> {
    let started = Instant::now();
    let table = (query.run)(store).map_err(|err| match err {
        EmodError::Query { .. } => err,
        other => EmodError::query(query.name, other),
    })?;
    debug!(
        query = query.name,
        rows = table.len(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "query finished"
    );
    Ok((query.name, table))
}

/// Execute every query in `catalogue`.
pub fn execute_queries(
    store: &FactStore,
    catalogue: &[NamedQuery],
    workers: usize,
) -> EmodResult<QueryResults> {
    let started = Instant::now();
    let results: Vec<(&'static str, Table)> = if workers > 1 {
        let pool = build_pool(workers)?;
        pool.install(|| {
            catalogue
                .par_iter()
                .map(|query| run_query(store, query))
                .collect::<EmodResult<Vec<_>>>()
        })?
    } else {
        catalogue
            .iter()
            .map(|query| run_query(store, query))
            .collect::<EmodResult<Vec<_>>>()?
    };

    info!(
        queries = results.len(),
        workers,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "executed query catalogue"
    );
    Ok(QueryResults {
        tables: results.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use emod_core::{key, Dimension, Row};

    fn regions(store: &FactStore) -> EmodResult<Table> {
        let mut table = Table::new(&["r"], &[] as &[&str]);
        for r in store.members(Dimension::Region) {
            table.push(Row::keyed(key(&[r])))?;
        }
        Ok(table)
    }

    fn failing(_: &FactStore) -> EmodResult<Table> {
        Err(EmodError::Input("broken table".into()))
    }

    fn store() -> FactStore {
        FactStore::builder()
            .set(Dimension::Region, ["R1", "R2"])
            .build()
            .unwrap()
    }

    #[test]
    fn sequential_and_parallel_agree() {
        let catalogue = [
            NamedQuery { name: "regions", run: regions },
            NamedQuery { name: "regions_again", run: regions },
        ];
        let store = store();
        let sequential = execute_queries(&store, &catalogue, 1).unwrap();
        let parallel = execute_queries(&store, &catalogue, 3).unwrap();
        assert_eq!(sequential.names(), vec!["regions", "regions_again"]);
        assert_eq!(
            sequential.get("regions").unwrap(),
            parallel.get("regions").unwrap()
        );
        assert_eq!(parallel.get("regions_again").unwrap().len(), 2);
    }

    #[test]
    fn failing_query_is_fatal_and_named() {
        let catalogue = [
            NamedQuery { name: "regions", run: regions },
            NamedQuery { name: "broken", run: failing },
        ];
        for workers in [1, 4] {
            let err = execute_queries(&store(), &catalogue, workers).unwrap_err();
            assert!(matches!(err, EmodError::Query { ref name, .. } if name == "broken"));
        }
    }

    #[test]
    fn missing_result_is_a_query_error() {
        let results = QueryResults::default();
        assert!(results.get("absent").is_err());
        assert!(results.is_empty());
    }
}

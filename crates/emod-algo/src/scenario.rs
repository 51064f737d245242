//! End-to-end calculation of one scenario.
//!
//! [`try_calculate_scenario`] runs every phase in order (open the store,
//! execute the query catalogue, resolve flags and the time hierarchy,
//! assemble, solve, persist) and stops at the first error.
//! [`calculate_scenario`] wraps it for callers that only want a status.

use chrono::{DateTime, Utc};
use emod_core::{
    Dimension, EmodError, EmodResult, Model, RunConfig, Solution, SolveStatus, SolverConfig,
};
use emod_io::{persist_tables, CsvResultWriter, FactStore, ResultTable};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use tracing::{error, info, warn};
use web_time::Instant;

use crate::assembly::{assemble, AssemblyContext};
use crate::flags::ModelFlags;
use crate::pool::resolve_workers;
use crate::queries::{CATALOGUE, TIMESLICE_HIERARCHY};
use crate::query::execute_queries;
use crate::solver::backend_for;
use crate::timeslice::TimeHierarchy;

/// Outcome of one calculation.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    pub variables: usize,
    pub constraints: usize,
    pub flags: ModelFlags,
    /// Families written to the results directory, in persist order
    pub persisted: Vec<String>,
    pub results_dir: Option<PathBuf>,
    pub solved_at: DateTime<Utc>,
    pub elapsed_ms: f64,
}

/// Everything up to and including assembly, without solving.
pub struct AssembledScenario {
    pub store: FactStore,
    pub flags: ModelFlags,
    pub model: Model,
}

/// Open the scenario and assemble its model.
pub fn assemble_scenario(config: &RunConfig) -> EmodResult<AssembledScenario> {
    config.validate()?;
    let store = FactStore::open(&config.scenario)?;
    let workers = resolve_workers(config.workers);
    info!(scenario = %config.scenario.display(), workers, "calculating scenario");

    let results = execute_queries(&store, CATALOGUE, workers)?;
    let hierarchy = TimeHierarchy::from_table(
        results.get(TIMESLICE_HIERARCHY)?,
        store.members(Dimension::Timeslice),
        store.members(Dimension::Year),
    )?;
    let flags = ModelFlags::resolve(&store, &config.flags)?;

    let cx = AssemblyContext {
        store: &store,
        results: &results,
        hierarchy: &hierarchy,
        flags: &flags,
        scenario: &config.flags,
        workers,
        restriction_threshold: config.restriction_threshold,
    };
    let model = assemble(&cx)?;
    Ok(AssembledScenario { store, flags, model })
}

/// Run one calculation, surfacing the first error.
pub fn try_calculate_scenario(config: &RunConfig) -> EmodResult<RunSummary> {
    let started = Instant::now();
    let backend = backend_for(&config.solver)?;
    let AssembledScenario { flags, model, .. } = assemble_scenario(config)?;

    let solution = backend.solve(
        &model,
        &SolverConfig {
            relax_integers: config.relax_integers,
            ..SolverConfig::default()
        },
    )?;
    let solved_at = Utc::now();

    let mut summary = RunSummary {
        status: solution.status,
        objective: solution.objective,
        variables: model.num_variables(),
        constraints: model.num_constraints(),
        flags,
        persisted: Vec::new(),
        results_dir: None,
        solved_at,
        elapsed_ms: 0.0,
    };

    if solution.status.is_optimal() {
        let tables = result_tables(config, &model, &solution, solved_at);
        if !tables.is_empty() {
            let mut writer = CsvResultWriter::for_scenario(&config.scenario)?;
            persist_tables(&mut writer, &tables)?;
            summary.persisted = tables.into_iter().map(|table| table.family).collect();
            summary.results_dir = Some(writer.dir().to_path_buf());
        }
    } else {
        warn!(status = %solution.status, "no optimal solution; results not persisted");
    }

    summary.elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    info!(
        status = %summary.status,
        objective = ?summary.objective,
        persisted = summary.persisted.len(),
        elapsed_ms = summary.elapsed_ms,
        "scenario finished"
    );
    Ok(summary)
}

/// Run one calculation and report only its status. Errors and panics are
/// logged and reported as [`SolveStatus::Error`].
pub fn calculate_scenario(config: &RunConfig) -> SolveStatus {
    match catch_unwind(AssertUnwindSafe(|| try_calculate_scenario(config))) {
        Ok(Ok(summary)) => summary.status,
        Ok(Err(err)) => {
            error!(scenario = %config.scenario.display(), error = %err, "calculation failed");
            SolveStatus::Error
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            let err = EmodError::Other(format!("calculation panicked: {}", message));
            error!(scenario = %config.scenario.display(), error = %err, "calculation failed");
            SolveStatus::Error
        }
    }
}

/// Result tables for every persisted family present in the model.
fn result_tables(
    config: &RunConfig,
    model: &Model,
    solution: &Solution,
    solved_at: DateTime<Utc>,
) -> Vec<ResultTable> {
    let mut tables = Vec::with_capacity(config.flags.persist.len());
    for name in &config.flags.persist {
        let Some(family) = model.family(name) else {
            warn!(family = %name, "persisted family is not part of the model");
            continue;
        };
        let rows: Vec<_> = solution
            .family_values(model, name)
            .into_iter()
            .filter(|(_, value)| config.flags.report_zeros || *value != 0.0)
            .collect();
        let columns = family
            .spec()
            .columns
            .iter()
            .map(|column| column.to_string())
            .collect();
        tables.push(ResultTable::new(name.clone(), columns, rows, solved_at));
    }
    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use emod_io::{read_result_table, write_scenario};

    fn write_store(dir: &std::path::Path) -> PathBuf {
        let store = FactStore::builder()
            .set(Dimension::Region, ["R1"])
            .set(Dimension::Technology, ["T1"])
            .set(Dimension::Fuel, ["ELC"])
            .set(Dimension::Mode, ["1"])
            .set(Dimension::Timeslice, ["ALLDAY"])
            .set(Dimension::Year, ["2020"])
            .param("YearSplit", &["ALLDAY", "2020"], 1.0)
            .param("OutputActivityRatio", &["R1", "T1", "ELC", "1", "2020"], 1.0)
            .param("CapacityToActivityUnit", &["R1", "T1"], 1.0)
            .param("SpecifiedAnnualDemand", &["R1", "ELC", "2020"], 4.0)
            .param("SpecifiedDemandProfile", &["R1", "ELC", "ALLDAY", "2020"], 1.0)
            .param("CapitalCost", &["R1", "T1", "2020"], 10.0)
            .build()
            .unwrap();
        let path = dir.join("scenario");
        write_scenario(&store, &path).unwrap();
        path
    }

    #[test]
    fn missing_scenario_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new(dir.path().join("absent"));
        assert!(try_calculate_scenario(&config).is_err());
        assert_eq!(calculate_scenario(&config), SolveStatus::Error);
    }

    #[test]
    fn unknown_solver_fails_before_opening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::new(write_store(dir.path()));
        config.solver = "simplex9000".into();
        let err = try_calculate_scenario(&config).unwrap_err();
        assert!(matches!(err, EmodError::Config(_)));
    }

    #[test]
    fn optimal_run_persists_requested_families() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new(write_store(dir.path())).with_persist(["new_capacity"]);
        let summary = try_calculate_scenario(&config).unwrap();
        assert_eq!(summary.status, SolveStatus::Optimal);
        assert_eq!(summary.persisted, vec!["new_capacity".to_string()]);

        let results = summary.results_dir.as_deref().unwrap();
        let table = read_result_table(results, "new_capacity").unwrap();
        assert_eq!(table.columns, vec!["r", "t", "y"]);
        assert_eq!(table.rows.len(), 1);
        assert!((table.rows[0].1 - 4.0).abs() < 1e-3);
    }
}

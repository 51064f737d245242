use anyhow::{Context, Result};
use emod_algo::{try_calculate_scenario, RunSummary};
use emod_cli::cli::SolveArgs;
use emod_cli::manifest::record_manifest;
use emod_core::RunConfig;
use tracing::{info, warn};

use super::util::{parse_list, parse_workers};

/// Configuration file values with command-line overrides applied.
pub fn build_config(args: &SolveArgs) -> Result<RunConfig> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("loading run configuration {}", path.display()))?,
        None => RunConfig::default(),
    };
    config.scenario = args.scenario.clone();
    if let Some(vars) = &args.vars {
        config.flags.persist = parse_list(vars).into_iter().collect();
    }
    if let Some(workers) = &args.workers {
        config.workers = parse_workers(workers)?;
    }
    if args.no_restrict {
        config.flags.restrict_vars = false;
    }
    if args.report_zeros {
        config.flags.report_zeros = true;
    }
    if args.binary_transmission {
        config.flags.continuous_transmission = false;
    }
    if args.continuous_transmission {
        config.flags.continuous_transmission = true;
    }
    if args.no_nodal {
        config.flags.nodal = false;
    }
    if let Some(solver) = &args.solver {
        config.solver = solver.clone();
    }
    if args.relax_integers {
        config.relax_integers = true;
    }
    config.validate()?;
    Ok(config)
}

pub fn handle(args: &SolveArgs) -> Result<RunSummary> {
    let config = build_config(args)?;
    info!(
        scenario = %config.scenario.display(),
        solver = %config.solver,
        persist = config.flags.persist.len(),
        "solving scenario"
    );
    let summary = try_calculate_scenario(&config)
        .with_context(|| format!("calculating scenario {}", config.scenario.display()))?;

    if let Some(dir) = &summary.results_dir {
        let params = [
            ("scenario", config.scenario.display().to_string()),
            ("workers", config.workers.to_string()),
            ("solver", config.solver.clone()),
            ("restrict_vars", config.flags.restrict_vars.to_string()),
            ("nodal", config.flags.nodal.to_string()),
        ];
        match record_manifest(
            dir,
            "solve",
            &summary.status.to_string(),
            summary.objective,
            &summary.persisted,
            &params,
        ) {
            Ok(path) => info!(manifest = %path.display(), "recorded run manifest"),
            Err(err) => warn!(error = %err, "could not record run manifest"),
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("Status: {}", summary.status);
    if let Some(objective) = summary.objective {
        println!("Objective: {objective:.6}");
    }
    println!(
        "Model: {} variables, {} constraints",
        summary.variables, summary.constraints
    );
    if summary.persisted.is_empty() {
        println!("Persisted: none");
    } else {
        println!("Persisted: {}", summary.persisted.join(", "));
    }
    if let Some(dir) = &summary.results_dir {
        println!("Results: {}", dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emod_cli::cli::{Cli, Commands};
    use clap::Parser;

    fn args(extra: &[&str]) -> SolveArgs {
        let mut argv = vec!["emod", "solve", "scen"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Solve(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = build_config(&args(&[
            "--vars",
            "trade",
            "--workers",
            "2",
            "--no-restrict",
            "--continuous-transmission",
            "--no-nodal",
        ]))
        .unwrap();
        assert_eq!(config.workers, 2);
        assert!(config.flags.persists("trade"));
        assert!(!config.flags.persists("new_capacity"));
        assert!(!config.flags.restrict_vars);
        assert!(config.flags.continuous_transmission);
        assert!(!config.flags.nodal);
    }

    #[test]
    fn config_file_is_the_base_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emod.toml");
        std::fs::write(&path, "workers = 6\nreport_zeros = true\nnodal = false\n").unwrap();
        let argv = ["--config", path.to_str().unwrap(), "--workers", "3"];
        let config = build_config(&args(&argv)).unwrap();
        assert_eq!(config.workers, 3);
        assert!(config.flags.report_zeros);
        assert!(!config.flags.nodal);
        assert_eq!(config.scenario, std::path::PathBuf::from("scen"));
    }
}

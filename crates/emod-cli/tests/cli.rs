use assert_cmd::Command;
use emod_core::Dimension;
use emod_io::{write_scenario, FactStore};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_small_scenario(dir: &Path) -> PathBuf {
    let store = FactStore::builder()
        .set(Dimension::Region, ["R1"])
        .set(Dimension::Technology, ["GAS"])
        .set(Dimension::Fuel, ["ELC"])
        .set(Dimension::Mode, ["1"])
        .set(Dimension::Timeslice, ["ALLDAY"])
        .set(Dimension::Year, ["2020"])
        .param("YearSplit", &["ALLDAY", "2020"], 1.0)
        .param("OutputActivityRatio", &["R1", "GAS", "ELC", "1", "2020"], 1.0)
        .param("SpecifiedAnnualDemand", &["R1", "ELC", "2020"], 5.0)
        .param("SpecifiedDemandProfile", &["R1", "ELC", "ALLDAY", "2020"], 1.0)
        .param("CapitalCost", &["R1", "GAS", "2020"], 20.0)
        .build()
        .unwrap();
    let path = dir.join("small");
    write_scenario(&store, &path).unwrap();
    path
}

#[test]
fn emod_inspect_lists_tables() {
    let tmp = tempdir().unwrap();
    let scenario = write_small_scenario(tmp.path());
    Command::cargo_bin("emod")
        .unwrap()
        .args(["inspect", scenario.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("params/OutputActivityRatio"))
        .stdout(predicate::str::contains("sets/REGION"));
}

#[test]
fn emod_flags_prints_json() {
    let tmp = tempdir().unwrap();
    let scenario = write_small_scenario(tmp.path());
    Command::cargo_bin("emod")
        .unwrap()
        .args(["flags", scenario.to_str().unwrap(), "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"storage\": false"));
}

#[test]
fn emod_solve_persists_requested_families() {
    let tmp = tempdir().unwrap();
    let scenario = write_small_scenario(tmp.path());
    Command::cargo_bin("emod")
        .unwrap()
        .args([
            "solve",
            scenario.to_str().unwrap(),
            "--vars",
            "new_capacity,total_discounted_cost",
            "--workers",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: optimal"));

    let results = scenario.join("results");
    assert!(results.join("new_capacity.csv").exists());
    assert!(results.join("total_discounted_cost.csv").exists());
    let manifests = std::fs::read_dir(&results)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("run-"))
        .count();
    assert_eq!(manifests, 1);
}

#[test]
fn emod_solve_rejects_missing_scenario() {
    let tmp = tempdir().unwrap();
    Command::cargo_bin("emod")
        .unwrap()
        .args(["solve", tmp.path().join("nope").to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn emod_solve_help_lists_overrides() {
    Command::cargo_bin("emod")
        .unwrap()
        .args(["solve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-nodal"))
        .stdout(predicate::str::contains("--report-zeros"));
}

#[test]
fn emod_completions_register_the_binary_name() {
    Command::cargo_bin("emod")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_emod"))
        .stdout(predicate::str::contains("--report-zeros"));
}

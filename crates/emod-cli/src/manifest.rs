//! Run manifests: one JSON record per `emod solve`, written next to the
//! persisted result tables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub run_id: String,
    pub command: String,
    pub version: String,
    pub timestamp: String,
    pub status: String,
    pub objective: Option<f64>,
    pub outputs: Vec<String>,
    pub params: Vec<Param>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Write `run-<uuid>.json` into `dir` and return its path.
pub fn record_manifest(
    dir: &Path,
    command: &str,
    status: &str,
    objective: Option<f64>,
    outputs: &[String],
    params: &[(&str, String)],
) -> Result<PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    fs::create_dir_all(dir)?;
    let manifest = ManifestEntry {
        run_id: run_id.clone(),
        command: command.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        status: status.to_string(),
        objective,
        outputs: outputs.to_vec(),
        params: params
            .iter()
            .map(|(k, v)| Param {
                name: k.to_string(),
                value: v.clone(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let path = dir.join(format!("run-{}.json", run_id));
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<ManifestEntry> {
    let json = fs::read_to_string(path)?;
    let manifest = serde_json::from_str(&json)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = record_manifest(
            dir.path(),
            "solve",
            "optimal",
            Some(12.5),
            &["new_capacity".to_string()],
            &[("workers", "4".to_string())],
        )
        .unwrap();
        let manifest = read_manifest(&path).unwrap();
        assert_eq!(manifest.status, "optimal");
        assert_eq!(manifest.objective, Some(12.5));
        assert_eq!(manifest.params[0].name, "workers");
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("run-"));
    }
}

//! Scenario directory writer with atomic commit.
//!
//! Writes a [`FactStore`] back out in the directory layout read by
//! [`FactStore::open`]:
//! - `sets/<SET>.csv`, `params/<Param>.csv`, record tables
//! - SHA256 checksums and manifest for integrity
//! - Atomic writes via temp directory + rename

use anyhow::{Context, Result};
use emod_core::Dimension;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalogue::param_def;
use crate::manifest::{compute_sha256, StoreManifest, TableInfo, MANIFEST_FILE};
use crate::store::{
    FactStore, NODES_FILE, PARAMS_DIR, SETS_DIR, TIMESLICE_GROUPS_FILE, TRANSMISSION_LINES_FILE,
};

/// Scenario directory writer with atomic write guarantees
pub struct ScenarioWriter {
    /// Temporary directory for intermediate writes
    temp_dir: PathBuf,
    /// Final output directory path
    final_dir: PathBuf,
}

impl ScenarioWriter {
    /// Create a new writer for the given output directory
    pub fn new(output_path: impl AsRef<Path>) -> Result<Self> {
        let final_dir = output_path.as_ref().to_path_buf();
        let temp_dir = final_dir.with_extension("tmp");

        // Leftover from a crashed previous write
        if temp_dir.exists() {
            fs::remove_dir_all(&temp_dir).with_context(|| {
                format!("cleaning up stale temp directory: {}", temp_dir.display())
            })?;
        }

        fs::create_dir_all(temp_dir.join(SETS_DIR))
            .with_context(|| format!("creating temp directory: {}", temp_dir.display()))?;
        fs::create_dir_all(temp_dir.join(PARAMS_DIR))
            .with_context(|| format!("creating temp directory: {}", temp_dir.display()))?;

        Ok(Self {
            temp_dir,
            final_dir,
        })
    }

    /// Write the scenario and commit it atomically.
    pub fn write_store(&self, store: &FactStore) -> Result<()> {
        let result = self.write_tables(store).and_then(|manifest| {
            self.write_manifest(&manifest).context("writing manifest")?;
            self.commit().context("atomic commit")
        });
        if result.is_err() {
            // Keep the original failure even if cleanup fails too
            let _ = self.cleanup();
        }
        result
    }

    fn write_tables(&self, store: &FactStore) -> Result<StoreManifest> {
        let mut manifest = StoreManifest::new(env!("CARGO_PKG_VERSION").to_string());

        for dim in Dimension::ALL {
            let name = format!("{}/{}.csv", SETS_DIR, dim.set_name());
            match dim {
                Dimension::Node | Dimension::TransmissionLine => continue,
                Dimension::TimeGroup1 | Dimension::TimeGroup2 => {
                    let groups = if dim == Dimension::TimeGroup1 {
                        store.time_groups1()
                    } else {
                        store.time_groups2()
                    };
                    if !groups.is_empty() {
                        self.write_records(&name, groups, &mut manifest)?;
                    }
                }
                _ => {
                    let members = store.members(dim);
                    if members.is_empty() {
                        continue;
                    }
                    let rows: Vec<Vec<String>> =
                        members.iter().map(|member| vec![member.clone()]).collect();
                    self.write_csv(&name, &["id".to_string()], rows, &mut manifest)?;
                }
            }
        }

        for param in store.params() {
            if let (Some(def), Some(default)) = (param_def(param.name()), param.default_value()) {
                if def.default != Some(default) {
                    manifest.defaults.insert(param.name().to_string(), default);
                }
            }
            if param.is_empty() {
                continue;
            }
            let Some(def) = param_def(param.name()) else {
                continue;
            };
            let mut header = def.columns();
            header.push("value".to_string());
            let rows: Vec<Vec<String>> = param
                .sorted_rows()
                .into_iter()
                .map(|(row_key, value)| {
                    let mut fields = row_key.clone();
                    fields.push(value.to_string());
                    fields
                })
                .collect();
            let name = format!("{}/{}.csv", PARAMS_DIR, param.name());
            self.write_csv(&name, &header, rows, &mut manifest)?;
        }

        if !store.timeslice_groups().is_empty() {
            self.write_records(TIMESLICE_GROUPS_FILE, store.timeslice_groups(), &mut manifest)?;
        }
        if !store.nodes().is_empty() {
            self.write_records(NODES_FILE, store.nodes(), &mut manifest)?;
        }
        if !store.transmission_lines().is_empty() {
            self.write_records(
                TRANSMISSION_LINES_FILE,
                store.transmission_lines(),
                &mut manifest,
            )?;
        }

        Ok(manifest)
    }

    fn write_csv(
        &self,
        name: &str,
        header: &[String],
        rows: Vec<Vec<String>>,
        manifest: &mut StoreManifest,
    ) -> Result<()> {
        let path = self.temp_dir.join(name);
        let row_count = rows.len() as u64;
        {
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("creating table file {}", path.display()))?;
            writer.write_record(header)?;
            for row in rows {
                writer.write_record(&row)?;
            }
            writer
                .flush()
                .with_context(|| format!("writing table {}", name))?;
        }
        self.register(name, &path, row_count, manifest)
    }

    fn write_records<T: serde::Serialize>(
        &self,
        name: &str,
        records: &[T],
        manifest: &mut StoreManifest,
    ) -> Result<()> {
        let path = self.temp_dir.join(name);
        {
            let mut writer = csv::Writer::from_path(&path)
                .with_context(|| format!("creating table file {}", path.display()))?;
            for record in records {
                writer.serialize(record)?;
            }
            writer
                .flush()
                .with_context(|| format!("writing table {}", name))?;
        }
        self.register(name, &path, records.len() as u64, manifest)
    }

    fn register(
        &self,
        name: &str,
        path: &Path,
        row_count: u64,
        manifest: &mut StoreManifest,
    ) -> Result<()> {
        let sha256 = compute_sha256(path)?;
        manifest.add_table(name, TableInfo { sha256, row_count });
        Ok(())
    }

    /// Write manifest.json to temp directory
    fn write_manifest(&self, manifest: &StoreManifest) -> Result<()> {
        let manifest_path = self.temp_dir.join(MANIFEST_FILE);
        let json =
            serde_json::to_string_pretty(manifest).context("serializing manifest to JSON")?;

        fs::write(&manifest_path, json)
            .with_context(|| format!("writing manifest: {}", manifest_path.display()))?;

        Ok(())
    }

    /// Atomically commit writes by renaming temp directory to final location
    fn commit(&self) -> Result<()> {
        if self.final_dir.exists() {
            fs::remove_dir_all(&self.final_dir).with_context(|| {
                format!(
                    "removing existing output directory: {}",
                    self.final_dir.display()
                )
            })?;
        }

        // Atomic rename (POSIX guarantees atomicity on same filesystem)
        fs::rename(&self.temp_dir, &self.final_dir).with_context(|| {
            format!(
                "atomic rename: {} -> {}",
                self.temp_dir.display(),
                self.final_dir.display()
            )
        })?;

        Ok(())
    }

    /// Clean up temp directory on failure
    pub fn cleanup(&self) -> Result<()> {
        if self.temp_dir.exists() {
            fs::remove_dir_all(&self.temp_dir).with_context(|| {
                format!("cleaning up temp directory: {}", self.temp_dir.display())
            })?;
        }
        Ok(())
    }

    pub fn final_dir(&self) -> &Path {
        &self.final_dir
    }
}

/// Write `store` to `path` as a scenario directory.
pub fn write_scenario(store: &FactStore, path: impl AsRef<Path>) -> Result<()> {
    ScenarioWriter::new(path)?.write_store(store)
}

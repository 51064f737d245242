//! Relational fact store backed by a scenario directory of CSV tables.
//!
//! Opening a directory:
//! - validates `manifest.json` (schema version, checksums)
//! - loads every dimension set and parameter table
//! - loads the time-group, node and transmission-line records
//!
//! The loaded store is immutable; every accessor hands out shared references.

use anyhow::{bail, Context, Result};
use emod_core::{key, Dimension, DimensionSet, EmodError, EmodResult, Key, ParamTable, Sets};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::catalogue::{param_def, PARAMETERS};
use crate::manifest::{Compatibility, StoreManifest, MANIFEST_FILE};

pub const SETS_DIR: &str = "sets";
pub const PARAMS_DIR: &str = "params";
pub const TIMESLICE_GROUPS_FILE: &str = "timeslice_groups.csv";
pub const NODES_FILE: &str = "nodes.csv";
pub const TRANSMISSION_LINES_FILE: &str = "transmission_lines.csv";

/// A group-1 or group-2 time period with its order and multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeGroup {
    pub id: String,
    pub order: u32,
    pub multiplier: f64,
}

/// Placement of one timeslice in the time hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesliceGroup {
    pub l: String,
    pub tg1: String,
    pub tg2: String,
    /// Position of the timeslice within its group-2 period
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    /// Region the node belongs to
    pub r: String,
}

/// A transmission line between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransmissionLineRecord {
    pub id: String,
    pub n1: String,
    pub n2: String,
    pub f: String,
    /// 1 = DC power flow, 2 = DC power flow with disjunctive relaxation, 3 = pipeline
    pub kind: u8,
    #[serde(default)]
    pub max_flow: Option<f64>,
    #[serde(default)]
    pub reactance: Option<f64>,
    /// Year the line entered service; candidate lines have none
    #[serde(default)]
    pub y_construction: Option<i32>,
    #[serde(default)]
    pub capital_cost: f64,
    #[serde(default)]
    pub fixed_cost: f64,
    #[serde(default = "one_year")]
    pub operational_life: u32,
    #[serde(default = "unit_efficiency")]
    pub efficiency: f64,
}

fn one_year() -> u32 {
    1
}

fn unit_efficiency() -> f64 {
    1.0
}

impl TransmissionLineRecord {
    pub fn new(id: &str, n1: &str, n2: &str, f: &str, kind: u8) -> Self {
        Self {
            id: id.to_string(),
            n1: n1.to_string(),
            n2: n2.to_string(),
            f: f.to_string(),
            kind,
            max_flow: None,
            reactance: None,
            y_construction: None,
            capital_cost: 0.0,
            fixed_cost: 0.0,
            operational_life: 1,
            efficiency: 1.0,
        }
    }

    /// Whether flows on the line follow DC power flow physics.
    pub fn uses_power_flow(&self) -> bool {
        matches!(self.kind, 1 | 2)
    }

    /// Lines without a construction year are build candidates.
    pub fn is_candidate(&self) -> bool {
        self.y_construction.is_none()
    }
}

/// Immutable scenario facts: dimension sets, parameter tables and records.
#[derive(Debug, Clone)]
pub struct FactStore {
    base_path: Option<PathBuf>,
    manifest: Option<StoreManifest>,
    sets: Sets,
    params: BTreeMap<String, ParamTable>,
    time_groups1: Vec<TimeGroup>,
    time_groups2: Vec<TimeGroup>,
    timeslice_groups: Vec<TimesliceGroup>,
    nodes: Vec<NodeRecord>,
    transmission_lines: Vec<TransmissionLineRecord>,
}

impl FactStore {
    pub fn builder() -> FactStoreBuilder {
        FactStoreBuilder::default()
    }

    /// Open and validate a scenario directory.
    pub fn open(path: impl AsRef<Path>) -> EmodResult<Self> {
        let base_path = path.as_ref().to_path_buf();
        let store = Self::load(&base_path)
            .map_err(|err| EmodError::Input(format!("{:#}", err)))?;
        info!(
            path = %base_path.display(),
            parameters = store.params.values().filter(|p| !p.is_empty()).count(),
            "opened scenario"
        );
        Ok(store)
    }

    fn load(base_path: &Path) -> Result<Self> {
        if !base_path.is_dir() {
            bail!(
                "scenario directory not found or is not a directory: {}",
                base_path.display()
            );
        }

        let manifest = load_manifest(base_path).context("loading manifest.json")?;
        match manifest
            .check_compatibility()
            .context("checking schema compatibility")?
        {
            Compatibility::NeedsMigration => warn!(
                schema_version = %manifest.schema_version,
                "scenario schema is older than the current version; migrations would apply"
            ),
            Compatibility::Current => {}
        }
        manifest
            .validate_checksums(base_path)
            .context("validating file checksums")?;

        let mut builder = FactStoreBuilder::default();

        for dim in Dimension::ALL {
            if matches!(
                dim,
                Dimension::Node
                    | Dimension::TransmissionLine
                    | Dimension::TimeGroup1
                    | Dimension::TimeGroup2
            ) {
                continue;
            }
            let path = base_path.join(SETS_DIR).join(format!("{}.csv", dim.set_name()));
            if path.exists() {
                let members = read_set_file(&path)
                    .with_context(|| format!("reading set {}", path.display()))?;
                builder = builder.set(dim, members);
            }
        }

        for (dim, target) in [
            (Dimension::TimeGroup1, &mut builder.time_groups1),
            (Dimension::TimeGroup2, &mut builder.time_groups2),
        ] {
            let path = base_path.join(SETS_DIR).join(format!("{}.csv", dim.set_name()));
            if path.exists() {
                *target = read_records(&path)
                    .with_context(|| format!("reading set {}", path.display()))?;
            }
        }

        let params_dir = base_path.join(PARAMS_DIR);
        if params_dir.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(&params_dir)
                .with_context(|| format!("listing {}", params_dir.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.extension().is_some_and(|ext| ext == "csv"))
                .collect();
            entries.sort();
            for path in entries {
                let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let Some(def) = param_def(name) else {
                    warn!(table = name, "ignoring unknown parameter table");
                    continue;
                };
                let rows = read_param_file(&path, &def.columns())
                    .with_context(|| format!("reading parameter {}", path.display()))?;
                builder.params.insert(def.name.to_string(), rows);
            }
        }

        let path = base_path.join(TIMESLICE_GROUPS_FILE);
        if path.exists() {
            builder.timeslice_groups = read_records(&path)
                .with_context(|| format!("reading {}", path.display()))?;
        }
        let path = base_path.join(NODES_FILE);
        if path.exists() {
            builder.nodes =
                read_records(&path).with_context(|| format!("reading {}", path.display()))?;
        }
        let path = base_path.join(TRANSMISSION_LINES_FILE);
        if path.exists() {
            builder.transmission_lines =
                read_records(&path).with_context(|| format!("reading {}", path.display()))?;
        }

        builder.defaults = manifest.defaults.clone();

        let mut store = builder.build().map_err(|err| anyhow::anyhow!(err))?;
        store.base_path = Some(base_path.to_path_buf());
        store.manifest = Some(manifest);
        Ok(store)
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    pub fn manifest(&self) -> Option<&StoreManifest> {
        self.manifest.as_ref()
    }

    pub fn sets(&self) -> &Sets {
        &self.sets
    }

    pub fn members(&self, dim: Dimension) -> &[String] {
        self.sets.members(dim)
    }

    /// A catalogued parameter table; unknown names are an input error.
    pub fn param(&self, name: &str) -> EmodResult<&ParamTable> {
        self.params
            .get(name)
            .ok_or_else(|| EmodError::Input(format!("unknown parameter table '{}'", name)))
    }

    pub fn params(&self) -> impl Iterator<Item = &ParamTable> {
        self.params.values()
    }

    pub fn time_groups1(&self) -> &[TimeGroup] {
        &self.time_groups1
    }

    pub fn time_groups2(&self) -> &[TimeGroup] {
        &self.time_groups2
    }

    pub fn timeslice_groups(&self) -> &[TimesliceGroup] {
        &self.timeslice_groups
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn transmission_lines(&self) -> &[TransmissionLineRecord] {
        &self.transmission_lines
    }

    /// Table name and explicit row count for every populated table.
    pub fn inventory(&self) -> Vec<(String, usize)> {
        let mut tables: Vec<(String, usize)> = Dimension::ALL
            .iter()
            .filter(|dim| !self.sets.members(**dim).is_empty())
            .map(|dim| {
                (
                    format!("{}/{}", SETS_DIR, dim.set_name()),
                    self.sets.members(*dim).len(),
                )
            })
            .collect();
        tables.extend(
            self.params
                .values()
                .filter(|param| !param.is_empty())
                .map(|param| (format!("{}/{}", PARAMS_DIR, param.name()), param.len())),
        );
        for (name, len) in [
            (TIMESLICE_GROUPS_FILE, self.timeslice_groups.len()),
            (NODES_FILE, self.nodes.len()),
            (TRANSMISSION_LINES_FILE, self.transmission_lines.len()),
        ] {
            if len > 0 {
                tables.push((name.trim_end_matches(".csv").to_string(), len));
            }
        }
        tables
    }
}

fn load_manifest(base_path: &Path) -> Result<StoreManifest> {
    let manifest_path = base_path.join(MANIFEST_FILE);

    if !manifest_path.exists() {
        bail!(
            "{} not found in {}\n\
             This directory may be incomplete or corrupted (incomplete write)",
            MANIFEST_FILE,
            base_path.display()
        );
    }

    let file = File::open(&manifest_path)
        .with_context(|| format!("opening manifest: {}", manifest_path.display()))?;

    serde_json::from_reader(file).context("parsing manifest.json")
}

fn column_index(headers: &csv::StringRecord, column: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|header| header.trim() == column)
        .with_context(|| format!("column '{}' missing in {}", column, path.display()))
}

fn read_set_file(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let id = column_index(reader.headers()?, "id", path)?;
    let mut members = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(value) = record.get(id) {
            members.push(value.trim().to_string());
        }
    }
    Ok(members)
}

fn read_param_file(path: &Path, columns: &[String]) -> Result<Vec<(Key, f64)>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let key_idx = columns
        .iter()
        .map(|column| column_index(&headers, column, path))
        .collect::<Result<Vec<_>>>()?;
    let value_idx = column_index(&headers, "value", path)?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let parts: Vec<&str> = key_idx
            .iter()
            .map(|idx| record.get(*idx).unwrap_or_default().trim())
            .collect();
        let raw = record.get(value_idx).unwrap_or_default().trim();
        let value: f64 = raw
            .parse()
            .with_context(|| format!("row {}: value '{}' is not a number", line + 1, raw))?;
        rows.push((key(&parts), value));
    }
    Ok(rows)
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

/// Assembles a [`FactStore`] from in-memory facts; also the final step of
/// [`FactStore::open`].
#[derive(Debug, Default, Clone)]
pub struct FactStoreBuilder {
    sets: BTreeMap<Dimension, Vec<String>>,
    params: BTreeMap<String, Vec<(Key, f64)>>,
    defaults: BTreeMap<String, f64>,
    time_groups1: Vec<TimeGroup>,
    time_groups2: Vec<TimeGroup>,
    timeslice_groups: Vec<TimesliceGroup>,
    nodes: Vec<NodeRecord>,
    transmission_lines: Vec<TransmissionLineRecord>,
}

impl FactStoreBuilder {
    pub fn set<I, S>(mut self, dim: Dimension, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sets
            .entry(dim)
            .or_default()
            .extend(members.into_iter().map(Into::into));
        self
    }

    /// Add one explicit parameter row.
    pub fn param<S: AsRef<str>>(mut self, name: &str, key_parts: &[S], value: f64) -> Self {
        self.params
            .entry(name.to_string())
            .or_default()
            .push((key(key_parts), value));
        self
    }

    /// Override the catalogue default of a parameter.
    pub fn default_value(mut self, name: &str, value: f64) -> Self {
        self.defaults.insert(name.to_string(), value);
        self
    }

    pub fn time_group1(mut self, id: &str, order: u32, multiplier: f64) -> Self {
        self.time_groups1.push(TimeGroup {
            id: id.to_string(),
            order,
            multiplier,
        });
        self
    }

    pub fn time_group2(mut self, id: &str, order: u32, multiplier: f64) -> Self {
        self.time_groups2.push(TimeGroup {
            id: id.to_string(),
            order,
            multiplier,
        });
        self
    }

    pub fn timeslice_group(mut self, l: &str, tg1: &str, tg2: &str, order: u32) -> Self {
        self.timeslice_groups.push(TimesliceGroup {
            l: l.to_string(),
            tg1: tg1.to_string(),
            tg2: tg2.to_string(),
            order,
        });
        self
    }

    pub fn node(mut self, id: &str, region: &str) -> Self {
        self.nodes.push(NodeRecord {
            id: id.to_string(),
            r: region.to_string(),
        });
        self
    }

    pub fn transmission_line(mut self, line: TransmissionLineRecord) -> Self {
        self.transmission_lines.push(line);
        self
    }

    pub fn build(mut self) -> EmodResult<FactStore> {
        self.time_groups1.sort_by_key(|group| group.order);
        self.time_groups2.sort_by_key(|group| group.order);

        self.sets.insert(
            Dimension::TimeGroup1,
            self.time_groups1.iter().map(|g| g.id.clone()).collect(),
        );
        self.sets.insert(
            Dimension::TimeGroup2,
            self.time_groups2.iter().map(|g| g.id.clone()).collect(),
        );
        self.sets.insert(
            Dimension::Node,
            self.nodes.iter().map(|n| n.id.clone()).collect(),
        );
        self.sets.insert(
            Dimension::TransmissionLine,
            self.transmission_lines.iter().map(|l| l.id.clone()).collect(),
        );

        let mut sets = Sets::new();
        for (dim, members) in std::mem::take(&mut self.sets) {
            sets.insert(DimensionSet::new(dim, members)?);
        }

        let mut params = BTreeMap::new();
        for def in PARAMETERS {
            let default = self.defaults.get(def.name).copied().or(def.default);
            let mut table = ParamTable::new(def.name, def.dims.to_vec(), default);
            let mut skipped = 0usize;
            for (row_key, value) in self.params.remove(def.name).unwrap_or_default() {
                if row_key.len() != def.dims.len() {
                    return Err(EmodError::Input(format!(
                        "parameter {} expects {} key columns, got {}",
                        def.name,
                        def.dims.len(),
                        row_key.len()
                    )));
                }
                let known = def
                    .dims
                    .iter()
                    .zip(&row_key)
                    .all(|(dim, member)| sets.contains(*dim, member));
                if !known {
                    skipped += 1;
                    continue;
                }
                table.insert(row_key, value)?;
            }
            if skipped > 0 {
                warn!(
                    parameter = def.name,
                    skipped, "skipped rows referencing undeclared set members"
                );
            }
            debug!(parameter = def.name, rows = table.len(), "loaded parameter");
            params.insert(def.name.to_string(), table);
        }
        for name in self.params.keys() {
            warn!(table = %name, "ignoring unknown parameter table");
        }
        for name in self.defaults.keys() {
            if param_def(name).is_none() {
                warn!(parameter = %name, "ignoring default for unknown parameter");
            }
        }

        let mut seen_nodes: HashMap<&str, &str> = HashMap::new();
        for node in &self.nodes {
            if !sets.contains(Dimension::Region, &node.r) {
                return Err(EmodError::Input(format!(
                    "node {} references unknown region {}",
                    node.id, node.r
                )));
            }
            seen_nodes.insert(&node.id, &node.r);
        }
        for line in &self.transmission_lines {
            for endpoint in [&line.n1, &line.n2] {
                if !seen_nodes.contains_key(endpoint.as_str()) {
                    return Err(EmodError::Input(format!(
                        "transmission line {} references unknown node {}",
                        line.id, endpoint
                    )));
                }
            }
            if line.operational_life == 0 {
                return Err(EmodError::Input(format!(
                    "transmission line {} has zero operational life",
                    line.id
                )));
            }
        }

        Ok(FactStore {
            base_path: None,
            manifest: None,
            sets,
            params,
            time_groups1: self.time_groups1,
            time_groups2: self.time_groups2,
            timeslice_groups: self.timeslice_groups,
            nodes: self.nodes,
            transmission_lines: self.transmission_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store() -> FactStore {
        FactStore::builder()
            .set(Dimension::Region, ["R1"])
            .set(Dimension::Technology, ["T1", "T2"])
            .set(Dimension::Year, ["2021", "2020"])
            .param("CapitalCost", &["R1", "T1", "2020"], 100.0)
            .param("CapitalCost", &["R1", "T9", "2020"], 5.0)
            .default_value("DiscountRate", 0.1)
            .build()
            .unwrap()
    }

    #[test]
    fn builder_applies_catalogue_and_overridden_defaults() {
        let store = small_store();
        assert_eq!(store.param("DiscountRate").unwrap().get(&["R1"]), Some(0.1));
        assert_eq!(
            store.param("CapacityFactor").unwrap().get(&["R1", "T1", "L1", "2020"]),
            Some(1.0)
        );
        assert_eq!(store.param("TotalAnnualMaxCapacity").unwrap().get(&["R1", "T1", "2020"]), None);
    }

    #[test]
    fn rows_with_undeclared_members_are_skipped() {
        let store = small_store();
        let cost = store.param("CapitalCost").unwrap();
        assert_eq!(cost.len(), 1);
        assert_eq!(cost.explicit(&["R1", "T9", "2020"]), None);
    }

    #[test]
    fn unknown_parameter_is_an_input_error() {
        let err = small_store().param("Nope").unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn years_are_ordered() {
        let store = small_store();
        assert_eq!(store.members(Dimension::Year), &["2020", "2021"]);
    }

    #[test]
    fn line_with_unknown_node_is_rejected() {
        let err = FactStore::builder()
            .set(Dimension::Region, ["R1"])
            .node("N1", "R1")
            .transmission_line(TransmissionLineRecord::new("TR1", "N1", "N2", "ELC", 1))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("N2"));
    }

    #[test]
    fn time_groups_are_sorted_by_order() {
        let store = FactStore::builder()
            .time_group1("WINTER", 2, 1.0)
            .time_group1("SUMMER", 1, 1.0)
            .build()
            .unwrap();
        assert_eq!(store.members(Dimension::TimeGroup1), &["SUMMER", "WINTER"]);
    }

    #[test]
    fn open_missing_directory_fails_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let err = FactStore::open(dir.path().join("absent")).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn open_without_manifest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = FactStore::open(dir.path()).unwrap_err();
        assert!(err.to_string().contains("manifest.json"));
    }

    #[test]
    fn inventory_lists_populated_tables() {
        let inventory = small_store().inventory();
        assert!(inventory.contains(&("sets/REGION".to_string(), 1)));
        assert!(inventory.contains(&("params/CapitalCost".to_string(), 1)));
    }
}

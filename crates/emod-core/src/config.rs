//! Run configuration.
//!
//! One explicit [`RunConfig`] is built per calculation (from an optional
//! `emod.toml` plus command-line overrides) and handed by reference to every
//! component. Nothing reads configuration from ambient state.

use crate::error::{EmodError, EmodResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Default per-worker row threshold above which index restriction is partitioned.
pub const DEFAULT_RESTRICTION_THRESHOLD: usize = 10_000;

/// Scenario-scoped switches fixed for one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioFlags {
    /// Layer the nodal/transmission sub-model on top of the regional model
    pub nodal: bool,
    /// Restrict variable domains to combinations observed in the data
    pub restrict_vars: bool,
    /// Model transmission build decisions as continuous `[0, 1]` instead of binary
    pub continuous_transmission: bool,
    /// Persist zero-valued variable instances
    pub report_zeros: bool,
    /// Variable families written back after solve
    pub persist: BTreeSet<String>,
}

impl Default for ScenarioFlags {
    fn default() -> Self {
        Self {
            nodal: true,
            restrict_vars: true,
            continuous_transmission: false,
            report_zeros: false,
            persist: default_persist(),
        }
    }
}

impl ScenarioFlags {
    pub fn persists(&self, family: &str) -> bool {
        self.persist.contains(family)
    }
}

fn default_persist() -> BTreeSet<String> {
    ["new_capacity", "total_capacity_annual", "production_by_technology", "total_discounted_cost"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Everything one calculation needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Scenario directory
    pub scenario: PathBuf,
    /// Worker count for query execution and index restriction (0 = number of CPUs)
    pub workers: usize,
    /// Rows per worker above which index restriction is partitioned
    pub restriction_threshold: usize,
    /// Solver backend identifier
    pub solver: String,
    /// Relax integer/binary variables even when the backend supports them
    pub relax_integers: bool,
    #[serde(flatten)]
    pub flags: ScenarioFlags,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario: PathBuf::new(),
            workers: 1,
            restriction_threshold: DEFAULT_RESTRICTION_THRESHOLD,
            solver: "clarabel".to_string(),
            relax_integers: false,
            flags: ScenarioFlags::default(),
        }
    }
}

impl RunConfig {
    pub fn new(scenario: impl Into<PathBuf>) -> Self {
        Self {
            scenario: scenario.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(input: &str) -> EmodResult<Self> {
        let config: RunConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> EmodResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            EmodError::Config(format!("reading {}: {}", path.display(), err))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> EmodResult<()> {
        if self.restriction_threshold == 0 {
            return Err(EmodError::Config(
                "restriction_threshold must be positive".into(),
            ));
        }
        if self.solver.trim().is_empty() {
            return Err(EmodError::Config("solver must not be empty".into()));
        }
        Ok(())
    }

    pub fn with_persist<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.persist = families.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

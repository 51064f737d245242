//! # emod-io: scenario fact store and result persistence
//!
//! A scenario is a directory of CSV tables guarded by a `manifest.json`:
//!
//! ```text
//! <scenario>/
//!   manifest.json          schema version, table checksums, parameter defaults
//!   sets/<SET>.csv         column `id` (TSGROUP1/TSGROUP2 also `order`, `multiplier`)
//!   params/<Param>.csv     dimension columns + `value`
//!   timeslice_groups.csv   l, tg1, tg2, order
//!   nodes.csv              id, r
//!   transmission_lines.csv id, n1, n2, f, kind, ...
//!   results/               written after solve
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use emod_io::FactStore;
//!
//! fn main() -> emod_core::EmodResult<()> {
//!     let store = FactStore::open("scenarios/utopia")?;
//!     for (table, rows) in store.inventory() {
//!         println!("{table}: {rows}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`ScenarioWriter`] writes a store back out atomically (temp directory +
//! rename); [`CsvResultWriter`] persists solved families one file at a time.

pub mod catalogue;
pub mod manifest;
pub mod results;
pub mod store;
pub mod writer;

pub use catalogue::{param_def, ParamDef, PARAMETERS};
pub use manifest::{compute_sha256, Compatibility, StoreManifest, TableInfo, CURRENT_SCHEMA_VERSION};
pub use results::{
    persist_tables, read_result_table, CsvResultWriter, ResultSink, ResultTable, RESULTS_DIR,
};
pub use store::{
    FactStore, FactStoreBuilder, NodeRecord, TimeGroup, TimesliceGroup, TransmissionLineRecord,
};
pub use writer::{write_scenario, ScenarioWriter};

//! # emod-algo: model assembly engine
//!
//! Turns a scenario fact store into a solved linear program:
//!
//! | Phase | Module | Parallel |
//! |-------|--------|----------|
//! | Query execution | [`query`], [`queries`] | yes, one query per task |
//! | Flag resolution | [`flags`] | no |
//! | Time hierarchy | [`timeslice`] | no |
//! | Index restriction | [`restrict`] | yes, block-partitioned |
//! | Constraint assembly | [`assembly`], [`stream`] | no, single writer |
//! | Solve | [`solver`] | backend-defined |
//! | Persistence | [`scenario`] via `emod_io` | no |
//!
//! The two parallel phases never overlap: every query finishes before the
//! first domain is restricted. Workers only see shared read-only data and
//! return owned results.
//!
//! ## Example
//!
//! ```rust,no_run
//! use emod_algo::calculate_scenario;
//! use emod_core::RunConfig;
//!
//! let config = RunConfig::new("scenarios/utopia")
//!     .with_workers(0)
//!     .with_persist(["new_capacity", "total_discounted_cost"]);
//! let status = calculate_scenario(&config);
//! println!("{status}");
//! ```

pub mod assembly;
pub mod families;
pub mod flags;
pub mod pool;
pub mod queries;
pub mod query;
pub mod restrict;
pub mod scenario;
pub mod solver;
pub mod stream;
pub mod timeslice;

pub use assembly::{assemble, AssemblyContext};
pub use families::{family_spec, ALL_FAMILIES};
pub use flags::ModelFlags;
pub use pool::{build_pool, resolve_workers};
pub use queries::CATALOGUE;
pub use query::{execute_queries, NamedQuery, QueryResults};
pub use restrict::{restrict, restrict_blocks, restrict_rows, IndexLevels};
pub use scenario::{
    assemble_scenario, calculate_scenario, try_calculate_scenario, AssembledScenario, RunSummary,
};
pub use solver::{backend_for, GoodLpBackend, LpSolverKind};
pub use stream::stream_groups;
pub use timeslice::{Period, SlicePosition, StartCase, TimeHierarchy, IMPLICIT_GROUP};

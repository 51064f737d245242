//! # emod-core: data model for energy-system model assembly
//!
//! Provides the types every other emod crate builds on:
//!
//! - **Dimension sets** ([`DimensionSet`], [`Sets`]): named identifier
//!   collections (regions, technologies, time slices, ...), frozen after load.
//! - **Parameter fact tables** ([`ParamTable`]): sparse key → value maps with
//!   an optional default.
//! - **Query results** ([`Table`], [`Row`]): sorted key + payload rows
//!   produced by the query catalogue.
//! - **Symbolic model** ([`Model`], [`LinearExpr`], [`FamilySpec`]): variable
//!   families, linear constraints and the objective, independent of any solver.
//! - **Solver contract** ([`SolverBackend`], [`Solution`], [`SolveStatus`]).
//! - **Configuration** ([`RunConfig`], [`ScenarioFlags`]) and the unified
//!   [`EmodError`].
//!
//! ## Quick Start
//!
//! ```rust
//! use emod_core::*;
//!
//! let mut model = Model::new();
//! let spec = FamilySpec::continuous("new_capacity", &["r", "t", "y"]);
//! model.declare_family(spec, vec![key(&["R1", "T1", "2020"])]).unwrap();
//!
//! let x = model.var("new_capacity", &["R1", "T1", "2020"]).unwrap();
//! model.add_constraint(
//!     "max_capacity",
//!     key(&["R1", "T1", "2020"]),
//!     LinearExpr::from_term(x, 1.0),
//!     Relation::LessEq,
//!     10.0,
//! );
//! assert_eq!(model.constraint_count("max_capacity"), 1);
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod params;
pub mod sets;
pub mod solver;
pub mod table;

pub use config::{RunConfig, ScenarioFlags, DEFAULT_RESTRICTION_THRESHOLD};
pub use error::{EmodError, EmodResult};
pub use model::{
    Constraint, FamilySpec, LinearExpr, Model, Relation, VarId, VarKind, VariableDecl,
    VariableFamily,
};
pub use params::{key, Key, ParamTable};
pub use sets::{Dimension, DimensionSet, Sets};
pub use solver::{Solution, SolveStatus, SolverBackend, SolverConfig};
pub use table::{Row, Table};

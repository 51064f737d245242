//! Solver-interface contract.
//!
//! The assembly engine depends only on [`SolverBackend`]; one adapter per
//! supported engine implements it (see `emod_algo::solver`).

use crate::error::EmodResult;
use crate::model::{Model, VarId};
use crate::params::Key;
use serde::{Deserialize, Serialize};

/// Discrete outcome of a solve. Non-optimal outcomes are ordinary values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::Error => write!(f, "error"),
        }
    }
}

/// Configuration passed to backend solvers.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Relax integer and binary variables to their continuous bounds
    pub relax_integers: bool,
    /// Emit solver progress output
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            relax_integers: false,
            verbose: false,
        }
    }
}

/// Result of one solve: status plus a value per variable instance.
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolveStatus,
    pub objective: Option<f64>,
    values: Vec<f64>,
}

impl Solution {
    pub fn optimal(values: Vec<f64>, objective: f64) -> Self {
        Self {
            status: SolveStatus::Optimal,
            objective: Some(objective),
            values,
        }
    }

    pub fn without_values(status: SolveStatus) -> Self {
        Self {
            status,
            objective: None,
            values: Vec::new(),
        }
    }

    pub fn value(&self, var: VarId) -> Option<f64> {
        self.values.get(var.index()).copied()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Index tuples and values of one family, in declaration order.
    pub fn family_values(&self, model: &Model, family: &str) -> Vec<(Key, f64)> {
        let Some(declared) = model.family(family) else {
            return Vec::new();
        };
        declared
            .ids()
            .iter()
            .filter_map(|id| {
                let decl = model.variable(*id)?;
                let value = self.value(*id)?;
                Some((decl.key.clone(), value))
            })
            .collect()
    }
}

/// Implements the actual solving of a symbolic [`Model`].
pub trait SolverBackend: Send + Sync {
    /// Unique identifier (e.g., "clarabel", "highs")
    fn id(&self) -> &str;

    /// Whether integer and binary variables are honoured
    fn supports_integers(&self) -> bool;

    /// Solve the model, minimizing its objective
    fn solve(&self, model: &Model, config: &SolverConfig) -> EmodResult<Solution>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FamilySpec;
    use crate::params::key;

    #[test]
    fn test_traits_are_object_safe() {
        fn _accepts_backend(_b: &dyn SolverBackend) {}
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Box<dyn SolverBackend>>();
    }

    #[test]
    fn family_values_follow_declaration_order() {
        let mut model = Model::new();
        model
            .declare_family(
                FamilySpec::continuous("new_capacity", &["r", "t", "y"]),
                vec![key(&["R1", "T1", "2020"]), key(&["R1", "T1", "2021"])],
            )
            .unwrap();
        let solution = Solution::optimal(vec![1.5, 2.5], 4.0);
        let values = solution.family_values(&model, "new_capacity");
        assert_eq!(values.len(), 2);
        assert_eq!(values[1].0, key(&["R1", "T1", "2021"]));
        assert_eq!(values[1].1, 2.5);
        assert!(solution.family_values(&model, "absent").is_empty());
    }

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(SolveStatus::Infeasible.to_string(), "infeasible");
        assert!(SolveStatus::Optimal.is_optimal());
        assert!(!SolveStatus::Unbounded.is_optimal());
    }
}

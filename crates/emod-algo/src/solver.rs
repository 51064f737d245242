//! Solver adapter: translates a symbolic [`Model`] into a `good_lp` problem,
//! solves it and maps the outcome back onto variable instances.

use emod_core::{
    EmodError, EmodResult, Model, Relation, Solution, SolveStatus, SolverBackend, SolverConfig,
    VarKind,
};
use good_lp::solvers::clarabel::clarabel;
#[cfg(feature = "solver-highs")]
use good_lp::solvers::highs::highs;
use good_lp::{
    constraint, variable, variables, Constraint, Expression, ProblemVariables, ResolutionError,
    Solution as _, SolverModel, Variable,
};
use std::str::FromStr;
use tracing::{debug, info, warn};
use web_time::Instant;

/// Feasibility tolerance for constraints with no variable terms.
const CONSTANT_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LpSolverKind {
    #[default]
    Clarabel,
    #[cfg(feature = "solver-highs")]
    Highs,
}

impl LpSolverKind {
    pub fn available() -> &'static [&'static str] {
        AVAILABLE_LP_SOLVERS
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LpSolverKind::Clarabel => "clarabel",
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => "highs",
        }
    }

    /// Whether the engine honours integer and binary variables.
    pub fn supports_integers(&self) -> bool {
        match self {
            LpSolverKind::Clarabel => false,
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => true,
        }
    }
}

const AVAILABLE_LP_SOLVERS: &[&str] = &[
    "clarabel",
    #[cfg(feature = "solver-highs")]
    "highs",
];

fn unknown_solver_error(label: &str) -> EmodError {
    EmodError::Config(format!(
        "unknown lp solver '{}'; supported values: {}",
        label,
        LpSolverKind::available().join(", ")
    ))
}

impl FromStr for LpSolverKind {
    type Err = EmodError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "clarabel" => Ok(LpSolverKind::Clarabel),
            "highs" => {
                #[cfg(feature = "solver-highs")]
                {
                    Ok(LpSolverKind::Highs)
                }
                #[cfg(not(feature = "solver-highs"))]
                {
                    Err(unknown_solver_error(&normalized))
                }
            }
            other => Err(unknown_solver_error(other)),
        }
    }
}

/// [`SolverBackend`] over one `good_lp` engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoodLpBackend {
    kind: LpSolverKind,
}

impl GoodLpBackend {
    pub fn new(kind: LpSolverKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> LpSolverKind {
        self.kind
    }
}

/// Backend for a solver identifier from the run configuration.
pub fn backend_for(id: &str) -> EmodResult<Box<dyn SolverBackend>> {
    Ok(Box::new(GoodLpBackend::new(id.parse()?)))
}

/// Variables and constraints translated into `good_lp` terms.
struct Translated {
    vars: ProblemVariables,
    columns: Vec<Variable>,
    objective: Expression,
    constraints: Vec<Constraint>,
}

fn translate(model: &Model, relax: bool) -> Result<Translated, SolveStatus> {
    let mut vars = variables!();
    let mut columns = Vec::with_capacity(model.num_variables());
    for decl in model.variables() {
        let mut definition = variable();
        if decl.lower.is_finite() {
            definition = definition.min(decl.lower);
        }
        if decl.upper.is_finite() {
            definition = definition.max(decl.upper);
        }
        if !relax {
            match decl.kind {
                VarKind::Continuous => {}
                VarKind::Integer => definition = definition.integer(),
                VarKind::Binary => definition = definition.binary(),
            }
        }
        columns.push(vars.add(definition));
    }

    let linear = |terms: &[(emod_core::VarId, f64)]| -> Expression {
        let mut expr = Expression::with_capacity(terms.len());
        for (var, coefficient) in terms {
            expr += *coefficient * columns[var.index()];
        }
        expr
    };

    let objective = linear(model.objective().terms());
    let mut constraints = Vec::with_capacity(model.num_constraints());
    for c in model.constraints() {
        if c.lhs.is_empty() {
            if !c.is_satisfied(&[], CONSTANT_TOLERANCE) {
                warn!(
                    family = c.family,
                    key = ?c.key,
                    rhs = c.rhs,
                    "constant constraint cannot hold"
                );
                return Err(SolveStatus::Infeasible);
            }
            continue;
        }
        let lhs = linear(c.lhs.terms());
        let rhs = c.rhs;
        constraints.push(match c.relation {
            Relation::LessEq => constraint!(lhs <= rhs),
            Relation::GreaterEq => constraint!(lhs >= rhs),
            Relation::Equal => constraint!(lhs == rhs),
        });
    }
    Ok(Translated {
        vars,
        columns,
        objective,
        constraints,
    })
}

fn status_of(err: &ResolutionError) -> SolveStatus {
    match err {
        ResolutionError::Infeasible => SolveStatus::Infeasible,
        ResolutionError::Unbounded => SolveStatus::Unbounded,
        _ => SolveStatus::Error,
    }
}

fn finish<M>(
    mut problem: M,
    translated_constraints: Vec<Constraint>,
    columns: &[Variable],
    model: &Model,
) -> Solution
where
    M: SolverModel<Error = ResolutionError>,
{
    for c in translated_constraints {
        problem = problem.with(c);
    }
    match problem.solve() {
        Ok(solved) => {
            let values: Vec<f64> = columns.iter().map(|var| solved.value(*var)).collect();
            let objective = model.objective().evaluate(&values);
            Solution::optimal(values, objective)
        }
        Err(err) => {
            let status = status_of(&err);
            warn!(%status, error = %err, "solver did not reach an optimum");
            Solution::without_values(status)
        }
    }
}

impl SolverBackend for GoodLpBackend {
    fn id(&self) -> &str {
        self.kind.as_str()
    }

    fn supports_integers(&self) -> bool {
        self.kind.supports_integers()
    }

    fn solve(&self, model: &Model, config: &SolverConfig) -> EmodResult<Solution> {
        let started = Instant::now();
        let relax = config.relax_integers || !self.supports_integers();
        if relax && model.has_integer_variables() {
            let count = model
                .variables()
                .iter()
                .filter(|decl| decl.kind != VarKind::Continuous)
                .count();
            if config.relax_integers {
                info!(solver = self.id(), relaxed = count, "relaxing integer variables");
            } else {
                warn!(
                    solver = self.id(),
                    relaxed = count,
                    "solver has no integer support; solving the continuous relaxation"
                );
            }
        }

        if model.num_variables() == 0 {
            debug!("model has no variables; nothing to solve");
            let infeasible = model
                .constraints()
                .iter()
                .any(|c| !c.is_satisfied(&[], CONSTANT_TOLERANCE));
            return Ok(if infeasible {
                Solution::without_values(SolveStatus::Infeasible)
            } else {
                Solution::optimal(Vec::new(), 0.0)
            });
        }

        let translated = match translate(model, relax) {
            Ok(translated) => translated,
            Err(status) => return Ok(Solution::without_values(status)),
        };
        if config.verbose {
            info!(
                solver = self.id(),
                variables = translated.columns.len(),
                constraints = translated.constraints.len(),
                "handing model to solver"
            );
        }

        let Translated {
            vars,
            columns,
            objective,
            constraints,
        } = translated;
        let unsolved = vars.minimise(objective);
        let solution = match self.kind {
            LpSolverKind::Clarabel => {
                finish(unsolved.using(clarabel), constraints, &columns, model)
            }
            #[cfg(feature = "solver-highs")]
            LpSolverKind::Highs => finish(unsolved.using(highs), constraints, &columns, model),
        };
        info!(
            solver = self.id(),
            status = %solution.status,
            objective = ?solution.objective,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "solve finished"
        );
        Ok(solution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emod_core::{key, FamilySpec, LinearExpr};

    fn tiny_model() -> Model {
        // minimize x + 2y  s.t.  x + y >= 4,  y >= 1
        let mut model = Model::new();
        model
            .declare_family(
                FamilySpec::continuous("x", &["i"]),
                vec![key(&["a"]), key(&["b"])],
            )
            .unwrap();
        let x = model.var("x", &["a"]).unwrap();
        let y = model.var("x", &["b"]).unwrap();
        model.add_constraint(
            "cover",
            key(&["a"]),
            LinearExpr::from_term(x, 1.0).with_term(y, 1.0),
            Relation::GreaterEq,
            4.0,
        );
        let floor = LinearExpr::from_term(y, 1.0);
        model.add_constraint("floor", key(&["b"]), floor, Relation::GreaterEq, 1.0);
        model.set_objective(LinearExpr::from_term(x, 1.0).with_term(y, 2.0));
        model
    }

    #[test]
    fn parses_known_solvers() {
        assert_eq!("Clarabel".parse::<LpSolverKind>().unwrap(), LpSolverKind::Clarabel);
        assert!("simplex9000".parse::<LpSolverKind>().is_err());
        assert!(LpSolverKind::available().contains(&"clarabel"));
    }

    #[test]
    fn solves_a_small_lp() {
        let model = tiny_model();
        let solution = GoodLpBackend::default()
            .solve(&model, &SolverConfig::default())
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.objective.unwrap() - 5.0).abs() < 1e-4);
        let y = model.var("x", &["b"]).unwrap();
        assert!((solution.value(y).unwrap() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn infeasible_models_report_status() {
        let mut model = tiny_model();
        let x = model.var("x", &["a"]).unwrap();
        let cap = LinearExpr::from_term(x, 1.0);
        model.add_constraint("cap", key(&["a"]), cap, Relation::LessEq, -1.0);
        let solution = GoodLpBackend::default()
            .solve(&model, &SolverConfig::default())
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Infeasible);
        assert!(solution.values().is_empty());
    }

    #[test]
    fn violated_constant_constraint_is_infeasible() {
        let mut model = tiny_model();
        model.add_constraint("demand", key(&["z"]), LinearExpr::new(), Relation::GreaterEq, 10.0);
        let solution = GoodLpBackend::default()
            .solve(&model, &SolverConfig::default())
            .unwrap();
        assert_eq!(solution.status, SolveStatus::Infeasible);
    }

    #[test]
    fn clarabel_relaxes_integers() {
        let mut model = Model::new();
        model
            .declare_family(FamilySpec::binary("build", &["i"]), vec![key(&["a"])])
            .unwrap();
        let b = model.var("build", &["a"]).unwrap();
        let half = LinearExpr::from_term(b, 1.0);
        model.add_constraint("half", key(&["a"]), half, Relation::GreaterEq, 0.5);
        model.set_objective(LinearExpr::from_term(b, 1.0));
        let backend = GoodLpBackend::new(LpSolverKind::Clarabel);
        assert!(!backend.supports_integers());
        let solution = backend.solve(&model, &SolverConfig::default()).unwrap();
        assert_eq!(solution.status, SolveStatus::Optimal);
        assert!((solution.value(b).unwrap() - 0.5).abs() < 1e-4);
    }
}

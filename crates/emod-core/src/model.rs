//! Symbolic linear / mixed-integer model.
//!
//! The [`Model`] is the single mutable object of an assembly run. Variable
//! families are declared once, each instance addressed by its key tuple;
//! constraints are linear (in)equalities over those instances. The model is
//! solver-neutral: a [`crate::SolverBackend`] translates it for a concrete
//! engine.

use crate::error::{EmodError, EmodResult};
use crate::params::{key, Key};
use std::collections::{BTreeMap, HashMap};

/// Index of a variable instance inside a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Continuous,
    Integer,
    Binary,
}

/// Static description of a variable family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FamilySpec {
    pub name: &'static str,
    /// Result-table column names, one per key position
    pub columns: &'static [&'static str],
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

impl FamilySpec {
    /// Continuous, non-negative.
    pub const fn continuous(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            kind: VarKind::Continuous,
            lower: 0.0,
            upper: f64::INFINITY,
        }
    }

    /// Continuous with free sign.
    pub const fn free(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            kind: VarKind::Continuous,
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    pub const fn integer(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            kind: VarKind::Integer,
            lower: 0.0,
            upper: f64::INFINITY,
        }
    }

    pub const fn binary(name: &'static str, columns: &'static [&'static str]) -> Self {
        Self {
            name,
            columns,
            kind: VarKind::Binary,
            lower: 0.0,
            upper: 1.0,
        }
    }

    pub const fn bounded(self, lower: f64, upper: f64) -> Self {
        Self {
            lower,
            upper,
            ..self
        }
    }

    pub const fn with_kind(self, kind: VarKind) -> Self {
        Self { kind, ..self }
    }
}

/// One declared variable instance.
#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub family: usize,
    pub key: Key,
    pub kind: VarKind,
    pub lower: f64,
    pub upper: f64,
}

/// A declared family and the index of its instances.
#[derive(Debug, Clone)]
pub struct VariableFamily {
    spec: FamilySpec,
    index: HashMap<Key, VarId>,
    order: Vec<VarId>,
}

impl VariableFamily {
    pub fn spec(&self) -> &FamilySpec {
        &self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Instances in declaration order.
    pub fn ids(&self) -> &[VarId] {
        &self.order
    }

    pub fn get(&self, key: &Key) -> Option<VarId> {
        self.index.get(key).copied()
    }
}

/// Affine expression `Σ coef·var + constant`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn from_term(var: VarId, coefficient: f64) -> Self {
        Self {
            terms: vec![(var, coefficient)],
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        if coefficient != 0.0 {
            self.terms.push((var, coefficient));
        }
    }

    pub fn with_term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    /// `self += scale · other`
    pub fn add_scaled(&mut self, other: &LinearExpr, scale: f64) {
        for (var, coefficient) in &other.terms {
            self.add_term(*var, coefficient * scale);
        }
        self.constant += other.constant * scale;
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.constant == 0.0
    }

    /// Evaluate against a dense value vector indexed by [`VarId`].
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coefficient)| coefficient * values.get(var.0).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    LessEq,
    GreaterEq,
    Equal,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::LessEq => write!(f, "<="),
            Relation::GreaterEq => write!(f, ">="),
            Relation::Equal => write!(f, "=="),
        }
    }
}

/// A constraint instance `lhs (rel) rhs` where `lhs` carries no constant.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub family: &'static str,
    pub key: Key,
    pub lhs: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    /// Whether `values` satisfy this constraint within `tolerance`.
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.lhs.evaluate(values);
        match self.relation {
            Relation::LessEq => lhs <= self.rhs + tolerance,
            Relation::GreaterEq => lhs >= self.rhs - tolerance,
            Relation::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// The symbolic model under construction.
#[derive(Debug, Default)]
pub struct Model {
    families: Vec<VariableFamily>,
    family_index: HashMap<&'static str, usize>,
    variables: Vec<VariableDecl>,
    constraints: Vec<Constraint>,
    constraint_counts: BTreeMap<&'static str, usize>,
    objective: LinearExpr,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a family and its instances. A family may be declared once.
    pub fn declare_family<I>(&mut self, spec: FamilySpec, keys: I) -> EmodResult<usize>
    where
        I: IntoIterator<Item = Key>,
    {
        if self.family_index.contains_key(spec.name) {
            return Err(EmodError::Assembly(format!(
                "variable family '{}' declared twice",
                spec.name
            )));
        }
        let family_id = self.families.len();
        self.families.push(VariableFamily {
            spec,
            index: HashMap::new(),
            order: Vec::new(),
        });
        self.family_index.insert(spec.name, family_id);

        for key in keys {
            self.push_variable(family_id, key)?;
        }
        Ok(self.families[family_id].len())
    }

    fn push_variable(&mut self, family_id: usize, key: Key) -> EmodResult<VarId> {
        let family = &mut self.families[family_id];
        if key.len() != family.spec.columns.len() {
            return Err(EmodError::Assembly(format!(
                "variable {}{:?} has {} key parts, family declares {}",
                family.spec.name,
                key,
                key.len(),
                family.spec.columns.len()
            )));
        }
        if let Some(existing) = family.index.get(&key) {
            return Ok(*existing);
        }
        let id = VarId(self.variables.len());
        family.index.insert(key.clone(), id);
        family.order.push(id);
        self.variables.push(VariableDecl {
            family: family_id,
            key,
            kind: family.spec.kind,
            lower: family.spec.lower,
            upper: family.spec.upper,
        });
        Ok(id)
    }

    /// Override the bounds of one instance (e.g. fixing a reference angle).
    pub fn set_bounds(&mut self, var: VarId, lower: f64, upper: f64) {
        if let Some(decl) = self.variables.get_mut(var.0) {
            decl.lower = lower;
            decl.upper = upper;
        }
    }

    pub fn has_family(&self, name: &str) -> bool {
        self.family_index.contains_key(name)
    }

    pub fn family(&self, name: &str) -> Option<&VariableFamily> {
        self.family_index.get(name).map(|idx| &self.families[*idx])
    }

    /// Number of instances of a family; zero when the family was not created.
    pub fn family_len(&self, name: &str) -> usize {
        self.family(name).map_or(0, VariableFamily::len)
    }

    pub fn families(&self) -> impl Iterator<Item = &VariableFamily> {
        self.families.iter()
    }

    /// Look up an instance that must exist.
    pub fn var<S: AsRef<str>>(&self, family: &str, key_parts: &[S]) -> EmodResult<VarId> {
        let declared = self.family(family).ok_or_else(|| {
            EmodError::Assembly(format!("variable family '{}' was not created", family))
        })?;
        let key = key(key_parts);
        declared.get(&key).ok_or_else(|| {
            EmodError::Assembly(format!(
                "{}{:?} is outside the family's domain",
                family, key
            ))
        })
    }

    /// Look up an instance that may legitimately be absent.
    pub fn find_var<S: AsRef<str>>(&self, family: &str, key_parts: &[S]) -> Option<VarId> {
        self.family(family)?.get(&key(key_parts))
    }

    pub fn variable(&self, var: VarId) -> Option<&VariableDecl> {
        self.variables.get(var.0)
    }

    pub fn variables(&self) -> &[VariableDecl] {
        &self.variables
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn family_name_of(&self, var: VarId) -> Option<&'static str> {
        self.variables
            .get(var.0)
            .map(|decl| self.families[decl.family].spec.name)
    }

    /// Add `expr (rel) rhs`; the expression's constant moves to the right-hand side.
    pub fn add_constraint(
        &mut self,
        family: &'static str,
        key: Key,
        expr: LinearExpr,
        relation: Relation,
        rhs: f64,
    ) {
        let rhs = rhs - expr.constant;
        let lhs = LinearExpr {
            terms: expr.terms,
            constant: 0.0,
        };
        self.constraints.push(Constraint {
            family,
            key,
            lhs,
            relation,
            rhs,
        });
        *self.constraint_counts.entry(family).or_insert(0) += 1;
    }

    /// Register a constraint family with zero instances so that it shows up
    /// in counts even when the data produced none.
    pub fn touch_constraint_family(&mut self, family: &'static str) {
        self.constraint_counts.entry(family).or_insert(0);
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraint_count(&self, family: &str) -> usize {
        self.constraint_counts.get(family).copied().unwrap_or(0)
    }

    pub fn constraint_counts(&self) -> &BTreeMap<&'static str, usize> {
        &self.constraint_counts
    }

    pub fn constraints_of<'a>(&'a self, family: &'a str) -> impl Iterator<Item = &'a Constraint> {
        self.constraints.iter().filter(move |c| c.family == family)
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn has_integer_variables(&self) -> bool {
        self.variables
            .iter()
            .any(|decl| decl.kind != VarKind::Continuous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEW_CAPACITY: FamilySpec = FamilySpec::continuous("new_capacity", &["r", "t", "y"]);

    #[test]
    fn family_can_only_be_declared_once() {
        let mut model = Model::new();
        model
            .declare_family(NEW_CAPACITY, vec![key(&["R1", "T1", "2020"])])
            .unwrap();
        let err = model.declare_family(NEW_CAPACITY, Vec::new()).unwrap_err();
        assert!(matches!(err, EmodError::Assembly(_)));
    }

    #[test]
    fn var_outside_domain_is_an_error_but_find_is_not() {
        let mut model = Model::new();
        model
            .declare_family(NEW_CAPACITY, vec![key(&["R1", "T1", "2020"])])
            .unwrap();
        assert!(model.var("new_capacity", &["R1", "T1", "2020"]).is_ok());
        assert!(model.var("new_capacity", &["R1", "T1", "2021"]).is_err());
        assert!(model.find_var("new_capacity", &["R1", "T1", "2021"]).is_none());
        assert!(model.var("unknown", &["R1"]).is_err());
    }

    #[test]
    fn constraint_constant_moves_to_rhs() {
        let mut model = Model::new();
        model
            .declare_family(NEW_CAPACITY, vec![key(&["R1", "T1", "2020"])])
            .unwrap();
        let x = model.var("new_capacity", &["R1", "T1", "2020"]).unwrap();
        let mut expr = LinearExpr::from_term(x, 2.0);
        expr.add_constant(3.0);
        model.add_constraint("cap", key(&["R1"]), expr, Relation::LessEq, 10.0);

        let constraint = &model.constraints()[0];
        assert_eq!(constraint.rhs, 7.0);
        assert_eq!(constraint.lhs.constant_term(), 0.0);
        assert!(constraint.is_satisfied(&[3.5], 1e-9));
        assert!(!constraint.is_satisfied(&[3.6], 1e-9));
        assert_eq!(model.constraint_count("cap"), 1);
    }

    #[test]
    fn zero_coefficients_are_dropped() {
        let mut expr = LinearExpr::new();
        expr.add_term(VarId(0), 0.0);
        assert!(expr.is_empty());
    }

    #[test]
    fn wrong_key_arity_is_rejected() {
        let mut model = Model::new();
        let err = model
            .declare_family(NEW_CAPACITY, vec![key(&["R1", "T1"])])
            .unwrap_err();
        assert!(matches!(err, EmodError::Assembly(_)));
    }
}

//! Model assembly orchestrator.
//!
//! Builds the symbolic [`Model`] for one calculation in a fixed order:
//!
//! 1. every variable family the [`ModelFlags`] call for, over its restricted
//!    or full domain,
//! 2. every constraint family, strictly after the families it references,
//! 3. the objective: minimize `Σ total_discounted_cost[r, y]`.
//!
//! Assembly is single threaded and never touches the fact store beyond
//! reads. Missing facts degrade to families with zero instances.

mod activity;
mod balance;
mod capacity;
mod costs;
mod emissions;
mod storage;
mod targets;
mod transmission;

use emod_core::{
    key, Dimension, EmodError, EmodResult, FamilySpec, Key, LinearExpr, Model, ParamTable,
    Relation, Row, ScenarioFlags, Table, VarId,
};
use emod_io::FactStore;
use tracing::{debug, info};
use web_time::Instant;

use crate::families::TOTAL_DISCOUNTED_COST;
use crate::flags::ModelFlags;
use crate::queries::*;
use crate::query::QueryResults;
use crate::restrict::{restrict, IndexLevels};
use crate::stream::stream_groups;
use crate::timeslice::TimeHierarchy;

/// Read-only inputs shared by every assembly step.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyContext<'a> {
    pub store: &'a FactStore,
    pub results: &'a QueryResults,
    pub hierarchy: &'a TimeHierarchy,
    pub flags: &'a ModelFlags,
    pub scenario: &'a ScenarioFlags,
    pub workers: usize,
    pub restriction_threshold: usize,
}

impl<'a> AssemblyContext<'a> {
    pub fn members(&self, dim: Dimension) -> &'a [String] {
        self.store.members(dim)
    }

    pub fn param(&self, name: &str) -> EmodResult<&'a ParamTable> {
        self.store.param(name)
    }

    pub fn table(&self, name: &str) -> EmodResult<&'a Table> {
        self.results.get(name)
    }

    /// Restricted domain from the first `depth` key columns of a query result.
    pub fn restrict(&self, query: &str, depth: usize) -> EmodResult<IndexLevels> {
        let table = self.table(query)?;
        restrict(table.rows(), depth, self.workers, self.restriction_threshold)
    }

    pub fn year_split(&self, l: &str, y: &str) -> EmodResult<f64> {
        Ok(self.param("YearSplit")?.value_or(&[l, y], 0.0))
    }

    pub fn discount_rate(&self, r: &str) -> EmodResult<f64> {
        Ok(self.param("DiscountRate")?.value_or(&[r], 0.05))
    }

    pub fn first_year(&self) -> EmodResult<i32> {
        self.store
            .sets()
            .first_year()
            .ok_or_else(|| EmodError::Input("scenario declares no years".into()))
    }

    pub fn last_year(&self) -> EmodResult<i32> {
        self.store
            .sets()
            .last_year()
            .ok_or_else(|| EmodError::Input("scenario declares no years".into()))
    }
}

/// Variable domains derived from query results before any family is declared.
#[derive(Debug, Default)]
pub(crate) struct Domains {
    /// (r, t, y, m) tuples that can carry activity
    pub activity: Vec<Key>,
    /// (r, t, y) prefixes of `activity`
    pub active_technologies: Vec<Key>,
    /// (r, t, l, y, m) rows feeding total activity
    pub activity_rows: Vec<Row>,
    pub production: Vec<Key>,
    pub usage: Vec<Key>,
    pub production_by_technology: Vec<Key>,
    pub use_by_technology: Vec<Key>,
    pub trade: Vec<Key>,
    pub variable_cost: Vec<Key>,
    pub emissions: Vec<Key>,
    pub emission_penalty: Vec<Key>,
    /// (r, e, y, t) rows feeding annual emissions
    pub emission_rows: Vec<Row>,
    pub annual_emissions: Vec<Key>,
    pub storage_charge: Vec<Key>,
    pub storage_discharge: Vec<Key>,
    pub reserve_capacity: Vec<Key>,
    pub reserve_demand: Vec<Key>,
    pub re_production: Vec<Key>,
    pub re_target_fuel: Vec<Key>,
    /// (r, f, y) modelled on the node/line network
    pub transmission_enabled: IndexLevels,
}

impl Domains {
    pub fn compute(cx: &AssemblyContext) -> EmodResult<Self> {
        let started = Instant::now();
        let timeslices = cx.members(Dimension::Timeslice);

        let activity = if cx.scenario.restrict_vars {
            cx.restrict(ACTIVITY_DOMAIN, 4)?.tuples()
        } else {
            IndexLevels::full(&[
                cx.members(Dimension::Region),
                cx.members(Dimension::Technology),
                cx.members(Dimension::Year),
                cx.members(Dimension::Mode),
            ])
            .tuples()
        };
        let active_technologies = prefixes(&activity, 3);

        let mut activity_rows = Vec::with_capacity(activity.len() * timeslices.len());
        for k in &activity {
            let (r, t, y, m) = (&k[0], &k[1], &k[2], &k[3]);
            for l in timeslices {
                activity_rows.push(Row::keyed(key(&[r, t, l, y, m])));
            }
        }

        let mut trade = Vec::new();
        for row in cx.table(TRADE_ROUTES)?.rows() {
            for l in timeslices {
                trade.push(key(&[row.at(0), row.at(1), l.as_str(), row.at(2), row.at(3)]));
            }
        }
        trade.sort();

        let emissions = cx.restrict(EMISSION_TERMS, 4)?.tuples();
        // annual emissions stream over technology emissions keyed (r, e, y, t)
        let emission_rows: Vec<Row> = emissions
            .iter()
            .map(|k| Row::keyed(key(&[&k[0], &k[2], &k[3], &k[1]])))
            .collect();
        let emission_rows = sorted_rows(emission_rows);
        let annual_emissions = prefixes_of_rows(&emission_rows, 3);

        let domains = Self {
            activity,
            active_technologies,
            activity_rows: sorted_rows(activity_rows),
            production: cx.restrict(PRODUCTION_TERMS, 4)?.tuples(),
            usage: cx.restrict(USE_TERMS, 4)?.tuples(),
            production_by_technology: cx.restrict(PRODUCTION_BY_TECH_TERMS, 5)?.tuples(),
            use_by_technology: cx.restrict(USE_BY_TECH_TERMS, 5)?.tuples(),
            trade,
            variable_cost: cx.restrict(VARIABLE_COST_TERMS, 3)?.tuples(),
            emissions,
            emission_penalty: cx.restrict(EMISSION_PENALTY_TERMS, 3)?.tuples(),
            emission_rows,
            annual_emissions,
            storage_charge: cx.restrict(STORAGE_CHARGE_TERMS, 4)?.tuples(),
            storage_discharge: cx.restrict(STORAGE_DISCHARGE_TERMS, 4)?.tuples(),
            reserve_capacity: cx.restrict(RESERVE_TECH_TERMS, 2)?.tuples(),
            reserve_demand: cx.restrict(RESERVE_FUEL_TERMS, 3)?.tuples(),
            re_production: cx.restrict(RE_TECH_TERMS, 2)?.tuples(),
            re_target_fuel: cx.restrict(RE_FUEL_TERMS, 2)?.tuples(),
            transmission_enabled: cx.restrict(TRANSMISSION_ENABLED, 3)?,
        };

        debug!(
            activity = domains.activity.len(),
            production = domains.production.len(),
            usage = domains.usage.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "computed variable domains"
        );
        Ok(domains)
    }

    /// Whether (r, f, y) is balanced on the network instead of regionally.
    pub fn is_nodal(&self, flags: &ModelFlags, r: &str, f: &str, y: &str) -> bool {
        flags.nodal && self.transmission_enabled.contains(&[r, f, y])
    }
}

/// Distinct `depth`-prefixes of `keys`, sorted.
pub(crate) fn prefixes(keys: &[Key], depth: usize) -> Vec<Key> {
    let mut levels = IndexLevels::new(depth);
    for k in keys {
        levels.insert(k);
    }
    levels.tuples()
}

pub(crate) fn prefixes_of_rows(rows: &[Row], depth: usize) -> Vec<Key> {
    crate::restrict::restrict_rows(rows, depth).tuples()
}

/// Keys of every instance of a declared family, in declaration order.
pub(crate) fn family_keys(model: &Model, name: &str) -> Vec<Key> {
    model
        .family(name)
        .map(|family| {
            family
                .ids()
                .iter()
                .filter_map(|id| model.variable(*id))
                .map(|decl| decl.key.clone())
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn sorted_rows(mut rows: Vec<Row>) -> Vec<Row> {
    rows.sort_by(|a, b| a.key.cmp(&b.key));
    rows
}

/// Full Cartesian product of the given members.
pub(crate) fn product(dims: &[&[String]]) -> Vec<Key> {
    IndexLevels::full(dims).tuples()
}

/// Declare `spec` over `keys` when the flags call for it.
pub(crate) fn declare<I>(
    cx: &AssemblyContext,
    model: &mut Model,
    spec: FamilySpec,
    keys: I,
) -> EmodResult<()>
where
    I: IntoIterator<Item = Key>,
{
    if !cx.flags.requires(spec.name) {
        return Ok(());
    }
    let count = model.declare_family(spec, keys)?;
    debug!(family = spec.name, instances = count, "declared variable family");
    Ok(())
}

/// Run `body` as the constraint family `family`, registering it even when
/// it produces no instances.
pub(crate) fn build<F>(model: &mut Model, family: &'static str, body: F) -> EmodResult<()>
where
    F: FnOnce(&mut Model) -> EmodResult<()>,
{
    model.touch_constraint_family(family);
    body(model)?;
    debug!(
        family,
        instances = model.constraint_count(family),
        "built constraint family"
    );
    Ok(())
}

/// `var[key] − Σ terms == 0` per key group of `rows`.
///
/// Rows must be sorted; the first `depth` key columns form both the group
/// key and the key of the defined variable. `term` maps a row to an optional
/// weighted variable; rows whose variable is absent contribute nothing.
pub(crate) fn stream_definition<F>(
    model: &mut Model,
    family: &'static str,
    defined: &'static str,
    rows: &[Row],
    depth: usize,
    mut term: F,
) -> EmodResult<usize>
where
    F: FnMut(&Model, &Row) -> EmodResult<Option<(VarId, f64)>>,
{
    model.touch_constraint_family(family);
    let emitted = stream_groups(
        rows.iter(),
        model,
        |row| row.prefix(depth),
        |model, row, acc: &mut LinearExpr| -> EmodResult<()> {
            if let Some((var, coefficient)) = term(model, row)? {
                acc.add_term(var, coefficient);
            }
            Ok(())
        },
        |model, group, acc: LinearExpr| -> EmodResult<()> {
            let target = model.var(defined, group)?;
            let mut expr = LinearExpr::from_term(target, 1.0);
            expr.add_scaled(&acc, -1.0);
            model.add_constraint(family, group.to_vec(), expr, Relation::Equal, 0.0);
            Ok(())
        },
    )?;
    debug!(family, instances = emitted, rows = rows.len(), "streamed constraint family");
    Ok(emitted)
}

/// `var − Σ coef·other == rhs` for a variable that must exist.
pub(crate) fn define(
    model: &mut Model,
    family: &'static str,
    target: VarId,
    key: Key,
    terms: &[(Option<VarId>, f64)],
    rhs: f64,
) {
    let mut expr = LinearExpr::from_term(target, 1.0);
    for (var, coefficient) in terms {
        if let Some(var) = var {
            expr.add_term(*var, -coefficient);
        }
    }
    model.add_constraint(family, key, expr, Relation::Equal, rhs);
}

pub(crate) fn parse_year(y: &str) -> EmodResult<i32> {
    y.trim()
        .parse()
        .map_err(|_| EmodError::Input(format!("year '{}' is not an integer", y)))
}

/// Build the complete model for one calculation.
pub fn assemble(cx: &AssemblyContext) -> EmodResult<Model> {
    let started = Instant::now();
    let domains = Domains::compute(cx)?;
    let mut model = Model::new();

    capacity::declare_variables(cx, &domains, &mut model)?;
    activity::declare_variables(cx, &domains, &mut model)?;
    balance::declare_variables(cx, &domains, &mut model)?;
    storage::declare_variables(cx, &domains, &mut model)?;
    costs::declare_variables(cx, &domains, &mut model)?;
    emissions::declare_variables(cx, &domains, &mut model)?;
    targets::declare_variables(cx, &domains, &mut model)?;
    transmission::declare_variables(cx, &domains, &mut model)?;
    info!(
        families = model.families().count(),
        variables = model.num_variables(),
        "declared variables"
    );

    capacity::add_constraints(cx, &domains, &mut model)?;
    activity::add_constraints(cx, &domains, &mut model)?;
    balance::add_constraints(cx, &domains, &mut model)?;
    storage::add_constraints(cx, &domains, &mut model)?;
    emissions::add_constraints(cx, &domains, &mut model)?;
    targets::add_constraints(cx, &domains, &mut model)?;
    transmission::add_constraints(cx, &domains, &mut model)?;
    costs::add_constraints(cx, &domains, &mut model)?;
    info!(
        families = model.constraint_counts().len(),
        constraints = model.num_constraints(),
        "built constraints"
    );

    define_objective(&mut model);
    info!(
        variables = model.num_variables(),
        constraints = model.num_constraints(),
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "assembled model"
    );
    Ok(model)
}

/// Minimize the sum of total discounted cost over every (r, y).
fn define_objective(model: &mut Model) {
    let mut objective = LinearExpr::new();
    if let Some(family) = model.family(TOTAL_DISCOUNTED_COST.name) {
        for id in family.ids() {
            objective.add_term(*id, 1.0);
        }
    }
    model.set_objective(objective);
}

#[cfg(test)]
mod tests;

//! Nodal network: node-level activity, line flows under DC power flow,
//! candidate line investment and the nodal energy balance.

use emod_core::{
    key, Dimension, EmodError, EmodResult, Key, LinearExpr, Model, Relation, Row, VarId, VarKind,
};
use emod_io::TransmissionLineRecord;
use std::collections::{BTreeSet, HashMap};
use std::f64::consts::PI;
use tracing::warn;

use super::costs::{capital_factor, operating_factor};
use super::{build, declare, define, family_keys, parse_year, prefixes_of_rows, sorted_rows};
use super::{stream_definition, AssemblyContext, Domains};
use crate::families::*;
use crate::queries::{NODAL_DEMAND, NODAL_TECH_SHARE, PRODUCTION_TERMS, USE_TERMS};

/// Whether `line` can carry flow in `year`. Candidate lines may be built in
/// any year.
fn in_service(line: &TransmissionLineRecord, year: i32) -> bool {
    match line.y_construction {
        Some(built) => built <= year && i64::from(year - built) < i64::from(line.operational_life),
        None => true,
    }
}

fn is_lossy(line: &TransmissionLineRecord) -> bool {
    line.efficiency < 1.0
}

/// Largest flow a line may carry: `max_flow`, or for a candidate power-flow
/// line the flow its angle bounds admit. Existing lines without `max_flow`
/// are unbounded; candidate pipelines must name one.
fn flow_capacity(line: &TransmissionLineRecord) -> EmodResult<Option<f64>> {
    if let Some(max) = line.max_flow {
        return Ok(Some(max));
    }
    if !line.is_candidate() {
        return Ok(None);
    }
    match line.reactance {
        Some(x) if line.uses_power_flow() && x != 0.0 => Ok(Some(2.0 * PI / x.abs())),
        _ => Err(EmodError::Input(format!(
            "candidate line {} has no max_flow to bound it before it is built",
            line.id
        ))),
    }
}

fn region_of<'a>(cx: &AssemblyContext<'a>) -> HashMap<&'a str, &'a str> {
    cx.store
        .nodes()
        .iter()
        .map(|node| (node.id.as_str(), node.r.as_str()))
        .collect()
}

/// Production or use rows projected onto nodes, keyed (n, l, f, y, t, m).
///
/// A regional row reaches a node when its (r, f, y) is modelled on the
/// network and the node carries nodal activity for (t, m).
fn nodal_rows(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &Model,
    query: &str,
) -> EmodResult<Vec<Row>> {
    let nodes = cx.store.nodes();
    let mut rows = Vec::new();
    // r, l, f, y, t, m
    for row in cx.table(query)?.rows() {
        let (r, l, f, y, t, m) = (row.at(0), row.at(1), row.at(2), row.at(3), row.at(4), row.at(5));
        if !domains.is_nodal(cx.flags, r, f, y) {
            continue;
        }
        for node in nodes.iter().filter(|node| node.r == r) {
            if model
                .find_var(RATE_OF_ACTIVITY_NODAL.name, &[node.id.as_str(), l, t, m, y])
                .is_some()
            {
                rows.push(Row::new(key(&[node.id.as_str(), l, f, y, t, m]), row.values.clone()));
            }
        }
    }
    Ok(sorted_rows(rows))
}

pub(super) fn declare_variables(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    if !cx.flags.nodal {
        return Ok(());
    }
    let years = cx.members(Dimension::Year);
    let timeslices = cx.members(Dimension::Timeslice);
    let lines = cx.store.transmission_lines();

    let candidates: Vec<Key> = lines
        .iter()
        .filter(|line| line.is_candidate())
        .flat_map(|line| years.iter().map(move |y| key(&[&line.id, y])))
        .collect();
    let built = if cx.scenario.continuous_transmission {
        TRANSMISSION_BUILT.with_kind(VarKind::Continuous)
    } else {
        TRANSMISSION_BUILT
    };
    declare(cx, model, built, candidates.clone())?;
    declare(cx, model, TRANSMISSION_EXISTS, candidates.clone())?;

    let angle_nodes: BTreeSet<&str> = lines
        .iter()
        .filter(|line| line.uses_power_flow())
        .flat_map(|line| [line.n1.as_str(), line.n2.as_str()])
        .collect();
    let mut angles = Vec::new();
    for n in angle_nodes {
        for l in timeslices {
            for y in years {
                angles.push(key(&[n, l.as_str(), y.as_str()]));
            }
        }
    }
    declare(cx, model, VOLTAGE_ANGLE, angles)?;

    let mut flows = Vec::new();
    let mut lossy_flows = Vec::new();
    for line in lines {
        for y in years {
            if in_service(line, parse_year(y)?) {
                for l in timeslices {
                    let k = key(&[&line.id, l, &line.f, y]);
                    if is_lossy(line) {
                        lossy_flows.push(k.clone());
                    }
                    flows.push(k);
                }
            }
        }
    }
    declare(cx, model, TRANSMISSION_BY_LINE, flows)?;
    declare(cx, model, TRANSMISSION_FORWARD, lossy_flows.clone())?;
    declare(cx, model, TRANSMISSION_REVERSE, lossy_flows)?;

    // nodal activity follows the regional activity domain of shared technologies
    let mut nodal_activity = Vec::new();
    let region = region_of(cx);
    for row in cx.table(NODAL_TECH_SHARE)?.rows() {
        let (n, t, y) = (row.at(0), row.at(2), row.at(3));
        let Some(r) = region.get(n) else { continue };
        for k in &domains.activity {
            if k[0] == *r && k[1] == t && k[2] == y {
                for l in timeslices {
                    nodal_activity.push(key(&[n, l.as_str(), t, k[3].as_str(), y]));
                }
            }
        }
    }
    declare(cx, model, RATE_OF_ACTIVITY_NODAL, nodal_activity)?;

    for (spec, query) in [
        (RATE_OF_PRODUCTION_NODAL, PRODUCTION_TERMS),
        (RATE_OF_USE_NODAL, USE_TERMS),
    ] {
        let rows = nodal_rows(cx, domains, model, query)?;
        declare(cx, model, spec, prefixes_of_rows(&rows, 4))?;
    }

    declare(cx, model, CAPITAL_INVESTMENT_TRANSMISSION, candidates.clone())?;
    declare(cx, model, DISCOUNTED_CAPITAL_INVESTMENT_TRANSMISSION, candidates)?;
    let line_years: Vec<Key> = lines
        .iter()
        .flat_map(|line| years.iter().map(move |y| key(&[&line.id, y])))
        .collect();
    declare(cx, model, OPERATING_COST_TRANSMISSION, line_years.clone())?;
    declare(cx, model, DISCOUNTED_OPERATING_COST_TRANSMISSION, line_years)?;
    let node_years: Vec<Key> = cx
        .store
        .nodes()
        .iter()
        .flat_map(|node| years.iter().map(move |y| key(&[&node.id, y])))
        .collect();
    declare(cx, model, TOTAL_DISCOUNTED_TRANSMISSION_COST, node_years)?;
    Ok(())
}

pub(super) fn add_constraints(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    if !cx.flags.nodal || !model.has_family(TRANSMISSION_BY_LINE.name) {
        return Ok(());
    }
    nodal_activity(cx, model)?;

    // (n, l, f, y, t, m) rows → rate_of_activity_nodal[n, l, t, m, y]
    for (family, defined, query) in [
        ("rate_of_production_nodal_def", RATE_OF_PRODUCTION_NODAL.name, PRODUCTION_TERMS),
        ("rate_of_use_nodal_def", RATE_OF_USE_NODAL.name, USE_TERMS),
    ] {
        let rows = nodal_rows(cx, domains, model, query)?;
        stream_definition(model, family, defined, &rows, 4, |model, row| {
            let rate = model.find_var(
                RATE_OF_ACTIVITY_NODAL.name,
                &[row.at(0), row.at(1), row.at(4), row.at(5), row.at(3)],
            );
            Ok(rate.map(|var| (var, row.value(0))))
        })?;
    }

    transmission_exists(cx, model)?;
    power_flow(cx, model)?;
    flow_limits(cx, model)?;
    flow_split(model)?;
    nodal_energy_balance(cx, domains, model)?;
    costs(cx, model)?;
    Ok(())
}

/// `rate_of_activity_nodal = share · rate_of_activity` per node.
fn nodal_activity(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let region = region_of(cx);
    let shares: HashMap<&Key, f64> = cx
        .table(NODAL_TECH_SHARE)?
        .rows()
        .iter()
        .map(|row| (&row.key, row.value(0)))
        .collect();
    build(model, "nodal_activity_def", |model| {
        for k in family_keys(model, RATE_OF_ACTIVITY_NODAL.name) {
            let (n, l, t, m, y) = (&k[0], &k[1], &k[2], &k[3], &k[4]);
            let Some(r) = region.get(n.as_str()) else { continue };
            let share = shares
                .get(&key(&[n.as_str(), *r, t.as_str(), y.as_str()]))
                .copied()
                .unwrap_or(0.0);
            let target = model.var(RATE_OF_ACTIVITY_NODAL.name, &k)?;
            let rltmy = [*r, l.as_str(), t.as_str(), m.as_str(), y.as_str()];
            let regional = model.find_var(RATE_OF_ACTIVITY.name, &rltmy);
            define(model, "nodal_activity_def", target, k.clone(), &[(regional, share)], 0.0);
        }
        Ok(())
    })
}

/// Candidate lines exist from the year they are built until their life ends.
fn transmission_exists(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let years = cx
        .members(Dimension::Year)
        .iter()
        .map(|y| Ok((y, parse_year(y)?)))
        .collect::<EmodResult<Vec<_>>>()?;
    let lines = cx.store.transmission_lines();
    build(model, "transmission_exists_def", |model| {
        for line in lines.iter().filter(|line| line.is_candidate()) {
            let life = i64::from(line.operational_life);
            for (y, year) in &years {
                let target = model.var(TRANSMISSION_EXISTS.name, &[&line.id, *y])?;
                let mut terms = Vec::new();
                for (yy, built) in &years {
                    if built <= year && i64::from(year - built) < life {
                        let built = model.var(TRANSMISSION_BUILT.name, &[&line.id, *yy])?;
                        terms.push((Some(built), 1.0));
                    }
                }
                define(model, "transmission_exists_def", target, key(&[&line.id, *y]), &terms, 0.0);
            }
        }
        Ok(())
    })
}

/// `flow − (θ1 − θ2)/x` for one line and slice, or `None` when the angles are
/// not declared.
fn angle_difference(
    model: &Model,
    line: &TransmissionLineRecord,
    reactance: f64,
    flow: VarId,
    l: &str,
    y: &str,
) -> Option<LinearExpr> {
    let theta1 = model.find_var(VOLTAGE_ANGLE.name, &[line.n1.as_str(), l, y])?;
    let theta2 = model.find_var(VOLTAGE_ANGLE.name, &[line.n2.as_str(), l, y])?;
    Some(
        LinearExpr::from_term(flow, 1.0)
            .with_term(theta1, -1.0 / reactance)
            .with_term(theta2, 1.0 / reactance),
    )
}

fn power_flow(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let lines: Vec<(&TransmissionLineRecord, f64)> = cx
        .store
        .transmission_lines()
        .iter()
        .filter(|line| line.uses_power_flow())
        .filter_map(|line| match line.reactance {
            Some(x) if x != 0.0 => Some((line, x)),
            _ => {
                warn!(
                    line = %line.id,
                    "power-flow line without reactance; flow left unconstrained"
                );
                None
            }
        })
        .collect();
    let flows = family_keys(model, TRANSMISSION_BY_LINE.name);
    let mut by_line: HashMap<&str, Vec<&Key>> = HashMap::new();
    for k in &flows {
        by_line.entry(k[0].as_str()).or_default().push(k);
    }

    model.touch_constraint_family("dc_power_flow_upper");
    model.touch_constraint_family("dc_power_flow_lower");
    build(model, "dc_power_flow", |model| {
        for (line, x) in &lines {
            for k in by_line.get(line.id.as_str()).into_iter().flatten() {
                let (l, y) = (k[1].as_str(), k[3].as_str());
                let flow = model.var(TRANSMISSION_BY_LINE.name, k.as_slice())?;
                let Some(expr) = angle_difference(model, line, *x, flow, l, y) else {
                    continue;
                };
                if line.is_candidate() {
                    // big-M disjunction: the physics bind only once the line exists
                    let exists = model.var(TRANSMISSION_EXISTS.name, &[line.id.as_str(), y])?;
                    let big_m = 2.0 * PI / x.abs();
                    let upper = expr.clone().with_term(exists, big_m);
                    model.add_constraint(
                        "dc_power_flow_upper",
                        (*k).clone(),
                        upper,
                        Relation::LessEq,
                        big_m,
                    );
                    let lower = expr.with_term(exists, -big_m);
                    model.add_constraint(
                        "dc_power_flow_lower",
                        (*k).clone(),
                        lower,
                        Relation::GreaterEq,
                        -big_m,
                    );
                } else {
                    model.add_constraint("dc_power_flow", (*k).clone(), expr, Relation::Equal, 0.0);
                }
            }
        }
        Ok(())
    })
}

/// `|flow| ≤ capacity`, scaled by existence for candidate lines so an
/// unbuilt line carries nothing.
fn flow_limits(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let mut limits: HashMap<&str, (&TransmissionLineRecord, f64)> = HashMap::new();
    for line in cx.store.transmission_lines() {
        if let Some(max) = flow_capacity(line)? {
            limits.insert(line.id.as_str(), (line, max));
        }
    }
    model.touch_constraint_family("transmission_flow_limit_lower");
    build(model, "transmission_flow_limit_upper", |model| {
        for k in family_keys(model, TRANSMISSION_BY_LINE.name) {
            let Some((line, max)) = limits.get(k[0].as_str()) else {
                continue;
            };
            let flow = model.var(TRANSMISSION_BY_LINE.name, &k)?;
            let flow_only = LinearExpr::from_term(flow, 1.0);
            if line.is_candidate() {
                let exists = model.var(TRANSMISSION_EXISTS.name, &[&k[0], &k[3]])?;
                let upper = flow_only.clone().with_term(exists, -max);
                model.add_constraint(
                    "transmission_flow_limit_upper",
                    k.clone(),
                    upper,
                    Relation::LessEq,
                    0.0,
                );
                let lower = flow_only.with_term(exists, *max);
                model.add_constraint(
                    "transmission_flow_limit_lower",
                    k,
                    lower,
                    Relation::GreaterEq,
                    0.0,
                );
            } else {
                model.add_constraint(
                    "transmission_flow_limit_upper",
                    k.clone(),
                    flow_only.clone(),
                    Relation::LessEq,
                    *max,
                );
                model.add_constraint(
                    "transmission_flow_limit_lower",
                    k,
                    flow_only,
                    Relation::GreaterEq,
                    -max,
                );
            }
        }
        Ok(())
    })
}

/// `flow = forward − reverse` on lossy lines.
fn flow_split(model: &mut Model) -> EmodResult<()> {
    build(model, "transmission_flow_split", |model| {
        for k in family_keys(model, TRANSMISSION_FORWARD.name) {
            let flow = model.var(TRANSMISSION_BY_LINE.name, &k)?;
            let forward = model.find_var(TRANSMISSION_FORWARD.name, &k);
            let reverse = model.find_var(TRANSMISSION_REVERSE.name, &k);
            define(
                model,
                "transmission_flow_split",
                flow,
                k,
                &[(forward, 1.0), (reverse, -1.0)],
                0.0,
            );
        }
        Ok(())
    })
}

/// Per node and slice of every network-balanced (r, f, y):
/// `(production − use − sent + received · efficiency) · year_split ≥ demand`.
///
/// Lossless lines enter through their signed flow. Lossy lines enter through
/// their forward and reverse parts so the loss falls on whichever end
/// receives.
fn nodal_energy_balance(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    let demand: HashMap<&Key, f64> = cx
        .table(NODAL_DEMAND)?
        .rows()
        .iter()
        .map(|row| (&row.key, row.value(0)))
        .collect();
    let nodes = cx.store.nodes();
    let lines = cx.store.transmission_lines();
    let timeslices = cx.members(Dimension::Timeslice);
    let enabled = domains.transmission_enabled.tuples();

    build(model, "nodal_energy_balance", |model| {
        for rfy in &enabled {
            let (r, f, y) = (rfy[0].as_str(), rfy[1].as_str(), rfy[2].as_str());
            for node in nodes.iter().filter(|node| node.r == r) {
                let n = node.id.as_str();
                for l in timeslices {
                    let l = l.as_str();
                    let split = cx.year_split(l, y)?;
                    let mut expr = LinearExpr::new();
                    let nlfy = [n, l, f, y];
                    if let Some(production) = model.find_var(RATE_OF_PRODUCTION_NODAL.name, &nlfy) {
                        expr.add_term(production, split);
                    }
                    if let Some(usage) = model.find_var(RATE_OF_USE_NODAL.name, &nlfy) {
                        expr.add_term(usage, -split);
                    }
                    for line in lines.iter().filter(|line| line.f == f) {
                        let (sends, receives) = (line.n1 == n, line.n2 == n);
                        if !sends && !receives {
                            continue;
                        }
                        let k = [line.id.as_str(), l, f, y];
                        let forward = model.find_var(TRANSMISSION_FORWARD.name, &k);
                        let reverse = model.find_var(TRANSMISSION_REVERSE.name, &k);
                        if let (Some(forward), Some(reverse)) = (forward, reverse) {
                            if sends {
                                expr.add_term(forward, -split);
                                expr.add_term(reverse, split * line.efficiency);
                            }
                            if receives {
                                expr.add_term(forward, split * line.efficiency);
                                expr.add_term(reverse, -split);
                            }
                        } else if let Some(flow) = model.find_var(TRANSMISSION_BY_LINE.name, &k) {
                            if sends {
                                expr.add_term(flow, -split);
                            }
                            if receives {
                                expr.add_term(flow, split * line.efficiency);
                            }
                        }
                    }
                    let k = key(&[n, l, f, y]);
                    let rhs = demand.get(&k).copied().unwrap_or(0.0);
                    model.add_constraint("nodal_energy_balance", k, expr, Relation::GreaterEq, rhs);
                }
            }
        }
        Ok(())
    })
}

fn costs(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let years = cx.members(Dimension::Year);
    if years.is_empty() {
        return Ok(());
    }
    let first = cx.first_year()?;
    let region = region_of(cx);
    let lines = cx.store.transmission_lines();
    let rate_of = |line: &TransmissionLineRecord| -> EmodResult<f64> {
        match region.get(line.n1.as_str()) {
            Some(r) => cx.discount_rate(r),
            None => cx.discount_rate(""),
        }
    };

    build(model, "capital_investment_transmission_def", |model| {
        for line in lines.iter().filter(|line| line.is_candidate()) {
            for y in years {
                let k = key(&[&line.id, y]);
                let target = model.var(CAPITAL_INVESTMENT_TRANSMISSION.name, &k)?;
                let built = model.var(TRANSMISSION_BUILT.name, &k)?;
                define(
                    model,
                    "capital_investment_transmission_def",
                    target,
                    k,
                    &[(Some(built), line.capital_cost)],
                    0.0,
                );
            }
        }
        Ok(())
    })?;

    build(model, "discounted_capital_investment_transmission_def", |model| {
        for line in lines.iter().filter(|line| line.is_candidate()) {
            let rate = rate_of(line)?;
            for y in years {
                let k = key(&[&line.id, y]);
                let factor = capital_factor(rate, parse_year(y)?, first);
                let target = model.var(DISCOUNTED_CAPITAL_INVESTMENT_TRANSMISSION.name, &k)?;
                let investment = model.var(CAPITAL_INVESTMENT_TRANSMISSION.name, &k)?;
                define(
                    model,
                    "discounted_capital_investment_transmission_def",
                    target,
                    k,
                    &[(Some(investment), 1.0 / factor)],
                    0.0,
                );
            }
        }
        Ok(())
    })?;

    build(model, "operating_cost_transmission_def", |model| {
        for line in lines {
            for y in years {
                let k = key(&[&line.id, y]);
                let target = model.var(OPERATING_COST_TRANSMISSION.name, &k)?;
                if line.is_candidate() {
                    let exists = model.var(TRANSMISSION_EXISTS.name, &k)?;
                    define(
                        model,
                        "operating_cost_transmission_def",
                        target,
                        k,
                        &[(Some(exists), line.fixed_cost)],
                        0.0,
                    );
                } else {
                    let cost = if in_service(line, parse_year(y)?) {
                        line.fixed_cost
                    } else {
                        0.0
                    };
                    define(model, "operating_cost_transmission_def", target, k, &[], cost);
                }
            }
        }
        Ok(())
    })?;

    build(model, "discounted_operating_cost_transmission_def", |model| {
        for line in lines {
            let rate = rate_of(line)?;
            for y in years {
                let k = key(&[&line.id, y]);
                let factor = operating_factor(rate, parse_year(y)?, first);
                let target = model.var(DISCOUNTED_OPERATING_COST_TRANSMISSION.name, &k)?;
                let operating = model.var(OPERATING_COST_TRANSMISSION.name, &k)?;
                define(
                    model,
                    "discounted_operating_cost_transmission_def",
                    target,
                    k,
                    &[(Some(operating), 1.0 / factor)],
                    0.0,
                );
            }
        }
        Ok(())
    })?;

    // a line's cost is booked at its sending node
    build(model, "total_discounted_transmission_cost_def", |model| {
        for k in family_keys(model, TOTAL_DISCOUNTED_TRANSMISSION_COST.name) {
            let (n, y) = (k[0].as_str(), k[1].as_str());
            let target = model.var(TOTAL_DISCOUNTED_TRANSMISSION_COST.name, &k)?;
            let mut terms = Vec::new();
            for line in lines.iter().filter(|line| line.n1 == n) {
                let line_year = [line.id.as_str(), y];
                for family in [
                    DISCOUNTED_CAPITAL_INVESTMENT_TRANSMISSION.name,
                    DISCOUNTED_OPERATING_COST_TRANSMISSION.name,
                ] {
                    terms.push((model.find_var(family, &line_year), 1.0));
                }
            }
            define(model, "total_discounted_transmission_cost_def", target, k.clone(), &terms, 0.0);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assemble_store, assemble_with, producing_store, try_assemble_with};
    use emod_core::{EmodError, Relation, ScenarioFlags};
    use emod_io::{FactStoreBuilder, TransmissionLineRecord};

    fn network(line: TransmissionLineRecord) -> FactStoreBuilder {
        producing_store()
            .node("N1", "R1")
            .node("N2", "R1")
            .transmission_line(line)
            .param("TransmissionModelingEnabled", &["R1", "ELC", "2020"], 1.0)
            .param("NodalDistributionTechnologyCapacity", &["N1", "T1", "2020"], 1.0)
            .param("SpecifiedAnnualDemand", &["R1", "ELC", "2020"], 10.0)
            .param("SpecifiedDemandProfile", &["R1", "ELC", "DAY", "2020"], 0.5)
            .param("SpecifiedDemandProfile", &["R1", "ELC", "NIGHT", "2020"], 0.5)
            .param("NodalDistributionDemand", &["N2", "ELC", "2020"], 1.0)
    }

    fn existing_line() -> TransmissionLineRecord {
        TransmissionLineRecord {
            reactance: Some(0.1),
            y_construction: Some(2000),
            operational_life: 50,
            max_flow: Some(20.0),
            ..TransmissionLineRecord::new("TR1", "N1", "N2", "ELC", 1)
        }
    }

    fn candidate_line() -> TransmissionLineRecord {
        TransmissionLineRecord {
            reactance: Some(0.5),
            capital_cost: 100.0,
            operational_life: 30,
            ..TransmissionLineRecord::new("TR2", "N1", "N2", "ELC", 1)
        }
    }

    #[test]
    fn nodal_fuels_leave_the_regional_balance() {
        let model = assemble_store(&network(existing_line()).build().unwrap());
        assert_eq!(model.constraint_count("energy_balance"), 0);
        // two nodes over two slices
        assert_eq!(model.constraint_count("nodal_energy_balance"), 4);
        assert_eq!(model.constraint_count("dc_power_flow"), 2);
        assert_eq!(model.constraint_count("transmission_flow_limit_upper"), 2);
        assert_eq!(model.family_len("transmission_built"), 0);
        assert_eq!(model.constraint_count("nodal_activity_def"), 2);
        assert_eq!(model.constraint_count("rate_of_production_nodal_def"), 2);

        let demand_node = model
            .constraints_of("nodal_energy_balance")
            .find(|c| c.key[0] == "N2" && c.key[1] == "DAY")
            .unwrap();
        assert_eq!(demand_node.relation, Relation::GreaterEq);
        assert_eq!(demand_node.rhs, 5.0);
    }

    #[test]
    fn candidate_lines_use_big_m_power_flow() {
        let model = assemble_store(&network(candidate_line()).build().unwrap());
        assert_eq!(model.family_len("transmission_built"), 1);
        assert!(model.has_integer_variables());
        assert_eq!(model.constraint_count("dc_power_flow"), 0);
        assert_eq!(model.constraint_count("dc_power_flow_upper"), 2);
        assert_eq!(model.constraint_count("dc_power_flow_lower"), 2);
        assert_eq!(model.constraint_count("transmission_exists_def"), 1);
        let upper = model.constraints_of("dc_power_flow_upper").next().unwrap();
        assert!((upper.rhs - 4.0 * std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn unbuilt_candidate_lines_carry_no_flow() {
        let model = assemble_store(&network(candidate_line()).build().unwrap());
        assert_eq!(model.constraint_count("transmission_flow_limit_upper"), 2);
        assert_eq!(model.constraint_count("transmission_flow_limit_lower"), 2);
        let exists = model.var("transmission_exists", &["TR2", "2020"]).unwrap();
        let upper = model.constraints_of("transmission_flow_limit_upper").next().unwrap();
        assert_eq!(upper.relation, Relation::LessEq);
        assert_eq!(upper.rhs, 0.0);
        // no max_flow: the angle bounds cap the flow at 2π/|x|
        let bound = 2.0 * std::f64::consts::PI / 0.5;
        assert!(upper.lhs.terms().contains(&(exists, -bound)));
    }

    #[test]
    fn candidate_pipelines_need_a_flow_bound() {
        let pipeline = TransmissionLineRecord {
            capital_cost: 100.0,
            operational_life: 30,
            ..TransmissionLineRecord::new("TR2", "N1", "N2", "ELC", 3)
        };
        let store = network(pipeline).build().unwrap();
        let err = try_assemble_with(&store, &ScenarioFlags::default()).unwrap_err();
        assert!(matches!(err, EmodError::Input(ref msg) if msg.contains("TR2")), "{err}");
    }

    #[test]
    fn lossy_lines_lose_energy_at_the_receiving_end() {
        let line = TransmissionLineRecord {
            y_construction: Some(2000),
            operational_life: 50,
            efficiency: 0.9,
            ..TransmissionLineRecord::new("TR3", "N1", "N2", "ELC", 3)
        };
        let model = assemble_store(&network(line).build().unwrap());
        assert_eq!(model.family_len("transmission_forward"), 2);
        assert_eq!(model.family_len("transmission_reverse"), 2);
        assert_eq!(model.constraint_count("transmission_flow_split"), 2);

        let k = ["TR3", "DAY", "ELC", "2020"];
        let forward = model.var("transmission_forward", &k).unwrap();
        let reverse = model.var("transmission_reverse", &k).unwrap();
        let flow = model.var("transmission_by_line", &k).unwrap();
        let received = 0.5 * 0.9;
        let balance = |node: &str| {
            model
                .constraints_of("nodal_energy_balance")
                .find(|c| c.key[0] == node && c.key[1] == "DAY")
                .unwrap()
        };
        let sender = balance("N1").lhs.terms();
        assert!(sender.contains(&(forward, -0.5)));
        assert!(sender.contains(&(reverse, received)));
        let receiver = balance("N2").lhs.terms();
        assert!(receiver.contains(&(forward, received)));
        assert!(receiver.contains(&(reverse, -0.5)));
        assert!(!sender.iter().chain(receiver).any(|(var, _)| *var == flow));
    }

    #[test]
    fn lossless_lines_enter_the_balance_by_signed_flow() {
        let model = assemble_store(&network(existing_line()).build().unwrap());
        assert_eq!(model.family_len("transmission_forward"), 0);
        assert_eq!(model.constraint_count("transmission_flow_split"), 0);
    }

    #[test]
    fn continuous_transmission_relaxes_build_decisions() {
        let scenario = ScenarioFlags {
            continuous_transmission: true,
            ..ScenarioFlags::default()
        };
        let store = network(candidate_line()).build().unwrap();
        let model = assemble_with(&store, &scenario);
        assert_eq!(model.family_len("transmission_built"), 1);
        assert!(!model.has_integer_variables());
    }

    #[test]
    fn nodal_off_keeps_the_regional_balance() {
        let scenario = ScenarioFlags {
            nodal: false,
            ..ScenarioFlags::default()
        };
        let store = network(existing_line()).build().unwrap();
        let model = assemble_with(&store, &scenario);
        assert!(!model.has_family("transmission_by_line"));
        assert!(!model.has_family("voltage_angle"));
        assert_eq!(model.constraint_count("nodal_energy_balance"), 0);
        assert_eq!(model.constraint_count("energy_balance"), 2);
    }
}

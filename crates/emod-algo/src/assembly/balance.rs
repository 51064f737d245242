//! Fuel production, use, trade and the energy balances tying them to demand.

use emod_core::{key, Dimension, EmodResult, Key, LinearExpr, Model, Relation};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use super::{build, declare, define, stream_definition, AssemblyContext, Domains};
use crate::families::*;
use crate::queries::{
    ACCUMULATED_DEMAND, DEMAND, PRODUCTION_BY_TECH_TERMS, PRODUCTION_TERMS, USE_BY_TECH_TERMS,
    USE_TERMS,
};

pub(super) fn declare_variables(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    declare(cx, model, RATE_OF_PRODUCTION, domains.production.clone())?;
    declare(cx, model, RATE_OF_USE, domains.usage.clone())?;
    declare(cx, model, PRODUCTION, domains.production.clone())?;
    declare(cx, model, USE, domains.usage.clone())?;
    declare(
        cx,
        model,
        PRODUCTION_BY_TECHNOLOGY,
        domains.production_by_technology.clone(),
    )?;
    declare(cx, model, USE_BY_TECHNOLOGY, domains.use_by_technology.clone())?;
    declare(cx, model, TRADE, domains.trade.clone())?;
    Ok(())
}

pub(super) fn add_constraints(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    // (r, l, f, y, t, m) rows → rate_of_activity[r, l, t, m, y]
    for (family, defined, query) in [
        ("rate_of_production_def", RATE_OF_PRODUCTION.name, PRODUCTION_TERMS),
        ("rate_of_use_def", RATE_OF_USE.name, USE_TERMS),
    ] {
        stream_definition(model, family, defined, cx.table(query)?.rows(), 4, |model, row| {
            let rate = model.find_var(
                RATE_OF_ACTIVITY.name,
                &[row.at(0), row.at(1), row.at(4), row.at(5), row.at(3)],
            );
            Ok(rate.map(|var| (var, row.value(0))))
        })?;
    }

    for (family, defined, rate, keys) in [
        ("production_def", PRODUCTION.name, RATE_OF_PRODUCTION.name, &domains.production),
        ("use_def", USE.name, RATE_OF_USE.name, &domains.usage),
    ] {
        build(model, family, |model| {
            for k in keys {
                let target = model.var(defined, k)?;
                let per_slice = model.var(rate, k)?;
                let split = cx.year_split(&k[1], &k[3])?;
                define(model, family, target, k.clone(), &[(Some(per_slice), split)], 0.0);
            }
            Ok(())
        })?;
    }

    // (r, l, t, f, y, m) rows → rate_of_activity[r, l, t, m, y]
    for (family, defined, query) in [
        ("production_by_technology_def", PRODUCTION_BY_TECHNOLOGY.name, PRODUCTION_BY_TECH_TERMS),
        ("use_by_technology_def", USE_BY_TECHNOLOGY.name, USE_BY_TECH_TERMS),
    ] {
        if !model.has_family(defined) {
            continue;
        }
        stream_definition(model, family, defined, cx.table(query)?.rows(), 5, |model, row| {
            let rate = model.find_var(
                RATE_OF_ACTIVITY.name,
                &[row.at(0), row.at(1), row.at(2), row.at(5), row.at(4)],
            );
            let split = cx.year_split(row.at(1), row.at(4))?;
            Ok(rate.map(|var| (var, row.value(0) * split)))
        })?;
    }

    energy_balance(cx, domains, model)?;
    annual_energy_balance(cx, model)?;
    if cx.flags.trade {
        trade_reciprocity(domains, model)?;
    }
    Ok(())
}

/// Subtract `Σ_rr trade[r, rr, l, f, y] · route[r, rr, f, y]` from `expr`.
fn add_trade_terms(
    cx: &AssemblyContext,
    model: &Model,
    expr: &mut LinearExpr,
    (r, l, f, y): (&str, &str, &str, &str),
) -> EmodResult<()> {
    if !model.has_family(TRADE.name) {
        return Ok(());
    }
    let routes = cx.param("TradeRoute")?;
    for rr in cx.members(Dimension::Region) {
        if rr == r {
            continue;
        }
        let route = routes.value_or(&[r, rr.as_str(), f, y], 0.0);
        if route == 0.0 {
            continue;
        }
        if let Some(trade) = model.find_var(TRADE.name, &[r, rr.as_str(), l, f, y]) {
            expr.add_term(trade, -route);
        }
    }
    Ok(())
}

/// `production ≥ demand + use + Σ trade · route` per (r, l, f, y), enumerated
/// densely over every key that has production, use, demand or trade.
fn energy_balance(cx: &AssemblyContext, domains: &Domains, model: &mut Model) -> EmodResult<()> {
    let demand: HashMap<&Key, f64> = cx
        .table(DEMAND)?
        .rows()
        .iter()
        .map(|row| (&row.key, row.value(0)))
        .collect();

    let mut keys: BTreeSet<Key> = BTreeSet::new();
    keys.extend(domains.production.iter().cloned());
    keys.extend(domains.usage.iter().cloned());
    keys.extend(demand.keys().map(|k| (*k).clone()));
    keys.extend(
        domains
            .trade
            .iter()
            .map(|k| key(&[&k[0], &k[2], &k[3], &k[4]])),
    );

    build(model, "energy_balance", |model| {
        for k in keys {
            let (r, l, f, y) = (k[0].as_str(), k[1].as_str(), k[2].as_str(), k[3].as_str());
            if domains.is_nodal(cx.flags, r, f, y) {
                continue;
            }
            let mut expr = LinearExpr::new();
            if let Some(production) = model.find_var(PRODUCTION.name, &k) {
                expr.add_term(production, 1.0);
            }
            if let Some(usage) = model.find_var(USE.name, &k) {
                expr.add_term(usage, -1.0);
            }
            add_trade_terms(cx, model, &mut expr, (r, l, f, y))?;
            let rhs = demand.get(&k).copied().unwrap_or(0.0);
            model.add_constraint("energy_balance", k, expr, Relation::GreaterEq, rhs);
        }
        Ok(())
    })
}

/// Annual production covers accumulated (timeslice-free) demand.
fn annual_energy_balance(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let rows = cx.table(ACCUMULATED_DEMAND)?.rows();
    let timeslices = cx.members(Dimension::Timeslice);
    build(model, "annual_energy_balance", |model| {
        for row in rows {
            let (r, f, y) = (row.at(0), row.at(1), row.at(2));
            let mut expr = LinearExpr::new();
            for l in timeslices {
                let l = l.as_str();
                if let Some(production) = model.find_var(PRODUCTION.name, &[r, l, f, y]) {
                    expr.add_term(production, 1.0);
                }
                if let Some(usage) = model.find_var(USE.name, &[r, l, f, y]) {
                    expr.add_term(usage, -1.0);
                }
                add_trade_terms(cx, model, &mut expr, (r, l, f, y))?;
            }
            model.add_constraint(
                "annual_energy_balance",
                row.key.clone(),
                expr,
                Relation::GreaterEq,
                row.value(0),
            );
        }
        Ok(())
    })
}

/// `trade[r, rr] + trade[rr, r] == 0` for every route defined in both
/// directions. One-directional routes are reported and left unconstrained.
fn trade_reciprocity(domains: &Domains, model: &mut Model) -> EmodResult<()> {
    let mut one_way: BTreeSet<(String, String, String, String)> = BTreeSet::new();
    build(model, "trade_reciprocity", |model| {
        for k in &domains.trade {
            let (r, rr, l, f, y) = (&k[0], &k[1], &k[2], &k[3], &k[4]);
            let forward = model.var(TRADE.name, k)?;
            match model.find_var(TRADE.name, &[rr, r, l, f, y]) {
                Some(reverse) if r < rr => {
                    let expr = LinearExpr::from_term(forward, 1.0).with_term(reverse, 1.0);
                    let k = k.clone();
                    model.add_constraint("trade_reciprocity", k, expr, Relation::Equal, 0.0);
                }
                Some(_) => {}
                None => {
                    one_way.insert((r.clone(), rr.clone(), f.clone(), y.clone()));
                }
            }
        }
        Ok(())
    })?;
    for (r, rr, f, y) in one_way {
        warn!(
            from = %r,
            to = %rr,
            fuel = %f,
            year = %y,
            "trade route defined in one direction only; no reciprocity constraint"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assemble_store, base_store, producing_store};
    use emod_core::{Dimension, Relation};

    #[test]
    fn balance_covers_demand_without_production() {
        let store = base_store()
            .param("SpecifiedAnnualDemand", &["R1", "ELC", "2020"], 10.0)
            .param("SpecifiedDemandProfile", &["R1", "ELC", "DAY", "2020"], 1.0)
            .build()
            .unwrap();
        let model = assemble_store(&store);
        assert_eq!(model.constraint_count("energy_balance"), 1);
        let c = model.constraints_of("energy_balance").next().unwrap();
        assert!(c.lhs.terms().is_empty());
        assert_eq!(c.relation, Relation::GreaterEq);
        assert_eq!(c.rhs, 10.0);
    }

    #[test]
    fn production_chain_is_streamed_per_fuel_slice() {
        let model = assemble_store(&producing_store().build().unwrap());
        assert_eq!(model.constraint_count("rate_of_production_def"), 2);
        assert_eq!(model.constraint_count("production_def"), 2);
        assert_eq!(model.constraint_count("energy_balance"), 2);
        assert_eq!(model.constraint_count("production_by_technology_def"), 2);
        assert!(!model.has_family("use_by_technology"));
    }

    #[test]
    fn reciprocal_routes_are_linked_once() {
        let store = base_store()
            .set(Dimension::Region, ["R2", "R3"])
            .param("TradeRoute", &["R1", "R2", "ELC", "2020"], 1.0)
            .param("TradeRoute", &["R2", "R1", "ELC", "2020"], 1.0)
            .param("TradeRoute", &["R1", "R3", "ELC", "2020"], 1.0)
            .build()
            .unwrap();
        let model = assemble_store(&store);
        assert_eq!(model.family_len("trade"), 6);
        // R1↔R2 over two timeslices; R1→R3 has no reverse route
        assert_eq!(model.constraint_count("trade_reciprocity"), 2);
    }
}

//! Technology capacity: new, accumulated and total installed capacity.

use emod_core::{key, Dimension, EmodResult, LinearExpr, Model, Relation};

use super::{build, declare, define, family_keys, parse_year, product, AssemblyContext, Domains};
use crate::families::*;

pub(super) fn declare_variables(
    cx: &AssemblyContext,
    _domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    let rty = product(&[
        cx.members(Dimension::Region),
        cx.members(Dimension::Technology),
        cx.members(Dimension::Year),
    ]);
    declare(cx, model, NEW_CAPACITY, rty.clone())?;
    declare(cx, model, ACCUMULATED_NEW_CAPACITY, rty.clone())?;
    declare(cx, model, TOTAL_CAPACITY_ANNUAL, rty)?;

    let units = cx
        .param("CapacityOfOneTechnologyUnit")?
        .sorted_rows()
        .into_iter()
        .filter(|(_, size)| *size > 0.0)
        .map(|(k, _)| k.clone());
    declare(cx, model, NUMBER_OF_NEW_TECHNOLOGY_UNITS, units)?;
    Ok(())
}

pub(super) fn add_constraints(
    cx: &AssemblyContext,
    _domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    let years = cx
        .members(Dimension::Year)
        .iter()
        .map(|y| Ok((y, parse_year(y)?)))
        .collect::<EmodResult<Vec<_>>>()?;
    let life = cx.param("OperationalLife")?;
    let residual = cx.param("ResidualCapacity")?;

    build(model, "accumulated_new_capacity_def", |model| {
        for r in cx.members(Dimension::Region) {
            for t in cx.members(Dimension::Technology) {
                let lifetime = life.value_or(&[r, t], 1.0);
                for (y, year) in &years {
                    let target = model.var(ACCUMULATED_NEW_CAPACITY.name, &[r, t, *y])?;
                    let mut terms = Vec::new();
                    for (yy, built) in &years {
                        if built <= year && f64::from(year - built) < lifetime {
                            terms.push((Some(model.var(NEW_CAPACITY.name, &[r, t, *yy])?), 1.0));
                        }
                    }
                    let k = key(&[r, t, *y]);
                    define(model, "accumulated_new_capacity_def", target, k, &terms, 0.0);
                }
            }
        }
        Ok(())
    })?;

    build(model, "total_capacity_annual_def", |model| {
        for (r, t, y) in rty_keys(cx) {
            let target = model.var(TOTAL_CAPACITY_ANNUAL.name, &[r, t, y])?;
            let accumulated = model.var(ACCUMULATED_NEW_CAPACITY.name, &[r, t, y])?;
            define(
                model,
                "total_capacity_annual_def",
                target,
                key(&[r, t, y]),
                &[(Some(accumulated), 1.0)],
                residual.value_or(&[r, t, y], 0.0),
            );
        }
        Ok(())
    })?;

    if cx.flags.technology_units {
        let unit_size = cx.param("CapacityOfOneTechnologyUnit")?;
        build(model, "new_technology_units", |model| {
            for k in family_keys(model, NUMBER_OF_NEW_TECHNOLOGY_UNITS.name) {
                let units = model.var(NUMBER_OF_NEW_TECHNOLOGY_UNITS.name, &k)?;
                let new = model.var(NEW_CAPACITY.name, &k)?;
                let size = unit_size.value_or(&k, 0.0);
                define(model, "new_technology_units", new, k, &[(Some(units), size)], 0.0);
            }
            Ok(())
        })?;
    }

    for (family, param, variable, relation) in [
        ("max_capacity", "TotalAnnualMaxCapacity", TOTAL_CAPACITY_ANNUAL.name, Relation::LessEq),
        ("min_capacity", "TotalAnnualMinCapacity", TOTAL_CAPACITY_ANNUAL.name, Relation::GreaterEq),
        (
            "max_capacity_investment",
            "TotalAnnualMaxCapacityInvestment",
            NEW_CAPACITY.name,
            Relation::LessEq,
        ),
        (
            "min_capacity_investment",
            "TotalAnnualMinCapacityInvestment",
            NEW_CAPACITY.name,
            Relation::GreaterEq,
        ),
    ] {
        limit(cx, model, family, param, variable, relation)?;
    }
    Ok(())
}

fn rty_keys<'a>(
    cx: &AssemblyContext<'a>,
) -> impl Iterator<Item = (&'a String, &'a String, &'a String)> + 'a {
    let technologies = cx.members(Dimension::Technology);
    let years = cx.members(Dimension::Year);
    cx.members(Dimension::Region).iter().flat_map(move |r| {
        technologies
            .iter()
            .flat_map(move |t| years.iter().map(move |y| (r, t, y)))
    })
}

/// `var[k] (rel) limit[k]` for every explicit row of `param` whose variable exists.
pub(super) fn limit(
    cx: &AssemblyContext,
    model: &mut Model,
    family: &'static str,
    param: &str,
    variable: &'static str,
    relation: Relation,
) -> EmodResult<()> {
    let limits = cx.param(param)?;
    build(model, family, |model| {
        for (k, bound) in limits.sorted_rows() {
            if let Some(var) = model.find_var(variable, k) {
                let expr = LinearExpr::from_term(var, 1.0);
                model.add_constraint(family, k.clone(), expr, relation, bound);
            }
        }
        Ok(())
    })
}

//! Technology costs, discounting and the per-region total that the
//! objective minimizes.

use emod_core::{key, Dimension, EmodResult, Model};

use super::{build, declare, define, parse_year, product, stream_definition};
use super::{AssemblyContext, Domains};
use crate::families::*;
use crate::queries::VARIABLE_COST_TERMS;

/// `(1 + d)^(y − y0)`
pub(super) fn capital_factor(rate: f64, year: i32, first: i32) -> f64 {
    (1.0 + rate).powi(year - first)
}

/// `(1 + d)^(y − y0 + 0.5)`, costs incurred mid-year.
pub(super) fn operating_factor(rate: f64, year: i32, first: i32) -> f64 {
    (1.0 + rate).powf(f64::from(year - first) + 0.5)
}

/// `(1 + d)^(1 + yN − y0)`, salvage realized after the horizon.
pub(super) fn salvage_factor(rate: f64, first: i32, last: i32) -> f64 {
    (1.0 + rate).powi(1 + last - first)
}

/// Share of an investment made in `year` still undepreciated after `last`.
///
/// Method 2 (or a zero rate) depreciates straight-line, anything else uses a
/// sinking fund.
pub(super) fn salvage_fraction(rate: f64, method: f64, life: f64, year: i32, last: i32) -> f64 {
    if life <= 0.0 || f64::from(year) + life - 1.0 <= f64::from(last) {
        return 0.0;
    }
    let used = f64::from(last - year + 1);
    if method == 2.0 || rate == 0.0 {
        1.0 - used / life
    } else {
        1.0 - ((1.0 + rate).powf(used) - 1.0) / ((1.0 + rate).powf(life) - 1.0)
    }
}

pub(super) fn declare_variables(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    let rty = product(&[
        cx.members(Dimension::Region),
        cx.members(Dimension::Technology),
        cx.members(Dimension::Year),
    ]);
    for spec in [
        CAPITAL_INVESTMENT,
        DISCOUNTED_CAPITAL_INVESTMENT,
        SALVAGE_VALUE,
        DISCOUNTED_SALVAGE_VALUE,
        ANNUAL_FIXED_OPERATING_COST,
    ] {
        declare(cx, model, spec, rty.clone())?;
    }
    declare(
        cx,
        model,
        ANNUAL_VARIABLE_OPERATING_COST,
        domains.variable_cost.clone(),
    )?;
    for spec in [
        OPERATING_COST,
        DISCOUNTED_OPERATING_COST,
        TOTAL_DISCOUNTED_COST_BY_TECHNOLOGY,
    ] {
        declare(cx, model, spec, rty.clone())?;
    }
    declare(
        cx,
        model,
        TOTAL_DISCOUNTED_COST,
        product(&[cx.members(Dimension::Region), cx.members(Dimension::Year)]),
    )?;
    Ok(())
}

pub(super) fn add_constraints(
    cx: &AssemblyContext,
    _domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    let rty = product(&[
        cx.members(Dimension::Region),
        cx.members(Dimension::Technology),
        cx.members(Dimension::Year),
    ]);
    if cx.members(Dimension::Year).is_empty() {
        return Ok(());
    }
    let first = cx.first_year()?;
    let last = cx.last_year()?;
    let capital_cost = cx.param("CapitalCost")?;
    let fixed_cost = cx.param("FixedCost")?;
    let life = cx.param("OperationalLife")?;
    let method = cx.param("DepreciationMethod")?;

    build(model, "capital_investment_def", |model| {
        for k in &rty {
            let target = model.var(CAPITAL_INVESTMENT.name, k)?;
            let new = model.var(NEW_CAPACITY.name, k)?;
            let cost = capital_cost.value_or(k, 0.0);
            define(model, "capital_investment_def", target, k.clone(), &[(Some(new), cost)], 0.0);
        }
        Ok(())
    })?;

    build(model, "discounted_capital_investment_def", |model| {
        for k in &rty {
            let year = parse_year(&k[2])?;
            let factor = capital_factor(cx.discount_rate(&k[0])?, year, first);
            let target = model.var(DISCOUNTED_CAPITAL_INVESTMENT.name, k)?;
            let investment = model.var(CAPITAL_INVESTMENT.name, k)?;
            define(
                model,
                "discounted_capital_investment_def",
                target,
                k.clone(),
                &[(Some(investment), 1.0 / factor)],
                0.0,
            );
        }
        Ok(())
    })?;

    build(model, "salvage_value_def", |model| {
        for k in &rty {
            let (r, t) = (&k[0], &k[1]);
            let year = parse_year(&k[2])?;
            let fraction = salvage_fraction(
                cx.discount_rate(r)?,
                method.value_or(&[r], 1.0),
                life.value_or(&[r, t], 1.0),
                year,
                last,
            );
            let target = model.var(SALVAGE_VALUE.name, k)?;
            let new = model.var(NEW_CAPACITY.name, k)?;
            let cost = capital_cost.value_or(k, 0.0) * fraction;
            define(model, "salvage_value_def", target, k.clone(), &[(Some(new), cost)], 0.0);
        }
        Ok(())
    })?;

    build(model, "discounted_salvage_value_def", |model| {
        for k in &rty {
            let factor = salvage_factor(cx.discount_rate(&k[0])?, first, last);
            let target = model.var(DISCOUNTED_SALVAGE_VALUE.name, k)?;
            let salvage = model.var(SALVAGE_VALUE.name, k)?;
            define(
                model,
                "discounted_salvage_value_def",
                target,
                k.clone(),
                &[(Some(salvage), 1.0 / factor)],
                0.0,
            );
        }
        Ok(())
    })?;

    build(model, "annual_fixed_operating_cost_def", |model| {
        for k in &rty {
            let target = model.var(ANNUAL_FIXED_OPERATING_COST.name, k)?;
            let capacity = model.var(TOTAL_CAPACITY_ANNUAL.name, k)?;
            let cost = fixed_cost.value_or(k, 0.0);
            define(
                model,
                "annual_fixed_operating_cost_def",
                target,
                k.clone(),
                &[(Some(capacity), cost)],
                0.0,
            );
        }
        Ok(())
    })?;

    // (r, t, y, m) rows → annual activity by mode [r, t, m, y]
    stream_definition(
        model,
        "annual_variable_operating_cost_def",
        ANNUAL_VARIABLE_OPERATING_COST.name,
        cx.table(VARIABLE_COST_TERMS)?.rows(),
        3,
        |model, row| {
            let by_mode = model.find_var(
                TOTAL_ANNUAL_TECHNOLOGY_ACTIVITY_BY_MODE.name,
                &[row.at(0), row.at(1), row.at(3), row.at(2)],
            );
            Ok(by_mode.map(|var| (var, row.value(0))))
        },
    )?;

    build(model, "operating_cost_def", |model| {
        for k in &rty {
            let target = model.var(OPERATING_COST.name, k)?;
            let fixed = model.var(ANNUAL_FIXED_OPERATING_COST.name, k)?;
            let variable = model.find_var(ANNUAL_VARIABLE_OPERATING_COST.name, k);
            define(
                model,
                "operating_cost_def",
                target,
                k.clone(),
                &[(Some(fixed), 1.0), (variable, 1.0)],
                0.0,
            );
        }
        Ok(())
    })?;

    build(model, "discounted_operating_cost_def", |model| {
        for k in &rty {
            let year = parse_year(&k[2])?;
            let factor = operating_factor(cx.discount_rate(&k[0])?, year, first);
            let target = model.var(DISCOUNTED_OPERATING_COST.name, k)?;
            let operating = model.var(OPERATING_COST.name, k)?;
            define(
                model,
                "discounted_operating_cost_def",
                target,
                k.clone(),
                &[(Some(operating), 1.0 / factor)],
                0.0,
            );
        }
        Ok(())
    })?;

    build(model, "total_discounted_cost_by_technology_def", |model| {
        for k in &rty {
            let target = model.var(TOTAL_DISCOUNTED_COST_BY_TECHNOLOGY.name, k)?;
            let terms = [
                (Some(model.var(DISCOUNTED_CAPITAL_INVESTMENT.name, k)?), 1.0),
                (Some(model.var(DISCOUNTED_OPERATING_COST.name, k)?), 1.0),
                (Some(model.var(DISCOUNTED_SALVAGE_VALUE.name, k)?), -1.0),
                (
                    model.find_var(DISCOUNTED_TECHNOLOGY_EMISSIONS_PENALTY.name, k),
                    1.0,
                ),
            ];
            define(
                model,
                "total_discounted_cost_by_technology_def",
                target,
                k.clone(),
                &terms,
                0.0,
            );
        }
        Ok(())
    })?;

    let technologies = cx.members(Dimension::Technology);
    let storages = cx.members(Dimension::Storage);
    let nodes = cx.store.nodes();
    build(model, "total_discounted_cost_def", |model| {
        for r in cx.members(Dimension::Region) {
            for y in cx.members(Dimension::Year) {
                let target = model.var(TOTAL_DISCOUNTED_COST.name, &[r, y])?;
                let mut terms = Vec::new();
                for t in technologies {
                    terms.push((
                        model.find_var(TOTAL_DISCOUNTED_COST_BY_TECHNOLOGY.name, &[r, t, y]),
                        1.0,
                    ));
                }
                for s in storages {
                    terms.push((
                        model.find_var(TOTAL_DISCOUNTED_STORAGE_COST.name, &[r, s, y]),
                        1.0,
                    ));
                }
                for node in nodes.iter().filter(|node| &node.r == r) {
                    terms.push((
                        model.find_var(TOTAL_DISCOUNTED_TRANSMISSION_COST.name, &[&node.id, y]),
                        1.0,
                    ));
                }
                define(model, "total_discounted_cost_def", target, key(&[r, y]), &terms, 0.0);
            }
        }
        Ok(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assemble_store, base_store};
    use super::*;
    use emod_core::Relation;

    #[test]
    fn discount_factors() {
        assert_eq!(capital_factor(0.05, 2020, 2020), 1.0);
        assert!((capital_factor(0.1, 2022, 2020) - 1.21).abs() < 1e-12);
        assert!((operating_factor(0.0, 2030, 2020) - 1.0).abs() < 1e-12);
        assert!((salvage_factor(0.1, 2020, 2020) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn salvage_only_when_life_extends_past_horizon() {
        // built in the last year with a 10 year life: 9/10 remain
        assert!((salvage_fraction(0.0, 1.0, 10.0, 2030, 2030) - 0.9).abs() < 1e-12);
        assert!((salvage_fraction(0.05, 2.0, 10.0, 2030, 2030) - 0.9).abs() < 1e-12);
        assert_eq!(salvage_fraction(0.05, 1.0, 5.0, 2020, 2030), 0.0);
        let sinking = salvage_fraction(0.05, 1.0, 10.0, 2030, 2030);
        assert!(sinking > 0.9 && sinking < 1.0);
    }

    #[test]
    fn capital_investment_is_cost_times_new_capacity() {
        let store = base_store()
            .set(emod_core::Dimension::Year, ["2021"])
            .param("CapitalCost", &["R1", "T1", "2020"], 100.0)
            .param("CapitalCost", &["R1", "T1", "2021"], 90.0)
            .build()
            .unwrap();
        let model = assemble_store(&store);
        assert_eq!(model.constraint_count("capital_investment_def"), 2);
        let new_2021 = model.var("new_capacity", &["R1", "T1", "2021"]).unwrap();
        let c = model
            .constraints_of("capital_investment_def")
            .find(|c| c.key[2] == "2021")
            .unwrap();
        assert_eq!(c.relation, Relation::Equal);
        assert_eq!(c.rhs, 0.0);
        assert!(c.lhs.terms().contains(&(new_2021, -90.0)));
    }
}

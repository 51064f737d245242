//! Reserve margin and minimum renewable production targets.

use emod_core::{key, EmodResult, LinearExpr, Model, Relation};

use super::{build, declare, family_keys, stream_definition, AssemblyContext, Domains};
use crate::families::*;
use crate::queries::{RESERVE_FUEL_TERMS, RESERVE_TECH_TERMS, RE_FUEL_TERMS, RE_TECH_TERMS};

pub(super) fn declare_variables(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    declare(
        cx,
        model,
        TOTAL_CAPACITY_IN_RESERVE_MARGIN,
        domains.reserve_capacity.clone(),
    )?;
    declare(
        cx,
        model,
        DEMAND_NEEDING_RESERVE_MARGIN,
        domains.reserve_demand.clone(),
    )?;
    declare(cx, model, TOTAL_RE_PRODUCTION_ANNUAL, domains.re_production.clone())?;
    declare(
        cx,
        model,
        RE_TOTAL_PRODUCTION_OF_TARGET_FUEL_ANNUAL,
        domains.re_target_fuel.clone(),
    )?;
    Ok(())
}

pub(super) fn add_constraints(
    cx: &AssemblyContext,
    _domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    if cx.flags.reserve_margin {
        reserve_margin(cx, model)?;
    }
    if cx.flags.re_target {
        renewable_target(cx, model)?;
    }
    Ok(())
}

fn reserve_margin(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    // (r, y, t) rows → total_capacity_annual[r, t, y]
    stream_definition(
        model,
        "reserve_margin_capacity_def",
        TOTAL_CAPACITY_IN_RESERVE_MARGIN.name,
        cx.table(RESERVE_TECH_TERMS)?.rows(),
        2,
        |model, row| {
            let capacity =
                model.find_var(TOTAL_CAPACITY_ANNUAL.name, &[row.at(0), row.at(2), row.at(1)]);
            Ok(capacity.map(|var| (var, row.value(0))))
        },
    )?;

    // (r, l, y, f) rows → rate_of_production[r, l, f, y]
    stream_definition(
        model,
        "reserve_margin_demand_def",
        DEMAND_NEEDING_RESERVE_MARGIN.name,
        cx.table(RESERVE_FUEL_TERMS)?.rows(),
        3,
        |model, row| {
            let production = model.find_var(
                RATE_OF_PRODUCTION.name,
                &[row.at(0), row.at(1), row.at(3), row.at(2)],
            );
            Ok(production.map(|var| (var, row.value(0))))
        },
    )?;

    // demand · margin ≤ reserve capacity, per timeslice
    let margins = cx.param("ReserveMargin")?;
    build(model, "reserve_margin", |model| {
        for k in family_keys(model, DEMAND_NEEDING_RESERVE_MARGIN.name) {
            let (r, y) = (&k[0], &k[2]);
            let margin = margins.value_or(&[r, y], 0.0);
            if margin <= 0.0 {
                continue;
            }
            let demand = model.var(DEMAND_NEEDING_RESERVE_MARGIN.name, &k)?;
            let mut expr = LinearExpr::from_term(demand, margin);
            if let Some(capacity) = model.find_var(TOTAL_CAPACITY_IN_RESERVE_MARGIN.name, &[r, y]) {
                expr.add_term(capacity, -1.0);
            }
            model.add_constraint("reserve_margin", k, expr, Relation::LessEq, 0.0);
        }
        Ok(())
    })
}

fn renewable_target(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    // (r, y, l, t, f) rows → production_by_technology[r, l, t, f, y]
    stream_definition(
        model,
        "re_production_def",
        TOTAL_RE_PRODUCTION_ANNUAL.name,
        cx.table(RE_TECH_TERMS)?.rows(),
        2,
        |model, row| {
            let production = model.find_var(
                PRODUCTION_BY_TECHNOLOGY.name,
                &[row.at(0), row.at(2), row.at(3), row.at(4), row.at(1)],
            );
            Ok(production.map(|var| (var, row.value(0))))
        },
    )?;

    // (r, y, l, f) rows → production[r, l, f, y]
    stream_definition(
        model,
        "re_target_fuel_def",
        RE_TOTAL_PRODUCTION_OF_TARGET_FUEL_ANNUAL.name,
        cx.table(RE_FUEL_TERMS)?.rows(),
        2,
        |model, row| {
            let production = model.find_var(
                PRODUCTION.name,
                &[row.at(0), row.at(2), row.at(3), row.at(1)],
            );
            Ok(production.map(|var| (var, row.value(0))))
        },
    )?;

    // renewable production ≥ target share of tagged fuel production
    let targets = cx.param("REMinProductionTarget")?;
    build(model, "re_min_production", |model| {
        for (k, share) in targets.sorted_rows() {
            if share <= 0.0 {
                continue;
            }
            let (r, y) = (&k[0], &k[1]);
            let mut expr = LinearExpr::new();
            if let Some(renewable) = model.find_var(TOTAL_RE_PRODUCTION_ANNUAL.name, &[r, y]) {
                expr.add_term(renewable, 1.0);
            }
            let tagged = model.find_var(RE_TOTAL_PRODUCTION_OF_TARGET_FUEL_ANNUAL.name, &[r, y]);
            if let Some(tagged) = tagged {
                expr.add_term(tagged, -share);
            }
            model.add_constraint("re_min_production", key(&[r, y]), expr, Relation::GreaterEq, 0.0);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assemble_store, producing_store};
    use emod_core::Relation;

    #[test]
    fn reserve_margin_scales_demand_per_slice() {
        let store = producing_store()
            .param("ReserveMargin", &["R1", "2020"], 1.2)
            .param("ReserveMarginTagTechnology", &["R1", "T1", "2020"], 1.0)
            .param("ReserveMarginTagFuel", &["R1", "ELC", "2020"], 1.0)
            .build()
            .unwrap();
        let model = assemble_store(&store);
        assert_eq!(model.constraint_count("reserve_margin_capacity_def"), 1);
        assert_eq!(model.constraint_count("reserve_margin_demand_def"), 2);
        assert_eq!(model.constraint_count("reserve_margin"), 2);
        let c = model.constraints_of("reserve_margin").next().unwrap();
        assert_eq!(c.relation, Relation::LessEq);
        let demand = model
            .var("demand_needing_reserve_margin", &["R1", "DAY", "2020"])
            .unwrap();
        assert!(c.lhs.terms().contains(&(demand, 1.2)));
    }

    #[test]
    fn renewable_target_requires_production_by_technology() {
        let store = producing_store()
            .param("REMinProductionTarget", &["R1", "2020"], 0.5)
            .param("RETagTechnology", &["R1", "T1", "2020"], 1.0)
            .param("RETagFuel", &["R1", "ELC", "2020"], 1.0)
            .build()
            .unwrap();
        let model = assemble_store(&store);
        assert!(model.has_family("production_by_technology"));
        assert_eq!(model.constraint_count("re_production_def"), 1);
        assert_eq!(model.constraint_count("re_target_fuel_def"), 1);
        let c = model.constraints_of("re_min_production").next().unwrap();
        assert_eq!(c.relation, Relation::GreaterEq);
        assert_eq!(c.lhs.terms().len(), 2);
    }

    #[test]
    fn targets_absent_without_flags() {
        let model = assemble_store(&producing_store().build().unwrap());
        assert!(!model.has_family("total_capacity_in_reserve_margin"));
        assert!(!model.has_family("total_re_production_annual"));
        assert_eq!(model.constraint_count("reserve_margin"), 0);
    }
}

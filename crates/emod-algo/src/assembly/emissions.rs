//! Emissions per technology and region, their penalties and limits.

use emod_core::{Dimension, EmodResult, LinearExpr, Model, Relation};

use super::capacity::limit;
use super::costs::operating_factor;
use super::{build, declare, define, family_keys, parse_year, product, stream_definition};
use super::{AssemblyContext, Domains};
use crate::families::*;
use crate::queries::{EMISSION_PENALTY_TERMS, EMISSION_TERMS};

pub(super) fn declare_variables(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    declare(cx, model, ANNUAL_TECHNOLOGY_EMISSION, domains.emissions.clone())?;
    declare(
        cx,
        model,
        ANNUAL_TECHNOLOGY_EMISSIONS_PENALTY,
        domains.emission_penalty.clone(),
    )?;
    declare(
        cx,
        model,
        DISCOUNTED_TECHNOLOGY_EMISSIONS_PENALTY,
        domains.emission_penalty.clone(),
    )?;
    declare(cx, model, ANNUAL_EMISSIONS, domains.annual_emissions.clone())?;
    declare(
        cx,
        model,
        MODEL_PERIOD_EMISSIONS,
        product(&[
            cx.members(Dimension::Region),
            cx.members(Dimension::Emission),
        ]),
    )?;
    Ok(())
}

pub(super) fn add_constraints(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    // (r, t, e, y, m) rows → activity by mode [r, t, m, y]
    stream_definition(
        model,
        "annual_technology_emission_def",
        ANNUAL_TECHNOLOGY_EMISSION.name,
        cx.table(EMISSION_TERMS)?.rows(),
        4,
        |model, row| {
            let by_mode = model.find_var(
                TOTAL_ANNUAL_TECHNOLOGY_ACTIVITY_BY_MODE.name,
                &[row.at(0), row.at(1), row.at(4), row.at(3)],
            );
            Ok(by_mode.map(|var| (var, row.value(0))))
        },
    )?;

    // (r, t, y, e) rows → technology emission [r, t, e, y]
    stream_definition(
        model,
        "annual_technology_emissions_penalty_def",
        ANNUAL_TECHNOLOGY_EMISSIONS_PENALTY.name,
        cx.table(EMISSION_PENALTY_TERMS)?.rows(),
        3,
        |model, row| {
            let emission = model.find_var(
                ANNUAL_TECHNOLOGY_EMISSION.name,
                &[row.at(0), row.at(1), row.at(3), row.at(2)],
            );
            Ok(emission.map(|var| (var, row.value(0))))
        },
    )?;

    let penalties = family_keys(model, DISCOUNTED_TECHNOLOGY_EMISSIONS_PENALTY.name);
    if !penalties.is_empty() {
        let first = cx.first_year()?;
        build(model, "discounted_technology_emissions_penalty_def", |model| {
            for k in penalties {
                let factor = operating_factor(cx.discount_rate(&k[0])?, parse_year(&k[2])?, first);
                let target = model.var(DISCOUNTED_TECHNOLOGY_EMISSIONS_PENALTY.name, &k)?;
                let penalty = model.var(ANNUAL_TECHNOLOGY_EMISSIONS_PENALTY.name, &k)?;
                define(
                    model,
                    "discounted_technology_emissions_penalty_def",
                    target,
                    k,
                    &[(Some(penalty), 1.0 / factor)],
                    0.0,
                );
            }
            Ok(())
        })?;
    } else {
        model.touch_constraint_family("discounted_technology_emissions_penalty_def");
    }

    // (r, e, y, t) rows → technology emission [r, t, e, y]
    stream_definition(
        model,
        "annual_emissions_def",
        ANNUAL_EMISSIONS.name,
        &domains.emission_rows,
        3,
        |model, row| {
            let emission = model.find_var(
                ANNUAL_TECHNOLOGY_EMISSION.name,
                &[row.at(0), row.at(3), row.at(1), row.at(2)],
            );
            Ok(emission.map(|var| (var, 1.0)))
        },
    )?;

    // annual_emissions + exogenous ≤ limit; an absent family still binds the
    // exogenous part
    let limits = cx.param("AnnualEmissionLimit")?;
    let exogenous = cx.param("AnnualExogenousEmission")?;
    build(model, "annual_emission_limit", |model| {
        for (k, bound) in limits.sorted_rows() {
            let mut expr = LinearExpr::new();
            if let Some(annual) = model.find_var(ANNUAL_EMISSIONS.name, k) {
                expr.add_term(annual, 1.0);
            }
            let rhs = bound - exogenous.value_or(k, 0.0);
            model.add_constraint("annual_emission_limit", k.clone(), expr, Relation::LessEq, rhs);
        }
        Ok(())
    })?;

    if cx.flags.model_period_emission_limits {
        let years = cx.members(Dimension::Year);
        let period_exogenous = cx.param("ModelPeriodExogenousEmission")?;
        let annual_exogenous = exogenous;
        build(model, "model_period_emissions_def", |model| {
            for k in family_keys(model, MODEL_PERIOD_EMISSIONS.name) {
                let (r, e) = (&k[0], &k[1]);
                let target = model.var(MODEL_PERIOD_EMISSIONS.name, &k)?;
                let mut rhs = period_exogenous.value_or(&[r, e], 0.0);
                let mut terms = Vec::with_capacity(years.len());
                for y in years {
                    terms.push((model.find_var(ANNUAL_EMISSIONS.name, &[r, e, y]), 1.0));
                    rhs += annual_exogenous.value_or(&[r, e, y], 0.0);
                }
                define(model, "model_period_emissions_def", target, k, &terms, rhs);
            }
            Ok(())
        })?;
        limit(
            cx,
            model,
            "model_period_emission_limit",
            "ModelPeriodEmissionLimit",
            MODEL_PERIOD_EMISSIONS.name,
            Relation::LessEq,
        )?;
    }
    Ok(())
}

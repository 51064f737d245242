//! Technology activity: per-mode rates, totals and their capacity limits.

use emod_core::{key, Dimension, EmodResult, LinearExpr, Model, Relation};

use super::capacity::limit;
use super::{build, declare, define, family_keys, prefixes_of_rows, product, stream_definition};
use super::{AssemblyContext, Domains};
use crate::families::*;

pub(super) fn declare_variables(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    let timeslices = cx.members(Dimension::Timeslice);
    let rate_keys = domains.activity.iter().flat_map(|k| {
        timeslices
            .iter()
            .map(move |l| key(&[&k[0], l, &k[1], &k[3], &k[2]]))
    });
    declare(cx, model, RATE_OF_ACTIVITY, rate_keys)?;
    declare(
        cx,
        model,
        RATE_OF_TOTAL_ACTIVITY,
        prefixes_of_rows(&domains.activity_rows, 4),
    )?;
    declare(
        cx,
        model,
        TOTAL_TECHNOLOGY_ANNUAL_ACTIVITY,
        domains.active_technologies.clone(),
    )?;
    declare(
        cx,
        model,
        TOTAL_ANNUAL_TECHNOLOGY_ACTIVITY_BY_MODE,
        domains
            .activity
            .iter()
            .map(|k| key(&[&k[0], &k[1], &k[3], &k[2]])),
    )?;
    declare(
        cx,
        model,
        TOTAL_TECHNOLOGY_MODEL_PERIOD_ACTIVITY,
        product(&[
            cx.members(Dimension::Region),
            cx.members(Dimension::Technology),
        ]),
    )?;
    Ok(())
}

pub(super) fn add_constraints(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    let timeslices = cx.members(Dimension::Timeslice);

    // rows are (r, t, l, y, m); rate_of_activity is keyed (r, l, t, m, y)
    stream_definition(
        model,
        "rate_of_total_activity_def",
        RATE_OF_TOTAL_ACTIVITY.name,
        &domains.activity_rows,
        4,
        |model, row| {
            let rate = model.find_var(
                RATE_OF_ACTIVITY.name,
                &[row.at(0), row.at(2), row.at(1), row.at(4), row.at(3)],
            );
            Ok(rate.map(|var| (var, 1.0)))
        },
    )?;

    let capacity_factor = cx.param("CapacityFactor")?;
    let activity_unit = cx.param("CapacityToActivityUnit")?;
    build(model, "capacity_adequacy", |model| {
        for k in family_keys(model, RATE_OF_TOTAL_ACTIVITY.name) {
            let (r, t, l, y) = (&k[0], &k[1], &k[2], &k[3]);
            let total = model.var(RATE_OF_TOTAL_ACTIVITY.name, &k)?;
            let capacity = model.var(TOTAL_CAPACITY_ANNUAL.name, &[r, t, y])?;
            let factor = capacity_factor.value_or(&[r, t, l, y], 1.0)
                * activity_unit.value_or(&[r, t], 1.0);
            let expr = LinearExpr::from_term(total, 1.0).with_term(capacity, -factor);
            model.add_constraint("capacity_adequacy", k, expr, Relation::LessEq, 0.0);
        }
        Ok(())
    })?;

    build(model, "total_annual_activity_def", |model| {
        for k in &domains.active_technologies {
            let (r, t, y) = (&k[0], &k[1], &k[2]);
            let target = model.var(TOTAL_TECHNOLOGY_ANNUAL_ACTIVITY.name, k)?;
            let mut terms = Vec::with_capacity(timeslices.len());
            for l in timeslices {
                terms.push((
                    model.find_var(RATE_OF_TOTAL_ACTIVITY.name, &[r, t, l, y]),
                    cx.year_split(l, y)?,
                ));
            }
            define(model, "total_annual_activity_def", target, k.clone(), &terms, 0.0);
        }
        Ok(())
    })?;

    build(model, "annual_activity_by_mode_def", |model| {
        for k in &domains.activity {
            let (r, t, y, m) = (&k[0], &k[1], &k[2], &k[3]);
            let target = model.var(TOTAL_ANNUAL_TECHNOLOGY_ACTIVITY_BY_MODE.name, &[r, t, m, y])?;
            let mut terms = Vec::with_capacity(timeslices.len());
            for l in timeslices {
                terms.push((
                    model.find_var(RATE_OF_ACTIVITY.name, &[r, l, t, m, y]),
                    cx.year_split(l, y)?,
                ));
            }
            define(model, "annual_activity_by_mode_def", target, key(&[r, t, m, y]), &terms, 0.0);
        }
        Ok(())
    })?;

    let availability = cx.param("AvailabilityFactor")?;
    build(model, "availability", |model| {
        for k in &domains.active_technologies {
            let (r, t, y) = (&k[0], &k[1], &k[2]);
            let annual = model.var(TOTAL_TECHNOLOGY_ANNUAL_ACTIVITY.name, k)?;
            let capacity = model.var(TOTAL_CAPACITY_ANNUAL.name, k)?;
            let factor =
                availability.value_or(&[r, t, y], 1.0) * activity_unit.value_or(&[r, t], 1.0);
            let expr = LinearExpr::from_term(annual, 1.0).with_term(capacity, -factor);
            model.add_constraint("availability", k.clone(), expr, Relation::LessEq, 0.0);
        }
        Ok(())
    })?;

    limit(
        cx,
        model,
        "annual_activity_upper_limit",
        "TotalTechnologyAnnualActivityUpperLimit",
        TOTAL_TECHNOLOGY_ANNUAL_ACTIVITY.name,
        Relation::LessEq,
    )?;
    limit(
        cx,
        model,
        "annual_activity_lower_limit",
        "TotalTechnologyAnnualActivityLowerLimit",
        TOTAL_TECHNOLOGY_ANNUAL_ACTIVITY.name,
        Relation::GreaterEq,
    )?;

    if cx.flags.model_period_activity_limits {
        let years = cx.members(Dimension::Year);
        build(model, "model_period_activity_def", |model| {
            for k in family_keys(model, TOTAL_TECHNOLOGY_MODEL_PERIOD_ACTIVITY.name) {
                let target = model.var(TOTAL_TECHNOLOGY_MODEL_PERIOD_ACTIVITY.name, &k)?;
                let terms: Vec<_> = years
                    .iter()
                    .map(|y| {
                        let rty = [&k[0], &k[1], y];
                        (model.find_var(TOTAL_TECHNOLOGY_ANNUAL_ACTIVITY.name, &rty), 1.0)
                    })
                    .collect();
                define(model, "model_period_activity_def", target, k, &terms, 0.0);
            }
            Ok(())
        })?;
        limit(
            cx,
            model,
            "model_period_activity_upper_limit",
            "TotalTechnologyModelPeriodActivityUpperLimit",
            TOTAL_TECHNOLOGY_MODEL_PERIOD_ACTIVITY.name,
            Relation::LessEq,
        )?;
        limit(
            cx,
            model,
            "model_period_activity_lower_limit",
            "TotalTechnologyModelPeriodActivityLowerLimit",
            TOTAL_TECHNOLOGY_MODEL_PERIOD_ACTIVITY.name,
            Relation::GreaterEq,
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assemble_store, assemble_with, base_store, producing_store};
    use emod_core::ScenarioFlags;

    #[test]
    fn activity_is_restricted_to_ratio_combinations() {
        let store = producing_store()
            .set(emod_core::Dimension::Technology, ["IDLE"])
            .build()
            .unwrap();
        let model = assemble_store(&store);
        // one (r, t, y, m) combination over two timeslices
        assert_eq!(model.family_len("rate_of_activity"), 2);
        assert_eq!(model.constraint_count("rate_of_total_activity_def"), 2);
        assert_eq!(model.constraint_count("capacity_adequacy"), 2);
        assert!(model.find_var("rate_of_activity", &["R1", "DAY", "IDLE", "1", "2020"]).is_none());
    }

    #[test]
    fn unrestricted_activity_spans_the_full_product() {
        let store = producing_store()
            .set(emod_core::Dimension::Technology, ["IDLE"])
            .build()
            .unwrap();
        let scenario = ScenarioFlags {
            restrict_vars: false,
            ..ScenarioFlags::default()
        };
        let model = assemble_with(&store, &scenario);
        assert_eq!(model.family_len("rate_of_activity"), 4);
        assert!(model.find_var("rate_of_activity", &["R1", "DAY", "IDLE", "1", "2020"]).is_some());
    }

    #[test]
    fn model_period_family_only_with_limits() {
        let plain = assemble_store(&base_store().build().unwrap());
        assert!(!plain.has_family("total_technology_model_period_activity"));
        assert_eq!(plain.constraint_count("model_period_activity_def"), 0);

        let limited = base_store()
            .param("TotalTechnologyModelPeriodActivityUpperLimit", &["R1", "T1"], 10.0)
            .build()
            .unwrap();
        let model = assemble_store(&limited);
        assert_eq!(model.family_len("total_technology_model_period_activity"), 1);
        assert_eq!(model.constraint_count("model_period_activity_upper_limit"), 1);
    }
}

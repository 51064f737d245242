//! Storage: charge and discharge rates, the chained storage levels across the
//! time-slice hierarchy, storage capacity and its discounted cost.

use emod_core::{key, Dimension, EmodResult, Key, LinearExpr, Model, Relation, VarId};

use super::costs::{capital_factor, salvage_factor, salvage_fraction};
use super::{build, declare, define, family_keys, parse_year, product, stream_definition};
use super::{AssemblyContext, Domains};
use crate::families::*;
use crate::queries::{STORAGE_CHARGE_TERMS, STORAGE_DISCHARGE_TERMS};
use crate::timeslice::StartCase;

pub(super) fn declare_variables(
    cx: &AssemblyContext,
    domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    let regions = cx.members(Dimension::Region);
    let storages = cx.members(Dimension::Storage);
    let years = cx.members(Dimension::Year);
    let rsy = product(&[regions, storages, years]);

    declare(cx, model, RATE_OF_STORAGE_CHARGE, domains.storage_charge.clone())?;
    declare(cx, model, RATE_OF_STORAGE_DISCHARGE, domains.storage_discharge.clone())?;
    declare(cx, model, STORAGE_LEVEL_YEAR_START, rsy.clone())?;
    declare(cx, model, STORAGE_LEVEL_YEAR_END, rsy.clone())?;

    let mut tg1_keys = Vec::new();
    let mut tg2_keys = Vec::new();
    for r in regions {
        for s in storages {
            for y in years {
                for tg1 in cx.hierarchy.group1() {
                    tg1_keys.push(key(&[r, s, &tg1.id, y]));
                    for tg2 in cx.hierarchy.group2_in(&tg1.id) {
                        tg2_keys.push(key(&[r, s, &tg1.id, &tg2.id, y]));
                    }
                }
            }
        }
    }
    declare(cx, model, STORAGE_LEVEL_TG1_START, tg1_keys.clone())?;
    declare(cx, model, STORAGE_LEVEL_TG1_END, tg1_keys)?;
    declare(cx, model, STORAGE_LEVEL_TG2_START, tg2_keys.clone())?;
    declare(cx, model, STORAGE_LEVEL_TG2_END, tg2_keys)?;
    declare(
        cx,
        model,
        STORAGE_LEVEL_TS_START,
        product(&[regions, storages, cx.members(Dimension::Timeslice), years]),
    )?;

    for spec in [
        NEW_STORAGE_CAPACITY,
        ACCUMULATED_NEW_STORAGE_CAPACITY,
        STORAGE_UPPER_LIMIT,
        STORAGE_LOWER_LIMIT,
        CAPITAL_INVESTMENT_STORAGE,
        DISCOUNTED_CAPITAL_INVESTMENT_STORAGE,
        SALVAGE_VALUE_STORAGE,
        DISCOUNTED_SALVAGE_VALUE_STORAGE,
        TOTAL_DISCOUNTED_STORAGE_COST,
    ] {
        declare(cx, model, spec, rsy.clone())?;
    }
    Ok(())
}

pub(super) fn add_constraints(
    cx: &AssemblyContext,
    _domains: &Domains,
    model: &mut Model,
) -> EmodResult<()> {
    if !cx.flags.storage || !model.has_family(STORAGE_LEVEL_YEAR_START.name) {
        return Ok(());
    }

    // (r, s, l, y, t, m) rows → rate_of_activity[r, l, t, m, y]
    for (family, defined, query) in [
        ("storage_charge_def", RATE_OF_STORAGE_CHARGE.name, STORAGE_CHARGE_TERMS),
        ("storage_discharge_def", RATE_OF_STORAGE_DISCHARGE.name, STORAGE_DISCHARGE_TERMS),
    ] {
        stream_definition(model, family, defined, cx.table(query)?.rows(), 4, |model, row| {
            let rate = model.find_var(
                RATE_OF_ACTIVITY.name,
                &[row.at(0), row.at(2), row.at(4), row.at(5), row.at(3)],
            );
            Ok(rate.map(|var| (var, row.value(0))))
        })?;
    }

    levels(cx, model)?;
    capacity(cx, model)?;
    costs(cx, model)?;
    Ok(())
}

/// `(rsc − rsd) · weight` terms for one timeslice.
fn net_charge(
    model: &Model,
    r: &str,
    s: &str,
    l: &str,
    y: &str,
    weight: f64,
) -> [(Option<VarId>, f64); 2] {
    [
        (model.find_var(RATE_OF_STORAGE_CHARGE.name, &[r, s, l, y]), weight),
        (model.find_var(RATE_OF_STORAGE_DISCHARGE.name, &[r, s, l, y]), -weight),
    ]
}

fn levels(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let regions = cx.members(Dimension::Region);
    let storages = cx.members(Dimension::Storage);
    let years = cx.members(Dimension::Year);
    let timeslices = cx.members(Dimension::Timeslice);
    let hierarchy = cx.hierarchy;
    let level_start = cx.param("StorageLevelStart")?;
    let fill = cx.param("StorageNewCapacityFill")?;

    build(model, "storage_level_year_start_def", |model| {
        for r in regions {
            for s in storages {
                for y in years {
                    let target = model.var(STORAGE_LEVEL_YEAR_START.name, &[r, s, y])?;
                    let k = key(&[r, s, y]);
                    match cx.store.sets().previous_year(y) {
                        None => {
                            let start = level_start.value_or(&[r, s], 0.0);
                            define(model, "storage_level_year_start_def", target, k, &[], start);
                        }
                        Some(prev) => {
                            let terms = [
                                (Some(model.var(STORAGE_LEVEL_YEAR_END.name, &[r, s, prev])?), 1.0),
                                (
                                    Some(model.var(NEW_STORAGE_CAPACITY.name, &[r, s, y])?),
                                    fill.value_or(&[r, s], 0.0),
                                ),
                            ];
                            define(model, "storage_level_year_start_def", target, k, &terms, 0.0);
                        }
                    }
                }
            }
        }
        Ok(())
    })?;

    build(model, "storage_level_year_end_def", |model| {
        for r in regions {
            for s in storages {
                for y in years {
                    let target = model.var(STORAGE_LEVEL_YEAR_END.name, &[r, s, y])?;
                    let start = model.var(STORAGE_LEVEL_YEAR_START.name, &[r, s, y])?;
                    let mut terms = vec![(Some(start), 1.0)];
                    for l in timeslices {
                        terms.extend(net_charge(model, r, s, l, y, cx.year_split(l, y)?));
                    }
                    let k = key(&[r, s, y]);
                    define(model, "storage_level_year_end_def", target, k, &terms, 0.0);
                }
            }
        }
        Ok(())
    })?;

    build(model, "storage_level_tg1_start_def", |model| {
        for r in regions {
            for s in storages {
                for y in years {
                    for tg1 in hierarchy.group1() {
                        let k = key(&[r, s, &tg1.id, y]);
                        let target = model.var(STORAGE_LEVEL_TG1_START.name, &k)?;
                        let previous = match hierarchy.previous_group1(&tg1.id) {
                            Some(prev) => {
                                model.var(STORAGE_LEVEL_TG1_END.name, &[r, s, &prev.id, y])?
                            }
                            None => model.var(STORAGE_LEVEL_YEAR_START.name, &[r, s, y])?,
                        };
                        let terms = [(Some(previous), 1.0)];
                        define(model, "storage_level_tg1_start_def", target, k, &terms, 0.0);
                    }
                }
            }
        }
        Ok(())
    })?;

    build(model, "storage_level_tg1_end_def", |model| {
        for r in regions {
            for s in storages {
                for y in years {
                    for tg1 in hierarchy.group1() {
                        let k = key(&[r, s, &tg1.id, y]);
                        let target = model.var(STORAGE_LEVEL_TG1_END.name, &k)?;
                        let start = model.var(STORAGE_LEVEL_TG1_START.name, &k)?;
                        let mut terms = vec![(Some(start), 1.0)];
                        for l in hierarchy.slices_in_group1(&tg1.id) {
                            let weight = cx.year_split(l, y)? / tg1.multiplier;
                            terms.extend(net_charge(model, r, s, l, y, weight));
                        }
                        define(model, "storage_level_tg1_end_def", target, k, &terms, 0.0);
                    }
                }
            }
        }
        Ok(())
    })?;

    build(model, "storage_level_tg2_start_def", |model| {
        for k in family_keys(model, STORAGE_LEVEL_TG2_START.name) {
            let (r, s, tg1, tg2, y) = (&k[0], &k[1], &k[2], &k[3], &k[4]);
            let target = model.var(STORAGE_LEVEL_TG2_START.name, &k)?;
            let previous = match hierarchy.previous_group2(tg1, tg2) {
                Some(prev) => model.var(STORAGE_LEVEL_TG2_END.name, &[r, s, tg1, &prev.id, y])?,
                None => model.var(STORAGE_LEVEL_TG1_START.name, &[r, s, tg1, y])?,
            };
            define(model, "storage_level_tg2_start_def", target, k, &[(Some(previous), 1.0)], 0.0);
        }
        Ok(())
    })?;

    build(model, "storage_level_tg2_end_def", |model| {
        for k in family_keys(model, STORAGE_LEVEL_TG2_END.name) {
            let (r, s, tg1, tg2, y) = (&k[0], &k[1], &k[2], &k[3], &k[4]);
            let target = model.var(STORAGE_LEVEL_TG2_END.name, &k)?;
            let mut terms = vec![(Some(model.var(STORAGE_LEVEL_TG2_START.name, &k)?), 1.0)];
            for l in hierarchy.slices_in(tg1, tg2) {
                let weight = cx.year_split(l, y)? * hierarchy.occurrence_weight(l);
                terms.extend(net_charge(model, r, s, l, y, weight));
            }
            define(model, "storage_level_tg2_end_def", target, k, &terms, 0.0);
        }
        Ok(())
    })?;

    build(model, "storage_level_ts_start_def", |model| {
        for k in family_keys(model, STORAGE_LEVEL_TS_START.name) {
            let (r, s, l, y) = (k[0].as_str(), k[1].as_str(), k[2].as_str(), k[3].as_str());
            let Some(position) = hierarchy.position(l) else {
                continue;
            };
            let (tg1, tg2) = (position.tg1.as_str(), position.tg2.as_str());
            let target = model.var(STORAGE_LEVEL_TS_START.name, &k)?;
            let mut rhs = 0.0;
            let mut terms = Vec::with_capacity(3);
            match hierarchy.start_case(y, tg1, tg2, l) {
                StartCase::HorizonStart => rhs = level_start.value_or(&[r, s], 0.0),
                StartCase::YearStart => {
                    terms.push((Some(model.var(STORAGE_LEVEL_YEAR_START.name, &[r, s, y])?), 1.0));
                }
                StartCase::Group1Start => {
                    let start = model.var(STORAGE_LEVEL_TG1_START.name, &[r, s, tg1, y])?;
                    terms.push((Some(start), 1.0));
                }
                StartCase::Group2Start => {
                    terms.push((
                        Some(model.var(STORAGE_LEVEL_TG2_START.name, &[r, s, tg1, tg2, y])?),
                        1.0,
                    ));
                }
                StartCase::Interior => {
                    if let Some(prev) = hierarchy.previous_timeslice(l) {
                        let start = model.var(STORAGE_LEVEL_TS_START.name, &[r, s, prev, y])?;
                        terms.push((Some(start), 1.0));
                        let weight = cx.year_split(prev, y)? * hierarchy.occurrence_weight(prev);
                        terms.extend(net_charge(model, r, s, prev, y, weight));
                    }
                }
            }
            define(model, "storage_level_ts_start_def", target, k.clone(), &terms, rhs);
        }
        Ok(())
    })?;

    for (family, bound, relation) in [
        ("storage_level_upper", STORAGE_UPPER_LIMIT.name, Relation::LessEq),
        ("storage_level_lower", STORAGE_LOWER_LIMIT.name, Relation::GreaterEq),
    ] {
        build(model, family, |model| {
            for k in family_keys(model, STORAGE_LEVEL_TS_START.name) {
                let level = model.var(STORAGE_LEVEL_TS_START.name, &k)?;
                let limit = model.var(bound, &[&k[0], &k[1], &k[3]])?;
                let expr = LinearExpr::from_term(level, 1.0).with_term(limit, -1.0);
                model.add_constraint(family, k, expr, relation, 0.0);
            }
            Ok(())
        })?;
    }

    for (family, rate, param) in [
        ("storage_max_charge_rate", RATE_OF_STORAGE_CHARGE.name, "StorageMaxChargeRate"),
        ("storage_max_discharge_rate", RATE_OF_STORAGE_DISCHARGE.name, "StorageMaxDischargeRate"),
    ] {
        let max_rate = cx.param(param)?;
        build(model, family, |model| {
            for k in family_keys(model, rate) {
                if let Some(bound) = max_rate.explicit(&[&k[0], &k[1]]) {
                    let var = model.var(rate, &k)?;
                    let expr = LinearExpr::from_term(var, 1.0);
                    model.add_constraint(family, k, expr, Relation::LessEq, bound);
                }
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn rsy_keys(cx: &AssemblyContext) -> Vec<Key> {
    product(&[
        cx.members(Dimension::Region),
        cx.members(Dimension::Storage),
        cx.members(Dimension::Year),
    ])
}

fn capacity(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let years = cx
        .members(Dimension::Year)
        .iter()
        .map(|y| Ok((y, parse_year(y)?)))
        .collect::<EmodResult<Vec<_>>>()?;
    let life = cx.param("OperationalLifeStorage")?;
    let residual = cx.param("ResidualStorageCapacity")?;
    let min_charge = cx.param("MinStorageCharge")?;
    let keys = rsy_keys(cx);

    build(model, "accumulated_new_storage_capacity_def", |model| {
        for k in &keys {
            let (r, s) = (&k[0], &k[1]);
            let year = parse_year(&k[2])?;
            let lifetime = life.value_or(&[r, s], 1.0);
            let target = model.var(ACCUMULATED_NEW_STORAGE_CAPACITY.name, k)?;
            let mut terms = Vec::new();
            for (yy, built) in &years {
                if *built <= year && f64::from(year - built) < lifetime {
                    terms.push((Some(model.var(NEW_STORAGE_CAPACITY.name, &[r, s, *yy])?), 1.0));
                }
            }
            define(model, "accumulated_new_storage_capacity_def", target, k.clone(), &terms, 0.0);
        }
        Ok(())
    })?;

    build(model, "storage_upper_limit_def", |model| {
        for k in &keys {
            let target = model.var(STORAGE_UPPER_LIMIT.name, k)?;
            let accumulated = model.var(ACCUMULATED_NEW_STORAGE_CAPACITY.name, k)?;
            define(
                model,
                "storage_upper_limit_def",
                target,
                k.clone(),
                &[(Some(accumulated), 1.0)],
                residual.value_or(k, 0.0),
            );
        }
        Ok(())
    })?;

    build(model, "storage_lower_limit_def", |model| {
        for k in &keys {
            let target = model.var(STORAGE_LOWER_LIMIT.name, k)?;
            let upper = model.var(STORAGE_UPPER_LIMIT.name, k)?;
            define(
                model,
                "storage_lower_limit_def",
                target,
                k.clone(),
                &[(Some(upper), min_charge.value_or(k, 0.0))],
                0.0,
            );
        }
        Ok(())
    })
}

fn costs(cx: &AssemblyContext, model: &mut Model) -> EmodResult<()> {
    let keys = rsy_keys(cx);
    if keys.is_empty() {
        return Ok(());
    }
    let first = cx.first_year()?;
    let last = cx.last_year()?;
    let capital_cost = cx.param("CapitalCostStorage")?;
    let life = cx.param("OperationalLifeStorage")?;
    let method = cx.param("DepreciationMethod")?;

    build(model, "capital_investment_storage_def", |model| {
        for k in &keys {
            let target = model.var(CAPITAL_INVESTMENT_STORAGE.name, k)?;
            let new = model.var(NEW_STORAGE_CAPACITY.name, k)?;
            let cost = capital_cost.value_or(k, 0.0);
            let terms = [(Some(new), cost)];
            define(model, "capital_investment_storage_def", target, k.clone(), &terms, 0.0);
        }
        Ok(())
    })?;

    build(model, "discounted_capital_investment_storage_def", |model| {
        for k in &keys {
            let factor = capital_factor(cx.discount_rate(&k[0])?, parse_year(&k[2])?, first);
            let target = model.var(DISCOUNTED_CAPITAL_INVESTMENT_STORAGE.name, k)?;
            let investment = model.var(CAPITAL_INVESTMENT_STORAGE.name, k)?;
            define(
                model,
                "discounted_capital_investment_storage_def",
                target,
                k.clone(),
                &[(Some(investment), 1.0 / factor)],
                0.0,
            );
        }
        Ok(())
    })?;

    build(model, "salvage_value_storage_def", |model| {
        for k in &keys {
            let (r, s) = (&k[0], &k[1]);
            let fraction = salvage_fraction(
                cx.discount_rate(r)?,
                method.value_or(&[r], 1.0),
                life.value_or(&[r, s], 1.0),
                parse_year(&k[2])?,
                last,
            );
            let target = model.var(SALVAGE_VALUE_STORAGE.name, k)?;
            let new = model.var(NEW_STORAGE_CAPACITY.name, k)?;
            let value = capital_cost.value_or(k, 0.0) * fraction;
            let terms = [(Some(new), value)];
            define(model, "salvage_value_storage_def", target, k.clone(), &terms, 0.0);
        }
        Ok(())
    })?;

    build(model, "discounted_salvage_value_storage_def", |model| {
        for k in &keys {
            let factor = salvage_factor(cx.discount_rate(&k[0])?, first, last);
            let target = model.var(DISCOUNTED_SALVAGE_VALUE_STORAGE.name, k)?;
            let salvage = model.var(SALVAGE_VALUE_STORAGE.name, k)?;
            define(
                model,
                "discounted_salvage_value_storage_def",
                target,
                k.clone(),
                &[(Some(salvage), 1.0 / factor)],
                0.0,
            );
        }
        Ok(())
    })?;

    build(model, "total_discounted_storage_cost_def", |model| {
        for k in &keys {
            let target = model.var(TOTAL_DISCOUNTED_STORAGE_COST.name, k)?;
            let terms = [
                (Some(model.var(DISCOUNTED_CAPITAL_INVESTMENT_STORAGE.name, k)?), 1.0),
                (Some(model.var(DISCOUNTED_SALVAGE_VALUE_STORAGE.name, k)?), -1.0),
            ];
            define(model, "total_discounted_storage_cost_def", target, k.clone(), &terms, 0.0);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assemble_store, base_store};
    use emod_core::Dimension;

    fn storage_store() -> emod_io::FactStoreBuilder {
        base_store()
            .set(Dimension::Storage, ["DAM"])
            .param("StorageLevelStart", &["R1", "DAM"], 50.0)
    }

    #[test]
    fn no_storage_no_families() {
        let model = assemble_store(&base_store().build().unwrap());
        assert!(!model.has_family("storage_level_year_start"));
        assert_eq!(model.constraint_count("storage_level_ts_start_def"), 0);
    }

    #[test]
    fn first_year_starts_at_level_start() {
        let model = assemble_store(&storage_store().build().unwrap());
        let start = model
            .constraints_of("storage_level_year_start_def")
            .next()
            .unwrap();
        assert_eq!(start.rhs, 50.0);
        assert_eq!(start.lhs.terms().len(), 1);
    }

    #[test]
    fn timeslices_chain_inside_the_implicit_group() {
        let model = assemble_store(&storage_store().build().unwrap());
        // DAY starts the horizon; NIGHT follows DAY
        let day = model
            .constraints_of("storage_level_ts_start_def")
            .find(|c| c.key[2] == "DAY")
            .unwrap();
        assert_eq!(day.rhs, 50.0);
        let night = model
            .constraints_of("storage_level_ts_start_def")
            .find(|c| c.key[2] == "NIGHT")
            .unwrap();
        let day_level = model
            .var("storage_level_ts_start", &["R1", "DAM", "DAY", "2020"])
            .unwrap();
        assert!(night.lhs.terms().contains(&(day_level, -1.0)));
        assert_eq!(model.constraint_count("storage_level_tg1_start_def"), 1);
        assert_eq!(model.constraint_count("storage_level_tg2_end_def"), 1);
    }

    #[test]
    fn later_years_carry_previous_end_and_fill() {
        let store = storage_store()
            .set(Dimension::Year, ["2021"])
            .param("StorageNewCapacityFill", &["R1", "DAM"], 0.5)
            .build()
            .unwrap();
        let model = assemble_store(&store);
        let start = model
            .constraints_of("storage_level_year_start_def")
            .find(|c| c.key[2] == "2021")
            .unwrap();
        let end_2020 = model
            .var("storage_level_year_end", &["R1", "DAM", "2020"])
            .unwrap();
        let new_2021 = model
            .var("new_storage_capacity", &["R1", "DAM", "2021"])
            .unwrap();
        assert_eq!(start.rhs, 0.0);
        assert!(start.lhs.terms().contains(&(end_2020, -1.0)));
        assert!(start.lhs.terms().contains(&(new_2021, -0.5)));
    }
}

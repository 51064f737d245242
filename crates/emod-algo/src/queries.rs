//! The query catalogue.
//!
//! Each query is a pure function of the fact store returning rows sorted by
//! the key columns its consumer streams over. Queries never depend on each
//! other's results, which is what lets the executor run them in any order.

use emod_core::{key, Dimension, EmodError, EmodResult, Key, ParamTable, Row, Table};
use emod_io::FactStore;

use crate::query::NamedQuery;

pub const ACTIVITY_DOMAIN: &str = "activity_domain";
pub const PRODUCTION_TERMS: &str = "production_terms";
pub const USE_TERMS: &str = "use_terms";
pub const PRODUCTION_BY_TECH_TERMS: &str = "production_by_tech_terms";
pub const USE_BY_TECH_TERMS: &str = "use_by_tech_terms";
pub const DEMAND: &str = "demand";
pub const ACCUMULATED_DEMAND: &str = "accumulated_demand";
pub const TRADE_ROUTES: &str = "trade_routes";
pub const VARIABLE_COST_TERMS: &str = "variable_cost_terms";
pub const EMISSION_TERMS: &str = "emission_terms";
pub const EMISSION_PENALTY_TERMS: &str = "emission_penalty_terms";
pub const STORAGE_CHARGE_TERMS: &str = "storage_charge_terms";
pub const STORAGE_DISCHARGE_TERMS: &str = "storage_discharge_terms";
pub const RESERVE_TECH_TERMS: &str = "reserve_tech_terms";
pub const RESERVE_FUEL_TERMS: &str = "reserve_fuel_terms";
pub const RE_TECH_TERMS: &str = "re_tech_terms";
pub const RE_FUEL_TERMS: &str = "re_fuel_terms";
pub const NODAL_TECH_SHARE: &str = "nodal_tech_share";
pub const NODAL_DEMAND: &str = "nodal_demand";
pub const TRANSMISSION_ENABLED: &str = "transmission_enabled";
pub const TIMESLICE_HIERARCHY: &str = "timeslice_hierarchy";

/// Every query the assembly engine consumes.
pub const CATALOGUE: &[NamedQuery] = &[
    NamedQuery { name: ACTIVITY_DOMAIN, run: activity_domain },
    NamedQuery { name: PRODUCTION_TERMS, run: production_terms },
    NamedQuery { name: USE_TERMS, run: use_terms },
    NamedQuery { name: PRODUCTION_BY_TECH_TERMS, run: production_by_tech_terms },
    NamedQuery { name: USE_BY_TECH_TERMS, run: use_by_tech_terms },
    NamedQuery { name: DEMAND, run: demand },
    NamedQuery { name: ACCUMULATED_DEMAND, run: accumulated_demand },
    NamedQuery { name: TRADE_ROUTES, run: trade_routes },
    NamedQuery { name: VARIABLE_COST_TERMS, run: variable_cost_terms },
    NamedQuery { name: EMISSION_TERMS, run: emission_terms },
    NamedQuery { name: EMISSION_PENALTY_TERMS, run: emission_penalty_terms },
    NamedQuery { name: STORAGE_CHARGE_TERMS, run: storage_charge_terms },
    NamedQuery { name: STORAGE_DISCHARGE_TERMS, run: storage_discharge_terms },
    NamedQuery { name: RESERVE_TECH_TERMS, run: reserve_tech_terms },
    NamedQuery { name: RESERVE_FUEL_TERMS, run: reserve_fuel_terms },
    NamedQuery { name: RE_TECH_TERMS, run: re_tech_terms },
    NamedQuery { name: RE_FUEL_TERMS, run: re_fuel_terms },
    NamedQuery { name: NODAL_TECH_SHARE, run: nodal_tech_share },
    NamedQuery { name: NODAL_DEMAND, run: nodal_demand },
    NamedQuery { name: TRANSMISSION_ENABLED, run: transmission_enabled },
    NamedQuery { name: TIMESLICE_HIERARCHY, run: timeslice_hierarchy },
];

/// Explicit rows with a non-zero value, in key order.
fn nonzero(param: &ParamTable) -> impl Iterator<Item = (&Key, f64)> {
    param
        .sorted_rows()
        .into_iter()
        .filter(|(_, value)| *value != 0.0)
}

fn timeslices(store: &FactStore) -> &[String] {
    store.members(Dimension::Timeslice)
}

/// (r, t, y, m) combinations that can carry activity: any fuel ratio, any
/// emission ratio, or a storage link in any year.
pub fn activity_domain(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "t", "y", "m"], &[] as &[&str]);
    for name in ["OutputActivityRatio", "InputActivityRatio"] {
        // r, t, f, m, y
        for (k, _) in nonzero(store.param(name)?) {
            table.push(Row::keyed(key(&[&k[0], &k[1], &k[4], &k[3]])))?;
        }
    }
    // r, t, e, m, y
    for (k, _) in nonzero(store.param("EmissionActivityRatio")?) {
        table.push(Row::keyed(key(&[&k[0], &k[1], &k[4], &k[3]])))?;
    }
    for name in ["TechnologyToStorage", "TechnologyFromStorage"] {
        // r, t, s, m
        for (k, _) in nonzero(store.param(name)?) {
            for y in store.members(Dimension::Year) {
                table.push(Row::keyed(key(&[&k[0], &k[1], y, &k[3]])))?;
            }
        }
    }
    Ok(table.sorted())
}

/// Activity ratio rows expanded over timeslices, keyed (r, l, f, y, t, m).
fn ratio_terms(store: &FactStore, param: &str) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "l", "f", "y", "t", "m"], &["ratio"]);
    for (k, ratio) in nonzero(store.param(param)?) {
        let (r, t, f, m, y) = (&k[0], &k[1], &k[2], &k[3], &k[4]);
        for l in timeslices(store) {
            table.push(Row::new(key(&[r, l, f, y, t, m]), vec![ratio]))?;
        }
    }
    Ok(table.sorted())
}

/// Activity ratio rows expanded over timeslices, keyed (r, l, t, f, y, m).
fn ratio_terms_by_tech(store: &FactStore, param: &str) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "l", "t", "f", "y", "m"], &["ratio"]);
    for (k, ratio) in nonzero(store.param(param)?) {
        let (r, t, f, m, y) = (&k[0], &k[1], &k[2], &k[3], &k[4]);
        for l in timeslices(store) {
            table.push(Row::new(key(&[r, l, t, f, y, m]), vec![ratio]))?;
        }
    }
    Ok(table.sorted())
}

pub fn production_terms(store: &FactStore) -> EmodResult<Table> {
    ratio_terms(store, "OutputActivityRatio")
}

pub fn use_terms(store: &FactStore) -> EmodResult<Table> {
    ratio_terms(store, "InputActivityRatio")
}

pub fn production_by_tech_terms(store: &FactStore) -> EmodResult<Table> {
    ratio_terms_by_tech(store, "OutputActivityRatio")
}

pub fn use_by_tech_terms(store: &FactStore) -> EmodResult<Table> {
    ratio_terms_by_tech(store, "InputActivityRatio")
}

/// Demand per (r, l, f, y): annual demand × demand profile.
pub fn demand(store: &FactStore) -> EmodResult<Table> {
    let annual = store.param("SpecifiedAnnualDemand")?;
    let profile = store.param("SpecifiedDemandProfile")?;
    let mut table = Table::new(&["r", "l", "f", "y"], &["value"]);
    // r, f, y
    for (k, amount) in nonzero(annual) {
        for l in timeslices(store) {
            let share = profile.value_or(&[&k[0], &k[1], l, &k[2]], 0.0);
            let value = amount * share;
            if value != 0.0 {
                table.push(Row::new(key(&[&k[0], l, &k[1], &k[2]]), vec![value]))?;
            }
        }
    }
    Ok(table.sorted())
}

pub fn accumulated_demand(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "f", "y"], &["value"]);
    for (k, value) in nonzero(store.param("AccumulatedAnnualDemand")?) {
        table.push(Row::new(k.clone(), vec![value]))?;
    }
    Ok(table.sorted())
}

/// Trade routes between distinct regions.
pub fn trade_routes(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "rr", "f", "y"], &["value"]);
    for (k, value) in nonzero(store.param("TradeRoute")?) {
        if k[0] != k[1] {
            table.push(Row::new(k.clone(), vec![value]))?;
        }
    }
    Ok(table.sorted())
}

/// Variable cost per (r, t, y, m).
pub fn variable_cost_terms(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "t", "y", "m"], &["value"]);
    // r, t, m, y
    for (k, value) in nonzero(store.param("VariableCost")?) {
        table.push(Row::new(key(&[&k[0], &k[1], &k[3], &k[2]]), vec![value]))?;
    }
    Ok(table.sorted())
}

/// Emission ratio per (r, t, e, y, m).
pub fn emission_terms(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "t", "e", "y", "m"], &["ratio"]);
    // r, t, e, m, y
    for (k, ratio) in nonzero(store.param("EmissionActivityRatio")?) {
        table.push(Row::new(
            key(&[&k[0], &k[1], &k[2], &k[4], &k[3]]),
            vec![ratio],
        ))?;
    }
    Ok(table.sorted())
}

/// Emission penalty per (r, t, y, e) for technologies emitting `e` in year `y`.
pub fn emission_penalty_terms(store: &FactStore) -> EmodResult<Table> {
    let penalty = store.param("EmissionsPenalty")?;
    let mut table = Table::new(&["r", "t", "y", "e"], &["value"]);
    // r, t, e, m, y
    for (k, _) in nonzero(store.param("EmissionActivityRatio")?) {
        let value = penalty.value_or(&[&k[0], &k[2], &k[4]], 0.0);
        if value != 0.0 {
            table.push(Row::new(key(&[&k[0], &k[1], &k[4], &k[2]]), vec![value]))?;
        }
    }
    Ok(table.sorted())
}

/// Storage link rows expanded over timeslices and years, keyed (r, s, l, y, t, m).
fn storage_terms(store: &FactStore, param: &str) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "s", "l", "y", "t", "m"], &["ratio"]);
    // r, t, s, m
    for (k, ratio) in nonzero(store.param(param)?) {
        for l in timeslices(store) {
            for y in store.members(Dimension::Year) {
                table.push(Row::new(key(&[&k[0], &k[2], l, y, &k[1], &k[3]]), vec![ratio]))?;
            }
        }
    }
    Ok(table.sorted())
}

pub fn storage_charge_terms(store: &FactStore) -> EmodResult<Table> {
    storage_terms(store, "TechnologyToStorage")
}

pub fn storage_discharge_terms(store: &FactStore) -> EmodResult<Table> {
    storage_terms(store, "TechnologyFromStorage")
}

/// Reserve contribution per unit of capacity, keyed (r, y, t).
pub fn reserve_tech_terms(store: &FactStore) -> EmodResult<Table> {
    let unit = store.param("CapacityToActivityUnit")?;
    let mut table = Table::new(&["r", "y", "t"], &["value"]);
    // r, t, y
    for (k, tag) in nonzero(store.param("ReserveMarginTagTechnology")?) {
        let value = tag * unit.value_or(&[&k[0], &k[1]], 1.0);
        table.push(Row::new(key(&[&k[0], &k[2], &k[1]]), vec![value]))?;
    }
    Ok(table.sorted())
}

/// Fuels needing reserve, keyed (r, l, y, f).
pub fn reserve_fuel_terms(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "l", "y", "f"], &["value"]);
    // r, f, y
    for (k, tag) in nonzero(store.param("ReserveMarginTagFuel")?) {
        for l in timeslices(store) {
            table.push(Row::new(key(&[&k[0], l, &k[2], &k[1]]), vec![tag]))?;
        }
    }
    Ok(table.sorted())
}

/// Renewable production terms, keyed (r, y, l, t, f), for tagged technologies
/// producing fuel `f`.
pub fn re_tech_terms(store: &FactStore) -> EmodResult<Table> {
    let tags = store.param("RETagTechnology")?;
    let mut table = Table::new(&["r", "y", "l", "t", "f"], &["value"]);
    // r, t, f, m, y
    for (k, _) in nonzero(store.param("OutputActivityRatio")?) {
        let tag = tags.value_or(&[&k[0], &k[1], &k[4]], 0.0);
        if tag == 0.0 {
            continue;
        }
        for l in timeslices(store) {
            table.push(Row::new(key(&[&k[0], &k[4], l, &k[1], &k[2]]), vec![tag]))?;
        }
    }
    Ok(table.sorted())
}

/// Renewable target fuels, keyed (r, y, l, f).
pub fn re_fuel_terms(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "y", "l", "f"], &["value"]);
    // r, f, y
    for (k, tag) in nonzero(store.param("RETagFuel")?) {
        for l in timeslices(store) {
            table.push(Row::new(key(&[&k[0], &k[2], l, &k[1]]), vec![tag]))?;
        }
    }
    Ok(table.sorted())
}

/// Share of a region's technology activity located at each node, keyed (n, r, t, y).
pub fn nodal_tech_share(store: &FactStore) -> EmodResult<Table> {
    let share = store.param("NodalDistributionTechnologyCapacity")?;
    let mut table = Table::new(&["n", "r", "t", "y"], &["value"]);
    for node in store.nodes() {
        for t in store.members(Dimension::Technology) {
            for y in store.members(Dimension::Year) {
                let value = share.value_or(&[&node.id, t, y], 0.0);
                if value != 0.0 {
                    table.push(Row::new(key(&[&node.id, &node.r, t, y]), vec![value]))?;
                }
            }
        }
    }
    Ok(table.sorted())
}

/// Nodal demand per (n, l, f, y): regional demand × node share.
pub fn nodal_demand(store: &FactStore) -> EmodResult<Table> {
    let annual = store.param("SpecifiedAnnualDemand")?;
    let profile = store.param("SpecifiedDemandProfile")?;
    let share = store.param("NodalDistributionDemand")?;
    let mut table = Table::new(&["n", "l", "f", "y"], &["value"]);
    for node in store.nodes() {
        // n, f, y
        for (k, fraction) in nonzero(share).filter(|(k, _)| k[0] == node.id) {
            let amount = annual.value_or(&[&node.r, &k[1], &k[2]], 0.0);
            for l in timeslices(store) {
                let value = amount * fraction * profile.value_or(&[&node.r, &k[1], l, &k[2]], 0.0);
                if value != 0.0 {
                    table.push(Row::new(key(&[&node.id, l, &k[1], &k[2]]), vec![value]))?;
                }
            }
        }
    }
    Ok(table.sorted())
}

/// (r, f, y) combinations modelled on the node/line network.
pub fn transmission_enabled(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(&["r", "f", "y"], &[] as &[&str]);
    for (k, _) in nonzero(store.param("TransmissionModelingEnabled")?) {
        table.push(Row::keyed(k.clone()))?;
    }
    Ok(table.sorted())
}

/// Timeslice placement joined with group orders and multipliers.
pub fn timeslice_hierarchy(store: &FactStore) -> EmodResult<Table> {
    let mut table = Table::new(
        &["l", "tg1", "tg2"],
        &["l_order", "tg1_order", "tg2_order", "tg1_mult", "tg2_mult"],
    );
    for placement in store.timeslice_groups() {
        let tg1 = store
            .time_groups1()
            .iter()
            .find(|group| group.id == placement.tg1);
        let tg2 = store
            .time_groups2()
            .iter()
            .find(|group| group.id == placement.tg2);
        let (Some(tg1), Some(tg2)) = (tg1, tg2) else {
            return Err(EmodError::Input(format!(
                "timeslice {} references undeclared time group {}/{}",
                placement.l, placement.tg1, placement.tg2
            )));
        };
        table.push(Row::new(
            key(&[&placement.l, &placement.tg1, &placement.tg2]),
            vec![
                f64::from(placement.order),
                f64::from(tg1.order),
                f64::from(tg2.order),
                tg1.multiplier,
                tg2.multiplier,
            ],
        ))?;
    }
    Ok(table.sorted())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FactStore {
        FactStore::builder()
            .set(Dimension::Region, ["R1"])
            .set(Dimension::Technology, ["GAS", "BATT"])
            .set(Dimension::Fuel, ["ELC", "NG"])
            .set(Dimension::Mode, ["1", "2"])
            .set(Dimension::Timeslice, ["DAY", "NIGHT"])
            .set(Dimension::Year, ["2020"])
            .set(Dimension::Storage, ["S1"])
            .param("OutputActivityRatio", &["R1", "GAS", "ELC", "1", "2020"], 1.0)
            .param("InputActivityRatio", &["R1", "GAS", "NG", "1", "2020"], 2.5)
            .param("TechnologyToStorage", &["R1", "BATT", "S1", "1"], 1.0)
            .param("SpecifiedAnnualDemand", &["R1", "ELC", "2020"], 100.0)
            .param("SpecifiedDemandProfile", &["R1", "ELC", "DAY", "2020"], 0.7)
            .param("SpecifiedDemandProfile", &["R1", "ELC", "NIGHT", "2020"], 0.3)
            .build()
            .unwrap()
    }

    #[test]
    fn activity_domain_unions_ratio_and_storage_links() {
        let table = activity_domain(&store()).unwrap();
        let keys: Vec<&Key> = table.rows().iter().map(|row| &row.key).collect();
        assert_eq!(
            keys,
            vec![&key(&["R1", "BATT", "2020", "1"]), &key(&["R1", "GAS", "2020", "1"])]
        );
    }

    #[test]
    fn production_terms_expand_over_timeslices() {
        let table = production_terms(&store()).unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.is_sorted());
        assert_eq!(table.rows()[0].key, key(&["R1", "DAY", "ELC", "2020", "GAS", "1"]));
        assert_eq!(table.rows()[0].value(0), 1.0);
    }

    #[test]
    fn demand_multiplies_profile() {
        let table = demand(&store()).unwrap();
        let values: Vec<f64> = table.rows().iter().map(|row| row.value(0)).collect();
        assert_eq!(values.len(), 2);
        assert!((values[0] - 70.0).abs() < 1e-9);
        assert!((values[1] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn storage_terms_key_storage_before_technology() {
        let table = storage_charge_terms(&store()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].key, key(&["R1", "S1", "NIGHT", "2020", "BATT", "1"]));
        assert!(storage_discharge_terms(&store()).unwrap().is_empty());
    }

    #[test]
    fn catalogue_names_are_unique() {
        let mut names: Vec<&str> = CATALOGUE.iter().map(|q| q.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOGUE.len());
    }

    #[test]
    fn every_query_runs_on_an_empty_store() {
        let store = FactStore::builder().build().unwrap();
        for query in CATALOGUE {
            let table = (query.run)(&store).unwrap();
            assert!(table.is_empty(), "{}", query.name);
        }
    }
}

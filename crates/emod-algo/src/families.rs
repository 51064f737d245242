//! Variable-family declarations.
//!
//! Column names double as result-table headers.

use emod_core::FamilySpec;
use std::f64::consts::PI;

// Capacity
pub const NEW_CAPACITY: FamilySpec = FamilySpec::continuous("new_capacity", &["r", "t", "y"]);
pub const ACCUMULATED_NEW_CAPACITY: FamilySpec =
    FamilySpec::continuous("accumulated_new_capacity", &["r", "t", "y"]);
pub const TOTAL_CAPACITY_ANNUAL: FamilySpec =
    FamilySpec::continuous("total_capacity_annual", &["r", "t", "y"]);
pub const NUMBER_OF_NEW_TECHNOLOGY_UNITS: FamilySpec =
    FamilySpec::integer("number_of_new_technology_units", &["r", "t", "y"]);

// Activity
pub const RATE_OF_ACTIVITY: FamilySpec =
    FamilySpec::continuous("rate_of_activity", &["r", "l", "t", "m", "y"]);
pub const RATE_OF_TOTAL_ACTIVITY: FamilySpec =
    FamilySpec::continuous("rate_of_total_activity", &["r", "t", "l", "y"]);
pub const TOTAL_TECHNOLOGY_ANNUAL_ACTIVITY: FamilySpec =
    FamilySpec::continuous("total_technology_annual_activity", &["r", "t", "y"]);
pub const TOTAL_ANNUAL_TECHNOLOGY_ACTIVITY_BY_MODE: FamilySpec =
    FamilySpec::continuous("total_annual_technology_activity_by_mode", &["r", "t", "m", "y"]);
pub const TOTAL_TECHNOLOGY_MODEL_PERIOD_ACTIVITY: FamilySpec =
    FamilySpec::continuous("total_technology_model_period_activity", &["r", "t"]);

// Production and use
pub const RATE_OF_PRODUCTION: FamilySpec =
    FamilySpec::continuous("rate_of_production", &["r", "l", "f", "y"]);
pub const RATE_OF_USE: FamilySpec = FamilySpec::continuous("rate_of_use", &["r", "l", "f", "y"]);
pub const PRODUCTION: FamilySpec = FamilySpec::continuous("production", &["r", "l", "f", "y"]);
pub const USE: FamilySpec = FamilySpec::continuous("use", &["r", "l", "f", "y"]);
pub const PRODUCTION_BY_TECHNOLOGY: FamilySpec =
    FamilySpec::continuous("production_by_technology", &["r", "l", "t", "f", "y"]);
pub const USE_BY_TECHNOLOGY: FamilySpec =
    FamilySpec::continuous("use_by_technology", &["r", "l", "t", "f", "y"]);
pub const TRADE: FamilySpec = FamilySpec::free("trade", &["r", "rr", "l", "f", "y"]);

// Storage
pub const RATE_OF_STORAGE_CHARGE: FamilySpec =
    FamilySpec::continuous("rate_of_storage_charge", &["r", "s", "l", "y"]);
pub const RATE_OF_STORAGE_DISCHARGE: FamilySpec =
    FamilySpec::continuous("rate_of_storage_discharge", &["r", "s", "l", "y"]);
pub const STORAGE_LEVEL_YEAR_START: FamilySpec =
    FamilySpec::continuous("storage_level_year_start", &["r", "s", "y"]);
pub const STORAGE_LEVEL_YEAR_END: FamilySpec =
    FamilySpec::continuous("storage_level_year_end", &["r", "s", "y"]);
pub const STORAGE_LEVEL_TG1_START: FamilySpec =
    FamilySpec::continuous("storage_level_tg1_start", &["r", "s", "tg1", "y"]);
pub const STORAGE_LEVEL_TG1_END: FamilySpec =
    FamilySpec::continuous("storage_level_tg1_end", &["r", "s", "tg1", "y"]);
pub const STORAGE_LEVEL_TG2_START: FamilySpec =
    FamilySpec::continuous("storage_level_tg2_start", &["r", "s", "tg1", "tg2", "y"]);
pub const STORAGE_LEVEL_TG2_END: FamilySpec =
    FamilySpec::continuous("storage_level_tg2_end", &["r", "s", "tg1", "tg2", "y"]);
pub const STORAGE_LEVEL_TS_START: FamilySpec =
    FamilySpec::continuous("storage_level_ts_start", &["r", "s", "l", "y"]);
pub const NEW_STORAGE_CAPACITY: FamilySpec =
    FamilySpec::continuous("new_storage_capacity", &["r", "s", "y"]);
pub const ACCUMULATED_NEW_STORAGE_CAPACITY: FamilySpec =
    FamilySpec::continuous("accumulated_new_storage_capacity", &["r", "s", "y"]);
pub const STORAGE_UPPER_LIMIT: FamilySpec =
    FamilySpec::continuous("storage_upper_limit", &["r", "s", "y"]);
pub const STORAGE_LOWER_LIMIT: FamilySpec =
    FamilySpec::continuous("storage_lower_limit", &["r", "s", "y"]);
pub const CAPITAL_INVESTMENT_STORAGE: FamilySpec =
    FamilySpec::continuous("capital_investment_storage", &["r", "s", "y"]);
pub const DISCOUNTED_CAPITAL_INVESTMENT_STORAGE: FamilySpec =
    FamilySpec::continuous("discounted_capital_investment_storage", &["r", "s", "y"]);
pub const SALVAGE_VALUE_STORAGE: FamilySpec =
    FamilySpec::continuous("salvage_value_storage", &["r", "s", "y"]);
pub const DISCOUNTED_SALVAGE_VALUE_STORAGE: FamilySpec =
    FamilySpec::continuous("discounted_salvage_value_storage", &["r", "s", "y"]);
pub const TOTAL_DISCOUNTED_STORAGE_COST: FamilySpec =
    FamilySpec::free("total_discounted_storage_cost", &["r", "s", "y"]);

// Costs
pub const CAPITAL_INVESTMENT: FamilySpec =
    FamilySpec::continuous("capital_investment", &["r", "t", "y"]);
pub const DISCOUNTED_CAPITAL_INVESTMENT: FamilySpec =
    FamilySpec::continuous("discounted_capital_investment", &["r", "t", "y"]);
pub const SALVAGE_VALUE: FamilySpec = FamilySpec::continuous("salvage_value", &["r", "t", "y"]);
pub const DISCOUNTED_SALVAGE_VALUE: FamilySpec =
    FamilySpec::continuous("discounted_salvage_value", &["r", "t", "y"]);
pub const ANNUAL_FIXED_OPERATING_COST: FamilySpec =
    FamilySpec::continuous("annual_fixed_operating_cost", &["r", "t", "y"]);
pub const ANNUAL_VARIABLE_OPERATING_COST: FamilySpec =
    FamilySpec::free("annual_variable_operating_cost", &["r", "t", "y"]);
pub const OPERATING_COST: FamilySpec = FamilySpec::free("operating_cost", &["r", "t", "y"]);
pub const DISCOUNTED_OPERATING_COST: FamilySpec =
    FamilySpec::free("discounted_operating_cost", &["r", "t", "y"]);
pub const TOTAL_DISCOUNTED_COST_BY_TECHNOLOGY: FamilySpec =
    FamilySpec::free("total_discounted_cost_by_technology", &["r", "t", "y"]);
pub const TOTAL_DISCOUNTED_COST: FamilySpec =
    FamilySpec::free("total_discounted_cost", &["r", "y"]);

// Emissions
pub const ANNUAL_TECHNOLOGY_EMISSION: FamilySpec =
    FamilySpec::free("annual_technology_emission", &["r", "t", "e", "y"]);
pub const ANNUAL_TECHNOLOGY_EMISSIONS_PENALTY: FamilySpec =
    FamilySpec::free("annual_technology_emissions_penalty", &["r", "t", "y"]);
pub const DISCOUNTED_TECHNOLOGY_EMISSIONS_PENALTY: FamilySpec =
    FamilySpec::free("discounted_technology_emissions_penalty", &["r", "t", "y"]);
pub const ANNUAL_EMISSIONS: FamilySpec = FamilySpec::free("annual_emissions", &["r", "e", "y"]);
pub const MODEL_PERIOD_EMISSIONS: FamilySpec =
    FamilySpec::free("model_period_emissions", &["r", "e"]);

// Reserve margin
pub const TOTAL_CAPACITY_IN_RESERVE_MARGIN: FamilySpec =
    FamilySpec::continuous("total_capacity_in_reserve_margin", &["r", "y"]);
pub const DEMAND_NEEDING_RESERVE_MARGIN: FamilySpec =
    FamilySpec::continuous("demand_needing_reserve_margin", &["r", "l", "y"]);

// Renewable target
pub const TOTAL_RE_PRODUCTION_ANNUAL: FamilySpec =
    FamilySpec::continuous("total_re_production_annual", &["r", "y"]);
pub const RE_TOTAL_PRODUCTION_OF_TARGET_FUEL_ANNUAL: FamilySpec =
    FamilySpec::continuous("re_total_production_of_target_fuel_annual", &["r", "y"]);

// Nodal / transmission
pub const TRANSMISSION_BUILT: FamilySpec = FamilySpec::binary("transmission_built", &["tr", "y"]);
pub const TRANSMISSION_EXISTS: FamilySpec =
    FamilySpec::continuous("transmission_exists", &["tr", "y"]).bounded(0.0, 1.0);
pub const VOLTAGE_ANGLE: FamilySpec =
    FamilySpec::continuous("voltage_angle", &["n", "l", "y"]).bounded(-PI, PI);
pub const TRANSMISSION_BY_LINE: FamilySpec =
    FamilySpec::free("transmission_by_line", &["tr", "l", "f", "y"]);
/// Non-negative parts of the flow on lossy lines, n1 → n2 and n2 → n1.
pub const TRANSMISSION_FORWARD: FamilySpec =
    FamilySpec::continuous("transmission_forward", &["tr", "l", "f", "y"]);
pub const TRANSMISSION_REVERSE: FamilySpec =
    FamilySpec::continuous("transmission_reverse", &["tr", "l", "f", "y"]);
pub const RATE_OF_ACTIVITY_NODAL: FamilySpec =
    FamilySpec::continuous("rate_of_activity_nodal", &["n", "l", "t", "m", "y"]);
pub const RATE_OF_PRODUCTION_NODAL: FamilySpec =
    FamilySpec::continuous("rate_of_production_nodal", &["n", "l", "f", "y"]);
pub const RATE_OF_USE_NODAL: FamilySpec =
    FamilySpec::continuous("rate_of_use_nodal", &["n", "l", "f", "y"]);
pub const CAPITAL_INVESTMENT_TRANSMISSION: FamilySpec =
    FamilySpec::continuous("capital_investment_transmission", &["tr", "y"]);
pub const DISCOUNTED_CAPITAL_INVESTMENT_TRANSMISSION: FamilySpec =
    FamilySpec::continuous("discounted_capital_investment_transmission", &["tr", "y"]);
pub const OPERATING_COST_TRANSMISSION: FamilySpec =
    FamilySpec::continuous("operating_cost_transmission", &["tr", "y"]);
pub const DISCOUNTED_OPERATING_COST_TRANSMISSION: FamilySpec =
    FamilySpec::continuous("discounted_operating_cost_transmission", &["tr", "y"]);
pub const TOTAL_DISCOUNTED_TRANSMISSION_COST: FamilySpec =
    FamilySpec::continuous("total_discounted_transmission_cost", &["n", "y"]);

pub const STORAGE_FAMILIES: &[FamilySpec] = &[
    RATE_OF_STORAGE_CHARGE,
    RATE_OF_STORAGE_DISCHARGE,
    STORAGE_LEVEL_YEAR_START,
    STORAGE_LEVEL_YEAR_END,
    STORAGE_LEVEL_TG1_START,
    STORAGE_LEVEL_TG1_END,
    STORAGE_LEVEL_TG2_START,
    STORAGE_LEVEL_TG2_END,
    STORAGE_LEVEL_TS_START,
    NEW_STORAGE_CAPACITY,
    ACCUMULATED_NEW_STORAGE_CAPACITY,
    STORAGE_UPPER_LIMIT,
    STORAGE_LOWER_LIMIT,
    CAPITAL_INVESTMENT_STORAGE,
    DISCOUNTED_CAPITAL_INVESTMENT_STORAGE,
    SALVAGE_VALUE_STORAGE,
    DISCOUNTED_SALVAGE_VALUE_STORAGE,
    TOTAL_DISCOUNTED_STORAGE_COST,
];

pub const RESERVE_MARGIN_FAMILIES: &[FamilySpec] =
    &[TOTAL_CAPACITY_IN_RESERVE_MARGIN, DEMAND_NEEDING_RESERVE_MARGIN];

pub const RE_TARGET_FAMILIES: &[FamilySpec] =
    &[TOTAL_RE_PRODUCTION_ANNUAL, RE_TOTAL_PRODUCTION_OF_TARGET_FUEL_ANNUAL];

pub const TRANSMISSION_FAMILIES: &[FamilySpec] = &[
    TRANSMISSION_BUILT,
    TRANSMISSION_EXISTS,
    VOLTAGE_ANGLE,
    TRANSMISSION_BY_LINE,
    TRANSMISSION_FORWARD,
    TRANSMISSION_REVERSE,
    RATE_OF_ACTIVITY_NODAL,
    RATE_OF_PRODUCTION_NODAL,
    RATE_OF_USE_NODAL,
    CAPITAL_INVESTMENT_TRANSMISSION,
    DISCOUNTED_CAPITAL_INVESTMENT_TRANSMISSION,
    OPERATING_COST_TRANSMISSION,
    DISCOUNTED_OPERATING_COST_TRANSMISSION,
    TOTAL_DISCOUNTED_TRANSMISSION_COST,
];

/// Every family in declaration order.
pub const ALL_FAMILIES: &[FamilySpec] = &[
    NEW_CAPACITY,
    ACCUMULATED_NEW_CAPACITY,
    TOTAL_CAPACITY_ANNUAL,
    NUMBER_OF_NEW_TECHNOLOGY_UNITS,
    RATE_OF_ACTIVITY,
    RATE_OF_TOTAL_ACTIVITY,
    TOTAL_TECHNOLOGY_ANNUAL_ACTIVITY,
    TOTAL_ANNUAL_TECHNOLOGY_ACTIVITY_BY_MODE,
    TOTAL_TECHNOLOGY_MODEL_PERIOD_ACTIVITY,
    RATE_OF_PRODUCTION,
    RATE_OF_USE,
    PRODUCTION,
    USE,
    PRODUCTION_BY_TECHNOLOGY,
    USE_BY_TECHNOLOGY,
    TRADE,
    RATE_OF_STORAGE_CHARGE,
    RATE_OF_STORAGE_DISCHARGE,
    STORAGE_LEVEL_YEAR_START,
    STORAGE_LEVEL_YEAR_END,
    STORAGE_LEVEL_TG1_START,
    STORAGE_LEVEL_TG1_END,
    STORAGE_LEVEL_TG2_START,
    STORAGE_LEVEL_TG2_END,
    STORAGE_LEVEL_TS_START,
    NEW_STORAGE_CAPACITY,
    ACCUMULATED_NEW_STORAGE_CAPACITY,
    STORAGE_UPPER_LIMIT,
    STORAGE_LOWER_LIMIT,
    CAPITAL_INVESTMENT_STORAGE,
    DISCOUNTED_CAPITAL_INVESTMENT_STORAGE,
    SALVAGE_VALUE_STORAGE,
    DISCOUNTED_SALVAGE_VALUE_STORAGE,
    TOTAL_DISCOUNTED_STORAGE_COST,
    CAPITAL_INVESTMENT,
    DISCOUNTED_CAPITAL_INVESTMENT,
    SALVAGE_VALUE,
    DISCOUNTED_SALVAGE_VALUE,
    ANNUAL_FIXED_OPERATING_COST,
    ANNUAL_VARIABLE_OPERATING_COST,
    OPERATING_COST,
    DISCOUNTED_OPERATING_COST,
    TOTAL_DISCOUNTED_COST_BY_TECHNOLOGY,
    TOTAL_DISCOUNTED_COST,
    ANNUAL_TECHNOLOGY_EMISSION,
    ANNUAL_TECHNOLOGY_EMISSIONS_PENALTY,
    DISCOUNTED_TECHNOLOGY_EMISSIONS_PENALTY,
    ANNUAL_EMISSIONS,
    MODEL_PERIOD_EMISSIONS,
    TOTAL_CAPACITY_IN_RESERVE_MARGIN,
    DEMAND_NEEDING_RESERVE_MARGIN,
    TOTAL_RE_PRODUCTION_ANNUAL,
    RE_TOTAL_PRODUCTION_OF_TARGET_FUEL_ANNUAL,
    TRANSMISSION_BUILT,
    TRANSMISSION_EXISTS,
    VOLTAGE_ANGLE,
    TRANSMISSION_BY_LINE,
    TRANSMISSION_FORWARD,
    TRANSMISSION_REVERSE,
    RATE_OF_ACTIVITY_NODAL,
    RATE_OF_PRODUCTION_NODAL,
    RATE_OF_USE_NODAL,
    CAPITAL_INVESTMENT_TRANSMISSION,
    DISCOUNTED_CAPITAL_INVESTMENT_TRANSMISSION,
    OPERATING_COST_TRANSMISSION,
    DISCOUNTED_OPERATING_COST_TRANSMISSION,
    TOTAL_DISCOUNTED_TRANSMISSION_COST,
];

pub fn family_spec(name: &str) -> Option<&'static FamilySpec> {
    ALL_FAMILIES.iter().find(|spec| spec.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn family_names_are_unique() {
        let names: HashSet<&str> = ALL_FAMILIES.iter().map(|spec| spec.name).collect();
        assert_eq!(names.len(), ALL_FAMILIES.len());
    }

    #[test]
    fn grouped_families_are_catalogued() {
        for group in [
            STORAGE_FAMILIES,
            RESERVE_MARGIN_FAMILIES,
            RE_TARGET_FAMILIES,
            TRANSMISSION_FAMILIES,
        ] {
            for spec in group {
                assert!(family_spec(spec.name).is_some(), "{}", spec.name);
            }
        }
    }

    #[test]
    fn voltage_angle_is_bounded() {
        assert_eq!(VOLTAGE_ANGLE.lower, -PI);
        assert_eq!(VOLTAGE_ANGLE.upper, PI);
    }
}

//! Data-driven model flags, resolved once before assembly.

use emod_core::{Dimension, EmodResult, ScenarioFlags};
use emod_io::FactStore;
use serde::Serialize;
use tracing::info;

use crate::families::*;

/// Which optional parts of the model the scenario data calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ModelFlags {
    /// Nodal/transmission sub-model requested and backed by data
    pub nodal: bool,
    pub storage: bool,
    pub reserve_margin: bool,
    pub re_target: bool,
    pub model_period_activity_limits: bool,
    pub model_period_emission_limits: bool,
    pub technology_units: bool,
    pub trade: bool,
    /// Persist-only families are created
    #[serde(skip)]
    production_by_technology: bool,
    #[serde(skip)]
    use_by_technology: bool,
}

impl ModelFlags {
    pub fn resolve(store: &FactStore, scenario: &ScenarioFlags) -> EmodResult<Self> {
        let any_positive =
            |name: &str| -> EmodResult<bool> { Ok(store.param(name)?.any_positive()) };
        let any_explicit =
            |name: &str| -> EmodResult<bool> { Ok(!store.param(name)?.is_empty()) };

        let transmission_data = store
            .param("TransmissionModelingEnabled")?
            .iter()
            .any(|(_, value)| value != 0.0)
            && !store.nodes().is_empty()
            && !store.transmission_lines().is_empty();

        let re_target = any_positive("REMinProductionTarget")?;
        let flags = Self {
            nodal: scenario.nodal && transmission_data,
            storage: !store.members(Dimension::Storage).is_empty()
                && !store.members(Dimension::Region).is_empty(),
            reserve_margin: any_positive("ReserveMargin")?,
            re_target,
            model_period_activity_limits: any_explicit(
                "TotalTechnologyModelPeriodActivityUpperLimit",
            )? || any_explicit("TotalTechnologyModelPeriodActivityLowerLimit")?,
            model_period_emission_limits: any_explicit("ModelPeriodEmissionLimit")?,
            technology_units: any_positive("CapacityOfOneTechnologyUnit")?,
            trade: any_positive("TradeRoute")?,
            production_by_technology: scenario.persists(PRODUCTION_BY_TECHNOLOGY.name) || re_target,
            use_by_technology: scenario.persists(USE_BY_TECHNOLOGY.name),
        };

        info!(
            nodal = flags.nodal,
            storage = flags.storage,
            reserve_margin = flags.reserve_margin,
            re_target = flags.re_target,
            trade = flags.trade,
            "resolved model flags"
        );
        Ok(flags)
    }

    /// Whether the variable family `name` is created under these flags.
    pub fn requires(&self, name: &str) -> bool {
        if name == PRODUCTION_BY_TECHNOLOGY.name {
            return self.production_by_technology;
        }
        if name == USE_BY_TECHNOLOGY.name {
            return self.use_by_technology;
        }
        if name == NUMBER_OF_NEW_TECHNOLOGY_UNITS.name {
            return self.technology_units;
        }
        if name == TOTAL_TECHNOLOGY_MODEL_PERIOD_ACTIVITY.name {
            return self.model_period_activity_limits;
        }
        if name == MODEL_PERIOD_EMISSIONS.name {
            return self.model_period_emission_limits;
        }
        if name == TRADE.name {
            return self.trade;
        }
        if STORAGE_FAMILIES.iter().any(|spec| spec.name == name) {
            return self.storage;
        }
        if RESERVE_MARGIN_FAMILIES.iter().any(|spec| spec.name == name) {
            return self.reserve_margin;
        }
        if RE_TARGET_FAMILIES.iter().any(|spec| spec.name == name) {
            return self.re_target;
        }
        if TRANSMISSION_FAMILIES.iter().any(|spec| spec.name == name) {
            return self.nodal;
        }
        ALL_FAMILIES.iter().any(|spec| spec.name == name)
    }

    /// Names of every variable family that will be created, in declaration order.
    pub fn required_families(&self) -> Vec<&'static str> {
        ALL_FAMILIES
            .iter()
            .filter(|spec| self.requires(spec.name))
            .map(|spec| spec.name)
            .collect()
    }
}

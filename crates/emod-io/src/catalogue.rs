//! Built-in parameter catalogue: name, dimensionality and default of every
//! parameter table a scenario may carry.

use emod_core::Dimension;
use emod_core::Dimension::*;

/// Declaration of one parameter fact table.
#[derive(Debug, Clone, Copy)]
pub struct ParamDef {
    pub name: &'static str,
    pub dims: &'static [Dimension],
    pub default: Option<f64>,
}

impl ParamDef {
    const fn new(name: &'static str, dims: &'static [Dimension], default: Option<f64>) -> Self {
        Self {
            name,
            dims,
            default,
        }
    }

    /// Column headers of the parameter file; a repeated dimension doubles its letter.
    pub fn columns(&self) -> Vec<String> {
        param_columns(self.dims)
    }
}

pub fn param_columns(dims: &[Dimension]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::with_capacity(dims.len());
    for (idx, dim) in dims.iter().enumerate() {
        let repeats = dims[..idx].iter().filter(|d| *d == dim).count();
        let mut column = dim.column().to_string();
        for _ in 0..repeats {
            column.push_str(dim.column());
        }
        columns.push(column);
    }
    columns
}

pub const PARAMETERS: &[ParamDef] = &[
    // Time
    ParamDef::new("YearSplit", &[Timeslice, Year], None),
    ParamDef::new("DiscountRate", &[Region], Some(0.05)),
    ParamDef::new("DepreciationMethod", &[Region], Some(1.0)),
    // Demand
    ParamDef::new("SpecifiedAnnualDemand", &[Region, Fuel, Year], Some(0.0)),
    ParamDef::new("SpecifiedDemandProfile", &[Region, Fuel, Timeslice, Year], Some(0.0)),
    ParamDef::new("AccumulatedAnnualDemand", &[Region, Fuel, Year], Some(0.0)),
    // Technology performance
    ParamDef::new("CapacityToActivityUnit", &[Region, Technology], Some(1.0)),
    ParamDef::new("CapacityFactor", &[Region, Technology, Timeslice, Year], Some(1.0)),
    ParamDef::new("AvailabilityFactor", &[Region, Technology, Year], Some(1.0)),
    ParamDef::new("OperationalLife", &[Region, Technology], Some(1.0)),
    ParamDef::new("ResidualCapacity", &[Region, Technology, Year], Some(0.0)),
    ParamDef::new("InputActivityRatio", &[Region, Technology, Fuel, Mode, Year], Some(0.0)),
    ParamDef::new("OutputActivityRatio", &[Region, Technology, Fuel, Mode, Year], Some(0.0)),
    // Costs
    ParamDef::new("CapitalCost", &[Region, Technology, Year], Some(0.0)),
    ParamDef::new("FixedCost", &[Region, Technology, Year], Some(0.0)),
    ParamDef::new("VariableCost", &[Region, Technology, Mode, Year], Some(0.0)),
    // Capacity and activity limits
    ParamDef::new("CapacityOfOneTechnologyUnit", &[Region, Technology, Year], None),
    ParamDef::new("TotalAnnualMaxCapacity", &[Region, Technology, Year], None),
    ParamDef::new("TotalAnnualMinCapacity", &[Region, Technology, Year], None),
    ParamDef::new("TotalAnnualMaxCapacityInvestment", &[Region, Technology, Year], None),
    ParamDef::new("TotalAnnualMinCapacityInvestment", &[Region, Technology, Year], None),
    ParamDef::new("TotalTechnologyAnnualActivityUpperLimit", &[Region, Technology, Year], None),
    ParamDef::new("TotalTechnologyAnnualActivityLowerLimit", &[Region, Technology, Year], None),
    ParamDef::new("TotalTechnologyModelPeriodActivityUpperLimit", &[Region, Technology], None),
    ParamDef::new("TotalTechnologyModelPeriodActivityLowerLimit", &[Region, Technology], None),
    // Reserve margin and renewables
    ParamDef::new("ReserveMargin", &[Region, Year], None),
    ParamDef::new("ReserveMarginTagTechnology", &[Region, Technology, Year], Some(0.0)),
    ParamDef::new("ReserveMarginTagFuel", &[Region, Fuel, Year], Some(0.0)),
    ParamDef::new("REMinProductionTarget", &[Region, Year], None),
    ParamDef::new("RETagTechnology", &[Region, Technology, Year], Some(0.0)),
    ParamDef::new("RETagFuel", &[Region, Fuel, Year], Some(0.0)),
    // Emissions
    ParamDef::new("EmissionActivityRatio", &[Region, Technology, Emission, Mode, Year], Some(0.0)),
    ParamDef::new("EmissionsPenalty", &[Region, Emission, Year], Some(0.0)),
    ParamDef::new("AnnualExogenousEmission", &[Region, Emission, Year], Some(0.0)),
    ParamDef::new("AnnualEmissionLimit", &[Region, Emission, Year], None),
    ParamDef::new("ModelPeriodExogenousEmission", &[Region, Emission], Some(0.0)),
    ParamDef::new("ModelPeriodEmissionLimit", &[Region, Emission], None),
    // Trade
    ParamDef::new("TradeRoute", &[Region, Region, Fuel, Year], Some(0.0)),
    // Storage
    ParamDef::new("TechnologyToStorage", &[Region, Technology, Storage, Mode], Some(0.0)),
    ParamDef::new("TechnologyFromStorage", &[Region, Technology, Storage, Mode], Some(0.0)),
    ParamDef::new("StorageLevelStart", &[Region, Storage], Some(0.0)),
    ParamDef::new("StorageNewCapacityFill", &[Region, Storage], Some(0.0)),
    ParamDef::new("StorageMaxChargeRate", &[Region, Storage], None),
    ParamDef::new("StorageMaxDischargeRate", &[Region, Storage], None),
    ParamDef::new("MinStorageCharge", &[Region, Storage, Year], Some(0.0)),
    ParamDef::new("OperationalLifeStorage", &[Region, Storage], Some(1.0)),
    ParamDef::new("CapitalCostStorage", &[Region, Storage, Year], Some(0.0)),
    ParamDef::new("ResidualStorageCapacity", &[Region, Storage, Year], Some(0.0)),
    // Nodal
    ParamDef::new("TransmissionModelingEnabled", &[Region, Fuel, Year], None),
    ParamDef::new("NodalDistributionDemand", &[Node, Fuel, Year], Some(0.0)),
    ParamDef::new("NodalDistributionTechnologyCapacity", &[Node, Technology, Year], Some(0.0)),
];

pub fn param_def(name: &str) -> Option<&'static ParamDef> {
    PARAMETERS.iter().find(|def| def.name == name)
}

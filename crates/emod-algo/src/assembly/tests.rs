use super::{assemble, AssemblyContext};
use crate::flags::ModelFlags;
use crate::queries::{CATALOGUE, TIMESLICE_HIERARCHY};
use crate::query::execute_queries;
use crate::timeslice::TimeHierarchy;
use emod_core::{Dimension, EmodResult, Model, ScenarioFlags, DEFAULT_RESTRICTION_THRESHOLD};
use emod_io::{FactStore, FactStoreBuilder};

/// One region, technology and fuel over two equal timeslices of 2020.
pub(crate) fn base_store() -> FactStoreBuilder {
    FactStore::builder()
        .set(Dimension::Region, ["R1"])
        .set(Dimension::Technology, ["T1"])
        .set(Dimension::Fuel, ["ELC"])
        .set(Dimension::Mode, ["1"])
        .set(Dimension::Timeslice, ["DAY", "NIGHT"])
        .set(Dimension::Year, ["2020"])
        .param("YearSplit", &["DAY", "2020"], 0.5)
        .param("YearSplit", &["NIGHT", "2020"], 0.5)
}

/// `base_store` with T1 producing ELC in mode 1.
pub(crate) fn producing_store() -> FactStoreBuilder {
    base_store().param("OutputActivityRatio", &["R1", "T1", "ELC", "1", "2020"], 1.0)
}

pub(crate) fn assemble_store(store: &FactStore) -> Model {
    assemble_with(store, &ScenarioFlags::default())
}

pub(crate) fn assemble_with(store: &FactStore, scenario: &ScenarioFlags) -> Model {
    try_assemble_with(store, scenario).unwrap()
}

pub(crate) fn try_assemble_with(store: &FactStore, scenario: &ScenarioFlags) -> EmodResult<Model> {
    let results = execute_queries(store, CATALOGUE, 1).unwrap();
    let hierarchy = TimeHierarchy::from_table(
        results.get(TIMESLICE_HIERARCHY).unwrap(),
        store.members(Dimension::Timeslice),
        store.members(Dimension::Year),
    )
    .unwrap();
    let flags = ModelFlags::resolve(store, scenario).unwrap();
    let cx = AssemblyContext {
        store,
        results: &results,
        hierarchy: &hierarchy,
        flags: &flags,
        scenario,
        workers: 1,
        restriction_threshold: DEFAULT_RESTRICTION_THRESHOLD,
    };
    assemble(&cx)
}

#[test]
fn objective_sums_total_discounted_cost() {
    let store = base_store()
        .set(Dimension::Year, ["2021"])
        .build()
        .unwrap();
    let model = assemble_store(&store);
    assert_eq!(model.family_len("total_discounted_cost"), 2);
    assert_eq!(model.objective().terms().len(), 2);
    assert_eq!(model.constraint_count("total_discounted_cost_def"), 2);
}

#[test]
fn constraints_only_reference_declared_variables() {
    let store = producing_store()
        .param("SpecifiedAnnualDemand", &["R1", "ELC", "2020"], 10.0)
        .param("SpecifiedDemandProfile", &["R1", "ELC", "DAY", "2020"], 0.6)
        .param("SpecifiedDemandProfile", &["R1", "ELC", "NIGHT", "2020"], 0.4)
        .param("CapitalCost", &["R1", "T1", "2020"], 1000.0)
        .param("VariableCost", &["R1", "T1", "1", "2020"], 2.0)
        .build()
        .unwrap();
    let model = assemble_store(&store);
    let declared = model.num_variables();
    for constraint in model.constraints() {
        for (var, _) in constraint.lhs.terms() {
            assert!(var.index() < declared, "{} references an unknown variable", constraint.family);
        }
    }
    assert_eq!(model.constraint_count("annual_variable_operating_cost_def"), 1);
}

#[test]
fn persisted_only_families_follow_the_persist_list() {
    let scenario = ScenarioFlags {
        persist: ["new_capacity".to_string()].into_iter().collect(),
        ..ScenarioFlags::default()
    };
    let model = assemble_with(&producing_store().build().unwrap(), &scenario);
    assert!(!model.has_family("production_by_technology"));
    assert_eq!(model.constraint_count("production_by_technology_def"), 0);
    assert!(model.has_family("new_capacity"));
}

#[test]
fn empty_store_assembles_an_empty_model() {
    let store = FactStore::builder()
        .set(Dimension::Year, ["2020"])
        .build()
        .unwrap();
    let model = assemble_store(&store);
    assert_eq!(model.num_constraints(), 0);
    assert!(model.objective().terms().is_empty());
}

//! Time-slice hierarchy: year ⊃ group-1 period ⊃ group-2 period ⊃ timeslice.
//!
//! Storage levels are chained across this structure. The start of any period
//! equals the end of the preceding period at the same depth, except at the
//! first instant of the horizon and the first instant of a later year;
//! [`TimeHierarchy::start_case`] says which predecessor applies.

use emod_core::{EmodError, EmodResult, Table};
use std::collections::{BTreeMap, HashMap};

/// Group id used when a scenario declares no time groups.
pub const IMPLICIT_GROUP: &str = "ALL";

/// Which predecessor a timeslice's starting storage level refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartCase {
    /// First timeslice of the first group-2 of the first group-1 of the first year
    HorizonStart,
    /// First instant of a later year
    YearStart,
    /// First instant of a group-1 period other than the first
    Group1Start,
    /// First instant of a group-2 period other than the first in its group-1
    Group2Start,
    Interior,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Period {
    pub id: String,
    pub order: u32,
    pub multiplier: f64,
}

/// Where a timeslice sits in the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePosition {
    pub tg1: String,
    pub tg2: String,
    pub tg1_order: u32,
    pub tg2_order: u32,
    pub ts_order: u32,
}

#[derive(Debug, Clone)]
pub struct TimeHierarchy {
    years: Vec<String>,
    group1: Vec<Period>,
    group2: Vec<Period>,
    positions: HashMap<String, SlicePosition>,
    by_position: BTreeMap<(u32, u32, u32), String>,
}

impl TimeHierarchy {
    /// Build from the `timeslice_hierarchy` query result: key columns
    /// `l, tg1, tg2`, values `l_order, tg1_order, tg2_order, tg1_mult, tg2_mult`.
    pub fn from_table(table: &Table, timeslices: &[String], years: &[String]) -> EmodResult<Self> {
        if table.is_empty() {
            return Ok(Self::implicit(timeslices, years));
        }

        let mut group1: BTreeMap<u32, Period> = BTreeMap::new();
        let mut group2: BTreeMap<u32, Period> = BTreeMap::new();
        let mut positions = HashMap::new();
        let mut by_position = BTreeMap::new();

        for row in table.rows() {
            let (l, tg1, tg2) = (row.at(0), row.at(1), row.at(2));
            let ts_order = order_value(row.value(0), l)?;
            let tg1_order = order_value(row.value(1), tg1)?;
            let tg2_order = order_value(row.value(2), tg2)?;
            for (id, multiplier) in [(tg1, row.value(3)), (tg2, row.value(4))] {
                if !(multiplier > 0.0) {
                    return Err(EmodError::Input(format!(
                        "time group {} has non-positive multiplier {}",
                        id, multiplier
                    )));
                }
            }
            register_period(&mut group1, tg1, tg1_order, row.value(3))?;
            register_period(&mut group2, tg2, tg2_order, row.value(4))?;

            if by_position
                .insert((tg1_order, tg2_order, ts_order), l.to_string())
                .is_some()
            {
                return Err(EmodError::Input(format!(
                    "duplicate timeslice order {} in time groups {}/{}",
                    ts_order, tg1, tg2
                )));
            }
            let position = SlicePosition {
                tg1: tg1.to_string(),
                tg2: tg2.to_string(),
                tg1_order,
                tg2_order,
                ts_order,
            };
            if positions.insert(l.to_string(), position).is_some() {
                return Err(EmodError::Input(format!(
                    "timeslice {} belongs to more than one time group",
                    l
                )));
            }
        }

        for l in timeslices {
            if !positions.contains_key(l) {
                return Err(EmodError::Input(format!(
                    "timeslice {} is not assigned to any time group",
                    l
                )));
            }
        }

        Ok(Self {
            years: years.to_vec(),
            group1: group1.into_values().collect(),
            group2: group2.into_values().collect(),
            positions,
            by_position,
        })
    }

    /// Single group-1 and group-2 period holding every timeslice in set order.
    fn implicit(timeslices: &[String], years: &[String]) -> Self {
        let period = Period {
            id: IMPLICIT_GROUP.to_string(),
            order: 1,
            multiplier: 1.0,
        };
        let mut positions = HashMap::new();
        let mut by_position = BTreeMap::new();
        for (idx, l) in timeslices.iter().enumerate() {
            let ts_order = idx as u32 + 1;
            positions.insert(
                l.clone(),
                SlicePosition {
                    tg1: IMPLICIT_GROUP.to_string(),
                    tg2: IMPLICIT_GROUP.to_string(),
                    tg1_order: 1,
                    tg2_order: 1,
                    ts_order,
                },
            );
            by_position.insert((1, 1, ts_order), l.clone());
        }
        Self {
            years: years.to_vec(),
            group1: vec![period.clone()],
            group2: vec![period],
            positions,
            by_position,
        }
    }

    pub fn years(&self) -> &[String] {
        &self.years
    }

    /// Group-1 periods in order.
    pub fn group1(&self) -> &[Period] {
        &self.group1
    }

    /// Group-2 periods in order.
    pub fn group2(&self) -> &[Period] {
        &self.group2
    }

    /// Group-2 periods holding at least one timeslice of `tg1`, in order.
    pub fn group2_in(&self, tg1: &str) -> Vec<&Period> {
        let Some(tg1_order) = self.group1_order(tg1) else {
            return Vec::new();
        };
        self.group2
            .iter()
            .filter(|period| {
                self.by_position
                    .range((tg1_order, period.order, 0)..=(tg1_order, period.order, u32::MAX))
                    .next()
                    .is_some()
            })
            .collect()
    }

    /// Timeslices of (`tg1`, `tg2`) in order.
    pub fn slices_in(&self, tg1: &str, tg2: &str) -> Vec<&String> {
        match (self.group1_order(tg1), self.group2_order(tg2)) {
            (Some(o1), Some(o2)) => self
                .by_position
                .range((o1, o2, 0)..=(o1, o2, u32::MAX))
                .map(|(_, l)| l)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Timeslices of `tg1` across all its group-2 periods, in order.
    pub fn slices_in_group1(&self, tg1: &str) -> Vec<&String> {
        match self.group1_order(tg1) {
            Some(o1) => self
                .by_position
                .range((o1, 0, 0)..=(o1, u32::MAX, u32::MAX))
                .map(|(_, l)| l)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn position(&self, l: &str) -> Option<&SlicePosition> {
        self.positions.get(l)
    }

    pub fn timeslice_at(&self, tg1_order: u32, tg2_order: u32, ts_order: u32) -> Option<&str> {
        self.by_position
            .get(&(tg1_order, tg2_order, ts_order))
            .map(String::as_str)
    }

    /// The timeslice preceding `l` within its group-2 period.
    pub fn previous_timeslice(&self, l: &str) -> Option<&str> {
        let pos = self.positions.get(l)?;
        self.by_position
            .range((pos.tg1_order, pos.tg2_order, 0)..(pos.tg1_order, pos.tg2_order, pos.ts_order))
            .next_back()
            .map(|(_, prev)| prev.as_str())
    }

    pub fn previous_group1(&self, tg1: &str) -> Option<&Period> {
        let idx = self.group1.iter().position(|p| p.id == tg1)?;
        idx.checked_sub(1).map(|prev| &self.group1[prev])
    }

    /// The group-2 period preceding `tg2` inside `tg1`.
    pub fn previous_group2(&self, tg1: &str, tg2: &str) -> Option<&Period> {
        let periods = self.group2_in(tg1);
        let idx = periods.iter().position(|p| p.id == tg2)?;
        idx.checked_sub(1).map(|prev| periods[prev])
    }

    pub fn start_case(&self, year: &str, tg1: &str, tg2: &str, l: &str) -> StartCase {
        if self.previous_timeslice(l).is_some() {
            return StartCase::Interior;
        }
        if self.previous_group2(tg1, tg2).is_some() {
            return StartCase::Group2Start;
        }
        if self.previous_group1(tg1).is_some() {
            return StartCase::Group1Start;
        }
        if self.years.first().is_some_and(|first| first == year) {
            StartCase::HorizonStart
        } else {
            StartCase::YearStart
        }
    }

    pub fn group1_multiplier(&self, tg1: &str) -> f64 {
        self.group1
            .iter()
            .find(|p| p.id == tg1)
            .map_or(1.0, |p| p.multiplier)
    }

    pub fn group2_multiplier(&self, tg2: &str) -> f64 {
        self.group2
            .iter()
            .find(|p| p.id == tg2)
            .map_or(1.0, |p| p.multiplier)
    }

    /// Fraction of a timeslice's yearly share covered by one occurrence.
    pub fn occurrence_weight(&self, l: &str) -> f64 {
        match self.positions.get(l) {
            Some(pos) => {
                1.0 / (self.group1_multiplier(&pos.tg1) * self.group2_multiplier(&pos.tg2))
            }
            None => 1.0,
        }
    }

    fn group1_order(&self, tg1: &str) -> Option<u32> {
        self.group1.iter().find(|p| p.id == tg1).map(|p| p.order)
    }

    fn group2_order(&self, tg2: &str) -> Option<u32> {
        self.group2.iter().find(|p| p.id == tg2).map(|p| p.order)
    }
}

fn order_value(raw: f64, id: &str) -> EmodResult<u32> {
    if raw.fract() != 0.0 || raw < 0.0 || raw > u32::MAX as f64 {
        return Err(EmodError::Input(format!(
            "order of {} must be a non-negative integer, got {}",
            id, raw
        )));
    }
    Ok(raw as u32)
}

fn register_period(
    periods: &mut BTreeMap<u32, Period>,
    id: &str,
    order: u32,
    multiplier: f64,
) -> EmodResult<()> {
    match periods.get(&order) {
        Some(existing) if existing.id != id => Err(EmodError::Input(format!(
            "time groups {} and {} share order {}",
            existing.id, id, order
        ))),
        Some(_) => Ok(()),
        None => {
            periods.insert(
                order,
                Period {
                    id: id.to_string(),
                    order,
                    multiplier,
                },
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emod_core::{key, Row};

    /// Two seasons, two day types each, two slices per day type.
    fn hierarchy() -> TimeHierarchy {
        let mut table = Table::new(
            &["l", "tg1", "tg2"],
            &["l_order", "tg1_order", "tg2_order", "tg1_mult", "tg2_mult"],
        );
        let layout = [
            ("SWD1", "SUMMER", "WD", 1.0, 1.0, 1.0),
            ("SWD2", "SUMMER", "WD", 2.0, 1.0, 1.0),
            ("SWE1", "SUMMER", "WE", 1.0, 1.0, 2.0),
            ("SWE2", "SUMMER", "WE", 2.0, 1.0, 2.0),
            ("WWD1", "WINTER", "WD", 1.0, 2.0, 1.0),
            ("WWD2", "WINTER", "WD", 2.0, 2.0, 1.0),
        ];
        for (l, tg1, tg2, lo, o1, o2) in layout {
            let tg2_mult = if tg2 == "WD" { 5.0 } else { 2.0 };
            table
                .push(Row::new(key(&[l, tg1, tg2]), vec![lo, o1, o2, 1.0, tg2_mult]))
                .unwrap();
        }
        table.sort();
        let slices: Vec<String> = layout.iter().map(|row| row.0.to_string()).collect();
        TimeHierarchy::from_table(&table, &slices, &key(&["2020", "2021"])).unwrap()
    }

    #[test]
    fn start_cases_follow_nesting() {
        let h = hierarchy();
        assert_eq!(h.start_case("2020", "SUMMER", "WD", "SWD1"), StartCase::HorizonStart);
        assert_eq!(h.start_case("2021", "SUMMER", "WD", "SWD1"), StartCase::YearStart);
        assert_eq!(h.start_case("2020", "SUMMER", "WE", "SWE1"), StartCase::Group2Start);
        assert_eq!(h.start_case("2020", "WINTER", "WD", "WWD1"), StartCase::Group1Start);
        assert_eq!(h.start_case("2020", "SUMMER", "WE", "SWE2"), StartCase::Interior);
    }

    #[test]
    fn predecessors_stay_within_group() {
        let h = hierarchy();
        assert_eq!(h.previous_timeslice("SWD2"), Some("SWD1"));
        assert_eq!(h.previous_timeslice("SWE1"), None);
        assert_eq!(h.previous_group2("SUMMER", "WE").map(|p| p.id.as_str()), Some("WD"));
        assert!(h.previous_group2("WINTER", "WD").is_none());
        assert_eq!(h.timeslice_at(2, 1, 2), Some("WWD2"));
    }

    #[test]
    fn group_membership_and_weights() {
        let h = hierarchy();
        let winter: Vec<&str> = h.group2_in("WINTER").iter().map(|p| p.id.as_str()).collect();
        assert_eq!(winter, vec!["WD"]);
        assert_eq!(h.slices_in("SUMMER", "WE").len(), 2);
        assert_eq!(h.slices_in_group1("SUMMER").len(), 4);
        assert!((h.occurrence_weight("SWD1") - 0.2).abs() < 1e-12);
        assert!((h.occurrence_weight("SWE1") - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unassigned_timeslice_is_an_input_error() {
        let mut table = Table::new(
            &["l", "tg1", "tg2"],
            &["l_order", "tg1_order", "tg2_order", "tg1_mult", "tg2_mult"],
        );
        table
            .push(Row::new(key(&["L1", "S", "D"]), vec![1.0, 1.0, 1.0, 1.0, 1.0]))
            .unwrap();
        let err =
            TimeHierarchy::from_table(&table, &key(&["L1", "L2"]), &key(&["2020"])).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn duplicate_order_is_an_input_error() {
        let mut table = Table::new(
            &["l", "tg1", "tg2"],
            &["l_order", "tg1_order", "tg2_order", "tg1_mult", "tg2_mult"],
        );
        for l in ["L1", "L2"] {
            table
                .push(Row::new(key(&[l, "S", "D"]), vec![1.0, 1.0, 1.0, 1.0, 1.0]))
                .unwrap();
        }
        assert!(
            TimeHierarchy::from_table(&table, &key(&["L1", "L2"]), &key(&["2020"])).is_err()
        );
    }

    #[test]
    fn no_groups_gives_single_implicit_period() {
        let table = Table::new(
            &["l", "tg1", "tg2"],
            &["l_order", "tg1_order", "tg2_order", "tg1_mult", "tg2_mult"],
        );
        let h = TimeHierarchy::from_table(&table, &key(&["DAY", "NIGHT"]), &key(&["2020"]))
            .unwrap();
        assert_eq!(
            h.start_case("2020", IMPLICIT_GROUP, IMPLICIT_GROUP, "DAY"),
            StartCase::HorizonStart
        );
        assert_eq!(h.previous_timeslice("NIGHT"), Some("DAY"));
        assert_eq!(h.occurrence_weight("NIGHT"), 1.0);
    }
}

//! Dimension sets: the named identifier collections every variable and
//! constraint family is indexed over.

use crate::error::{EmodError, EmodResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The dimensions a scenario can be indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    Region,
    Technology,
    Timeslice,
    Fuel,
    Emission,
    Mode,
    Year,
    Storage,
    Node,
    TransmissionLine,
    TimeGroup1,
    TimeGroup2,
}

impl Dimension {
    pub const ALL: [Dimension; 12] = [
        Dimension::Region,
        Dimension::Technology,
        Dimension::Timeslice,
        Dimension::Fuel,
        Dimension::Emission,
        Dimension::Mode,
        Dimension::Year,
        Dimension::Storage,
        Dimension::Node,
        Dimension::TransmissionLine,
        Dimension::TimeGroup1,
        Dimension::TimeGroup2,
    ];

    /// File stem of the set table in a scenario directory.
    pub fn set_name(&self) -> &'static str {
        match self {
            Dimension::Region => "REGION",
            Dimension::Technology => "TECHNOLOGY",
            Dimension::Timeslice => "TIMESLICE",
            Dimension::Fuel => "FUEL",
            Dimension::Emission => "EMISSION",
            Dimension::Mode => "MODE_OF_OPERATION",
            Dimension::Year => "YEAR",
            Dimension::Storage => "STORAGE",
            Dimension::Node => "NODE",
            Dimension::TransmissionLine => "TRANSMISSIONLINE",
            Dimension::TimeGroup1 => "TSGROUP1",
            Dimension::TimeGroup2 => "TSGROUP2",
        }
    }

    /// Short column name used in parameter and result tables.
    pub fn column(&self) -> &'static str {
        match self {
            Dimension::Region => "r",
            Dimension::Technology => "t",
            Dimension::Timeslice => "l",
            Dimension::Fuel => "f",
            Dimension::Emission => "e",
            Dimension::Mode => "m",
            Dimension::Year => "y",
            Dimension::Storage => "s",
            Dimension::Node => "n",
            Dimension::TransmissionLine => "tr",
            Dimension::TimeGroup1 => "tg1",
            Dimension::TimeGroup2 => "tg2",
        }
    }

    pub fn from_set_name(name: &str) -> Option<Self> {
        Dimension::ALL
            .iter()
            .copied()
            .find(|dim| dim.set_name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.set_name())
    }
}

/// An ordered, duplicate-free collection of identifiers for one dimension.
///
/// Members keep their load order, except for [`Dimension::Year`] which is
/// sorted numerically so that "previous year" and discounting offsets are
/// well defined.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSet {
    dimension: Dimension,
    members: Vec<String>,
    positions: HashMap<String, usize>,
}

impl DimensionSet {
    pub fn new<I, S>(dimension: Dimension, members: I) -> EmodResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for member in members {
            let member = member.into();
            let trimmed = member.trim();
            if trimmed.is_empty() {
                return Err(EmodError::Input(format!(
                    "empty identifier in set {}",
                    dimension
                )));
            }
            if !unique.iter().any(|existing| existing == trimmed) {
                unique.push(trimmed.to_string());
            }
        }

        if dimension == Dimension::Year {
            let mut numbered = Vec::with_capacity(unique.len());
            for year in unique {
                let value: i32 = year.parse().map_err(|_| {
                    EmodError::Input(format!("year '{}' is not an integer", year))
                })?;
                numbered.push((value, year));
            }
            numbered.sort_by_key(|(value, _)| *value);
            unique = numbered.into_iter().map(|(_, year)| year).collect();
        }

        let positions = unique
            .iter()
            .enumerate()
            .map(|(idx, member)| (member.clone(), idx))
            .collect();

        Ok(Self {
            dimension,
            members: unique,
            positions,
        })
    }

    pub fn empty(dimension: Dimension) -> Self {
        Self {
            dimension,
            members: Vec::new(),
            positions: HashMap::new(),
        }
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &str) -> bool {
        self.positions.contains_key(member)
    }

    pub fn position(&self, member: &str) -> Option<usize> {
        self.positions.get(member).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.members.iter()
    }
}

/// All dimension sets of one scenario, frozen after load.
#[derive(Debug, Clone, Default)]
pub struct Sets {
    by_dimension: BTreeMap<Dimension, DimensionSet>,
}

impl Sets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, set: DimensionSet) {
        self.by_dimension.insert(set.dimension(), set);
    }

    /// Members of a dimension; an absent set behaves as an empty one.
    pub fn members(&self, dimension: Dimension) -> &[String] {
        self.by_dimension
            .get(&dimension)
            .map(DimensionSet::members)
            .unwrap_or(&[])
    }

    pub fn get(&self, dimension: Dimension) -> Option<&DimensionSet> {
        self.by_dimension.get(&dimension)
    }

    pub fn contains(&self, dimension: Dimension, member: &str) -> bool {
        self.by_dimension
            .get(&dimension)
            .is_some_and(|set| set.contains(member))
    }

    /// Numeric year values in ascending order.
    pub fn years(&self) -> Vec<i32> {
        self.members(Dimension::Year)
            .iter()
            .filter_map(|year| year.parse().ok())
            .collect()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.years().first().copied()
    }

    pub fn last_year(&self) -> Option<i32> {
        self.years().last().copied()
    }

    /// The year preceding `year` in the Year set.
    pub fn previous_year(&self, year: &str) -> Option<&String> {
        let years = self.members(Dimension::Year);
        let position = self.get(Dimension::Year)?.position(year)?;
        position.checked_sub(1).map(|idx| &years[idx])
    }
}

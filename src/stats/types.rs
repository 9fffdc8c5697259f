//! Row types produced by the aggregation and change pipelines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{CityId, Column, Observation, Version};

/// Which field of an [`Observation`] defines a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Country,
    State,
}

impl Grouping {
    /// Rows without a key (e.g. cities with no resolved state) are left out.
    pub fn key(self, observation: &Observation) -> Option<&str> {
        let key = match self {
            Grouping::Country => Some(observation.country.as_str()),
            Grouping::State => observation.state.as_deref(),
        };
        key.filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    Max,
    Min,
    WeightedMean,
}

impl Statistic {
    pub const ALL: [Statistic; 4] = [
        Statistic::Mean,
        Statistic::Max,
        Statistic::Min,
        Statistic::WeightedMean,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Max => "max",
            Statistic::Min => "min",
            Statistic::WeightedMean => "weighted_mean",
        }
    }
}

/// One statistic for one (region, year).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub region: String,
    pub year: i32,
    /// Mean population rounded to the nearest thousand, shared by every
    /// statistic of the same (region, year).
    pub population: Option<f64>,
    pub values: BTreeMap<Column, Option<f64>>,
}

impl AggregateRow {
    pub fn value(&self, column: Column) -> Option<f64> {
        self.values.get(&column).copied().flatten()
    }
}

/// Mean, max, min and population-weighted mean tables for one version,
/// each sorted by (region, year).
#[derive(Debug, Clone, Serialize)]
pub struct AggregateTables {
    pub version: Version,
    pub grouping: Grouping,
    pub columns: Vec<Column>,
    pub mean: Vec<AggregateRow>,
    pub max: Vec<AggregateRow>,
    pub min: Vec<AggregateRow>,
    pub weighted_mean: Vec<AggregateRow>,
}

impl AggregateTables {
    pub fn table(&self, statistic: Statistic) -> &[AggregateRow] {
        match statistic {
            Statistic::Mean => &self.mean,
            Statistic::Max => &self.max,
            Statistic::Min => &self.min,
            Statistic::WeightedMean => &self.weighted_mean,
        }
    }

    pub fn row(&self, statistic: Statistic, region: &str, year: i32) -> Option<&AggregateRow> {
        let table = self.table(statistic);
        table
            .binary_search_by(|r| (r.region.as_str(), r.year).cmp(&(region, year)))
            .ok()
            .map(|i| &table[i])
    }

    pub fn for_year(&self, statistic: Statistic, year: i32) -> impl Iterator<Item = &AggregateRow> {
        self.table(statistic).iter().filter(move |r| r.year == year)
    }

    /// Number of (region, year) groups.
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// The two 2-year averaging windows of a percent-change figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeWindows {
    pub start: i32,
    pub end: i32,
}

impl Default for ChangeWindows {
    fn default() -> Self {
        Self {
            start: 2010,
            end: 2019,
        }
    }
}

impl ChangeWindows {
    pub fn early(self) -> (i32, i32) {
        (self.start, self.start + 1)
    }

    pub fn late(self) -> (i32, i32) {
        (self.end - 1, self.end)
    }
}

/// Percent change per pollutant for one city.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRow {
    pub city: CityId,
    pub city_country: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub population: Option<f64>,
    pub c40: bool,
    pub changes: BTreeMap<Column, Option<f64>>,
}

impl ChangeRow {
    pub fn change(&self, column: Column) -> Option<f64> {
        self.changes.get(&column).copied().flatten()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeTable {
    pub version: Version,
    pub windows: ChangeWindows,
    pub rows: Vec<ChangeRow>,
}

impl ChangeTable {
    pub fn row(&self, city: CityId) -> Option<&ChangeRow> {
        self.rows.iter().find(|r| r.city == city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CityId, Observation};
    use crate::stats::aggregate::aggregate;

    fn tables() -> AggregateTables {
        let data = vec![
            Observation::new(CityId(1), "Oslo", "Norway", 2018).with_value(Column::Pm, 6.0),
            Observation::new(CityId(2), "Lima", "Peru", 2019).with_value(Column::Pm, 24.0),
            Observation::new(CityId(1), "Oslo", "Norway", 2019).with_value(Column::Pm, 5.0),
            Observation::new(CityId(3), "Cusco", "Peru", 2019).with_value(Column::Pm, 12.0),
        ];
        aggregate(&data, Grouping::Country, Version::V1)
    }

    #[test]
    fn test_for_year_lists_every_region() {
        let tables = tables();

        let regions: Vec<&str> = tables
            .for_year(Statistic::Max, 2019)
            .map(|r| r.region.as_str())
            .collect();
        assert_eq!(regions, vec!["Norway", "Peru"]);
        assert_eq!(tables.for_year(Statistic::Mean, 2018).count(), 1);
        assert_eq!(tables.for_year(Statistic::Min, 2030).count(), 0);
    }

    #[test]
    fn test_row_lookup() {
        let tables = tables();

        let peru = tables.row(Statistic::Mean, "Peru", 2019).unwrap();
        assert_eq!(peru.value(Column::Pm), Some(18.0));
        assert!(tables.row(Statistic::Mean, "Peru", 2018).is_none());
        assert_eq!(tables.len(), 3);
    }
}

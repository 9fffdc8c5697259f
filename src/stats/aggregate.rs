use std::collections::BTreeMap;

use crate::model::{Column, Observation, Version};
use crate::stats::types::{AggregateRow, AggregateTables, Grouping};
use crate::stats::utility::{max, mean, min, round_to, weighted_mean};

/// Summarises `observations` per (region, year) over the version's stat columns.
pub fn aggregate(observations: &[Observation], grouping: Grouping, version: Version) -> AggregateTables {
    aggregate_columns(observations, grouping, version, version.stat_columns())
}

/// Computes mean, max, min and population-weighted mean per (region, year).
///
/// Every statistic is rounded to 2 decimals, so `min <= mean <= max` holds
/// after rounding.
/// The mean population, rounded to the nearest thousand, is written into
/// all four row sets so the figure never differs between statistics.
pub fn aggregate_columns(
    observations: &[Observation],
    grouping: Grouping,
    version: Version,
    columns: &[Column],
) -> AggregateTables {
    let mut groups: BTreeMap<(&str, i32), Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        if let Some(region) = grouping.key(obs) {
            groups.entry((region, obs.year)).or_default().push(obs);
        }
    }

    let mut tables = AggregateTables {
        version,
        grouping,
        columns: columns.to_vec(),
        mean: Vec::with_capacity(groups.len()),
        max: Vec::with_capacity(groups.len()),
        min: Vec::with_capacity(groups.len()),
        weighted_mean: Vec::with_capacity(groups.len()),
    };

    for ((region, year), rows) in groups {
        let population = mean(rows.iter().map(|o| o.population())).map(|p| round_to(p, -3));

        let mut means = BTreeMap::new();
        let mut maxes = BTreeMap::new();
        let mut mins = BTreeMap::new();
        let mut weighted = BTreeMap::new();

        for &column in columns {
            let series = || rows.iter().map(move |o| o.value(column));

            means.insert(column, mean(series()).map(|v| round_to(v, 2)));
            maxes.insert(column, max(series()).map(|v| round_to(v, 2)));
            mins.insert(column, min(series()).map(|v| round_to(v, 2)));
            weighted.insert(
                column,
                weighted_mean(rows.iter().map(|o| (o.value(column), o.population())))
                    .map(|v| round_to(v, 2)),
            );
        }

        let row = |values| AggregateRow {
            region: region.to_string(),
            year,
            population,
            values,
        };
        tables.mean.push(row(means));
        tables.max.push(row(maxes));
        tables.min.push(row(mins));
        tables.weighted_mean.push(row(weighted));
    }

    tables
}

/// Unrounded per-year means over every row, regardless of region.
///
/// `label` fills the `region` field of each row.
pub fn yearly_means(observations: &[Observation], columns: &[Column], label: &str) -> Vec<AggregateRow> {
    let mut years: BTreeMap<i32, Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        years.entry(obs.year).or_default().push(obs);
    }

    years
        .into_iter()
        .map(|(year, rows)| AggregateRow {
            region: label.to_string(),
            year,
            population: mean(rows.iter().map(|o| o.population())),
            values: columns
                .iter()
                .map(|&c| (c, mean(rows.iter().map(|o| o.value(c)))))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CityId;
    use crate::stats::types::Statistic;

    #[test]
    fn test_population_shared_across_statistics() {
        let data = vec![
            obs(1, "A", 2010).with_population(1_234_567.0).with_value(Column::Pm, 10.0),
            obs(2, "A", 2010).with_population(2_000_000.0).with_value(Column::Pm, 30.0),
        ];
        let tables = aggregate(&data, Grouping::Country, Version::V1);

        let expected = Some(1_617_000.0);
        for stat in Statistic::ALL {
            let row = tables.row(stat, "A", 2010).unwrap();
            assert_eq!(row.population, expected, "{stat:?}");
        }
    }

    #[test]
    fn test_min_mean_max_ordering_and_weighting() {
        let data = vec![
            obs(1, "A", 2015).with_population(100.0).with_value(Column::No2, 5.0),
            obs(2, "A", 2015).with_population(300.0).with_value(Column::No2, 25.0),
            obs(3, "A", 2015).with_value(Column::No2, 60.0),
        ];
        let tables = aggregate(&data, Grouping::Country, Version::V1);

        let mean = tables.row(Statistic::Mean, "A", 2015).unwrap().value(Column::No2).unwrap();
        let max = tables.row(Statistic::Max, "A", 2015).unwrap().value(Column::No2).unwrap();
        let min = tables.row(Statistic::Min, "A", 2015).unwrap().value(Column::No2).unwrap();
        let weighted = tables
            .row(Statistic::WeightedMean, "A", 2015)
            .unwrap()
            .value(Column::No2)
            .unwrap();

        assert_eq!(mean, 30.0);
        assert_eq!(max, 60.0);
        assert_eq!(min, 5.0);
        assert!(min <= mean && mean <= max);
        // the row without population is left out of the weighted mean
        assert_eq!(weighted, 20.0);
    }

    #[test]
    fn test_rounding_keeps_min_mean_max_ordering() {
        let data = vec![
            obs(1, "A", 2010).with_value(Column::Pm, 1.004),
            obs(2, "A", 2010).with_value(Column::Pm, 1.004),
            obs(3, "A", 2011).with_value(Column::Pm, 2.226),
            obs(4, "A", 2011).with_value(Column::Pm, 2.234),
        ];
        let tables = aggregate(&data, Grouping::Country, Version::V1);

        for (year, expected_min, expected_max) in [(2010, 1.0, 1.0), (2011, 2.23, 2.23)] {
            let value = |stat| tables.row(stat, "A", year).unwrap().value(Column::Pm).unwrap();
            let (min, mean, max) = (value(Statistic::Min), value(Statistic::Mean), value(Statistic::Max));

            assert!(min <= mean && mean <= max, "{year}: {min} {mean} {max}");
            assert_eq!(min, expected_min);
            assert_eq!(max, expected_max);
        }
    }

    #[test]
    fn test_empty_column_yields_missing_not_zero() {
        let data = vec![obs(1, "A", 2012).with_population(500.0)];
        let tables = aggregate(&data, Grouping::Country, Version::V1);

        for stat in Statistic::ALL {
            let row = tables.row(stat, "A", 2012).unwrap();
            assert_eq!(row.value(Column::O3), None, "{stat:?}");
        }
    }

    #[test]
    fn test_singleton_group_returns_own_values() {
        let data = vec![
            obs(7, "B", 2005)
                .with_population(42_000.0)
                .with_value(Column::Pm, 17.25)
                .with_value(Column::CasesPm, 310.0),
        ];
        let tables = aggregate(&data, Grouping::Country, Version::V1);

        for stat in Statistic::ALL {
            let row = tables.row(stat, "B", 2005).unwrap();
            assert_eq!(row.value(Column::Pm), Some(17.25));
            assert_eq!(row.value(Column::CasesPm), Some(310.0));
            assert_eq!(row.population, Some(42_000.0));
        }
    }

    #[test]
    fn test_state_grouping_drops_rows_without_state() {
        let mut with_state = obs(1, "A", 2010).with_value(Column::Pm, 8.0);
        with_state.state = Some("North".to_string());
        let without_state = obs(2, "A", 2010).with_value(Column::Pm, 80.0);

        let tables = aggregate(&[with_state, without_state], Grouping::State, Version::V1);

        assert_eq!(tables.len(), 1);
        let row = tables.row(Statistic::Mean, "North", 2010).unwrap();
        assert_eq!(row.value(Column::Pm), Some(8.0));
    }

    #[test]
    fn test_version_two_only_uses_its_columns() {
        let data = vec![
            obs(1, "A", 2019)
                .with_value(Column::Pm, 9.0)
                .with_value(Column::PwPmV2, 11.0),
        ];
        let tables = aggregate(&data, Grouping::Country, Version::V2);
        let row = tables.row(Statistic::Mean, "A", 2019).unwrap();

        assert!(!row.values.contains_key(&Column::Pm));
        assert_eq!(row.value(Column::PwPmV2), Some(11.0));
    }

    #[test]
    fn test_rows_sorted_by_region_then_year() {
        let data = vec![obs(1, "B", 2001), obs(2, "A", 2002), obs(3, "A", 2001)];
        let tables = aggregate(&data, Grouping::Country, Version::V1);
        let keys: Vec<_> = tables.mean.iter().map(|r| (r.region.as_str(), r.year)).collect();
        assert_eq!(keys, vec![("A", 2001), ("A", 2002), ("B", 2001)]);
    }

    #[test]
    fn test_yearly_means_are_unrounded() {
        let data = vec![
            obs(1, "A", 2010).with_value(Column::O3, 1.0).with_population(1_001.0),
            obs(2, "A", 2010).with_value(Column::O3, 2.0).with_population(1_002.0),
            obs(3, "A", 2010).with_value(Column::O3, 2.0),
        ];
        let rows = yearly_means(&data, &[Column::O3], "A");

        assert_eq!(rows.len(), 1);
        assert!((rows[0].value(Column::O3).unwrap() - 5.0 / 3.0).abs() < 1e-12);
        assert_eq!(rows[0].population, Some(1_001.5));
    }

    fn obs(id: u32, country: &str, year: i32) -> Observation {
        Observation::new(CityId(id), &format!("City {id}"), country, year)
    }
}

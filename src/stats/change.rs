use std::collections::{BTreeMap, HashSet};

use crate::model::{CityId, Column, Observation, Version};
use crate::stats::types::{ChangeRow, ChangeTable, ChangeWindows};
use crate::stats::utility::mean;

/// Percent change of `column` between the early and late windows, per city.
///
/// Only cities observed in both windows appear in the result. A city whose
/// early mean is zero or missing, or whose late mean is missing, maps to `None`.
pub fn percent_change(
    windows: ChangeWindows,
    observations: &[Observation],
    column: Column,
) -> BTreeMap<CityId, Option<f64>> {
    let early = window_means(observations, windows.early(), column);
    let late = window_means(observations, windows.late(), column);

    early
        .into_iter()
        .filter_map(|(city, early_mean)| {
            let late_mean = late.get(&city)?;
            Some((city, percent(early_mean, *late_mean)))
        })
        .collect()
}

/// `(late − early) / early × 100`, undefined for a zero or missing baseline.
pub fn percent(early: Option<f64>, late: Option<f64>) -> Option<f64> {
    let (early, late) = (early?, late?);
    if early == 0.0 {
        return None;
    }
    Some(((late - early) / early) * 100.0)
}

fn window_means(
    observations: &[Observation],
    (from, to): (i32, i32),
    column: Column,
) -> BTreeMap<CityId, Option<f64>> {
    let mut grouped: BTreeMap<CityId, Vec<Option<f64>>> = BTreeMap::new();
    for obs in observations.iter().filter(|o| (from..=to).contains(&o.year)) {
        grouped.entry(obs.id).or_default().push(obs.value(column));
    }
    grouped
        .into_iter()
        .map(|(city, values)| (city, mean(values)))
        .collect()
}

/// Builds the change table for a version.
///
/// Rows come from the cities observed in the window's end year and carry a
/// figure for each of the version's change columns; a city missing from
/// either window gets `None` for that column.
pub fn change_table(observations: &[Observation], version: Version, windows: ChangeWindows) -> ChangeTable {
    let per_column: Vec<(Column, BTreeMap<CityId, Option<f64>>)> = version
        .change_columns()
        .iter()
        .map(|&column| (column, percent_change(windows, observations, column)))
        .collect();

    let mut seen = HashSet::new();
    let rows = observations
        .iter()
        .filter(|o| o.year == windows.end && seen.insert(o.id))
        .map(|o| ChangeRow {
            city: o.id,
            city_country: o.display_name(),
            latitude: o.latitude,
            longitude: o.longitude,
            population: o.population(),
            c40: o.c40,
            changes: per_column
                .iter()
                .map(|(column, changes)| (*column, changes.get(&o.id).copied().flatten()))
                .collect(),
        })
        .collect();

    ChangeTable {
        version,
        windows,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pm(id: u32, year: i32, value: Option<f64>) -> Observation {
        let mut obs = Observation::new(CityId(id), &format!("City {id}"), "Country", year);
        obs.pm = value;
        obs
    }

    #[test]
    fn test_percent_change_of_window_means() {
        let data = vec![
            pm(1, 2010, Some(45.0)),
            pm(1, 2011, Some(55.0)),
            pm(1, 2015, Some(999.0)),
            pm(1, 2018, Some(40.0)),
            pm(1, 2019, Some(40.0)),
        ];
        let changes = percent_change(ChangeWindows::default(), &data, Column::Pm);

        assert_eq!(changes.get(&CityId(1)), Some(&Some(-20.0)));
    }

    #[test]
    fn test_window_mean_skips_missing_years() {
        let data = vec![
            pm(1, 2010, None),
            pm(1, 2011, Some(20.0)),
            pm(1, 2018, Some(30.0)),
            pm(1, 2019, None),
        ];
        let changes = percent_change(ChangeWindows::default(), &data, Column::Pm);

        assert_eq!(changes[&CityId(1)], Some(50.0));
    }

    #[test]
    fn test_zero_or_missing_baseline_is_undefined() {
        let data = vec![
            pm(1, 2010, Some(0.0)),
            pm(1, 2019, Some(5.0)),
            pm(2, 2011, None),
            pm(2, 2018, Some(5.0)),
        ];
        let changes = percent_change(ChangeWindows::default(), &data, Column::Pm);

        assert_eq!(changes[&CityId(1)], None);
        assert_eq!(changes[&CityId(2)], None);
    }

    #[test]
    fn test_city_outside_a_window_is_excluded() {
        let data = vec![pm(1, 2010, Some(10.0)), pm(2, 2019, Some(10.0))];
        let changes = percent_change(ChangeWindows::default(), &data, Column::Pm);

        assert!(changes.is_empty());
    }

    #[test]
    fn test_change_table_uses_end_year_template() {
        let mut end = pm(1, 2019, Some(12.0)).with_population(5_000.0);
        end.c40 = true;
        end.latitude = Some(1.5);
        let data = vec![
            pm(1, 2010, Some(10.0)),
            pm(1, 2011, Some(10.0)),
            end,
            pm(1, 2018, Some(12.0)),
            // only seen in the late window
            pm(2, 2019, Some(3.0)),
            // never in the end year, so not a row
            pm(3, 2010, Some(3.0)),
        ];
        let table = change_table(&data, Version::V1, ChangeWindows::default());

        assert_eq!(table.rows.len(), 2);
        let first = table.row(CityId(1)).unwrap();
        assert!(first.c40);
        assert_eq!(first.population, Some(5_000.0));
        assert_eq!(first.latitude, Some(1.5));
        assert!((first.change(Column::Pm).unwrap() - 20.0).abs() < 1e-9);
        assert_eq!(first.change(Column::No2), None);
        assert_eq!(first.changes.len(), 4);

        let second = table.row(CityId(2)).unwrap();
        assert_eq!(second.change(Column::Pm), None);
    }

    #[test]
    fn test_custom_windows() {
        let windows = ChangeWindows { start: 2000, end: 2005 };
        assert_eq!(windows.early(), (2000, 2001));
        assert_eq!(windows.late(), (2004, 2005));
    }
}

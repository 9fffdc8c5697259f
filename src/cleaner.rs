//! Repairs for known defects in the early years of the observation series.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::CleaningConfig;
use crate::model::{CityId, Column, Observation};

/// Applies every correction and returns the cleaned table.
///
/// The result holds the pre-cutoff rows followed by the rest; order within
/// each part is kept.
#[tracing::instrument(skip_all, fields(rows = observations.len()))]
pub fn clean(observations: Vec<Observation>, config: &CleaningConfig) -> Vec<Observation> {
    let cleaned = null_zero_no2(observations, config);
    dedupe_city_years(cleaned)
}

/// Discards pre-cutoff NO2 for cities that report exactly zero in the check
/// year, and for the configured cities.
pub fn null_zero_no2(observations: Vec<Observation>, config: &CleaningConfig) -> Vec<Observation> {
    let mut flagged: HashSet<CityId> = observations
        .iter()
        .filter(|o| o.year == config.zero_check_year && o.value(Column::No2) == Some(0.0))
        .map(|o| o.id)
        .collect();
    let zero_cities = flagged.len();
    flagged.extend(config.null_no2_cities.iter().copied());

    let (mut early, late): (Vec<_>, Vec<_>) = observations
        .into_iter()
        .partition(|o| o.year < config.cutoff_year);

    let mut nulled = 0usize;
    for obs in early.iter_mut().filter(|o| flagged.contains(&o.id)) {
        if obs.no2.take().is_some() {
            nulled += 1;
        }
    }

    info!(zero_cities, nulled, "Pre-cutoff NO2 artifacts removed");

    early.extend(late);
    early
}

/// Keeps the first row of each (city, year) pair.
pub fn dedupe_city_years(observations: Vec<Observation>) -> Vec<Observation> {
    let before = observations.len();
    let mut seen = HashSet::with_capacity(before);
    let deduped: Vec<Observation> = observations
        .into_iter()
        .filter(|o| seen.insert((o.id, o.year)))
        .collect();

    let dropped = before - deduped.len();
    if dropped > 0 {
        warn!(dropped, "Duplicate (city, year) rows dropped");
    }
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no2(id: u32, year: i32, value: Option<f64>) -> Observation {
        let mut obs = Observation::new(CityId(id), &format!("City {id}"), "Country", year);
        obs.no2 = value;
        obs
    }

    fn find(rows: &[Observation], id: u32, year: i32) -> &Observation {
        rows.iter()
            .find(|o| o.id == CityId(id) && o.year == year)
            .unwrap()
    }

    #[test]
    fn test_zero_in_check_year_nulls_early_series() {
        let data = vec![
            no2(1, 2000, Some(0.0)),
            no2(1, 2003, Some(14.0)),
            no2(1, 2010, Some(16.0)),
            no2(2, 2000, Some(9.0)),
            no2(2, 2003, Some(11.0)),
        ];
        let cleaned = clean(data, &CleaningConfig::default());

        assert_eq!(cleaned.len(), 5);
        assert_eq!(find(&cleaned, 1, 2000).no2, None);
        assert_eq!(find(&cleaned, 1, 2003).no2, None);
        assert_eq!(find(&cleaned, 1, 2010).no2, Some(16.0));
        assert_eq!(find(&cleaned, 2, 2003).no2, Some(11.0));
    }

    #[test]
    fn test_configured_city_always_nulled_before_cutoff() {
        let data = vec![no2(923, 2001, Some(30.0)), no2(923, 2006, Some(31.0))];
        let cleaned = clean(data, &CleaningConfig::default());

        assert_eq!(find(&cleaned, 923, 2001).no2, None);
        assert_eq!(find(&cleaned, 923, 2006).no2, Some(31.0));
    }

    #[test]
    fn test_other_columns_untouched() {
        let data = vec![no2(1, 2000, Some(0.0)).with_value(Column::Pm, 22.0)];
        let cleaned = clean(data, &CleaningConfig::default());

        assert_eq!(cleaned[0].value(Column::Pm), Some(22.0));
    }

    #[test]
    fn test_no_early_rows_is_noop() {
        let data = vec![no2(1, 2010, Some(0.0)), no2(2, 2012, Some(5.0))];
        let cleaned = clean(data.clone(), &CleaningConfig::default());

        assert_eq!(cleaned, data);
    }

    #[test]
    fn test_early_rows_come_first() {
        let data = vec![no2(1, 2010, Some(1.0)), no2(1, 2001, Some(1.0))];
        let cleaned = clean(data, &CleaningConfig::default());

        let years: Vec<i32> = cleaned.iter().map(|o| o.year).collect();
        assert_eq!(years, vec![2001, 2010]);
    }

    #[test]
    fn test_duplicate_city_year_keeps_first() {
        let data = vec![
            no2(1, 2010, Some(1.0)),
            no2(1, 2010, Some(2.0)),
            no2(1, 2011, Some(3.0)),
        ];
        let deduped = dedupe_city_years(data);

        assert_eq!(deduped.len(), 2);
        assert_eq!(find(&deduped, 1, 2010).no2, Some(1.0));
    }
}

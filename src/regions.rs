//! Sub-national views for the countries broken down by state or province.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::model::{CityId, Observation, ParseKeyError, Version, Versioned};
use crate::stats::{AggregateRow, AggregateTables, Grouping, aggregate, yearly_means};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SupportedRegion {
    UnitedStates,
    China,
    India,
}

impl SupportedRegion {
    pub const ALL: [SupportedRegion; 3] = [
        SupportedRegion::UnitedStates,
        SupportedRegion::China,
        SupportedRegion::India,
    ];

    /// Value of the `Country` column for this region.
    pub fn country_name(self) -> &'static str {
        match self {
            SupportedRegion::UnitedStates => "United States",
            SupportedRegion::China => "China",
            SupportedRegion::India => "India",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            SupportedRegion::UnitedStates => "united_states",
            SupportedRegion::China => "china",
            SupportedRegion::India => "india",
        }
    }

    /// Whether a state boundary file is published for the region.
    pub fn has_boundaries(self) -> bool {
        matches!(self, SupportedRegion::China | SupportedRegion::India)
    }

    /// Whether the lookup table stores encoded labels that need translating.
    pub fn has_encoded_states(self) -> bool {
        matches!(self, SupportedRegion::China)
    }
}

impl fmt::Display for SupportedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.country_name())
    }
}

impl FromStr for SupportedRegion {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SupportedRegion::ALL
            .into_iter()
            .find(|r| r.country_name().eq_ignore_ascii_case(s) || r.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseKeyError::new("region", s))
    }
}

/// City id to state (or province) label for one country.
#[derive(Debug, Clone, Default)]
pub struct StateLookup {
    by_city: HashMap<CityId, String>,
}

impl StateLookup {
    /// Builds the lookup; the first label seen for a city wins.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (CityId, String)>) -> Self {
        let mut by_city = HashMap::new();
        for (city, state) in pairs {
            by_city.entry(city).or_insert(state);
        }
        Self { by_city }
    }

    pub fn state_of(&self, city: CityId) -> Option<&str> {
        self.by_city.get(&city).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_city.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_city.is_empty()
    }
}

/// Encoded state label to display name.
#[derive(Debug, Clone, Default)]
pub struct StateNames(HashMap<String, String>);

impl StateNames {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self(names)
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.get(label).map(String::as_str)
    }
}

/// Statistics of a region under one data version.
#[derive(Debug, Clone, Serialize)]
pub struct RegionStats {
    /// Per (state, year) tables; cities without a state are not counted.
    pub states: AggregateTables,
    /// Per-year means over every city of the country.
    pub national: Vec<AggregateRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionData {
    pub region: SupportedRegion,
    /// The country's observations with `state` filled in where known.
    pub rows: Vec<Observation>,
    /// Sorted `"{City} ({ID})"` labels.
    pub city_labels: Vec<String>,
    pub stats: Versioned<RegionStats>,
}

impl RegionData {
    pub fn stats(&self, version: Version) -> &RegionStats {
        self.stats.get(version)
    }

    pub fn cities_in(&self, state: &str) -> impl Iterator<Item = &Observation> {
        self.rows
            .iter()
            .filter(move |o| o.state.as_deref() == Some(state))
    }
}

/// Joins observations to state lookups and summarises them per state.
pub struct RegionIndexer<'a> {
    lookups: &'a HashMap<SupportedRegion, StateLookup>,
    names: &'a StateNames,
    excluded_labels: &'a [String],
}

impl<'a> RegionIndexer<'a> {
    pub fn new(
        lookups: &'a HashMap<SupportedRegion, StateLookup>,
        names: &'a StateNames,
        excluded_labels: &'a [String],
    ) -> Self {
        Self {
            lookups,
            names,
            excluded_labels,
        }
    }

    #[tracing::instrument(skip_all, fields(region = %region))]
    pub fn index(&self, region: SupportedRegion, observations: &[Observation]) -> RegionData {
        let lookup = self.lookups.get(&region);
        if lookup.is_none() {
            warn!("No state lookup loaded, every city is left without a state");
        }

        let mut untranslated = BTreeSet::new();
        let mut rows = Vec::new();
        for obs in observations.iter().filter(|o| o.country == region.country_name()) {
            let label = lookup.and_then(|l| l.state_of(obs.id));
            if region.has_encoded_states()
                && label.is_some_and(|l| self.excluded_labels.iter().any(|e| e == l))
            {
                continue;
            }

            let state = label.map(|label| {
                if !region.has_encoded_states() {
                    return label.to_string();
                }
                match self.names.get(label) {
                    Some(name) => name.to_string(),
                    None => {
                        untranslated.insert(label.to_string());
                        label.to_string()
                    }
                }
            });

            let mut row = obs.clone();
            row.state = state;
            rows.push(row);
        }

        for label in &untranslated {
            warn!(label = %label, "State label has no translation, keeping it as is");
        }

        let city_labels: BTreeSet<String> = rows.iter().map(Observation::city_label).collect();
        let stats = Versioned::build(|version| RegionStats {
            states: aggregate(&rows, Grouping::State, version),
            national: yearly_means(&rows, version.stat_columns(), region.country_name()),
        });

        debug!(
            rows = rows.len(),
            without_state = rows.iter().filter(|r| r.state.is_none()).count(),
            state_years = stats.v1.states.len(),
            "Region indexed"
        );

        RegionData {
            region,
            rows,
            city_labels: city_labels.into_iter().collect(),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;
    use crate::stats::Statistic;

    fn obs(id: u32, city: &str, country: &str, year: i32, pm: f64) -> Observation {
        Observation::new(CityId(id), city, country, year).with_value(Column::Pm, pm)
    }

    fn lookups() -> HashMap<SupportedRegion, StateLookup> {
        HashMap::from([
            (
                SupportedRegion::UnitedStates,
                StateLookup::from_pairs([(CityId(1), "Ohio".to_string())]),
            ),
            (
                SupportedRegion::China,
                StateLookup::from_pairs([
                    (CityId(10), "SD".to_string()),
                    (CityId(11), "자강도".to_string()),
                    (CityId(12), "XX".to_string()),
                ]),
            ),
        ])
    }

    #[test]
    fn test_unmatched_city_kept_without_state() {
        let lookups = lookups();
        let names = StateNames::default();
        let excluded: Vec<String> = vec![];
        let indexer = RegionIndexer::new(&lookups, &names, &excluded);

        let data = vec![
            obs(1, "Columbus", "United States", 2010, 8.0),
            obs(2, "Nowhere", "United States", 2010, 20.0),
            obs(3, "Pune", "India", 2010, 50.0),
        ];
        let region = indexer.index(SupportedRegion::UnitedStates, &data);

        assert_eq!(region.rows.len(), 2);
        assert_eq!(region.rows[0].state.as_deref(), Some("Ohio"));
        assert_eq!(region.rows[1].state, None);

        let v1 = region.stats(Version::V1);
        assert_eq!(v1.states.len(), 1);
        let ohio = v1.states.row(Statistic::Mean, "Ohio", 2010).unwrap();
        assert_eq!(ohio.value(Column::Pm), Some(8.0));

        // the national series still counts the city without a state
        assert_eq!(v1.national.len(), 1);
        assert_eq!(v1.national[0].value(Column::Pm), Some(14.0));
        assert_eq!(v1.national[0].region, "United States");
    }

    #[test]
    fn test_encoded_states_are_translated_and_filtered() {
        let lookups = lookups();
        let names = StateNames::new(HashMap::from([(
            "SD".to_string(),
            "Shandong".to_string(),
        )]));
        let excluded = vec!["자강도".to_string()];
        let indexer = RegionIndexer::new(&lookups, &names, &excluded);

        let data = vec![
            obs(10, "Jinan", "China", 2015, 60.0),
            obs(11, "Mislabeled", "China", 2015, 70.0),
            obs(12, "Unknown", "China", 2015, 80.0),
        ];
        let region = indexer.index(SupportedRegion::China, &data);

        assert_eq!(region.rows.len(), 2);
        assert_eq!(region.rows[0].state.as_deref(), Some("Shandong"));
        assert_eq!(region.rows[1].state.as_deref(), Some("XX"));
        assert!(region.cities_in("Shandong").all(|o| o.id == CityId(10)));
    }

    #[test]
    fn test_city_labels_are_sorted_and_unique() {
        let lookups = lookups();
        let names = StateNames::default();
        let excluded: Vec<String> = vec![];
        let indexer = RegionIndexer::new(&lookups, &names, &excluded);

        let data = vec![
            obs(2, "Boston", "United States", 2010, 1.0),
            obs(2, "Boston", "United States", 2011, 1.0),
            obs(1, "Austin", "United States", 2010, 1.0),
        ];
        let region = indexer.index(SupportedRegion::UnitedStates, &data);

        assert_eq!(region.city_labels, vec!["Austin (1)", "Boston (2)"]);
    }

    #[test]
    fn test_parse_region() {
        assert_eq!(
            "united states".parse::<SupportedRegion>().unwrap(),
            SupportedRegion::UnitedStates
        );
        assert_eq!("india".parse::<SupportedRegion>().unwrap(), SupportedRegion::India);
        assert!("France".parse::<SupportedRegion>().is_err());
    }
}

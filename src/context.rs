//! The immutable set of derived tables shared by every consumer.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

use crate::cleaner::clean;
use crate::config::Settings;
use crate::fetch::{BasicClient, HttpClient, Retry};
use crate::loader::{LoadedSources, load_sources};
use crate::metrics::MetricResolver;
use crate::model::{Observation, Version, Versioned};
use crate::query::ObservationQuery;
use crate::regions::{RegionData, RegionIndexer, SupportedRegion};
use crate::stats::{AggregateTables, ChangeTable, Grouping, aggregate, change_table};

/// Everything derived from the sources, built once per process.
///
/// There is no mutation API: share it behind an `Arc` and read concurrently.
#[derive(Debug)]
pub struct DataContext {
    observations: Vec<Observation>,
    countries: Versioned<AggregateTables>,
    changes: Versioned<ChangeTable>,
    regions: BTreeMap<SupportedRegion, RegionData>,
    boundaries: BTreeMap<SupportedRegion, serde_json::Value>,
    resolver: MetricResolver,
    built_at: DateTime<Utc>,
}

impl DataContext {
    /// Fetches every source with retries and builds the context.
    pub async fn load(settings: &Settings) -> Result<Self> {
        let client = Retry::new(
            BasicClient::new()?,
            settings.sources.fetch_attempts,
            Duration::from_millis(settings.sources.retry_backoff_ms),
        );
        Self::load_with(&client, settings).await
    }

    pub async fn load_with<C: HttpClient>(client: &C, settings: &Settings) -> Result<Self> {
        let sources = load_sources(client, &settings.sources).await?;
        Ok(Self::build(sources, settings))
    }

    #[tracing::instrument(skip_all, fields(rows = sources.observations.len()))]
    pub fn build(sources: LoadedSources, settings: &Settings) -> Self {
        let LoadedSources {
            observations,
            state_lookups,
            boundaries,
            state_names,
        } = sources;

        let observations = clean(observations, &settings.cleaning);

        let countries = Versioned::build(|version| aggregate(&observations, Grouping::Country, version));
        let changes = Versioned::build(|version| change_table(&observations, version, settings.windows));

        let indexer = RegionIndexer::new(
            &state_lookups,
            &state_names,
            &settings.cleaning.excluded_state_labels,
        );
        let regions = SupportedRegion::ALL
            .into_iter()
            .map(|region| (region, indexer.index(region, &observations)))
            .collect();

        let context = Self {
            observations,
            countries,
            changes,
            regions,
            boundaries,
            resolver: MetricResolver::new(),
            built_at: Utc::now(),
        };

        info!(
            observations = context.observations.len(),
            country_years = context.countries.v1.len(),
            change_rows = context.changes.v1.rows.len(),
            "Data context built"
        );

        context
    }

    /// The cleaned observation table.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Per (country, year) statistics.
    pub fn country_stats(&self, version: Version) -> &AggregateTables {
        self.countries.get(version)
    }

    pub fn changes(&self, version: Version) -> &ChangeTable {
        self.changes.get(version)
    }

    pub fn region(&self, region: SupportedRegion) -> &RegionData {
        // every supported region is indexed in `build`
        &self.regions[&region]
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionData> {
        self.regions.values()
    }

    pub fn boundaries(&self, region: SupportedRegion) -> Option<&serde_json::Value> {
        self.boundaries.get(&region)
    }

    pub fn resolver(&self) -> &MetricResolver {
        &self.resolver
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn query(&self, query: &ObservationQuery) -> Vec<&Observation> {
        query.apply(&self.observations)
    }

    /// Sorted distinct years present in the cleaned table.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.observations.iter().map(|o| o.year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }
}

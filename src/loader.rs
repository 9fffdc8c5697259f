//! Fetching and parsing of the source files.
//!
//! Every source is required: a failure here aborts startup, since nothing
//! downstream can be computed without it.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use crate::config::SourceConfig;
use crate::fetch::{HttpClient, fetch_source};
use crate::model::{CityId, Observation};
use crate::regions::{StateLookup, StateNames, SupportedRegion};

/// Raw inputs of the pipeline, before cleaning.
#[derive(Debug, Clone, Default)]
pub struct LoadedSources {
    pub observations: Vec<Observation>,
    pub state_lookups: HashMap<SupportedRegion, StateLookup>,
    pub boundaries: BTreeMap<SupportedRegion, serde_json::Value>,
    pub state_names: StateNames,
}

/// Loads every source named by `config`, one after another.
#[tracing::instrument(skip_all, fields(base_url = %config.base_url))]
pub async fn load_sources<C: HttpClient>(client: &C, config: &SourceConfig) -> Result<LoadedSources> {
    let source = config.observations_source();
    let observations = parse_observations(&fetch_source(client, &source).await?)
        .with_context(|| format!("parsing observations from '{source}'"))?;
    info!(rows = observations.len(), "Observations loaded");

    let mut state_lookups = HashMap::new();
    let mut boundaries = BTreeMap::new();
    for region in SupportedRegion::ALL {
        let source = config.state_lookup_source(region);
        let lookup = parse_state_lookup(&fetch_source(client, &source).await?)
            .with_context(|| format!("parsing state lookup from '{source}'"))?;
        info!(region = %region, cities = lookup.len(), "State lookup loaded");
        state_lookups.insert(region, lookup);

        if let Some(source) = config.boundary_source(region) {
            let geojson = parse_boundaries(&fetch_source(client, &source).await?)
                .with_context(|| format!("parsing boundaries from '{source}'"))?;
            boundaries.insert(region, geojson);
        }
    }

    let state_names = parse_state_names(&fetch_source(client, &config.state_names).await?)
        .with_context(|| format!("parsing state names from '{}'", config.state_names))?;

    Ok(LoadedSources {
        observations,
        state_lookups,
        boundaries,
        state_names,
    })
}

pub fn parse_observations(bytes: &[u8]) -> Result<Vec<Observation>> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let mut rows = Vec::new();

    for (i, result) in rdr.deserialize().enumerate() {
        let record: Observation = result.with_context(|| format!("observation row {}", i + 1))?;
        rows.push(record);
    }

    Ok(rows)
}

#[derive(Deserialize)]
struct StateRecord {
    #[serde(rename = "ID")]
    id: CityId,
    #[serde(rename = "State")]
    state: Option<String>,
}

/// Reads an `ID,State` table; rows with an empty state are skipped.
pub fn parse_state_lookup(bytes: &[u8]) -> Result<StateLookup> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let mut pairs = Vec::new();

    for result in rdr.deserialize() {
        let record: StateRecord = result?;
        if let Some(state) = record.state.filter(|s| !s.trim().is_empty()) {
            pairs.push((record.id, state));
        }
    }

    Ok(StateLookup::from_pairs(pairs))
}

/// Reads a JSON object of `encoded label -> state name`.
pub fn parse_state_names(bytes: &[u8]) -> Result<StateNames> {
    let names: HashMap<String, String> = serde_json::from_slice(bytes)?;
    Ok(StateNames::new(names))
}

pub fn parse_boundaries(bytes: &[u8]) -> Result<serde_json::Value> {
    let value: serde_json::Value = serde_json::from_slice(bytes)?;
    if value.get("type").and_then(|t| t.as_str()).is_none() {
        anyhow::bail!("not a GeoJSON object: missing `type`");
    }
    Ok(value)
}

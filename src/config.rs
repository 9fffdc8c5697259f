//! Runtime settings: where the source files live and the cleaning constants.
//!
//! Defaults mirror the published dataset. A JSON file can override any
//! subset of fields:
//! ```json
//! {
//!   "sources": { "base_url": "./data", "fetch_attempts": 5 },
//!   "windows": { "start": 2011, "end": 2019 }
//! }
//! ```
//! and `URBAN_AQ_*` environment variables override both.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::CityId;
use crate::regions::SupportedRegion;
use crate::stats::ChangeWindows;

pub const DEFAULT_BASE_URL: &str = "https://raw.githubusercontent.com/anenbergresearch/app-files/main";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sources: SourceConfig,
    pub cleaning: CleaningConfig,
    pub windows: ChangeWindows,
}

impl Settings {
    /// Loads settings from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading settings file '{path}'"))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("parsing settings file '{path}'"))?;
        Ok(settings)
    }

    /// Defaults, then the optional file, then the environment.
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.sources.apply_env()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL or local directory holding the observation, lookup and boundary files.
    pub base_url: String,
    /// Observation table file name under `base_url`.
    pub observations: String,
    /// Full URL or path of the JSON object translating encoded China state labels.
    pub state_names: String,
    pub fetch_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            observations: "unified_data_SYK_Apr2025.csv".to_string(),
            state_names: "data/china_state_names.json".to_string(),
            fetch_attempts: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl SourceConfig {
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(base_url) = std::env::var("URBAN_AQ_BASE_URL") {
            self.base_url = base_url;
        }
        if let Ok(observations) = std::env::var("URBAN_AQ_OBSERVATIONS") {
            self.observations = observations;
        }
        if let Ok(state_names) = std::env::var("URBAN_AQ_CHINA_STATE_NAMES") {
            self.state_names = state_names;
        }
        if let Ok(attempts) = std::env::var("URBAN_AQ_FETCH_ATTEMPTS") {
            self.fetch_attempts = attempts
                .parse()
                .with_context(|| format!("URBAN_AQ_FETCH_ATTEMPTS must be a number, got '{attempts}'"))?;
        }
        Ok(())
    }

    fn is_remote(&self) -> bool {
        self.base_url.starts_with("http")
    }

    fn locate(&self, file_name: &str) -> String {
        let file_name = if self.is_remote() {
            file_name.replace(' ', "%20")
        } else {
            file_name.to_string()
        };
        format!("{}/{}", self.base_url.trim_end_matches('/'), file_name)
    }

    pub fn observations_source(&self) -> String {
        self.locate(&self.observations)
    }

    /// `IDtoState{Country}.csv`, mapping city ids to state names.
    pub fn state_lookup_source(&self, region: SupportedRegion) -> String {
        self.locate(&format!("IDtoState{}.csv", region.country_name()))
    }

    /// `states_{country}.geojson`, only published for some regions.
    pub fn boundary_source(&self, region: SupportedRegion) -> Option<String> {
        region
            .has_boundaries()
            .then(|| self.locate(&format!("states_{}.geojson", region.country_name().to_lowercase())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Rows before this year are checked for zero NO2 artifacts.
    pub cutoff_year: i32,
    /// Year whose exact-zero NO2 readings mark a city's early series as bad.
    pub zero_check_year: i32,
    /// Cities whose pre-cutoff NO2 is always discarded.
    pub null_no2_cities: Vec<CityId>,
    /// Encoded state labels dropped before translation.
    pub excluded_state_labels: Vec<String>,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            cutoff_year: 2005,
            zero_check_year: 2000,
            null_no2_cities: vec![CityId(923)],
            excluded_state_labels: vec!["자강도".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sources_are_remote_and_encoded() {
        let config = SourceConfig::default();
        assert_eq!(
            config.state_lookup_source(SupportedRegion::UnitedStates),
            format!("{DEFAULT_BASE_URL}/IDtoStateUnited%20States.csv")
        );
        assert_eq!(
            config.observations_source(),
            format!("{DEFAULT_BASE_URL}/unified_data_SYK_Apr2025.csv")
        );
    }

    #[test]
    fn test_local_sources_keep_spaces() {
        let config = SourceConfig {
            base_url: "fixtures/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.state_lookup_source(SupportedRegion::UnitedStates),
            "fixtures/IDtoStateUnited States.csv"
        );
        assert_eq!(
            config.boundary_source(SupportedRegion::India).as_deref(),
            Some("fixtures/states_india.geojson")
        );
        assert_eq!(config.boundary_source(SupportedRegion::UnitedStates), None);
    }

    #[test]
    fn test_partial_settings_file_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "windows": { "start": 2011, "end": 2018 } }"#).unwrap();
        assert_eq!(settings.windows, ChangeWindows { start: 2011, end: 2018 });
        assert_eq!(settings.cleaning.cutoff_year, 2005);
        assert_eq!(settings.sources.fetch_attempts, 3);
    }
}

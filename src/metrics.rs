//! Resolution of a (version, metric, pollutant) selection to a physical
//! column and its display unit.
//!
//! The full key space is enumerated once when the resolver is built, so an
//! invalid selection is rejected with a [`ResolveError`] instead of producing
//! a column name that does not exist.

use serde::Serialize;
use thiserror::Error;

use crate::model::{Column, Metric, Pollutant, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct MetricKey {
    pub version: Version,
    pub metric: Metric,
    pub pollutant: Pollutant,
}

impl MetricKey {
    pub fn new(version: Version, metric: Metric, pollutant: Pollutant) -> Self {
        Self {
            version,
            metric,
            pollutant,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedMetric {
    pub column: Column,
    pub unit: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("version {version} only provides concentrations, {metric} is not available")]
    MetricUnavailable { version: Version, metric: Metric },

    #[error("{metric} is not defined for {pollutant}, only concentration is")]
    PollutantUnsupported { metric: Metric, pollutant: Pollutant },
}

type Entry = Result<ResolvedMetric, ResolveError>;

/// Indexed by `[version][metric][pollutant]` in declaration order.
#[derive(Debug, Clone)]
pub struct MetricResolver {
    table: [[[Entry; Pollutant::ALL.len()]; Metric::ALL.len()]; Version::ALL.len()],
}

impl Default for MetricResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricResolver {
    pub fn new() -> Self {
        let table = std::array::from_fn(|v| {
            std::array::from_fn(|m| {
                std::array::from_fn(|p| {
                    let key = MetricKey::new(Version::ALL[v], Metric::ALL[m], Pollutant::ALL[p]);
                    column_for(key).map(|column| {
                        debug_assert_eq!(column.version(), key.version);
                        ResolvedMetric {
                            column,
                            unit: unit_for(key),
                        }
                    })
                })
            })
        });
        Self { table }
    }

    fn entry(&self, key: MetricKey) -> &Entry {
        &self.table[key.version as usize][key.metric as usize][key.pollutant as usize]
    }

    /// Returns the column and unit label for the selection.
    ///
    /// # Errors
    ///
    /// Rejects any non-concentration metric under version 2 and any health
    /// metric for CO2.
    pub fn resolve(
        &self,
        version: Version,
        metric: Metric,
        pollutant: Pollutant,
    ) -> Result<ResolvedMetric, ResolveError> {
        self.resolve_key(MetricKey::new(version, metric, pollutant))
    }

    pub fn resolve_key(&self, key: MetricKey) -> Result<ResolvedMetric, ResolveError> {
        self.entry(key).clone()
    }

    pub fn is_supported(&self, key: MetricKey) -> bool {
        self.entry(key).is_ok()
    }

    /// Metrics selectable for `pollutant` under `version`.
    pub fn metrics_for(&self, version: Version, pollutant: Pollutant) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|&m| self.is_supported(MetricKey::new(version, m, pollutant)))
            .collect()
    }

    /// Pollutants selectable for `metric` under `version`.
    pub fn pollutants_for(&self, version: Version, metric: Metric) -> Vec<Pollutant> {
        Pollutant::ALL
            .into_iter()
            .filter(|&p| self.is_supported(MetricKey::new(version, metric, p)))
            .collect()
    }

    /// Axis label for a percent-change figure.
    pub fn change_unit(&self, version: Version, pollutant: Pollutant) -> &'static str {
        match (version, pollutant) {
            (Version::V1, Pollutant::Co2) => "Change in CO₂ (%)",
            (Version::V2, Pollutant::Co2) => "Change in CO₂ per capita (%)",
            (_, Pollutant::No2) => "Change in NO₂ (%)",
            (_, Pollutant::O3) => "Change in O₃ (%)",
            (_, Pollutant::Pm) => "Change in PM₂.₅ (%)",
        }
    }

    /// Column holding the concentration of `pollutant` in `version`.
    pub fn concentration_column(&self, version: Version, pollutant: Pollutant) -> Column {
        concentration_column(version, pollutant)
    }
}

fn concentration_column(version: Version, pollutant: Pollutant) -> Column {
    match (version, pollutant) {
        (Version::V1, Pollutant::No2) => Column::No2,
        (Version::V1, Pollutant::O3) => Column::O3,
        (Version::V1, Pollutant::Pm) => Column::Pm,
        (Version::V1, Pollutant::Co2) => Column::Co2,
        (Version::V2, Pollutant::No2) => Column::PwNo2V2,
        (Version::V2, Pollutant::O3) => Column::PwO3V2,
        (Version::V2, Pollutant::Pm) => Column::PwPmV2,
        (Version::V2, Pollutant::Co2) => Column::Co2V2,
    }
}

fn column_for(key: MetricKey) -> Result<Column, ResolveError> {
    use Pollutant::*;

    match (key.version, key.metric, key.pollutant) {
        (version, Metric::Concentration, pollutant) => Ok(concentration_column(version, pollutant)),
        (Version::V2, metric, _) => Err(ResolveError::MetricUnavailable {
            version: Version::V2,
            metric,
        }),
        (Version::V1, metric, Co2) => Err(ResolveError::PollutantUnsupported {
            metric,
            pollutant: Co2,
        }),
        (Version::V1, Metric::Paf, No2) => Ok(Column::PafNo2),
        (Version::V1, Metric::Paf, O3) => Ok(Column::PafO3),
        (Version::V1, Metric::Paf, Pm) => Ok(Column::PafPm),
        (Version::V1, Metric::Cases, No2) => Ok(Column::CasesNo2),
        (Version::V1, Metric::Cases, O3) => Ok(Column::CasesO3),
        (Version::V1, Metric::Cases, Pm) => Ok(Column::CasesPm),
        (Version::V1, Metric::Rates, No2) => Ok(Column::RatesNo2),
        (Version::V1, Metric::Rates, O3) => Ok(Column::RatesO3),
        (Version::V1, Metric::Rates, Pm) => Ok(Column::RatesPm),
    }
}

// CO2 is absolute tonnes in version 1 and per-capita tonnes in version 2.
fn unit_for(key: MetricKey) -> &'static str {
    use Pollutant::*;

    match (key.metric, key.pollutant) {
        (Metric::Concentration, Co2) => match key.version {
            Version::V1 => "CO₂ (tonnes)",
            Version::V2 => "CO₂ per capita (metric tonnes)",
        },
        (Metric::Concentration, No2) => "NO₂ (ppb)",
        (Metric::Concentration, O3) => "O₃ (ppb)",
        (Metric::Concentration, Pm) => "PM₂.₅ (μg/m³)",
        (Metric::Paf, No2) => "NO₂ (Population Attributable Fraction %)",
        (Metric::Paf, O3) => "O₃ (Population Attributable Fraction %)",
        (Metric::Paf, Pm) => "PM₂.₅ (Population Attributable Fraction %)",
        (Metric::Cases, No2) => "NO₂ (Attributable Pediatric Asthma Incidence)",
        (Metric::Cases, O3) => "O₃ (Attributable Premature Deaths)",
        (Metric::Cases, Pm) => "PM₂.₅ (Attributable Premature Deaths)",
        (Metric::Rates, No2) => "NO₂ (Attributable Pediatric Asthma Incidence/100K)",
        // the published dictionary omits "/100K" here; added to match the other rates
        (Metric::Rates, O3) => "O₃ (Attributable Premature Deaths/100K)",
        (Metric::Rates, Pm) => "PM₂.₅ (Attributable Premature Deaths/100K)",
        (_, Co2) => "CO₂",
    }
}

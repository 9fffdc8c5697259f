//! Observation rows and the closed vocabularies used to address them.
//!
//! Every numeric field of the source table has a [`Column`] variant, and every
//! logical metric selection is a ([`Version`], [`Metric`], [`Pollutant`])
//! triple. Column names only exist as strings at the CSV boundary.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Returned when a string does not name a known version, metric, pollutant,
/// column or region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseKeyError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseKeyError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Numeric city identifier (`ID` in the source table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CityId(pub u32);

impl fmt::Display for CityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for CityId {
    /// Accepts integral floats (`923.0`) since some exports write ids that way.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        if raw.fract() != 0.0 || raw < 0.0 || raw > f64::from(u32::MAX) {
            return Err(D::Error::custom(format!("invalid city id `{raw}`")));
        }
        Ok(CityId(raw as u32))
    }
}

/// One of the two independently sourced estimate datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    V1,
    V2,
}

impl Version {
    pub const ALL: [Version; 2] = [Version::V1, Version::V2];

    pub fn label(self) -> &'static str {
        match self {
            Version::V1 => "1",
            Version::V2 => "2",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Version::V1 => "v1",
            Version::V2 => "v2",
        }
    }

    /// Columns summarised by the aggregate tables, in display order.
    pub fn stat_columns(self) -> &'static [Column] {
        use Column::*;
        match self {
            Version::V1 => &[
                No2, Pm, O3, Co2, PafPm, PafNo2, PafO3, CasesNo2, CasesPm, CasesO3, RatesNo2,
                RatesO3, RatesPm,
            ],
            Version::V2 => &[PwNo2V2, PwPmV2, PwO3V2, Co2V2],
        }
    }

    /// Columns that get a percent-change figure in the change table.
    pub fn change_columns(self) -> &'static [Column] {
        use Column::*;
        match self {
            Version::V1 => &[Pm, No2, O3, Co2],
            Version::V2 => &[PwPmV2, PwNo2V2, PwO3V2, Co2V2],
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Version {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(Version::V1),
            "2" | "v2" => Ok(Version::V2),
            _ => Err(ParseKeyError::new("version", s)),
        }
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Concentration,
    Paf,
    Cases,
    Rates,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Concentration, Metric::Paf, Metric::Cases, Metric::Rates];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Concentration => "Concentration",
            Metric::Paf => "PAF",
            Metric::Cases => "Cases",
            Metric::Rates => "Rates",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseKeyError::new("metric", s))
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pollutant {
    No2,
    O3,
    Pm,
    Co2,
}

impl Pollutant {
    pub const ALL: [Pollutant; 4] = [Pollutant::No2, Pollutant::O3, Pollutant::Pm, Pollutant::Co2];

    pub fn name(self) -> &'static str {
        match self {
            Pollutant::No2 => "NO2",
            Pollutant::O3 => "O3",
            Pollutant::Pm => "PM",
            Pollutant::Co2 => "CO2",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Pollutant {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("PM2.5") || s.eq_ignore_ascii_case("PM25") {
            return Ok(Pollutant::Pm);
        }
        Pollutant::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseKeyError::new("pollutant", s))
    }
}

impl Serialize for Pollutant {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// A physical numeric column of the observation table (population excluded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    No2,
    Pm,
    O3,
    Co2,
    PafNo2,
    PafPm,
    PafO3,
    CasesNo2,
    CasesPm,
    CasesO3,
    RatesNo2,
    RatesPm,
    RatesO3,
    PwNo2V2,
    PwPmV2,
    PwO3V2,
    Co2V2,
}

impl Column {
    pub const ALL: [Column; 17] = [
        Column::No2,
        Column::Pm,
        Column::O3,
        Column::Co2,
        Column::PafNo2,
        Column::PafPm,
        Column::PafO3,
        Column::CasesNo2,
        Column::CasesPm,
        Column::CasesO3,
        Column::RatesNo2,
        Column::RatesPm,
        Column::RatesO3,
        Column::PwNo2V2,
        Column::PwPmV2,
        Column::PwO3V2,
        Column::Co2V2,
    ];

    /// Header of this column in the source CSV.
    pub fn name(self) -> &'static str {
        match self {
            Column::No2 => "NO2",
            Column::Pm => "PM",
            Column::O3 => "O3",
            Column::Co2 => "CO2",
            Column::PafNo2 => "PAF_NO2",
            Column::PafPm => "PAF_PM",
            Column::PafO3 => "PAF_O3",
            Column::CasesNo2 => "Cases_NO2",
            Column::CasesPm => "Cases_PM",
            Column::CasesO3 => "Cases_O3",
            Column::RatesNo2 => "Rates_NO2",
            Column::RatesPm => "Rates_PM",
            Column::RatesO3 => "Rates_O3",
            Column::PwNo2V2 => "Pw_NO2_V2",
            Column::PwPmV2 => "Pw_PM_V2",
            Column::PwO3V2 => "Pw_O3_V2",
            Column::Co2V2 => "CO2_V2",
        }
    }

    pub fn version(self) -> Version {
        match self {
            Column::PwNo2V2 | Column::PwPmV2 | Column::PwO3V2 | Column::Co2V2 => Version::V2,
            _ => Version::V1,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.name() == s.trim())
            .ok_or_else(|| ParseKeyError::new("column", s))
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Urban climate coalitions a city can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Membership {
    C40,
    GlobalCovenantOfMayors,
    BreatheLife2030,
    ClimateMayors,
    CarbonNeutralCitiesAlliance,
    ResilientCitiesNetwork,
}

impl Membership {
    pub const ALL: [Membership; 6] = [
        Membership::C40,
        Membership::GlobalCovenantOfMayors,
        Membership::BreatheLife2030,
        Membership::ClimateMayors,
        Membership::CarbonNeutralCitiesAlliance,
        Membership::ResilientCitiesNetwork,
    ];
}

/// A pair of values, one per data version.
#[derive(Debug, Clone, Serialize)]
pub struct Versioned<T> {
    pub v1: T,
    pub v2: T,
}

impl<T> Versioned<T> {
    pub fn build(mut f: impl FnMut(Version) -> T) -> Self {
        Self {
            v1: f(Version::V1),
            v2: f(Version::V2),
        }
    }

    pub fn get(&self, version: Version) -> &T {
        match version {
            Version::V1 => &self.v1,
            Version::V2 => &self.v2,
        }
    }
}

/// One row of the source table: a single city in a single year.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Observation {
    #[serde(rename = "ID")]
    pub id: CityId,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "continent", default)]
    pub continent: Option<String>,
    #[serde(rename = "CityCountry", default)]
    pub city_country: Option<String>,
    #[serde(rename = "State", skip_deserializing)]
    pub state: Option<String>,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Population", default, deserialize_with = "csv::invalid_option")]
    pub population: Option<f64>,
    #[serde(rename = "Latitude", default, deserialize_with = "csv::invalid_option")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude", default, deserialize_with = "csv::invalid_option")]
    pub longitude: Option<f64>,

    // coalition flags
    #[serde(rename = "C40", default, deserialize_with = "de_flag")]
    pub c40: bool,
    #[serde(rename = "Global.Covenant.of.Mayors", default, deserialize_with = "de_flag")]
    pub global_covenant_of_mayors: bool,
    #[serde(rename = "Breathe.Life.2030", default, deserialize_with = "de_flag")]
    pub breathe_life_2030: bool,
    #[serde(rename = "Climate.Mayors..US.ONLY.", default, deserialize_with = "de_flag")]
    pub climate_mayors: bool,
    #[serde(rename = "Carbon.Neutral.Cities.Alliance", default, deserialize_with = "de_flag")]
    pub carbon_neutral_cities_alliance: bool,
    #[serde(rename = "Resilient.Cities.Network", default, deserialize_with = "de_flag")]
    pub resilient_cities_network: bool,
    #[serde(rename = "Memberships", default, deserialize_with = "csv::invalid_option")]
    pub memberships: Option<f64>,

    // version 1
    #[serde(rename = "NO2", default, deserialize_with = "csv::invalid_option")]
    pub no2: Option<f64>,
    #[serde(rename = "PM", default, deserialize_with = "csv::invalid_option")]
    pub pm: Option<f64>,
    #[serde(rename = "O3", default, deserialize_with = "csv::invalid_option")]
    pub o3: Option<f64>,
    #[serde(rename = "CO2", default, deserialize_with = "csv::invalid_option")]
    pub co2: Option<f64>,
    #[serde(rename = "PAF_NO2", default, deserialize_with = "csv::invalid_option")]
    pub paf_no2: Option<f64>,
    #[serde(rename = "PAF_PM", default, deserialize_with = "csv::invalid_option")]
    pub paf_pm: Option<f64>,
    #[serde(rename = "PAF_O3", default, deserialize_with = "csv::invalid_option")]
    pub paf_o3: Option<f64>,
    #[serde(rename = "Cases_NO2", default, deserialize_with = "csv::invalid_option")]
    pub cases_no2: Option<f64>,
    #[serde(rename = "Cases_PM", default, deserialize_with = "csv::invalid_option")]
    pub cases_pm: Option<f64>,
    #[serde(rename = "Cases_O3", default, deserialize_with = "csv::invalid_option")]
    pub cases_o3: Option<f64>,
    #[serde(rename = "Rates_NO2", default, deserialize_with = "csv::invalid_option")]
    pub rates_no2: Option<f64>,
    #[serde(rename = "Rates_PM", default, deserialize_with = "csv::invalid_option")]
    pub rates_pm: Option<f64>,
    #[serde(rename = "Rates_O3", default, deserialize_with = "csv::invalid_option")]
    pub rates_o3: Option<f64>,

    // version 2
    #[serde(rename = "Pw_NO2_V2", default, deserialize_with = "csv::invalid_option")]
    pub pw_no2_v2: Option<f64>,
    #[serde(rename = "Pw_PM_V2", default, deserialize_with = "csv::invalid_option")]
    pub pw_pm_v2: Option<f64>,
    #[serde(rename = "Pw_O3_V2", default, deserialize_with = "csv::invalid_option")]
    pub pw_o3_v2: Option<f64>,
    #[serde(rename = "CO2_V2", default, deserialize_with = "csv::invalid_option")]
    pub co2_v2: Option<f64>,
}

impl Observation {
    /// An observation with every optional field missing.
    pub fn new(id: CityId, city: &str, country: &str, year: i32) -> Self {
        Self {
            id,
            city: city.to_string(),
            country: country.to_string(),
            continent: None,
            city_country: None,
            state: None,
            year,
            population: None,
            latitude: None,
            longitude: None,
            c40: false,
            global_covenant_of_mayors: false,
            breathe_life_2030: false,
            climate_mayors: false,
            carbon_neutral_cities_alliance: false,
            resilient_cities_network: false,
            memberships: None,
            no2: None,
            pm: None,
            o3: None,
            co2: None,
            paf_no2: None,
            paf_pm: None,
            paf_o3: None,
            cases_no2: None,
            cases_pm: None,
            cases_o3: None,
            rates_no2: None,
            rates_pm: None,
            rates_o3: None,
            pw_no2_v2: None,
            pw_pm_v2: None,
            pw_o3_v2: None,
            co2_v2: None,
        }
    }

    pub fn with_population(mut self, population: f64) -> Self {
        self.population = Some(population);
        self
    }

    pub fn with_value(mut self, column: Column, value: f64) -> Self {
        *self.value_mut(column) = Some(value);
        self
    }

    /// Value of `column`; NaN cells read as missing.
    pub fn value(&self, column: Column) -> Option<f64> {
        let value = match column {
            Column::No2 => self.no2,
            Column::Pm => self.pm,
            Column::O3 => self.o3,
            Column::Co2 => self.co2,
            Column::PafNo2 => self.paf_no2,
            Column::PafPm => self.paf_pm,
            Column::PafO3 => self.paf_o3,
            Column::CasesNo2 => self.cases_no2,
            Column::CasesPm => self.cases_pm,
            Column::CasesO3 => self.cases_o3,
            Column::RatesNo2 => self.rates_no2,
            Column::RatesPm => self.rates_pm,
            Column::RatesO3 => self.rates_o3,
            Column::PwNo2V2 => self.pw_no2_v2,
            Column::PwPmV2 => self.pw_pm_v2,
            Column::PwO3V2 => self.pw_o3_v2,
            Column::Co2V2 => self.co2_v2,
        };
        value.filter(|v| !v.is_nan())
    }

    pub fn value_mut(&mut self, column: Column) -> &mut Option<f64> {
        match column {
            Column::No2 => &mut self.no2,
            Column::Pm => &mut self.pm,
            Column::O3 => &mut self.o3,
            Column::Co2 => &mut self.co2,
            Column::PafNo2 => &mut self.paf_no2,
            Column::PafPm => &mut self.paf_pm,
            Column::PafO3 => &mut self.paf_o3,
            Column::CasesNo2 => &mut self.cases_no2,
            Column::CasesPm => &mut self.cases_pm,
            Column::CasesO3 => &mut self.cases_o3,
            Column::RatesNo2 => &mut self.rates_no2,
            Column::RatesPm => &mut self.rates_pm,
            Column::RatesO3 => &mut self.rates_o3,
            Column::PwNo2V2 => &mut self.pw_no2_v2,
            Column::PwPmV2 => &mut self.pw_pm_v2,
            Column::PwO3V2 => &mut self.pw_o3_v2,
            Column::Co2V2 => &mut self.co2_v2,
        }
    }

    pub fn population(&self) -> Option<f64> {
        self.population.filter(|p| !p.is_nan())
    }

    pub fn is_member(&self, membership: Membership) -> bool {
        match membership {
            Membership::C40 => self.c40,
            Membership::GlobalCovenantOfMayors => self.global_covenant_of_mayors,
            Membership::BreatheLife2030 => self.breathe_life_2030,
            Membership::ClimateMayors => self.climate_mayors,
            Membership::CarbonNeutralCitiesAlliance => self.carbon_neutral_cities_alliance,
            Membership::ResilientCitiesNetwork => self.resilient_cities_network,
        }
    }

    pub fn memberships(&self) -> Vec<Membership> {
        Membership::ALL
            .into_iter()
            .filter(|m| self.is_member(*m))
            .collect()
    }

    /// Number of coalitions the city belongs to. Prefers the precomputed
    /// `Memberships` column and falls back to counting the flags.
    pub fn membership_count(&self) -> u32 {
        match self.memberships {
            Some(n) if n.is_finite() && n >= 0.0 => n as u32,
            _ => self.memberships().len() as u32,
        }
    }

    /// `"{City} ({ID})"`, unique even when two cities share a name.
    pub fn city_label(&self) -> String {
        format!("{} ({})", self.city, self.id)
    }

    /// The `CityCountry` label, or `"{City}, {Country}"` when the source omits it.
    pub fn display_name(&self) -> String {
        match &self.city_country {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}, {}", self.city, self.country),
        }
    }
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(false);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "false" | "0" | "0.0" | "no" | "nan" | "na" | "none" => Ok(false),
        "true" | "1" | "1.0" | "yes" => Ok(true),
        other => Err(D::Error::custom(format!("invalid flag `{other}`"))),
    }
}

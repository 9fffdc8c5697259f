//! Slicing of the cleaned observation table by place and year range.

use serde::{Deserialize, Serialize};

use crate::model::Observation;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationQuery {
    pub from: Option<i32>,
    pub to: Option<i32>,
    pub country: Option<String>,
    /// Matched against the `CityCountry` label; takes precedence over `country`.
    pub city: Option<String>,
}

impl ObservationQuery {
    pub fn years(mut self, from: i32, to: i32) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn country(mut self, country: &str) -> Self {
        self.country = Some(country.to_string());
        self
    }

    pub fn city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }

    /// Inclusive year bounds, swapped when given in reverse.
    pub fn year_bounds(&self) -> (i32, i32) {
        let from = self.from.unwrap_or(i32::MIN);
        let to = self.to.unwrap_or(i32::MAX);
        if from > to { (to, from) } else { (from, to) }
    }

    pub fn matches(&self, obs: &Observation) -> bool {
        let (from, to) = self.year_bounds();
        if obs.year < from || obs.year > to {
            return false;
        }
        match (&self.city, &self.country) {
            (Some(city), _) => obs.display_name() == *city,
            (None, Some(country)) => obs.country == *country,
            (None, None) => true,
        }
    }

    /// Matching rows in table order.
    pub fn apply<'a>(&self, observations: &'a [Observation]) -> Vec<&'a Observation> {
        observations.iter().filter(|o| self.matches(o)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CityId;

    fn rows() -> Vec<Observation> {
        let mut lyon = Observation::new(CityId(1), "Lyon", "France", 2012);
        lyon.city_country = Some("Lyon, France".to_string());
        vec![
            Observation::new(CityId(2), "Paris", "France", 2010),
            lyon,
            Observation::new(CityId(3), "Rome", "Italy", 2011),
            Observation::new(CityId(2), "Paris", "France", 2015),
        ]
    }

    #[test]
    fn test_reversed_years_are_swapped() {
        let query = ObservationQuery::default().years(2014, 2010);
        assert_eq!(query.year_bounds(), (2010, 2014));

        let data = rows();
        let years: Vec<i32> = query.apply(&data).iter().map(|o| o.year).collect();
        assert_eq!(years, vec![2010, 2012, 2011]);
    }

    #[test]
    fn test_city_takes_precedence_over_country() {
        let data = rows();
        let query = ObservationQuery::default().country("Italy").city("Lyon, France");
        let found = query.apply(&data);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, CityId(1));
    }

    #[test]
    fn test_country_filter() {
        let data = rows();
        let found = ObservationQuery::default().country("France").apply(&data);
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_empty_query_matches_all() {
        let data = rows();
        assert_eq!(ObservationQuery::default().apply(&data).len(), data.len());
    }
}

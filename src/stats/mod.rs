//! Regional statistics and percent-change tables.
//!
//! [`aggregate`] groups observations by (region, year) and computes
//! null-skipping descriptive statistics; [`change`] compares two 2-year
//! averaging windows per city.

pub mod aggregate;
pub mod change;
pub mod types;
pub mod utility;

pub use aggregate::{aggregate, aggregate_columns, yearly_means};
pub use change::{change_table, percent_change};
pub use types::{
    AggregateRow, AggregateTables, ChangeRow, ChangeTable, ChangeWindows, Grouping, Statistic,
};

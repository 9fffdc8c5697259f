pub mod cleaner;
pub mod config;
pub mod context;
pub mod fetch;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod output;
pub mod query;
pub mod regions;
pub mod stats;

pub use context::DataContext;

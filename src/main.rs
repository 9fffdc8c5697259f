//! CLI entry point for the urban air-quality data pipeline.
//!
//! Builds the derived tables from the published sources and exposes them for
//! inspection, export, and ad-hoc percent-change runs.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use urban_aq::{
    DataContext,
    config::Settings,
    model::{Column, Metric, Pollutant, Version},
    output::{ChangeRecord, append_records, export_all, print_json},
    regions::SupportedRegion,
    stats::{ChangeWindows, Statistic, percent_change},
};

#[derive(Parser)]
#[command(name = "urban_aq")]
#[command(about = "Urban air-quality and emissions statistics", long_about = None)]
struct Cli {
    /// JSON settings file overriding the default sources and constants
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the sources and log the size of every derived table
    Summary,
    /// Write every derived table as JSON
    Export {
        /// Directory to write the tables into
        #[arg(short = 'd', long, default_value = "export")]
        output_dir: String,

        /// Gzip compress the JSON files
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Show the column and unit for a version/metric/pollutant selection
    Resolve {
        /// Data version (1 or 2)
        version: Version,
        /// Concentration, PAF, Cases or Rates
        metric: Metric,
        /// NO2, O3, PM or CO2
        pollutant: Pollutant,
    },
    /// Compute the percent change of one column between two 2-year windows
    Change {
        #[arg(long, default_value_t = 2010)]
        start: i32,

        #[arg(long, default_value_t = 2019)]
        end: i32,

        /// Source column, e.g. PM or Pw_NO2_V2
        #[arg(long)]
        column: Column,

        /// CSV file to append results to
        #[arg(short, long, default_value = "change.csv")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/urban_aq.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("urban_aq.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Summary => {
            let ctx = DataContext::load(&settings).await?;
            summarize(&ctx);
        }
        Commands::Export { output_dir, gzip } => {
            let ctx = DataContext::load(&settings).await?;
            export_all(&ctx, Path::new(&output_dir), gzip)?;
        }
        Commands::Resolve {
            version,
            metric,
            pollutant,
        } => {
            // No data needed: the resolver is a static table.
            let resolver = urban_aq::metrics::MetricResolver::new();
            match resolver.resolve(version, metric, pollutant) {
                Ok(resolved) => print_json(&resolved)?,
                Err(e) => {
                    error!(error = %e, "Invalid selection");
                    let options = resolver.metrics_for(version, pollutant);
                    info!(?options, "Metrics available for this pollutant");
                    return Err(e.into());
                }
            }
        }
        Commands::Change {
            start,
            end,
            column,
            output,
        } => {
            let ctx = DataContext::load(&settings).await?;
            let windows = ChangeWindows { start, end };
            let records: Vec<ChangeRecord> = percent_change(windows, ctx.observations(), column)
                .into_iter()
                .map(|(city, percent)| ChangeRecord {
                    city,
                    column,
                    start,
                    end,
                    percent_change: percent,
                })
                .collect();

            append_records(&output, &records)?;
            info!(cities = records.len(), output, "Percent change written");
        }
    }

    Ok(())
}

fn summarize(ctx: &DataContext) {
    let years = ctx.years();
    info!(
        observations = ctx.observations().len(),
        first_year = years.first().copied(),
        last_year = years.last().copied(),
        built_at = %ctx.built_at(),
        "Observation table"
    );

    for version in Version::ALL {
        let stats = ctx.country_stats(version);
        let change = ctx.changes(version);
        let latest_countries = years
            .last()
            .map_or(0, |&year| stats.for_year(Statistic::Mean, year).count());
        info!(
            version = %version,
            country_years = stats.len(),
            latest_countries,
            weighted_rows = stats.table(Statistic::WeightedMean).len(),
            change_rows = change.rows.len(),
            "Country tables"
        );
    }

    for region in SupportedRegion::ALL {
        let data = ctx.region(region);
        info!(
            region = %region,
            rows = data.rows.len(),
            cities = data.city_labels.len(),
            state_years = data.stats(Version::V1).states.len(),
            has_boundaries = ctx.boundaries(region).is_some(),
            "Region"
        );
    }
}

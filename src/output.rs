//! Output formatting and persistence for the derived tables.
//!
//! Supports pretty-printing, JSON files (optionally gzip-compressed), and CSV
//! append.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::context::DataContext;
use crate::model::{CityId, Column, Version};
use crate::stats::Statistic;

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Serializes `value` to `path`, creating parent directories.
///
/// With `gzip`, the output is compressed and `.gz` is appended to the file
/// name. Returns the path actually written.
pub fn write_json(path: &Path, value: &impl Serialize, gzip: bool) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let path = if gzip {
        let mut name = path.as_os_str().to_owned();
        name.push(".gz");
        PathBuf::from(name)
    } else {
        path.to_path_buf()
    };

    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    if gzip {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, value)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }

    debug!(path = %path.display(), "JSON written");
    Ok(path)
}

/// Appends rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Flat percent-change record for CSV output.
#[derive(Debug, Serialize)]
pub struct ChangeRecord {
    pub city: CityId,
    pub column: Column,
    pub start: i32,
    pub end: i32,
    pub percent_change: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ExportIndex {
    pub generated_at: DateTime<Utc>,
    pub built_at: DateTime<Utc>,
    pub files: Vec<String>,
}

/// Writes every derived table of `ctx` under `dir` plus an `index.json`.
pub fn export_all(ctx: &DataContext, dir: &Path, gzip: bool) -> Result<ExportIndex> {
    let mut files = Vec::new();

    for version in Version::ALL {
        let slug = version.slug();
        let stats = ctx.country_stats(version);
        for stat in Statistic::ALL {
            let name = format!("{slug}/country_{}.json", stat.slug());
            export(dir, &name, &stats.table(stat), gzip, &mut files)?;
        }
        export(dir, &format!("{slug}/change.json"), ctx.changes(version), gzip, &mut files)?;

        for region in ctx.regions() {
            let name = format!("{slug}/regions/{}.json", region.region.slug());
            export(dir, &name, region.stats(version), gzip, &mut files)?;
        }
    }

    for region in ctx.regions() {
        let name = format!("regions/{}_cities.json", region.region.slug());
        export(dir, &name, &region.rows, gzip, &mut files)?;
        if let Some(geojson) = ctx.boundaries(region.region) {
            let name = format!("regions/{}_boundaries.json", region.region.slug());
            export(dir, &name, geojson, gzip, &mut files)?;
        }
    }

    let index = ExportIndex {
        generated_at: Utc::now(),
        built_at: ctx.built_at(),
        files,
    };
    write_json(&dir.join("index.json"), &index, false)?;
    info!(files = index.files.len(), dir = %dir.display(), "Export complete");

    Ok(index)
}

fn export(
    dir: &Path,
    name: &str,
    value: &impl Serialize,
    gzip: bool,
    files: &mut Vec<String>,
) -> Result<()> {
    let written = write_json(&dir.join(name), value, gzip)?;
    let relative = written.strip_prefix(dir).unwrap_or(&written);
    files.push(relative.display().to_string());
    Ok(())
}

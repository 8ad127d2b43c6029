//! Output formatting and persistence for collected records.
//!
//! Supports JSON logging, timestamped CSV snapshots and CSV append.

use anyhow::Result;
use chrono::Local;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

use crate::guard::OrLog;

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// `data_<file_name>_<HHMMSS>.csv` inside `dir`.
pub fn snapshot_path(dir: impl AsRef<Path>, file_name: &str) -> PathBuf {
    let stamp = Local::now().format("%H%M%S");
    dir.as_ref().join(format!("data_{file_name}_{stamp}.csv"))
}

/// Writes `records` to a new timestamped CSV file in `dir`.
///
/// The header row comes from the record's field names. Returns the path
/// written, or `None` when there is nothing to save or writing failed.
pub fn save_to_csv<T: Serialize>(
    records: &[T],
    file_name: &str,
    dir: impl AsRef<Path>,
) -> Option<PathBuf> {
    if records.is_empty() {
        error!("No data to save");
        return None;
    }

    let path = snapshot_path(dir, file_name);
    write_all(&path, records.iter()).or_log("save_to_csv")?;
    info!("Data saved to {}", path.display());
    Some(path)
}

/// Writes the batches of a polling run into one CSV file, in order.
pub fn save_batches_to_csv<T: Serialize>(
    batches: &[Vec<T>],
    file_name: &str,
    dir: impl AsRef<Path>,
) -> Option<PathBuf> {
    if batches.iter().all(Vec::is_empty) {
        error!("No data to save");
        return None;
    }

    let path = snapshot_path(dir, file_name);
    write_all(&path, batches.iter().flatten()).or_log("save_batches_to_csv")?;
    info!(batches = batches.len(), "Data saved to {}", path.display());
    Some(path)
}

fn write_all<'a, T, I>(path: &Path, records: I) -> Result<()>
where
    T: Serialize + 'a,
    I: Iterator<Item = &'a T>,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new().from_writer(File::create(path)?);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Appends one record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<T: Serialize>(path: impl AsRef<Path>, record: &T) -> Result<()> {
    let path = path.as_ref();
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}

//! # Log Replay
//!
//! Loads a CSV session log back into signal histories of the same types live
//! ingestion uses, so plots and the orientation view cannot tell the
//! difference.
//!
//! Each row's values are stored at the row's literal `t` value. An empty `t`
//! cell reads as `0.0`; an empty value cell means "no sample" and is skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, TelemetryError};
use crate::store::{Sample, SignalHistory, TimeSeriesStore};

/// Histories recovered from a log, plus the number of data rows read
pub type Replay = (HashMap<String, SignalHistory>, usize);

fn parse_cell(cell: &str, column: &str, row: usize) -> Result<f64> {
    cell.parse::<f64>().map_err(|_| {
        TelemetryError::InvalidValue(format!("row {}: {:?} in column {} is not a number", row, cell, column))
    })
}

/// Parse a CSV log from any reader
///
/// Histories are bounded by `max_points`; only the newest rows survive for
/// long logs. An empty source yields no histories.
///
/// # Errors
///
/// * `Csv` - malformed CSV
/// * `InvalidValue` - a non-empty cell is not a number
pub fn load<R: Read>(source: R, max_points: usize) -> Result<Replay> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let mut records = reader.records();
    let header = match records.next() {
        Some(header) => header?,
        None => return Ok((HashMap::new(), 0)),
    };

    // Column 0 is time; blank header cells (time-only logs) carry no signal
    let keys: Vec<Option<String>> = header
        .iter()
        .skip(1)
        .map(|k| (!k.is_empty()).then(|| k.to_string()))
        .collect();

    let mut histories: HashMap<String, SignalHistory> = keys
        .iter()
        .flatten()
        .map(|k| (k.clone(), SignalHistory::new(max_points)))
        .collect();

    let mut rows = 0;
    for record in records {
        let record = record?;
        rows += 1;

        let t = match record.get(0) {
            Some(cell) if !cell.is_empty() => parse_cell(cell, "t", rows)?,
            _ => 0.0,
        };

        for (key, cell) in keys.iter().zip(record.iter().skip(1)) {
            let Some(key) = key else { continue };
            if cell.is_empty() {
                continue;
            }
            let value = parse_cell(cell, key, rows)?;
            if let Some(history) = histories.get_mut(key) {
                history.push(Sample::new(value, t));
            }
        }
    }

    // Signals that never had a value are not part of the replayed store
    histories.retain(|_, h| !h.is_empty());
    debug!("Parsed {} rows for {} signals", rows, histories.len());
    Ok((histories, rows))
}

/// Load a log file into a fresh store
pub fn load_store<P: AsRef<Path>>(path: P, max_points: usize) -> Result<(TimeSeriesStore, usize)> {
    let (histories, rows) = load(File::open(path)?, max_points)?;
    let store = TimeSeriesStore::new(max_points);
    store.replace_with(histories);
    Ok((store, rows))
}

/// Replace the contents of `store` with a log file
///
/// The file is parsed completely before the store is touched, so a bad log
/// leaves the current data in place.
pub fn load_into(path: &Path, store: &TimeSeriesStore) -> Result<usize> {
    let (histories, rows) = load(File::open(path)?, store.max_points())?;
    store.replace_with(histories);
    Ok(rows)
}

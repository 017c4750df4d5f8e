//! # Session Logger
//!
//! Records the latest value of a fixed set of signals as CSV rows:
//!
//! ```text
//! t,ROL,PIT,YAW
//! 0.025,1.5,-2.25,90
//! 0.05,1.5,,90
//! ```
//!
//! The caller drives the cadence; every `record` call writes one row using the
//! most recent stored value of each signal (no interpolation). An empty cell
//! means the signal had no sample yet.

use chrono::Local;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, TelemetryError};
use crate::store::{Sample, TimeSeriesStore};

/// Header cell of the time column
pub const TIME_COLUMN: &str = "t";

/// Prefix of session file names: `telemetry_YYYYMMDD_HHMMSS.csv`
pub const FILE_PREFIX: &str = "telemetry";

struct ActiveSession {
    writer: csv::Writer<Box<dyn Write + Send>>,
    start: Instant,
    keys: Vec<String>,
    rows: u64,
}

/// CSV recorder for one logging session at a time
pub struct SessionLogger {
    include_padding: bool,
    session: Option<ActiveSession>,
}

impl Default for SessionLogger {
    fn default() -> Self {
        Self::new(false)
    }
}

impl std::fmt::Debug for SessionLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLogger")
            .field("include_padding", &self.include_padding)
            .field("active", &self.is_active())
            .field("rows", &self.row_count())
            .finish()
    }
}

/// File name for a session started now
pub fn session_file_name() -> String {
    format!("{}_{}.csv", FILE_PREFIX, Local::now().format("%Y%m%d_%H%M%S"))
}

impl SessionLogger {
    /// `include_padding` controls whether stale-signal padding samples count
    /// as "latest" values in the log
    pub fn new(include_padding: bool) -> Self {
        Self { include_padding, session: None }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Keys of the running session, in column order
    pub fn keys(&self) -> &[String] {
        self.session.as_ref().map_or(&[], |s| s.keys.as_slice())
    }

    /// Data rows written in the running session
    pub fn row_count(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.rows)
    }

    /// Begin a session on `sink`, writing the header immediately
    ///
    /// # Errors
    ///
    /// `LoggerActive` if a session is already running; `Csv` if the header
    /// cannot be written, in which case no session is started
    pub fn start<W, S>(&mut self, sink: W, keys: &[S]) -> Result<()>
    where
        W: Write + Send + 'static,
        S: AsRef<str>,
    {
        if self.is_active() {
            return Err(TelemetryError::LoggerActive);
        }

        let keys: Vec<String> = keys.iter().map(|k| k.as_ref().to_string()).collect();
        let sink: Box<dyn Write + Send> = Box::new(sink);
        let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(sink);

        let mut header = Vec::with_capacity(keys.len() + 1);
        header.push(TIME_COLUMN);
        header.extend(keys.iter().map(String::as_str));
        writer.write_record(&header)?;
        writer.flush()?;

        self.session = Some(ActiveSession {
            writer,
            start: Instant::now(),
            keys,
            rows: 0,
        });
        Ok(())
    }

    /// Begin a session writing to `path` (truncating it)
    pub fn start_file<P: AsRef<Path>, S: AsRef<str>>(&mut self, path: P, keys: &[S]) -> Result<()> {
        if self.is_active() {
            return Err(TelemetryError::LoggerActive);
        }
        let file = File::create(path.as_ref())?;
        self.start(file, keys)?;
        info!("Logging {} signals to {}", keys.len(), path.as_ref().display());
        Ok(())
    }

    /// Begin a session in `dir` under a timestamped file name
    ///
    /// # Returns
    ///
    /// * `Result<PathBuf>` - Path of the new log file
    pub fn start_in_dir<P: AsRef<Path>, S: AsRef<str>>(&mut self, dir: P, keys: &[S]) -> Result<PathBuf> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(session_file_name());
        self.start_file(&path, keys)?;
        Ok(path)
    }

    /// Samples the next row would log, in column order
    ///
    /// Without `include_padding` each cell is the newest received sample,
    /// which padding never displaces.
    pub fn row_samples(&self, store: &TimeSeriesStore) -> Vec<Option<Sample>> {
        store.latest_many(self.keys(), self.include_padding)
    }

    /// Append one row stamped with the time since `start`
    pub fn record(&mut self, store: &TimeSeriesStore) -> Result<()> {
        self.record_at(store, Instant::now())
    }

    /// Append one row stamped with `now - start`
    pub fn record_at(&mut self, store: &TimeSeriesStore, now: Instant) -> Result<()> {
        let latest = self.row_samples(store);
        let session = self.session.as_mut().ok_or(TelemetryError::LoggerInactive)?;

        let elapsed = now.saturating_duration_since(session.start).as_secs_f64();
        let mut row = Vec::with_capacity(session.keys.len() + 1);
        row.push(elapsed.to_string());
        row.extend(latest.iter().map(|s| s.map(|s| s.value.to_string()).unwrap_or_default()));
        if session.keys.is_empty() {
            row.push(String::new());
        }

        session.writer.write_record(&row)?;
        session.writer.flush()?;
        session.rows += 1;
        Ok(())
    }

    /// End the session, returning the number of data rows written
    pub fn stop(&mut self) -> Result<u64> {
        let mut session = self.session.take().ok_or(TelemetryError::LoggerInactive)?;
        session.writer.flush()?;
        info!("Logging stopped after {} rows", session.rows);
        debug!("Logged keys: {:?}", session.keys);
        Ok(session.rows)
    }
}

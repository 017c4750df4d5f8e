//! # Signal Catalog
//!
//! Read-only mapping from signal key to direction and display name, loaded
//! from the dashboard's JSON database:
//!
//! ```json
//! { "signal_keys": [ { "key": "ROL", "dir": "RX", "name": "Roll" } ] }
//! ```
//!
//! Nothing in the ingestion path requires catalog membership. Unknown keys are
//! reported as RX with the key itself as the name.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::Result;

/// Signal direction relative to the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum Direction {
    /// Inbound telemetry from the boat
    #[serde(rename = "RX")]
    Rx,
    /// Outbound command to the boat
    #[serde(rename = "TX")]
    Tx,
}

/// Catalog entry for one signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalInfo {
    pub direction: Direction,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    signal_keys: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    key: String,
    dir: Direction,
    name: String,
}

/// Lookup table of known signals, in file order
#[derive(Debug, Clone, Default)]
pub struct SignalCatalog {
    order: Vec<String>,
    entries: HashMap<String, SignalInfo>,
}

impl SignalCatalog {
    /// Empty catalog; every lookup falls back to RX / key-as-name
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the catalog, falling back to an empty one if the file is missing
    /// or malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(catalog) => {
                info!("Loaded {} signals from {}", catalog.len(), path.display());
                catalog
            }
            Err(e) => {
                warn!("Signal catalog {} unavailable ({}), using key names", path.display(), e);
                Self::empty()
            }
        }
    }

    /// Load the catalog, surfacing read and parse errors.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut catalog = Self::empty();
        for entry in file.signal_keys {
            catalog.insert(entry.key, entry.dir, entry.name);
        }
        Ok(catalog)
    }

    /// Add or replace an entry. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, direction: Direction, name: impl Into<String>) {
        let key = key.into();
        let info = SignalInfo { direction, name: name.into() };
        if self.entries.insert(key.clone(), info).is_none() {
            self.order.push(key);
        }
    }

    pub fn get(&self, key: &str) -> Option<&SignalInfo> {
        self.entries.get(key)
    }

    pub fn direction(&self, key: &str) -> Direction {
        self.entries.get(key).map(|i| i.direction).unwrap_or(Direction::Rx)
    }

    pub fn name<'a>(&'a self, key: &'a str) -> &'a str {
        self.entries.get(key).map(|i| i.name.as_str()).unwrap_or(key)
    }

    /// Keys in file order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn keys_with_direction(&self, direction: Direction) -> Vec<&str> {
        self.keys().filter(|k| self.direction(k) == direction).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATABASE: &str = r#"{
        "signal_keys": [
            { "key": "ROL", "dir": "RX", "name": "Roll" },
            { "key": "BAT", "dir": "RX", "name": "Battery voltage" },
            { "key": "RUD", "dir": "TX", "name": "Rudder setpoint" },
            { "key": "SAI", "dir": "TX", "name": "Sail setpoint" }
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let catalog = SignalCatalog::from_json(DATABASE).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.name("BAT"), "Battery voltage");
        assert_eq!(catalog.direction("RUD"), Direction::Tx);
        assert_eq!(catalog.keys().collect::<Vec<_>>(), vec!["ROL", "BAT", "RUD", "SAI"]);
    }

    #[test]
    fn test_unknown_key_falls_back_to_rx_and_key_name() {
        let catalog = SignalCatalog::from_json(DATABASE).unwrap();
        assert_eq!(catalog.direction("EX1"), Direction::Rx);
        assert_eq!(catalog.name("EX1"), "EX1");
        assert!(catalog.get("EX1").is_none());
    }

    #[test]
    fn test_keys_with_direction() {
        let catalog = SignalCatalog::from_json(DATABASE).unwrap();
        assert_eq!(catalog.keys_with_direction(Direction::Tx), vec!["RUD", "SAI"]);
        assert_eq!(catalog.keys_with_direction(Direction::Rx), vec!["ROL", "BAT"]);
    }

    #[test]
    fn test_missing_signal_keys_array() {
        let catalog = SignalCatalog::from_json("{}").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_invalid_direction_is_error() {
        let json = r#"{ "signal_keys": [ { "key": "ROL", "dir": "UP", "name": "Roll" } ] }"#;
        assert!(SignalCatalog::from_json(json).is_err());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let catalog = SignalCatalog::load("/nonexistent/database.json");
        assert!(catalog.is_empty());
        assert_eq!(catalog.name("ROL"), "ROL");
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(DATABASE.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let catalog = SignalCatalog::load(temp_file.path());
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_insert_replaces_without_reordering() {
        let mut catalog = SignalCatalog::from_json(DATABASE).unwrap();
        catalog.insert("ROL", Direction::Rx, "Heel");
        assert_eq!(catalog.name("ROL"), "Heel");
        assert_eq!(catalog.keys().next(), Some("ROL"));
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_shipped_catalog_parses() {
        let catalog = SignalCatalog::try_load(concat!(env!("CARGO_MANIFEST_DIR"), "/database.json")).unwrap();
        assert_eq!(catalog.direction("RUD"), Direction::Tx);
        assert_eq!(catalog.keys_with_direction(Direction::Tx), vec!["RUD", "SAI", "MOD"]);
    }
}

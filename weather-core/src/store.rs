//! Single-slot persistence of the last successful query.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::{fmt::Debug, fs, io, path::PathBuf};
use tracing::debug;

use crate::{CachedQueryResult, WeatherError};

/// Storage key of the record; also the file stem used by [`FileStore`].
pub const STORAGE_KEY: &str = "weather-app-last-search";

/// Durable slot holding the most recent [`CachedQueryResult`].
pub trait LastQueryStore: Send + Sync + Debug {
    /// Raw stored payload, if any.
    fn load_raw(&self) -> Option<String>;

    /// Overwrite the slot unconditionally.
    fn save(&self, record: &CachedQueryResult) -> Result<()>;

    /// Parsed record; absent and corrupt payloads both yield `None`.
    fn load(&self) -> Option<CachedQueryResult> {
        let raw = self.load_raw()?;
        match parse_record(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(error = %err, "ignoring stored record");
                None
            }
        }
    }
}

pub fn parse_record(raw: &str) -> Result<CachedQueryResult, WeatherError> {
    serde_json::from_str(raw).map_err(|e| WeatherError::Parse(e.to_string()))
}

/// JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl LastQueryStore for FileStore {
    fn load_raw(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(err) => {
                debug!(path = %self.path.display(), error = %err, "stored record unreadable");
                None
            }
        }
    }

    fn save(&self, record: &CachedQueryResult) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory: {}", parent.display()))?;
        }

        let json = serde_json::to_string(record).context("Failed to serialize last search")?;

        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write last search: {}", self.path.display()))?;

        Ok(())
    }
}

/// In-process slot, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with an arbitrary payload.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { slot: Mutex::new(Some(raw.into())) }
    }
}

impl LastQueryStore for MemoryStore {
    fn load_raw(&self) -> Option<String> {
        self.slot.lock().clone()
    }

    fn save(&self, record: &CachedQueryResult) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize last search")?;
        *self.slot.lock() = Some(json);
        Ok(())
    }
}

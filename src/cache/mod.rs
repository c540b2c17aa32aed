use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::ReviewError;
use crate::ReviewRecord;

/// One stored review, keyed by the content fingerprint of the truncated
/// source it was produced from. Entries are never mutated in place; a
/// changed file gets a new fingerprint and therefore a new entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub record: ReviewRecord,
    /// Unix timestamp, diagnostics only. There is no expiry.
    pub created_at: i64,
}

/// Fingerprint-keyed persisted review store. A single JSON file, loaded
/// whole at startup and written back after the run; no eviction, no
/// locking, single-process sequential access.
///
/// Cache failures are best-effort by design: every caller treats a load or
/// save error as a miss and regenerates, because a lost cache only costs a
/// model invocation.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReviewCache {
    entries: HashMap<String, CacheEntry>,
}

impl ReviewCache {
    /// Load the cache from disk. Absence is not an error; corruption is,
    /// so the caller can log it and fall back to an empty cache.
    pub fn load(path: &Path) -> Result<Option<Self>, ReviewError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(path).map_err(|e| ReviewError::CacheIo(e.to_string()))?;
        let cache: ReviewCache =
            serde_json::from_str(&contents).map_err(|e| ReviewError::CacheIo(e.to_string()))?;
        Ok(Some(cache))
    }

    /// Save the cache to disk.
    pub fn save(&self, path: &Path) -> Result<(), ReviewError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ReviewError::CacheIo(e.to_string()))?;
            }
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ReviewError::CacheIo(e.to_string()))?;
        fs::write(path, contents).map_err(|e| ReviewError::CacheIo(e.to_string()))?;
        Ok(())
    }

    pub fn get(&self, fingerprint: &str) -> Option<&ReviewRecord> {
        self.entries.get(fingerprint).map(|e| &e.record)
    }

    pub fn put(&mut self, fingerprint: String, record: ReviewRecord) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                record,
                created_at: chrono::Utc::now().timestamp(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Explicit memoization of loaded tables.
//!
//! Entries are keyed by canonical path and remember the fingerprint (length and
//! modification time) and options they were built from. A lookup whose fingerprint or
//! options no longer match re-parses the source.
//!
//! The CLI makes one pass and loads through a fresh cache; long-lived front ends keep one
//! cache for the whole session so repeated requests for the same source are free.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

use crate::error_display::user_message;
use crate::ingest::{load_with_options, IngestOptions, LoadError};
use crate::record::AccidentTable;

/// Identity of a source file's content as seen through its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFingerprint {
    pub path: PathBuf,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl SourceFingerprint {
    pub fn of(path: &Path) -> Result<Self, LoadError> {
        let io_err = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        let canonical = path.canonicalize().map_err(io_err)?;
        let metadata = std::fs::metadata(&canonical).map_err(io_err)?;
        Ok(Self {
            path: canonical,
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

struct CacheEntry {
    fingerprint: SourceFingerprint,
    options: IngestOptions,
    table: AccidentTable,
}

/// Loaded tables by source. Owned by the caller; nothing is cached process-wide.
#[derive(Default)]
pub struct LoadCache {
    entries: HashMap<PathBuf, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached table for `path` if its fingerprint and options still match,
    /// otherwise load it and remember the result. Failed loads are not cached.
    pub fn get_or_load(
        &mut self,
        path: &Path,
        options: &IngestOptions,
    ) -> Result<AccidentTable, LoadError> {
        let fingerprint = SourceFingerprint::of(path)?;

        if let Some(entry) = self.entries.get(&fingerprint.path) {
            if entry.fingerprint == fingerprint && entry.options == *options {
                self.hits += 1;
                debug!(path = %fingerprint.path.display(), "load cache hit");
                return Ok(entry.table.clone());
            }
            warn!(
                path = %fingerprint.path.display(),
                "source or options changed since last load, reloading"
            );
        }

        self.misses += 1;
        let table = load_with_options(&fingerprint.path, options)?;
        self.entries.insert(
            fingerprint.path.clone(),
            CacheEntry {
                fingerprint,
                options: options.clone(),
                table: table.clone(),
            },
        );
        Ok(table)
    }

    /// Like `get_or_load`, but a failed load writes one user-facing line to `errors` and
    /// yields an empty table, so callers can still render the "No data available." state.
    pub fn load_or_empty<W: Write>(
        &mut self,
        path: &Path,
        options: &IngestOptions,
        errors: &mut W,
    ) -> AccidentTable {
        match self.get_or_load(path, options) {
            Ok(table) => table,
            Err(e) => {
                debug!(error = ?e, "load failed");
                // Nowhere left to report a failed write.
                let _ = writeln!(errors, "{}", user_message(&e));
                AccidentTable::empty()
            }
        }
    }

    /// Drop the entry for `path`. Returns whether an entry existed.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.entries.remove(&key).is_some()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

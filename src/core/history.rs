//! Send history
//!
//! One ordered list per [`SendMode`], oldest first. A value appears at most
//! once per list; sending it again moves it to the end. Every mutation is
//! written straight to a JSON file with the keys `text`, `hex` and `hex_crc`.

use crate::core::codec::SendMode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// History errors
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Global index past the end of the listing
    #[error("No history entry #{index} (have {len})")]
    IndexOutOfRange {
        /// Requested index (0-based)
        index: usize,
        /// Number of entries
        len: usize,
    },

    /// Reading or writing the file failed
    #[error("History I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the file failed
    #[error("History serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Which lists an operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryScope {
    /// Every mode
    All,
    /// A single mode
    Mode(SendMode),
}

impl HistoryScope {
    fn includes(&self, mode: SendMode) -> bool {
        match self {
            Self::All => true,
            Self::Mode(m) => *m == mode,
        }
    }
}

impl fmt::Display for HistoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all modes"),
            Self::Mode(mode) => write!(f, "{}", mode),
        }
    }
}

/// One line of a history listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Position in the global listing (0-based)
    pub index: usize,
    /// Mode the value belongs to
    pub mode: SendMode,
    /// Recorded value
    pub value: String,
}

#[derive(Serialize)]
struct HistoryFile<'a> {
    text: &'a [String],
    hex: &'a [String],
    hex_crc: &'a [String],
}

/// Persistent per-mode history
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    path: Option<PathBuf>,
    lists: BTreeMap<SendMode, Vec<String>>,
}

impl HistoryStore {
    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load from `path`
    ///
    /// A missing or unreadable file, or a malformed document, yields an
    /// empty store. Keys other than the three mode keys and non-string items
    /// are ignored. Repeated values keep only their last position; the file
    /// itself is rewritten on the next change.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut store = Self {
            path: Some(path.clone()),
            lists: BTreeMap::new(),
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No history file yet");
                return store;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "History file unreadable, starting empty");
                return store;
            }
        };

        let document: serde_json::Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "History file corrupt, starting empty");
                return store;
            }
        };

        let mut repeated = 0;
        for mode in SendMode::ALL {
            if let Some(items) = document.get(mode.key()).and_then(|v| v.as_array()) {
                let values: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.as_str())
                    .map(str::to_string)
                    .collect();
                let unique = keep_last(&values);
                repeated += values.len() - unique.len();
                store.lists.insert(mode, unique);
            }
        }
        if repeated > 0 {
            debug!(path = %path.display(), repeated, "Repeated history values dropped");
        }

        debug!(path = %path.display(), entries = store.len(), "History loaded");
        store
    }

    /// Backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Entries of one mode, oldest first
    pub fn entries(&self, mode: SendMode) -> &[String] {
        self.lists.get(&mode).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of entries
    pub fn len(&self) -> usize {
        self.lists.values().map(Vec::len).sum()
    }

    /// Whether every list is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a sent value
    ///
    /// Returns `Ok(false)` without touching anything when `value` is blank.
    /// The trimmed value is stored; a previous occurrence is removed first.
    pub fn record(&mut self, mode: SendMode, value: &str) -> Result<bool, HistoryError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(false);
        }

        let list = self.lists.entry(mode).or_default();
        list.retain(|v| v != value);
        list.push(value.to_string());
        self.save()?;
        Ok(true)
    }

    /// Entries of the selected lists, numbered globally in mode order
    pub fn list(&self, scope: HistoryScope) -> Vec<HistoryEntry> {
        let mut index = 0;
        let mut out = Vec::new();
        for mode in SendMode::ALL {
            for value in self.entries(mode) {
                if scope.includes(mode) {
                    out.push(HistoryEntry {
                        index,
                        mode,
                        value: value.clone(),
                    });
                }
                index += 1;
            }
        }
        out
    }

    /// Remove the entry at a global index as shown by `list(HistoryScope::All)`
    pub fn remove_at(&mut self, index: usize) -> Result<HistoryEntry, HistoryError> {
        let len = self.len();
        let entry = self
            .list(HistoryScope::All)
            .into_iter()
            .nth(index)
            .ok_or(HistoryError::IndexOutOfRange { index, len })?;

        let mut offset = 0;
        for mode in SendMode::ALL {
            if mode == entry.mode {
                break;
            }
            offset += self.entries(mode).len();
        }
        if let Some(list) = self.lists.get_mut(&entry.mode) {
            list.remove(index - offset);
        }

        self.save()?;
        Ok(entry)
    }

    /// Drop duplicate values, keeping each value's most recent position;
    /// returns how many entries were removed
    pub fn dedupe(&mut self, scope: HistoryScope) -> Result<usize, HistoryError> {
        let mut removed = 0;
        for (mode, list) in self.lists.iter_mut() {
            if !scope.includes(*mode) {
                continue;
            }
            let kept = keep_last(list);
            removed += list.len() - kept.len();
            *list = kept;
        }

        if removed > 0 {
            self.save()?;
        }
        Ok(removed)
    }

    /// Empty the selected lists; returns how many entries were removed
    pub fn clear(&mut self, scope: HistoryScope) -> Result<usize, HistoryError> {
        let mut removed = 0;
        for (mode, list) in self.lists.iter_mut() {
            if scope.includes(*mode) {
                removed += list.len();
                list.clear();
            }
        }
        self.save()?;
        Ok(removed)
    }

    /// Check that the backing file can be written, without touching it
    pub fn check_writable(&self) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let dir = Self::ensure_parent(path)?;
        NamedTempFile::new_in(dir)?;
        if path.exists() {
            std::fs::OpenOptions::new().append(true).open(path)?;
        }
        Ok(())
    }

    fn ensure_parent(path: &Path) -> Result<&Path, HistoryError> {
        match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                Ok(parent)
            }
            None => Ok(Path::new(".")),
        }
    }

    /// Write the whole store: temporary file in the same directory first,
    /// then rename over the target
    fn save(&self) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let document = HistoryFile {
            text: self.entries(SendMode::Text),
            hex: self.entries(SendMode::Hex),
            hex_crc: self.entries(SendMode::HexCrc),
        };
        let content = serde_json::to_string_pretty(&document)?;

        let mut tmp = NamedTempFile::new_in(Self::ensure_parent(path)?)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// `values` without repeats, each value at its last position
fn keep_last(values: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(values.len());
    for value in values.iter().rev() {
        if !kept.contains(value) {
            kept.push(value.clone());
        }
    }
    kept.reverse();
    kept
}

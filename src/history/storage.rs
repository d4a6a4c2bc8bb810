//! File-backed history persistence.
//!
//! Entries are appended to a JSONL (JSON Lines) file: one serialized entry
//! per line. Appends are cheap, and a corrupt line only loses that one
//! record: loading skips lines that fail to parse.

use super::models::{HistoryEntry, HistoryError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// History sink writing entries to a JSONL file.
///
/// The file handle is opened per append; a mutex serializes writers sharing
/// one store value so concurrent runs cannot interleave partial lines.
pub struct FileHistoryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileHistoryStore {
    /// Creates a store appending to the given file path. Parent directories
    /// must already exist; the file itself is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry, prepared for storage (body truncation applied),
    /// and returns the persisted record's id.
    pub fn append(&self, entry: &HistoryEntry) -> Result<String, HistoryError> {
        let prepared = entry.prepare_for_storage();
        let json = serde_json::to_string(&prepared)?;

        let _guard = self.write_lock.lock().unwrap();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", json)?;
        file.flush()?;

        Ok(prepared.id)
    }

    /// Loads all entries from the backing file, oldest first.
    ///
    /// Unparseable lines are skipped rather than failing the whole load. A
    /// missing file yields an empty list.
    pub fn load(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    log::warn!("skipping corrupt history line: {}", err);
                }
            }
        }

        Ok(entries)
    }
}

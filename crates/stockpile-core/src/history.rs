//! Import history
//!
//! A JSON log of completed imports, newest last.

use crate::error::{Error, Result};
use crate::resolution::{ReconciliationStats, ResolutionMode};
use crate::workflow::ImportReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A record of one completed import
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the import finished
    pub timestamp: DateTime<Utc>,
    /// Name of the imported file
    pub file_name: String,
    pub parsed: usize,
    pub dropped_rows: usize,
    pub stats: ReconciliationStats,
    pub mode: ResolutionMode,
}

impl HistoryEntry {
    pub fn from_report(report: &ImportReport, mode: ResolutionMode) -> Self {
        Self {
            timestamp: Utc::now(),
            file_name: report.file_name.clone(),
            parsed: report.parsed,
            dropped_rows: report.dropped_rows,
            stats: report.stats,
            mode,
        }
    }
}

/// History file containing every recorded import
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImportHistory {
    pub entries: Vec<HistoryEntry>,
}

impl ImportHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load history from a file, or create empty if not exists
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn add_entry(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// Entries for imports of files with this name
    pub fn for_file<'a>(&'a self, file_name: &'a str) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        self.entries.iter().filter(move |e| e.file_name == file_name)
    }

    pub fn total_entries(&self) -> usize {
        self.entries.len()
    }

    /// Sum of counters across every recorded import
    pub fn totals(&self) -> ReconciliationStats {
        self.entries
            .iter()
            .fold(ReconciliationStats::default(), |mut acc, e| {
                acc.duplicates_found += e.stats.duplicates_found;
                acc.skipped += e.stats.skipped;
                acc.replaced += e.stats.replaced;
                acc.renamed += e.stats.renamed;
                acc.added += e.stats.added;
                acc
            })
    }
}

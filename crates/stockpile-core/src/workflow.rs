//! Import workflow: file in, reconciled record list persisted
//!
//! The workflow drives validation, parsing, duplicate detection and
//! resolution against three collaborators: a [`RecordStore`] holding the
//! existing list, a [`DecisionSource`] answering conflicts one at a time, and
//! a [`Notifier`] told about every terminal outcome.

use crate::config::ImportConfig;
use crate::detector::{batch_internal_duplicates, Conflict};
use crate::error::{Error, Result};
use crate::header::missing_columns;
use crate::parser::{parse_records, unique_with_suffix, ParseOptions, ParsedBatch};
use crate::record::Record;
use crate::resolution::{
    reconcile, Action, Decision, DuplicateHandler, ReconciliationStats, ResolutionPolicy,
};
use crate::store::RecordStore;
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;

/// An uploaded file, already read into memory
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub contents: String,
}

impl ImportFile {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            contents: contents.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Read a file from disk as text
    pub async fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::FileRead {
                path: path.to_path_buf(),
                source: e,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, contents))
    }
}

/// Answer to a single conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Resolve(Decision),
    /// Abandon the whole import; nothing is written
    Cancel,
}

/// Supplies a decision for each conflict, typically by asking a user
#[async_trait]
pub trait DecisionSource: Send {
    async fn decide(&mut self, conflict: &Conflict) -> Response;
}

/// Answers every conflict with the same action, applied to all
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub Action);

#[async_trait]
impl DecisionSource for FixedDecision {
    async fn decide(&mut self, _conflict: &Conflict) -> Response {
        Response::Resolve(Decision::all(self.0))
    }
}

/// Answers conflicts from a prepared list; cancels once it runs out
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    responses: std::collections::VecDeque<Response>,
}

impl ScriptedDecisions {
    pub fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
        }
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisions {
    async fn decide(&mut self, _conflict: &Conflict) -> Response {
        self.responses.pop_front().unwrap_or(Response::Cancel)
    }
}

/// User-visible, fire-and-forget notices
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, success: bool);
}

/// Sends notices to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, success: bool) {
        if success {
            tracing::info!("{}", message);
        } else {
            tracing::warn!("{}", message);
        }
    }
}

/// Why an import file was turned away before touching the store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("unsupported file type for '{0}', please upload a CSV file")]
    UnsupportedFileType(String),

    #[error("invalid CSV format, required columns: {} (missing: {})", .required.join(", "), .missing.join(", "))]
    MissingColumns {
        required: Vec<String>,
        missing: Vec<String>,
    },

    #[error("no valid products found in the CSV file")]
    NoRecords,
}

/// Summary of a completed import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub file_name: String,
    /// Records accepted by the parser
    pub parsed: usize,
    /// Rows dropped for a field-count mismatch
    pub dropped_rows: usize,
    pub stats: ReconciliationStats,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        if stats.duplicates_found == 0 {
            return format!("Successfully imported {} products", stats.added);
        }
        format!(
            "Import complete: {} added, {} replaced, {} skipped, {} renamed ({} duplicates found)",
            stats.added, stats.replaced, stats.skipped, stats.renamed, stats.duplicates_found
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Rejected(Rejection),
    /// The user cancelled while resolving conflicts; nothing was written
    Cancelled,
    Completed {
        report: ImportReport,
        /// The store's contents read back after the write
        records: Vec<Record>,
    },
}

/// Drives one import at a time against a store.
///
/// Imports are not serialized internally: callers must not run two imports
/// against the same store concurrently.
pub struct ImportWorkflow<S, N> {
    store: S,
    notifier: N,
    config: ImportConfig,
}

impl<S: RecordStore, N: Notifier> ImportWorkflow<S, N> {
    pub fn new(store: S, notifier: N, config: ImportConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Check the file type and headers, then parse. Touches no state.
    pub fn prepare(&self, file: &ImportFile) -> std::result::Result<ParsedBatch, Rejection> {
        if !self
            .config
            .accepts_file(&file.name, file.mime_type.as_deref())
        {
            return Err(Rejection::UnsupportedFileType(file.name.clone()));
        }

        // Text with no lines is missing every column
        let missing = missing_columns(&file.contents, &self.config);
        if !missing.is_empty() {
            return Err(Rejection::MissingColumns {
                required: self.config.required_columns.clone(),
                missing,
            });
        }

        let batch = parse_records(&file.contents, &ParseOptions::from_config(&self.config));
        if batch.is_empty() {
            return Err(Rejection::NoRecords);
        }
        Ok(batch)
    }

    /// Run a full import of `file`, asking `decisions` about each conflict.
    ///
    /// Input problems come back as [`ImportOutcome::Rejected`]. Store failures
    /// are reported to the notifier and returned as errors.
    pub async fn import<D>(&self, file: &ImportFile, decisions: &mut D) -> Result<ImportOutcome>
    where
        D: DecisionSource + ?Sized,
    {
        let batch = match self.prepare(file) {
            Ok(batch) => batch,
            Err(rejection) => {
                tracing::info!(file = %file.name, reason = %rejection, "import rejected");
                self.notifier.notify(&rejection.to_string(), false);
                return Ok(ImportOutcome::Rejected(rejection));
            }
        };
        let parsed = batch.len();
        let dropped_rows = batch.dropped_lines.len();

        let existing = self
            .store
            .read()
            .await
            .inspect_err(|e| self.report_failure(e))?;
        let incoming = rekey_synthesized(batch, &existing);

        let repeated = batch_internal_duplicates(&incoming);
        if !repeated.is_empty() {
            tracing::warn!(ids = ?repeated, "import file repeats ids within itself");
        }

        let mut handler = DuplicateHandler::new(&existing, &incoming, self.config.resolution_mode);
        let result = if handler.has_conflicts() {
            tracing::info!(
                file = %file.name,
                conflicts = handler.conflicts().len(),
                "resolving duplicate products"
            );
            while let Some(conflict) = handler.current().cloned() {
                match decisions.decide(&conflict).await {
                    Response::Cancel => {
                        tracing::info!(file = %file.name, position = conflict.position, "import cancelled");
                        return Ok(ImportOutcome::Cancelled);
                    }
                    Response::Resolve(decision) => {
                        handler.apply(decision);
                        if decision.apply_to_all {
                            break;
                        }
                        handler.advance();
                    }
                }
            }
            handler.process()
        } else {
            // Nothing collides, so this only appends the new records
            reconcile(&existing, &incoming, &ResolutionPolicy::uniform(Action::Skip))
        };

        self.store
            .replace_all(&result.records)
            .await
            .inspect_err(|e| self.report_failure(e))?;
        let refreshed = self.store.read().await.inspect_err(|e| {
            tracing::error!(error = %e, "re-reading store after import failed");
            self.notifier.notify(
                &format!(
                    "Products were imported, but the refreshed list could not be loaded: {}",
                    e
                ),
                false,
            );
        })?;

        let report = ImportReport {
            file_name: file.name.clone(),
            parsed,
            dropped_rows,
            stats: result.stats,
        };
        tracing::info!(
            file = %file.name,
            parsed,
            dropped_rows,
            added = report.stats.added,
            replaced = report.stats.replaced,
            skipped = report.stats.skipped,
            renamed = report.stats.renamed,
            "import complete"
        );
        self.notifier.notify(&report.summary(), true);

        Ok(ImportOutcome::Completed {
            report,
            records: refreshed,
        })
    }

    fn report_failure(&self, error: &Error) {
        tracing::error!(error = %error, "import failed");
        self.notifier
            .notify(&format!("Failed to import products: {}", error), false);
    }
}

/// Give synthesized ids that happen to match an existing id a fresh suffix,
/// so generated ids never show up as conflicts.
fn rekey_synthesized(batch: ParsedBatch, existing: &[Record]) -> Vec<Record> {
    let ParsedBatch {
        mut records,
        synthesized,
        ..
    } = batch;

    let existing_ids: HashSet<&str> = existing.iter().map(|r| r.id.as_str()).collect();
    let mut taken: HashSet<String> = existing
        .iter()
        .chain(records.iter())
        .map(|r| r.id.clone())
        .collect();

    for index in synthesized {
        if !existing_ids.contains(records[index].id.as_str()) {
            continue;
        }
        let id = unique_with_suffix(&records[index].id, &taken);
        tracing::debug!(from = %records[index].id, to = %id, "re-keyed synthesized id");
        taken.insert(id.clone());
        records[index].id = id;
    }
    records
}

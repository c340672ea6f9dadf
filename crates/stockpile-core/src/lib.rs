//! stockpile-core: Core library for reconciling CSV product imports
//!
//! This library provides functionality to:
//! - Validate the header line of a product CSV file
//! - Parse rows into product records, dropping malformed rows
//! - Detect incoming products whose ids collide with the existing inventory
//! - Resolve collisions by replacing, skipping or renaming, and merge the result
//! - Drive a full import against a record store, decision source and notifier

pub mod config;
pub mod detector;
pub mod error;
pub mod export;
pub mod header;
pub mod history;
pub mod logging;
pub mod parser;
pub mod record;
pub mod resolution;
pub mod scanner;
pub mod store;
pub mod workflow;

pub use config::ImportConfig;
pub use detector::{batch_internal_duplicates, find_duplicates, Conflict};
pub use error::{Error, Result};
pub use export::{export_records, write_csv, ExportFormat};
pub use header::{missing_columns, validate_headers};
pub use history::{HistoryEntry, ImportHistory};
pub use parser::{parse_file, parse_records, ParseOptions, ParsedBatch};
pub use record::Record;
pub use resolution::{
    reconcile, Action, Decision, DuplicateHandler, Phase, Reconciliation, ReconciliationStats,
    ResolutionMode, ResolutionPolicy,
};
pub use scanner::discover_import_files;
pub use store::{JsonFileStore, MemoryStore, RecordStore};
pub use workflow::{
    DecisionSource, FixedDecision, ImportFile, ImportOutcome, ImportReport, ImportWorkflow,
    Notifier, Rejection, Response, ScriptedDecisions, TracingNotifier,
};

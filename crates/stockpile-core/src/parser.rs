//! CSV parser for product import files
//!
//! Parsing is lenient: a data row is accepted only when its field count
//! matches the header count, and every other row is dropped without error.
//! Fields are split on the delimiter alone; quoting is not supported.

use crate::config::ImportConfig;
use crate::record::{coerce_price, coerce_stock, Record};
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;

/// Settings for a single parse
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub delimiter: u8,
    /// Prefix for synthesized ids
    pub id_prefix: String,
    /// Millisecond timestamp embedded in synthesized ids
    pub timestamp_millis: i64,
}

impl ParseOptions {
    /// Options from a config, stamped with the current time
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            delimiter: config.delimiter_byte(),
            id_prefix: config.id_prefix.clone(),
            timestamp_millis: Utc::now().timestamp_millis(),
        }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::from_config(&ImportConfig::default())
    }
}

/// Records parsed from one import file
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    /// Accepted records, in input order
    pub records: Vec<Record>,
    /// Indices into `records` whose id was synthesized
    pub synthesized: Vec<usize>,
    /// 1-based line numbers of rows dropped for a field-count mismatch
    pub dropped_lines: Vec<u64>,
}

impl ParsedBatch {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Parse import text into records.
///
/// The first line is the header line and is assumed to be validated already.
pub fn parse_records(text: &str, options: &ParseOptions) -> ParsedBatch {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(csv::Trim::All)
        .delimiter(options.delimiter)
        .from_reader(text.as_bytes());

    let header_count = match csv_reader.headers() {
        Ok(headers) => headers.len(),
        Err(_) => return ParsedBatch::default(),
    };

    let mut batch = ParsedBatch::default();
    // (index into records, 0-based line index) for rows lacking an id
    let mut pending_ids: Vec<(usize, u64)> = Vec::new();

    for result in csv_reader.records() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable row");
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0);

        if row.len() != header_count {
            tracing::debug!(
                line,
                fields = row.len(),
                expected = header_count,
                "dropping row with mismatched field count"
            );
            batch.dropped_lines.push(line);
            continue;
        }

        let field = |i: usize| row.get(i).unwrap_or_default().to_string();
        let id = field(0);
        if id.is_empty() {
            pending_ids.push((batch.records.len(), line.saturating_sub(1)));
        }

        batch.records.push(Record {
            id,
            name: field(1),
            price: coerce_price(row.get(2).unwrap_or_default()),
            category: field(3),
            stock: coerce_stock(row.get(4).unwrap_or_default()),
            description: field(5),
        });
    }

    synthesize_ids(&mut batch, pending_ids, options);
    batch
}

/// Parse an import file from disk
pub fn parse_file<P: AsRef<Path>>(path: P, options: &ParseOptions) -> crate::Result<ParsedBatch> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| crate::Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_records(&text, options))
}

/// Fill in `PREFIX-<timestamp>-<line index>` ids, suffixed when they would
/// collide with an id already in the batch.
fn synthesize_ids(batch: &mut ParsedBatch, pending: Vec<(usize, u64)>, options: &ParseOptions) {
    let mut taken: HashSet<String> = batch
        .records
        .iter()
        .filter(|r| !r.id.is_empty())
        .map(|r| r.id.clone())
        .collect();

    for (index, line_index) in pending {
        let base = format!(
            "{}-{}-{}",
            options.id_prefix, options.timestamp_millis, line_index
        );
        let id = unique_with_suffix(&base, &taken);
        taken.insert(id.clone());
        batch.records[index].id = id;
        batch.synthesized.push(index);
    }
}

pub(crate) fn unique_with_suffix(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (1..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

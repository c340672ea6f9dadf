//! Duplicate detection between an incoming batch and the existing record set

use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// An incoming record whose id is already taken by an existing record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub incoming: Record,
    pub existing: Record,
    /// Index of `incoming` within its batch (0-based)
    pub batch_index: usize,
    /// Position among all detected conflicts (1-based, for progress display)
    pub position: usize,
    /// Total number of detected conflicts
    pub total: usize,
}

/// Find every incoming record whose id collides with an existing id.
///
/// Conflicts come back in batch order. Ids repeated inside the batch are not
/// conflicts unless they also collide with an existing record.
pub fn find_duplicates(existing: &[Record], incoming: &[Record]) -> Vec<Conflict> {
    let existing_by_id: HashMap<&str, &Record> =
        existing.iter().map(|r| (r.id.as_str(), r)).collect();

    let hits: Vec<(usize, &Record, &Record)> = incoming
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            existing_by_id
                .get(record.id.as_str())
                .map(|found| (index, record, *found))
        })
        .collect();

    let total = hits.len();
    hits.into_iter()
        .enumerate()
        .map(|(i, (batch_index, incoming, existing))| Conflict {
            incoming: incoming.clone(),
            existing: existing.clone(),
            batch_index,
            position: i + 1,
            total,
        })
        .collect()
}

/// Ids that appear more than once inside a single batch, sorted
pub fn batch_internal_duplicates(batch: &[Record]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut repeated: BTreeSet<String> = BTreeSet::new();
    for record in batch {
        if !seen.insert(record.id.as_str()) {
            repeated.insert(record.id.clone());
        }
    }
    repeated.into_iter().collect()
}

//! Conflict resolution and batch merge
//!
//! [`reconcile`] is the pure merge: existing records, an incoming batch and a
//! [`ResolutionPolicy`] in, the merged set and its counters out.
//! [`DuplicateHandler`] wraps it for callers that collect decisions one
//! conflict at a time.
//!
//! How recorded decisions become a policy depends on [`ResolutionMode`]:
//!
//! - `Uniform`: the last action set governs every conflict at commit time,
//!   even when earlier conflicts were given different actions.
//! - `PerConflict`: each conflict keeps the action chosen for it; the last
//!   action only covers conflicts never individually decided, which happens
//!   once "apply to all" is chosen.

use crate::detector::{find_duplicates, Conflict};
use crate::error::Error;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// How a conflicting incoming record is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Overwrite the existing record with the incoming one
    Replace,
    /// Drop the incoming record
    Skip,
    /// Keep both, giving the incoming record a fresh id like `P1(1)`
    Rename,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Replace, Action::Skip, Action::Rename];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Replace => "replace",
            Action::Skip => "skip",
            Action::Rename => "rename",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(Action::Replace),
            "skip" => Ok(Action::Skip),
            "rename" => Ok(Action::Rename),
            _ => Err(Error::InvalidAction(s.to_string())),
        }
    }
}

/// A user's answer to one conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// Use `action` for this and every remaining conflict
    pub apply_to_all: bool,
}

impl Decision {
    pub fn new(action: Action, apply_to_all: bool) -> Self {
        Self {
            action,
            apply_to_all,
        }
    }

    pub fn once(action: Action) -> Self {
        Self::new(action, false)
    }

    pub fn all(action: Action) -> Self {
        Self::new(action, true)
    }
}

/// How per-conflict decisions are turned into the committed policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    #[default]
    Uniform,
    PerConflict,
}

/// Immutable resolution policy consumed by [`reconcile`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPolicy {
    fallback: Action,
    /// Batch index -> action
    overrides: BTreeMap<usize, Action>,
}

impl ResolutionPolicy {
    /// One action for every conflict
    pub fn uniform(action: Action) -> Self {
        Self {
            fallback: action,
            overrides: BTreeMap::new(),
        }
    }

    /// Use `action` for the incoming record at `batch_index`
    pub fn with_decision(mut self, batch_index: usize, action: Action) -> Self {
        self.overrides.insert(batch_index, action);
        self
    }

    pub fn action_for(&self, batch_index: usize) -> Action {
        self.overrides
            .get(&batch_index)
            .copied()
            .unwrap_or(self.fallback)
    }
}

/// Counters describing a merge.
///
/// `duplicates_found == skipped + replaced + renamed` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationStats {
    pub duplicates_found: usize,
    pub skipped: usize,
    pub replaced: usize,
    pub renamed: usize,
    /// Incoming records with no conflict, appended as-is
    pub added: usize,
}

impl ReconciliationStats {
    pub fn is_consistent(&self) -> bool {
        self.duplicates_found == self.skipped + self.replaced + self.renamed
    }
}

/// The merged record set to persist, plus counters
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub records: Vec<Record>,
    pub stats: ReconciliationStats,
}

/// Merge `incoming` into `existing` under `policy`.
///
/// The result lists the existing records first (replaced in place where the
/// policy says so), then non-conflicting and renamed incoming records in batch
/// order. Neither input is modified.
pub fn reconcile(existing: &[Record], incoming: &[Record], policy: &ResolutionPolicy) -> Reconciliation {
    let mut final_set: Vec<Record> = existing.to_vec();
    let position_by_id: HashMap<String, usize> = final_set
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), i))
        .collect();

    // Renamed ids must avoid every id already in play
    let mut taken: HashSet<String> = existing
        .iter()
        .chain(incoming.iter())
        .map(|r| r.id.clone())
        .collect();

    let mut additions: Vec<Record> = Vec::new();
    let mut stats = ReconciliationStats::default();

    for (index, record) in incoming.iter().enumerate() {
        let Some(&position) = position_by_id.get(&record.id) else {
            stats.added += 1;
            additions.push(record.clone());
            continue;
        };

        stats.duplicates_found += 1;
        match policy.action_for(index) {
            Action::Skip => stats.skipped += 1,
            Action::Replace => {
                stats.replaced += 1;
                final_set[position] = record.clone();
            }
            Action::Rename => {
                stats.renamed += 1;
                let id = renamed_id(&record.id, &taken);
                taken.insert(id.clone());
                additions.push(Record {
                    id,
                    ..record.clone()
                });
            }
        }
    }

    final_set.extend(additions);
    Reconciliation {
        records: final_set,
        stats,
    }
}

/// First of `id(1)`, `id(2)`, ... not in `taken`
fn renamed_id(id: &str, taken: &HashSet<String>) -> String {
    let mut n = 1u64;
    loop {
        let candidate = format!("{}({})", id, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Lifecycle of a [`DuplicateHandler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No decision recorded yet
    Idle,
    /// Decisions are being collected
    AwaitingDecision,
    /// The merge is running
    Applying,
    /// The merge has produced its result
    Done,
}

/// Collects decisions for one (existing set, incoming batch) pair and
/// produces the merged result.
///
/// Created fresh for each import and dropped after `process`.
#[derive(Debug)]
pub struct DuplicateHandler<'a> {
    existing: &'a [Record],
    incoming: &'a [Record],
    conflicts: Vec<Conflict>,
    mode: ResolutionMode,
    cursor: usize,
    action: Action,
    apply_to_all: bool,
    decisions: BTreeMap<usize, Action>,
    phase: Phase,
}

impl<'a> DuplicateHandler<'a> {
    pub fn new(existing: &'a [Record], incoming: &'a [Record], mode: ResolutionMode) -> Self {
        Self {
            existing,
            incoming,
            conflicts: find_duplicates(existing, incoming),
            mode,
            cursor: 0,
            action: Action::Skip,
            apply_to_all: false,
            decisions: BTreeMap::new(),
            phase: Phase::Idle,
        }
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> ResolutionMode {
        self.mode
    }

    /// The conflict awaiting a decision, if any remain.
    ///
    /// Returns `None` once every conflict was walked or "apply to all" was set.
    pub fn current(&self) -> Option<&Conflict> {
        if self.apply_to_all {
            return None;
        }
        self.conflicts.get(self.cursor)
    }

    /// Record the action for the current conflict.
    ///
    /// Calling again before [`advance`](Self::advance) overwrites the choice.
    ///
    /// # Panics
    /// If called after [`process`](Self::process).
    pub fn set_action(&mut self, action: Action, apply_to_all: bool) {
        assert!(
            self.phase != Phase::Done,
            "resolution decision recorded after the merge was processed"
        );

        if let Some(conflict) = self.conflicts.get(self.cursor) {
            self.decisions.insert(conflict.batch_index, action);
        }
        self.action = action;
        self.apply_to_all = apply_to_all;
        self.phase = Phase::AwaitingDecision;
    }

    pub fn apply(&mut self, decision: Decision) {
        self.set_action(decision.action, decision.apply_to_all);
    }

    /// Move to the next conflict. Returns whether one still needs a decision.
    pub fn advance(&mut self) -> bool {
        if self.cursor < self.conflicts.len() {
            self.cursor += 1;
        }
        self.current().is_some()
    }

    /// The policy the recorded decisions amount to under this handler's mode
    pub fn policy(&self) -> ResolutionPolicy {
        match self.mode {
            ResolutionMode::Uniform => ResolutionPolicy::uniform(self.action),
            ResolutionMode::PerConflict => self
                .decisions
                .iter()
                .fold(ResolutionPolicy::uniform(self.action), |policy, (&index, &action)| {
                    policy.with_decision(index, action)
                }),
        }
    }

    /// Run the merge with the decisions recorded so far
    pub fn process(&mut self) -> Reconciliation {
        self.phase = Phase::Applying;
        let policy = self.policy();
        tracing::debug!(
            conflicts = self.conflicts.len(),
            mode = ?self.mode,
            fallback = %self.action,
            "applying resolution policy"
        );

        let result = reconcile(self.existing, self.incoming, &policy);
        self.phase = Phase::Done;
        result
    }
}

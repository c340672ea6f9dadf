use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use stockpile_core::{
    Action, Conflict, Decision, DecisionSource, Error, FixedDecision, ImportConfig, ImportFile,
    ImportOutcome, ImportWorkflow, JsonFileStore, MemoryStore, Notifier, Record, RecordStore,
    Rejection, ResolutionMode, Response, ScriptedDecisions,
};

const HEADER: &str =
    "product_id,product_name,product_price,product_category,product_stock,product_description";

#[derive(Default, Clone)]
struct Notes(Arc<Mutex<Vec<(String, bool)>>>);

impl Notes {
    fn all(&self) -> Vec<(String, bool)> {
        self.0.lock().unwrap().clone()
    }
}

impl Notifier for Notes {
    fn notify(&self, message: &str, success: bool) {
        self.0.lock().unwrap().push((message.to_string(), success));
    }
}

/// Records every conflict it is shown before answering
struct Watching {
    seen: Vec<(String, usize, usize)>,
    answers: Vec<Response>,
}

#[async_trait]
impl DecisionSource for Watching {
    async fn decide(&mut self, conflict: &Conflict) -> Response {
        self.seen
            .push((conflict.incoming.id.clone(), conflict.position, conflict.total));
        if self.answers.is_empty() {
            Response::Cancel
        } else {
            self.answers.remove(0)
        }
    }
}

/// Store whose writes always fail
struct BrokenWrites {
    inner: MemoryStore,
    writes: AtomicUsize,
}

#[async_trait]
impl RecordStore for BrokenWrites {
    async fn read(&self) -> stockpile_core::Result<Vec<Record>> {
        self.inner.read().await
    }

    async fn replace_all(&self, _records: &[Record]) -> stockpile_core::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(Error::Store("database unavailable".to_string()))
    }
}

/// Store that accepts writes but fails every read after the first
struct UnreadableAfterWrite {
    inner: MemoryStore,
    reads: AtomicUsize,
}

#[async_trait]
impl RecordStore for UnreadableAfterWrite {
    async fn read(&self) -> stockpile_core::Result<Vec<Record>> {
        if self.reads.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(Error::Store("connection reset".to_string()));
        }
        self.inner.read().await
    }

    async fn replace_all(&self, records: &[Record]) -> stockpile_core::Result<()> {
        self.inner.replace_all(records).await
    }
}

fn csv(rows: &[&str]) -> ImportFile {
    let mut text = HEADER.to_string();
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    ImportFile::new("products.csv", text)
}

fn existing() -> Vec<Record> {
    vec![Record::new("P1", "Original")
        .with_price(10.0)
        .with_category("Football")
        .with_stock(4)]
}

fn scenario_file() -> ImportFile {
    csv(&["P1,X,12,Football,1,new", "P2,Y,3,Tennis,9,"])
}

async fn run(
    action: Action,
) -> (ImportOutcome, Vec<(String, bool)>) {
    let notes = Notes::default();
    let workflow = ImportWorkflow::new(
        MemoryStore::new(existing()),
        notes.clone(),
        ImportConfig::default(),
    );
    let outcome = workflow
        .import(&scenario_file(), &mut FixedDecision(action))
        .await
        .unwrap();
    (outcome, notes.all())
}

fn completed(outcome: ImportOutcome) -> (stockpile_core::ImportReport, Vec<Record>) {
    match outcome {
        ImportOutcome::Completed { report, records } => (report, records),
        other => panic!("expected a completed import, got {:?}", other),
    }
}

#[tokio::test]
async fn replace_all_overwrites_the_existing_product() {
    let (outcome, notes) = run(Action::Replace).await;
    let (report, records) = completed(outcome);

    let summary: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.id.as_str(), r.name.as_str()))
        .collect();
    assert_eq!(summary, vec![("P1", "X"), ("P2", "Y")]);
    assert_eq!(report.stats.duplicates_found, 1);
    assert_eq!(report.stats.replaced, 1);
    assert_eq!(report.stats.skipped, 0);
    assert_eq!(report.stats.renamed, 0);
    assert_eq!(notes.len(), 1);
    assert!(notes[0].1);
}

#[tokio::test]
async fn skip_all_keeps_the_existing_product() {
    let (outcome, _) = run(Action::Skip).await;
    let (report, records) = completed(outcome);

    assert_eq!(records.len(), 2);
    assert_eq!(records[0], existing()[0]);
    assert_eq!(records[1].id, "P2");
    assert!(!records.iter().any(|r| r.name == "X"));
    assert_eq!(report.stats.skipped, 1);
}

#[tokio::test]
async fn rename_all_keeps_both_products() {
    let (outcome, _) = run(Action::Rename).await;
    let (report, records) = completed(outcome);

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["P1", "P1(1)", "P2"]);
    assert_eq!(records[0], existing()[0]);
    assert_eq!(records[1].name, "X");
    assert_eq!(records[2].name, "Y");
    assert_eq!(report.stats.renamed, 1);

    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), ids.len());
}

#[tokio::test]
async fn conflicts_are_presented_one_at_a_time_with_progress() {
    let existing = vec![Record::new("A", "a"), Record::new("B", "b"), Record::new("C", "c")];
    let workflow = ImportWorkflow::new(
        MemoryStore::new(existing),
        Notes::default(),
        ImportConfig::default(),
    );
    let mut decisions = Watching {
        seen: Vec::new(),
        answers: vec![
            Response::Resolve(Decision::once(Action::Skip)),
            Response::Resolve(Decision::all(Action::Replace)),
        ],
    };

    let file = csv(&["A,a2,1,c,1,d", "N,n,1,c,1,d", "B,b2,1,c,1,d", "C,c2,1,c,1,d"]);
    let outcome = workflow.import(&file, &mut decisions).await.unwrap();

    // "apply to all" on the second conflict ends the questions
    assert_eq!(
        decisions.seen,
        vec![("A".to_string(), 1, 3), ("B".to_string(), 2, 3)]
    );

    // Uniform mode: the last action governs every conflict
    let (report, records) = completed(outcome);
    assert_eq!(report.stats.replaced, 3);
    assert_eq!(records[0].name, "a2");
}

#[tokio::test]
async fn per_conflict_mode_keeps_individual_answers() {
    let existing = vec![Record::new("A", "a"), Record::new("B", "b")];
    let config = ImportConfig {
        resolution_mode: ResolutionMode::PerConflict,
        ..ImportConfig::default()
    };
    let workflow = ImportWorkflow::new(MemoryStore::new(existing), Notes::default(), config);
    let mut decisions = ScriptedDecisions::new([
        Response::Resolve(Decision::once(Action::Rename)),
        Response::Resolve(Decision::once(Action::Skip)),
    ]);

    let file = csv(&["A,a2,1,c,1,d", "B,b2,1,c,1,d"]);
    let (report, records) = completed(workflow.import(&file, &mut decisions).await.unwrap());

    assert_eq!(report.stats.renamed, 1);
    assert_eq!(report.stats.skipped, 1);
    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B", "A(1)"]);
}

#[tokio::test]
async fn cancelling_mid_way_writes_nothing() {
    let store = Arc::new(MemoryStore::new(existing()));
    let workflow = ImportWorkflow::new(store.clone(), Notes::default(), ImportConfig::default());
    let mut decisions = Watching {
        seen: Vec::new(),
        answers: vec![Response::Resolve(Decision::once(Action::Replace)), Response::Cancel],
    };

    let file = csv(&["P1,X,1,c,1,d", "P1,Z,1,c,1,d"]);
    let outcome = workflow.import(&file, &mut decisions).await.unwrap();

    assert_eq!(outcome, ImportOutcome::Cancelled);
    assert_eq!(decisions.seen.len(), 2);
    assert_eq!(store.snapshot().await, existing());
}

#[tokio::test]
async fn failed_write_notifies_and_keeps_prior_state() {
    let notes = Notes::default();
    let store = Arc::new(BrokenWrites {
        inner: MemoryStore::new(existing()),
        writes: AtomicUsize::new(0),
    });
    let workflow = ImportWorkflow::new(store.clone(), notes.clone(), ImportConfig::default());

    let result = workflow
        .import(&scenario_file(), &mut FixedDecision(Action::Replace))
        .await;

    assert!(matches!(result, Err(Error::Store(_))));
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner.snapshot().await, existing());

    let notes = notes.all();
    assert_eq!(notes.len(), 1);
    assert!(!notes[0].1);
    assert!(notes[0].0.contains("database unavailable"));
}

#[tokio::test]
async fn failed_refresh_after_write_does_not_claim_the_import_failed() {
    let notes = Notes::default();
    let store = Arc::new(UnreadableAfterWrite {
        inner: MemoryStore::new(existing()),
        reads: AtomicUsize::new(0),
    });
    let workflow = ImportWorkflow::new(store.clone(), notes.clone(), ImportConfig::default());

    let result = workflow
        .import(&scenario_file(), &mut FixedDecision(Action::Replace))
        .await;

    assert!(matches!(result, Err(Error::Store(_))));
    assert_eq!(store.reads.load(Ordering::SeqCst), 2);

    // The merged set was committed
    let saved = store.inner.snapshot().await;
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0].name, "X");

    let notes = notes.all();
    assert_eq!(notes.len(), 1);
    assert!(!notes[0].1);
    assert!(notes[0].0.contains("were imported"));
    assert!(notes[0].0.contains("connection reset"));
    assert!(!notes[0].0.contains("Failed to import"));
}

#[tokio::test]
async fn header_failure_is_rejected_before_reading_the_store() {
    let notes = Notes::default();
    let workflow = ImportWorkflow::new(
        MemoryStore::new(existing()),
        notes.clone(),
        ImportConfig::default(),
    );
    let file = ImportFile::new(
        "products.csv",
        "product_id,product_name,product_category,product_stock,product_description\nP9,a,c,1,d",
    );

    let outcome = workflow
        .import(&file, &mut FixedDecision(Action::Replace))
        .await
        .unwrap();

    match outcome {
        ImportOutcome::Rejected(Rejection::MissingColumns { missing, .. }) => {
            assert_eq!(missing, vec!["product_price".to_string()]);
        }
        other => panic!("expected a header rejection, got {:?}", other),
    }
    let notes = notes.all();
    assert!(notes[0].0.contains("product_price"));
    assert!(!notes[0].1);
}

#[tokio::test]
async fn mime_type_allows_files_without_csv_extension() {
    let workflow = ImportWorkflow::new(
        MemoryStore::default(),
        Notes::default(),
        ImportConfig::default(),
    );
    let file = ImportFile::new("upload", format!("{}\nP1,a,1,c,1,d", HEADER)).with_mime_type("text/csv");

    let (report, _) = completed(
        workflow
            .import(&file, &mut FixedDecision(Action::Skip))
            .await
            .unwrap(),
    );
    assert_eq!(report.stats.added, 1);
}

#[tokio::test]
async fn json_store_persists_and_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.json");
    let store = JsonFileStore::new(&path);
    store.replace_all(&existing()).await.unwrap();

    let workflow = ImportWorkflow::new(store, Notes::default(), ImportConfig::default());
    let (report, records) = completed(
        workflow
            .import(&scenario_file(), &mut FixedDecision(Action::Rename))
            .await
            .unwrap(),
    );

    assert_eq!(report.parsed, 2);
    let on_disk = JsonFileStore::new(&path).read().await.unwrap();
    assert_eq!(on_disk, records);
    assert_eq!(on_disk.len(), 3);
}

#[tokio::test]
async fn dropped_rows_are_counted_but_not_fatal() {
    let workflow = ImportWorkflow::new(
        MemoryStore::default(),
        Notes::default(),
        ImportConfig::default(),
    );
    let file = csv(&["P1,a,1,c,1,d", "P2,b,1", ",c,oops,c,many,d"]);

    let (report, records) = completed(
        workflow
            .import(&file, &mut FixedDecision(Action::Skip))
            .await
            .unwrap(),
    );

    assert_eq!(report.parsed, 2);
    assert_eq!(report.dropped_rows, 1);
    assert!(records[1].id.starts_with("PROD-"));
    assert_eq!(records[1].price, 0.0);
    assert_eq!(records[1].stock, 0);
}

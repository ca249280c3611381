use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::Mutex;

use assert_matches::assert_matches;
use zip::write::SimpleFileOptions;

use kira_tox21::catalog::Catalog;
use kira_tox21::domain::{AssayId, Label, OnError};
use kira_tox21::error::KiraError;
use kira_tox21::pipeline::{
    CancelToken, NoopSink, Pipeline, ProgressEvent, ProgressSink, RunOptions, Stage, run,
};
use kira_tox21::tripod::AssayClient;

const AGONIST: &str = "tox21-ar-bla-agonist-p1";
const ANTAGONIST: &str = "tox21-ar-bla-antagonist-p1";
const OTHER: &str = "tox21-ahr-p1";

fn archive(body: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("results.aggregrated.txt", options).unwrap();
    writer.write_all(body.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

#[derive(Default)]
struct MockTripod {
    archives: HashMap<String, Vec<u8>>,
    unreachable: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockTripod {
    fn with(mut self, assay: &str, body: &str) -> Self {
        self.archives.insert(assay.to_string(), archive(body));
        self
    }

    fn with_raw(mut self, assay: &str, bytes: &[u8]) -> Self {
        self.archives.insert(assay.to_string(), bytes.to_vec());
        self
    }

    fn unreachable(mut self, assay: &str) -> Self {
        self.unreachable.push(assay.to_string());
        self
    }
}

impl AssayClient for MockTripod {
    fn fetch(&self, assay: &AssayId) -> Result<Vec<u8>, KiraError> {
        self.calls.lock().unwrap().push(assay.to_string());
        if self.unreachable.iter().any(|id| id == assay.as_str()) {
            return Err(KiraError::TripodHttp("connection refused".to_string()));
        }
        self.archives
            .get(assay.as_str())
            .cloned()
            .ok_or_else(|| KiraError::TripodStatus {
                status: 404,
                message: "not found".to_string(),
            })
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn scenario_client() -> MockTripod {
    MockTripod::default()
        .with(
            AGONIST,
            "SMILES\tASSAY_OUTCOME\nc1\tactive agonist\nc2\tinactive\n",
        )
        .with(
            ANTAGONIST,
            "SMILES\tASSAY_OUTCOME\nc1\tactive antagonist\nc3\t\n",
        )
}

#[test]
fn run_fuses_catalog_in_order() {
    let catalog = Catalog::subset(&[ANTAGONIST, AGONIST]).unwrap();
    let fused = run(scenario_client(), &catalog).unwrap();

    assert_eq!(fused.columns(), &["ar-bla-agonist-p1", "ar-bla-antagonist-p1"]);
    assert_eq!(fused.get("c1", "ar-bla-agonist-p1"), Some(Label::Active));
    assert_eq!(fused.get("c1", "ar-bla-antagonist-p1"), Some(Label::Active));
    assert_eq!(fused.get("c2", "ar-bla-antagonist-p1"), Some(Label::Missing));
    assert_eq!(fused.get("c3", "ar-bla-agonist-p1"), Some(Label::Missing));
    assert_eq!(fused.get("c3", "ar-bla-antagonist-p1"), Some(Label::Missing));
}

#[test]
fn progress_counts_reach_total() {
    let catalog = Catalog::subset(&[AGONIST, ANTAGONIST]).unwrap();
    let pipeline = Pipeline::new(scenario_client(), RunOptions::default());
    let sink = RecordingSink::default();
    let report = pipeline.run(&catalog, &sink, &CancelToken::new()).unwrap();

    let events = sink.events.lock().unwrap();
    let folds = events
        .iter()
        .filter(|event| event.stage == Stage::Fold)
        .map(|event| (event.processed, event.total))
        .collect::<Vec<_>>();
    assert_eq!(folds, vec![(1, 2), (2, 2)]);
    assert_eq!(events.last().unwrap().stage, Stage::Finish);

    assert_eq!(report.summary.compounds, 3);
    assert_eq!(report.summary.assays, 2);
    assert_eq!(report.summary.columns[0].labels.active, 1);
    assert_eq!(report.summary.columns[0].labels.inactive, 1);
    assert_eq!(report.summary.columns[1].labels.missing, 1);
    assert!(report.summary.substituted.is_empty());
}

#[test]
fn retrieval_failure_aborts_with_assay_context() {
    let catalog = Catalog::subset(&[AGONIST, ANTAGONIST]).unwrap();
    let client = scenario_client().unreachable(ANTAGONIST);
    let err = run(client, &catalog).unwrap_err();

    assert_matches!(&err, KiraError::Assay { assay, .. } if assay == ANTAGONIST);
    assert_matches!(err.root(), KiraError::TripodHttp(_));
    assert!(err.is_retryable());
}

#[test]
fn format_failure_can_be_substituted() {
    let catalog = Catalog::subset(&[OTHER, AGONIST]).unwrap();
    let client = scenario_client().with_raw(OTHER, b"not a zip");
    let pipeline = Pipeline::new(
        client,
        RunOptions {
            on_error: OnError::Substitute,
        },
    );
    let report = pipeline
        .run(&catalog, &NoopSink, &CancelToken::new())
        .unwrap();

    let table = report.table;
    assert_eq!(table.columns(), &["ahr-p1", "ar-bla-agonist-p1"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.get("c1", "ahr-p1"), Some(Label::Missing));
    assert_eq!(table.get("c2", "ahr-p1"), Some(Label::Missing));
    assert_eq!(report.summary.substituted.len(), 1);
    assert_eq!(report.summary.substituted[0].as_str(), OTHER);
    assert!(report.summary.columns[0].substituted);
}

#[test]
fn format_failure_aborts_by_default() {
    let catalog = Catalog::subset(&[OTHER]).unwrap();
    let client = MockTripod::default().with(OTHER, "SMILES\tCURVE_RANK\nc1\t1.0\n");
    let err = run(client, &catalog).unwrap_err();
    assert_matches!(err.root(), KiraError::ArchiveFormat(_));
}

#[test]
fn cancellation_is_checked_before_each_assay() {
    let catalog = Catalog::subset(&[AGONIST, ANTAGONIST]).unwrap();
    let pipeline = Pipeline::new(scenario_client(), RunOptions::default());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = pipeline.run(&catalog, &NoopSink, &cancel).unwrap_err();
    assert_matches!(err, KiraError::Cancelled);
    assert!(pipeline.client().calls.lock().unwrap().is_empty());
}

#[test]
fn empty_catalog_yields_empty_table() {
    let catalog = Catalog::subset::<&str>(&[]).unwrap();
    let fused = run(MockTripod::default(), &catalog).unwrap();
    assert!(fused.is_empty());
    assert!(fused.columns().is_empty());
}

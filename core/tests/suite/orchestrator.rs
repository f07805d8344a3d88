#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use defsync_client::TransportError;
use defsync_core::BlobStore;
use defsync_core::CanonicalBlob;
use defsync_core::Config;
use defsync_core::Coordinates;
use defsync_core::DryRunRow;
use defsync_core::InMemoryDocumentStore;
use defsync_core::Orchestrator;
use defsync_core::RawSettings;
use defsync_core::RecomputeService;
use defsync_core::Record;
use defsync_core::RunState;
use defsync_core::dry_run;
use defsync_core::results::ResultsFile;
use defsync_core::stats::StatsBucket;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// Blobs keyed by coordinate name; anything else is a miss.
#[derive(Default)]
struct FakeBlobs {
    declared: HashMap<String, Value>,
}

impl FakeBlobs {
    fn with(mut self, name: &str, declared: &str) -> Self {
        self.declared.insert(name.to_string(), json!(declared));
        self
    }
}

#[async_trait]
impl BlobStore for FakeBlobs {
    async fn fetch(&self, coordinates: &Coordinates) -> CanonicalBlob {
        match self.declared.get(&coordinates.name) {
            Some(declared) => CanonicalBlob {
                declared: Some(declared.clone()),
                meta: json!({ "updated": "2024-06-01T00:00:00Z" }),
            },
            None => CanonicalBlob::empty(),
        }
    }
}

/// Misses every blob, and reads the results file right before selected
/// fetches to capture what the last checkpoint wrote.
struct CheckpointObserver {
    output: PathBuf,
    label: String,
    fetches: Mutex<u64>,
    observed: Mutex<Vec<(u64, u64)>>,
}

impl CheckpointObserver {
    fn new(output: &Path, label: &str) -> Self {
        Self {
            output: output.to_path_buf(),
            label: label.to_string(),
            fetches: Mutex::new(0),
            observed: Mutex::new(Vec::new()),
        }
    }

    fn observed(&self) -> Vec<(u64, u64)> {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStore for CheckpointObserver {
    async fn fetch(&self, _coordinates: &Coordinates) -> CanonicalBlob {
        let fetch = {
            let mut fetches = self.fetches.lock().unwrap();
            *fetches += 1;
            *fetches
        };
        if fetch > 100 && fetch % 50 == 1 {
            let on_disk = stats_on_disk(&self.output, &self.label).sample_total;
            self.observed.lock().unwrap().push((fetch, on_disk));
        }
        CanonicalBlob::empty()
    }
}

#[derive(Default)]
struct RecordingRecompute {
    batches: Mutex<Vec<Vec<String>>>,
}

impl RecordingRecompute {
    fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecomputeService for RecordingRecompute {
    async fn recompute_batch(&self, coordinates: &[String]) -> Result<(), TransportError> {
        self.batches.lock().unwrap().push(coordinates.to_vec());
        Ok(())
    }

    async fn recompute_one(&self, coordinate: &str) -> Result<(), TransportError> {
        self.batches.lock().unwrap().push(vec![coordinate.to_string()]);
        Ok(())
    }
}

fn record(name: &str, updated: &str) -> Record {
    Record::new(
        format!("npm/npmjs/-/{name}/1.0.0"),
        Coordinates::new("npm", "npmjs", None, name, "1.0.0"),
    )
    .with_updated(updated)
}

fn march_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| record(&format!("pkg-{i:03}"), "2024-03-05T12:00:00Z"))
        .collect()
}

fn settings(dir: &TempDir) -> RawSettings {
    RawSettings {
        connection_string: Some("mongodb://localhost:27017".to_string()),
        blob_base_url: Some("https://blobs.example.com".to_string()),
        service_url: Some("https://api.example.com".to_string()),
        output_file: Some(dir.path().join("results.json")),
        database: Some("db".to_string()),
        collection: Some("defs".to_string()),
        ..Default::default()
    }
}

fn march(dir: &TempDir) -> RawSettings {
    RawSettings {
        start_date: Some("2024-03-01".to_string()),
        end_date: Some("2024-03-31".to_string()),
        ..settings(dir)
    }
}

fn stats_on_disk(path: &Path, label: &str) -> StatsBucket {
    ResultsFile::new(path).load().unwrap()[label].stats.clone()
}

#[tokio::test]
async fn three_of_ten_drifted() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(march(&dir)).unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(10));
    let blobs = FakeBlobs::default()
        .with("pkg-001", "MIT")
        .with("pkg-004", "MIT")
        .with("pkg-007", "Apache-2.0");

    let report = Orchestrator::new(&config, &store, &blobs, None)
        .run()
        .await
        .unwrap();

    let expected = StatsBucket {
        sample_total: 10,
        sample_invalid: 3,
        percent_invalid: "30.0%".to_string(),
        total_documents: 10,
        total_estimated_invalid: 3,
        sample_percent_of_total: "100.0%".to_string(),
    };
    assert_eq!(report.ranges.len(), 1);
    assert_eq!(report.ranges[0].label, "2024-03-01_2024-03-31");
    assert_eq!(report.ranges[0].stats, expected);
    assert_eq!(report.repaired, 0);
    assert_eq!(
        stats_on_disk(&config.output_file, "2024-03-01_2024-03-31"),
        expected
    );
}

#[tokio::test]
async fn repair_updates_db_and_sends_one_batch_per_page() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        repair: true,
        ..march(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(4));
    let blobs = FakeBlobs::default()
        .with("pkg-000", "MIT")
        .with("pkg-002", "BSD-3-Clause");
    let recompute = RecordingRecompute::default();

    let mut orchestrator = Orchestrator::new(&config, &store, &blobs, Some(&recompute));
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.repaired, 2);
    assert_eq!(report.recomputed, 2);
    assert_eq!(
        recompute.batches(),
        vec![vec![
            "npm/npmjs/-/pkg-000/1.0.0".to_string(),
            "npm/npmjs/-/pkg-002/1.0.0".to_string(),
        ]]
    );
    assert_eq!(
        store.get("npm/npmjs/-/pkg-002/1.0.0").and_then(|r| r.declared),
        Some(json!("BSD-3-Clause"))
    );
    assert_eq!(
        orchestrator.history(),
        &[
            RunState::Planned,
            RunState::Paging,
            RunState::Comparing,
            RunState::Repairing,
            RunState::Checkpointed,
            RunState::RangeDone,
            RunState::AllRangesDone,
        ]
    );
}

#[tokio::test]
async fn month_runs_never_repair() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        repair: true,
        start_month: Some("2024-03".to_string()),
        end_month: Some("2024-03".to_string()),
        ..settings(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(5));
    let blobs = FakeBlobs::default().with("pkg-000", "MIT").with("pkg-001", "MIT");
    let recompute = RecordingRecompute::default();

    let report = Orchestrator::new(&config, &store, &blobs, Some(&recompute))
        .run()
        .await
        .unwrap();

    assert_eq!(report.ranges[0].label, "2024-03");
    assert_eq!(report.ranges[0].stats.sample_invalid, 2);
    assert_eq!(report.repaired, 0);
    assert!(recompute.batches().is_empty());
    assert_eq!(
        store.get("npm/npmjs/-/pkg-000/1.0.0").and_then(|r| r.declared),
        None
    );
}

#[tokio::test]
async fn month_sampling_reads_a_single_page() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        page_size: Some(3),
        start_month: Some("2024-03".to_string()),
        end_month: Some("2024-03".to_string()),
        ..settings(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(8));

    let report = Orchestrator::new(&config, &store, &FakeBlobs::default(), None)
        .run()
        .await
        .unwrap();

    let stats = &report.ranges[0].stats;
    assert_eq!(stats.sample_total, 3);
    assert_eq!(stats.total_documents, 8);
    assert_eq!(stats.sample_percent_of_total, "37.5%");
}

#[tokio::test]
async fn date_range_walks_every_page() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        page_size: Some(2),
        ..march(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(5));
    let blobs = FakeBlobs::default().with("pkg-004", "MIT");

    let mut orchestrator = Orchestrator::new(&config, &store, &blobs, None);
    let report = orchestrator.run().await.unwrap();

    assert_eq!(report.ranges[0].stats.sample_total, 5);
    assert_eq!(report.ranges[0].stats.sample_invalid, 1);
    let checkpoints = orchestrator
        .history()
        .iter()
        .filter(|state| **state == RunState::Checkpointed)
        .count();
    assert_eq!(checkpoints, 3);
}

#[tokio::test]
async fn resumed_run_skips_processed_records() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        initial_skip: 6,
        ..march(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(10));

    let report = Orchestrator::new(&config, &store, &FakeBlobs::default(), None)
        .run()
        .await
        .unwrap();

    assert_eq!(report.ranges[0].label, "2024-03-01_2024-03-31_offset_6");
    assert_eq!(report.ranges[0].stats.sample_total, 4);
    assert_eq!(report.ranges[0].stats.total_documents, 10);
}

#[tokio::test]
async fn empty_month_gets_zero_bucket() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        start_month: Some("2024-02".to_string()),
        end_month: Some("2024-03".to_string()),
        ..settings(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(2));

    let blobs = FakeBlobs::default();
    let mut orchestrator = Orchestrator::new(&config, &store, &blobs, None);
    let report = orchestrator.run().await.unwrap();

    let labels: Vec<&str> = report.ranges.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["2024-02", "2024-03"]);
    assert_eq!(report.ranges[0].stats, StatsBucket::new(0));
    assert_eq!(stats_on_disk(&config.output_file, "2024-02"), StatsBucket::new(0));
    assert_eq!(
        &orchestrator.history()[..3],
        &[RunState::Planned, RunState::Paging, RunState::RangeDone]
    );
}

#[tokio::test]
async fn checkpoints_every_hundred_records() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(march(&dir)).unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(250));

    let report = Orchestrator::new(&config, &store, &FakeBlobs::default(), None)
        .run()
        .await
        .unwrap();

    assert_eq!(report.ranges[0].stats.sample_total, 250);
    assert_eq!(
        stats_on_disk(&config.output_file, "2024-03-01_2024-03-31").sample_total,
        250
    );
}

#[tokio::test]
async fn checkpoints_count_records_within_each_page() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        page_size: Some(150),
        ..march(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(300));
    let blobs = CheckpointObserver::new(&config.output_file, "2024-03-01_2024-03-31");

    Orchestrator::new(&config, &store, &blobs, None)
        .run()
        .await
        .unwrap();

    // Fetch 201 is the 51st record of page two: nothing new since page one ended.
    // Fetch 251 follows the 100th record of page two.
    assert_eq!(
        blobs.observed(),
        vec![(101, 100), (151, 150), (201, 150), (251, 250)]
    );
    assert_eq!(
        stats_on_disk(&config.output_file, "2024-03-01_2024-03-31").sample_total,
        300
    );
}

#[tokio::test]
async fn repairing_across_pages_skips_records_that_shift_forward() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        repair: true,
        page_size: Some(2),
        ..march(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(6));
    let blobs = (0..6).fold(FakeBlobs::default(), |blobs, i| {
        blobs.with(&format!("pkg-{i:03}"), "MIT")
    });
    let recompute = RecordingRecompute::default();

    let report = Orchestrator::new(&config, &store, &blobs, Some(&recompute))
        .run()
        .await
        .unwrap();

    // Page two reads with skip 2 after page one's records left the filter,
    // so pkg-002 and pkg-003 are never examined until a rerun.
    assert_eq!(report.ranges[0].stats.sample_total, 4);
    assert_eq!(report.repaired, 4);
    let unrepaired: Vec<String> = (0..6)
        .map(|i| format!("npm/npmjs/-/pkg-{i:03}/1.0.0"))
        .filter(|id| store.get(id).and_then(|r| r.declared).is_none())
        .collect();
    assert_eq!(
        unrepaired,
        vec![
            "npm/npmjs/-/pkg-002/1.0.0".to_string(),
            "npm/npmjs/-/pkg-003/1.0.0".to_string(),
        ]
    );
}

#[tokio::test]
async fn verbose_records_both_sides() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        verbose: true,
        ..march(&dir)
    })
    .unwrap();
    let store = InMemoryDocumentStore::new("db", "defs").with_records(march_records(2));
    let blobs = FakeBlobs::default().with("pkg-001", "MIT");

    Orchestrator::new(&config, &store, &blobs, None)
        .run()
        .await
        .unwrap();

    let contents: Value =
        serde_json::from_slice(&std::fs::read(&config.output_file).unwrap()).unwrap();
    assert_eq!(
        contents["2024-03-01_2024-03-31"]["npm/npmjs/-/pkg-001/1.0.0"],
        json!({
            "db": { "licensed": null, "_meta": { "updated": "2024-03-05T12:00:00Z" } },
            "blob": { "licensed": "MIT", "_meta": { "updated": "2024-06-01T00:00:00Z" } }
        })
    );
}

#[tokio::test]
async fn dry_run_reports_counts_only() {
    let dir = TempDir::new().unwrap();
    let config = Config::from_settings(RawSettings {
        dry_run: true,
        blob_base_url: None,
        start_month: Some("2024-03".to_string()),
        end_month: Some("2024-04".to_string()),
        ..settings(&dir)
    })
    .unwrap();
    let mut records = march_records(3);
    records.push(record("declared", "2024-03-10T00:00:00Z").with_declared("MIT"));
    let store = InMemoryDocumentStore::new("db", "defs").with_records(records);

    let rows = dry_run(&config, &store).await.unwrap();

    let lines: Vec<String> = rows.iter().map(DryRunRow::to_csv_line).collect();
    assert_eq!(
        lines,
        vec![
            "2024-03,4,3,75.00,0.04,0.00".to_string(),
            "2024-04,0,0,0.00,0.00,0.00".to_string(),
        ]
    );
    assert!(!config.output_file.exists());
}

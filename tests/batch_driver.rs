//! Batch driver over scripted extractors and sinks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::mpsc;

use artacquire::batch::{
    Backlog, BatchDriver, BatchEvent, BatchSettings, FailedUrl, ProcessedSet, UrlOutcome,
};
use artacquire::extract::{ArtworkExtractor, ExtractError};
use artacquire::models::{ArtworkId, ArtworkRecord, ArtworkUrl, ImageGroup, ImageRecord};
use artacquire::storage::{ArtworkSink, FsArtworkStore, StoreError, INDEX_FILE};

fn url(id: u32) -> String {
    format!("https://www.pixiv.net/en/artworks/{}", id)
}

fn record(url: &ArtworkUrl) -> ArtworkRecord {
    ArtworkRecord {
        id: url.id().clone(),
        url: url.clone(),
        text: "caption".into(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap(),
        author: "painter".into(),
        author_link: None,
        tags: vec!["original".into()],
        image_groups: vec![ImageGroup {
            name: format!("./images/{}.jpg", url.id()),
            images: vec![ImageRecord {
                source_url: format!("https://i.pximg.net/{}.jpg", url.id()),
                bytes: vec![1, 2, 3],
            }],
        }],
        fetched_at: Utc::now(),
    }
}

#[derive(Clone, Copy)]
enum Script {
    Fail,
    LoseBrowser,
}

/// Succeeds for every URL without a script entry.
#[derive(Default)]
struct ScriptedExtractor {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    fn with(mut self, url: String, script: Script) -> Self {
        self.scripts.insert(url, script);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtworkExtractor for ScriptedExtractor {
    async fn extract(&self, url: &ArtworkUrl) -> Result<ArtworkRecord, ExtractError> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.scripts.get(url.as_str()) {
            Some(Script::Fail) => Err(ExtractError::MissingField("author")),
            Some(Script::LoseBrowser) => Err(ExtractError::BrowserUnavailable(anyhow::anyhow!(
                "browser connection lost"
            ))),
            None => Ok(record(url)),
        }
    }
}

#[derive(Default, Clone)]
struct RecordingSink {
    saved: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    fn saved(&self) -> Vec<String> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtworkSink for RecordingSink {
    async fn persist(&self, record: ArtworkRecord) -> Result<PathBuf, StoreError> {
        self.saved.lock().unwrap().push(record.id.to_string());
        Ok(PathBuf::from(record.id.as_str()))
    }
}

fn settings(batch_size: usize) -> BatchSettings {
    BatchSettings {
        batch_size,
        delay: Duration::ZERO,
    }
}

fn backlog(ids: &[u32]) -> Backlog {
    Backlog::from_lines(&ids.iter().map(|id| url(*id)).collect::<Vec<_>>().join("\n"))
}

#[tokio::test]
async fn processed_ids_never_reach_the_extractor() {
    let mut processed = ProcessedSet::default();
    processed.insert(ArtworkId::new("2").unwrap());
    processed.insert(ArtworkId::new("4").unwrap());

    let sink = RecordingSink::default();
    let driver = BatchDriver::new(ScriptedExtractor::default(), sink.clone(), settings(2));
    let report = driver.run(&backlog(&[1, 2, 3, 4, 5]), &mut processed).await;

    assert_eq!(driver.extractor().calls(), vec![url(1), url(3), url(5)]);
    assert_eq!(report.processed(), 3);
    assert_eq!(report.skipped(), 2);
    assert_eq!(report.reached(), 5);
    assert!(report.aborted.is_none());
    assert_eq!(processed.len(), 5);
    assert_eq!(sink.saved(), vec!["1", "3", "5"]);
}

#[tokio::test]
async fn one_failure_does_not_stop_the_run() {
    let extractor = ScriptedExtractor::default().with(url(2), Script::Fail);
    let sink = RecordingSink::default();
    let driver = BatchDriver::new(extractor, sink.clone(), settings(1));

    let mut processed = ProcessedSet::default();
    let report = driver.run(&backlog(&[1, 2, 3]), &mut processed).await;

    assert_eq!(
        report.failures(),
        vec![&FailedUrl {
            url: url(2),
            reason: "missing required field: author".into(),
        }]
    );
    assert_eq!(sink.saved(), vec!["1", "3"]);
    assert!(!processed.contains(&ArtworkId::new("2").unwrap()));
    assert!(report.aborted.is_none());
}

#[tokio::test]
async fn lost_browser_stops_after_the_current_batch() {
    let extractor = ScriptedExtractor::default().with(url(3), Script::LoseBrowser);
    let sink = RecordingSink::default();
    let driver = BatchDriver::new(extractor, sink.clone(), settings(2));

    let mut processed = ProcessedSet::default();
    let report = driver.run(&backlog(&[1, 2, 3, 4, 5, 6]), &mut processed).await;

    // Batches are [1, 2] then [3, 4]; nothing after that is attempted.
    assert_eq!(
        driver.extractor().calls(),
        vec![url(1), url(2), url(3), url(4)]
    );
    assert_eq!(sink.saved(), vec!["1", "2", "4"]);
    assert!(report.aborted.is_some());
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.reached(), 4);
    assert_eq!(report.total, 6);
}

#[tokio::test]
async fn malformed_and_duplicate_lines_are_recorded() {
    let lines = format!("{}\nnot a url\n{}\n", url(8), url(8));
    let driver = BatchDriver::new(
        ScriptedExtractor::default(),
        RecordingSink::default(),
        settings(3),
    );

    let mut processed = ProcessedSet::default();
    let report = driver.run(&Backlog::from_lines(&lines), &mut processed).await;

    assert_eq!(driver.extractor().calls(), vec![url(8)]);
    assert_eq!(report.outcomes.len(), 3);
    assert!(matches!(
        &report.outcomes[0],
        UrlOutcome::Failed(f) if f.url == "not a url"
    ));
    assert!(matches!(
        &report.outcomes[1],
        UrlOutcome::Skipped { id } if id.as_str() == "8"
    ));
    assert!(matches!(
        &report.outcomes[2],
        UrlOutcome::Processed { id, .. } if id.as_str() == "8"
    ));
}

#[tokio::test]
async fn events_describe_the_run() {
    let (tx, mut rx) = mpsc::channel(64);
    let extractor = ScriptedExtractor::default().with(url(2), Script::Fail);
    let driver =
        BatchDriver::new(extractor, RecordingSink::default(), settings(1)).with_events(tx);

    let mut processed = ProcessedSet::default();
    processed.insert(ArtworkId::new("3").unwrap());
    driver.run(&backlog(&[1, 2, 3]), &mut processed).await;
    drop(driver);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(matches!(
        events.first(),
        Some(BatchEvent::Started {
            total: 3,
            already_processed: 1
        })
    ));
    assert!(events
        .iter()
        .any(|e| matches!(e, BatchEvent::ItemProcessed { images: 1, .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, BatchEvent::ItemFailed { url: u, .. } if *u == url(2))));
    assert!(events
        .iter()
        .any(|e| matches!(e, BatchEvent::ItemSkipped { url: u } if *u == url(3))));
    assert!(!events.iter().any(|e| matches!(e, BatchEvent::Sleeping { .. })));
    assert!(matches!(
        events.last(),
        Some(BatchEvent::Finished {
            processed: 1,
            skipped: 1,
            failed: 1,
            aborted: false
        })
    ));
}

#[tokio::test]
async fn filesystem_output_is_picked_up_by_the_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("pixiv");

    let driver = BatchDriver::new(
        ScriptedExtractor::default(),
        FsArtworkStore::new(&root),
        settings(2),
    );
    let mut processed = ProcessedSet::scan(&root).unwrap();
    let report = driver.run(&backlog(&[10, 11]), &mut processed).await;
    assert_eq!(report.processed(), 2);

    let artwork = root.join("24-03-09").join("10");
    assert!(artwork.join(INDEX_FILE).is_file());
    assert_eq!(
        std::fs::read(artwork.join("images").join("10.jpg")).unwrap(),
        vec![1, 2, 3]
    );

    // A fresh process rebuilds the set from disk and fetches nothing.
    let mut rescanned = ProcessedSet::scan(&root).unwrap();
    assert_eq!(rescanned.len(), 2);
    let second = BatchDriver::new(
        ScriptedExtractor::default(),
        RecordingSink::default(),
        settings(2),
    );
    let report = second.run(&backlog(&[10, 11, 12]), &mut rescanned).await;
    assert_eq!(second.extractor().calls(), vec![url(12)]);
    assert_eq!(report.skipped(), 2);
}

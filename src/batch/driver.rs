//! Rate-limited, checkpointed walk over a backlog.

use std::path::PathBuf;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{Backlog, BatchEvent, ProcessedSet, Pull};
use crate::extract::ArtworkExtractor;
use crate::models::{ArtworkId, ArtworkUrl};
use crate::storage::ArtworkSink;

#[derive(Debug, Clone)]
pub struct BatchSettings {
    /// Runnable URLs extracted concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 1,
            delay: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUrl {
    pub url: String,
    pub reason: String,
}

/// What happened to one backlog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlOutcome {
    Processed { id: ArtworkId, dir: PathBuf },
    /// Output already existed; nothing was fetched.
    Skipped { id: ArtworkId },
    Failed(FailedUrl),
}

/// Summary of a run. Returned even when the run was aborted.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Entries in the backlog.
    pub total: usize,
    /// One outcome per entry reached. Skips and malformed entries are
    /// recorded as they are pulled, extraction results when their batch ends.
    pub outcomes: Vec<UrlOutcome>,
    /// Set when a fatal error stopped the run early.
    pub aborted: Option<String>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, UrlOutcome::Processed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UrlOutcome::Skipped { .. }))
    }

    /// Failed entries in the order they were reached.
    pub fn failures(&self) -> Vec<&FailedUrl> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                UrlOutcome::Failed(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// Entries reached so far, whatever their outcome.
    pub fn reached(&self) -> usize {
        self.outcomes.len()
    }

    fn count(&self, pred: impl Fn(&UrlOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

struct Attempt {
    outcome: UrlOutcome,
    /// The browser is gone; no later URL can succeed.
    fatal: bool,
}

/// Drives an extractor over a backlog and hands results to a sink.
pub struct BatchDriver<X, S> {
    extractor: X,
    sink: S,
    settings: BatchSettings,
    events: Option<mpsc::Sender<BatchEvent>>,
}

impl<X: ArtworkExtractor, S: ArtworkSink> BatchDriver<X, S> {
    pub fn new(extractor: X, sink: S, settings: BatchSettings) -> Self {
        Self {
            extractor,
            sink,
            settings: BatchSettings {
                batch_size: settings.batch_size.max(1),
                ..settings
            },
            events: None,
        }
    }

    /// Report progress on `tx` as the run advances.
    pub fn with_events(mut self, tx: mpsc::Sender<BatchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn extractor(&self) -> &X {
        &self.extractor
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    async fn emit(&self, event: BatchEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    /// Process every entry of `backlog` not already in `processed`.
    ///
    /// Successful ids are added to `processed` as their batch completes.
    /// Individual failures are recorded and the run continues; a fatal
    /// error stops it after the current batch.
    pub async fn run(&self, backlog: &Backlog, processed: &mut ProcessedSet) -> BatchReport {
        let mut report = BatchReport {
            total: backlog.len(),
            ..Default::default()
        };
        self.emit(BatchEvent::Started {
            total: backlog.len(),
            already_processed: processed.len(),
        })
        .await;

        let mut cursor = backlog.pending();
        loop {
            let mut queue: Vec<ArtworkUrl> = Vec::with_capacity(self.settings.batch_size);
            while queue.len() < self.settings.batch_size {
                let Some(pull) = cursor.next_pull(processed) else {
                    break;
                };
                match pull {
                    Pull::Runnable(url) if queue.iter().any(|q| q.id() == url.id()) => {
                        self.skip(&mut report, url).await;
                    }
                    Pull::Runnable(url) => queue.push(url),
                    Pull::Skipped(url) => self.skip(&mut report, url).await,
                    Pull::Malformed(raw) => {
                        warn!("Failed to get artwork id from url {}", raw);
                        self.fail(&mut report, raw, "no artwork id in url".to_string())
                            .await;
                    }
                }
            }

            if queue.is_empty() {
                info!("No more urls to process");
                break;
            }

            let attempts = join_all(queue.iter().map(|url| self.process_one(url))).await;
            for attempt in attempts {
                match &attempt.outcome {
                    UrlOutcome::Processed { id, .. } => {
                        processed.insert(id.clone());
                    }
                    UrlOutcome::Failed(failure) if attempt.fatal => {
                        report
                            .aborted
                            .get_or_insert_with(|| failure.reason.clone());
                    }
                    _ => {}
                }
                report.outcomes.push(attempt.outcome);
            }
            info!("Processed {} of {}", report.reached(), report.total);

            if let Some(reason) = &report.aborted {
                error!("Stopping run: {}", reason);
                break;
            }
            if cursor.is_exhausted() {
                break;
            }
            if !self.settings.delay.is_zero() {
                info!("Sleeping for {:?}", self.settings.delay);
                self.emit(BatchEvent::Sleeping {
                    seconds: self.settings.delay.as_secs_f64(),
                })
                .await;
                tokio::time::sleep(self.settings.delay).await;
            }
        }

        self.emit(BatchEvent::Finished {
            processed: report.processed(),
            skipped: report.skipped(),
            failed: report.failures().len(),
            aborted: report.aborted.is_some(),
        })
        .await;
        report
    }

    async fn process_one(&self, url: &ArtworkUrl) -> Attempt {
        info!("Processing artwork with url {}", url);
        self.emit(BatchEvent::ItemStarted {
            url: url.to_string(),
        })
        .await;

        let record = match self.extractor.extract(url).await {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to process artwork with url {}: {:#}", url, e);
                let fatal = e.is_fatal();
                return self.failed_attempt(url, e.to_string(), fatal).await;
            }
        };

        let images = record.image_count();
        match self.sink.persist(record).await {
            Ok(dir) => {
                self.emit(BatchEvent::ItemProcessed {
                    url: url.to_string(),
                    images,
                })
                .await;
                Attempt {
                    outcome: UrlOutcome::Processed {
                        id: url.id().clone(),
                        dir,
                    },
                    fatal: false,
                }
            }
            Err(e) => {
                error!("Failed to save artwork with url {}: {}", url, e);
                self.failed_attempt(url, e.to_string(), false).await
            }
        }
    }

    async fn failed_attempt(&self, url: &ArtworkUrl, reason: String, fatal: bool) -> Attempt {
        self.emit(BatchEvent::ItemFailed {
            url: url.to_string(),
            error: reason.clone(),
        })
        .await;
        Attempt {
            outcome: UrlOutcome::Failed(FailedUrl {
                url: url.to_string(),
                reason,
            }),
            fatal,
        }
    }

    async fn skip(&self, report: &mut BatchReport, url: ArtworkUrl) {
        self.emit(BatchEvent::ItemSkipped {
            url: url.to_string(),
        })
        .await;
        report.outcomes.push(UrlOutcome::Skipped {
            id: url.id().clone(),
        });
    }

    async fn fail(&self, report: &mut BatchReport, url: String, reason: String) {
        self.emit(BatchEvent::ItemFailed {
            url: url.clone(),
            error: reason.clone(),
        })
        .await;
        report.outcomes.push(UrlOutcome::Failed(FailedUrl { url, reason }));
    }
}

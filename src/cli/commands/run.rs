//! Batch extraction over the backlog.

use std::sync::Arc;

use anyhow::Context;
use console::style;
use tokio::sync::mpsc;
use tracing::info;

use artacquire::batch::{Backlog, BatchDriver, BatchReport, BatchSettings, ProcessedSet};
use artacquire::browser::{load_cookie_file, BrowserFetcher};
use artacquire::config::{Config, LoadOptions};
use artacquire::extract::{AlbumExtractor, SessionStore};
use artacquire::storage::FsArtworkStore;

use super::Paths;
use crate::cli::progress;

pub async fn cmd_run(
    config: &Config,
    options: &LoadOptions,
    paths: &Paths,
    batch: BatchSettings,
) -> anyhow::Result<()> {
    let backlog = Backlog::from_file(&paths.input)?;
    let mut processed = ProcessedSet::scan(&paths.output)
        .with_context(|| format!("Failed to scan {}", paths.output.display()))?;
    info!(
        "{} URL(s) in backlog, {} artwork(s) already on disk",
        backlog.len(),
        processed.len()
    );

    let credential = match &config.browser.cookies_file {
        Some(path) => {
            let path = Config::resolve_path(&path.to_string_lossy(), &config.base_dir(options));
            load_cookie_file(&path)?
        }
        None => None,
    };
    let session = Arc::new(credential.map(SessionStore::with_credential).unwrap_or_default());

    let browser = Arc::new(BrowserFetcher::new(
        config.browser.clone(),
        vec![
            config.site.site_url.clone(),
            config.site.auth_url_prefix.clone(),
        ],
    ));
    let extractor = AlbumExtractor::new(browser.clone(), session, config.to_extract_settings());
    let store = FsArtworkStore::new(&paths.output);

    let (event_tx, event_rx) = mpsc::channel(64);
    let renderer = tokio::spawn(progress::render(event_rx));

    let driver = BatchDriver::new(extractor, store, batch).with_events(event_tx);
    let report = driver.run(&backlog, &mut processed).await;
    // Dropping the driver closes the event channel and ends the renderer.
    drop(driver);
    let _ = renderer.await;

    print_summary(&report);
    browser.close().await;

    if let Some(reason) = report.aborted {
        anyhow::bail!("Run aborted: {}", reason);
    }
    Ok(())
}

fn print_summary(report: &BatchReport) {
    println!(
        "{} Processed {} of {} ({} new, {} already done, {} failed)",
        style("✓").green(),
        report.reached(),
        report.total,
        report.processed(),
        report.skipped(),
        report.failures().len()
    );

    let failures = report.failures();
    if !failures.is_empty() {
        println!("{}", style("Failed urls").red().bold());
        for failure in failures {
            println!("{}", failure.url);
        }
    }
}

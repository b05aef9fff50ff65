//! Terminal rendering of batch progress events.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use artacquire::batch::BatchEvent;

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

/// Consume events until the sender side is dropped.
pub async fn render(mut events: mpsc::Receiver<BatchEvent>) {
    let mut progress: Option<ProgressBar> = None;

    while let Some(event) = events.recv().await {
        match event {
            BatchEvent::Started {
                total,
                already_processed,
            } => {
                println!(
                    "{} {} URL(s) in backlog, {} artwork(s) already on disk",
                    style("→").cyan(),
                    total,
                    already_processed
                );
                let bar = ProgressBar::new(total as u64);
                bar.set_style(bar_style());
                progress = Some(bar);
            }
            BatchEvent::ItemStarted { url } => {
                if let Some(bar) = &progress {
                    bar.set_message(url);
                }
            }
            BatchEvent::ItemProcessed { url, images } => {
                if let Some(bar) = &progress {
                    bar.suspend(|| {
                        println!("  {} {} ({} image(s))", style("✓").green(), url, images);
                    });
                    bar.inc(1);
                }
            }
            BatchEvent::ItemSkipped { .. } => {
                if let Some(bar) = &progress {
                    bar.inc(1);
                }
            }
            BatchEvent::ItemFailed { url, error } => match &progress {
                Some(bar) => {
                    bar.suspend(|| eprintln!("  {} {}: {}", style("✗").red(), url, error));
                    bar.inc(1);
                }
                None => eprintln!("  {} {}: {}", style("✗").red(), url, error),
            },
            BatchEvent::Sleeping { seconds } => {
                if let Some(bar) = &progress {
                    bar.set_message(format!("sleeping {:.1}s", seconds));
                }
            }
            BatchEvent::Finished { aborted, .. } => {
                if let Some(bar) = progress.take() {
                    bar.finish_and_clear();
                }
                if aborted {
                    eprintln!("{} Run stopped early", style("!").yellow());
                }
            }
        }
    }

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
}

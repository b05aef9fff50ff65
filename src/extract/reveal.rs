//! Scroll-driven reveal of lazily loaded images.
//!
//! The number of lazy items is unknown up front, so the revealer polls a
//! structural signal around each scroll and stops at the first fixed point.

use std::time::Duration;

use tracing::{debug, warn};

use super::{ArtworkPage, ExtractError};

/// Default pause after each scroll for lazy content to load.
pub const DEFAULT_SCROLL_SETTLE: Duration = Duration::from_secs(2);

/// Default cap on scroll iterations.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// What to measure when deciding whether a scroll revealed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealSignal {
    /// Bottom edge of the viewport in document coordinates. Used when items
    /// are not countable before they load.
    ScrollExtent,
    /// Number of elements matching the item selector.
    ItemCount,
}

#[derive(Debug, Clone)]
pub struct ScrollRevealer {
    settle: Duration,
    max_iterations: usize,
}

impl Default for ScrollRevealer {
    fn default() -> Self {
        Self::new(DEFAULT_SCROLL_SETTLE, DEFAULT_MAX_ITERATIONS)
    }
}

impl ScrollRevealer {
    pub fn new(settle: Duration, max_iterations: usize) -> Self {
        Self {
            settle,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Scroll until `signal` stops changing, then return the `src` of every
    /// element matching `item_selector`.
    ///
    /// At least one scroll always happens, even if the page never changes.
    pub async fn reveal_all(
        &self,
        page: &dyn ArtworkPage,
        item_selector: &str,
        signal: RevealSignal,
    ) -> Result<Vec<String>, ExtractError> {
        let mut polls = 0usize;
        loop {
            polls += 1;
            let before = self.measure(page, item_selector, signal).await?;

            if !page.scroll_last_into_view(item_selector).await? {
                debug!("No items matching {} to scroll to", item_selector);
            }
            if !self.settle.is_zero() {
                tokio::time::sleep(self.settle).await;
            }

            let after = self.measure(page, item_selector, signal).await?;
            debug!(
                "Reveal poll {} over {}: {:?} {} -> {}",
                polls, item_selector, signal, before, after
            );

            if before == after {
                break;
            }
            if polls >= self.max_iterations {
                warn!(
                    "Stopped revealing {} after {} scrolls without converging",
                    item_selector, polls
                );
                break;
            }
        }

        collect_sources(page, item_selector).await
    }

    async fn measure(
        &self,
        page: &dyn ArtworkPage,
        item_selector: &str,
        signal: RevealSignal,
    ) -> Result<i64, ExtractError> {
        let value = match signal {
            RevealSignal::ScrollExtent => page.scroll_extent().await?,
            RevealSignal::ItemCount => page.count(item_selector).await? as i64,
        };
        Ok(value)
    }
}

/// `src` attributes of every element matching `selector`, in document order.
pub(crate) async fn collect_sources(
    page: &dyn ArtworkPage,
    selector: &str,
) -> Result<Vec<String>, ExtractError> {
    let sources = page.attributes(selector, "src").await?;
    let total = sources.len();
    let sources: Vec<String> = sources
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
    if sources.len() < total {
        debug!(
            "{} of {} elements matching {} have no src",
            total - sources.len(),
            total,
            selector
        );
    }
    Ok(sources)
}

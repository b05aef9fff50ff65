//! Page-content extraction core.
//!
//! The extractor drives a rendered artwork page through classification,
//! lazy-content reveal and network correlation. All browser access goes
//! through the [`ArtworkPage`] trait so the state machine can be exercised
//! without a real Chrome instance.

mod album;
mod classify;
mod correlator;
mod error;
mod grouping;
mod reveal;
mod session;

use async_trait::async_trait;

use crate::models::{ArtworkRecord, ArtworkUrl, SessionCredential};

pub use album::{AlbumExtractor, ExtractSettings};
pub use classify::{PageClassifier, PREVIEW_SELECTOR, SENSITIVE_SELECTOR, SENSITIVE_TEXT};
pub use correlator::{RequestHandle, RequestLog, RequestResponseCorrelator};
pub use error::ExtractError;
pub use grouping::{group_images, group_key, GroupingMode};
pub use reveal::{RevealSignal, ScrollRevealer};
pub use session::{RecoveryGuard, SessionStore};

/// DOM and network operations the extractor needs from one browser tab.
///
/// Selector arguments are CSS selectors; list-returning methods preserve
/// document order.
#[async_trait]
pub trait ArtworkPage: Send + Sync {
    /// Start recording finished requests whose URL starts with `origin`.
    async fn observe_requests(&self, origin: &str) -> anyhow::Result<RequestLog>;

    /// Navigate and wait for the document to become ready.
    async fn goto(&self, url: &str) -> anyhow::Result<()>;

    async fn current_url(&self) -> anyhow::Result<Option<String>>;

    async fn count(&self, selector: &str) -> anyhow::Result<usize>;

    /// Count elements matching `selector` whose text contains `text`.
    async fn count_containing(&self, selector: &str, text: &str) -> anyhow::Result<usize>;

    /// `textContent` of every match.
    async fn text_contents(&self, selector: &str) -> anyhow::Result<Vec<String>>;

    /// Rendered `innerText` of every match.
    async fn inner_texts(&self, selector: &str) -> anyhow::Result<Vec<String>>;

    async fn attributes(&self, selector: &str, name: &str) -> anyhow::Result<Vec<Option<String>>>;

    /// Text of the innermost elements whose text contains any of `needles`.
    async fn texts_matching(&self, needles: &[&str]) -> anyhow::Result<Vec<String>>;

    /// Click the first innermost element containing `text`.
    ///
    /// With `force`, a missing or non-interactable element is not an error.
    async fn click_text(&self, text: &str, force: bool) -> anyhow::Result<()>;

    /// Scroll the last element matching `selector` into view. Returns false
    /// when nothing matches.
    async fn scroll_last_into_view(&self, selector: &str) -> anyhow::Result<bool>;

    /// `ceil(clientHeight + scrollTop)` of the document element.
    async fn scroll_extent(&self) -> anyhow::Result<i64>;

    /// Body of a request previously recorded by [`ArtworkPage::observe_requests`].
    async fn response_body(&self, request: &RequestHandle) -> anyhow::Result<Vec<u8>>;

    /// Snapshot of the session the page is currently running under.
    async fn credential(&self) -> anyhow::Result<SessionCredential>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Opens fresh pages on a shared browser.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Open a blank page with `credential` installed before any navigation.
    async fn open_page(
        &self,
        credential: Option<&SessionCredential>,
    ) -> anyhow::Result<Box<dyn ArtworkPage>>;
}

/// Turns one artwork URL into a complete record.
#[async_trait]
pub trait ArtworkExtractor: Send + Sync {
    async fn extract(&self, url: &ArtworkUrl) -> Result<ArtworkRecord, ExtractError>;
}

//! Page variant classification from rendered DOM markers.

use std::time::Duration;

use tracing::debug;

use super::{ArtworkPage, ExtractError};
use crate::models::PageVariant;

/// Container of the login-gated placeholder text.
pub const SENSITIVE_SELECTOR: &str = "main figure span";
pub const SENSITIVE_TEXT: &str =
    "This work cannot be displayed as it may contain sensitive content";
/// Present only on multi-image posts.
pub const PREVIEW_SELECTOR: &str = r#"[aria-label="Preview"]"#;
pub const SHOW_ALL_LABEL: &str = "Show all";
pub const READING_WORKS_LABEL: &str = "Reading works";

/// Default wait for client-side rendering before inspecting the DOM.
pub const DEFAULT_CLASSIFY_SETTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct PageClassifier {
    settle: Duration,
}

impl Default for PageClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_CLASSIFY_SETTLE)
    }
}

impl PageClassifier {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    /// Decide which variant the loaded page is.
    ///
    /// Predicates run in a fixed order: the sensitive placeholder first
    /// (no images exist behind it), then the preview marker, then the
    /// continuation label. An unrecognized label is an error, never a guess.
    pub async fn classify(&self, page: &dyn ArtworkPage) -> Result<PageVariant, ExtractError> {
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        if page
            .count_containing(SENSITIVE_SELECTOR, SENSITIVE_TEXT)
            .await?
            > 0
        {
            return Ok(PageVariant::Sensitive);
        }

        if page.count(PREVIEW_SELECTOR).await? == 0 {
            return Ok(PageVariant::Single);
        }

        let labels = page
            .texts_matching(&[SHOW_ALL_LABEL, READING_WORKS_LABEL])
            .await?;
        let label = labels.first().map(|l| l.trim().to_string());
        debug!("Continuation label: {:?}", label);

        match label.as_deref() {
            Some(SHOW_ALL_LABEL) => Ok(PageVariant::Album),
            Some(READING_WORKS_LABEL) => Ok(PageVariant::Reading),
            _ => Err(ExtractError::UnknownPageType(label)),
        }
    }
}

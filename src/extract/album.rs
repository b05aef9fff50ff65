//! Artwork extraction state machine.
//!
//! Loading -> Classified -> (AuthChallenge -> Loading) | Extracting -> Done.
//! Every page opened here is closed before `extract` returns, whichever
//! state it ended in.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::classify::{DEFAULT_CLASSIFY_SETTLE, READING_WORKS_LABEL, SHOW_ALL_LABEL};
use super::reveal::{collect_sources, DEFAULT_MAX_ITERATIONS, DEFAULT_SCROLL_SETTLE};
use super::{
    group_images, ArtworkExtractor, ArtworkPage, ExtractError, GroupingMode, PageClassifier,
    PageSource, RequestLog, RequestResponseCorrelator, RevealSignal, ScrollRevealer, SessionStore,
};
use crate::models::{ArtworkRecord, ArtworkUrl, ImageRecord, PageVariant};

pub const DESCRIPTION_SELECTOR: &str = "figcaption p";
pub const TAGS_SELECTOR: &str = "footer li a";
pub const CREATED_AT_SELECTOR: &str = "figcaption time";
/// Author name link; the avatar link next to it wraps an `img`.
pub const AUTHOR_SELECTOR: &str = "aside h2 a:not(:has(img))";
pub const ARTWORK_IMAGES_SELECTOR: &str = r#"[role="presentation"] img"#;
pub const READING_IMAGES_SELECTOR: &str = ".gtm-expand-full-size-illust img";

/// Tunables for [`AlbumExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    /// Only requests under this prefix are correlated.
    pub image_origin: String,
    /// The login flow navigates to a URL starting with this prefix.
    pub auth_url_prefix: String,
    pub classify_settle: Duration,
    pub scroll_settle: Duration,
    pub reading_settle: Duration,
    /// How often the page URL is checked while waiting for a login.
    pub auth_poll_interval: Duration,
    pub max_scroll_iterations: usize,
    /// Login challenges tolerated for one URL before giving up.
    pub max_auth_attempts: u32,
    pub grouping: GroupingMode,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            image_origin: "https://i.pximg.net/".to_string(),
            auth_url_prefix: "https://accounts.pixiv.net/".to_string(),
            classify_settle: DEFAULT_CLASSIFY_SETTLE,
            scroll_settle: DEFAULT_SCROLL_SETTLE,
            reading_settle: Duration::from_secs(1),
            auth_poll_interval: Duration::from_millis(500),
            max_scroll_iterations: DEFAULT_MAX_ITERATIONS,
            max_auth_attempts: 3,
            grouping: GroupingMode::default(),
        }
    }
}

enum PageOutcome {
    Extracted(Box<ArtworkRecord>),
    /// A login completed on this page; the artwork must be loaded again.
    Reauthenticated,
}

struct CommonFields {
    text: String,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
    author: String,
    author_link: Option<String>,
}

/// Extracts artwork records from pages opened on a shared browser.
pub struct AlbumExtractor {
    pages: Arc<dyn PageSource>,
    session: Arc<SessionStore>,
    correlator: RequestResponseCorrelator,
    classifier: PageClassifier,
    revealer: ScrollRevealer,
    settings: ExtractSettings,
}

impl AlbumExtractor {
    pub fn new(
        pages: Arc<dyn PageSource>,
        session: Arc<SessionStore>,
        settings: ExtractSettings,
    ) -> Self {
        Self {
            pages,
            session,
            correlator: RequestResponseCorrelator::new(settings.image_origin.clone()),
            classifier: PageClassifier::new(settings.classify_settle),
            revealer: ScrollRevealer::new(settings.scroll_settle, settings.max_scroll_iterations),
            settings,
        }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    async fn extract_on_page(
        &self,
        page: &dyn ArtworkPage,
        url: &ArtworkUrl,
        generation: u64,
        challenges: u32,
    ) -> Result<PageOutcome, ExtractError> {
        let requests = self.correlator.observe(page).await?;
        page.goto(url.as_str()).await?;

        let variant = self.classifier.classify(page).await?;
        info!("Found page type {} for {}", variant, url);

        if variant == PageVariant::Sensitive {
            if challenges >= self.settings.max_auth_attempts {
                return Err(ExtractError::AuthRetriesExhausted {
                    url: url.to_string(),
                    attempts: challenges,
                });
            }
            self.recover_session(page, url, generation).await?;
            return Ok(PageOutcome::Reauthenticated);
        }

        let fields = self.common_fields(page).await?;
        let sources = self.image_sources(page, variant).await?;
        let images = self.resolve_images(page, &requests, sources).await;
        debug!("Captured {} image(s) for {}", images.len(), url);

        Ok(PageOutcome::Extracted(Box::new(ArtworkRecord {
            id: url.id().clone(),
            url: url.clone(),
            text: fields.text,
            created_at: fields.created_at,
            author: fields.author,
            author_link: fields.author_link,
            tags: fields.tags,
            image_groups: group_images(images, self.settings.grouping),
            fetched_at: Utc::now(),
        })))
    }

    /// Block until a login round-trip completes on `page`, then store the
    /// new credential. Skips the wait when another task already refreshed
    /// the session after this page was opened.
    async fn recover_session(
        &self,
        page: &dyn ArtworkPage,
        url: &ArtworkUrl,
        generation: u64,
    ) -> Result<(), ExtractError> {
        let guard = self.session.begin_recovery().await;
        if guard.refreshed_since(generation).await {
            info!("Session refreshed while {} was loading; retrying", url);
            return Ok(());
        }

        info!("Sensitive content at {}; waiting for login", url);
        let prefix = self.settings.auth_url_prefix.as_str();
        self.wait_for_url(page, |current| current.starts_with(prefix))
            .await?;
        debug!("Login page reached");
        self.wait_for_url(page, |current| current == url.as_str())
            .await?;
        info!("Back at {}; saving session and restarting", url);

        let credential = page.credential().await?;
        guard.commit(credential).await;
        Ok(())
    }

    /// Poll the page URL until `matches` accepts it. No timeout: the login
    /// is completed by an operator at human pace.
    async fn wait_for_url<F>(&self, page: &dyn ArtworkPage, matches: F) -> Result<(), ExtractError>
    where
        F: Fn(&str) -> bool,
    {
        loop {
            if let Some(current) = page.current_url().await? {
                if matches(&current) {
                    return Ok(());
                }
            }
            tokio::time::sleep(self.settings.auth_poll_interval).await;
        }
    }

    async fn common_fields(&self, page: &dyn ArtworkPage) -> Result<CommonFields, ExtractError> {
        let text = page.text_contents(DESCRIPTION_SELECTOR).await?.join("\n");

        let tags = page
            .text_contents(TAGS_SELECTOR)
            .await?
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect();

        let raw_created = page
            .attributes(CREATED_AT_SELECTOR, "datetime")
            .await?
            .into_iter()
            .next()
            .flatten()
            .ok_or(ExtractError::MissingField("created_at"))?;
        let created_at = DateTime::parse_from_rfc3339(raw_created.trim())
            .map_err(|source| ExtractError::InvalidTimestamp {
                value: raw_created.clone(),
                source,
            })?
            .with_timezone(&Utc);

        let author = page
            .inner_texts(AUTHOR_SELECTOR)
            .await?
            .into_iter()
            .next()
            .map(|a| a.trim().to_string())
            .ok_or(ExtractError::MissingField("author"))?;
        let author_link = page
            .attributes(AUTHOR_SELECTOR, "href")
            .await?
            .into_iter()
            .next()
            .flatten();

        Ok(CommonFields {
            text,
            tags,
            created_at,
            author,
            author_link,
        })
    }

    async fn image_sources(
        &self,
        page: &dyn ArtworkPage,
        variant: PageVariant,
    ) -> Result<Vec<String>, ExtractError> {
        match variant {
            PageVariant::Single => collect_sources(page, ARTWORK_IMAGES_SELECTOR).await,
            PageVariant::Album => {
                page.click_text(SHOW_ALL_LABEL, false).await?;
                self.revealer
                    .reveal_all(page, ARTWORK_IMAGES_SELECTOR, RevealSignal::ScrollExtent)
                    .await
            }
            PageVariant::Reading => {
                // The reader may already be open, in which case there is
                // nothing to click.
                if let Err(e) = page.click_text(READING_WORKS_LABEL, true).await {
                    debug!("Forced click on {:?} failed: {:#}", READING_WORKS_LABEL, e);
                }
                if !self.settings.reading_settle.is_zero() {
                    tokio::time::sleep(self.settings.reading_settle).await;
                }
                self.revealer
                    .reveal_all(page, READING_IMAGES_SELECTOR, RevealSignal::ItemCount)
                    .await
            }
            PageVariant::Sensitive => Ok(Vec::new()),
        }
    }

    /// Resolve every source through the correlator. All lookups are awaited
    /// before returning; order follows `sources`.
    async fn resolve_images(
        &self,
        page: &dyn ArtworkPage,
        requests: &RequestLog,
        sources: Vec<String>,
    ) -> Vec<ImageRecord> {
        let lookups = sources.into_iter().map(|src| async move {
            match self.correlator.resolve(page, requests, &src).await {
                Ok(Some(bytes)) => Some(ImageRecord {
                    source_url: src,
                    bytes,
                }),
                Ok(None) => {
                    warn!("Couldn't find a response for {}", src);
                    None
                }
                Err(e) => {
                    warn!("Failed to read response for {}: {:#}", src, e);
                    None
                }
            }
        });

        join_all(lookups).await.into_iter().flatten().collect()
    }
}

#[async_trait]
impl ArtworkExtractor for AlbumExtractor {
    async fn extract(&self, url: &ArtworkUrl) -> Result<ArtworkRecord, ExtractError> {
        info!("Getting artwork data for {}", url);
        let mut challenges = 0u32;

        loop {
            let (generation, credential) = self.session.snapshot().await;
            debug!(
                "Opening page with {} session cookie(s)",
                credential.as_ref().map(|c| c.len()).unwrap_or(0)
            );

            let page = self
                .pages
                .open_page(credential.as_ref())
                .await
                .map_err(ExtractError::BrowserUnavailable)?;

            let outcome = self
                .extract_on_page(page.as_ref(), url, generation, challenges)
                .await;
            if let Err(e) = page.close().await {
                debug!("Failed to close page for {}: {:#}", url, e);
            }

            match outcome? {
                PageOutcome::Extracted(record) => return Ok(*record),
                PageOutcome::Reauthenticated => challenges += 1,
            }
        }
    }
}

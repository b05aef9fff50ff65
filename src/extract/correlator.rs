//! Correlates rendered image elements with the network responses that
//! filled them, so image bytes come from the browser's own requests instead
//! of a second download outside the session.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::ArtworkPage;

/// A finished request the browser made for an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandle {
    /// Protocol-level request id used to fetch the body.
    pub request_id: String,
    pub url: String,
}

/// Live mapping from request URL to the request that fetched it.
///
/// Cloning shares the underlying map; the page's listener keeps writing to
/// it while the extractor reads.
#[derive(Debug, Clone)]
pub struct RequestLog {
    origin: Arc<str>,
    requests: Arc<RwLock<HashMap<String, RequestHandle>>>,
}

impl RequestLog {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: Arc::from(origin),
            requests: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Whether a URL is in scope for recording.
    pub fn tracks(&self, url: &str) -> bool {
        url.starts_with(&*self.origin)
    }

    /// Record a finished request. Out-of-origin URLs are ignored and
    /// reported as `false`.
    pub async fn record(&self, url: &str, request_id: &str) -> bool {
        if !self.tracks(url) {
            return false;
        }
        let handle = RequestHandle {
            request_id: request_id.to_string(),
            url: url.to_string(),
        };
        self.requests.write().await.insert(url.to_string(), handle);
        true
    }

    pub async fn get(&self, url: &str) -> Option<RequestHandle> {
        self.requests.read().await.get(url).cloned()
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

/// Attaches request logs to pages and resolves image URLs to bytes.
#[derive(Debug, Clone)]
pub struct RequestResponseCorrelator {
    origin: String,
}

impl RequestResponseCorrelator {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Start recording image traffic on `page`. Must run before navigation.
    pub async fn observe(&self, page: &dyn ArtworkPage) -> anyhow::Result<RequestLog> {
        page.observe_requests(&self.origin).await
    }

    /// Bytes the browser received for `url`, or `None` when no finished
    /// request was recorded for it.
    pub async fn resolve(
        &self,
        page: &dyn ArtworkPage,
        log: &RequestLog,
        url: &str,
    ) -> anyhow::Result<Option<Vec<u8>>> {
        let Some(handle) = log.get(url).await else {
            debug!("No recorded request for {}", url);
            return Ok(None);
        };

        match page.response_body(&handle).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) => {
                // Evicted bodies look exactly like a request that never happened.
                warn!("Response body for {} unavailable: {:#}", url, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_only_image_origin_requests() {
        let log = RequestLog::new("https://i.pximg.net/");

        assert!(log.record("https://i.pximg.net/img-original/1_p0.png", "r1").await);
        assert!(!log.record("https://www.pixiv.net/ajax/illust/1", "r2").await);
        assert!(!log.record("https://s.pximg.net/common/logo.png", "r3").await);

        assert_eq!(log.len().await, 1);
        let handle = log.get("https://i.pximg.net/img-original/1_p0.png").await.unwrap();
        assert_eq!(handle.request_id, "r1");
        assert!(log.get("https://www.pixiv.net/ajax/illust/1").await.is_none());
    }

    #[tokio::test]
    async fn later_request_for_same_url_replaces_earlier() {
        let log = RequestLog::new("https://i.pximg.net/");
        log.record("https://i.pximg.net/a.jpg", "first").await;
        log.record("https://i.pximg.net/a.jpg", "second").await;

        assert_eq!(log.len().await, 1);
        assert_eq!(
            log.get("https://i.pximg.net/a.jpg").await.unwrap().request_id,
            "second"
        );
    }

    #[tokio::test]
    async fn clones_share_the_same_map() {
        let log = RequestLog::new("https://i.pximg.net/");
        let reader = log.clone();
        assert!(reader.is_empty().await);

        log.record("https://i.pximg.net/b.jpg", "r").await;
        assert!(reader.get("https://i.pximg.net/b.jpg").await.is_some());
    }
}

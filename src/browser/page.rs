//! [`ArtworkPage`] over a chromiumoxide tab.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFinished, EventRequestWillBeSent, GetCookiesParams, GetResponseBodyParams,
    RequestId,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::cookies::from_cdp_cookies;
use super::stealth::STEALTH_SCRIPTS;
use crate::extract::{ArtworkPage, RequestHandle, RequestLog};
use crate::models::SessionCredential;

/// JavaScript to wait for page ready state.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Elements whose text never renders; their contents are not labels.
const NON_TEXT_TAGS: &[&str] = &["SCRIPT", "STYLE", "NOSCRIPT", "TEMPLATE"];

/// Innermost elements whose rendered text contains one of `needles`, paired
/// with that text. Shared by the text lookup and the click helper.
const INNERMOST_MATCHES_FN: &str = r#"
    (needles, skipped) => {
        const ownText = (el) => Array.from(el.childNodes)
            .map((c) => c.nodeType === Node.TEXT_NODE ? c.nodeValue
                : c.nodeType === Node.ELEMENT_NODE && !skipped.includes(c.tagName) ? ownText(c)
                : '')
            .join('');
        const hits = (el) => !skipped.includes(el.tagName)
            && needles.some((n) => ownText(el).includes(n));
        return Array.from(document.body ? document.body.querySelectorAll('*') : [])
            .filter((el) => hits(el) && !Array.from(el.children).some(hits))
            .map((el) => ({ el, text: ownText(el) }));
    }
"#;

/// Expression evaluating to the `{ el, text }` matches for `needles`.
fn innermost_matches(needles: &[&str]) -> Result<String> {
    Ok(format!(
        "({})({}, {})",
        INNERMOST_MATCHES_FN,
        js(needles)?,
        js(NON_TEXT_TAGS)?
    ))
}

/// Encode a value as a JavaScript literal.
fn js<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("Failed to encode script argument")
}

/// Per-page settings handed down from the fetcher.
#[derive(Debug, Clone)]
pub(crate) struct PageOptions {
    pub timeout: Duration,
    pub stealth: bool,
    /// URLs whose cookies make up the session credential.
    pub cookie_urls: Vec<String>,
}

/// One browser tab.
pub struct CdpPage {
    page: Page,
    options: PageOptions,
    listener: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl CdpPage {
    pub(crate) fn new(page: Page, options: PageOptions) -> Self {
        Self {
            page,
            options,
            listener: std::sync::Mutex::new(None),
        }
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let result = self
            .page
            .evaluate(script)
            .await
            .context("Script evaluation failed")?;
        result
            .into_value::<T>()
            .map_err(|e| anyhow!("Unexpected script result: {}", e))
    }

    /// Wait for the page to reach a ready state.
    async fn wait_for_page_ready(&self) {
        match tokio::time::timeout(
            self.options.timeout,
            self.page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
    }

    async fn apply_stealth(&self) {
        for script in STEALTH_SCRIPTS {
            if let Err(e) = self.page.evaluate(script.to_string()).await {
                debug!("Stealth script injection skipped: {}", e);
            }
        }
    }

    fn replace_listener(&self, task: Option<JoinHandle<()>>) {
        let previous = match self.listener.lock() {
            Ok(mut slot) => std::mem::replace(&mut *slot, task),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), task),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

#[async_trait]
impl ArtworkPage for CdpPage {
    async fn observe_requests(&self, origin: &str) -> Result<RequestLog> {
        let log = RequestLog::new(origin);
        let mut sent = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .context("Failed to subscribe to request events")?;
        let mut finished = self
            .page
            .event_listener::<EventLoadingFinished>()
            .await
            .context("Failed to subscribe to loading events")?;

        let requests = log.clone();
        let task = tokio::spawn(async move {
            // request id -> url, for in-scope requests still loading
            let mut pending: HashMap<String, String> = HashMap::new();
            loop {
                tokio::select! {
                    // A request's start is queued before its finish.
                    biased;
                    Some(event) = sent.next() => {
                        if requests.tracks(&event.request.url) {
                            pending.insert(
                                event.request_id.inner().clone(),
                                event.request.url.clone(),
                            );
                        }
                    }
                    Some(event) = finished.next() => {
                        let id = event.request_id.inner();
                        if let Some(url) = pending.remove(id) {
                            requests.record(&url, id).await;
                        }
                    }
                    else => break,
                }
            }
        });
        self.replace_listener(Some(task));

        Ok(log)
    }

    async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        tokio::time::timeout(self.options.timeout, self.page.goto(url))
            .await
            .map_err(|_| {
                anyhow!(
                    "Navigation timed out after {}s for {}",
                    self.options.timeout.as_secs(),
                    url
                )
            })?
            .with_context(|| format!("Navigation failed for {}", url))?;

        self.wait_for_page_ready().await;
        if self.options.stealth {
            self.apply_stealth().await;
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.page.url().await?)
    }

    async fn count(&self, selector: &str) -> Result<usize> {
        self.eval(format!(
            "document.querySelectorAll({}).length",
            js(selector)?
        ))
        .await
    }

    async fn count_containing(&self, selector: &str, text: &str) -> Result<usize> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({})).filter((e) => (e.textContent || '').includes({})).length",
            js(selector)?,
            js(text)?
        ))
        .await
    }

    async fn text_contents(&self, selector: &str) -> Result<Vec<String>> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({}), (e) => e.textContent || '')",
            js(selector)?
        ))
        .await
    }

    async fn inner_texts(&self, selector: &str) -> Result<Vec<String>> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({}), (e) => e.innerText || '')",
            js(selector)?
        ))
        .await
    }

    async fn attributes(&self, selector: &str, name: &str) -> Result<Vec<Option<String>>> {
        self.eval(format!(
            "Array.from(document.querySelectorAll({}), (e) => e.getAttribute({}))",
            js(selector)?,
            js(name)?
        ))
        .await
    }

    async fn texts_matching(&self, needles: &[&str]) -> Result<Vec<String>> {
        self.eval(format!("{}.map((m) => m.text)", innermost_matches(needles)?))
        .await
    }

    async fn click_text(&self, text: &str, force: bool) -> Result<()> {
        let outcome: String = self
            .eval(format!(
                r#"(() => {{
                    const match = {}[0];
                    if (!match) return 'missing';
                    const el = match.el;
                    const visible = el.getClientRects().length > 0;
                    if (!visible && !{}) return 'hidden';
                    el.scrollIntoView({{ block: 'center' }});
                    el.click();
                    return 'clicked';
                }})()"#,
                innermost_matches(&[text])?,
                force
            ))
            .await?;

        match outcome.as_str() {
            "clicked" => Ok(()),
            "missing" if force => {
                debug!("Nothing to click for {:?}", text);
                Ok(())
            }
            other => bail!("Could not click {:?}: element {}", text, other),
        }
    }

    async fn scroll_last_into_view(&self, selector: &str) -> Result<bool> {
        self.eval(format!(
            r#"(() => {{
                const items = document.querySelectorAll({});
                if (items.length === 0) return false;
                items[items.length - 1].scrollIntoView({{ block: 'end' }});
                return true;
            }})()"#,
            js(selector)?
        ))
        .await
    }

    async fn scroll_extent(&self) -> Result<i64> {
        self.eval(
            "Math.ceil(document.documentElement.clientHeight + document.documentElement.scrollTop)"
                .to_string(),
        )
        .await
    }

    async fn response_body(&self, request: &RequestHandle) -> Result<Vec<u8>> {
        let response = self
            .page
            .execute(GetResponseBodyParams::new(RequestId::new(
                request.request_id.clone(),
            )))
            .await
            .with_context(|| format!("No response body for {}", request.url))?;

        if response.result.base64_encoded {
            general_purpose::STANDARD
                .decode(&response.result.body)
                .with_context(|| format!("Invalid base64 body for {}", request.url))
        } else {
            Ok(response.result.body.clone().into_bytes())
        }
    }

    async fn credential(&self) -> Result<SessionCredential> {
        let params = GetCookiesParams::builder()
            .urls(self.options.cookie_urls.clone())
            .build();
        let cookies = self
            .page
            .execute(params)
            .await
            .context("Failed to read session cookies")?
            .result
            .cookies
            .clone();
        debug!("Got {} cookies from browser", cookies.len());
        Ok(from_cdp_cookies(&cookies))
    }

    async fn close(&self) -> Result<()> {
        self.replace_listener(None);
        self.page.clone().close().await.context("Failed to close page")
    }
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        self.replace_listener(None);
    }
}

//! In-memory page fixtures for driving the extractor without Chrome.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use artacquire::extract::{
    ArtworkPage, ExtractSettings, PageSource, RequestHandle, RequestLog, PREVIEW_SELECTOR,
    SENSITIVE_SELECTOR, SENSITIVE_TEXT,
};
use artacquire::models::{BrowserCookie, SessionCredential};

pub const IMAGE_ORIGIN: &str = "https://i.pximg.net/";
pub const AUTH_PREFIX: &str = "https://accounts.pixiv.net/";
pub const ARTWORK_URL: &str = "https://www.pixiv.net/en/artworks/1001";

const DESCRIPTION_SELECTOR: &str = "figcaption p";
const TAGS_SELECTOR: &str = "footer li a";
const CREATED_AT_SELECTOR: &str = "figcaption time";
const AUTHOR_SELECTOR: &str = "aside h2 a:not(:has(img))";

pub fn image_url(name: &str) -> String {
    format!("{}img-original/img/2024/01/02/{}", IMAGE_ORIGIN, name)
}

pub fn credential(value: &str) -> SessionCredential {
    SessionCredential::new(vec![BrowserCookie {
        name: "PHPSESSID".into(),
        value: value.into(),
        domain: ".pixiv.net".into(),
        path: "/".into(),
        secure: true,
        http_only: true,
    }])
}

/// Settings with every wait set to zero.
pub fn fast_settings() -> ExtractSettings {
    ExtractSettings {
        image_origin: IMAGE_ORIGIN.to_string(),
        auth_url_prefix: AUTH_PREFIX.to_string(),
        classify_settle: Duration::ZERO,
        scroll_settle: Duration::ZERO,
        reading_settle: Duration::ZERO,
        auth_poll_interval: Duration::from_millis(1),
        ..ExtractSettings::default()
    }
}

/// Rendered state of one artwork page.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub sensitive: bool,
    pub preview: bool,
    /// Innermost texts containing a continuation label.
    pub labels: Vec<String>,
    pub description: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub author: Option<String>,
    pub author_link: Option<String>,
    /// Image sources in document order once everything is revealed.
    pub images: Vec<String>,
    /// Visible image count before the first scroll and after each one.
    /// Empty means everything is visible from the start.
    pub reveal_steps: Vec<usize>,
    /// Image URLs the network served, with their bodies.
    pub served: HashMap<String, Vec<u8>>,
    /// Successive values of the page URL while waiting for a login; the
    /// last one repeats.
    pub url_sequence: Vec<String>,
    /// Cookies the page holds after a login.
    pub cookies: SessionCredential,
    /// Fail every click instead of performing it.
    pub click_fails: bool,
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            sensitive: false,
            preview: false,
            labels: Vec::new(),
            description: vec!["first line".into(), "second line".into()],
            tags: vec!["original".into(), "".into(), "landscape".into()],
            created_at: Some("2024-01-02T03:04:05+00:00".into()),
            author: Some("  painter  ".into()),
            author_link: Some("/en/users/77".into()),
            images: Vec::new(),
            reveal_steps: Vec::new(),
            served: HashMap::new(),
            url_sequence: Vec::new(),
            cookies: credential("fresh"),
            click_fails: false,
        }
    }
}

impl Fixture {
    /// Single-image page whose images were all served.
    pub fn single(names: &[&str]) -> Self {
        Self::default().with_served_images(names)
    }

    pub fn album(names: &[&str]) -> Self {
        Self {
            preview: true,
            labels: vec!["Show all".into()],
            ..Self::default()
        }
        .with_served_images(names)
    }

    pub fn reading(names: &[&str]) -> Self {
        Self {
            preview: true,
            labels: vec![" Reading works ".into()],
            ..Self::default()
        }
        .with_served_images(names)
    }

    pub fn sensitive() -> Self {
        Self {
            sensitive: true,
            ..Self::default()
        }
    }

    pub fn with_served_images(mut self, names: &[&str]) -> Self {
        for (i, name) in names.iter().enumerate() {
            let url = image_url(name);
            self.served.insert(url.clone(), vec![i as u8; 4]);
            self.images.push(url);
        }
        self
    }
}

/// Counters shared by a fake browser and every page it opened.
#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub scrolls: AtomicUsize,
    pub clicks: Mutex<Vec<(String, bool)>>,
    /// Credential installed into each page, in opening order.
    pub credentials: Mutex<Vec<Option<SessionCredential>>>,
    pub visited: Mutex<Vec<String>>,
}

impl Counters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }
}

pub struct FakePage {
    fixture: Fixture,
    counters: Arc<Counters>,
    step: Mutex<usize>,
    url: Mutex<Option<String>>,
    url_polls: Mutex<VecDeque<String>>,
    log: Mutex<Option<RequestLog>>,
}

impl FakePage {
    pub fn new(fixture: Fixture, counters: Arc<Counters>) -> Self {
        let url_polls = fixture.url_sequence.iter().cloned().collect();
        Self {
            fixture,
            counters,
            step: Mutex::new(0),
            url: Mutex::new(None),
            url_polls: Mutex::new(url_polls),
            log: Mutex::new(None),
        }
    }

    fn visible(&self) -> usize {
        let steps = &self.fixture.reveal_steps;
        if steps.is_empty() {
            return self.fixture.images.len();
        }
        let step = *self.step.lock().unwrap();
        steps[step.min(steps.len() - 1)].min(self.fixture.images.len())
    }

    fn is_image_selector(selector: &str) -> bool {
        selector.ends_with(" img")
    }
}

#[async_trait]
impl ArtworkPage for FakePage {
    async fn observe_requests(&self, origin: &str) -> anyhow::Result<RequestLog> {
        let log = RequestLog::new(origin);
        *self.log.lock().unwrap() = Some(log.clone());
        Ok(log)
    }

    async fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.counters.visited.lock().unwrap().push(url.to_string());
        *self.url.lock().unwrap() = Some(url.to_string());

        let log = self.log.lock().unwrap().clone();
        if let Some(log) = log {
            for (i, served) in self.fixture.served.keys().enumerate() {
                log.record(served, &format!("req-{}", i)).await;
            }
        }
        Ok(())
    }

    async fn current_url(&self) -> anyhow::Result<Option<String>> {
        let mut polls = self.url_polls.lock().unwrap();
        if polls.len() > 1 {
            return Ok(polls.pop_front());
        }
        if let Some(last) = polls.front() {
            return Ok(Some(last.clone()));
        }
        Ok(self.url.lock().unwrap().clone())
    }

    async fn count(&self, selector: &str) -> anyhow::Result<usize> {
        Ok(match selector {
            PREVIEW_SELECTOR => usize::from(self.fixture.preview),
            s if Self::is_image_selector(s) => self.visible(),
            _ => 0,
        })
    }

    async fn count_containing(&self, selector: &str, text: &str) -> anyhow::Result<usize> {
        Ok(usize::from(
            selector == SENSITIVE_SELECTOR && text == SENSITIVE_TEXT && self.fixture.sensitive,
        ))
    }

    async fn text_contents(&self, selector: &str) -> anyhow::Result<Vec<String>> {
        Ok(match selector {
            DESCRIPTION_SELECTOR => self.fixture.description.clone(),
            TAGS_SELECTOR => self.fixture.tags.clone(),
            _ => Vec::new(),
        })
    }

    async fn inner_texts(&self, selector: &str) -> anyhow::Result<Vec<String>> {
        Ok(match selector {
            AUTHOR_SELECTOR => self.fixture.author.iter().cloned().collect(),
            _ => Vec::new(),
        })
    }

    async fn attributes(&self, selector: &str, name: &str) -> anyhow::Result<Vec<Option<String>>> {
        Ok(match (selector, name) {
            (CREATED_AT_SELECTOR, "datetime") => self
                .fixture
                .created_at
                .iter()
                .map(|c| Some(c.clone()))
                .collect(),
            (AUTHOR_SELECTOR, "href") => vec![self.fixture.author_link.clone()],
            (s, "src") if Self::is_image_selector(s) => self.fixture.images[..self.visible()]
                .iter()
                .map(|src| Some(src.clone()))
                .collect(),
            _ => Vec::new(),
        })
    }

    async fn texts_matching(&self, needles: &[&str]) -> anyhow::Result<Vec<String>> {
        Ok(self
            .fixture
            .labels
            .iter()
            .filter(|label| needles.iter().any(|n| label.contains(n)))
            .cloned()
            .collect())
    }

    async fn click_text(&self, text: &str, force: bool) -> anyhow::Result<()> {
        self.counters
            .clicks
            .lock()
            .unwrap()
            .push((text.to_string(), force));
        if self.fixture.click_fails {
            anyhow::bail!("element {:?} is not clickable", text);
        }
        Ok(())
    }

    async fn scroll_last_into_view(&self, _selector: &str) -> anyhow::Result<bool> {
        self.counters.scrolls.fetch_add(1, Ordering::SeqCst);
        let had_items = self.visible() > 0;
        *self.step.lock().unwrap() += 1;
        Ok(had_items)
    }

    async fn scroll_extent(&self) -> anyhow::Result<i64> {
        Ok(self.visible() as i64 * 1000)
    }

    async fn response_body(&self, request: &RequestHandle) -> anyhow::Result<Vec<u8>> {
        self.fixture
            .served
            .get(&request.url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no body for {}", request.url))
    }

    async fn credential(&self) -> anyhow::Result<SessionCredential> {
        Ok(self.fixture.cookies.clone())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one fixture per opened page, in order. Runs out like a
/// browser that went away.
#[derive(Default)]
pub struct FakeBrowser {
    fixtures: Mutex<VecDeque<Fixture>>,
    pub counters: Arc<Counters>,
}

impl FakeBrowser {
    pub fn new(fixtures: Vec<Fixture>) -> Self {
        Self {
            fixtures: Mutex::new(fixtures.into()),
            counters: Arc::new(Counters::default()),
        }
    }
}

#[async_trait]
impl PageSource for FakeBrowser {
    async fn open_page(
        &self,
        credential: Option<&SessionCredential>,
    ) -> anyhow::Result<Box<dyn ArtworkPage>> {
        let fixture = self
            .fixtures
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("browser connection lost"))?;

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        self.counters
            .credentials
            .lock()
            .unwrap()
            .push(credential.cloned());
        Ok(Box::new(FakePage::new(fixture, self.counters.clone())))
    }
}

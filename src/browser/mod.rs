//! Chrome-backed page source.
//!
//! Uses chromiumoxide (CDP) to launch Chrome or attach to a running one.
//! Pages are opened with the current session cookies already installed and
//! report the image requests they make.

mod cookies;
#[cfg(feature = "browser")]
mod page;
#[cfg(feature = "browser")]
mod stealth;

pub use cookies::{load_cookie_file, parse_cookie_list};
#[cfg(feature = "browser")]
pub use page::CdpPage;

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Handler};
#[cfg(feature = "browser")]
use futures::StreamExt;

use crate::config::BrowserEngineConfig;
use crate::extract::{ArtworkPage, PageSource};
use crate::models::SessionCredential;

/// A launched or attached browser and the task pumping its CDP connection.
#[cfg(feature = "browser")]
struct Running {
    browser: Browser,
    handler: JoinHandle<()>,
    /// Attached browsers belong to someone else and are left running.
    remote: bool,
}

/// Opens artwork pages on one shared Chrome instance, started on first use.
#[cfg(feature = "browser")]
pub struct BrowserFetcher {
    config: BrowserEngineConfig,
    /// URLs whose cookies form the session credential.
    cookie_urls: Vec<String>,
    running: Mutex<Option<Running>>,
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    const CHROME_COMMANDS: &'static [&'static str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    pub fn new(config: BrowserEngineConfig, cookie_urls: Vec<String>) -> Self {
        Self {
            config,
            cookie_urls,
            running: Mutex::new(None),
        }
    }

    /// Find Chrome: configured path first, then well-known locations, then PATH.
    fn find_chrome(&self) -> Result<std::path::PathBuf> {
        if let Some(path) = &self.config.executable_path {
            if path.exists() {
                return Ok(path.clone());
            }
            anyhow::bail!("Configured Chrome executable not found: {}", path.display());
        }

        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in Self::CHROME_COMMANDS {
            if let Ok(path) = which::which(cmd) {
                info!("Found Chrome in PATH: {}", path.display());
                return Ok(path);
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or set CHROMIUM_EXEC_PATH:\n\
             - Arch/Manjaro: sudo pacman -S chromium\n\
             - Ubuntu/Debian: sudo apt install chromium-browser\n\
             - Fedora: sudo dnf install chromium"
        ))
    }

    fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
            debug!("Browser connection closed");
        })
    }

    async fn launch(&self) -> Result<Running> {
        if let Some(remote_url) = &self.config.remote_url {
            return self.connect_remote(remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = self.find_chrome()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(self.config.timeout));

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-sync")
            .arg("--disable-translate");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        Ok(Running {
            browser,
            handler: Self::spawn_handler(handler),
            remote: false,
        })
    }

    /// Connect to a remote Chrome instance.
    async fn connect_remote(&self, url: &str) -> Result<Running> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.timeout
        );

        let mut http_url = url::Url::parse(url).context("Invalid remote browser URL")?;
        let scheme = match http_url.scheme() {
            "ws" | "http" => "http",
            "wss" | "https" => "https",
            other => anyhow::bail!("Unsupported remote browser scheme: {}", other),
        };
        http_url
            .set_scheme(scheme)
            .map_err(|_| anyhow::anyhow!("Cannot rewrite scheme of {}", url))?;
        let version_url = http_url
            .join("/json/version")
            .context("Invalid remote browser URL")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.config.timeout))
            .build()?;
        let resp: serde_json::Value = client
            .get(version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };

        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        Ok(Running {
            browser,
            handler: Self::spawn_handler(handler),
            remote: true,
        })
    }

    async fn new_blank_page(&self) -> Result<chromiumoxide::Page> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| r.handler.is_finished()) {
            anyhow::bail!("Browser connection was lost");
        }
        if running.is_none() {
            *running = Some(self.launch().await?);
        }
        let running = running
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("browser not initialized"))?;

        running
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to open a browser page")
    }

    /// Close the browser. Attached remote browsers are only disconnected.
    pub async fn close(&self) {
        let Some(mut running) = self.running.lock().await.take() else {
            return;
        };

        if !running.remote {
            if let Err(e) = running.browser.close().await {
                debug!("Failed to close browser: {}", e);
            }
            if let Err(e) = running.browser.wait().await {
                debug!("Failed to wait for browser exit: {}", e);
            }
        }
        running.handler.abort();
        info!("Browser closed");
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSource for BrowserFetcher {
    async fn open_page(
        &self,
        credential: Option<&SessionCredential>,
    ) -> Result<Box<dyn ArtworkPage>> {
        let page = self.new_blank_page().await?;

        let prepared = async {
            if let Some(ua) = &self.config.user_agent {
                page.execute(SetUserAgentOverrideParams::new(ua.clone()))
                    .await?;
            }
            if let Some(credential) = credential {
                let params = cookies::to_cookie_params(credential);
                if !params.is_empty() {
                    page.set_cookies(params)
                        .await
                        .context("Failed to install session cookies")?;
                }
            }
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = prepared {
            let _ = page.close().await;
            return Err(e);
        }

        Ok(Box::new(CdpPage::new(
            page,
            page::PageOptions {
                timeout: Duration::from_secs(self.config.timeout),
                stealth: self.config.stealth,
                cookie_urls: self.cookie_urls.clone(),
            },
        )))
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher {
    _config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(config: BrowserEngineConfig, _cookie_urls: Vec<String>) -> Self {
        Self { _config: config }
    }

    pub async fn close(&self) {}
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageSource for BrowserFetcher {
    async fn open_page(
        &self,
        _credential: Option<&SessionCredential>,
    ) -> Result<Box<dyn ArtworkPage>> {
        Err(anyhow::anyhow!(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
        ))
    }
}

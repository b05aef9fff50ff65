//! Browser engine configuration.
//!
//! Always compiled, so config files parse the same with or without the
//! `browser` feature.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How Chrome is launched or reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrowserEngineConfig {
    /// Run without a window. Off by default: logins are done by hand in the
    /// visible browser.
    pub headless: bool,

    /// Chrome/Chromium binary. Discovered when unset.
    pub executable_path: Option<PathBuf>,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,

    /// JSON cookie list installed into the first pages of a run.
    pub cookies_file: Option<PathBuf>,

    /// CDP request and page-ready timeout in seconds.
    pub timeout: u64,

    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    pub remote_url: Option<String>,

    /// Apply the navigator patches after each navigation.
    pub stealth: bool,

    /// User agent override; Chrome's own when unset.
    pub user_agent: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: false,
            executable_path: None,
            proxy: None,
            cookies_file: None,
            timeout: default_timeout(),
            chrome_args: Vec::new(),
            remote_url: None,
            stealth: true,
            user_agent: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `SOCKS_PROXY` - proxy for browser traffic, when none is configured
    /// - `CHROMIUM_EXEC_PATH` - Chrome binary, when none is configured;
    ///   `PLAYWRIGHT_CHROMIUM_EXEC_PATH` is read when it is unset
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| {
            lookup(key)
                .map(|val| val.trim().to_string())
                .filter(|val| !val.is_empty())
        };

        if let Some(url) = var("BROWSER_URL") {
            self.remote_url = Some(url);
        }

        if self.proxy.is_none() {
            self.proxy = var("SOCKS_PROXY");
        }

        if self.executable_path.is_none() {
            self.executable_path = EXEC_PATH_VARS
                .iter()
                .find_map(|&key| var(key))
                .map(PathBuf::from);
        }

        self
    }
}

/// Checked in order for the Chrome binary.
const EXEC_PATH_VARS: &[&str] = &["CHROMIUM_EXEC_PATH", "PLAYWRIGHT_CHROMIUM_EXEC_PATH"];

pub fn default_timeout() -> u64 {
    30
}

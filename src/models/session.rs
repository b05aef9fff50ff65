//! Authenticated browser session snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cookie extracted from a browser session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Cookies captured after a successful login, replayed into every new page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub cookies: Vec<BrowserCookie>,
    pub captured_at: DateTime<Utc>,
}

impl SessionCredential {
    pub fn new(cookies: Vec<BrowserCookie>) -> Self {
        Self {
            cookies,
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

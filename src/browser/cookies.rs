//! Cookie files and conversions between CDP cookies and session credentials.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{BrowserCookie, SessionCredential};

/// One entry of an exported cookie list. Exporters disagree on field
/// names, so a few aliases are accepted.
#[derive(Debug, Deserialize)]
struct CookieEntry {
    #[serde(alias = "key")]
    name: Option<String>,
    value: Option<String>,
    domain: Option<String>,
    path: Option<String>,
    #[serde(default)]
    secure: bool,
    #[serde(default, alias = "httpOnly")]
    http_only: bool,
}

/// Parse a JSON cookie list. Entries without a name or domain are skipped.
pub fn parse_cookie_list(json: &str) -> Result<SessionCredential> {
    let entries: Vec<CookieEntry> =
        serde_json::from_str(json).context("Cookie file is not a JSON cookie list")?;

    let cookies: Vec<BrowserCookie> = entries
        .into_iter()
        .filter_map(|entry| {
            let name = entry.name.filter(|n| !n.is_empty())?;
            let domain = entry.domain.filter(|d| !d.is_empty())?;
            Some(BrowserCookie {
                name,
                value: entry.value.unwrap_or_default(),
                domain,
                path: entry.path.unwrap_or_else(|| "/".to_string()),
                secure: entry.secure,
                http_only: entry.http_only,
            })
        })
        .collect();

    Ok(SessionCredential::new(cookies))
}

/// Load the initial credential from a cookie file. The file is only read.
pub fn load_cookie_file(path: &Path) -> Result<Option<SessionCredential>> {
    if !path.exists() {
        warn!("Cookie file {} not found; starting without a session", path.display());
        return Ok(None);
    }
    debug!("Loading cookies from {}", path.display());

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read cookie file {}", path.display()))?;
    let credential = parse_cookie_list(&content)?;
    if credential.is_empty() {
        warn!("Cookie file {} holds no usable cookies", path.display());
        return Ok(None);
    }
    Ok(Some(credential))
}

#[cfg(feature = "browser")]
pub(crate) use cdp::{from_cdp_cookies, to_cookie_params};

#[cfg(feature = "browser")]
mod cdp {
    use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
    use tracing::warn;

    use crate::models::{BrowserCookie, SessionCredential};

    pub(crate) fn to_cookie_params(credential: &SessionCredential) -> Vec<CookieParam> {
        credential
            .cookies
            .iter()
            .filter_map(|cookie| {
                let param = CookieParam::builder()
                    .name(cookie.name.clone())
                    .value(cookie.value.clone())
                    .domain(cookie.domain.clone())
                    .path(cookie.path.clone())
                    .secure(cookie.secure)
                    .http_only(cookie.http_only)
                    .build();
                match param {
                    Ok(param) => Some(param),
                    Err(e) => {
                        warn!("Failed to build cookie {}: {}", cookie.name, e);
                        None
                    }
                }
            })
            .collect()
    }

    pub(crate) fn from_cdp_cookies(cookies: &[Cookie]) -> SessionCredential {
        SessionCredential::new(
            cookies
                .iter()
                .map(|c| BrowserCookie {
                    name: c.name.clone(),
                    value: c.value.clone(),
                    domain: c.domain.clone(),
                    path: c.path.clone(),
                    secure: c.secure,
                    http_only: c.http_only,
                })
                .collect(),
        )
    }
}

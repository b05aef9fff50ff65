//! Artwork models: identifiers, page variants and the extracted record.
//!
//! An `ArtworkRecord` is assembled once per successful extraction and handed
//! to an `ArtworkSink`; nothing in here is cached across artworks.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static ARTWORK_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"www\.pixiv\.net/en/artworks/([0-9]+)").expect("artwork id pattern is valid")
});

/// Returned when a URL does not carry an artwork identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no artwork id in url: {0:?}")]
pub struct InvalidArtworkUrl(pub String);

/// Numeric identifier of one artwork, kept as the digit string from the URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtworkId(String);

impl ArtworkId {
    /// Accepts only non-empty ASCII digit strings.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An artwork page URL together with the id extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtworkUrl {
    raw: String,
    id: ArtworkId,
}

impl ArtworkUrl {
    /// Parse a URL, rejecting anything without exactly one artwork id match.
    pub fn parse(raw: &str) -> Result<Self, InvalidArtworkUrl> {
        let raw = raw.trim();
        let id = ARTWORK_ID_PATTERN
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .and_then(|m| ArtworkId::new(m.as_str()))
            .ok_or_else(|| InvalidArtworkUrl(raw.to_string()))?;

        Ok(Self {
            raw: raw.to_string(),
            id,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn id(&self) -> &ArtworkId {
        &self.id
    }
}

impl fmt::Display for ArtworkUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Structural category of an artwork page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageVariant {
    /// Content hidden behind login.
    Sensitive,
    /// One image, no pagination.
    Single,
    /// Multi-image post paginated behind a "Show all" action.
    Album,
    /// Chapter-style post opened through "Reading works".
    Reading,
}

impl PageVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sensitive => "sensitive",
            Self::Single => "single",
            Self::Album => "album",
            Self::Reading => "reading",
        }
    }
}

impl fmt::Display for PageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bytes the browser received for one image request.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub source_url: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRecord")
            .field("source_url", &self.source_url)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Images that make up one logical output image.
///
/// A group with more than one member is a composite: its parts are stitched
/// vertically, in order, before being written under `name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGroup {
    /// Relative output path, e.g. `./images/12345_p0.jpg`.
    pub name: String,
    pub images: Vec<ImageRecord>,
}

impl ImageGroup {
    pub fn is_composite(&self) -> bool {
        self.images.len() > 1
    }
}

/// Everything extracted from one artwork page.
#[derive(Debug, Clone)]
pub struct ArtworkRecord {
    pub id: ArtworkId,
    pub url: ArtworkUrl,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
    pub author_link: Option<String>,
    pub tags: Vec<String>,
    pub image_groups: Vec<ImageGroup>,
    pub fetched_at: DateTime<Utc>,
}

impl ArtworkRecord {
    /// Total number of captured images across all groups.
    pub fn image_count(&self) -> usize {
        self.image_groups.iter().map(|g| g.images.len()).sum()
    }
}

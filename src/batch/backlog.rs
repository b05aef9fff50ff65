//! Backlog of artwork URLs and the lazy cursor over it.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::ProcessedSet;
use crate::models::{ArtworkId, ArtworkUrl};

#[derive(Debug, Error)]
pub enum BacklogError {
    #[error("failed to read backlog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ordered list of URLs read once at startup.
#[derive(Debug, Clone, Default)]
pub struct Backlog {
    entries: Vec<String>,
}

impl Backlog {
    /// Newline-delimited URLs. Blank lines are dropped; order is kept.
    pub fn from_lines(text: &str) -> Self {
        Self {
            entries: text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, BacklogError> {
        let text = std::fs::read_to_string(path).map_err(|source| BacklogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_lines(&text))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn pending(&self) -> PendingUrls<'_> {
        PendingUrls {
            backlog: self,
            position: 0,
        }
    }
}

/// One step of the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull {
    /// Needs extraction.
    Runnable(ArtworkUrl),
    /// Already persisted; no network work.
    Skipped(ArtworkUrl),
    /// No artwork id could be parsed.
    Malformed(String),
}

impl Pull {
    pub fn id(&self) -> Option<&ArtworkId> {
        match self {
            Self::Runnable(url) | Self::Skipped(url) => Some(url.id()),
            Self::Malformed(_) => None,
        }
    }
}

/// Left-to-right cursor over a backlog.
///
/// The processed set is consulted when an entry is pulled, not when the
/// cursor is created, so ids completed by earlier batches are skipped too.
/// Restarting means creating a new cursor against a freshly scanned set.
#[derive(Debug, Clone)]
pub struct PendingUrls<'a> {
    backlog: &'a Backlog,
    position: usize,
}

impl PendingUrls<'_> {
    pub fn next_pull(&mut self, processed: &ProcessedSet) -> Option<Pull> {
        let raw = self.backlog.entries.get(self.position)?;
        self.position += 1;

        Some(match ArtworkUrl::parse(raw) {
            Ok(url) if processed.contains(url.id()) => Pull::Skipped(url),
            Ok(url) => Pull::Runnable(url),
            Err(_) => Pull::Malformed(raw.clone()),
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.position >= self.backlog.entries.len()
    }

    pub fn remaining(&self) -> usize {
        self.backlog.entries.len().saturating_sub(self.position)
    }
}

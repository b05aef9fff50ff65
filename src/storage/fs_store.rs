//! One directory per artwork under a dated output tree.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{stitch_vertical, ArtworkSink, StoreError, INDEX_FILE};
use crate::models::{ArtworkRecord, ImageGroup};

/// Contents of `index.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub url: String,
    pub id: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub author: String,
    pub author_url: Option<String>,
    /// Paths relative to the artwork directory, e.g. `./images/123.jpg`.
    pub images: Vec<String>,
    pub last_fetched_at: DateTime<Utc>,
    pub tags: IndexTags,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexTags {
    pub original_tags: Vec<String>,
}

impl From<&ArtworkRecord> for IndexDocument {
    fn from(record: &ArtworkRecord) -> Self {
        Self {
            url: record.url.to_string(),
            id: record.id.to_string(),
            text: record.text.clone(),
            date: record.created_at,
            author: record.author.clone(),
            author_url: record.author_link.clone(),
            images: record.image_groups.iter().map(|g| g.name.clone()).collect(),
            last_fetched_at: record.fetched_at,
            tags: IndexTags {
                original_tags: record.tags.clone(),
            },
        }
    }
}

/// `yy-mm-dd` folder name for a creation time, taken in UTC.
pub fn date_folder(created_at: &DateTime<Utc>) -> String {
    created_at.format("%y-%m-%d").to_string()
}

/// `<root>/<yy-mm-dd>/<id>`
pub fn artwork_dir(root: &Path, record: &ArtworkRecord) -> PathBuf {
    root.join(date_folder(&record.created_at))
        .join(record.id.as_str())
}

/// Resolve a group name like `./images/a.jpg` below `dir`, refusing anything
/// that would escape it.
fn group_path(dir: &Path, name: &str) -> Result<PathBuf, StoreError> {
    let relative = Path::new(name);
    let mut path = dir.to_path_buf();
    let mut has_file = false;
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                path.push(part);
                has_file = true;
            }
            _ => return Err(StoreError::InvalidImageName(name.to_string())),
        }
    }
    if !has_file {
        return Err(StoreError::InvalidImageName(name.to_string()));
    }
    Ok(path)
}

fn write_group(dir: &Path, group: &ImageGroup) -> Result<PathBuf, StoreError> {
    let path = group_path(dir, &group.name)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
    }

    match group.images.as_slice() {
        [] => return Err(StoreError::EmptyGroup(group.name.clone())),
        [single] => std::fs::write(&path, &single.bytes).map_err(StoreError::io(&path))?,
        parts => {
            debug!("Stitching {} parts into {}", parts.len(), group.name);
            let parts: Vec<Vec<u8>> = parts.iter().map(|p| p.bytes.clone()).collect();
            let stitched = stitch_vertical(&group.name, &parts)?;
            std::fs::write(&path, stitched).map_err(StoreError::io(&path))?;
        }
    }
    Ok(path)
}

fn write_artwork(dir: &Path, record: &ArtworkRecord) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir).map_err(StoreError::io(dir))?;

    for group in &record.image_groups {
        write_group(dir, group)?;
    }

    // The index goes last and is renamed into place: its presence is what
    // marks the artwork as processed.
    let yaml = serde_yaml::to_string(&IndexDocument::from(record))?;
    let tmp = dir.join(format!("{}.tmp", INDEX_FILE));
    let index = dir.join(INDEX_FILE);
    std::fs::write(&tmp, yaml).map_err(StoreError::io(&tmp))?;
    std::fs::rename(&tmp, &index).map_err(StoreError::io(&index))?;
    Ok(())
}

/// Writes artworks below `root`.
#[derive(Debug, Clone)]
pub struct FsArtworkStore {
    root: PathBuf,
}

impl FsArtworkStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtworkSink for FsArtworkStore {
    async fn persist(&self, record: ArtworkRecord) -> Result<PathBuf, StoreError> {
        let dir = artwork_dir(&self.root, &record);
        let target = dir.clone();
        tokio::task::spawn_blocking(move || write_artwork(&target, &record)).await??;

        info!("Wrote {}", dir.join(INDEX_FILE).display());
        Ok(dir)
    }
}

//! Persistence of extracted artworks.
//!
//! The extraction core hands finished records to an [`ArtworkSink`]; the
//! filesystem implementation lays them out as one directory per artwork.

mod fs_store;
mod stitch;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ArtworkRecord;

pub use fs_store::{artwork_dir, date_folder, FsArtworkStore, IndexDocument, IndexTags};
pub use stitch::stitch_vertical;

/// File whose presence marks an artwork directory as complete.
pub const INDEX_FILE: &str = "index.yaml";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize index: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to process image {name}: {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("image group {0:?} has no images")]
    EmptyGroup(String),

    #[error("refusing to write image outside the artwork directory: {0:?}")]
    InvalidImageName(String),

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

/// Destination for finished artwork records.
#[async_trait]
pub trait ArtworkSink: Send + Sync {
    /// Persist a record; returns the directory it was written to.
    async fn persist(&self, record: ArtworkRecord) -> Result<PathBuf, StoreError>;
}

//! Data models for artwork acquisition.

mod artwork;
mod session;

pub use artwork::{
    ArtworkId, ArtworkRecord, ArtworkUrl, ImageGroup, ImageRecord, InvalidArtworkUrl, PageVariant,
};
pub use session::{BrowserCookie, SessionCredential};

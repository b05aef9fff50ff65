//! Batch processing of an artwork backlog.
//!
//! The driver walks the backlog in small concurrent batches, skips ids that
//! already have output, and keeps going when individual URLs fail.

mod backlog;
mod driver;
mod events;
mod processed;

pub use backlog::{Backlog, BacklogError, PendingUrls, Pull};
pub use driver::{BatchDriver, BatchReport, BatchSettings, FailedUrl, UrlOutcome};
pub use events::BatchEvent;
pub use processed::ProcessedSet;

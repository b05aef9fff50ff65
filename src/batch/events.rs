//! Progress events emitted by the batch driver.

/// Sent over an optional channel so a front end can render progress without
/// the driver knowing how.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        total: usize,
        already_processed: usize,
    },
    ItemStarted {
        url: String,
    },
    ItemProcessed {
        url: String,
        images: usize,
    },
    ItemSkipped {
        url: String,
    },
    ItemFailed {
        url: String,
        error: String,
    },
    Sleeping {
        seconds: f64,
    },
    Finished {
        processed: usize,
        skipped: usize,
        failed: usize,
        aborted: bool,
    },
}

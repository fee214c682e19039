//! Progress events emitted by the enrichment pipeline.

use dailydigest_shared::{DigestError, Stories};

/// Event sink for pipeline progress.
///
/// The pipeline fires and forgets: delivery happens inline on whichever task
/// produced the event, and the consumer is responsible for its own liveness
/// check before acting on a delivered event. Implementations must not block.
pub trait DigestObserver: Send + Sync {
    /// The digest is available; titles can render before images and bodies
    /// arrive.
    fn base_ready(&self, date: &str, stories: &Stories);

    /// One story's lead image landed. Keyed by `story_id` — image fetches run
    /// independently and complete in any order.
    fn image_updated(&self, story_id: i64, image: &[u8]);

    /// All bodies resolved; `stories` is the final digest snapshot.
    fn finished(&self, date: &str, stories: &Stories);

    /// The pipeline run for this date failed. Reported once per run.
    fn failed(&self, date: &str, error: &DigestError);
}

/// No-op observer for headless/test usage.
pub struct SilentObserver;

impl DigestObserver for SilentObserver {
    fn base_ready(&self, _date: &str, _stories: &Stories) {}
    fn image_updated(&self, _story_id: i64, _image: &[u8]) {}
    fn finished(&self, _date: &str, _stories: &Stories) {}
    fn failed(&self, _date: &str, _error: &DigestError) {}
}

//! Progressive-enrichment pipeline: resolve digest → images → bodies.
//!
//! One [`DigestPipeline::load`] call drives a date from lookup to fully
//! enriched, emitting progress events as data lands:
//!
//! 1. validate the date key (rejected before any fetch),
//! 2. resolve the digest through the cache (single-flight on a miss),
//! 3. emit `base_ready` with the digest as-is,
//! 4. spawn one independent fetch task per missing lead image — a per-story
//!    failure is logged and skipped, never fatal,
//! 5. fetch missing bodies sequentially on this task — any failure fails the
//!    run for this date (progress already delivered stands),
//! 6. await outstanding image tasks, emit `finished` with the digest re-read
//!    from the cache.
//!
//! Two digest-level notifications reach the consumer per run (`base_ready`
//! and `finished`), plus one `image_updated` per image that lands.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, info, instrument, warn};

use dailydigest_cache::{Lookup, StoryCache, StoryUpdate};
use dailydigest_fetch::Fetcher;
use dailydigest_shared::{DigestError, Result, Stories, parse_date_key};

use crate::events::DigestObserver;

/// Orchestrates digest resolution and enrichment against one cache and one
/// fetcher. Cheap to clone; clones share both.
#[derive(Clone)]
pub struct DigestPipeline {
    fetcher: Arc<Fetcher>,
    cache: StoryCache,
}

impl DigestPipeline {
    /// Build a pipeline over a fetcher and a (possibly restored) cache.
    pub fn new(fetcher: Fetcher, cache: StoryCache) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            cache,
        }
    }

    /// The cache this pipeline populates.
    pub fn cache(&self) -> &StoryCache {
        &self.cache
    }

    /// Load and enrich the digest for `date`, emitting events on `observer`.
    ///
    /// Returns the final digest. Terminal failures are also delivered as one
    /// `failed` event, so channel-style consumers never need the return
    /// value.
    #[instrument(skip(self, observer))]
    pub async fn load(&self, date: &str, observer: Arc<dyn DigestObserver>) -> Result<Stories> {
        match self.run(date, &observer).await {
            Ok(stories) => Ok(stories),
            Err(e) => {
                observer.failed(date, &e);
                Err(e)
            }
        }
    }

    async fn run(&self, date: &str, observer: &Arc<dyn DigestObserver>) -> Result<Stories> {
        let date_num = parse_date_key(date)?;
        self.cache.set_current_date(date_num);

        let stories = self.resolve_digest(date).await?;
        observer.base_ready(date, &stories);

        let image_tasks = self.spawn_image_fetches(date, &stories, observer);
        let bodies = self.fetch_bodies(date, &stories).await;

        // Image flights always run to completion, pass or fail; only then is
        // a body failure propagated — images already emitted stand.
        for handle in image_tasks {
            if let Err(e) = handle.await {
                warn!(%date, error = %e, "image task did not finish cleanly");
            }
        }
        bodies?;

        // Re-read so the final event carries everything enrichment wrote. If
        // the digest was evicted mid-run by unrelated inserts, fall back to
        // the base copy.
        let finished = self.cache.get(date).unwrap_or(stories);
        observer.finished(date, &finished);
        info!(%date, stories = finished.stories.len(), "digest load complete");
        Ok(finished)
    }

    /// Cache lookup with single-flight fetch on a miss. On a fetch error the
    /// reservation is released and nothing is cached, so a later request
    /// retries.
    async fn resolve_digest(&self, date: &str) -> Result<Stories> {
        match self.cache.get_or_join(date).await? {
            Lookup::Hit(stories) => {
                debug!(%date, "digest resolved from cache");
                Ok(stories)
            }
            Lookup::Reserved(ticket) => match self.fetcher.fetch_digest(date).await {
                Ok(stories) => {
                    ticket.complete(stories.clone());
                    Ok(stories)
                }
                Err(e) => {
                    ticket.fail(e.clone());
                    Err(e)
                }
            },
        }
    }

    /// Launch one task per story still missing its lead image, in display
    /// order. Each task fetches, stores the blob, and notifies — a failure
    /// leaves that story's image empty and touches nothing else.
    fn spawn_image_fetches(
        &self,
        date: &str,
        stories: &Stories,
        observer: &Arc<dyn DigestObserver>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let mut tasks = Vec::new();

        for story in &stories.stories {
            if story.has_image() {
                continue;
            }
            let Some(candidate) = story.first_image_candidate() else {
                continue;
            };

            let url = candidate.to_string();
            let story_id = story.id;
            let date = date.to_string();
            let fetcher = self.fetcher.clone();
            let cache = self.cache.clone();
            let observer = observer.clone();

            tasks.push(tokio::spawn(async move {
                match fetcher.fetch_bytes(&url).await {
                    Ok(bytes) => {
                        let blob = BASE64.encode(&bytes);
                        if cache.update_story(&date, story_id, StoryUpdate::Image(blob)) {
                            observer.image_updated(story_id, &bytes);
                        }
                    }
                    Err(e) => {
                        warn!(%date, story_id, error = %e, "image fetch failed, leaving empty");
                    }
                }
            }));
        }

        debug!(%date, count = tasks.len(), "image fetches launched");
        tasks
    }

    /// Fetch missing bodies sequentially, in display order. This pass is
    /// load-bearing for display: the first failure fails the run.
    async fn fetch_bodies(&self, date: &str, stories: &Stories) -> Result<()> {
        for story in &stories.stories {
            if story.has_body() {
                continue;
            }
            let body = self.fetcher.fetch_text(&story.url).await?;
            self.cache
                .update_story(date, story.id, StoryUpdate::Body(body));
        }
        Ok(())
    }
}

//! Bounded, concurrency-safe story cache with single-flight fetch dedup.
//!
//! [`StoryCache`] is the one piece of mutable state shared between concurrent
//! enrichment workers. It is a date-keyed digest store with:
//! - strict LRU eviction by **insertion** time (reads and partial mutations
//!   never refresh recency),
//! - at most one in-flight fetch per date key — the first caller of an
//!   uncached date receives a [`FetchTicket`] and owns the fetch, later
//!   callers wait on the same flight and share its outcome,
//! - in-place, at-most-once updates to a cached story's image blob and body.
//!
//! All operations are atomic with respect to each other: a single mutex
//! guards the map+deque pair, and the lock is never held across an await.
//! Callers only ever receive clones, never references into cache internals.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use dailydigest_shared::{CacheSnapshot, DigestError, MAX_CACHE_SIZE, Result, Stories};

/// Outcome of a fetch flight, broadcast to every waiter.
type FlightOutcome = Option<std::result::Result<Stories, DigestError>>;

// ---------------------------------------------------------------------------
// Lookup / StoryUpdate
// ---------------------------------------------------------------------------

/// Result of [`StoryCache::get_or_join`].
pub enum Lookup {
    /// The digest was already cached (or another caller's fetch for the same
    /// date just completed).
    Hit(Stories),
    /// This caller is the first for an uncached date and owns the fetch.
    Reserved(FetchTicket),
}

/// An in-place update to one field of one cached story.
#[derive(Debug, Clone)]
pub enum StoryUpdate {
    /// Base64-encoded lead image bytes.
    Image(String),
    /// Full article body text.
    Body(String),
}

// ---------------------------------------------------------------------------
// StoryCache
// ---------------------------------------------------------------------------

struct CacheInner {
    latest_date: u32,
    current_date: u32,
    /// Date keys in insertion order, oldest first. Always the exact key set
    /// of `by_date`.
    lru: VecDeque<String>,
    by_date: BTreeMap<String, Stories>,
    /// One watch channel per date with a fetch in flight.
    in_flight: HashMap<String, watch::Sender<FlightOutcome>>,
    capacity: usize,
}

impl CacheInner {
    /// Insert a digest, appending to the LRU tail and evicting the single
    /// oldest entry while over capacity.
    fn insert(&mut self, date: String, stories: Stories) {
        if self.by_date.insert(date.clone(), stories).is_none() {
            self.lru.push_back(date);
        }
        while self.by_date.len() > self.capacity {
            match self.lru.pop_front() {
                Some(oldest) => {
                    self.by_date.remove(&oldest);
                    debug!(date = %oldest, "evicted oldest digest");
                }
                None => break,
            }
        }
    }
}

/// Bounded digest cache shared between enrichment workers. Cheap to clone;
/// clones share the same state.
#[derive(Clone)]
pub struct StoryCache {
    inner: Arc<Mutex<CacheInner>>,
}

impl StoryCache {
    /// Create an empty cache holding at most [`MAX_CACHE_SIZE`] digests.
    pub fn new() -> Self {
        Self::with_capacity(MAX_CACHE_SIZE)
    }

    /// Create an empty cache with an explicit capacity (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                latest_date: 0,
                current_date: 0,
                lru: VecDeque::new(),
                by_date: BTreeMap::new(),
                in_flight: HashMap::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// Restore a cache from a persisted snapshot, sanitizing its invariants:
    /// LRU keys with no digest are dropped, digest keys missing from the LRU
    /// are appended, duplicates are removed, and the result is trimmed to
    /// `capacity` oldest-first.
    pub fn restore(snapshot: CacheSnapshot, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut by_date = snapshot.by_date;
        let mut lru: VecDeque<String> = VecDeque::new();

        for date in snapshot.lru {
            if by_date.contains_key(&date) && !lru.contains(&date) {
                lru.push_back(date);
            }
        }
        for date in by_date.keys() {
            if !lru.contains(date) {
                warn!(%date, "snapshot digest missing from LRU order, appending");
                lru.push_back(date.clone());
            }
        }
        while lru.len() > capacity {
            if let Some(oldest) = lru.pop_front() {
                by_date.remove(&oldest);
            }
        }

        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                latest_date: snapshot.latest_date,
                current_date: snapshot.current_date,
                lru,
                by_date,
                in_flight: HashMap::new(),
                capacity,
            })),
        }
    }

    /// Lock the cache state, recovering from a poisoned lock (a panic in a
    /// critical section leaves the state usable for other workers).
    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up `date`, reserving the fetch on a miss.
    ///
    /// The first caller for an uncached date gets [`Lookup::Reserved`] and is
    /// responsible for fetching and then calling [`FetchTicket::complete`] or
    /// [`FetchTicket::fail`]. Concurrent callers for the same date wait on
    /// that flight and receive the resulting digest as [`Lookup::Hit`], or
    /// the flight's error. Errors are never cached: after a failed flight the
    /// next caller reserves a fresh fetch.
    pub async fn get_or_join(&self, date: &str) -> Result<Lookup> {
        loop {
            let mut rx = {
                let mut inner = self.lock();
                if let Some(stories) = inner.by_date.get(date) {
                    return Ok(Lookup::Hit(stories.clone()));
                }
                match inner.in_flight.get(date) {
                    Some(tx) => tx.subscribe(),
                    None => {
                        let (tx, _rx) = watch::channel(None);
                        inner.in_flight.insert(date.to_string(), tx);
                        debug!(%date, "reserved fetch");
                        return Ok(Lookup::Reserved(FetchTicket {
                            cache: self.clone(),
                            date: date.to_string(),
                            armed: true,
                        }));
                    }
                }
            };

            debug!(%date, "joining in-flight fetch");
            loop {
                if let Some(outcome) = rx.borrow_and_update().as_ref() {
                    return match outcome {
                        Ok(stories) => Ok(Lookup::Hit(stories.clone())),
                        Err(e) => Err(e.clone()),
                    };
                }
                if rx.changed().await.is_err() {
                    // Sender vanished without publishing an outcome; start
                    // over from the top-level lookup.
                    break;
                }
            }
        }
    }

    /// Get a cached digest without reserving anything. Does not refresh
    /// recency.
    pub fn get(&self, date: &str) -> Option<Stories> {
        self.lock().by_date.get(date).cloned()
    }

    /// Fill one empty field of one cached story. Returns whether anything was
    /// written: an already-filled field, an unknown story id, or a date key
    /// no longer resident (evicted or never inserted) is a silent no-op — an
    /// evicted entry is never resurrected.
    pub fn update_story(&self, date: &str, story_id: i64, update: StoryUpdate) -> bool {
        let mut inner = self.lock();
        let Some(digest) = inner.by_date.get_mut(date) else {
            debug!(%date, story_id, "update for absent digest ignored");
            return false;
        };
        let Some(story) = digest.stories.iter_mut().find(|s| s.id == story_id) else {
            debug!(%date, story_id, "update for unknown story ignored");
            return false;
        };

        match update {
            StoryUpdate::Image(blob) if !story.has_image() => {
                story.image_blob = Some(blob);
                true
            }
            StoryUpdate::Body(text) if !story.has_body() => {
                story.body = Some(text);
                true
            }
            _ => false,
        }
    }

    /// A consistent point-in-time copy of the whole cache state, suitable for
    /// persistence. Cannot observe a half-applied insertion or update.
    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.lock();
        CacheSnapshot {
            latest_date: inner.latest_date,
            current_date: inner.current_date,
            lru: inner.lru.iter().cloned().collect(),
            by_date: inner.by_date.clone(),
        }
    }

    /// Number of resident digests.
    pub fn len(&self) -> usize {
        self.lock().by_date.len()
    }

    /// Whether the cache holds no digests.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The date currently being viewed (0 = unset).
    pub fn current_date(&self) -> u32 {
        self.lock().current_date
    }

    /// Record the date currently being viewed.
    pub fn set_current_date(&self, date: u32) {
        self.lock().current_date = date;
    }

    /// The latest date the user has seen (0 = unset).
    pub fn latest_date(&self) -> u32 {
        self.lock().latest_date
    }

    /// Record the latest date the user has seen. Ordering against
    /// `current_date` is the caller's contract, not the cache's.
    pub fn set_latest_date(&self, date: u32) {
        self.lock().latest_date = date;
    }
}

impl Default for StoryCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// FetchTicket
// ---------------------------------------------------------------------------

/// Ownership of the single in-flight fetch for one date key.
///
/// The holder must resolve it with [`complete`](Self::complete) or
/// [`fail`](Self::fail). Dropping it unresolved (e.g. the fetch task
/// panicked) releases the reservation and fails all waiters, so nobody is
/// wedged on a flight that will never land.
pub struct FetchTicket {
    cache: StoryCache,
    date: String,
    armed: bool,
}

impl FetchTicket {
    /// The reserved date key.
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Store the fetched digest under the reserved key, evict if over
    /// capacity, and wake all waiters with the digest.
    pub fn complete(mut self, stories: Stories) {
        self.armed = false;
        let mut inner = self.cache.lock();
        inner.insert(self.date.clone(), stories.clone());
        if let Some(tx) = inner.in_flight.remove(&self.date) {
            let _ = tx.send(Some(Ok(stories)));
        }
    }

    /// Release the reservation without inserting anything; all waiters
    /// receive the error. The next lookup for this date retries the fetch.
    pub fn fail(mut self, error: DigestError) {
        self.armed = false;
        self.resolve_with_error(error);
    }

    fn resolve_with_error(&self, error: DigestError) {
        let mut inner = self.cache.lock();
        if let Some(tx) = inner.in_flight.remove(&self.date) {
            let _ = tx.send(Some(Err(error)));
        }
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        if self.armed {
            warn!(date = %self.date, "fetch ticket dropped unresolved");
            self.resolve_with_error(DigestError::Transport(format!(
                "fetch for {} was abandoned",
                self.date
            )));
        }
    }
}

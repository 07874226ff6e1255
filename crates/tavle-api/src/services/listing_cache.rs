//! Process-local cache for the public event listing.
//!
//! The listing is the hottest read path and tolerates up to a minute of
//! staleness. Entries are keyed by organizer filter and expire after
//! [`LISTING_CACHE_TTL_SECS`]. Admin mutations invalidate the whole cache so
//! edits show up immediately instead of waiting out the TTL.
//!
//! The clock is injected so expiry is testable without sleeping.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use tavle_core::defaults::LISTING_CACHE_TTL_SECS;
use tavle_core::{EventFilter, PublicEventSummary};

/// Monotonic time source, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// System clock used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    stored_at: Instant,
    listing: Arc<Vec<PublicEventSummary>>,
}

/// TTL cache for public listings, keyed by organizer filter.
#[derive(Clone)]
pub struct ListingCache {
    inner: Arc<ListingCacheInner>,
}

struct ListingCacheInner {
    entries: RwLock<HashMap<EventFilter, CacheEntry>>,
    ttl: Duration,
    clock: Box<dyn Clock>,
}

impl ListingCache {
    /// Create a cache with the default TTL and the system clock.
    pub fn new() -> Self {
        Self::with_clock(
            Duration::from_secs(LISTING_CACHE_TTL_SECS),
            Box::new(SystemClock),
        )
    }

    /// Create a cache with an explicit TTL and clock (tests).
    pub fn with_clock(ttl: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ListingCacheInner {
                entries: RwLock::new(HashMap::new()),
                ttl,
                clock,
            }),
        }
    }

    /// Get a fresh cached listing, if any.
    pub async fn get(&self, filter: EventFilter) -> Option<Arc<Vec<PublicEventSummary>>> {
        let entries = self.inner.entries.read().await;
        let entry = entries.get(&filter)?;
        if self.inner.clock.now().duration_since(entry.stored_at) >= self.inner.ttl {
            debug!(filter = filter.as_str(), "listing cache expired");
            return None;
        }
        debug!(filter = filter.as_str(), "listing cache hit");
        Some(entry.listing.clone())
    }

    /// Store a listing for the filter.
    pub async fn put(
        &self,
        filter: EventFilter,
        listing: Vec<PublicEventSummary>,
    ) -> Arc<Vec<PublicEventSummary>> {
        let listing = Arc::new(listing);
        let mut entries = self.inner.entries.write().await;
        entries.insert(
            filter,
            CacheEntry {
                stored_at: self.inner.clock.now(),
                listing: listing.clone(),
            },
        );
        listing
    }

    /// Drop every entry. Called after any admin mutation.
    pub async fn invalidate_all(&self) {
        let mut entries = self.inner.entries.write().await;
        if !entries.is_empty() {
            debug!(dropped = entries.len(), "listing cache invalidated");
            entries.clear();
        }
    }
}

impl Default for ListingCache {
    fn default() -> Self {
        Self::new()
    }
}

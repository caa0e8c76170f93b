//! A thread-safe, at-most-once cache over single-pair in-floor
//! pathfinding, modeled on a `Mutex<LruCache<..>>` touch cache: a cache miss computes the path
//! while holding no lock, then re-checks under the lock before
//! inserting, so two threads racing on the same pair never both pay
//! for the search only to have one result thrown away silently -- the
//! second simply adopts whatever the first already stored.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;

use crate::geometry::{Path, Point};
use crate::pathfind::InFloorFinder;
use crate::raster::{Raster, RasterPoint};

pub(crate) type CacheKey = (RasterPoint, RasterPoint);

/// Snaps `a` and `b` onto `raster`'s grid and pairs up their cells,
/// shared by every cache keyed on "which two cells does this query
/// reduce to" so a point that moves without changing cell reuses the
/// same entry.
pub(crate) fn cache_key(raster: &Raster, a: Point, b: Point) -> Option<CacheKey> {
    let a_open = raster.unobstruct(a)?;
    let b_open = raster.unobstruct(b)?;
    Some((raster.point_to_cell(a_open), raster.point_to_cell(b_open)))
}

/// Wraps an `InFloorFinder` with an LRU cache keyed by the raster cells
/// the endpoints snap to, so repeated queries between the same
/// effective points skip the search entirely.
pub struct CachedFinder<'a> {
    finder: InFloorFinder<'a>,
    raster: &'a Raster,
    cache: Mutex<LruCache<CacheKey, Option<Path>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<'a> CachedFinder<'a> {
    pub fn new(raster: &'a Raster, max_nearby_delta: i64, capacity: usize) -> Self {
        Self {
            finder: InFloorFinder::new(raster, max_nearby_delta),
            raster,
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Connects `a` to `b`, consulting and populating the cache. Two
    /// points that snap to the same pair of raster cells always share a
    /// cache entry, even if their exact coordinates differ.
    pub fn connect(&self, a: Point, b: Point) -> Option<Path> {
        let key = self.cache_key(a, b)?;
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return cached.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let result = self.finder.connect(a, b);

        let mut cache = self.cache.lock().unwrap();
        if let Some(existing) = cache.get(&key) {
            return existing.clone();
        }
        cache.put(key, result.clone());
        result
    }

    fn cache_key(&self, a: Point, b: Point) -> Option<CacheKey> {
        cache_key(self.raster, a, b)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

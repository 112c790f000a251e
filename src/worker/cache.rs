use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::assets::decode::SourceImage;
use crate::foundation::core::ImageId;

/// Decode and cache counters of one execution context.
#[derive(Debug, Default)]
pub struct ContextStats {
    decoded: AtomicU64,
    released: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl ContextStats {
    /// Bitmaps decoded so far.
    pub fn decoded(&self) -> u64 {
        self.decoded.load(Ordering::Acquire)
    }

    /// Bitmaps explicitly released so far.
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Acquire)
    }

    /// Decoded bitmaps not yet released.
    pub fn live_bitmaps(&self) -> u64 {
        self.decoded().saturating_sub(self.released())
    }

    /// Requests served from cache.
    pub fn cache_hits(&self) -> u64 {
        self.hits.load(Ordering::Acquire)
    }

    /// Keyed requests that missed the cache.
    pub fn cache_misses(&self) -> u64 {
        self.misses.load(Ordering::Acquire)
    }

    /// Successful process requests.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Failed process requests.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Acquire)
    }

    pub(crate) fn record_decode(&self) {
        self.decoded.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn record_outcome(&self, ok: bool) {
        let counter = if ok { &self.processed } else { &self.failed };
        counter.fetch_add(1, Ordering::AcqRel);
    }
}

/// Decoded bitmaps keyed by image id. Owned by the worker thread alone.
#[derive(Debug)]
pub(crate) struct DecodeCache {
    entries: HashMap<ImageId, SourceImage>,
    stats: Arc<ContextStats>,
}

impl DecodeCache {
    pub(crate) fn new(stats: Arc<ContextStats>) -> Self {
        Self {
            entries: HashMap::new(),
            stats,
        }
    }

    pub(crate) fn get(&self, id: &ImageId) -> Option<SourceImage> {
        let hit = self.entries.get(id).cloned();
        let counter = if hit.is_some() {
            &self.stats.hits
        } else {
            &self.stats.misses
        };
        counter.fetch_add(1, Ordering::AcqRel);
        hit
    }

    pub(crate) fn insert(&mut self, id: ImageId, image: SourceImage) {
        tracing::debug!(image_id = %id, bytes = image.byte_size(), "caching decoded image");
        if let Some(old) = self.entries.insert(id, image) {
            self.release(old);
        }
    }

    /// Evict and release one entry. Returns whether it existed.
    pub(crate) fn evict(&mut self, id: &ImageId) -> bool {
        match self.entries.remove(id) {
            Some(image) => {
                tracing::debug!(image_id = %id, "evicting decoded image");
                self.release(image);
                true
            }
            None => false,
        }
    }

    /// Release a bitmap that is not (or no longer) cached.
    pub(crate) fn release(&self, image: SourceImage) {
        drop(image);
        self.stats.released.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn clear(&mut self) {
        let drained: Vec<SourceImage> = self.entries.drain().map(|(_, v)| v).collect();
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "releasing cached images");
        }
        for image in drained {
            self.release(image);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/cache.rs"]
mod tests;

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::model::{Thumbnail, WindowId};

/// Bounded least-recently-used store of processed thumbnails, shared between
/// the coordination context and capture workers.
///
/// Every method takes the lock for a single map operation; callers never
/// hold it across a backend call.
#[derive(Clone)]
pub struct ThumbnailCache(Arc<Mutex<LruCache<WindowId, Thumbnail>>>);

impl ThumbnailCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self(Arc::new(Mutex::new(LruCache::new(capacity))))
    }

    pub fn capacity(&self) -> usize { self.0.lock().cap().get() }

    pub fn len(&self) -> usize { self.0.lock().len() }

    /// Reads an image and marks it most recently used.
    pub fn get(&self, id: WindowId) -> Option<Thumbnail> { self.0.lock().get(&id).cloned() }

    /// Reads an image without touching its recency.
    pub fn peek(&self, id: WindowId) -> Option<Thumbnail> { self.0.lock().peek(&id).cloned() }

    pub fn contains(&self, id: WindowId) -> bool { self.0.lock().contains(&id) }

    /// Cached images for `ids`, in the order given, without touching recency.
    pub fn peek_many(&self, ids: &[WindowId]) -> Vec<(WindowId, Thumbnail)> {
        let cache = self.0.lock();
        ids.iter()
            .filter_map(|id| cache.peek(id).map(|img| (*id, img.clone())))
            .collect()
    }

    /// Inserts or replaces an image as most recently used. Returns the id
    /// evicted to make room, if any.
    pub fn store(&self, id: WindowId, image: Thumbnail) -> Option<WindowId> {
        match self.0.lock().push(id, image) {
            Some((old, _)) if old != id => Some(old),
            _ => None,
        }
    }
}

//! LRU decorator over any entity search, keyed by the quantized
//! viewport and a filter fingerprint.

use crate::{
    core::geo::{BoundsKey, LatLngBounds},
    search::{EntitySearch, SearchFilters, SearchPage},
    Result,
};
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

type CacheKey = (Option<BoundsKey>, u64);

pub struct CachedSearch<S> {
    inner: S,
    cache: Mutex<LruCache<CacheKey, SearchPage>>,
    precision: u32,
}

impl<S> CachedSearch<S> {
    pub fn new(inner: S, capacity: NonZeroUsize, precision: u32) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            precision,
        }
    }
}

#[async_trait]
impl<S: EntitySearch> EntitySearch for CachedSearch<S> {
    async fn search(
        &self,
        filters: &SearchFilters,
        bounds: Option<&LatLngBounds>,
    ) -> Result<SearchPage> {
        let key: CacheKey = (
            bounds.map(|bounds| BoundsKey::quantize(bounds, self.precision)),
            filters.fingerprint(),
        );

        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(hit) = cache.get(&key) {
                return Ok(hit.clone());
            }
        }

        let page = self.inner.search(filters, bounds).await?;

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(key, page.clone());
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingSearch {
        calls: AtomicU64,
    }

    #[async_trait]
    impl EntitySearch for CountingSearch {
        async fn search(
            &self,
            _filters: &SearchFilters,
            _bounds: Option<&LatLngBounds>,
        ) -> Result<SearchPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SearchPage {
                entities: Vec::new(),
                displayed_count: 1,
                total_count: 1,
            })
        }
    }

    #[tokio::test]
    async fn test_repeat_viewport_hits_cache() {
        let cached = CachedSearch::new(
            CountingSearch {
                calls: AtomicU64::new(0),
            },
            NonZeroUsize::new(8).unwrap(),
            4,
        );
        let filters = SearchFilters::default();
        let bounds = LatLngBounds::from_coords(43.0, -80.0, 44.0, -79.0);

        cached.search(&filters, Some(&bounds)).await.unwrap();
        // Jitter below the quantization step lands on the same key
        let jittered = LatLngBounds::from_coords(43.000004, -80.000003, 44.000002, -79.000004);
        cached.search(&filters, Some(&jittered)).await.unwrap();

        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 1);

        // A different viewport misses
        let moved = LatLngBounds::from_coords(45.0, -82.0, 46.0, -81.0);
        cached.search(&filters, Some(&moved)).await.unwrap();
        assert_eq!(cached.inner.calls.load(Ordering::SeqCst), 2);
    }
}

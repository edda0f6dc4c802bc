//! Memoising wrapper around a [`DataProvider`].
//!
//! Keyed by `(day, satellite)`. Only successful fetches are cached, so a
//! transient transport failure is retried on the next request. The lock is
//! never held across an await.

use async_trait::async_trait;
use chrono::NaiveDate;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{DataProvider, FetchError};
use crate::types::{CanonicalSeries, Satellite};

type CacheKey = (NaiveDate, Satellite);

pub struct CachedProvider<P> {
    inner: P,
    cache: Mutex<LruCache<CacheKey, CanonicalSeries>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: DataProvider> CachedProvider<P> {
    /// A zero capacity is bumped to one entry.
    pub fn new(inner: P, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &CacheKey) -> Option<CanonicalSeries> {
        match self.cache.lock() {
            Ok(mut cache) => cache.get(key).cloned(),
            Err(_) => {
                warn!("Fetch cache lock poisoned, bypassing cache");
                None
            }
        }
    }

    fn store(&self, key: CacheKey, series: CanonicalSeries) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, series);
        }
    }
}

#[async_trait]
impl<P: DataProvider> DataProvider for CachedProvider<P> {
    async fn fetch_day(
        &self,
        date: NaiveDate,
        satellite: Satellite,
    ) -> Result<CanonicalSeries, FetchError> {
        let key = (date, satellite);
        if let Some(series) = self.lookup(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(date = %date, satellite = %satellite, "Fetch cache hit");
            return Ok(series);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let series = self.inner.fetch_day(date, satellite).await?;
        self.store(key, series.clone());
        Ok(series)
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::TransportError;
    use crate::types::SolarWindSample;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::AtomicUsize;

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl DataProvider for CountingProvider {
        async fn fetch_day(
            &self,
            date: NaiveDate,
            _satellite: Satellite,
        ) -> Result<CanonicalSeries, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TransportError::parse("test", "boom").into());
            }
            let ts = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap());
            Ok(CanonicalSeries::from_samples(vec![SolarWindSample::missing(ts)]))
        }
    }

    fn provider(fail: bool) -> CountingProvider {
        CountingProvider {
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_repeat_fetch_served_from_cache() {
        let cached = CachedProvider::new(provider(false), 4);
        tokio_test::block_on(async {
            let a = cached.fetch_day(day(10), Satellite::Ace).await.unwrap();
            let b = cached.fetch_day(day(10), Satellite::Ace).await.unwrap();
            assert_eq!(a, b);
            cached.fetch_day(day(10), Satellite::Dscovr).await.unwrap();
        });
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cached.hits(), 1);
        assert_eq!(cached.misses(), 2);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let cached = CachedProvider::new(provider(true), 4);
        tokio_test::block_on(async {
            assert!(cached.fetch_day(day(10), Satellite::Ace).await.is_err());
            assert!(cached.fetch_day(day(10), Satellite::Ace).await.is_err());
        });
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 2);
        assert!(cached.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cached = CachedProvider::new(provider(false), 2);
        tokio_test::block_on(async {
            for d in [10, 11, 12] {
                cached.fetch_day(day(d), Satellite::Ace).await.unwrap();
            }
            // day 10 was evicted
            cached.fetch_day(day(10), Satellite::Ace).await.unwrap();
        });
        assert_eq!(cached.len(), 2);
        assert_eq!(cached.inner().calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_zero_capacity_still_works() {
        let cached = CachedProvider::new(provider(false), 0);
        tokio_test::block_on(async {
            cached.fetch_day(day(10), Satellite::Ace).await.unwrap();
        });
        assert_eq!(cached.len(), 1);
    }
}

//! Background refresh over a persisted value.
//!
//! A [`SilentCache`] hands out the last known value immediately (seeded from
//! [`Storage`]) and refreshes it in the background. At most one fetch per
//! cache key is in flight; extra requests are dropped, never queued. Failed
//! fetches keep the previous value and are only logged.

use crate::cache::storage::Storage;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Produces a fresh value for a cache.
#[async_trait]
pub trait Fetcher<T: Send + 'static>: Send + Sync {
    async fn fetch(&self) -> Result<T>;
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
{
    async fn fetch(&self) -> Result<T> {
        (self)().await
    }
}

type ParseFn<T> = Arc<dyn Fn(Value) -> Result<T> + Send + Sync>;
type SerializeFn<T> = Arc<dyn Fn(&T) -> Result<Value> + Send + Sync>;
type CompareFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// How a cache is built: key, fetcher, and the optional knobs.
pub struct SilentCacheOptions<T: Send + 'static> {
    key: String,
    fetcher: Arc<dyn Fetcher<T>>,
    parse: ParseFn<T>,
    serialize: SerializeFn<T>,
    revalidate: Option<Duration>,
    compare: Option<CompareFn<T>>,
}

impl<T> SilentCacheOptions<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(key: impl Into<String>, fetcher: impl Fetcher<T> + 'static) -> Self {
        Self {
            key: key.into(),
            fetcher: Arc::new(fetcher),
            parse: Arc::new(|raw| Ok(serde_json::from_value(raw)?)),
            serialize: Arc::new(|value| Ok(serde_json::to_value(value)?)),
            revalidate: None,
            compare: None,
        }
    }
}

impl<T: Send + 'static> SilentCacheOptions<T> {
    /// Rebuild `T` from the persisted JSON instead of plain deserialization.
    pub fn parse(mut self, parse: impl Fn(Value) -> Result<T> + Send + Sync + 'static) -> Self {
        self.parse = Arc::new(parse);
        self
    }

    /// Inverse of [`parse`](Self::parse).
    pub fn serialize(mut self, serialize: impl Fn(&T) -> Result<Value> + Send + Sync + 'static) -> Self {
        self.serialize = Arc::new(serialize);
        self
    }

    /// Re-fetch every `period` while mounted.
    pub fn revalidate_every(mut self, period: Duration) -> Self {
        self.revalidate = Some(period).filter(|p| !p.is_zero());
        self
    }

    /// Equality used to suppress updates that change nothing.
    pub fn compare(mut self, compare: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        self.compare = Some(Arc::new(compare));
        self
    }
}

/// What a consumer sees.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub data: Option<Arc<T>>,
    /// A fetch is in flight
    pub stale: bool,
    /// Last time the data changed
    pub last_updated: Option<DateTime<Utc>>,
    /// Last successful fetch, changed or not
    pub last_checked: Option<DateTime<Utc>>,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            stale: self.stale,
            last_updated: self.last_updated,
            last_checked: self.last_checked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Another fetch was already running, or the cache is unmounted
    Skipped,
    /// New value stored and persisted
    Updated,
    /// Fetched value equal to the current one
    Unchanged,
    /// Fetch failed; previous value kept
    Failed,
    /// Finished after the key changed or the cache was unmounted
    Discarded,
}

struct Slot {
    key: String,
    generation: u64,
    in_flight: Option<u64>,
}

struct Inner<T: Send + 'static> {
    storage: Arc<dyn Storage>,
    fetcher: Arc<dyn Fetcher<T>>,
    parse: ParseFn<T>,
    serialize: SerializeFn<T>,
    compare: Option<CompareFn<T>>,
    slot: Mutex<Slot>,
    state: watch::Sender<Snapshot<T>>,
    mounted: AtomicBool,
}

impl<T: Send + Sync + 'static> Inner<T> {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn seed(&self, key: &str) -> Option<Arc<T>> {
        let raw = match self.storage.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Could not read cache slot {}: {:#}", key, e);
                return None;
            }
        };
        let parsed = serde_json::from_str::<Value>(&raw)
            .map_err(anyhow::Error::from)
            .and_then(|value| (self.parse)(value));
        match parsed {
            Ok(value) => Some(Arc::new(value)),
            Err(e) => {
                debug!("Ignoring unreadable cache slot {}: {:#}", key, e);
                None
            }
        }
    }

    /// Claim the fetch gate for the current key.
    fn try_begin(&self) -> Option<u64> {
        let mut slot = self.slot();
        if !self.mounted.load(Ordering::SeqCst) || slot.in_flight == Some(slot.generation) {
            return None;
        }
        slot.in_flight = Some(slot.generation);
        self.state.send_modify(|s| s.stale = true);
        Some(slot.generation)
    }

    async fn complete(self: Arc<Self>, generation: u64) -> RefreshOutcome {
        // A panicking fetcher must still release the gate
        let fetcher = self.fetcher.clone();
        let result = match tokio::spawn(async move { fetcher.fetch().await }).await {
            Ok(result) => result,
            Err(e) => Err(anyhow::anyhow!("fetch task failed: {e}")),
        };

        let mut slot = self.slot();
        if slot.in_flight == Some(generation) {
            slot.in_flight = None;
        }
        if !self.mounted.load(Ordering::SeqCst) {
            debug!("Dropping fetch result for unmounted cache {}", slot.key);
            self.state.send_modify(|s| s.stale = false);
            return RefreshOutcome::Discarded;
        }
        if slot.generation != generation {
            debug!("Dropping fetch result for a previous cache key");
            return RefreshOutcome::Discarded;
        }

        let value = match result {
            Ok(value) => value,
            Err(e) => {
                debug!("Background refresh of {} failed: {:#}", slot.key, e);
                self.state.send_modify(|s| s.stale = false);
                return RefreshOutcome::Failed;
            }
        };

        let unchanged = match (&self.state.borrow().data, &self.compare) {
            (Some(current), Some(compare)) => compare(&**current, &value),
            _ => false,
        };
        if unchanged {
            self.state.send_modify(|s| {
                s.stale = false;
                s.last_checked = Some(Utc::now());
            });
            return RefreshOutcome::Unchanged;
        }

        // Storage is written before subscribers hear about the new value
        self.persist(&slot.key, &value);
        let value = Arc::new(value);
        self.state.send_modify(|s| {
            s.data = Some(value);
            s.stale = false;
            let now = Utc::now();
            s.last_updated = Some(now);
            s.last_checked = Some(now);
        });
        RefreshOutcome::Updated
    }

    fn persist(&self, key: &str, value: &T) {
        let written = (self.serialize)(value)
            .and_then(|json| Ok(serde_json::to_string(&json)?))
            .and_then(|raw| self.storage.set_item(key, &raw));
        if let Err(e) = written {
            warn!("Could not persist cache slot {}: {:#}", key, e);
        }
    }
}

/// A value that is always available and quietly kept fresh.
pub struct SilentCache<T: Send + Sync + 'static> {
    inner: Arc<Inner<T>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + Sync + 'static> SilentCache<T> {
    /// Seed from storage, fire the initial fetch, and start revalidation.
    ///
    /// Must be called inside a tokio runtime.
    pub fn mount(options: SilentCacheOptions<T>, storage: Arc<dyn Storage>) -> Self {
        let SilentCacheOptions { key, fetcher, parse, serialize, revalidate, compare } = options;

        let (state, _) = watch::channel(Snapshot {
            data: None,
            stale: false,
            last_updated: None,
            last_checked: None,
        });
        let inner = Arc::new(Inner {
            storage,
            fetcher,
            parse,
            serialize,
            compare,
            slot: Mutex::new(Slot {
                key: key.clone(),
                generation: 0,
                in_flight: None,
            }),
            state,
            mounted: AtomicBool::new(true),
        });

        let seed = inner.seed(&key);
        debug!("Mounted cache {} (seeded: {})", key, seed.is_some());
        inner.state.send_modify(|s| s.data = seed);

        let cache = Self {
            inner,
            ticker: Mutex::new(None),
        };
        cache.fire();
        if let Some(period) = revalidate {
            cache.start_ticker(period);
        }
        cache
    }

    fn fire(&self) {
        if let Some(generation) = self.inner.try_begin() {
            tokio::spawn(self.inner.clone().complete(generation));
        }
    }

    fn start_ticker(&self, period: Duration) {
        let weak: Weak<Inner<T>> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if let Some(generation) = inner.try_begin() {
                    // Separate task so stopping the ticker never cuts a fetch short
                    tokio::spawn(inner.complete(generation));
                }
            }
        });
        *self.ticker.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);
    }

    /// Fetch now unless a fetch is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(generation) = self.inner.try_begin() else {
            return RefreshOutcome::Skipped;
        };
        tokio::spawn(self.inner.clone().complete(generation))
            .await
            .unwrap_or(RefreshOutcome::Failed)
    }

    /// Point the cache at another slot: re-seed and fetch again.
    pub fn set_key(&self, key: impl Into<String>) {
        let key = key.into();
        {
            let mut slot = self.inner.slot();
            if slot.key == key {
                return;
            }
            slot.key = key.clone();
            slot.generation += 1;
            let seed = self.inner.seed(&key);
            self.inner.state.send_modify(|s| {
                s.data = seed;
                s.stale = false;
                s.last_updated = None;
                s.last_checked = None;
            });
        }
        debug!("Cache switched to key {}", key);
        self.fire();
    }

    /// Stop revalidating. Fetches still in flight finish but are discarded.
    pub fn unmount(&self) {
        if self.inner.mounted.swap(false, Ordering::SeqCst) {
            if let Some(handle) = self.ticker.lock().unwrap_or_else(|p| p.into_inner()).take() {
                handle.abort();
            }
            debug!("Unmounted cache {}", self.key());
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    pub fn key(&self) -> String {
        self.inner.slot().key.clone()
    }

    pub fn data(&self) -> Option<Arc<T>> {
        self.inner.state.borrow().data.clone()
    }

    pub fn is_stale(&self) -> bool {
        self.inner.state.borrow().stale
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.state.borrow().last_updated
    }

    pub fn last_checked(&self) -> Option<DateTime<Utc>> {
        self.inner.state.borrow().last_checked
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.inner.state.borrow().clone()
    }

    /// Receive every change to the snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.inner.state.subscribe()
    }
}

impl<T: Send + Sync + 'static> Drop for SilentCache<T> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::MemoryStorage;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    fn storage_with(key: &str, raw: &str) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(key, raw).unwrap();
        storage
    }

    /// Fetcher returning `value` once the gate lets it through.
    fn gated(
        value: Vec<u32>,
        calls: Arc<AtomicUsize>,
        gate: Arc<Semaphore>,
    ) -> impl Fetcher<Vec<u32>> {
        move || {
            let value = value.clone();
            let calls = calls.clone();
            let gate = gate.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.acquire().await?.forget();
                Ok::<_, anyhow::Error>(value)
            }
        }
    }

    #[tokio::test]
    async fn seeded_value_is_available_before_the_fetch_resolves() {
        let storage = storage_with("k", "[1,2,3]");
        let gate = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", gated(vec![9], calls.clone(), gate.clone())),
            storage,
        );

        assert_eq!(cache.data().as_deref(), Some(&vec![1, 2, 3]));
        assert!(cache.is_stale());
        assert!(cache.last_updated().is_none());

        gate.add_permits(1);
        let mut rx = cache.subscribe();
        rx.wait_for(|s| !s.stale).await.unwrap();
        assert_eq!(cache.data().as_deref(), Some(&vec![9]));
        assert!(cache.last_updated().is_some());
    }

    #[tokio::test]
    async fn unreadable_seed_means_no_data() {
        let storage = storage_with("k", "{not json");
        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", || async { Ok::<_, anyhow::Error>(vec![1u32]) }),
            storage,
        );
        assert!(cache.data().is_none());
    }

    #[tokio::test]
    async fn back_to_back_refreshes_fetch_once() {
        let storage = Arc::new(MemoryStorage::new());
        let gate = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", gated(vec![1], calls.clone(), gate.clone())),
            storage,
        );

        gate.add_permits(1);
        let mut rx = cache.subscribe();
        rx.wait_for(|s| s.data.is_some() && !s.stale).await.unwrap();
        calls.store(0, Ordering::SeqCst);

        let (first, second) = tokio::join!(cache.refresh(), async {
            let outcome = cache.refresh().await;
            gate.add_permits(1);
            outcome
        });

        assert_eq!(first, RefreshOutcome::Updated);
        assert_eq!(second, RefreshOutcome::Skipped);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn equal_values_leave_data_untouched() {
        let storage = storage_with("k", "[4,5]");
        let gate = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", gated(vec![4, 5], calls.clone(), gate.clone()))
                .compare(|a: &Vec<u32>, b: &Vec<u32>| a == b),
            storage,
        );
        let before = cache.data().unwrap();

        gate.add_permits(2);
        let mut rx = cache.subscribe();
        rx.wait_for(|s| !s.stale).await.unwrap();
        assert_eq!(cache.refresh().await, RefreshOutcome::Unchanged);

        assert!(Arc::ptr_eq(&before, &cache.data().unwrap()));
        assert!(cache.last_updated().is_none());
        assert!(cache.last_checked().is_some());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_data() {
        let storage = storage_with("k", "[7]");
        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", || async { Err::<Vec<u32>, _>(anyhow::anyhow!("offline")) }),
            storage.clone(),
        );
        let mut rx = cache.subscribe();
        rx.wait_for(|s| !s.stale).await.unwrap();

        assert_eq!(cache.refresh().await, RefreshOutcome::Failed);
        assert_eq!(cache.data().as_deref(), Some(&vec![7]));
        assert!(!cache.is_stale());
        assert!(cache.last_checked().is_none());
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("[7]"));
    }

    #[tokio::test]
    async fn updates_are_persisted_under_the_key() {
        let storage = Arc::new(MemoryStorage::new());
        let cache = SilentCache::mount(
            SilentCacheOptions::new("houses", || async { Ok::<_, anyhow::Error>(vec![3u32, 1]) }),
            storage.clone(),
        );
        let mut rx = cache.subscribe();
        rx.wait_for(|s| s.data.is_some()).await.unwrap();
        assert_eq!(storage.get_item("houses").unwrap().as_deref(), Some("[3,1]"));
    }

    #[tokio::test]
    async fn custom_codec_is_used_both_ways() {
        let storage = storage_with("k", r#"{"items":[2]}"#);
        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", || async { Ok::<_, anyhow::Error>(vec![8u32]) })
                .parse(|raw| Ok(serde_json::from_value(raw["items"].clone())?))
                .serialize(|v| Ok(serde_json::json!({ "items": v }))),
            storage.clone(),
        );
        assert_eq!(cache.data().as_deref(), Some(&vec![2]));

        let mut rx = cache.subscribe();
        rx.wait_for(|s| s.last_updated.is_some()).await.unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some(r#"{"items":[8]}"#));
    }

    #[tokio::test]
    async fn key_change_reseeds_and_discards_old_result() {
        let storage = storage_with("b", "[20]");
        storage.set_item("a", "[10]").unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SilentCache::mount(
            SilentCacheOptions::new("a", gated(vec![99], calls.clone(), gate.clone())),
            storage.clone(),
        );
        assert_eq!(cache.data().as_deref(), Some(&vec![10]));

        cache.set_key("b");
        assert_eq!(cache.key(), "b");
        assert_eq!(cache.data().as_deref(), Some(&vec![20]));

        gate.add_permits(2);
        let mut rx = cache.subscribe();
        rx.wait_for(|s| s.last_updated.is_some()).await.unwrap();

        assert_eq!(cache.data().as_deref(), Some(&vec![99]));
        assert_eq!(storage.get_item("b").unwrap().as_deref(), Some("[99]"));
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("[10]"));
    }

    #[tokio::test]
    async fn unmounted_cache_ignores_late_results() {
        let storage = storage_with("k", "[1]");
        let gate = Arc::new(Semaphore::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", gated(vec![2], calls.clone(), gate.clone())),
            storage.clone(),
        );

        assert!(cache.is_stale());
        cache.unmount();
        assert!(!cache.is_mounted());
        gate.add_permits(1);
        let mut rx = cache.subscribe();
        rx.wait_for(|s| !s.stale).await.unwrap();

        assert_eq!(cache.refresh().await, RefreshOutcome::Skipped);
        assert!(!cache.is_stale());
        assert_eq!(cache.data().as_deref(), Some(&vec![1]));
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn panicking_fetch_releases_the_gate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", move || {
                let call = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        panic!("backend client blew up");
                    }
                    Ok::<_, anyhow::Error>(vec![call as u32])
                }
            }),
            Arc::new(MemoryStorage::new()),
        );

        let mut rx = cache.subscribe();
        rx.wait_for(|s| !s.stale).await.unwrap();
        assert!(cache.data().is_none());

        assert_eq!(cache.refresh().await, RefreshOutcome::Updated);
        assert!(!cache.is_stale());
        assert_eq!(cache.data().as_deref(), Some(&vec![1]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn revalidation_ticks_until_unmount() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let cache = SilentCache::mount(
            SilentCacheOptions::new("k", move || {
                let counter = counter.clone();
                async move { Ok::<_, anyhow::Error>(vec![counter.fetch_add(1, Ordering::SeqCst) as u32]) }
            })
            .revalidate_every(Duration::from_millis(100)),
            Arc::new(MemoryStorage::new()),
        );

        tokio::time::sleep(Duration::from_millis(350)).await;
        let seen = calls.load(Ordering::SeqCst);
        assert!(seen >= 3, "expected initial fetch plus ticks, saw {seen}");

        cache.unmount();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }
}

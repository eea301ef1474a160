//! Listings cache backed by files, feeding the store

use chrono::{TimeZone, Utc};
use estate_scout::cache::{FileStorage, RefreshOutcome, SilentCache, SilentCacheOptions, Storage};
use estate_scout::models::{HouseType, Listing};
use estate_scout::store::{Store, StoreEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

fn listing(id: &str, price: u64) -> Listing {
    let mut l = Listing::new(id, format!("House {id}"), price, HouseType::Bedsitter);
    l.location.estate = "Amalemba".into();
    l.created_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap());
    l
}

#[tokio::test]
async fn previous_run_is_shown_until_the_backend_answers() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path()).unwrap());
    let yesterday = vec![listing("1", 7_000)];
    storage
        .set_item("houses", &serde_json::to_string(&yesterday).unwrap())
        .unwrap();

    let gate = Arc::new(Semaphore::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let (fetch_gate, fetch_calls) = (gate.clone(), calls.clone());
    let cache = SilentCache::mount(
        SilentCacheOptions::new("houses", move || {
            let gate = fetch_gate.clone();
            let calls = fetch_calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.acquire().await?.forget();
                Ok::<_, anyhow::Error>(vec![listing("1", 7_000), listing("2", 9_500)])
            }
        })
        .compare(|a: &Vec<Listing>, b: &Vec<Listing>| a == b),
        storage.clone(),
    );

    let store = Store::default();
    let mut events = store.subscribe();

    // Cached copy, dates included, before the fetch resolves
    let cached = cache.data().expect("seeded from disk");
    assert_eq!(*cached, yesterday);
    assert!(cache.is_stale());
    store.set_listings(cached.as_ref().clone());
    assert_eq!(events.recv().await.unwrap(), StoreEvent::ListingsChanged);

    // A manual refresh while the mount fetch is running is dropped
    assert_eq!(cache.refresh().await, RefreshOutcome::Skipped);

    gate.add_permits(1);
    let mut updates = cache.subscribe();
    updates.wait_for(|s| !s.stale).await.unwrap();

    let fresh = cache.data().unwrap();
    assert_eq!(fresh.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    store.set_listings(fresh.as_ref().clone());
    assert_eq!(store.listings().len(), 2);

    let on_disk: Vec<Listing> =
        serde_json::from_str(&storage.get_item("houses").unwrap().unwrap()).unwrap();
    assert_eq!(on_disk, *fresh);
}

#[tokio::test]
async fn a_new_mount_starts_from_what_the_last_one_saved() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(dir.path()).unwrap());

    {
        let cache = SilentCache::mount(
            SilentCacheOptions::new("houses", || async {
                Ok::<_, anyhow::Error>(vec![listing("9", 12_000)])
            }),
            storage.clone(),
        );
        let mut updates = cache.subscribe();
        updates.wait_for(|s| s.last_updated.is_some()).await.unwrap();
    }

    let cache = SilentCache::mount(
        SilentCacheOptions::new("houses", || async {
            Err::<Vec<Listing>, _>(anyhow::anyhow!("backend down"))
        }),
        storage,
    );
    let mut updates = cache.subscribe();
    updates.wait_for(|s| !s.stale).await.unwrap();

    let data = cache.data().unwrap();
    assert_eq!(data[0].id, "9");
    assert!(cache.last_updated().is_none());
}

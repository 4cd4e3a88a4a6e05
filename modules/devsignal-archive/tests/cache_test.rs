//! Cache store behavior: TTL, bypass, stale fallback, single-flight, and on-disk entries.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use devsignal_archive::testing::{memory_store, test_now};
use devsignal_archive::{CacheKey, CacheStorage, CacheStore, FixedClock, FsStorage, MemoryStorage};
use devsignal_common::{
    DeepSignals, FetchError, Identity, IssueSignals, SourcePayload, SourceTag,
};

fn identity() -> Identity {
    Identity::parse("octocat").unwrap()
}

fn key() -> CacheKey {
    CacheKey::new(&identity(), SourceTag::DeepSignals)
}

fn signals(opened: u32) -> SourcePayload {
    SourcePayload::DeepSignals(DeepSignals {
        issues: IssueSignals {
            opened,
            ..Default::default()
        },
        ..Default::default()
    })
}

fn opened(payload: &SourcePayload) -> u32 {
    match payload {
        SourcePayload::DeepSignals(s) => s.issues.opened,
        other => panic!("unexpected payload {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// TTL
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_fetch_within_ttl_is_served_from_cache() {
    let (store, _) = memory_store(false);
    let calls = AtomicUsize::new(0);
    let counter = &calls;

    for _ in 0..2 {
        let raw = store
            .get_or_fetch(&key(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(signals(1))
            })
            .await
            .unwrap();
        assert_eq!(opened(&raw.payload), 1);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_entry_is_refetched() {
    let (store, clock) = memory_store(false);
    store
        .get_or_fetch(&key(), || async { Ok(signals(1)) })
        .await
        .unwrap();

    // Deep signals live for two hours.
    clock.advance(chrono::Duration::minutes(119));
    assert!(store.get(&key()).await.is_some());

    clock.advance(chrono::Duration::minutes(2));
    assert!(store.get(&key()).await.is_none());

    let raw = store
        .get_or_fetch(&key(), || async { Ok(signals(2)) })
        .await
        .unwrap();
    assert_eq!(opened(&raw.payload), 2);
    assert_eq!(raw.fetched_at, test_now() + chrono::Duration::minutes(121));
}

// ---------------------------------------------------------------------------
// Bypass and stale fallback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bypass_refetches_but_keeps_stale_fallback() {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(FixedClock::new(test_now()));

    let warm = CacheStore::new(storage.clone(), clock.clone(), false);
    warm.get_or_fetch(&key(), || async { Ok(signals(1)) })
        .await
        .unwrap();

    let refresh = CacheStore::new(storage.clone(), clock.clone(), true);
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let raw = refresh
        .get_or_fetch(&key(), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Network("connection reset".into()))
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1, "bypass must attempt a fresh fetch");
    assert_eq!(opened(&raw.payload), 1, "degradable failure serves the old entry");
    assert_eq!(storage.len(), 1, "bypass never deletes entries");
}

#[tokio::test]
async fn bypass_result_is_reused_within_the_run() {
    let (store, _) = memory_store(true);
    let calls = AtomicUsize::new(0);
    let counter = &calls;

    for _ in 0..3 {
        store
            .get_or_fetch(&key(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(signals(1))
            })
            .await
            .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn auth_failure_is_not_masked_by_stale_entry() {
    let (store, clock) = memory_store(false);
    store
        .get_or_fetch(&key(), || async { Ok(signals(1)) })
        .await
        .unwrap();
    clock.advance(chrono::Duration::hours(3));

    let err = store
        .get_or_fetch(&key(), || async {
            Err(FetchError::Auth("bad credentials".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Auth(_)));
}

#[tokio::test]
async fn failure_without_stale_entry_propagates() {
    let (store, _) = memory_store(false);
    let err = store
        .get_or_fetch(&key(), || async {
            Err(FetchError::Timeout("30s elapsed".into()))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Timeout(_)));
}

// ---------------------------------------------------------------------------
// Single-flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_callers_share_one_fetch() {
    let (store, _) = memory_store(false);
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let key = key();

    let results = futures::future::join_all((0..5).map(|_| {
        store.get_or_fetch(&key, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(signals(7))
        })
    }))
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for raw in results {
        assert_eq!(opened(&raw.unwrap().payload), 7);
    }
}

#[tokio::test]
async fn concurrent_callers_share_a_failed_fetch() {
    let (store, _) = memory_store(false);
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let key = key();

    let results = futures::future::join_all((0..5).map(|_| {
        store.get_or_fetch(&key, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err(FetchError::Network("reset".into()))
        })
    }))
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap_err(), FetchError::Network("reset".into()));
    }

    // The failure is not remembered past the flight.
    store
        .get_or_fetch(&key, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(signals(2))
        })
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn different_keys_fetch_independently() {
    let (store, _) = memory_store(false);
    let calls = AtomicUsize::new(0);
    let counter = &calls;
    let a = CacheKey::new(&identity(), SourceTag::Website).with_param("url", "https://a.dev");
    let b = CacheKey::new(&identity(), SourceTag::Website).with_param("url", "https://b.dev");

    for key in [&a, &b] {
        store
            .get_or_fetch(key, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(SourcePayload::Website(Default::default()))
            })
            .await
            .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// On-disk entries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn entries_survive_a_new_store_instance() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedClock::new(test_now()));

    let first = CacheStore::new(Arc::new(FsStorage::new(dir.path())), clock.clone(), false);
    first
        .get_or_fetch(&key(), || async { Ok(signals(3)) })
        .await
        .unwrap();

    let second = CacheStore::new(Arc::new(FsStorage::new(dir.path())), clock.clone(), false);
    let raw = second
        .get_or_fetch(&key(), || async {
            Err(FetchError::Network("should not be called".into()))
        })
        .await
        .unwrap();
    assert_eq!(opened(&raw.payload), 3);
}

#[tokio::test]
async fn corrupt_entry_is_a_miss() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FsStorage::new(dir.path()));
    let path = storage.entry_path(&key());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{ not json").unwrap();

    let store = CacheStore::new(storage.clone(), Arc::new(FixedClock::new(test_now())), false);
    assert!(store.get(&key()).await.is_none());

    let raw = store
        .get_or_fetch(&key(), || async { Ok(signals(4)) })
        .await
        .unwrap();
    assert_eq!(opened(&raw.payload), 4);

    // The corrupt bytes were replaced by a valid envelope.
    let bytes = storage.read(&key()).await.unwrap().unwrap();
    assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_ok());
}

#[tokio::test]
async fn purge_identity_removes_every_entry() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(FsStorage::new(dir.path()));
    let store = CacheStore::new(storage.clone(), Arc::new(FixedClock::new(test_now())), false);

    store
        .get_or_fetch(&key(), || async { Ok(signals(1)) })
        .await
        .unwrap();
    assert!(dir.path().join("octocat").exists());

    store.purge_identity(&identity()).await.unwrap();
    assert!(!dir.path().join("octocat").exists());
    assert!(store.get(&key()).await.is_none());
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

fn files_under(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(files_under(&path));
        } else {
            files.push(path);
        }
    }
    files
}

#[tokio::test]
async fn abandoned_fetch_leaves_no_partial_entry() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedClock::new(test_now()));
    let store = CacheStore::new(Arc::new(FsStorage::new(dir.path())), clock, false);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        store.get_or_fetch(&key(), || async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(signals(1))
        }),
    )
    .await;
    assert!(abandoned.is_err(), "fetch should still have been running");

    for path in files_under(dir.path()) {
        assert_eq!(
            path.extension().and_then(|e| e.to_str()),
            Some("json"),
            "stray file {}",
            path.display()
        );
        let bytes = std::fs::read(&path).unwrap();
        serde_json::from_slice::<serde_json::Value>(&bytes).unwrap();
    }

    // The key is usable again once its leader is gone.
    let raw = store
        .get_or_fetch(&key(), || async { Ok(signals(4)) })
        .await
        .unwrap();
    assert_eq!(opened(&raw.payload), 4);

    let files = files_under(dir.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extension().and_then(|e| e.to_str()), Some("json"));
}

//! Hold queue integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use converge::crdt::{Crdt, CrdtEntity, EntityData, EntityOperation, Reference};
use converge::driver::{Driver, Listener, VolatileDriver};
use converge::sync::{HeldReference, HoldQueue, HoldQueueConfig};
use tokio::sync::mpsc;

use crate::helpers::{reference, vv};

fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let fired = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&fired);
    (fired, move || {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test]
async fn test_release_waits_for_required_version() {
    let queue = HoldQueue::new();
    let (fired, on_release) = counter();
    queue
        .enqueue([HeldReference::new("r1", vv(&[("a", 2)]))], on_release)
        .await;

    queue.process_reference_id("r1", &vv(&[("a", 1)])).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    queue.process_reference_id("r1", &vv(&[("a", 2)])).await;
    queue.process_reference_id("r1", &vv(&[("a", 2)])).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_record_needs_every_reference() {
    let queue = HoldQueue::new();
    let (fired, on_release) = counter();
    let record = queue
        .enqueue(
            [
                HeldReference::new("r1", vv(&[("a", 1)])),
                HeldReference::new("r2", vv(&[("b", 1)])),
            ],
            on_release,
        )
        .await;

    queue.process_reference_id("r1", &vv(&[("a", 1)])).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    let pending = queue.pending().await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, record);
    assert_eq!(pending[0].outstanding.keys().collect::<Vec<_>>(), vec!["r2"]);

    // Versions from other actors do not count.
    queue.process_reference_id("r2", &vv(&[("a", 9)])).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    queue.process_reference_id("r2", &vv(&[("b", 1)])).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn test_one_reference_releases_many_records() {
    let queue = HoldQueue::new();
    let (first, on_first) = counter();
    let (second, on_second) = counter();
    queue
        .enqueue([HeldReference::new("shared", vv(&[("a", 1)]))], on_first)
        .await;
    queue
        .enqueue([HeldReference::new("shared", vv(&[("a", 3)]))], on_second)
        .await;

    assert_eq!(queue.process_reference_id("shared", &vv(&[("a", 2)])).await, 1);
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);

    assert_eq!(queue.process_reference_id("shared", &vv(&[("a", 3)])).await, 1);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_processing_releases_once() {
    let queue = Arc::new(HoldQueue::new());
    let (fired, on_release) = counter();
    queue
        .enqueue(
            [
                HeldReference::new("r1", vv(&[("a", 1)])),
                HeldReference::new("r2", vv(&[("a", 1)])),
            ],
            on_release,
        )
        .await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let queue = Arc::clone(&queue);
        let id = if i % 2 == 0 { "r1" } else { "r2" };
        handles.push(tokio::spawn(async move {
            queue.process_reference_id(id, &vv(&[("a", 1)])).await
        }));
    }
    let mut released = 0;
    for handle in handles {
        released += handle.await.unwrap();
    }
    assert_eq!(released, 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bounded_wait_times_out_and_cancels() {
    let queue = HoldQueue::with_config(HoldQueueConfig {
        release_timeout_ms: 20,
    });
    let err = queue
        .enqueue_and_wait([HeldReference::new("missing", vv(&[("a", 1)]))], None)
        .await
        .unwrap_err();
    assert!(err.is_timeout_error());
    match err {
        converge::Error::Sync(sync_err) => {
            assert_eq!(sync_err.outstanding(), ["missing".to_string()]);
        }
        other => panic!("expected a sync error, got {other:?}"),
    }
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn test_bounded_wait_resolves_on_release() {
    let queue = Arc::new(HoldQueue::new());
    let waiter = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            queue
                .enqueue_and_wait(
                    [HeldReference::new("r1", vv(&[("a", 1)]))],
                    Some(Duration::from_secs(5)),
                )
                .await
        })
    };

    while queue.is_empty().await {
        tokio::task::yield_now().await;
    }
    queue.process_reference_id("r1", &vv(&[("a", 1)])).await;
    waiter.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_abandoned_wait_leaves_no_record() {
    let queue = HoldQueue::new();
    let (fired, on_release) = counter();
    queue
        .enqueue([HeldReference::new("r1", vv(&[("a", 1)]))], on_release)
        .await;

    let wait = queue.enqueue_and_wait(
        [HeldReference::new("r1", vv(&[("a", 1)]))],
        Some(Duration::from_secs(60)),
    );
    assert!(
        tokio::time::timeout(Duration::from_millis(20), wait)
            .await
            .is_err()
    );

    // Only the record enqueued directly is still waiting.
    assert_eq!(queue.len().await, 1);
    assert_eq!(queue.process_reference_id("r1", &vv(&[("a", 1)])).await, 1);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn test_driver_notifications_drive_releases() {
    let store = VolatileDriver::<EntityData<Reference>>::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener: Listener<EntityData<Reference>> =
        Arc::new(move |key: &str, value: Option<&EntityData<Reference>>| {
            if let Some(data) = value {
                let _ = tx.send((key.to_string(), data.version.clone()));
            }
        });
    store.add_listener(listener).await;

    // A post that must not be shown before its author record reaches {a:1}.
    let author = reference("author-1", &[("a", 1)]);
    let queue = HoldQueue::new();
    let (fired, on_release) = counter();
    queue.enqueue([author.hold_requirement()], on_release).await;

    let mut entity = CrdtEntity::<Reference>::new(["name"], Vec::<&str>::new()).unwrap();
    entity
        .apply_operation(&EntityOperation::Set {
            field: "name".into(),
            actor: "a".into(),
            version: vv(&[("a", 1)]),
            value: Reference::new("alice"),
        })
        .unwrap();
    store.set("author-1", entity.data()).await.unwrap();

    let (key, version) = rx.recv().await.unwrap();
    queue.process_reference_id(&key, &version).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

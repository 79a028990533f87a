//! The abstract, watchable, revision-conditional object store consumed by
//! both reconcilers (spec.md §6), plus an in-memory implementation used by
//! tests and the demo binary.
//!
//! Grounded on `kube_runtime::reflector::store::{Store, Writer}` (the
//! dashmap-backed cache) and `kube_runtime::watcher` (live vs. replayed
//! events); unlike the teacher this store is also the system of record
//! (`Create`/`Update` included), since the spec's stores are out-of-scope
//! external collaborators that this crate only consumes through a trait.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::Stream;
use netchange_core::Revision;
use std::{
    collections::VecDeque,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tokio_util::sync::CancellationToken;

/// The write-conflict retry policy a single reconcile step uses when it
/// re-reads and reapplies its own write (spec.md §8/S5): 10 attempts, 10ms
/// between them, distinct from the framework-level bounded backoff in
/// [`crate::backoff`] that governs requeueing the whole step.
pub const RETRY_ATTEMPTS: u32 = 10;
pub const RETRY_DELAY: Duration = Duration::from_millis(10);

/// Things storable in an [`ObjectStore`]: identified and revisioned, per
/// spec.md §3.
pub trait StoredObject: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn revision(&self) -> Revision;
    fn set_revision(&mut self, revision: Revision);
}

/// Errors surfaced by an [`ObjectStore`] (spec.md §6/§7).
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// The caller's `Update` carried a stale revision (spec.md §6's
    /// distinguished `"write condition failed"` error).
    #[error("write condition failed")]
    WriteConditionFailed,
    /// Object already exists (e.g. duplicate `Create`).
    #[error("object {0} already exists")]
    AlreadyExists(String),
    /// A transient I/O-shaped failure; safe to retry (spec.md §7 taxonomy #2).
    #[error("transient store error: {0}")]
    Transient(String),
}

impl StoreError {
    #[must_use]
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, StoreError::WriteConditionFailed)
    }
}

/// A watch notification (mirrors `kube_runtime::watcher::Event`, minus
/// `Restarted` since this store never needs to resynchronize a whole list
/// atomically — `replay` on `watch()` plays the same role).
#[derive(Debug, Clone)]
pub enum Event<T> {
    Applied(T),
}

impl<T> Event<T> {
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            Event::Applied(obj) => obj,
        }
    }
}

/// A stream of watch events, optionally preceded by a replay of every
/// currently-persisted object (spec.md §6: `Watch(channel, options{replay?})`).
pub struct WatchStream<T> {
    replay: VecDeque<Event<T>>,
    live: BroadcastStream<Event<T>>,
    cancel: CancellationToken,
}

impl<T: Clone + Send + 'static> Stream for WatchStream<T> {
    type Item = Event<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        if let Some(event) = self.replay.pop_front() {
            return Poll::Ready(Some(event));
        }
        loop {
            match Pin::new(&mut self.live).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                // A slow consumer that lagged behind the broadcast channel just
                // misses the intervening events; the next live event still arrives.
                Poll::Ready(Some(Err(_lagged))) => continue,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// The `watchHandle` half of spec.md §6's `Watch(channel, options{replay?}) →
/// (watchHandle, error)`: lets a caller release a watch it holds independently
/// of the paired [`WatchStream`]'s own lifetime, so a shutdown path can close
/// a watch that a separate task is still polling.
#[derive(Clone)]
pub struct WatchHandle {
    cancel: CancellationToken,
}

impl WatchHandle {
    /// Releases the paired [`WatchStream`]: its next poll (or, if already
    /// parked, whichever consumer is racing it against a cancellation signal)
    /// observes the stream ending.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// The store contract consumed by the watcher/reconciler pipeline
/// (spec.md §6). Implementations must make `update` revision-conditional.
///
/// Kept free of generic methods so it stays object-safe (`Arc<dyn
/// ObjectStore<T>>` is how the watcher and both reconcilers hold it); the
/// retry helper built on top lives in [`update_with_retry`] instead.
#[async_trait]
pub trait ObjectStore<T: StoredObject>: Send + Sync {
    async fn create(&self, obj: T) -> Result<T, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<T>, StoreError>;
    /// Fails with [`StoreError::WriteConditionFailed`] if `obj.revision()`
    /// does not match the currently-stored revision.
    async fn update(&self, obj: T) -> Result<T, StoreError>;
    /// Returns the event stream plus a [`WatchHandle`] the caller can use to
    /// release the watch (spec.md §6's `Close()`) independently of dropping
    /// the stream itself.
    fn watch(&self, replay: bool) -> (WatchStream<T>, WatchHandle);
}

/// Re-reads and retries an update under a caller-supplied mutator until it
/// either succeeds or `StoreError::WriteConditionFailed` has been hit
/// `max_attempts` times, sleeping `delay` between attempts — the inner,
/// tight retry loop from spec.md §8/S5 (distinct from the framework-level
/// bounded backoff in [`crate::backoff`], which governs requeueing the
/// whole reconcile step rather than a single write).
pub async fn update_with_retry<T: StoredObject>(
    store: &(impl ObjectStore<T> + ?Sized),
    id: &str,
    max_attempts: u32,
    delay: std::time::Duration,
    mut mutate: impl FnMut(&mut T) + Send,
) -> Result<T, StoreError> {
    for attempt in 0..max_attempts {
        let Some(mut obj) = store.get(id).await? else {
            return Err(StoreError::Transient(format!("object {id} not found")));
        };
        mutate(&mut obj);
        match store.update(obj).await {
            Ok(updated) => return Ok(updated),
            Err(StoreError::WriteConditionFailed) if attempt + 1 < max_attempts => {
                tracing::debug!(id, attempt, "write condition failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
    Err(StoreError::WriteConditionFailed)
}

/// A dashmap-backed in-memory store, standing in for whichever persistent
/// watchable store backs `NetworkChange`/`DeviceChange` in production
/// (out of scope per spec.md §1). Grounded on
/// `kube_runtime::reflector::store::Writer`'s `DashMap<ObjectRef<K>, K>`.
pub struct MemoryStore<T> {
    objects: Arc<DashMap<String, T>>,
    events: broadcast::Sender<Event<T>>,
}

impl<T: StoredObject> Default for MemoryStore<T> {
    fn default() -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        MemoryStore {
            objects: Arc::new(DashMap::new()),
            events: tx,
        }
    }
}

impl<T: StoredObject> MemoryStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T: StoredObject> ObjectStore<T> for MemoryStore<T> {
    async fn create(&self, mut obj: T) -> Result<T, StoreError> {
        if self.objects.contains_key(obj.id()) {
            return Err(StoreError::AlreadyExists(obj.id().to_string()));
        }
        obj.set_revision(Revision::NONE.next());
        self.objects.insert(obj.id().to_string(), obj.clone());
        let _ = self.events.send(Event::Applied(obj.clone()));
        Ok(obj)
    }

    async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        Ok(self.objects.get(id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, mut obj: T) -> Result<T, StoreError> {
        let id = obj.id().to_string();
        match self.objects.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Vacant(_) => {
                Err(StoreError::Transient(format!("object {id} not found")))
            }
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if entry.get().revision() != obj.revision() {
                    return Err(StoreError::WriteConditionFailed);
                }
                obj.set_revision(obj.revision().next());
                entry.insert(obj.clone());
                let _ = self.events.send(Event::Applied(obj.clone()));
                Ok(obj)
            }
        }
    }

    fn watch(&self, replay: bool) -> (WatchStream<T>, WatchHandle) {
        let live = BroadcastStream::new(self.events.subscribe());
        let replay = if replay {
            self.objects
                .iter()
                .map(|entry| Event::Applied(entry.value().clone()))
                .collect()
        } else {
            VecDeque::new()
        };
        let cancel = CancellationToken::new();
        let stream = WatchStream { replay, live, cancel: cancel.clone() };
        (stream, WatchHandle { cancel })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        id: String,
        revision: Revision,
        value: u32,
    }

    impl StoredObject for Widget {
        fn id(&self) -> &str {
            &self.id
        }

        fn revision(&self) -> Revision {
            self.revision
        }

        fn set_revision(&mut self, revision: Revision) {
            self.revision = revision;
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = MemoryStore::<Widget>::new();
        let created = store
            .create(Widget {
                id: "w1".into(),
                revision: Revision::NONE,
                value: 1,
            })
            .await
            .unwrap();
        assert_eq!(created.revision, Revision(1));
        let fetched = store.get("w1").await.unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn update_with_stale_revision_is_rejected_and_object_unchanged() {
        let store = MemoryStore::<Widget>::new();
        let created = store
            .create(Widget {
                id: "w1".into(),
                revision: Revision::NONE,
                value: 1,
            })
            .await
            .unwrap();
        let stale = Widget {
            value: 2,
            ..created.clone()
        };
        // advance the real revision once
        store
            .update(Widget {
                value: 99,
                ..created.clone()
            })
            .await
            .unwrap();
        let err = store.update(stale).await.unwrap_err();
        assert!(err.is_write_conflict());
        let current = store.get("w1").await.unwrap().unwrap();
        assert_eq!(current.value, 99);
    }

    #[tokio::test]
    async fn watch_replay_emits_existing_objects_first() {
        let store = MemoryStore::<Widget>::new();
        store
            .create(Widget {
                id: "w1".into(),
                revision: Revision::NONE,
                value: 1,
            })
            .await
            .unwrap();
        let (mut stream, _handle) = store.watch(true);
        let first = futures::StreamExt::next(&mut stream).await.unwrap();
        assert_eq!(first.into_inner().id, "w1");
    }

    #[tokio::test]
    async fn closing_the_watch_handle_ends_the_stream() {
        let store = MemoryStore::<Widget>::new();
        let (mut stream, handle) = store.watch(false);
        handle.close();
        assert!(futures::StreamExt::next(&mut stream).await.is_none());
    }

    #[tokio::test]
    async fn update_with_retry_applies_mutation_to_the_latest_revision() {
        let store = Arc::new(MemoryStore::<Widget>::new());
        store
            .create(Widget {
                id: "w1".into(),
                revision: Revision::NONE,
                value: 0,
            })
            .await
            .unwrap();
        // A prior writer has already raced ahead by the time we start retrying.
        let mut obj = store.get("w1").await.unwrap().unwrap();
        obj.value = 7;
        store.update(obj).await.unwrap();

        let result = update_with_retry(store.as_ref(), "w1", 10, std::time::Duration::from_millis(1), |w| {
            w.value += 1;
        })
        .await
        .unwrap();
        assert_eq!(result.value, 8);
    }

    #[tokio::test]
    async fn update_with_retry_gives_up_after_max_attempts_under_constant_contention() {
        let store = Arc::new(MemoryStore::<Widget>::new());
        store
            .create(Widget {
                id: "w1".into(),
                revision: Revision::NONE,
                value: 0,
            })
            .await
            .unwrap();
        // Force every attempt's write to carry a revision that is already stale
        // by the time it lands, so the loop is guaranteed to exhaust its budget.
        let result = update_with_retry(store.as_ref(), "w1", 3, std::time::Duration::from_millis(1), |w| {
            w.revision = Revision::NONE;
        })
        .await;
        assert!(matches!(result, Err(StoreError::WriteConditionFailed)));
    }
}

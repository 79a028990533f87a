//! Turns a store's watch stream into queued reconcile ids (spec.md §4.3's
//! `Watcher`: "turns a store's change stream into a queue of candidate work
//! items"). Grounded on `kube_runtime::watcher`/`trigger_self`, which plays
//! exactly this role for a `kube_runtime::reflector`.

use crate::reconciler::Queue;
use crate::store::{ObjectStore, StoredObject};
use futures::StreamExt;
use std::hash::Hash;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Maps an object to the partition its id belongs to (spec.md §4.3:
/// "pure function `id -> partitionKey`"). For the NCC this is the NC id
/// itself (one partition per NC); for the DCC it is the device id.
pub trait Partitioner<T>: Fn(&T) -> Self::Key + Send + Sync + 'static {
    type Key: Eq + Hash + Clone + Send + Sync + 'static;
}

impl<T, K, F> Partitioner<T> for F
where
    F: Fn(&T) -> K + Send + Sync + 'static,
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    type Key = K;
}

/// Subscribes to `store`'s watch stream (with replay, so a freshly-started
/// node picks up every persisted object — SPEC_FULL.md's
/// replay-on-watch-start addendum) and enqueues each event's object id onto
/// the partitioned reconcile [`Queue`]. Runs until the store's broadcast
/// channel closes or `stop` is cancelled (spec.md §5: "store watches survive
/// controller lifetime and are torn down on `Stop()`"), closing its own
/// watch handle either way.
pub async fn drive<T, K, P>(store: Arc<dyn ObjectStore<T>>, queue: Queue<K, String>, partitioner: P, stop: CancellationToken)
where
    T: StoredObject,
    K: Eq + Hash + Clone + Send + Sync + 'static,
    P: Partitioner<T, Key = K>,
{
    let (mut events, handle) = store.watch(true);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            maybe_event = events.next() => {
                match maybe_event {
                    Some(event) => {
                        let obj = event.into_inner();
                        let key = partitioner(&obj);
                        queue.enqueue(key, obj.id().to_string());
                    }
                    None => break,
                }
            }
        }
    }
    handle.close();
    tracing::debug!("watch stream ended, stopping watcher");
}

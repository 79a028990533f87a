//! Generic watch/schedule/reconcile framework shared by the
//! `NetworkChange` and `DeviceChange` controllers.
//!
//! Mirrors `kube-runtime`'s role: `kube-runtime` turns a Kubernetes watch
//! into a `Store` + a scheduler-backed `Controller::run`; this crate turns
//! the spec's abstract, revision-conditional store (spec.md §6) into the
//! same shape of pipeline — `Watcher -> Partitioner queue -> Reconciler
//! step -> store update`, per spec.md §2/§4.3.

pub mod backoff;
mod domain;
pub mod reconciler;
pub mod store;
pub mod watcher;

pub use reconciler::{Action, Queue, Step};
pub use store::{
    update_with_retry, Event, MemoryStore, ObjectStore, StoreError, StoredObject, WatchHandle, WatchStream,
    RETRY_ATTEMPTS, RETRY_DELAY,
};
pub use watcher::{drive, Partitioner};

//! Bridges `DeviceChange` watch events back into the NCC's partitioned
//! queue, keyed by the parent `NetworkChange` id.
//!
//! The NCC only watches the `NetworkChange` store directly, but its second
//! reconcile branch (spec.md §4.1) depends on the aggregate state of child
//! `DeviceChange`s — without this bridge a DC completing would never
//! re-trigger the NC that owns it. Mirrors the role `Controller::owns` plays
//! in `kube-runtime`: a child resource's events get mapped back to the
//! owning parent's reconcile queue.

use futures::StreamExt;
use netchange_core::DeviceChange;
use netchange_runtime::{ObjectStore, Queue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn drive_device_changes_into_ncc(
    device_changes: Arc<dyn ObjectStore<DeviceChange>>,
    ncc_queue: Queue<String, String>,
    stop: CancellationToken,
) {
    let (mut events, handle) = device_changes.watch(true);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            maybe_event = events.next() => {
                match maybe_event {
                    Some(event) => {
                        let dc = event.into_inner();
                        ncc_queue.enqueue(dc.network_change_id.clone(), dc.network_change_id);
                    }
                    None => break,
                }
            }
        }
    }
    handle.close();
    tracing::debug!("device-change watch stream ended, stopping NCC bridge");
}

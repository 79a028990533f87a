//! Bootstraps both controllers: a `NetworkChange` store and a `DeviceChange`
//! store, each driven by a watcher feeding a partitioned reconcile queue
//! (spec.md §2, §4.3).

use netchange::{DeviceChangeStep, NetworkChangeStep};
use netchange_client::{
    InMemoryDeviceCache, InMemoryDeviceRegistry, SessionRegistry, StaticLeadership, StaticMastership,
};
use netchange_core::{DeviceChange, NetworkChange};
use netchange_runtime::{drive, MemoryStore, ObjectStore, Queue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;
mod sessions;

#[tokio::main]
async fn main() {
    let config = config::Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!(node_id = %config.node_id, reconcile_workers = config.reconcile_workers, "starting network-change controller");

    let network_changes: Arc<dyn ObjectStore<NetworkChange>> = Arc::new(MemoryStore::new());
    let device_changes: Arc<dyn ObjectStore<DeviceChange>> = Arc::new(MemoryStore::new());

    let leadership = Arc::new(StaticLeadership::new(true));
    let mastership = Arc::new(StaticMastership::new());
    let device_registry = Arc::new(InMemoryDeviceRegistry::new());
    let device_cache = Arc::new(InMemoryDeviceCache::new());
    let sessions = Arc::new(SessionRegistry::new(Arc::new(sessions::DialingSessionFactory)));

    let stop = CancellationToken::new();

    let ncc_step = Arc::new(NetworkChangeStep {
        network_changes: network_changes.clone(),
        device_changes: device_changes.clone(),
        leadership,
    });
    let ncc_queue: Queue<String, String> = Queue::new_with_stop(ncc_step, stop.clone());

    let dcc_step = Arc::new(DeviceChangeStep {
        device_changes: device_changes.clone(),
        mastership,
        device_cache,
        device_registry,
        sessions,
    });
    let dcc_queue: Queue<String, String> = Queue::new_with_stop(dcc_step, stop.clone());

    let ncc_bridge_queue = ncc_queue.clone();
    let ncc_watch = tokio::spawn(drive(
        network_changes,
        ncc_queue,
        |nc: &NetworkChange| nc.id.clone(),
        stop.clone(),
    ));
    let dcc_watch = tokio::spawn(drive(
        device_changes.clone(),
        dcc_queue,
        |dc: &DeviceChange| dc.device_id.clone(),
        stop.clone(),
    ));
    let ncc_bridge = tokio::spawn(netchange::drive_device_changes_into_ncc(
        device_changes,
        ncc_bridge_queue,
        stop.clone(),
    ));

    tokio::signal::ctrl_c().await.expect("failed to listen for shutdown signal");
    tracing::info!("shutdown signal received, stopping watchers and partition workers");
    stop.cancel();

    for (name, task) in [("network-change watcher", ncc_watch), ("device-change watcher", dcc_watch), ("device-change to NCC bridge", ncc_bridge)] {
        if let Err(err) = task.await {
            tracing::error!(%err, task = name, "task panicked during shutdown");
        }
    }
}

//! Device registry and device cache clients (spec.md §6): `Devices.Get`
//! and `DeviceCache.Contains`. Both are external collaborators out of
//! scope for this core (spec.md §1); this module defines the capability
//! interfaces the DCC consumes plus in-memory fakes, grounded on
//! `kube_client::Api`'s role as the thin typed handle onto an external
//! collaborator.

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use netchange_core::{Device, DeviceCacheKey};
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DeviceRegistryError {
    #[error("device {0} not found")]
    NotFound(String),
}

/// `Devices.Get(deviceID) -> Device` (spec.md §6).
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn get(&self, device_id: &str) -> Result<Device, DeviceRegistryError>;
}

/// In-memory device registry, standing in for the topology store
/// (spec.md §1 lists the device registry as out of scope for this core).
#[derive(Default)]
pub struct InMemoryDeviceRegistry {
    devices: DashMap<String, Device>,
}

impl InMemoryDeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }
}

#[async_trait]
impl DeviceRegistry for InMemoryDeviceRegistry {
    async fn get(&self, device_id: &str) -> Result<Device, DeviceRegistryError> {
        self.devices
            .get(device_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DeviceRegistryError::NotFound(device_id.to_string()))
    }
}

/// `DeviceCache.Contains(deviceID, version) -> bool` (spec.md §6): the set
/// of `(deviceID, version)` pairs known to be configurable right now.
/// Membership gates whether the DCC ever contacts the device (spec.md
/// §4.2's "not-yet-connected devices produce a synthetic completion").
#[async_trait]
pub trait DeviceCache: Send + Sync {
    async fn contains(&self, key: &DeviceCacheKey) -> bool;
}

#[derive(Default)]
pub struct InMemoryDeviceCache {
    present: DashSet<(String, String)>,
}

impl InMemoryDeviceCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_present(&self, device_id: impl Into<String>, version: impl Into<String>) {
        self.present.insert((device_id.into(), version.into()));
    }

    pub fn mark_absent(&self, device_id: &str, version: &str) {
        self.present.remove(&(device_id.to_string(), version.to_string()));
    }
}

#[async_trait]
impl DeviceCache for InMemoryDeviceCache {
    async fn contains(&self, key: &DeviceCacheKey) -> bool {
        self.present
            .contains(&(key.device_id.clone(), key.device_version.clone()))
    }
}

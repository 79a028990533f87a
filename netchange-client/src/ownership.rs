//! Leadership and mastership clients (spec.md §6): `IsLeader() -> bool`
//! and `IsMaster(deviceID) -> bool`, both required to be "local,
//! non-blocking" (spec.md §5) since they're evaluated on every reconcile
//! step. The actual election machinery is out of scope (spec.md §1); this
//! module defines the capability interfaces plus a toggleable in-memory
//! fake used by tests.

use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cluster-wide single-writer token for `NetworkChange`s (spec.md GLOSSARY).
pub trait Leadership: Send + Sync {
    fn is_leader(&self) -> bool;
}

/// Per-device single-writer token for that device's `DeviceChange`s
/// (spec.md GLOSSARY).
pub trait Mastership: Send + Sync {
    fn is_master(&self, device_id: &str) -> bool;
}

/// A locally cached boolean flipped by an (out-of-scope) election client.
/// Cheap and non-blocking to query, as spec.md §5 requires.
#[derive(Clone, Default)]
pub struct StaticLeadership(Arc<AtomicBool>);

impl StaticLeadership {
    #[must_use]
    pub fn new(is_leader: bool) -> Self {
        StaticLeadership(Arc::new(AtomicBool::new(is_leader)))
    }

    pub fn set(&self, is_leader: bool) {
        self.0.store(is_leader, Ordering::SeqCst);
    }
}

impl Leadership for StaticLeadership {
    fn is_leader(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A locally cached set of mastered device ids.
#[derive(Clone, Default)]
pub struct StaticMastership(Arc<DashSet<String>>);

impl StaticMastership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn of(devices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let set = Self::new();
        for device in devices {
            set.grant(device.into());
        }
        set
    }

    pub fn grant(&self, device_id: impl Into<String>) {
        self.0.insert(device_id.into());
    }

    pub fn revoke(&self, device_id: &str) {
        self.0.remove(device_id);
    }
}

impl Mastership for StaticMastership {
    fn is_master(&self, device_id: &str) -> bool {
        self.0.contains(device_id)
    }
}

use crate::ops::TypedValueOp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, monotonically-advancing version stamp set by the store on
/// every write (spec.md §3). Stands in for `kube-core`'s `resourceVersion`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
    pub const NONE: Revision = Revision(0);

    #[must_use]
    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of application for a change (spec.md GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Change,
    Rollback,
}

/// Progress within a phase (spec.md GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Pending,
    Complete,
    Failed,
}

/// Rationale for the current state (spec.md GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    None,
    Error,
}

/// The status shape shared by `NetworkChange` and `DeviceChange` (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub phase: Phase,
    pub state: State,
    pub reason: Reason,
    pub message: String,
    pub incarnation: u64,
}

impl Status {
    /// The initial status an externally-created `NetworkChange` starts with
    /// (spec.md §3 Lifecycle): `Incarnation=0, Phase=CHANGE, State=PENDING,
    /// Reason=NONE`.
    #[must_use]
    pub fn initial() -> Self {
        Status {
            phase: Phase::Change,
            state: State::Pending,
            reason: Reason::None,
            message: String::new(),
            incarnation: 0,
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            (self.phase, self.state),
            (Phase::Change, State::Complete) | (Phase::Rollback, State::Complete)
        )
    }
}

/// One device's portion of a `NetworkChange` as expressed in the parent's
/// `Changes` list (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceChangeSpec {
    pub device_id: String,
    pub device_version: String,
    pub ops: Vec<TypedValueOp>,
}

/// Operator-visible intent that groups per-device changes applied together
/// (spec.md §3, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkChange {
    pub id: String,
    pub changes: Vec<DeviceChangeSpec>,
    pub status: Status,
    pub revision: Revision,
}

impl NetworkChange {
    /// Constructs a freshly-issued `NetworkChange` at `Incarnation=0`.
    ///
    /// # Panics
    /// Panics if `changes` is empty; spec.md §3 requires a non-empty list.
    #[must_use]
    pub fn new(id: impl Into<String>, changes: Vec<DeviceChangeSpec>) -> Self {
        assert!(!changes.is_empty(), "NetworkChange.Changes must be non-empty");
        NetworkChange {
            id: id.into(),
            changes,
            status: Status::initial(),
            revision: Revision::NONE,
        }
    }
}

/// One device's share of a `NetworkChange` (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceChange {
    pub id: String,
    pub network_change_id: String,
    pub device_id: String,
    pub device_version: String,
    pub change: Vec<TypedValueOp>,
    pub status: Status,
    pub revision: Revision,
}

impl DeviceChange {
    #[must_use]
    pub fn cache_key(&self) -> DeviceCacheKey {
        DeviceCacheKey {
            device_id: self.device_id.clone(),
            device_version: self.device_version.clone(),
        }
    }
}

/// Identifies a `(deviceID, version)` pair in the `DeviceCache` (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceCacheKey {
    pub device_id: String,
    pub device_version: String,
}

/// Role a device plays, carried alongside its connection details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceRole {
    Leaf,
    Spine,
    Other,
}

/// External device entity (spec.md §3). The TLS material is modeled as
/// three distinct, independently-keyed fields: the spec's Open Question
/// flags a source pattern that collapses `tls_key`/`tls_ca_cert`/`tls_cert`
/// into a single attribute key, and explicitly calls for NOT replicating
/// that bug here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub address: String,
    pub target: String,
    pub version: String,
    pub role: DeviceRole,
    pub device_type: String,
    pub credentials_user: Option<String>,
    pub credentials_password: Option<String>,
    pub tls_key: Option<String>,
    pub tls_ca_cert: Option<String>,
    pub tls_cert: Option<String>,
    pub timeout_ms: u64,
    pub protocols: Vec<String>,
    pub attributes: std::collections::BTreeMap<String, String>,
    pub revision: Revision,
}

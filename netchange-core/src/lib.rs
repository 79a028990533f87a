//! Shared data model for the network-change reconciliation controllers.
//!
//! Mirrors the role `kube-core` plays for `kube-runtime`: this crate defines
//! the types that both the generic controller framework (`netchange-runtime`)
//! and the domain reconcilers (`netchange`) agree on, with no transport or
//! storage code of its own.

mod id;
mod ops;
mod status;
mod types;

pub use id::device_change_id;
pub use ops::{invert_ops, OpKind, TypedValue, TypedValueOp};
pub use status::messages;
pub use types::{
    Device, DeviceCacheKey, DeviceChange, DeviceChangeSpec, NetworkChange, Phase, Reason,
    Revision, State, Status,
};

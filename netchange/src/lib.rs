//! Wires the generic watch/schedule/reconcile framework from
//! `netchange-runtime` to the two concrete controllers spec.md describes:
//! the `NetworkChange` controller and the `DeviceChange` controller.

pub mod dcc;
pub mod ncc;
pub mod wiring;

pub use dcc::DeviceChangeStep;
pub use ncc::NetworkChangeStep;
pub use wiring::drive_device_changes_into_ncc;

//! Client-side adapters for the external collaborators the network-change
//! controllers depend on, in the role `kube-client` plays for
//! `kube-runtime`: thin, injectable handles onto systems this core never
//! implements itself (spec.md §1's out-of-scope list) — the device
//! registry, the device cache, device sessions, and the leadership /
//! mastership election results.

pub mod devices;
pub mod ownership;
pub mod session;

pub use devices::{DeviceCache, DeviceRegistry, DeviceRegistryError, InMemoryDeviceCache, InMemoryDeviceRegistry};
pub use ownership::{Leadership, Mastership, StaticLeadership, StaticMastership};
pub use session::{DeviceError, DeviceSession, SessionFactory, SessionRegistry, SetRequest, SetResponse};

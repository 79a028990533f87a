//! Wires the concrete `NetworkChange`/`DeviceChange` types from
//! `netchange-core` into the generic [`StoredObject`] contract this crate's
//! `Store`/`Watcher`/`Reconciler` pipeline is built around.

use crate::store::StoredObject;
use netchange_core::{DeviceChange, NetworkChange, Revision};

impl StoredObject for NetworkChange {
    fn id(&self) -> &str {
        &self.id
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

impl StoredObject for DeviceChange {
    fn id(&self) -> &str {
        &self.id
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn set_revision(&mut self, revision: Revision) {
        self.revision = revision;
    }
}

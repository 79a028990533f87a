//! A minimal `SessionFactory` for the standalone binary. The real southbound
//! gRPC transport is out of scope (spec.md §1); this stands in with a
//! session that reports every `set` call as succeeding, so the binary is
//! runnable end-to-end against the in-memory stores without a real device.

use async_trait::async_trait;
use netchange_client::{DeviceError, DeviceSession, SessionFactory, SetRequest, SetResponse};
use netchange_core::Device;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct DialingSessionFactory;

#[async_trait]
impl SessionFactory for DialingSessionFactory {
    async fn connect(&self, device: &Device) -> Result<Arc<dyn DeviceSession>, DeviceError> {
        tracing::debug!(device.id = %device.id, device.address = %device.address, "connecting device session");
        Ok(Arc::new(NoopSession {
            cancellation: CancellationToken::new(),
        }))
    }
}

struct NoopSession {
    cancellation: CancellationToken,
}

#[async_trait]
impl DeviceSession for NoopSession {
    async fn set(&self, _request: SetRequest) -> Result<SetResponse, DeviceError> {
        Ok(SetResponse::default())
    }

    fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }
}

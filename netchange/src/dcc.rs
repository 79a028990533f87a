//! The DeviceChange reconciler (spec.md §4.2).

use async_trait::async_trait;
use netchange_client::{DeviceCache, DeviceRegistry, Mastership, SessionRegistry, SetRequest};
use netchange_core::{invert_ops, DeviceChange, Phase, Reason, State};
use netchange_runtime::{update_with_retry, Action, ObjectStore, Step, StoreError, RETRY_ATTEMPTS, RETRY_DELAY};
use std::sync::Arc;
use tracing::{info, warn};

/// Single reconcile step for one `DeviceChange` id (spec.md §4.2).
pub struct DeviceChangeStep {
    pub device_changes: Arc<dyn ObjectStore<DeviceChange>>,
    pub mastership: Arc<dyn Mastership>,
    pub device_cache: Arc<dyn DeviceCache>,
    pub device_registry: Arc<dyn DeviceRegistry>,
    pub sessions: Arc<SessionRegistry>,
}

#[async_trait]
impl Step for DeviceChangeStep {
    type Id = String;

    async fn reconcile(&self, id: &String) -> Action {
        let dc = match self.device_changes.get(id).await {
            Ok(Some(dc)) => dc,
            Ok(None) => return Action::Done,
            Err(_) => return Action::Retry,
        };

        if !self.mastership.is_master(&dc.device_id) {
            // Ownership guard (spec.md §4.2): not master for this device, drop silently.
            return Action::Done;
        }
        if dc.status.state != State::Pending {
            return Action::Done;
        }

        let span = tracing::info_span!("reconcile_device_change", dc.id = %dc.id, dc.device_id = %dc.device_id, ?dc.status.phase);
        let _enter = span.enter();

        if !self.device_cache.contains(&dc.cache_key()).await {
            // Not yet connected: synthesize a completion rather than block on
            // a device that may never show up (spec.md §4.2).
            return self.write_outcome(&dc, State::Complete, Reason::None, String::new()).await;
        }

        let device = match self.device_registry.get(&dc.device_id).await {
            Ok(device) => device,
            Err(err) => {
                warn!(dc.id = %dc.id, %err, "device registry lookup failed");
                return Action::Retry;
            }
        };

        let session = match self.sessions.session_for(&device).await {
            Ok(session) => session,
            Err(err) => {
                return self
                    .write_outcome(&dc, State::Failed, Reason::Error, err.to_string())
                    .await;
            }
        };

        let ops = match dc.status.phase {
            Phase::Change => dc.change.clone(),
            Phase::Rollback => invert_ops(&dc.change),
        };

        // Race the device call against the session's own cancellation (spec.md
        // §5: "device calls propagate the per-request context"), so a session
        // torn down mid-`Set` (reconnect, shutdown) unblocks this reconcile
        // instead of waiting on a call that will never return.
        let cancelled = session.cancellation();
        tokio::select! {
            result = session.set(SetRequest { ops }) => match result {
                Ok(_) => {
                    info!(dc.id = %dc.id, "device change applied");
                    self.write_outcome(&dc, State::Complete, Reason::None, String::new()).await
                }
                Err(err) => {
                    self.write_outcome(&dc, State::Failed, Reason::Error, err.to_string())
                        .await
                }
            },
            () = cancelled.cancelled() => {
                warn!(dc.id = %dc.id, "device session cancelled mid-set, retrying");
                Action::Retry
            }
        }
    }
}

impl DeviceChangeStep {
    async fn write_outcome(
        &self,
        dc: &DeviceChange,
        state: State,
        reason: Reason,
        message: String,
    ) -> Action {
        let dc_id = dc.id.clone();
        let result = update_with_retry(
            self.device_changes.as_ref(),
            &dc_id,
            RETRY_ATTEMPTS,
            RETRY_DELAY,
            move |updated: &mut DeviceChange| {
                updated.status.state = state;
                updated.status.reason = reason;
                updated.status.message = message.clone();
            },
        )
        .await;
        match result {
            Ok(_) => Action::Done,
            Err(StoreError::WriteConditionFailed) => Action::Retry,
            Err(err) => {
                warn!(dc.id = %dc_id, %err, "transient store error writing device change outcome");
                Action::Retry
            }
        }
    }
}

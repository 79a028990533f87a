//! The NetworkChange reconciler (spec.md §4.1).

use async_trait::async_trait;
use netchange_client::Leadership;
use netchange_core::{device_change_id, messages, DeviceChange, NetworkChange, Phase, Reason, Revision, State, Status};
use netchange_runtime::{
    update_with_retry, Action, ObjectStore, Step, StoreError, RETRY_ATTEMPTS, RETRY_DELAY,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Single reconcile step for one `NetworkChange` id (spec.md §4.1).
pub struct NetworkChangeStep {
    pub network_changes: Arc<dyn ObjectStore<NetworkChange>>,
    pub device_changes: Arc<dyn ObjectStore<DeviceChange>>,
    pub leadership: Arc<dyn Leadership>,
}

#[async_trait]
impl Step for NetworkChangeStep {
    type Id = String;

    async fn reconcile(&self, id: &String) -> Action {
        if !self.leadership.is_leader() {
            // Ownership guard (spec.md §4.1): not leader, drop silently.
            return Action::Done;
        }

        let nc = match self.network_changes.get(id).await {
            Ok(Some(nc)) => nc,
            Ok(None) => return Action::Done,
            Err(_) => return Action::Retry,
        };

        let span = tracing::info_span!("reconcile_network_change", nc.id = %nc.id, nc.incarnation = nc.status.incarnation, ?nc.status.phase, ?nc.status.state);
        let _enter = span.enter();

        let mut device_changes = Vec::with_capacity(nc.changes.len());
        for spec in &nc.changes {
            let dc_id = device_change_id(&nc.id, &spec.device_id, &spec.device_version);
            match self.device_changes.get(&dc_id).await {
                Ok(maybe_dc) => device_changes.push(maybe_dc),
                Err(_) => return Action::Retry,
            }
        }

        // Branch 2 is only safe to trust once *every* DC agrees with the
        // parent on both incarnation and phase — a DC that is Pending at the
        // right incarnation but the wrong phase (e.g. still mid-flight under
        // a stale CHANGE dispatch while the NC has already moved to
        // ROLLBACK) must not be read as "nothing to do here" just because
        // some other DC already caught up.
        let any_missing = device_changes.iter().any(Option::is_none);
        let all_synced = !any_missing
            && device_changes.iter().flatten().all(|dc| {
                dc.status.incarnation == nc.status.incarnation && dc.status.phase == nc.status.phase
            });

        if !all_synced {
            return self.sync_device_changes(&nc, &device_changes).await;
        }

        self.advance_network_change(&nc, &device_changes).await
    }
}

impl NetworkChangeStep {
    /// Branch 1 of spec.md §4.1: create missing `DeviceChange`s and bring
    /// stale ones up to the parent's incarnation/phase.
    ///
    /// Every entry in `nc.changes` is attempted regardless of whether an
    /// earlier entry in the same pass failed — a write conflict on one
    /// device's DC must not leave a sibling DC permanently stuck behind the
    /// parent, since that sibling's own incarnation bump is what the DCC is
    /// waiting to see.
    async fn sync_device_changes(
        &self,
        nc: &NetworkChange,
        device_changes: &[Option<DeviceChange>],
    ) -> Action {
        let mut any_failed = false;
        for (spec, existing) in nc.changes.iter().zip(device_changes.iter()) {
            let dc_id = device_change_id(&nc.id, &spec.device_id, &spec.device_version);
            match existing {
                None => {
                    let dc = DeviceChange {
                        id: dc_id,
                        network_change_id: nc.id.clone(),
                        device_id: spec.device_id.clone(),
                        device_version: spec.device_version.clone(),
                        change: spec.ops.clone(),
                        status: Status {
                            phase: nc.status.phase,
                            state: State::Pending,
                            reason: Reason::None,
                            message: nc.status.message.clone(),
                            incarnation: nc.status.incarnation,
                        },
                        revision: Revision::NONE,
                    };
                    match self.device_changes.create(dc).await {
                        Ok(_) | Err(StoreError::AlreadyExists(_)) => {}
                        Err(err) => {
                            warn!(%dc_id, %err, "failed to create device change");
                            any_failed = true;
                        }
                    }
                }
                Some(dc) if dc.status.incarnation != nc.status.incarnation || dc.status.phase != nc.status.phase => {
                    let nc_status = nc.status.clone();
                    let ops = spec.ops.clone();
                    let result = update_with_retry(
                        self.device_changes.as_ref(),
                        &dc_id,
                        RETRY_ATTEMPTS,
                        RETRY_DELAY,
                        move |updated: &mut DeviceChange| {
                            updated.change = ops.clone();
                            updated.status = Status {
                                phase: nc_status.phase,
                                state: State::Pending,
                                reason: Reason::None,
                                message: nc_status.message.clone(),
                                incarnation: nc_status.incarnation,
                            };
                        },
                    )
                    .await;
                    if let Err(err) = result {
                        warn!(%dc_id, %err, "failed to sync device change to parent incarnation");
                        any_failed = true;
                    }
                }
                Some(_) => {}
            }
        }
        if any_failed {
            Action::Retry
        } else {
            Action::Done
        }
    }

    /// Branch 2 of spec.md §4.1: all `DeviceChange`s are at the parent's
    /// incarnation, so aggregate their state and possibly advance the
    /// `NetworkChange`'s own status. Tie-break priority: FAILED > PENDING >
    /// COMPLETE.
    async fn advance_network_change(
        &self,
        nc: &NetworkChange,
        device_changes: &[Option<DeviceChange>],
    ) -> Action {
        let device_changes: Vec<&DeviceChange> = device_changes.iter().flatten().collect();
        if device_changes.len() != nc.changes.len() {
            // Shouldn't happen given the branch-1 guard above; be defensive.
            return Action::Retry;
        }

        let any_failed = device_changes
            .iter()
            .any(|dc| dc.status.phase == nc.status.phase && dc.status.state == State::Failed);
        let any_pending = device_changes
            .iter()
            .any(|dc| dc.status.state == State::Pending);
        let all_complete = device_changes
            .iter()
            .all(|dc| dc.status.phase == nc.status.phase && dc.status.state == State::Complete);

        let new_status = if any_failed {
            match nc.status.phase {
                Phase::Change => Some(Status {
                    phase: Phase::Rollback,
                    state: State::Pending,
                    reason: Reason::Error,
                    message: messages::CHANGE_REJECTED_BY_DEVICE.to_string(),
                    incarnation: nc.status.incarnation + 1,
                }),
                Phase::Rollback => Some(Status {
                    phase: Phase::Rollback,
                    state: State::Pending,
                    reason: Reason::Error,
                    message: messages::ROLLBACK_REJECTED_BY_DEVICE.to_string(),
                    incarnation: nc.status.incarnation,
                }),
            }
        } else if any_pending {
            None
        } else if all_complete {
            Some(Status {
                phase: nc.status.phase,
                state: State::Complete,
                reason: Reason::None,
                message: nc.status.message.clone(),
                incarnation: nc.status.incarnation,
            })
        } else {
            None
        };

        let Some(new_status) = new_status else {
            return Action::Done;
        };
        if new_status == nc.status {
            return Action::Done;
        }

        let nc_id = nc.id.clone();
        let result = update_with_retry(
            self.network_changes.as_ref(),
            &nc_id,
            RETRY_ATTEMPTS,
            RETRY_DELAY,
            move |updated: &mut NetworkChange| {
                updated.status = new_status.clone();
            },
        )
        .await;
        match result {
            Ok(updated) => {
                info!(nc.id = %updated.id, ?updated.status.phase, ?updated.status.state, "network change advanced");
                Action::Done
            }
            Err(StoreError::WriteConditionFailed) => Action::Retry,
            Err(err) => {
                warn!(nc.id = %nc_id, %err, "transient store error advancing network change");
                Action::Retry
            }
        }
    }
}

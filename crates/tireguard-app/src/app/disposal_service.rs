//! Disposal Service - formal tire retirement

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use tireguard_domain::model::{ApprovalRef, Baseline, DisposalRequest, NewDisposal};
use tireguard_domain::repository::UnitRepository;
use tireguard_types::{DisposalStatus, Fingerprint, Result};

use super::baseline_store::BaselineStore;
use super::rebaseline_gate::{ensure_unit, RebaselineGate};
use super::sync::{require, StoreCommand, SyncService, Written};
use super::Session;

/// Outcome of approving a disposal
#[derive(Debug, Clone, Serialize)]
pub struct DisposalApproval {
    pub disposal: Written<DisposalRequest>,
    /// `None` when the unit has no baseline yet
    pub baseline: Option<Written<Baseline>>,
}

pub struct DisposalService {
    session: Session,
    sync: Arc<SyncService>,
    store: Arc<BaselineStore>,
    gate: Arc<RebaselineGate>,
    units: Arc<dyn UnitRepository>,
    transitions: Mutex<()>,
}

impl DisposalService {
    pub fn new(
        session: Session,
        sync: Arc<SyncService>,
        store: Arc<BaselineStore>,
        gate: Arc<RebaselineGate>,
        units: Arc<dyn UnitRepository>,
    ) -> Self {
        Self {
            session,
            sync,
            store,
            gate,
            units,
            transitions: Mutex::new(()),
        }
    }

    /// File a PENDING disposal. A photo is mandatory.
    pub fn file_disposal(&self, input: NewDisposal) -> Result<Written<DisposalRequest>> {
        let disposal = DisposalRequest::file(input, Utc::now())?;
        ensure_unit(self.units.as_ref(), &disposal.unit_id)?;

        let outcome = self.sync.write(StoreCommand::RecordDisposal {
            disposal: disposal.clone(),
        })?;
        tracing::info!(
            "Disposal {} filed for {} #{} ({}, {}) [{}]",
            disposal.id,
            disposal.unit_id,
            disposal.position,
            disposal.reason.label(),
            outcome.label(),
            self.session.tenant_id
        );
        Ok(Written {
            record: disposal,
            outcome,
        })
    }

    pub fn find_disposal(&self, id: Uuid) -> Result<DisposalRequest> {
        require(self.sync.load_disposal(id)?, || format!("disposal {}", id))
    }

    /// Approve a PENDING disposal and re-baseline its position: cleared
    /// (awaiting remount) or replaced with `replacement`.
    ///
    /// A retry after a failed record write finds its own change already in
    /// the baseline and only records the approval.
    pub fn approve_disposal(
        &self,
        id: Uuid,
        approved_by: &str,
        replacement: Option<Fingerprint>,
    ) -> Result<DisposalApproval> {
        let _transition = self.transitions.lock().unwrap_or_else(|e| e.into_inner());

        let mut disposal = self.find_disposal(id)?;
        let current = if disposal.status == DisposalStatus::Pending {
            self.store.find_for_approval(&disposal.unit_id)?
        } else {
            None
        };
        let applied = self.store.applied_by(current.as_ref(), id);

        match &applied {
            Some(done) => {
                tracing::info!(
                    "Disposal {}: baseline v{} already carries this approval; recording it",
                    id,
                    done.record.version
                );
                let replaced = done.record.frame(disposal.position).cloned();
                disposal.approve(
                    done.record.approval_ref.approved_by(),
                    replaced,
                    done.record.updated_at,
                )?;
            }
            None => disposal.approve(approved_by, replacement, Utc::now())?,
        }
        let approved_at = disposal.approved_at.unwrap_or_else(Utc::now);

        let baseline = match applied {
            Some(done) => Some(done),
            None if current.is_some() => {
                let approval_ref = ApprovalRef::Disposal {
                    disposal_id: id,
                    approved_by: approved_by.to_string(),
                };
                Some(self.gate.apply(
                    &disposal.unit_id,
                    &[disposal.rebaseline_update()],
                    approval_ref,
                    approved_at,
                )?)
            }
            None => {
                tracing::warn!(
                    "Unit {} has no baseline; disposal {} approved without re-baselining",
                    disposal.unit_id,
                    id
                );
                None
            }
        };

        let outcome = self.sync.write(StoreCommand::RecordDisposal {
            disposal: disposal.clone(),
        })?;
        let approver = disposal.approved_by.as_deref().unwrap_or(approved_by);
        tracing::info!("Disposal {} approved by {} ({})", id, approver, outcome.label());

        Ok(DisposalApproval {
            disposal: Written {
                record: disposal,
                outcome,
            },
            baseline,
        })
    }

    /// Disposals for a unit, newest first
    pub fn disposal_history(&self, unit_id: &str) -> Result<Vec<DisposalRequest>> {
        self.sync.disposal_history(unit_id)
    }
}

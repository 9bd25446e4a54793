//! Inspection Service - enrollment, audits, justification and approval
//!
//! Audits never touch the baseline. Only an approved audit changes it, and
//! only through the gate.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use tireguard_domain::model::{ApprovalRef, AuditRecord, AuditState, Baseline, TireRecord};
use tireguard_domain::service::{check_frames, compare, predict, readings_from_frames, DepthReading, WearPrediction};
use tireguard_types::{Fingerprint, Position, Result};

use super::baseline_store::BaselineStore;
use super::rebaseline_gate::RebaselineGate;
use super::sync::{require, StoreCommand, SyncService, Written};
use super::Session;

/// Outcome of approving an audit
#[derive(Debug, Clone, Serialize)]
pub struct RebaselineApproval {
    pub audit: Written<AuditRecord>,
    /// `None` when no mismatched position had a readable replacement
    pub baseline: Option<Written<Baseline>>,
}

pub struct InspectionService {
    session: Session,
    sync: Arc<SyncService>,
    store: Arc<BaselineStore>,
    gate: Arc<RebaselineGate>,
    depth_tolerance_mm: f64,
    /// Serializes audit transitions so concurrent approvals cannot both win
    transitions: Mutex<()>,
}

impl InspectionService {
    pub fn new(
        session: Session,
        sync: Arc<SyncService>,
        store: Arc<BaselineStore>,
        gate: Arc<RebaselineGate>,
        depth_tolerance_mm: f64,
    ) -> Self {
        Self {
            session,
            sync,
            store,
            gate,
            depth_tolerance_mm,
            transitions: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Enroll a unit's first baseline from captured frames
    pub fn create_baseline(&self, unit_id: &str, frames: Vec<Fingerprint>) -> Result<Written<Baseline>> {
        let written = self
            .gate
            .enroll(unit_id, frames, &self.session.operator, Utc::now())?;
        tracing::info!(
            "Enrolled {} with {} positions [{}]",
            unit_id,
            written.record.frames.len(),
            self.session.tenant_id
        );
        Ok(written)
    }

    pub fn get_baseline(&self, unit_id: &str) -> Result<Baseline> {
        self.store.get_baseline(unit_id)
    }

    pub fn tires(&self, unit_id: &str) -> Result<Vec<TireRecord>> {
        self.sync.tires(unit_id)
    }

    /// Compare a capture against the unit's baseline and record the audit.
    /// Fails with `InvalidInput` for an empty capture or a bad or repeated
    /// position, and with `NotFound` when the unit has no baseline.
    pub fn run_audit(&self, unit_id: &str, captured: Vec<Fingerprint>) -> Result<Written<AuditRecord>> {
        check_frames(&captured)?;
        let baseline = self.store.get_baseline(unit_id)?;
        let outcome = compare(&baseline, &captured, self.depth_tolerance_mm);
        let audit = AuditRecord::new(unit_id, captured, outcome, Utc::now());

        let outcome = self.sync.write(StoreCommand::RecordAudit { audit: audit.clone() })?;
        tracing::info!(
            "Audit {} for {}: {}/{} matched, {} mismatched ({})",
            audit.id,
            unit_id,
            audit.comparison.matched,
            audit.comparison.total,
            audit.comparison.mismatched,
            outcome.label()
        );
        if !audit.maintenance.is_empty() {
            tracing::info!("Audit {} raised {} maintenance signal(s)", audit.id, audit.maintenance.len());
        }

        Ok(Written {
            record: audit,
            outcome,
        })
    }

    pub fn find_audit(&self, audit_id: Uuid) -> Result<AuditRecord> {
        require(self.sync.load_audit(audit_id)?, || format!("audit {}", audit_id))
    }

    /// Operator explanation for a mismatched audit
    pub fn attach_justification(
        &self,
        audit_id: Uuid,
        photos: Vec<String>,
        text: &str,
        justified_by: &str,
    ) -> Result<Written<AuditRecord>> {
        let _transition = self.transitions.lock().unwrap_or_else(|e| e.into_inner());

        let mut audit = self.find_audit(audit_id)?;
        audit.justify(photos, text, justified_by, Utc::now())?;

        let outcome = self.sync.write(StoreCommand::RecordAudit { audit: audit.clone() })?;
        tracing::info!("Audit {} justified by {} ({})", audit_id, justified_by, outcome.label());
        Ok(Written {
            record: audit,
            outcome,
        })
    }

    /// Supervisor approval; re-baselines the mismatched positions with the
    /// captured frames. The baseline's `updated_at` is the approval time.
    ///
    /// If an earlier attempt already moved the baseline but failed to record
    /// the approval, the retry keeps that baseline and records the approval
    /// with its approver and time.
    pub fn approve_rebaseline(&self, audit_id: Uuid, approved_by: &str) -> Result<RebaselineApproval> {
        let _transition = self.transitions.lock().unwrap_or_else(|e| e.into_inner());

        let mut audit = self.find_audit(audit_id)?;
        let updates = audit.rebaseline_updates();

        let applied = if updates.is_empty() || audit.state() != AuditState::PendingApproval {
            None
        } else {
            let current = self.store.find_for_approval(&audit.unit_id)?;
            self.store.applied_by(current.as_ref(), audit_id)
        };

        let approved_at = match &applied {
            Some(done) => {
                tracing::info!(
                    "Audit {}: baseline v{} already carries this approval; recording it",
                    audit_id,
                    done.record.version
                );
                let grant = &done.record.approval_ref;
                audit.approve(grant.approved_by(), done.record.updated_at)?.approved_at
            }
            None => audit.approve(approved_by, Utc::now())?.approved_at,
        };

        let skipped = audit.mismatched_positions().len().saturating_sub(updates.len());
        if skipped > 0 {
            tracing::warn!(
                "Audit {}: {} unreadable position(s) left at their previous baseline",
                audit_id,
                skipped
            );
        }

        let baseline = match applied {
            Some(done) => Some(done),
            None if updates.is_empty() => None,
            None => {
                let approval_ref = ApprovalRef::Audit {
                    audit_id,
                    approved_by: approved_by.to_string(),
                };
                Some(self.gate.apply(&audit.unit_id, &updates, approval_ref, approved_at)?)
            }
        };

        let outcome = self.sync.write(StoreCommand::RecordAudit { audit: audit.clone() })?;
        let approver = audit.approval.as_ref().map_or(approved_by, |a| a.approved_by.as_str());
        tracing::info!("Audit {} approved by {} ({})", audit_id, approver, outcome.label());

        Ok(RebaselineApproval {
            audit: Written {
                record: audit,
                outcome,
            },
            baseline,
        })
    }

    /// Audits for a unit, newest first
    pub fn audit_history(&self, unit_id: &str) -> Result<Vec<AuditRecord>> {
        self.sync.audit_history(unit_id)
    }

    /// Forecast tread life at one position from baseline and audit frames,
    /// plus any extra readings supplied by the caller
    pub fn predict_wear(
        &self,
        unit_id: &str,
        position: Position,
        extra: &[DepthReading],
        today: NaiveDate,
    ) -> Result<Option<WearPrediction>> {
        let mut frames: Vec<Fingerprint> = Vec::new();
        if let Some(baseline) = self.store.find_baseline(unit_id)? {
            frames.extend(baseline.frame(position).cloned());
        }
        for audit in self.sync.audit_history(unit_id)? {
            frames.extend(
                audit
                    .captured_frames
                    .into_iter()
                    .filter(|f| f.position == position),
            );
        }

        let mut readings = readings_from_frames(&frames);
        readings.extend_from_slice(extra);
        tracing::debug!(
            "Wear history for {} #{}: {} reading(s)",
            unit_id,
            position,
            readings.len()
        );
        Ok(predict(&readings, today))
    }
}

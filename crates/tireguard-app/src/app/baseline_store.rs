//! Baseline Store: the trusted fingerprint set per unit

use std::sync::Arc;

use tireguard_domain::model::Baseline;
use uuid::Uuid;

use tireguard_types::{Error, Fingerprint, Result};

use super::rebaseline_gate::ApprovalGrant;
use super::sync::{require, StoreCommand, SyncService, Written};

pub struct BaselineStore {
    sync: Arc<SyncService>,
}

impl BaselineStore {
    pub fn new(sync: Arc<SyncService>) -> Self {
        Self { sync }
    }

    pub fn find_baseline(&self, unit_id: &str) -> Result<Option<Baseline>> {
        self.sync.load_baseline(unit_id)
    }

    /// Current baseline; `NotFound` if the unit was never enrolled
    pub fn get_baseline(&self, unit_id: &str) -> Result<Baseline> {
        require(self.find_baseline(unit_id)?, || {
            format!("no baseline for unit {}", unit_id)
        })
    }

    /// Baseline an approval builds on.
    ///
    /// An unreachable store with nothing cached for the unit is reported as
    /// `InvalidState`: the approval cannot proceed until the session is back
    /// online.
    pub fn find_for_approval(&self, unit_id: &str) -> Result<Option<Baseline>> {
        match self.find_baseline(unit_id) {
            Err(e) if e.is_transient() => {
                tracing::warn!("Cannot approve for {} offline: {}", unit_id, e);
                Err(Error::InvalidState(format!(
                    "baseline for unit {} is neither reachable nor cached; retry the approval once online",
                    unit_id
                )))
            }
            other => other,
        }
    }

    /// The current baseline if it was written by approving `record_id`.
    ///
    /// Lets an approval whose record write failed be retried without applying
    /// the same change twice.
    pub fn applied_by(&self, current: Option<&Baseline>, record_id: Uuid) -> Option<Written<Baseline>> {
        let baseline = current.filter(|b| b.approval_ref.record_id() == Some(record_id))?;
        let outcome = self.sync.pending_outcome(|c| {
            matches!(c, StoreCommand::ApplyBaseline { baseline: queued }
                if queued.unit_id == baseline.unit_id && queued.version == baseline.version)
        });
        Some(Written {
            record: baseline.clone(),
            outcome,
        })
    }

    /// Replace the unit's frame set. Only the gate can produce the grant.
    ///
    /// The new baseline carries the grant's approval reference and
    /// timestamp; the `tires` cache is refreshed by the same write.
    pub fn set_baseline(
        &self,
        unit_id: &str,
        frames: Vec<Fingerprint>,
        grant: ApprovalGrant,
    ) -> Result<Written<Baseline>> {
        let current = self.find_baseline(unit_id)?;
        let (approval_ref, approved_at) = grant.into_parts();

        let mut baseline = Baseline::enrolled(unit_id, frames, approval_ref, approved_at);
        if let Some(current) = current {
            baseline.version = current.version + 1;
        }

        let outcome = self.sync.write(StoreCommand::ApplyBaseline {
            baseline: baseline.clone(),
        })?;
        tracing::info!(
            "Baseline for {} now at v{} ({}, {})",
            unit_id,
            baseline.version,
            baseline.approval_ref.describe(),
            outcome.label()
        );

        Ok(Written {
            record: baseline,
            outcome,
        })
    }
}

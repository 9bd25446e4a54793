//! Re-baselining Gate
//!
//! The only path to a baseline write. Each write holds the locks of the
//! positions it touches (taken in sorted order) and the unit's row lock for
//! the read-modify-write.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use tireguard_domain::model::{ApprovalRef, Baseline, FrameUpdate};
use tireguard_domain::repository::UnitRepository;
use tireguard_domain::service::check_frames;
use tireguard_types::{Error, Fingerprint, Position, Result};

use super::baseline_store::BaselineStore;
use super::sync::Written;

/// Proof that a baseline write was authorized by an approval.
/// Constructed only inside the gate.
#[derive(Debug)]
pub struct ApprovalGrant {
    approval_ref: ApprovalRef,
    approved_at: DateTime<Utc>,
}

impl ApprovalGrant {
    fn new(approval_ref: ApprovalRef, approved_at: DateTime<Utc>) -> Result<Self> {
        approval_ref.validate()?;
        Ok(Self {
            approval_ref,
            approved_at,
        })
    }

    pub fn approval_ref(&self) -> &ApprovalRef {
        &self.approval_ref
    }

    pub fn approved_at(&self) -> DateTime<Utc> {
        self.approved_at
    }

    pub(crate) fn into_parts(self) -> (ApprovalRef, DateTime<Utc>) {
        (self.approval_ref, self.approved_at)
    }
}

type LockTable<K> = Mutex<HashMap<K, Arc<Mutex<()>>>>;

pub struct RebaselineGate {
    store: Arc<BaselineStore>,
    units: Arc<dyn UnitRepository>,
    position_locks: LockTable<(String, Position)>,
    unit_locks: LockTable<String>,
}

fn lock_of<K: std::hash::Hash + Eq + Clone>(table: &LockTable<K>, key: &K) -> Arc<Mutex<()>> {
    let mut table = table.lock().unwrap_or_else(|e| e.into_inner());
    table.entry(key.clone()).or_default().clone()
}

fn hold(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}

impl RebaselineGate {
    pub fn new(store: Arc<BaselineStore>, units: Arc<dyn UnitRepository>) -> Self {
        Self {
            store,
            units,
            position_locks: Mutex::new(HashMap::new()),
            unit_locks: Mutex::new(HashMap::new()),
        }
    }

    fn position_locks(&self, unit_id: &str, positions: impl IntoIterator<Item = Position>) -> Vec<Arc<Mutex<()>>> {
        let sorted: BTreeSet<Position> = positions.into_iter().collect();
        sorted
            .into_iter()
            .map(|p| lock_of(&self.position_locks, &(unit_id.to_string(), p)))
            .collect()
    }

    /// First baseline for a unit
    pub fn enroll(
        &self,
        unit_id: &str,
        frames: Vec<Fingerprint>,
        enrolled_by: &str,
        at: DateTime<Utc>,
    ) -> Result<Written<Baseline>> {
        check_frames(&frames)?;
        ensure_unit(self.units.as_ref(), unit_id)?;

        let unreadable: Vec<Position> = frames
            .iter()
            .filter(|f| !f.has_identity())
            .map(|f| f.position)
            .collect();
        if !unreadable.is_empty() {
            return Err(Error::ExtractionFailure(format!(
                "cannot enroll {}: no brand/model read for positions {:?}",
                unit_id, unreadable
            )));
        }

        let locks = self.position_locks(unit_id, frames.iter().map(|f| f.position));
        let _positions: Vec<MutexGuard<'_, ()>> = locks.iter().map(|l| hold(l)).collect();
        let row = lock_of(&self.unit_locks, &unit_id.to_string());
        let _row = hold(&row);

        if let Some(existing) = self.store.find_baseline(unit_id)? {
            return Err(Error::Conflict(format!(
                "unit {} already has a baseline (v{})",
                unit_id, existing.version
            )));
        }

        let grant = ApprovalGrant::new(
            ApprovalRef::Enrollment {
                enrolled_by: enrolled_by.to_string(),
            },
            at,
        )?;
        self.store.set_baseline(unit_id, frames, grant)
    }

    /// Apply approved changes to an existing baseline.
    ///
    /// `at` must be the approval's timestamp; it becomes the baseline's
    /// `updated_at`.
    pub fn apply(
        &self,
        unit_id: &str,
        updates: &[FrameUpdate],
        approval_ref: ApprovalRef,
        at: DateTime<Utc>,
    ) -> Result<Written<Baseline>> {
        if updates.is_empty() {
            return Err(Error::InvalidInput("no baseline changes to apply".to_string()));
        }
        for update in updates {
            match update {
                FrameUpdate::Replace(frame) if !frame.has_identity() => {
                    return Err(Error::InvalidInput(format!(
                        "replacement for position {} has no brand/model",
                        frame.position
                    )))
                }
                _ if update.position() == 0 => {
                    return Err(Error::InvalidInput("positions start at 1".to_string()))
                }
                _ => {}
            }
        }
        let grant = ApprovalGrant::new(approval_ref, at)?;

        let locks = self.position_locks(unit_id, updates.iter().map(FrameUpdate::position));
        let _positions: Vec<MutexGuard<'_, ()>> = locks.iter().map(|l| hold(l)).collect();
        let row = lock_of(&self.unit_locks, &unit_id.to_string());
        let _row = hold(&row);

        let current = self.store.get_baseline(unit_id)?;
        let next = current.apply(updates, grant.approval_ref().clone(), at);
        self.store.set_baseline(unit_id, next.frames, grant)
    }
}

/// The unit must be registered and active. An unreachable registry is not
/// fatal: offline work proceeds and the store write is queued.
pub(crate) fn ensure_unit(units: &dyn UnitRepository, unit_id: &str) -> Result<()> {
    match units.find_by_id(unit_id) {
        Ok(Some(unit)) if unit.active => Ok(()),
        Ok(Some(_)) => Err(Error::InvalidState(format!("unit {} is inactive", unit_id))),
        Ok(None) => Err(Error::NotFound(format!("unit {}", unit_id))),
        Err(e) if e.is_transient() => {
            tracing::warn!("Unit registry unreachable; cannot verify {}", unit_id);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

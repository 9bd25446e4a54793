//! Repository trait definitions for the backing store
//!
//! Implementations report an unreachable store as `Error::TransientIo` so the
//! caller can divert the write to the outbox.

use uuid::Uuid;

use crate::model::{AuditRecord, Baseline, DisposalRequest, TireRecord, Unit};
use tireguard_types::Error;

/// Fleet units registered by onboarding (read-only)
pub trait UnitRepository: Send + Sync {
    fn find_by_id(&self, id: &str) -> Result<Option<Unit>, Error>;

    fn find_all(&self) -> Result<Vec<Unit>, Error>;
}

/// `baselines` table: one row per unit
pub trait BaselineRepository: Send + Sync {
    fn find_by_unit(&self, unit_id: &str) -> Result<Option<Baseline>, Error>;

    /// Replace the unit's row
    fn save(&self, baseline: &Baseline) -> Result<(), Error>;
}

/// `audits` table
pub trait AuditRepository: Send + Sync {
    /// Insert or replace by id
    fn save(&self, audit: &AuditRecord) -> Result<(), Error>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>, Error>;

    /// All audits for a unit, newest first
    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<AuditRecord>, Error>;
}

/// `tire_disposals` table
pub trait DisposalRepository: Send + Sync {
    /// Insert or replace by id
    fn save(&self, disposal: &DisposalRequest) -> Result<(), Error>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<DisposalRequest>, Error>;

    /// All disposals for a unit, newest first
    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<DisposalRequest>, Error>;
}

/// `tires` read cache
pub trait TireRepository: Send + Sync {
    /// Insert or replace each record by id
    fn upsert(&self, records: &[TireRecord]) -> Result<(), Error>;

    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<TireRecord>, Error>;
}

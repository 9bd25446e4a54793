//! In-memory backing store
//!
//! Implements every repository trait over shared maps. Reachability can be
//! toggled to simulate a connectivity loss: while unreachable every call
//! fails with `Error::TransientIo`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use uuid::Uuid;

use tireguard_domain::model::{AuditRecord, Baseline, DisposalRequest, TireRecord, Unit};
use tireguard_domain::repository::{
    AuditRepository, BaselineRepository, DisposalRepository, TireRepository, UnitRepository,
};
use tireguard_types::{Error, Result};

#[derive(Default)]
struct Tables {
    units: HashMap<String, Unit>,
    baselines: HashMap<String, Baseline>,
    audits: HashMap<Uuid, AuditRecord>,
    disposals: HashMap<Uuid, DisposalRequest>,
    tires: HashMap<String, TireRecord>,
}

pub struct MemoryBackend {
    tables: Mutex<Tables>,
    reachable: AtomicBool,
    writes: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            reachable: AtomicBool::new(true),
            writes: AtomicUsize::new(0),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_units(units: impl IntoIterator<Item = Unit>) -> Self {
        let backend = Self::default();
        {
            let mut tables = backend.tables();
            for unit in units {
                tables.units.insert(unit.id.clone(), unit);
            }
        }
        backend
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Successful writes since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> Result<std::sync::MutexGuard<'_, Tables>> {
        if !self.is_reachable() {
            return Err(Error::transient("backing store unreachable"));
        }
        Ok(self.tables())
    }

    fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> Result<R> {
        let mut tables = self.check()?;
        let result = f(&mut tables);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(result)
    }
}

impl UnitRepository for MemoryBackend {
    fn find_by_id(&self, id: &str) -> Result<Option<Unit>> {
        Ok(self.check()?.units.get(id).cloned())
    }

    fn find_all(&self) -> Result<Vec<Unit>> {
        let mut units: Vec<Unit> = self.check()?.units.values().cloned().collect();
        units.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(units)
    }
}

impl BaselineRepository for MemoryBackend {
    fn find_by_unit(&self, unit_id: &str) -> Result<Option<Baseline>> {
        Ok(self.check()?.baselines.get(unit_id).cloned())
    }

    fn save(&self, baseline: &Baseline) -> Result<()> {
        self.write(|t| {
            t.baselines.insert(baseline.unit_id.clone(), baseline.clone());
        })
    }
}

impl AuditRepository for MemoryBackend {
    fn save(&self, audit: &AuditRecord) -> Result<()> {
        self.write(|t| {
            t.audits.insert(audit.id, audit.clone());
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>> {
        Ok(self.check()?.audits.get(&id).cloned())
    }

    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<AuditRecord>> {
        let mut audits: Vec<AuditRecord> = self
            .check()?
            .audits
            .values()
            .filter(|a| a.unit_id == unit_id)
            .cloned()
            .collect();
        audits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(audits)
    }
}

impl DisposalRepository for MemoryBackend {
    fn save(&self, disposal: &DisposalRequest) -> Result<()> {
        self.write(|t| {
            t.disposals.insert(disposal.id, disposal.clone());
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<DisposalRequest>> {
        Ok(self.check()?.disposals.get(&id).cloned())
    }

    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<DisposalRequest>> {
        let mut disposals: Vec<DisposalRequest> = self
            .check()?
            .disposals
            .values()
            .filter(|d| d.unit_id == unit_id)
            .cloned()
            .collect();
        disposals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(disposals)
    }
}

impl TireRepository for MemoryBackend {
    fn upsert(&self, records: &[TireRecord]) -> Result<()> {
        self.write(|t| {
            for record in records {
                t.tires.insert(record.id.clone(), record.clone());
            }
        })
    }

    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<TireRecord>> {
        let mut tires: Vec<TireRecord> = self
            .check()?
            .tires
            .values()
            .filter(|t| t.unit_id == unit_id)
            .cloned()
            .collect();
        tires.sort_by_key(|t| t.position);
        Ok(tires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str) -> Unit {
        Unit {
            id: id.to_string(),
            plate_id: format!("PLATE-{}", id),
            pipe_number: None,
            active: true,
        }
    }

    #[test]
    fn test_unreachable_fails_transiently() {
        let backend = MemoryBackend::with_units([unit("U1")]);
        assert!(UnitRepository::find_by_id(&backend, "U1").unwrap().is_some());

        backend.set_reachable(false);
        let err = UnitRepository::find_by_id(&backend, "U1").unwrap_err();
        assert!(err.is_transient());
        assert!(TireRepository::upsert(&backend, &[]).unwrap_err().is_transient());
        assert_eq!(backend.write_count(), 0);

        backend.set_reachable(true);
        TireRepository::upsert(&backend, &[]).unwrap();
        assert_eq!(backend.write_count(), 1);
    }
}

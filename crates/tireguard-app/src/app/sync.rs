//! Backing-store writes with offline queueing
//!
//! Every write goes through [`SyncService::write`]. When the store is
//! unreachable, or earlier writes are still queued, the write is appended to
//! the outbox instead and replayed in order by [`SyncService::drain`].
//! Reads consult queued writes first so an offline session sees its own
//! changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tireguard_domain::model::{AuditRecord, Baseline, DisposalRequest, TireRecord, TireStatus};
use tireguard_store::{Outbox, OutboxCommand, OutboxEntry};
use tireguard_types::{Error, Result};

use crate::repository::Backend;

/// A typed write against the backing store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "snake_case")]
pub enum StoreCommand {
    /// Replace the unit's baseline row and refresh its tire cache rows
    ApplyBaseline { baseline: Baseline },
    RecordAudit { audit: AuditRecord },
    RecordDisposal { disposal: DisposalRequest },
}

impl OutboxCommand for StoreCommand {
    fn operation(&self) -> &'static str {
        match self {
            StoreCommand::ApplyBaseline { .. } => "apply_baseline",
            StoreCommand::RecordAudit { .. } => "record_audit",
            StoreCommand::RecordDisposal { .. } => "record_disposal",
        }
    }

    fn idempotency_key(&self) -> String {
        match self {
            StoreCommand::ApplyBaseline { baseline } => {
                format!("baseline:{}:v{}", baseline.unit_id, baseline.version)
            }
            StoreCommand::RecordAudit { audit } => format!("audit:{}@{}", audit.id, audit.revision),
            StoreCommand::RecordDisposal { disposal } => {
                format!("disposal:{}@{}", disposal.id, disposal.revision)
            }
        }
    }
}

/// Where a write ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "entry_id", rename_all = "snake_case")]
pub enum WriteOutcome {
    /// Confirmed by the backing store
    Synced,
    /// Stored locally in the outbox
    Queued(Uuid),
}

impl WriteOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            WriteOutcome::Synced => "synced",
            WriteOutcome::Queued(_) => "queued (offline)",
        }
    }
}

/// A record together with how it was persisted
#[derive(Debug, Clone, Serialize)]
pub struct Written<T> {
    pub record: T,
    pub outcome: WriteOutcome,
}

/// Result of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Entries written to the store
    pub replayed: usize,
    /// Entries the store already held at the same or a newer revision
    pub skipped: usize,
    /// Entries still queued after the pass
    pub remaining: usize,
    /// Error that halted the pass
    pub error: Option<String>,
    /// Another drain was already running; nothing was done
    pub busy: bool,
}

enum Applied {
    Written,
    AlreadyCurrent,
}

/// Last rows seen from the store, served when it is unreachable
#[derive(Default)]
struct KnownRows {
    baselines: HashMap<String, Baseline>,
    audits: HashMap<Uuid, AuditRecord>,
    disposals: HashMap<Uuid, DisposalRequest>,
}

pub struct SyncService {
    backend: Backend,
    outbox: Outbox<StoreCommand>,
    online: AtomicBool,
    draining: AtomicBool,
    known: Mutex<KnownRows>,
}

/// Clears the single-flight flag when a drain pass ends
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncService {
    pub fn new(backend: Backend, outbox: Outbox<StoreCommand>) -> Self {
        Self {
            backend,
            outbox,
            online: AtomicBool::new(true),
            draining: AtomicBool::new(false),
            known: Mutex::new(KnownRows::default()),
        }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> Vec<OutboxEntry<StoreCommand>> {
        self.outbox.pending()
    }

    pub fn pending_count(&self) -> usize {
        self.outbox.len()
    }

    /// `Queued` with the entry id if a matching write is still in the outbox
    pub fn pending_outcome<F>(&self, pred: F) -> WriteOutcome
    where
        F: Fn(&StoreCommand) -> bool,
    {
        self.outbox
            .pending()
            .into_iter()
            .rev()
            .find(|e| pred(&e.command))
            .map_or(WriteOutcome::Synced, |e| WriteOutcome::Queued(e.id))
    }

    /// Persist a command, queueing it when the store cannot take it now
    pub fn write(&self, command: StoreCommand) -> Result<WriteOutcome> {
        if !self.outbox.is_empty() || !self.is_online() {
            return self.enqueue(command);
        }

        match self.apply(&command) {
            Ok(_) => {
                self.remember(&command);
                Ok(WriteOutcome::Synced)
            }
            Err(e) if e.is_transient() => {
                tracing::warn!("Backing store unreachable ({}); queueing {}", e, command.operation());
                self.online.store(false, Ordering::SeqCst);
                self.enqueue(command)
            }
            Err(e) => Err(e),
        }
    }

    fn enqueue(&self, command: StoreCommand) -> Result<WriteOutcome> {
        let operation = command.operation();
        let id = self.outbox.enqueue(command)?;
        tracing::info!("Queued {} as {} ({} pending)", operation, id, self.outbox.len());
        Ok(WriteOutcome::Queued(id))
    }

    /// Environment signal. Going online triggers a drain.
    pub fn connectivity_changed(&self, online: bool) -> Result<Option<DrainReport>> {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        tracing::debug!("Connectivity changed: online={} (was {})", online, was_online);
        if online && !was_online {
            return self.drain().map(Some);
        }
        Ok(None)
    }

    /// Replay queued writes in enqueue order.
    ///
    /// Only one pass runs at a time; a concurrent call returns immediately
    /// with `busy` set. The pass stops at the first failure and leaves that
    /// entry at the head of the queue.
    pub fn drain(&self) -> Result<DrainReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Drain already in progress");
            return Ok(DrainReport {
                busy: true,
                remaining: self.outbox.len(),
                ..Default::default()
            });
        }
        let _guard = DrainGuard(&self.draining);

        let mut report = DrainReport::default();
        while let Some(entry) = self.outbox.front() {
            match self.apply(&entry.command) {
                Ok(applied) => {
                    self.outbox.complete(entry.id)?;
                    self.remember(&entry.command);
                    match applied {
                        Applied::Written => report.replayed += 1,
                        Applied::AlreadyCurrent => report.skipped += 1,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Replay of {} ({}) failed: {}",
                        entry.command.operation(),
                        entry.idempotency_key,
                        e
                    );
                    self.outbox.record_failure(entry.id, &e.to_string())?;
                    if e.is_transient() {
                        self.online.store(false, Ordering::SeqCst);
                    }
                    report.error = Some(e.to_string());
                    break;
                }
            }
        }

        if report.error.is_none() {
            self.online.store(true, Ordering::SeqCst);
        }
        report.remaining = self.outbox.len();
        tracing::info!(
            "Drain finished: {} replayed, {} already current, {} remaining",
            report.replayed,
            report.skipped,
            report.remaining
        );
        Ok(report)
    }

    fn apply(&self, command: &StoreCommand) -> Result<Applied> {
        match command {
            StoreCommand::ApplyBaseline { baseline } => {
                let current = self.backend.baselines.find_by_unit(&baseline.unit_id)?;
                let applied = match current {
                    Some(cur) if cur.version > baseline.version => return Ok(Applied::AlreadyCurrent),
                    Some(cur) if cur.version == baseline.version => Applied::AlreadyCurrent,
                    _ => {
                        self.backend.baselines.save(baseline)?;
                        Applied::Written
                    }
                };
                self.refresh_tires(baseline)?;
                Ok(applied)
            }
            StoreCommand::RecordAudit { audit } => {
                if let Some(existing) = self.backend.audits.find_by_id(audit.id)? {
                    if existing.revision >= audit.revision {
                        return Ok(Applied::AlreadyCurrent);
                    }
                }
                self.backend.audits.save(audit)?;
                Ok(Applied::Written)
            }
            StoreCommand::RecordDisposal { disposal } => {
                if let Some(existing) = self.backend.disposals.find_by_id(disposal.id)? {
                    if existing.revision >= disposal.revision {
                        return Ok(Applied::AlreadyCurrent);
                    }
                }
                self.backend.disposals.save(disposal)?;
                Ok(Applied::Written)
            }
        }
    }

    /// Rewrite the unit's `tires` rows from a baseline. Mounted rows whose
    /// position left the baseline become pending remounts.
    fn refresh_tires(&self, baseline: &Baseline) -> Result<()> {
        let at = baseline.updated_at;
        let mut records: Vec<TireRecord> = baseline
            .frames
            .iter()
            .map(|frame| TireRecord::mounted(&baseline.unit_id, frame, at))
            .collect();

        for existing in self.backend.tires.find_by_unit(&baseline.unit_id)? {
            if existing.status == TireStatus::Mounted && baseline.frame(existing.position).is_none() {
                records.push(TireRecord::pending_remount(&baseline.unit_id, existing.position, at));
            }
        }
        self.backend.tires.upsert(&records)
    }

    fn known(&self) -> std::sync::MutexGuard<'_, KnownRows> {
        self.known.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remember(&self, command: &StoreCommand) {
        let mut known = self.known();
        match command {
            StoreCommand::ApplyBaseline { baseline } => {
                let newer = known
                    .baselines
                    .get(&baseline.unit_id)
                    .is_some_and(|b| b.version > baseline.version);
                if !newer {
                    known.baselines.insert(baseline.unit_id.clone(), baseline.clone());
                }
            }
            StoreCommand::RecordAudit { audit } => {
                known.audits.insert(audit.id, audit.clone());
            }
            StoreCommand::RecordDisposal { disposal } => {
                known.disposals.insert(disposal.id, disposal.clone());
            }
        }
    }

    /// Current baseline for a unit: queued write, then store, then the last
    /// row seen if the store is unreachable
    pub fn load_baseline(&self, unit_id: &str) -> Result<Option<Baseline>> {
        let pending = self.outbox.find_latest(|c| {
            matches!(c, StoreCommand::ApplyBaseline { baseline } if baseline.unit_id == unit_id)
        });
        if let Some(StoreCommand::ApplyBaseline { baseline }) = pending {
            return Ok(Some(baseline));
        }

        match self.backend.baselines.find_by_unit(unit_id) {
            Ok(found) => {
                if let Some(baseline) = &found {
                    self.known()
                        .baselines
                        .insert(unit_id.to_string(), baseline.clone());
                }
                Ok(found)
            }
            Err(e) if e.is_transient() => match self.known().baselines.get(unit_id) {
                Some(baseline) => {
                    tracing::warn!("Store unreachable; using last known baseline for {}", unit_id);
                    Ok(Some(baseline.clone()))
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    pub fn load_audit(&self, id: Uuid) -> Result<Option<AuditRecord>> {
        let pending = self
            .outbox
            .find_latest(|c| matches!(c, StoreCommand::RecordAudit { audit } if audit.id == id));
        if let Some(StoreCommand::RecordAudit { audit }) = pending {
            return Ok(Some(audit));
        }

        match self.backend.audits.find_by_id(id) {
            Ok(found) => {
                if let Some(audit) = &found {
                    self.known().audits.insert(id, audit.clone());
                }
                Ok(found)
            }
            Err(e) if e.is_transient() => self.known().audits.get(&id).cloned().map(Some).ok_or(e),
            Err(e) => Err(e),
        }
    }

    pub fn load_disposal(&self, id: Uuid) -> Result<Option<DisposalRequest>> {
        let pending = self.outbox.find_latest(
            |c| matches!(c, StoreCommand::RecordDisposal { disposal } if disposal.id == id),
        );
        if let Some(StoreCommand::RecordDisposal { disposal }) = pending {
            return Ok(Some(disposal));
        }

        match self.backend.disposals.find_by_id(id) {
            Ok(found) => {
                if let Some(disposal) = &found {
                    self.known().disposals.insert(id, disposal.clone());
                }
                Ok(found)
            }
            Err(e) if e.is_transient() => self
                .known()
                .disposals
                .get(&id)
                .cloned()
                .map(Some)
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    /// Audits for a unit, newest first, with queued changes applied
    pub fn audit_history(&self, unit_id: &str) -> Result<Vec<AuditRecord>> {
        let stored = match self.backend.audits.find_by_unit(unit_id) {
            Ok(rows) => rows,
            Err(e) if e.is_transient() => {
                tracing::warn!("Store unreachable; audit history limited to local records");
                self.known()
                    .audits
                    .values()
                    .filter(|a| a.unit_id == unit_id)
                    .cloned()
                    .collect()
            }
            Err(e) => return Err(e),
        };

        let mut by_id: HashMap<Uuid, AuditRecord> = stored.into_iter().map(|a| (a.id, a)).collect();
        for entry in self.outbox.pending() {
            if let StoreCommand::RecordAudit { audit } = entry.command {
                if audit.unit_id == unit_id {
                    by_id.insert(audit.id, audit);
                }
            }
        }

        let mut audits: Vec<AuditRecord> = by_id.into_values().collect();
        audits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(audits)
    }

    /// Disposals for a unit, newest first, with queued changes applied
    pub fn disposal_history(&self, unit_id: &str) -> Result<Vec<DisposalRequest>> {
        let stored = match self.backend.disposals.find_by_unit(unit_id) {
            Ok(rows) => rows,
            Err(e) if e.is_transient() => {
                tracing::warn!("Store unreachable; disposal history limited to local records");
                self.known()
                    .disposals
                    .values()
                    .filter(|d| d.unit_id == unit_id)
                    .cloned()
                    .collect()
            }
            Err(e) => return Err(e),
        };

        let mut by_id: HashMap<Uuid, DisposalRequest> =
            stored.into_iter().map(|d| (d.id, d)).collect();
        for entry in self.outbox.pending() {
            if let StoreCommand::RecordDisposal { disposal } = entry.command {
                if disposal.unit_id == unit_id {
                    by_id.insert(disposal.id, disposal);
                }
            }
        }

        let mut disposals: Vec<DisposalRequest> = by_id.into_values().collect();
        disposals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(disposals)
    }

    pub fn tires(&self, unit_id: &str) -> Result<Vec<TireRecord>> {
        self.backend.tires.find_by_unit(unit_id)
    }
}

/// Surface a missing record as `NotFound`
pub(crate) fn require<T>(found: Option<T>, what: impl FnOnce() -> String) -> Result<T> {
    found.ok_or_else(|| Error::NotFound(what()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tireguard_domain::model::{ApprovalRef, ComparisonOutcome};
    use tireguard_domain::repository::{AuditRepository, BaselineRepository, TireRepository};
    use tireguard_infra::MemoryBackend;
    use tireguard_types::Fingerprint;

    fn setup() -> (Arc<MemoryBackend>, SyncService, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let memory = Arc::new(MemoryBackend::new());
        let outbox = Outbox::open(dir.path().to_path_buf()).unwrap();
        let sync = SyncService::new(Backend::memory(memory.clone()), outbox);
        (memory, sync, dir)
    }

    fn audit() -> AuditRecord {
        AuditRecord::new("U1", Vec::new(), ComparisonOutcome::default(), Utc::now())
    }

    fn baseline(version: u64) -> Baseline {
        let mut b = Baseline::enrolled(
            "U1",
            vec![Fingerprint::unknown(1, "1.jpg", Utc::now())],
            ApprovalRef::Enrollment {
                enrolled_by: "op".to_string(),
            },
            Utc::now(),
        );
        b.version = version;
        b
    }

    #[test]
    fn test_command_wire_format() {
        let json = serde_json::to_value(StoreCommand::RecordAudit { audit: audit() }).unwrap();
        assert_eq!(json["operation"], "record_audit");
        assert!(json["payload"]["audit"]["id"].is_string());
    }

    #[test]
    fn test_online_write_is_synced() {
        let (memory, sync, _dir) = setup();
        let record = audit();
        let outcome = sync.write(StoreCommand::RecordAudit { audit: record.clone() }).unwrap();
        assert_eq!(outcome, WriteOutcome::Synced);
        assert!(AuditRepository::find_by_id(&*memory, record.id).unwrap().is_some());
    }

    #[test]
    fn test_transient_failure_queues_and_drain_replays() {
        let (memory, sync, _dir) = setup();
        memory.set_reachable(false);

        let record = audit();
        let outcome = sync.write(StoreCommand::RecordAudit { audit: record.clone() }).unwrap();
        assert!(outcome.is_queued());
        assert!(!sync.is_online());
        assert_eq!(sync.load_audit(record.id).unwrap().unwrap().id, record.id);

        memory.set_reachable(true);
        let report = sync.connectivity_changed(true).unwrap().unwrap();
        assert_eq!(report.replayed, 1);
        assert_eq!(report.remaining, 0);
        assert!(AuditRepository::find_by_id(&*memory, record.id).unwrap().is_some());
    }

    #[test]
    fn test_writes_queue_behind_pending_entries() {
        let (memory, sync, _dir) = setup();
        memory.set_reachable(false);
        sync.write(StoreCommand::RecordAudit { audit: audit() }).unwrap();

        // store is back but the outbox still holds an older write
        memory.set_reachable(true);
        sync.online.store(true, Ordering::SeqCst);
        let outcome = sync.write(StoreCommand::RecordAudit { audit: audit() }).unwrap();
        assert!(outcome.is_queued());
        assert_eq!(sync.pending_count(), 2);
        assert_eq!(memory.write_count(), 0);
    }

    #[test]
    fn test_pending_outcome_names_the_queued_entry() {
        let (memory, sync, _dir) = setup();
        let is_v2 = |c: &StoreCommand| {
            matches!(c, StoreCommand::ApplyBaseline { baseline } if baseline.version == 2)
        };
        assert_eq!(sync.pending_outcome(is_v2), WriteOutcome::Synced);

        memory.set_reachable(false);
        let queued = sync.write(StoreCommand::ApplyBaseline { baseline: baseline(2) }).unwrap();
        assert_eq!(sync.pending_outcome(is_v2), queued);
    }

    #[test]
    fn test_failed_replay_stays_at_head() {
        let (memory, sync, _dir) = setup();
        memory.set_reachable(false);
        sync.write(StoreCommand::RecordAudit { audit: audit() }).unwrap();

        let report = sync.drain().unwrap();
        assert_eq!(report.remaining, 1);
        assert!(report.error.is_some());
        let head = &sync.pending()[0];
        assert_eq!(head.attempts, 1);
        assert!(head.last_error.is_some());
    }

    #[test]
    fn test_stale_baseline_replay_is_skipped() {
        let (memory, sync, _dir) = setup();
        BaselineRepository::save(&*memory, &baseline(3)).unwrap();

        memory.set_reachable(false);
        sync.write(StoreCommand::ApplyBaseline { baseline: baseline(2) }).unwrap();
        memory.set_reachable(true);

        let report = sync.drain().unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(
            BaselineRepository::find_by_unit(&*memory, "U1").unwrap().unwrap().version,
            3
        );
    }

    #[test]
    fn test_baseline_write_refreshes_tire_cache() {
        let (memory, sync, _dir) = setup();
        let mut two = baseline(1);
        two.frames.push(Fingerprint::unknown(2, "2.jpg", Utc::now()));
        sync.write(StoreCommand::ApplyBaseline { baseline: two }).unwrap();

        sync.write(StoreCommand::ApplyBaseline { baseline: baseline(2) }).unwrap();

        let tires = TireRepository::find_by_unit(&*memory, "U1").unwrap();
        assert_eq!(tires.len(), 2);
        assert_eq!(tires[0].status, TireStatus::Mounted);
        assert_eq!(tires[1].status, TireStatus::PendingRemount);
    }

    #[test]
    fn test_last_known_baseline_served_offline() {
        let (memory, sync, _dir) = setup();
        sync.write(StoreCommand::ApplyBaseline { baseline: baseline(1) }).unwrap();
        memory.set_reachable(false);
        assert_eq!(sync.load_baseline("U1").unwrap().unwrap().version, 1);
        assert!(sync.load_baseline("U9").unwrap_err().is_transient());
    }
}

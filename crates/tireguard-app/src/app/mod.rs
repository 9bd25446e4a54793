//! Use cases

mod baseline_store;
mod capture;
mod disposal_service;
mod inspection_service;
mod rebaseline_gate;
mod sync;

use std::sync::Arc;

pub use baseline_store::BaselineStore;
pub use capture::{capture_fingerprints, ProgressCallback};
pub use disposal_service::{DisposalApproval, DisposalService};
pub use inspection_service::{InspectionService, RebaselineApproval};
pub use rebaseline_gate::{ApprovalGrant, RebaselineGate};
pub use sync::{DrainReport, StoreCommand, SyncService, WriteOutcome, Written};

use tireguard_store::Outbox;
use tireguard_types::Result;

use crate::config::Config;
use crate::repository::{open_file_backend, Backend};

/// Who is acting, and for which tenant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub tenant_id: String,
    pub operator: String,
}

impl Session {
    pub fn new(tenant_id: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            operator: operator.into(),
        }
    }
}

/// All services sharing one backend and outbox
pub struct Services {
    pub inspection: InspectionService,
    pub disposal: DisposalService,
    pub sync: Arc<SyncService>,
}

impl Services {
    pub fn new(
        session: Session,
        backend: Backend,
        outbox: Outbox<StoreCommand>,
        depth_tolerance_mm: f64,
    ) -> Self {
        let sync = Arc::new(SyncService::new(backend.clone(), outbox));
        let store = Arc::new(BaselineStore::new(sync.clone()));
        let gate = Arc::new(RebaselineGate::new(store.clone(), backend.units.clone()));

        Self {
            inspection: InspectionService::new(
                session.clone(),
                sync.clone(),
                store.clone(),
                gate.clone(),
                depth_tolerance_mm,
            ),
            disposal: DisposalService::new(session, sync.clone(), store, gate, backend.units),
            sync,
        }
    }

    /// Wire services over the file-backed store and outbox named by `config`
    pub fn open(config: &Config) -> Result<Self> {
        let backend = open_file_backend(config)?;
        let outbox = Outbox::open(config.outbox_dir()?)?;
        Ok(Self::new(
            config.session(),
            backend,
            outbox,
            config.depth_tolerance_mm,
        ))
    }
}

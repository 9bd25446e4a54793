//! Repository wiring for the backing store

use std::fs;
use std::sync::Arc;

use tireguard_domain::repository::{
    AuditRepository, BaselineRepository, DisposalRepository, TireRepository, UnitRepository,
};
use tireguard_infra::persistence::{
    FileAuditRepository, FileBaselineRepository, FileDisposalRepository, FileTireRepository,
    FileUnitRepository,
};
use tireguard_infra::MemoryBackend;
use tireguard_types::Result;

use crate::config::Config;

/// The backing store as a set of injected repositories
#[derive(Clone)]
pub struct Backend {
    pub units: Arc<dyn UnitRepository>,
    pub baselines: Arc<dyn BaselineRepository>,
    pub audits: Arc<dyn AuditRepository>,
    pub disposals: Arc<dyn DisposalRepository>,
    pub tires: Arc<dyn TireRepository>,
}

impl Backend {
    /// Every table served by one in-memory backend
    pub fn memory(backend: Arc<MemoryBackend>) -> Self {
        Self {
            units: backend.clone(),
            baselines: backend.clone(),
            audits: backend.clone(),
            disposals: backend.clone(),
            tires: backend,
        }
    }
}

/// Open the file-backed store for the configured tenant
pub fn open_file_backend(config: &Config) -> Result<Backend> {
    let store_dir = config.store_dir()?;
    fs::create_dir_all(&store_dir)?;
    tracing::debug!("Backing store at {}", store_dir.display());

    let units = FileUnitRepository::open(&config.units_file()?)?;

    Ok(Backend {
        units: Arc::new(units),
        baselines: Arc::new(FileBaselineRepository::new(store_dir.clone())),
        audits: Arc::new(FileAuditRepository::new(store_dir.clone())),
        disposals: Arc::new(FileDisposalRepository::new(store_dir.clone())),
        tires: Arc::new(FileTireRepository::new(store_dir)),
    })
}

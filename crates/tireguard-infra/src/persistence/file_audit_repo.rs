//! File-based audit repository

use std::path::PathBuf;

use uuid::Uuid;

use tireguard_domain::model::AuditRecord;
use tireguard_domain::repository::AuditRepository;
use tireguard_types::Result;

use super::json_table::JsonTable;

/// `audits.json`
pub struct FileAuditRepository {
    table: JsonTable<AuditRecord>,
}

impl FileAuditRepository {
    pub fn new(store_dir: PathBuf) -> Self {
        Self {
            table: JsonTable::new(store_dir, "audits.json"),
        }
    }
}

impl AuditRepository for FileAuditRepository {
    fn save(&self, audit: &AuditRecord) -> Result<()> {
        self.table.update(|rows| {
            match rows.iter_mut().find(|a| a.id == audit.id) {
                Some(row) => *row = audit.clone(),
                None => rows.push(audit.clone()),
            }
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>> {
        Ok(self.table.load()?.into_iter().find(|a| a.id == id))
    }

    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<AuditRecord>> {
        let mut audits: Vec<AuditRecord> = self
            .table
            .load()?
            .into_iter()
            .filter(|a| a.unit_id == unit_id)
            .collect();
        audits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(audits)
    }
}

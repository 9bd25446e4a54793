//! File-based tire inventory cache

use std::path::PathBuf;

use tireguard_domain::model::TireRecord;
use tireguard_domain::repository::TireRepository;
use tireguard_types::Result;

use super::json_table::JsonTable;

/// `tires.json`, keyed by `unit#position`
pub struct FileTireRepository {
    table: JsonTable<TireRecord>,
}

impl FileTireRepository {
    pub fn new(store_dir: PathBuf) -> Self {
        Self {
            table: JsonTable::new(store_dir, "tires.json"),
        }
    }
}

impl TireRepository for FileTireRepository {
    fn upsert(&self, records: &[TireRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.table.update(|rows| {
            for record in records {
                match rows.iter_mut().find(|r| r.id == record.id) {
                    Some(row) => *row = record.clone(),
                    None => rows.push(record.clone()),
                }
            }
        })
    }

    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<TireRecord>> {
        let mut tires: Vec<TireRecord> = self
            .table
            .load()?
            .into_iter()
            .filter(|t| t.unit_id == unit_id)
            .collect();
        tires.sort_by_key(|t| t.position);
        Ok(tires)
    }
}

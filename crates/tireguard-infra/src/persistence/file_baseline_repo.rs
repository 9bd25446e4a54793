//! File-based baseline repository

use std::path::PathBuf;

use tireguard_domain::model::Baseline;
use tireguard_domain::repository::BaselineRepository;
use tireguard_types::Result;

use super::json_table::JsonTable;

/// `baselines.json`: one row per unit
pub struct FileBaselineRepository {
    table: JsonTable<Baseline>,
}

impl FileBaselineRepository {
    pub fn new(store_dir: PathBuf) -> Self {
        Self {
            table: JsonTable::new(store_dir, "baselines.json"),
        }
    }
}

impl BaselineRepository for FileBaselineRepository {
    fn find_by_unit(&self, unit_id: &str) -> Result<Option<Baseline>> {
        Ok(self
            .table
            .load()?
            .into_iter()
            .find(|b| b.unit_id == unit_id))
    }

    fn save(&self, baseline: &Baseline) -> Result<()> {
        self.table.update(|rows| {
            match rows.iter_mut().find(|b| b.unit_id == baseline.unit_id) {
                Some(row) => *row = baseline.clone(),
                None => rows.push(baseline.clone()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;
    use tireguard_domain::model::ApprovalRef;
    use tireguard_types::Fingerprint;

    #[test]
    fn test_save_replaces_row() {
        let dir = tempdir().unwrap();
        let repo = FileBaselineRepository::new(dir.path().to_path_buf());
        let approval = ApprovalRef::Enrollment {
            enrolled_by: "gate".to_string(),
        };
        let first = Baseline::enrolled(
            "U1",
            vec![Fingerprint::unknown(1, "1.jpg", Utc::now())],
            approval.clone(),
            Utc::now(),
        );
        repo.save(&first).unwrap();
        let second = first.apply(&[], approval, Utc::now());
        repo.save(&second).unwrap();

        let loaded = repo.find_by_unit("U1").unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert!(repo.find_by_unit("U2").unwrap().is_none());
    }
}

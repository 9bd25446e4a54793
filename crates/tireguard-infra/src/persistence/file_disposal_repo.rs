//! File-based disposal repository

use std::path::PathBuf;

use uuid::Uuid;

use tireguard_domain::model::DisposalRequest;
use tireguard_domain::repository::DisposalRepository;
use tireguard_types::Result;

use super::json_table::JsonTable;

/// `tire_disposals.json`
pub struct FileDisposalRepository {
    table: JsonTable<DisposalRequest>,
}

impl FileDisposalRepository {
    pub fn new(store_dir: PathBuf) -> Self {
        Self {
            table: JsonTable::new(store_dir, "tire_disposals.json"),
        }
    }
}

impl DisposalRepository for FileDisposalRepository {
    fn save(&self, disposal: &DisposalRequest) -> Result<()> {
        self.table.update(|rows| {
            match rows.iter_mut().find(|d| d.id == disposal.id) {
                Some(row) => *row = disposal.clone(),
                None => rows.push(disposal.clone()),
            }
        })
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<DisposalRequest>> {
        Ok(self.table.load()?.into_iter().find(|d| d.id == id))
    }

    fn find_by_unit(&self, unit_id: &str) -> Result<Vec<DisposalRequest>> {
        let mut disposals: Vec<DisposalRequest> = self
            .table
            .load()?
            .into_iter()
            .filter(|d| d.unit_id == unit_id)
            .collect();
        disposals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(disposals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::tempdir;
    use tireguard_domain::model::NewDisposal;
    use tireguard_types::DisposalReason;

    fn disposal(unit: &str, minutes_ago: i64) -> DisposalRequest {
        DisposalRequest::file(
            NewDisposal {
                unit_id: unit.to_string(),
                position: 2,
                reason: DisposalReason::Wear,
                photo: Some("worn.jpg".to_string()),
                comments: String::new(),
                disposed_by: "mechanic".to_string(),
            },
            Utc::now() - Duration::minutes(minutes_ago),
        )
        .unwrap()
    }

    #[test]
    fn test_history_is_newest_first_per_unit() {
        let dir = tempdir().unwrap();
        let repo = FileDisposalRepository::new(dir.path().to_path_buf());
        let old = disposal("U1", 30);
        let new = disposal("U1", 1);
        repo.save(&old).unwrap();
        repo.save(&new).unwrap();
        repo.save(&disposal("U2", 5)).unwrap();

        let history = repo.find_by_unit("U1").unwrap();
        assert_eq!(history.iter().map(|d| d.id).collect::<Vec<_>>(), vec![new.id, old.id]);
    }

    #[test]
    fn test_save_overwrites_by_id() {
        let dir = tempdir().unwrap();
        let repo = FileDisposalRepository::new(dir.path().to_path_buf());
        let mut request = disposal("U1", 0);
        repo.save(&request).unwrap();
        request.approve("supervisor", None, Utc::now()).unwrap();
        repo.save(&request).unwrap();

        assert_eq!(repo.find_by_unit("U1").unwrap().len(), 1);
        let stored = repo.find_by_id(request.id).unwrap().unwrap();
        assert_eq!(stored.approved_by.as_deref(), Some("supervisor"));
    }
}

//! Persistence implementations
//!
//! File-based implementations of the repository traits. Each table is one
//! JSON document under the tenant's store directory.

mod file_audit_repo;
mod file_baseline_repo;
mod file_disposal_repo;
mod file_tire_repo;
mod file_unit_repo;
mod json_table;

pub use file_audit_repo::FileAuditRepository;
pub use file_baseline_repo::FileBaselineRepository;
pub use file_disposal_repo::FileDisposalRepository;
pub use file_tire_repo::FileTireRepository;
pub use file_unit_repo::FileUnitRepository;
pub use json_table::JsonTable;

//! Domain model types

pub mod audit;
pub mod baseline;
pub mod disposal;
pub mod tire;
pub mod unit;

pub use audit::{
    Approval, AuditRecord, AuditState, ComparisonOutcome, ComparisonSummary, Justification,
    MaintenanceKind, MaintenanceSignal, PositionComparison, Verdict,
};
pub use baseline::{ApprovalRef, Baseline, FrameUpdate};
pub use disposal::{DisposalRequest, NewDisposal};
pub use tire::{TireRecord, TireStatus};
pub use unit::Unit;

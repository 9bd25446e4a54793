//! Domain services

pub mod audit_comparator;
pub mod audit_report;
pub mod frame_check;
pub mod wear_predictor;

pub use audit_comparator::{compare, DEFAULT_DEPTH_TOLERANCE_MM};
pub use audit_report::generate_audit_report;
pub use frame_check::check_frames;
pub use wear_predictor::{predict, readings_from_frames, DepthReading, WearPrediction, MIN_TREAD_DEPTH_MM};

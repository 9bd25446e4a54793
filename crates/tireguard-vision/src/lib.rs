//! Vision module - tire identity extraction from photographs
//!
//! Extraction is best-effort: callers treat any failure as an unknown
//! fingerprint rather than aborting the capture.

pub mod ai;
pub mod extractor;

pub use ai::prompts::build_fingerprint_prompt;
pub use ai::response::{extract_json_from_response, parse_response};
pub use extractor::{CommandExtractor, FingerprintExtractor, SidecarExtractor};

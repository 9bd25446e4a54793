//! Infrastructure layer - persistence implementations, loaders

pub mod depth_csv;
pub mod exif_reader;
pub mod memory;
pub mod persistence;
pub mod photo;

pub use depth_csv::{load_depth_readings, DepthCsvError};
pub use exif_reader::PhotoMetadata;
pub use memory::MemoryBackend;
pub use photo::hash_photo;

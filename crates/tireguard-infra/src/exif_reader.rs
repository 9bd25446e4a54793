//! EXIF capture time for tire photos

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use exif::{In, Reader, Tag};

/// EXIF metadata used as capture evidence
#[derive(Debug, Clone, Default)]
pub struct PhotoMetadata {
    /// Original capture datetime (from camera)
    pub captured_at: Option<DateTime<Utc>>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
}

impl PhotoMetadata {
    /// Read EXIF metadata; `None` when the file has no readable EXIF block
    pub fn from_file(path: &Path) -> Option<Self> {
        let file = File::open(path).ok()?;
        let mut bufreader = BufReader::new(file);
        let exif = Reader::new().read_from_container(&mut bufreader).ok()?;

        let captured_at = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
            .and_then(|f| parse_exif_datetime(&f.display_value().to_string()));

        let text = |tag| {
            exif.get_field(tag, In::PRIMARY)
                .map(|f| f.display_value().to_string().trim_matches('"').trim().to_string())
                .filter(|s| !s.is_empty())
        };

        Some(Self {
            captured_at,
            camera_make: text(Tag::Make),
            camera_model: text(Tag::Model),
        })
    }

    /// Camera capture time, if the photo carries one
    pub fn captured_at(path: &Path) -> Option<DateTime<Utc>> {
        Self::from_file(path).and_then(|m| m.captured_at)
    }
}

/// Parse EXIF datetime string (format: "2024:01:15 10:30:45")
fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_matches('"');

    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_exif_datetime() {
        let dt = parse_exif_datetime("2024:01:15 10:30:45").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 1, 15));
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_display_value_format() {
        // kamadak-exif renders DateTime fields with dashes
        let dt = parse_exif_datetime("\"2024-01-15 10:30:45\"").unwrap();
        assert_eq!(dt.year(), 2024);
        assert!(parse_exif_datetime("yesterday").is_none());
    }

    #[test]
    fn test_no_exif_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(PhotoMetadata::captured_at(&path).is_none());
    }
}

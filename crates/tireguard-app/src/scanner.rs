//! Capture folder scanning and photo validation
//!
//! A capture folder holds one photo per position. The file stem names the
//! position: `1.jpg`, `pos-2.png`, `T3.jpeg`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tireguard_types::{Error, Position, Result};
use walkdir::WalkDir;

/// Supported image extensions
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

/// A photo assigned to a mount position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedPhoto {
    pub position: Position,
    pub path: PathBuf,
}

/// Check if a path is a supported image file
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Validate a photo exists and decodes as an image
pub fn validate_photo(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }

    if !path.is_file() {
        return Err(Error::InvalidImageFormat(format!(
            "{} is not a file",
            path.display()
        )));
    }

    if !is_supported_image(path) {
        return Err(Error::InvalidImageFormat(format!(
            "Unsupported image format: {}",
            path.display()
        )));
    }

    image::open(path)?;

    Ok(())
}

/// Position encoded in a file stem, if any
pub fn position_from_path(path: &Path) -> Option<Position> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.trim_start_matches(|c: char| c.is_ascii_alphabetic() || c == '-' || c == '_');
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|p: &Position| *p > 0)
}

/// Photos in a capture folder, ordered by position.
///
/// Only the top level is scanned. Files that do not name a position are
/// skipped; two photos naming the same position are an error.
pub fn scan_capture_dir(dir: &Path) -> Result<Vec<PositionedPhoto>> {
    if !dir.exists() {
        return Err(Error::FileNotFound(dir.display().to_string()));
    }

    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut photos: BTreeMap<Position, PathBuf> = BTreeMap::new();

    for entry in WalkDir::new(dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_supported_image(path) {
            continue;
        }

        let Some(position) = position_from_path(path) else {
            tracing::warn!("Skipping {}: file name does not name a position", path.display());
            continue;
        };

        if let Some(previous) = photos.insert(position, path.to_path_buf()) {
            return Err(Error::InvalidInput(format!(
                "position {} has two photos: {} and {}",
                position,
                previous.display(),
                path.display()
            )));
        }
    }

    if photos.is_empty() {
        return Err(Error::InvalidInput(format!(
            "no tire photos found in {}",
            dir.display()
        )));
    }

    photos
        .into_iter()
        .map(|(position, path)| {
            validate_photo(&path)?;
            Ok(PositionedPhoto { position, path })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_png(path: &Path) {
        image::RgbImage::new(2, 2).save(path).unwrap();
    }

    #[test]
    fn test_is_supported_image() {
        assert!(is_supported_image(Path::new("test.jpg")));
        assert!(is_supported_image(Path::new("test.JPEG")));
        assert!(is_supported_image(Path::new("test.png")));
        assert!(!is_supported_image(Path::new("test.json")));
        assert!(!is_supported_image(Path::new("test")));
    }

    #[test]
    fn test_position_from_path() {
        assert_eq!(position_from_path(Path::new("1.jpg")), Some(1));
        assert_eq!(position_from_path(Path::new("pos-2.png")), Some(2));
        assert_eq!(position_from_path(Path::new("T3.jpeg")), Some(3));
        assert_eq!(position_from_path(Path::new("/a/b/position_12.jpg")), Some(12));
        assert_eq!(position_from_path(Path::new("0.jpg")), None);
        assert_eq!(position_from_path(Path::new("front-left.jpg")), None);
        assert_eq!(position_from_path(Path::new("tire-3-front.jpg")), None);
    }

    #[test]
    fn test_scan_capture_dir() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("pos-2.png"));
        write_png(&dir.path().join("1.png"));
        write_png(&dir.path().join("overview.png"));
        fs::write(dir.path().join("1.png.json"), "{}").unwrap();

        let photos = scan_capture_dir(dir.path()).unwrap();
        let positions: Vec<Position> = photos.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_duplicate_position_is_rejected() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("3.png"));
        write_png(&dir.path().join("T3.png"));
        assert!(matches!(scan_capture_dir(dir.path()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_empty_or_missing_dir() {
        let dir = tempdir().unwrap();
        assert!(matches!(scan_capture_dir(dir.path()), Err(Error::InvalidInput(_))));
        assert!(matches!(
            scan_capture_dir(&dir.path().join("missing")),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_undecodable_photo_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1.jpg");
        fs::write(&path, b"not a jpeg").unwrap();
        assert!(validate_photo(&path).is_err());
    }
}

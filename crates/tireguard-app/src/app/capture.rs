//! Capture pipeline: photos in, fingerprints out
//!
//! Extraction runs on a bounded pool of scoped worker threads. A photo the
//! extractor cannot read yields an unknown fingerprint instead of failing
//! the whole capture.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use chrono::Utc;

use tireguard_infra::{hash_photo, PhotoMetadata};
use tireguard_types::{Error, Fingerprint, Position, Result};
use tireguard_vision::FingerprintExtractor;

use crate::scanner::PositionedPhoto;

/// Progress callback, invoked once per finished photo
pub type ProgressCallback = Box<dyn Fn(&str) + Send>;

/// Extract one fingerprint per photo, ordered by position.
///
/// `jobs` bounds the number of worker threads (minimum 1). Results do not
/// depend on `jobs`. Two positions showing byte-identical photos are
/// rejected as reused evidence.
pub fn capture_fingerprints(
    photos: &[PositionedPhoto],
    extractor: &dyn FingerprintExtractor,
    jobs: usize,
    progress: Option<ProgressCallback>,
) -> Result<Vec<Fingerprint>> {
    let notify = |msg: &str| {
        if let Some(ref cb) = progress {
            cb(msg);
        }
    };

    let workers = jobs.max(1).min(photos.len().max(1));
    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Result<Fingerprint>)>();

    let mut results: Vec<Option<Result<Fingerprint>>> = photos.iter().map(|_| None).collect();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            scope.spawn(move || loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                let Some(photo) = photos.get(index) else {
                    break;
                };
                if tx.send((index, fingerprint_photo(photo, extractor))).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        for (done, (index, result)) in rx.iter().enumerate() {
            let photo = &photos[index];
            let label = match &result {
                Ok(fp) => fp.label(),
                Err(e) => format!("error: {}", e),
            };
            notify(&format!(
                "[{}/{}] position {}: {}",
                done + 1,
                photos.len(),
                photo.position,
                label
            ));
            results[index] = Some(result);
        }
    });

    let mut frames = Vec::with_capacity(photos.len());
    for (photo, result) in photos.iter().zip(results) {
        let result = result.ok_or_else(|| {
            Error::InvalidState(format!("no result for position {}", photo.position))
        })?;
        frames.push(result?);
    }

    reject_reused_photos(&frames)?;
    frames.sort_by_key(|f| f.position);
    Ok(frames)
}

fn fingerprint_photo(photo: &PositionedPhoto, extractor: &dyn FingerprintExtractor) -> Result<Fingerprint> {
    let digest = hash_photo(&photo.path)?;
    let captured_at = PhotoMetadata::captured_at(&photo.path).unwrap_or_else(Utc::now);
    let photo_ref = photo.path.display().to_string();

    let fingerprint = match extractor.extract(&photo.path) {
        Ok(identity) => {
            if !identity.is_identified() {
                tracing::warn!(
                    "Position {}: brand/model not readable in {}",
                    photo.position,
                    photo_ref
                );
            }
            Fingerprint::from_identity(photo.position, identity, photo_ref, captured_at)
        }
        Err(e) => {
            tracing::warn!("Position {}: extraction failed: {}", photo.position, e);
            Fingerprint::unknown(photo.position, photo_ref, captured_at)
        }
    };

    Ok(fingerprint.with_digest(digest))
}

fn reject_reused_photos(frames: &[Fingerprint]) -> Result<()> {
    let mut seen: HashMap<&str, Position> = HashMap::new();
    for frame in frames {
        if let Some(digest) = frame.photo_digest.as_deref() {
            if let Some(other) = seen.insert(digest, frame.position) {
                return Err(Error::InvalidInput(format!(
                    "positions {} and {} use the same photo",
                    other, frame.position
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::tempdir;
    use tireguard_types::ExtractedIdentity;

    /// Brand derived from the file name; position 2 always fails
    struct NameExtractor {
        calls: Mutex<Vec<PathBuf>>,
    }

    impl FingerprintExtractor for NameExtractor {
        fn extract(&self, photo: &Path) -> Result<ExtractedIdentity> {
            self.calls.lock().unwrap().push(photo.to_path_buf());
            let stem = photo.file_stem().unwrap().to_string_lossy().to_string();
            if stem == "2" {
                return Err(Error::ExtractionFailure("blurred".to_string()));
            }
            Ok(ExtractedIdentity {
                brand: Some(format!("BRAND{}", stem)),
                model: Some("M".to_string()),
                ..Default::default()
            })
        }
    }

    fn photos(dir: &Path, count: u32) -> Vec<PositionedPhoto> {
        (1..=count)
            .map(|position| {
                let path = dir.join(format!("{}.png", position));
                // distinct pixels so digests differ
                image::RgbImage::from_pixel(2, 2, image::Rgb([position as u8, 0, 0]))
                    .save(&path)
                    .unwrap();
                PositionedPhoto { position, path }
            })
            .collect()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let dir = tempdir().unwrap();
        let photos = photos(dir.path(), 6);
        let extractor = NameExtractor {
            calls: Mutex::new(Vec::new()),
        };

        let sequential = capture_fingerprints(&photos, &extractor, 1, None).unwrap();
        let parallel = capture_fingerprints(&photos, &extractor, 4, None).unwrap();

        let labels = |frames: &[Fingerprint]| frames.iter().map(|f| f.label()).collect::<Vec<_>>();
        assert_eq!(labels(&sequential), labels(&parallel));
        assert_eq!(extractor.calls.lock().unwrap().len(), 12);
    }

    #[test]
    fn test_failed_extraction_degrades_to_unknown() {
        let dir = tempdir().unwrap();
        let photos = photos(dir.path(), 3);
        let extractor = NameExtractor {
            calls: Mutex::new(Vec::new()),
        };
        let messages = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();

        let frames = capture_fingerprints(
            &photos,
            &extractor,
            2,
            Some(Box::new(move |msg: &str| sink.lock().unwrap().push(msg.to_string()))),
        )
        .unwrap();

        assert_eq!(frames.len(), 3);
        assert!(!frames[1].has_identity());
        assert!(frames[0].has_identity());
        assert!(frames.iter().all(|f| f.photo_digest.is_some()));
        assert_eq!(messages.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_same_photo_for_two_positions_is_rejected() {
        let dir = tempdir().unwrap();
        let mut photos = photos(dir.path(), 2);
        let copy = dir.path().join("copy.png");
        std::fs::copy(&photos[0].path, &copy).unwrap();
        photos[1].path = copy;

        let extractor = NameExtractor {
            calls: Mutex::new(Vec::new()),
        };
        let result = capture_fingerprints(&photos, &extractor, 2, None);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}

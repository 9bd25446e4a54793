//! Shape checks for a captured frame set

use std::collections::BTreeSet;

use tireguard_types::{Error, Fingerprint, Result};

/// A capture must be non-empty, with positions starting at 1 and each
/// position present at most once.
pub fn check_frames(frames: &[Fingerprint]) -> Result<()> {
    if frames.is_empty() {
        return Err(Error::InvalidInput("no frames captured".to_string()));
    }
    let mut seen = BTreeSet::new();
    for frame in frames {
        if frame.position == 0 {
            return Err(Error::InvalidInput("positions start at 1".to_string()));
        }
        if !seen.insert(frame.position) {
            return Err(Error::InvalidInput(format!(
                "position {} captured twice",
                frame.position
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn frame(position: u32) -> Fingerprint {
        Fingerprint::unknown(position, format!("{}.jpg", position), Utc::now())
    }

    #[test]
    fn test_well_formed_capture_passes() {
        assert!(check_frames(&[frame(1), frame(2), frame(6)]).is_ok());
    }

    #[test]
    fn test_rejects_empty_zero_and_duplicates() {
        assert!(matches!(check_frames(&[]), Err(Error::InvalidInput(_))));
        assert!(matches!(check_frames(&[frame(0)]), Err(Error::InvalidInput(_))));
        assert!(matches!(
            check_frames(&[frame(1), frame(2), frame(1)]),
            Err(Error::InvalidInput(_))
        ));
    }
}

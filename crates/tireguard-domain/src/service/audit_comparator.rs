//! Baseline vs. capture comparison

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    Baseline, ComparisonOutcome, ComparisonSummary, MaintenanceKind, MaintenanceSignal,
    PositionComparison, Verdict,
};
use tireguard_types::{Fingerprint, Position};

/// Depth drift (mm) tolerated before a maintenance signal is raised
pub const DEFAULT_DEPTH_TOLERANCE_MM: f64 = 1.0;

/// Compare a captured fingerprint set against the baseline.
///
/// Identity is brand + model, case-insensitive. Tread depth and rim are
/// maintenance signals only and never produce a mismatch.
pub fn compare(
    baseline: &Baseline,
    captured: &[Fingerprint],
    depth_tolerance_mm: f64,
) -> ComparisonOutcome {
    let expected: BTreeMap<Position, &Fingerprint> =
        baseline.frames.iter().map(|f| (f.position, f)).collect();
    let observed: BTreeMap<Position, &Fingerprint> =
        captured.iter().map(|f| (f.position, f)).collect();

    let positions: BTreeSet<Position> = expected.keys().chain(observed.keys()).copied().collect();

    let mut outcome = ComparisonOutcome::default();
    let mut summary = ComparisonSummary::default();

    for position in positions {
        let base = expected.get(&position).copied();
        let seen = observed.get(&position).copied();

        let verdict = match (base, seen) {
            (Some(b), Some(s)) => {
                summary.total += 1;
                let verdict = if !s.has_identity() {
                    Verdict::Unknown
                } else if identity_matches(b, s) {
                    Verdict::Match
                } else {
                    Verdict::Mismatch
                };
                if verdict.is_mismatch() {
                    summary.mismatched += 1;
                } else {
                    summary.matched += 1;
                }
                outcome
                    .maintenance
                    .extend(maintenance_signals(b, s, depth_tolerance_mm));
                verdict
            }
            (None, Some(_)) => Verdict::NotBaselined,
            (Some(_), None) => Verdict::NotCaptured,
            (None, None) => continue,
        };

        outcome.verdicts.push(PositionComparison {
            position,
            verdict,
            expected: base.map(Fingerprint::label),
            observed: seen.map(Fingerprint::label),
        });
    }

    outcome.summary = summary;
    outcome
}

fn identity_matches(baseline: &Fingerprint, captured: &Fingerprint) -> bool {
    same_text(&baseline.brand, &captured.brand) && same_text(&baseline.model, &captured.model)
}

/// Both present and equal ignoring case and surrounding whitespace
fn same_text(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => normalize(a) == normalize(b),
        _ => false,
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn maintenance_signals(
    baseline: &Fingerprint,
    captured: &Fingerprint,
    depth_tolerance_mm: f64,
) -> Vec<MaintenanceSignal> {
    let mut signals = Vec::new();

    if let (Some(base_mm), Some(seen_mm)) = (baseline.tread_depth_mm, captured.tread_depth_mm) {
        if (base_mm - seen_mm).abs() > depth_tolerance_mm {
            signals.push(MaintenanceSignal {
                position: captured.position,
                kind: MaintenanceKind::TreadDepthChanged {
                    baseline_mm: base_mm,
                    captured_mm: seen_mm,
                },
            });
        }
    }

    if let (Some(base_rim), Some(seen_rim)) = (&baseline.rim_descriptor, &captured.rim_descriptor) {
        if normalize(base_rim) != normalize(seen_rim) {
            signals.push(MaintenanceSignal {
                position: captured.position,
                kind: MaintenanceKind::RimChanged {
                    baseline: base_rim.clone(),
                    captured: seen_rim.clone(),
                },
            });
        }
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ApprovalRef;
    use chrono::Utc;
    use tireguard_types::ExtractedIdentity;

    fn frame(position: Position, brand: &str, model: &str) -> Fingerprint {
        Fingerprint::from_identity(
            position,
            ExtractedIdentity {
                brand: Some(brand.to_string()),
                model: Some(model.to_string()),
                tread_depth_mm: Some(12.0),
                rim_descriptor: Some("22.5 steel".to_string()),
                ..Default::default()
            },
            format!("{}.jpg", position),
            Utc::now(),
        )
    }

    fn baseline(frames: Vec<Fingerprint>) -> Baseline {
        Baseline::enrolled(
            "U1",
            frames,
            ApprovalRef::Enrollment {
                enrolled_by: "gate".to_string(),
            },
            Utc::now(),
        )
    }

    fn six_wheel_baseline() -> Baseline {
        baseline(
            (1..=6)
                .map(|p| frame(p, "MICHELIN", "X MULTI"))
                .collect(),
        )
    }

    #[test]
    fn test_baseline_against_itself_matches() {
        let base = six_wheel_baseline();
        let outcome = compare(&base, &base.frames, DEFAULT_DEPTH_TOLERANCE_MM);
        assert_eq!(
            outcome.summary,
            ComparisonSummary {
                matched: 6,
                mismatched: 0,
                total: 6
            }
        );
        assert!(outcome.maintenance.is_empty());
    }

    #[test]
    fn test_single_brand_change_is_one_mismatch() {
        let base = six_wheel_baseline();
        let mut captured = base.frames.clone();
        captured[3].brand = Some("GOODYEAR".to_string());

        let outcome = compare(&base, &captured, DEFAULT_DEPTH_TOLERANCE_MM);
        assert_eq!(outcome.summary.mismatched, 1);
        assert_eq!(outcome.summary.matched, 5);
        let flagged: Vec<_> = outcome
            .verdicts
            .iter()
            .filter(|v| v.verdict == Verdict::Mismatch)
            .map(|v| v.position)
            .collect();
        assert_eq!(flagged, vec![4]);
    }

    #[test]
    fn test_single_model_change_is_one_mismatch() {
        let base = six_wheel_baseline();
        let mut captured = base.frames.clone();
        captured[0].model = Some("X LINE ENERGY".to_string());
        let outcome = compare(&base, &captured, DEFAULT_DEPTH_TOLERANCE_MM);
        assert_eq!(outcome.summary.mismatched, 1);
    }

    #[test]
    fn test_case_and_whitespace_are_ignored() {
        let base = baseline(vec![frame(1, "MICHELIN", "X MULTI")]);
        let captured = vec![frame(1, " michelin", "x multi ")];
        let outcome = compare(&base, &captured, DEFAULT_DEPTH_TOLERANCE_MM);
        assert_eq!(outcome.summary.matched, 1);
    }

    #[test]
    fn test_michelin_to_bridgestone() {
        let base = baseline(vec![frame(1, "MICHELIN", "X-MULTI")]);
        let captured = vec![frame(1, "BRIDGESTONE", "M726")];
        let outcome = compare(&base, &captured, DEFAULT_DEPTH_TOLERANCE_MM);
        assert_eq!(
            outcome.summary,
            ComparisonSummary {
                matched: 0,
                mismatched: 1,
                total: 1
            }
        );
        assert_eq!(outcome.verdicts[0].expected.as_deref(), Some("MICHELIN X-MULTI"));
        assert_eq!(outcome.verdicts[0].observed.as_deref(), Some("BRIDGESTONE M726"));
    }

    #[test]
    fn test_failed_extraction_is_unknown_mismatch() {
        let base = baseline(vec![frame(1, "MICHELIN", "X MULTI"), frame(2, "MICHELIN", "X MULTI")]);
        let captured = vec![
            frame(1, "MICHELIN", "X MULTI"),
            Fingerprint::unknown(2, "2.jpg", Utc::now()),
        ];
        let outcome = compare(&base, &captured, DEFAULT_DEPTH_TOLERANCE_MM);
        assert_eq!(outcome.summary.mismatched, 1);
        assert_eq!(outcome.verdicts[1].verdict, Verdict::Unknown);
    }

    #[test]
    fn test_missing_baseline_identity_is_mismatch() {
        let mut partial = frame(1, "MICHELIN", "X MULTI");
        partial.model = None;
        let base = baseline(vec![partial]);
        let outcome = compare(&base, &[frame(1, "MICHELIN", "X MULTI")], DEFAULT_DEPTH_TOLERANCE_MM);
        assert_eq!(outcome.verdicts[0].verdict, Verdict::Mismatch);
    }

    #[test]
    fn test_maintenance_does_not_cause_mismatch() {
        let base = baseline(vec![frame(1, "MICHELIN", "X MULTI")]);
        let mut worn = frame(1, "MICHELIN", "X MULTI");
        worn.tread_depth_mm = Some(6.5);
        worn.rim_descriptor = Some("22.5 alloy".to_string());

        let outcome = compare(&base, &[worn], DEFAULT_DEPTH_TOLERANCE_MM);
        assert_eq!(outcome.summary.mismatched, 0);
        assert_eq!(outcome.maintenance.len(), 2);
    }

    #[test]
    fn test_partial_capture_counts_only_shared_positions() {
        let base = baseline(vec![frame(1, "A", "B"), frame(2, "A", "B")]);
        let captured = vec![frame(2, "A", "B"), frame(7, "A", "B")];
        let outcome = compare(&base, &captured, DEFAULT_DEPTH_TOLERANCE_MM);

        assert_eq!(outcome.summary.total, 1);
        let verdicts: Vec<_> = outcome.verdicts.iter().map(|v| (v.position, v.verdict)).collect();
        assert_eq!(
            verdicts,
            vec![
                (1, Verdict::NotCaptured),
                (2, Verdict::Match),
                (7, Verdict::NotBaselined)
            ]
        );
    }
}

//! Audit records and their justification/approval lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tireguard_types::{Error, Fingerprint, Position, Result};

use super::baseline::FrameUpdate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub matched: u32,
    pub mismatched: u32,
    pub total: u32,
}

/// Per-position outcome of comparing a capture to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Match,
    Mismatch,
    /// Captured photo yielded no usable identity; counted as a mismatch
    Unknown,
    /// Captured, but the baseline has no frame for this position
    NotBaselined,
    /// In the baseline, but not captured this pass
    NotCaptured,
}

impl Verdict {
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Verdict::Mismatch | Verdict::Unknown)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Match => "MATCH",
            Verdict::Mismatch => "MISMATCH",
            Verdict::Unknown => "UNKNOWN",
            Verdict::NotBaselined => "NOT_BASELINED",
            Verdict::NotCaptured => "NOT_CAPTURED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionComparison {
    pub position: Position,
    pub verdict: Verdict,
    /// Baseline "BRAND MODEL", if the baseline has this position
    #[serde(default)]
    pub expected: Option<String>,
    /// Captured "BRAND MODEL", if captured
    #[serde(default)]
    pub observed: Option<String>,
}

/// Maintenance observation. Never affects the security verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceSignal {
    pub position: Position,
    pub kind: MaintenanceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaintenanceKind {
    TreadDepthChanged { baseline_mm: f64, captured_mm: f64 },
    RimChanged { baseline: String, captured: String },
}

impl MaintenanceSignal {
    pub fn describe(&self) -> String {
        match &self.kind {
            MaintenanceKind::TreadDepthChanged {
                baseline_mm,
                captured_mm,
            } => format!(
                "tread depth {:.1} mm -> {:.1} mm ({:+.1})",
                baseline_mm,
                captured_mm,
                captured_mm - baseline_mm
            ),
            MaintenanceKind::RimChanged { baseline, captured } => {
                format!("rim {} -> {}", baseline, captured)
            }
        }
    }
}

/// Comparator output, before it is wrapped in an AuditRecord
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonOutcome {
    pub summary: ComparisonSummary,
    pub verdicts: Vec<PositionComparison>,
    pub maintenance: Vec<MaintenanceSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Justification {
    pub photos: Vec<String>,
    pub text: String,
    pub justified_by: String,
    pub justified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub approved_by: String,
    pub approved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditState {
    /// No mismatches; nothing further to do
    Cleared,
    PendingJustification,
    PendingApproval,
    Approved,
}

impl AuditState {
    pub fn label(&self) -> &'static str {
        match self {
            AuditState::Cleared => "CLEARED",
            AuditState::PendingJustification => "PENDING_JUSTIFICATION",
            AuditState::PendingApproval => "PENDING_APPROVAL",
            AuditState::Approved => "APPROVED",
        }
    }
}

/// One inspection pass. `captured_frames` never changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub unit_id: String,
    pub captured_frames: Vec<Fingerprint>,
    pub comparison: ComparisonSummary,
    #[serde(default)]
    pub verdicts: Vec<PositionComparison>,
    #[serde(default)]
    pub maintenance: Vec<MaintenanceSignal>,
    pub requires_justification: bool,
    #[serde(default)]
    pub justification: Option<Justification>,
    #[serde(default)]
    pub approval: Option<Approval>,
    /// Bumped on every transition; orders replays of the same record
    #[serde(default)]
    pub revision: u32,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        unit_id: &str,
        captured_frames: Vec<Fingerprint>,
        outcome: ComparisonOutcome,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            unit_id: unit_id.to_string(),
            captured_frames,
            requires_justification: outcome.summary.mismatched > 0,
            comparison: outcome.summary,
            verdicts: outcome.verdicts,
            maintenance: outcome.maintenance,
            justification: None,
            approval: None,
            revision: 0,
            created_at: at,
        }
    }

    pub fn state(&self) -> AuditState {
        if !self.requires_justification {
            AuditState::Cleared
        } else if self.justification.is_none() {
            AuditState::PendingJustification
        } else if self.approval.is_none() {
            AuditState::PendingApproval
        } else {
            AuditState::Approved
        }
    }

    /// Positions flagged as mismatched or unknown
    pub fn mismatched_positions(&self) -> Vec<Position> {
        self.verdicts
            .iter()
            .filter(|v| v.verdict.is_mismatch())
            .map(|v| v.position)
            .collect()
    }

    /// Attach the operator's explanation for the mismatches
    pub fn justify(
        &mut self,
        photos: Vec<String>,
        text: &str,
        justified_by: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        match self.state() {
            AuditState::PendingJustification => {}
            AuditState::Cleared => {
                return Err(Error::InvalidState(format!(
                    "audit {} has no mismatches to justify",
                    self.id
                )))
            }
            AuditState::PendingApproval | AuditState::Approved => {
                return Err(Error::Conflict(format!(
                    "audit {} is already justified",
                    self.id
                )))
            }
        }

        let photos: Vec<String> = photos
            .into_iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        if photos.is_empty() {
            return Err(Error::MissingEvidence(format!(
                "justification for audit {} needs at least one photo",
                self.id
            )));
        }
        if text.trim().is_empty() {
            return Err(Error::InvalidInput(
                "justification text must not be empty".to_string(),
            ));
        }

        self.justification = Some(Justification {
            photos,
            text: text.trim().to_string(),
            justified_by: justified_by.to_string(),
            justified_at: at,
        });
        self.revision += 1;
        Ok(())
    }

    /// Record the supervisor's approval
    pub fn approve(&mut self, approved_by: &str, at: DateTime<Utc>) -> Result<&Approval> {
        match self.state() {
            AuditState::PendingApproval => {}
            AuditState::Cleared => {
                return Err(Error::InvalidState(format!(
                    "audit {} has no mismatches to approve",
                    self.id
                )))
            }
            AuditState::PendingJustification => {
                return Err(Error::InvalidState(format!(
                    "audit {} must be justified before approval",
                    self.id
                )))
            }
            AuditState::Approved => {
                return Err(Error::Conflict(format!(
                    "audit {} is already approved",
                    self.id
                )))
            }
        }
        if approved_by.trim().is_empty() {
            return Err(Error::InvalidInput("approver must not be empty".to_string()));
        }

        self.revision += 1;
        let approved_at = at.max(self.created_at);
        Ok(&*self.approval.insert(Approval {
            approved_by: approved_by.to_string(),
            approved_at,
        }))
    }

    /// Baseline changes authorized by approving this audit, at most one per
    /// mismatched position.
    ///
    /// The frame used is the one the comparison judged (the last captured at
    /// that position). Positions whose frame has no identity are left out; an
    /// unreadable photo never becomes the trusted frame.
    pub fn rebaseline_updates(&self) -> Vec<FrameUpdate> {
        self.mismatched_positions()
            .into_iter()
            .filter_map(|position| {
                self.captured_frames
                    .iter()
                    .rev()
                    .find(|f| f.position == position)
            })
            .filter(|f| f.has_identity())
            .cloned()
            .map(FrameUpdate::Replace)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tireguard_types::ExtractedIdentity;

    fn frame(position: Position, brand: Option<&str>) -> Fingerprint {
        Fingerprint::from_identity(
            position,
            ExtractedIdentity {
                brand: brand.map(String::from),
                model: brand.map(|_| "M726".to_string()),
                ..Default::default()
            },
            "p.jpg",
            Utc::now(),
        )
    }

    fn audit_with(verdicts: Vec<(Position, Verdict)>, frames: Vec<Fingerprint>) -> AuditRecord {
        let mismatched = verdicts.iter().filter(|(_, v)| v.is_mismatch()).count() as u32;
        let outcome = ComparisonOutcome {
            summary: ComparisonSummary {
                matched: verdicts.len() as u32 - mismatched,
                mismatched,
                total: verdicts.len() as u32,
            },
            verdicts: verdicts
                .into_iter()
                .map(|(position, verdict)| PositionComparison {
                    position,
                    verdict,
                    expected: None,
                    observed: None,
                })
                .collect(),
            maintenance: Vec::new(),
        };
        AuditRecord::new("U1", frames, outcome, Utc::now())
    }

    #[test]
    fn test_clean_audit_is_terminal() {
        let mut audit = audit_with(vec![(1, Verdict::Match)], vec![frame(1, Some("A"))]);
        assert_eq!(audit.state(), AuditState::Cleared);
        assert!(audit
            .justify(vec!["j.jpg".into()], "text", "op", Utc::now())
            .is_err());
        assert!(matches!(
            audit.approve("sup", Utc::now()),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut audit = audit_with(vec![(1, Verdict::Mismatch)], vec![frame(1, Some("B"))]);
        assert_eq!(audit.state(), AuditState::PendingJustification);

        assert!(matches!(
            audit.approve("sup", Utc::now()),
            Err(Error::InvalidState(_))
        ));

        audit
            .justify(vec!["swap.jpg".into()], "replaced after blowout", "op", Utc::now())
            .unwrap();
        assert_eq!(audit.state(), AuditState::PendingApproval);

        audit.approve("sup", Utc::now()).unwrap();
        assert_eq!(audit.state(), AuditState::Approved);
        assert_eq!(audit.revision, 2);
        assert!(matches!(
            audit.approve("sup", Utc::now()),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_justification_requires_photo() {
        let mut audit = audit_with(vec![(1, Verdict::Mismatch)], vec![frame(1, Some("B"))]);
        let result = audit.justify(vec!["  ".into()], "text", "op", Utc::now());
        assert!(matches!(result, Err(Error::MissingEvidence(_))));
        assert!(audit.justification.is_none());
    }

    #[test]
    fn test_unknown_frames_are_not_rebaselined() {
        let audit = audit_with(
            vec![(1, Verdict::Mismatch), (2, Verdict::Unknown), (3, Verdict::Match)],
            vec![frame(1, Some("B")), frame(2, None), frame(3, Some("A"))],
        );
        let updates = audit.rebaseline_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].position(), 1);
        assert_eq!(audit.mismatched_positions(), vec![1, 2]);
    }

    #[test]
    fn test_repeated_position_yields_one_update() {
        let audit = audit_with(
            vec![(1, Verdict::Mismatch), (2, Verdict::Unknown)],
            vec![
                frame(1, Some("A")),
                frame(2, Some("C")),
                frame(1, Some("B")),
                frame(2, None),
            ],
        );
        let updates = audit.rebaseline_updates();
        assert_eq!(updates.len(), 1);
        match &updates[0] {
            FrameUpdate::Replace(fp) => {
                assert_eq!(fp.position, 1);
                assert_eq!(fp.brand.as_deref(), Some("B"));
            }
            other => panic!("unexpected update {:?}", other),
        }
        assert!(updates.len() <= audit.mismatched_positions().len());
    }
}

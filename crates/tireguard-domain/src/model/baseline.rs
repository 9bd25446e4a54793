//! Trusted fingerprint set for a unit

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tireguard_types::{Error, Fingerprint, Position, Result};

/// What authorized a baseline write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalRef {
    /// First baseline for a unit
    Enrollment { enrolled_by: String },
    /// Supervisor-approved audit
    Audit { audit_id: Uuid, approved_by: String },
    /// Supervisor-approved disposal
    Disposal { disposal_id: Uuid, approved_by: String },
}

impl ApprovalRef {
    /// Reject references that do not point at a real approval
    pub fn validate(&self) -> Result<()> {
        let (id, actor) = match self {
            ApprovalRef::Enrollment { enrolled_by } => (None, enrolled_by),
            ApprovalRef::Audit {
                audit_id,
                approved_by,
            } => (Some(audit_id), approved_by),
            ApprovalRef::Disposal {
                disposal_id,
                approved_by,
            } => (Some(disposal_id), approved_by),
        };

        if actor.trim().is_empty() {
            return Err(Error::InvalidInput(
                "approval reference has no approver".to_string(),
            ));
        }
        if id.is_some_and(|id| id.is_nil()) {
            return Err(Error::InvalidInput(
                "approval reference has no record id".to_string(),
            ));
        }
        Ok(())
    }

    pub fn approved_by(&self) -> &str {
        match self {
            ApprovalRef::Enrollment { enrolled_by } => enrolled_by,
            ApprovalRef::Audit { approved_by, .. } | ApprovalRef::Disposal { approved_by, .. } => {
                approved_by
            }
        }
    }

    /// Audit or disposal that authorized the write; `None` for enrollment
    pub fn record_id(&self) -> Option<Uuid> {
        match self {
            ApprovalRef::Enrollment { .. } => None,
            ApprovalRef::Audit { audit_id, .. } => Some(*audit_id),
            ApprovalRef::Disposal { disposal_id, .. } => Some(*disposal_id),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ApprovalRef::Enrollment { enrolled_by } => format!("enrollment by {}", enrolled_by),
            ApprovalRef::Audit {
                audit_id,
                approved_by,
            } => format!("audit {} approved by {}", audit_id, approved_by),
            ApprovalRef::Disposal {
                disposal_id,
                approved_by,
            } => format!("disposal {} approved by {}", disposal_id, approved_by),
        }
    }
}

/// Change to a single position in a baseline
#[derive(Debug, Clone, PartialEq)]
pub enum FrameUpdate {
    /// Trust this fingerprint from now on
    Replace(Fingerprint),
    /// Tire removed; position awaits a remount
    Clear(Position),
}

impl FrameUpdate {
    pub fn position(&self) -> Position {
        match self {
            FrameUpdate::Replace(fp) => fp.position,
            FrameUpdate::Clear(position) => *position,
        }
    }
}

/// The live baseline for one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub unit_id: String,
    /// One frame per known position, ordered by position
    pub frames: Vec<Fingerprint>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub approval_ref: ApprovalRef,
}

impl Baseline {
    /// First baseline for a unit
    pub fn enrolled(
        unit_id: &str,
        frames: Vec<Fingerprint>,
        approval_ref: ApprovalRef,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            unit_id: unit_id.to_string(),
            frames: by_position(frames),
            version: 1,
            updated_at: at,
            approval_ref,
        }
    }

    /// Next version of this baseline with `updates` applied
    pub fn apply(&self, updates: &[FrameUpdate], approval_ref: ApprovalRef, at: DateTime<Utc>) -> Self {
        let mut frames: BTreeMap<Position, Fingerprint> = self
            .frames
            .iter()
            .map(|f| (f.position, f.clone()))
            .collect();

        for update in updates {
            match update {
                FrameUpdate::Replace(fp) => {
                    frames.insert(fp.position, fp.clone());
                }
                FrameUpdate::Clear(position) => {
                    frames.remove(position);
                }
            }
        }

        Self {
            unit_id: self.unit_id.clone(),
            frames: frames.into_values().collect(),
            version: self.version + 1,
            updated_at: at,
            approval_ref,
        }
    }

    pub fn frame(&self, position: Position) -> Option<&Fingerprint> {
        self.frames.iter().find(|f| f.position == position)
    }

    pub fn positions(&self) -> Vec<Position> {
        self.frames.iter().map(|f| f.position).collect()
    }
}

/// Sort by position, keeping the last frame given for a duplicated position
fn by_position(frames: Vec<Fingerprint>) -> Vec<Fingerprint> {
    let map: BTreeMap<Position, Fingerprint> = frames.into_iter().map(|f| (f.position, f)).collect();
    map.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tireguard_types::ExtractedIdentity;

    fn frame(position: Position, brand: &str, model: &str) -> Fingerprint {
        Fingerprint::from_identity(
            position,
            ExtractedIdentity {
                brand: Some(brand.to_string()),
                model: Some(model.to_string()),
                ..Default::default()
            },
            format!("{}.jpg", position),
            Utc::now(),
        )
    }

    fn enrollment() -> ApprovalRef {
        ApprovalRef::Enrollment {
            enrolled_by: "gate-1".to_string(),
        }
    }

    #[test]
    fn test_enrolled_frames_are_ordered() {
        let baseline = Baseline::enrolled(
            "U1",
            vec![frame(2, "A", "B"), frame(1, "C", "D")],
            enrollment(),
            Utc::now(),
        );
        assert_eq!(baseline.positions(), vec![1, 2]);
        assert_eq!(baseline.version, 1);
    }

    #[test]
    fn test_apply_replaces_and_clears() {
        let baseline = Baseline::enrolled(
            "U1",
            vec![frame(1, "MICHELIN", "X MULTI"), frame(2, "MICHELIN", "X MULTI")],
            enrollment(),
            Utc::now(),
        );
        let approval = ApprovalRef::Audit {
            audit_id: Uuid::new_v4(),
            approved_by: "supervisor".to_string(),
        };
        let next = baseline.apply(
            &[
                FrameUpdate::Replace(frame(1, "BRIDGESTONE", "M726")),
                FrameUpdate::Clear(2),
            ],
            approval.clone(),
            Utc::now(),
        );

        assert_eq!(next.version, 2);
        assert_eq!(next.positions(), vec![1]);
        assert_eq!(next.frame(1).unwrap().brand.as_deref(), Some("BRIDGESTONE"));
        assert_eq!(next.approval_ref, approval);
        // the original is untouched
        assert_eq!(baseline.positions(), vec![1, 2]);
    }

    #[test]
    fn test_approval_ref_validation() {
        assert!(enrollment().validate().is_ok());
        let blank = ApprovalRef::Enrollment {
            enrolled_by: "  ".to_string(),
        };
        assert!(blank.validate().is_err());
        let nil = ApprovalRef::Disposal {
            disposal_id: Uuid::nil(),
            approved_by: "supervisor".to_string(),
        };
        assert!(nil.validate().is_err());
    }

    #[test]
    fn test_record_id() {
        let id = Uuid::new_v4();
        let audit = ApprovalRef::Audit {
            audit_id: id,
            approved_by: "supervisor".to_string(),
        };
        assert_eq!(audit.record_id(), Some(id));
        assert_eq!(enrollment().record_id(), None);
    }
}

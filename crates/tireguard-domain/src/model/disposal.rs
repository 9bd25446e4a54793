//! Disposal requests: formal retirement of a tire from a position

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tireguard_types::{DisposalReason, DisposalStatus, Error, Fingerprint, Position, Result};

use super::baseline::FrameUpdate;

/// Input for filing a disposal
#[derive(Debug, Clone)]
pub struct NewDisposal {
    pub unit_id: String,
    pub position: Position,
    pub reason: DisposalReason,
    pub photo: Option<String>,
    pub comments: String,
    pub disposed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisposalRequest {
    pub id: Uuid,
    pub unit_id: String,
    pub position: Position,
    pub reason: DisposalReason,
    pub photo: String,
    #[serde(default)]
    pub comments: String,
    pub disposed_by: String,
    pub status: DisposalStatus,
    #[serde(default)]
    pub approved_by: Option<String>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    /// Fingerprint of the tire mounted in its place, if known at approval
    #[serde(default)]
    pub replacement: Option<Fingerprint>,
    #[serde(default)]
    pub revision: u32,
    pub created_at: DateTime<Utc>,
}

impl DisposalRequest {
    /// Create a PENDING request. A photo is mandatory.
    pub fn file(input: NewDisposal, at: DateTime<Utc>) -> Result<Self> {
        let photo = input
            .photo
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| {
                Error::MissingEvidence(format!(
                    "disposal of {} position {} requires a photo",
                    input.unit_id, input.position
                ))
            })?;

        if input.position == 0 {
            return Err(Error::InvalidInput("positions start at 1".to_string()));
        }
        if input.disposed_by.trim().is_empty() {
            return Err(Error::InvalidInput("disposed_by must not be empty".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            unit_id: input.unit_id,
            position: input.position,
            reason: input.reason,
            photo,
            comments: input.comments,
            disposed_by: input.disposed_by,
            status: DisposalStatus::Pending,
            approved_by: None,
            approved_at: None,
            replacement: None,
            revision: 0,
            created_at: at,
        })
    }

    /// The single transition out of PENDING
    pub fn approve(
        &mut self,
        approved_by: &str,
        replacement: Option<Fingerprint>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if self.status == DisposalStatus::Approved {
            return Err(Error::Conflict(format!(
                "disposal {} is already approved",
                self.id
            )));
        }
        if approved_by.trim().is_empty() {
            return Err(Error::InvalidInput("approver must not be empty".to_string()));
        }

        // approved_at is always strictly after created_at
        let approved_at = if at > self.created_at {
            at
        } else {
            self.created_at + Duration::milliseconds(1)
        };

        self.status = DisposalStatus::Approved;
        self.approved_by = Some(approved_by.to_string());
        self.approved_at = Some(approved_at);
        self.replacement = replacement.map(|mut fp| {
            fp.position = self.position;
            fp
        });
        self.revision += 1;
        Ok(())
    }

    /// Baseline change authorized by this approved disposal
    pub fn rebaseline_update(&self) -> FrameUpdate {
        match &self.replacement {
            Some(fp) => FrameUpdate::Replace(fp.clone()),
            None => FrameUpdate::Clear(self.position),
        }
    }
}

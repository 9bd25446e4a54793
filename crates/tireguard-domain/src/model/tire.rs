//! Denormalized per-position tire row for inventory views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tireguard_types::{Fingerprint, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TireStatus {
    Mounted,
    /// Tire disposed; nothing trusted at this position yet
    PendingRemount,
}

impl TireStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TireStatus::Mounted => "MOUNTED",
            TireStatus::PendingRemount => "PENDING_REMOUNT",
        }
    }
}

/// Read-cache row, rewritten on every baseline write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TireRecord {
    pub id: String,
    pub unit_id: String,
    pub position: Position,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub depth_mm: Option<f64>,
    pub status: TireStatus,
    #[serde(default)]
    pub last_photo_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TireRecord {
    pub fn key(unit_id: &str, position: Position) -> String {
        format!("{}#{}", unit_id, position)
    }

    pub fn mounted(unit_id: &str, frame: &Fingerprint, at: DateTime<Utc>) -> Self {
        Self {
            id: Self::key(unit_id, frame.position),
            unit_id: unit_id.to_string(),
            position: frame.position,
            brand: frame.brand.clone(),
            model: frame.model.clone(),
            depth_mm: frame.tread_depth_mm,
            status: TireStatus::Mounted,
            last_photo_url: Some(frame.photo_ref.clone()),
            updated_at: at,
        }
    }

    pub fn pending_remount(unit_id: &str, position: Position, at: DateTime<Utc>) -> Self {
        Self {
            id: Self::key(unit_id, position),
            unit_id: unit_id.to_string(),
            position,
            brand: None,
            model: None,
            depth_mm: None,
            status: TireStatus::PendingRemount,
            last_photo_url: None,
            updated_at: at,
        }
    }
}

//! Shared value types for tire identity inspection

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Mount slot on a unit (1..N)
pub type Position = u32;

/// Identity attributes read from a single tire photograph.
///
/// Every field is optional: the extractor is best-effort and a field it
/// cannot read is left empty rather than guessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIdentity {
    #[serde(default)]
    pub brand: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    /// Serial number or DOT code molded on the sidewall
    #[serde(default, alias = "serial_or_dot", alias = "serialOrDOT", alias = "serial", alias = "dot")]
    pub serial_or_dot: Option<String>,

    #[serde(default, alias = "tread_depth_mm")]
    pub tread_depth_mm: Option<f64>,

    #[serde(default, alias = "rim_descriptor", alias = "rim")]
    pub rim_descriptor: Option<String>,
}

impl ExtractedIdentity {
    /// True when both brand and model were read
    pub fn is_identified(&self) -> bool {
        self.brand.is_some() && self.model.is_some()
    }
}

/// Immutable fingerprint of the tire mounted at one position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub position: Position,

    #[serde(default)]
    pub brand: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub serial_or_dot: Option<String>,

    #[serde(default)]
    pub tread_depth_mm: Option<f64>,

    #[serde(default)]
    pub rim_descriptor: Option<String>,

    /// Where the source photograph lives (path or URL)
    pub photo_ref: String,

    /// SHA-256 of the photo bytes, when the photo was read locally
    #[serde(default)]
    pub photo_digest: Option<String>,

    pub captured_at: DateTime<Utc>,
}

impl Fingerprint {
    pub fn from_identity(
        position: Position,
        identity: ExtractedIdentity,
        photo_ref: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            position,
            brand: identity.brand,
            model: identity.model,
            serial_or_dot: identity.serial_or_dot,
            tread_depth_mm: identity.tread_depth_mm,
            rim_descriptor: identity.rim_descriptor,
            photo_ref: photo_ref.into(),
            photo_digest: None,
            captured_at,
        }
    }

    /// Fingerprint for a photo the extractor could not read
    pub fn unknown(position: Position, photo_ref: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        Self::from_identity(position, ExtractedIdentity::default(), photo_ref, captured_at)
    }

    pub fn with_digest(mut self, digest: String) -> Self {
        self.photo_digest = Some(digest);
        self
    }

    pub fn has_identity(&self) -> bool {
        self.brand.is_some() && self.model.is_some()
    }

    /// "BRAND MODEL" label for display
    pub fn label(&self) -> String {
        match (&self.brand, &self.model) {
            (Some(b), Some(m)) => format!("{} {}", b, m),
            (Some(b), None) => format!("{} ?", b),
            (None, Some(m)) => format!("? {}", m),
            (None, None) => "unknown".to_string(),
        }
    }
}

/// Reason a tire is being retired from a position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisposalReason {
    Puncture,
    Wear,
    Damage,
    Theft,
}

impl DisposalReason {
    pub fn label(&self) -> &'static str {
        match self {
            DisposalReason::Puncture => "PUNCTURE",
            DisposalReason::Wear => "WEAR",
            DisposalReason::Damage => "DAMAGE",
            DisposalReason::Theft => "THEFT",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisposalStatus {
    Pending,
    Approved,
}

impl DisposalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DisposalStatus::Pending => "PENDING",
            DisposalStatus::Approved => "APPROVED",
        }
    }
}

/// Forecast bucket for remaining tread life
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WearStatus {
    Good,
    Warning,
    Critical,
}

impl WearStatus {
    /// Classify by days until the tread reaches the legal minimum
    pub fn from_days_remaining(days: i64) -> Self {
        if days < 30 {
            WearStatus::Critical
        } else if days < 90 {
            WearStatus::Warning
        } else {
            WearStatus::Good
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WearStatus::Good => "GOOD",
            WearStatus::Warning => "WARNING",
            WearStatus::Critical => "CRITICAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_deserializes_aliases() {
        let json = r#"{"brand":"MICHELIN","model":"X MULTI","dot":"DOT 4B2X","treadDepthMm":9.5,"rim":"22.5 steel"}"#;
        let identity: ExtractedIdentity = serde_json::from_str(json).unwrap();
        assert_eq!(identity.serial_or_dot.as_deref(), Some("DOT 4B2X"));
        assert_eq!(identity.rim_descriptor.as_deref(), Some("22.5 steel"));
        assert!(identity.is_identified());
    }

    #[test]
    fn test_unknown_fingerprint_has_no_identity() {
        let fp = Fingerprint::unknown(3, "photos/3.jpg", Utc::now());
        assert!(!fp.has_identity());
        assert_eq!(fp.label(), "unknown");
    }

    #[test]
    fn test_wear_status_thresholds() {
        assert_eq!(WearStatus::from_days_remaining(0), WearStatus::Critical);
        assert_eq!(WearStatus::from_days_remaining(29), WearStatus::Critical);
        assert_eq!(WearStatus::from_days_remaining(30), WearStatus::Warning);
        assert_eq!(WearStatus::from_days_remaining(89), WearStatus::Warning);
        assert_eq!(WearStatus::from_days_remaining(90), WearStatus::Good);
    }

    #[test]
    fn test_disposal_reason_serializes_uppercase() {
        let json = serde_json::to_string(&DisposalReason::Puncture).unwrap();
        assert_eq!(json, "\"PUNCTURE\"");
    }
}

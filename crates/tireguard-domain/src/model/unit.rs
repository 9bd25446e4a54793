//! Fleet unit (tractor or trailer) as registered by onboarding

use serde::{Deserialize, Serialize};

/// Vehicle under inspection. Read-only to this system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    /// License plate
    pub plate_id: String,
    /// Fleet-internal number painted on the unit
    #[serde(default)]
    pub pipe_number: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

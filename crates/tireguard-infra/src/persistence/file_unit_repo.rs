//! Unit registry loaded from TOML
//!
//! Onboarding owns the unit list; this system only reads it.
//!
//! ```toml
//! [[units]]
//! id = "TRK-001"
//! plate_id = "ABC-123"
//! pipe_number = "P-17"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use tireguard_domain::model::Unit;
use tireguard_domain::repository::UnitRepository;
use tireguard_types::{ConfigError, Error, Result};

#[derive(Debug, Deserialize)]
struct UnitsFile {
    #[serde(default)]
    units: Vec<Unit>,
}

#[derive(Debug, Default)]
pub struct FileUnitRepository {
    units: BTreeMap<String, Unit>,
}

impl FileUnitRepository {
    /// Load the units file; a missing file yields an empty registry
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "units file not found; no units registered");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(ConfigError::ParseError(format!(
                "Failed to read units file: {}",
                e
            )))
        })?;

        Self::load_from_str(&content)
    }

    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let file: UnitsFile = toml::from_str(toml_content).map_err(|e| {
            Error::Config(ConfigError::ParseError(format!(
                "Failed to parse units TOML: {}",
                e
            )))
        })?;

        let units = file.units.into_iter().map(|u| (u.id.clone(), u)).collect();
        Ok(Self { units })
    }

    pub fn count(&self) -> usize {
        self.units.len()
    }
}

impl UnitRepository for FileUnitRepository {
    fn find_by_id(&self, id: &str) -> Result<Option<Unit>> {
        Ok(self.units.get(id).cloned())
    }

    fn find_all(&self) -> Result<Vec<Unit>> {
        Ok(self.units.values().cloned().collect())
    }
}

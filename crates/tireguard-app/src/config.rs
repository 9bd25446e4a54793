//! Configuration management for tireguard
//!
//! Config stored at: ~/.config/tireguard/config.json

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tireguard_domain::service::DEFAULT_DEPTH_TOLERANCE_MM;
use tireguard_types::{ConfigError, OutputFormat, Result};

use crate::app::Session;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tenant whose data this installation works on
    #[serde(default = "default_tenant")]
    pub tenant_id: String,

    /// Default actor recorded on justifications, disposals and approvals
    #[serde(default)]
    pub operator: Option<String>,

    /// Backing store root (tenant subdirectory is appended)
    #[serde(default)]
    pub store_dir: Option<PathBuf>,

    /// Local outbox root (tenant subdirectory is appended)
    #[serde(default)]
    pub outbox_dir: Option<PathBuf>,

    /// Units registry TOML
    #[serde(default)]
    pub units_file: Option<PathBuf>,

    /// Vision CLI command line; without one, `<photo>.json` sidecars are read
    #[serde(default)]
    pub extractor_command: Option<String>,

    /// Parallel extraction workers (0 = CPU count)
    #[serde(default)]
    pub extraction_jobs: usize,

    /// Tread depth drift tolerated before a maintenance signal
    #[serde(default = "default_depth_tolerance")]
    pub depth_tolerance_mm: f64,

    /// Default output format (json, table)
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,
}

fn default_tenant() -> String {
    "default".to_string()
}

fn default_depth_tolerance() -> f64 {
    DEFAULT_DEPTH_TOLERANCE_MM
}

fn default_output_format() -> OutputFormat {
    OutputFormat::Table
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant(),
            operator: None,
            store_dir: None,
            outbox_dir: None,
            units_file: None,
            extractor_command: None,
            extraction_jobs: 0,
            depth_tolerance_mm: default_depth_tolerance(),
            output_format: default_output_format(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NotFound)?
            .join("tireguard");
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or(ConfigError::NotFound)?
            .join("tireguard");
        Ok(data_dir)
    }

    /// Backing store directory for the current tenant
    pub fn store_dir(&self) -> Result<PathBuf> {
        let root = match &self.store_dir {
            Some(dir) => dir.clone(),
            None => Self::data_dir()?.join("store"),
        };
        Ok(root.join(&self.tenant_id))
    }

    /// Outbox directory for the current tenant
    pub fn outbox_dir(&self) -> Result<PathBuf> {
        let root = match &self.outbox_dir {
            Some(dir) => dir.clone(),
            None => Self::data_dir()?.join("outbox"),
        };
        Ok(root.join(&self.tenant_id))
    }

    pub fn units_file(&self) -> Result<PathBuf> {
        match &self.units_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("units.toml")),
        }
    }

    /// Worker count with 0 resolved to the number of CPUs
    pub fn extraction_jobs(&self) -> usize {
        if self.extraction_jobs == 0 {
            num_cpus::get()
        } else {
            self.extraction_jobs
        }
    }

    pub fn session(&self) -> Session {
        Session::new(
            self.tenant_id.clone(),
            self.operator.clone().unwrap_or_else(|| "operator".to_string()),
        )
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::SaveError(e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |p: Result<PathBuf>| {
            p.map(|p| p.display().to_string())
                .unwrap_or_else(|_| "(error)".to_string())
        };

        writeln!(f, "TireGuard Configuration")?;
        writeln!(f, "=======================")?;
        writeln!(f)?;
        writeln!(f, "Tenant:           {}", self.tenant_id)?;
        writeln!(
            f,
            "Operator:         {}",
            self.operator.as_deref().unwrap_or("(not set)")
        )?;
        writeln!(f, "Store dir:        {}", show(self.store_dir()))?;
        writeln!(f, "Outbox dir:       {}", show(self.outbox_dir()))?;
        writeln!(f, "Units file:       {}", show(self.units_file()))?;
        writeln!(
            f,
            "Extractor:        {}",
            self.extractor_command
                .as_deref()
                .unwrap_or("(sidecar <photo>.json)")
        )?;
        writeln!(f, "Extraction jobs:  {}", self.extraction_jobs())?;
        writeln!(f, "Depth tolerance:  {:.1} mm", self.depth_tolerance_mm)?;
        writeln!(f, "Output format:    {}", self.output_format)?;

        if let Ok(path) = Self::config_path() {
            writeln!(f)?;
            writeln!(f, "Config file:      {}", path.display())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.tenant_id, "default");
        assert_eq!(config.depth_tolerance_mm, 1.0);
        assert!(config.extraction_jobs() >= 1);
    }

    #[test]
    fn test_round_trip_and_tenant_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            tenant_id: "acme".to_string(),
            store_dir: Some(dir.path().join("store")),
            outbox_dir: Some(dir.path().join("outbox")),
            extraction_jobs: 3,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.store_dir().unwrap(), dir.path().join("store").join("acme"));
        assert_eq!(loaded.outbox_dir().unwrap(), dir.path().join("outbox").join("acme"));
        assert_eq!(loaded.extraction_jobs(), 3);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"operator":"kim","output_format":"json"}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.session().operator, "kim");
        assert_eq!(config.output_format, OutputFormat::Json);
        assert_eq!(config.tenant_id, "default");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(tireguard_types::Error::Config(ConfigError::ParseError(_)))
        ));
    }
}

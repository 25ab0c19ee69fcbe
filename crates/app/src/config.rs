use std::fs;
use std::path::{Path, PathBuf};

use amie_core::RosterCreator;
use amie_import::MatchThresholds;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the database lives; the platform data dir when unset.
    pub data_dir: Option<PathBuf>,
    pub database_file: String,
    pub matching: MatchThresholds,
    /// The agency's talent roster, used to recognise creator payouts.
    pub roster: Vec<RosterCreator>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: "finance.db".to_string(),
            matching: MatchThresholds::default(),
            roster: Vec::new(),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("agency", "amie", "amie-finance")
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading configuration from {:?}", path_ref);
    let contents = fs::read_to_string(path_ref)
        .map_err(|e| AppError::Config(format!("Failed to read config file {:?}: {}", path_ref, e)))?;
    toml::from_str(&contents).map_err(|e| {
        AppError::Config(format!(
            "Failed to parse TOML from config file {:?}: {}",
            path_ref, e
        ))
    })
}

impl AppConfig {
    /// An explicit path must exist. Otherwise the platform config file is
    /// used when present, and the defaults when it is not.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return load_config(path);
        }
        match project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE)) {
            Some(path) if path.exists() => load_config(path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| AppError::Config("Could not determine a home directory".to_string()))
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(&self.database_file))
    }
}

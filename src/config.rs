//! # Configuration
//!
//! A [`DashboardConfig`] describes where the input files live, which region to
//! show, how the forecast model is run and how files are split. It can be
//! loaded from JSON or YAML; every field has a default, so a config file only
//! needs to name what differs.
//!
//! ```yaml
//! data_dir: ~/downloads
//! date: 2025-05-05
//! region_name: Maldives
//! region:
//!   lat: { min_value: -1.0, max_value: 8.0 }
//!   lon: { min_value: 72.0, max_value: 74.0 }
//! model:
//!   backend: persistence
//! ```

use crate::batch::BatchWindow;
use crate::dataset::{CoordinateNames, DataPaths};
use crate::model::{ModelBackend, ModelConfig};
use crate::pipeline::{ForecastRequest, ROLLOUT_STEPS};
use crate::region::BoundingBox;
use crate::split::SplitOptions;
use crate::timeslot::DisplayTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Directory holding `static.nc` and the dated surface/atmospheric files.
    pub data_dir: PathBuf,
    /// Date stamp used in the input file names.
    pub date: String,
    pub coordinates: CoordinateNames,
    pub window: BatchWindow,
    pub region: BoundingBox,
    pub region_name: String,
    pub steps: usize,
    pub model: ModelConfig,
    pub split: SplitOptions,
    pub log_level: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            data_dir: PathBuf::from("~/downloads"),
            date: "2025-05-05".to_string(),
            coordinates: CoordinateNames::default(),
            window: BatchWindow::default(),
            region: BoundingBox::maldives(),
            region_name: "Maldives".to_string(),
            steps: ROLLOUT_STEPS,
            model: ModelConfig::default(),
            split: SplitOptions::default(),
            log_level: None,
        }
    }
}

/// Replaces a leading `~` with the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}

impl DashboardConfig {
    /// Loads a config, choosing the parser by file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            Some("json") => Self::from_json(&contents),
            _ => Self::from_json(&contents).or_else(|_| Self::from_yaml(&contents)),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let needed = DisplayTime::ALL
            .iter()
            .map(|t| t.step_index() + 1)
            .max()
            .unwrap_or(ROLLOUT_STEPS);
        if self.steps < needed {
            return Err(ConfigError::Invalid(format!(
                "steps must be at least {} to cover every display time, got {}",
                needed, self.steps
            )));
        }
        if self.window.len == 0 {
            return Err(ConfigError::Invalid("window.len must be at least 1".to_string()));
        }
        for (axis, range) in [("latitude", &self.region.lat), ("longitude", &self.region.lon)] {
            if range.min_value > range.max_value {
                return Err(ConfigError::Invalid(format!(
                    "region {} minimum {} exceeds maximum {}",
                    axis, range.min_value, range.max_value
                )));
            }
        }
        if self.model.name.trim().is_empty() || self.model.checkpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("model name and checkpoint are required".to_string()));
        }
        if self.model.backend == ModelBackend::External && self.model.command.is_empty() {
            return Err(ConfigError::Invalid(
                "model.command is required for the external backend".to_string(),
            ));
        }
        if self.split.parts == 0 {
            return Err(ConfigError::Invalid("split.parts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// The three input files with `~` expanded.
    pub fn data_paths(&self) -> DataPaths {
        DataPaths::in_dir(&expand_tilde(&self.data_dir), &self.date)
    }

    pub fn forecast_request(&self) -> ForecastRequest {
        let mut model = self.model.clone();
        model.cache_dir = expand_tilde(&model.cache_dir);
        ForecastRequest {
            paths: self.data_paths(),
            names: self.coordinates.clone(),
            window: self.window,
            model,
            steps: self.steps,
        }
    }
}

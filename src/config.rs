//! Run configuration: where the reference datasets live and how the classifier is fit.
//!
//! Every field has a default, so a TOML file only needs the keys it overrides:
//!
//! ```toml
//! [reference]
//! too_training = "/data/topos/training_too.tsv"
//!
//! [classifier]
//! c = 0.5
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse configuration '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid classifier setting: {0}")]
    InvalidSetting(String),
}

/// Locations of the bundled reference datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePaths {
    pub tumor_training: PathBuf,
    pub tumor_labels: PathBuf,
    pub too_training: PathBuf,
    pub too_labels: PathBuf,
    pub single_cell: PathBuf,
    pub bulk: PathBuf,
}

impl Default for ReferencePaths {
    fn default() -> Self {
        Self {
            tumor_training: "./required_data/tumor_prediction/training_tumor.tsv".into(),
            tumor_labels: "./required_data/tumor_prediction/labels_training_tumor.tsv".into(),
            too_training: "./required_data/too_prediction/training_too.tsv".into(),
            too_labels: "./required_data/too_prediction/labels_training_too.tsv".into(),
            single_cell: "./required_data/f_ratio/CTC-pooled_BRCA_tpm.tsv".into(),
            bulk: "./required_data/f_ratio/TCGA-BRCA_from_training_tpm.tsv".into(),
        }
    }
}

/// Linear SVM hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmSettings {
    /// Penalty on margin violations.
    pub c: f64,
    /// Stopping tolerance of the SMO solver.
    pub tolerance: f64,
}

impl Default for SvmSettings {
    fn default() -> Self {
        Self {
            c: 1.0,
            tolerance: 1e-3,
        }
    }
}

impl SvmSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(ConfigError::InvalidSetting(format!(
                "c must be a positive number, got {}",
                self.c
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ConfigError::InvalidSetting(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToposConfig {
    pub reference: ReferencePaths,
    pub classifier: SvmSettings,
}

impl ToposConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.classifier.validate()?;
        Ok(config)
    }

    /// The file at `path` if given, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                log::info!("Loading configuration from '{}'", p.display());
                Self::load(p)
            }
            None => Ok(Self::default()),
        }
    }
}

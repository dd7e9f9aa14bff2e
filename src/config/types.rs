use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::app_dirs;

/// Largest upload accepted by default (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Settings for the ingestion and inference pipeline.
///
/// Directory fields left unset resolve to locations under the application root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSettings {
    /// Directory holding per-request scratch files.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
    /// Directory holding the frozen model artifacts.
    #[serde(default)]
    pub model_dir: Option<PathBuf>,
    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default)]
    pub transcoder: TranscoderSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            model_dir: None,
            max_upload_bytes: default_max_upload_bytes(),
            transcoder: TranscoderSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Scratch directory, falling back to `<app root>/temp_uploads`.
    pub fn scratch_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.scratch_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dirs::default_scratch_dir()?),
        }
    }

    /// Model directory, falling back to `<app root>/model`.
    pub fn model_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.model_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dirs::default_model_dir()?),
        }
    }

    /// Reject settings that parse but cannot drive the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_upload_bytes",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.transcoder.validate()
    }
}

/// External transcoder invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscoderSettings {
    /// Whether the external transcoder is tried before the in-process decoder.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Executable name or path.
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Upper bound for one conversion.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Upper bound for the `-version` availability probe.
    #[serde(default = "default_probe_timeout_seconds")]
    pub probe_timeout_seconds: u64,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            program: default_program(),
            timeout_seconds: default_timeout_seconds(),
            probe_timeout_seconds: default_probe_timeout_seconds(),
        }
    }
}

impl TranscoderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transcoder.timeout_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.probe_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transcoder.probe_timeout_seconds",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.program.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "transcoder.program",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_true() -> bool {
    true
}

fn default_program() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_probe_timeout_seconds() -> u64 {
    10
}

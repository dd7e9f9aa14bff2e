use std::path::{Path, PathBuf};

use crate::app_dirs;

use super::{CONFIG_FILE_NAME, ConfigError, PipelineSettings};

/// Resolve the configuration file path inside the application root.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load settings from the application root, returning defaults if the file is missing.
pub fn load_or_default() -> Result<PipelineSettings, ConfigError> {
    load_from_path(&config_path()?)
}

/// Load settings from an explicit TOML file, returning defaults if it does not exist.
pub fn load_from_path(path: &Path) -> Result<PipelineSettings, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(PipelineSettings::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings: PipelineSettings =
        toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, PipelineSettings::default());
        assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(settings.transcoder.enabled);
        assert_eq!(settings.transcoder.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "scratch_dir = \"/tmp/sermood-scratch\"\n[transcoder]\nprogram = \"/opt/ffmpeg/bin/ffmpeg\"\n",
        )
        .unwrap();
        let settings = load_from_path(&path).unwrap();
        assert_eq!(
            settings.scratch_dir.as_deref(),
            Some(Path::new("/tmp/sermood-scratch"))
        );
        assert_eq!(settings.model_dir, None);
        assert_eq!(
            settings.transcoder.program,
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
        assert_eq!(settings.transcoder.probe_timeout_seconds, 10);
        assert_eq!(settings.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[transcoder]\ntimeout_seconds = 0\n").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "transcoder.timeout_seconds",
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_upload_bytes = \"lots\"").unwrap();
        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { .. }));
        assert!(err.to_string().contains(CONFIG_FILE_NAME));
    }
}

//! Pipeline configuration persisted as TOML in the application root.

mod errors;
mod load;
mod types;

/// Default filename used to store the pipeline configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub use errors::ConfigError;
pub use load::{config_path, load_from_path, load_or_default};
pub use types::{DEFAULT_MAX_UPLOAD_BYTES, PipelineSettings, TranscoderSettings};

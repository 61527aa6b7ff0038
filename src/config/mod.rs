//! Configuration for doc-guardian.
//!
//! - `types`: configuration sections with serde defaults
//! - `loading`: file discovery, parsing and validation

mod error;
mod loading;
mod types;

pub use error::ConfigError;
pub use loading::CONFIG_FILE_NAMES;
pub use types::{
    ConfidenceConfig, Config, DetectorSettings, ExecutionConfig, GitConfig, Limits,
    ProjectConfig, default_workers,
};

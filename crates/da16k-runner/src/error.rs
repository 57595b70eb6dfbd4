//! Runner error types.

use da16k_at::AtError;
use da16k_comm::ConfigError;
use thiserror::Error;

/// Errors that can occur while running a command against a module.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for [`RunnerConfig`](crate::RunnerConfig).
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The configuration is structurally valid but unusable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A `KEY=VALUE` argument could not be parsed.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// An AT transaction failed.
    #[error("AT error: {0}")]
    At(#[from] AtError),

    /// The metrics exporter could not be started.
    #[error("metrics exporter error: {0}")]
    Metrics(String),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

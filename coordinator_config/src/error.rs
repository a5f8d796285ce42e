use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum ConfigurationError {
    #[error("Failed to load configuration file \"{file_path}\".")]
    FileLoadError {
        file_path: PathBuf,
        #[source]
        error: io::Error,
    },

    #[error(
        "Failed to parse configuration file \
        \"{file_path}\" as TOML: {error}."
    )]
    FileFormatError {
        file_path: PathBuf,
        #[source]
        error: Box<toml::de::Error>,
    },

    #[error("max_workers must be representable as a non-negative count, got {value}")]
    NegativeMaxWorkers { value: i64 },

    #[error("max_read_parallelism must be at least 1, got {value}")]
    ZeroReadParallelism { value: usize },

    #[error("shutdown_timeout_seconds must be positive, got {value}")]
    NonPositiveShutdownTimeout { value: f64 },

    #[error("stop_grace_period_seconds must not be negative, got {value}")]
    NegativeStopGracePeriod { value: f64 },
}

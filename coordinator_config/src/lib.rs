//! Typed, validated configuration for the workers coordinator, following the
//! "unresolved-then-resolved" loading pattern: deserialize the raw TOML shape first,
//! then validate and convert it into the typed configuration the rest of the
//! application actually uses.

pub mod error;
mod structure;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use error::ConfigurationError;
pub use structure::coordinator::CoordinatorConfig;
pub use structure::logging::LoggingConfiguration;

use structure::coordinator::UnresolvedCoordinatorConfig;
use structure::logging::UnresolvedLoggingConfiguration;

/// The fully resolved configuration for the demo binary: coordinator tuning plus
/// logging. `coordinator_core` itself only ever sees [`CoordinatorConfig`].
#[derive(Debug, Clone)]
pub struct Config {
    pub coordinator: CoordinatorConfig,
    pub logging: LoggingConfiguration,
}

#[derive(Deserialize, Clone, Debug)]
struct UnresolvedConfig {
    coordinator: UnresolvedCoordinatorConfig,
    #[serde(default)]
    logging: UnresolvedLoggingConfiguration,
}

impl Config {
    /// Load and validate configuration from the given TOML file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigurationError> {
        let path = path.as_ref();

        let raw = fs::read_to_string(path).map_err(|error| ConfigurationError::FileLoadError {
            file_path: path.to_path_buf(),
            error,
        })?;

        Self::load_from_str(&raw, path.to_path_buf())
    }

    fn load_from_str(raw: &str, file_path: PathBuf) -> Result<Config, ConfigurationError> {
        let unresolved: UnresolvedConfig =
            toml::from_str(raw).map_err(|error| ConfigurationError::FileFormatError {
                file_path,
                error: Box::new(error),
            })?;

        Ok(Config {
            coordinator: unresolved.coordinator.resolve()?,
            logging: unresolved.logging.resolve(),
        })
    }

    /// A configuration with sensible defaults, used by the demo binary when no
    /// configuration file is given and by tests that don't care about the exact values.
    pub fn default_for_demo() -> Config {
        Self::load_from_str(
            r#"
            [coordinator]
            max_workers = 10
            max_read_parallelism = 4
            shutdown_timeout_seconds = 5.0
            "#,
            PathBuf::from("<built-in default>"),
        )
        .expect("built-in default configuration must be valid")
    }
}

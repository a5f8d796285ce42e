use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigurationError;

/// The grace window Stop waits at the very start, giving in-flight receives a chance to
/// unwind cleanly before the harder `shutdown_timeout` deadline applies. See the design
/// notes on the coordinator's Stop sequence for why this exists.
const DEFAULT_STOP_GRACE_PERIOD_SECONDS: f64 = 1.0;

/// Fully validated, typed coordinator configuration.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    /// Upper bound on concurrently active workers (`MaxWorkersCount`).
    pub max_workers: u32,
    /// Capacity of the read-side `AsyncBottleneck`.
    pub max_read_parallelism: usize,
    /// How long `Stop` waits for workers to finish before abandoning them.
    pub shutdown_timeout: Duration,
    /// The short grace window at the start of `Stop` before the harder timeout applies.
    pub stop_grace_period: Duration,
}

#[derive(Deserialize, Clone, Debug)]
pub(crate) struct UnresolvedCoordinatorConfig {
    max_workers: i64,
    max_read_parallelism: usize,
    shutdown_timeout_seconds: f64,
    #[serde(default = "default_stop_grace_period_seconds")]
    stop_grace_period_seconds: f64,
}

fn default_stop_grace_period_seconds() -> f64 {
    DEFAULT_STOP_GRACE_PERIOD_SECONDS
}

impl UnresolvedCoordinatorConfig {
    pub(crate) fn resolve(self) -> Result<CoordinatorConfig, ConfigurationError> {
        if self.max_workers < 0 {
            return Err(ConfigurationError::NegativeMaxWorkers {
                value: self.max_workers,
            });
        }

        if self.max_read_parallelism == 0 {
            return Err(ConfigurationError::ZeroReadParallelism {
                value: self.max_read_parallelism,
            });
        }

        if self.shutdown_timeout_seconds <= 0.0 {
            return Err(ConfigurationError::NonPositiveShutdownTimeout {
                value: self.shutdown_timeout_seconds,
            });
        }

        if self.stop_grace_period_seconds < 0.0 {
            return Err(ConfigurationError::NegativeStopGracePeriod {
                value: self.stop_grace_period_seconds,
            });
        }

        Ok(CoordinatorConfig {
            // `max_workers >= 0` was just checked above, so this cast never truncates a
            // negative value into something positive.
            max_workers: self.max_workers as u32,
            max_read_parallelism: self.max_read_parallelism,
            shutdown_timeout: Duration::from_secs_f64(self.shutdown_timeout_seconds),
            stop_grace_period: Duration::from_secs_f64(self.stop_grace_period_seconds),
        })
    }
}

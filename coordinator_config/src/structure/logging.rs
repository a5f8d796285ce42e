use serde::Deserialize;

/// Resolved logging configuration: what the demo binary hands to `tracing_subscriber`.
///
/// `coordinator_core` and `transport_inmemory` never read this directly - they only ever
/// call into `tracing`'s macros - this exists purely so the binary has one place to decide
/// how to wire up the subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfiguration {
    /// An `EnvFilter`-compatible directive string, e.g. `"info"` or `"coordinator_core=debug,warn"`.
    pub filter_directives: String,
}

#[derive(Deserialize, Clone, Debug)]
pub(crate) struct UnresolvedLoggingConfiguration {
    #[serde(default = "default_filter_directives")]
    filter_directives: String,
}

impl Default for UnresolvedLoggingConfiguration {
    fn default() -> Self {
        Self {
            filter_directives: default_filter_directives(),
        }
    }
}

fn default_filter_directives() -> String {
    "info".to_string()
}

impl UnresolvedLoggingConfiguration {
    pub(crate) fn resolve(self) -> LoggingConfiguration {
        LoggingConfiguration {
            filter_directives: self.filter_directives,
        }
    }
}

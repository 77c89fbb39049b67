//! Logging setup
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! left to the embedding binary through [`init_tracing`].

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Error installing the global subscriber
#[derive(Debug)]
pub enum ObservabilityError {
    /// The default directive could not be parsed
    InvalidFilter(String),
    /// A global subscriber is already installed
    AlreadyInitialized(String),
}

impl std::fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservabilityError::InvalidFilter(e) => write!(f, "invalid log filter: {}", e),
            ObservabilityError::AlreadyInitialized(e) => write!(f, "tracing already initialized: {}", e),
        }
    }
}

impl std::error::Error for ObservabilityError {}

/// Build the filter: `RUST_LOG` wins over the configured level
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, ObservabilityError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| ObservabilityError::InvalidFilter(e.to_string())),
    }
}

/// Install the global `fmt` subscriber
///
/// Events go to stderr so stdout stays free for the exposition.
pub fn init_tracing(config: &LogConfig) -> Result<(), ObservabilityError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| ObservabilityError::AlreadyInitialized(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LogConfig {
            level: "info,state_metrics=notalevel".to_string(),
            json: false,
        };
        assert!(matches!(env_filter(&config), Err(ObservabilityError::InvalidFilter(_))));
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = LogConfig::default();
        // The first call may lose to another test; the second never succeeds
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(ObservabilityError::AlreadyInitialized(_))));
    }
}

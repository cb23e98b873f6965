use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be a non-empty string")]
    Empty { field: &'static str },
    #[error("{field} is missing")]
    Missing { field: &'static str },
    #[error("task '{task}' is assigned to unknown agent '{agent}'")]
    UnknownAgent { task: String, agent: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("a crew worker is already running (generation {generation})")]
    AlreadyRunning { generation: u64 },
    #[error("crew worker {generation} did not stop within {timeout:?}")]
    StopTimedOut { generation: u64, timeout: Duration },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingEnv(&'static str),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure of a config update that triggers a restart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

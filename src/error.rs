use thiserror::Error;

use crate::sink::AddressableKey;

/// A required node could not be resolved at startup. The loop never
/// starts when this happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("namespace '{0}' is not registered on the server")]
    UnknownNamespace(String),
    #[error("node {0} does not exist in the address space")]
    UnknownNode(AddressableKey),
}

/// A single publish attempt failed. Contained within the sensor loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("node {0} is unavailable")]
    NodeUnavailable(AddressableKey),
    #[error("write to node {key} rejected: {reason}")]
    Rejected { key: AddressableKey, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything that can abort process launch.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("node resolution failed: {0}")]
    Resolution(#[from] ResolutionError),
    #[error("namespace setup failed: {0}")]
    Namespace(String),
    #[error("server could not be created: {0}")]
    Server(String),
}

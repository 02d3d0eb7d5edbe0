//! Error types for configuration resolution.

use thiserror::Error;

/// Errors raised while turning an environment block into connection settings.
///
/// All of these are fatal at startup: a connection cannot be attempted
/// without a valid environment.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No block exists for the requested environment name.
    #[error("no database configuration for environment '{0}'")]
    UnknownEnvironment(String),

    /// The block exists but carries no keys at all.
    #[error("database configuration for environment '{0}' is empty")]
    EmptyEnvironment(String),

    /// Neither `adapter` nor `url` is set.
    #[error("database configuration for environment '{0}' has no adapter or url")]
    MissingAdapter(String),

    /// The configuration source could not be parsed.
    #[error("failed to parse database configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors produced by [`ConfigurationResolver::setup`](crate::ConfigurationResolver::setup).
#[derive(Debug, Error)]
pub enum ResolveError<E>
where
    E: std::error::Error + 'static,
{
    /// The environment could not be resolved.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The connection factory rejected the resolved connection.
    #[error("connection factory failed: {0}")]
    Connect(#[source] E),
}

//! Resolution of a named environment into a connection.

use crate::builder::{ConnectionStringBuilder, ResolvedConnection, Runtime};
use crate::error::{ConfigurationError, ResolveError};
use crate::settings::Configuration;

/// Something that can open a connection from resolved settings.
///
/// Implemented by the database layer; tests use recording fakes.
pub trait ConnectionFactory {
    /// Handle returned on success (a pool, a client, ...).
    type Connection;
    /// Error returned when the driver rejects the settings.
    type Error: std::error::Error + 'static;

    /// Opens a connection from `resolved`.
    ///
    /// Native runtimes pass [`ResolvedConnection::Params`]; JVM-hosted ones
    /// pass [`ResolvedConnection::Url`]. An implementation that cannot
    /// handle the shape or the adapter it receives returns an error rather
    /// than guessing.
    fn connect(&self, resolved: &ResolvedConnection) -> Result<Self::Connection, Self::Error>;
}

/// Resolves environments of one [`Configuration`] with a fixed strategy.
pub struct ConfigurationResolver<'a> {
    configuration: &'a Configuration,
    builder: Box<dyn ConnectionStringBuilder>,
}

impl<'a> ConfigurationResolver<'a> {
    /// Creates a resolver using the builder for `runtime`.
    pub fn new(configuration: &'a Configuration, runtime: Runtime) -> Self {
        Self::with_builder(configuration, runtime.builder())
    }

    /// Creates a resolver with a caller-supplied strategy.
    pub fn with_builder(
        configuration: &'a Configuration,
        builder: Box<dyn ConnectionStringBuilder>,
    ) -> Self {
        Self {
            configuration,
            builder,
        }
    }

    /// Builds the connection descriptor for `environment`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if the environment is unknown, empty, or
    /// names no adapter.
    pub fn resolve(&self, environment: &str) -> Result<ResolvedConnection, ConfigurationError> {
        let settings = self.configuration.environment(environment)?;
        let resolved = self.builder.build(&settings);

        tracing::debug!(
            environment,
            adapter = resolved.params().get_str("adapter").unwrap_or("<none>"),
            url = resolved.url().is_some(),
            "resolved database environment"
        );

        Ok(resolved)
    }

    /// Resolves `environment` and hands the result to `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Configuration`] if resolution fails and
    /// [`ResolveError::Connect`] if the factory fails.
    pub fn setup<F>(
        &self,
        environment: &str,
        factory: &F,
    ) -> Result<F::Connection, ResolveError<F::Error>>
    where
        F: ConnectionFactory,
    {
        let resolved = self.resolve(environment)?;
        factory.connect(&resolved).map_err(ResolveError::Connect)
    }
}

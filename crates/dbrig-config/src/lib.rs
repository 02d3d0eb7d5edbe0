//! Database configuration resolution for dbrig.
//!
//! Turns a per-environment configuration block (adapter, host, credentials,
//! pool and search-path options) into the shape a connection factory
//! accepts: a flat parameter map for native drivers, or a JDBC URL plus a
//! companion map for JVM-hosted drivers.
//!
//! # Precedence
//!
//! Global `max_connections` and `search_path` set on [`Configuration`]
//! replace the same keys in every environment block. An explicit `url` in a
//! block is never rewritten; only the adapter hint beside it changes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbrig_config::{Configuration, ConfigurationResolver, Runtime};
//!
//! let config = Configuration::from_toml_str(&contents, "production")?;
//! let resolver = ConfigurationResolver::new(&config, Runtime::Native);
//! let pool = resolver.setup("production", &factory)?;
//! ```

mod builder;
mod error;
mod resolver;
mod settings;

pub use builder::{
    driver_scheme, ConnectionParams, ConnectionStringBuilder, JdbcBuilder, NativeBuilder,
    ParseRuntimeError, ResolvedConnection, Runtime,
};
pub use error::{ConfigurationError, ResolveError};
pub use resolver::{ConfigurationResolver, ConnectionFactory};
pub use settings::{
    Configuration, ConfigurationOverrides, EnvironmentConfig, MaxConnections, SearchPath,
};

//! [`ConnectionFactory`] for native SQLite parameter maps.

use dbrig_config::{ConnectionFactory, ConnectionParams, ResolvedConnection};
use serde_json::Value;
use thiserror::Error;

use crate::pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};

const SQLITE_URL_PREFIX: &str = "sqlite://";

/// Errors returned by [`SqliteConnectionFactory`].
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The adapter is not an SQLite adapter.
    #[error("unsupported adapter '{0}', expected 'sqlite'")]
    UnsupportedAdapter(String),

    /// A URL this factory cannot open (JDBC URLs need a JVM-hosted driver).
    #[error("cannot open url '{0}' with the native sqlite driver")]
    UrlNotSupported(String),

    /// Neither `database` nor a `sqlite://` url was given.
    #[error("sqlite connection requires a 'database' path")]
    MissingDatabase,

    /// `max_connections` is not a positive integer. The pool needs at least
    /// one connection.
    #[error("max_connections must be a positive integer, got {0}")]
    InvalidMaxConnections(Value),

    /// The pool could not be built.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Opens an `r2d2` SQLite pool from resolved native parameters.
///
/// `max_connections` maps to the pool size and may be an integer or a
/// numeric string; `database` (or a `sqlite://` url) is the file path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnectionFactory {
    settings: DbRuntimeSettings,
}

impl SqliteConnectionFactory {
    pub fn new(settings: DbRuntimeSettings) -> Self {
        Self { settings }
    }
}

impl ConnectionFactory for SqliteConnectionFactory {
    type Connection = DbPool;
    type Error = ConnectError;

    fn connect(&self, resolved: &ResolvedConnection) -> Result<DbPool, ConnectError> {
        let params = match resolved {
            ResolvedConnection::Params(params) => params,
            ResolvedConnection::Url { url, .. } => {
                return Err(ConnectError::UrlNotSupported(url.clone()))
            }
        };

        let adapter = params.get_str("adapter").unwrap_or("sqlite");
        if !matches!(adapter, "sqlite" | "sqlite3") {
            return Err(ConnectError::UnsupportedAdapter(adapter.to_string()));
        }

        let path = match params.get_str("url") {
            Some(url) => url
                .strip_prefix(SQLITE_URL_PREFIX)
                .ok_or_else(|| ConnectError::UrlNotSupported(url.to_string()))?,
            None => params
                .get_str("database")
                .ok_or(ConnectError::MissingDatabase)?,
        };

        let mut settings = self.settings;
        if let Some(max) = pool_size(params)? {
            settings.pool_max_size = max;
        }

        tracing::info!(
            path,
            max_connections = settings.pool_max_size,
            "opening sqlite pool"
        );

        Ok(create_pool(path, settings)?)
    }
}

/// Reads `max_connections` as a pool size. Zero, negative and non-numeric
/// values are rejected here because `r2d2` panics on a zero-sized pool.
fn pool_size(params: &ConnectionParams) -> Result<Option<u32>, ConnectError> {
    let Some(value) = params.get("max_connections") else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(0) | None => Err(ConnectError::InvalidMaxConnections(value.clone())),
        Some(max) => Ok(Some(u32::try_from(max).unwrap_or(u32::MAX))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbrig_config::ConnectionParams;

    fn sqlite_params(database: &str) -> ConnectionParams {
        let mut params = ConnectionParams::new();
        params.insert("adapter", "sqlite");
        params.insert("database", database);
        params
    }

    #[test]
    fn opens_pool_with_max_connections() {
        let mut params = sqlite_params(":memory:");
        params.insert("max_connections", 2u32);

        let pool = SqliteConnectionFactory::default()
            .connect(&ResolvedConnection::Params(params))
            .expect("sqlite params should connect");
        assert_eq!(pool.max_size(), 2);
    }

    #[test]
    fn rejects_zero_max_connections() {
        let mut params = sqlite_params(":memory:");
        params.insert("max_connections", 0u32);

        let err = SqliteConnectionFactory::default()
            .connect(&ResolvedConnection::Params(params))
            .err()
            .expect("a zero-sized pool should be rejected");
        assert!(matches!(err, ConnectError::InvalidMaxConnections(v) if v == Value::from(0)));
    }

    #[test]
    fn rejects_negative_and_non_numeric_max_connections() {
        for value in [Value::from(-1), Value::from("lots"), Value::from(2.5)] {
            let mut params = sqlite_params(":memory:");
            params.insert("max_connections", value.clone());

            let err = SqliteConnectionFactory::default()
                .connect(&ResolvedConnection::Params(params))
                .err()
                .expect("invalid pool size should be rejected");
            assert!(
                matches!(&err, ConnectError::InvalidMaxConnections(v) if *v == value),
                "{value}: {err}"
            );
        }
    }

    #[test]
    fn accepts_numeric_string_max_connections() {
        let mut params = sqlite_params(":memory:");
        params.insert("max_connections", "3");

        let pool = SqliteConnectionFactory::default()
            .connect(&ResolvedConnection::Params(params))
            .expect("numeric string should connect");
        assert_eq!(pool.max_size(), 3);
    }

    #[test]
    fn accepts_sqlite_url() {
        let mut params = ConnectionParams::new();
        params.insert("adapter", "sqlite3");
        params.insert("url", "sqlite://:memory:");
        params.insert("max_connections", 1u32);

        let pool = SqliteConnectionFactory::default()
            .connect(&ResolvedConnection::Params(params))
            .expect("sqlite url should connect");
        assert_eq!(pool.max_size(), 1);
    }

    #[test]
    fn rejects_other_adapters() {
        let mut params = sqlite_params("app");
        params.insert("adapter", "postgres");

        let err = SqliteConnectionFactory::default()
            .connect(&ResolvedConnection::Params(params))
            .err()
            .expect("postgres should be rejected");
        assert!(matches!(err, ConnectError::UnsupportedAdapter(a) if a == "postgres"));
    }

    #[test]
    fn rejects_jdbc_urls() {
        let resolved = ResolvedConnection::Url {
            url: "jdbc:sqlite://localhost/app".to_string(),
            params: sqlite_params("app"),
        };

        let err = SqliteConnectionFactory::default()
            .connect(&resolved)
            .err()
            .expect("jdbc url should be rejected");
        assert!(matches!(err, ConnectError::UrlNotSupported(_)));
    }

    #[test]
    fn requires_database_path() {
        let mut params = ConnectionParams::new();
        params.insert("adapter", "sqlite");

        let err = SqliteConnectionFactory::default()
            .connect(&ResolvedConnection::Params(params))
            .err()
            .expect("missing database should be rejected");
        assert!(matches!(err, ConnectError::MissingDatabase));
    }
}

//! Database layer for dbrig.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! the embedded migration that creates the `sessions` table, and a
//! [`dbrig_config::ConnectionFactory`] that opens a pool from resolved
//! native parameters.

mod factory;
mod migrations;
mod pool;

pub use factory::{ConnectError, SqliteConnectionFactory};
pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};

//! Database-backed web session store.
//!
//! Persists session payloads to the `sessions` table created by
//! `dbrig-db` migrations. The repository is constructed once at startup and
//! injected into [`SessionStore`]; each request carries its own
//! [`RequestEnv`], so nothing is shared between requests.
//!
//! # Failure model
//!
//! - Lookups never fail: an unknown id (or a broken lookup) yields an
//!   unsaved record with empty data.
//! - Writes return `None` on failure instead of an error.
//! - Destroy always completes; delete failures are logged.

mod error;
mod record;
mod store;

pub use error::SessionError;
pub use record::{SessionData, SessionRecord, SessionRepository, SqliteSessionRepository};
pub use store::{generate_session_id, RequestEnv, SessionOptions, SessionStore};

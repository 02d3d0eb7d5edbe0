//! The session row and the repository over the `sessions` table.

use chrono::Utc;
use dbrig_db::DbPool;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};

use crate::error::SessionError;

/// Session payload: whatever mapping the application stores.
pub type SessionData = Map<String, Value>;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the `sessions` table.
///
/// A record with no `row_id` has never been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    row_id: Option<i64>,
    /// Opaque session identifier; unique across the table.
    pub session_id: String,
    pub data: SessionData,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl SessionRecord {
    /// An unsaved record with empty data.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            row_id: None,
            session_id: session_id.into(),
            data: SessionData::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns `true` if the record was never saved.
    pub fn is_new(&self) -> bool {
        self.row_id.is_none()
    }

    pub fn row_id(&self) -> Option<i64> {
        self.row_id
    }
}

/// Storage behind a [`SessionStore`](crate::SessionStore).
pub trait SessionRepository: Send + Sync {
    /// Looks up the record for `session_id`.
    fn find(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Inserts a new record or updates an existing one, refreshing its
    /// timestamps. On success the record is no longer new.
    fn save(&self, record: &mut SessionRecord) -> Result<(), SessionError>;

    /// Deletes a persisted record. Unsaved records are ignored.
    fn delete(&self, record: &SessionRecord) -> Result<(), SessionError>;
}

/// [`SessionRepository`] over the SQLite `sessions` table.
#[derive(Clone)]
pub struct SqliteSessionRepository {
    pool: DbPool,
}

impl SqliteSessionRepository {
    /// Wraps a pool whose database has had migrations applied.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl SessionRepository for SqliteSessionRepository {
    fn find(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT id, data, created_at, updated_at FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((row_id, data_json, created_at, updated_at)) = row else {
            return Ok(None);
        };

        Ok(Some(SessionRecord {
            row_id: Some(row_id),
            session_id: session_id.to_string(),
            data: serde_json::from_str(&data_json)?,
            created_at,
            updated_at,
        }))
    }

    fn save(&self, record: &mut SessionRecord) -> Result<(), SessionError> {
        let data_json = serde_json::to_string(&record.data)?;
        let now = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let conn = self.pool.get()?;

        match record.row_id {
            None => {
                conn.execute(
                    "INSERT INTO sessions (session_id, data, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)",
                    params![record.session_id, data_json, now],
                )?;
                record.row_id = Some(conn.last_insert_rowid());
                record.created_at = Some(now.clone());
            }
            Some(row_id) => {
                let updated = conn.execute(
                    "UPDATE sessions SET data = ?1, updated_at = ?2 WHERE id = ?3",
                    params![data_json, now, row_id],
                )?;
                if updated == 0 {
                    return Err(SessionError::StaleRecord(record.session_id.clone()));
                }
            }
        }

        record.updated_at = Some(now);
        Ok(())
    }

    fn delete(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let Some(row_id) = record.row_id else {
            return Ok(());
        };
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![row_id])?;
        Ok(())
    }
}

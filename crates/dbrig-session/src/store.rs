//! Middleware-facing session store.
//!
//! The store implements the three hooks a session middleware calls: load,
//! write, and destroy. The record resolved for a request is cached on the
//! request's [`RequestEnv`] so a load followed by a write queries once.

use uuid::Uuid;

use crate::record::{SessionData, SessionRecord, SessionRepository};

/// Per-request session options supplied by the middleware.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Explicit session id requested for this request. When set, record
    /// lookups always hit the repository instead of the cache.
    pub id: Option<String>,
    /// End the session without issuing a replacement id on destroy.
    pub drop: bool,
}

/// Request-scoped state: the session options and the cached record.
#[derive(Debug, Clone, Default)]
pub struct RequestEnv {
    pub options: SessionOptions,
    record: Option<SessionRecord>,
}

impl RequestEnv {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            record: None,
        }
    }

    /// The record resolved earlier in this request, if any.
    pub fn record(&self) -> Option<&SessionRecord> {
        self.record.as_ref()
    }

    /// The id of the session this request is operating on.
    ///
    /// The explicit option wins; otherwise the cached record's id.
    pub fn current_session_id(&self) -> Option<String> {
        self.options
            .id
            .clone()
            .or_else(|| self.record.as_ref().map(|r| r.session_id.clone()))
    }
}

/// Generates a fresh session id: 32 lowercase hex characters.
pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Session store backed by a [`SessionRepository`].
pub struct SessionStore<R> {
    repository: R,
}

impl<R: SessionRepository> SessionStore<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Loads the session, generating an id when none is given.
    ///
    /// Never persists anything: an unknown id yields an unsaved record with
    /// empty data, which is cached on `env`.
    pub fn get(&self, env: &mut RequestEnv, session_id: Option<&str>) -> (String, SessionData) {
        let session_id = session_id.map_or_else(generate_session_id, str::to_string);
        let record = self.find_session(&session_id);
        let data = record.data.clone();
        env.record = Some(record);
        (session_id, data)
    }

    /// Stores `data` for `session_id`.
    ///
    /// Returns the id on success and `None` if the save failed (for example
    /// when another request inserted the same id first). The failure is
    /// logged, never raised, so the middleware can fall back to a new
    /// session.
    pub fn set(
        &self,
        env: &mut RequestEnv,
        session_id: &str,
        data: SessionData,
    ) -> Option<String> {
        let record = self.session_record(env, session_id);
        record.data = data;

        match self.repository.save(record) {
            Ok(()) => Some(session_id.to_string()),
            Err(error) => {
                tracing::warn!(session_id, %error, "failed to save session");
                None
            }
        }
    }

    /// Destroys the current session.
    ///
    /// `_stale_id` is whatever the middleware last saw; the current id is
    /// taken from `env` instead. Returns a fresh id unless `options.drop`
    /// is set. The fresh id is not persisted.
    pub fn destroy(
        &self,
        env: &mut RequestEnv,
        _stale_id: &str,
        options: &SessionOptions,
    ) -> Option<String> {
        if let Some(session_id) = env.current_session_id() {
            let record = self.session_record(env, &session_id);
            if !record.is_new() {
                if let Err(error) = self.repository.delete(record) {
                    tracing::warn!(%session_id, %error, "failed to delete session");
                }
            }
            env.record = None;
        }

        if options.drop {
            None
        } else {
            Some(generate_session_id())
        }
    }

    /// Returns the record for `session_id`, reusing the cached one when
    /// allowed.
    fn session_record<'e>(
        &self,
        env: &'e mut RequestEnv,
        session_id: &str,
    ) -> &'e mut SessionRecord {
        let cached = env.options.id.is_none()
            && env
                .record
                .as_ref()
                .is_some_and(|r| r.session_id == session_id);

        if cached {
            tracing::debug!(session_id, "reusing cached session record");
        } else {
            env.record = Some(self.find_session(session_id));
        }

        env.record.get_or_insert_with(|| SessionRecord::new(session_id))
    }

    fn find_session(&self, session_id: &str) -> SessionRecord {
        match self.repository.find(session_id) {
            Ok(Some(record)) => record,
            Ok(None) => SessionRecord::new(session_id),
            Err(error) => {
                tracing::warn!(session_id, %error, "session lookup failed, starting empty");
                SessionRecord::new(session_id)
            }
        }
    }
}

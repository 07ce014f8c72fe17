// store.rs — The per-connection session and its prompt gate.
//
// One connection holds at most one session. begin_session is idempotent for
// the same workspace root and refused for a different one; there is no
// rebinding. The prompt gate flips once per session, in memory only, when
// the caller successfully reads a recognized prompt.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::SessionError;
use crate::role::Role;

/// Governance state for one connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session identifier returned to the caller.
    pub id: String,
    pub role: Role,
    pub workspace_root: PathBuf,
    /// Whether the canonical prompt has been fetched in this session.
    pub prompt_fetched: bool,
    pub created_at: DateTime<Utc>,
    /// Count of requests dispatched under this session.
    pub sequence_counter: u64,
}

/// Holds the (at most one) session for a connection.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: Option<Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind this connection to a workspace root.
    ///
    /// Calling again with the same root returns the existing session
    /// unchanged; a different root is refused.
    pub fn begin_session(
        &mut self,
        workspace_root: &Path,
        role: Role,
    ) -> Result<&Session, SessionError> {
        if let Some(ref existing) = self.current {
            if existing.workspace_root == workspace_root {
                // Idempotent: same binding, same session id.
                return Ok(self.current.as_ref().expect("session just checked"));
            }
            return Err(SessionError::AlreadyBound {
                bound: existing.workspace_root.clone(),
            });
        }

        let session = Session {
            id: Uuid::new_v4().to_string(),
            role,
            workspace_root: workspace_root.to_path_buf(),
            prompt_fetched: false,
            created_at: Utc::now(),
            sequence_counter: 0,
        };
        tracing::info!(session_id = %session.id, role = %role, "session started");
        self.current = Some(session);
        Ok(self.current.as_ref().expect("session just inserted"))
    }

    /// The active session, or `SESSION_NOT_INITIALIZED`.
    pub fn require_session(&self) -> Result<&Session, SessionError> {
        self.current.as_ref().ok_or(SessionError::NotInitialized)
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Fail unless the prompt gate has been satisfied.
    pub fn require_prompt_fetched(&self) -> Result<&Session, SessionError> {
        let session = self.require_session()?;
        if !session.prompt_fetched {
            return Err(SessionError::PromptGateLocked);
        }
        Ok(session)
    }

    /// Satisfy the prompt gate for the active session.
    pub fn mark_prompt_fetched(&mut self) -> Result<(), SessionError> {
        match self.current {
            Some(ref mut session) => {
                session.prompt_fetched = true;
                Ok(())
            }
            None => Err(SessionError::NotInitialized),
        }
    }

    /// Bump and return the per-session request counter.
    pub fn next_sequence(&mut self) -> Option<u64> {
        self.current.as_mut().map(|session| {
            session.sequence_counter += 1;
            session.sequence_counter
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_session_is_idempotent_for_same_root() {
        let mut store = SessionStore::new();
        let first = store
            .begin_session(Path::new("/repo"), Role::Executor)
            .unwrap()
            .id
            .clone();
        let second = store
            .begin_session(Path::new("/repo"), Role::Executor)
            .unwrap()
            .id
            .clone();
        assert_eq!(first, second);
    }

    #[test]
    fn different_root_is_refused() {
        let mut store = SessionStore::new();
        store
            .begin_session(Path::new("/repo"), Role::Executor)
            .unwrap();
        let result = store.begin_session(Path::new("/elsewhere"), Role::Executor);
        assert!(matches!(result, Err(SessionError::AlreadyBound { .. })));
    }

    #[test]
    fn prompt_gate_starts_locked() {
        let mut store = SessionStore::new();
        store
            .begin_session(Path::new("/repo"), Role::Executor)
            .unwrap();
        assert!(matches!(
            store.require_prompt_fetched(),
            Err(SessionError::PromptGateLocked)
        ));

        store.mark_prompt_fetched().unwrap();
        assert!(store.require_prompt_fetched().is_ok());
    }

    #[test]
    fn no_session_is_its_own_error() {
        let store = SessionStore::new();
        assert!(matches!(
            store.require_session(),
            Err(SessionError::NotInitialized)
        ));
        assert!(matches!(
            store.require_prompt_fetched(),
            Err(SessionError::NotInitialized)
        ));
    }

    #[test]
    fn sequence_counter_increments() {
        let mut store = SessionStore::new();
        assert_eq!(store.next_sequence(), None);
        store
            .begin_session(Path::new("/repo"), Role::Planner)
            .unwrap();
        assert_eq!(store.next_sequence(), Some(1));
        assert_eq!(store.next_sequence(), Some(2));
    }
}

//! Turns a practice run into a persisted session record.
//!
//! One create when the practice begins, one update when it ends, no
//! retries. When the store cannot be reached the recorder keeps the session
//! client-side under a `local-` id so the practice itself is never blocked;
//! [`SessionRecorder::reconcile`] pushes those sessions later.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::preset::Preset;
use crate::session::{Completion, NewSession, Session, SessionPatch};
use crate::storage::SessionStore;

/// Prefix of ids assigned to sessions the store never saw.
pub const OFFLINE_ID_PREFIX: &str = "local-";

/// Identifies the session a running practice will finalize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionHandle {
    pub id: String,
    /// False when the store was unavailable and the session lives only here.
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The store accepted the update.
    Persisted(Session),
    /// Finalized client-side; waiting for [`SessionRecorder::reconcile`].
    Offline(Session),
    /// The store rejected or failed the update; its record is unchanged.
    Failed(String),
    /// The id did not match the active session.
    Ignored,
}

impl FinalizeOutcome {
    pub fn session(&self) -> Option<&Session> {
        match self {
            FinalizeOutcome::Persisted(s) | FinalizeOutcome::Offline(s) => Some(s),
            FinalizeOutcome::Failed(_) | FinalizeOutcome::Ignored => None,
        }
    }
}

#[derive(Debug)]
struct ActiveSession {
    session: Session,
    persisted: bool,
}

pub struct SessionRecorder {
    store: Arc<dyn SessionStore>,
    user_id: Option<String>,
    active: Option<ActiveSession>,
    offline: Vec<Session>,
}

impl SessionRecorder {
    pub fn new(store: Arc<dyn SessionStore>, user_id: Option<String>) -> Self {
        Self {
            store,
            user_id,
            active: None,
            offline: Vec::new(),
        }
    }

    pub fn set_user_id(&mut self, user_id: Option<String>) {
        self.user_id = user_id;
    }

    /// Record the start of a practice of `preset`.
    ///
    /// A store failure does not fail the call: the handle comes back with a
    /// local id and `persisted = false`.
    ///
    /// # Errors
    /// Returns an error only when the preset cannot describe a valid session
    /// (for example a zero-minute preset).
    pub fn begin(&mut self, preset: &Preset) -> Result<SessionHandle, ValidationError> {
        let new = NewSession::for_preset(preset, self.user_id.clone());
        new.validate()?;

        if let Some(previous) = self.active.take() {
            warn!(id = %previous.session.id, "replacing unfinished session");
        }

        let (session, persisted) = match self.store.create_session(new.clone()) {
            Ok(session) => {
                debug!(id = %session.id, preset = %session.preset_name, "session started");
                (session, true)
            }
            Err(e) => {
                warn!(error = %e, "session store unavailable, recording offline");
                let id = format!("{OFFLINE_ID_PREFIX}{}", Uuid::new_v4());
                (Session::create(id, new, Utc::now())?, false)
            }
        };

        let handle = SessionHandle {
            id: session.id.clone(),
            persisted,
        };
        self.active = Some(ActiveSession { session, persisted });
        Ok(handle)
    }

    /// Finalize the active session at `completion_percentage`.
    pub fn finalize(&mut self, session_id: &str, completion_percentage: u32) -> FinalizeOutcome {
        self.finalize_with(session_id, |duration| {
            Completion::from_percentage(duration, completion_percentage)
        })
    }

    /// Finalize the active session after `elapsed_secs` of practice.
    pub fn finalize_elapsed(&mut self, session_id: &str, elapsed_secs: u32) -> FinalizeOutcome {
        self.finalize_with(session_id, |duration| {
            Completion::from_elapsed(duration, elapsed_secs)
        })
    }

    fn finalize_with(
        &mut self,
        session_id: &str,
        completion: impl FnOnce(u32) -> Completion,
    ) -> FinalizeOutcome {
        let matches = self
            .active
            .as_ref()
            .is_some_and(|a| a.session.id == session_id);
        if !matches {
            warn!(id = session_id, "finalize for a session that is not active, ignoring");
            return FinalizeOutcome::Ignored;
        }
        let Some(ActiveSession {
            mut session,
            persisted,
        }) = self.active.take()
        else {
            return FinalizeOutcome::Ignored;
        };

        let now = Utc::now();
        let patch = SessionPatch::finalize(completion(session.duration), now);

        if persisted {
            return match self.store.update_session(&session.id, &patch) {
                Ok(Some(updated)) => {
                    debug!(
                        id = %updated.id,
                        pct = updated.completion_percentage,
                        completed = updated.is_completed,
                        "session finalized"
                    );
                    FinalizeOutcome::Persisted(updated)
                }
                Ok(None) => {
                    warn!(id = %session.id, "store no longer has the session");
                    FinalizeOutcome::Failed(format!("session {} not found", session.id))
                }
                Err(e) => {
                    error!(id = %session.id, error = %e, "failed to finalize session");
                    FinalizeOutcome::Failed(e.to_string())
                }
            };
        }

        match session.apply_patch(&patch, now) {
            Ok(()) => {
                debug!(id = %session.id, "session finalized offline");
                self.offline.push(session.clone());
                FinalizeOutcome::Offline(session)
            }
            Err(e) => FinalizeOutcome::Failed(e.to_string()),
        }
    }

    /// Push finalized offline sessions to the store. One attempt per session
    /// per call; returns how many the store accepted.
    pub fn reconcile(&mut self) -> usize {
        if self.offline.is_empty() {
            return 0;
        }
        let pending = std::mem::take(&mut self.offline);
        let mut accepted = 0;
        for session in pending {
            match self.store.create_session(NewSession::from_session(&session)) {
                Ok(stored) => {
                    debug!(local = %session.id, id = %stored.id, "offline session reconciled");
                    accepted += 1;
                }
                Err(e) => {
                    debug!(local = %session.id, error = %e, "offline session still pending");
                    self.offline.push(session);
                }
            }
        }
        accepted
    }

    pub fn active(&self) -> Option<SessionHandle> {
        self.active.as_ref().map(|a| SessionHandle {
            id: a.session.id.clone(),
            persisted: a.persisted,
        })
    }

    /// Finalized sessions that have not reached the store yet.
    pub fn pending_offline(&self) -> &[Session] {
        &self.offline
    }

    /// Drop one offline session; true if it was pending.
    pub fn remove_offline(&mut self, id: &str) -> bool {
        let before = self.offline.len();
        self.offline.retain(|s| s.id != id);
        self.offline.len() != before
    }

    pub fn discard_offline(&mut self) -> usize {
        let n = self.offline.len();
        self.offline.clear();
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorKey;
    use crate::error::StorageError;
    use crate::preset::find_preset;
    use crate::settings::{SettingsPatch, UserSettings};
    use crate::storage::MemoryStore;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Delegates to a MemoryStore until switched off.
    struct FlakyStore {
        inner: MemoryStore,
        up: AtomicBool,
    }

    impl FlakyStore {
        fn new(up: bool) -> Self {
            Self {
                inner: MemoryStore::new(),
                up: AtomicBool::new(up),
            }
        }

        fn check(&self) -> Result<(), StorageError> {
            if self.up.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(StorageError::Unavailable("connection refused".into()))
            }
        }
    }

    impl SessionStore for FlakyStore {
        fn create_session(&self, new: NewSession) -> Result<Session, StorageError> {
            self.check()?;
            self.inner.create_session(new)
        }
        fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError> {
            self.check()?;
            self.inner.get_session(id)
        }
        fn list_sessions(&self, actor: &ActorKey) -> Result<Vec<Session>, StorageError> {
            self.check()?;
            self.inner.list_sessions(actor)
        }
        fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>, StorageError> {
            self.check()?;
            self.inner.update_session(id, patch)
        }
        fn delete_session(&self, id: &str) -> Result<bool, StorageError> {
            self.check()?;
            self.inner.delete_session(id)
        }
        fn get_settings(&self, actor: &ActorKey) -> Result<UserSettings, StorageError> {
            self.check()?;
            self.inner.get_settings(actor)
        }
        fn upsert_settings(&self, actor: &ActorKey, patch: &SettingsPatch) -> Result<UserSettings, StorageError> {
            self.check()?;
            self.inner.upsert_settings(actor, patch)
        }
    }

    fn box_breathing() -> Preset {
        find_preset("box-breathing").unwrap()
    }

    #[test]
    fn full_finalize_is_completed() {
        let store = Arc::new(MemoryStore::new());
        let mut recorder = SessionRecorder::new(store.clone(), None);
        let handle = recorder.begin(&box_breathing()).unwrap();
        assert!(handle.persisted);

        let FinalizeOutcome::Persisted(session) = recorder.finalize(&handle.id, 100) else {
            panic!("expected persisted outcome");
        };
        assert_eq!(session.completed_duration, 600);
        assert!(session.is_completed);
        assert!(session.completed_at.is_some());
        assert!(recorder.active().is_none());
    }

    #[test]
    fn half_finalize_is_partial() {
        let store = Arc::new(MemoryStore::new());
        let mut recorder = SessionRecorder::new(store.clone(), None);
        let handle = recorder.begin(&box_breathing()).unwrap();
        let outcome = recorder.finalize(&handle.id, 50);
        let session = outcome.session().unwrap();
        assert_eq!(session.completed_duration, 300);
        assert!(!session.is_completed);
        assert_eq!(store.get_session(&handle.id).unwrap().unwrap(), *session);
    }

    #[test]
    fn mismatched_id_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        let mut recorder = SessionRecorder::new(store, None);
        let handle = recorder.begin(&box_breathing()).unwrap();
        assert_eq!(recorder.finalize("someone-else", 100), FinalizeOutcome::Ignored);
        assert_eq!(recorder.active(), Some(handle.clone()));
        assert!(matches!(
            recorder.finalize(&handle.id, 100),
            FinalizeOutcome::Persisted(_)
        ));
        assert_eq!(recorder.finalize(&handle.id, 100), FinalizeOutcome::Ignored);
    }

    #[test]
    fn store_failure_degrades_to_offline() {
        let store = Arc::new(FlakyStore::new(false));
        let mut recorder = SessionRecorder::new(store.clone(), Some("u1".into()));
        let handle = recorder.begin(&box_breathing()).unwrap();
        assert!(!handle.persisted);
        assert!(handle.id.starts_with(OFFLINE_ID_PREFIX));

        let FinalizeOutcome::Offline(session) = recorder.finalize(&handle.id, 95) else {
            panic!("expected offline outcome");
        };
        assert!(session.is_completed);
        assert_eq!(recorder.pending_offline().len(), 1);

        // Still down: nothing accepted, nothing lost.
        assert_eq!(recorder.reconcile(), 0);
        assert_eq!(recorder.pending_offline().len(), 1);

        store.up.store(true, Ordering::SeqCst);
        assert_eq!(recorder.reconcile(), 1);
        assert!(recorder.pending_offline().is_empty());

        let stored = store.list_sessions(&ActorKey::user("u1")).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].completed_duration, session.completed_duration);
        assert_eq!(stored[0].started_at, session.started_at);
    }

    #[test]
    fn update_failure_reports_failed() {
        let store = Arc::new(FlakyStore::new(true));
        let mut recorder = SessionRecorder::new(store.clone(), None);
        let handle = recorder.begin(&box_breathing()).unwrap();
        store.up.store(false, Ordering::SeqCst);

        assert!(matches!(
            recorder.finalize(&handle.id, 100),
            FinalizeOutcome::Failed(_)
        ));
        store.up.store(true, Ordering::SeqCst);
        let stored = store.get_session(&handle.id).unwrap().unwrap();
        assert!(!stored.is_finalized());
    }

    #[test]
    fn finalize_by_elapsed_time() {
        let store = Arc::new(MemoryStore::new());
        let mut recorder = SessionRecorder::new(store, None);
        let preset = find_preset("4-7-8-breathing").unwrap();
        let handle = recorder.begin(&preset).unwrap();
        let outcome = recorder.finalize_elapsed(&handle.id, 240);
        let session = outcome.session().unwrap();
        assert_eq!(session.completion_percentage, 50);
        assert_eq!(session.completed_duration, 240);
    }

    #[test]
    fn zero_minute_preset_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let mut recorder = SessionRecorder::new(store.clone(), None);
        let preset = box_breathing().with_duration(0);
        assert!(recorder.begin(&preset).is_err());
        assert_eq!(store.session_count(), 0);
    }
}

//! Client-side façade over a store, an actor and a recorder.
//!
//! Reads fail open: when the store is unreachable, history and stats come
//! from the last successful read (then from nothing), and settings from the
//! last read, then the local fallback file, then defaults. Writes that the
//! user initiated explicitly (deletes, clears) surface their errors.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::{debug, warn};

use crate::actor::ActorKey;
use crate::error::{StorageError, ValidationError};
use crate::preset::Preset;
use crate::recorder::{FinalizeOutcome, SessionHandle, SessionRecorder, OFFLINE_ID_PREFIX};
use crate::session::Session;
use crate::settings::{SettingsPatch, UserSettings};
use crate::stats::{SessionStats, StatsAggregator};
use crate::storage::{sort_recent_first, SessionStore};

pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    actor: ActorKey,
    recorder: SessionRecorder,
    last_history: Option<Vec<Session>>,
    last_stats: Option<SessionStats>,
    cached_settings: Option<UserSettings>,
    settings_fallback: Option<PathBuf>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, actor: ActorKey) -> Self {
        let recorder = SessionRecorder::new(store.clone(), actor.user_id().map(String::from));
        Self {
            store,
            actor,
            recorder,
            last_history: None,
            last_stats: None,
            cached_settings: None,
            settings_fallback: None,
        }
    }

    /// JSON file used for settings when the store cannot be reached.
    pub fn with_settings_fallback(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_fallback = Some(path.into());
        self
    }

    pub fn actor(&self) -> &ActorKey {
        &self.actor
    }

    /// Switch actor. Cached reads belong to the previous actor and are dropped.
    pub fn set_user_id(&mut self, user_id: Option<String>) {
        self.actor = ActorKey::new(user_id);
        self.recorder.set_user_id(self.actor.user_id().map(String::from));
        self.last_history = None;
        self.last_stats = None;
        self.cached_settings = None;
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    // ── Recording ────────────────────────────────────────────────────

    /// # Errors
    /// Only when `preset` cannot describe a valid session.
    pub fn begin(&mut self, preset: &Preset) -> Result<SessionHandle, ValidationError> {
        self.recorder.begin(preset)
    }

    pub fn finalize(&mut self, session_id: &str, completion_percentage: u32) -> FinalizeOutcome {
        self.recorder.finalize(session_id, completion_percentage)
    }

    pub fn finalize_elapsed(&mut self, session_id: &str, elapsed_secs: u32) -> FinalizeOutcome {
        self.recorder.finalize_elapsed(session_id, elapsed_secs)
    }

    /// Push offline sessions to the store; returns how many were accepted.
    pub fn reconcile(&mut self) -> usize {
        let accepted = self.recorder.reconcile();
        if accepted > 0 {
            debug!(accepted, "reconciled offline sessions");
        }
        accepted
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The actor's sessions, most recent first, including finalized
    /// sessions that have not reached the store yet.
    pub fn history(&mut self) -> Vec<Session> {
        let stored = match self.store.list_sessions(&self.actor) {
            Ok(sessions) => {
                self.last_history = Some(sessions.clone());
                sessions
            }
            Err(e) => {
                warn!(error = %e, "session history unavailable, using last known");
                self.last_history.clone().unwrap_or_default()
            }
        };
        let mut all = stored;
        all.extend(
            self.recorder
                .pending_offline()
                .iter()
                .filter(|s| self.actor.matches(s.user_id.as_deref()))
                .cloned(),
        );
        sort_recent_first(&mut all);
        all
    }

    pub fn recent(&mut self, limit: usize) -> Vec<Session> {
        let mut sessions = self.history();
        sessions.truncate(limit);
        sessions
    }

    /// # Errors
    /// Returns the store error; a missing session is `Ok(None)`.
    pub fn session(&self, id: &str) -> Result<Option<Session>, StorageError> {
        if let Some(local) = self.recorder.pending_offline().iter().find(|s| s.id == id) {
            return Ok(Some(local.clone()));
        }
        self.store.get_session(id)
    }

    /// Stats as of now in the local zone.
    pub fn stats(&mut self) -> SessionStats {
        self.stats_with(&StatsAggregator::local())
    }

    pub fn stats_with<Tz: TimeZone>(&mut self, aggregator: &StatsAggregator<Tz>) -> SessionStats {
        match self.store.list_sessions(&self.actor) {
            Ok(mut sessions) => {
                self.last_history = Some(sessions.clone());
                sessions.extend(
                    self.recorder
                        .pending_offline()
                        .iter()
                        .filter(|s| self.actor.matches(s.user_id.as_deref()))
                        .cloned(),
                );
                let stats = aggregator.aggregate(&sessions);
                self.last_stats = Some(stats.clone());
                stats
            }
            Err(e) => {
                warn!(error = %e, "stats unavailable, using last known");
                self.last_stats.clone().unwrap_or_else(SessionStats::empty)
            }
        }
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn settings(&mut self) -> UserSettings {
        match self.store.get_settings(&self.actor) {
            Ok(settings) => {
                self.cached_settings = Some(settings.clone());
                settings
            }
            Err(e) => {
                warn!(error = %e, "settings unavailable, using fallback");
                self.fallback_settings()
            }
        }
    }

    fn fallback_settings(&self) -> UserSettings {
        if let Some(cached) = &self.cached_settings {
            return cached.clone();
        }
        self.read_fallback_file()
            .unwrap_or_else(|| UserSettings::defaults_for(self.actor.user_id().map(String::from)))
    }

    fn read_fallback_file(&self) -> Option<UserSettings> {
        let path = self.settings_fallback.as_ref()?;
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable settings fallback");
                None
            }
        }
    }

    fn write_fallback_file(&self, settings: &UserSettings) {
        let Some(path) = &self.settings_fallback else {
            return;
        };
        let written = serde_json::to_string_pretty(settings)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "could not write settings fallback");
        }
    }

    /// Save a settings change. When the store is unreachable the change is
    /// applied locally and kept in the fallback file.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when the patch is rejected.
    pub fn save_settings(&mut self, patch: &SettingsPatch) -> Result<UserSettings, ValidationError> {
        patch.validate()?;
        match self.store.upsert_settings(&self.actor, patch) {
            Ok(saved) => {
                self.cached_settings = Some(saved.clone());
                Ok(saved)
            }
            Err(StorageError::Validation(e)) => Err(e),
            Err(e) => {
                warn!(error = %e, "settings store unavailable, saving locally");
                let mut local = self.fallback_settings();
                patch.apply(&mut local, Utc::now())?;
                self.write_fallback_file(&local);
                self.cached_settings = Some(local.clone());
                Ok(local)
            }
        }
    }

    // ── Data management ──────────────────────────────────────────────

    /// # Errors
    /// Returns the store error.
    pub fn delete_session(&mut self, id: &str) -> Result<bool, StorageError> {
        let deleted = if id.starts_with(OFFLINE_ID_PREFIX) {
            self.recorder.remove_offline(id)
        } else {
            self.store.delete_session(id)?
        };
        if deleted {
            self.last_history = None;
            self.last_stats = None;
        }
        Ok(deleted)
    }

    /// Delete every session of the actor, stored and offline. Returns how
    /// many were removed.
    ///
    /// # Errors
    /// Stops at the first store error.
    pub fn clear_all_data(&mut self) -> Result<usize, StorageError> {
        let mut removed = self.recorder.discard_offline();
        for session in self.store.list_sessions(&self.actor)? {
            if self.store.delete_session(&session.id)? {
                removed += 1;
            }
        }
        self.last_history = None;
        self.last_stats = None;
        debug!(removed, actor = %self.actor, "cleared session data");
        Ok(removed)
    }
}

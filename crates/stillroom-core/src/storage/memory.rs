//! Process-local store backed by concurrent maps.

use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{sort_recent_first, SessionStore};
use crate::actor::ActorKey;
use crate::error::StorageError;
use crate::session::{NewSession, Session, SessionPatch};
use crate::settings::{SettingsPatch, UserSettings};

/// In-memory [`SessionStore`]. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: DashMap<String, Session>,
    /// Keyed by [`ActorKey::storage_key`].
    settings: DashMap<String, UserSettings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl SessionStore for MemoryStore {
    fn create_session(&self, new: NewSession) -> Result<Session, StorageError> {
        let session = Session::create(Uuid::new_v4().to_string(), new, Utc::now())?;
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError> {
        Ok(self.sessions.get(id).map(|s| s.value().clone()))
    }

    fn list_sessions(&self, actor: &ActorKey) -> Result<Vec<Session>, StorageError> {
        let mut sessions: Vec<Session> = self
            .sessions
            .iter()
            .filter(|entry| actor.matches(entry.value().user_id.as_deref()))
            .map(|entry| entry.value().clone())
            .collect();
        sort_recent_first(&mut sessions);
        Ok(sessions)
    }

    fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>, StorageError> {
        let Some(mut entry) = self.sessions.get_mut(id) else {
            return Ok(None);
        };
        entry.value_mut().apply_patch(patch, Utc::now())?;
        Ok(Some(entry.value().clone()))
    }

    fn delete_session(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.sessions.remove(id).is_some())
    }

    fn get_settings(&self, actor: &ActorKey) -> Result<UserSettings, StorageError> {
        Ok(self
            .settings
            .get(actor.storage_key())
            .map(|s| s.value().clone())
            .unwrap_or_else(|| UserSettings::defaults_for(actor.user_id().map(String::from))))
    }

    fn upsert_settings(
        &self,
        actor: &ActorKey,
        patch: &SettingsPatch,
    ) -> Result<UserSettings, StorageError> {
        patch.validate()?;
        let mut entry = self
            .settings
            .entry(actor.storage_key().to_string())
            .or_insert_with(|| {
                let mut fresh = UserSettings::defaults_for(actor.user_id().map(String::from));
                fresh.id = Uuid::new_v4().to_string();
                fresh
            });
        patch.apply(entry.value_mut(), Utc::now())?;
        Ok(entry.value().clone())
    }
}

//! SQLite-based session and settings storage.
//!
//! Provides persistent storage for:
//! - Practice sessions (one row per attempt)
//! - Per-actor user settings (one row per actor key)

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::SessionStore;
use crate::actor::ActorKey;
use crate::error::{StorageError, ValidationError};
use crate::preset::{PresetType, Technique};
use crate::session::{NewSession, Session, SessionPatch};
use crate::settings::{SettingsPatch, UserSettings};

/// Current schema version.
const SCHEMA_VERSION: i32 = 1;

const SESSION_COLUMNS: &str = "id, user_id, preset_name, preset_type, technique, duration,
     completed_duration, completion_percentage, is_completed, started_at, completed_at";

const SETTINGS_COLUMNS: &str = "id, user_id, interval_bells, interval_duration, sound_enabled,
     bell_sound, volume, visual_cues, auto_fade_interface, fade_duration, updated_at";

/// SQLite database for sessions and settings.
///
/// The connection sits behind a mutex so one `Database` can be shared
/// across threads as a [`SessionStore`].
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    /// Open (or create) the database file at `path`.
    ///
    /// Creates the schema if it doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StorageError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
            path: Some(path),
        };
        db.migrate()?;
        tracing::debug!(path = ?db.path, "opened session database");
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("database connection poisoned".into()))
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );",
        )?;
        let current: i32 = conn
            .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
            .optional()?
            .unwrap_or(0);

        if current < 1 {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS sessions (
                    id                    TEXT PRIMARY KEY,
                    user_id               TEXT,
                    preset_name           TEXT NOT NULL,
                    preset_type           TEXT NOT NULL,
                    technique             TEXT,
                    duration              INTEGER NOT NULL,
                    completed_duration    INTEGER NOT NULL DEFAULT 0,
                    completion_percentage INTEGER NOT NULL DEFAULT 0,
                    is_completed          INTEGER NOT NULL DEFAULT 0,
                    started_at            TEXT NOT NULL,
                    completed_at          TEXT
                );

                CREATE TABLE IF NOT EXISTS user_settings (
                    id                  TEXT PRIMARY KEY,
                    settings_key        TEXT NOT NULL UNIQUE,
                    user_id             TEXT,
                    interval_bells      INTEGER NOT NULL,
                    interval_duration   INTEGER NOT NULL,
                    sound_enabled       INTEGER NOT NULL,
                    bell_sound          TEXT NOT NULL,
                    volume              INTEGER NOT NULL,
                    visual_cues         INTEGER NOT NULL,
                    auto_fade_interface INTEGER NOT NULL,
                    fade_duration       INTEGER NOT NULL,
                    updated_at          TEXT NOT NULL
                );

                -- Create indexes for common query patterns
                CREATE INDEX IF NOT EXISTS idx_sessions_user_started ON sessions(user_id, started_at);",
            )?;
        }

        if current < SCHEMA_VERSION {
            conn.execute("DELETE FROM schema_version", [])?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )?;
        }
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────

    fn find_session(conn: &Connection, id: &str) -> Result<Option<Session>, StorageError> {
        let raw = conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                SessionRow::read,
            )
            .optional()?;
        raw.map(SessionRow::into_session).transpose()
    }

    fn write_session(conn: &Connection, session: &Session) -> Result<(), StorageError> {
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO sessions ({SESSION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                session.id,
                session.user_id,
                session.preset_name,
                session.preset_type.as_str(),
                session.technique.map(|t| t.as_str()),
                session.duration,
                session.completed_duration,
                session.completion_percentage,
                session.is_completed,
                timestamp(&session.started_at),
                session.completed_at.as_ref().map(timestamp),
            ],
        )?;
        Ok(())
    }

    // ── Settings ─────────────────────────────────────────────────────

    fn find_settings(conn: &Connection, key: &str) -> Result<Option<UserSettings>, StorageError> {
        let raw = conn
            .query_row(
                &format!("SELECT {SETTINGS_COLUMNS} FROM user_settings WHERE settings_key = ?1"),
                params![key],
                SettingsRow::read,
            )
            .optional()?;
        raw.map(SettingsRow::into_settings).transpose()
    }
}

impl SessionStore for Database {
    fn create_session(&self, new: NewSession) -> Result<Session, StorageError> {
        let session = Session::create(Uuid::new_v4().to_string(), new, Utc::now())?;
        let conn = self.lock()?;
        Self::write_session(&conn, &session)?;
        Ok(session)
    }

    fn get_session(&self, id: &str) -> Result<Option<Session>, StorageError> {
        let conn = self.lock()?;
        Self::find_session(&conn, id)
    }

    fn list_sessions(&self, actor: &ActorKey) -> Result<Vec<Session>, StorageError> {
        let conn = self.lock()?;
        let rows = match actor.user_id() {
            Some(user_id) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE user_id = ?1
                     ORDER BY started_at DESC"
                ))?;
                let rows = stmt
                    .query_map(params![user_id], SessionRow::read)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions
                     WHERE user_id IS NULL OR user_id = ''
                     ORDER BY started_at DESC"
                ))?;
                let rows = stmt
                    .query_map([], SessionRow::read)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        rows.into_iter().map(SessionRow::into_session).collect()
    }

    fn update_session(&self, id: &str, patch: &SessionPatch) -> Result<Option<Session>, StorageError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let Some(mut session) = Self::find_session(&tx, id)? else {
            return Ok(None);
        };
        session.apply_patch(patch, Utc::now())?;
        Self::write_session(&tx, &session)?;
        tx.commit()?;
        Ok(Some(session))
    }

    fn delete_session(&self, id: &str) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn get_settings(&self, actor: &ActorKey) -> Result<UserSettings, StorageError> {
        let conn = self.lock()?;
        Ok(Self::find_settings(&conn, actor.storage_key())?
            .unwrap_or_else(|| UserSettings::defaults_for(actor.user_id().map(String::from))))
    }

    fn upsert_settings(
        &self,
        actor: &ActorKey,
        patch: &SettingsPatch,
    ) -> Result<UserSettings, StorageError> {
        patch.validate()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut settings = Self::find_settings(&tx, actor.storage_key())?.unwrap_or_else(|| {
            let mut fresh = UserSettings::defaults_for(actor.user_id().map(String::from));
            fresh.id = Uuid::new_v4().to_string();
            fresh
        });
        patch.apply(&mut settings, Utc::now())?;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO user_settings (settings_key, {SETTINGS_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                actor.storage_key(),
                settings.id,
                settings.user_id,
                settings.interval_bells,
                settings.interval_duration,
                settings.sound_enabled,
                settings.bell_sound,
                settings.volume,
                settings.visual_cues,
                settings.auto_fade_interface,
                settings.fade_duration,
                timestamp(&settings.updated_at),
            ],
        )?;
        tx.commit()?;
        Ok(settings)
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("{column} '{raw}': {e}")))
}

/// Column values as stored, decoded into domain types outside the row
/// callback so decode failures surface as [`StorageError::Corrupt`].
struct SessionRow {
    id: String,
    user_id: Option<String>,
    preset_name: String,
    preset_type: String,
    technique: Option<String>,
    duration: u32,
    completed_duration: u32,
    completion_percentage: u32,
    is_completed: bool,
    started_at: String,
    completed_at: Option<String>,
}

impl SessionRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            preset_name: row.get(2)?,
            preset_type: row.get(3)?,
            technique: row.get(4)?,
            duration: row.get(5)?,
            completed_duration: row.get(6)?,
            completion_percentage: row.get(7)?,
            is_completed: row.get(8)?,
            started_at: row.get(9)?,
            completed_at: row.get(10)?,
        })
    }

    fn into_session(self) -> Result<Session, StorageError> {
        let corrupt = |e: ValidationError| StorageError::Corrupt(e.to_string());
        Ok(Session {
            preset_type: self.preset_type.parse::<PresetType>().map_err(corrupt)?,
            technique: self
                .technique
                .as_deref()
                .map(str::parse::<Technique>)
                .transpose()
                .map_err(corrupt)?,
            started_at: parse_timestamp("started_at", &self.started_at)?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(|raw| parse_timestamp("completed_at", raw))
                .transpose()?,
            id: self.id,
            user_id: self.user_id.filter(|u| !u.is_empty()),
            preset_name: self.preset_name,
            duration: self.duration,
            completed_duration: self.completed_duration,
            completion_percentage: self.completion_percentage,
            is_completed: self.is_completed,
        })
    }
}

struct SettingsRow {
    settings: UserSettings,
    updated_at: String,
}

impl SettingsRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            settings: UserSettings {
                id: row.get(0)?,
                user_id: row.get(1)?,
                interval_bells: row.get(2)?,
                interval_duration: row.get(3)?,
                sound_enabled: row.get(4)?,
                bell_sound: row.get(5)?,
                volume: row.get(6)?,
                visual_cues: row.get(7)?,
                auto_fade_interface: row.get(8)?,
                fade_duration: row.get(9)?,
                updated_at: DateTime::<Utc>::default(),
            },
            updated_at: row.get(10)?,
        })
    }

    fn into_settings(self) -> Result<UserSettings, StorageError> {
        let mut settings = self.settings;
        settings.updated_at = parse_timestamp("updated_at", &self.updated_at)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::find_preset;
    use chrono::Duration;
    use tempfile::TempDir;

    fn new_session(preset_id: &str, user: Option<&str>) -> NewSession {
        let preset = find_preset(preset_id).unwrap();
        NewSession::for_preset(&preset, user.map(String::from))
    }

    #[test]
    fn create_and_get() {
        let db = Database::open_memory().unwrap();
        let created = db.create_session(new_session("4-7-8-breathing", None)).unwrap();
        let loaded = db.get_session(&created.id).unwrap().unwrap();
        assert_eq!(loaded.preset_name, "4-7-8 Breathing");
        assert_eq!(loaded.duration, 480);
        assert_eq!(loaded.technique, created.technique);
        assert!(loaded.completed_at.is_none());
        assert!(db.get_session("missing").unwrap().is_none());
    }

    #[test]
    fn list_is_recent_first_and_per_actor() {
        let db = Database::open_memory().unwrap();
        let base = Utc::now() - Duration::days(3);
        for (offset, user) in [(0, None), (1, Some("u1")), (2, None)] {
            let mut new = new_session("mindfulness", user);
            new.started_at = Some(base + Duration::hours(offset));
            db.create_session(new).unwrap();
        }

        let anon = db.list_sessions(&ActorKey::anonymous()).unwrap();
        assert_eq!(anon.len(), 2);
        assert!(anon[0].started_at > anon[1].started_at);
        assert_eq!(db.list_sessions(&ActorKey::user("u1")).unwrap().len(), 1);
    }

    #[test]
    fn update_finalizes_once() {
        let db = Database::open_memory().unwrap();
        let created = db.create_session(new_session("box-breathing", None)).unwrap();
        let patch = SessionPatch {
            completion_percentage: Some(100),
            ..Default::default()
        };
        let updated = db.update_session(&created.id, &patch).unwrap().unwrap();
        assert_eq!(updated.completed_duration, 600);
        assert!(updated.is_completed);

        let reloaded = db.get_session(&created.id).unwrap().unwrap();
        assert_eq!(reloaded, updated);
        assert!(db.update_session("missing", &patch).unwrap().is_none());
    }

    #[test]
    fn delete_reports_existence() {
        let db = Database::open_memory().unwrap();
        let created = db.create_session(new_session("body-scan", None)).unwrap();
        assert!(db.delete_session(&created.id).unwrap());
        assert!(!db.delete_session(&created.id).unwrap());
    }

    #[test]
    fn settings_round_trip() {
        let db = Database::open_memory().unwrap();
        let actor = ActorKey::anonymous();
        assert_eq!(db.get_settings(&actor).unwrap().bell_sound, "tibetan");

        let saved = db
            .upsert_settings(
                &actor,
                &SettingsPatch {
                    bell_sound: Some("crystal".into()),
                    volume: Some(30),
                    ..Default::default()
                },
            )
            .unwrap();
        let loaded = db.get_settings(&actor).unwrap();
        assert_eq!(loaded.id, saved.id);
        assert_eq!(loaded.bell_sound, "crystal");
        assert_eq!(loaded.volume, 30);
        assert!(loaded.user_id.is_none());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stillroom.db");
        let id = {
            let db = Database::open_at(&path).unwrap();
            db.create_session(new_session("loving-kindness", Some("u1")))
                .unwrap()
                .id
        };
        let db = Database::open_at(&path).unwrap();
        let session = db.get_session(&id).unwrap().unwrap();
        assert_eq!(session.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn corrupt_row_is_reported() {
        let db = Database::open_memory().unwrap();
        {
            let conn = db.lock().unwrap();
            conn.execute(
                "INSERT INTO sessions (id, preset_name, preset_type, duration, started_at)
                 VALUES ('bad', 'X', 'yoga', 60, '2025-01-01T00:00:00.000Z')",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            db.get_session("bad"),
            Err(StorageError::Corrupt(_))
        ));
    }
}

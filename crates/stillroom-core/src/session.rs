//! Session records and the completion rules every writer shares.
//!
//! `completionPercentage` and `isCompleted` are never stored independently of
//! `completedDuration`: every path that finalizes a session goes through
//! [`Completion`], so the three fields always agree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::preset::{Preset, PresetType, Technique};
use crate::timer::percentage;

/// A session at or above this completion percentage counts as completed.
pub const COMPLETION_THRESHOLD: u32 = 90;

/// One completed or partial practice attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub preset_name: String,
    pub preset_type: PresetType,
    #[serde(default)]
    pub technique: Option<Technique>,
    /// Planned length in seconds.
    pub duration: u32,
    /// Seconds actually practiced.
    pub completed_duration: u32,
    pub completion_percentage: u32,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Materialize a validated [`NewSession`] under `id`.
    ///
    /// # Errors
    /// Returns the validation failure of `new`.
    pub fn create(id: String, new: NewSession, now: DateTime<Utc>) -> Result<Self, ValidationError> {
        new.validate()?;
        let completed_at = match new.completed_at {
            Some(at) => Some(at),
            None if new.is_completed => Some(now),
            None => None,
        };
        Ok(Self {
            id,
            user_id: new.user_id.filter(|u| !u.is_empty()),
            preset_name: new.preset_name,
            preset_type: new.preset_type,
            technique: new.technique,
            duration: new.duration,
            completed_duration: new.completed_duration,
            completion_percentage: new.completion_percentage,
            is_completed: new.is_completed,
            started_at: new.started_at.unwrap_or(now),
            completed_at,
        })
    }

    pub fn completion(&self) -> Completion {
        Completion {
            completed_duration: self.completed_duration,
            completion_percentage: self.completion_percentage,
            is_completed: self.is_completed,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Technique when the preset has one, otherwise the preset type.
    ///
    /// Every built-in preset names a technique, so a bare type label only
    /// comes from custom presets. It is ranked as its own bucket: custom
    /// meditations count as "meditation", never towards "mindfulness".
    pub fn practice_label(&self) -> &'static str {
        match self.technique {
            Some(technique) => technique.as_str(),
            None => self.preset_type.as_str(),
        }
    }

    /// Apply a whitelisted partial update.
    ///
    /// An empty patch is a no-op. On error the session is left unchanged.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when the patch is out of range or its
    /// completion fields disagree.
    pub fn apply_patch(&mut self, patch: &SessionPatch, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if patch.is_empty() {
            return Ok(());
        }
        match patch.resolve(self.duration)? {
            Some(completion) => {
                self.completed_duration = completion.completed_duration;
                self.completion_percentage = completion.completion_percentage;
                self.is_completed = completion.is_completed;
                self.completed_at = Some(patch.completed_at.unwrap_or(now));
            }
            None => {
                if let Some(at) = patch.completed_at {
                    self.completed_at = Some(at);
                }
            }
        }
        Ok(())
    }
}

/// The three completion fields, always mutually consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub completed_duration: u32,
    pub completion_percentage: u32,
    pub is_completed: bool,
}

impl Completion {
    pub const NONE: Completion = Completion {
        completed_duration: 0,
        completion_percentage: 0,
        is_completed: false,
    };

    /// `completedDuration = round(duration * pct / 100)`; pct is clamped to 100.
    pub fn from_percentage(duration_secs: u32, pct: u32) -> Self {
        let pct = pct.min(100);
        let completed = (u64::from(duration_secs) * u64::from(pct) + 50) / 100;
        Self {
            completed_duration: completed as u32,
            completion_percentage: pct,
            is_completed: pct >= COMPLETION_THRESHOLD,
        }
    }

    /// `completionPercentage = round(completed / duration * 100)`, clamped.
    pub fn from_elapsed(duration_secs: u32, completed_secs: u32) -> Self {
        let completed = completed_secs.min(duration_secs);
        let pct = percentage(u64::from(completed), u64::from(duration_secs));
        Self {
            completed_duration: completed,
            completion_percentage: pct,
            is_completed: pct >= COMPLETION_THRESHOLD,
        }
    }

    /// Whether `completed_secs` and `pct` describe the same progress on
    /// `duration_secs`, allowing for rounding in either direction.
    fn agrees(duration_secs: u32, completed_secs: u32, pct: u32) -> bool {
        Self::from_percentage(duration_secs, pct).completed_duration == completed_secs
            || Self::from_elapsed(duration_secs, completed_secs).completion_percentage == pct
    }
}

/// Payload for creating a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub preset_name: String,
    pub preset_type: PresetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique: Option<Technique>,
    pub duration: u32,
    #[serde(default)]
    pub completed_duration: u32,
    #[serde(default)]
    pub completion_percentage: u32,
    #[serde(default)]
    pub is_completed: bool,
    /// Kept when replaying a session recorded offline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl NewSession {
    /// A not-yet-finalized session frozen from `preset`.
    pub fn for_preset(preset: &Preset, user_id: Option<String>) -> Self {
        Self {
            user_id,
            preset_name: preset.name.clone(),
            preset_type: preset.preset_type,
            technique: preset.technique,
            duration: preset.duration_secs(),
            completed_duration: 0,
            completion_percentage: 0,
            is_completed: false,
            started_at: None,
            completed_at: None,
        }
    }

    /// Copy of a recorded session, for pushing it to another store.
    pub fn from_session(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            preset_name: session.preset_name.clone(),
            preset_type: session.preset_type,
            technique: session.technique,
            duration: session.duration,
            completed_duration: session.completed_duration,
            completion_percentage: session.completion_percentage,
            is_completed: session.is_completed,
            started_at: Some(session.started_at),
            completed_at: session.completed_at,
        }
    }

    /// # Errors
    /// Returns the first field that is missing, out of range or inconsistent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.preset_name.trim().is_empty() {
            return Err(ValidationError::MissingField("presetName".into()));
        }
        if self.duration == 0 {
            return Err(ValidationError::invalid("duration", "must be greater than zero"));
        }
        if self.completion_percentage > 100 {
            return Err(ValidationError::invalid(
                "completionPercentage",
                "must be between 0 and 100",
            ));
        }
        if self.completed_duration > self.duration {
            return Err(ValidationError::invalid(
                "completedDuration",
                "cannot exceed duration",
            ));
        }
        if !Completion::agrees(self.duration, self.completed_duration, self.completion_percentage) {
            return Err(ValidationError::Inconsistent(
                "completedDuration does not match completionPercentage".into(),
            ));
        }
        if self.is_completed != (self.completion_percentage >= COMPLETION_THRESHOLD) {
            return Err(ValidationError::Inconsistent(format!(
                "isCompleted must be true exactly when completionPercentage >= {COMPLETION_THRESHOLD}"
            )));
        }
        Ok(())
    }
}

/// Whitelisted partial update. Unknown JSON fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_percentage: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionPatch {
    /// Patch that finalizes with `completion` at `at`.
    pub fn finalize(completion: Completion, at: DateTime<Utc>) -> Self {
        Self {
            completed_duration: Some(completion.completed_duration),
            completion_percentage: Some(completion.completion_percentage),
            is_completed: Some(completion.is_completed),
            completed_at: Some(at),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Work out the completion this patch implies for a session of
    /// `duration_secs`. `None` when the patch carries no progress.
    ///
    /// # Errors
    /// Out-of-range values, disagreeing fields, or `isCompleted` sent
    /// without any progress field.
    pub fn resolve(&self, duration_secs: u32) -> Result<Option<Completion>, ValidationError> {
        if let Some(pct) = self.completion_percentage {
            if pct > 100 {
                return Err(ValidationError::invalid(
                    "completionPercentage",
                    "must be between 0 and 100",
                ));
            }
        }
        if let Some(completed) = self.completed_duration {
            if completed > duration_secs {
                return Err(ValidationError::invalid(
                    "completedDuration",
                    "cannot exceed duration",
                ));
            }
        }

        let completion = match (self.completed_duration, self.completion_percentage) {
            (Some(completed), Some(pct)) => {
                if !Completion::agrees(duration_secs, completed, pct) {
                    return Err(ValidationError::Inconsistent(
                        "completedDuration does not match completionPercentage".into(),
                    ));
                }
                Completion {
                    completed_duration: completed,
                    completion_percentage: pct,
                    is_completed: pct >= COMPLETION_THRESHOLD,
                }
            }
            (Some(completed), None) => Completion::from_elapsed(duration_secs, completed),
            (None, Some(pct)) => Completion::from_percentage(duration_secs, pct),
            (None, None) => {
                if self.is_completed.is_some() {
                    return Err(ValidationError::Inconsistent(
                        "isCompleted requires completedDuration or completionPercentage".into(),
                    ));
                }
                return Ok(None);
            }
        };

        if let Some(flag) = self.is_completed {
            if flag != completion.is_completed {
                return Err(ValidationError::Inconsistent(format!(
                    "isCompleted must be true exactly when completionPercentage >= {COMPLETION_THRESHOLD}"
                )));
            }
        }
        Ok(Some(completion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::find_preset;
    use chrono::TimeZone;

    fn ten_minute_session() -> Session {
        let preset = find_preset("box-breathing").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        Session::create("s1".into(), NewSession::for_preset(&preset, None), now).unwrap()
    }

    #[test]
    fn completion_from_percentage() {
        let full = Completion::from_percentage(600, 100);
        assert_eq!(full.completed_duration, 600);
        assert!(full.is_completed);

        let half = Completion::from_percentage(600, 50);
        assert_eq!(half.completed_duration, 300);
        assert!(!half.is_completed);

        assert!(Completion::from_percentage(600, 90).is_completed);
        assert!(!Completion::from_percentage(600, 89).is_completed);
    }

    #[test]
    fn completion_from_elapsed_rounds_and_clamps() {
        let c = Completion::from_elapsed(480, 100);
        assert_eq!(c.completion_percentage, 21);
        let over = Completion::from_elapsed(600, 900);
        assert_eq!(over.completed_duration, 600);
        assert_eq!(over.completion_percentage, 100);
    }

    #[test]
    fn created_session_is_not_finalized() {
        let s = ten_minute_session();
        assert_eq!(s.duration, 600);
        assert_eq!(s.completion(), Completion::NONE);
        assert!(!s.is_finalized());
        assert_eq!(s.practice_label(), "box");
    }

    #[test]
    fn new_session_validation() {
        let preset = find_preset("mindfulness").unwrap();
        let mut new = NewSession::for_preset(&preset, None);
        assert!(new.validate().is_ok());

        new.is_completed = true;
        assert!(matches!(new.validate(), Err(ValidationError::Inconsistent(_))));

        new.is_completed = false;
        new.duration = 0;
        assert!(new.validate().is_err());

        let mut blank = NewSession::for_preset(&preset, None);
        blank.preset_name = "  ".into();
        assert_eq!(
            blank.validate(),
            Err(ValidationError::MissingField("presetName".into()))
        );
    }

    #[test]
    fn patch_with_percentage_derives_duration() {
        let mut s = ten_minute_session();
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 10, 0).unwrap();
        let patch = SessionPatch {
            completion_percentage: Some(50),
            ..Default::default()
        };
        s.apply_patch(&patch, at).unwrap();
        assert_eq!(s.completed_duration, 300);
        assert!(!s.is_completed);
        assert_eq!(s.completed_at, Some(at));
    }

    #[test]
    fn patch_rejects_disagreeing_fields() {
        let mut s = ten_minute_session();
        let before = s.clone();
        let patch = SessionPatch {
            completed_duration: Some(100),
            completion_percentage: Some(95),
            ..Default::default()
        };
        assert!(s.apply_patch(&patch, Utc::now()).is_err());

        let lone_flag = SessionPatch {
            is_completed: Some(true),
            ..Default::default()
        };
        assert!(s.apply_patch(&lone_flag, Utc::now()).is_err());

        let wrong_flag = SessionPatch {
            completion_percentage: Some(40),
            is_completed: Some(true),
            ..Default::default()
        };
        assert!(s.apply_patch(&wrong_flag, Utc::now()).is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn empty_patch_is_noop() {
        let mut s = ten_minute_session();
        let before = s.clone();
        s.apply_patch(&SessionPatch::default(), Utc::now()).unwrap();
        assert_eq!(s, before);
    }

    #[test]
    fn patch_ignores_unknown_fields() {
        let patch: SessionPatch = serde_json::from_str(
            r#"{"completedDuration": 600, "presetName": "Hacked", "userId": "other"}"#,
        )
        .unwrap();
        let mut s = ten_minute_session();
        s.apply_patch(&patch, Utc::now()).unwrap();
        assert_eq!(s.preset_name, "Box Breathing");
        assert!(s.user_id.is_none());
        assert_eq!(s.completion_percentage, 100);
        assert!(s.is_completed);
    }

    #[test]
    fn wire_format_is_camel_case() {
        let json = serde_json::to_value(ten_minute_session()).unwrap();
        assert_eq!(json["presetType"], "breathing");
        assert_eq!(json["technique"], "box");
        assert_eq!(json["completionPercentage"], 0);
        assert!(json["completedAt"].is_null());
    }
}

//! Per-actor practice settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

fn default_interval_duration() -> u32 {
    5
}
fn default_true() -> bool {
    true
}
fn default_bell_sound() -> String {
    "tibetan".into()
}
fn default_volume() -> u32 {
    50
}
fn default_fade_duration() -> u32 {
    10
}

/// One settings record per actor key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Empty until the record has been stored.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub interval_bells: bool,
    /// Minutes between interval bells.
    #[serde(default = "default_interval_duration")]
    pub interval_duration: u32,
    #[serde(default = "default_true")]
    pub sound_enabled: bool,
    #[serde(default = "default_bell_sound")]
    pub bell_sound: String,
    /// 0..=100
    #[serde(default = "default_volume")]
    pub volume: u32,
    #[serde(default = "default_true")]
    pub visual_cues: bool,
    #[serde(default = "default_true")]
    pub auto_fade_interface: bool,
    /// Seconds of inactivity before the interface fades.
    #[serde(default = "default_fade_duration")]
    pub fade_duration: u32,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl UserSettings {
    /// Default settings for an actor that has never saved any.
    pub fn defaults_for(user_id: Option<String>) -> Self {
        Self {
            id: String::new(),
            user_id,
            interval_bells: false,
            interval_duration: default_interval_duration(),
            sound_enabled: true,
            bell_sound: default_bell_sound(),
            volume: default_volume(),
            visual_cues: true,
            auto_fade_interface: true,
            fade_duration: default_fade_duration(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_stored(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Partial settings update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_bells: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bell_sound: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_cues: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fade_interface: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fade_duration: Option<u32>,
}

impl SettingsPatch {
    /// A patch that overwrites every field with `settings`.
    pub fn replace_with(settings: &UserSettings) -> Self {
        Self {
            interval_bells: Some(settings.interval_bells),
            interval_duration: Some(settings.interval_duration),
            sound_enabled: Some(settings.sound_enabled),
            bell_sound: Some(settings.bell_sound.clone()),
            volume: Some(settings.volume),
            visual_cues: Some(settings.visual_cues),
            auto_fade_interface: Some(settings.auto_fade_interface),
            fade_duration: Some(settings.fade_duration),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// # Errors
    /// Returns the first out-of-range field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(volume) = self.volume {
            if volume > 100 {
                return Err(ValidationError::invalid("volume", "must be between 0 and 100"));
            }
        }
        if self.interval_duration == Some(0) {
            return Err(ValidationError::invalid(
                "intervalDuration",
                "must be at least one minute",
            ));
        }
        if let Some(sound) = &self.bell_sound {
            if sound.trim().is_empty() {
                return Err(ValidationError::MissingField("bellSound".into()));
            }
        }
        Ok(())
    }

    /// Validate, then copy every present field onto `settings`.
    ///
    /// # Errors
    /// Nothing is written when validation fails.
    pub fn apply(&self, settings: &mut UserSettings, now: DateTime<Utc>) -> Result<(), ValidationError> {
        self.validate()?;

        if let Some(v) = self.interval_bells {
            settings.interval_bells = v;
        }
        if let Some(v) = self.interval_duration {
            settings.interval_duration = v;
        }
        if let Some(v) = self.sound_enabled {
            settings.sound_enabled = v;
        }
        if let Some(v) = &self.bell_sound {
            settings.bell_sound = v.clone();
        }
        if let Some(v) = self.volume {
            settings.volume = v;
        }
        if let Some(v) = self.visual_cues {
            settings.visual_cues = v;
        }
        if let Some(v) = self.auto_fade_interface {
            settings.auto_fade_interface = v;
        }
        if let Some(v) = self.fade_duration {
            settings.fade_duration = v;
        }
        settings.updated_at = now;
        Ok(())
    }
}

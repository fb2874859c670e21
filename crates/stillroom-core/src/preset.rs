//! Practice presets.
//!
//! A preset is a named template (a breathing pattern or a meditation style)
//! with a default length in minutes. Sessions copy the preset fields they need
//! at start so later preset edits never rewrite history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetType {
    Breathing,
    Meditation,
}

impl PresetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PresetType::Breathing => "breathing",
            PresetType::Meditation => "meditation",
        }
    }
}

impl fmt::Display for PresetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PresetType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breathing" => Ok(PresetType::Breathing),
            "meditation" => Ok(PresetType::Meditation),
            other => Err(ValidationError::invalid(
                "presetType",
                format!("unknown preset type '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technique {
    #[serde(rename = "box")]
    Box,
    #[serde(rename = "4-7-8")]
    FourSevenEight,
    #[serde(rename = "equal")]
    Equal,
    #[serde(rename = "body-scan")]
    BodyScan,
    #[serde(rename = "loving-kindness")]
    LovingKindness,
    #[serde(rename = "mindfulness")]
    Mindfulness,
}

impl Technique {
    pub const ALL: [Technique; 6] = [
        Technique::Box,
        Technique::FourSevenEight,
        Technique::Equal,
        Technique::BodyScan,
        Technique::LovingKindness,
        Technique::Mindfulness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Technique::Box => "box",
            Technique::FourSevenEight => "4-7-8",
            Technique::Equal => "equal",
            Technique::BodyScan => "body-scan",
            Technique::LovingKindness => "loving-kindness",
            Technique::Mindfulness => "mindfulness",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technique {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Technique::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::invalid("technique", format!("unknown technique '{s}'")))
    }
}

/// A named practice template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub preset_type: PresetType,
    /// Default length in minutes.
    pub duration: u32,
    #[serde(default)]
    pub technique: Option<Technique>,
    #[serde(default)]
    pub benefits: Vec<String>,
}

impl Preset {
    pub fn new(name: &str, preset_type: PresetType, duration_min: u32) -> Self {
        Self {
            id: slug(name),
            name: name.to_string(),
            description: String::new(),
            preset_type,
            duration: duration_min,
            technique: None,
            benefits: Vec::new(),
        }
    }

    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.technique = Some(technique);
        self
    }

    /// Same preset with a different length.
    pub fn with_duration(mut self, duration_min: u32) -> Self {
        self.duration = duration_min;
        self
    }

    /// Planned length in seconds.
    pub fn duration_secs(&self) -> u32 {
        self.duration.saturating_mul(60)
    }
}

fn slug(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn builtin(
    id: &str,
    name: &str,
    description: &str,
    preset_type: PresetType,
    duration: u32,
    technique: Technique,
    benefits: &[&str],
) -> Preset {
    Preset {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        preset_type,
        duration,
        technique: Some(technique),
        benefits: benefits.iter().map(|b| b.to_string()).collect(),
    }
}

/// The presets shipped with the app.
pub fn builtin_presets() -> Vec<Preset> {
    vec![
        builtin(
            "box-breathing",
            "Box Breathing",
            "Equal 4-count breathing pattern used by military and first responders for stress relief and focus.",
            PresetType::Breathing,
            10,
            Technique::Box,
            &["Stress Relief", "Focus", "Calm"],
        ),
        builtin(
            "4-7-8-breathing",
            "4-7-8 Breathing",
            "Dr. Andrew Weil's \"natural tranquilizer\" technique for anxiety and sleep improvement.",
            PresetType::Breathing,
            8,
            Technique::FourSevenEight,
            &["Sleep", "Anxiety Relief", "Relaxation"],
        ),
        builtin(
            "body-scan",
            "Body Scan",
            "Progressive awareness meditation moving through each part of your body systematically.",
            PresetType::Meditation,
            20,
            Technique::BodyScan,
            &["Body Awareness", "Relaxation", "Stress Relief"],
        ),
        builtin(
            "loving-kindness",
            "Loving-Kindness",
            "Cultivate compassion and positive emotions toward yourself and others.",
            PresetType::Meditation,
            15,
            Technique::LovingKindness,
            &["Compassion", "Positivity", "Relationships"],
        ),
        builtin(
            "mindfulness",
            "Mindfulness",
            "Present moment awareness meditation focusing on breath and observing thoughts.",
            PresetType::Meditation,
            15,
            Technique::Mindfulness,
            &["Awareness", "Focus", "Emotional Regulation"],
        ),
    ]
}

/// Look up a built-in preset by id.
pub fn find_preset(id: &str) -> Option<Preset> {
    builtin_presets().into_iter().find(|p| p.id == id)
}

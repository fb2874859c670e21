//! Breathing-guide phase tracking.
//!
//! A breathing technique is a fixed cycle of timed phases. Given the running
//! time of a practice, [`BreathingPattern::position_at`] answers which phase is
//! active, how far into it we are and how many full cycles are behind us. Like
//! the countdown, this is derived from elapsed time so a late render never
//! drifts out of step.

use serde::{Deserialize, Serialize};

use crate::preset::Technique;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Inhale,
    Hold,
    Exhale,
}

impl PhaseKind {
    pub fn label(&self) -> &'static str {
        match self {
            PhaseKind::Inhale => "Inhale",
            PhaseKind::Hold => "Hold",
            PhaseKind::Exhale => "Exhale",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreathPhase {
    pub kind: PhaseKind,
    pub duration_ms: u64,
    pub instruction: &'static str,
}

const fn phase(kind: PhaseKind, secs: u64, instruction: &'static str) -> BreathPhase {
    BreathPhase {
        kind,
        duration_ms: secs * 1000,
        instruction,
    }
}

const BOX: [BreathPhase; 4] = [
    phase(PhaseKind::Inhale, 4, "Breathe in slowly"),
    phase(PhaseKind::Hold, 4, "Hold your breath"),
    phase(PhaseKind::Exhale, 4, "Breathe out slowly"),
    phase(PhaseKind::Hold, 4, "Hold empty"),
];

const FOUR_SEVEN_EIGHT: [BreathPhase; 3] = [
    phase(PhaseKind::Inhale, 4, "Breathe in through nose"),
    phase(PhaseKind::Hold, 7, "Hold your breath"),
    phase(PhaseKind::Exhale, 8, "Exhale through mouth"),
];

const EQUAL: [BreathPhase; 2] = [
    phase(PhaseKind::Inhale, 4, "Breathe in"),
    phase(PhaseKind::Exhale, 4, "Breathe out"),
];

/// A named cycle of breathing phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreathingPattern {
    pub name: &'static str,
    pub phases: &'static [BreathPhase],
}

/// Where in the cycle a practice currently is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BreathPosition {
    pub phase_index: usize,
    pub phase: BreathPhase,
    /// 0.0 .. 1.0 progress within the phase.
    pub progress: f64,
    pub cycles_completed: u64,
}

impl BreathingPattern {
    /// The guide for a technique, or `None` for non-breathing practices.
    pub fn for_technique(technique: Technique) -> Option<Self> {
        match technique {
            Technique::Box => Some(Self {
                name: "Box Breathing",
                phases: &BOX,
            }),
            Technique::FourSevenEight => Some(Self {
                name: "4-7-8 Breathing",
                phases: &FOUR_SEVEN_EIGHT,
            }),
            Technique::Equal => Some(Self {
                name: "Equal Breathing",
                phases: &EQUAL,
            }),
            Technique::BodyScan | Technique::LovingKindness | Technique::Mindfulness => None,
        }
    }

    pub fn cycle_ms(&self) -> u64 {
        self.phases.iter().map(|p| p.duration_ms).sum()
    }

    pub fn position_at(&self, elapsed_ms: u64) -> BreathPosition {
        let cycle = self.cycle_ms().max(1);
        let cycles_completed = elapsed_ms / cycle;
        let mut offset = elapsed_ms % cycle;

        for (phase_index, phase) in self.phases.iter().enumerate() {
            if offset < phase.duration_ms {
                return BreathPosition {
                    phase_index,
                    phase: *phase,
                    progress: offset as f64 / phase.duration_ms as f64,
                    cycles_completed,
                };
            }
            offset -= phase.duration_ms;
        }

        // Only reachable for an empty pattern.
        BreathPosition {
            phase_index: 0,
            phase: self.phases.first().copied().unwrap_or(BOX[0]),
            progress: 0.0,
            cycles_completed,
        }
    }
}

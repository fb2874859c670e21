//! Countdown engine implementation.
//!
//! The engine is a wall-clock-based state machine. It owns no thread; the
//! caller (usually [`CountdownRunner`](super::CountdownRunner)) calls `tick()`
//! periodically. Remaining time is always derived from timestamps, never from
//! the number of ticks seen, so a tick that arrives late catches up in one step.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Paused -> Running | Completed)
//! Running | Paused -> Idle   (stop / reset)
//! Completed -> Running          (start)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CountdownEngine::new();
//! engine.start(Some(600));
//! // In a loop:
//! engine.tick(); // Tick events, then one Completed
//! ```

use serde::{Deserialize, Serialize};

use super::clock::now_ms;
use crate::events::TimerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// Drift-corrected countdown.
#[derive(Debug, Clone)]
pub struct CountdownEngine {
    state: CountdownState,
    /// Full duration set by the last fresh `start`.
    total_ms: u64,
    /// Remaining time as of the last flush or tick.
    remaining_ms: u64,
    /// Elapsed running time before the current anchor.
    accumulated_ms: u64,
    /// Epoch ms of the last start/resume while running.
    anchor_epoch_ms: Option<u64>,
}

impl Default for CountdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CountdownEngine {
    pub fn new() -> Self {
        Self {
            state: CountdownState::Idle,
            total_ms: 0,
            remaining_ms: 0,
            accumulated_ms: 0,
            anchor_epoch_ms: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CountdownState::Running
    }

    pub fn total_secs(&self) -> u64 {
        self.total_ms / 1000
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    /// Ceiling of the remaining whole seconds.
    pub fn remaining_secs(&self) -> u64 {
        ceil_secs(self.remaining_ms)
    }

    /// Practice time counted so far, as of `now_ms`.
    pub fn elapsed_ms_at(&self, now_ms: u64) -> u64 {
        let live = match self.anchor_epoch_ms {
            Some(anchor) if self.is_running() => now_ms.saturating_sub(anchor),
            _ => 0,
        };
        (self.accumulated_ms + live).min(self.total_ms)
    }

    pub fn completion_percentage(&self) -> u32 {
        self.completion_percentage_at(now_ms())
    }

    /// `round(elapsed / total * 100)`, clamped to 0..=100.
    pub fn completion_percentage_at(&self, now_ms: u64) -> u32 {
        percentage(self.elapsed_ms_at(now_ms), self.total_ms)
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, duration_secs: Option<u64>) -> Option<TimerEvent> {
        self.start_at(duration_secs, now_ms())
    }

    pub fn pause(&mut self) -> Option<TimerEvent> {
        self.pause_at(now_ms())
    }

    pub fn stop(&mut self) -> Option<TimerEvent> {
        self.stop_at(now_ms())
    }

    pub fn reset(&mut self) -> Option<TimerEvent> {
        self.stop_at(now_ms())
    }

    /// Call periodically. Returns `Tick` while running and exactly one
    /// `Completed` when the remaining time reaches zero.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        self.tick_at(now_ms())
    }

    /// Start a countdown.
    ///
    /// With `None` while paused, resumes from the remaining time. With `None`
    /// while idle or completed, restarts the last full duration. A second
    /// start while running is ignored. A zero duration completes immediately.
    pub fn start_at(&mut self, duration_secs: Option<u64>, now_ms: u64) -> Option<TimerEvent> {
        match (self.state, duration_secs) {
            (CountdownState::Running, _) => None,
            (CountdownState::Paused, None) => {
                self.state = CountdownState::Running;
                self.anchor_epoch_ms = Some(now_ms);
                Some(TimerEvent::Started {
                    remaining_secs: self.remaining_secs(),
                    total_secs: self.total_secs(),
                    resumed: true,
                })
            }
            (_, requested) => {
                let secs = requested.unwrap_or_else(|| self.total_secs());
                self.total_ms = secs.saturating_mul(1000);
                self.remaining_ms = self.total_ms;
                self.accumulated_ms = 0;
                if secs == 0 {
                    self.state = CountdownState::Completed;
                    self.anchor_epoch_ms = None;
                    return Some(TimerEvent::Completed { total_secs: 0 });
                }
                self.state = CountdownState::Running;
                self.anchor_epoch_ms = Some(now_ms);
                Some(TimerEvent::Started {
                    remaining_secs: self.remaining_secs(),
                    total_secs: secs,
                    resumed: false,
                })
            }
        }
    }

    pub fn pause_at(&mut self, now_ms: u64) -> Option<TimerEvent> {
        if self.state != CountdownState::Running {
            return None;
        }
        self.flush_elapsed(now_ms);
        if self.remaining_ms == 0 {
            // The deadline passed before a tick observed it.
            return Some(self.complete());
        }
        self.state = CountdownState::Paused;
        Some(TimerEvent::Paused {
            remaining_secs: self.remaining_secs(),
        })
    }

    /// Abandon the current run. Only a running or paused countdown can
    /// stop; a completed one stays completed until the next `start`.
    pub fn stop_at(&mut self, now_ms: u64) -> Option<TimerEvent> {
        if !matches!(self.state, CountdownState::Running | CountdownState::Paused) {
            return None;
        }
        let elapsed_ms = self.elapsed_ms_at(now_ms);
        self.state = CountdownState::Idle;
        self.anchor_epoch_ms = None;
        self.accumulated_ms = 0;
        self.remaining_ms = self.total_ms;
        Some(TimerEvent::Stopped {
            remaining_secs: self.remaining_secs(),
            elapsed_ms,
        })
    }

    pub fn tick_at(&mut self, now_ms: u64) -> Option<TimerEvent> {
        if self.state != CountdownState::Running {
            return None;
        }
        let anchor = self.anchor_epoch_ms?;
        let elapsed = self.accumulated_ms + now_ms.saturating_sub(anchor);
        // A clock stepping backwards must never give time back.
        self.remaining_ms = self.remaining_ms.min(self.total_ms.saturating_sub(elapsed));
        if self.remaining_ms == 0 {
            return Some(self.complete());
        }
        Some(TimerEvent::Tick {
            remaining_secs: self.remaining_secs(),
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Fold the running interval into `accumulated_ms` and drop the anchor.
    fn flush_elapsed(&mut self, now_ms: u64) {
        if let Some(anchor) = self.anchor_epoch_ms.take() {
            self.accumulated_ms += now_ms.saturating_sub(anchor);
            self.remaining_ms = self
                .remaining_ms
                .min(self.total_ms.saturating_sub(self.accumulated_ms));
        }
    }

    fn complete(&mut self) -> TimerEvent {
        self.state = CountdownState::Completed;
        self.anchor_epoch_ms = None;
        self.accumulated_ms = self.total_ms;
        self.remaining_ms = 0;
        TimerEvent::Completed {
            total_secs: self.total_secs(),
        }
    }
}

fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}

pub(crate) fn percentage(part: u64, whole: u64) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round().clamp(0.0, 100.0) as u32
}

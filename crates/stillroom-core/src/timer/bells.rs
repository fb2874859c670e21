//! Interval bells rung during a practice.

use crate::settings::UserSettings;

/// Bell schedule for one practice: a bell every `every_secs` of practice
/// time, never at the start and never on the final second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalBells {
    every_secs: u64,
    total_secs: u64,
}

impl IntervalBells {
    pub fn new(every_secs: u64, total_secs: u64) -> Option<Self> {
        (every_secs > 0).then_some(Self {
            every_secs,
            total_secs,
        })
    }

    /// Schedule from user settings; `None` when sound or interval bells are off.
    pub fn from_settings(settings: &UserSettings, total_secs: u64) -> Option<Self> {
        if !settings.sound_enabled || !settings.interval_bells {
            return None;
        }
        Self::new(u64::from(settings.interval_duration) * 60, total_secs)
    }

    pub fn every_secs(&self) -> u64 {
        self.every_secs
    }

    /// Number of bells whose time falls in `(prev_elapsed, elapsed]`.
    ///
    /// A consumer that was suspended and reports a wide window still gets one
    /// bell per boundary crossed.
    pub fn bells_between(&self, prev_elapsed_secs: u64, elapsed_secs: u64) -> u64 {
        let last_allowed = self.total_secs.saturating_sub(1);
        let upper = elapsed_secs.min(last_allowed);
        if upper <= prev_elapsed_secs {
            return 0;
        }
        upper / self.every_secs - prev_elapsed_secs / self.every_secs
    }

    /// Elapsed time of the next bell after `elapsed_secs`, if one remains.
    pub fn next_bell_after(&self, elapsed_secs: u64) -> Option<u64> {
        let next = (elapsed_secs / self.every_secs + 1) * self.every_secs;
        (next < self.total_secs).then_some(next)
    }
}

use serde::{Deserialize, Serialize};

/// Every countdown state change produces a TimerEvent.
///
/// A consumer sees `Started`, then any mix of `Tick`/`Paused`/`Started`
/// (resume), and at most one terminal `Completed` or `Stopped` per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    /// Countdown began or resumed.
    Started {
        remaining_secs: u64,
        total_secs: u64,
        resumed: bool,
    },
    /// Periodic update carrying the ceiling of the remaining whole seconds.
    Tick { remaining_secs: u64 },
    Paused { remaining_secs: u64 },
    /// Stopped or reset; remaining time restored to the full duration.
    /// `elapsed_ms` is the practice time counted before the stop.
    Stopped { remaining_secs: u64, elapsed_ms: u64 },
    /// Remaining time reached zero while running.
    Completed { total_secs: u64 },
}

impl TimerEvent {
    /// Remaining whole seconds carried by the event, if any.
    pub fn remaining_secs(&self) -> Option<u64> {
        match *self {
            TimerEvent::Started { remaining_secs, .. }
            | TimerEvent::Tick { remaining_secs }
            | TimerEvent::Paused { remaining_secs }
            | TimerEvent::Stopped { remaining_secs, .. } => Some(remaining_secs),
            TimerEvent::Completed { .. } => Some(0),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TimerEvent::Completed { .. } | TimerEvent::Stopped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(TimerEvent::Tick { remaining_secs: 42 }).unwrap();
        assert_eq!(json["type"], "tick");
        assert_eq!(json["remaining_secs"], 42);
    }

    #[test]
    fn terminal_events() {
        assert!(TimerEvent::Completed { total_secs: 60 }.is_terminal());
        assert!(TimerEvent::Stopped {
            remaining_secs: 60,
            elapsed_ms: 12_000
        }
        .is_terminal());
        assert!(!TimerEvent::Paused { remaining_secs: 3 }.is_terminal());
        assert_eq!(TimerEvent::Completed { total_secs: 60 }.remaining_secs(), Some(0));
    }
}

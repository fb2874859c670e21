//! Session history statistics.
//!
//! Everything here is derived: stats are never persisted and are recomputed
//! from the full session list on every request. Calendar questions (which
//! day a session fell on, where the week starts) are answered in the time
//! zone of the `now` the aggregator was built with.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// Aggregated view of an actor's completed sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: u32,
    pub total_minutes: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub this_week: u32,
    pub favorite_type: String,
    pub last_session: String,
}

impl SessionStats {
    /// Stats for an empty history.
    pub fn empty() -> Self {
        Self {
            total_sessions: 0,
            total_minutes: 0,
            current_streak: 0,
            longest_streak: 0,
            this_week: 0,
            favorite_type: "None".into(),
            last_session: "Never".into(),
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::empty()
    }
}

/// Computes [`SessionStats`] as of a fixed instant.
#[derive(Debug, Clone)]
pub struct StatsAggregator<Tz: TimeZone> {
    now: DateTime<Tz>,
}

impl StatsAggregator<Local> {
    /// Aggregate against the current time in the local zone.
    pub fn local() -> Self {
        Self::at(Local::now())
    }
}

impl<Tz: TimeZone> StatsAggregator<Tz> {
    pub fn at(now: DateTime<Tz>) -> Self {
        Self { now }
    }

    fn local_date(&self, at: &DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.now.timezone()).date_naive()
    }

    pub fn aggregate(&self, sessions: &[Session]) -> SessionStats {
        let completed: Vec<&Session> = sessions.iter().filter(|s| s.is_completed).collect();
        if completed.is_empty() {
            return SessionStats::empty();
        }

        let seconds: u64 = completed.iter().map(|s| u64::from(s.completed_duration)).sum();
        let days: BTreeSet<NaiveDate> = completed
            .iter()
            .map(|s| self.local_date(&s.started_at))
            .collect();
        let today = self.now.date_naive();

        SessionStats {
            total_sessions: completed.len() as u32,
            total_minutes: ((seconds + 30) / 60) as u32,
            current_streak: current_streak(&days, today),
            longest_streak: longest_streak(&days),
            this_week: self.this_week(&completed, today),
            favorite_type: favorite_type(&completed),
            last_session: self.last_session(&completed),
        }
    }

    fn this_week(&self, completed: &[&Session], today: NaiveDate) -> u32 {
        let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
        completed
            .iter()
            .filter(|s| self.local_date(&s.started_at) >= week_start)
            .count() as u32
    }

    fn last_session(&self, completed: &[&Session]) -> String {
        let Some(latest) = completed.iter().map(|s| s.started_at).max() else {
            return "Never".into();
        };
        let hours = (self.now.with_timezone(&Utc) - latest).num_hours();
        let days = hours / 24;

        if hours < 1 {
            "Just now".into()
        } else if hours < 24 {
            format!("{hours} hour{} ago", plural(hours))
        } else if days < 7 {
            format!("{days} day{} ago", plural(days))
        } else {
            let date = self.local_date(&latest);
            format!("{}/{}/{}", date.month(), date.day(), date.year())
        }
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Consecutive days ending today, or yesterday when today has none yet.
fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let yesterday = today.pred_opt();
    let mut cursor = if days.contains(&today) {
        Some(today)
    } else if yesterday.is_some_and(|d| days.contains(&d)) {
        yesterday
    } else {
        return 0;
    };

    let mut streak = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        streak += 1;
        cursor = day.pred_opt();
    }
    streak
}

fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in days {
        run = match previous {
            Some(prev) if prev.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

/// Most frequent practice label; ties go to the label seen first.
fn favorite_type(completed: &[&Session]) -> String {
    let mut counts: Vec<(&'static str, u32)> = Vec::new();
    for session in completed {
        let label = session.practice_label();
        match counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(&str, u32)> = None;
    for (label, n) in counts {
        if best.is_none_or(|(_, top)| n > top) {
            best = Some((label, n));
        }
    }
    best.map_or_else(|| "None".to_string(), |(label, _)| label.to_string())
}

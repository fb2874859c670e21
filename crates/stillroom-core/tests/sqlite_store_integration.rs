//! Integration tests for the SQLite store behind a SessionManager.

use std::sync::Arc;

use chrono::{Duration, Local, Utc};
use stillroom_core::actor::ActorKey;
use stillroom_core::settings::SettingsPatch;
use stillroom_core::storage::SessionStore;
use stillroom_core::{find_preset, Database, NewSession, SessionManager, StatsAggregator};
use tempfile::TempDir;

#[test]
fn test_history_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stillroom.db");

    {
        let db = Arc::new(Database::open_at(&path).unwrap());
        assert_eq!(db.path(), Some(path.as_path()));
        let mut manager = SessionManager::new(db, ActorKey::user("u1"));
        for (preset_id, pct) in [("box-breathing", 100), ("mindfulness", 95), ("body-scan", 30)] {
            let preset = find_preset(preset_id).unwrap();
            let handle = manager.begin(&preset).unwrap();
            assert!(manager.finalize(&handle.id, pct).session().is_some());
        }
        manager
            .save_settings(&SettingsPatch {
                interval_bells: Some(true),
                interval_duration: Some(2),
                ..Default::default()
            })
            .unwrap();
    }

    let db = Arc::new(Database::open_at(&path).unwrap());
    let mut manager = SessionManager::new(db, ActorKey::user("u1"));
    let history = manager.history();
    assert_eq!(history.len(), 3);
    assert!(history.windows(2).all(|w| w[0].started_at >= w[1].started_at));

    let stats = manager.stats_with(&StatsAggregator::at(Local::now()));
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.current_streak, 1);

    let settings = manager.settings();
    assert!(settings.interval_bells);
    assert_eq!(settings.interval_duration, 2);
}

#[test]
fn test_streak_over_backfilled_days() {
    let db = Database::open_memory().unwrap();
    let preset = find_preset("box-breathing").unwrap();
    let now = Local::now();

    for days_back in [0, 1, 2, 5, 6] {
        let mut new = NewSession::for_preset(&preset, None);
        new.completed_duration = 600;
        new.completion_percentage = 100;
        new.is_completed = true;
        new.started_at = Some((now - Duration::days(days_back)).with_timezone(&Utc));
        db.create_session(new).unwrap();
    }

    let sessions = db.list_sessions(&ActorKey::anonymous()).unwrap();
    let stats = StatsAggregator::at(now).aggregate(&sessions);
    assert_eq!(stats.current_streak, 3);
    assert_eq!(stats.longest_streak, 3);
    assert_eq!(stats.total_minutes, 50);
}

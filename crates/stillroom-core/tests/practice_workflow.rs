//! Integration tests for a full practice.
//!
//! Tests the workflow from starting a countdown to the recorded session and
//! the derived stats, including the degraded path where the store is down.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Utc};
use stillroom_core::actor::ActorKey;
use stillroom_core::error::StorageError;
use stillroom_core::settings::SettingsPatch;
use stillroom_core::storage::SessionStore;
use stillroom_core::timer::ManualClock;
use stillroom_core::{
    find_preset, CountdownRunner, FinalizeOutcome, MemoryStore, NewSession, Session,
    SessionManager, SessionPatch, StatsAggregator, TimerEvent, UserSettings,
};

/// A store whose backend is unreachable.
struct DownStore;

impl SessionStore for DownStore {
    fn create_session(&self, _new: NewSession) -> Result<Session, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
    fn get_session(&self, _id: &str) -> Result<Option<Session>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
    fn list_sessions(&self, _actor: &ActorKey) -> Result<Vec<Session>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
    fn update_session(&self, _id: &str, _patch: &SessionPatch) -> Result<Option<Session>, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
    fn delete_session(&self, _id: &str) -> Result<bool, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
    fn get_settings(&self, _actor: &ActorKey) -> Result<UserSettings, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
    fn upsert_settings(&self, _actor: &ActorKey, _patch: &SettingsPatch) -> Result<UserSettings, StorageError> {
        Err(StorageError::Unavailable("connection refused".into()))
    }
}

const WAIT: Duration = Duration::from_secs(5);

/// Drive a runner on a manual clock through `total_secs` and return the
/// terminal event.
fn run_to_end(total_secs: u64) -> TimerEvent {
    let clock = ManualClock::new(0);
    let (runner, events) =
        CountdownRunner::spawn_with_clock(Arc::new(clock.clone()), Duration::from_millis(5))
            .unwrap();
    runner.start(Some(total_secs)).unwrap();
    assert!(matches!(
        events.recv_timeout(WAIT).unwrap(),
        TimerEvent::Started { .. }
    ));

    clock.advance_ms(total_secs * 1000);
    loop {
        let event = events.recv_timeout(WAIT).unwrap();
        if event.is_terminal() {
            return event;
        }
    }
}

#[test]
fn test_full_practice_is_recorded_and_counted() {
    let store = Arc::new(MemoryStore::new());
    let mut manager = SessionManager::new(store.clone(), ActorKey::user("u1"));
    let preset = find_preset("box-breathing").unwrap();

    let handle = manager.begin(&preset).unwrap();
    assert!(handle.persisted);

    let terminal = run_to_end(u64::from(preset.duration_secs()));
    assert_eq!(terminal, TimerEvent::Completed { total_secs: 600 });

    let FinalizeOutcome::Persisted(session) = manager.finalize(&handle.id, 100) else {
        panic!("expected the store to accept the session");
    };
    assert_eq!(session.completed_duration, 600);
    assert!(session.is_completed);

    let stats = manager.stats_with(&StatsAggregator::at(Local::now()));
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.total_minutes, 10);
    assert_eq!(stats.current_streak, 1);
    assert_eq!(stats.favorite_type, "box");
    assert_eq!(stats.last_session, "Just now");
}

#[test]
fn test_store_failure_still_completes_practice() {
    let mut manager = SessionManager::new(Arc::new(DownStore), ActorKey::anonymous());
    let preset = find_preset("4-7-8-breathing").unwrap();

    let handle = manager.begin(&preset).unwrap();
    assert!(!handle.persisted);
    assert!(handle.id.starts_with("local-"));

    let terminal = run_to_end(u64::from(preset.duration_secs()));
    assert_eq!(terminal, TimerEvent::Completed { total_secs: 480 });

    let outcome = manager.finalize(&handle.id, 100);
    assert!(matches!(outcome, FinalizeOutcome::Offline(_)));

    // Reads fail open.
    assert_eq!(manager.history().len(), 1);
    assert_eq!(manager.stats().total_sessions, 0);
    assert_eq!(manager.settings().bell_sound, "tibetan");
    assert_eq!(manager.reconcile(), 0);
}

#[test]
fn test_stopped_practice_is_partial() {
    let store = Arc::new(MemoryStore::new());
    let mut manager = SessionManager::new(store.clone(), ActorKey::anonymous());
    let preset = find_preset("mindfulness").unwrap();
    let handle = manager.begin(&preset).unwrap();

    let clock = ManualClock::new(0);
    let (runner, events) =
        CountdownRunner::spawn_with_clock(Arc::new(clock.clone()), Duration::from_millis(5))
            .unwrap();
    runner.start(Some(u64::from(preset.duration_secs()))).unwrap();
    assert!(matches!(
        events.recv_timeout(WAIT).unwrap(),
        TimerEvent::Started { .. }
    ));
    clock.advance_ms(450_000);
    runner.stop().unwrap();

    let elapsed_ms = loop {
        if let TimerEvent::Stopped { elapsed_ms, .. } = events.recv_timeout(WAIT).unwrap() {
            break elapsed_ms;
        }
    };
    assert_eq!(elapsed_ms, 450_000);

    let outcome = manager.finalize_elapsed(&handle.id, (elapsed_ms / 1000) as u32);
    let session = outcome.session().unwrap();
    assert_eq!(session.completion_percentage, 50);
    assert!(!session.is_completed);

    let stats = manager.stats();
    assert_eq!(stats.total_sessions, 0);
    assert_eq!(manager.history().len(), 1);
    assert!(store.get_session(&handle.id).unwrap().unwrap().completed_at.unwrap() <= Utc::now());
}

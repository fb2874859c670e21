//! # Stillroom Core Library
//!
//! This library provides the core logic for the Stillroom meditation and
//! breathing companion. Both the terminal client and the REST server are thin
//! layers over the same core library.
//!
//! ## Architecture
//!
//! - **Countdown Engine**: A wall-clock-based state machine, driven on its own
//!   thread by [`CountdownRunner`] so a stalled consumer never stalls the timer
//! - **Session Recorder**: Persists one record per practice, degrading to a
//!   client-side record when the store is unreachable
//! - **Statistics**: Streaks, weekly count and favorite practice, derived from
//!   session history on demand
//! - **Storage**: In-memory, SQLite and HTTP implementations of one
//!   [`SessionStore`] trait, plus TOML-based configuration
//!
//! ## Key Components
//!
//! - [`CountdownEngine`]: Core countdown state machine
//! - [`SessionManager`]: Recorder, history, stats and settings for one actor
//! - [`StatsAggregator`]: Session history statistics
//! - [`Config`]: Application configuration management

pub mod actor;
pub mod error;
pub mod events;
pub mod manager;
pub mod preset;
pub mod recorder;
pub mod session;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod timer;

pub use actor::{load_or_create_anonymous_id_at, ActorKey};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::TimerEvent;
pub use manager::SessionManager;
pub use preset::{builtin_presets, find_preset, Preset, PresetType, Technique};
pub use recorder::{FinalizeOutcome, SessionHandle, SessionRecorder};
pub use session::{Completion, NewSession, Session, SessionPatch, COMPLETION_THRESHOLD};
pub use settings::{SettingsPatch, UserSettings};
pub use stats::{SessionStats, StatsAggregator};
pub use storage::{ApiStore, Config, Database, MemoryStore, SessionStore};
pub use timer::{CountdownEngine, CountdownRunner, CountdownState};

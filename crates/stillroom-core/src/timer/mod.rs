mod bells;
mod breathing;
mod clock;
mod engine;
mod runner;

pub use bells::IntervalBells;
pub use breathing::{BreathPhase, BreathPosition, BreathingPattern, PhaseKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{CountdownEngine, CountdownState};
pub use runner::{CountdownHandle, CountdownRunner, RunnerStopped, DEFAULT_TICK_INTERVAL};

pub(crate) use engine::percentage;

//! Countdown on a dedicated thread.
//!
//! The runner owns a [`CountdownEngine`] on its own thread so that a consumer
//! which stops polling (a suspended terminal, a busy UI loop) never stalls
//! the countdown. Commands travel in over one channel and [`TimerEvent`]s come
//! back over another; no timer state is shared.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::engine::CountdownEngine;
use crate::events::TimerEvent;

/// Default tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
enum Command {
    Start(Option<u64>),
    Pause,
    Stop,
    Reset,
    Shutdown,
}

/// The runner thread has exited; commands can no longer be delivered.
#[derive(Debug, thiserror::Error)]
#[error("countdown runner has shut down")]
pub struct RunnerStopped;

/// Cloneable command side of a running countdown.
#[derive(Debug, Clone)]
pub struct CountdownHandle {
    commands: Sender<Command>,
}

impl CountdownHandle {
    /// Fresh start with `Some(secs)`; resume (or restart) with `None`.
    pub fn start(&self, duration_secs: Option<u64>) -> Result<(), RunnerStopped> {
        self.send(Command::Start(duration_secs))
    }

    pub fn pause(&self) -> Result<(), RunnerStopped> {
        self.send(Command::Pause)
    }

    pub fn stop(&self) -> Result<(), RunnerStopped> {
        self.send(Command::Stop)
    }

    pub fn reset(&self) -> Result<(), RunnerStopped> {
        self.send(Command::Reset)
    }

    fn send(&self, command: Command) -> Result<(), RunnerStopped> {
        self.commands.send(command).map_err(|_| RunnerStopped)
    }
}

/// Owner of the countdown thread. Dropping it stops the thread.
#[derive(Debug)]
pub struct CountdownRunner {
    handle: CountdownHandle,
    thread: Option<JoinHandle<()>>,
}

impl CountdownRunner {
    /// Spawn a runner on the system clock.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn(tick_interval: Duration) -> std::io::Result<(Self, Receiver<TimerEvent>)> {
        Self::spawn_with_clock(Arc::new(SystemClock), tick_interval)
    }

    /// Spawn a runner reading time from `clock`.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn_with_clock(
        clock: Arc<dyn Clock>,
        tick_interval: Duration,
    ) -> std::io::Result<(Self, Receiver<TimerEvent>)> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let tick_interval = tick_interval.max(Duration::from_millis(1));

        let thread = thread::Builder::new()
            .name("stillroom-countdown".into())
            .spawn(move || run_loop(clock.as_ref(), tick_interval, command_rx, event_tx))?;

        Ok((
            Self {
                handle: CountdownHandle {
                    commands: command_tx,
                },
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    pub fn handle(&self) -> CountdownHandle {
        self.handle.clone()
    }

    pub fn start(&self, duration_secs: Option<u64>) -> Result<(), RunnerStopped> {
        self.handle.start(duration_secs)
    }

    pub fn pause(&self) -> Result<(), RunnerStopped> {
        self.handle.pause()
    }

    pub fn stop(&self) -> Result<(), RunnerStopped> {
        self.handle.stop()
    }

    pub fn reset(&self) -> Result<(), RunnerStopped> {
        self.handle.reset()
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let _ = self.handle.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CountdownRunner {
    fn drop(&mut self) {
        self.join();
    }
}

fn run_loop(
    clock: &dyn Clock,
    tick_interval: Duration,
    commands: Receiver<Command>,
    events: Sender<TimerEvent>,
) {
    let mut engine = CountdownEngine::new();
    let mut next_tick: Option<Instant> = None;
    debug!(interval_ms = tick_interval.as_millis() as u64, "countdown runner started");

    loop {
        let received = match next_tick {
            Some(deadline) => {
                commands.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let was_running = engine.is_running();
        let now = clock.now_ms();
        let event = match received {
            Ok(Command::Start(duration)) => engine.start_at(duration, now),
            Ok(Command::Pause) => engine.pause_at(now),
            Ok(Command::Stop) | Ok(Command::Reset) => engine.stop_at(now),
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                // Keep a fixed cadence, but never replay ticks missed while
                // this thread was not scheduled.
                let scheduled = next_tick.map(|d| d + tick_interval);
                let floor = Instant::now();
                next_tick = scheduled.map(|d| d.max(floor));
                engine.tick_at(now)
            }
        };

        next_tick = if !engine.is_running() {
            None
        } else if !was_running || next_tick.is_none() {
            Some(Instant::now() + tick_interval)
        } else {
            next_tick
        };

        if let Some(event) = event {
            trace!(?event, "countdown event");
            if events.send(event).is_err() {
                debug!("countdown consumer went away");
                break;
            }
        }
    }

    debug!("countdown runner stopped");
}

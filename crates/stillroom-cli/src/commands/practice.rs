//! Foreground practice: countdown, breathing guide, bells and recording.
//!
//! Every event is printed as one JSON line on stdout. Typing `p` + Enter
//! pauses or resumes, `s` + Enter stops early.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use clap::Args;
use serde_json::json;
use stillroom_core::timer::{BreathingPattern, IntervalBells};
use stillroom_core::{find_preset, Config, CountdownRunner, FinalizeOutcome, TimerEvent};
use tracing::debug;

use super::open_manager;

const EVENT_POLL: Duration = Duration::from_millis(50);

#[derive(Args)]
pub struct PracticeArgs {
    /// Preset ID (see `presets list`)
    preset: String,
    /// Practice length in minutes, overriding the preset
    #[arg(long, short)]
    minutes: Option<u32>,
}

enum Input {
    TogglePause,
    Stop,
}

/// Read control lines from stdin until EOF.
fn spawn_input_reader() -> Receiver<Input> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let input = match line.trim() {
                "p" | "pause" | "resume" => Input::TogglePause,
                "s" | "q" | "stop" => Input::Stop,
                _ => continue,
            };
            if tx.send(input).is_err() {
                break;
            }
        }
    });
    rx
}

pub fn run(args: PracticeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let mut preset =
        find_preset(&args.preset).ok_or_else(|| format!("unknown preset: {}", args.preset))?;
    if let Some(minutes) = args.minutes {
        preset = preset.with_duration(minutes);
    }

    let mut manager = open_manager()?;
    let settings = manager.settings();
    let total_secs = u64::from(preset.duration_secs());
    let bells = IntervalBells::from_settings(&settings, total_secs);
    let pattern = preset.technique.and_then(BreathingPattern::for_technique);

    let handle = manager.begin(&preset)?;
    println!(
        "{}",
        json!({ "type": "session", "id": &handle.id, "persisted": handle.persisted })
    );

    let (runner, events) = CountdownRunner::spawn(config.tick_interval())?;
    let input = spawn_input_reader();
    runner.start(Some(total_secs))?;
    eprintln!("p + Enter to pause or resume, s + Enter to stop");

    let mut running = false;
    let mut last_remaining = None;
    let mut last_phase = None;
    let mut prev_elapsed = 0;

    let outcome = loop {
        match input.try_recv() {
            Ok(Input::TogglePause) if running => runner.pause()?,
            Ok(Input::TogglePause) => runner.start(None)?,
            Ok(Input::Stop) => runner.stop()?,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }

        let event = match events.recv_timeout(EVENT_POLL) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                return Err("countdown thread exited unexpectedly".into());
            }
        };

        match event {
            TimerEvent::Started { .. } => running = true,
            TimerEvent::Paused { .. } => running = false,
            TimerEvent::Tick { remaining_secs } => {
                // Ticks arrive several times a second; report whole seconds only.
                if last_remaining == Some(remaining_secs) {
                    continue;
                }
                last_remaining = Some(remaining_secs);
                let elapsed = total_secs.saturating_sub(remaining_secs);

                if let Some(bells) = bells {
                    for _ in 0..bells.bells_between(prev_elapsed, elapsed) {
                        println!("{}", json!({ "type": "bell", "elapsedSecs": elapsed }));
                    }
                }
                prev_elapsed = elapsed;

                if let Some(pattern) = pattern {
                    let position = pattern.position_at(elapsed * 1000);
                    if last_phase != Some(position.phase_index) {
                        last_phase = Some(position.phase_index);
                        println!(
                            "{}",
                            json!({
                                "type": "breath",
                                "phase": position.phase.kind.label(),
                                "instruction": position.phase.instruction,
                                "cycle": position.cycles_completed + 1,
                            })
                        );
                    }
                }
            }
            TimerEvent::Stopped { .. } | TimerEvent::Completed { .. } => {}
        }
        println!("{}", serde_json::to_string(&event)?);

        match event {
            TimerEvent::Completed { .. } => break manager.finalize(&handle.id, 100),
            TimerEvent::Stopped { elapsed_ms, .. } => {
                let elapsed_secs = u32::try_from(elapsed_ms / 1000).unwrap_or(u32::MAX);
                break manager.finalize_elapsed(&handle.id, elapsed_secs);
            }
            _ => {}
        }
    };
    runner.shutdown();

    match outcome {
        FinalizeOutcome::Persisted(session) => {
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        FinalizeOutcome::Offline(session) => {
            // Last chance before the process exits and the local record is gone.
            if manager.reconcile() == 0 {
                eprintln!("session store unreachable; this session was not saved");
            }
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        FinalizeOutcome::Failed(message) => {
            return Err(format!("failed to record session: {message}").into());
        }
        FinalizeOutcome::Ignored => {
            debug!(id = %handle.id, "finalize ignored");
        }
    }
    Ok(())
}

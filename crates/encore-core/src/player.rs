//! Wall-clock driver for a session's scheduler
//!
//! The scheduler only moves when told to; the player maps elapsed real time
//! onto it, sleeping until the next deadline in short slices so an external
//! stop flag is noticed promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::executor::ActionSink;
use crate::scheduler::{Notice, Scheduler};
use crate::session::Session;

#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Longest single sleep between stop-flag checks
    pub poll_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

pub struct Player {
    config: PlayerConfig,
}

impl Player {
    pub fn new() -> Self {
        Self::with_config(PlayerConfig::default())
    }

    pub fn with_config(config: PlayerConfig) -> Self {
        Self { config }
    }

    /// Run until the scheduler goes idle or `stop` is raised. Every notice is
    /// handed to `on_notice`, including a final `Stopped` on interruption.
    pub fn run<S: ActionSink>(
        &self,
        scheduler: &mut Scheduler<S>,
        stop: &AtomicBool,
        mut on_notice: impl FnMut(Notice),
    ) {
        let origin = scheduler.now();
        let started = Instant::now();

        while scheduler.is_running() {
            if stop.load(Ordering::SeqCst) {
                if let Ok(report) = scheduler.stop() {
                    on_notice(Notice::Stopped {
                        runs: report.runs_completed,
                        revoked: report.revoked,
                    });
                }
                break;
            }

            let elapsed = origin.saturating_add(started.elapsed());
            let wait = scheduler
                .next_deadline()
                .map(|d| d.saturating_sub(elapsed))
                .unwrap_or(self.config.poll_interval)
                .min(self.config.poll_interval);
            if !wait.is_zero() {
                std::thread::sleep(wait);
            }

            for notice in scheduler.advance(origin.saturating_add(started.elapsed())) {
                debug!(?notice, "playback notice");
                on_notice(notice);
            }
        }
    }

    pub fn run_session<S: ActionSink>(
        &self,
        session: &mut Session<S>,
        stop: &AtomicBool,
        on_notice: impl FnMut(Notice),
    ) {
        self.run(session.scheduler_mut(), stop, on_notice)
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

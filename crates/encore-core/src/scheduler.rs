//! Playback scheduler
//!
//! Turns a frozen event track plus a play request into deferred actions on a
//! [`TimerQueue`], and tracks run state through an explicit phase machine:
//!
//! | phase              | input        | next               |
//! |--------------------|--------------|--------------------|
//! | Idle               | Start(mode)  | Running(mode)      |
//! | Running(_)         | Start(_)     | rejected           |
//! | Running(_)         | RunElapsed   | unchanged          |
//! | Running(Infinite)  | Chain        | Running(Infinite)  |
//! | Running(Finite)    | Complete     | Idle               |
//! | Running(_)         | Cancel       | Idle               |
//! | Idle               | Cancel       | rejected           |
//!
//! Any other pair is a stale marker and is ignored.
//!
//! All delays are wall-clock: an event at offset `t` in a run based at `b`
//! fires at `b + t / speed`. Gaps between runs are not scaled by speed.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::duration::total_duration;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::executor::{ActionSink, Executor, Release, ReplayStats};
use crate::timer::{secs, TimerQueue};

/// Shortest interval between chained runs of an infinite loop
pub const MIN_CYCLE: Duration = Duration::from_millis(1);

/// How many times to play the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Repeat {
    Times(u32),
    Infinite,
}

impl Repeat {
    pub fn mode(self) -> RepeatMode {
        match self {
            Repeat::Times(_) => RepeatMode::Finite,
            Repeat::Infinite => RepeatMode::Infinite,
        }
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Times(1)
    }
}

impl FromStr for Repeat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "infinite" | "inf" | "loop" => Ok(Repeat::Infinite),
            other => match other.parse::<u32>() {
                Ok(n) if n > 0 => Ok(Repeat::Times(n)),
                _ => Err(Error::invalid_request(format!(
                    "repeat must be a positive integer or \"infinite\", got {:?}",
                    s
                ))),
            },
        }
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repeat::Times(n) => write!(f, "{}", n),
            Repeat::Infinite => write!(f, "infinite"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayRequest {
    pub repeat: Repeat,
    /// Idle seconds between consecutive runs
    pub gap: f64,
}

impl PlayRequest {
    pub fn new(repeat: Repeat, gap: f64) -> Self {
        Self { repeat, gap }
    }

    pub fn once() -> Self {
        Self::new(Repeat::Times(1), 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        if self.repeat == Repeat::Times(0) {
            return Err(Error::invalid_request("repeat count must be at least 1"));
        }
        if !self.gap.is_finite() || self.gap < 0.0 {
            return Err(Error::invalid_request(format!(
                "gap must be a non-negative number of seconds, got {}",
                self.gap
            )));
        }
        Ok(())
    }
}

impl Default for PlayRequest {
    fn default() -> Self {
        Self::once()
    }
}

pub fn validate_speed(speed: f64) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(Error::invalid_request(format!(
            "speed must be a positive number, got {}",
            speed
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RepeatMode {
    Finite,
    Infinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    Running(RepeatMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Start(RepeatMode),
    RunElapsed,
    Chain,
    Complete,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Enter(Phase),
    Stay,
    Reject,
    Ignore,
}

impl Phase {
    /// Transition table for the playback state machine
    pub fn on(self, input: Input) -> Transition {
        use Input::*;
        use Phase::*;
        use RepeatMode::*;

        match (self, input) {
            (Idle, Start(mode)) => Transition::Enter(Running(mode)),
            (Running(_), Start(_)) => Transition::Reject,
            (Running(_), RunElapsed) => Transition::Stay,
            (Running(Infinite), Chain) => Transition::Enter(Running(Infinite)),
            (Running(Finite), Complete) => Transition::Enter(Idle),
            (Running(_), Cancel) => Transition::Enter(Idle),
            (Idle, Cancel) => Transition::Reject,
            _ => Transition::Ignore,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, Phase::Running(_))
    }
}

/// Deferred work registered on the timer queue
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Apply event `index` of the active track
    Apply { index: usize },
    /// Button-up half of a hold
    Release(Release),
    /// Run `run` has fully elapsed
    RunEnd { run: u64 },
    /// Infinite mode: start the next run
    Chain,
    /// Finite mode: every run has elapsed
    Complete { runs: u32 },
}

/// Progress reported by [`Scheduler::advance`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "notice", rename_all = "camelCase")]
pub enum Notice {
    RunFinished { completed: u64 },
    Completed { runs: u32 },
    Stopped { runs: u64, revoked: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackPlan {
    pub repeat: Repeat,
    pub speed: f64,
    pub gap: f64,
    /// Wall-clock seconds of one run
    pub run_duration: f64,
    /// Wall-clock seconds until completion, `None` when looping
    pub total_duration: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReport {
    pub runs_completed: u64,
    pub revoked: usize,
}

/// All mutable playback state, owned by one [`Scheduler`]
#[derive(Debug, Clone)]
pub struct SchedulerState {
    pub phase: Phase,
    /// Speed used by the next `play`
    pub speed: f64,
    /// Speed of the playback in progress
    pub active_speed: f64,
    pub gap: f64,
    pub run_duration: f64,
    pub runs_completed: u64,
    pub runs_started: u64,
    pub track: Option<Arc<[Event]>>,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            speed: 1.0,
            active_speed: 1.0,
            gap: 0.0,
            run_duration: 0.0,
            runs_completed: 0,
            runs_started: 0,
            track: None,
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.runs_completed = 0;
        self.runs_started = 0;
        self.track = None;
    }
}

pub struct Scheduler<S> {
    state: SchedulerState,
    timers: TimerQueue<Task>,
    executor: Executor<S>,
}

impl<S: ActionSink> Scheduler<S> {
    pub fn new(sink: S) -> Self {
        Self {
            state: SchedulerState::new(),
            timers: TimerQueue::new(),
            executor: Executor::new(sink),
        }
    }

    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn is_running(&self) -> bool {
        self.state.phase.is_running()
    }

    pub fn runs_completed(&self) -> u64 {
        self.state.runs_completed
    }

    pub fn speed(&self) -> f64 {
        self.state.speed
    }

    pub fn stats(&self) -> ReplayStats {
        self.executor.stats()
    }

    pub fn sink(&self) -> &S {
        self.executor.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.executor.sink_mut()
    }

    /// Registrations still waiting to fire
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Current instant of the scheduler's clock
    pub fn now(&self) -> Duration {
        self.timers.now()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    /// Speed for the next playback; a running playback keeps its speed
    pub fn set_speed(&mut self, speed: f64) -> Result<()> {
        validate_speed(speed)?;
        self.state.speed = speed;
        if self.is_running() {
            info!(speed, "speed changed, applies to the next playback");
        } else {
            debug!(speed, "speed changed");
        }
        Ok(())
    }

    /// Schedule a playback of `track`. Rejected without side effects when the
    /// track is empty, the request is invalid, or a playback is running.
    pub fn play(&mut self, track: Arc<[Event]>, request: PlayRequest) -> Result<PlaybackPlan> {
        request.validate()?;
        if track.is_empty() {
            return Err(Error::empty_recording());
        }
        let next = match self.state.phase.on(Input::Start(request.repeat.mode())) {
            Transition::Enter(phase) => phase,
            _ => return Err(Error::already_playing()),
        };

        let speed = self.state.speed;
        let run = total_duration(&track) / speed;
        let gap = request.gap;

        self.state.phase = next;
        self.state.active_speed = speed;
        self.state.gap = gap;
        self.state.run_duration = run;
        self.state.runs_completed = 0;
        self.state.runs_started = 0;
        self.state.track = Some(track);
        self.executor.reset_stats();

        let total = match request.repeat {
            Repeat::Times(n) => {
                for i in 0..n {
                    self.schedule_run(f64::from(i) * (run + gap));
                }
                let end = f64::from(n) * run + f64::from(n - 1) * gap;
                self.timers
                    .schedule_after(secs(end), Task::Complete { runs: n });
                Some(end)
            }
            Repeat::Infinite => {
                self.schedule_run(0.0);
                self.arm_chain();
                None
            }
        };

        info!(repeat = %request.repeat, speed, gap, run, pending = self.timers.len(), "playback started");
        Ok(PlaybackPlan {
            repeat: request.repeat,
            speed,
            gap,
            run_duration: run,
            total_duration: total,
        })
    }

    /// Revoke every pending action and return to Idle. Actions that already
    /// fired are not undone.
    pub fn stop(&mut self) -> Result<StopReport> {
        match self.state.phase.on(Input::Cancel) {
            Transition::Enter(_) => {
                let report = StopReport {
                    runs_completed: self.state.runs_completed,
                    revoked: self.timers.cancel_all(),
                };
                self.state.reset();
                info!(runs = report.runs_completed, revoked = report.revoked, "playback stopped");
                Ok(report)
            }
            _ => Err(Error::not_playing()),
        }
    }

    /// Fire everything due at or before `until`, in deadline order
    pub fn advance(&mut self, until: Duration) -> Vec<Notice> {
        let mut notices = Vec::new();
        while let Some(fired) = self.timers.pop_due(until) {
            self.dispatch(fired.payload, &mut notices);
        }
        self.timers.advance_to(until);
        notices
    }

    fn dispatch(&mut self, task: Task, notices: &mut Vec<Notice>) {
        match task {
            Task::Apply { index } => {
                let Some(track) = self.state.track.clone() else {
                    return;
                };
                if let Some(event) = track.get(index) {
                    self.executor
                        .apply(event, self.state.active_speed, &mut self.timers);
                }
            }
            // Releases already registered are honored even after completion
            Task::Release(release) => self.executor.release(&release),
            Task::RunEnd { run } => {
                if self.state.phase.on(Input::RunElapsed) == Transition::Stay {
                    self.state.runs_completed += 1;
                    debug!(run, completed = self.state.runs_completed, "run elapsed");
                    notices.push(Notice::RunFinished {
                        completed: self.state.runs_completed,
                    });
                }
            }
            Task::Chain => {
                if let Transition::Enter(phase) = self.state.phase.on(Input::Chain) {
                    self.state.phase = phase;
                    self.schedule_run(0.0);
                    self.arm_chain();
                }
            }
            Task::Complete { runs } => {
                if let Transition::Enter(phase) = self.state.phase.on(Input::Complete) {
                    self.state.phase = phase;
                    self.state.track = None;
                    info!(runs, "playback completed");
                    notices.push(Notice::Completed { runs });
                }
            }
        }
    }

    /// Register one run based `base` seconds from now, plus its end marker.
    /// Registration follows track order; the track is never re-sorted.
    fn schedule_run(&mut self, base: f64) {
        let Some(track) = self.state.track.clone() else {
            return;
        };
        let speed = self.state.active_speed;
        let run = self.state.runs_started;
        self.state.runs_started += 1;

        for (index, event) in track.iter().enumerate() {
            self.timers
                .schedule_after(secs(event.offset() / speed + base), Task::Apply { index });
        }
        self.timers
            .schedule_after(secs(base + self.state.run_duration), Task::RunEnd { run });
        debug!(run, base, events = track.len(), "run scheduled");
    }

    fn arm_chain(&mut self) {
        let cycle = secs(self.state.run_duration + self.state.gap).max(MIN_CYCLE);
        self.timers.schedule_after(cycle, Task::Chain);
    }
}

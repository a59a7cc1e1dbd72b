//! Action executor - turns one logical event into synthetic input
//!
//! Synthesis goes through an [`ActionSink`]; this crate never touches the OS.
//! Sink failures are logged and counted, never propagated, so one bad key
//! cannot abort the rest of a run.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::events::*;
use crate::scheduler::Task;
use crate::timer::{secs, TimerQueue};

#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("unknown key identifier: {0}")]
    UnknownKey(String),
    #[error("action rejected: {0}")]
    Rejected(String),
}

/// Key to synthesize: the resolved identifier, or the raw platform code when
/// no identifier was captured. Mapping codes to portable keys is the sink's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyId {
    Named(String),
    Code(u16),
}

impl KeyId {
    pub fn for_event(e: &KeyEvent) -> Self {
        match e.key.as_deref() {
            Some(name) if !name.is_empty() => KeyId::Named(name.to_string()),
            _ => KeyId::Code(e.key_code),
        }
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyId::Named(name) => write!(f, "{}", name),
            KeyId::Code(code) => write!(f, "#{}", code),
        }
    }
}

/// Primitive input operations provided by the platform layer
pub trait ActionSink {
    fn move_cursor(&mut self, point: Point) -> Result<(), SinkError>;
    fn post_key(&mut self, modifiers: &Modifiers, key: &KeyId, is_down: bool) -> Result<(), SinkError>;
    fn post_mouse(&mut self, kind: MouseKind, point: Point) -> Result<(), SinkError>;
    fn post_scroll(&mut self, point: Point, delta: Delta) -> Result<(), SinkError>;
}

impl<S: ActionSink + ?Sized> ActionSink for Box<S> {
    fn move_cursor(&mut self, point: Point) -> Result<(), SinkError> {
        (**self).move_cursor(point)
    }
    fn post_key(&mut self, modifiers: &Modifiers, key: &KeyId, is_down: bool) -> Result<(), SinkError> {
        (**self).post_key(modifiers, key, is_down)
    }
    fn post_mouse(&mut self, kind: MouseKind, point: Point) -> Result<(), SinkError> {
        (**self).post_mouse(kind, point)
    }
    fn post_scroll(&mut self, point: Point, delta: Delta) -> Result<(), SinkError> {
        (**self).post_scroll(point, delta)
    }
}

/// One synthesized primitive, as seen by a sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Move { point: Point },
    Key { modifiers: Modifiers, key: KeyId, down: bool },
    Mouse { kind: MouseKind, point: Point },
    Scroll { point: Point, delta: Delta },
}

/// Sink that records every action into a shared list
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    actions: Arc<Mutex<Vec<Action>>>,
    rejected_keys: HashSet<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `post_key` fail for this identifier, like a sink that cannot map it
    pub fn with_rejected_key(mut self, name: impl Into<String>) -> Self {
        self.rejected_keys.insert(name.into());
        self
    }

    /// Shared view of the recorded actions, usable after the sink is moved
    pub fn log(&self) -> Arc<Mutex<Vec<Action>>> {
        self.actions.clone()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    fn push(&self, action: Action) -> Result<(), SinkError> {
        self.actions.lock().push(action);
        Ok(())
    }
}

impl ActionSink for MemorySink {
    fn move_cursor(&mut self, point: Point) -> Result<(), SinkError> {
        self.push(Action::Move { point })
    }

    fn post_key(&mut self, modifiers: &Modifiers, key: &KeyId, is_down: bool) -> Result<(), SinkError> {
        if let KeyId::Named(name) = key {
            if self.rejected_keys.contains(name) {
                return Err(SinkError::UnknownKey(name.clone()));
            }
        }
        self.push(Action::Key {
            modifiers: modifiers.clone(),
            key: key.clone(),
            down: is_down,
        })
    }

    fn post_mouse(&mut self, kind: MouseKind, point: Point) -> Result<(), SinkError> {
        self.push(Action::Mouse { kind, point })
    }

    fn post_scroll(&mut self, point: Point, delta: Delta) -> Result<(), SinkError> {
        self.push(Action::Scroll { point, delta })
    }
}

/// Sink that only emits tracing events
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn move_cursor(&mut self, point: Point) -> Result<(), SinkError> {
        debug!(x = point.x, y = point.y, "move");
        Ok(())
    }

    fn post_key(&mut self, modifiers: &Modifiers, key: &KeyId, is_down: bool) -> Result<(), SinkError> {
        info!(%key, down = is_down, modifiers = ?modifiers, "key");
        Ok(())
    }

    fn post_mouse(&mut self, kind: MouseKind, point: Point) -> Result<(), SinkError> {
        info!(?kind, x = point.x, y = point.y, "mouse");
        Ok(())
    }

    fn post_scroll(&mut self, point: Point, delta: Delta) -> Result<(), SinkError> {
        info!(x = point.x, y = point.y, dx = delta.dx, dy = delta.dy, "scroll");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub keys: usize,
    pub clicks: usize,
    pub moves: usize,
    pub scrolls: usize,
    pub holds: usize,
    pub failures: usize,
}

/// Pending button release of a hold
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub button: Button,
    pub point: Point,
}

pub struct Executor<S> {
    sink: S,
    stats: ReplayStats,
}

impl<S: ActionSink> Executor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            stats: ReplayStats::default(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn stats(&self) -> ReplayStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ReplayStats::default();
    }

    /// Synthesize `event`. A hold with a positive duration registers its
    /// release on `timers`, `duration / speed` from now.
    pub fn apply(&mut self, event: &Event, speed: f64, timers: &mut TimerQueue<Task>) {
        match event {
            Event::Key(e) => {
                let key = KeyId::for_event(e);
                let res = self.sink.post_key(&e.modifiers, &key, e.direction.is_down());
                self.note("key", res);
                self.stats.keys += 1;
            }
            Event::Mouse(e) => {
                let res = self.sink.move_cursor(e.point);
                self.note("move", res);
                if e.kind == MouseKind::Move {
                    self.stats.moves += 1;
                } else {
                    let res = self.sink.post_mouse(e.kind, e.point);
                    self.note("mouse", res);
                    self.stats.clicks += 1;
                }
            }
            Event::Scroll(e) => {
                let res = self.sink.move_cursor(e.point);
                self.note("move", res);
                let res = self.sink.post_scroll(e.point, e.delta);
                self.note("scroll", res);
                self.stats.scrolls += 1;
            }
            Event::MouseHold(e) => {
                let res = self.sink.move_cursor(e.point);
                self.note("move", res);
                let res = self.sink.post_mouse(e.button.down_kind(), e.point);
                self.note("mouse", res);
                self.stats.holds += 1;

                let release = Release {
                    button: e.button,
                    point: e.point,
                };
                if e.duration > 0.0 {
                    timers.schedule_after(secs(e.duration / speed), Task::Release(release));
                } else {
                    self.release(&release);
                }
            }
        }
    }

    /// Button-up half of a hold
    pub fn release(&mut self, release: &Release) {
        let res = self.sink.post_mouse(release.button.up_kind(), release.point);
        self.note("release", res);
    }

    fn note(&mut self, what: &str, res: Result<(), SinkError>) {
        if let Err(e) = res {
            self.stats.failures += 1;
            warn!(action = what, error = %e, "action synthesis failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::secs;

    fn run(event: Event, speed: f64) -> (Vec<Action>, TimerQueue<Task>, ReplayStats) {
        let sink = MemorySink::new();
        let log = sink.log();
        let mut exec = Executor::new(sink);
        let mut timers = TimerQueue::new();
        exec.apply(&event, speed, &mut timers);
        let actions = log.lock().clone();
        (actions, timers, exec.stats())
    }

    #[test]
    fn key_falls_back_to_raw_code() {
        let (actions, _, stats) = run(Event::key(0.0, KeyDirection::Up, None, 53), 1.0);
        assert_eq!(
            actions,
            vec![Action::Key {
                modifiers: Modifiers::none(),
                key: KeyId::Code(53),
                down: false,
            }]
        );
        assert_eq!(stats.keys, 1);
    }

    #[test]
    fn empty_identifier_also_falls_back() {
        let e = KeyEvent {
            offset: 0.0,
            direction: KeyDirection::Down,
            key: Some(String::new()),
            key_code: 7,
            modifiers: Modifiers::none(),
        };
        assert_eq!(KeyId::for_event(&e), KeyId::Code(7));
    }

    #[test]
    fn click_moves_then_transitions() {
        let p = Point::new(3.0, 4.0);
        let (actions, _, _) = run(Event::mouse(0.0, MouseKind::RightDown, p), 1.0);
        assert_eq!(
            actions,
            vec![
                Action::Move { point: p },
                Action::Mouse { kind: MouseKind::RightDown, point: p },
            ]
        );
    }

    #[test]
    fn pure_move_only_repositions() {
        let (actions, _, stats) = run(Event::mouse(0.0, MouseKind::Move, Point::new(1.0, 1.0)), 1.0);
        assert_eq!(actions.len(), 1);
        assert_eq!(stats.moves, 1);
        assert_eq!(stats.clicks, 0);
    }

    #[test]
    fn scroll_moves_then_scrolls() {
        let p = Point::new(9.0, 9.0);
        let d = Delta::new(0.0, -3.0);
        let (actions, _, _) = run(Event::scroll(0.0, p, d), 1.0);
        assert_eq!(
            actions,
            vec![Action::Move { point: p }, Action::Scroll { point: p, delta: d }]
        );
    }

    #[test]
    fn hold_defers_release_scaled_by_speed() {
        let p = Point::new(10.0, 10.0);
        let (actions, mut timers, _) = run(Event::hold(0.0, Button::Left, p, 0.3), 2.0);
        assert_eq!(
            actions,
            vec![
                Action::Move { point: p },
                Action::Mouse { kind: MouseKind::LeftDown, point: p },
            ]
        );
        assert_eq!(timers.next_deadline(), Some(secs(0.15)));
        let fired = timers.pop_due(secs(1.0)).unwrap();
        assert_eq!(
            fired.payload,
            Task::Release(Release { button: Button::Left, point: p })
        );
    }

    #[test]
    fn zero_length_hold_releases_immediately() {
        let p = Point::default();
        let (actions, timers, _) = run(Event::hold(0.0, Button::Other, p, 0.0), 1.0);
        assert!(timers.is_empty());
        assert_eq!(
            actions.last(),
            Some(&Action::Mouse { kind: MouseKind::OtherUp, point: p })
        );
    }

    #[test]
    fn sink_failure_is_counted_not_raised() {
        let sink = MemorySink::new().with_rejected_key("bogus");
        let log = sink.log();
        let mut exec = Executor::new(sink);
        let mut timers = TimerQueue::new();
        exec.apply(&Event::key(0.0, KeyDirection::Down, Some("bogus"), 0), 1.0, &mut timers);
        exec.apply(&Event::key(0.1, KeyDirection::Down, Some("a"), 0), 1.0, &mut timers);
        assert_eq!(exec.stats().failures, 1);
        assert_eq!(log.lock().len(), 1);
    }
}

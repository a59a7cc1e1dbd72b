//! Event model - the canonical in-memory form of captured input
//!
//! Events serialize to tagged JSON objects (`{"type":"mouse",...}`) with
//! camelCase fields. All offsets and durations are seconds since capture start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::duration::total_duration;

/// Current persisted document version
pub const FORMAT_VERSION: u32 = 2;
/// Version assumed for the legacy flat array format
pub const LEGACY_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub dx: f64,
    pub dy: f64,
}

impl Delta {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Modifier {
    Shift,
    Control,
    Option,
    Command,
    CapsLock,
    Function,
}

/// Set of held modifier keys. Unique and order-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modifiers(BTreeSet<Modifier>);

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, m: Modifier) -> bool {
        self.0.insert(m)
    }

    pub fn contains(&self, m: Modifier) -> bool {
        self.0.contains(&m)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Modifier> for Modifiers {
    fn from_iter<I: IntoIterator<Item = Modifier>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyDirection {
    Down,
    Up,
}

impl KeyDirection {
    pub fn is_down(self) -> bool {
        self == KeyDirection::Down
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Button {
    Left,
    Right,
    Other,
}

impl Button {
    pub fn down_kind(self) -> MouseKind {
        match self {
            Button::Left => MouseKind::LeftDown,
            Button::Right => MouseKind::RightDown,
            Button::Other => MouseKind::OtherDown,
        }
    }

    pub fn up_kind(self) -> MouseKind {
        match self {
            Button::Left => MouseKind::LeftUp,
            Button::Right => MouseKind::RightUp,
            Button::Other => MouseKind::OtherUp,
        }
    }
}

/// Button transition (or plain move) of a mouse event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MouseKind {
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    OtherDown,
    OtherUp,
    Move,
}

impl MouseKind {
    /// Button involved in the transition, `None` for moves
    pub fn button(self) -> Option<Button> {
        match self {
            MouseKind::LeftDown | MouseKind::LeftUp => Some(Button::Left),
            MouseKind::RightDown | MouseKind::RightUp => Some(Button::Right),
            MouseKind::OtherDown | MouseKind::OtherUp => Some(Button::Other),
            MouseKind::Move => None,
        }
    }

    pub fn is_down(self) -> bool {
        matches!(
            self,
            MouseKind::LeftDown | MouseKind::RightDown | MouseKind::OtherDown
        )
    }

    pub fn is_up(self) -> bool {
        matches!(
            self,
            MouseKind::LeftUp | MouseKind::RightUp | MouseKind::OtherUp
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    pub offset: f64,
    pub direction: KeyDirection,
    /// Resolved key identifier; absent when only the raw code is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub key_code: u16,
    #[serde(default)]
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseEvent {
    pub offset: f64,
    pub kind: MouseKind,
    pub point: Point,
    #[serde(default)]
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollEvent {
    pub offset: f64,
    pub point: Point,
    pub delta: Delta,
}

/// Press-and-release of one button, only ever produced by compression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouseHoldEvent {
    pub offset: f64,
    pub button: Button,
    pub point: Point,
    pub duration: f64,
    #[serde(default)]
    pub modifiers: Modifiers,
}

/// Single recorded action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Scroll(ScrollEvent),
    MouseHold(MouseHoldEvent),
}

impl Event {
    pub fn key(offset: f64, direction: KeyDirection, key: Option<&str>, key_code: u16) -> Self {
        Event::Key(KeyEvent {
            offset,
            direction,
            key: key.map(str::to_string),
            key_code,
            modifiers: Modifiers::none(),
        })
    }

    pub fn mouse(offset: f64, kind: MouseKind, point: Point) -> Self {
        Event::Mouse(MouseEvent {
            offset,
            kind,
            point,
            modifiers: Modifiers::none(),
        })
    }

    pub fn scroll(offset: f64, point: Point, delta: Delta) -> Self {
        Event::Scroll(ScrollEvent {
            offset,
            point,
            delta,
        })
    }

    pub fn hold(offset: f64, button: Button, point: Point, duration: f64) -> Self {
        Event::MouseHold(MouseHoldEvent {
            offset,
            button,
            point,
            duration,
            modifiers: Modifiers::none(),
        })
    }

    /// Attach modifiers; scroll events carry none and are returned as-is
    pub fn with_modifiers(mut self, mods: Modifiers) -> Self {
        match &mut self {
            Event::Key(e) => e.modifiers = mods,
            Event::Mouse(e) => e.modifiers = mods,
            Event::MouseHold(e) => e.modifiers = mods,
            Event::Scroll(_) => {}
        }
        self
    }

    pub fn offset(&self) -> f64 {
        match self {
            Event::Key(e) => e.offset,
            Event::Mouse(e) => e.offset,
            Event::Scroll(e) => e.offset,
            Event::MouseHold(e) => e.offset,
        }
    }

    pub(crate) fn set_offset(&mut self, offset: f64) {
        match self {
            Event::Key(e) => e.offset = offset,
            Event::Mouse(e) => e.offset = offset,
            Event::Scroll(e) => e.offset = offset,
            Event::MouseHold(e) => e.offset = offset,
        }
    }

    /// Instant the event stops affecting input: `offset`, or `offset + duration` for holds
    pub fn span_end(&self) -> f64 {
        match self {
            Event::MouseHold(e) => e.offset + e.duration,
            other => other.offset(),
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Event::Mouse(e) if e.kind == MouseKind::Move)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default = "legacy_version")]
    pub version: u32,
    #[serde(default = "untitled")]
    pub name: String,
    #[serde(default)]
    pub event_count: usize,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub mouse_moves_included: bool,
}

fn legacy_version() -> u32 {
    LEGACY_FORMAT_VERSION
}

fn untitled() -> String {
    "untitled".to_string()
}

/// Ordered events plus metadata. Order is capture order and replay order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub metadata: Metadata,
    pub events: Vec<Event>,
}

impl Recording {
    pub fn new(name: impl Into<String>, events: Vec<Event>, mouse_moves_included: bool) -> Self {
        let mut recording = Self {
            metadata: Metadata {
                version: FORMAT_VERSION,
                name: name.into(),
                event_count: 0,
                duration: 0.0,
                recorded_at: Utc::now(),
                mouse_moves_included,
            },
            events,
        };
        recording.refresh_metadata();
        recording
    }

    pub fn empty(name: impl Into<String>, mouse_moves_included: bool) -> Self {
        Self::new(name, Vec::new(), mouse_moves_included)
    }

    /// Re-derive `event_count` and `duration` from the events
    pub fn refresh_metadata(&mut self) {
        self.metadata.event_count = self.events.len();
        self.metadata.duration = total_duration(&self.events);
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn summary(&self) -> Summary {
        let mut s = Summary::default();
        for e in &self.events {
            match e {
                Event::Key(_) => s.keys += 1,
                Event::Mouse(m) if m.kind == MouseKind::Move => s.moves += 1,
                Event::Mouse(_) => s.clicks += 1,
                Event::Scroll(_) => s.scrolls += 1,
                Event::MouseHold(_) => s.holds += 1,
            }
        }
        s
    }
}

/// Per-kind event counts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub keys: usize,
    pub clicks: usize,
    pub moves: usize,
    pub scrolls: usize,
    pub holds: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_event_json_shape() {
        let e = Event::mouse(0.5, MouseKind::LeftDown, Point::new(10.0, 20.0));
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "mouse");
        assert_eq!(v["kind"], "leftDown");
        assert_eq!(v["point"]["x"], 10.0);
        assert_eq!(v["modifiers"], serde_json::json!([]));
    }

    #[test]
    fn hold_tag_is_camel_case() {
        let e = Event::hold(1.0, Button::Right, Point::default(), 0.25);
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "mouseHold");
        assert_eq!(v["button"], "right");
        assert_eq!(v["duration"], 0.25);
    }

    #[test]
    fn key_without_identifier_parses() {
        let e: Event = serde_json::from_str(
            r#"{"type":"key","offset":0.1,"direction":"up","keyCode":36,"modifiers":["shift","shift","command"]}"#,
        )
        .unwrap();
        match e {
            Event::Key(k) => {
                assert!(k.key.is_none());
                assert_eq!(k.key_code, 36);
                assert_eq!(k.modifiers.len(), 2);
                assert!(k.modifiers.contains(Modifier::Command));
            }
            other => panic!("expected key event, got {:?}", other),
        }
    }

    #[test]
    fn modifier_order_does_not_matter() {
        let a: Modifiers = [Modifier::Shift, Modifier::Control].into_iter().collect();
        let b: Modifiers = [Modifier::Control, Modifier::Shift].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn span_end_of_hold_includes_duration() {
        assert_eq!(Event::hold(1.0, Button::Left, Point::default(), 0.5).span_end(), 1.5);
        assert_eq!(Event::scroll(2.0, Point::default(), Delta::new(0.0, 3.0)).span_end(), 2.0);
    }

    #[test]
    fn new_recording_derives_metadata() {
        let r = Recording::new(
            "demo",
            vec![
                Event::key(0.0, KeyDirection::Down, Some("a"), 0),
                Event::hold(0.2, Button::Left, Point::default(), 1.0),
                Event::mouse(0.4, MouseKind::Move, Point::new(1.0, 1.0)),
            ],
            true,
        );
        assert_eq!(r.metadata.event_count, 3);
        assert_eq!(r.metadata.duration, 1.2);
        assert_eq!(r.metadata.version, FORMAT_VERSION);
        let s = r.summary();
        assert_eq!((s.keys, s.holds, s.moves, s.clicks), (1, 1, 1, 0));
    }
}

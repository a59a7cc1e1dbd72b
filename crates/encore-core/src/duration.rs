//! Total wall-clock span of an event sequence

use crate::events::Event;

/// Latest span end over all events, zero when empty.
///
/// Holds end at `offset + duration`, everything else at its own offset.
pub fn total_duration(events: &[Event]) -> f64 {
    events
        .iter()
        .map(Event::span_end)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Button, Delta, KeyDirection, MouseKind, Point};

    #[test]
    fn empty_is_zero() {
        assert_eq!(total_duration(&[]), 0.0);
    }

    #[test]
    fn hold_end_can_exceed_later_offsets() {
        let events = vec![
            Event::hold(0.0, Button::Left, Point::default(), 2.0),
            Event::key(1.0, KeyDirection::Down, Some("a"), 0),
        ];
        assert_eq!(total_duration(&events), 2.0);
    }

    #[test]
    fn monotonic_as_events_are_appended() {
        let stream = vec![
            Event::mouse(0.1, MouseKind::Move, Point::default()),
            Event::hold(0.2, Button::Right, Point::default(), 0.5),
            Event::scroll(0.3, Point::default(), Delta::new(0.0, -1.0)),
            Event::key(0.9, KeyDirection::Up, None, 12),
        ];
        let mut last = 0.0;
        for n in 0..=stream.len() {
            let d = total_duration(&stream[..n]);
            assert!(d >= last, "duration shrank at {}: {} < {}", n, d, last);
            last = d;
        }
        assert_eq!(last, 0.9);
    }
}

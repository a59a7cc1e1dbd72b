//! Merges adjacent button down/up pairs into hold events

use crate::events::{Event, MouseEvent, MouseHoldEvent, Recording};

/// Replace every strictly adjacent down/up pair of the same button with one hold.
///
/// Single left-to-right pass, no backtracking. A pair separated by any other
/// event (including moves) is left alone, so drags stay uncompressed.
pub fn compress(events: &[Event]) -> Vec<Event> {
    let mut out = Vec::with_capacity(events.len());
    let mut i = 0;

    while i < events.len() {
        if let (Event::Mouse(down), Some(Event::Mouse(up))) = (&events[i], events.get(i + 1)) {
            if let Some(hold) = merge_pair(down, up) {
                out.push(Event::MouseHold(hold));
                i += 2;
                continue;
            }
        }
        out.push(events[i].clone());
        i += 1;
    }

    out
}

fn merge_pair(down: &MouseEvent, up: &MouseEvent) -> Option<MouseHoldEvent> {
    if !down.kind.is_down() || !up.kind.is_up() {
        return None;
    }
    let button = down.kind.button()?;
    if up.kind.button() != Some(button) {
        return None;
    }
    Some(MouseHoldEvent {
        offset: down.offset,
        button,
        point: down.point,
        duration: (up.offset - down.offset).max(0.0),
        modifiers: down.modifiers.clone(),
    })
}

impl Recording {
    /// New recording with compressed events; name, timestamp and move flag are kept.
    pub fn compressed(&self) -> Recording {
        let mut out = Recording {
            metadata: self.metadata.clone(),
            events: compress(&self.events),
        };
        out.refresh_metadata();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::total_duration;
    use crate::events::{Button, Delta, KeyDirection, Modifier, Modifiers, MouseKind, Point};

    fn click(t: f64, kind: MouseKind) -> Event {
        Event::mouse(t, kind, Point::new(10.0, 10.0))
    }

    #[test]
    fn adjacent_pair_becomes_hold() {
        let out = compress(&[click(0.0, MouseKind::LeftDown), click(0.3, MouseKind::LeftUp)]);
        assert_eq!(out, vec![Event::hold(0.0, Button::Left, Point::new(10.0, 10.0), 0.3)]);
        assert_eq!(total_duration(&out), 0.3);
    }

    #[test]
    fn hold_keeps_down_modifiers_and_point() {
        let mods: Modifiers = [Modifier::Shift].into_iter().collect();
        let down = Event::mouse(1.0, MouseKind::RightDown, Point::new(5.0, 6.0))
            .with_modifiers(mods.clone());
        let up = Event::mouse(1.5, MouseKind::RightUp, Point::new(7.0, 8.0));
        match &compress(&[down, up])[..] {
            [Event::MouseHold(h)] => {
                assert_eq!(h.button, Button::Right);
                assert_eq!(h.point, Point::new(5.0, 6.0));
                assert_eq!(h.modifiers, mods);
                assert_eq!(h.duration, 0.5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn mismatched_buttons_pass_through() {
        let input = vec![click(0.0, MouseKind::LeftDown), click(0.1, MouseKind::RightUp)];
        assert_eq!(compress(&input), input);
    }

    #[test]
    fn drag_with_moves_is_not_merged() {
        let input = vec![
            click(0.0, MouseKind::LeftDown),
            click(0.1, MouseKind::Move),
            click(0.2, MouseKind::LeftUp),
        ];
        assert_eq!(compress(&input), input);
    }

    #[test]
    fn scan_advances_past_merged_pair() {
        let input = vec![
            click(0.0, MouseKind::LeftDown),
            click(0.1, MouseKind::LeftUp),
            click(0.2, MouseKind::LeftUp),
            click(0.3, MouseKind::OtherDown),
            click(0.4, MouseKind::OtherUp),
            Event::scroll(0.5, Point::default(), Delta::new(0.0, 1.0)),
        ];
        let out = compress(&input);
        assert_eq!(out.len(), 4);
        assert!(matches!(out[0], Event::MouseHold(_)));
        assert_eq!(out[1], input[2]);
        assert!(matches!(&out[2], Event::MouseHold(h) if h.button == Button::Other));
        assert_eq!(out[3], input[5]);
    }

    #[test]
    fn idempotent_and_duration_preserving() {
        let input = vec![
            Event::key(0.0, KeyDirection::Down, Some("a"), 0),
            click(0.1, MouseKind::LeftDown),
            click(0.4, MouseKind::LeftUp),
            click(0.5, MouseKind::Move),
            click(0.6, MouseKind::RightDown),
            click(0.6, MouseKind::RightDown),
            click(1.1, MouseKind::RightUp),
            Event::key(1.2, KeyDirection::Up, Some("a"), 0),
        ];
        let once = compress(&input);
        assert_eq!(compress(&once), once);
        assert_eq!(total_duration(&once), total_duration(&input));
        assert!(once.len() <= input.len());
    }

    #[test]
    fn compressed_recording_refreshes_count() {
        let r = Recording::new(
            "clicks",
            vec![click(0.0, MouseKind::LeftDown), click(0.3, MouseKind::LeftUp)],
            false,
        );
        let c = r.compressed();
        assert_eq!(c.metadata.event_count, 1);
        assert_eq!(c.metadata.duration, 0.3);
        assert_eq!(c.metadata.recorded_at, r.metadata.recorded_at);
        assert_eq!(r.len(), 2);
    }
}

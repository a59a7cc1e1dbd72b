//! Capture boundary
//!
//! Whatever intercepts OS input pushes already-classified events into an
//! [`EventFeed`]. The [`CaptureHandle`] drains them into the in-progress
//! recording on the owning thread and freezes it on stop.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{Event, Recording};

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Keep plain mouse moves
    pub mouse_moves_included: bool,
    /// Max events buffered between drains
    pub max_buffer: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mouse_moves_included: false,
            max_buffer: 10000,
        }
    }
}

/// Producer side handed to the OS-facing collaborator
#[derive(Debug, Clone)]
pub struct EventFeed {
    tx: Sender<Event>,
    stop: Arc<AtomicBool>,
    start: Instant,
}

impl EventFeed {
    /// Seconds since capture started; use as the offset of a new event
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
    }

    /// Deliver one event. Returns false once capture has stopped or the
    /// buffer is full.
    pub fn push(&self, event: Event) -> bool {
        if !self.is_running() {
            return false;
        }
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("capture buffer full, event dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Consumer side - owns the recording while capture is active
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    events_rx: Receiver<Event>,
    recording: Recording,
    last_offset: f64,
    dropped_moves: usize,
}

impl CaptureHandle {
    /// Append pending events, returning how many were kept
    pub fn drain(&mut self) -> usize {
        let mut kept = 0;
        while let Ok(e) = self.events_rx.try_recv() {
            if self.append(e) {
                kept += 1;
            }
        }
        kept
    }

    pub fn is_running(&self) -> bool {
        !self.stop.load(Ordering::Relaxed)
    }

    /// Events captured so far
    pub fn len(&self) -> usize {
        self.recording.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recording.is_empty()
    }

    pub fn recording(&self) -> &Recording {
        &self.recording
    }

    /// Stop delivery, drain what is left and freeze the recording
    pub fn stop(mut self) -> Recording {
        self.stop.store(true, Ordering::SeqCst);
        self.drain();
        self.recording.refresh_metadata();
        info!(
            name = %self.recording.name(),
            events = self.recording.len(),
            duration = self.recording.metadata.duration,
            dropped_moves = self.dropped_moves,
            "capture stopped"
        );
        self.recording
    }

    fn append(&mut self, mut e: Event) -> bool {
        if e.is_move() && !self.recording.metadata.mouse_moves_included {
            self.dropped_moves += 1;
            return false;
        }
        if e.offset() < self.last_offset {
            debug!(offset = e.offset(), previous = self.last_offset, "clamping out-of-order event");
            e.set_offset(self.last_offset);
        }
        self.last_offset = e.offset();
        self.recording.events.push(e);
        true
    }
}

pub struct Capturer {
    config: CaptureConfig,
}

impl Capturer {
    pub fn new() -> Self {
        Self::with_config(CaptureConfig::default())
    }

    pub fn with_config(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Begin a capture with an empty recording named `name`
    pub fn start(&self, name: impl Into<String>) -> (CaptureHandle, EventFeed) {
        let (tx, rx) = bounded::<Event>(self.config.max_buffer.max(1));
        let stop = Arc::new(AtomicBool::new(false));
        let recording = Recording::empty(name, self.config.mouse_moves_included);
        info!(name = %recording.name(), moves = self.config.mouse_moves_included, "capture started");

        let handle = CaptureHandle {
            stop: stop.clone(),
            events_rx: rx,
            recording,
            last_offset: 0.0,
            dropped_moves: 0,
        };
        let feed = EventFeed {
            tx,
            stop,
            start: Instant::now(),
        };
        (handle, feed)
    }
}

impl Default for Capturer {
    fn default() -> Self {
        Self::new()
    }
}

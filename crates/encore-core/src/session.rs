//! Session - the single in-memory recording slot plus its capture and playback
//!
//! This is the request surface (`play`, `stop`, `set_speed`) and where the
//! playback guards live. Every rejection leaves the session untouched.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::capture::{CaptureConfig, CaptureHandle, Capturer, EventFeed};
use crate::error::{Error, Result};
use crate::events::{Event, Recording};
use crate::executor::{ActionSink, ReplayStats};
use crate::scheduler::{Notice, Phase, PlayRequest, PlaybackPlan, Repeat, Scheduler, StopReport};

pub struct Session<S> {
    recording: Option<Recording>,
    capture: Option<CaptureHandle>,
    capturer: Capturer,
    scheduler: Scheduler<S>,
}

impl<S: ActionSink> Session<S> {
    pub fn new(sink: S) -> Self {
        Self::with_capture_config(sink, CaptureConfig::default())
    }

    pub fn with_capture_config(sink: S, config: CaptureConfig) -> Self {
        Self {
            recording: None,
            capture: None,
            capturer: Capturer::with_config(config),
            scheduler: Scheduler::new(sink),
        }
    }

    // ------------------------------------------------------------------
    // Capture
    // ------------------------------------------------------------------

    /// Start capturing into a fresh recording. Refused while playing or
    /// already capturing.
    pub fn start_capture(&mut self, name: impl Into<String>) -> Result<EventFeed> {
        if self.capture.is_some() {
            return Err(Error::capture_active());
        }
        if self.scheduler.is_running() {
            return Err(Error::already_playing());
        }
        let (handle, feed) = self.capturer.start(name);
        self.capture = Some(handle);
        Ok(feed)
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Pull delivered events into the in-progress recording
    pub fn drain_capture(&mut self) -> usize {
        self.capture.as_mut().map(CaptureHandle::drain).unwrap_or(0)
    }

    /// Events captured so far, or in the loaded recording when idle
    pub fn event_count(&self) -> usize {
        match (&self.capture, &self.recording) {
            (Some(handle), _) => handle.len(),
            (None, Some(r)) => r.len(),
            (None, None) => 0,
        }
    }

    /// Freeze the capture and make it the active recording
    pub fn stop_capture(&mut self) -> Result<&Recording> {
        let handle = self
            .capture
            .take()
            .ok_or_else(|| Error::invalid_request("No capture is active"))?;
        Ok(self.recording.insert(handle.stop()))
    }

    // ------------------------------------------------------------------
    // Recording slot
    // ------------------------------------------------------------------

    /// Replace the active recording. An in-progress playback keeps the track
    /// it started with.
    pub fn load(&mut self, recording: Recording) -> Option<Recording> {
        info!(name = %recording.name(), events = recording.len(), "recording loaded");
        self.recording.replace(recording)
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    /// Swap the active recording for its compressed form, returning how many
    /// events were merged away
    pub fn compress(&mut self) -> Result<usize> {
        if self.capture.is_some() {
            return Err(Error::capture_active());
        }
        let current = self
            .recording
            .as_ref()
            .ok_or_else(Error::empty_recording)?;
        let compressed = current.compressed();
        let merged = current.len() - compressed.len();
        info!(before = current.len(), after = compressed.len(), "recording compressed");
        self.recording = Some(compressed);
        Ok(merged)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    pub fn play(&mut self, repeat: Repeat, gap: f64) -> Result<PlaybackPlan> {
        if self.capture.is_some() {
            return Err(Error::capture_active());
        }
        let recording = match &self.recording {
            Some(r) if !r.is_empty() => r,
            _ => return Err(Error::empty_recording()),
        };
        let track: Arc<[Event]> = Arc::from(recording.events.as_slice());
        self.scheduler.play(track, PlayRequest::new(repeat, gap))
    }

    pub fn stop(&mut self) -> Result<StopReport> {
        self.scheduler.stop()
    }

    pub fn set_speed(&mut self, multiplier: f64) -> Result<()> {
        self.scheduler.set_speed(multiplier)
    }

    pub fn advance(&mut self, until: Duration) -> Vec<Notice> {
        self.scheduler.advance(until)
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    pub fn stats(&self) -> ReplayStats {
        self.scheduler.stats()
    }

    pub fn scheduler(&self) -> &Scheduler<S> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<S> {
        &mut self.scheduler
    }
}

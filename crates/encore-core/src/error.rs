//! Structured errors reported back to whoever issued a request

use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    CaptureActive,
    AlreadyPlaying,
    EmptyRecording,
    NotPlaying,
    InvalidRequest,
    MalformedData,
    NotFound,
    Io,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestions: Vec::new(),
            context: None,
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn capture_active() -> Self {
        Self::new(
            ErrorCode::CaptureActive,
            "Cannot play while capture is active",
        )
        .with_suggestions(vec!["Stop capturing first".to_string()])
    }

    pub fn already_playing() -> Self {
        Self::new(ErrorCode::AlreadyPlaying, "A playback is already running")
            .with_suggestions(vec!["Stop the current playback first".to_string()])
    }

    pub fn empty_recording() -> Self {
        Self::new(ErrorCode::EmptyRecording, "Recording has no events to play")
    }

    pub fn not_playing() -> Self {
        Self::new(ErrorCode::NotPlaying, "No playback is running")
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, reason)
    }

    pub fn malformed(reason: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::MalformedData,
            format!("Malformed recording: {}", reason),
        )
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Not found: {}", what))
    }

    /// Request rejected by a playback guard; scheduler state is untouched.
    pub fn is_guard_violation(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::CaptureActive | ErrorCode::AlreadyPlaying | ErrorCode::EmptyRecording
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        let code = if e.kind() == std::io::ErrorKind::NotFound {
            ErrorCode::NotFound
        } else {
            ErrorCode::Io
        };
        Self::new(code, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::malformed(e)
    }
}

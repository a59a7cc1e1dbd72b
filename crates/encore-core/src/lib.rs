//! encore-core - input macro capture model and playback scheduling
//!
//! Captured input becomes an ordered list of [`Event`]s. Adjacent button
//! down/up pairs can be compressed into holds, and a [`Scheduler`] replays the
//! list with speed scaling, repeats, gaps and cancellation.
//!
//! Reading raw OS input and synthesizing it are left to collaborators: an
//! [`EventFeed`] receives classified events, an [`ActionSink`] performs them.
//!
//! ## Threading
//!
//! Everything runs on one thread. Deferred work lives on a virtual-clock
//! [`TimerQueue`] that the owner advances; [`Player`] does so in real time.

pub mod capture;
pub mod compress;
pub mod duration;
pub mod error;
pub mod events;
pub mod executor;
pub mod player;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod timer;

pub use capture::{CaptureConfig, CaptureHandle, Capturer, EventFeed};
pub use compress::compress;
pub use duration::total_duration;
pub use error::{Error, ErrorCode, Result};
pub use events::*;
pub use executor::{Action, ActionSink, Executor, KeyId, LogSink, MemorySink, ReplayStats, SinkError};
pub use player::{Player, PlayerConfig};
pub use scheduler::{
    Notice, Phase, PlayRequest, PlaybackPlan, Repeat, RepeatMode, Scheduler, SchedulerState,
    StopReport,
};
pub use session::Session;
pub use storage::{parse_document, to_document, RecordingStorage};
pub use timer::{TimerHandle, TimerQueue};

pub mod prelude {
    pub use crate::capture::{CaptureConfig, Capturer, EventFeed};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::events::*;
    pub use crate::executor::{Action, ActionSink, KeyId, LogSink, MemorySink, SinkError};
    pub use crate::player::{Player, PlayerConfig};
    pub use crate::scheduler::{Notice, PlayRequest, Repeat, Scheduler};
    pub use crate::session::Session;
    pub use crate::storage::RecordingStorage;
}

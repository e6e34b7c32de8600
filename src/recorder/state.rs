//! Recording state management
//!
//! Defines the session state machine, its configuration and the snapshot
//! handed to hosts.

use super::output::{BlobUrl, RecordingBlob};
use crate::capture::{AcquisitionError, EncoderOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Delay between acquiring a capture handle and arming it
pub const DEFAULT_START_DELAY_MS: u64 = 200;

/// Current state of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingStatus {
    /// Nothing acquired, nothing recorded
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
    /// Recording finished; output arrives with the final segment
    Stopped,
    /// Acquisition failed; stays here until reset or a new start
    Error,
}

impl RecordingStatus {
    /// Whether `start` is accepted from this status
    pub fn can_start(self) -> bool {
        matches!(
            self,
            RecordingStatus::Idle | RecordingStatus::Stopped | RecordingStatus::Error
        )
    }
}

impl Default for RecordingStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingStatus::Idle => "idle",
            RecordingStatus::Recording => "recording",
            RecordingStatus::Paused => "paused",
            RecordingStatus::Stopped => "stopped",
            RecordingStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Session commands that can be rejected
///
/// Reset is accepted from every state and never appears here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

impl fmt::Display for SessionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionCommand::Start => "start",
            SessionCommand::Pause => "pause",
            SessionCommand::Resume => "resume",
            SessionCommand::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// One contiguous span of recording
///
/// A new period is opened on start and on every resume, and closed on pause
/// and stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePeriod {
    /// Period index (0, 1, 2, ...)
    pub index: usize,

    /// Duration of this period in milliseconds
    pub duration_ms: f64,

    /// Session clock when the period started
    pub process_time_start_ms: f64,

    /// Session clock when the period ended
    pub process_time_end_ms: f64,

    /// Wall clock when the period started
    pub started_at: DateTime<Utc>,

    /// Wall clock when the period ended
    pub ended_at: Option<DateTime<Utc>>,
}

impl CapturePeriod {
    /// Open a period starting now
    pub fn new(index: usize, process_time_ms: f64) -> Self {
        Self {
            index,
            duration_ms: 0.0,
            process_time_start_ms: process_time_ms,
            process_time_end_ms: process_time_ms,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Close the period
    pub fn end(&mut self, process_time_ms: f64) {
        self.process_time_end_ms = process_time_ms;
        self.duration_ms = self.process_time_end_ms - self.process_time_start_ms;
        self.ended_at = Some(Utc::now());
    }
}

/// Options for `start_recording`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    /// Re-arm the handle from the previous recording instead of asking again
    #[serde(default)]
    pub use_last_device: bool,

    /// Milliseconds between acquisition and arming; the session default when absent
    #[serde(default, rename = "delay", skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

impl StartOptions {
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            use_last_device: false,
            delay_ms: Some(delay_ms),
        }
    }

    pub fn reuse_last_device(mut self) -> Self {
        self.use_last_device = true;
        self
    }

    /// Resolve the delay against a session default
    pub fn delay_or(&self, default_ms: u64) -> Duration {
        Duration::from_millis(self.delay_ms.unwrap_or(default_ms))
    }
}

/// How a `start_recording` call settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The handle was armed and the session is recording
    Recording,
    /// The user declined the picker; nothing changed
    Cancelled,
    /// Acquisition or arming failed; the session is in `error`
    Failed,
    /// A reset or a newer start happened while this one was pending
    Superseded,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
    /// Request a microphone alongside the display
    pub include_audio: bool,

    /// Passed through to the environment recorder untouched
    pub encoder_options: EncoderOptions,

    /// Used when `StartOptions::delay_ms` is absent
    pub default_delay_ms: u64,

    /// MIME type stamped on the output blob when the encoder options carry none
    pub blob_mime_type: String,

    /// Origin component of generated blob URLs
    pub url_origin: String,

    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            include_audio: true,
            encoder_options: EncoderOptions::default(),
            default_delay_ms: DEFAULT_START_DELAY_MS,
            blob_mime_type: "video/webm".to_string(),
            url_origin: "screen-session".to_string(),
            event_capacity: 100,
        }
    }
}

impl SessionConfig {
    /// Parse a JSON config, filling in defaults for missing fields
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// MIME type of the produced blob
    pub fn output_mime_type(&self) -> &str {
        self.encoder_options
            .mime_type
            .as_deref()
            .unwrap_or(&self.blob_mime_type)
    }
}

/// Read-only view of a session
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub status: RecordingStatus,
    pub blob: Option<RecordingBlob>,
    pub blob_url: Option<BlobUrl>,
    pub error: Option<AcquisitionError>,

    /// Stopped, but the final segment of this cycle has not arrived yet
    pub pending_output: bool,

    /// `blob` was produced by the latest recording cycle rather than an
    /// earlier one
    pub output_is_current: bool,
}

impl SessionSnapshot {
    pub fn is_idle(&self) -> bool {
        self.status == RecordingStatus::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.status == RecordingStatus::Recording
    }

    pub fn is_paused(&self) -> bool {
        self.status == RecordingStatus::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.status == RecordingStatus::Stopped
    }

    pub fn is_error(&self) -> bool {
        self.status == RecordingStatus::Error
    }
}

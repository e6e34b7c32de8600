//! Capture trait definitions
//!
//! Platform-agnostic contract for the environment that provides capture sources.
//! The session core never talks to devices directly; it drives these traits.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// A single live audio or video track handed out by the environment
pub trait MediaTrack: Send + Sync {
    /// Environment-assigned track identifier
    fn id(&self) -> &str;

    /// Whether this track carries video or audio
    fn kind(&self) -> TrackKind;

    /// Stop the track and release the underlying device
    ///
    /// Stopping an already stopped track is a no-op.
    fn stop(&self);

    /// Whether the track is still producing media
    fn is_live(&self) -> bool;
}

/// A set of tracks that are recorded together
#[derive(Clone, Default)]
pub struct MediaStream {
    tracks: Vec<Arc<dyn MediaTrack>>,
}

impl MediaStream {
    /// Create a stream from a list of tracks
    pub fn new(tracks: Vec<Arc<dyn MediaTrack>>) -> Self {
        Self { tracks }
    }

    /// All tracks in the stream
    pub fn tracks(&self) -> &[Arc<dyn MediaTrack>] {
        &self.tracks
    }

    /// Tracks of the given kind
    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &Arc<dyn MediaTrack>> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    /// Move every track of `other` into this stream
    pub fn merge(&mut self, other: MediaStream) {
        self.tracks.extend(other.tracks);
    }

    /// Stop every track in the stream
    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    pub fn has_audio(&self) -> bool {
        self.tracks_of(TrackKind::Audio).next().is_some()
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tracks.iter().map(|t| (t.kind(), t.id().to_string())))
            .finish()
    }
}

/// A unit of encoded media emitted by a recorder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Encoded bytes
    pub data: Bytes,

    /// Set on the last segment of a recording cycle, delivered after stop
    pub is_final: bool,
}

impl Segment {
    /// An intermediate segment
    pub fn partial(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            is_final: false,
        }
    }

    /// The last segment of a cycle
    pub fn last(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            is_final: true,
        }
    }
}

/// Channel end a recorder writes segments into
pub type SegmentSender = mpsc::UnboundedSender<Segment>;

/// Channel end the session reads segments from
pub type SegmentReceiver = mpsc::UnboundedReceiver<Segment>;

/// Category of a failure reported by the environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceErrorKind {
    /// The user declined the picker or the permission prompt
    NotAllowed,
    /// No matching device exists
    NotFound,
    /// The device exists but could not be opened
    NotReadable,
    /// The request was aborted by the platform
    Aborted,
    /// The recorder rejected a state change
    InvalidState,
    /// Anything else
    Other,
}

/// Failure reported by the capture environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The user dismissed the picker or denied permission
    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotAllowed, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Other, message)
    }
}

/// Opaque encoder options passed through to the environment recorder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncoderOptions {
    /// Container/codec hint, e.g. `video/webm;codecs=vp9`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Everything else, untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EncoderOptions {
    pub fn with_mime_type(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            extra: Map::new(),
        }
    }
}

/// Streaming recorder bound to a `MediaStream`
///
/// Mirrors the start/pause/resume/stop lifecycle of a platform media recorder.
/// Segments flow through the sender given to `start`; the final one arrives
/// some time after `stop`.
pub trait MediaRecorder: Send {
    /// Begin encoding, delivering segments into `segments`
    fn start(&mut self, segments: SegmentSender) -> Result<(), SourceError>;

    fn pause(&mut self) -> Result<(), SourceError>;

    fn resume(&mut self) -> Result<(), SourceError>;

    /// Stop encoding; the final segment is delivered asynchronously
    fn stop(&mut self) -> Result<(), SourceError>;
}

/// The environment that owns capture devices and encoders
#[async_trait]
pub trait CaptureEnvironment: Send + Sync {
    /// Ask for a display video source, usually through an interactive picker
    async fn request_display(&self) -> Result<MediaStream, SourceError>;

    /// Ask for a microphone source
    async fn request_microphone(&self) -> Result<MediaStream, SourceError>;

    /// Create a recorder bound to `stream` with the given encoder options
    fn create_recorder(
        &self,
        stream: &MediaStream,
        options: &EncoderOptions,
    ) -> Result<Box<dyn MediaRecorder>, SourceError>;
}

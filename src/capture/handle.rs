//! Live capture handle
//!
//! Binds a merged media stream to the recorder created for it. A handle is
//! owned by exactly one session and is never cloned.

use super::traits::{MediaRecorder, MediaStream, SegmentReceiver, SourceError, TrackKind};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// The live binding to a video(+audio) source and its recorder
pub struct CaptureHandle {
    /// Identifier used for log correlation
    id: Uuid,

    /// Tracks being recorded
    stream: MediaStream,

    /// Environment recorder bound to `stream`
    recorder: Box<dyn MediaRecorder>,

    /// Whether the recorder has been started and not yet stopped
    armed: bool,
}

impl CaptureHandle {
    pub fn new(stream: MediaStream, recorder: Box<dyn MediaRecorder>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream,
            recorder,
            armed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    /// Start the recorder on a fresh segment channel
    ///
    /// Each arming gets its own channel, so segments from an earlier cycle can
    /// never show up on the receiver returned here.
    pub fn arm(&mut self) -> Result<SegmentReceiver, SourceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.recorder.start(tx)?;
        self.armed = true;
        tracing::debug!(handle = %self.id, "Capture handle armed");
        Ok(rx)
    }

    pub fn pause(&mut self) -> Result<(), SourceError> {
        self.recorder.pause()
    }

    pub fn resume(&mut self) -> Result<(), SourceError> {
        self.recorder.resume()
    }

    /// Stop the recorder, then stop every capture track
    ///
    /// Tracks are stopped even when the recorder refuses to stop.
    pub fn finalize(&mut self) -> Result<(), SourceError> {
        let result = self.recorder.stop();
        self.armed = false;
        self.stream.stop_all();
        tracing::debug!(handle = %self.id, "Capture handle finalized");
        result
    }

    /// Drop the handle, stopping its tracks without waiting for output
    pub fn release(mut self) {
        if self.armed {
            if let Err(err) = self.recorder.stop() {
                tracing::debug!(handle = %self.id, "Recorder stop during release failed: {}", err);
            }
        }
        self.stream.stop_all();
        tracing::debug!(handle = %self.id, "Capture handle released");
    }
}

impl fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("id", &self.id)
            .field("video_tracks", &self.stream.tracks_of(TrackKind::Video).count())
            .field("audio_tracks", &self.stream.tracks_of(TrackKind::Audio).count())
            .field("armed", &self.armed)
            .finish()
    }
}

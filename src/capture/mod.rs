//! Capture acquisition
//!
//! This module defines the environment contract for screen and microphone
//! capture, and turns environment sources into a single recorder handle.

pub mod acquisition;
pub mod handle;
pub mod traits;

pub use acquisition::{acquire, AcquisitionError, AcquisitionStage};
pub use handle::CaptureHandle;
pub use traits::{
    CaptureEnvironment, EncoderOptions, MediaRecorder, MediaStream, MediaTrack, Segment,
    SegmentReceiver, SegmentSender, SourceError, SourceErrorKind, TrackKind,
};

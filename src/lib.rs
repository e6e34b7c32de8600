//! Screen Session - recording session lifecycle for screen capture.
//!
//! Acquires a display (and optionally microphone) capture source from a host
//! environment, drives the idle/recording/paused/stopped/error state machine,
//! and exposes the finished recording as a blob with a resolvable URL.

pub mod capture;
pub mod recorder;
pub mod utils;

pub use capture::{
    AcquisitionError, CaptureEnvironment, EncoderOptions, MediaRecorder, MediaStream, MediaTrack,
    Segment, SegmentSender, SourceError, SourceErrorKind, TrackKind,
};
pub use recorder::{
    BlobUrl, RecordingBlob, RecordingEvent, RecordingStatus, SessionConfig, SessionController,
    SessionSnapshot, StartOptions, StartOutcome,
};
pub use utils::error::{ErrorResponse, SessionError, SessionResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
///
/// Honours `RUST_LOG`, falling back to debug output for this crate. Calling it
/// more than once, or after another subscriber was installed, does nothing.
pub fn init_tracing() {
    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "screen_session=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Screen Session v{} logging initialized", env!("CARGO_PKG_VERSION"));
    }
}

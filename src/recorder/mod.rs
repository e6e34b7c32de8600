//! Recording session module
//!
//! This module implements the single-session recording lifecycle:
//! - SessionController owning the capture handle and the state machine
//! - Session state, configuration and snapshots
//! - Blob output and resolvable blob URLs

pub mod controller;
pub mod output;
pub mod state;

pub use controller::{RecordingEvent, SessionController};
pub use output::{BlobStore, BlobUrl, BlobUrlError, RecordingBlob};
pub use state::{
    CapturePeriod, RecordingStatus, SessionCommand, SessionConfig, SessionSnapshot, StartOptions,
    StartOutcome, DEFAULT_START_DELAY_MS,
};

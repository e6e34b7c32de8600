//! Capture acquisition
//!
//! Requests a display source (and optionally a microphone) from the environment
//! and binds the result to a recorder. Acquisition is all-or-nothing: whatever
//! was acquired before a failure is stopped again before the error is returned.

use super::handle::CaptureHandle;
use super::traits::{CaptureEnvironment, EncoderOptions, SourceError, SourceErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Step of acquisition that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionStage {
    Display,
    Microphone,
    Recorder,
}

impl fmt::Display for AcquisitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcquisitionStage::Display => "display",
            AcquisitionStage::Microphone => "microphone",
            AcquisitionStage::Recorder => "recorder",
        };
        f.write_str(name)
    }
}

/// Classified acquisition failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The user declined the capture-source picker
    #[error("Capture source selection was cancelled by the user")]
    UserCancelled,

    #[error("Failed to acquire {stage} capture: {source}")]
    AcquisitionFailed {
        stage: AcquisitionStage,
        #[source]
        source: SourceError,
    },
}

impl AcquisitionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AcquisitionError::UserCancelled)
    }

    fn failed(stage: AcquisitionStage, source: SourceError) -> Self {
        AcquisitionError::AcquisitionFailed { stage, source }
    }
}

/// Map a display request failure onto the two acquisition outcomes
///
/// Only a declined display picker counts as a cancellation.
fn classify_display_error(err: SourceError) -> AcquisitionError {
    match err.kind {
        SourceErrorKind::NotAllowed => AcquisitionError::UserCancelled,
        _ => AcquisitionError::failed(AcquisitionStage::Display, err),
    }
}

/// Acquire a combined capture handle
pub async fn acquire(
    env: &dyn CaptureEnvironment,
    include_audio: bool,
    options: &EncoderOptions,
) -> Result<CaptureHandle, AcquisitionError> {
    tracing::debug!("Requesting display capture (audio: {})", include_audio);

    let mut stream = env.request_display().await.map_err(classify_display_error)?;

    if include_audio {
        match env.request_microphone().await {
            Ok(mic) => stream.merge(mic),
            Err(err) => {
                tracing::warn!("Microphone request failed after display succeeded: {}", err);
                stream.stop_all();
                return Err(AcquisitionError::failed(AcquisitionStage::Microphone, err));
            }
        }
    }

    let recorder = match env.create_recorder(&stream, options) {
        Ok(recorder) => recorder,
        Err(err) => {
            tracing::warn!("Recorder creation failed: {}", err);
            stream.stop_all();
            return Err(AcquisitionError::failed(AcquisitionStage::Recorder, err));
        }
    };

    let handle = CaptureHandle::new(stream, recorder);
    tracing::debug!("Acquired capture handle {:?}", handle);
    Ok(handle)
}

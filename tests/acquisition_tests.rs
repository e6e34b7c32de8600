//! Capture acquisition tests
//!
//! Error classification and the all-or-nothing policy of `acquire`.

mod common;

use common::FakeEnvironment;
use screen_session::capture::{
    acquire, AcquisitionError, AcquisitionStage, EncoderOptions, SourceError, SourceErrorKind,
    TrackKind,
};
use screen_session::MediaTrack;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_acquire_video_and_audio() {
    let env = FakeEnvironment::new();
    let options = EncoderOptions::with_mime_type("video/webm");

    let handle = assert_ok!(acquire(env.as_ref(), true, &options).await);

    assert_eq!(handle.stream().tracks_of(TrackKind::Video).count(), 1);
    assert_eq!(handle.stream().tracks_of(TrackKind::Audio).count(), 1);
    assert_eq!(env.last_recorder().track_count, 2);
    assert_eq!(env.last_recorder().options, options);
}

#[tokio::test]
async fn test_acquire_video_only() {
    let env = FakeEnvironment::new();

    let handle = assert_ok!(acquire(env.as_ref(), false, &EncoderOptions::default()).await);

    assert!(!handle.stream().has_audio());
    assert_eq!(env.microphone_requests(), 0);
}

#[tokio::test]
async fn test_declined_picker_is_cancellation() {
    let env = FakeEnvironment::new();
    env.cancel_display();

    let err = assert_err!(acquire(env.as_ref(), true, &EncoderOptions::default()).await);

    assert_eq!(err, AcquisitionError::UserCancelled);
    assert_eq!(env.microphone_requests(), 0);
    assert!(env.recorders().is_empty());
}

#[tokio::test]
async fn test_display_failure_is_acquisition_failure() {
    let env = FakeEnvironment::new();
    env.fail_display(SourceError::new(SourceErrorKind::Aborted, "compositor restarted"));

    let err = assert_err!(acquire(env.as_ref(), true, &EncoderOptions::default()).await);

    assert!(matches!(
        err,
        AcquisitionError::AcquisitionFailed {
            stage: AcquisitionStage::Display,
            ..
        }
    ));
}

#[tokio::test]
async fn test_audio_failure_stops_video() {
    let env = FakeEnvironment::new();
    env.fail_microphone(SourceError::new(SourceErrorKind::NotFound, "no microphone"));

    let err = assert_err!(acquire(env.as_ref(), true, &EncoderOptions::default()).await);

    assert!(matches!(
        err,
        AcquisitionError::AcquisitionFailed {
            stage: AcquisitionStage::Microphone,
            ..
        }
    ));
    let tracks = env.tracks();
    assert_eq!(tracks.len(), 1);
    assert!(!tracks[0].is_live());
    assert!(env.recorders().is_empty());
}

#[tokio::test]
async fn test_declined_microphone_is_not_cancellation() {
    let env = FakeEnvironment::new();
    env.fail_microphone(SourceError::not_allowed("microphone denied"));

    let err = assert_err!(acquire(env.as_ref(), true, &EncoderOptions::default()).await);

    assert!(!err.is_cancelled());
    assert_eq!(env.live_tracks(), 0);
}

#[tokio::test]
async fn test_recorder_failure_stops_all_tracks() {
    let env = FakeEnvironment::new();
    env.fail_recorder(SourceError::other("unsupported mime type"));

    let err = assert_err!(acquire(env.as_ref(), true, &EncoderOptions::default()).await);

    assert!(matches!(
        err,
        AcquisitionError::AcquisitionFailed {
            stage: AcquisitionStage::Recorder,
            ..
        }
    ));
    assert_eq!(env.tracks().len(), 2);
    assert_eq!(env.live_tracks(), 0);
}

#[tokio::test]
async fn test_release_stops_tracks() {
    let env = FakeEnvironment::new();
    let handle = assert_ok!(acquire(env.as_ref(), true, &EncoderOptions::default()).await);
    assert_eq!(env.live_tracks(), 2);

    handle.release();

    assert_eq!(env.live_tracks(), 0);
    // Never armed, so the recorder is not asked to stop.
    assert_eq!(env.last_recorder().stops(), 0);
}

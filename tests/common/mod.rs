//! Scripted capture environment for session tests
//!
//! Display and microphone requests succeed unless an outcome has been queued.
//! Recorders never emit on their own; tests push segments through the probe.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use screen_session::capture::{
    CaptureEnvironment, EncoderOptions, MediaRecorder, MediaStream, MediaTrack, Segment,
    SegmentSender, SourceError, SourceErrorKind, TrackKind,
};
use screen_session::{SessionConfig, SessionController};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct FakeTrack {
    id: String,
    kind: TrackKind,
    live: AtomicBool,
}

impl MediaTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Inactive,
    Recording,
    Paused,
}

/// Test-side view of a recorder handed to the session
pub struct RecorderProbe {
    state: Mutex<ProbeState>,
    sink: Mutex<Option<SegmentSender>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_next_pause: AtomicBool,
    pub options: EncoderOptions,
    pub track_count: usize,
}

impl RecorderProbe {
    pub fn state(&self) -> ProbeState {
        *self.state.lock()
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn fail_next_pause(&self) {
        self.fail_next_pause.store(true, Ordering::SeqCst);
    }

    /// Push a segment into the channel of the most recent arming
    pub fn emit(&self, segment: Segment) {
        if let Some(sink) = self.sink.lock().as_ref() {
            let _ = sink.send(segment);
        }
    }

    pub fn emit_final(&self, data: &'static [u8]) {
        self.emit(Segment::last(Bytes::from_static(data)));
    }

    /// Drop the sender without a final segment
    pub fn close(&self) {
        self.sink.lock().take();
    }
}

struct FakeRecorder {
    probe: Arc<RecorderProbe>,
}

impl MediaRecorder for FakeRecorder {
    fn start(&mut self, segments: SegmentSender) -> Result<(), SourceError> {
        *self.probe.sink.lock() = Some(segments);
        *self.probe.state.lock() = ProbeState::Recording;
        self.probe.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SourceError> {
        if self.probe.fail_next_pause.swap(false, Ordering::SeqCst) {
            return Err(SourceError::new(SourceErrorKind::InvalidState, "encoder busy"));
        }
        let mut state = self.probe.state.lock();
        if *state != ProbeState::Recording {
            return Err(SourceError::new(SourceErrorKind::InvalidState, "not recording"));
        }
        *state = ProbeState::Paused;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), SourceError> {
        let mut state = self.probe.state.lock();
        if *state != ProbeState::Paused {
            return Err(SourceError::new(SourceErrorKind::InvalidState, "not paused"));
        }
        *state = ProbeState::Recording;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SourceError> {
        *self.probe.state.lock() = ProbeState::Inactive;
        self.probe.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeEnvironment {
    display_outcomes: Mutex<VecDeque<SourceError>>,
    microphone_outcomes: Mutex<VecDeque<SourceError>>,
    recorder_outcomes: Mutex<VecDeque<SourceError>>,
    display_requests: AtomicUsize,
    microphone_requests: AtomicUsize,
    tracks: Mutex<Vec<Arc<FakeTrack>>>,
    recorders: Mutex<Vec<Arc<RecorderProbe>>>,
}

impl FakeEnvironment {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next display request fail
    pub fn fail_display(&self, err: SourceError) {
        self.display_outcomes.lock().push_back(err);
    }

    /// Make the next display request look like a dismissed picker
    pub fn cancel_display(&self) {
        self.fail_display(SourceError::not_allowed("Permission denied by user"));
    }

    pub fn fail_microphone(&self, err: SourceError) {
        self.microphone_outcomes.lock().push_back(err);
    }

    pub fn fail_recorder(&self, err: SourceError) {
        self.recorder_outcomes.lock().push_back(err);
    }

    pub fn display_requests(&self) -> usize {
        self.display_requests.load(Ordering::SeqCst)
    }

    pub fn microphone_requests(&self) -> usize {
        self.microphone_requests.load(Ordering::SeqCst)
    }

    pub fn tracks(&self) -> Vec<Arc<FakeTrack>> {
        self.tracks.lock().clone()
    }

    pub fn live_tracks(&self) -> usize {
        self.tracks().iter().filter(|t| t.is_live()).count()
    }

    pub fn recorders(&self) -> Vec<Arc<RecorderProbe>> {
        self.recorders.lock().clone()
    }

    pub fn last_recorder(&self) -> Arc<RecorderProbe> {
        self.recorders
            .lock()
            .last()
            .cloned()
            .expect("no recorder created")
    }

    fn issue_track(&self, kind: TrackKind) -> MediaStream {
        let mut tracks = self.tracks.lock();
        let track = Arc::new(FakeTrack {
            id: format!("{:?}-{}", kind, tracks.len()),
            kind,
            live: AtomicBool::new(true),
        });
        tracks.push(Arc::clone(&track));
        MediaStream::new(vec![track as Arc<dyn MediaTrack>])
    }
}

#[async_trait]
impl CaptureEnvironment for FakeEnvironment {
    async fn request_display(&self) -> Result<MediaStream, SourceError> {
        self.display_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.display_outcomes.lock().pop_front() {
            return Err(err);
        }
        Ok(self.issue_track(TrackKind::Video))
    }

    async fn request_microphone(&self) -> Result<MediaStream, SourceError> {
        self.microphone_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.microphone_outcomes.lock().pop_front() {
            return Err(err);
        }
        Ok(self.issue_track(TrackKind::Audio))
    }

    fn create_recorder(
        &self,
        stream: &MediaStream,
        options: &EncoderOptions,
    ) -> Result<Box<dyn MediaRecorder>, SourceError> {
        if let Some(err) = self.recorder_outcomes.lock().pop_front() {
            return Err(err);
        }
        let probe = Arc::new(RecorderProbe {
            state: Mutex::new(ProbeState::Inactive),
            sink: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            fail_next_pause: AtomicBool::new(false),
            options: options.clone(),
            track_count: stream.tracks().len(),
        });
        self.recorders.lock().push(Arc::clone(&probe));
        Ok(Box::new(FakeRecorder { probe }))
    }
}

/// A session over a fresh fake environment
pub fn session() -> (Arc<FakeEnvironment>, SessionController) {
    session_with(SessionConfig::default())
}

pub fn session_with(config: SessionConfig) -> (Arc<FakeEnvironment>, SessionController) {
    let env = FakeEnvironment::new();
    let controller = SessionController::new(env.clone(), config);
    (env, controller)
}

/// Let spawned relay tasks run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

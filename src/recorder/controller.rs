//! Session controller
//!
//! Owns the capture handle and the recording status, validates the five
//! session commands against the current state, and turns the final segment of
//! each recording cycle into a blob plus a resolvable URL.

use super::output::{BlobStore, BlobUrl, RecordingBlob};
use super::state::{
    CapturePeriod, RecordingStatus, SessionCommand, SessionConfig, SessionSnapshot, StartOptions,
    StartOutcome,
};
use crate::capture::{
    acquire, AcquisitionError, AcquisitionStage, CaptureEnvironment, CaptureHandle,
    SegmentReceiver,
};
use crate::utils::error::{SessionError, SessionResult};
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Events emitted during a session
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// Recording started
    Started,
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// Recording stopped; output follows with the final segment
    Stopped,
    /// Output blob is available
    OutputReady { url: BlobUrl, size: usize },
    /// The user declined the capture-source picker
    Cancelled,
    /// Acquisition failed
    Error(String),
    /// Session returned to idle
    Reset,
}

/// Mutable session state, guarded by a single lock
#[derive(Default)]
struct SessionInner {
    status: RecordingStatus,

    /// At most one live handle per session
    handle: Option<CaptureHandle>,

    /// Blob of the last completed cycle and its registered URL
    output: Option<(RecordingBlob, BlobUrl)>,

    /// Set only while status is `Error`
    last_error: Option<AcquisitionError>,

    /// Bumped by every start and reset; a pending start holding an older
    /// value must not touch the session
    start_token: u64,

    /// Bumped by every arming and reset; a segment relay holding an older
    /// value must not deliver output
    cycle: u64,

    /// Cycle whose final segment has been handled
    completed_cycle: u64,

    /// Cycle that produced `output`
    output_cycle: u64,

    /// Recording spans of the current cycle
    periods: Vec<CapturePeriod>,

    /// Session clock for period timing
    clock: Option<Instant>,
}

impl SessionInner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            blob: self.output.as_ref().map(|(blob, _)| blob.clone()),
            blob_url: self.output.as_ref().map(|(_, url)| url.clone()),
            error: self.last_error.clone(),
            pending_output: self.status == RecordingStatus::Stopped
                && self.completed_cycle != self.cycle,
            output_is_current: self.output.is_some() && self.output_cycle == self.cycle,
        }
    }

    fn process_time_ms(&self) -> f64 {
        self.clock
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    fn open_period(&mut self) {
        let now = self.process_time_ms();
        let index = self.periods.len();
        self.periods.push(CapturePeriod::new(index, now));
    }

    fn close_period(&mut self) {
        let now = self.process_time_ms();
        if let Some(period) = self.periods.last_mut().filter(|p| p.is_open()) {
            period.end(now);
        }
    }

    /// Check that a handle is held and the session is in `expected`
    fn require(&self, command: SessionCommand, expected: &[RecordingStatus]) -> SessionResult<()> {
        if self.handle.is_none() {
            return Err(SessionError::NoActiveCapture { command });
        }
        if !expected.contains(&self.status) {
            return Err(SessionError::InvalidTransition {
                command,
                status: self.status,
            });
        }
        Ok(())
    }
}

struct Shared {
    env: Arc<dyn CaptureEnvironment>,
    config: SessionConfig,
    blobs: Arc<BlobStore>,
    inner: Mutex<SessionInner>,
    event_tx: broadcast::Sender<RecordingEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(handle) = inner.handle.take() {
            handle.release();
        }
        if let Some((_, url)) = inner.output.take() {
            self.blobs.revoke(&url);
        }
    }
}

/// Controller for a single recording session
///
/// Cloning is cheap and every clone drives the same session. The lock is never
/// held across an await, so commands issued from different tasks interleave
/// without blocking each other.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    /// Create an idle session with its own blob store
    pub fn new(env: Arc<dyn CaptureEnvironment>, config: SessionConfig) -> Self {
        let blobs = Arc::new(BlobStore::new(config.url_origin.clone()));
        Self::with_blob_store(env, config, blobs)
    }

    /// Create an idle session that registers output in `blobs`
    pub fn with_blob_store(
        env: Arc<dyn CaptureEnvironment>,
        config: SessionConfig,
        blobs: Arc<BlobStore>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                env,
                config,
                blobs,
                inner: Mutex::new(SessionInner::default()),
                event_tx,
                snapshot_tx,
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Subscribe to snapshots published after every change
    pub fn subscribe_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.inner.lock().snapshot()
    }

    pub fn status(&self) -> RecordingStatus {
        self.shared.inner.lock().status
    }

    pub fn is_idle(&self) -> bool {
        self.status() == RecordingStatus::Idle
    }

    pub fn is_recording(&self) -> bool {
        self.status() == RecordingStatus::Recording
    }

    pub fn is_paused(&self) -> bool {
        self.status() == RecordingStatus::Paused
    }

    pub fn is_stopped(&self) -> bool {
        self.status() == RecordingStatus::Stopped
    }

    pub fn is_error(&self) -> bool {
        self.status() == RecordingStatus::Error
    }

    pub fn blob(&self) -> Option<RecordingBlob> {
        self.shared.inner.lock().output.as_ref().map(|(blob, _)| blob.clone())
    }

    pub fn blob_url(&self) -> Option<BlobUrl> {
        self.shared.inner.lock().output.as_ref().map(|(_, url)| url.clone())
    }

    pub fn error(&self) -> Option<AcquisitionError> {
        self.shared.inner.lock().last_error.clone()
    }

    /// Id of the held capture handle, if any
    pub fn handle_id(&self) -> Option<Uuid> {
        self.shared.inner.lock().handle.as_ref().map(CaptureHandle::id)
    }

    /// Resolve a blob URL produced by this session
    pub fn resolve_url(&self, url: &BlobUrl) -> Option<RecordingBlob> {
        self.shared.blobs.resolve(url)
    }

    pub fn blob_store(&self) -> Arc<BlobStore> {
        Arc::clone(&self.shared.blobs)
    }

    /// Recording spans of the current cycle
    pub fn periods(&self) -> Vec<CapturePeriod> {
        self.shared.inner.lock().periods.clone()
    }

    /// Recorded time in milliseconds, excluding paused spans
    pub fn duration_ms(&self) -> f64 {
        let inner = self.shared.inner.lock();
        let now = inner.process_time_ms();
        inner
            .periods
            .iter()
            .map(|p| {
                if p.is_open() {
                    now - p.process_time_start_ms
                } else {
                    p.duration_ms
                }
            })
            .sum()
    }

    /// Wait for the output of the current recording cycle
    ///
    /// Resolves once the final segment has been turned into a blob. Returns
    /// `None` if the session is idle, failed, or its cycle ended without output.
    pub async fn wait_for_output(&self) -> Option<(RecordingBlob, BlobUrl)> {
        let mut rx = self.subscribe_snapshots();
        let snapshot = rx
            .wait_for(|s| match s.status {
                RecordingStatus::Stopped => !s.pending_output,
                RecordingStatus::Idle | RecordingStatus::Error => true,
                RecordingStatus::Recording | RecordingStatus::Paused => false,
            })
            .await
            .ok()?
            .clone();

        if snapshot.status != RecordingStatus::Stopped || !snapshot.output_is_current {
            return None;
        }
        snapshot.blob.zip(snapshot.blob_url)
    }

    fn publish(&self, inner: &SessionInner) {
        self.shared.snapshot_tx.send_replace(inner.snapshot());
    }

    fn emit(&self, event: RecordingEvent) {
        let _ = self.shared.event_tx.send(event);
    }

    /// Start recording
    ///
    /// Acquires a capture handle (or reuses the held one when
    /// `use_last_device` is set), waits the start delay, then arms it.
    /// Acquisition failures are absorbed into session state; only a start
    /// issued from the wrong status is returned as an error.
    pub async fn start_recording(&self, options: StartOptions) -> SessionResult<StartOutcome> {
        let (token, reuse) = {
            let mut inner = self.shared.inner.lock();
            if !inner.status.can_start() {
                return Err(SessionError::InvalidTransition {
                    command: SessionCommand::Start,
                    status: inner.status,
                });
            }
            inner.start_token += 1;

            let reuse = options.use_last_device && inner.handle.is_some();
            if options.use_last_device && !reuse {
                tracing::debug!("No previous capture handle, acquiring a new one");
            }
            (inner.start_token, reuse)
        };

        tracing::info!("Starting recording (reuse last device: {})", reuse);

        let acquired = if reuse {
            None
        } else {
            let config = &self.shared.config;
            match acquire(
                self.shared.env.as_ref(),
                config.include_audio,
                &config.encoder_options,
            )
            .await
            {
                Ok(handle) => Some(handle),
                Err(err) => return Ok(self.fail_start(token, err)),
            }
        };

        if !self.is_current(token) {
            return Ok(Self::supersede(acquired));
        }

        let delay = options.delay_or(self.shared.config.default_delay_ms);
        if !delay.is_zero() {
            tracing::debug!("Waiting {:?} before arming capture", delay);
            tokio::time::sleep(delay).await;
        }

        Ok(self.arm(token, acquired))
    }

    fn is_current(&self, token: u64) -> bool {
        self.shared.inner.lock().start_token == token
    }

    fn supersede(acquired: Option<CaptureHandle>) -> StartOutcome {
        tracing::debug!("Start superseded by a later command, discarding its capture");
        if let Some(handle) = acquired {
            handle.release();
        }
        StartOutcome::Superseded
    }

    /// Translate an acquisition failure into session state
    fn fail_start(&self, token: u64, err: AcquisitionError) -> StartOutcome {
        let mut inner = self.shared.inner.lock();
        if inner.start_token != token {
            return Self::supersede(None);
        }

        if err.is_cancelled() {
            tracing::info!("Capture source selection cancelled, session unchanged");
            self.emit(RecordingEvent::Cancelled);
            return StartOutcome::Cancelled;
        }

        tracing::error!("Failed to start recording: {}", err);
        if let Some(old) = inner.handle.take() {
            old.release();
        }
        inner.status = RecordingStatus::Error;
        inner.last_error = Some(err.clone());
        self.publish(&inner);
        self.emit(RecordingEvent::Error(err.to_string()));
        StartOutcome::Failed
    }

    /// Install the acquired handle (if any) and start the recorder
    fn arm(&self, token: u64, acquired: Option<CaptureHandle>) -> StartOutcome {
        let mut inner = self.shared.inner.lock();
        if inner.start_token != token {
            return Self::supersede(acquired);
        }

        if let Some(handle) = acquired {
            if let Some(old) = inner.handle.replace(handle) {
                tracing::debug!("Releasing previous capture handle {}", old.id());
                old.release();
            }
        }

        let armed = match inner.handle.as_mut() {
            Some(handle) => handle.arm().map(|rx| (rx, handle.id())),
            None => return Self::supersede(None),
        };

        match armed {
            Ok((segments, handle_id)) => {
                inner.cycle += 1;
                let cycle = inner.cycle;
                inner.status = RecordingStatus::Recording;
                inner.last_error = None;
                inner.clock = Some(Instant::now());
                inner.periods.clear();
                inner.open_period();

                self.spawn_relay(cycle, segments);
                self.publish(&inner);
                self.emit(RecordingEvent::Started);
                tracing::info!(handle = %handle_id, "Recording started (cycle {})", cycle);
                StartOutcome::Recording
            }
            Err(source) => {
                tracing::error!("Failed to arm capture handle: {}", source);
                if let Some(handle) = inner.handle.take() {
                    handle.release();
                }
                let err = AcquisitionError::AcquisitionFailed {
                    stage: AcquisitionStage::Recorder,
                    source,
                };
                inner.status = RecordingStatus::Error;
                inner.last_error = Some(err.clone());
                self.publish(&inner);
                self.emit(RecordingEvent::Error(err.to_string()));
                StartOutcome::Failed
            }
        }
    }

    /// Pause recording
    pub fn pause_recording(&self) -> SessionResult<()> {
        let mut inner = self.shared.inner.lock();
        inner.require(SessionCommand::Pause, &[RecordingStatus::Recording])?;

        if let Some(handle) = inner.handle.as_mut() {
            handle.pause().map_err(|source| SessionError::Recorder {
                command: SessionCommand::Pause,
                source,
            })?;
        }

        inner.close_period();
        inner.status = RecordingStatus::Paused;
        self.publish(&inner);
        self.emit(RecordingEvent::Paused);
        tracing::info!("Recording paused");
        Ok(())
    }

    /// Resume recording
    pub fn resume_recording(&self) -> SessionResult<()> {
        let mut inner = self.shared.inner.lock();
        inner.require(SessionCommand::Resume, &[RecordingStatus::Paused])?;

        if let Some(handle) = inner.handle.as_mut() {
            handle.resume().map_err(|source| SessionError::Recorder {
                command: SessionCommand::Resume,
                source,
            })?;
        }

        inner.open_period();
        inner.status = RecordingStatus::Recording;
        self.publish(&inner);
        self.emit(RecordingEvent::Resumed);
        tracing::info!("Recording resumed");
        Ok(())
    }

    /// Stop recording
    ///
    /// Stops the recorder and every capture track. The handle stays held so a
    /// later start can reuse it; the blob arrives with the final segment.
    pub fn stop_recording(&self) -> SessionResult<()> {
        let mut inner = self.shared.inner.lock();
        inner.require(
            SessionCommand::Stop,
            &[RecordingStatus::Recording, RecordingStatus::Paused],
        )?;

        if let Some(handle) = inner.handle.as_mut() {
            if let Err(err) = handle.finalize() {
                tracing::warn!("Recorder reported an error while stopping: {}", err);
            }
        }

        inner.close_period();
        inner.start_token += 1;
        inner.status = RecordingStatus::Stopped;
        self.publish(&inner);
        self.emit(RecordingEvent::Stopped);

        let total_duration_ms: f64 = inner.periods.iter().map(|p| p.duration_ms).sum();
        tracing::info!("Recording stopped. Duration: {:.0}ms", total_duration_ms);
        Ok(())
    }

    /// Return to idle from any state
    ///
    /// Releases the capture handle, revokes the blob URL and clears the error.
    /// Pending starts and segment relays are invalidated.
    pub fn reset_recording(&self) {
        let mut inner = self.shared.inner.lock();
        inner.start_token += 1;
        inner.cycle += 1;
        inner.completed_cycle = inner.cycle;

        if let Some(handle) = inner.handle.take() {
            handle.release();
        }
        if let Some((_, url)) = inner.output.take() {
            self.shared.blobs.revoke(&url);
        }

        inner.last_error = None;
        inner.periods.clear();
        inner.clock = None;
        inner.status = RecordingStatus::Idle;
        self.publish(&inner);
        self.emit(RecordingEvent::Reset);
        tracing::info!("Recording session reset");
    }

    /// Collect the segments of one cycle off the current task
    fn spawn_relay(&self, cycle: u64, mut segments: SegmentReceiver) {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let mut buffer = BytesMut::new();
            let mut finished = false;
            while let Some(segment) = segments.recv().await {
                buffer.extend_from_slice(&segment.data);
                if segment.is_final {
                    finished = true;
                    break;
                }
            }

            if !finished {
                tracing::debug!("Segment channel for cycle {} closed before the final segment", cycle);
            }
            let data = (finished || !buffer.is_empty()).then(|| buffer.freeze());
            Self::deliver(shared, cycle, data);
        });
    }

    /// Turn the data of a finished cycle into the session output
    fn deliver(shared: Weak<Shared>, cycle: u64, data: Option<Bytes>) {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let controller = SessionController { shared };
        let mut inner = controller.shared.inner.lock();

        if inner.cycle != cycle {
            tracing::warn!(
                "Dropping output of stale recording cycle {} (current {})",
                cycle,
                inner.cycle
            );
            return;
        }
        inner.completed_cycle = cycle;

        let Some(data) = data else {
            tracing::warn!("Recording cycle {} ended without output", cycle);
            controller.publish(&inner);
            return;
        };

        let blobs = &controller.shared.blobs;
        let blob = RecordingBlob::new(data, controller.shared.config.output_mime_type());
        let size = blob.len();
        let url = blobs.register(blob.clone());
        if let Some((_, previous)) = inner.output.replace((blob, url.clone())) {
            blobs.revoke(&previous);
        }
        inner.output_cycle = cycle;

        controller.publish(&inner);
        controller.emit(RecordingEvent::OutputReady {
            url: url.clone(),
            size,
        });
        tracing::info!("Recording output ready: {} ({} bytes)", url, size);
    }
}

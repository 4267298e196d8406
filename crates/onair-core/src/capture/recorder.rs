//! Recording lifecycle and the background encode worker
//!
//! `start` spawns one worker thread per recording. The worker owns the
//! encoder exclusively: it initializes it, acknowledges readiness, then
//! drains batches from the block ring until the end marker arrives (or the
//! batcher disappears), finalizes and hands the asset back through a oneshot.
//!
//! ```text
//! render thread                      encoder thread
//!   CaptureBatcher ──CaptureBlock──▶  EncodeSession
//!        ▲                                  │
//!        └──────────── Vec<f32> ────────────┘   (recycled buffers)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use rtrb::{Consumer, Producer, RingBuffer};
use thiserror::Error;
use tokio::sync::oneshot;

use super::batcher::CaptureBatcher;
use super::encoder::{EncoderFactory, EncoderSpec};
use super::message::{CaptureBlock, CaptureTap, RecordingEvent};
use super::session::{BatchOutcome, EncodeSession, RecordedAsset};
use crate::config::CaptureConfig;
use crate::engine::EngineDiagnostics;

/// How long the worker sleeps when the block ring is empty
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("A recording is already in progress")]
    AlreadyRecording,

    #[error("No recording in progress")]
    NotRecording,

    #[error("Encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("Recording finalize failed: {0}")]
    Finalize(String),

    #[error("Encoder worker went away")]
    WorkerGone,

    #[error("Engine command queue is full")]
    QueueFull,

    #[error("Failed to spawn encoder thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// An active recording as seen by the control thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingSession {
    pub tap: CaptureTap,
    /// Effective encoder format
    pub spec: EncoderSpec,
}

/// Resolves to the finished asset once the worker has finalized
///
/// Block with [`FinalizeHandle::wait`] or `.await` it.
pub struct FinalizeHandle {
    rx: oneshot::Receiver<RecordingResult<RecordedAsset>>,
    worker: Option<JoinHandle<()>>,
}

impl FinalizeHandle {
    /// Block until the asset is ready (not from inside an async runtime)
    pub fn wait(mut self) -> RecordingResult<RecordedAsset> {
        let result = self.rx.blocking_recv().unwrap_or(Err(RecordingError::WorkerGone));
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        result
    }
}

impl Future for FinalizeHandle {
    type Output = RecordingResult<RecordedAsset>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(RecordingError::WorkerGone)))
    }
}

struct ActiveRecording {
    session: RecordingSession,
    finalize_rx: oneshot::Receiver<RecordingResult<RecordedAsset>>,
    worker: JoinHandle<()>,
}

/// Owns the recording lifecycle; at most one session at a time
pub struct Recorder {
    config: CaptureConfig,
    sample_rate: u32,
    factory: EncoderFactory,
    diagnostics: Arc<EngineDiagnostics>,
    events_tx: Sender<RecordingEvent>,
    events_rx: Receiver<RecordingEvent>,
    active: Option<ActiveRecording>,
}

impl Recorder {
    pub fn new(
        config: CaptureConfig,
        sample_rate: u32,
        factory: EncoderFactory,
        diagnostics: Arc<EngineDiagnostics>,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            config,
            sample_rate,
            factory,
            diagnostics,
            events_tx,
            events_rx,
            active: None,
        }
    }

    /// Lifecycle events of every recording
    pub fn events(&self) -> Receiver<RecordingEvent> {
        self.events_rx.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<RecordingSession> {
        self.active.as_ref().map(|a| a.session)
    }

    /// Spawn the worker and wait until the encoder is ready
    ///
    /// Returns the session and the batcher to install in the engine. An
    /// encoder that fails to initialize aborts the session immediately.
    pub fn start(&mut self, tap: CaptureTap) -> RecordingResult<(RecordingSession, CaptureBatcher)> {
        if self.active.is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let pool = self.config.pool_size.max(1);
        let batch_size = self.config.batch_size.max(1);
        let (blocks_tx, blocks_rx) = RingBuffer::<CaptureBlock>::new(pool + 2);
        let (mut recycle_tx, recycle_rx) = RingBuffer::<Vec<f32>>::new(pool + 2);
        for _ in 0..pool {
            let _ = recycle_tx.push(Vec::with_capacity(batch_size));
        }

        let requested = EncoderSpec {
            sample_rate: self.sample_rate,
            channels: self.config.channels.clamp(1, 2),
            bit_rate_kbps: self.config.bit_rate_kbps,
        };
        let (ready_tx, ready_rx) = oneshot::channel();
        let (finalize_tx, finalize_rx) = oneshot::channel();

        let worker = EncodeWorker {
            factory: Arc::clone(&self.factory),
            requested,
            progress_interval_secs: self.config.progress_interval_secs,
            blocks: blocks_rx,
            recycle: recycle_tx,
            events: self.events_tx.clone(),
        };
        let handle = std::thread::Builder::new()
            .name("onair-encoder".to_string())
            .spawn(move || worker.run(ready_tx, finalize_tx))?;

        let spec = match ready_rx.blocking_recv() {
            Ok(Ok(spec)) => spec,
            Ok(Err(message)) => {
                let _ = handle.join();
                return Err(RecordingError::EncoderInit(message));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(RecordingError::WorkerGone);
            }
        };

        let session = RecordingSession { tap, spec };
        log::info!(
            "Recording started ({:?}, {} Hz, {} ch)",
            tap,
            spec.sample_rate,
            spec.channels
        );

        let batcher = CaptureBatcher::new(
            tap,
            batch_size,
            blocks_tx,
            recycle_rx,
            Arc::clone(&self.diagnostics),
        );
        self.active = Some(ActiveRecording {
            session,
            finalize_rx,
            worker: handle,
        });
        Ok((session, batcher))
    }

    /// Detach the active session and return its finalize handle
    ///
    /// The caller must also tell the engine to flush its batcher; the
    /// handle resolves once the worker has seen the end of the stream.
    pub fn stop(&mut self) -> RecordingResult<FinalizeHandle> {
        let active = self.active.take().ok_or(RecordingError::NotRecording)?;
        log::info!("Recording stopping");
        Ok(FinalizeHandle {
            rx: active.finalize_rx,
            worker: Some(active.worker),
        })
    }
}

/// Everything the encoder thread owns
struct EncodeWorker {
    factory: EncoderFactory,
    requested: EncoderSpec,
    progress_interval_secs: f64,
    blocks: Consumer<CaptureBlock>,
    recycle: Producer<Vec<f32>>,
    events: Sender<RecordingEvent>,
}

impl EncodeWorker {
    fn run(
        mut self,
        ready: oneshot::Sender<Result<EncoderSpec, String>>,
        finalize: oneshot::Sender<RecordingResult<RecordedAsset>>,
    ) {
        let encoder = match (self.factory)(&self.requested) {
            Ok(encoder) => encoder,
            Err(e) => {
                log::error!("Encoder init failed: {}", e);
                let _ = self.events.send(RecordingEvent::Error {
                    message: e.to_string(),
                    fatal: true,
                });
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };

        let mut session = EncodeSession::new(encoder, self.progress_interval_secs);
        let _ = ready.send(Ok(*session.spec()));
        let _ = self.events.send(RecordingEvent::Ready);

        loop {
            match self.blocks.pop() {
                Ok(CaptureBlock::Batch(mut batch)) => {
                    self.handle_batch(&mut session, &batch);
                    batch.clear();
                    let _ = self.recycle.push(batch);
                }
                Ok(CaptureBlock::End { total_frames }) => {
                    log::debug!("Capture stream ended after {} frames", total_frames);
                    break;
                }
                Err(_) => {
                    if self.blocks.is_abandoned() {
                        log::warn!("Capture stream dropped without end marker");
                        break;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }

        let result = session.finish();
        match result {
            Ok(asset) => {
                log::info!(
                    "Recording finalized: {:.2}s, {} bytes",
                    asset.duration_seconds,
                    asset.bytes.len()
                );
                let _ = self.events.send(RecordingEvent::Complete {
                    asset: asset.clone(),
                });
                let _ = finalize.send(Ok(asset));
            }
            Err(e) => {
                log::error!("Recording finalize failed: {}", e);
                let _ = self.events.send(RecordingEvent::Error {
                    message: e.to_string(),
                    fatal: true,
                });
                let _ = finalize.send(Err(RecordingError::Finalize(e.to_string())));
            }
        }
    }

    fn handle_batch(&self, session: &mut EncodeSession, batch: &[f32]) {
        match session.push_batch(batch) {
            BatchOutcome::Accepted | BatchOutcome::Dropped => {}
            BatchOutcome::Progress { bytes, seconds } => {
                let _ = self.events.send(RecordingEvent::Progress { bytes, seconds });
            }
            BatchOutcome::Failed(message) => {
                log::warn!("Encode error, dropping further audio: {}", message);
                let _ = self.events.send(RecordingEvent::Error {
                    message,
                    fatal: false,
                });
            }
        }
    }
}

//! Capture and encode pipeline
//!
//! The render thread batches program (or monitor) audio in a
//! [`CaptureBatcher`]; a dedicated worker thread encodes the batches and
//! assembles a [`RecordedAsset`]; the [`Recorder`] drives the lifecycle from
//! the control thread.

mod batcher;
mod encoder;
mod message;
mod recorder;
mod session;

pub use batcher::CaptureBatcher;
pub use encoder::{
    f32_to_i16, wav_encoder_factory, AudioEncoder, EncodeError, EncodeResult, EncoderFactory,
    EncoderSpec, WavEncoder, FRAME_SIZE,
};
pub use message::{CaptureBlock, CaptureTap, RecordingEvent};
pub use recorder::{FinalizeHandle, Recorder, RecordingError, RecordingResult, RecordingSession};
pub use session::{BatchOutcome, EncodeSession, RecordedAsset};

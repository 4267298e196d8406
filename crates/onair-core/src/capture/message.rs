//! Messages crossing the capture pipeline
//!
//! Render → encoder: [`CaptureBlock`] over an `rtrb` ring, by move.
//! Encoder → control: [`RecordingEvent`] over a crossbeam channel.
//!
//! Lifecycle of one recording:
//!
//! Ready → Progress → ... → Complete (or Error with `fatal` set)

use super::RecordedAsset;

/// Which signal a recording captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureTap {
    /// The limited broadcast output
    #[default]
    Program,
    /// The local monitor mix
    Monitor,
}

impl std::str::FromStr for CaptureTap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "program" | "broadcast" => Ok(CaptureTap::Program),
            "monitor" => Ok(CaptureTap::Monitor),
            other => Err(format!("unknown capture source: {}", other)),
        }
    }
}

/// A unit of work handed from the render thread to the encoder
#[derive(Debug)]
pub enum CaptureBlock {
    /// A full (or final partial) batch of mono samples
    Batch(Vec<f32>),
    /// No more batches follow
    End { total_frames: u64 },
}

/// Recording lifecycle events for the control thread
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// The encoder is set up and accepting batches
    Ready,
    /// Coarse size report
    Progress {
        /// Encoded bytes so far
        bytes: u64,
        /// Encoded audio so far
        seconds: f64,
    },
    /// Final asset assembled
    Complete { asset: RecordedAsset },
    /// Something went wrong; `fatal` means the session produced nothing
    Error { message: String, fatal: bool },
}

impl RecordingEvent {
    /// Human-readable one-liner
    pub fn description(&self) -> String {
        match self {
            Self::Ready => "Recording ready".to_string(),
            Self::Progress { bytes, seconds } => {
                format!("Recording: {:.1}s, {} KiB", seconds, bytes / 1024)
            }
            Self::Complete { asset } => format!(
                "Recording complete: {:.2}s, {} bytes",
                asset.duration_seconds,
                asset.bytes.len()
            ),
            Self::Error { message, fatal } => {
                if *fatal {
                    format!("Recording failed: {}", message)
                } else {
                    format!("Recording error: {}", message)
                }
            }
        }
    }
}

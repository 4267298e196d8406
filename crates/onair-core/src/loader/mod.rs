//! Pad sample loading
//!
//! Decoding and resampling run on the control thread; the audio thread only
//! receives finished [`PadSample`] buffers.

mod pad_sample;

pub use pad_sample::{load_pad_file, PadLoadError, PadLoadResult, PadSample};

//! Soundboard - sample pads summed into the soundboard bus
//!
//! Each pad owns its own gain stage between its sample and the bus, so one
//! pad's level never affects another. Samples arrive already decoded and
//! resampled as `basedrop::Shared` buffers; replacing or unloading a pad on
//! the audio thread only enqueues the old buffer for the GC thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use super::gain_stage::GainStage;
use crate::loader::PadSample;
use crate::types::{StereoBuffer, MAX_BLOCK_SIZE};

/// Number of pad slots
pub const NUM_PADS: usize = 8;

/// Highest per-pad gain
pub const MAX_PAD_GAIN: f32 = 3.0;

/// Clamp a pad gain into 0..3; NaN becomes unity
pub fn clamp_pad_gain(gain: f32) -> f32 {
    if gain.is_nan() {
        1.0
    } else {
        gain.clamp(0.0, MAX_PAD_GAIN)
    }
}

/// Lock-free pad state for the control thread
///
/// Written by the audio thread after every block, read from anywhere.
#[derive(Debug, Default)]
pub struct PadAtomics {
    pub loaded: AtomicBool,
    pub playing: AtomicBool,
    pub looping: AtomicBool,
    /// Playhead in frames
    pub position: AtomicU64,
    /// Sample length in frames
    pub length: AtomicU64,
}

impl PadAtomics {
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }
}

struct PadVoice {
    sample: Option<Shared<PadSample>>,
    playhead: usize,
    playing: bool,
    looping: bool,
    gain: GainStage,
    atomics: Arc<PadAtomics>,
}

impl PadVoice {
    fn new() -> Self {
        Self {
            sample: None,
            playhead: 0,
            playing: false,
            looping: false,
            gain: GainStage::unity(),
            atomics: Arc::new(PadAtomics::default()),
        }
    }

    /// Copy the next block of the sample into `out`, advancing the playhead
    fn read_into(&mut self, out: &mut StereoBuffer) {
        out.fill_silence();
        let Some(sample) = self.sample.as_ref() else {
            self.playing = false;
            return;
        };
        let frames = sample.frames.as_slice();
        if frames.is_empty() {
            self.playing = false;
            return;
        }

        let dst = out.as_mut_slice();
        let mut written = 0;
        while written < dst.len() {
            if self.playhead >= frames.len() {
                if self.looping {
                    self.playhead = 0;
                } else {
                    self.playing = false;
                    self.playhead = 0;
                    break;
                }
            }
            let n = (frames.len() - self.playhead).min(dst.len() - written);
            dst[written..written + n]
                .copy_from_slice(&frames[self.playhead..self.playhead + n]);
            written += n;
            self.playhead += n;
        }

        // A one-shot that lands exactly on its last frame is done too
        if !self.looping && self.playhead >= frames.len() {
            self.playing = false;
            self.playhead = 0;
        }
    }

    fn publish(&self) {
        let a = &self.atomics;
        a.playing.store(self.playing, Ordering::Relaxed);
        a.looping.store(self.looping, Ordering::Relaxed);
        a.position.store(self.playhead as u64, Ordering::Relaxed);
    }
}

pub struct Soundboard {
    pads: [PadVoice; NUM_PADS],
    voice: StereoBuffer,
}

impl Default for Soundboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Soundboard {
    pub fn new() -> Self {
        Self {
            pads: std::array::from_fn(|_| PadVoice::new()),
            voice: StereoBuffer::silence(MAX_BLOCK_SIZE),
        }
    }

    /// Shared atomics of one pad (for the control thread)
    pub fn atomics(&self, pad: usize) -> Option<Arc<PadAtomics>> {
        self.pads.get(pad).map(|p| Arc::clone(&p.atomics))
    }

    /// Put a sample in a pad; playback stops and the playhead rewinds
    pub fn load(&mut self, pad: usize, sample: Shared<PadSample>) {
        let Some(voice) = self.pads.get_mut(pad) else {
            return;
        };
        voice.atomics.length.store(sample.len() as u64, Ordering::Relaxed);
        voice.atomics.loaded.store(true, Ordering::Relaxed);
        voice.sample = Some(sample);
        voice.playing = false;
        voice.playhead = 0;
        voice.publish();
    }

    /// Empty a pad and reset its controls
    pub fn unload(&mut self, pad: usize) {
        let Some(voice) = self.pads.get_mut(pad) else {
            return;
        };
        voice.sample = None;
        voice.playing = false;
        voice.looping = false;
        voice.playhead = 0;
        voice.gain.jump_to(1.0);
        voice.atomics.loaded.store(false, Ordering::Relaxed);
        voice.atomics.length.store(0, Ordering::Relaxed);
        voice.publish();
    }

    /// Start a pad from the top; empty pads ignore this
    pub fn play(&mut self, pad: usize) {
        if let Some(voice) = self.pads.get_mut(pad) {
            if voice.sample.is_some() {
                voice.playing = true;
                voice.playhead = 0;
                voice.publish();
            }
        }
    }

    pub fn stop(&mut self, pad: usize) {
        if let Some(voice) = self.pads.get_mut(pad) {
            voice.playing = false;
            voice.playhead = 0;
            voice.publish();
        }
    }

    pub fn set_loop(&mut self, pad: usize, looping: bool) {
        if let Some(voice) = self.pads.get_mut(pad) {
            voice.looping = looping;
            voice.publish();
        }
    }

    pub fn set_gain(&mut self, pad: usize, gain: f32) {
        if let Some(voice) = self.pads.get_mut(pad) {
            voice.gain.set_target(clamp_pad_gain(gain));
        }
    }

    /// Sum every playing, connected pad into `bus`
    ///
    /// `bus` is overwritten and takes length `len`. Unconnected pads keep
    /// playing silently so their playheads stay consistent.
    pub fn render(&mut self, connected: &[bool; NUM_PADS], len: usize, bus: &mut StereoBuffer) {
        bus.set_len_from_capacity(len);
        bus.fill_silence();
        self.voice.set_len_from_capacity(len);

        for (voice, &connected) in self.pads.iter_mut().zip(connected.iter()) {
            if !voice.playing {
                continue;
            }
            voice.read_into(&mut self.voice);
            if connected {
                voice.gain.mix_into(&self.voice, bus);
            }
            voice.publish();
        }
    }
}

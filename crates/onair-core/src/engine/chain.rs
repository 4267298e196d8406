//! Render-side effects chain
//!
//! Holds one processor per effect kind and runs the enabled ones in the
//! static order. A new topology is never applied mid-block: it waits as
//! `pending` until the end of the current block, which fades out across its
//! last [`DECLICK_SAMPLES`]; the next block runs the new path and fades in.

use basedrop::Owned;

use crate::effect::native::{
    CompressorEffect, DelayEffect, EnhanceEffect, PitchShiftEffect, ReverbEffect, ReverbImpulse,
    ToneEffect,
};
use crate::effect::{ChainNode, ChainTopology, Effect, EffectKind, EffectSettings};
use crate::types::StereoBuffer;

/// Ramp length around a topology swap
pub const DECLICK_SAMPLES: usize = 64;

/// One instance of every built-in processor
pub struct EffectRack {
    enhance: EnhanceEffect,
    tone: ToneEffect,
    compressor: CompressorEffect,
    pitch_shift: PitchShiftEffect,
    delay: DelayEffect,
    reverb: ReverbEffect,
}

impl EffectRack {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            enhance: EnhanceEffect::new(sample_rate),
            tone: ToneEffect::new(sample_rate),
            compressor: CompressorEffect::new(sample_rate),
            pitch_shift: PitchShiftEffect::new(sample_rate),
            delay: DelayEffect::new(sample_rate),
            reverb: ReverbEffect::new(sample_rate),
        }
    }

    pub fn get_mut(&mut self, kind: EffectKind) -> &mut dyn Effect {
        match kind {
            EffectKind::Enhance => &mut self.enhance,
            EffectKind::Tone => &mut self.tone,
            EffectKind::Compressor => &mut self.compressor,
            EffectKind::PitchShift => &mut self.pitch_shift,
            EffectKind::Delay => &mut self.delay,
            EffectKind::Reverb => &mut self.reverb,
        }
    }

    /// Route settings to the processor of their kind
    pub fn apply(&mut self, settings: &EffectSettings) {
        self.get_mut(settings.kind()).apply(settings);
    }

    pub fn reverb_mut(&mut self) -> &mut ReverbEffect {
        &mut self.reverb
    }
}

pub struct RenderChain {
    rack: EffectRack,
    topology: ChainTopology,
    pending: Option<ChainTopology>,
    fade_in: bool,
}

impl RenderChain {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            rack: EffectRack::new(sample_rate),
            topology: ChainTopology::default(),
            pending: None,
            fade_in: false,
        }
    }

    /// Topology the last block ran with
    pub fn topology(&self) -> ChainTopology {
        self.topology
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Queue a new path; it takes over after the current block
    pub fn set_topology(&mut self, topology: ChainTopology) {
        if topology == self.topology {
            self.pending = None;
        } else {
            self.pending = Some(topology);
        }
    }

    pub fn apply(&mut self, settings: &EffectSettings) {
        self.rack.apply(settings);
    }

    pub fn set_impulse(&mut self, impulse: Owned<ReverbImpulse>) {
        self.rack.reverb_mut().set_impulse(impulse);
    }

    /// Combined latency of the enabled processors
    #[cfg(test)]
    pub fn latency_samples(&mut self) -> u32 {
        let topology = self.topology;
        topology
            .kinds()
            .map(|kind| self.rack.get_mut(kind).latency_samples())
            .sum()
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        let topology = self.topology;
        for (_, to) in topology.edges() {
            if let ChainNode::Effect(kind) = to {
                self.rack.get_mut(kind).process(buffer);
            }
        }

        if self.fade_in {
            fade(buffer, true);
            self.fade_in = false;
        }

        if let Some(next) = self.pending.take() {
            fade(buffer, false);
            // Freshly inserted processors start from silence
            for kind in next.kinds() {
                if !self.topology.is_enabled(kind) {
                    self.rack.get_mut(kind).reset();
                }
            }
            self.topology = next;
            self.fade_in = true;
        }
    }
}

/// Linear ramp over the head (fade in) or tail (fade out) of a block
fn fade(buffer: &mut StereoBuffer, fade_in: bool) {
    let len = buffer.len();
    let n = DECLICK_SAMPLES.min(len);
    if n == 0 {
        return;
    }
    let samples = buffer.as_mut_slice();
    if fade_in {
        for (i, s) in samples[..n].iter_mut().enumerate() {
            *s *= i as f32 / n as f32;
        }
    } else {
        for (i, s) in samples[len - n..].iter_mut().enumerate() {
            *s *= 1.0 - (i + 1) as f32 / n as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{param_map, EffectParams};
    use crate::types::StereoSample;

    fn dc_block(len: usize) -> StereoBuffer {
        StereoBuffer::from_vec(vec![StereoSample::mono(0.5); len])
    }

    #[test]
    fn test_empty_chain_is_transparent() {
        let mut chain = RenderChain::new(48000);
        let mut buf = dc_block(128);
        chain.process(&mut buf);
        assert!(buf.iter().all(|s| (s.left - 0.5).abs() < 1e-7));
    }

    #[test]
    fn test_swap_waits_for_block_end_and_declicks() {
        let mut chain = RenderChain::new(48000);
        chain.set_topology(ChainTopology::with_enabled(&[EffectKind::Tone]));
        assert!(chain.has_pending());

        let mut buf = dc_block(128);
        chain.process(&mut buf);
        // Old path for the whole block, tail faded to silence
        assert!(chain.topology().is_enabled(EffectKind::Tone));
        assert!((buf[0].left - 0.5).abs() < 1e-7);
        assert!(buf[127].left.abs() < 1e-7);
        assert!(buf[127 - DECLICK_SAMPLES].left > 0.49);

        let mut buf = dc_block(128);
        chain.process(&mut buf);
        assert_eq!(buf[0].left, 0.0);
        assert!(buf[DECLICK_SAMPLES / 2].left < buf[DECLICK_SAMPLES].left);

        // Flat tone leaves the settled signal alone
        let mut buf = dc_block(128);
        chain.process(&mut buf);
        assert!((buf[64].left - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_same_topology_cancels_pending() {
        let mut chain = RenderChain::new(48000);
        chain.set_topology(ChainTopology::with_enabled(&[EffectKind::Delay]));
        chain.set_topology(ChainTopology::default());
        assert!(!chain.has_pending());
    }

    #[test]
    fn test_settings_reach_processor() {
        let mut chain = RenderChain::new(48000);
        let mut params = EffectParams::default_for(EffectKind::PitchShift);
        params.merge(&param_map([("shift", 75.0)]));
        chain.apply(&params.settings());
        chain.set_topology(ChainTopology::with_enabled(&[EffectKind::Reverb]));
        let mut buf = dc_block(128);
        chain.process(&mut buf);
        assert!(chain.latency_samples() > 0);
    }
}

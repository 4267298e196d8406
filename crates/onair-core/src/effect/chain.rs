//! Control-side effects chain manager
//!
//! Owns the enabled flag and parameter record of every slot. Toggling an
//! effect produces a fresh [`ChainTopology`] snapshot; the render thread
//! swaps it in between blocks, so audio never sees a half-built path.

use super::params::{EffectKind, EffectParams, EffectSettings, ImpulseShape, ParamMap, NUM_EFFECTS};
use crate::engine::GATE_DISABLED_DB;

/// An endpoint in the rebuilt signal path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainNode {
    /// Where the gated mic signal enters the chain
    Input,
    Effect(EffectKind),
    /// Where the chain feeds the mic channel of the mixer
    Output,
}

/// Snapshot of which slots are wired into the path
///
/// Disabled slots are absent from the path entirely. The value is `Copy` so
/// it can travel through the command queue as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChainTopology {
    enabled: [bool; NUM_EFFECTS],
}

impl ChainTopology {
    /// Topology with exactly the given kinds enabled
    pub fn with_enabled(kinds: &[EffectKind]) -> Self {
        let mut topology = Self::default();
        for kind in kinds {
            topology.enabled[kind.index()] = true;
        }
        topology
    }

    #[inline]
    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        self.enabled[kind.index()]
    }

    /// Enabled kinds in chain order
    pub fn kinds(&self) -> impl Iterator<Item = EffectKind> + '_ {
        EffectKind::ALL
            .into_iter()
            .filter(move |kind| self.enabled[kind.index()])
    }

    pub fn len(&self) -> usize {
        self.enabled.iter().filter(|e| **e).count()
    }

    /// True when the input connects straight to the output
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The connections of the rebuilt path, in signal order
    ///
    /// Walks the static order from the input. Each enabled slot is connected
    /// from the current output and becomes the new current output. Disabled
    /// slots are skipped, and the last current output connects to the chain
    /// output. Does not allocate, so the render thread walks it directly.
    pub fn edges(&self) -> impl Iterator<Item = (ChainNode, ChainNode)> + '_ {
        self.kinds()
            .map(ChainNode::Effect)
            .chain(std::iter::once(ChainNode::Output))
            .scan(ChainNode::Input, |current, node| {
                let edge = (*current, node);
                *current = node;
                Some(edge)
            })
    }
}

/// Enabled flag and parameters of one slot
#[derive(Debug, Clone, PartialEq)]
pub struct EffectState {
    pub kind: EffectKind,
    pub enabled: bool,
    pub params: EffectParams,
}

impl EffectState {
    fn new(kind: EffectKind) -> Self {
        Self {
            kind,
            enabled: false,
            params: EffectParams::default_for(kind),
        }
    }

    /// Parameters as a key -> value map
    pub fn param_map(&self) -> ParamMap {
        self.params.to_map()
    }
}

/// What the render side needs after a parameter update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectUpdate {
    pub settings: EffectSettings,
    /// Set when the reverb impulse response has to be regenerated
    pub impulse: Option<ImpulseShape>,
    /// Set when the enhance gate moved while enhance is enabled
    pub gate_threshold_db: Option<f32>,
}

/// The six slots and their state
#[derive(Debug, Clone)]
pub struct EffectsChain {
    slots: [EffectState; NUM_EFFECTS],
}

impl Default for EffectsChain {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectsChain {
    /// All effects disabled, default parameters
    pub fn new() -> Self {
        Self {
            slots: EffectKind::ALL.map(EffectState::new),
        }
    }

    pub fn state(&self, kind: EffectKind) -> &EffectState {
        &self.slots[kind.index()]
    }

    pub fn states(&self) -> &[EffectState] {
        &self.slots
    }

    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        self.slots[kind.index()].enabled
    }

    /// Current path snapshot
    pub fn topology(&self) -> ChainTopology {
        let mut topology = ChainTopology::default();
        for slot in &self.slots {
            topology.enabled[slot.kind.index()] = slot.enabled;
        }
        topology
    }

    /// Flip a slot and return the rebuilt topology
    pub fn toggle(&mut self, kind: EffectKind) -> ChainTopology {
        let slot = &mut self.slots[kind.index()];
        slot.enabled = !slot.enabled;
        log::debug!(
            "Effect {} {}",
            kind,
            if slot.enabled { "enabled" } else { "disabled" }
        );
        self.topology()
    }

    /// Put back a slot's parameters after the engine refused an update
    pub fn restore(&mut self, kind: EffectKind, params: EffectParams) {
        self.slots[kind.index()].params = params;
    }

    /// Merge a parameter update into a slot
    ///
    /// Returns `None` when no value actually changed.
    pub fn update(&mut self, kind: EffectKind, map: &ParamMap) -> Option<EffectUpdate> {
        let slot = &mut self.slots[kind.index()];
        let before = slot.params;
        if !slot.params.merge(map) {
            return None;
        }

        let impulse = match (before, slot.params) {
            (EffectParams::Reverb(old), EffectParams::Reverb(new))
                if old.impulse_shape() != new.impulse_shape() =>
            {
                Some(new.impulse_shape())
            }
            _ => None,
        };

        let gate_threshold_db = match (before, slot.params) {
            (EffectParams::Enhance(old), EffectParams::Enhance(new))
                if slot.enabled && old.gate != new.gate =>
            {
                Some(new.settings().gate_threshold_db)
            }
            _ => None,
        };

        Some(EffectUpdate {
            settings: slot.params.settings(),
            impulse,
            gate_threshold_db,
        })
    }

    /// Gate threshold implied by the enhance slot
    ///
    /// Disabled enhance leaves the gate disabled.
    pub fn gate_threshold_db(&self) -> f32 {
        let slot = self.state(EffectKind::Enhance);
        match slot.params {
            EffectParams::Enhance(p) if slot.enabled => p.settings().gate_threshold_db,
            _ => GATE_DISABLED_DB,
        }
    }

    /// Impulse shape the reverb slot currently asks for
    pub fn impulse_shape(&self) -> ImpulseShape {
        match self.state(EffectKind::Reverb).params {
            EffectParams::Reverb(p) => p.impulse_shape(),
            _ => super::params::ReverbParams::default().impulse_shape(),
        }
    }
}

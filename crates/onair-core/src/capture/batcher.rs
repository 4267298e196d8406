//! Render-side PCM batching
//!
//! Lives inside the audio engine while a recording is active. Each block is
//! copied out of the borrowed render buffer, downmixed to mono and appended
//! to the current batch. A full batch is moved (never copied) into the block
//! ring and replaced with an empty buffer from the recycle ring, so steady
//! state never touches the allocator.

use std::sync::Arc;

use rtrb::{Consumer, Producer};

use super::message::{CaptureBlock, CaptureTap};
use crate::engine::EngineDiagnostics;
use crate::types::StereoBuffer;

/// Batcher half of the render → encoder hand-off
pub struct CaptureBatcher {
    tap: CaptureTap,
    batch_size: usize,
    current: Vec<f32>,
    blocks: Producer<CaptureBlock>,
    recycle: Consumer<Vec<f32>>,
    diagnostics: Arc<EngineDiagnostics>,
    /// Samples handed to the encoder so far
    delivered: u64,
    partial_flushed: bool,
    finished: bool,
}

impl CaptureBatcher {
    /// Build on the control thread; the first batch buffer is allocated here
    pub fn new(
        tap: CaptureTap,
        batch_size: usize,
        blocks: Producer<CaptureBlock>,
        recycle: Consumer<Vec<f32>>,
        diagnostics: Arc<EngineDiagnostics>,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            tap,
            batch_size,
            current: Vec::with_capacity(batch_size),
            blocks,
            recycle,
            diagnostics,
            delivered: 0,
            partial_flushed: false,
            finished: false,
        }
    }

    pub fn tap(&self) -> CaptureTap {
        self.tap
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Samples waiting in the current batch
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    /// Samples handed off so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Append one rendered block (downmixed to mono)
    pub fn push(&mut self, block: &StereoBuffer) {
        if self.finished || self.partial_flushed {
            return;
        }
        for s in block.iter() {
            self.current.push((s.left + s.right) * 0.5);
            if self.current.len() >= self.batch_size {
                self.hand_off();
            }
        }
    }

    /// Append mono samples directly
    #[cfg(test)]
    pub fn push_mono(&mut self, samples: &[f32]) {
        if self.finished || self.partial_flushed {
            return;
        }
        let mut rest = samples;
        while !rest.is_empty() {
            let room = self.batch_size - self.current.len();
            let n = room.min(rest.len());
            self.current.extend_from_slice(&rest[..n]);
            rest = &rest[n..];
            if self.current.len() >= self.batch_size {
                self.hand_off();
            }
        }
    }

    fn hand_off(&mut self) {
        if self.blocks.is_full() {
            // Encoder is behind; this batch is lost
            self.diagnostics.record_capture_overflow();
            self.current.clear();
            return;
        }

        let replacement = match self.recycle.pop() {
            Ok(mut buf) => {
                buf.clear();
                buf
            }
            Err(_) => {
                self.diagnostics.record_pool_exhausted();
                Vec::with_capacity(self.batch_size)
            }
        };
        let full = std::mem::replace(&mut self.current, replacement);
        let len = full.len() as u64;
        if self.blocks.push(CaptureBlock::Batch(full)).is_ok() {
            self.delivered += len;
        } else {
            self.diagnostics.record_capture_overflow();
        }
    }

    /// Flush the partial batch and mark the end of the stream
    ///
    /// Returns `false` while the ring is too full to take what is left; the
    /// engine calls again on the next block.
    pub fn finish(&mut self) -> bool {
        if self.finished {
            return true;
        }
        if self.blocks.is_abandoned() {
            self.finished = true;
            return true;
        }

        if !self.partial_flushed {
            if !self.current.is_empty() {
                if self.blocks.is_full() {
                    return false;
                }
                let partial = std::mem::take(&mut self.current);
                let len = partial.len() as u64;
                if self.blocks.push(CaptureBlock::Batch(partial)).is_err() {
                    return false;
                }
                self.delivered += len;
            }
            self.partial_flushed = true;
        }

        if self
            .blocks
            .push(CaptureBlock::End {
                total_frames: self.delivered,
            })
            .is_err()
        {
            return false;
        }
        self.finished = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batcher(
        batch_size: usize,
        ring: usize,
        pool: usize,
    ) -> (CaptureBatcher, Consumer<CaptureBlock>, Arc<EngineDiagnostics>) {
        let (blocks_tx, blocks_rx) = rtrb::RingBuffer::new(ring);
        let (mut recycle_tx, recycle_rx) = rtrb::RingBuffer::new(pool.max(1));
        for _ in 0..pool {
            let _ = recycle_tx.push(Vec::with_capacity(batch_size));
        }
        let diagnostics = Arc::new(EngineDiagnostics::default());
        let b = CaptureBatcher::new(
            CaptureTap::Program,
            batch_size,
            blocks_tx,
            recycle_rx,
            Arc::clone(&diagnostics),
        );
        (b, blocks_rx, diagnostics)
    }

    fn batch_len(block: CaptureBlock) -> usize {
        match block {
            CaptureBlock::Batch(v) => v.len(),
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_flushes_at_threshold_and_on_stop() {
        let (mut b, mut rx, diagnostics) = batcher(4096, 8, 4);

        b.push_mono(&vec![0.1; 4096]);
        assert_eq!(batch_len(rx.pop().expect("first flush")), 4096);
        assert!(rx.pop().is_err());

        b.push_mono(&vec![0.1; 4096]);
        assert_eq!(batch_len(rx.pop().expect("second flush")), 4096);
        assert!(rx.pop().is_err());

        b.push_mono(&vec![0.1; 1808]);
        assert!(rx.pop().is_err());
        assert_eq!(b.pending(), 1808);

        assert!(b.finish());
        assert_eq!(batch_len(rx.pop().expect("stop flush")), 1808);
        match rx.pop().expect("end marker") {
            CaptureBlock::End { total_frames } => assert_eq!(total_frames, 10_000),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(diagnostics.snapshot().capture_pool_exhausted, 0);
    }

    #[test]
    fn test_stereo_block_is_downmixed() {
        let (mut b, mut rx, _) = batcher(4, 4, 1);
        let block = StereoBuffer::from_interleaved(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0, 0.2, 0.4]);
        b.push(&block);
        match rx.pop().expect("batch") {
            CaptureBlock::Batch(v) => {
                assert_eq!(v.len(), 4);
                assert!((v[0] - 0.5).abs() < 1e-6);
                assert!((v[1] - 0.5).abs() < 1e-6);
                assert!(v[2].abs() < 1e-6);
                assert!((v[3] - 0.3).abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_full_ring_drops_batch_and_counts_it() {
        let (mut b, mut rx, diagnostics) = batcher(2, 1, 4);
        b.push_mono(&[0.0; 2]);
        b.push_mono(&[0.0; 2]);
        assert_eq!(diagnostics.snapshot().capture_overflows, 1);
        assert_eq!(b.delivered(), 2);

        // End cannot go in until the encoder drains the ring
        assert!(!b.finish());
        let _ = rx.pop();
        assert!(b.finish());
        assert!(matches!(rx.pop(), Ok(CaptureBlock::End { total_frames: 2 })));
    }

    #[test]
    fn test_empty_pool_falls_back_to_allocation() {
        let (mut b, _rx, diagnostics) = batcher(2, 4, 0);
        b.push_mono(&[0.0; 4]);
        assert_eq!(diagnostics.snapshot().capture_pool_exhausted, 2);
    }

    #[test]
    fn test_no_samples_after_finish() {
        let (mut b, mut rx, _) = batcher(8, 4, 1);
        assert!(b.finish());
        b.push_mono(&[0.0; 16]);
        assert!(matches!(rx.pop(), Ok(CaptureBlock::End { total_frames: 0 })));
        assert!(rx.pop().is_err());
    }
}

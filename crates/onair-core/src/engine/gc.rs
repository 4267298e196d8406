//! Deferred deallocation for buffers retired on the audio thread
//!
//! Pad samples travel to the audio thread as `basedrop::Shared<PadSample>`
//! and reverb responses as `basedrop::Owned<ReverbImpulse>`. When the audio
//! thread drops one (pad replaced, pad removed, response swapped), the
//! pointer is only queued; the free happens on the `audio-gc` thread, which
//! collects every 100 ms.
//!
//! ```ignore
//! use basedrop::Shared;
//! use crate::engine::gc::gc_handle;
//!
//! let sample = Shared::new(&gc_handle(), pad_sample);
//! ```

use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

use basedrop::{Collector, Handle};

/// Collection interval of the GC thread
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
            // The collector is !Sync, so it is created where it lives
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(COLLECT_INTERVAL);
            }
        })
        .expect("failed to spawn audio GC thread");

    rx.recv().expect("audio GC thread exited before handing out its handle")
}

/// Handle for allocating `Shared<T>` / `Owned<T>` values
///
/// The first call starts the GC thread.
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Shared;

    #[test]
    fn test_shared_drop_is_deferred() {
        let a = Shared::new(&gc_handle(), vec![0.0f32; 1024]);
        let b = Shared::clone(&a);
        drop(a);
        assert_eq!(b.len(), 1024);
        drop(b);
    }
}

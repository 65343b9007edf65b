//! RT-safe garbage collection for track sample buffers
//!
//! Tracks hold their decoded PCM in a `basedrop::Shared`. When a track is
//! unloaded the audio thread drops its last reference; instead of freeing
//! (potentially hundreds of MB) inside the callback, the pointer is queued and
//! released by the `audio-gc` thread.
//!
//! ```ignore
//! let samples = Shared::new(&gc_handle(), pcm);
//! drop(samples); // deferred to the GC thread
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

/// Collection interval for the GC thread
const COLLECT_INTERVAL: Duration = Duration::from_millis(100);

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    // Collector is !Sync, so it lives on its own thread for the process lifetime
    thread::Builder::new()
        .name("audio-gc".to_string())
        .spawn(move || {
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
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Get a handle for creating `Shared<T>` allocations
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

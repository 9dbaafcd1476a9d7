//! Deferred deallocation for clips shared with the audio thread
//!
//! Decoded clips travel to the mixer as `basedrop::Shared<AudioClip>`. When
//! the mixer drops the last reference (e.g. a voice is stopped after its clip
//! was replaced by an edit), the buffer is queued for a collector thread
//! instead of being freed inside the audio callback.

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("clip-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it lives on this thread only
            let mut collector = Collector::new();
            if tx.send(collector.handle()).is_err() {
                return;
            }
            log::info!("Clip GC thread started");

            loop {
                collector.collect();
                thread::sleep(Duration::from_millis(100));
            }
        });

    match spawned.ok().and_then(|_| rx.recv().ok()) {
        Some(handle) => handle,
        None => {
            // No collector thread: leak the collector so handles stay valid.
            // Deferred drops then accumulate instead of being reclaimed.
            log::error!("Failed to start clip GC thread, deferred drops will not be reclaimed");
            let collector = Box::leak(Box::new(Collector::new()));
            collector.handle()
        }
    }
}

/// Handle for creating `Shared<T>` allocations
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}

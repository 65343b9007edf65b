//! Synthetic audio driver
//!
//! Stands in for hardware when no device can be opened (or when asked for
//! explicitly). A named thread owns the engine and calls `render_into` once
//! per buffer period on a drift-free schedule; the output is discarded. From
//! the control side it is indistinguishable from a real device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::error::{AudioError, AudioResult};
use crate::engine::MixEngine;

/// Handle to the mock render thread; drop to stop it
pub struct MockAudioHandle {
    running: Arc<AtomicBool>,
    frames_rendered: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    buffer_size: u32,
}

impl MockAudioHandle {
    /// Start rendering `engine` every `buffer_size / sample_rate` seconds
    pub fn start(mut engine: MixEngine, buffer_size: u32) -> AudioResult<Self> {
        let sample_rate = engine.sample_rate();
        let channels = engine.channels() as usize;
        let period = Duration::from_secs_f64(buffer_size as f64 / sample_rate as f64);

        let running = Arc::new(AtomicBool::new(true));
        let frames_rendered = Arc::new(AtomicU64::new(0));

        let thread = {
            let running = running.clone();
            let frames_rendered = frames_rendered.clone();
            thread::Builder::new()
                .name("mock-audio".to_string())
                .spawn(move || {
                    let mut buffer = vec![0i16; buffer_size as usize * channels];
                    let mut deadline = Instant::now();

                    log::info!(
                        "Mock audio driver started: {}Hz, {} frames per cycle",
                        sample_rate,
                        buffer_size
                    );

                    while running.load(Ordering::Relaxed) {
                        engine.render_into(&mut buffer);
                        frames_rendered.fetch_add(buffer_size as u64, Ordering::Relaxed);

                        deadline += period;
                        let now = Instant::now();
                        if deadline > now {
                            thread::sleep(deadline - now);
                        } else {
                            // Fell behind (debugger, loaded CI box): resync instead of bursting
                            deadline = now;
                        }
                    }

                    log::info!("Mock audio driver stopped");
                })
                .map_err(|e| AudioError::StreamBuildError(e.to_string()))?
        };

        Ok(Self {
            running,
            frames_rendered,
            thread: Some(thread),
            sample_rate,
            buffer_size,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Frames rendered since start
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

impl Drop for MockAudioHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

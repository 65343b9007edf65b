//! Background beat analysis
//!
//! ```text
//! ┌──────────────┐   AnalysisCommand    ┌──────────────────────┐
//! │   Control    │ ───────────────────► │ BeatAnalysisService  │
//! │   thread     │ ◄─────────────────── │   (beat-analysis)    │
//! └──────────────┘   oneshot reply      └──────────────────────┘
//! ```
//!
//! Each request gets exactly one reply carrying the track id it was made
//! for. Unloading a track doesn't cancel its analysis; callers drop replies
//! for tracks that are gone (see `MixerHandle::is_loaded`).

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::config::AnalysisConfig;
use crate::detector::{BeatDetector, BeatInfo};

/// Errors talking to the analysis service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The service thread has exited
    #[error("Analysis service is not running")]
    ServiceStopped,

    /// The service thread could not be started
    #[error("Failed to spawn analysis service: {0}")]
    SpawnFailed(String),
}

/// Detection result for one track
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub track_id: String,
    pub info: BeatInfo,
}

/// Commands for the BeatAnalysisService
pub enum AnalysisCommand {
    /// Analyze one track
    Detect {
        track_id: String,
        samples: Vec<i16>,
        channels: u16,
        duration_secs: f64,
        reply: Option<oneshot::Sender<AnalysisResult>>,
    },

    /// Analyze many tracks in parallel
    DetectBatch {
        /// (track_id, interleaved samples) pairs
        tracks: Vec<(String, Vec<i16>)>,
        channels: u16,
        reply: Option<oneshot::Sender<Vec<AnalysisResult>>>,
    },

    /// Shutdown the service
    Shutdown,
}

/// Handle to a running service thread
pub struct ServiceHandle<Cmd> {
    /// Channel for sending commands to the service
    pub command_tx: Sender<Cmd>,
    /// Thread handle for the service
    pub thread_handle: Option<JoinHandle<()>>,
}

impl<Cmd> ServiceHandle<Cmd> {
    /// Send a command to the service
    pub fn send(&self, cmd: Cmd) -> Result<(), AnalysisError> {
        self.command_tx.send(cmd).map_err(|_| AnalysisError::ServiceStopped)
    }

    /// Check if the service is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl ServiceHandle<AnalysisCommand> {
    /// Queue one track; the receiver resolves once with its result
    pub fn detect(
        &self,
        track_id: impl Into<String>,
        samples: Vec<i16>,
        channels: u16,
        duration_secs: f64,
    ) -> Result<oneshot::Receiver<AnalysisResult>, AnalysisError> {
        let (reply, rx) = oneshot::channel();
        self.send(AnalysisCommand::Detect {
            track_id: track_id.into(),
            samples,
            channels,
            duration_secs,
            reply: Some(reply),
        })?;
        Ok(rx)
    }

    /// Queue a batch; results come back in input order
    pub fn detect_batch(
        &self,
        tracks: Vec<(String, Vec<i16>)>,
        channels: u16,
    ) -> Result<oneshot::Receiver<Vec<AnalysisResult>>, AnalysisError> {
        let (reply, rx) = oneshot::channel();
        self.send(AnalysisCommand::DetectBatch {
            tracks,
            channels,
            reply: Some(reply),
        })?;
        Ok(rx)
    }

    /// Stop the service after queued work and wait for the thread
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(AnalysisCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Background service running beat detection off the caller's thread
pub struct BeatAnalysisService;

impl BeatAnalysisService {
    /// Spawn the service in a background thread
    pub fn spawn(
        config: AnalysisConfig,
        sample_rate: u32,
    ) -> Result<ServiceHandle<AnalysisCommand>, AnalysisError> {
        let (command_tx, command_rx) = channel::unbounded();
        let detector = BeatDetector::new(config, sample_rate);

        let thread_handle = thread::Builder::new()
            .name("beat-analysis".to_string())
            .spawn(move || Self::run(detector, command_rx))
            .map_err(|e| AnalysisError::SpawnFailed(e.to_string()))?;

        Ok(ServiceHandle {
            command_tx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Main service loop
    fn run(detector: BeatDetector, command_rx: Receiver<AnalysisCommand>) {
        log::info!("BeatAnalysisService started ({}Hz)", detector.sample_rate());

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                AnalysisCommand::Detect {
                    track_id,
                    samples,
                    channels,
                    duration_secs,
                    reply,
                } => {
                    let info = detector.detect_beats(&samples, channels, duration_secs);
                    log::info!(
                        "BeatAnalysisService: {} -> {:.2} BPM (confidence {:.2})",
                        track_id,
                        info.bpm,
                        info.confidence
                    );
                    if let Some(tx) = reply {
                        // Receiver gone means the caller lost interest
                        let _ = tx.send(AnalysisResult { track_id, info });
                    }
                }

                AnalysisCommand::DetectBatch {
                    tracks,
                    channels,
                    reply,
                } => {
                    let results = detector
                        .detect_batch(&tracks, channels)
                        .into_iter()
                        .map(|(track_id, info)| AnalysisResult { track_id, info })
                        .collect();
                    if let Some(tx) = reply {
                        let _ = tx.send(results);
                    }
                }

                AnalysisCommand::Shutdown => {
                    log::info!("BeatAnalysisService shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::tests::click_train;
    use fader_core::config::MixerConfig;
    use fader_core::create_mixer;

    #[test]
    fn test_detect_replies_once_with_track_id() {
        let mut service = BeatAnalysisService::spawn(AnalysisConfig::default(), 44100).unwrap();
        assert!(service.is_running());

        let rx = service
            .detect("deck-a", click_train(44100, 0.5, 10.0, 0.0), 2, 10.0)
            .unwrap();
        let result = rx.blocking_recv().unwrap();

        assert_eq!(result.track_id, "deck-a");
        assert!((result.info.bpm - 120.0).abs() <= 1.0);

        service.shutdown();
        assert!(!service.is_running());
    }

    #[test]
    fn test_result_for_unloaded_track_is_discarded_by_caller() {
        let (mut mixer, _engine) = create_mixer(44100, 2, &MixerConfig::default());
        let samples = click_train(44100, 0.5, 5.0, 0.0);
        mixer.load("a", samples.clone(), 44100, 2).unwrap();

        let mut service = BeatAnalysisService::spawn(AnalysisConfig::default(), 44100).unwrap();
        let rx = service.detect("a", samples, 2, 5.0).unwrap();

        // Unloading doesn't cancel the in-flight analysis
        mixer.unload("a").unwrap();
        let result = rx.blocking_recv().unwrap();

        assert_eq!(result.track_id, "a");
        assert!(!mixer.is_loaded(&result.track_id));
        service.shutdown();
    }

    #[test]
    fn test_batch_through_service() {
        let mut service = BeatAnalysisService::spawn(AnalysisConfig::default(), 44100).unwrap();
        let rx = service
            .detect_batch(
                vec![
                    ("x".to_string(), click_train(44100, 0.5, 8.0, 0.0)),
                    ("y".to_string(), vec![0; 1000]),
                ],
                2,
            )
            .unwrap();

        let results = rx.blocking_recv().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].track_id, "y");
        assert_eq!(results[1].info.confidence, 0.0);
        service.shutdown();
    }

    #[test]
    fn test_send_after_shutdown_fails() {
        let mut service = BeatAnalysisService::spawn(AnalysisConfig::default(), 44100).unwrap();
        service.shutdown();
        assert_eq!(
            service.detect("late", vec![0; 4], 2, 0.0).unwrap_err(),
            AnalysisError::ServiceStopped
        );
    }
}

//! Track buffers
//!
//! A loaded track is an immutable block of decoded 16-bit PCM ([`TrackData`],
//! shared via `basedrop::Shared` so the audio thread can drop it without
//! freeing) plus the playback state that only the audio thread mutates
//! ([`AudioTrack`]). Control threads observe cursor and state through
//! [`TrackAtomics`].

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use crate::engine::gc::gc_handle;
use crate::error::{MixerError, MixerResult};
use crate::types::{sample_from_i16, PlayState, StereoBuffer, StereoSample};

/// Decoded PCM for one track (immutable after load)
#[derive(Debug)]
pub struct TrackData {
    /// Interleaved samples, `frames * channels` long
    samples: Vec<i16>,
    channels: u16,
    sample_rate: u32,
}

impl TrackData {
    /// Wrap decoded samples, rejecting shapes the mixer can't play
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> MixerResult<Self> {
        if !(1..=2).contains(&channels) {
            return Err(MixerError::UnsupportedChannels(channels));
        }
        if samples.is_empty() || samples.len() % channels as usize != 0 {
            return Err(MixerError::EmptyBuffer);
        }
        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Number of frames (samples per channel)
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Read one frame as float stereo; mono is duplicated to both sides
    #[inline]
    fn frame(&self, index: usize) -> StereoSample {
        match self.channels {
            1 => StereoSample::mono(sample_from_i16(self.samples[index])),
            _ => {
                let base = index * 2;
                StereoSample::new(
                    sample_from_i16(self.samples[base]),
                    sample_from_i16(self.samples[base + 1]),
                )
            }
        }
    }
}

/// Atomic track state for lock-free control-thread reads
///
/// Written by the audio thread after every command and render cycle.
pub struct TrackAtomics {
    /// Cursor in frames
    pub position: AtomicU64,
    /// Playback state (see [`PlayState`])
    pub state: AtomicU8,
    /// Total length in frames
    pub duration: AtomicU64,
}

impl TrackAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            state: AtomicU8::new(PlayState::Stopped as u8),
            duration: AtomicU64::new(0),
        }
    }

    /// Get current cursor in frames (lock-free)
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Get play state (lock-free)
    #[inline]
    pub fn play_state(&self) -> PlayState {
        PlayState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Get track length in frames (lock-free)
    #[inline]
    pub fn duration(&self) -> u64 {
        self.duration.load(Ordering::Relaxed)
    }

    fn store(&self, position: usize, state: PlayState) {
        self.position.store(position as u64, Ordering::Relaxed);
        self.state.store(state as u8, Ordering::Relaxed);
    }
}

impl Default for TrackAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// A loaded track and its playback cursor
///
/// Owned by the audio thread. State machine:
/// - `play`: Stopped/Paused -> Playing (from Stopped at end-of-track, restarts at 0)
/// - `pause`: Playing <-> Paused; no-op when Stopped
/// - `stop`: any -> Stopped, cursor back to 0
/// - running out of samples in `pull`: -> Stopped, cursor left at the end
pub struct AudioTrack {
    data: Shared<TrackData>,
    /// Cursor in frames
    cursor: usize,
    state: PlayState,
    atomics: Arc<TrackAtomics>,
}

impl AudioTrack {
    /// Load a track: cursor 0, Stopped
    pub fn new(data: TrackData, atomics: Arc<TrackAtomics>) -> Self {
        let data = Shared::new(&gc_handle(), data);
        Self::from_shared(data, atomics)
    }

    /// Load from an already-shared buffer (no allocation, safe on the audio thread)
    pub fn from_shared(data: Shared<TrackData>, atomics: Arc<TrackAtomics>) -> Self {
        atomics
            .duration
            .store(data.frames() as u64, Ordering::Relaxed);
        let track = Self {
            data,
            cursor: 0,
            state: PlayState::Stopped,
            atomics,
        };
        track.sync_atomics();
        track
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Cursor in frames
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    pub fn play(&mut self) {
        if self.state == PlayState::Stopped && self.cursor >= self.data.frames() {
            self.cursor = 0;
        }
        self.state = PlayState::Playing;
        self.sync_atomics();
    }

    pub fn pause(&mut self) {
        self.state = match self.state {
            PlayState::Playing => PlayState::Paused,
            PlayState::Paused => PlayState::Playing,
            PlayState::Stopped => PlayState::Stopped,
        };
        self.sync_atomics();
    }

    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.cursor = 0;
        self.sync_atomics();
    }

    /// Move the cursor; positions past the end are clamped to the end
    pub fn seek(&mut self, frame: usize) {
        self.cursor = frame.min(self.data.frames());
        self.sync_atomics();
    }

    /// Fill `output` with exactly `frame_count` frames
    ///
    /// Frames past the end of the track are silence and the track stops. The
    /// cursor only advances over frames actually read. A track that isn't
    /// playing renders silence. Returns the number of frames read.
    ///
    /// `output` must have capacity for `frame_count` frames.
    pub fn pull(&mut self, output: &mut StereoBuffer, frame_count: usize) -> usize {
        output.set_len_from_capacity(frame_count);

        if self.state != PlayState::Playing {
            output.fill_silence();
            return 0;
        }

        let total = self.data.frames();
        let available = total.saturating_sub(self.cursor).min(frame_count);

        let slice = output.as_mut_slice();
        for (i, frame) in slice[..available].iter_mut().enumerate() {
            *frame = self.data.frame(self.cursor + i);
        }
        slice[available..].fill(StereoSample::silence());

        self.cursor += available;
        if available < frame_count {
            self.state = PlayState::Stopped;
        }
        self.sync_atomics();
        available
    }

    fn sync_atomics(&self) {
        self.atomics.store(self.cursor, self.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo_ramp(frames: usize) -> TrackData {
        let samples = (0..frames as i16).flat_map(|i| [i, -i]).collect();
        TrackData::new(samples, 44100, 2).unwrap()
    }

    fn new_track(data: TrackData) -> (AudioTrack, Arc<TrackAtomics>) {
        let atomics = Arc::new(TrackAtomics::new());
        (AudioTrack::new(data, atomics.clone()), atomics)
    }

    #[test]
    fn test_track_data_validation() {
        assert_eq!(
            TrackData::new(vec![0; 6], 44100, 3).unwrap_err(),
            MixerError::UnsupportedChannels(3)
        );
        assert_eq!(
            TrackData::new(vec![], 44100, 2).unwrap_err(),
            MixerError::EmptyBuffer
        );
        assert_eq!(
            TrackData::new(vec![1, 2, 3], 44100, 2).unwrap_err(),
            MixerError::EmptyBuffer
        );
        let data = TrackData::new(vec![0; 88200], 44100, 2).unwrap();
        assert_eq!(data.frames(), 44100);
        assert!((data.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_resets_cursor_and_state() {
        let (track, atomics) = new_track(stereo_ramp(100));
        assert_eq!(track.cursor(), 0);
        assert_eq!(track.state(), PlayState::Stopped);
        assert_eq!(atomics.position(), 0);
        assert_eq!(atomics.play_state(), PlayState::Stopped);
        assert_eq!(atomics.duration(), 100);
    }

    #[test]
    fn test_pull_returns_exact_frames_and_advances() {
        let (mut track, atomics) = new_track(stereo_ramp(100));
        let mut buf = StereoBuffer::with_capacity(64);

        track.play();
        assert_eq!(track.pull(&mut buf, 10), 10);
        assert_eq!(buf.len(), 10);
        assert_eq!(buf[3], StereoSample::new(sample_from_i16(3), sample_from_i16(-3)));
        assert_eq!(track.cursor(), 10);
        assert_eq!(atomics.position(), 10);
    }

    #[test]
    fn test_pull_past_end_zero_fills_and_stops() {
        let (mut track, atomics) = new_track(stereo_ramp(20));
        let mut buf = StereoBuffer::with_capacity(64);

        track.play();
        track.pull(&mut buf, 16);
        let read = track.pull(&mut buf, 16);

        assert_eq!(read, 4);
        assert_eq!(buf.len(), 16);
        assert!(buf.as_slice()[4..].iter().all(|s| *s == StereoSample::silence()));
        assert_eq!(track.state(), PlayState::Stopped);
        assert_eq!(track.cursor(), 20);
        assert_eq!(atomics.play_state(), PlayState::Stopped);
    }

    #[test]
    fn test_not_playing_pulls_silence() {
        let (mut track, _) = new_track(stereo_ramp(20));
        let mut buf = StereoBuffer::with_capacity(8);
        assert_eq!(track.pull(&mut buf, 8), 0);
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.peak(), 0.0);
        assert_eq!(track.cursor(), 0);
    }

    #[test]
    fn test_pause_toggles_and_holds_cursor() {
        let (mut track, _) = new_track(stereo_ramp(100));
        let mut buf = StereoBuffer::with_capacity(16);

        track.pause();
        assert_eq!(track.state(), PlayState::Stopped);

        track.play();
        track.pull(&mut buf, 16);
        track.pause();
        assert_eq!(track.state(), PlayState::Paused);
        track.pull(&mut buf, 16);
        assert_eq!(track.cursor(), 16);

        track.pause();
        assert_eq!(track.state(), PlayState::Playing);
    }

    #[test]
    fn test_play_after_stop_restarts_from_zero() {
        let (mut track, _) = new_track(stereo_ramp(100));
        let mut buf = StereoBuffer::with_capacity(32);

        track.play();
        track.pull(&mut buf, 32);
        track.stop();
        assert_eq!(track.cursor(), 0);

        track.play();
        track.pull(&mut buf, 1);
        assert_eq!(buf[0], StereoSample::silence()); // ramp frame 0 is (0, 0)
        assert_eq!(track.cursor(), 1);
    }

    #[test]
    fn test_play_after_exhaustion_restarts() {
        let (mut track, _) = new_track(stereo_ramp(8));
        let mut buf = StereoBuffer::with_capacity(16);
        track.play();
        track.pull(&mut buf, 16);
        assert_eq!(track.state(), PlayState::Stopped);

        track.play();
        assert_eq!(track.cursor(), 0);
        assert_eq!(track.pull(&mut buf, 4), 4);
    }

    #[test]
    fn test_mono_is_upmixed() {
        let data = TrackData::new(vec![1000, 2000, 3000], 44100, 1).unwrap();
        let (mut track, _) = new_track(data);
        let mut buf = StereoBuffer::with_capacity(4);
        track.play();
        track.pull(&mut buf, 3);
        assert_eq!(buf[1], StereoSample::mono(sample_from_i16(2000)));
    }

    #[test]
    fn test_seek_clamps_to_end() {
        let (mut track, atomics) = new_track(stereo_ramp(50));
        track.seek(30);
        assert_eq!(atomics.position(), 30);
        track.seek(500);
        assert_eq!(track.cursor(), 50);
    }
}

//! Latency compensation across track slots
//!
//! An enabled effects chain delays its track by the EQ frame size. Every
//! other slot is delayed by the same amount so all tracks stay
//! sample-aligned. Each slot keeps a [`DelayLine`] over its dry signal; the
//! [`LatencyCompensator`] decides how far back that line is read.
//!
//! The global latency rises as soon as a chain needs it but only falls while
//! nothing is audible, so toggling effects on a playing track neither drops
//! nor repeats audio once the first chain has been enabled.

use crate::types::{StereoBuffer, StereoSample};

/// Ring buffer for a variable delay
pub(crate) struct DelayLine {
    buffer: Vec<StereoSample>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    /// Delay line able to hold up to `max_delay` samples of history
    pub fn new(max_delay: usize) -> Self {
        Self {
            buffer: vec![StereoSample::silence(); max_delay + 1],
            write_pos: 0,
            delay_samples: 0,
        }
    }

    /// Set the read delay; history written at delay 0 is kept, so raising it
    /// reads back audio that was already written
    pub fn set_delay(&mut self, samples: usize) {
        if samples >= self.buffer.len() {
            log::warn!(
                "DelayLine::set_delay: {} samples exceeds capacity {}, clamping",
                samples,
                self.buffer.len() - 1
            );
        }
        self.delay_samples = samples.min(self.buffer.len() - 1);
    }

    #[inline]
    fn write(&mut self, input: StereoSample) {
        self.buffer[self.write_pos] = input;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    #[inline]
    fn process_sample(&mut self, input: StereoSample) -> StereoSample {
        let len = self.buffer.len();
        self.buffer[self.write_pos] = input;
        let read_pos = (self.write_pos + len - self.delay_samples) % len;
        let output = self.buffer[read_pos];
        self.write_pos = (self.write_pos + 1) % len;
        output
    }

    /// Delay `buffer` in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.delay_samples == 0 {
            self.push(buffer);
            return;
        }
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Record `buffer` as history without altering it
    pub fn push(&mut self, buffer: &StereoBuffer) {
        for &sample in buffer.iter() {
            self.write(sample);
        }
    }

    pub fn clear(&mut self) {
        self.buffer.fill(StereoSample::silence());
        self.write_pos = 0;
    }
}

/// Tracks per-slot chain latency and the delay every slot must match
pub(crate) struct LatencyCompensator {
    slot_latencies: Vec<u32>,
    global_latency: u32,
}

impl LatencyCompensator {
    pub fn new(slots: usize) -> Self {
        Self {
            slot_latencies: vec![0; slots],
            global_latency: 0,
        }
    }

    /// Delay every slot is aligned to, in samples
    pub fn global_latency(&self) -> u32 {
        self.global_latency
    }

    /// Record a slot's chain latency, raising the global latency if needed
    pub fn set_slot_latency(&mut self, slot: usize, latency: u32) {
        if let Some(l) = self.slot_latencies.get_mut(slot) {
            *l = latency;
        }
        let required = self.required();
        if required > self.global_latency {
            log::info!(
                "LatencyCompensator: Global latency {} -> {} samples",
                self.global_latency,
                required
            );
            self.global_latency = required;
        }
    }

    /// Drop to the largest latency still in use; call only while silent
    pub fn settle(&mut self) {
        let required = self.required();
        if required < self.global_latency {
            log::debug!(
                "LatencyCompensator: Global latency {} -> {} samples",
                self.global_latency,
                required
            );
            self.global_latency = required;
        }
    }

    fn required(&self) -> u32 {
        self.slot_latencies.iter().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> StereoBuffer {
        StereoBuffer::from_vec((start..start + len).map(|i| StereoSample::mono(i as f32)).collect())
    }

    #[test]
    fn test_delay_line() {
        let mut delay = DelayLine::new(10);
        delay.set_delay(3);

        let mut buffer = ramp(1, 5);
        delay.process(&mut buffer);
        let out: Vec<f32> = buffer.iter().map(|s| s.left).collect();
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_raising_delay_reads_history() {
        let mut delay = DelayLine::new(8);
        let mut first = ramp(0, 8);
        delay.process(&mut first);
        assert_eq!(first[7].left, 7.0);

        delay.set_delay(4);
        let mut next = ramp(8, 4);
        delay.process(&mut next);
        let out: Vec<f32> = next.iter().map(|s| s.left).collect();
        assert_eq!(out, vec![4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_delay_is_clamped_to_capacity() {
        let mut delay = DelayLine::new(4);
        delay.set_delay(100);
        let mut buffer = ramp(1, 6);
        delay.process(&mut buffer);
        let out: Vec<f32> = buffer.iter().map(|s| s.left).collect();
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_latency_compensator_rises_immediately_and_settles_later() {
        let mut comp = LatencyCompensator::new(3);
        comp.set_slot_latency(0, 256);
        comp.set_slot_latency(1, 0);
        assert_eq!(comp.global_latency(), 256);

        comp.set_slot_latency(0, 0);
        assert_eq!(comp.global_latency(), 256);

        comp.settle();
        assert_eq!(comp.global_latency(), 0);
    }

    #[test]
    fn test_out_of_range_slot_is_ignored() {
        let mut comp = LatencyCompensator::new(1);
        comp.set_slot_latency(5, 512);
        assert_eq!(comp.global_latency(), 0);
    }
}

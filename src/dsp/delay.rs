//! Feedback delay kernel
//!
//! One circular buffer per channel with a fractional read head, a one-pole
//! low-pass in the feedback path and a feedback gain. The kernel produces the
//! wet signal only; dry/wet balance belongs to the caller.

use std::f32::consts::PI;

/// Longest delay the kernel can hold, in seconds
pub const MAX_DELAY_SECS: f32 = 0.1;
/// Shortest usable delay, in seconds
pub const MIN_DELAY_SECS: f32 = 0.001;
/// Highest feedback gain accepted
pub const MAX_FEEDBACK: f32 = 0.95;

/// Multichannel feedback delay line
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    sample_rate: f32,
    /// Circular buffers, one per channel
    buffers: Vec<Vec<f32>>,
    /// One-pole filter state per channel
    filter_states: Vec<f32>,
    write_pos: usize,
    delay_samples: f32,
    feedback: f32,
    filter_coeff: f32,
}

impl FeedbackDelay {
    /// Create a delay line
    ///
    /// # Arguments
    /// * `sample_rate` - Sample rate in Hz
    /// * `num_channels` - Number of independent channels
    pub fn new(sample_rate: u32, num_channels: usize) -> Self {
        let sample_rate = sample_rate as f32;
        // two extra samples for the interpolating read
        let size = (MAX_DELAY_SECS * sample_rate).ceil() as usize + 2;
        let mut delay = Self {
            sample_rate,
            buffers: vec![vec![0.0; size]; num_channels],
            filter_states: vec![0.0; num_channels],
            write_pos: 0,
            delay_samples: 1.0,
            feedback: 0.0,
            filter_coeff: 1.0,
        };
        delay.set_delay_secs(MIN_DELAY_SECS);
        delay
    }

    /// Set the delay time, clamped to [1 ms, 100 ms]
    pub fn set_delay_secs(&mut self, secs: f32) {
        let secs = if secs.is_finite() { secs } else { MIN_DELAY_SECS };
        let secs = secs.clamp(MIN_DELAY_SECS, MAX_DELAY_SECS);
        self.delay_samples = (secs * self.sample_rate).max(1.0);
    }

    pub fn delay_secs(&self) -> f32 {
        self.delay_samples / self.sample_rate
    }

    /// Set the feedback gain, clamped to [0, 0.95]
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = if feedback.is_finite() {
            feedback.clamp(0.0, MAX_FEEDBACK)
        } else {
            0.0
        };
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Set the damping low-pass cutoff in Hz
    pub fn set_damping_cutoff(&mut self, cutoff_hz: f32) {
        let fc = cutoff_hz.clamp(20.0, self.sample_rate / 2.0);
        // y[n] = y[n-1] + coeff * (x[n] - y[n-1])
        self.filter_coeff = 1.0 - (-2.0 * PI * fc / self.sample_rate).exp();
    }

    pub fn reset(&mut self) {
        for buffer in &mut self.buffers {
            buffer.fill(0.0);
        }
        self.filter_states.fill(0.0);
        self.write_pos = 0;
    }

    /// Read from a circular buffer `delay` samples behind the write head
    #[inline]
    fn read(buffer: &[f32], write_pos: usize, delay: f32) -> f32 {
        let size = buffer.len();
        let whole = delay.floor() as usize;
        let frac = delay - whole as f32;
        let idx_a = (write_pos + size - whole) % size;
        let idx_b = (write_pos + size - whole - 1) % size;
        buffer[idx_a] * (1.0 - frac) + buffer[idx_b] * frac
    }

    /// Run the delay over a block of channels
    ///
    /// `input` and `wet` must have the same channel count as the delay line and
    /// equal lengths. Every channel advances by the same number of samples.
    pub fn process(&mut self, input: &[Vec<f32>], wet: &mut [Vec<f32>]) {
        let num_samples = input.first().map(Vec::len).unwrap_or(0);
        let start = self.write_pos;

        for (ch, (x, out)) in input.iter().zip(wet.iter_mut()).enumerate() {
            let Some(buffer) = self.buffers.get_mut(ch) else {
                out.fill(0.0);
                continue;
            };
            let state = &mut self.filter_states[ch];
            let size = buffer.len();
            let mut pos = start;

            for (i, &sample) in x.iter().enumerate().take(num_samples) {
                let delayed = Self::read(buffer, pos, self.delay_samples);
                *state += self.filter_coeff * (delayed - *state);
                buffer[pos] = sample + self.feedback * *state;
                out[i] = delayed;
                pos = (pos + 1) % size;
            }
        }

        if let Some(size) = self.buffers.first().map(Vec::len) {
            self.write_pos = (start + num_samples) % size;
        }
    }
}

//! Biquad filters
//!
//! RBJ cookbook coefficients computed in `f64`. Used for the multiband
//! crossovers and the loudness meter's pre-filter.

use std::f64::consts::PI;

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    /// Remove above frequency
    LowPass,
    /// Remove below frequency
    HighPass,
    /// Boost/cut above frequency
    HighShelf,
}

/// Butterworth Q for second-order sections
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Biquad filter coefficients
/// Transfer function: H(z) = (b0 + b1*z^-1 + b2*z^-2) / (1 + a1*z^-1 + a2*z^-2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        // pass-through
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadCoeffs {
    /// Calculate coefficients using Audio EQ Cookbook formulas
    ///
    /// # Arguments
    /// * `filter_type` - Response shape
    /// * `sample_rate` - Sample rate in Hz
    /// * `frequency` - Corner frequency in Hz, clamped below Nyquist
    /// * `gain_db` - Shelf gain (ignored by pass filters)
    /// * `q` - Quality factor
    pub fn calculate(
        filter_type: FilterType,
        sample_rate: f64,
        frequency: f64,
        gain_db: f64,
        q: f64,
    ) -> Self {
        let nyquist = sample_rate / 2.0;
        let freq = frequency.clamp(10.0, (nyquist - 1.0).max(10.0));
        let q = q.clamp(0.1, 10.0);

        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match filter_type {
            FilterType::LowPass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::HighPass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::HighShelf => {
                let a = 10.0_f64.powf(gain_db / 40.0);
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        BiquadCoeffs {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Magnitude response in dB at `frequency`
    pub fn magnitude_db(&self, frequency: f64, sample_rate: f64) -> f64 {
        let w = 2.0 * PI * frequency / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        let num = num_re * num_re + num_im * num_im;
        let den = den_re * den_re + den_im * den_im;
        10.0 * (num / den).log10()
    }
}

/// Biquad filter state for one channel
#[derive(Debug, Clone, Copy, Default)]
pub struct BiquadState {
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadState {
    /// Process a single sample (Direct Form I)
    #[inline]
    pub fn process(&mut self, input: f64, coeffs: &BiquadCoeffs) -> f64 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Multichannel biquad with a settable corner frequency
#[derive(Debug, Clone)]
pub struct Biquad {
    filter_type: FilterType,
    sample_rate: f64,
    frequency: f64,
    q: f64,
    gain_db: f64,
    coeffs: BiquadCoeffs,
    states: Vec<BiquadState>,
}

impl Biquad {
    /// Create a filter
    ///
    /// # Arguments
    /// * `filter_type` - Response shape
    /// * `sample_rate` - Sample rate in Hz
    /// * `num_channels` - Number of independent channel states
    /// * `frequency` - Corner frequency in Hz
    /// * `q` - Quality factor
    pub fn new(
        filter_type: FilterType,
        sample_rate: u32,
        num_channels: usize,
        frequency: f32,
        q: f64,
    ) -> Self {
        let mut filter = Self {
            filter_type,
            sample_rate: sample_rate as f64,
            frequency: frequency as f64,
            q,
            gain_db: 0.0,
            coeffs: BiquadCoeffs::default(),
            states: vec![BiquadState::default(); num_channels],
        };
        filter.update_coefficients();
        filter
    }

    /// Shelf filter with a fixed gain
    pub fn shelf(sample_rate: u32, num_channels: usize, frequency: f32, gain_db: f32) -> Self {
        let mut filter = Self::new(
            FilterType::HighShelf,
            sample_rate,
            num_channels,
            frequency,
            BUTTERWORTH_Q,
        );
        filter.gain_db = gain_db as f64;
        filter.update_coefficients();
        filter
    }

    pub fn frequency(&self) -> f32 {
        self.frequency as f32
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    /// Move the corner frequency; coefficients are only recomputed on change
    pub fn set_frequency(&mut self, frequency: f32) {
        let frequency = frequency as f64;
        if frequency != self.frequency {
            self.frequency = frequency;
            self.update_coefficients();
        }
    }

    /// Filter one channel in place
    pub fn process_channel(&mut self, channel: usize, samples: &mut [f32]) {
        let coeffs = self.coeffs;
        let Some(state) = self.states.get_mut(channel) else {
            return;
        };
        for sample in samples.iter_mut() {
            *sample = state.process(*sample as f64, &coeffs) as f32;
        }
    }

    /// Filter one channel into an `f64` scratch slice
    pub fn process_channel_f64(&mut self, channel: usize, input: &[f32], output: &mut [f64]) {
        let coeffs = self.coeffs;
        let Some(state) = self.states.get_mut(channel) else {
            return;
        };
        for (out, &x) in output.iter_mut().zip(input) {
            *out = state.process(x as f64, &coeffs);
        }
    }

    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }

    fn update_coefficients(&mut self) {
        self.coeffs = BiquadCoeffs::calculate(
            self.filter_type,
            self.sample_rate,
            self.frequency,
            self.gain_db,
            self.q,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lowpass_response() {
        let coeffs = BiquadCoeffs::calculate(FilterType::LowPass, 48000.0, 1000.0, 0.0, BUTTERWORTH_Q);
        assert_abs_diff_eq!(coeffs.magnitude_db(50.0, 48000.0), 0.0, epsilon = 0.05);
        assert_abs_diff_eq!(coeffs.magnitude_db(1000.0, 48000.0), -3.01, epsilon = 0.05);
        assert!(coeffs.magnitude_db(10000.0, 48000.0) < -35.0);
    }

    #[test]
    fn test_highpass_response() {
        let coeffs = BiquadCoeffs::calculate(FilterType::HighPass, 48000.0, 1000.0, 0.0, BUTTERWORTH_Q);
        assert_abs_diff_eq!(coeffs.magnitude_db(1000.0, 48000.0), -3.01, epsilon = 0.05);
        assert_abs_diff_eq!(coeffs.magnitude_db(15000.0, 48000.0), 0.0, epsilon = 0.05);
        assert!(coeffs.magnitude_db(100.0, 48000.0) < -35.0);
    }

    #[test]
    fn test_high_shelf_gain() {
        let coeffs = BiquadCoeffs::calculate(FilterType::HighShelf, 48000.0, 1500.0, 4.0, BUTTERWORTH_Q);
        assert_abs_diff_eq!(coeffs.magnitude_db(10.0, 48000.0), 0.0, epsilon = 0.01);
        assert_abs_diff_eq!(coeffs.magnitude_db(1000.0, 48000.0), 0.669, epsilon = 0.01);
        assert_abs_diff_eq!(coeffs.magnitude_db(1500.0, 48000.0), 2.0, epsilon = 0.01);
        assert_abs_diff_eq!(coeffs.magnitude_db(20000.0, 48000.0), 4.0, epsilon = 0.05);
    }

    #[test]
    fn test_frequency_clamped_below_nyquist() {
        let filter = Biquad::new(FilterType::LowPass, 32000, 1, 20000.0, BUTTERWORTH_Q);
        assert!(filter.coeffs().b0.is_finite());
        assert!(filter.coeffs().a1.is_finite());
    }

    #[test]
    fn test_lowpass_passes_dc() {
        let mut filter = Biquad::new(FilterType::LowPass, 48000, 1, 500.0, BUTTERWORTH_Q);
        let mut samples = vec![1.0_f32; 4800];
        filter.process_channel(0, &mut samples);
        assert_abs_diff_eq!(samples[4799], 1.0, epsilon = 1e-4);

        filter.reset();
        let mut impulse = vec![0.0_f32; 4];
        filter.process_channel(0, &mut impulse);
        assert_eq!(impulse, vec![0.0; 4]);
    }
}

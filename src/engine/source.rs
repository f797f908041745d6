//! One-shot playback source
//!
//! A source reads the loaded audio from a start offset until it runs out. It
//! cannot be restarted: pausing or seeking consumes it and a fresh one is
//! created to continue.

use crate::engine::AudioBuffer;

#[derive(Debug, PartialEq, Eq)]
pub struct OneShotSource {
    id: u64,
    start_frame: usize,
    frames_played: usize,
    total_frames: usize,
    declick_frames: usize,
}

impl OneShotSource {
    /// Create a source
    ///
    /// # Arguments
    /// * `id` - Identifier for logs
    /// * `start_frame` - Asset frame the source starts at
    /// * `total_frames` - Asset length in frames
    /// * `declick_frames` - Length of the fade-in ramp
    pub fn new(id: u64, start_frame: usize, total_frames: usize, declick_frames: usize) -> Self {
        Self {
            id,
            start_frame: start_frame.min(total_frames),
            frames_played: 0,
            total_frames,
            declick_frames,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Asset frame the next rendered sample comes from
    pub fn position_frames(&self) -> usize {
        (self.start_frame + self.frames_played).min(self.total_frames)
    }

    /// True once every frame up to the end has been rendered
    pub fn is_exhausted(&self) -> bool {
        self.position_frames() >= self.total_frames
    }

    /// Copy the next block of the asset into `out`
    ///
    /// Frames past the end are silence. Returns the number of asset frames
    /// produced.
    pub fn render(&mut self, asset: &AudioBuffer, out: &mut AudioBuffer) -> usize {
        let block = out.num_samples();
        let start = self.position_frames();
        let available = self.total_frames.saturating_sub(start).min(block);

        for (ch, channel) in out.samples.iter_mut().enumerate() {
            match asset.samples.get(ch) {
                Some(src) => {
                    channel[..available].copy_from_slice(&src[start..start + available]);
                    channel[available..].fill(0.0);
                }
                None => channel.fill(0.0),
            }
        }

        // short ramp at source start so playback never begins on a step
        if self.frames_played < self.declick_frames {
            for i in 0..available {
                let n = self.frames_played + i;
                if n >= self.declick_frames {
                    break;
                }
                let gain = n as f32 / self.declick_frames as f32;
                for channel in &mut out.samples {
                    channel[i] *= gain;
                }
            }
        }

        self.frames_played += available;
        available
    }

    /// Consume the source, returning the asset frame it stopped at
    pub fn stop(self) -> usize {
        self.position_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_asset(len: usize) -> AudioBuffer {
        AudioBuffer {
            samples: vec![(0..len).map(|i| i as f32).collect()],
            sample_rate: 48000,
        }
    }

    #[test]
    fn test_renders_from_offset() {
        let asset = ramp_asset(10);
        let mut source = OneShotSource::new(1, 4, 10, 0);
        let mut out = AudioBuffer::new(1, 4, 48000);
        assert_eq!(source.render(&asset, &mut out), 4);
        assert_eq!(out.samples[0], vec![4.0, 5.0, 6.0, 7.0]);
        assert_eq!(source.position_frames(), 8);
    }

    #[test]
    fn test_pads_with_silence_at_end() {
        let asset = ramp_asset(10);
        let mut source = OneShotSource::new(1, 8, 10, 0);
        let mut out = AudioBuffer::new(1, 4, 48000);
        assert_eq!(source.render(&asset, &mut out), 2);
        assert_eq!(out.samples[0], vec![8.0, 9.0, 0.0, 0.0]);
        assert!(source.is_exhausted());
        assert_eq!(source.stop(), 10);
    }

    #[test]
    fn test_declick_ramp() {
        let asset = AudioBuffer {
            samples: vec![vec![1.0; 8]],
            sample_rate: 48000,
        };
        let mut source = OneShotSource::new(1, 0, 8, 4);
        let mut out = AudioBuffer::new(1, 2, 48000);
        source.render(&asset, &mut out);
        assert_eq!(out.samples[0], vec![0.0, 0.25]);
        source.render(&asset, &mut out);
        assert_eq!(out.samples[0], vec![0.5, 0.75]);
        source.render(&asset, &mut out);
        assert_eq!(out.samples[0], vec![1.0, 1.0]);
    }

    #[test]
    fn test_start_past_end_is_exhausted() {
        let source = OneShotSource::new(1, 50, 10, 0);
        assert!(source.is_exhausted());
    }
}

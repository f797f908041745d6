//! DSP kernels
//!
//! Stateful sample processors with plain setters. The graph stages own the
//! automation timelines and push per-block values into these kernels.

pub mod biquad;
pub mod compressor;
pub mod delay;
pub mod limiter;
pub mod width;

pub use biquad::{Biquad, BiquadCoeffs, FilterType, BUTTERWORTH_Q};
pub use compressor::Compressor;
pub use delay::FeedbackDelay;
pub use limiter::Limiter;
pub use width::{apply_width, width_coefficients};

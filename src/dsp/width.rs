//! Stereo width matrix
//!
//! `L' = L·direct + R·crossfeed`, `R' = R·direct + L·crossfeed` where
//! `direct = (1 + w) / 2` and `crossfeed = (1 - w) / 2`. `w = 0` folds to mono,
//! `w = 1` is the identity and `w = 2` doubles the side signal.

/// Largest width factor (200 %)
pub const MAX_WIDTH: f32 = 2.0;

/// Matrix coefficients for a width in percent
///
/// # Returns
/// `(direct, crossfeed)`
pub fn width_coefficients(width_percent: f32) -> (f32, f32) {
    let w = if width_percent.is_finite() {
        (width_percent / 100.0).clamp(0.0, MAX_WIDTH)
    } else {
        1.0
    };
    ((1.0 + w) / 2.0, (1.0 - w) / 2.0)
}

/// Apply the matrix with per-sample coefficients
pub fn apply_width(left: &mut [f32], right: &mut [f32], direct: &[f32], crossfeed: &[f32]) {
    let frames = left
        .iter_mut()
        .zip(right.iter_mut())
        .zip(direct.iter().zip(crossfeed));
    for ((l, r), (&d, &c)) in frames {
        let (in_l, in_r) = (*l, *r);
        *l = in_l * d + in_r * c;
        *r = in_r * d + in_l * c;
    }
}

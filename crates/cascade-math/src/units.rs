//! Pitch unit conversion.

/// Convert a pitch offset in semitones to a frequency ratio.
///
/// `semitones_to_ratio(12.0)` is 2.0, `semitones_to_ratio(-12.0)` is 0.5.
#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    libm::exp2f(semitones * (1.0 / 12.0))
}

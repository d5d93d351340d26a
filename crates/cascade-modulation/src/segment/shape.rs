//! Phase-to-value waveshaping for the LFO modes.

use super::Output;
use crate::resources::Resources;

/// Render LFO values from the phases already stored in `in_out`.
///
/// One continuous `shape` control in [0, 1] morphs the waveform through
/// narrow triangle pulse, triangle, sine, plateau'd sine and square. The
/// midpoint (0.5) is a pure sine.
///
/// Unipolar output spans [0, 1]; bipolar output is zero-centered and
/// scaled by 10/16 to match the hardware's voltage range.
pub fn shape_lfo(resources: &Resources, shape: f32, in_out: &mut [Output], bipolar: bool) {
    let shape = shape - 0.5;
    let shape = 2.0 + 9.999999 * shape / (1.0 + 3.0 * shape.abs());

    let slope = (shape * 0.5).min(0.5);
    let plateau_width = (shape - 3.0).max(0.0);
    let sine_amount = if shape < 2.0 { shape - 1.0 } else { 3.0 - shape }.max(0.0);

    let slope_up = 1.0 / slope;
    let slope_down = 1.0 / (1.0 - slope);
    let plateau = 0.5 * (1.0 - plateau_width);
    let normalization = 1.0 / plateau;
    let phase_shift = plateau_width * 0.25;

    let amplitude = if bipolar { 10.0 / 16.0 } else { 0.5 };
    let offset = if bipolar { 0.0 } else { 0.5 };

    for out in in_out.iter_mut() {
        let mut phase = out.phase + phase_shift;
        if phase > 1.0 {
            phase -= 1.0;
        }
        let mut triangle = if phase < slope {
            slope_up * phase
        } else {
            1.0 - (phase - slope) * slope_down
        };
        triangle -= 0.5;
        triangle = triangle.clamp(-plateau, plateau) * normalization;

        // The sine table is phase-aligned so its trough coincides with the
        // triangle's minimum.
        let sine = resources.sine_wrap(phase + 0.75);

        out.value = amplitude * cascade_math::crossfade(triangle, sine, sine_amount) + offset;
        out.segment = if phase < 0.5 { 0 } else { 1 };
    }
}

//! Shared lookup curves.
//!
//! The response curves the processors index on every sample. They are built
//! once at startup and shared read-only between all channels; nothing here
//! is mutated after construction.

use cascade_math::LookupTable;

/// Sample rate the core is calibrated for, in Hz.
pub const SAMPLE_RATE: f32 = 32000.0;

/// Entries per cycle in the sine table (plus one wrap guard).
pub const SINE_TABLE_SIZE: usize = 1024;

/// Resolution of the envelope frequency curve (plus one guard for rate 1.0).
pub const ENV_FREQUENCY_TABLE_SIZE: usize = 2048;

/// Resolution of the portamento coefficient curve (plus one guard).
pub const PORTAMENTO_TABLE_SIZE: usize = 512;

// Segment duration endpoints for the envelope frequency curve. A rate of
// 0.0 maps to the slowest segment, 1.0 to the fastest.
const MAX_ENV_TIME_SECONDS: f32 = 16.0;
const MIN_ENV_TIME_SECONDS: f32 = 0.0005;

// Portamento time-constant endpoints. The first entry must come out as
// exactly 1.0 in f32 so that a rate of zero is a transparent one-pole.
const MIN_PORTAMENTO_TAU_SECONDS: f32 = 1.0e-6;
const MAX_PORTAMENTO_TAU_SECONDS: f32 = 2.0;

/// The read-only lookup curves shared by every channel.
///
/// Built once with [`Resources::new`]; the segment generators hold a shared
/// reference for the lifetime of the session.
#[derive(Debug, Clone)]
pub struct Resources {
    /// Normalized rate to per-sample phase increment, log-spaced from the
    /// slowest to the fastest envelope segment.
    pub env_frequency: LookupTable<{ ENV_FREQUENCY_TABLE_SIZE + 1 }>,
    /// Portamento rate to one-pole coefficient; index 0 is exactly 1.0
    /// (no smoothing).
    pub portamento_coefficient: LookupTable<{ PORTAMENTO_TABLE_SIZE + 1 }>,
    /// One cycle of a sine, with a wrap guard entry.
    pub sine: LookupTable<{ SINE_TABLE_SIZE + 1 }>,
}

impl Resources {
    /// Build all curves for the fixed [`SAMPLE_RATE`].
    pub fn new() -> Self {
        let min_frequency = 1.0 / (MAX_ENV_TIME_SECONDS * SAMPLE_RATE);
        let max_frequency = 1.0 / (MIN_ENV_TIME_SECONDS * SAMPLE_RATE);
        let frequency_span = libm::log2f(max_frequency / min_frequency);

        let env_frequency = LookupTable::from_fn(|i, size| {
            let rate = i as f32 / (size - 1) as f32;
            min_frequency * libm::exp2f(rate * frequency_span)
        });

        let tau_span = libm::log2f(MAX_PORTAMENTO_TAU_SECONDS / MIN_PORTAMENTO_TAU_SECONDS);
        let portamento_coefficient = LookupTable::from_fn(|i, size| {
            let rate = i as f32 / (size - 1) as f32;
            let tau = MIN_PORTAMENTO_TAU_SECONDS * libm::exp2f(rate * tau_span);
            1.0 - libm::expf(-1.0 / (tau * SAMPLE_RATE))
        });

        let sine = LookupTable::from_fn(|i, _size| {
            let phase = i as f32 / SINE_TABLE_SIZE as f32;
            libm::sinf(core::f32::consts::TAU * phase)
        });

        Self {
            env_frequency,
            portamento_coefficient,
            sine,
        }
    }

    /// Map a normalized rate in [0, 1] to a per-sample phase increment.
    ///
    /// A truncating bracket read: rates are quantized to the table grid.
    #[inline]
    pub fn rate_to_frequency(&self, rate: f32) -> f32 {
        let index = (rate * ENV_FREQUENCY_TABLE_SIZE as f32) as i32;
        let index = index.clamp(0, ENV_FREQUENCY_TABLE_SIZE as i32);
        self.env_frequency.data()[index as usize]
    }

    /// Map a portamento rate in [0, 1] to a one-pole coefficient.
    ///
    /// Like [`rate_to_frequency`](Self::rate_to_frequency), a truncating
    /// bracket read.
    #[inline]
    pub fn portamento_rate_to_lp_coefficient(&self, rate: f32) -> f32 {
        let index = (rate * PORTAMENTO_TABLE_SIZE as f32) as i32;
        let index = index.clamp(0, PORTAMENTO_TABLE_SIZE as i32);
        self.portamento_coefficient.data()[index as usize]
    }

    /// Wrapped sine lookup; `phase` is in cycles.
    #[inline]
    pub fn sine_wrap(&self, phase: f32) -> f32 {
        self.sine.lookup_wrap(phase, SINE_TABLE_SIZE as f32)
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}

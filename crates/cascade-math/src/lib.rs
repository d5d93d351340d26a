#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! # Cascade Math
//!
//! No-std scalar DSP utilities for the cascade modulation core.
//!
//! This crate provides the small building blocks the modulation engine is
//! assembled from:
//!
//! - [`LookupTable`] - Interpolated table lookup with wrap/clamp indexing
//! - [`crossfade`] - Linear blend between two values
//! - [`one_pole`] / [`slope`] - One-pole smoothing, symmetric and asymmetric
//! - [`ParameterInterpolator`] - Block-linear parameter ramping
//! - [`DelayLine`] - Fixed-capacity ring buffer with fractional reads
//! - [`HysteresisQuantizer`] - Sticky step quantizer for panel controls
//! - [`semitones_to_ratio`] - Pitch offset to frequency ratio
//!
//! All types are `Copy`/`Clone`, zero-allocation, and suitable for real-time
//! use. Float math goes through `libm` so the crate stays `no_std`.

mod delay_line;
mod filter;
mod hysteresis_quantizer;
mod interpolate;
mod parameter_interpolator;
pub mod table;
mod units;

pub use delay_line::DelayLine;
pub use filter::{one_pole, slope};
pub use hysteresis_quantizer::HysteresisQuantizer;
pub use interpolate::crossfade;
pub use parameter_interpolator::ParameterInterpolator;
pub use table::{IndexMode, LookupTable};
pub use units::semitones_to_ratio;

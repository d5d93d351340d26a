#![no_std]

//! # Cascade Modulation
//!
//! No-std control-voltage modulation core: the signal-processing heart of a
//! multi-function modulation module.
//!
//! This crate provides three tightly coupled subsystems:
//!
//! - [`SegmentGenerator`] - Per-channel state machine interpreting chains of
//!   segment descriptors (RAMP / STEP / HOLD / TURING) and dispatching to
//!   specialized envelope, LFO, sample-and-hold, delay, gate and random
//!   processors.
//! - [`RampExtractor`] - Clock-locked phase reconstructor that turns a gate
//!   stream into a continuous ramp, with concurrent period predictors and
//!   an audio-rate VCO regime.
//! - [`NoteQuantizer`] - Boundary-cached pitch quantizer with hysteresis.
//!
//! Everything is block-processed: one [`GateFlags`] in and one
//! [`Output`](segment::Output) out per sample, no allocation after
//! construction, no operation that can fail.
//!
//! # Example
//!
//! ```
//! use cascade_modulation::{
//!     Configuration, GateFlags, Output, Resources, SegmentGenerator, SegmentType,
//! };
//!
//! let resources = Resources::new();
//! let mut generator = SegmentGenerator::new(&resources);
//!
//! // A single non-looping RAMP with a trigger: a decay envelope.
//! generator.configure(true, &[Configuration::new(SegmentType::Ramp, false)]);
//! generator.set_segment_parameters(0, 0.7, 0.2);
//!
//! let mut gate = [GateFlags::LOW; 8];
//! gate[0] = GateFlags::extract(GateFlags::LOW, true);
//! let mut out = [Output::default(); 8];
//! generator.process(&gate, &mut out);
//! assert!(out[0].value > 0.9);
//! ```

mod gate;
mod quantizer;
mod ramp_extractor;
mod resources;
mod rng;
pub mod segment;
mod settings;

pub use gate::GateFlags;
pub use quantizer::{NoteQuantizer, MAX_NOTES};
pub use ramp_extractor::{RampExtractor, Ratio, HISTORY_SIZE, MAX_PATTERN_PERIOD};
pub use resources::{Resources, SAMPLE_RATE};
pub use rng::Rng;
pub use segment::{
    shape_lfo, warp_phase, Configuration, Output, Parameters, Range, SegmentGenerator,
    SegmentType, MAX_BLOCK_SIZE, MAX_DELAY, MAX_NUM_SEGMENTS,
};
pub use settings::{MultiMode, Settings};

//! Runtime segment nodes and their scalar sources.
//!
//! The multi-segment interpreter is a small dataflow graph: each node reads
//! its start, end, time, curve, portamento and phase from *live locations*
//! rather than copied values, so panel moves are heard immediately. A
//! location is one of three shared constants, a slot in the parameter
//! array, or a sibling segment's Turing register.

use super::Parameters;

/// A live scalar location, dereferenced at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The constant 0.0.
    Zero,
    /// The constant 0.5.
    Half,
    /// The constant 1.0.
    One,
    /// `parameters[i].primary`.
    Primary(usize),
    /// `parameters[i].secondary`.
    Secondary(usize),
    /// Segment `i`'s Turing register value.
    Register(usize),
}

impl Source {
    /// Read the current value of this source.
    #[inline(always)]
    pub fn get(self, parameters: &[Parameters], segments: &[Segment]) -> f32 {
        match self {
            Source::Zero => 0.0,
            Source::Half => 0.5,
            Source::One => 1.0,
            Source::Primary(i) => parameters[i].primary,
            Source::Secondary(i) => parameters[i].secondary,
            Source::Register(i) => segments[i].register_value,
        }
    }
}

/// One compiled node of the multi-segment graph.
///
/// Jump targets are segment indices, or -1 for "stay". The sentinel node at
/// index `num_segments` has no time source and never advances.
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    /// Level at phase 0. `None` means "adopt the running value on entry"
    /// (glides continue from wherever the output is).
    pub start: Option<Source>,
    /// Level at phase 1.
    pub end: Source,
    /// Rate parameter driving phase advance; `None` freezes the phase.
    pub time: Option<Source>,
    /// Warp curvature in [0, 1]; 0.5 is linear.
    pub curve: Source,
    /// Portamento rate applied to the output.
    pub portamento: Source,
    /// External phase override (STEP/HOLD/TURING track a constant phase);
    /// `None` uses the segment's own advancing phase.
    pub phase: Option<Source>,

    /// Jump target on a rising edge, -1 to stay.
    pub if_rising: i32,
    /// Jump target on a falling edge, -1 to stay.
    pub if_falling: i32,
    /// Jump target on completion (phase reaching 1), -1 to stay.
    pub if_complete: i32,

    /// Output centered around zero.
    pub bipolar: bool,
    /// Whether rising edges are honored at all.
    pub retrig: bool,
    /// Advance the Turing register when leaving this segment.
    pub advance_tm: bool,
    /// Rate range (single-segment LFO modes only).
    pub range: super::Range,

    /// 16-bit Turing shift register. Survives reconfiguration.
    pub shift_register: u16,
    /// The register rendered as a level; [0, 1] or zero-centered when
    /// bipolar.
    pub register_value: f32,
}

impl Segment {
    /// A quiet, inert node; the initial state of every slot.
    pub fn inert(shift_register: u16, register_value: f32) -> Self {
        Self {
            start: Some(Source::Zero),
            end: Source::Zero,
            time: Some(Source::Zero),
            curve: Source::Half,
            portamento: Source::Zero,
            phase: None,
            if_rising: 0,
            if_falling: 0,
            if_complete: 0,
            bipolar: false,
            retrig: true,
            advance_tm: false,
            range: super::Range::Default,
            shift_register,
            register_value,
        }
    }
}

/// One output sample of a segment generator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Output {
    /// The generated level.
    pub value: f32,
    /// The active segment's phase in [0, 1].
    pub phase: f32,
    /// Index of the active segment.
    pub segment: u8,
}

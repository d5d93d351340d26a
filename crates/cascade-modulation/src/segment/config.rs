//! Segment configuration records.
//!
//! A channel is programmed as a short sequence of these records; the
//! generator compiles them into an executable graph (multi-segment) or
//! selects a specialized processor (single segment).

/// The four segment archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentType {
    /// A phase-driven crossfade from the previous level to a target.
    #[default]
    Ramp = 0,
    /// A constant level with optional portamento toward it.
    Step = 1,
    /// A constant level held for a programmed time (or until an edge).
    Hold = 2,
    /// A probabilistic shift-register voltage.
    Turing = 3,
}

/// Rate range for the single-segment LFO-like modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Range {
    /// The factory rate range.
    #[default]
    Default = 0,
    /// 16x slower (free-running) or division-oriented ratios (tap).
    Slow = 1,
    /// 64x faster, capped at audio rates.
    Fast = 2,
}

/// Static configuration for one segment, valid for a whole block.
#[derive(Debug, Clone, Copy, Default)]
pub struct Configuration {
    /// Which archetype this segment is.
    pub ty: SegmentType,
    /// Whether the segment is part of a loop region.
    pub loop_: bool,
    /// Output centered around zero instead of [0, 1]. For single-segment
    /// ramp and pulse modes this doubles as "do not retrigger".
    pub bipolar: bool,
    /// Rate range for single-segment LFO-like modes.
    pub range: Range,
}

impl Configuration {
    /// Shorthand for the common (type, loop) pair with default polarity
    /// and range.
    pub const fn new(ty: SegmentType, loop_: bool) -> Self {
        Self {
            ty,
            loop_,
            bipolar: false,
            range: Range::Default,
        }
    }

    /// Step-like for the purposes of rising-edge jump wiring.
    ///
    /// A non-looping TURING advances on gates just like a STEP does, so it
    /// participates in stage skipping.
    #[inline]
    pub(crate) fn is_step(&self) -> bool {
        self.ty == SegmentType::Step || (self.ty == SegmentType::Turing && !self.loop_)
    }
}

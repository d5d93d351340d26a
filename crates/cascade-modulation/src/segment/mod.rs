//! Per-channel segment generator.
//!
//! Each output channel owns one [`SegmentGenerator`]. A channel is
//! programmed as a sequence of [`Configuration`] records plus a flag saying
//! whether a trigger input is patched:
//!
//! - With several chained segments, a single interpreter walks the compiled
//!   segment graph, reacting to gate edges.
//! - With exactly one segment, the (type, trigger, loop) combination selects
//!   a specialized processor: envelope, LFO, clock-locked LFO, S&H, delay,
//!   pulse, gate, portamento, or one of the random sources.
//!
//! On every audio block the host supplies one [`GateFlags`] per sample and
//! receives one [`Output`] per sample. The two live parameters of each
//! segment are latched between blocks with
//! [`set_segment_parameters`](SegmentGenerator::set_segment_parameters).

mod config;
mod node;
mod shape;
mod turing;

pub use config::{Configuration, Range, SegmentType};
pub use node::{Output, Segment, Source};
pub use shape::shape_lfo;
pub use turing::advance_register;

use crate::gate::GateFlags;
use crate::ramp_extractor::{RampExtractor, Ratio};
use crate::resources::{Resources, SAMPLE_RATE};
use crate::rng::Rng;
use crate::settings::Settings;
use cascade_math::{
    crossfade, one_pole, semitones_to_ratio, DelayLine, HysteresisQuantizer,
    ParameterInterpolator,
};

/// Maximum number of chained segments per channel.
pub const MAX_NUM_SEGMENTS: usize = 6;

/// Largest block size [`SegmentGenerator::process`] accepts.
pub const MAX_BLOCK_SIZE: usize = 32;

/// Capacity of the clocked delay line, in samples.
pub const MAX_DELAY: usize = 768;

// Duration of the "tooth" in the output when a trigger is received while
// the output is high.
const RETRIG_DELAY_SAMPLES: u32 = 32;

// S&H delay, for all those sequencers whose CV and GATE outputs are out of
// sync.
const SAMPLE_AND_HOLD_DELAY: usize = (SAMPLE_RATE as usize) * 2 / 1000;

const GATE_DELAY_CAPACITY: usize = 128;

/// The two live parameters of one segment, latched between blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parameters {
    /// Mode-specific: time, level, rate or probability.
    pub primary: f32,
    /// Mode-specific: curve, portamento, shape or step count.
    pub secondary: f32,
}

/// Reparameterize a phase with an adjustable-curvature warp.
///
/// `curve` in [0, 1] selects the family member: 0.5 is the identity,
/// higher values rise early (concave), lower values rise late (convex).
/// The warp is continuous in both arguments and fixes 0 and 1.
#[inline]
pub fn warp_phase(t: f32, curve: f32) -> f32 {
    let curve = curve - 0.5;
    let flip = curve < 0.0;
    let mut t = if flip { 1.0 - t } else { t };
    let a = 128.0 * curve * curve;
    t = (1.0 + a) * t / (1.0 + a * t);
    if flip {
        t = 1.0 - t;
    }
    t
}

/// The specialized per-block processors a channel can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessorKind {
    MultiSegment,
    Zero,
    FreeRunningLfo,
    DecayEnvelope,
    TapLfo,
    Portamento,
    SampleAndHold,
    TrackAndHold,
    Delay,
    TimedPulse,
    Gate,
    Random,
    Turing,
    Logistic,
}

// Single-segment dispatch, keyed on type * 4 + has_trigger * 2 + loop.
const PROCESS_TABLE: [ProcessorKind; 16] = [
    // RAMP
    ProcessorKind::Zero,
    ProcessorKind::FreeRunningLfo,
    ProcessorKind::DecayEnvelope,
    ProcessorKind::TapLfo,
    // STEP
    ProcessorKind::Portamento,
    ProcessorKind::Portamento,
    ProcessorKind::SampleAndHold,
    ProcessorKind::SampleAndHold,
    // HOLD
    ProcessorKind::Delay,
    ProcessorKind::Delay,
    ProcessorKind::TimedPulse,
    ProcessorKind::Gate,
    // These types can't normally be accessed, but are what random segments
    // default to in basic mode.
    ProcessorKind::Zero,
    ProcessorKind::Zero,
    ProcessorKind::Zero,
    ProcessorKind::Zero,
];

const ADVANCED_PROCESS_TABLE: [ProcessorKind; 16] = [
    // RAMP
    ProcessorKind::Zero,
    ProcessorKind::FreeRunningLfo,
    ProcessorKind::DecayEnvelope,
    ProcessorKind::TapLfo,
    // STEP
    ProcessorKind::Portamento,
    ProcessorKind::Portamento,
    ProcessorKind::SampleAndHold,
    ProcessorKind::TrackAndHold,
    // HOLD
    ProcessorKind::Delay,
    ProcessorKind::Delay,
    ProcessorKind::TimedPulse,
    ProcessorKind::Gate,
    // TURING
    ProcessorKind::Random,
    ProcessorKind::Random,
    ProcessorKind::Turing,
    ProcessorKind::Logistic,
];

const DIVIDER_RATIOS: [Ratio; 7] = [
    Ratio { ratio: 0.249999, q: 4 },
    Ratio { ratio: 0.333333, q: 3 },
    Ratio { ratio: 0.499999, q: 2 },
    Ratio { ratio: 0.999999, q: 1 },
    Ratio { ratio: 1.999999, q: 1 },
    Ratio { ratio: 2.999999, q: 1 },
    Ratio { ratio: 3.999999, q: 1 },
];

const DIVIDER_RATIOS_SLOW: [Ratio; 8] = [
    Ratio { ratio: 0.124999, q: 8 },
    Ratio { ratio: 0.142856, q: 7 },
    Ratio { ratio: 0.166666, q: 6 },
    Ratio { ratio: 0.199999, q: 5 },
    Ratio { ratio: 0.249999, q: 4 },
    Ratio { ratio: 0.333333, q: 3 },
    Ratio { ratio: 0.499999, q: 2 },
    Ratio { ratio: 0.999999, q: 1 },
];

const DIVIDER_RATIOS_FAST: [Ratio; 8] = [
    Ratio { ratio: 0.999999, q: 1 },
    Ratio { ratio: 1.999999, q: 1 },
    Ratio { ratio: 2.999999, q: 1 },
    Ratio { ratio: 3.999999, q: 1 },
    Ratio { ratio: 4.999999, q: 1 },
    Ratio { ratio: 5.999999, q: 1 },
    Ratio { ratio: 6.999999, q: 1 },
    Ratio { ratio: 7.999999, q: 1 },
];

/// One channel of the modulation engine.
///
/// Construct once per channel with a shared [`Resources`] reference, then
/// drive it with [`configure`](Self::configure),
/// [`set_segment_parameters`](Self::set_segment_parameters) and
/// [`process`](Self::process). Nothing allocates after construction.
#[derive(Debug, Clone)]
pub struct SegmentGenerator<'a> {
    resources: &'a Resources,
    settings: Settings,
    processor: ProcessorKind,

    phase: f32,
    aux: f32,
    start: f32,
    value: f32,
    lp: f32,
    active_segment: usize,
    retrig_delay: u32,
    primary: f32,

    segments: [Segment; MAX_NUM_SEGMENTS + 1],
    parameters: [Parameters; MAX_NUM_SEGMENTS],
    num_segments: usize,

    ramp_extractor: RampExtractor,
    ramp_division_quantizer: HysteresisQuantizer,
    delay_line: DelayLine<f32, MAX_DELAY>,
    gate_delay: DelayLine<GateFlags, GATE_DELAY_CAPACITY>,
    rng: Rng,
}

impl<'a> SegmentGenerator<'a> {
    /// Create a channel with the default RNG seed.
    pub fn new(resources: &'a Resources) -> Self {
        Self::with_seed(resources, 0x12345678)
    }

    /// Create a channel with a specific RNG seed, for reproducible random
    /// sources.
    pub fn with_seed(resources: &'a Resources, seed: u64) -> Self {
        let mut rng = Rng::new(seed);
        let segments = core::array::from_fn(|_| {
            let sr = rng.next_u16();
            let value = rng.next_f32();
            Segment::inert(sr, value)
        });
        Self {
            resources,
            settings: Settings::default(),
            processor: ProcessorKind::MultiSegment,
            phase: 0.0,
            aux: 0.0,
            start: 0.0,
            value: 0.0,
            lp: 0.0,
            active_segment: 0,
            retrig_delay: 0,
            primary: 0.0,
            segments,
            parameters: [Parameters::default(); MAX_NUM_SEGMENTS],
            num_segments: 0,
            ramp_extractor: RampExtractor::new(SAMPLE_RATE, 1000.0 / SAMPLE_RATE),
            ramp_division_quantizer: HysteresisQuantizer::new(),
            delay_line: DelayLine::new(),
            gate_delay: DelayLine::new(),
            rng,
        }
    }

    /// Update the module-wide settings (dispatch table variant, slow LFO).
    ///
    /// Takes effect at the next [`configure`](Self::configure) for the
    /// table selection and at the next block for the LFO range.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// Latch both live parameters of segment `index` for the next block.
    pub fn set_segment_parameters(&mut self, index: usize, primary: f32, secondary: f32) {
        debug_assert!(index < MAX_NUM_SEGMENTS);
        self.parameters[index].primary = primary;
        self.parameters[index].secondary = secondary;
    }

    /// Number of configured segments.
    #[inline]
    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    /// Index of the segment currently producing output.
    #[inline]
    pub fn active_segment(&self) -> usize {
        self.active_segment
    }

    /// The Turing shift register of segment `index`.
    #[inline]
    pub fn shift_register(&self, index: usize) -> u16 {
        self.segments[index].shift_register
    }

    /// The rendered register value of segment `index`.
    #[inline]
    pub fn register_value(&self, index: usize) -> f32 {
        self.segments[index].register_value
    }

    /// Seed the Turing shift register of segment `index`.
    ///
    /// Registers normally persist across reconfiguration; this is the hook
    /// for hosts that restore a saved state (and for deterministic tests).
    pub fn set_shift_register(&mut self, index: usize, bits: u16) {
        let segment = &mut self.segments[index];
        segment.shift_register = bits;
        segment.register_value = f32::from(bits) / 65535.0;
        if segment.bipolar {
            segment.register_value = (10.0 / 8.0) * (segment.register_value - 0.5);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────

    /// Reprogram the channel.
    ///
    /// With one configuration record, selects a specialized processor.
    /// With several, compiles the multi-segment graph; the channel then
    /// rests on the sentinel segment until the first rising edge, so a
    /// reconfiguration never glitches the output mid-note.
    ///
    /// Multi-segment mode requires a trigger input; without one the graph
    /// never leaves the sentinel.
    pub fn configure(&mut self, has_trigger: bool, configurations: &[Configuration]) {
        let num_segments = configurations.len();
        debug_assert!((1..=MAX_NUM_SEGMENTS).contains(&num_segments));

        if num_segments == 1 {
            self.configure_single_segment(has_trigger, configurations[0]);
            return;
        }

        self.num_segments = num_segments;
        self.processor = ProcessorKind::MultiSegment;

        let last = num_segments - 1;

        // First pass: loop points, step segments, first ramp.
        let mut loop_start: i32 = -1;
        let mut loop_end: i32 = -1;
        let mut has_step_segments = false;
        let mut first_ramp_segment: i32 = -1;

        for (i, config) in configurations.iter().enumerate() {
            has_step_segments = has_step_segments || config.is_step();
            if config.loop_ {
                if loop_start == -1 {
                    loop_start = i as i32;
                }
                loop_end = i as i32;
            }
            if config.ty == SegmentType::Ramp && first_ramp_segment == -1 {
                first_ramp_segment = i as i32;
            }
        }

        let mut has_step_segments_inside_loop = false;
        if loop_start != -1 {
            for i in loop_start..=loop_end {
                if configurations[i as usize].is_step() {
                    has_step_segments_inside_loop = true;
                    break;
                }
            }
        }

        for i in 0..num_segments {
            let config = configurations[i];
            let singleton_loop = i as i32 == loop_start && i as i32 == loop_end;
            let s = &mut self.segments[i];
            s.bipolar = config.bipolar;
            s.range = config.range;
            s.retrig = true;
            s.advance_tm = false;

            match config.ty {
                SegmentType::Ramp => {
                    // For ramps, bipolar means don't retrig.
                    s.retrig = !s.bipolar;
                    s.start = None;
                    s.time = Some(Source::Primary(i));
                    s.curve = Source::Secondary(i);
                    s.portamento = Source::Zero;
                    s.phase = None;

                    s.end = if i == last {
                        Source::Zero
                    } else if configurations[i + 1].ty == SegmentType::Turing {
                        Source::Register(i + 1)
                    } else if configurations[i + 1].ty != SegmentType::Ramp {
                        Source::Primary(i + 1)
                    } else if i as i32 == first_ramp_segment {
                        Source::One
                    } else {
                        s.curve = Source::Half;
                        Source::Secondary(i)
                    };
                }
                SegmentType::Step => {
                    s.start = Some(Source::Primary(i));
                    s.end = Source::Primary(i);
                    s.curve = Source::Half;
                    s.portamento = Source::Secondary(i);
                    s.time = None;
                    // Sample if there is a loop of length 1 on this
                    // segment. Otherwise track.
                    s.phase = Some(if singleton_loop { Source::Zero } else { Source::One });
                }
                SegmentType::Turing => {
                    s.start = Some(Source::Register(i));
                    s.end = Source::Register(i);
                    s.curve = Source::Half;
                    s.portamento = Source::Zero;
                    s.advance_tm = true;
                    s.time = None;
                    s.phase = Some(Source::Zero);
                }
                SegmentType::Hold => {
                    s.start = Some(Source::Primary(i));
                    s.end = Source::Primary(i);
                    s.curve = Source::Half;
                    s.portamento = Source::Zero;
                    // Hold if there's a loop of length 1 on this segment.
                    // Otherwise, use the programmed time.
                    s.time = if singleton_loop {
                        None
                    } else {
                        Some(Source::Secondary(i))
                    };
                    // Track the changes on the slider.
                    s.phase = Some(Source::One);
                }
            }

            s.if_complete = if i as i32 == loop_end {
                loop_start
            } else {
                (i + 1) as i32
            };
            s.if_falling = if loop_end == -1 || loop_end == last as i32 || has_step_segments {
                -1
            } else {
                loop_end + 1
            };
            s.if_rising = 0;

            if has_step_segments {
                if !has_step_segments_inside_loop
                    && i as i32 >= loop_start
                    && i as i32 <= loop_end
                {
                    // Rising edges exit a step-free loop.
                    s.if_rising = (loop_end + 1) % num_segments as i32;
                } else {
                    // Skip forward to the next step segment's successor,
                    // following the loop once.
                    let mut follow_loop = loop_end != -1;
                    let mut next_step = i as i32;
                    while !configurations[next_step as usize].is_step() {
                        next_step += 1;
                        if follow_loop && next_step == loop_end + 1 {
                            next_step = loop_start;
                            follow_loop = false;
                        }
                        if next_step >= num_segments as i32 {
                            next_step = last as i32;
                            break;
                        }
                    }
                    s.if_rising = if next_step == loop_end {
                        loop_start
                    } else {
                        (next_step + 1) % num_segments as i32
                    };
                }
            }
        }

        // The sentinel isolates "configured but not yet triggered": the
        // channel waits here, holding the program's final level.
        let sentinel_end = self.segments[num_segments - 1].end;
        let sentinel = &mut self.segments[num_segments];
        sentinel.start = Some(sentinel_end);
        sentinel.end = sentinel_end;
        sentinel.time = Some(Source::Zero);
        sentinel.curve = Source::Half;
        sentinel.portamento = Source::Zero;
        sentinel.phase = None;
        sentinel.bipolar = false;
        sentinel.retrig = true;
        sentinel.advance_tm = false;
        sentinel.if_rising = 0;
        sentinel.if_falling = -1;
        sentinel.if_complete = if loop_end == last as i32 { 0 } else { -1 };

        self.active_segment = num_segments;
    }

    fn configure_single_segment(&mut self, has_trigger: bool, config: Configuration) {
        let mut index = if has_trigger { 2 } else { 0 };
        if config.loop_ {
            index += 1;
        }
        index += config.ty as usize * 4;
        let table = if self.settings.advanced() {
            &ADVANCED_PROCESS_TABLE
        } else {
            &PROCESS_TABLE
        };
        self.processor = table[index];

        let s = &mut self.segments[0];
        s.bipolar = config.bipolar;
        s.range = config.range;
        // Bipolar doubles as "don't retrigger" for the single-segment
        // envelope and pulse modes.
        s.retrig = !config.bipolar;
        self.num_segments = 1;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Processing
    // ─────────────────────────────────────────────────────────────────────

    /// Render one block: one output per gate flag.
    pub fn process(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        debug_assert_eq!(gate_flags.len(), out.len());
        debug_assert!(!out.is_empty() && out.len() <= MAX_BLOCK_SIZE);

        match self.processor {
            ProcessorKind::MultiSegment => self.process_multi_segment(gate_flags, out),
            ProcessorKind::Zero => self.process_zero(out),
            ProcessorKind::FreeRunningLfo => self.process_free_running_lfo(out),
            ProcessorKind::DecayEnvelope => self.process_decay_envelope(gate_flags, out),
            ProcessorKind::TapLfo => self.process_tap_lfo(gate_flags, out),
            ProcessorKind::Portamento => self.process_portamento(out),
            ProcessorKind::SampleAndHold => self.process_sample_and_hold(gate_flags, out),
            ProcessorKind::TrackAndHold => self.process_track_and_hold(gate_flags, out),
            ProcessorKind::Delay => self.process_delay(out),
            ProcessorKind::TimedPulse => self.process_timed_pulse(gate_flags, out),
            ProcessorKind::Gate => self.process_gate(gate_flags, out),
            ProcessorKind::Random => self.process_random(out),
            ProcessorKind::Turing => self.process_turing(gate_flags, out),
            ProcessorKind::Logistic => self.process_logistic(gate_flags, out),
        }
    }

    fn rate_to_frequency(&self, rate: f32) -> f32 {
        self.resources.rate_to_frequency(rate)
    }

    fn portamento_coefficient(&self, rate: f32) -> f32 {
        self.resources.portamento_rate_to_lp_coefficient(rate)
    }

    fn process_multi_segment(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let mut phase = self.phase;
        let mut start = self.start;
        let mut lp = self.lp;
        let mut value = self.value;

        for (&flags, out) in gate_flags.iter().zip(out.iter_mut()) {
            let segment = self.segments[self.active_segment];

            if let Some(time) = segment.time {
                phase += self.rate_to_frequency(time.get(&self.parameters, &self.segments));
            }

            let complete = phase >= 1.0;
            if complete {
                phase = 1.0;
            }
            let t = match segment.phase {
                Some(source) => source.get(&self.parameters, &self.segments),
                None => phase,
            };
            value = crossfade(
                start,
                segment.end.get(&self.parameters, &self.segments),
                warp_phase(t, segment.curve.get(&self.parameters, &self.segments)),
            );

            let coefficient = self
                .portamento_coefficient(segment.portamento.get(&self.parameters, &self.segments));
            one_pole(&mut lp, value, coefficient);

            // Decide what to do next.
            let go_to_segment = if flags.is_rising() && segment.retrig {
                segment.if_rising
            } else if flags.is_falling() {
                segment.if_falling
            } else if complete {
                segment.if_complete
            } else {
                -1
            };

            if go_to_segment != -1 {
                if segment.advance_tm {
                    let secondary = self.parameters[self.active_segment].secondary;
                    let steps = ((15.0 * secondary) as usize).min(15) + 1;
                    let prob = self.parameters[self.active_segment].primary;
                    let active = &mut self.segments[self.active_segment];
                    active.register_value = advance_register(
                        steps,
                        prob,
                        &mut active.shift_register,
                        active.bipolar,
                        &mut self.rng,
                    );
                }
                phase = 0.0;
                let destination = self.segments[go_to_segment as usize];
                start = match destination.start {
                    Some(source) => source.get(&self.parameters, &self.segments),
                    // Glides continue from where they are.
                    None if go_to_segment as usize == self.active_segment => start,
                    None => value,
                };
                self.active_segment = go_to_segment as usize;
            }

            out.value = lp;
            out.phase = phase;
            out.segment = self.active_segment as u8;
        }
        self.phase = phase;
        self.start = start;
        self.lp = lp;
        self.value = value;
    }

    fn process_decay_envelope(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let frequency = self.rate_to_frequency(self.parameters[0].primary);
        for (&flags, out) in gate_flags.iter().zip(out.iter_mut()) {
            if flags.is_rising() && (self.active_segment != 0 || self.segments[0].retrig) {
                self.phase = 0.0;
                self.active_segment = 0;
            }

            self.phase += frequency;
            if self.phase >= 1.0 {
                self.phase = 1.0;
                self.active_segment = 1;
            }
            self.value = 1.0 - warp_phase(self.phase, self.parameters[0].secondary);
            self.lp = self.value;
            out.value = self.lp;
            out.phase = self.phase;
            out.segment = self.active_segment as u8;
        }
    }

    fn process_timed_pulse(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let frequency = self.rate_to_frequency(self.parameters[0].secondary);
        let mut primary =
            ParameterInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        for (&flags, out) in gate_flags.iter().zip(out.iter_mut()) {
            if flags.is_rising() && (self.active_segment != 0 || self.segments[0].retrig) {
                self.retrig_delay = if self.active_segment == 0 {
                    RETRIG_DELAY_SAMPLES
                } else {
                    0
                };
                self.phase = 0.0;
                self.active_segment = 0;
            }
            if self.retrig_delay > 0 {
                self.retrig_delay -= 1;
            }
            self.phase += frequency;
            if self.phase >= 1.0 {
                self.phase = 1.0;
                self.active_segment = 1;
            }

            let p = primary.next();
            self.value = if self.active_segment == 0 && self.retrig_delay == 0 {
                p
            } else {
                0.0
            };
            self.lp = self.value;
            out.value = self.lp;
            out.phase = self.phase;
            out.segment = self.active_segment as u8;
        }
        self.primary = primary.value();
    }

    fn process_gate(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let mut primary =
            ParameterInterpolator::new(self.primary, self.parameters[0].primary, out.len());
        for (&flags, out) in gate_flags.iter().zip(out.iter_mut()) {
            self.active_segment = if flags.is_high() { 0 } else { 1 };

            let p = primary.next();
            self.value = if self.active_segment == 0 { p } else { 0.0 };
            self.lp = self.value;
            out.value = self.lp;
            out.phase = 0.5;
            out.segment = self.active_segment as u8;
        }
        self.primary = primary.value();
    }

    fn process_sample_and_hold(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let coefficient = self.portamento_coefficient(self.parameters[0].secondary);
        let mut primary =
            ParameterInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        for (&flags, out) in gate_flags.iter().zip(out.iter_mut()) {
            let p = primary.next();
            self.gate_delay.write(flags);
            if self.gate_delay.read(SAMPLE_AND_HOLD_DELAY).is_rising() {
                self.value = p;
            }
            self.active_segment = if flags.is_high() { 0 } else { 1 };

            one_pole(&mut self.lp, self.value, coefficient);
            out.value = self.lp;
            out.phase = 0.5;
            out.segment = self.active_segment as u8;
        }
        self.primary = primary.value();
    }

    fn process_track_and_hold(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let coefficient = self.portamento_coefficient(self.parameters[0].secondary);
        let mut primary =
            ParameterInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        for (&flags, out) in gate_flags.iter().zip(out.iter_mut()) {
            let p = primary.next();
            self.gate_delay.write(flags);
            if self.gate_delay.read(SAMPLE_AND_HOLD_DELAY).is_high() {
                self.value = p;
            }
            self.active_segment = if flags.is_high() { 0 } else { 1 };

            one_pole(&mut self.lp, self.value, coefficient);
            out.value = self.lp;
            out.phase = 0.5;
            out.segment = self.active_segment as u8;
        }
        self.primary = primary.value();
    }

    fn process_tap_lfo(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let control = self.parameters[0].primary * 1.03;
        let ratio = match self.segments[0].range {
            Range::Default => *self.ramp_division_quantizer.lookup(&DIVIDER_RATIOS, control),
            Range::Slow => *self
                .ramp_division_quantizer
                .lookup(&DIVIDER_RATIOS_SLOW, control),
            Range::Fast => *self
                .ramp_division_quantizer
                .lookup(&DIVIDER_RATIOS_FAST, control),
        };

        let size = out.len();
        let mut ramp = [0.0f32; MAX_BLOCK_SIZE];
        self.ramp_extractor
            .process(ratio, gate_flags, &mut ramp[..size]);
        for (out, &phase) in out.iter_mut().zip(ramp[..size].iter()) {
            out.phase = phase;
        }
        shape_lfo(
            self.resources,
            self.parameters[0].secondary,
            out,
            self.segments[0].bipolar,
        );
        self.active_segment = out[size - 1].segment as usize;
    }

    fn process_free_running_lfo(&mut self, out: &mut [Output]) {
        let f = (96.0 * (self.parameters[0].primary - 0.5)).clamp(-128.0, 127.0);
        let mut frequency = semitones_to_ratio(f) * 2.0439497 / SAMPLE_RATE;

        self.active_segment = 0;
        match self.segments[0].range {
            Range::Slow => frequency /= 16.0,
            Range::Fast => {
                frequency *= 64.0;
                // A8; things get weird past this.
                frequency = frequency.min(7040.0 / SAMPLE_RATE);
            }
            Range::Default => {}
        }

        if self.settings.slow_lfo() {
            frequency /= 8.0;
        }

        for out in out.iter_mut() {
            self.phase += frequency;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
            out.phase = self.phase;
        }
        shape_lfo(
            self.resources,
            self.parameters[0].secondary,
            out,
            self.segments[0].bipolar,
        );
        self.active_segment = out[out.len() - 1].segment as usize;
    }

    fn process_delay(&mut self, out: &mut [Output]) {
        let max_delay = (MAX_DELAY - 1) as f32;

        let mut delay_time =
            semitones_to_ratio(2.0 * (self.parameters[0].secondary - 0.5) * 36.0)
                * 0.5
                * SAMPLE_RATE;
        let mut clock_frequency = 1.0;
        let delay_frequency = 1.0 / delay_time;

        if delay_time >= max_delay {
            clock_frequency = max_delay * delay_frequency;
            delay_time = max_delay;
        }
        let mut primary =
            ParameterInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        self.active_segment = 0;
        for out in out.iter_mut() {
            self.phase += clock_frequency;
            let p = primary.next();
            one_pole(&mut self.lp, p, clock_frequency);
            if self.phase >= 1.0 {
                self.phase -= 1.0;
                self.delay_line.write(self.lp);
            }

            self.aux += delay_frequency;
            if self.aux >= 1.0 {
                self.aux -= 1.0;
            }
            self.active_segment = if self.aux < 0.5 { 0 } else { 1 };

            let read = self.delay_line.read_fractional(delay_time - self.phase);
            one_pole(&mut self.value, read, clock_frequency);
            out.value = self.value;
            out.phase = self.aux;
            out.segment = self.active_segment as u8;
        }
        self.primary = primary.value();
    }

    fn process_portamento(&mut self, out: &mut [Output]) {
        let coefficient = self.portamento_coefficient(self.parameters[0].secondary);
        let mut primary =
            ParameterInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        self.active_segment = 0;
        for out in out.iter_mut() {
            self.value = primary.next();
            one_pole(&mut self.lp, self.value, coefficient);
            out.value = self.lp;
            out.phase = 0.5;
            out.segment = 0;
        }
        self.primary = primary.value();
    }

    fn process_random(&mut self, out: &mut [Output]) {
        let coefficient = self.portamento_coefficient(self.parameters[0].secondary);
        let f = (96.0 * (self.parameters[0].primary - 0.5)).clamp(-128.0, 127.0);
        let frequency = semitones_to_ratio(f) * 2.0439497 / SAMPLE_RATE;

        self.active_segment = 0;
        for out in out.iter_mut() {
            self.phase += frequency;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
                self.value = self.rng.next_f32();
                if self.segments[0].bipolar {
                    self.value = 10.0 / 8.0 * (self.value - 0.5);
                }
                self.active_segment = 1;
            }
            one_pole(&mut self.lp, self.value, coefficient);
            out.value = self.lp;
            out.phase = 0.5;
            out.segment = self.active_segment as u8;
        }
    }

    fn process_turing(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let steps = ((15.0 * self.parameters[0].secondary) as usize).min(15) + 1;
        let mut primary =
            ParameterInterpolator::new(self.primary, self.parameters[0].primary, out.len());

        for (&flags, out) in gate_flags.iter().zip(out.iter_mut()) {
            let prob = primary.next();
            if flags.is_rising() {
                let segment = &mut self.segments[0];
                segment.register_value = advance_register(
                    steps,
                    prob,
                    &mut segment.shift_register,
                    segment.bipolar,
                    &mut self.rng,
                );
                self.value = segment.register_value;
            }
            self.active_segment = if flags.is_high() { 0 } else { 1 };
            out.value = self.segments[0].register_value;
            out.phase = 0.5;
            out.segment = self.active_segment as u8;
        }
        self.primary = primary.value();
    }

    fn process_logistic(&mut self, gate_flags: &[GateFlags], out: &mut [Output]) {
        let coefficient = self.portamento_coefficient(self.parameters[0].secondary);
        // 3.5 to 4.0: the chaotic regime of the logistic map.
        let r = 0.5 * self.parameters[0].primary + 3.5;
        if self.value <= 0.0 {
            self.value = self.rng.next_f32();
        }

        for (&flags, out) in gate_flags.iter().zip(out.iter_mut()) {
            if flags.is_rising() {
                self.value *= r * (1.0 - self.value);
            }
            self.active_segment = if flags.is_high() { 0 } else { 1 };

            one_pole(&mut self.lp, self.value, coefficient);
            out.value = if self.segments[0].bipolar {
                10.0 / 8.0 * (self.lp - 0.5)
            } else {
                self.lp
            };
            out.phase = 0.5;
            out.segment = self.active_segment as u8;
        }
    }

    fn process_zero(&mut self, out: &mut [Output]) {
        self.value = 0.0;
        self.active_segment = 1;
        for out in out.iter_mut() {
            out.value = 0.0;
            out.phase = 0.5;
            out.segment = 1;
        }
    }
}

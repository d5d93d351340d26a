//! Segment generator integration tests.
//!
//! Scenarios are driven the way the host drives a channel: parameters
//! latched between blocks, 8-sample blocks of gate flags in, outputs
//! checked against the programmed behavior.

use cascade_modulation::{
    Configuration, GateFlags, MultiMode, Output, Range, Resources, SegmentGenerator, SegmentType,
    Settings, SAMPLE_RATE,
};

const BLOCK: usize = 8;

/// Expand a per-sample gate level pattern into flags and render it.
fn render(generator: &mut SegmentGenerator, levels: &[bool]) -> Vec<Output> {
    let mut previous = GateFlags::LOW;
    let flags: Vec<GateFlags> = levels
        .iter()
        .map(|&level| {
            previous = GateFlags::extract(previous, level);
            previous
        })
        .collect();
    let mut out = vec![Output::default(); levels.len()];
    for (f, o) in flags.chunks(BLOCK).zip(out.chunks_mut(BLOCK)) {
        generator.process(f, o);
    }
    out
}

/// Gate levels: low before `rise`, high in `rise..fall`, low after.
fn gate_window(len: usize, rise: usize, fall: usize) -> Vec<bool> {
    (0..len).map(|i| i >= rise && i < fall).collect()
}

/// Periodic pulse train starting at sample 0.
fn pulse_train(len: usize, period: usize, high: usize) -> Vec<bool> {
    (0..len).map(|i| i % period < high).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Decay envelope
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_decay_envelope() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Ramp, false)]);
    generator.set_segment_parameters(0, 0.7, 0.2);

    let out = render(&mut generator, &gate_window(4000, 0, 4));

    // Starts from the top and decays monotonically to zero.
    assert!(out[0].value > 0.9, "start {}", out[0].value);
    for w in out.windows(2) {
        assert!(w[1].value <= w[0].value + 1e-6);
    }
    assert!(out[1000].value < 1e-3);
    assert_eq!(out[3999].value, out[1500].value);

    // Phase saturates at 1.0 and the channel parks on segment 1.
    assert_eq!(out[3999].phase, 1.0);
    assert_eq!(out[3999].segment, 1);
    for o in &out {
        assert!((0.0..=1.0).contains(&o.phase));
    }
}

#[test]
fn test_decay_envelope_retrigger() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Ramp, false)]);
    generator.set_segment_parameters(0, 0.7, 0.5);

    let mut levels = vec![false; 2000];
    levels[0] = true;
    levels[200] = true; // Retrigger mid-decay.
    let out = render(&mut generator, &levels);

    assert!(out[210].value > out[190].value, "retrigger did not reset");
}

#[test]
fn test_decay_envelope_bipolar_blocks_retrigger() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    let config = Configuration {
        ty: SegmentType::Ramp,
        loop_: false,
        bipolar: true,
        range: Range::Default,
    };
    generator.configure(true, &[config]);
    generator.set_segment_parameters(0, 0.7, 0.5);

    let mut levels = vec![false; 2000];
    levels[0] = true;
    levels[200] = true;
    let out = render(&mut generator, &levels);

    // Mid-decay rising edges are ignored while the envelope runs.
    assert!(out[210].value <= out[190].value);
}

// ─────────────────────────────────────────────────────────────────────────────
// Multi-segment: ADSR
// ─────────────────────────────────────────────────────────────────────────────

fn adsr_generator(resources: &Resources) -> SegmentGenerator<'_> {
    let mut generator = SegmentGenerator::new(resources);
    let configurations = [
        Configuration::new(SegmentType::Ramp, false),
        Configuration::new(SegmentType::Ramp, false),
        Configuration::new(SegmentType::Ramp, false),
        Configuration::new(SegmentType::Hold, true),
        Configuration::new(SegmentType::Ramp, false),
    ];
    generator.configure(true, &configurations);
    generator.set_segment_parameters(0, 0.15, 0.0);
    generator.set_segment_parameters(1, 0.25, 0.3);
    generator.set_segment_parameters(2, 0.25, 0.75);
    generator.set_segment_parameters(3, 0.5, 0.1);
    generator.set_segment_parameters(4, 0.5, 0.25);
    generator
}

#[test]
fn test_adsr_walkthrough() {
    let resources = Resources::new();
    let mut generator = adsr_generator(&resources);

    let rise = 16;
    let fall = 200_016;
    let len = 240_000;
    let out = render(&mut generator, &gate_window(len, rise, fall));

    // Before the trigger the channel rests on the sentinel (index 5).
    assert_eq!(out[0].segment, 5);
    assert_eq!(out[rise - 1].segment, 5);

    // The trigger enters the attack.
    assert_eq!(out[rise + 8].segment, 0);

    // Attack rises monotonically while in segment 0.
    let attack: Vec<&Output> = out[rise..].iter().take_while(|o| o.segment == 0).collect();
    assert!(attack.len() > 1000);
    for w in attack.windows(2) {
        assert!(w[1].value >= w[0].value - 1e-5);
    }
    let attack_peak = attack.last().unwrap().value;
    assert!(attack_peak > 0.95, "attack peaked at {}", attack_peak);

    // Well before the gate falls, the channel sits on the sustain loop
    // (segment 3) at the programmed level.
    assert_eq!(out[199_000].segment, 3);
    assert!((out[199_000].value - 0.5).abs() < 1e-3);

    // The falling edge exits the loop into the release segment.
    assert_eq!(out[fall + 8].segment, 4);

    // The release decays to zero and the channel parks on the sentinel.
    assert_eq!(out[len - 1].segment, 5);
    assert!(out[len - 1].value < 1e-3);

    // Structural invariants hold throughout.
    for o in &out {
        assert!((0.0..=1.0).contains(&o.phase));
        assert!(o.segment <= 5);
    }
}

#[test]
fn test_adsr_retrigger_during_sustain() {
    let resources = Resources::new();
    let mut generator = adsr_generator(&resources);

    // Reach sustain, drop the gate low for one sample, then raise it again:
    // the second rising edge must restart the attack from the sustain level.
    let mut levels = gate_window(260_000, 16, 260_000);
    levels[200_000] = false;
    let out = render(&mut generator, &levels);

    assert_eq!(out[199_999].segment, 3);
    // One low sample exits to release, the next rising edge re-enters
    // the attack.
    assert_eq!(out[200_016].segment, 0);
    // The attack resumes from where the output was, not from zero.
    assert!(out[200_016].value > 0.4);
}

// ─────────────────────────────────────────────────────────────────────────────
// Multi-segment: step sequences
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_two_step_sequence_advances_on_gates() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    let configurations = [
        Configuration::new(SegmentType::Step, false),
        Configuration::new(SegmentType::Step, false),
    ];
    generator.configure(true, &configurations);
    generator.set_segment_parameters(0, 0.2, 0.0);
    generator.set_segment_parameters(1, 0.8, 0.0);

    let out = render(&mut generator, &pulse_train(4000, 1000, 100));

    // Rising edges walk through the steps cyclically.
    assert_eq!(out[500].segment, 0);
    assert!((out[500].value - 0.2).abs() < 1e-3);
    assert_eq!(out[1500].segment, 1);
    assert!((out[1500].value - 0.8).abs() < 1e-3);
    assert_eq!(out[2500].segment, 0);
    assert!((out[2500].value - 0.2).abs() < 1e-3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Timed pulse
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_timed_pulse() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Hold, false)]);
    generator.set_segment_parameters(0, 0.8, 0.4);

    let mut levels = vec![false; 20_000];
    levels[0] = true;
    let out = render(&mut generator, &levels);

    // High at the programmed level for the programmed duration, then low.
    assert!((out[100].value - 0.8).abs() < 1e-3);
    assert!((out[4000].value - 0.8).abs() < 1e-3);
    assert_eq!(out[12_000].value, 0.0);
    assert_eq!(out[12_000].segment, 1);
}

#[test]
fn test_timed_pulse_retrigger_notch() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Hold, false)]);
    generator.set_segment_parameters(0, 0.8, 0.4);

    let mut levels = vec![false; 12_000];
    levels[0] = true;
    levels[4000] = true; // Retrigger while the output is still high.
    let out = render(&mut generator, &levels);

    // A retrigger cuts a notch so it stays visible.
    for o in &out[4000..4030] {
        assert_eq!(o.value, 0.0);
    }
    assert!((out[4040].value - 0.8).abs() < 1e-3);
}

// ─────────────────────────────────────────────────────────────────────────────
// Gate, sample-and-hold, track-and-hold
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_gate_follows_input() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Hold, true)]);
    generator.set_segment_parameters(0, 0.6, 1.0);

    let out = render(&mut generator, &gate_window(400, 100, 200));

    assert_eq!(out[50].value, 0.0);
    assert_eq!(out[50].segment, 1);
    assert!((out[150].value - 0.6).abs() < 1e-3);
    assert_eq!(out[150].segment, 0);
    assert_eq!(out[300].value, 0.0);
}

#[test]
fn test_sample_and_hold_latches_after_gate_delay() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Step, false)]);
    generator.set_segment_parameters(0, 0.37, 0.0);

    let delay = (SAMPLE_RATE as usize) * 2 / 1000;
    let out = render(&mut generator, &gate_window(400, 100, 300));

    // The latch waits out the anti-skew delay after the edge.
    assert_eq!(out[100 + delay - 4].value, 0.0);
    assert!((out[100 + delay + 4].value - 0.37).abs() < 1e-3);
    // And holds after the gate goes low again.
    assert!((out[399].value - 0.37).abs() < 1e-3);
}

#[test]
fn test_track_and_hold_vs_sample_and_hold_dispatch() {
    let resources = Resources::new();

    let run = |multimode: MultiMode| {
        let mut generator = SegmentGenerator::new(&resources);
        generator.set_settings(Settings { multimode });
        generator.configure(true, &[Configuration::new(SegmentType::Step, true)]);

        // Latch 0.3, then move the slider to 0.9 while the gate stays high.
        generator.set_segment_parameters(0, 0.3, 0.0);
        let mut previous = GateFlags::LOW;
        let mut out = [Output::default(); BLOCK];
        for block in 0..100 {
            if block == 50 {
                generator.set_segment_parameters(0, 0.9, 0.0);
            }
            let flags: Vec<GateFlags> = (0..BLOCK)
                .map(|i| {
                    let level = block > 2 || i > 4;
                    previous = GateFlags::extract(previous, level);
                    previous
                })
                .collect();
            generator.process(&flags, &mut out);
        }
        out[BLOCK - 1].value
    };

    // Basic mode samples on the (delayed) rising edge only: the later
    // slider move is ignored. Advanced mode tracks while the gate is high.
    let sampled = run(MultiMode::Standard);
    let tracked = run(MultiMode::Advanced);
    assert!((sampled - 0.3).abs() < 1e-3, "S&H drifted: {}", sampled);
    assert!((tracked - 0.9).abs() < 1e-3, "T&H stuck: {}", tracked);
}

// ─────────────────────────────────────────────────────────────────────────────
// Portamento and delay
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_portamento_glides() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(false, &[Configuration::new(SegmentType::Step, false)]);
    generator.set_segment_parameters(0, 1.0, 0.45);

    let out = render(&mut generator, &vec![false; 400]);

    for w in out.windows(2) {
        assert!(w[1].value >= w[0].value - 1e-6);
    }
    assert!(out[20].value < 0.9);
    assert!(out[399].value > 0.95);
}

#[test]
fn test_delay_converges_to_input() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(false, &[Configuration::new(SegmentType::Hold, false)]);
    generator.set_segment_parameters(0, 0.8, 0.5);

    let out = render(&mut generator, &vec![false; 60_000]);

    assert!(out[100].value < 0.1, "delayed output arrived early");
    assert!(
        (out[59_999].value - 0.8).abs() < 0.05,
        "delay output {} never converged",
        out[59_999].value
    );
    for o in &out {
        assert!((0.0..=1.0).contains(&o.phase));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LFO modes
// ─────────────────────────────────────────────────────────────────────────────

fn count_phase_wraps(out: &[Output]) -> usize {
    out.windows(2)
        .filter(|w| w[1].phase < w[0].phase - 0.5)
        .count()
}

#[test]
fn test_free_running_lfo_rate() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(false, &[Configuration::new(SegmentType::Ramp, true)]);
    generator.set_segment_parameters(0, 0.5, 0.5);

    // 2.04 Hz at the center position: two full cycles in one second.
    let out = render(&mut generator, &vec![false; 32_000]);
    let wraps = count_phase_wraps(&out);
    assert!((2..=3).contains(&wraps), "wraps = {}", wraps);

    for o in &out {
        assert!((0.0..=1.0).contains(&o.value));
    }
}

#[test]
fn test_free_running_lfo_range_scaling() {
    let resources = Resources::new();
    let cycles = |range: Range, multimode: MultiMode| {
        let mut generator = SegmentGenerator::new(&resources);
        generator.set_settings(Settings { multimode });
        let config = Configuration {
            ty: SegmentType::Ramp,
            loop_: true,
            bipolar: false,
            range,
        };
        generator.configure(false, &[config]);
        generator.set_segment_parameters(0, 0.5, 0.5);
        let out = render(&mut generator, &vec![false; 64_000]);
        count_phase_wraps(&out)
    };

    let default = cycles(Range::Default, MultiMode::Standard);
    let slow = cycles(Range::Slow, MultiMode::Standard);
    let fast = cycles(Range::Fast, MultiMode::Standard);
    let slow_mode = cycles(Range::Default, MultiMode::SlowLfo);

    assert!((4..=5).contains(&default), "default = {}", default);
    assert_eq!(slow, 0, "slow range should not complete a cycle in 2s");
    assert!(fast > 200, "fast range too slow: {}", fast);
    assert!(slow_mode < default, "slow multimode did not divide the rate");
}

#[test]
fn test_free_running_lfo_bipolar_centering() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    let config = Configuration {
        ty: SegmentType::Ramp,
        loop_: true,
        bipolar: true,
        range: Range::Default,
    };
    generator.configure(false, &[config]);
    generator.set_segment_parameters(0, 0.5, 0.5);

    let out = render(&mut generator, &vec![false; 32_000]);
    let mean = out.iter().map(|o| o.value).sum::<f32>() / out.len() as f32;
    assert!(mean.abs() < 0.02, "bipolar LFO mean {}", mean);
    for o in &out {
        assert!(o.value.abs() <= 10.0 / 16.0 + 1e-3);
    }
}

#[test]
fn test_tap_lfo_locks_one_cycle_per_pulse() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Ramp, true)]);
    generator.set_segment_parameters(0, 0.5, 0.5);

    // Steady clock: period 500 samples.
    let out = render(&mut generator, &pulse_train(8 * 500, 500, 250));

    // After the lock settles, one output cycle per input pulse.
    let tail = &out[500 * 4..];
    let wraps = count_phase_wraps(tail);
    assert!((3..=5).contains(&wraps), "wraps = {}", wraps);
    for o in tail {
        assert!((0.0..=1.0).contains(&o.value));
    }
}

#[test]
fn test_tap_lfo_audio_rate_clock() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Ramp, true)]);
    generator.set_segment_parameters(0, 0.5, 0.5);

    // 1 kHz clock: a 32-sample period, deep in audio-rate territory.
    let mut levels = pulse_train(100_000, 32, 16);
    // Then the clock dies.
    levels.extend(std::iter::repeat(false).take(2000));
    let out = render(&mut generator, &levels);

    // While clocked, the ramp keeps cycling.
    let clocked = &out[96_000..100_000];
    assert!(count_phase_wraps(clocked) > 100);

    // Within a couple of periods of silence the phase freezes.
    let frozen = &out[100_200..];
    for w in frozen.windows(2) {
        assert_eq!(w[0].phase, w[1].phase);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Random sources (advanced dispatch)
// ─────────────────────────────────────────────────────────────────────────────

fn advanced_generator(resources: &Resources) -> SegmentGenerator<'_> {
    let mut generator = SegmentGenerator::with_seed(resources, 0xC0FFEE);
    generator.set_settings(Settings {
        multimode: MultiMode::Advanced,
    });
    generator
}

#[test]
fn test_turing_full_rotation_locks_pattern() {
    let resources = Resources::new();
    let mut generator = advanced_generator(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Turing, false)]);
    // Probability pinned to zero, 16 steps: a pure 16-bit rotation.
    generator.set_segment_parameters(0, 0.0005, 1.0);
    generator.set_shift_register(0, 0x5A5A);

    let _ = render(&mut generator, &pulse_train(16 * 64, 64, 8));

    assert_eq!(generator.shift_register(0), 0x5A5A);
}

#[test]
fn test_turing_single_step_drains_to_zero() {
    let resources = Resources::new();
    let mut generator = advanced_generator(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Turing, false)]);
    // One step, probability zero: the MSB replicates itself and a zero
    // MSB drains the register.
    generator.set_segment_parameters(0, 0.0005, 0.0);
    generator.set_shift_register(0, 0x5A5A);

    let _ = render(&mut generator, &pulse_train(16 * 64, 64, 8));

    assert_eq!(generator.shift_register(0), 0x0000);
    assert_eq!(generator.register_value(0), 0.0);
}

#[test]
fn test_turing_output_follows_register() {
    let resources = Resources::new();
    let mut generator = advanced_generator(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Turing, false)]);
    generator.set_segment_parameters(0, 0.5, 0.5);

    let out = render(&mut generator, &pulse_train(64 * 64, 64, 8));

    // Values change only on rising edges and always mirror the register.
    for o in &out {
        assert!((0.0..=1.0).contains(&o.value));
    }
    let distinct: std::collections::BTreeSet<u32> =
        out.iter().map(|o| o.value.to_bits()).collect();
    assert!(distinct.len() > 4, "register never moved");
}

#[test]
fn test_logistic_orbit_stays_bounded() {
    let resources = Resources::new();
    let mut generator = advanced_generator(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Turing, true)]);
    generator.set_segment_parameters(0, 1.0, 0.0);

    let out = render(&mut generator, &pulse_train(256 * 32, 32, 8));

    let mut distinct = std::collections::BTreeSet::new();
    for o in &out {
        assert!((0.0..=1.0).contains(&o.value), "escaped: {}", o.value);
        distinct.insert(o.value.to_bits());
    }
    // r = 4.0 is chaotic; the orbit must keep moving.
    assert!(distinct.len() > 50);
}

#[test]
fn test_random_mode_produces_new_values() {
    let resources = Resources::new();
    let mut generator = advanced_generator(&resources);
    generator.configure(false, &[Configuration::new(SegmentType::Turing, false)]);
    generator.set_segment_parameters(0, 0.9, 0.0);

    let out = render(&mut generator, &vec![false; 32_000]);

    let distinct: std::collections::BTreeSet<u32> =
        out.iter().map(|o| o.value.to_bits()).collect();
    assert!(distinct.len() > 10, "random source is static");
    for o in &out {
        assert!((0.0..=1.0).contains(&o.value));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Basic-mode fallbacks
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_turing_types_are_zero_in_basic_mode() {
    let resources = Resources::new();
    let mut generator = SegmentGenerator::new(&resources);
    generator.configure(true, &[Configuration::new(SegmentType::Turing, false)]);
    generator.set_segment_parameters(0, 0.5, 0.5);

    let out = render(&mut generator, &pulse_train(1000, 100, 50));
    for o in &out {
        assert_eq!(o.value, 0.0);
        assert_eq!(o.segment, 1);
    }
}

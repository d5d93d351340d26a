//! Clock-locked ramp reconstruction.
//!
//! Recovers a continuous phase ramp from a gate stream by guessing when the
//! next edge will occur. Three families of predictors run concurrently:
//!
//! - A moving average of recent intervals.
//! - Periodic rhythmic patterns (the interval 1..8 pulses back).
//! - Constant pulse width: deduce the period from the on time and the
//!   average duty cycle.
//!
//! Every predictor is scored continuously and the best performing one is
//! selected, in the manner of the early Scheirer/Goto beat trackers. Above
//! roughly a hundred hertz the extractor stops chasing individual edges and
//! behaves like a softly detuning VCO instead.

use crate::gate::GateFlags;
use cascade_math::{one_pole, slope};

/// Capacity of the pulse history ring.
pub const HISTORY_SIZE: usize = 16;

/// Longest rhythmic pattern the period predictors can track, in pulses.
pub const MAX_PATTERN_PERIOD: usize = 8;

const PULSE_WIDTH_TOLERANCE: f32 = 0.05;

/// Rational clock multiplier: `q` input pulses produce `ratio * q` output
/// cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ratio {
    /// Frequency multiplier applied to the detected clock.
    pub ratio: f32,
    /// Input pulses per output-phase reset.
    pub q: i32,
}

impl Default for Ratio {
    fn default() -> Self {
        Self { ratio: 1.0, q: 1 }
    }
}

/// One observed clock pulse.
#[derive(Debug, Clone, Copy, Default)]
struct Pulse {
    on_duration: u32,
    total_duration: u32,
    pulse_width: f32,
}

#[inline]
fn is_within_tolerance(x: f32, y: f32, error: f32) -> bool {
    x >= y * (1.0 - error) && x <= y * (1.0 + error)
}

/// Reconstructs a phase ramp in [0, 1) from a gate stream.
///
/// Feed one block of gate flags per call; the extractor writes one ramp
/// sample per flag. Frequencies are normalized (cycles per sample)
/// throughout.
#[derive(Debug, Clone)]
pub struct RampExtractor {
    sample_rate: f32,
    max_frequency: f32,
    audio_rate_period: f32,
    audio_rate_period_hysteresis: f32,
    min_period: f32,
    min_period_hysteresis: f32,

    audio_rate: bool,
    train_phase: f32,
    max_train_phase: f32,
    frequency: f32,
    target_frequency: f32,
    lp_coefficient: f32,
    f_ratio: f32,
    reset_counter: i32,
    reset_interval: f32,

    history: [Pulse; HISTORY_SIZE],
    current_pulse: usize,
    average_pulse_width: f32,
    apw_match_count: usize,
    prediction_error: [f32; MAX_PATTERN_PERIOD + 1],
    predicted_period: [f32; MAX_PATTERN_PERIOD + 1],
}

impl RampExtractor {
    /// Create an extractor.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Host sample rate in Hz
    /// * `max_frequency` - Output frequency ceiling in cycles per sample
    pub fn new(sample_rate: f32, max_frequency: f32) -> Self {
        let audio_rate_period = sample_rate / 100.0;
        let min_period = 1.0 / max_frequency;
        let mut extractor = Self {
            sample_rate,
            max_frequency,
            audio_rate_period,
            audio_rate_period_hysteresis: audio_rate_period,
            min_period,
            min_period_hysteresis: min_period,
            audio_rate: false,
            train_phase: 0.0,
            max_train_phase: 1.0,
            frequency: 0.0,
            target_frequency: 0.0,
            lp_coefficient: 0.5,
            f_ratio: 1.0,
            reset_counter: 1,
            reset_interval: 5.0 * sample_rate,
            history: [Pulse::default(); HISTORY_SIZE],
            current_pulse: 0,
            average_pulse_width: 0.0,
            apw_match_count: 0,
            prediction_error: [0.0; MAX_PATTERN_PERIOD + 1],
            predicted_period: [0.0; MAX_PATTERN_PERIOD + 1],
        };
        extractor.reset();
        extractor
    }

    /// Forget everything and return to the untriggered state.
    pub fn reset(&mut self) {
        self.audio_rate = false;
        self.train_phase = 0.0;
        self.max_train_phase = 1.0;
        self.frequency = 0.0;
        self.target_frequency = 0.0;
        self.lp_coefficient = 0.5;
        self.f_ratio = 1.0;
        self.reset_counter = 1;
        self.reset_interval = 5.0 * self.sample_rate;

        let seed = Pulse {
            on_duration: (self.sample_rate * 0.25) as u32,
            total_duration: (self.sample_rate * 0.5) as u32,
            pulse_width: 0.5,
        };
        self.history = [seed; HISTORY_SIZE];
        self.current_pulse = 0;
        self.history[0].on_duration = 0;
        self.history[0].total_duration = 0;

        self.average_pulse_width = 0.0;
        self.apw_match_count = 0;
        self.prediction_error = [50.0; MAX_PATTERN_PERIOD + 1];
        self.predicted_period = [self.sample_rate * 0.5; MAX_PATTERN_PERIOD + 1];
        self.prediction_error[0] = 0.0;
    }

    /// Whether the extractor is currently in the audio-rate regime.
    #[inline]
    pub fn audio_rate(&self) -> bool {
        self.audio_rate
    }

    /// The current output frequency in cycles per sample.
    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Track the duty cycle of the incoming clock; a stable duty cycle lets
    /// the falling edge predict the period ahead of the next rising edge.
    fn update_average_pulse_width(&mut self, tolerance: f32) {
        let cpw = self.history[self.current_pulse].pulse_width;
        if is_within_tolerance(self.average_pulse_width, cpw, tolerance) {
            self.apw_match_count = (self.apw_match_count + 1).min(HISTORY_SIZE);
            let n = self.apw_match_count as f32;
            self.average_pulse_width = ((n - 1.0) * self.average_pulse_width + cpw) / n;
        } else {
            self.apw_match_count = 1;
            self.average_pulse_width = cpw;
        }
    }

    /// Score every predictor against the pulse that just completed and
    /// return the period of the best one.
    fn predict_next_period(&mut self) -> f32 {
        let last_period = self.history[self.current_pulse].total_duration as f32;

        let mut best_pattern_period = 0;
        for i in 0..=MAX_PATTERN_PERIOD {
            let error = self.predicted_period[i] - last_period;
            slope(&mut self.prediction_error[i], error * error, 0.7, 0.2);

            if i == 0 {
                one_pole(&mut self.predicted_period[0], last_period, 0.5);
            } else {
                let t = self.current_pulse + 1 + HISTORY_SIZE - i;
                self.predicted_period[i] = self.history[t % HISTORY_SIZE].total_duration as f32;
            }

            if self.prediction_error[i] < self.prediction_error[best_pattern_period] {
                best_pattern_period = i;
            }
        }
        self.predicted_period[best_pattern_period]
    }

    /// Finalize the in-progress pulse on a rising edge and retune.
    fn on_rising_edge(&mut self, ratio: Ratio, ar_threshold: f32) {
        let total = self.history[self.current_pulse].total_duration;
        let record_pulse = (total as f32) < self.reset_interval;

        if !record_pulse {
            // The clock went silent long enough that this edge starts a new
            // train: re-predict and hard-reset the phase.
            self.train_phase = 0.0;
            self.reset_counter = ratio.q;
            self.f_ratio = ratio.ratio;
            self.max_train_phase = ratio.q as f32;
            let predicted = self.predict_next_period();
            self.frequency = 1.0 / predicted;
            self.target_frequency = self.frequency;
            self.reset_interval = 4.0 * total as f32;
        } else {
            let period = total as f32;
            if period <= ar_threshold && period > 0.0 {
                self.audio_rate = true;
                self.audio_rate_period_hysteresis = self.audio_rate_period * 1.1;

                self.average_pulse_width = 0.0;
                self.apw_match_count = 0;

                let mut no_glide = self.f_ratio != ratio.ratio;
                self.f_ratio = ratio.ratio;

                let frequency = 1.0 / period;
                self.target_frequency = (self.f_ratio * frequency).min(self.max_frequency);

                let up_tolerance = (1.02 + 2.0 * frequency) * self.frequency;
                let down_tolerance = (0.98 - 2.0 * frequency) * self.frequency;
                no_glide |= self.target_frequency > up_tolerance
                    || self.target_frequency < down_tolerance;
                self.lp_coefficient = if no_glide { 1.0 } else { period * 1e-5 };
            } else {
                self.audio_rate = false;
                self.audio_rate_period_hysteresis = self.audio_rate_period;
                if period <= self.min_period_hysteresis {
                    self.min_period_hysteresis = self.min_period * 1.05;
                    self.frequency = 1.0 / period.max(1.0 / self.sample_rate);
                    self.average_pulse_width = 0.0;
                    self.apw_match_count = 0;
                } else {
                    // Compute the pulse width of the previous pulse, and
                    // check if the PW has been consistent over the past
                    // pulses.
                    self.min_period_hysteresis = self.min_period;
                    let short_on;
                    {
                        let p = &mut self.history[self.current_pulse];
                        p.pulse_width = p.on_duration as f32 / p.total_duration as f32;
                        short_on = p.on_duration < 32;
                    }
                    self.update_average_pulse_width(PULSE_WIDTH_TOLERANCE);
                    if short_on {
                        self.average_pulse_width = 0.0;
                        self.apw_match_count = 0;
                    }
                    let predicted = self.predict_next_period();
                    self.frequency = 1.0 / predicted;
                }
                // Reset the phase if necessary, according to the divider
                // ratio.
                self.reset_counter -= 1;
                if self.reset_counter == 0 {
                    self.train_phase = 0.0;
                    self.reset_counter = ratio.q;
                    self.f_ratio = ratio.ratio;
                    self.max_train_phase = ratio.q as f32;
                } else {
                    let expected = self.max_train_phase - self.reset_counter as f32;
                    let warp = expected - self.train_phase + 1.0;
                    self.frequency *= warp.max(0.01);
                }
                self.target_frequency = self.f_ratio * self.frequency;
                self.reset_interval =
                    (4.0 / self.target_frequency).max(self.sample_rate * 3.0);
            }

            self.current_pulse = (self.current_pulse + 1) % HISTORY_SIZE;
        }
        self.history[self.current_pulse].on_duration = 0;
        self.history[self.current_pulse].total_duration = 0;
    }

    /// Reconstruct one block of ramp samples from the gate stream.
    ///
    /// Writes `ramp.len()` values in [0, 1).
    pub fn process(&mut self, ratio: Ratio, gate_flags: &[GateFlags], ramp: &mut [f32]) {
        debug_assert_eq!(gate_flags.len(), ramp.len());

        let ar_threshold =
            self.audio_rate_period_hysteresis * if ratio.ratio > 1.0 { ratio.ratio } else { 1.0 };
        let size = ramp.len();
        let mut i = 0;
        while i < size {
            if gate_flags[i].is_rising() {
                self.on_rising_edge(ratio, ar_threshold);
            }
            if self.audio_rate {
                loop {
                    let flags = gate_flags[i];
                    {
                        let p = &mut self.history[self.current_pulse];
                        p.total_duration += 1;
                        if flags.is_falling() {
                            p.on_duration = p.total_duration - 1;
                        }
                    }
                    one_pole(&mut self.frequency, self.target_frequency, self.lp_coefficient);
                    self.train_phase += self.frequency;
                    if self.train_phase > 1.0 {
                        self.train_phase -= 1.0;
                        let total = self.history[self.current_pulse].total_duration as f32;
                        if total / self.f_ratio > 1.5 / self.target_frequency {
                            // The clock stopped: freeze rather than
                            // free-running at the last known rate.
                            self.train_phase = 1.0;
                            self.frequency = 0.0;
                            self.target_frequency = 0.0;
                        }
                    }
                    ramp[i] = self.train_phase;
                    i += 1;
                    if i >= size || gate_flags[i].is_rising() {
                        break;
                    }
                }
            } else {
                loop {
                    let flags = gate_flags[i];
                    {
                        let p = &mut self.history[self.current_pulse];
                        p.total_duration += 1;
                        if flags.is_falling() {
                            p.on_duration = p.total_duration - 1;
                            if self.apw_match_count >= HISTORY_SIZE {
                                // Constant duty cycle: extrapolate the
                                // period from the on time alone so the ramp
                                // lands on target before the next edge.
                                let t_on = p.on_duration as f32;
                                let next =
                                    self.max_train_phase - self.reset_counter as f32 + 1.0;
                                let pw = self.average_pulse_width;
                                self.frequency = (next - self.train_phase).max(0.0) * pw
                                    / ((1.0 - pw) * t_on);
                            }
                        }
                    }
                    self.train_phase += self.frequency;
                    if self.train_phase >= self.max_train_phase {
                        self.train_phase = self.max_train_phase;
                    }

                    let phase = self.train_phase * self.f_ratio;
                    ramp[i] = phase - libm::floorf(phase);
                    i += 1;
                    if i >= size || gate_flags[i].is_rising() {
                        break;
                    }
                }
            }
        }
    }
}

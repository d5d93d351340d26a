//! Module-wide operating mode.

/// The module's operating mode, as persisted by the settings collaborator.
///
/// The core reads this once per block: it selects between the basic and
/// advanced single-segment dispatch tables and enables the global slow-LFO
/// range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiMode {
    /// Factory behavior.
    #[default]
    Standard,

    /// Advanced behavior: track-and-hold replaces the looped
    /// sample-and-hold slot, and the random/Turing/logistic processors
    /// become reachable.
    Advanced,

    /// Advanced behavior with every free-running LFO slowed by a further
    /// factor of 8.
    SlowLfo,
}

/// Live settings handle queried by the processors.
#[derive(Debug, Clone, Copy, Default)]
pub struct Settings {
    /// Current operating mode.
    pub multimode: MultiMode,
}

impl Settings {
    /// Whether the advanced dispatch table is active.
    #[inline]
    pub fn advanced(&self) -> bool {
        !matches!(self.multimode, MultiMode::Standard)
    }

    /// Whether free-running LFOs run at 1/8 rate.
    #[inline]
    pub fn slow_lfo(&self) -> bool {
        matches!(self.multimode, MultiMode::SlowLfo)
    }
}

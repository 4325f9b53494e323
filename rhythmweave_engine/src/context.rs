// Bar context and shared value types.
//
// A `BarContext` describes one measure of the arrangement: where it sits in
// the timeline, which section it belongs to, and its metric shape. It is
// built by the upstream timeline layer and is read-only for the duration of
// one selection call. Anchors are onsets already committed by the
// arrangement layer; new candidates must never collide with a same-role
// anchor's beat.
//
// Beats are rational, 1-based positions within a bar (2.5 = halfway between
// beats 2 and 3). Beat identity — anchor collision checks, removal matching,
// tie-break ordering — always goes through `beat_ticks` quantization so that
// floating-point noise cannot change a decision.

use serde::{Deserialize, Serialize};

/// Quantization base for beat identity: 960 divisions per beat covers every
/// subdivision the operators propose (down to 64th-note triplets) exactly.
pub const BEAT_QUANTUM: f64 = 960.0;

/// Quantize a beat position to its stable tick identity.
pub fn beat_ticks(beat: f64) -> u32 {
    (beat * BEAT_QUANTUM).round() as u32
}

/// A named part/voice in the arrangement ("drums", "bass", "keys", ...).
///
/// Roles are open-ended — the engine never enumerates them. They key anchor
/// occupancy and seed-stream derivation, so equality and ordering must be
/// exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Role(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One bar of the arrangement timeline. Externally owned, read-only for the
/// duration of one selection call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarContext {
    /// 1-based bar number within the piece.
    pub bar: u32,
    /// Section identity ("verse-1", "chorus", ...). Operators may decline
    /// bars based on it; the engine itself treats it as opaque.
    pub section: String,
    /// Metric length of the bar in beats.
    pub beats_per_bar: u8,
    /// Timeline resolution in ticks per beat.
    pub ticks_per_beat: u16,
    /// Absolute tick at which the bar starts.
    pub start_tick: u64,
    /// Absolute tick at which the bar ends (exclusive).
    pub end_tick: u64,
}

impl BarContext {
    /// Build a context for a bar in a uniform-meter timeline.
    pub fn new(bar: u32, section: impl Into<String>, beats_per_bar: u8, ticks_per_beat: u16) -> Self {
        let bar_ticks = u64::from(beats_per_bar) * u64::from(ticks_per_beat);
        let start_tick = u64::from(bar.saturating_sub(1)) * bar_ticks;
        BarContext {
            bar,
            section: section.into(),
            beats_per_bar,
            ticks_per_beat,
            start_tick,
            end_tick: start_tick + bar_ticks,
        }
    }
}

/// A pre-existing, already-committed onset. Immutable input for one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub role: Role,
    /// 1-based beat position within the bar.
    pub beat: f64,
}

impl Anchor {
    pub fn new(role: Role, beat: f64) -> Self {
        Anchor { role, beat }
    }
}

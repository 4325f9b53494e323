// Candidate proposals and their normalized onset form.
//
// Operators emit raw `CandidateAddition`s (and optionally
// `CandidateRemoval`s). Before selection, each addition is validated and
// normalized into an `OnsetCandidate`: the uniform shape the grouper and
// selector work with. Normalization is total — it never fails — while
// validation silently drops malformed proposals (visible only through the
// diagnostics sink, never fatal).
//
// Raw proposals are transient: they live for one selection call and are
// never persisted.

use crate::context::{Role, beat_ticks};
use crate::operator::OperatorFamily;
use serde::{Deserialize, Serialize};

/// A proposed, not-yet-committed onset emitted by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateAddition {
    /// Id of the operator that proposed this candidate.
    pub operator_id: String,
    /// Operator-chosen id for this candidate, unique within the operator's
    /// output for one bar. Used for diagnostics attribution.
    pub candidate_id: String,
    /// Family of the proposing operator. Metadata for grouping and
    /// diagnostics only — never an algorithmic branch.
    pub family: OperatorFamily,
    pub role: Role,
    /// 1-based bar number this candidate targets.
    pub bar: u32,
    /// 1-based beat position within the bar.
    pub beat: f64,
    /// Proposal strength in [0, 1]. Becomes the candidate's probability bias.
    pub score: f64,
    /// Optional pitch hint (MIDI number) for the downstream renderer.
    pub pitch: Option<u8>,
    /// Optional duration hint in beats.
    pub duration_beats: Option<f64>,
    /// Optional velocity hint (0-127).
    pub velocity: Option<u8>,
    /// Optional micro-timing offset hint in beats (positive = late).
    pub timing_offset: Option<f64>,
    /// Per-candidate max-adds-per-bar cap. `None` = unlimited.
    pub max_per_bar: Option<u32>,
    /// Free-text tags carried through to the output.
    pub tags: Vec<String>,
}

impl CandidateAddition {
    pub fn new(
        operator_id: impl Into<String>,
        candidate_id: impl Into<String>,
        family: OperatorFamily,
        role: Role,
        bar: u32,
        beat: f64,
        score: f64,
    ) -> Self {
        CandidateAddition {
            operator_id: operator_id.into(),
            candidate_id: candidate_id.into(),
            family,
            role,
            bar,
            beat,
            score,
            pitch: None,
            duration_beats: None,
            velocity: None,
            timing_offset: None,
            max_per_bar: None,
            tags: Vec::new(),
        }
    }

    /// Basic validity check. Returns the rejection reason, or `None` if the
    /// addition is acceptable for the given (bar, role) call.
    pub fn validity_error(&self, bar: u32, role: &Role) -> Option<&'static str> {
        if self.operator_id.is_empty() || self.candidate_id.is_empty() {
            return Some("empty operator or candidate id");
        }
        if self.bar < 1 {
            return Some("bar below 1");
        }
        if self.beat < 1.0 || !self.beat.is_finite() {
            return Some("beat below 1");
        }
        if !(0.0..=1.0).contains(&self.score) || !self.score.is_finite() {
            return Some("score outside [0, 1]");
        }
        if self.bar != bar {
            return Some("wrong bar for this call");
        }
        if self.role != *role {
            return Some("wrong role for this call");
        }
        None
    }
}

/// A request to delete a pre-existing anchor before new candidates are
/// considered. Used by "replace the pattern" operators that clear and
/// re-populate a bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRemoval {
    /// Id of the operator requesting the removal.
    pub operator_id: String,
    pub role: Role,
    pub bar: u32,
    /// Beat of the anchor to remove.
    pub beat: f64,
    /// Free-text reason, carried to diagnostics consumers.
    pub reason: String,
}

/// Metric strength classification of an onset position. Closed tag set;
/// derived totally from the quantized beat position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OnsetStrength {
    /// On an integer beat (1.0, 2.0, ...).
    Strong,
    /// On a half-beat offset (1.5, 2.5, ...).
    Offbeat,
    /// Any finer subdivision (1.25, 2.75, swung positions, ...).
    Ghost,
}

impl OnsetStrength {
    /// Classify a beat position. Total: every finite beat maps to a tag.
    ///
    /// The role is accepted so a role-sensitive table (e.g. different ghost
    /// thresholds for percussion) can slot in without changing call sites;
    /// the current mapping is purely positional.
    pub fn classify(beat: f64, _role: &Role) -> Self {
        let ticks = beat_ticks(beat);
        if ticks % 960 == 0 {
            OnsetStrength::Strong
        } else if ticks % 480 == 0 {
            OnsetStrength::Offbeat
        } else {
            OnsetStrength::Ghost
        }
    }

    /// Stable display name.
    pub fn tag(self) -> &'static str {
        match self {
            OnsetStrength::Strong => "strong",
            OnsetStrength::Offbeat => "offbeat",
            OnsetStrength::Ghost => "ghost",
        }
    }
}

/// The normalized onset candidate consumed by grouping and selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetCandidate {
    /// Id carried from the addition, for diagnostics attribution.
    pub candidate_id: String,
    pub role: Role,
    /// 1-based beat position within the bar.
    pub beat: f64,
    pub strength: OnsetStrength,
    /// Per-candidate max-adds-per-bar cap. `None` = unlimited.
    pub cap: Option<u32>,
    /// Probability bias in [0, 1]; multiplied by the owning group's bias to
    /// form the selection weight.
    pub bias: f64,
    pub tags: Vec<String>,
    pub pitch: Option<u8>,
    pub duration_beats: Option<f64>,
    pub velocity: Option<u8>,
    pub timing_offset: Option<f64>,
}

/// Normalize an accepted addition into its onset form. Total: call only
/// after `validity_error` has accepted the addition.
pub fn normalize(addition: &CandidateAddition) -> OnsetCandidate {
    OnsetCandidate {
        candidate_id: addition.candidate_id.clone(),
        role: addition.role.clone(),
        beat: addition.beat,
        strength: OnsetStrength::classify(addition.beat, &addition.role),
        cap: addition.max_per_bar,
        bias: addition.score.clamp(0.0, 1.0),
        tags: addition.tags.clone(),
        pitch: addition.pitch,
        duration_beats: addition.duration_beats,
        velocity: addition.velocity,
        timing_offset: addition.timing_offset,
    }
}

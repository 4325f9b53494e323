// Diagnostics sink: the engine's observability interface.
//
// The sink is a pure observer — its presence or absence must never change a
// selection outcome. The engine reports filter decisions, successful picks
// with their computed weights, pool-size counters, and isolated operator
// failures. An external reporting tool consumes the records; the engine
// itself never reads them back.
//
// `NullSink` is the default no-op sink. `RecordingSink` accumulates
// serializable events for tests and offline reporting.

use crate::error::OperatorPhase;
use serde::{Deserialize, Serialize};

/// Why a candidate was excluded from selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterReason {
    /// Failed basic validity (bar, beat, score, or id malformed).
    Invalid,
    /// Its beat is already occupied by a same-role anchor.
    AnchorConflict,
    /// Its computed weight is zero or negative; it can never be drawn.
    NonPositiveWeight,
}

impl FilterReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterReason::Invalid => "invalid",
            FilterReason::AnchorConflict => "anchor conflict",
            FilterReason::NonPositiveWeight => "non-positive weight",
        }
    }
}

/// Passive recorder of engine decisions.
pub trait DiagnosticsSink {
    /// A candidate was excluded before or during selection.
    fn candidate_filtered(&mut self, candidate_id: &str, reason: FilterReason);

    /// A candidate was picked, with its computed weight and the RNG purpose
    /// tag of the stream that drew it.
    fn candidate_selected(&mut self, candidate_id: &str, weight: f64, purpose: &str);

    /// A pre-existing anchor was deleted by a removal proposal, with the
    /// proposing operator's id and free-text reason.
    fn anchor_removed(&mut self, operator_id: &str, beat: f64, reason: &str);

    /// Pool size before and after anchor filtering. Reported once per call.
    fn pool_sizes(&mut self, before: usize, after: usize);

    /// An operator failed during a generation phase.
    fn operator_failed(&mut self, operator_id: &str, phase: OperatorPhase, message: &str);
}

/// The no-op sink used when no consumer is attached.
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn candidate_filtered(&mut self, _candidate_id: &str, _reason: FilterReason) {}
    fn candidate_selected(&mut self, _candidate_id: &str, _weight: f64, _purpose: &str) {}
    fn anchor_removed(&mut self, _operator_id: &str, _beat: f64, _reason: &str) {}
    fn pool_sizes(&mut self, _before: usize, _after: usize) {}
    fn operator_failed(&mut self, _operator_id: &str, _phase: OperatorPhase, _message: &str) {}
}

/// One recorded engine decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DiagnosticsEvent {
    CandidateFiltered {
        candidate_id: String,
        reason: FilterReason,
    },
    CandidateSelected {
        candidate_id: String,
        weight: f64,
        purpose: String,
    },
    AnchorRemoved {
        operator: String,
        beat: f64,
        reason: String,
    },
    PoolSizes {
        before: usize,
        after: usize,
    },
    OperatorFailed {
        operator: String,
        phase: OperatorPhase,
        message: String,
    },
}

/// Accumulating sink for tests and offline reporting.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RecordingSink {
    pub events: Vec<DiagnosticsEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids of candidates filtered for the given reason, in report order.
    pub fn filtered_ids(&self, reason: FilterReason) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DiagnosticsEvent::CandidateFiltered {
                    candidate_id,
                    reason: r,
                } if *r == reason => Some(candidate_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Ids of selected candidates, in pick order.
    pub fn selected_ids(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                DiagnosticsEvent::CandidateSelected { candidate_id, .. } => {
                    Some(candidate_id.as_str())
                }
                _ => None,
            })
            .collect()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn candidate_filtered(&mut self, candidate_id: &str, reason: FilterReason) {
        self.events.push(DiagnosticsEvent::CandidateFiltered {
            candidate_id: candidate_id.to_string(),
            reason,
        });
    }

    fn candidate_selected(&mut self, candidate_id: &str, weight: f64, purpose: &str) {
        self.events.push(DiagnosticsEvent::CandidateSelected {
            candidate_id: candidate_id.to_string(),
            weight,
            purpose: purpose.to_string(),
        });
    }

    fn anchor_removed(&mut self, operator_id: &str, beat: f64, reason: &str) {
        self.events.push(DiagnosticsEvent::AnchorRemoved {
            operator: operator_id.to_string(),
            beat,
            reason: reason.to_string(),
        });
    }

    fn pool_sizes(&mut self, before: usize, after: usize) {
        self.events.push(DiagnosticsEvent::PoolSizes { before, after });
    }

    fn operator_failed(&mut self, operator_id: &str, phase: OperatorPhase, message: &str) {
        self.events.push(DiagnosticsEvent::OperatorFailed {
            operator: operator_id.to_string(),
            phase,
            message: message.to_string(),
        });
    }
}

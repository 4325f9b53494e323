// The operator contract, registry, and execution harness.
//
// Operators are the pluggable proposal generators of the engine: each one
// looks at a bar context and proposes onset additions (and, for
// "replace the pattern" operators, anchor removals). Operators are stateless
// with respect to the engine — they may read external context (harmony
// timeline, section metadata) but must treat it as read-only for the call's
// duration, and their output must be pure with respect to engine state.
//
// The harness runs each operator independently. A failing generation phase
// is attributed to that operator and phase; the default policy records the
// failure to diagnostics and continues with the remaining operators, while
// strict mode raises a single wrapped error.

use crate::candidate::{CandidateAddition, CandidateRemoval};
use crate::context::BarContext;
use crate::diagnostics::DiagnosticsSink;
use crate::error::{EngineError, OperatorError, OperatorPhase, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The closed set of operator families.
///
/// A family bundles related operators so their candidates share one weighted,
/// capped group, and labels diagnostics records. It is metadata only — no
/// engine code branches on the family value, and the stable `tag` string is
/// the group id seen by downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperatorFamily {
    /// Core pattern operators: the skeleton hits of a role's groove.
    Backbone,
    /// Off-grid and pushed/pulled placements.
    Syncopation,
    /// Low-intensity decoration hits.
    Ghost,
    /// Transitional flourishes toward section boundaries.
    Fill,
    /// Operators that clear an existing pattern and re-populate it.
    Replace,
}

impl OperatorFamily {
    pub const ALL: [OperatorFamily; 5] = [
        OperatorFamily::Backbone,
        OperatorFamily::Syncopation,
        OperatorFamily::Ghost,
        OperatorFamily::Fill,
        OperatorFamily::Replace,
    ];

    /// Stable string tag. This is the group id: it must never change across
    /// runs or releases, since downstream diagnostics key on it.
    pub fn tag(self) -> &'static str {
        match self {
            OperatorFamily::Backbone => "backbone",
            OperatorFamily::Syncopation => "syncopation",
            OperatorFamily::Ghost => "ghost",
            OperatorFamily::Fill => "fill",
            OperatorFamily::Replace => "replace",
        }
    }

    /// Ordinal position in the declaration order. Grouping sorts by the
    /// derived `Ord`, which follows this same order.
    pub fn ordinal(self) -> usize {
        self as usize
    }
}

/// A pluggable proposal generator. One flat contract; no hierarchy.
pub trait Operator {
    /// Stable operator id, used for failure attribution and removal records.
    fn id(&self) -> &str;

    /// The family whose group this operator's candidates join.
    fn family(&self) -> OperatorFamily;

    /// Optional override for the family group's max-adds-per-bar cap.
    /// Default: no override (the group cap falls back to the contributed
    /// candidate count).
    fn family_cap(&self, ctx: &BarContext) -> Option<u32> {
        let _ = ctx;
        None
    }

    /// Cheap, allocation-free pre-check; lets an operator decline a bar
    /// entirely (wrong section type, missing harmony data).
    fn can_apply(&self, ctx: &BarContext) -> bool;

    /// Propose onset additions for the bar. Finite, restartable, and pure
    /// with respect to engine state.
    fn candidates(&self, ctx: &BarContext) -> std::result::Result<Vec<CandidateAddition>, OperatorError>;

    /// Propose anchor removals, applied before new candidates are
    /// considered. Default: none.
    fn removals(&self, ctx: &BarContext) -> std::result::Result<Vec<CandidateRemoval>, OperatorError> {
        let _ = ctx;
        Ok(Vec::new())
    }
}

/// How the harness responds to an operator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record the failure to diagnostics and continue with the remaining
    /// operators.
    #[default]
    Continue,
    /// Stop at the first failure and raise a single attributed error.
    Strict,
}

/// Ordered collection of operators, injected at engine construction.
/// Execution order follows registration order, but nothing downstream
/// depends on it: grouping sorts by family ordinal.
#[derive(Default)]
pub struct OperatorRegistry {
    operators: Vec<Box<dyn Operator>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operator: Box<dyn Operator>) {
        self.operators.push(operator);
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Operator> {
        self.operators.iter().map(|op| op.as_ref())
    }

    /// Collect family-cap overrides declared by applicable operators.
    /// When several operators of one family override, the smallest wins —
    /// the most conservative choice, and deterministic regardless of
    /// registration order.
    pub fn family_cap_overrides(&self, ctx: &BarContext) -> BTreeMap<OperatorFamily, u32> {
        let mut overrides: BTreeMap<OperatorFamily, u32> = BTreeMap::new();
        for op in self.iter() {
            if !op.can_apply(ctx) {
                continue;
            }
            if let Some(cap) = op.family_cap(ctx) {
                overrides
                    .entry(op.family())
                    .and_modify(|existing| *existing = (*existing).min(cap))
                    .or_insert(cap);
            }
        }
        overrides
    }
}

/// Raw output of one harness run over the registry.
#[derive(Debug, Default)]
pub struct Proposals {
    pub additions: Vec<CandidateAddition>,
    pub removals: Vec<CandidateRemoval>,
}

/// Run every applicable operator over the bar, isolating failures.
pub fn collect_proposals(
    registry: &OperatorRegistry,
    ctx: &BarContext,
    policy: FailurePolicy,
    sink: &mut dyn DiagnosticsSink,
) -> Result<Proposals> {
    let mut proposals = Proposals::default();

    for op in registry.iter() {
        if !op.can_apply(ctx) {
            continue;
        }

        match op.removals(ctx) {
            Ok(mut removals) => proposals.removals.append(&mut removals),
            Err(err) => {
                handle_failure(op.id(), OperatorPhase::Removals, &err, policy, sink)?;
                continue;
            }
        }

        match op.candidates(ctx) {
            Ok(mut additions) => proposals.additions.append(&mut additions),
            Err(err) => {
                handle_failure(op.id(), OperatorPhase::Candidates, &err, policy, sink)?;
            }
        }
    }

    Ok(proposals)
}

fn handle_failure(
    operator: &str,
    phase: OperatorPhase,
    err: &OperatorError,
    policy: FailurePolicy,
    sink: &mut dyn DiagnosticsSink,
) -> Result<()> {
    sink.operator_failed(operator, phase, &err.0);
    match policy {
        FailurePolicy::Continue => Ok(()),
        FailurePolicy::Strict => Err(EngineError::Operator {
            operator: operator.to_string(),
            phase,
            message: err.0.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use crate::diagnostics::{DiagnosticsEvent, NullSink, RecordingSink};

    struct FixedOperator {
        id: String,
        family: OperatorFamily,
        beats: Vec<f64>,
        applies: bool,
    }

    impl Operator for FixedOperator {
        fn id(&self) -> &str {
            &self.id
        }

        fn family(&self) -> OperatorFamily {
            self.family
        }

        fn can_apply(&self, _ctx: &BarContext) -> bool {
            self.applies
        }

        fn candidates(
            &self,
            ctx: &BarContext,
        ) -> std::result::Result<Vec<CandidateAddition>, OperatorError> {
            Ok(self
                .beats
                .iter()
                .enumerate()
                .map(|(i, &beat)| {
                    CandidateAddition::new(
                        &self.id,
                        format!("{}-{i}", self.id),
                        self.family,
                        Role::new("drums"),
                        ctx.bar,
                        beat,
                        0.5,
                    )
                })
                .collect())
        }
    }

    struct FailingOperator;

    impl Operator for FailingOperator {
        fn id(&self) -> &str {
            "broken.op"
        }

        fn family(&self) -> OperatorFamily {
            OperatorFamily::Fill
        }

        fn can_apply(&self, _ctx: &BarContext) -> bool {
            true
        }

        fn candidates(
            &self,
            _ctx: &BarContext,
        ) -> std::result::Result<Vec<CandidateAddition>, OperatorError> {
            Err("pattern table missing".into())
        }
    }

    fn ctx() -> BarContext {
        BarContext::new(1, "verse", 4, 480)
    }

    #[test]
    fn family_tags_are_stable() {
        assert_eq!(OperatorFamily::Backbone.tag(), "backbone");
        assert_eq!(OperatorFamily::Syncopation.tag(), "syncopation");
        assert_eq!(OperatorFamily::Ghost.tag(), "ghost");
        assert_eq!(OperatorFamily::Fill.tag(), "fill");
        assert_eq!(OperatorFamily::Replace.tag(), "replace");
    }

    #[test]
    fn family_ordinals_agree_with_sort_order() {
        let ordinals: Vec<usize> = OperatorFamily::ALL.iter().map(|f| f.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4]);

        // The derived `Ord` (which grouping sorts by) must follow the same
        // declaration order the ordinals report.
        let mut sorted = OperatorFamily::ALL;
        sorted.sort();
        assert_eq!(sorted, OperatorFamily::ALL);
    }

    #[test]
    fn harness_skips_non_applicable_operators() {
        let mut registry = OperatorRegistry::new();
        registry.register(Box::new(FixedOperator {
            id: "a".to_string(),
            family: OperatorFamily::Backbone,
            beats: vec![1.0],
            applies: false,
        }));
        registry.register(Box::new(FixedOperator {
            id: "b".to_string(),
            family: OperatorFamily::Backbone,
            beats: vec![2.0, 3.0],
            applies: true,
        }));

        let proposals =
            collect_proposals(&registry, &ctx(), FailurePolicy::Continue, &mut NullSink).unwrap();
        assert_eq!(proposals.additions.len(), 2);
    }

    #[test]
    fn continue_policy_isolates_failures() {
        let mut registry = OperatorRegistry::new();
        registry.register(Box::new(FailingOperator));
        registry.register(Box::new(FixedOperator {
            id: "ok".to_string(),
            family: OperatorFamily::Backbone,
            beats: vec![1.0],
            applies: true,
        }));

        let mut sink = RecordingSink::default();
        let proposals =
            collect_proposals(&registry, &ctx(), FailurePolicy::Continue, &mut sink).unwrap();

        // The healthy operator still contributed.
        assert_eq!(proposals.additions.len(), 1);
        // The failure was recorded with attribution.
        let failures: Vec<_> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                DiagnosticsEvent::OperatorFailed {
                    operator,
                    phase,
                    message,
                } => Some((operator.clone(), *phase, message.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            failures,
            vec![(
                "broken.op".to_string(),
                OperatorPhase::Candidates,
                "pattern table missing".to_string()
            )]
        );
    }

    #[test]
    fn strict_policy_raises_attributed_error() {
        let mut registry = OperatorRegistry::new();
        registry.register(Box::new(FailingOperator));

        let err = collect_proposals(&registry, &ctx(), FailurePolicy::Strict, &mut NullSink)
            .unwrap_err();
        match err {
            EngineError::Operator {
                operator, phase, ..
            } => {
                assert_eq!(operator, "broken.op");
                assert_eq!(phase, OperatorPhase::Candidates);
            }
            other => panic!("expected operator error, got {other:?}"),
        }
    }

    #[test]
    fn smallest_family_cap_override_wins() {
        struct CappedOperator(u32);
        impl Operator for CappedOperator {
            fn id(&self) -> &str {
                "capped"
            }
            fn family(&self) -> OperatorFamily {
                OperatorFamily::Ghost
            }
            fn family_cap(&self, _ctx: &BarContext) -> Option<u32> {
                Some(self.0)
            }
            fn can_apply(&self, _ctx: &BarContext) -> bool {
                true
            }
            fn candidates(
                &self,
                _ctx: &BarContext,
            ) -> std::result::Result<Vec<CandidateAddition>, OperatorError> {
                Ok(Vec::new())
            }
        }

        let mut registry = OperatorRegistry::new();
        registry.register(Box::new(CappedOperator(5)));
        registry.register(Box::new(CappedOperator(2)));

        let overrides = registry.family_cap_overrides(&ctx());
        assert_eq!(overrides.get(&OperatorFamily::Ghost), Some(&2));
    }
}

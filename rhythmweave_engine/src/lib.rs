// Rhythmweave Engine
//
// The decision core of a procedural music-composition engine: given one bar
// and one role, it decides which of many independently-proposed rhythmic
// events actually get realized. Music theory lives in the operators; the
// engine owns the deterministic, constrained, weighted selection that turns
// an open-ended set of proposals into a bounded, reproducible,
// cap-respecting, anchor-safe result.
//
// Architecture:
// - context.rs: bar context, roles, anchors, beat quantization
// - candidate.rs: raw operator proposals, validation, normalization to
//   onset candidates with metric-strength tags
// - operator.rs: the operator trait, family tags, ordered registry, and the
//   failure-isolating execution harness
// - group.rs: family-keyed bundling into weighted, capped candidate groups
// - density.rs: busyness parameter -> integer onset target
// - select.rs: the weighted selection loop (anchor exclusion, allowances,
//   canonical draw order, deterministic tie-breaks)
// - diagnostics.rs: the passive observer interface for filter/pick records
// - engine.rs: per-(bar, role) orchestration of the whole pipeline
// - error.rs: attributed engine and operator errors
//
// Every selection call derives its own PRNG stream from
// (master seed, role, bar, purpose) via `rhythmweave_prng`, so identical
// inputs always reproduce the identical ordered output and calls can fan
// out across bars and roles in parallel.

pub mod candidate;
pub mod context;
pub mod density;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod group;
pub mod operator;
pub mod select;

pub use candidate::{CandidateAddition, CandidateRemoval, OnsetCandidate, OnsetStrength};
pub use context::{Anchor, BarContext, Role};
pub use diagnostics::{DiagnosticsSink, NullSink, RecordingSink};
pub use engine::{BarRequest, BarSelection, SelectionEngine};
pub use error::{EngineError, OperatorError, OperatorPhase};
pub use operator::{FailurePolicy, Operator, OperatorFamily, OperatorRegistry};
pub use select::SelectedOnset;

// Candidate grouping: bundling normalized candidates by operator family.
//
// Candidates sharing an operator family merge into one `CandidateGroup`.
// The group id is the family's stable tag, the base bias is the mean of the
// contributing scores, and the cap defaults to the contributed candidate
// count unless an operator overrides it. Grouping order is sorted by family
// ordinal, so the output is independent of operator execution order — a
// prerequisite for deterministic selection.

use crate::candidate::{CandidateAddition, OnsetCandidate, normalize};
use crate::operator::OperatorFamily;
use serde::Serialize;
use std::collections::BTreeMap;

/// A weighted, capped bundle of candidates from one operator family.
/// Transient: built fresh per call, never deserialized back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateGroup {
    /// Stable group id — the family tag.
    pub id: &'static str,
    pub family: OperatorFamily,
    /// Base probability bias: mean of the contributing addition scores.
    pub bias: f64,
    /// Max adds per bar attributed to this group. `None` = unlimited.
    pub cap: Option<u32>,
    pub candidates: Vec<OnsetCandidate>,
}

/// Merge validated additions into family groups, sorted by family ordinal.
///
/// `cap_overrides` carries per-family cap overrides declared by operators;
/// absent families default to their contributed candidate count.
pub fn group_candidates(
    additions: &[CandidateAddition],
    cap_overrides: &BTreeMap<OperatorFamily, u32>,
) -> Vec<CandidateGroup> {
    // BTreeMap keyed by family gives family-ordinal iteration order for free.
    let mut buckets: BTreeMap<OperatorFamily, (Vec<OnsetCandidate>, f64)> = BTreeMap::new();

    for addition in additions {
        let entry = buckets
            .entry(addition.family)
            .or_insert_with(|| (Vec::new(), 0.0));
        entry.0.push(normalize(addition));
        entry.1 += addition.score;
    }

    buckets
        .into_iter()
        .map(|(family, (candidates, score_sum))| {
            let count = candidates.len() as u32;
            let bias = score_sum / f64::from(count.max(1));
            let cap = Some(cap_overrides.get(&family).copied().unwrap_or(count));
            CandidateGroup {
                id: family.tag(),
                family,
                bias,
                cap,
                candidates,
            }
        })
        .collect()
}

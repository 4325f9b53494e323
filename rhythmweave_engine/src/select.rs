// The weighted selector: the decision core of the engine.
//
// Given candidate groups, the role's existing anchors, and a target count,
// selection repeatedly draws one candidate from the eligible pool with
// probability proportional to weight (candidate bias × group bias), until
// the target is met or the pool gives out. Draws come from a deterministic
// stream derived per (bar, role, purpose), so identical inputs always
// reproduce the identical ordered result.
//
// Determinism hinges on the canonical walk order: weight descending, then
// stable identifier (group id, quantized beat) ascending. The eligible set
// is rebuilt by a full linear pass on every pick — O(n) per draw, fine for
// the expected scale of tens of candidates per bar. Any faster structure
// must preserve this exact draw order and tie-break, not silently reorder.
//
// Guarantees: never exceeds the target, never selects an anchor-occupied
// beat, never selects a non-positive-weight candidate, and returning fewer
// than target on pool exhaustion is a legitimate outcome, not an error.

use crate::candidate::OnsetCandidate;
use crate::context::{Anchor, Role, beat_ticks};
use crate::diagnostics::{DiagnosticsSink, FilterReason};
use crate::group::CandidateGroup;
use rhythmweave_prng::WeaveRng;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Purpose tag of the stream that feeds selection draws.
pub const SELECTION_PURPOSE: &str = "selection";

/// One selected onset, in pick order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedOnset {
    pub candidate: OnsetCandidate,
    /// Stable id of the owning group (the family tag).
    pub group_id: &'static str,
    /// The weight the candidate carried when drawn.
    pub weight: f64,
}

/// A (candidate, owning group) pair in the working pool.
struct PoolEntry<'a> {
    candidate: &'a OnsetCandidate,
    group_index: usize,
    group_id: &'static str,
    /// candidate bias × group bias.
    weight: f64,
    /// Quantized beat; with `group_id` it forms the stable tie-break id.
    ticks: u32,
}

/// An allowance of `None` means unlimited (no cap, or a cap of zero).
fn allowance(cap: Option<u32>) -> Option<u32> {
    match cap {
        Some(0) | None => None,
        Some(n) => Some(n),
    }
}

fn is_open(remaining: Option<u32>) -> bool {
    remaining.is_none_or(|n| n > 0)
}

/// Walk weights in canonical order, accumulating until the running sum
/// exceeds the draw; returns the position of the pick. If floating-point
/// rounding leaves nothing picked (a draw at or beyond the accumulated
/// total), the last position wins: a pick must always occur for a
/// non-empty set.
fn pick_position(weights: &[f64], draw: f64) -> usize {
    let mut running = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        running += weight;
        if running > draw {
            return i;
        }
    }
    weights.len() - 1
}

/// Run weighted selection for one (bar, role) call.
///
/// `rng` must be the stream derived for this call; it is consumed across
/// iterations so repeated calls with identical keys reproduce identical
/// draw sequences. When `target` is zero the stream is never touched.
pub fn select_onsets(
    groups: &[CandidateGroup],
    anchors: &[Anchor],
    role: &Role,
    target: u32,
    rng: &mut WeaveRng,
    sink: &mut dyn DiagnosticsSink,
) -> Vec<SelectedOnset> {
    let anchor_ticks: BTreeSet<u32> = anchors
        .iter()
        .filter(|a| a.role == *role)
        .map(|a| beat_ticks(a.beat))
        .collect();

    // Working pool: every (candidate, group) pair whose beat survives
    // anchor exclusion. Non-positive weights stay in the pool but are
    // excluded from every draw; they are reported once here.
    let mut pool: Vec<PoolEntry> = Vec::new();
    let mut pool_before = 0usize;
    for (group_index, group) in groups.iter().enumerate() {
        for candidate in &group.candidates {
            pool_before += 1;
            let ticks = beat_ticks(candidate.beat);
            if anchor_ticks.contains(&ticks) {
                sink.candidate_filtered(&candidate.candidate_id, FilterReason::AnchorConflict);
                continue;
            }
            let weight = candidate.bias * group.bias;
            if weight <= 0.0 {
                sink.candidate_filtered(&candidate.candidate_id, FilterReason::NonPositiveWeight);
            }
            pool.push(PoolEntry {
                candidate,
                group_index,
                group_id: group.id,
                weight,
                ticks,
            });
        }
    }
    sink.pool_sizes(pool_before, pool.len());

    let mut group_remaining: Vec<Option<u32>> =
        groups.iter().map(|g| allowance(g.cap)).collect();
    let mut candidate_remaining: BTreeMap<(usize, u32), Option<u32>> = BTreeMap::new();
    for entry in &pool {
        candidate_remaining
            .entry((entry.group_index, entry.ticks))
            .or_insert_with(|| allowance(entry.candidate.cap));
    }

    let mut selected: Vec<SelectedOnset> = Vec::new();
    while (selected.len() as u32) < target && !pool.is_empty() {
        // Rebuild the eligible set: positive weight, open group allowance,
        // open candidate allowance.
        let mut eligible: Vec<usize> = pool
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.weight > 0.0
                    && is_open(group_remaining[e.group_index])
                    && is_open(candidate_remaining[&(e.group_index, e.ticks)])
            })
            .map(|(i, _)| i)
            .collect();
        if eligible.is_empty() {
            // Pool exhaustion: returning short is legitimate.
            break;
        }

        // Canonical order: weight descending, stable id ascending.
        eligible.sort_by(|&a, &b| {
            pool[b]
                .weight
                .total_cmp(&pool[a].weight)
                .then_with(|| pool[a].group_id.cmp(pool[b].group_id))
                .then_with(|| pool[a].ticks.cmp(&pool[b].ticks))
        });

        let weights: Vec<f64> = eligible.iter().map(|&i| pool[i].weight).collect();
        let total_weight: f64 = weights.iter().sum();
        let draw = rng.next_f64() * total_weight;
        let pick = eligible[pick_position(&weights, draw)];

        let entry = pool.swap_remove(pick);
        sink.candidate_selected(&entry.candidate.candidate_id, entry.weight, SELECTION_PURPOSE);
        if let Some(remaining) = &mut group_remaining[entry.group_index] {
            *remaining -= 1;
        }
        if let Some(remaining) = candidate_remaining
            .get_mut(&(entry.group_index, entry.ticks))
            .and_then(|o| o.as_mut())
        {
            *remaining -= 1;
        }
        selected.push(SelectedOnset {
            candidate: entry.candidate.clone(),
            group_id: entry.group_id,
            weight: entry.weight,
        });
    }

    selected
}

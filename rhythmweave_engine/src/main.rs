// Rhythmweave — demo CLI entry point.
//
// Runs the selection engine over a short stretch of bars with a handful of
// built-in demo operators and prints which proposed onsets were realized.
// The pipeline per bar: operators -> normalization/grouping -> density
// target -> weighted selection.
//
// Usage:
//   cargo run -p rhythmweave_engine -- [--bars N] [--seed N] [--density F]
//     [--capacity N] [--role NAME] [--section NAME]

use rhythmweave_engine::candidate::CandidateAddition;
use rhythmweave_engine::context::{Anchor, BarContext, Role};
use rhythmweave_engine::diagnostics::RecordingSink;
use rhythmweave_engine::engine::{BarRequest, SelectionEngine};
use rhythmweave_engine::error::OperatorError;
use rhythmweave_engine::operator::{Operator, OperatorFamily, OperatorRegistry};

/// Proposes every strong beat of the bar as a core hit.
struct BackboneOperator;

impl Operator for BackboneOperator {
    fn id(&self) -> &str {
        "demo.backbone"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Backbone
    }

    fn can_apply(&self, _ctx: &BarContext) -> bool {
        true
    }

    fn candidates(
        &self,
        ctx: &BarContext,
    ) -> Result<Vec<CandidateAddition>, OperatorError> {
        Ok((1..=ctx.beats_per_bar)
            .map(|beat| {
                let mut a = CandidateAddition::new(
                    "demo.backbone",
                    format!("backbone-{beat}"),
                    OperatorFamily::Backbone,
                    Role::new("drums"),
                    ctx.bar,
                    f64::from(beat),
                    0.9,
                );
                a.velocity = Some(100);
                a
            })
            .collect())
    }
}

/// Proposes the half-beat offsets for syncopated pushes.
struct OffbeatOperator;

impl Operator for OffbeatOperator {
    fn id(&self) -> &str {
        "demo.offbeat"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Syncopation
    }

    fn can_apply(&self, _ctx: &BarContext) -> bool {
        true
    }

    fn candidates(
        &self,
        ctx: &BarContext,
    ) -> Result<Vec<CandidateAddition>, OperatorError> {
        Ok((1..=ctx.beats_per_bar)
            .map(|beat| {
                let mut a = CandidateAddition::new(
                    "demo.offbeat",
                    format!("offbeat-{beat}"),
                    OperatorFamily::Syncopation,
                    Role::new("drums"),
                    ctx.bar,
                    f64::from(beat) + 0.5,
                    0.5,
                );
                a.velocity = Some(80);
                a
            })
            .collect())
    }
}

/// Proposes quiet sixteenth-offset decoration, capped at two per bar.
/// Skips intro sections — decoration before the groove settles sounds bad.
struct GhostOperator;

impl Operator for GhostOperator {
    fn id(&self) -> &str {
        "demo.ghost"
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Ghost
    }

    fn family_cap(&self, _ctx: &BarContext) -> Option<u32> {
        Some(2)
    }

    fn can_apply(&self, ctx: &BarContext) -> bool {
        ctx.section != "intro"
    }

    fn candidates(
        &self,
        ctx: &BarContext,
    ) -> Result<Vec<CandidateAddition>, OperatorError> {
        let mut out = Vec::new();
        for beat in 1..=ctx.beats_per_bar {
            for offset in [0.25, 0.75] {
                let mut a = CandidateAddition::new(
                    "demo.ghost",
                    format!("ghost-{beat}-{offset}"),
                    OperatorFamily::Ghost,
                    Role::new("drums"),
                    ctx.bar,
                    f64::from(beat) + offset,
                    0.25,
                );
                a.velocity = Some(40);
                out.push(a);
            }
        }
        Ok(out)
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let bars: u32 = parse_flag(&args, "--bars").unwrap_or(4);
    let seed: u64 = parse_flag(&args, "--seed").unwrap_or(42);
    let density: f64 = parse_flag(&args, "--density").unwrap_or(0.5);
    let capacity: u32 = parse_flag(&args, "--capacity").unwrap_or(8);
    let role_name: String = parse_flag(&args, "--role").unwrap_or_else(|| "drums".to_string());
    let section: String = parse_flag(&args, "--section").unwrap_or_else(|| "verse".to_string());

    println!("=== Rhythmweave Selection Demo ===");
    println!("Role: {role_name}");
    println!("Section: {section}");
    println!("Bars: {bars}");
    println!("Density: {density:.2}, capacity {capacity} per bar");
    println!("Seed: {seed}");
    println!();

    println!("[1/2] Building operator registry...");
    let mut registry = OperatorRegistry::new();
    registry.register(Box::new(BackboneOperator));
    registry.register(Box::new(OffbeatOperator));
    registry.register(Box::new(GhostOperator));
    println!("  {} operators registered.", registry.len());

    let engine = SelectionEngine::new(registry);
    let role = Role::new(role_name);

    // A committed crash on beat 1 of bar 1, to show anchor exclusion.
    let anchors = vec![Anchor::new(role.clone(), 1.0)];

    println!("[2/2] Selecting onsets per bar...");
    for bar in 1..=bars {
        let request = BarRequest {
            context: BarContext::new(bar, section.clone(), 4, 480),
            role: role.clone(),
            anchors: if bar == 1 { anchors.clone() } else { Vec::new() },
            density,
            capacity,
            master_seed: seed,
        };

        let mut sink = RecordingSink::new();
        match engine.select_for_bar(&request, &mut sink) {
            Ok(result) => {
                println!(
                    "  bar {bar}: target {} -> {} selected  |{}|",
                    result.target,
                    result.selected.len(),
                    render_bar(&result, 4)
                );
                for onset in &result.selected {
                    println!(
                        "    beat {:<5} {:<8} group {:<12} weight {:.3}",
                        onset.candidate.beat,
                        onset.candidate.strength.tag(),
                        onset.group_id,
                        onset.weight
                    );
                }
            }
            Err(e) => {
                eprintln!("  bar {bar}: error: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Render one bar as a sixteenth-note strip: X = strong hit, x = offbeat,
/// . = ghost, space = empty slot.
fn render_bar(result: &rhythmweave_engine::engine::BarSelection, beats_per_bar: u8) -> String {
    use rhythmweave_engine::candidate::OnsetStrength;

    let slots = usize::from(beats_per_bar) * 4;
    let mut strip = vec![' '; slots];
    for onset in &result.selected {
        let slot = ((onset.candidate.beat - 1.0) * 4.0).round() as usize;
        if slot < slots {
            strip[slot] = match onset.candidate.strength {
                OnsetStrength::Strong => 'X',
                OnsetStrength::Offbeat => 'x',
                OnsetStrength::Ghost => '.',
            };
        }
    }
    strip.into_iter().collect()
}

fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

// NetForge: Intent-Driven Network Topology Designer written in Rust
// Copyright (C) 2023-2024 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Intent validation
//!
//! [`validate`] scores a synthesized topology against the intent it was
//! built from. The weights are a contract:
//!
//! - `overall = 0.40 * redundancy + 0.35 * path_diversity
//!   + 0.25 * resilience`, then minus 20 when the diameter ceiling is
//!   broken, minus 30 when SPOF elimination was required but failed, minus
//!   15 when the structural pattern check fails; clamped to `[0, 100]`.
//! - `redundancy = min(100, 100 * observed_min_edge_disjoint / target)`.
//! - `path_diversity = 100 * fraction of pairs meeting the target`.
//! - `resilience = 100 - mean connectivity loss` over the supplied
//!   simulations (100 when none were run).
//!
//! A critical-tier SPOF (over half the topology dark) is a hard violation
//! even when the intent tolerates SPOFs; lower tiers are then only flagged.
//! [`validate`] is a pure function of its inputs: identical inputs yield
//! identical results, which the history aggregation relies on.

use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analyzer::{sampling_seed, AnalysisResult};
use crate::graph::TopoGraph;
use crate::intent::{Intent, Pattern};
use crate::simulator::SimulationResult;
use crate::topology::Topology;
use crate::types::Severity;

/// Scores below this can never satisfy an intent.
pub const SATISFACTION_THRESHOLD: f64 = 70.0;

/// The outcome of validating one topology against one intent. Never
/// mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Name of the validated topology.
    pub topology: String,
    /// Whether the intent is satisfied: overall score at least 70 and no
    /// hard violation.
    pub satisfied: bool,
    /// The weighted overall score in `[0, 100]`.
    pub overall_score: f64,
    /// `min(100, 100 * observed_min_edge_disjoint_paths / target)`.
    pub redundancy_score: f64,
    /// `100 *` the fraction of pairs whose edge-disjoint-path count meets
    /// the target.
    pub path_diversity_score: f64,
    /// `100 -` the mean simulated connectivity loss.
    pub resilience_score: f64,
    /// Whether the diameter respects the intent's ceiling.
    pub max_hops_ok: bool,
    /// Whether the topology has no single point of failure.
    pub spof_eliminated: bool,
    /// Whether the structural check of the declared pattern passed.
    pub pattern_matched: bool,
    /// Ordered, human-readable violations. Entries prefixed `hard:` veto
    /// satisfaction.
    pub violations: Vec<String>,
}

/// Validate a topology against its intent, using the analysis and the
/// simulation results already computed for it.
pub fn validate(
    topo: &Topology,
    intent: &Intent,
    analysis: &AnalysisResult,
    simulations: &[SimulationResult],
) -> ValidationResult {
    let graph = TopoGraph::from_topology(topo);
    let target = intent.redundancy.target_paths();

    let pairs = graph.pair_sample(sampling_seed(&topo.name));
    let mut observed_min = usize::MAX;
    let mut meeting = 0usize;
    for &(a, b) in &pairs {
        let paths = graph.edge_disjoint_paths_capped(a, b, target);
        observed_min = observed_min.min(paths);
        if paths >= target {
            meeting += 1;
        }
    }
    let (redundancy_score, path_diversity_score) = if pairs.is_empty() {
        (100.0, 100.0)
    } else {
        (
            (100.0 * observed_min as f64 / target as f64).min(100.0),
            100.0 * meeting as f64 / pairs.len() as f64,
        )
    };

    let resilience_score = if simulations.is_empty() {
        100.0
    } else {
        100.0
            - simulations
                .iter()
                .map(|s| s.connectivity_loss_pct)
                .sum::<f64>()
                / simulations.len() as f64
    };

    let max_hops_ok = intent
        .max_hops
        .map(|h| analysis.diameter <= h)
        .unwrap_or(true);
    let spof_eliminated = analysis.spofs.is_empty();
    let pattern_matched = intent
        .pattern
        .map(|p| pattern_matches(topo, &graph, p))
        .unwrap_or(true);

    let critical_spofs: Vec<_> = analysis
        .spofs
        .iter()
        .filter(|s| s.risk == Severity::Critical)
        .collect();

    let mut violations = Vec::new();
    if !max_hops_ok {
        violations.push(format!(
            "hard: diameter {} exceeds max_hops {}; increase max_hops or pick a denser pattern",
            analysis.diameter,
            intent.max_hops.unwrap_or(0)
        ));
    }
    if intent.minimize_spof && !spof_eliminated {
        violations.push(format!(
            "hard: {} single point(s) of failure remain although spof elimination is required; \
             raise redundancy",
            analysis.spofs.len()
        ));
    }
    if !pattern_matched {
        violations.push(format!(
            "hard: topology structure does not match the declared `{}` pattern",
            intent.pattern.map(|p| p.name()).unwrap_or("?")
        ));
    }
    if !intent.minimize_spof {
        for spof in &critical_spofs {
            violations.push(format!(
                "hard: critical single point of failure at {} ({:.0}% impact); \
                 raise redundancy or enable spof minimization",
                spof.device, spof.impact_pct
            ));
        }
        for spof in analysis
            .spofs
            .iter()
            .filter(|s| s.risk != Severity::Critical)
        {
            violations.push(format!(
                "medium: single point of failure at {} ({:.0}% impact)",
                spof.device, spof.impact_pct
            ));
        }
    }
    if intent.pattern == Some(Pattern::FullMesh) && intent.site_count > 10 {
        violations.push(format!(
            "low: a full mesh over {} sites is cost-excessive; consider leaf-spine or hybrid",
            intent.site_count
        ));
    }
    if observed_min != usize::MAX && observed_min < target {
        violations.push(format!(
            "low: only {observed_min} edge-disjoint path(s) observed, target is {target}"
        ));
    }

    let mut overall = 0.40 * redundancy_score + 0.35 * path_diversity_score
        + 0.25 * resilience_score;
    if !max_hops_ok {
        overall -= 20.0;
    }
    if intent.minimize_spof && !spof_eliminated {
        overall -= 30.0;
    }
    if !pattern_matched {
        overall -= 15.0;
    }
    let overall_score = overall.clamp(0.0, 100.0);

    let hard_violation = !max_hops_ok
        || (intent.minimize_spof && !spof_eliminated)
        || !pattern_matched
        || (!intent.minimize_spof && !critical_spofs.is_empty());
    let satisfied = overall_score >= SATISFACTION_THRESHOLD && !hard_violation;

    debug!(
        "validated `{}`: overall {overall_score:.1}, satisfied {satisfied}",
        topo.name
    );

    ValidationResult {
        topology: topo.name.clone(),
        satisfied,
        overall_score,
        redundancy_score,
        path_diversity_score,
        resilience_score,
        max_hops_ok,
        spof_eliminated,
        pattern_matched,
        violations,
    }
}

/// Structural check of a declared pattern. The checks look at the graph
/// alone, so externally supplied topologies are judged by their shape, not
/// their device names.
fn pattern_matches(topo: &Topology, graph: &TopoGraph, pattern: Pattern) -> bool {
    let n = topo.device_count();
    if n < 2 {
        return true;
    }
    match pattern {
        Pattern::FullMesh => {
            let names: Vec<&str> = topo.devices().iter().map(|d| d.name.as_str()).collect();
            names
                .iter()
                .enumerate()
                .all(|(i, a)| names[i + 1..].iter().all(|b| topo.adjacent(a, b)))
        }
        Pattern::HubSpoke => {
            // one or two devices must cover everyone else
            let mut by_degree: Vec<&str> =
                topo.devices().iter().map(|d| d.name.as_str()).collect();
            by_degree.sort_by_key(|name| (std::cmp::Reverse(topo.degree(name)), name.to_string()));
            let h1 = by_degree[0];
            let single = by_degree
                .iter()
                .skip(1)
                .all(|other| topo.adjacent(h1, other));
            if single {
                return true;
            }
            if n < 3 {
                return false;
            }
            let h2 = by_degree[1];
            topo.adjacent(h1, h2)
                && by_degree
                    .iter()
                    .skip(2)
                    .all(|other| topo.adjacent(h1, other) || topo.adjacent(h2, other))
        }
        Pattern::Ring => {
            graph.is_connected()
                && topo
                    .devices()
                    .iter()
                    .all(|d| topo.degree(&d.name) >= 2.min(n - 1))
                && topo.link_count() <= 2 * n
        }
        Pattern::Tree => graph.is_connected() && topo.link_count() <= 2 * n,
        Pattern::LeafSpine => leaf_spine_shape(topo, graph),
        Pattern::Hybrid => graph.is_connected(),
    }
}

/// Bipartite leaf-spine shape: taking the spine set as the neighbors of a
/// minimum-degree device, every other device is a leaf adjacent to every
/// spine, and no two spines are adjacent.
fn leaf_spine_shape(topo: &Topology, graph: &TopoGraph) -> bool {
    let Some(anchor) = topo
        .devices()
        .iter()
        .map(|d| d.name.as_str())
        .min_by_key(|name| (topo.degree(name), name.to_string()))
    else {
        return true;
    };
    let spines: BTreeSet<&str> = graph.neighbors(anchor).into_iter().collect();
    if spines.is_empty() || spines.contains(anchor) {
        return false;
    }
    let leaves: Vec<&str> = topo
        .devices()
        .iter()
        .map(|d| d.name.as_str())
        .filter(|name| !spines.contains(name))
        .collect();
    for leaf in &leaves {
        let neighbors: BTreeSet<&str> = graph.neighbors(leaf).into_iter().collect();
        if neighbors != spines {
            return false;
        }
    }
    for a in &spines {
        for b in &spines {
            if a < b && topo.adjacent(a, b) {
                return false;
            }
        }
    }
    true
}

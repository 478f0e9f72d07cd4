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

//! # Topology analysis
//!
//! [`analyze`] inspects a topology read-only and produces an
//! [`AnalysisResult`]: single points of failure with their blast radius,
//! unbalanced path pairs, overloaded devices, the global graph metrics, and
//! a health score.
//!
//! The health score is a contract: start at 100, subtract 30/20/10/5 for
//! each critical/high/medium/low SPOF or unbalanced-path issue, add 10 when
//! the connectivity coefficient reaches 0.6, add 10 when the redundancy
//! factor reaches 2.0, and clamp to `[0, 100]`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::graph::TopoGraph;
use crate::topology::Topology;
use crate::types::{DeviceId, Severity};

/// Pairs whose best-to-worst path ratio falls below this are unbalanced.
pub const BALANCE_THRESHOLD: f64 = 0.5;
/// Edge-disjoint-path counts saturate here in the redundancy factor; on
/// dense graphs the exact count past this adds nothing.
pub const REDUNDANCY_SATURATION: usize = 8;
/// Devices whose degree exceeds this multiple of the mean are overloaded.
pub const OVERLOAD_FACTOR: f64 = 1.5;

/// A single point of failure: an articulation point with its blast radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spof {
    /// The device whose removal disconnects the topology.
    pub device: String,
    /// Percentage of devices unreachable from the analysis anchor after the
    /// removal (the removed device counts as unreachable).
    pub impact_pct: f64,
    /// Risk tier derived from the impact percentage.
    pub risk: Severity,
}

/// A device pair whose edge-disjoint paths differ too much in length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnbalancedPair {
    /// First device (lexicographically smaller name).
    pub a: String,
    /// Second device.
    pub b: String,
    /// Hop count of the shortest of the considered paths.
    pub min_hops: usize,
    /// Hop count of the longest of the considered paths.
    pub max_hops: usize,
    /// `min_hops / max_hops`.
    pub balance: f64,
    /// Severity of the imbalance (high below 0.25, medium otherwise).
    pub severity: Severity,
}

/// The outcome of analyzing one topology. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Name of the analyzed topology.
    pub topology: String,
    /// All single points of failure, in device-name order.
    pub spofs: Vec<Spof>,
    /// Sampled pairs with unbalanced paths.
    pub unbalanced: Vec<UnbalancedPair>,
    /// Devices whose degree exceeds 1.5x the mean degree.
    pub overloaded: Vec<String>,
    /// Number of devices.
    pub device_count: usize,
    /// Number of links.
    pub link_count: usize,
    /// Maximum shortest-path hop count over all reachable pairs.
    pub diameter: usize,
    /// Graph density `2|E| / (|V| (|V|-1))`.
    pub connectivity: f64,
    /// Mean edge-disjoint-path count over the sampled pairs, with counts
    /// saturated at [`REDUNDANCY_SATURATION`].
    pub redundancy_factor: f64,
    /// Health score in `[0, 100]`.
    pub health: f64,
    /// One-line description of the worst issue and the score.
    pub summary: String,
}

/// The sampling seed of a topology, derived from its name so that repeated
/// analyses of the same topology sample the same pairs.
pub(crate) fn sampling_seed(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

/// Analyze a topology. Pure; never fails for well-formed topologies. A
/// topology with fewer than two devices is trivially healthy.
pub fn analyze(topo: &Topology) -> AnalysisResult {
    let n = topo.device_count();
    if n < 2 {
        return AnalysisResult {
            topology: topo.name.clone(),
            spofs: Vec::new(),
            unbalanced: Vec::new(),
            overloaded: Vec::new(),
            device_count: n,
            link_count: topo.link_count(),
            diameter: 0,
            connectivity: 0.0,
            redundancy_factor: 0.0,
            health: 100.0,
            summary: format!("{}: health 100, no issues", topo.name),
        };
    }

    let graph = TopoGraph::from_topology(topo);
    let seed = sampling_seed(&topo.name);
    let pairs = graph.pair_sample(seed);

    let spofs = find_spofs(&graph, n);
    let unbalanced = find_unbalanced(&graph, &pairs);
    let overloaded = find_overloaded(topo);

    let connectivity = 2.0 * topo.link_count() as f64 / (n as f64 * (n as f64 - 1.0));
    let redundancy_factor = if pairs.is_empty() {
        0.0
    } else {
        pairs
            .iter()
            .map(|&(a, b)| graph.edge_disjoint_paths_capped(a, b, REDUNDANCY_SATURATION) as f64)
            .sum::<f64>()
            / pairs.len() as f64
    };

    let mut health = 100.0;
    for spof in &spofs {
        health -= spof.risk.health_penalty();
    }
    for pair in &unbalanced {
        health -= pair.severity.health_penalty();
    }
    if connectivity >= 0.6 {
        health += 10.0;
    }
    if redundancy_factor >= 2.0 {
        health += 10.0;
    }
    let health = health.clamp(0.0, 100.0);

    let summary = summarize(&topo.name, health, &spofs, &unbalanced);
    debug!("analyzed `{}`: {summary}", topo.name);

    AnalysisResult {
        topology: topo.name.clone(),
        spofs,
        unbalanced,
        overloaded,
        device_count: n,
        link_count: topo.link_count(),
        diameter: graph.diameter(),
        connectivity,
        redundancy_factor,
        health,
        summary,
    }
}

/// Every articulation point with its impact: the share of devices that an
/// anchor (the first non-articulation device in creation order) can no
/// longer reach once the point is gone, the point itself included.
fn find_spofs(graph: &TopoGraph, n: usize) -> Vec<Spof> {
    let points = graph.articulation_points();
    if points.is_empty() {
        return Vec::new();
    }
    let point_names: Vec<String> = points.iter().map(|&p| graph.name(p).to_string()).collect();
    let anchor = graph
        .names()
        .into_iter()
        .find(|name| !point_names.iter().any(|p| p == name))
        .map(str::to_string);
    // a graph with at least one articulation point always has a
    // non-articulation node (every leaf block contains one)
    let Some(anchor) = anchor else {
        return Vec::new();
    };

    point_names
        .into_iter()
        .map(|device| {
            let remaining = graph.without_nodes(&[device.as_str()]);
            let reachable = remaining
                .connected_components()
                .into_iter()
                .find(|c| c.contains(&anchor))
                .map(|c| c.len())
                .unwrap_or(1);
            let impact_pct = 100.0 * (1.0 - reachable as f64 / n as f64);
            Spof {
                risk: Severity::from_impact_pct(impact_pct),
                device,
                impact_pct,
            }
        })
        .collect()
}

/// For each sampled pair, the hop counts of up to three greedily chosen
/// edge-disjoint paths; reported when the shortest is less than half the
/// longest.
fn find_unbalanced(graph: &TopoGraph, pairs: &[(DeviceId, DeviceId)]) -> Vec<UnbalancedPair> {
    let mut out = Vec::new();
    for &(a, b) in pairs {
        let lengths = graph.disjoint_path_lengths(a, b, 3);
        let (Some(&min), Some(&max)) = (lengths.iter().min(), lengths.iter().max()) else {
            continue;
        };
        if max == 0 {
            continue;
        }
        let balance = min as f64 / max as f64;
        if balance < BALANCE_THRESHOLD {
            let (x, y) = if graph.name(a) <= graph.name(b) {
                (a, b)
            } else {
                (b, a)
            };
            out.push(UnbalancedPair {
                a: graph.name(x).to_string(),
                b: graph.name(y).to_string(),
                min_hops: min,
                max_hops: max,
                balance,
                severity: if balance < 0.25 {
                    Severity::High
                } else {
                    Severity::Medium
                },
            });
        }
    }
    out
}

/// Devices whose degree exceeds [`OVERLOAD_FACTOR`] times the mean degree.
fn find_overloaded(topo: &Topology) -> Vec<String> {
    let avg = topo.avg_degree();
    topo.devices()
        .iter()
        .map(|d| d.name.clone())
        .filter(|name| topo.degree(name) as f64 > OVERLOAD_FACTOR * avg)
        .collect()
}

fn summarize(name: &str, health: f64, spofs: &[Spof], unbalanced: &[UnbalancedPair]) -> String {
    // worst SPOF first; ties go to the smaller device name
    let worst_spof = spofs
        .iter()
        .max_by(|a, b| a.risk.cmp(&b.risk).then_with(|| b.device.cmp(&a.device)));
    let worst_pair = unbalanced.iter().max_by_key(|u| u.severity);
    match (worst_spof, worst_pair) {
        (Some(s), u) if u.map(|u| u.severity <= s.risk).unwrap_or(true) => format!(
            "{name}: health {health:.0}, worst issue: {} single point of failure at {} \
             ({:.0}% impact)",
            s.risk, s.device, s.impact_pct
        ),
        (_, Some(u)) => format!(
            "{name}: health {health:.0}, worst issue: {} path imbalance between {} and {} \
             ({:.2})",
            u.severity, u.a, u.b, u.balance
        ),
        _ => format!("{name}: health {health:.0}, no issues"),
    }
}

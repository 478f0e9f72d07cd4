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

//! # Failure simulation
//!
//! [`simulate`] removes a set of devices or links from a *copy* of the
//! topology's graph and reports what breaks: which previously reachable
//! pairs lost their path, whether the graph partitioned, the connectivity
//! loss percentage, and a severity classification. The input topology is
//! never mutated.
//!
//! [`generate_test_scenarios`] derives the three canonical worst cases of a
//! topology: the worst single device failure, the worst single link
//! failure, and the worst two-link combination, each maximizing
//! connectivity loss (ties broken lexicographically).

use std::collections::{HashMap, HashSet};

use log::debug;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::analyzer::sampling_seed;
use crate::graph::TopoGraph;
use crate::topology::Topology;
use crate::types::{NetForgeError, Severity};

/// A failure scenario to play against a topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FailureScenario {
    /// A device fails; all its links go down with it.
    NodeDown {
        /// The failing device.
        device: String,
    },
    /// A single link fails.
    LinkDown {
        /// One endpoint.
        a: String,
        /// The other endpoint.
        b: String,
        /// The interface pair identifying the link among parallels. `None`
        /// selects every link between the two devices.
        interfaces: Option<(String, String)>,
    },
    /// Several links fail at once. Every link between each named pair goes
    /// down.
    MultiLink {
        /// The affected device pairs.
        links: Vec<(String, String)>,
    },
    /// A device fails, and any neighbor left without a working link fails
    /// with it, iterating up to `depth` rounds.
    Cascade {
        /// The initially failing device.
        device: String,
        /// Maximum number of propagation rounds.
        depth: usize,
    },
}

impl FailureScenario {
    /// The stable kind label stored in the history tables.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NodeDown { .. } => "node-down",
            Self::LinkDown { .. } => "link-down",
            Self::MultiLink { .. } => "multi-link",
            Self::Cascade { .. } => "cascade",
        }
    }

    /// The documented coarse recovery estimate for this scenario kind, in
    /// seconds. A convention, not a measurement.
    pub fn recovery_estimate_secs(&self) -> u64 {
        match self {
            Self::NodeDown { .. } => 30,
            Self::LinkDown { .. } => 10,
            Self::MultiLink { .. } => 45,
            Self::Cascade { .. } => 60,
        }
    }
}

/// The pre-failure state of one sampled route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStatus {
    /// First device.
    pub a: String,
    /// Second device.
    pub b: String,
    /// The pre-failure shortest path.
    pub pre_failure_path: Vec<String>,
    /// Whether a path still exists after the failure.
    pub still_connected: bool,
}

/// The outcome of one simulated failure. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Name of the simulated topology.
    pub topology: String,
    /// The scenario that was played.
    pub scenario: FailureScenario,
    /// Sampled routes that existed before the failure, with their status.
    pub routes: Vec<RouteStatus>,
    /// Exact number of surviving device pairs that lost their path.
    pub broken_pair_count: usize,
    /// Exact number of surviving device pairs that were reachable before.
    pub reachable_pair_count: usize,
    /// Whether the surviving devices form more than one component.
    pub partitioned: bool,
    /// The post-failure connected components.
    pub components: Vec<Vec<String>>,
    /// Surviving devices outside the largest post-failure component.
    pub isolated_count: usize,
    /// `100 * broken / reachable`, over surviving pairs.
    pub connectivity_loss_pct: f64,
    /// Severity classification of the loss.
    pub severity: Severity,
    /// Coarse recovery estimate in seconds.
    pub recovery_estimate_secs: u64,
}

/// Play a failure scenario against a topology. Pure: operates on a graph
/// copy and never mutates the input.
pub fn simulate(
    topo: &Topology,
    scenario: &FailureScenario,
) -> Result<SimulationResult, NetForgeError> {
    let graph = TopoGraph::from_topology(topo);
    let (post, removed_devices) = apply(topo, &graph, scenario)?;

    // exact pair accounting via component membership
    let pre_comp = component_ids(&graph);
    let post_comp = component_ids(&post);
    let survivors: Vec<&str> = graph
        .names()
        .into_iter()
        .filter(|n| !removed_devices.contains(*n))
        .collect();
    let (reachable, broken) = pair_counts(&survivors, &pre_comp, &post_comp);

    // sampled route enumeration for reporting
    let seed = sampling_seed(&topo.name);
    let mut routes = Vec::new();
    for (a, b) in graph.pair_sample(seed) {
        let Some(path) = graph.shortest_path(a, b) else {
            continue;
        };
        let (an, bn) = (graph.name(a), graph.name(b));
        if removed_devices.contains(an) || removed_devices.contains(bn) {
            continue;
        }
        let still = match (post.id(an), post.id(bn)) {
            (Some(pa), Some(pb)) => post.shortest_path(pa, pb).is_some(),
            _ => false,
        };
        routes.push(RouteStatus {
            a: an.to_string(),
            b: bn.to_string(),
            pre_failure_path: path.into_iter().map(|i| graph.name(i).to_string()).collect(),
            still_connected: still,
        });
    }

    let components = post.connected_components();
    let largest = components.iter().map(Vec::len).max().unwrap_or(0);
    let isolated_count = survivors.len().saturating_sub(largest);
    let loss = if reachable == 0 {
        0.0
    } else {
        100.0 * broken as f64 / reachable as f64
    };
    debug!(
        "simulated {} on `{}`: {broken}/{reachable} pairs broken ({loss:.1}%)",
        scenario.kind(),
        topo.name
    );

    Ok(SimulationResult {
        topology: topo.name.clone(),
        scenario: scenario.clone(),
        routes,
        broken_pair_count: broken,
        reachable_pair_count: reachable,
        partitioned: components.len() > 1,
        components,
        isolated_count,
        connectivity_loss_pct: loss,
        severity: Severity::from_impact_pct(loss),
        recovery_estimate_secs: scenario.recovery_estimate_secs(),
    })
}

/// Apply a scenario to a copy of the graph, returning the reduced graph and
/// the removed device names.
fn apply(
    topo: &Topology,
    graph: &TopoGraph,
    scenario: &FailureScenario,
) -> Result<(TopoGraph, HashSet<String>), NetForgeError> {
    match scenario {
        FailureScenario::NodeDown { device } => {
            if !topo.has_device(device) {
                return Err(NetForgeError::DeviceNotFound(device.clone()));
            }
            Ok((
                graph.without_nodes(&[device.as_str()]),
                HashSet::from([device.clone()]),
            ))
        }
        FailureScenario::LinkDown { a, b, interfaces } => {
            let links = link_indices(topo, a, b, interfaces.as_ref())?;
            Ok((graph.without_links(&links), HashSet::new()))
        }
        FailureScenario::MultiLink { links } => {
            let mut all = Vec::new();
            for (a, b) in links {
                all.extend(link_indices(topo, a, b, None)?);
            }
            Ok((graph.without_links(&all), HashSet::new()))
        }
        FailureScenario::Cascade { device, depth } => {
            if !topo.has_device(device) {
                return Err(NetForgeError::DeviceNotFound(device.clone()));
            }
            let mut removed: HashSet<String> = HashSet::from([device.clone()]);
            let mut current = graph.without_nodes(&[device.as_str()]);
            for _ in 0..*depth {
                let starved: Vec<&str> = current
                    .names()
                    .into_iter()
                    .filter(|n| {
                        current
                            .id(n)
                            .map(|id| current.degree(id) == 0)
                            .unwrap_or(false)
                    })
                    .collect();
                if starved.is_empty() {
                    break;
                }
                removed.extend(starved.iter().map(|s| s.to_string()));
                current = current.without_nodes(&starved);
            }
            Ok((current, removed))
        }
    }
}

/// The indices of the links between `a` and `b`, optionally narrowed to one
/// interface pair.
fn link_indices(
    topo: &Topology,
    a: &str,
    b: &str,
    interfaces: Option<&(String, String)>,
) -> Result<Vec<usize>, NetForgeError> {
    let indices: Vec<usize> = topo
        .links()
        .iter()
        .enumerate()
        .filter(|(_, l)| {
            let ends = (l.a == a && l.b == b) || (l.a == b && l.b == a);
            let ifaces = match interfaces {
                None => true,
                Some((ia, ib)) => {
                    (l.a_iface == *ia && l.b_iface == *ib)
                        || (l.a_iface == *ib && l.b_iface == *ia)
                }
            };
            ends && ifaces
        })
        .map(|(i, _)| i)
        .collect();
    if indices.is_empty() {
        return Err(NetForgeError::LinkNotFound(a.to_string(), b.to_string()));
    }
    Ok(indices)
}

/// Component id of every node, by name.
fn component_ids(graph: &TopoGraph) -> HashMap<String, usize> {
    let mut out = HashMap::new();
    for (c, members) in graph.connected_components().into_iter().enumerate() {
        for m in members {
            out.insert(m, c);
        }
    }
    out
}

/// Count the surviving pairs that were reachable before the failure, and
/// how many of them broke.
fn pair_counts(
    survivors: &[&str],
    pre: &HashMap<String, usize>,
    post: &HashMap<String, usize>,
) -> (usize, usize) {
    // group survivors by (pre component, post component)
    let mut pre_sizes: HashMap<usize, usize> = HashMap::new();
    let mut joint_sizes: HashMap<(usize, usize), usize> = HashMap::new();
    for s in survivors {
        let (Some(&p), Some(&q)) = (pre.get(*s), post.get(*s)) else {
            continue;
        };
        *pre_sizes.entry(p).or_default() += 1;
        *joint_sizes.entry((p, q)).or_default() += 1;
    }
    let reachable: usize = pre_sizes.values().map(|&g| g * (g - 1) / 2).sum();
    let unbroken: usize = joint_sizes.values().map(|&h| h * (h - 1) / 2).sum();
    (reachable, reachable - unbroken)
}

/// The loss a scenario would cause, without the reporting detail. Used for
/// worst-case search.
fn loss_of(topo: &Topology, graph: &TopoGraph, scenario: &FailureScenario) -> f64 {
    let Ok((post, removed)) = apply(topo, graph, scenario) else {
        return 0.0;
    };
    let pre_comp = component_ids(graph);
    let post_comp = component_ids(&post);
    let survivors: Vec<&str> = graph
        .names()
        .into_iter()
        .filter(|n| !removed.contains(*n))
        .collect();
    let (reachable, broken) = pair_counts(&survivors, &pre_comp, &post_comp);
    if reachable == 0 {
        0.0
    } else {
        100.0 * broken as f64 / reachable as f64
    }
}

/// How many of the worst single links feed the two-link combination search
/// on large topologies.
const TWO_LINK_CANDIDATES: usize = 10;

/// The candidate maximizing connectivity loss. Candidates must arrive in
/// lexicographic order: only a strict improvement replaces the incumbent,
/// so ties keep the smallest element.
fn pick_worst(
    topo: &Topology,
    graph: &TopoGraph,
    candidates: impl IntoIterator<Item = FailureScenario>,
) -> Option<(f64, FailureScenario)> {
    let mut best: Option<(f64, FailureScenario)> = None;
    for scenario in candidates {
        let loss = loss_of(topo, graph, &scenario);
        if best
            .as_ref()
            .map(|(b, _)| OrderedFloat(loss) > OrderedFloat(*b))
            .unwrap_or(true)
        {
            best = Some((loss, scenario));
        }
    }
    best
}

/// The three canonical test scenarios of a topology: the worst single
/// device failure, the worst single link failure, and the worst two-link
/// combination, each maximizing connectivity loss. Ties are broken by the
/// lexicographically smallest element names.
pub fn generate_test_scenarios(topo: &Topology) -> Vec<FailureScenario> {
    let graph = TopoGraph::from_topology(topo);

    let mut device_names: Vec<&str> = topo.devices().iter().map(|d| d.name.as_str()).collect();
    device_names.sort_unstable();
    let worst_node = pick_worst(
        topo,
        &graph,
        device_names.iter().map(|name| FailureScenario::NodeDown {
            device: name.to_string(),
        }),
    )
    .map(|(_, s)| s);

    let mut pairs: Vec<(&str, &str)> = topo.links().iter().map(|l| l.endpoints()).collect();
    pairs.sort_unstable();
    pairs.dedup();
    let mut scored: Vec<(f64, (String, String))> = pairs
        .iter()
        .map(|(a, b)| {
            let scenario = FailureScenario::LinkDown {
                a: a.to_string(),
                b: b.to_string(),
                interfaces: None,
            };
            (loss_of(topo, &graph, &scenario), (a.to_string(), b.to_string()))
        })
        .collect();
    let worst_link = scored
        .iter()
        .fold(None::<&(f64, (String, String))>, |best, cur| match best {
            Some(b) if OrderedFloat(cur.0) <= OrderedFloat(b.0) => Some(b),
            _ => Some(cur),
        })
        .map(|(_, (a, b))| FailureScenario::LinkDown {
            a: a.clone(),
            b: b.clone(),
            interfaces: None,
        });

    // combine only the worst single links, so large topologies stay cheap
    scored.sort_by(|(la, pa), (lb, pb)| {
        OrderedFloat(*lb)
            .cmp(&OrderedFloat(*la))
            .then_with(|| pa.cmp(pb))
    });
    let candidates: Vec<(String, String)> = scored
        .into_iter()
        .take(TWO_LINK_CANDIDATES)
        .map(|(_, pair)| pair)
        .collect();
    let mut combos = Vec::new();
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let mut links = vec![candidates[i].clone(), candidates[j].clone()];
            links.sort();
            combos.push(FailureScenario::MultiLink { links });
        }
    }
    combos.sort_by(|a, b| match (a, b) {
        (FailureScenario::MultiLink { links: la }, FailureScenario::MultiLink { links: lb }) => {
            la.cmp(lb)
        }
        _ => std::cmp::Ordering::Equal,
    });
    combos.dedup();
    let worst_two = pick_worst(topo, &graph, combos).map(|(_, s)| s);

    [worst_node, worst_link, worst_two]
        .into_iter()
        .flatten()
        .collect()
}

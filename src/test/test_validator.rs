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

use pretty_assertions::assert_eq;

use super::{intent, request};
use crate::analyzer::analyze;
use crate::builder::synthesize;
use crate::intent::{Intent, Pattern, Redundancy};
use crate::simulator::{generate_test_scenarios, simulate, SimulationResult};
use crate::topology::Topology;
use crate::validator::{validate, ValidationResult};

fn run(intent: &Intent, seed: Option<u64>) -> (Topology, ValidationResult) {
    let topo = synthesize(intent, seed).unwrap();
    let analysis = analyze(&topo);
    let sims: Vec<SimulationResult> = generate_test_scenarios(&topo)
        .iter()
        .map(|s| simulate(&topo, s).unwrap())
        .collect();
    let validation = validate(&topo, intent, &analysis, &sims);
    (topo, validation)
}

#[test]
fn a_critical_full_mesh_satisfies_its_intent() {
    let mut r = request("a", Pattern::FullMesh, 5);
    r.redundancy = Some(Redundancy::Critical);
    r.minimize_spof = Some(true);
    r.max_hops = Some(2);
    let intent = Intent::parse(&r).unwrap();
    let (topo, v) = run(&intent, Some(42));
    assert_eq!(topo.link_count(), 10);
    assert!(v.satisfied);
    assert!(v.overall_score >= 90.0);
    assert!(v.max_hops_ok);
    assert!(v.spof_eliminated);
    assert!(v.pattern_matched);
}

#[test]
fn a_bare_hub_spoke_fails_validation() {
    let intent = intent("b", Pattern::HubSpoke, 6, Redundancy::Minimum);
    let (_, v) = run(&intent, None);
    assert!(!v.satisfied);
    assert!(!v.spof_eliminated);
    assert!(v.pattern_matched);
    assert!(v
        .violations
        .iter()
        .any(|x| x.contains("single point of failure")));
    // the hub blacks out most of the topology, which is a hard violation
    // even though spof elimination was not requested
    assert!(v.violations.iter().any(|x| x.starts_with("hard:")));
}

#[test]
fn a_critical_leaf_spine_scores_high() {
    let mut r = request("d", Pattern::LeafSpine, 10);
    r.redundancy = Some(Redundancy::Critical);
    r.minimize_spof = Some(true);
    r.max_hops = Some(3);
    let intent = Intent::parse(&r).unwrap();
    let (_, v) = run(&intent, None);
    assert!(v.satisfied);
    assert!(v.overall_score >= 90.0);
    assert!(v.pattern_matched);
    assert!(v.spof_eliminated);
}

#[test]
fn tree_spofs_are_flagged_softly() {
    let mut r = request("e", Pattern::Tree, 20);
    r.redundancy = Some(Redundancy::Standard);
    r.design_goal = Some(crate::intent::DesignGoal::Cost);
    let intent = Intent::parse(&r).unwrap();
    let (topo, v) = run(&intent, None);
    assert!(topo.link_count() <= 30);
    assert!(v
        .violations
        .iter()
        .any(|x| x.starts_with("medium:") && x.contains("single point of failure")));
    // aggregation failures stay below the critical tier, so no hard veto
    assert!(!v.violations.iter().any(|x| x.starts_with("hard:")));
    assert!(v.satisfied);
}

#[test]
fn breaching_the_diameter_ceiling_is_hard() {
    let mut r = request("h", Pattern::Ring, 8);
    r.redundancy = Some(Redundancy::Standard);
    r.max_hops = Some(2);
    let intent = Intent::parse(&r).unwrap();
    let (_, v) = run(&intent, None);
    assert!(!v.max_hops_ok);
    assert!(!v.satisfied);
    assert!(v
        .violations
        .iter()
        .any(|x| x.starts_with("hard:") && x.contains("max_hops")));
}

#[test]
fn oversized_full_meshes_are_flagged_as_cost_excessive() {
    let intent = intent("fat", Pattern::FullMesh, 12, Redundancy::Standard);
    let (_, v) = run(&intent, Some(1));
    assert!(v.violations.iter().any(|x| x.contains("cost-excessive")));
    assert!(v.satisfied);
}

#[test]
fn a_mismatched_pattern_is_a_hard_violation() {
    // build a ring, then validate it against a leaf-spine intent
    let ring_intent = intent("mix", Pattern::Ring, 6, Redundancy::Standard);
    let topo = synthesize(&ring_intent, Some(2)).unwrap();
    let analysis = analyze(&topo);
    let claimed = intent("mix", Pattern::LeafSpine, 6, Redundancy::Standard);
    let v = validate(&topo, &claimed, &analysis, &[]);
    assert!(!v.pattern_matched);
    assert!(!v.satisfied);
}

#[test]
fn validation_is_byte_identical_across_runs() {
    let intent = intent("det", Pattern::Tree, 20, Redundancy::Standard);
    let topo = synthesize(&intent, Some(3)).unwrap();
    let analysis = analyze(&topo);
    let sims: Vec<SimulationResult> = generate_test_scenarios(&topo)
        .iter()
        .map(|s| simulate(&topo, s).unwrap())
        .collect();
    let a = validate(&topo, &intent, &analysis, &sims);
    let b = validate(&topo, &intent, &analysis, &sims);
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn minimal_redundancy_on_two_sites_is_not_flagged() {
    let intent = intent("two", Pattern::FullMesh, 2, Redundancy::Minimum);
    let (topo, v) = run(&intent, None);
    assert_eq!(topo.link_count(), 1);
    assert!(v.satisfied);
    assert!(v.violations.is_empty());
}
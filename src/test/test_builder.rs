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

use std::collections::HashSet;

use pretty_assertions::assert_eq;

use super::{intent, request};
use crate::builder::synthesize;
use crate::graph::TopoGraph;
use crate::intent::{Intent, Pattern, Redundancy};
use crate::types::NetForgeError;

#[test]
fn full_mesh_of_five_has_ten_links() {
    let intent = intent("a", Pattern::FullMesh, 5, Redundancy::Critical);
    let topo = synthesize(&intent, Some(42)).unwrap();
    assert_eq!(topo.device_count(), 5);
    assert_eq!(topo.link_count(), 10);
    let graph = TopoGraph::from_topology(&topo);
    assert_eq!(graph.diameter(), 1);
    assert!(graph.articulation_points().is_empty());
}

#[test]
fn synthesis_is_deterministic_per_seed() {
    for pattern in [
        Pattern::FullMesh,
        Pattern::HubSpoke,
        Pattern::Ring,
        Pattern::Tree,
        Pattern::LeafSpine,
        Pattern::Hybrid,
    ] {
        let intent = intent("det", pattern, 12, Redundancy::Standard);
        let a = synthesize(&intent, Some(42)).unwrap();
        let b = synthesize(&intent, Some(42)).unwrap();
        assert_eq!(a, b, "pattern {pattern} is not deterministic");
    }
}

#[test]
fn invariants_hold_across_patterns_and_sizes() {
    for pattern in [
        Pattern::FullMesh,
        Pattern::HubSpoke,
        Pattern::Ring,
        Pattern::Tree,
        Pattern::LeafSpine,
        Pattern::Hybrid,
    ] {
        for sites in [2, 3, 5, 9, 24] {
            let intent = intent("inv", pattern, sites, Redundancy::Minimum);
            let topo = synthesize(&intent, Some(7)).unwrap();
            topo.verify().unwrap();
            assert_eq!(topo.device_count(), sites, "{pattern} with {sites} sites");
            assert!(
                TopoGraph::from_topology(&topo).is_connected(),
                "{pattern} with {sites} sites is not connected"
            );
        }
    }
}

#[test]
fn subnets_are_pairwise_disjoint() {
    let intent = intent("s", Pattern::LeafSpine, 12, Redundancy::High);
    let topo = synthesize(&intent, Some(1)).unwrap();
    let subnets: HashSet<_> = topo.links().iter().map(|l| l.subnet).collect();
    assert_eq!(subnets.len(), topo.link_count());
    for link in topo.links() {
        assert!(link.subnet.contains(&link.a_addr));
        assert!(link.subnet.contains(&link.b_addr));
        assert_eq!(link.subnet.prefix_len(), 30);
    }
}

#[test]
fn router_ids_are_unique() {
    let intent = intent("r", Pattern::Hybrid, 30, Redundancy::Standard);
    let topo = synthesize(&intent, Some(3)).unwrap();
    let ids: HashSet<_> = topo
        .devices()
        .iter()
        .filter_map(|d| d.router_id())
        .collect();
    let routers = topo.devices().iter().filter(|d| d.is_router()).count();
    assert_eq!(ids.len(), routers);
}

#[test]
fn hub_spoke_of_six_is_a_star() {
    let intent = intent("b", Pattern::HubSpoke, 6, Redundancy::Minimum);
    let topo = synthesize(&intent, None).unwrap();
    assert_eq!(topo.device_count(), 6);
    assert_eq!(topo.link_count(), 5);
    assert_eq!(topo.degree("HUB1"), 5);
    let graph = TopoGraph::from_topology(&topo);
    let arts = graph.articulation_points();
    assert_eq!(arts.len(), 1);
    assert_eq!(graph.name(arts[0]), "HUB1");
}

#[test]
fn hub_spoke_cannot_kill_the_spof_without_redundancy() {
    let mut r = request("b", Pattern::HubSpoke, 6);
    r.minimize_spof = Some(true);
    r.redundancy = Some(Redundancy::Minimum);
    let intent = Intent::parse(&r).unwrap();
    assert_eq!(
        synthesize(&intent, None).unwrap_err(),
        NetForgeError::SpofUnavoidable
    );
}

#[test]
fn redundant_hub_spoke_dual_homes_every_spoke() {
    let mut r = request("b", Pattern::HubSpoke, 6);
    r.minimize_spof = Some(true);
    r.redundancy = Some(Redundancy::Standard);
    let intent = Intent::parse(&r).unwrap();
    let topo = synthesize(&intent, None).unwrap();
    assert_eq!(topo.device_count(), 6);
    // hub pair link plus two uplinks per spoke
    assert_eq!(topo.link_count(), 9);
    assert!(TopoGraph::from_topology(&topo)
        .articulation_points()
        .is_empty());
}

#[test]
fn ring_of_four_is_a_plain_cycle() {
    let intent = intent("c", Pattern::Ring, 4, Redundancy::Standard);
    let topo = synthesize(&intent, Some(7)).unwrap();
    assert_eq!(topo.device_count(), 4);
    assert_eq!(topo.link_count(), 4);
    let graph = TopoGraph::from_topology(&topo);
    // opposite devices see exactly two edge-disjoint paths
    assert_eq!(
        graph.edge_disjoint_paths(graph.id("R1").unwrap(), graph.id("R3").unwrap()),
        2
    );
}

#[test]
fn two_sites_collapse_to_a_single_link() {
    for pattern in [Pattern::FullMesh, Pattern::Ring] {
        let intent = intent("two", pattern, 2, Redundancy::Minimum);
        let topo = synthesize(&intent, None).unwrap();
        assert_eq!(topo.device_count(), 2);
        assert_eq!(topo.link_count(), 1, "{pattern}");
    }
}

#[test]
fn parallel_links_satisfy_standard_redundancy_for_two_sites() {
    let intent = intent("two", Pattern::FullMesh, 2, Redundancy::Standard);
    let topo = synthesize(&intent, None).unwrap();
    assert_eq!(topo.link_count(), 2);
    topo.verify().unwrap();
    let graph = TopoGraph::from_topology(&topo);
    assert_eq!(
        graph.edge_disjoint_paths(graph.id("R1").unwrap(), graph.id("R2").unwrap()),
        2
    );
}

#[test]
fn small_full_mesh_cannot_reach_critical_redundancy() {
    let intent = intent("m", Pattern::FullMesh, 3, Redundancy::Critical);
    assert!(matches!(
        synthesize(&intent, None).unwrap_err(),
        NetForgeError::Unsatisfiable { target: 4, .. }
    ));
}

#[test]
fn leaf_spine_of_ten_splits_seven_and_three() {
    let intent = intent("d", Pattern::LeafSpine, 10, Redundancy::High);
    let topo = synthesize(&intent, None).unwrap();
    let spines: Vec<_> = topo
        .devices()
        .iter()
        .filter(|d| d.name.starts_with("SPINE"))
        .collect();
    let leaves: Vec<_> = topo
        .devices()
        .iter()
        .filter(|d| d.name.starts_with("LEAF"))
        .collect();
    assert_eq!(spines.len(), 3);
    assert_eq!(leaves.len(), 7);
    assert_eq!(topo.link_count(), 21);
    let graph = TopoGraph::from_topology(&topo);
    assert_eq!(graph.diameter(), 2);
    assert!(graph.articulation_points().is_empty());
}

#[test]
fn leaf_spine_augments_with_parallel_links_only() {
    let mut r = request("d", Pattern::LeafSpine, 10);
    r.redundancy = Some(Redundancy::Critical);
    r.minimize_spof = Some(true);
    r.max_hops = Some(3);
    let intent = Intent::parse(&r).unwrap();
    let topo = synthesize(&intent, None).unwrap();
    // no leaf-leaf or spine-spine wiring, even after augmentation
    for link in topo.links() {
        let roles = (link.a.starts_with("SPINE"), link.b.starts_with("SPINE"));
        assert!(roles == (true, false) || roles == (false, true));
    }
    let graph = TopoGraph::from_topology(&topo);
    assert_eq!(graph.diameter(), 2);
    for leaf in 1..=7 {
        let id = graph.id(&format!("LEAF{leaf}")).unwrap();
        assert!(graph.edge_disjoint_paths(graph.id("SPINE1").unwrap(), id) >= 4);
    }
}

#[test]
fn tree_of_twenty_keeps_the_link_budget() {
    let mut r = request("e", Pattern::Tree, 20);
    r.redundancy = Some(Redundancy::Standard);
    let intent = Intent::parse(&r).unwrap();
    let topo = synthesize(&intent, None).unwrap();
    assert_eq!(topo.device_count(), 20);
    assert!(topo.link_count() <= 30, "got {} links", topo.link_count());
    // the aggregation layer still concentrates failures
    let graph = TopoGraph::from_topology(&topo);
    let arts = graph.articulation_points();
    assert!(arts.iter().any(|&a| graph.name(a).starts_with("AGG")));
    // the access layer is switched
    assert!(topo
        .devices()
        .iter()
        .filter(|d| d.name.starts_with("ACC"))
        .all(|d| !d.is_router()));
}

#[test]
fn spof_free_tree_has_no_articulation_points() {
    let mut r = request("e", Pattern::Tree, 20);
    r.redundancy = Some(Redundancy::Standard);
    r.minimize_spof = Some(true);
    let intent = Intent::parse(&r).unwrap();
    let topo = synthesize(&intent, None).unwrap();
    assert!(TopoGraph::from_topology(&topo)
        .articulation_points()
        .is_empty());
}

#[test]
fn hybrid_partitions_into_core_and_branches() {
    let intent = intent("h", Pattern::Hybrid, 20, Redundancy::Standard);
    let topo = synthesize(&intent, Some(9)).unwrap();
    assert_eq!(topo.device_count(), 20);
    assert!(topo.devices().iter().any(|d| d.name.starts_with("SPINE")));
    assert!(topo.devices().iter().any(|d| d.name.starts_with("B1")));
    topo.verify().unwrap();
    assert!(TopoGraph::from_topology(&topo).is_connected());
}

#[test]
fn min_connections_per_site_is_honored() {
    let mut r = request("m", Pattern::Ring, 6);
    r.min_connections_per_site = Some(3);
    r.redundancy = Some(Redundancy::Minimum);
    let intent = Intent::parse(&r).unwrap();
    let topo = synthesize(&intent, Some(5)).unwrap();
    for device in topo.devices() {
        assert!(topo.degree(&device.name) >= 3, "{}", device.name);
    }
}

#[test]
fn unknown_site_counts_are_rejected_at_parse_time() {
    for sites in [0, 1, 501] {
        let mut r = request("bad", Pattern::Ring, sites);
        r.site_count = Some(sites);
        assert!(matches!(
            Intent::parse(&r).unwrap_err(),
            NetForgeError::InvalidIntent(_)
        ));
    }
}

#[test]
fn large_ring_synthesizes_quickly() {
    let intent = intent("big", Pattern::Ring, 500, Redundancy::Minimum);
    let topo = synthesize(&intent, Some(11)).unwrap();
    assert_eq!(topo.device_count(), 500);
    assert_eq!(topo.link_count(), 500);
    topo.verify().unwrap();
}

#[test]
fn topologies_survive_a_serde_round_trip() {
    let intent = intent("rt", Pattern::Tree, 12, Redundancy::Standard);
    let topo = synthesize(&intent, Some(4)).unwrap();
    let json = serde_json::to_string(&topo).unwrap();
    let mut back: crate::topology::Topology = serde_json::from_str(&json).unwrap();
    back.reindex();
    assert_eq!(topo, back);
    back.verify().unwrap();
    assert!(back.has_device("CORE1"));
}

#[test]
fn the_containerlab_export_is_complete() {
    use crate::topology::DeviceKind;

    let intent = intent("lab", Pattern::LeafSpine, 6, Redundancy::Standard);
    let topo = synthesize(&intent, Some(1)).unwrap();
    let clab = crate::export::ClabTopology::from_topology(&topo);
    assert_eq!(clab.name, "lab");
    assert_eq!(clab.topology.nodes.len(), topo.device_count());
    assert_eq!(clab.topology.links.len(), topo.link_count());
    for link in &clab.topology.links {
        for endpoint in &link.endpoints {
            let (dev, iface) = endpoint.split_once(':').unwrap();
            assert!(clab.topology.nodes.contains_key(dev));
            assert!(iface.starts_with("eth"));
        }
    }
    // a leaf-spine fabric is routers only; every node carries its device
    // type verbatim, router id and AS number included
    for (name, node) in &clab.topology.nodes {
        assert_eq!(node.device_type, topo.get_device(name).unwrap().kind);
        match &node.device_type {
            DeviceKind::Router { router_id, as_id } => {
                assert_eq!(node.kind, "linux");
                assert!(node.image.is_some());
                assert_eq!(*router_id, topo.get_device(name).unwrap().router_id().unwrap());
                assert_eq!(*as_id, crate::builder::INTERNAL_AS);
            }
            DeviceKind::Switch => panic!("{name}: no switches in a leaf-spine fabric"),
        }
    }
}

#[test]
fn the_export_distinguishes_switches_from_routers() {
    use crate::topology::DeviceKind;

    // the access layer of a tree is switched
    let intent = intent("lab2", Pattern::Tree, 12, Redundancy::Standard);
    let topo = synthesize(&intent, Some(1)).unwrap();
    let clab = crate::export::ClabTopology::from_topology(&topo);
    let acc = &clab.topology.nodes["ACC1"];
    assert_eq!(acc.device_type, DeviceKind::Switch);
    assert_eq!(acc.kind, "bridge");
    assert!(acc.image.is_none());
    let core = &clab.topology.nodes["CORE1"];
    assert!(matches!(core.device_type, DeviceKind::Router { .. }));
    assert_eq!(core.kind, "linux");
}

#[test]
fn seed_is_stored_nowhere_but_changes_nothing_structural() {
    // different seeds may reshuffle hybrid regions but never break invariants
    let intent = intent("h", Pattern::Hybrid, 23, Redundancy::Standard);
    for seed in [1, 2, 3] {
        let topo = synthesize(&intent, Some(seed)).unwrap();
        topo.verify().unwrap();
        assert_eq!(topo.device_count(), 23);
        assert!(TopoGraph::from_topology(&topo).is_connected());
    }
}

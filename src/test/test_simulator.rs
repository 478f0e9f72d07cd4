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

use approx::assert_abs_diff_eq;
use pretty_assertions::assert_eq;

use super::{build_topo, intent};
use crate::builder::synthesize;
use crate::intent::{Pattern, Redundancy};
use crate::simulator::{generate_test_scenarios, simulate, FailureScenario};
use crate::types::{NetForgeError, Severity};

fn hub_spoke_six() -> crate::topology::Topology {
    synthesize(&intent("b", Pattern::HubSpoke, 6, Redundancy::Minimum), None).unwrap()
}

#[test]
fn a_ring_survives_any_single_link_failure() {
    let topo = synthesize(&intent("c", Pattern::Ring, 4, Redundancy::Standard), Some(7)).unwrap();
    for link in topo.links() {
        let result = simulate(
            &topo,
            &FailureScenario::LinkDown {
                a: link.a.clone(),
                b: link.b.clone(),
                interfaces: None,
            },
        )
        .unwrap();
        assert!(!result.partitioned);
        assert_abs_diff_eq!(result.connectivity_loss_pct, 0.0);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.recovery_estimate_secs, 10);
    }
}

#[test]
fn losing_the_hub_is_critical() {
    let topo = hub_spoke_six();
    let result = simulate(
        &topo,
        &FailureScenario::NodeDown {
            device: "HUB1".to_string(),
        },
    )
    .unwrap();
    assert!(result.partitioned);
    assert_eq!(result.components.len(), 5);
    // all five surviving spokes are isolated singletons
    assert_eq!(result.isolated_count, 4);
    assert_abs_diff_eq!(result.connectivity_loss_pct, 100.0);
    assert_eq!(result.severity, Severity::Critical);
    assert_eq!(result.recovery_estimate_secs, 30);
    assert!(result.routes.iter().all(|r| !r.still_connected));
}

#[test]
fn losing_one_spoke_link_is_high() {
    let topo = hub_spoke_six();
    let result = simulate(
        &topo,
        &FailureScenario::LinkDown {
            a: "HUB1".to_string(),
            b: "SPOKE1".to_string(),
            interfaces: None,
        },
    )
    .unwrap();
    assert!(result.partitioned);
    // 5 of 15 pairs break
    assert_abs_diff_eq!(result.connectivity_loss_pct, 100.0 / 3.0, epsilon = 0.01);
    assert_eq!(result.severity, Severity::High);
    let broken: Vec<_> = result.routes.iter().filter(|r| !r.still_connected).collect();
    assert!(broken.iter().all(|r| r.a == "SPOKE1" || r.b == "SPOKE1"));
}

#[test]
fn multi_link_failures_partition_a_ring() {
    let topo = synthesize(&intent("c", Pattern::Ring, 4, Redundancy::Standard), Some(7)).unwrap();
    let result = simulate(
        &topo,
        &FailureScenario::MultiLink {
            links: vec![
                ("R1".to_string(), "R2".to_string()),
                ("R3".to_string(), "R4".to_string()),
            ],
        },
    )
    .unwrap();
    assert!(result.partitioned);
    assert_eq!(result.components.len(), 2);
    // 4 of 6 pairs break
    assert_abs_diff_eq!(result.connectivity_loss_pct, 200.0 / 3.0, epsilon = 0.01);
    assert_eq!(result.severity, Severity::Critical);
    assert_eq!(result.recovery_estimate_secs, 45);
}

#[test]
fn cascades_starve_leaf_neighbors() {
    let topo = build_topo("chain", &["a", "b", "c"], &[("a", "b"), ("b", "c")]);
    let result = simulate(
        &topo,
        &FailureScenario::Cascade {
            device: "b".to_string(),
            depth: 2,
        },
    )
    .unwrap();
    // b takes a and c with it
    assert!(result.components.is_empty());
    assert_eq!(result.reachable_pair_count, 0);
    assert_eq!(result.recovery_estimate_secs, 60);
}

#[test]
fn cascades_stop_where_degree_survives() {
    let topo = synthesize(&intent("c", Pattern::Ring, 5, Redundancy::Minimum), None).unwrap();
    let result = simulate(
        &topo,
        &FailureScenario::Cascade {
            device: "R1".to_string(),
            depth: 3,
        },
    )
    .unwrap();
    // the ring degrades to a chain and nothing else starves
    assert_eq!(result.components.len(), 1);
    assert_eq!(result.components[0].len(), 4);
    assert_abs_diff_eq!(result.connectivity_loss_pct, 0.0);
}

#[test]
fn unknown_devices_are_rejected_without_mutation() {
    let topo = hub_spoke_six();
    let before = topo.clone();
    let err = simulate(
        &topo,
        &FailureScenario::NodeDown {
            device: "GHOST".to_string(),
        },
    )
    .unwrap_err();
    assert_eq!(err, NetForgeError::DeviceNotFound("GHOST".to_string()));
    assert_eq!(topo, before);

    let err = simulate(
        &topo,
        &FailureScenario::LinkDown {
            a: "SPOKE1".to_string(),
            b: "SPOKE2".to_string(),
            interfaces: None,
        },
    )
    .unwrap_err();
    assert_eq!(
        err,
        NetForgeError::LinkNotFound("SPOKE1".to_string(), "SPOKE2".to_string())
    );
}

#[test]
fn parallel_links_can_fail_individually() {
    let topo = build_topo("p", &["a", "b"], &[("a", "b"), ("a", "b")]);
    let one = simulate(
        &topo,
        &FailureScenario::LinkDown {
            a: "a".to_string(),
            b: "b".to_string(),
            interfaces: Some(("eth0".to_string(), "eth0".to_string())),
        },
    )
    .unwrap();
    assert!(!one.partitioned);
    assert_abs_diff_eq!(one.connectivity_loss_pct, 0.0);

    // without an interface pair, every parallel link goes down
    let all = simulate(
        &topo,
        &FailureScenario::LinkDown {
            a: "a".to_string(),
            b: "b".to_string(),
            interfaces: None,
        },
    )
    .unwrap();
    assert!(all.partitioned);
    assert_abs_diff_eq!(all.connectivity_loss_pct, 100.0);
}

#[test]
fn canonical_scenarios_pick_the_worst_cases() {
    let topo = hub_spoke_six();
    let scenarios = generate_test_scenarios(&topo);
    assert_eq!(scenarios.len(), 3);
    assert_eq!(
        scenarios[0],
        FailureScenario::NodeDown {
            device: "HUB1".to_string()
        }
    );
    // all spoke links tie at one third loss; lexicographic order wins
    assert_eq!(
        scenarios[1],
        FailureScenario::LinkDown {
            a: "HUB1".to_string(),
            b: "SPOKE1".to_string(),
            interfaces: None,
        }
    );
    assert_eq!(
        scenarios[2],
        FailureScenario::MultiLink {
            links: vec![
                ("HUB1".to_string(), "SPOKE1".to_string()),
                ("HUB1".to_string(), "SPOKE2".to_string()),
            ]
        }
    );
}

#[test]
fn simulation_is_pure_and_deterministic() {
    let topo = hub_spoke_six();
    let scenario = FailureScenario::NodeDown {
        device: "SPOKE3".to_string(),
    };
    assert_eq!(
        simulate(&topo, &scenario).unwrap(),
        simulate(&topo, &scenario).unwrap()
    );
}

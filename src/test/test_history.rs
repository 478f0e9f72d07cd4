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

use crate::history::{
    HistoryStore, OptimizationRecord, RecommendationRecord, SimulationRecord, SqliteHistory,
    TopologyRecord, ValidationRecord,
};
use crate::intent::{Intent, IntentRequest, Pattern};
use crate::types::NetForgeError;

pub(crate) fn topo_record(pattern: &str, redundancy: &str, goal: &str) -> TopologyRecord {
    let request = IntentRequest {
        name: "t".to_string(),
        pattern: pattern.parse().ok(),
        site_count: Some(10),
        ..Default::default()
    };
    let intent = Intent::parse(&request).unwrap();
    TopologyRecord {
        id: 0,
        intent_json: intent.to_json().unwrap(),
        pattern: pattern.to_string(),
        site_count: 10,
        device_count: 10,
        link_count: 20,
        redundancy: redundancy.to_string(),
        protocol: "ospf".to_string(),
        design_goal: goal.to_string(),
        minimize_spof: false,
        avg_degree: 4.0,
        diameter: 2,
        created_at: 0,
    }
}

pub(crate) fn validation_record(topology_id: i64, overall: f64, satisfied: bool) -> ValidationRecord {
    ValidationRecord {
        id: 0,
        topology_id,
        satisfied,
        overall_score: overall,
        redundancy_score: 90.0,
        path_diversity_score: 80.0,
        max_hops_ok: true,
        spof_eliminated: satisfied,
        pattern_matched: true,
        violations: vec![],
        duration_ms: 5,
        created_at: 0,
    }
}

pub(crate) fn simulation_record(topology_id: i64, impact: f64) -> SimulationRecord {
    SimulationRecord {
        id: 0,
        topology_id,
        scenario_kind: "node-down".to_string(),
        scenario_payload: "{\"kind\":\"node-down\",\"device\":\"R1\"}".to_string(),
        partitioned: impact > 0.0,
        isolated_count: 1,
        components_count: 2,
        resilience_impact: impact,
        created_at: 0,
    }
}

fn recommendation(intent_pattern: Pattern) -> RecommendationRecord {
    let request = IntentRequest {
        name: "r".to_string(),
        pattern: Some(intent_pattern),
        site_count: Some(10),
        ..Default::default()
    };
    let intent = Intent::parse(&request).unwrap();
    RecommendationRecord {
        id: 0,
        intent_json: intent.to_json().unwrap(),
        recommended_pattern: intent_pattern.name().to_string(),
        confidence: 50.0,
        alternatives: "[]".to_string(),
        user_selected: None,
        resulting_topology_id: None,
        feedback: None,
        created_at: 0,
    }
}

#[test]
fn topologies_round_trip() {
    let store = SqliteHistory::open_in_memory().unwrap();
    let record = topo_record("ring", "standard", "redundancy");
    let id = store.insert_topology(&record).unwrap();
    let read = store.get_topology(id).unwrap().unwrap();
    assert_eq!(read.pattern, "ring");
    assert_eq!(read.site_count, 10);
    assert_eq!(read.intent_json, record.intent_json);
    assert!(read.created_at > 0);
    assert!(store.get_topology(id + 1).unwrap().is_none());
}

#[test]
fn validations_need_an_existing_topology() {
    let store = SqliteHistory::open_in_memory().unwrap();
    let err = store
        .insert_validation(&validation_record(99, 80.0, true))
        .unwrap_err();
    assert!(matches!(err, NetForgeError::PersistenceError(_)));
}

#[test]
fn metrics_aggregate_validations_and_simulations() {
    let store = SqliteHistory::open_in_memory().unwrap();
    let t1 = store
        .insert_topology(&topo_record("ring", "standard", "redundancy"))
        .unwrap();
    let t2 = store
        .insert_topology(&topo_record("ring", "standard", "redundancy"))
        .unwrap();
    store
        .insert_validation(&validation_record(t1, 80.0, true))
        .unwrap();
    store
        .insert_validation(&validation_record(t2, 60.0, false))
        .unwrap();
    store.insert_simulation(&simulation_record(t1, 10.0)).unwrap();
    store.insert_simulation(&simulation_record(t2, 30.0)).unwrap();

    let metric = store
        .performance_metric("ring", "standard", "redundancy")
        .unwrap()
        .unwrap();
    assert_eq!(metric.sample_size, 2);
    assert_abs_diff_eq!(metric.avg_overall, 70.0);
    assert_abs_diff_eq!(metric.avg_resilience_impact, 20.0);
    assert_abs_diff_eq!(metric.spof_elimination_rate, 50.0);
    assert_abs_diff_eq!(metric.satisfaction_rate, 50.0);
    assert_abs_diff_eq!(metric.confidence, 20.0);

    // a different key sees nothing
    assert!(store
        .performance_metric("ring", "high", "redundancy")
        .unwrap()
        .is_none());
}

#[test]
fn feedback_outweighs_validations_five_to_one() {
    let store = SqliteHistory::open_in_memory().unwrap();
    let t = store
        .insert_topology(&topo_record("ring", "standard", "redundancy"))
        .unwrap();
    store
        .insert_validation(&validation_record(t, 80.0, true))
        .unwrap();
    let rec = store.insert_recommendation(&recommendation(Pattern::Ring)).unwrap();
    store.set_recommendation_feedback(rec, 1).unwrap();

    let metric = store
        .performance_metric("ring", "standard", "redundancy")
        .unwrap()
        .unwrap();
    // one satisfied validation (weight 1) against the worst feedback
    // (weight 5): 100 * (1 + 5 * 0) / 6
    assert_abs_diff_eq!(metric.satisfaction_rate, 100.0 / 6.0, epsilon = 0.01);
}

#[test]
fn feedback_is_write_once_and_range_checked() {
    let store = SqliteHistory::open_in_memory().unwrap();
    let rec = store.insert_recommendation(&recommendation(Pattern::Ring)).unwrap();
    assert!(matches!(
        store.set_recommendation_feedback(rec, 7).unwrap_err(),
        NetForgeError::InvalidIntent(_)
    ));
    store.set_recommendation_feedback(rec, 4).unwrap();
    assert!(matches!(
        store.set_recommendation_feedback(rec, 5).unwrap_err(),
        NetForgeError::PersistenceError(_)
    ));
    let read = store.get_recommendation(rec).unwrap().unwrap();
    assert_eq!(read.feedback, Some(4));
}

#[test]
fn recommendation_outcomes_are_write_once() {
    let store = SqliteHistory::open_in_memory().unwrap();
    let rec = store.insert_recommendation(&recommendation(Pattern::Ring)).unwrap();
    store
        .set_recommendation_outcome(rec, "ring", Some(1))
        .unwrap();
    assert!(store
        .set_recommendation_outcome(rec, "tree", Some(2))
        .is_err());
    let read = store.get_recommendation(rec).unwrap().unwrap();
    assert_eq!(read.user_selected.as_deref(), Some("ring"));
    assert_eq!(read.resulting_topology_id, Some(1));
}

#[test]
fn optimizations_are_linked_and_back_filled_once() {
    let store = SqliteHistory::open_in_memory().unwrap();
    let request = IntentRequest {
        name: "o".to_string(),
        pattern: Some(Pattern::Tree),
        site_count: Some(10),
        ..Default::default()
    };
    let intent = Intent::parse(&request).unwrap();
    let id = store
        .insert_optimization(&OptimizationRecord {
            id: 0,
            intent_json: intent.to_json().unwrap(),
            original_pattern: "tree".to_string(),
            adjusted_pattern: "ring".to_string(),
            reason: "history favors ring".to_string(),
            expected_improvement: 12.0,
            actual_improvement: None,
            resulting_topology_id: None,
            created_at: 0,
        })
        .unwrap();
    let t = store
        .insert_topology(&topo_record("ring", "standard", "redundancy"))
        .unwrap();
    store.set_optimization_topology(id, t).unwrap();
    assert!(store.set_optimization_topology(id, t + 1).is_err());

    let pending = store.pending_optimizations(t).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);

    store.set_optimization_actual(id, 8.5).unwrap();
    assert!(store.pending_optimizations(t).unwrap().is_empty());
    let read = store.get_optimization(id).unwrap().unwrap();
    assert_eq!(read.actual_improvement, Some(8.5));
}

#[test]
fn recompute_agrees_with_incremental_state() {
    let store = SqliteHistory::open_in_memory().unwrap();
    for (pattern, overall, satisfied, impact) in [
        ("ring", 85.0, true, 5.0),
        ("ring", 75.0, true, 15.0),
        ("tree", 55.0, false, 40.0),
    ] {
        let t = store
            .insert_topology(&topo_record(pattern, "standard", "cost"))
            .unwrap();
        store
            .insert_validation(&validation_record(t, overall, satisfied))
            .unwrap();
        store.insert_simulation(&simulation_record(t, impact)).unwrap();
    }
    let rec = store.insert_recommendation(&recommendation(Pattern::Ring)).unwrap();
    store.set_recommendation_feedback(rec, 5).unwrap();

    let incremental = store.performance_metrics("standard", "cost").unwrap();
    store.recompute_metrics().unwrap();
    let recomputed = store.performance_metrics("standard", "cost").unwrap();
    assert_eq!(incremental, recomputed);
    assert_eq!(incremental.len(), 2);
}

#[test]
fn recent_filters_by_age() {
    let store = SqliteHistory::open_in_memory().unwrap();
    let mut old = topo_record("ring", "standard", "redundancy");
    old.created_at = time::OffsetDateTime::now_utc().unix_timestamp() - 10 * 86_400;
    store.insert_topology(&old).unwrap();
    let fresh = store
        .insert_topology(&topo_record("tree", "standard", "redundancy"))
        .unwrap();

    let recent = store.recent_topologies(1).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, fresh);
    assert_eq!(store.recent_topologies(30).unwrap().len(), 2);
}

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

//! # History store
//!
//! Every generation, validation, simulation, recommendation, and
//! optimization is persisted through the [`HistoryStore`] trait, which
//! hides the storage engine. The shipped engine is SQLite (see
//! [`SqliteHistory`]); `open_in_memory()` is enough for development and
//! tests, `open(path)` for a durable store.
//!
//! The `PerformanceMetric` aggregate is kept incrementally on every insert,
//! and [`HistoryStore::recompute_metrics`] rebuilds it from the base tables;
//! the two must always agree.
//!
//! Records are immutable once written, with two exceptions: a
//! recommendation's outcome and feedback (each write-once), and an
//! optimization's `actual_improvement` back-fill.

use serde::{Deserialize, Serialize};

use crate::types::NetForgeError;

mod sqlite;
pub use sqlite::SqliteHistory;

/// One synthesized topology, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyRecord {
    /// Store-assigned id (0 before insertion).
    pub id: i64,
    /// The normalized intent, as JSON, stored verbatim for reproducibility.
    pub intent_json: String,
    /// Pattern name.
    pub pattern: String,
    /// Number of sites requested.
    pub site_count: i64,
    /// Number of devices built.
    pub device_count: i64,
    /// Number of links built.
    pub link_count: i64,
    /// Redundancy level name.
    pub redundancy: String,
    /// Protocol tag.
    pub protocol: String,
    /// Design goal name.
    pub design_goal: String,
    /// Whether SPOF elimination was requested.
    pub minimize_spof: bool,
    /// Mean device degree.
    pub avg_degree: f64,
    /// Analyzed diameter.
    pub diameter: i64,
    /// Unix timestamp of insertion.
    pub created_at: i64,
}

/// One validation outcome, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    /// Store-assigned id (0 before insertion).
    pub id: i64,
    /// The validated topology.
    pub topology_id: i64,
    /// Whether the intent was satisfied.
    pub satisfied: bool,
    /// Overall score.
    pub overall_score: f64,
    /// Redundancy score.
    pub redundancy_score: f64,
    /// Path diversity score.
    pub path_diversity_score: f64,
    /// Whether the diameter ceiling held.
    pub max_hops_ok: bool,
    /// Whether no SPOF remained.
    pub spof_eliminated: bool,
    /// Whether the structural pattern check passed.
    pub pattern_matched: bool,
    /// The violations, in order.
    pub violations: Vec<String>,
    /// Wall-clock duration of the validation stage in milliseconds.
    pub duration_ms: i64,
    /// Unix timestamp of insertion.
    pub created_at: i64,
}

/// One failure simulation, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRecord {
    /// Store-assigned id (0 before insertion).
    pub id: i64,
    /// The simulated topology.
    pub topology_id: i64,
    /// The scenario kind label.
    pub scenario_kind: String,
    /// The full scenario, as JSON.
    pub scenario_payload: String,
    /// Whether the failure partitioned the topology.
    pub partitioned: bool,
    /// Devices outside the largest surviving component.
    pub isolated_count: i64,
    /// Number of post-failure components.
    pub components_count: i64,
    /// Connectivity loss percentage.
    pub resilience_impact: f64,
    /// Unix timestamp of insertion.
    pub created_at: i64,
}

/// Rolling aggregate over all runs of one (pattern, redundancy,
/// design-goal) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetric {
    /// Pattern name.
    pub pattern: String,
    /// Redundancy level name.
    pub redundancy: String,
    /// Design goal name.
    pub design_goal: String,
    /// Number of validations aggregated.
    pub sample_size: i64,
    /// Mean overall validation score.
    pub avg_overall: f64,
    /// Mean redundancy score.
    pub avg_redundancy: f64,
    /// Mean path diversity score.
    pub avg_path_diversity: f64,
    /// Mean simulated connectivity loss.
    pub avg_resilience_impact: f64,
    /// Percentage of runs with no remaining SPOF.
    pub spof_elimination_rate: f64,
    /// Weighted satisfaction percentage. Explicit user feedback weighs five
    /// times as much as an automated validation verdict.
    pub satisfaction_rate: f64,
    /// `100 * min(1, sample_size / 10)`.
    pub confidence: f64,
}

/// One recommendation, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    /// Store-assigned id (0 before insertion).
    pub id: i64,
    /// The intent the recommendation was computed for, as JSON.
    pub intent_json: String,
    /// The top-ranked pattern.
    pub recommended_pattern: String,
    /// Confidence of the recommendation.
    pub confidence: f64,
    /// The ranked alternatives, as JSON.
    pub alternatives: String,
    /// The pattern the user eventually chose (write-once).
    pub user_selected: Option<String>,
    /// The topology synthesized from the choice (write-once).
    pub resulting_topology_id: Option<i64>,
    /// Explicit user feedback, 1 to 5 (write-once).
    pub feedback: Option<i64>,
    /// Unix timestamp of insertion.
    pub created_at: i64,
}

/// One autonomous pattern override, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    /// Store-assigned id (0 before insertion).
    pub id: i64,
    /// The intent that was optimized, as JSON.
    pub intent_json: String,
    /// The pattern the caller intended to use.
    pub original_pattern: String,
    /// The pattern the optimizer chose instead.
    pub adjusted_pattern: String,
    /// Why the optimizer overrode the choice.
    pub reason: String,
    /// Expected score improvement at decision time.
    pub expected_improvement: f64,
    /// Measured improvement, back-filled once the resulting topology is
    /// validated.
    pub actual_improvement: Option<f64>,
    /// The topology built from the adjusted pattern, once known.
    pub resulting_topology_id: Option<i64>,
    /// Unix timestamp of insertion.
    pub created_at: i64,
}

/// The persistence boundary of the pipeline. Implementations must make
/// every insert atomic and must keep the `PerformanceMetric` projection
/// consistent with a from-scratch recomputation.
pub trait HistoryStore: Send + Sync {
    /// Insert a topology record; returns the assigned id.
    fn insert_topology(&self, record: &TopologyRecord) -> Result<i64, NetForgeError>;

    /// Insert a validation record and fold it into the aggregates; returns
    /// the assigned id.
    fn insert_validation(&self, record: &ValidationRecord) -> Result<i64, NetForgeError>;

    /// Insert a simulation record and fold it into the aggregates; returns
    /// the assigned id.
    fn insert_simulation(&self, record: &SimulationRecord) -> Result<i64, NetForgeError>;

    /// Insert a recommendation record; returns the assigned id.
    fn insert_recommendation(&self, record: &RecommendationRecord) -> Result<i64, NetForgeError>;

    /// Record which pattern the user selected and which topology came out
    /// of it. Write-once.
    fn set_recommendation_outcome(
        &self,
        id: i64,
        user_selected: &str,
        resulting_topology_id: Option<i64>,
    ) -> Result<(), NetForgeError>;

    /// Record explicit user feedback (1 to 5) for a recommendation and fold
    /// it into the aggregates at five times the weight of a validation.
    /// Write-once.
    fn set_recommendation_feedback(&self, id: i64, feedback: i64) -> Result<(), NetForgeError>;

    /// Insert an optimization record; returns the assigned id.
    fn insert_optimization(&self, record: &OptimizationRecord) -> Result<i64, NetForgeError>;

    /// Back-fill the measured improvement of an optimization.
    fn set_optimization_actual(&self, id: i64, actual: f64) -> Result<(), NetForgeError>;

    /// Link an optimization to the topology that was synthesized from its
    /// adjusted pattern. Write-once.
    fn set_optimization_topology(
        &self,
        id: i64,
        topology_id: i64,
    ) -> Result<(), NetForgeError>;

    /// Optimizations awaiting their measured improvement for this topology.
    fn pending_optimizations(
        &self,
        topology_id: i64,
    ) -> Result<Vec<OptimizationRecord>, NetForgeError>;

    /// Fetch one topology record.
    fn get_topology(&self, id: i64) -> Result<Option<TopologyRecord>, NetForgeError>;

    /// Fetch one recommendation record.
    fn get_recommendation(&self, id: i64)
        -> Result<Option<RecommendationRecord>, NetForgeError>;

    /// Fetch one optimization record.
    fn get_optimization(&self, id: i64) -> Result<Option<OptimizationRecord>, NetForgeError>;

    /// The aggregate for one (pattern, redundancy, design-goal) key.
    fn performance_metric(
        &self,
        pattern: &str,
        redundancy: &str,
        design_goal: &str,
    ) -> Result<Option<PerformanceMetric>, NetForgeError>;

    /// All aggregates matching a redundancy level and design goal, one per
    /// pattern, in pattern-name order.
    fn performance_metrics(
        &self,
        redundancy: &str,
        design_goal: &str,
    ) -> Result<Vec<PerformanceMetric>, NetForgeError>;

    /// Topology records created within the last `days` days, newest first.
    fn recent_topologies(&self, days: i64) -> Result<Vec<TopologyRecord>, NetForgeError>;

    /// Rebuild the `PerformanceMetric` projection from the base tables.
    /// Maintenance entry point; the result must equal the incrementally
    /// maintained state.
    fn recompute_metrics(&self) -> Result<(), NetForgeError>;
}

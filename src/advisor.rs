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

//! # Pattern recommendation and autonomous optimization
//!
//! The advisor ranks topology patterns for an intent. With enough history
//! (at least three validated runs of a pattern under the same redundancy
//! and design goal) the ranking is driven by the stored aggregates:
//!
//! ```text
//! composite = (0.40 * avg_overall + 0.35 * satisfaction_rate
//!              + 0.25 * (100 - avg_resilience_impact)) * suitability
//! ```
//!
//! where `suitability` in `[0, 1]` encodes how well the site count fits the
//! pattern. Sparse history falls back to per-pattern heuristics and reports
//! a confidence below 40.
//!
//! The autonomous optimizer overrides a caller's pattern choice when
//! history shows a different pattern at least ten composite points ahead
//! with confidence 60 or more, and keeps the books to later compare the
//! promise against the measured outcome.

use log::{debug, info};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::history::{HistoryStore, OptimizationRecord, PerformanceMetric, RecommendationRecord};
use crate::intent::{DesignGoal, Intent, Pattern, Redundancy};
use crate::types::NetForgeError;

/// Metrics backed by fewer samples than this fall back to heuristics.
pub const MIN_SAMPLES: i64 = 3;
/// Overrides require at least this composite-score margin.
pub const OVERRIDE_MARGIN: f64 = 10.0;
/// Overrides require at least this confidence in the alternative.
pub const OVERRIDE_CONFIDENCE: f64 = 60.0;

/// One ranked pattern candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternScore {
    /// The candidate pattern.
    pub pattern: Pattern,
    /// The composite score driving the ranking.
    pub composite: f64,
    /// Confidence derived from the backing sample size.
    pub confidence: f64,
    /// Whether the score comes from heuristics rather than history.
    pub heuristic: bool,
    /// Arguments for this pattern.
    pub pros: Vec<String>,
    /// Arguments against this pattern.
    pub cons: Vec<String>,
}

/// A ranked recommendation, already persisted to the history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// The id of the stored [`RecommendationRecord`].
    pub record_id: i64,
    /// All candidates, best first.
    pub ranked: Vec<PatternScore>,
}

impl Recommendation {
    /// The top-ranked pattern.
    pub fn best(&self) -> Pattern {
        self.ranked[0].pattern
    }
}

/// The outcome of an autonomous-optimizer check that decided to override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Override {
    /// The id of the stored [`OptimizationRecord`].
    pub record_id: i64,
    /// The pattern the caller intended to use.
    pub original: Pattern,
    /// The pattern to use instead.
    pub adjusted: Pattern,
    /// Expected composite-score improvement.
    pub expected_improvement: f64,
}

/// How well a site count fits a pattern, in `[0, 1]`.
fn suitability(pattern: Pattern, sites: usize) -> f64 {
    let n = sites as f64;
    match pattern {
        Pattern::FullMesh => {
            if sites <= 6 {
                1.0
            } else {
                (1.0 - (n - 6.0) / 24.0).max(0.0)
            }
        }
        Pattern::HubSpoke => {
            if sites <= 20 {
                1.0
            } else {
                (1.0 - (n - 20.0) / 100.0).max(0.3)
            }
        }
        Pattern::Ring => match sites {
            4..=12 => 1.0,
            3 | 13..=20 => 0.7,
            _ => 0.4,
        },
        Pattern::Tree => match sites {
            20.. => 1.0,
            8..=19 => 0.8,
            _ => 0.5,
        },
        Pattern::LeafSpine => match sites {
            8..=64 => 1.0,
            4..=7 => 0.7,
            65.. => 0.8,
            _ => 0.3,
        },
        Pattern::Hybrid => match sites {
            30.. => 1.0,
            12..=29 => 0.7,
            _ => 0.3,
        },
    }
}

/// Heuristic base score used when no usable history exists: full mesh for a
/// handful of sites, leaf-spine for data-center-sized deployments,
/// hub-spoke for cost-driven branch setups, tree for large standard
/// deployments, ring for moderate site counts.
fn heuristic_score(pattern: Pattern, intent: &Intent) -> f64 {
    let n = intent.site_count;
    let mut score: f64 = 50.0;
    match pattern {
        Pattern::FullMesh if n <= 6 => score += 30.0,
        Pattern::LeafSpine if n >= 8 => {
            score += if matches!(
                intent.design_goal,
                DesignGoal::Scalability | DesignGoal::Latency
            ) {
                30.0
            } else {
                15.0
            }
        }
        Pattern::HubSpoke if intent.design_goal == DesignGoal::Cost => score += 30.0,
        Pattern::Tree if n >= 20 && intent.redundancy == Redundancy::Standard => score += 30.0,
        Pattern::Ring if (4..=12).contains(&n) && intent.redundancy <= Redundancy::High => {
            score += 20.0
        }
        Pattern::Hybrid if n >= 30 => score += 20.0,
        _ => {}
    }
    if intent.minimize_spof && pattern == Pattern::HubSpoke {
        score -= 20.0;
    }
    score
}

fn pros_cons(pattern: Pattern) -> (Vec<String>, Vec<String>) {
    let (pros, cons): (&[&str], &[&str]) = match pattern {
        Pattern::FullMesh => (
            &["single-hop reach between all sites", "no single point of failure"],
            &["link count grows quadratically", "cost-excessive beyond ten sites"],
        ),
        Pattern::HubSpoke => (
            &["cheapest wiring", "simple to operate"],
            &["hub is a single point of failure unless doubled", "all traffic hairpins"],
        ),
        Pattern::Ring => (
            &["two paths between any pair", "predictable wiring"],
            &["diameter grows with site count", "two failures can partition it"],
        ),
        Pattern::Tree => (
            &["scales to many sites", "clear layering"],
            &["aggregation layer concentrates failures", "needs augmentation for redundancy"],
        ),
        Pattern::LeafSpine => (
            &["uniform two-hop latency", "bandwidth scales with spines"],
            &["needs many links", "awkward below eight sites"],
        ),
        Pattern::Hybrid => (
            &["mixes data-center core with branch trees", "regional fault containment"],
            &["most complex to reason about", "inter-region links need care"],
        ),
    };
    (
        pros.iter().map(|s| s.to_string()).collect(),
        cons.iter().map(|s| s.to_string()).collect(),
    )
}

/// The composite score of one pattern under the intent, from a metric if it
/// carries enough samples, from heuristics otherwise.
fn score_pattern(
    pattern: Pattern,
    intent: &Intent,
    metric: Option<&PerformanceMetric>,
) -> PatternScore {
    let fit = suitability(pattern, intent.site_count);
    let (pros, cons) = pros_cons(pattern);
    match metric.filter(|m| m.sample_size >= MIN_SAMPLES) {
        Some(m) => {
            let raw = 0.40 * m.avg_overall
                + 0.35 * m.satisfaction_rate
                + 0.25 * (100.0 - m.avg_resilience_impact);
            PatternScore {
                pattern,
                composite: raw * fit,
                confidence: m.confidence,
                heuristic: false,
                pros,
                cons,
            }
        }
        None => PatternScore {
            pattern,
            composite: heuristic_score(pattern, intent) * fit,
            // below three samples the confidence stays under 40
            confidence: metric.map(|m| m.confidence).unwrap_or(0.0).min(39.0),
            heuristic: true,
            pros,
            cons,
        },
    }
}

/// All candidates for the intent, best first (ties broken by pattern name).
fn rank(intent: &Intent, store: &dyn HistoryStore) -> Result<Vec<PatternScore>, NetForgeError> {
    let metrics = store.performance_metrics(
        intent.redundancy.name(),
        intent.design_goal.name(),
    )?;
    let mut ranked: Vec<PatternScore> = Pattern::ALL
        .into_iter()
        .map(|pattern| {
            let metric = metrics.iter().find(|m| m.pattern == pattern.name());
            score_pattern(pattern, intent, metric)
        })
        .collect();
    ranked.sort_by(|a, b| {
        OrderedFloat(b.composite)
            .cmp(&OrderedFloat(a.composite))
            .then_with(|| a.pattern.name().cmp(b.pattern.name()))
    });
    Ok(ranked)
}

/// Rank all patterns for the intent and persist the recommendation.
pub fn recommend(
    intent: &Intent,
    store: &dyn HistoryStore,
) -> Result<Recommendation, NetForgeError> {
    let ranked = rank(intent, store)?;
    let best = &ranked[0];
    debug!(
        "recommending {} for `{}` (composite {:.1}, confidence {:.0})",
        best.pattern, intent.name, best.composite, best.confidence
    );
    let record_id = store.insert_recommendation(&RecommendationRecord {
        id: 0,
        intent_json: intent.to_json()?,
        recommended_pattern: best.pattern.name().to_string(),
        confidence: best.confidence,
        alternatives: serde_json::to_string(&ranked)?,
        user_selected: None,
        resulting_topology_id: None,
        feedback: None,
        created_at: 0,
    })?;
    Ok(Recommendation { record_id, ranked })
}

/// Check whether history argues for a different pattern than the one the
/// caller intends to use. If a confident alternative beats the choice by at
/// least ten composite points, the override is persisted and returned;
/// otherwise `None`.
pub fn optimize(
    intent: &Intent,
    chosen: Pattern,
    store: &dyn HistoryStore,
) -> Result<Option<Override>, NetForgeError> {
    let ranked = rank(intent, store)?;
    let chosen_score = ranked
        .iter()
        .find(|s| s.pattern == chosen)
        .map(|s| s.composite)
        .unwrap_or(0.0);
    let challenger = ranked.iter().find(|s| {
        s.pattern != chosen && !s.heuristic && s.confidence >= OVERRIDE_CONFIDENCE
    });
    let Some(challenger) = challenger else {
        return Ok(None);
    };
    let expected = challenger.composite - chosen_score;
    if expected < OVERRIDE_MARGIN {
        return Ok(None);
    }
    info!(
        "overriding {} with {} for `{}` (expected +{expected:.1})",
        chosen, challenger.pattern, intent.name
    );
    let record_id = store.insert_optimization(&OptimizationRecord {
        id: 0,
        intent_json: intent.to_json()?,
        original_pattern: chosen.name().to_string(),
        adjusted_pattern: challenger.pattern.name().to_string(),
        reason: format!(
            "history scores {} at {:.1} against {:.1} for {} (confidence {:.0})",
            challenger.pattern, challenger.composite, chosen_score, chosen, challenger.confidence
        ),
        expected_improvement: expected,
        actual_improvement: None,
        resulting_topology_id: None,
        created_at: 0,
    })?;
    Ok(Some(Override {
        record_id,
        original: chosen,
        adjusted: challenger.pattern,
        expected_improvement: expected,
    }))
}

/// Back-fill the measured improvement of every optimization waiting on this
/// topology: the validated overall score against the historical baseline of
/// the pattern the optimizer replaced.
pub fn note_validation(
    store: &dyn HistoryStore,
    topology_id: i64,
    overall_score: f64,
) -> Result<(), NetForgeError> {
    for pending in store.pending_optimizations(topology_id)? {
        let intent: Intent = serde_json::from_str(&pending.intent_json)?;
        let baseline = store
            .performance_metric(
                &pending.original_pattern,
                intent.redundancy.name(),
                intent.design_goal.name(),
            )?
            .map(|m| m.avg_overall)
            .unwrap_or(0.0);
        let actual = overall_score - baseline;
        debug!(
            "back-filling optimization {}: actual improvement {actual:.1}",
            pending.id
        );
        store.set_optimization_actual(pending.id, actual)?;
    }
    Ok(())
}

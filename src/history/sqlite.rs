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

//! SQLite-backed [`HistoryStore`]. Every insert runs in one short
//! transaction that also folds the affected `PerformanceMetric` row, so
//! readers see either the pre-insert or the post-insert aggregate, never a
//! partial state.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::warn;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::{
    HistoryStore, OptimizationRecord, PerformanceMetric, RecommendationRecord, SimulationRecord,
    TopologyRecord, ValidationRecord,
};
use crate::intent::Intent;
use crate::types::NetForgeError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS topologies (
    id              INTEGER PRIMARY KEY,
    intent          TEXT NOT NULL,
    pattern         TEXT NOT NULL,
    site_count      INTEGER NOT NULL,
    device_count    INTEGER NOT NULL,
    link_count      INTEGER NOT NULL,
    redundancy      TEXT NOT NULL,
    protocol        TEXT NOT NULL,
    design_goal     TEXT NOT NULL,
    minimize_spof   INTEGER NOT NULL,
    avg_degree      REAL NOT NULL,
    diameter        INTEGER NOT NULL,
    created_at      INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS validations (
    id                   INTEGER PRIMARY KEY,
    topology_id          INTEGER NOT NULL REFERENCES topologies(id),
    satisfied            INTEGER NOT NULL,
    overall_score        REAL NOT NULL,
    redundancy_score     REAL NOT NULL,
    path_diversity_score REAL NOT NULL,
    max_hops_ok          INTEGER NOT NULL,
    spof_eliminated      INTEGER NOT NULL,
    pattern_matched      INTEGER NOT NULL,
    violations           TEXT NOT NULL,
    duration_ms          INTEGER NOT NULL,
    created_at           INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS simulations (
    id                INTEGER PRIMARY KEY,
    topology_id       INTEGER NOT NULL REFERENCES topologies(id),
    scenario_kind     TEXT NOT NULL,
    scenario_payload  TEXT NOT NULL,
    partitioned       INTEGER NOT NULL,
    isolated_count    INTEGER NOT NULL,
    components_count  INTEGER NOT NULL,
    resilience_impact REAL NOT NULL,
    created_at        INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS recommendations (
    id                    INTEGER PRIMARY KEY,
    intent                TEXT NOT NULL,
    recommended_pattern   TEXT NOT NULL,
    confidence            REAL NOT NULL,
    alternatives          TEXT NOT NULL,
    user_selected         TEXT,
    resulting_topology_id INTEGER,
    feedback              INTEGER,
    created_at            INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS optimizations (
    id                    INTEGER PRIMARY KEY,
    intent                TEXT NOT NULL,
    original_pattern      TEXT NOT NULL,
    adjusted_pattern      TEXT NOT NULL,
    reason                TEXT NOT NULL,
    expected_improvement  REAL NOT NULL,
    actual_improvement    REAL,
    resulting_topology_id INTEGER,
    created_at            INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS perf_metrics (
    pattern               TEXT NOT NULL,
    redundancy            TEXT NOT NULL,
    design_goal           TEXT NOT NULL,
    sample_size           INTEGER NOT NULL DEFAULT 0,
    sum_overall           REAL NOT NULL DEFAULT 0,
    sum_redundancy        REAL NOT NULL DEFAULT 0,
    sum_path_diversity    REAL NOT NULL DEFAULT 0,
    sim_count             INTEGER NOT NULL DEFAULT 0,
    sum_resilience        REAL NOT NULL DEFAULT 0,
    spof_eliminated_count INTEGER NOT NULL DEFAULT 0,
    satisfied_count       INTEGER NOT NULL DEFAULT 0,
    feedback_count        INTEGER NOT NULL DEFAULT 0,
    sum_feedback          REAL NOT NULL DEFAULT 0,
    PRIMARY KEY (pattern, redundancy, design_goal)
);
CREATE INDEX IF NOT EXISTS idx_validations_topology ON validations(topology_id);
CREATE INDEX IF NOT EXISTS idx_simulations_topology ON simulations(topology_id);
CREATE INDEX IF NOT EXISTS idx_topologies_created ON topologies(created_at);
";

/// The SQLite engine behind the [`HistoryStore`] trait.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHistory").finish_non_exhaustive()
    }
}

impl SqliteHistory {
    /// Open (and, if necessary, initialize) a durable store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NetForgeError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a fresh in-memory store. Enough for development and tests.
    pub fn open_in_memory() -> Result<Self, NetForgeError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, NetForgeError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, NetForgeError> {
        self.conn.lock().map_err(|_| {
            NetForgeError::PersistenceError("history store lock poisoned".to_string())
        })
    }
}

fn now_ts() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

fn timestamp_or_now(given: i64) -> i64 {
    if given != 0 {
        given
    } else {
        now_ts()
    }
}

/// The aggregation key of a topology: (pattern, redundancy, design goal).
fn topology_key(tx: &Transaction<'_>, topology_id: i64) -> Result<(String, String, String), NetForgeError> {
    tx.query_row(
        "SELECT pattern, redundancy, design_goal FROM topologies WHERE id = ?1",
        params![topology_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
    .optional()?
    .ok_or_else(|| {
        NetForgeError::PersistenceError(format!(
            "record references unknown topology {topology_id}"
        ))
    })
}

fn ensure_metric_row(
    tx: &Transaction<'_>,
    key: &(String, String, String),
) -> Result<(), NetForgeError> {
    tx.execute(
        "INSERT INTO perf_metrics (pattern, redundancy, design_goal) VALUES (?1, ?2, ?3)
         ON CONFLICT (pattern, redundancy, design_goal) DO NOTHING",
        params![key.0, key.1, key.2],
    )?;
    Ok(())
}

fn fold_validation(
    tx: &Transaction<'_>,
    key: &(String, String, String),
    record: &ValidationRecord,
) -> Result<(), NetForgeError> {
    ensure_metric_row(tx, key)?;
    tx.execute(
        "UPDATE perf_metrics SET
             sample_size = sample_size + 1,
             sum_overall = sum_overall + ?4,
             sum_redundancy = sum_redundancy + ?5,
             sum_path_diversity = sum_path_diversity + ?6,
             spof_eliminated_count = spof_eliminated_count + ?7,
             satisfied_count = satisfied_count + ?8
         WHERE pattern = ?1 AND redundancy = ?2 AND design_goal = ?3",
        params![
            key.0,
            key.1,
            key.2,
            record.overall_score,
            record.redundancy_score,
            record.path_diversity_score,
            record.spof_eliminated as i64,
            record.satisfied as i64,
        ],
    )?;
    Ok(())
}

fn fold_simulation(
    tx: &Transaction<'_>,
    key: &(String, String, String),
    resilience_impact: f64,
) -> Result<(), NetForgeError> {
    ensure_metric_row(tx, key)?;
    tx.execute(
        "UPDATE perf_metrics SET
             sim_count = sim_count + 1,
             sum_resilience = sum_resilience + ?4
         WHERE pattern = ?1 AND redundancy = ?2 AND design_goal = ?3",
        params![key.0, key.1, key.2, resilience_impact],
    )?;
    Ok(())
}

fn fold_feedback(
    tx: &Transaction<'_>,
    key: &(String, String, String),
    feedback: i64,
) -> Result<(), NetForgeError> {
    ensure_metric_row(tx, key)?;
    let value = (feedback - 1) as f64 / 4.0;
    tx.execute(
        "UPDATE perf_metrics SET
             feedback_count = feedback_count + 1,
             sum_feedback = sum_feedback + ?4
         WHERE pattern = ?1 AND redundancy = ?2 AND design_goal = ?3",
        params![key.0, key.1, key.2, value],
    )?;
    Ok(())
}

/// The aggregation key of a recommendation: the chosen (or recommended)
/// pattern plus the intent's redundancy and design goal.
fn recommendation_key(
    intent_json: &str,
    recommended: &str,
    user_selected: Option<&str>,
) -> Result<(String, String, String), NetForgeError> {
    let intent: Intent = serde_json::from_str(intent_json)?;
    let pattern = user_selected.unwrap_or(recommended).to_string();
    Ok((
        pattern,
        intent.redundancy.name().to_string(),
        intent.design_goal.name().to_string(),
    ))
}

fn metric_from_row(row: &Row<'_>) -> rusqlite::Result<PerformanceMetric> {
    let sample_size: i64 = row.get("sample_size")?;
    let sum_overall: f64 = row.get("sum_overall")?;
    let sum_redundancy: f64 = row.get("sum_redundancy")?;
    let sum_path_diversity: f64 = row.get("sum_path_diversity")?;
    let sim_count: i64 = row.get("sim_count")?;
    let sum_resilience: f64 = row.get("sum_resilience")?;
    let spof_eliminated_count: i64 = row.get("spof_eliminated_count")?;
    let satisfied_count: i64 = row.get("satisfied_count")?;
    let feedback_count: i64 = row.get("feedback_count")?;
    let sum_feedback: f64 = row.get("sum_feedback")?;

    let avg = |sum: f64, n: i64| if n > 0 { sum / n as f64 } else { 0.0 };
    // explicit feedback outweighs a validation verdict five to one
    let weight = sample_size as f64 + 5.0 * feedback_count as f64;
    let satisfaction_rate = if weight > 0.0 {
        100.0 * (satisfied_count as f64 + 5.0 * sum_feedback) / weight
    } else {
        0.0
    };

    Ok(PerformanceMetric {
        pattern: row.get("pattern")?,
        redundancy: row.get("redundancy")?,
        design_goal: row.get("design_goal")?,
        sample_size,
        avg_overall: avg(sum_overall, sample_size),
        avg_redundancy: avg(sum_redundancy, sample_size),
        avg_path_diversity: avg(sum_path_diversity, sample_size),
        avg_resilience_impact: avg(sum_resilience, sim_count),
        spof_elimination_rate: avg(100.0 * spof_eliminated_count as f64, sample_size),
        satisfaction_rate,
        confidence: 100.0 * (sample_size as f64 / 10.0).min(1.0),
    })
}

fn topology_from_row(row: &Row<'_>) -> rusqlite::Result<TopologyRecord> {
    Ok(TopologyRecord {
        id: row.get("id")?,
        intent_json: row.get("intent")?,
        pattern: row.get("pattern")?,
        site_count: row.get("site_count")?,
        device_count: row.get("device_count")?,
        link_count: row.get("link_count")?,
        redundancy: row.get("redundancy")?,
        protocol: row.get("protocol")?,
        design_goal: row.get("design_goal")?,
        minimize_spof: row.get("minimize_spof")?,
        avg_degree: row.get("avg_degree")?,
        diameter: row.get("diameter")?,
        created_at: row.get("created_at")?,
    })
}

fn recommendation_from_row(row: &Row<'_>) -> rusqlite::Result<RecommendationRecord> {
    Ok(RecommendationRecord {
        id: row.get("id")?,
        intent_json: row.get("intent")?,
        recommended_pattern: row.get("recommended_pattern")?,
        confidence: row.get("confidence")?,
        alternatives: row.get("alternatives")?,
        user_selected: row.get("user_selected")?,
        resulting_topology_id: row.get("resulting_topology_id")?,
        feedback: row.get("feedback")?,
        created_at: row.get("created_at")?,
    })
}

fn optimization_from_row(row: &Row<'_>) -> rusqlite::Result<OptimizationRecord> {
    Ok(OptimizationRecord {
        id: row.get("id")?,
        intent_json: row.get("intent")?,
        original_pattern: row.get("original_pattern")?,
        adjusted_pattern: row.get("adjusted_pattern")?,
        reason: row.get("reason")?,
        expected_improvement: row.get("expected_improvement")?,
        actual_improvement: row.get("actual_improvement")?,
        resulting_topology_id: row.get("resulting_topology_id")?,
        created_at: row.get("created_at")?,
    })
}

impl HistoryStore for SqliteHistory {
    fn insert_topology(&self, record: &TopologyRecord) -> Result<i64, NetForgeError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO topologies (intent, pattern, site_count, device_count, link_count,
                 redundancy, protocol, design_goal, minimize_spof, avg_degree, diameter,
                 created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.intent_json,
                record.pattern,
                record.site_count,
                record.device_count,
                record.link_count,
                record.redundancy,
                record.protocol,
                record.design_goal,
                record.minimize_spof,
                record.avg_degree,
                record.diameter,
                timestamp_or_now(record.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn insert_validation(&self, record: &ValidationRecord) -> Result<i64, NetForgeError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let key = topology_key(&tx, record.topology_id)?;
        tx.execute(
            "INSERT INTO validations (topology_id, satisfied, overall_score, redundancy_score,
                 path_diversity_score, max_hops_ok, spof_eliminated, pattern_matched,
                 violations, duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.topology_id,
                record.satisfied,
                record.overall_score,
                record.redundancy_score,
                record.path_diversity_score,
                record.max_hops_ok,
                record.spof_eliminated,
                record.pattern_matched,
                serde_json::to_string(&record.violations)?,
                record.duration_ms,
                timestamp_or_now(record.created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        fold_validation(&tx, &key, record)?;
        tx.commit()?;
        Ok(id)
    }

    fn insert_simulation(&self, record: &SimulationRecord) -> Result<i64, NetForgeError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let key = topology_key(&tx, record.topology_id)?;
        tx.execute(
            "INSERT INTO simulations (topology_id, scenario_kind, scenario_payload,
                 partitioned, isolated_count, components_count, resilience_impact, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.topology_id,
                record.scenario_kind,
                record.scenario_payload,
                record.partitioned,
                record.isolated_count,
                record.components_count,
                record.resilience_impact,
                timestamp_or_now(record.created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        fold_simulation(&tx, &key, record.resilience_impact)?;
        tx.commit()?;
        Ok(id)
    }

    fn insert_recommendation(&self, record: &RecommendationRecord) -> Result<i64, NetForgeError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO recommendations (intent, recommended_pattern, confidence,
                 alternatives, user_selected, resulting_topology_id, feedback, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.intent_json,
                record.recommended_pattern,
                record.confidence,
                record.alternatives,
                record.user_selected,
                record.resulting_topology_id,
                record.feedback,
                timestamp_or_now(record.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn set_recommendation_outcome(
        &self,
        id: i64,
        user_selected: &str,
        resulting_topology_id: Option<i64>,
    ) -> Result<(), NetForgeError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let existing: Option<String> = tx
            .query_row(
                "SELECT user_selected FROM recommendations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| {
                NetForgeError::PersistenceError(format!("unknown recommendation {id}"))
            })?;
        if existing.is_some() {
            return Err(NetForgeError::PersistenceError(format!(
                "recommendation {id} already has an outcome"
            )));
        }
        tx.execute(
            "UPDATE recommendations SET user_selected = ?2, resulting_topology_id = ?3
             WHERE id = ?1",
            params![id, user_selected, resulting_topology_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn set_recommendation_feedback(&self, id: i64, feedback: i64) -> Result<(), NetForgeError> {
        if !(1..=5).contains(&feedback) {
            return Err(NetForgeError::InvalidIntent(format!(
                "feedback {feedback} is outside 1..=5"
            )));
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let row = tx
            .query_row(
                "SELECT intent, recommended_pattern, user_selected, feedback
                 FROM recommendations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| {
                NetForgeError::PersistenceError(format!("unknown recommendation {id}"))
            })?;
        if row.3.is_some() {
            return Err(NetForgeError::PersistenceError(format!(
                "recommendation {id} already has feedback"
            )));
        }
        tx.execute(
            "UPDATE recommendations SET feedback = ?2 WHERE id = ?1",
            params![id, feedback],
        )?;
        let key = recommendation_key(&row.0, &row.1, row.2.as_deref())?;
        fold_feedback(&tx, &key, feedback)?;
        tx.commit()?;
        Ok(())
    }

    fn insert_optimization(&self, record: &OptimizationRecord) -> Result<i64, NetForgeError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO optimizations (intent, original_pattern, adjusted_pattern, reason,
                 expected_improvement, actual_improvement, resulting_topology_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.intent_json,
                record.original_pattern,
                record.adjusted_pattern,
                record.reason,
                record.expected_improvement,
                record.actual_improvement,
                record.resulting_topology_id,
                timestamp_or_now(record.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn set_optimization_actual(&self, id: i64, actual: f64) -> Result<(), NetForgeError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE optimizations SET actual_improvement = ?2
             WHERE id = ?1 AND actual_improvement IS NULL",
            params![id, actual],
        )?;
        if changed == 0 {
            warn!("optimization {id} missing or already back-filled");
        }
        Ok(())
    }

    fn set_optimization_topology(&self, id: i64, topology_id: i64) -> Result<(), NetForgeError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE optimizations SET resulting_topology_id = ?2
             WHERE id = ?1 AND resulting_topology_id IS NULL",
            params![id, topology_id],
        )?;
        if changed == 0 {
            return Err(NetForgeError::PersistenceError(format!(
                "optimization {id} missing or already linked to a topology"
            )));
        }
        Ok(())
    }

    fn pending_optimizations(
        &self,
        topology_id: i64,
    ) -> Result<Vec<OptimizationRecord>, NetForgeError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM optimizations
             WHERE resulting_topology_id = ?1 AND actual_improvement IS NULL
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![topology_id], optimization_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn get_topology(&self, id: i64) -> Result<Option<TopologyRecord>, NetForgeError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT * FROM topologies WHERE id = ?1",
                params![id],
                topology_from_row,
            )
            .optional()?)
    }

    fn get_recommendation(
        &self,
        id: i64,
    ) -> Result<Option<RecommendationRecord>, NetForgeError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT * FROM recommendations WHERE id = ?1",
                params![id],
                recommendation_from_row,
            )
            .optional()?)
    }

    fn get_optimization(&self, id: i64) -> Result<Option<OptimizationRecord>, NetForgeError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT * FROM optimizations WHERE id = ?1",
                params![id],
                optimization_from_row,
            )
            .optional()?)
    }

    fn performance_metric(
        &self,
        pattern: &str,
        redundancy: &str,
        design_goal: &str,
    ) -> Result<Option<PerformanceMetric>, NetForgeError> {
        let conn = self.lock()?;
        Ok(conn
            .query_row(
                "SELECT * FROM perf_metrics
                 WHERE pattern = ?1 AND redundancy = ?2 AND design_goal = ?3",
                params![pattern, redundancy, design_goal],
                metric_from_row,
            )
            .optional()?)
    }

    fn performance_metrics(
        &self,
        redundancy: &str,
        design_goal: &str,
    ) -> Result<Vec<PerformanceMetric>, NetForgeError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM perf_metrics WHERE redundancy = ?1 AND design_goal = ?2
             ORDER BY pattern",
        )?;
        let rows = stmt.query_map(params![redundancy, design_goal], metric_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn recent_topologies(&self, days: i64) -> Result<Vec<TopologyRecord>, NetForgeError> {
        let cutoff = now_ts() - days * 86_400;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM topologies WHERE created_at >= ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![cutoff], topology_from_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn recompute_metrics(&self) -> Result<(), NetForgeError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM perf_metrics", [])?;
        tx.execute_batch(
            "INSERT INTO perf_metrics (pattern, redundancy, design_goal, sample_size,
                 sum_overall, sum_redundancy, sum_path_diversity, spof_eliminated_count,
                 satisfied_count)
             SELECT t.pattern, t.redundancy, t.design_goal, COUNT(*),
                 SUM(v.overall_score), SUM(v.redundancy_score), SUM(v.path_diversity_score),
                 SUM(v.spof_eliminated), SUM(v.satisfied)
             FROM validations v JOIN topologies t ON t.id = v.topology_id
             GROUP BY t.pattern, t.redundancy, t.design_goal;

             INSERT INTO perf_metrics (pattern, redundancy, design_goal, sim_count,
                 sum_resilience)
             SELECT t.pattern, t.redundancy, t.design_goal, COUNT(*),
                 SUM(s.resilience_impact)
             FROM simulations s JOIN topologies t ON t.id = s.topology_id
             WHERE true
             GROUP BY t.pattern, t.redundancy, t.design_goal
             ON CONFLICT (pattern, redundancy, design_goal) DO UPDATE SET
                 sim_count = excluded.sim_count,
                 sum_resilience = excluded.sum_resilience;",
        )?;
        // feedback needs the intent parsed, so fold it row by row
        {
            let mut stmt = tx.prepare(
                "SELECT intent, recommended_pattern, user_selected, feedback
                 FROM recommendations WHERE feedback IS NOT NULL ORDER BY id",
            )?;
            let rows: Vec<(String, String, Option<String>, i64)> = stmt
                .query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .collect::<rusqlite::Result<_>>()?;
            drop(stmt);
            for (intent, recommended, selected, feedback) in rows {
                let key = recommendation_key(&intent, &recommended, selected.as_deref())?;
                fold_feedback(&tx, &key, feedback)?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

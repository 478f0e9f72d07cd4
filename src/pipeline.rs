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

//! # Pipeline orchestration
//!
//! [`run_pipeline`] drives one intent through parse, advice, synthesis,
//! analysis, simulation, validation, and persistence, and returns a
//! [`PipelineReport`] with one status entry per stage.
//!
//! Only a synthesis failure is fatal; any later stage failure downgrades
//! the run to partial success and the remaining stages still execute with
//! whatever inputs they have. Cancellation is cooperative and honored at
//! stage boundaries. Stages are CPU-bound and not preempted: a stage that
//! outlives its deadline is recorded as timed out and its output is
//! discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::advisor::{self, Override};
use crate::analyzer::{analyze, AnalysisResult};
use crate::builder::synthesize;
use crate::graph::TopoGraph;
use crate::history::{HistoryStore, SimulationRecord, TopologyRecord, ValidationRecord};
use crate::intent::{Intent, IntentRequest};
use crate::simulator::{generate_test_scenarios, simulate, SimulationResult};
use crate::topology::Topology;
use crate::types::{NetForgeError, Stage};
use crate::validator::{validate, ValidationResult};

/// Cooperative cancellation handle, checked at stage boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Stages that have not started yet are skipped.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-stage deadlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDeadlines {
    /// Deadline of the synthesis stage.
    pub synthesize: Duration,
    /// Deadline of the analysis stage.
    pub analyze: Duration,
    /// Deadline of the simulation stage.
    pub simulate: Duration,
    /// Deadline of the validation stage.
    pub validate: Duration,
}

impl Default for StageDeadlines {
    fn default() -> Self {
        Self {
            synthesize: Duration::from_secs(30),
            analyze: Duration::from_secs(10),
            simulate: Duration::from_secs(10),
            validate: Duration::from_secs(10),
        }
    }
}

/// Options of one pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Seed for reproducible synthesis.
    pub seed: Option<u64>,
    /// Whether to consult the advisor even when the intent names a pattern
    /// (the autonomous optimizer may then override it).
    pub consult_advisor: bool,
    /// Stage deadlines.
    pub deadlines: StageDeadlines,
    /// Cancellation handle.
    pub cancel: CancelToken,
}

/// Status of one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StageStatus {
    /// The stage ran to completion in time.
    Success,
    /// The stage failed.
    Failed {
        /// The stable error label.
        label: String,
        /// The human-readable message, naming stage, kind and hint.
        message: String,
    },
    /// The stage did not run because an earlier stage left it without
    /// input.
    Skipped,
    /// The stage was skipped due to cooperative cancellation.
    Cancelled,
    /// The stage finished after its deadline; its output was discarded.
    TimedOut,
}

/// One stage's status and wall-clock duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// The stage.
    pub stage: Stage,
    /// What happened.
    pub status: StageStatus,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Aggregate counters of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounters {
    /// Devices in the synthesized topology.
    pub devices: usize,
    /// Links in the synthesized topology.
    pub links: usize,
    /// SPOFs found by the analysis.
    pub spofs: usize,
    /// Simulations run.
    pub simulations: usize,
    /// Violations found by the validation.
    pub violations: usize,
}

/// The structured outcome of one pipeline invocation.
#[derive(Debug)]
pub struct PipelineReport {
    /// The normalized intent, once parsing succeeded.
    pub intent: Option<Intent>,
    /// Status of every stage, in execution order.
    pub stages: Vec<StageReport>,
    /// The synthesized topology.
    pub topology: Option<Topology>,
    /// The analysis result.
    pub analysis: Option<AnalysisResult>,
    /// The simulation results, one per canonical scenario.
    pub simulations: Vec<SimulationResult>,
    /// The validation result.
    pub validation: Option<ValidationResult>,
    /// The advisor override, if the optimizer replaced the pattern.
    pub pattern_override: Option<Override>,
    /// The persisted topology id.
    pub topology_id: Option<i64>,
    /// Whether every record reached the history store.
    pub fully_persisted: bool,
    /// Aggregate counters.
    pub counters: ReportCounters,
}

impl PipelineReport {
    /// Whether every stage succeeded.
    pub fn success(&self) -> bool {
        self.stages
            .iter()
            .all(|s| s.status == StageStatus::Success)
    }

    /// Whether the run produced a topology but some stage failed.
    pub fn partial_success(&self) -> bool {
        self.topology.is_some() && !self.success()
    }

    /// Whether the run was cancelled.
    pub fn cancelled(&self) -> bool {
        self.stages
            .iter()
            .any(|s| s.status == StageStatus::Cancelled)
    }
}

/// Run a stage body, measure it, and apply the post-hoc deadline.
fn run_stage<T>(
    stage: Stage,
    deadline: Option<Duration>,
    body: impl FnOnce() -> Result<T, NetForgeError>,
) -> (StageReport, Option<T>) {
    let start = Instant::now();
    let outcome = body();
    let elapsed = start.elapsed();
    let duration_ms = elapsed.as_millis() as u64;
    match outcome {
        Ok(value) => {
            if deadline.map(|d| elapsed > d).unwrap_or(false) {
                let err = NetForgeError::StageTimeout(stage);
                warn!("stage {stage}: {err}");
                (
                    StageReport {
                        stage,
                        status: StageStatus::TimedOut,
                        duration_ms,
                    },
                    None,
                )
            } else {
                (
                    StageReport {
                        stage,
                        status: StageStatus::Success,
                        duration_ms,
                    },
                    Some(value),
                )
            }
        }
        Err(err) => {
            warn!("stage {stage} failed: {err}");
            (
                StageReport {
                    stage,
                    status: StageStatus::Failed {
                        label: err.label().to_string(),
                        message: format!("stage {stage}: {err}"),
                    },
                    duration_ms,
                },
                None,
            )
        }
    }
}

fn skipped(stage: Stage) -> StageReport {
    StageReport {
        stage,
        status: StageStatus::Skipped,
        duration_ms: 0,
    }
}

fn cancelled(stage: Stage) -> StageReport {
    StageReport {
        stage,
        status: StageStatus::Cancelled,
        duration_ms: 0,
    }
}

/// Drive one intent through the whole pipeline.
pub fn run_pipeline(
    request: &IntentRequest,
    options: &PipelineOptions,
    store: &dyn HistoryStore,
) -> PipelineReport {
    let deadlines = options.deadlines.clone();
    let mut report = PipelineReport {
        intent: None,
        stages: Vec::new(),
        topology: None,
        analysis: None,
        simulations: Vec::new(),
        validation: None,
        pattern_override: None,
        topology_id: None,
        fully_persisted: false,
        counters: ReportCounters::default(),
    };

    // stage 1: parse
    let (stage, intent) = run_stage(Stage::Parse, None, || Intent::parse(request));
    report.stages.push(stage);
    let Some(mut intent) = intent else {
        return report;
    };
    info!("pipeline `{}`: intent parsed", intent.name);

    // stage 2: advise (optional)
    let mut recommendation_id = None;
    if intent.pattern.is_none() || options.consult_advisor {
        if options.cancel.is_cancelled() {
            report.stages.push(cancelled(Stage::Advise));
            for s in [Stage::Synthesize, Stage::Analyze, Stage::Simulate, Stage::Validate, Stage::Persist] {
                report.stages.push(cancelled(s));
            }
            report.intent = Some(intent);
            return report;
        }
        let (stage, outcome) = run_stage(Stage::Advise, None, || {
            match intent.pattern {
                None => {
                    let rec = advisor::recommend(&intent, store)?;
                    Ok((Some(rec), None))
                }
                Some(pattern) => Ok((None, advisor::optimize(&intent, pattern, store)?)),
            }
        });
        report.stages.push(stage);
        if let Some((recommendation, override_)) = outcome {
            if let Some(rec) = recommendation {
                intent.pattern = Some(rec.best());
                recommendation_id = Some(rec.record_id);
            }
            if let Some(o) = override_ {
                intent.pattern = Some(o.adjusted);
                report.pattern_override = Some(o);
            }
        }
    }
    report.intent = Some(intent.clone());

    // stage 3: synthesize (fatal on failure)
    if options.cancel.is_cancelled() {
        for s in [Stage::Synthesize, Stage::Analyze, Stage::Simulate, Stage::Validate, Stage::Persist] {
            report.stages.push(cancelled(s));
        }
        return report;
    }
    let (stage, topology) = run_stage(Stage::Synthesize, Some(deadlines.synthesize), || {
        synthesize(&intent, options.seed)
    });
    report.stages.push(stage);
    let Some(topology) = topology else {
        for s in [Stage::Analyze, Stage::Simulate, Stage::Validate, Stage::Persist] {
            report.stages.push(skipped(s));
        }
        return report;
    };
    report.counters.devices = topology.device_count();
    report.counters.links = topology.link_count();

    // stage 4: analyze
    let analysis = if options.cancel.is_cancelled() {
        report.stages.push(cancelled(Stage::Analyze));
        None
    } else {
        let (stage, analysis) =
            run_stage(Stage::Analyze, Some(deadlines.analyze), || Ok(analyze(&topology)));
        report.stages.push(stage);
        analysis
    };
    if let Some(a) = &analysis {
        report.counters.spofs = a.spofs.len();
    }

    // stage 5: simulate the canonical scenarios
    let simulations: Vec<SimulationResult> = if options.cancel.is_cancelled() {
        report.stages.push(cancelled(Stage::Simulate));
        Vec::new()
    } else {
        let (stage, sims) = run_stage(Stage::Simulate, Some(deadlines.simulate), || {
            generate_test_scenarios(&topology)
                .iter()
                .map(|s| simulate(&topology, s))
                .collect::<Result<Vec<_>, _>>()
        });
        report.stages.push(stage);
        sims.unwrap_or_default()
    };
    report.counters.simulations = simulations.len();

    // stage 6: validate (needs the analysis)
    let validation = if options.cancel.is_cancelled() {
        report.stages.push(cancelled(Stage::Validate));
        None
    } else if let Some(analysis) = &analysis {
        let (stage, validation) = run_stage(Stage::Validate, Some(deadlines.validate), || {
            Ok(validate(&topology, &intent, analysis, &simulations))
        });
        report.stages.push(stage);
        validation
    } else {
        report.stages.push(skipped(Stage::Validate));
        None
    };
    if let Some(v) = &validation {
        report.counters.violations = v.violations.len();
    }

    // stage 7: persist, topology record first
    if options.cancel.is_cancelled() {
        report.stages.push(cancelled(Stage::Persist));
    } else {
        let validate_ms = report
            .stages
            .iter()
            .find(|s| s.stage == Stage::Validate)
            .map(|s| s.duration_ms as i64)
            .unwrap_or(0);
        let (stage, persisted) = run_stage(Stage::Persist, None, || {
            persist(
                store,
                &intent,
                &topology,
                analysis.as_ref(),
                &simulations,
                validation.as_ref(),
                validate_ms,
                recommendation_id,
                report.pattern_override.as_ref(),
            )
        });
        report.stages.push(stage);
        if let Some(outcome) = persisted {
            report.topology_id = Some(outcome.topology_id);
            report.fully_persisted = outcome.complete;
        }
    }

    report.topology = Some(topology);
    report.analysis = analysis;
    report.simulations = simulations;
    report.validation = validation;
    report
}

struct PersistOutcome {
    topology_id: i64,
    complete: bool,
}

/// Write all records of one run. The topology record lands first, so every
/// dependent record references an existing row; individual failures
/// afterwards degrade to partial persistence instead of aborting.
#[allow(clippy::too_many_arguments)]
fn persist(
    store: &dyn HistoryStore,
    intent: &Intent,
    topology: &Topology,
    analysis: Option<&AnalysisResult>,
    simulations: &[SimulationResult],
    validation: Option<&ValidationResult>,
    validate_ms: i64,
    recommendation_id: Option<i64>,
    pattern_override: Option<&Override>,
) -> Result<PersistOutcome, NetForgeError> {
    let (avg_degree, diameter) = match analysis {
        Some(a) => (2.0 * a.link_count as f64 / a.device_count as f64, a.diameter),
        None => (
            topology.avg_degree(),
            TopoGraph::from_topology(topology).diameter(),
        ),
    };
    let topology_id = store.insert_topology(&TopologyRecord {
        id: 0,
        intent_json: intent.to_json()?,
        pattern: intent.pattern.map(|p| p.name()).unwrap_or("?").to_string(),
        site_count: intent.site_count as i64,
        device_count: topology.device_count() as i64,
        link_count: topology.link_count() as i64,
        redundancy: intent.redundancy.name().to_string(),
        protocol: intent.protocol.name().to_string(),
        design_goal: intent.design_goal.name().to_string(),
        minimize_spof: intent.minimize_spof,
        avg_degree,
        diameter: diameter as i64,
        created_at: 0,
    })?;

    let mut complete = true;

    if let Some(rec_id) = recommendation_id {
        let chosen = intent.pattern.map(|p| p.name()).unwrap_or("?");
        if let Err(e) = store.set_recommendation_outcome(rec_id, chosen, Some(topology_id)) {
            warn!("failed to link recommendation {rec_id}: {e}");
            complete = false;
        }
    }
    if let Some(o) = pattern_override {
        if let Err(e) = store.set_optimization_topology(o.record_id, topology_id) {
            warn!("failed to link optimization {}: {e}", o.record_id);
            complete = false;
        }
    }

    for sim in simulations {
        let record = SimulationRecord {
            id: 0,
            topology_id,
            scenario_kind: sim.scenario.kind().to_string(),
            scenario_payload: serde_json::to_string(&sim.scenario)?,
            partitioned: sim.partitioned,
            isolated_count: sim.isolated_count as i64,
            components_count: sim.components.len() as i64,
            resilience_impact: sim.connectivity_loss_pct,
            created_at: 0,
        };
        if let Err(e) = store.insert_simulation(&record) {
            warn!("failed to persist a simulation record: {e}");
            complete = false;
        }
    }

    if let Some(v) = validation {
        let record = ValidationRecord {
            id: 0,
            topology_id,
            satisfied: v.satisfied,
            overall_score: v.overall_score,
            redundancy_score: v.redundancy_score,
            path_diversity_score: v.path_diversity_score,
            max_hops_ok: v.max_hops_ok,
            spof_eliminated: v.spof_eliminated,
            pattern_matched: v.pattern_matched,
            violations: v.violations.clone(),
            duration_ms: validate_ms,
            created_at: 0,
        };
        match store.insert_validation(&record) {
            Ok(_) => {
                // let the optimizer compare its promise to the outcome
                if let Err(e) = advisor::note_validation(store, topology_id, v.overall_score) {
                    warn!("failed to back-fill optimizations: {e}");
                    complete = false;
                }
            }
            Err(e) => {
                warn!("failed to persist the validation record: {e}");
                complete = false;
            }
        }
    }

    Ok(PersistOutcome {
        topology_id,
        complete,
    })
}

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

//! Convenient re-export of the common surface.

pub use crate::advisor::{optimize, recommend, Override, Recommendation};
pub use crate::analyzer::{analyze, AnalysisResult};
pub use crate::builder::synthesize;
pub use crate::export::ClabTopology;
pub use crate::graph::TopoGraph;
pub use crate::history::{HistoryStore, SqliteHistory};
pub use crate::intent::{DesignGoal, Intent, IntentRequest, Pattern, Protocol, Redundancy};
pub use crate::pipeline::{run_pipeline, CancelToken, PipelineOptions, PipelineReport};
pub use crate::simulator::{
    generate_test_scenarios, simulate, FailureScenario, SimulationResult,
};
pub use crate::topology::{Device, DeviceKind, Link, Topology};
pub use crate::types::{NetForgeError, Severity, Stage};
pub use crate::validator::{validate, ValidationResult};

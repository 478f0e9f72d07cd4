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

#![deny(missing_docs, missing_debug_implementations)]

//! # NetForge
//!
//! NetForge designs and evaluates layer-2/layer-3 network topologies from
//! declarative intent, and learns from the outcomes of past runs to
//! recommend better designs over time.
//!
//! ## Main concepts
//!
//! An [`intent::Intent`] declares *what* a topology should look like
//! (pattern, site count, redundancy level, diameter ceiling). The
//! [`builder`] synthesizes a [`topology::Topology`] from it, assigning
//! every link a /30 subnet and every router a unique id (see
//! [`addressing`]). The [`analyzer`] and [`simulator`] operate on the
//! derived [`graph::TopoGraph`]: the analyzer finds single points of
//! failure and scores the topology's health, the simulator plays failure
//! scenarios against a graph copy. The [`validator`] compares everything
//! against the original intent, and the [`history`] store persists each
//! run. On later runs the [`advisor`] reads those records back to rank
//! patterns, and can autonomously override a poor choice. The whole chain
//! is composed by [`pipeline::run_pipeline`].
//!
//! ## Example
//!
//! ```
//! use netforge::prelude::*;
//!
//! fn main() -> Result<(), NetForgeError> {
//!     let request = IntentRequest {
//!         name: "pop-fabric".to_string(),
//!         pattern: Some(Pattern::LeafSpine),
//!         site_count: Some(10),
//!         redundancy: Some(Redundancy::High),
//!         minimize_spof: Some(true),
//!         ..Default::default()
//!     };
//!     let intent = Intent::parse(&request)?;
//!
//!     // reproducible synthesis: same intent + same seed = same topology
//!     let topo = synthesize(&intent, Some(42))?;
//!     let analysis = analyze(&topo);
//!     assert!(analysis.spofs.is_empty());
//!
//!     let scenarios = generate_test_scenarios(&topo);
//!     let sims: Vec<_> = scenarios
//!         .iter()
//!         .map(|s| simulate(&topo, s))
//!         .collect::<Result<_, _>>()?;
//!     let validation = validate(&topo, &intent, &analysis, &sims);
//!     assert!(validation.satisfied);
//!     Ok(())
//! }
//! ```

pub mod addressing;
pub mod advisor;
pub mod analyzer;
pub mod builder;
pub mod export;
pub mod graph;
pub mod history;
pub mod intent;
pub mod pipeline;
pub mod prelude;
pub mod simulator;
pub mod topology;
pub mod types;
pub mod validator;

#[cfg(test)]
mod test;

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

//! Module containing all shared type definitions

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) type IndexType = u32;
/// Device identification (an index into the topology graph)
pub type DeviceId = NodeIndex<IndexType>;

/// AS Number
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AsId(pub u32);

impl std::fmt::Display for AsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AS{}", self.0)
    }
}

impl From<u32> for AsId {
    fn from(x: u32) -> Self {
        Self(x)
    }
}

impl From<usize> for AsId {
    fn from(x: usize) -> Self {
        Self(x as u32)
    }
}

/// Link cost (OSPF metric) on the topology graph.
pub type LinkCost = u32;

/// The pipeline stages, in execution order. Used both for reporting and for
/// attributing errors to the stage that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    /// Intent parsing and normalization (C2)
    Parse,
    /// Pattern recommendation / autonomous optimization (C8)
    Advise,
    /// Topology synthesis (C3)
    Synthesize,
    /// Topology analysis (C5)
    Analyze,
    /// Failure simulation (C6)
    Simulate,
    /// Intent validation (C7)
    Validate,
    /// Persistence of all records (C9)
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Parse => "parse",
            Self::Advise => "advise",
            Self::Synthesize => "synthesize",
            Self::Analyze => "analyze",
            Self::Simulate => "simulate",
            Self::Validate => "validate",
            Self::Persist => "persist",
        })
    }
}

/// Severity tier shared by SPOF risk classification and failure-simulation
/// impact. The tier is derived from an impact percentage: above 50 is
/// critical, 25 to 50 is high, 10 to 25 is medium, and everything below is
/// low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Impact below 10%
    Low,
    /// Impact between 10% and 25%
    Medium,
    /// Impact between 25% and 50%
    High,
    /// Impact above 50%
    Critical,
}

impl Severity {
    /// Classify an impact percentage (in `[0, 100]`).
    pub fn from_impact_pct(pct: f64) -> Self {
        if pct > 50.0 {
            Self::Critical
        } else if pct >= 25.0 {
            Self::High
        } else if pct >= 10.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// The health-score penalty of an issue of this severity.
    pub fn health_penalty(&self) -> f64 {
        match self {
            Self::Critical => 30.0,
            Self::High => 20.0,
            Self::Medium => 10.0,
            Self::Low => 5.0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        })
    }
}

/// Main error type of the crate.
///
/// Every variant carries a stable textual label (see [`NetForgeError::label`])
/// that crosses the transport boundary unchanged, so adapters can match on
/// the kind without parsing the human-readable message.
#[derive(Error, Debug)]
pub enum NetForgeError {
    /// An intent field lies outside its documented domain.
    #[error("Invalid intent: {0}")]
    InvalidIntent(String),
    /// The requested pattern and redundancy cannot be met within the
    /// pattern's link budget.
    #[error("Pattern `{pattern}` cannot reach {target} edge-disjoint paths within its link budget")]
    Unsatisfiable {
        /// The pattern that was synthesized
        pattern: String,
        /// The edge-disjoint path target that could not be reached
        target: usize,
    },
    /// Hub-and-spoke with a single hub cannot eliminate the hub as a SPOF.
    #[error("hub-spoke with redundancy below `standard` cannot eliminate the hub as a single point of failure")]
    SpofUnavoidable,
    /// The address allocator ran out of /30 subnets.
    #[error("link address space exhausted")]
    AddressSpaceExhausted,
    /// A stage exceeded its deadline.
    #[error("stage `{0}` exceeded its deadline")]
    StageTimeout(Stage),
    /// The history store failed to read or write.
    #[error("persistence error: {0}")]
    PersistenceError(String),
    /// The pipeline was cancelled at a stage boundary.
    #[error("pipeline cancelled before stage `{0}`")]
    Cancelled(Stage),
    /// A device name is not present in the topology.
    #[error("device `{0}` was not found in the topology")]
    DeviceNotFound(String),
    /// A device with the same name already exists.
    #[error("device `{0}` already exists in the topology")]
    DuplicateDevice(String),
    /// No link exists between the two named devices.
    #[error("link {0} -- {1} was not found in the topology")]
    LinkNotFound(String, String),
    /// An interface label is used twice on the same device.
    #[error("interface `{1}` is already in use on device `{0}`")]
    DuplicateInterface(String, String),
    /// Two links were assigned the same subnet.
    #[error("subnet {0} is assigned to more than one link")]
    DuplicateSubnet(ipnet::Ipv4Net),
    /// Json error
    #[error("{0}")]
    JsonError(Box<serde_json::Error>),
}

impl NetForgeError {
    /// The stable textual label of this error kind.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidIntent(_) => "invalid-intent",
            Self::Unsatisfiable { .. } => "unsatisfiable",
            Self::SpofUnavoidable => "spof-unavoidable",
            Self::AddressSpaceExhausted => "address-space-exhausted",
            Self::StageTimeout(_) => "stage-timeout",
            Self::PersistenceError(_) => "persistence-error",
            Self::Cancelled(_) => "cancelled",
            Self::DeviceNotFound(_) => "device-not-found",
            Self::DuplicateDevice(_) => "duplicate-device",
            Self::LinkNotFound(_, _) => "link-not-found",
            Self::DuplicateInterface(_, _) => "duplicate-interface",
            Self::DuplicateSubnet(_) => "duplicate-subnet",
            Self::JsonError(_) => "json-error",
        }
    }
}

impl From<serde_json::Error> for NetForgeError {
    fn from(value: serde_json::Error) -> Self {
        Self::JsonError(Box::new(value))
    }
}

impl From<rusqlite::Error> for NetForgeError {
    fn from(value: rusqlite::Error) -> Self {
        Self::PersistenceError(value.to_string())
    }
}

impl PartialEq for NetForgeError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidIntent(l), Self::InvalidIntent(r)) => l == r,
            (
                Self::Unsatisfiable {
                    pattern: lp,
                    target: lt,
                },
                Self::Unsatisfiable {
                    pattern: rp,
                    target: rt,
                },
            ) => lp == rp && lt == rt,
            (Self::StageTimeout(l), Self::StageTimeout(r)) => l == r,
            (Self::PersistenceError(l), Self::PersistenceError(r)) => l == r,
            (Self::Cancelled(l), Self::Cancelled(r)) => l == r,
            (Self::DeviceNotFound(l), Self::DeviceNotFound(r)) => l == r,
            (Self::DuplicateDevice(l), Self::DuplicateDevice(r)) => l == r,
            (Self::LinkNotFound(l0, l1), Self::LinkNotFound(r0, r1)) => l0 == r0 && l1 == r1,
            (Self::DuplicateInterface(l0, l1), Self::DuplicateInterface(r0, r1)) => {
                l0 == r0 && l1 == r1
            }
            (Self::DuplicateSubnet(l), Self::DuplicateSubnet(r)) => l == r,
            (Self::JsonError(l), Self::JsonError(r)) => l.to_string() == r.to_string(),
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

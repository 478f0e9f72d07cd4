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

//! # Intent parsing and normalization
//!
//! An [`IntentRequest`] is the raw, transport-facing record: every field but
//! the name is optional, and unknown fields are rejected during
//! deserialization. [`Intent::parse`] checks every supplied field against its
//! domain and fills in the documented defaults, yielding the immutable
//! [`Intent`] that the rest of the pipeline operates on.

use serde::{Deserialize, Serialize};

use crate::types::NetForgeError;

/// Lower bound on the number of sites in an intent.
pub const MIN_SITE_COUNT: usize = 2;
/// Upper bound on the number of sites in an intent.
pub const MAX_SITE_COUNT: usize = 500;

/// The six structural families the synthesizer knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// Every device pair connected by one link.
    FullMesh,
    /// One (or two, for redundant variants) hubs; all spokes home to them.
    HubSpoke,
    /// Devices on a cycle, each connected to its two neighbors.
    Ring,
    /// Hierarchical core / aggregation / access layering.
    Tree,
    /// Every leaf connected to every spine.
    LeafSpine,
    /// Leaf-spine core region with tree branch regions.
    Hybrid,
}

impl Pattern {
    /// All patterns, in their canonical order.
    pub const ALL: [Self; 6] = [
        Self::FullMesh,
        Self::HubSpoke,
        Self::Ring,
        Self::Tree,
        Self::LeafSpine,
        Self::Hybrid,
    ];

    /// The kebab-case name of the pattern, as it appears in intents and in
    /// the history store.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FullMesh => "full-mesh",
            Self::HubSpoke => "hub-spoke",
            Self::Ring => "ring",
            Self::Tree => "tree",
            Self::LeafSpine => "leaf-spine",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Pattern {
    type Err = NetForgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| NetForgeError::InvalidIntent(format!("unknown pattern `{s}`")))
    }
}

/// Redundancy level of an intent, mapped to a target count of edge-disjoint
/// paths between every device pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Redundancy {
    /// Single path suffices (target 1).
    Minimum,
    /// Two edge-disjoint paths (target 2).
    #[default]
    Standard,
    /// Three edge-disjoint paths (target 3).
    High,
    /// At least four edge-disjoint paths (target 4).
    Critical,
}

impl Redundancy {
    /// The minimum number of edge-disjoint paths this level demands.
    pub fn target_paths(&self) -> usize {
        match self {
            Self::Minimum => 1,
            Self::Standard => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }

    /// The kebab-case name stored in the history tables.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minimum => "minimum",
            Self::Standard => "standard",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Redundancy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Routing protocol tag carried by a topology. Only OSPF is synthesized; the
/// other tags are accepted and stored verbatim.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Open Shortest Path First.
    #[default]
    Ospf,
    /// Border Gateway Protocol.
    Bgp,
    /// Intermediate System to Intermediate System.
    Isis,
}

impl Protocol {
    /// The lowercase protocol tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ospf => "ospf",
            Self::Bgp => "bgp",
            Self::Isis => "isis",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Primary goal a design optimizes for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DesignGoal {
    /// Minimize link count.
    Cost,
    /// Maximize path redundancy.
    #[default]
    Redundancy,
    /// Minimize hop counts.
    Latency,
    /// Grow without redesign.
    Scalability,
}

impl DesignGoal {
    /// The lowercase name stored in the history tables.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Redundancy => "redundancy",
            Self::Latency => "latency",
            Self::Scalability => "scalability",
        }
    }
}

impl std::fmt::Display for DesignGoal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The raw intent record as received from the transport adapter.
///
/// All fields except `name` are optional. Unknown fields are rejected during
/// deserialization; the intent is a closed record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentRequest {
    /// Name of the intent (and of the synthesized topology).
    pub name: String,
    /// Requested pattern. `None` asks the advisor to recommend one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    /// Number of sites, within `[2, 500]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_count: Option<usize>,
    /// Redundancy level (default: `standard`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy: Option<Redundancy>,
    /// Diameter ceiling (positive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_hops: Option<usize>,
    /// Routing protocol (default: `ospf`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    /// Primary design goal (default: `redundancy`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_goal: Option<DesignGoal>,
    /// Whether every single point of failure must be eliminated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimize_spof: Option<bool>,
    /// Minimum number of links per site.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_connections_per_site: Option<usize>,
}

impl IntentRequest {
    /// Create a request with only the name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A normalized, immutable intent.
///
/// Created by [`Intent::parse`] and never modified afterwards. The intent is
/// stored verbatim (as JSON) alongside every record it produced, so that a
/// historical run can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Intent {
    /// Name of the intent.
    pub name: String,
    /// The requested pattern, if the caller chose one.
    pub pattern: Option<Pattern>,
    /// Number of sites.
    pub site_count: usize,
    /// Redundancy level.
    pub redundancy: Redundancy,
    /// Diameter ceiling, if any.
    pub max_hops: Option<usize>,
    /// Routing protocol.
    pub protocol: Protocol,
    /// Primary design goal.
    pub design_goal: DesignGoal,
    /// Whether SPOFs must be eliminated.
    pub minimize_spof: bool,
    /// Minimum number of links per site.
    pub min_connections_per_site: usize,
}

impl Intent {
    /// Normalize a raw request, checking every field against its domain.
    ///
    /// Returns [`NetForgeError::InvalidIntent`] naming the offending field
    /// when a value lies outside its domain. The corrective hint is part of
    /// the message, as required by the diagnostic contract.
    pub fn parse(request: &IntentRequest) -> Result<Self, NetForgeError> {
        if request.name.is_empty() {
            return Err(NetForgeError::InvalidIntent(
                "intent name must not be empty".to_string(),
            ));
        }
        let site_count = request.site_count.ok_or_else(|| {
            NetForgeError::InvalidIntent("site_count is required".to_string())
        })?;
        if !(MIN_SITE_COUNT..=MAX_SITE_COUNT).contains(&site_count) {
            return Err(NetForgeError::InvalidIntent(format!(
                "site_count {site_count} is outside [{MIN_SITE_COUNT}, {MAX_SITE_COUNT}]; \
                 adjust site_count"
            )));
        }
        if let Some(h) = request.max_hops {
            if h == 0 {
                return Err(NetForgeError::InvalidIntent(
                    "max_hops must be positive; increase max_hops".to_string(),
                ));
            }
        }
        if let Some(c) = request.min_connections_per_site {
            // more connections than other sites can never be satisfied
            if c >= site_count {
                return Err(NetForgeError::InvalidIntent(format!(
                    "min_connections_per_site {c} cannot be met with {site_count} sites; \
                     lower min_connections_per_site"
                )));
            }
        }
        Ok(Self {
            name: request.name.clone(),
            pattern: request.pattern,
            site_count,
            redundancy: request.redundancy.unwrap_or_default(),
            max_hops: request.max_hops,
            protocol: request.protocol.unwrap_or_default(),
            design_goal: request.design_goal.unwrap_or_default(),
            minimize_spof: request.minimize_spof.unwrap_or(false),
            min_connections_per_site: request.min_connections_per_site.unwrap_or(0),
        })
    }

    /// The pattern of this intent, or an `InvalidIntent` error if none was
    /// chosen and no recommendation was consulted.
    pub fn pattern_or_err(&self) -> Result<Pattern, NetForgeError> {
        self.pattern.ok_or_else(|| {
            NetForgeError::InvalidIntent(
                "no pattern chosen; set one or consult the advisor".to_string(),
            )
        })
    }

    /// Serialize the intent to its canonical JSON blob for the history store.
    pub fn to_json(&self) -> Result<String, NetForgeError> {
        Ok(serde_json::to_string(self)?)
    }
}

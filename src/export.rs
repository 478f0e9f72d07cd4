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

//! # Simulator egress
//!
//! A [`ClabTopology`] is the canonical containerlab-shaped value exported
//! for downstream lab tooling: node name to image/kind mapping plus
//! `dev:iface` endpoint pairs. Serializing it to YAML or JSON is the
//! renderer's business; this module only guarantees field-level
//! correctness.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::topology::{DeviceKind, Topology};

/// Container image used for router nodes.
pub const ROUTER_IMAGE: &str = "frrouting/frr:v8.4.0";

/// One exported node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClabNode {
    /// The containerlab node kind.
    pub kind: String,
    /// The container image, for kinds that run one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// The device's role in the topology, including the router id and AS
    /// number for routers.
    #[serde(rename = "type")]
    pub device_type: DeviceKind,
}

/// One exported link: two `device:interface` endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClabLink {
    /// The two endpoints, in link order.
    pub endpoints: [String; 2],
}

/// The node and link body of the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClabBody {
    /// All nodes, keyed by device name.
    pub nodes: BTreeMap<String, ClabNode>,
    /// All links, in creation order.
    pub links: Vec<ClabLink>,
}

/// A complete containerlab-shaped topology export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClabTopology {
    /// The lab name (the topology name).
    pub name: String,
    /// Nodes and links.
    pub topology: ClabBody,
}

impl ClabTopology {
    /// Export a topology. Routers become FRR containers, switches become
    /// bridges.
    pub fn from_topology(topo: &Topology) -> Self {
        let nodes = topo
            .devices()
            .iter()
            .map(|d| {
                let node = if d.is_router() {
                    ClabNode {
                        kind: "linux".to_string(),
                        image: Some(ROUTER_IMAGE.to_string()),
                        device_type: d.kind.clone(),
                    }
                } else {
                    ClabNode {
                        kind: "bridge".to_string(),
                        image: None,
                        device_type: d.kind.clone(),
                    }
                };
                (d.name.clone(), node)
            })
            .collect();
        let links = topo
            .links()
            .iter()
            .map(|l| ClabLink {
                endpoints: [
                    format!("{}:{}", l.a, l.a_iface),
                    format!("{}:{}", l.b, l.b_iface),
                ],
            })
            .collect();
        Self {
            name: topo.name.clone(),
            topology: ClabBody { nodes, links },
        }
    }
}

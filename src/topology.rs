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

//! # Topology data model
//!
//! A [`Topology`] owns its [`Device`]s and [`Link`]s in creation order, so
//! that iteration (and therefore serialization and replay) is deterministic.
//! The graph view used by the analyzers is derived on demand (see
//! [`crate::graph::TopoGraph`]) and owned transiently by whoever holds it.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::intent::Protocol;
use crate::types::{AsId, LinkCost, NetForgeError};

/// The kind of a device. Fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// A layer-3 router participating in the routing protocol.
    Router {
        /// The (unique) router identifier used by OSPF.
        router_id: Ipv4Addr,
        /// The autonomous-system number.
        as_id: AsId,
    },
    /// A layer-2 switch. Carries no router id.
    Switch,
}

/// A network device, identified by a name unique within its topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Unique device name.
    pub name: String,
    /// Router or switch.
    pub kind: DeviceKind,
}

impl Device {
    /// Create a new router device.
    pub fn router(name: impl Into<String>, router_id: Ipv4Addr, as_id: AsId) -> Self {
        Self {
            name: name.into(),
            kind: DeviceKind::Router { router_id, as_id },
        }
    }

    /// Create a new switch device.
    pub fn switch(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: DeviceKind::Switch,
        }
    }

    /// The router id, if this device is a router.
    pub fn router_id(&self) -> Option<Ipv4Addr> {
        match &self.kind {
            DeviceKind::Router { router_id, .. } => Some(*router_id),
            DeviceKind::Switch => None,
        }
    }

    /// Whether this device is a router.
    pub fn is_router(&self) -> bool {
        matches!(self.kind, DeviceKind::Router { .. })
    }
}

/// An undirected link between two distinct devices.
///
/// The two endpoint addresses are drawn from the same /30 subnet; no two
/// links of a topology share a subnet. Parallel links between the same
/// device pair are allowed as long as both endpoints use distinct
/// interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// Name of the first endpoint device.
    pub a: String,
    /// Name of the second endpoint device.
    pub b: String,
    /// Interface label on the first endpoint.
    pub a_iface: String,
    /// Interface label on the second endpoint.
    pub b_iface: String,
    /// IP address of the first endpoint.
    pub a_addr: Ipv4Addr,
    /// IP address of the second endpoint.
    pub b_addr: Ipv4Addr,
    /// The /30 subnet both addresses are drawn from.
    pub subnet: Ipv4Net,
    /// OSPF metric of the link.
    pub cost: LinkCost,
}

impl Link {
    /// The endpoint pair in lexicographic order, used as a canonical key.
    pub fn endpoints(&self) -> (&str, &str) {
        if self.a <= self.b {
            (&self.a, &self.b)
        } else {
            (&self.b, &self.a)
        }
    }

    /// Whether this link touches the given device.
    pub fn touches(&self, device: &str) -> bool {
        self.a == device || self.b == device
    }

    /// Given one endpoint name, return the other one.
    pub fn other(&self, device: &str) -> Option<&str> {
        if self.a == device {
            Some(&self.b)
        } else if self.b == device {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// A named set of devices and links with a routing protocol tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    /// Name of the topology.
    pub name: String,
    /// The routing protocol tag.
    pub protocol: Protocol,
    /// All devices, in creation order.
    devices: Vec<Device>,
    /// All links, in creation order.
    links: Vec<Link>,
    /// Device name to index into `devices`.
    #[serde(skip)]
    index: HashMap<String, usize>,
    /// Occupied (device, interface) pairs.
    #[serde(skip)]
    iface_index: HashSet<(String, String)>,
    /// Assigned link subnets.
    #[serde(skip)]
    subnet_index: HashSet<Ipv4Net>,
}

impl PartialEq for Topology {
    /// Topologies compare by content; the derived lookup indexes are
    /// ignored (they are empty on freshly deserialized values).
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.protocol == other.protocol
            && self.devices == other.devices
            && self.links == other.links
    }
}

impl Topology {
    /// Create an empty topology.
    pub fn new(name: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            name: name.into(),
            protocol,
            devices: Vec::new(),
            links: Vec::new(),
            index: HashMap::new(),
            iface_index: HashSet::new(),
            subnet_index: HashSet::new(),
        }
    }

    /// Add a device. Fails if a device with the same name already exists.
    pub fn add_device(&mut self, device: Device) -> Result<(), NetForgeError> {
        if self.index.contains_key(&device.name) {
            return Err(NetForgeError::DuplicateDevice(device.name));
        }
        self.index.insert(device.name.clone(), self.devices.len());
        self.devices.push(device);
        Ok(())
    }

    /// Add a link between two existing, distinct devices.
    ///
    /// Checks that both endpoints exist, that the interface labels are not
    /// yet in use on their devices, and that the subnet is not yet assigned.
    pub fn add_link(&mut self, link: Link) -> Result<(), NetForgeError> {
        if link.a == link.b {
            return Err(NetForgeError::InvalidIntent(format!(
                "link endpoints must be distinct devices (got `{}` twice)",
                link.a
            )));
        }
        for name in [&link.a, &link.b] {
            if !self.index.contains_key(name) {
                return Err(NetForgeError::DeviceNotFound(name.clone()));
            }
        }
        for (dev, iface) in [(&link.a, &link.a_iface), (&link.b, &link.b_iface)] {
            if self.iface_index.contains(&(dev.clone(), iface.clone())) {
                return Err(NetForgeError::DuplicateInterface(dev.clone(), iface.clone()));
            }
        }
        if self.subnet_index.contains(&link.subnet) {
            return Err(NetForgeError::DuplicateSubnet(link.subnet));
        }
        self.iface_index
            .insert((link.a.clone(), link.a_iface.clone()));
        self.iface_index
            .insert((link.b.clone(), link.b_iface.clone()));
        self.subnet_index.insert(link.subnet);
        self.links.push(link);
        Ok(())
    }

    /// All devices, in creation order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// All links, in creation order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Number of devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Number of links.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Look up a device by name.
    pub fn get_device(&self, name: &str) -> Option<&Device> {
        self.index.get(name).map(|i| &self.devices[*i])
    }

    /// Whether a device with this name exists.
    pub fn has_device(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// The degree (number of incident links) of a device.
    pub fn degree(&self, name: &str) -> usize {
        self.links.iter().filter(|l| l.touches(name)).count()
    }

    /// Whether the two named devices are connected by at least one link.
    pub fn adjacent(&self, a: &str, b: &str) -> bool {
        self.links
            .iter()
            .any(|l| (l.a == a && l.b == b) || (l.a == b && l.b == a))
    }

    /// Mean device degree, `2|E| / |V|`.
    pub fn avg_degree(&self) -> f64 {
        if self.devices.is_empty() {
            0.0
        } else {
            2.0 * self.links.len() as f64 / self.devices.len() as f64
        }
    }

    /// Rebuild the lookup indexes after deserialization.
    ///
    /// `serde` skips them; call this once on a freshly deserialized
    /// topology before adding devices or links to it.
    pub fn reindex(&mut self) {
        self.index = self
            .devices
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        self.iface_index = self
            .links
            .iter()
            .flat_map(|l| {
                [
                    (l.a.clone(), l.a_iface.clone()),
                    (l.b.clone(), l.b_iface.clone()),
                ]
            })
            .collect();
        self.subnet_index = self.links.iter().map(|l| l.subnet).collect();
    }

    /// Verify the structural invariants that must hold after synthesis:
    ///
    /// 1. every link endpoint references an existing device,
    /// 2. each link's two addresses share its /30, and subnets are pairwise
    ///    disjoint,
    /// 3. router ids are unique across all routers,
    /// 4. interface labels are unique within a single device.
    ///
    /// Connectivity (a single connected component) is a graph property and
    /// is checked by [`crate::graph::TopoGraph::is_connected`].
    pub fn verify(&self) -> Result<(), NetForgeError> {
        let mut subnets: HashSet<Ipv4Net> = HashSet::new();
        let mut interfaces: HashSet<(&str, &str)> = HashSet::new();
        for link in &self.links {
            for name in [&link.a, &link.b] {
                if !self.index.contains_key(name) {
                    return Err(NetForgeError::DeviceNotFound(name.clone()));
                }
            }
            if !(link.subnet.contains(&link.a_addr) && link.subnet.contains(&link.b_addr)) {
                return Err(NetForgeError::InvalidIntent(format!(
                    "link {} -- {}: addresses are not in subnet {}",
                    link.a, link.b, link.subnet
                )));
            }
            if !subnets.insert(link.subnet) {
                return Err(NetForgeError::DuplicateSubnet(link.subnet));
            }
            if !interfaces.insert((&link.a, &link.a_iface)) {
                return Err(NetForgeError::DuplicateInterface(
                    link.a.clone(),
                    link.a_iface.clone(),
                ));
            }
            if !interfaces.insert((&link.b, &link.b_iface)) {
                return Err(NetForgeError::DuplicateInterface(
                    link.b.clone(),
                    link.b_iface.clone(),
                ));
            }
        }
        let mut router_ids: HashSet<Ipv4Addr> = HashSet::new();
        for device in &self.devices {
            if let Some(rid) = device.router_id() {
                if !router_ids.insert(rid) {
                    return Err(NetForgeError::InvalidIntent(format!(
                        "router id {rid} is assigned to more than one router"
                    )));
                }
            }
        }
        Ok(())
    }
}

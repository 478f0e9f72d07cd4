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

use std::collections::HashMap;

use crate::addressing::Addressor;
use crate::intent::{Intent, IntentRequest, Pattern, Protocol, Redundancy};
use crate::topology::{Device, Link, Topology};
use crate::types::AsId;

mod test_addressing;
mod test_builder;
mod test_history;
mod test_simulator;
mod test_validator;

/// Build a topology with the given routers and links, with addresses and
/// interfaces assigned the way the synthesizer assigns them.
pub(crate) fn build_topo(name: &str, nodes: &[&str], edges: &[(&str, &str)]) -> Topology {
    let mut topo = Topology::new(name, Protocol::Ospf);
    for (i, n) in nodes.iter().enumerate() {
        topo.add_device(Device::router(*n, Addressor::router_id(i), AsId(65535)))
            .unwrap();
    }
    let mut addr = Addressor::default();
    let mut ifaces: HashMap<String, usize> = HashMap::new();
    for (a, b) in edges {
        let subnet = addr.next_link_subnet().unwrap();
        let (a_addr, b_addr) = Addressor::link_addrs(subnet);
        let mut iface = |d: &str| {
            let n = ifaces.entry(d.to_string()).or_insert(0);
            let label = format!("eth{n}");
            *n += 1;
            label
        };
        let link = Link {
            a: a.to_string(),
            b: b.to_string(),
            a_iface: iface(a),
            b_iface: iface(b),
            a_addr,
            b_addr,
            subnet,
            cost: 10,
        };
        topo.add_link(link).unwrap();
    }
    topo
}

pub(crate) fn request(name: &str, pattern: Pattern, sites: usize) -> IntentRequest {
    IntentRequest {
        name: name.to_string(),
        pattern: Some(pattern),
        site_count: Some(sites),
        ..Default::default()
    }
}

pub(crate) fn intent(
    name: &str,
    pattern: Pattern,
    sites: usize,
    redundancy: Redundancy,
) -> Intent {
    let mut r = request(name, pattern, sites);
    r.redundancy = Some(redundancy);
    Intent::parse(&r).unwrap()
}

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

//! # IP address allocation
//!
//! The [`Addressor`] hands out one /30 subnet per point-to-point link from a
//! private range (default `10.100.0.0/16`), and derives router identifiers
//! deterministically from the router's creation index. Replaying a synthesis
//! with identical inputs consumes the iterator in the same order and
//! therefore yields identical addresses.

use std::net::Ipv4Addr;

use ipnet::{Ipv4Net, Ipv4Subnets};
use lazy_static::lazy_static;

use crate::types::NetForgeError;

lazy_static! {
    /// The default address range for point-to-point link subnets.
    pub static ref DEFAULT_LINK_RANGE: Ipv4Net = "10.100.0.0/16".parse().unwrap();
}

/// Prefix length of every link subnet.
pub const LINK_PREFIX_LEN: u8 = 30;

/// Allocator for link subnets and router identifiers.
///
/// The allocator maintains a monotonically advancing pointer into the link
/// range; subnets are never reused within one allocator.
#[derive(Debug, Clone)]
pub struct Addressor {
    range: Ipv4Net,
    subnets: Ipv4Subnets,
}

impl Default for Addressor {
    fn default() -> Self {
        Self::new(*DEFAULT_LINK_RANGE)
    }
}

impl Addressor {
    /// Create an allocator over the given link range.
    pub fn new(range: Ipv4Net) -> Self {
        Self {
            range,
            subnets: range.subnets(LINK_PREFIX_LEN).unwrap_or_else(|_| {
                // a range narrower than /30 yields no subnets at all
                Ipv4Subnets::new(range.addr(), range.addr(), LINK_PREFIX_LEN)
            }),
        }
    }

    /// The range this allocator draws from.
    pub fn range(&self) -> Ipv4Net {
        self.range
    }

    /// The next unused /30 link subnet.
    pub fn next_link_subnet(&mut self) -> Result<Ipv4Net, NetForgeError> {
        self.subnets
            .next()
            .ok_or(NetForgeError::AddressSpaceExhausted)
    }

    /// The two usable host addresses of a /30 link subnet, in order.
    pub fn link_addrs(subnet: Ipv4Net) -> (Ipv4Addr, Ipv4Addr) {
        let base = u32::from(subnet.network());
        (Ipv4Addr::from(base + 1), Ipv4Addr::from(base + 2))
    }

    /// The deterministic router identifier of the router with creation index
    /// `index`: `10.<index>.1.1` (continuing monotonically past index 255).
    pub fn router_id(index: usize) -> Ipv4Addr {
        let base = u32::from(Ipv4Addr::new(10, 0, 1, 1));
        Ipv4Addr::from(base + ((index as u32) << 16))
    }

    /// The OSPF wildcard for a subnet mask (its bitwise complement).
    pub fn wildcard(mask: Ipv4Addr) -> Ipv4Addr {
        Ipv4Addr::from(!u32::from(mask))
    }
}

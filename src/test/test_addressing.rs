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

use std::net::Ipv4Addr;

use crate::addressing::Addressor;
use crate::types::NetForgeError;

#[test]
fn link_subnets_advance_monotonically() {
    let mut addr = Addressor::default();
    assert_eq!(
        addr.next_link_subnet().unwrap(),
        "10.100.0.0/30".parse().unwrap()
    );
    assert_eq!(
        addr.next_link_subnet().unwrap(),
        "10.100.0.4/30".parse().unwrap()
    );
    assert_eq!(
        addr.next_link_subnet().unwrap(),
        "10.100.0.8/30".parse().unwrap()
    );
}

#[test]
fn link_subnets_are_deterministic() {
    let seq = |mut a: Addressor| -> Vec<_> {
        (0..32).map(|_| a.next_link_subnet().unwrap()).collect()
    };
    assert_eq!(seq(Addressor::default()), seq(Addressor::default()));
}

#[test]
fn link_addrs_are_the_two_hosts() {
    let subnet = "10.100.0.4/30".parse().unwrap();
    let (a, b) = Addressor::link_addrs(subnet);
    assert_eq!(a, Ipv4Addr::new(10, 100, 0, 5));
    assert_eq!(b, Ipv4Addr::new(10, 100, 0, 6));
}

#[test]
fn router_ids_follow_the_creation_index() {
    assert_eq!(Addressor::router_id(0), Ipv4Addr::new(10, 0, 1, 1));
    assert_eq!(Addressor::router_id(1), Ipv4Addr::new(10, 1, 1, 1));
    assert_eq!(Addressor::router_id(255), Ipv4Addr::new(10, 255, 1, 1));
    // past 255 the id keeps advancing instead of wrapping
    assert_eq!(Addressor::router_id(256), Ipv4Addr::new(11, 0, 1, 1));
    assert_ne!(Addressor::router_id(499), Addressor::router_id(243));
}

#[test]
fn wildcard_is_the_mask_complement() {
    assert_eq!(
        Addressor::wildcard(Ipv4Addr::new(255, 255, 255, 252)),
        Ipv4Addr::new(0, 0, 0, 3)
    );
    assert_eq!(
        Addressor::wildcard(Ipv4Addr::new(255, 255, 0, 0)),
        Ipv4Addr::new(0, 0, 255, 255)
    );
}

#[test]
fn exhaustion_is_reported() {
    // a /29 holds exactly two /30 subnets
    let mut addr = Addressor::new("10.100.0.0/29".parse().unwrap());
    assert!(addr.next_link_subnet().is_ok());
    assert!(addr.next_link_subnet().is_ok());
    assert_eq!(
        addr.next_link_subnet().unwrap_err(),
        NetForgeError::AddressSpaceExhausted
    );
}

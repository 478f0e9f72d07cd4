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

//! # Topology synthesis
//!
//! [`synthesize`] builds a [`Topology`] from an [`Intent`]: first the bare
//! structural pattern, then a pass that raises per-device connectivity to
//! `min_connections_per_site`, then a redundancy-augmentation loop that adds
//! links along minimum cuts until every device pair has at least
//! `redundancy.target_paths()` edge-disjoint paths, or the pattern's link
//! budget is reached (in which case synthesis fails with
//! [`NetForgeError::Unsatisfiable`] rather than silently relaxing the
//! target).
//!
//! All devices are created in a fixed, documented order and all addresses
//! are drawn from a fresh [`Addressor`], so the same intent and seed always
//! produce the identical topology, link for link and address for address.

use std::collections::HashMap;

use log::{debug, trace};
use rand::prelude::*;

use crate::addressing::Addressor;
use crate::graph::TopoGraph;
use crate::intent::{Intent, Pattern, Redundancy};
use crate::topology::{Device, Link, Topology};
use crate::types::{AsId, DeviceId, LinkCost, NetForgeError};

/// The AS number of the synthesized routing domain.
pub const INTERNAL_AS: AsId = AsId(65535);

/// Default OSPF cost of an intra-pattern link.
pub const DEFAULT_COST: LinkCost = 10;
/// OSPF cost of hybrid inter-region links.
pub const INTER_REGION_COST: LinkCost = 20;

/// The link budget of a pattern, as a multiplier on the bare pattern's link
/// count. Redundancy augmentation never grows a topology past
/// `ceil(base * multiplier)` links.
fn budget_multiplier(pattern: Pattern) -> f64 {
    match pattern {
        // a full mesh is already maximal; headroom only for parallel links
        Pattern::FullMesh => 1.25,
        Pattern::HubSpoke => 2.0,
        Pattern::Ring => 2.0,
        Pattern::Tree => 1.5,
        Pattern::LeafSpine => 1.5,
        Pattern::Hybrid => 1.5,
    }
}

/// Synthesize a topology for the given intent.
///
/// The intent must carry a pattern (consult the advisor first if it does
/// not). If `seed` is given, every pseudorandom choice is derived from it;
/// unseeded calls draw a seed from entropy and then follow the same code
/// path, so the structural invariants hold either way.
pub fn synthesize(intent: &Intent, seed: Option<u64>) -> Result<Topology, NetForgeError> {
    let pattern = intent.pattern_or_err()?;
    let seed = seed.unwrap_or_else(|| thread_rng().gen());
    debug!(
        "synthesizing `{}`: pattern {pattern}, {} sites, seed {seed}",
        intent.name, intent.site_count
    );

    let mut ctx = Ctx::new(&intent.name, intent, seed);
    match pattern {
        Pattern::FullMesh => build_full_mesh(&mut ctx)?,
        Pattern::HubSpoke => build_hub_spoke(&mut ctx)?,
        Pattern::Ring => build_ring(&mut ctx)?,
        Pattern::Tree => {
            let site_count = ctx.intent.site_count;
            build_tree(&mut ctx, "", site_count)?
        }
        Pattern::LeafSpine => build_leaf_spine(&mut ctx)?,
        Pattern::Hybrid => build_hybrid(&mut ctx)?,
    }

    let budget = (ctx.topo.link_count() as f64 * budget_multiplier(pattern)).ceil() as usize;
    ensure_min_connections(&mut ctx, budget)?;
    augment_redundancy(&mut ctx, pattern, budget)?;

    ctx.topo.verify()?;
    debug_assert!(TopoGraph::from_topology(&ctx.topo).is_connected());
    Ok(ctx.topo)
}

/// Shared synthesis state: the topology under construction, the address
/// allocator, per-device interface counters, and the seeded rng.
struct Ctx<'a> {
    topo: Topology,
    intent: &'a Intent,
    addr: Addressor,
    ifaces: HashMap<String, usize>,
    router_count: usize,
    rng: StdRng,
}

impl<'a> Ctx<'a> {
    fn new(name: &str, intent: &'a Intent, seed: u64) -> Self {
        Self {
            topo: Topology::new(name, intent.protocol),
            intent,
            addr: Addressor::default(),
            ifaces: HashMap::new(),
            router_count: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Add a router. Router ids follow the creation index.
    fn router(&mut self, name: impl Into<String>) -> Result<String, NetForgeError> {
        let name = name.into();
        let rid = Addressor::router_id(self.router_count);
        self.topo
            .add_device(Device::router(name.clone(), rid, INTERNAL_AS))?;
        self.router_count += 1;
        Ok(name)
    }

    /// Add a layer-2 switch.
    fn switch(&mut self, name: impl Into<String>) -> Result<String, NetForgeError> {
        let name = name.into();
        self.topo.add_device(Device::switch(name.clone()))?;
        Ok(name)
    }

    /// The next free interface label of a device (`eth0`, `eth1`, ...).
    fn next_iface(&mut self, device: &str) -> String {
        let n = self.ifaces.entry(device.to_string()).or_insert(0);
        let label = format!("eth{n}");
        *n += 1;
        label
    }

    /// Connect two devices with a fresh /30.
    fn connect(&mut self, a: &str, b: &str, cost: LinkCost) -> Result<(), NetForgeError> {
        let subnet = self.addr.next_link_subnet()?;
        let (a_addr, b_addr) = Addressor::link_addrs(subnet);
        let link = Link {
            a: a.to_string(),
            b: b.to_string(),
            a_iface: self.next_iface(a),
            b_iface: self.next_iface(b),
            a_addr,
            b_addr,
            subnet,
            cost,
        };
        trace!("link {a} -- {b} on {subnet}");
        self.topo.add_link(link)
    }
}

/// `R1 .. Rn`, every pair connected.
fn build_full_mesh(ctx: &mut Ctx<'_>) -> Result<(), NetForgeError> {
    let n = ctx.intent.site_count;
    let names: Vec<String> = (1..=n)
        .map(|i| ctx.router(format!("R{i}")))
        .collect::<Result<_, _>>()?;
    for i in 0..n {
        for j in (i + 1)..n {
            ctx.connect(&names[i], &names[j], DEFAULT_COST)?;
        }
    }
    Ok(())
}

/// One hub (`HUB1`) with every spoke homed to it. When the intent requires
/// SPOF elimination, a second hub is added and every spoke dual-homes;
/// without at least `standard` redundancy that is impossible and synthesis
/// fails with [`NetForgeError::SpofUnavoidable`].
fn build_hub_spoke(ctx: &mut Ctx<'_>) -> Result<(), NetForgeError> {
    let n = ctx.intent.site_count;
    let dual = if ctx.intent.minimize_spof {
        if ctx.intent.redundancy < Redundancy::Standard {
            return Err(NetForgeError::SpofUnavoidable);
        }
        true
    } else {
        false
    };
    let hubs = if dual && n > 2 { 2 } else { 1 };
    let mut hub_names = Vec::new();
    for i in 1..=hubs {
        hub_names.push(ctx.router(format!("HUB{i}"))?);
    }
    if hubs == 2 {
        ctx.connect(&hub_names[0], &hub_names[1], DEFAULT_COST)?;
    }
    for i in 1..=(n - hubs) {
        let spoke = ctx.router(format!("SPOKE{i}"))?;
        for hub in &hub_names {
            ctx.connect(hub, &spoke, DEFAULT_COST)?;
        }
    }
    Ok(())
}

/// `R1 .. Rn` on a cycle. With two sites the ring collapses to a single
/// link. With `high` or better redundancy, chord links connect diametrically
/// opposite devices.
fn build_ring(ctx: &mut Ctx<'_>) -> Result<(), NetForgeError> {
    let n = ctx.intent.site_count;
    let names: Vec<String> = (1..=n)
        .map(|i| ctx.router(format!("R{i}")))
        .collect::<Result<_, _>>()?;
    if n == 2 {
        return ctx.connect(&names[0], &names[1], DEFAULT_COST);
    }
    for i in 0..n {
        ctx.connect(&names[i], &names[(i + 1) % n], DEFAULT_COST)?;
    }
    if ctx.intent.redundancy >= Redundancy::High && n >= 5 {
        for i in 0..(n / 2) {
            let j = i + n / 2;
            if !ctx.topo.adjacent(&names[i], &names[j]) {
                ctx.connect(&names[i], &names[j], DEFAULT_COST)?;
            }
        }
    }
    Ok(())
}

/// Hierarchical core / aggregation / access tree. `prefix` namespaces the
/// devices so the builder can be reused for hybrid branch regions.
///
/// Sizing: one core router (two from `standard` redundancy upwards, or when
/// SPOFs must die), one aggregation router per five remaining sites, the
/// rest access switches. Aggregation dual-homes to both cores from
/// `standard` upwards; access dual-homes only when SPOFs must die.
fn build_tree(ctx: &mut Ctx<'_>, prefix: &str, n: usize) -> Result<(), NetForgeError> {
    let redundant = ctx.intent.redundancy >= Redundancy::Standard || ctx.intent.minimize_spof;
    let cores = if redundant { 2.min(n) } else { 1 };
    let remaining = n - cores;
    let aggs = if remaining == 0 {
        0
    } else {
        let min_aggs = if ctx.intent.minimize_spof { 2 } else { 1 };
        (remaining.div_ceil(5)).max(min_aggs).min(remaining)
    };
    let access = remaining - aggs;

    let core_names: Vec<String> = (1..=cores)
        .map(|i| ctx.router(format!("{prefix}CORE{i}")))
        .collect::<Result<_, _>>()?;
    if cores == 2 {
        ctx.connect(&core_names[0], &core_names[1], DEFAULT_COST)?;
    }

    let agg_names: Vec<String> = (1..=aggs)
        .map(|i| ctx.router(format!("{prefix}AGG{i}")))
        .collect::<Result<_, _>>()?;
    for (i, agg) in agg_names.iter().enumerate() {
        if redundant && cores == 2 {
            ctx.connect(&core_names[0], agg, DEFAULT_COST)?;
            ctx.connect(&core_names[1], agg, DEFAULT_COST)?;
        } else {
            ctx.connect(&core_names[i % cores], agg, DEFAULT_COST)?;
        }
    }

    for i in 1..=access {
        let acc = ctx.switch(format!("{prefix}ACC{i}"))?;
        let parents = if agg_names.is_empty() {
            &core_names
        } else {
            &agg_names
        };
        ctx.connect(&parents[(i - 1) % parents.len()], &acc, DEFAULT_COST)?;
        if ctx.intent.minimize_spof && parents.len() > 1 {
            ctx.connect(&parents[i % parents.len()], &acc, DEFAULT_COST)?;
        }
    }
    Ok(())
}

/// The number of spines for a leaf-spine split of `n` total sites:
/// `clamp(floor(sqrt(n)), 2, n - 2)`, degenerating to a single spine below
/// four sites.
fn leaf_spine_split(n: usize) -> (usize, usize) {
    if n < 4 {
        return (1, n - 1);
    }
    let spines = ((n as f64).sqrt().floor() as usize).clamp(2, n - 2);
    (spines, n - spines)
}

/// `SPINE1 .. SPINEs` and `LEAF1 .. LEAFl`, every leaf connected to every
/// spine, spines not interconnected.
fn build_leaf_spine(ctx: &mut Ctx<'_>) -> Result<(), NetForgeError> {
    let (spines, leaves) = leaf_spine_split(ctx.intent.site_count);
    let spine_names: Vec<String> = (1..=spines)
        .map(|i| ctx.router(format!("SPINE{i}")))
        .collect::<Result<_, _>>()?;
    for i in 1..=leaves {
        let leaf = ctx.router(format!("LEAF{i}"))?;
        for spine in &spine_names {
            ctx.connect(spine, &leaf, DEFAULT_COST)?;
        }
    }
    Ok(())
}

/// The number of spines for a fixed leaf count:
/// `clamp(ceil(sqrt(2 * leaves)), 2, leaves)`.
fn spines_for_leaves(leaves: usize) -> usize {
    ((2.0 * leaves as f64).sqrt().ceil() as usize).clamp(2, leaves)
}

/// Leaf-spine core region plus tree branch regions, with inter-region links
/// following the redundancy target.
fn build_hybrid(ctx: &mut Ctx<'_>) -> Result<(), NetForgeError> {
    let n = ctx.intent.site_count;
    if n < 8 {
        // too small to partition into regions
        return build_leaf_spine(ctx);
    }
    let core_n = (2 * n / 5).max(4);

    // size the core by the fixed-leaf-count rule where it is consistent,
    // falling back to the total-count split
    let spines = (2..core_n.saturating_sub(1))
        .find(|&s| {
            let leaves = core_n - s;
            s == spines_for_leaves(leaves)
        })
        .unwrap_or_else(|| leaf_spine_split(core_n).0);
    let leaves = core_n - spines;

    let spine_names: Vec<String> = (1..=spines)
        .map(|i| ctx.router(format!("SPINE{i}")))
        .collect::<Result<_, _>>()?;
    let leaf_names: Vec<String> = (1..=leaves)
        .map(|i| ctx.router(format!("LEAF{i}")))
        .collect::<Result<_, _>>()?;
    for leaf in &leaf_names {
        for spine in &spine_names {
            ctx.connect(spine, leaf, DEFAULT_COST)?;
        }
    }

    // split the rest into branch regions of at most six sites; the rng
    // decides which regions absorb the remainder sites
    let rest = n - core_n;
    let region_count = rest.div_ceil(6).max(1);
    let mut sizes = vec![rest / region_count; region_count];
    let mut leftover = rest - sizes.iter().sum::<usize>();
    while leftover > 0 {
        let r = ctx.rng.gen_range(0..region_count);
        sizes[r] += 1;
        leftover -= 1;
    }

    let min_uplinks = if ctx.intent.minimize_spof { 2 } else { 1 };
    let uplinks = ctx
        .intent
        .redundancy
        .target_paths()
        .max(min_uplinks)
        .clamp(1, leaf_names.len());
    for (r, &size) in sizes.iter().enumerate().filter(|(_, s)| **s > 0) {
        let prefix = format!("B{}", r + 1);
        let branch_cores: Vec<String> = if size == 1 {
            vec![ctx.router(format!("{prefix}CORE1"))?]
        } else {
            build_tree(ctx, &prefix, size)?;
            ctx.topo
                .devices()
                .iter()
                .map(|d| d.name.clone())
                .filter(|name| name.starts_with(&prefix) && name.contains("CORE"))
                .collect()
        };
        for (c, core) in branch_cores.iter().enumerate() {
            for k in 0..uplinks {
                let leaf = &leaf_names[(r + c + k) % leaf_names.len()];
                if !ctx.topo.adjacent(core, leaf) {
                    ctx.connect(leaf, core, INTER_REGION_COST)?;
                }
            }
        }
    }
    Ok(())
}

/// Raise every device's degree to `min_connections_per_site` by linking it
/// to the lowest-degree device it is not yet adjacent to (ties broken by
/// name).
fn ensure_min_connections(ctx: &mut Ctx<'_>, budget: usize) -> Result<(), NetForgeError> {
    let want = ctx.intent.min_connections_per_site;
    if want == 0 {
        return Ok(());
    }
    loop {
        let deficient: Option<String> = ctx
            .topo
            .devices()
            .iter()
            .map(|d| d.name.clone())
            .filter(|name| ctx.topo.degree(name) < want)
            .min();
        let Some(name) = deficient else {
            return Ok(());
        };
        if ctx.topo.link_count() >= budget {
            return Err(NetForgeError::Unsatisfiable {
                pattern: ctx.intent.pattern_or_err()?.name().to_string(),
                target: want,
            });
        }
        let partner = ctx
            .topo
            .devices()
            .iter()
            .map(|d| d.name.clone())
            .filter(|other| *other != name && !ctx.topo.adjacent(&name, other))
            .min_by_key(|other| (ctx.topo.degree(other), other.clone()));
        match partner {
            Some(partner) => ctx.connect(&name, &partner, DEFAULT_COST)?,
            // everything is adjacent already; fall back to a parallel link
            None => {
                let partner = ctx
                    .topo
                    .devices()
                    .iter()
                    .map(|d| d.name.clone())
                    .filter(|other| *other != name)
                    .min()
                    .ok_or_else(|| NetForgeError::DeviceNotFound(name.clone()))?;
                ctx.connect(&name, &partner, DEFAULT_COST)?;
            }
        }
    }
}

/// Whether an augmentation link between the two named devices keeps the
/// pattern's structure intact.
fn augment_pair_ok(pattern: Pattern, a: &str, b: &str) -> bool {
    match pattern {
        // leaf-spine must stay complete-bipartite
        Pattern::LeafSpine => {
            (a.starts_with("SPINE") && b.starts_with("LEAF"))
                || (a.starts_with("LEAF") && b.starts_with("SPINE"))
        }
        _ => true,
    }
}

/// Add redundancy links until every device pair has at least the target
/// number of edge-disjoint paths, or the budget is exhausted.
///
/// By Menger, the minimum pairwise edge-disjoint-path count equals the
/// global minimum edge cut, which is found by fixing the first device and
/// scanning everyone else. All pairs across that minimum cut share the
/// lowest edge-disjoint-path count; among those admissible pairs the link
/// is chosen by, in order:
///
/// 1. pairs that are not yet adjacent,
/// 2. pairs whose two endpoints are both still below the target (one link
///    then lifts two deficient devices at once),
/// 3. pairs that share a neighbor (keeps the new wiring local),
/// 4. lexicographic order of the device names.
fn augment_redundancy(
    ctx: &mut Ctx<'_>,
    pattern: Pattern,
    budget: usize,
) -> Result<(), NetForgeError> {
    let target = ctx.intent.redundancy.target_paths();
    if ctx.topo.device_count() < 2 || target <= 1 {
        return Ok(());
    }
    loop {
        let graph = TopoGraph::from_topology(&ctx.topo);
        let nodes = graph.nodes();
        let u0 = nodes[0];
        let mut paths_to: Vec<usize> = vec![usize::MAX; nodes.len()];
        let mut worst: Option<(usize, DeviceId)> = None;
        for &v in nodes.iter().skip(1) {
            let paths = graph.edge_disjoint_paths_capped(u0, v, target);
            paths_to[v.index()] = paths;
            let better = match worst {
                None => true,
                Some((w, wv)) => paths < w || (paths == w && graph.name(v) < graph.name(wv)),
            };
            if better {
                worst = Some((paths, v));
            }
        }
        let Some((lowest, vmin)) = worst else {
            return Ok(());
        };
        if lowest >= target {
            return Ok(());
        }
        if ctx.topo.link_count() >= budget {
            debug!(
                "budget of {budget} links reached at {lowest} edge-disjoint paths \
                 (target {target})"
            );
            return Err(NetForgeError::Unsatisfiable {
                pattern: pattern.name().to_string(),
                target,
            });
        }

        let (_, src_side) = graph.min_cut_partition(u0, vmin);
        let neighbor_sets: Vec<std::collections::HashSet<&str>> = nodes
            .iter()
            .map(|&u| graph.neighbors(graph.name(u)).into_iter().collect())
            .collect();
        let mut best: Option<(bool, bool, bool, String, String)> = None;
        for &a in &nodes {
            if !src_side[a.index()] {
                continue;
            }
            for &b in &nodes {
                if src_side[b.index()] {
                    continue;
                }
                let (an, bn) = (graph.name(a), graph.name(b));
                let (x, y) = if an <= bn { (an, bn) } else { (bn, an) };
                if !augment_pair_ok(pattern, x, y) {
                    continue;
                }
                let lifts_two = paths_to[a.index()] < target && paths_to[b.index()] < target;
                let no_common = neighbor_sets[a.index()]
                    .intersection(&neighbor_sets[b.index()])
                    .next()
                    .is_none();
                let key = (
                    ctx.topo.adjacent(x, y),
                    !lifts_two,
                    no_common,
                    x.to_string(),
                    y.to_string(),
                );
                if best.as_ref().map(|cur| key < *cur).unwrap_or(true) {
                    best = Some(key);
                }
            }
        }
        let Some((_, _, _, a, b)) = best else {
            return Err(NetForgeError::Unsatisfiable {
                pattern: pattern.name().to_string(),
                target,
            });
        };
        debug!("augmenting {a} -- {b} (lowest edge-disjoint count {lowest})");
        ctx.connect(&a, &b, DEFAULT_COST)?;
    }
}

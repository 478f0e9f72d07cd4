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

//! # Graph model
//!
//! [`TopoGraph`] is the transient, derived view of a [`Topology`]: an
//! undirected multigraph on petgraph, keyed by device name, with per-edge
//! cost and a back-pointer to the originating link. Nodes are inserted in
//! device order and edges in link order, so iteration (and every algorithm
//! below) is deterministic for a given topology.

use std::collections::{HashMap, VecDeque};

use petgraph::graph::{EdgeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use rand::prelude::*;

use crate::topology::Topology;
use crate::types::{DeviceId, IndexType, LinkCost};

/// Pairwise computations on graphs larger than this sample uniformly.
pub const SAMPLE_NODE_THRESHOLD: usize = 100;
/// Number of pairs sampled on large graphs.
pub const SAMPLE_PAIR_COUNT: usize = 2000;

/// Per-edge payload: the link cost and the index of the originating link in
/// the topology's link list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeMeta {
    /// OSPF metric.
    pub cost: LinkCost,
    /// Index into [`Topology::links`].
    pub link: usize,
}

/// The derived graph view of a topology.
#[derive(Debug, Clone)]
pub struct TopoGraph {
    graph: UnGraph<String, EdgeMeta, IndexType>,
    index: HashMap<String, DeviceId>,
}

impl TopoGraph {
    /// Build the graph view of a topology.
    pub fn from_topology(topo: &Topology) -> Self {
        let mut graph = UnGraph::default();
        let mut index = HashMap::with_capacity(topo.device_count());
        for device in topo.devices() {
            let id = graph.add_node(device.name.clone());
            index.insert(device.name.clone(), id);
        }
        for (i, link) in topo.links().iter().enumerate() {
            let (a, b) = (index[&link.a], index[&link.b]);
            graph.add_edge(a, b, EdgeMeta {
                cost: link.cost,
                link: i,
            });
        }
        Self { graph, index }
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The id of a named device, if present.
    pub fn id(&self, name: &str) -> Option<DeviceId> {
        self.index.get(name).copied()
    }

    /// The name of a node.
    pub fn name(&self, id: DeviceId) -> &str {
        &self.graph[id]
    }

    /// All node ids, in device order.
    pub fn nodes(&self) -> Vec<DeviceId> {
        self.graph.node_indices().collect()
    }

    /// All node names, in device order.
    pub fn names(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .map(|i| self.graph[i].as_str())
            .collect()
    }

    /// The distinct neighbors of a node, sorted by name.
    pub fn neighbors(&self, name: &str) -> Vec<&str> {
        let Some(id) = self.id(name) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors(id)
            .map(|n| self.graph[n].as_str())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// The degree of a node (parallel links count separately).
    pub fn degree(&self, id: DeviceId) -> usize {
        self.graph.edges(id).count()
    }

    /// Hop distances from `src` to every node, by breadth-first search.
    pub fn bfs_distances(&self, src: DeviceId) -> HashMap<DeviceId, usize> {
        let mut dist = HashMap::new();
        dist.insert(src, 0);
        let mut queue = VecDeque::from([src]);
        while let Some(u) = queue.pop_front() {
            let d = dist[&u];
            for v in self.graph.neighbors(u) {
                if !dist.contains_key(&v) {
                    dist.insert(v, d + 1);
                    queue.push_back(v);
                }
            }
        }
        dist
    }

    /// The shortest path (in hops) from `src` to `dst`, as an ordered node
    /// list including both endpoints, or `None` if they are disconnected.
    pub fn shortest_path(&self, src: DeviceId, dst: DeviceId) -> Option<Vec<DeviceId>> {
        if src == dst {
            return Some(vec![src]);
        }
        let mut prev: HashMap<DeviceId, DeviceId> = HashMap::new();
        let mut queue = VecDeque::from([src]);
        prev.insert(src, src);
        while let Some(u) = queue.pop_front() {
            for v in self.graph.neighbors(u) {
                if !prev.contains_key(&v) {
                    prev.insert(v, u);
                    if v == dst {
                        let mut path = vec![dst];
                        let mut cur = dst;
                        while cur != src {
                            cur = prev[&cur];
                            path.push(cur);
                        }
                        path.reverse();
                        return Some(path);
                    }
                    queue.push_back(v);
                }
            }
        }
        None
    }

    /// Like [`TopoGraph::shortest_path`], but also returns the link indices
    /// of the traversed edges (for parallel links, the first one inserted).
    pub fn shortest_path_links(
        &self,
        src: DeviceId,
        dst: DeviceId,
    ) -> Option<(Vec<DeviceId>, Vec<usize>)> {
        let path = self.shortest_path(src, dst)?;
        let mut links = Vec::with_capacity(path.len().saturating_sub(1));
        for w in path.windows(2) {
            let link = self
                .graph
                .edges(w[0])
                .filter(|e| e.source() == w[1] || e.target() == w[1])
                .map(|e| e.weight().link)
                .min()?;
            links.push(link);
        }
        Some((path, links))
    }

    /// Hop lengths of up to `k` greedily chosen edge-disjoint shortest paths
    /// between `src` and `dst`: repeatedly take a shortest path and remove
    /// its links.
    pub fn disjoint_path_lengths(&self, src: DeviceId, dst: DeviceId, k: usize) -> Vec<usize> {
        let mut lengths = Vec::new();
        let mut current = self.clone();
        for _ in 0..k {
            // node ids are stable under link removal
            let Some((path, links)) = current.shortest_path_links(src, dst) else {
                break;
            };
            lengths.push(path.len() - 1);
            current = current.without_links(&links);
        }
        lengths
    }

    /// The cheapest path from `src` to `dst` under link costs (Dijkstra), or
    /// `None` if they are disconnected.
    pub fn cheapest_path(&self, src: DeviceId, dst: DeviceId) -> Option<(Vec<DeviceId>, u64)> {
        let mut dist: HashMap<DeviceId, u64> = HashMap::new();
        let mut prev: HashMap<DeviceId, DeviceId> = HashMap::new();
        let mut heap = std::collections::BinaryHeap::new();
        dist.insert(src, 0);
        heap.push(std::cmp::Reverse((0u64, src)));
        while let Some(std::cmp::Reverse((d, u))) = heap.pop() {
            if d > *dist.get(&u).unwrap_or(&u64::MAX) {
                continue;
            }
            if u == dst {
                break;
            }
            for edge in self.graph.edges(u) {
                let v = if edge.source() == u {
                    edge.target()
                } else {
                    edge.source()
                };
                let nd = d + edge.weight().cost as u64;
                if nd < *dist.get(&v).unwrap_or(&u64::MAX) {
                    dist.insert(v, nd);
                    prev.insert(v, u);
                    heap.push(std::cmp::Reverse((nd, v)));
                }
            }
        }
        let total = *dist.get(&dst)?;
        let mut path = vec![dst];
        let mut cur = dst;
        while cur != src {
            cur = *prev.get(&cur)?;
            path.push(cur);
        }
        path.reverse();
        Some((path, total))
    }

    /// All articulation points: nodes whose removal increases the number of
    /// connected components. Hopcroft–Tarjan, iterative, `O(V + E)`. Parallel
    /// edges are handled by tracking the edge (not the node) used to reach a
    /// child, so a dual-homed pair is never reported.
    ///
    /// The result is sorted by node name.
    pub fn articulation_points(&self) -> Vec<DeviceId> {
        let n = self.graph.node_count();
        let mut disc: Vec<Option<usize>> = vec![None; n];
        let mut low: Vec<usize> = vec![0; n];
        let mut is_art: Vec<bool> = vec![false; n];
        let mut timer = 0usize;

        // adjacency with edge ids, in insertion order
        let adj: Vec<Vec<(DeviceId, EdgeIndex<IndexType>)>> = self
            .graph
            .node_indices()
            .map(|u| {
                self.graph
                    .edges(u)
                    .map(|e| {
                        let v = if e.source() == u { e.target() } else { e.source() };
                        (v, e.id())
                    })
                    .collect()
            })
            .collect();

        for root in self.graph.node_indices() {
            if disc[root.index()].is_some() {
                continue;
            }
            // (node, edge used to enter it, position in its adjacency list)
            let mut stack: Vec<(DeviceId, Option<EdgeIndex<IndexType>>, usize)> =
                vec![(root, None, 0)];
            let mut root_children = 0usize;
            disc[root.index()] = Some(timer);
            low[root.index()] = timer;
            timer += 1;

            while let Some(&mut (u, via, ref mut pos)) = stack.last_mut() {
                if *pos < adj[u.index()].len() {
                    let (v, eid) = adj[u.index()][*pos];
                    *pos += 1;
                    if Some(eid) == via {
                        continue;
                    }
                    match disc[v.index()] {
                        Some(d) => {
                            low[u.index()] = low[u.index()].min(d);
                        }
                        None => {
                            disc[v.index()] = Some(timer);
                            low[v.index()] = timer;
                            timer += 1;
                            if u == root {
                                root_children += 1;
                            }
                            stack.push((v, Some(eid), 0));
                        }
                    }
                } else {
                    stack.pop();
                    if let Some(&(parent, _, _)) = stack.last() {
                        low[parent.index()] = low[parent.index()].min(low[u.index()]);
                        if parent != root && low[u.index()] >= disc[parent.index()].unwrap() {
                            is_art[parent.index()] = true;
                        }
                    }
                }
            }
            if root_children > 1 {
                is_art[root.index()] = true;
            }
        }

        let mut points: Vec<DeviceId> = self
            .graph
            .node_indices()
            .filter(|i| is_art[i.index()])
            .collect();
        points.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        points
    }

    /// The number of pairwise edge-disjoint paths between `src` and `dst`
    /// (Menger), computed as a unit-capacity max flow with breadth-first
    /// augmentation. Parallel links count separately.
    pub fn edge_disjoint_paths(&self, src: DeviceId, dst: DeviceId) -> usize {
        self.max_flow(src, dst, usize::MAX).0
    }

    /// Like [`TopoGraph::edge_disjoint_paths`], but stops counting at
    /// `cap`. Much cheaper on dense graphs when only "at least `cap`"
    /// matters.
    pub fn edge_disjoint_paths_capped(&self, src: DeviceId, dst: DeviceId, cap: usize) -> usize {
        self.max_flow(src, dst, cap).0
    }

    /// The value of the minimum edge cut between `src` and `dst`, together
    /// with the source-side membership of every node (indexed by
    /// `DeviceId::index`): the nodes still reachable from `src` in the
    /// residual graph once the flow is maximal.
    pub fn min_cut_partition(&self, src: DeviceId, dst: DeviceId) -> (usize, Vec<bool>) {
        let (count, flow, adj) = self.max_flow(src, dst, usize::MAX);
        let mut side = vec![false; self.graph.node_count()];
        side[src.index()] = true;
        let mut queue = VecDeque::from([src]);
        while let Some(u) = queue.pop_front() {
            for &(v, arc) in &adj[u.index()] {
                if !side[v.index()] && 1 - flow[arc] > 0 {
                    side[v.index()] = true;
                    queue.push_back(v);
                }
            }
        }
        (count, side)
    }

    /// Unit-capacity max flow from `src` to `dst`, augmenting at most `cap`
    /// times. Returns the flow value, the per-arc flow (arc `2e` is
    /// source-to-target of edge `e`, arc `2e + 1` its opposite), and the
    /// arc adjacency.
    #[allow(clippy::type_complexity)]
    fn max_flow(
        &self,
        src: DeviceId,
        dst: DeviceId,
        cap: usize,
    ) -> (usize, Vec<i32>, Vec<Vec<(DeviceId, usize)>>) {
        let m = self.graph.edge_count();
        // arc x and arc x^1 share the same undirected edge
        let mut flow: Vec<i32> = vec![0; 2 * m];
        let adj: Vec<Vec<(DeviceId, usize)>> = self
            .graph
            .node_indices()
            .map(|u| {
                self.graph
                    .edges(u)
                    .map(|e| {
                        let arc = if e.source() == u {
                            2 * e.id().index()
                        } else {
                            2 * e.id().index() + 1
                        };
                        let v = if e.source() == u { e.target() } else { e.source() };
                        (v, arc)
                    })
                    .collect()
            })
            .collect();

        if src == dst {
            return (0, flow, adj);
        }

        let mut count = 0;
        while count < cap {
            // BFS over arcs with residual capacity
            let mut parent: HashMap<DeviceId, (DeviceId, usize)> = HashMap::new();
            let mut queue = VecDeque::from([src]);
            'bfs: while let Some(u) = queue.pop_front() {
                for &(v, arc) in &adj[u.index()] {
                    if v != src && !parent.contains_key(&v) && 1 - flow[arc] > 0 {
                        parent.insert(v, (u, arc));
                        if v == dst {
                            break 'bfs;
                        }
                        queue.push_back(v);
                    }
                }
            }
            if !parent.contains_key(&dst) {
                return (count, flow, adj);
            }
            let mut cur = dst;
            while cur != src {
                let (p, arc) = parent[&cur];
                flow[arc] += 1;
                flow[arc ^ 1] -= 1;
                cur = p;
            }
            count += 1;
        }
        (count, flow, adj)
    }

    /// The connected components, each a list of node names in device order;
    /// components ordered by their first member's device order.
    pub fn connected_components(&self) -> Vec<Vec<String>> {
        let n = self.graph.node_count();
        let mut comp: Vec<Option<usize>> = vec![None; n];
        let mut components: Vec<Vec<String>> = Vec::new();
        for start in self.graph.node_indices() {
            if comp[start.index()].is_some() {
                continue;
            }
            let c = components.len();
            let mut members = Vec::new();
            let mut queue = VecDeque::from([start]);
            comp[start.index()] = Some(c);
            while let Some(u) = queue.pop_front() {
                members.push(u);
                for v in self.graph.neighbors(u) {
                    if comp[v.index()].is_none() {
                        comp[v.index()] = Some(c);
                        queue.push_back(v);
                    }
                }
            }
            members.sort_by_key(|i| i.index());
            components.push(members.into_iter().map(|i| self.graph[i].clone()).collect());
        }
        components
    }

    /// Whether the graph forms a single connected component. Graphs with at
    /// most one node count as connected.
    pub fn is_connected(&self) -> bool {
        self.connected_components().len() <= 1
    }

    /// The diameter: the maximum shortest-path hop count over all reachable
    /// node pairs. Zero for graphs with fewer than two nodes.
    pub fn diameter(&self) -> usize {
        let mut max = 0;
        for u in self.graph.node_indices() {
            for (_, d) in self.bfs_distances(u) {
                max = max.max(d);
            }
        }
        max
    }

    /// All unordered node pairs, or a uniform sample of [`SAMPLE_PAIR_COUNT`]
    /// of them when the graph has more than [`SAMPLE_NODE_THRESHOLD`] nodes.
    /// The sample is drawn from an rng seeded with `seed`, so results are
    /// reproducible across runs of the same topology.
    pub fn pair_sample(&self, seed: u64) -> Vec<(DeviceId, DeviceId)> {
        let nodes = self.nodes();
        let n = nodes.len();
        let total = n.saturating_mul(n.saturating_sub(1)) / 2;
        let all = |k: usize| {
            // unrank the k-th pair in lexicographic order
            let mut i = 0;
            let mut k = k;
            let mut row = n - 1;
            while k >= row {
                k -= row;
                i += 1;
                row -= 1;
            }
            (nodes[i], nodes[i + 1 + k])
        };
        if n <= SAMPLE_NODE_THRESHOLD || total <= SAMPLE_PAIR_COUNT {
            (0..total).map(all).collect()
        } else {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut picks = rand::seq::index::sample(&mut rng, total, SAMPLE_PAIR_COUNT).into_vec();
            picks.sort_unstable();
            picks.into_iter().map(all).collect()
        }
    }

    /// A copy of this graph with the named nodes removed (with all incident
    /// edges). Unknown names are ignored.
    pub fn without_nodes(&self, remove: &[&str]) -> TopoGraph {
        let removed: std::collections::HashSet<&str> = remove.iter().copied().collect();
        let mut graph = UnGraph::default();
        let mut index = HashMap::new();
        for u in self.graph.node_indices() {
            let name = &self.graph[u];
            if !removed.contains(name.as_str()) {
                let id = graph.add_node(name.clone());
                index.insert(name.clone(), id);
            }
        }
        for e in self.graph.edge_references() {
            let (a, b) = (&self.graph[e.source()], &self.graph[e.target()]);
            if let (Some(&a), Some(&b)) = (index.get(a), index.get(b)) {
                graph.add_edge(a, b, *e.weight());
            }
        }
        TopoGraph { graph, index }
    }

    /// A copy of this graph with the given links (by link index) removed.
    pub fn without_links(&self, remove: &[usize]) -> TopoGraph {
        let removed: std::collections::HashSet<usize> = remove.iter().copied().collect();
        let mut graph = UnGraph::default();
        let mut index = HashMap::new();
        for u in self.graph.node_indices() {
            let id = graph.add_node(self.graph[u].clone());
            index.insert(self.graph[u].clone(), id);
        }
        for e in self.graph.edge_references() {
            if !removed.contains(&e.weight().link) {
                let a = index[&self.graph[e.source()]];
                let b = index[&self.graph[e.target()]];
                graph.add_edge(a, b, *e.weight());
            }
        }
        TopoGraph { graph, index }
    }

    /// The link indices (into the topology's link list) of all edges, in
    /// edge insertion order.
    pub fn link_indices(&self) -> Vec<usize> {
        self.graph
            .edge_references()
            .map(|e| e.weight().link)
            .collect()
    }
}

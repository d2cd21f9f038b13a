//! Per-step congestion snapshot of every edge
//!
//! Single vehicles make the occupancy of very short edges spike, so those
//! edges report a length-weighted average over themselves and the edges
//! just downstream of them.

use anyhow::Result;
use log::trace;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use super::config::RoutingConfig;
use super::engine::SimulationEngine;
use super::network::Network;
use super::types::EdgeId;

/// Edge occupancies pulled from the engine once per step
#[derive(Debug, Clone)]
pub struct OccupancyTracker {
    /// Occupancy ratio per edge, index by `EdgeId`
    occupancy: Vec<f64>,
    lengths: Vec<f64>,
    critical: Vec<f64>,
    /// Edges shorter than the minimum length
    short_edges: Vec<EdgeId>,
    /// Edges folded into each short edge's occupancy
    downstream: Vec<Vec<EdgeId>>,
    refreshed: bool,
}

impl OccupancyTracker {
    pub fn new(network: &Network, config: &RoutingConfig) -> Self {
        let signalized: Vec<bool> = network
            .junctions()
            .iter()
            .map(|junction| network.is_signalized(junction.id))
            .collect();

        let mut short_edges = Vec::new();
        let mut downstream = vec![Vec::new(); network.edge_count()];
        for edge in network.edges() {
            if edge.length < config.min_edge_length {
                short_edges.push(edge.id);
                downstream[edge.id.index()] = find_downstream_edges(
                    network,
                    edge.id,
                    config.min_edge_length,
                    config.stop_at_signals.then_some(signalized.as_slice()),
                );
            }
        }

        Self {
            occupancy: vec![0.0; network.edge_count()],
            lengths: network.edges().iter().map(|e| e.length).collect(),
            critical: network.edges().iter().map(|e| e.critical_occupancy).collect(),
            short_edges,
            downstream,
            refreshed: false,
        }
    }

    /// Re-reads every lane from the engine and replaces the whole snapshot
    pub fn refresh<E: SimulationEngine + ?Sized>(&mut self, network: &Network, engine: &E) -> Result<()> {
        let mut raw = Vec::with_capacity(network.edge_count());
        for edge in network.edges() {
            let mut total = 0.0;
            for lane in &edge.lanes {
                total += engine.lane_occupancy(&network.lane(*lane).name)?;
            }
            raw.push((total / edge.lanes.len() as f64).clamp(0.0, 1.0));
        }

        let mut snapshot = raw.clone();
        for edge in &self.short_edges {
            snapshot[edge.index()] = self.folded_occupancy(*edge, &raw);
        }

        trace!("Refreshed occupancy of {} edges", snapshot.len());
        self.occupancy = snapshot;
        self.refreshed = true;
        Ok(())
    }

    fn folded_occupancy(&self, edge: EdgeId, raw: &[f64]) -> f64 {
        let mut weighted = raw[edge.index()] * self.lengths[edge.index()];
        let mut total_length = self.lengths[edge.index()];
        for next in &self.downstream[edge.index()] {
            weighted += raw[next.index()] * self.lengths[next.index()];
            total_length += self.lengths[next.index()];
        }
        if total_length > 0.0 {
            weighted / total_length
        } else {
            raw[edge.index()]
        }
    }

    pub fn occupancy(&self, edge: EdgeId) -> f64 {
        self.occupancy[edge.index()]
    }

    pub fn length(&self, edge: EdgeId) -> f64 {
        self.lengths[edge.index()]
    }

    pub fn critical_occupancy(&self, edge: EdgeId) -> f64 {
        self.critical[edge.index()]
    }

    /// Edges whose occupancy is averaged into a short edge's
    pub fn downstream(&self, edge: EdgeId) -> &[EdgeId] {
        &self.downstream[edge.index()]
    }

    pub fn is_short(&self, edge: EdgeId) -> bool {
        self.short_edges.contains(&edge)
    }

    /// Whether at least one refresh has happened
    pub fn is_refreshed(&self) -> bool {
        self.refreshed
    }
}

/// Collects the edges reachable downstream of `start` until the covered
/// distance reaches `min_length`, optionally stopping at signalised junctions.
///
/// Edges are expanded in order of covered distance, so an edge is continued
/// from whenever its shortest approach leaves room to continue.
fn find_downstream_edges(
    network: &Network,
    start: EdgeId,
    min_length: f64,
    signalized: Option<&[bool]>,
) -> Vec<EdgeId> {
    let mut found = Vec::new();
    let start_length = network.edge(start).length;
    let mut best = HashMap::from([(start, start_length)]);
    let mut heap = BinaryHeap::from([Reverse((OrderedFloat(start_length), start))]);

    while let Some(Reverse((OrderedFloat(covered), current))) = heap.pop() {
        if best.get(&current).is_some_and(|&shortest| covered > shortest) {
            continue;
        }
        if covered >= min_length {
            continue;
        }
        let end = network.edge(current).to;
        if signalized.is_some_and(|flags| flags[end.index()]) {
            continue;
        }
        for next in network.out_edges(end) {
            let reached = covered + network.edge(next).length;
            match best.get(&next) {
                Some(&shortest) if shortest <= reached => continue,
                Some(_) => {}
                None => found.push(next),
            }
            best.insert(next, reached);
            heap.push(Reverse((OrderedFloat(reached), next)));
        }
    }

    found
}

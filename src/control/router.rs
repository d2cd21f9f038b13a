//! Dynamic routing core
//!
//! Shortest-path mode replays the precomputed table. Coverage-based mode
//! re-evaluates only the first hop out of the junction ahead, blending the
//! static remaining cost of each choice with the live occupancy of the edge
//! it starts with; the rest of the route comes from the table.

use anyhow::{bail, Result};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::config::RoutingConfig;
use super::engine::SimulationEngine;
use super::network::Network;
use super::occupancy::OccupancyTracker;
use super::shortest_paths::JunctionPathTable;
use super::types::{EdgeId, JunctionId, Metric, SELF_LOOP_COST, UNREACHABLE_COST};

/// Routing policy of a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterMode {
    /// Follow the precomputed shortest path
    ShortestPath,
    /// Blend path cost with live congestion at every junction approach
    CoverageBased,
}

/// Where a route has to end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Route ends by driving onto this edge
    Edge(EdgeId),
    /// Route ends on reaching this junction
    Junction(JunctionId),
}

/// One first-hop candidate evaluated by coverage-based routing
#[derive(Debug, Clone)]
struct RouteOption {
    /// Junctions from the junction ahead to the end of the route
    junctions: Vec<JunctionId>,
    cost: f64,
}

/// Congestion part of the coverage cost.
///
/// Linear below the critical occupancy, saturating towards 1 above it.
pub fn occupancy_cost(occupancy: f64, critical_occupancy: f64, sigma: f64) -> f64 {
    if occupancy < critical_occupancy {
        occupancy
    } else {
        1.0 - (-sigma * occupancy).exp()
    }
}

/// Blends a normalised path cost with an occupancy cost using `alpha`
pub fn coverage_cost(alpha: f64, normalized_path_cost: f64, occupancy_cost: f64) -> f64 {
    alpha * normalized_path_cost + (1.0 - alpha) * occupancy_cost
}

/// True when a junction sequence visits any junction twice
pub fn has_self_loop(junctions: &[JunctionId]) -> bool {
    junctions
        .iter()
        .enumerate()
        .any(|(i, junction)| junctions[i + 1..].contains(junction))
}

/// Per-vehicle route recomputation over a static table and live occupancy
pub struct Router {
    table: JunctionPathTable,
    occupancy: OccupancyTracker,
    sigma: f64,
    /// Upper bound of any remaining-path cost, used for normalisation
    normalizer: f64,
    /// Optional seeded RNG for reproducible tie-breaking
    rng: Option<StdRng>,
}

impl Router {
    /// Builds the shortest-path table for the network and a fresh tracker
    pub fn new(network: &Network, config: &RoutingConfig) -> Self {
        let table = JunctionPathTable::build(network, config.metric);
        Self::assemble(network, table, config)
    }

    /// Uses a previously built table, e.g. one loaded from disk
    pub fn with_table(network: &Network, table: JunctionPathTable, config: &RoutingConfig) -> Result<Self> {
        if table.node_count() != network.junction_count() {
            bail!(
                "Shortest-path table covers {} junctions but the network has {}",
                table.node_count(),
                network.junction_count()
            );
        }
        if table.metric() != config.metric {
            bail!(
                "Shortest-path table uses {:?} but routing is configured for {:?}",
                table.metric(),
                config.metric
            );
        }
        Ok(Self::assemble(network, table, config))
    }

    fn assemble(network: &Network, table: JunctionPathTable, config: &RoutingConfig) -> Self {
        let normalizer = table.max_path_cost() + table.max_element_cost();
        Self {
            occupancy: OccupancyTracker::new(network, config),
            sigma: config.sigma,
            normalizer,
            rng: config.seed.map(StdRng::seed_from_u64),
            table,
        }
    }

    pub fn table(&self) -> &JunctionPathTable {
        &self.table
    }

    pub fn occupancy(&self) -> &OccupancyTracker {
        &self.occupancy
    }

    /// Pulls a new occupancy snapshot; must run before any routing in a tick
    pub fn refresh_occupancy<E: SimulationEngine + ?Sized>(&mut self, network: &Network, engine: &E) -> Result<()> {
        self.occupancy.refresh(network, engine)
    }

    /// Computes the route of a vehicle currently on `start`.
    ///
    /// The returned edges begin with `start` and end at the destination.
    /// Returns `None` when the destination cannot be reached at all.
    pub fn route(
        &mut self,
        network: &Network,
        mode: RouterMode,
        start: EdgeId,
        destination: Destination,
        alpha: f64,
    ) -> Option<Vec<EdgeId>> {
        match mode {
            RouterMode::ShortestPath => self.shortest_route(network, start, destination),
            RouterMode::CoverageBased => self.coverage_route(network, start, destination, alpha),
        }
    }

    /// Precomputed shortest route from the end of `start`
    pub fn shortest_route(&self, network: &Network, start: EdgeId, destination: Destination) -> Option<Vec<EdgeId>> {
        let ahead = network.edge(start).to;
        let (end_junction, final_edge) = resolve(network, destination);
        if final_edge == Some(start) || (final_edge.is_none() && end_junction == ahead) {
            return Some(vec![start]);
        }

        let junctions = self.table.path(ahead, end_junction)?;
        assemble_edges(network, self.table.metric(), start, junctions, final_edge)
    }

    fn coverage_route(
        &mut self,
        network: &Network,
        start: EdgeId,
        destination: Destination,
        alpha: f64,
    ) -> Option<Vec<EdgeId>> {
        let start_edge = network.edge(start);
        let ahead = start_edge.to;
        let (end_junction, final_edge) = resolve(network, destination);
        if final_edge == Some(start) || (final_edge.is_none() && end_junction == ahead) {
            return Some(vec![start]);
        }

        let metric = self.table.metric();
        let mut options = Vec::new();

        for &child in network.junction(ahead).children.keys() {
            let via = match final_edge {
                Some(last) if network.edge(last).from == ahead && network.edge(last).to == child => last,
                _ => match network.cheapest_edge(ahead, child, metric) {
                    Some(via) => via,
                    None => continue,
                },
            };
            let choice = network.edge(via);

            let (junctions, remaining_cost) = if final_edge == Some(via) {
                (vec![ahead, child], choice.weight(metric))
            } else {
                match self.table.path(child, end_junction) {
                    Some(rest) => {
                        let mut junctions = Vec::with_capacity(rest.len() + 1);
                        junctions.push(ahead);
                        junctions.extend_from_slice(rest);
                        let cost = self.table.cost(child, end_junction) + choice.weight(metric);
                        (junctions, cost)
                    }
                    None => {
                        trace!("Choice {} cannot reach the destination", choice.name);
                        options.push(RouteOption {
                            junctions: Vec::new(),
                            cost: UNREACHABLE_COST,
                        });
                        continue;
                    }
                }
            };

            let normalized = if self.normalizer > 0.0 {
                remaining_cost / self.normalizer
            } else {
                0.0
            };
            let congestion = occupancy_cost(
                self.occupancy.occupancy(via),
                self.occupancy.critical_occupancy(via),
                self.sigma,
            );
            let mut cost = coverage_cost(alpha, normalized, congestion);

            // The junction just departed counts as visited
            let mut visited = Vec::with_capacity(junctions.len() + 1);
            visited.push(start_edge.from);
            visited.extend_from_slice(&junctions);
            if has_self_loop(&visited) {
                cost = SELF_LOOP_COST;
            }

            options.push(RouteOption { junctions, cost });
        }

        match self.pick_lowest_cost(&options) {
            Some(best) => assemble_edges(network, metric, start, &best.junctions, final_edge),
            None => {
                debug!(
                    "No feasible first hop from {}; falling back to the shortest path",
                    start_edge.name
                );
                self.shortest_route(network, start, destination)
            }
        }
    }

    /// Lowest-cost feasible option, ties broken at random
    fn pick_lowest_cost(&mut self, options: &[RouteOption]) -> Option<RouteOption> {
        let feasible = options
            .iter()
            .filter(|option| option.cost < SELF_LOOP_COST.min(UNREACHABLE_COST))
            .collect::<Vec<_>>();
        let min_cost = feasible
            .iter()
            .map(|option| option.cost)
            .fold(f64::INFINITY, f64::min);
        let best = feasible
            .into_iter()
            .filter(|option| option.cost <= min_cost)
            .collect::<Vec<_>>();

        let chosen = match &mut self.rng {
            Some(rng) => best.choose(rng),
            None => best.choose(&mut rand::rng()),
        };
        chosen.map(|option| (*option).clone())
    }
}

/// Splits a destination into the junction to reach and the edge to finish on
fn resolve(network: &Network, destination: Destination) -> (JunctionId, Option<EdgeId>) {
    match destination {
        Destination::Edge(edge) => (network.edge(edge).from, Some(edge)),
        Destination::Junction(junction) => (junction, None),
    }
}

/// Turns a junction sequence into edges, prefixed by `start` and followed by
/// `final_edge` unless the sequence already drives onto it. Each hop takes
/// the edge the table charged under `metric`.
fn assemble_edges(
    network: &Network,
    metric: Metric,
    start: EdgeId,
    junctions: &[JunctionId],
    final_edge: Option<EdgeId>,
) -> Option<Vec<EdgeId>> {
    let mut edges = vec![start];
    for (index, pair) in junctions.windows(2).enumerate() {
        let onto_final = final_edge.filter(|&last| {
            let last = network.edge(last);
            index + 2 == junctions.len() && last.from == pair[0] && last.to == pair[1]
        });
        match onto_final {
            Some(last) => edges.push(last),
            None => edges.push(network.cheapest_edge(pair[0], pair[1], metric)?),
        }
    }
    if let Some(last) = final_edge {
        if edges.last() != Some(&last) {
            edges.push(last);
        }
    }
    Some(edges)
}

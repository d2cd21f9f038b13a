//! Static network model
//!
//! Junctions, edges and lanes are stored in arenas addressed by dense
//! indices. Name lookups are resolved once when the network is built.

use anyhow::{anyhow, bail, Context, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::types::{
    lane_name, EdgeId, JunctionId, LaneId, Metric, Position, TurnDirection,
    DEFAULT_CRITICAL_OCCUPANCY, DEFAULT_EDGE_TYPE, DEFAULT_NUM_LANES, DEFAULT_SPEED,
};

/// A junction as written in a network description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JunctionSpec {
    pub id: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// An edge type as written in a network description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeTypeSpec {
    pub id: String,
    #[serde(default)]
    pub priority: i32,
    pub num_lanes: usize,
    pub speed: f64,
}

/// An edge as written in a network description
///
/// Missing lane counts and speeds are taken from the edge type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "type", default)]
    pub edge_type: Option<String>,
    pub length: f64,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub num_lanes: Option<usize>,
    #[serde(default)]
    pub critical_occupancy: Option<f64>,
}

/// The phase light strings of a signalised junction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalProgramSpec {
    pub junction: String,
    pub phases: Vec<String>,
}

/// One controlled link of a signalised junction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub junction: String,
    pub in_lane: String,
    pub out_lane: String,
    pub link_index: usize,
    pub direction: String,
}

/// Complete static description of a network
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDescription {
    pub junctions: Vec<JunctionSpec>,
    #[serde(default)]
    pub edge_types: Vec<EdgeTypeSpec>,
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub signals: Vec<SignalProgramSpec>,
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

impl NetworkDescription {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Malformed network description")
    }

    /// Reads a JSON network description from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read network description {}", path.display()))?;
        Self::from_json(&text)
    }
}

/// A junction of the network
#[derive(Debug, Clone)]
pub struct Junction {
    pub id: JunctionId,
    pub name: String,
    pub position: Position,
    pub kind: String,
    /// Reachable neighbours and the edge leading to each
    pub children: BTreeMap<JunctionId, EdgeId>,
    /// Lanes ending at this junction
    pub incoming_lanes: Vec<LaneId>,
}

impl Junction {
    pub fn degree(&self) -> usize {
        self.children.len()
    }
}

/// A directed edge of the network
#[derive(Debug, Clone)]
pub struct Edge {
    pub id: EdgeId,
    pub name: String,
    pub edge_type: String,
    pub from: JunctionId,
    pub to: JunctionId,
    pub length: f64,
    pub speed: f64,
    /// Free-flow travel time in seconds
    pub min_travel_time: f64,
    pub critical_occupancy: f64,
    /// Lanes ordered by their index within the edge
    pub lanes: Vec<LaneId>,
}

impl Edge {
    /// Static weight of this edge under the given metric
    pub fn weight(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Distance => self.length,
            Metric::TravelTime => self.min_travel_time,
        }
    }
}

/// A lane, owned by its edge
#[derive(Debug, Clone)]
pub struct Lane {
    pub id: LaneId,
    pub name: String,
    pub edge: EdgeId,
    pub index: usize,
}

/// A controlled movement through a signalised junction
#[derive(Debug, Clone)]
pub struct SignalLink {
    pub in_lane: LaneId,
    pub out_lane: LaneId,
    pub direction: TurnDirection,
}

/// Signal program and link layout of one signalised junction
#[derive(Debug, Clone)]
pub struct SignalizedJunction {
    pub junction: JunctionId,
    /// Raw phase light strings, one char per link index
    pub phases: Vec<String>,
    /// Links ordered by link index
    pub links: Vec<SignalLink>,
}

/// The static network graph
#[derive(Debug, Default)]
pub struct Network {
    junctions: Vec<Junction>,
    edges: Vec<Edge>,
    lanes: Vec<Lane>,
    signals: Vec<SignalizedJunction>,

    junction_index: HashMap<String, JunctionId>,
    edge_index: HashMap<String, EdgeId>,
    lane_index: HashMap<String, LaneId>,

    /// Directed graph mirror; node `i` is junction `i`
    graph: DiGraph<JunctionId, EdgeId>,
}

impl Network {
    /// Builds and validates the network from its description
    pub fn from_description(description: &NetworkDescription) -> Result<Self> {
        let mut network = Network::default();

        let mut edge_types: HashMap<&str, (usize, f64)> = HashMap::new();
        edge_types.insert(DEFAULT_EDGE_TYPE, (DEFAULT_NUM_LANES, DEFAULT_SPEED));
        for edge_type in &description.edge_types {
            edge_types.insert(edge_type.id.as_str(), (edge_type.num_lanes, edge_type.speed));
        }

        for spec in &description.junctions {
            if network.junction_index.contains_key(&spec.id) {
                bail!("Duplicate junction {}", spec.id);
            }
            let id = JunctionId(network.junctions.len());
            let node = network.graph.add_node(id);
            debug_assert_eq!(node.index(), id.index());
            network.junction_index.insert(spec.id.clone(), id);
            network.junctions.push(Junction {
                id,
                name: spec.id.clone(),
                position: Position::new(spec.x, spec.y),
                kind: spec.kind.clone(),
                children: BTreeMap::new(),
                incoming_lanes: Vec::new(),
            });
        }

        for spec in &description.edges {
            network.add_edge(spec, &edge_types)?;
        }

        for program in &description.signals {
            network.add_signal_program(program, &description.connections)?;
        }

        Ok(network)
    }

    fn add_edge(&mut self, spec: &EdgeSpec, edge_types: &HashMap<&str, (usize, f64)>) -> Result<()> {
        if self.edge_index.contains_key(&spec.id) {
            bail!("Duplicate edge {}", spec.id);
        }
        let from = self
            .junction_id(&spec.from)
            .with_context(|| format!("Edge {} starts at an unknown junction", spec.id))?;
        let to = self
            .junction_id(&spec.to)
            .with_context(|| format!("Edge {} ends at an unknown junction", spec.id))?;

        let type_name = spec.edge_type.as_deref().unwrap_or(DEFAULT_EDGE_TYPE);
        let (type_lanes, type_speed) = *edge_types
            .get(type_name)
            .ok_or_else(|| anyhow!("Edge {} has unknown type {}", spec.id, type_name))?;

        let num_lanes = spec.num_lanes.unwrap_or(type_lanes);
        let speed = spec.speed.unwrap_or(type_speed);
        if num_lanes == 0 {
            bail!("Edge {} has no lanes", spec.id);
        }
        if !(speed > 0.0) {
            bail!("Edge {} has non-positive speed {}", spec.id, speed);
        }
        if !(spec.length >= 0.0) {
            bail!("Edge {} has negative length {}", spec.id, spec.length);
        }

        let id = EdgeId(self.edges.len());
        let mut lanes = Vec::with_capacity(num_lanes);
        for index in 0..num_lanes {
            let lane_id = LaneId(self.lanes.len());
            let name = lane_name(&spec.id, index);
            self.lane_index.insert(name.clone(), lane_id);
            self.lanes.push(Lane {
                id: lane_id,
                name,
                edge: id,
                index,
            });
            lanes.push(lane_id);
        }

        let edge = Edge {
            id,
            name: spec.id.clone(),
            edge_type: type_name.to_string(),
            from,
            to,
            length: spec.length,
            speed,
            min_travel_time: spec.length / speed,
            critical_occupancy: spec.critical_occupancy.unwrap_or(DEFAULT_CRITICAL_OCCUPANCY),
            lanes,
        };

        // Parallel edges: the faster one is the child link
        let replace = match self.junctions[from.index()].children.get(&to) {
            Some(existing) => self.edges[existing.index()].min_travel_time > edge.min_travel_time,
            None => true,
        };
        if replace {
            self.junctions[from.index()].children.insert(to, id);
        }
        self.junctions[to.index()]
            .incoming_lanes
            .extend(edge.lanes.iter().copied());

        self.graph
            .add_edge(NodeIndex::new(from.index()), NodeIndex::new(to.index()), id);
        self.edge_index.insert(spec.id.clone(), id);
        self.edges.push(edge);
        Ok(())
    }

    fn add_signal_program(
        &mut self,
        program: &SignalProgramSpec,
        connections: &[ConnectionSpec],
    ) -> Result<()> {
        let junction = self
            .junction_id(&program.junction)
            .with_context(|| format!("Signal program for unknown junction {}", program.junction))?;

        let mut by_index: BTreeMap<usize, &ConnectionSpec> = BTreeMap::new();
        for connection in connections.iter().filter(|c| c.junction == program.junction) {
            if by_index.insert(connection.link_index, connection).is_some() {
                bail!(
                    "Junction {} declares link index {} twice",
                    program.junction,
                    connection.link_index
                );
            }
        }

        let mut links = Vec::with_capacity(by_index.len());
        for (expected, (link_index, connection)) in by_index.into_iter().enumerate() {
            if link_index != expected {
                bail!(
                    "Junction {} is missing link index {}",
                    program.junction,
                    expected
                );
            }
            let in_lane = self
                .lane_id(&connection.in_lane)
                .with_context(|| format!("Unknown incoming lane {}", connection.in_lane))?;
            let out_lane = self
                .lane_id(&connection.out_lane)
                .with_context(|| format!("Unknown outgoing lane {}", connection.out_lane))?;
            let direction = TurnDirection::from_code(&connection.direction).ok_or_else(|| {
                anyhow!(
                    "Unknown turn direction {:?} at junction {}",
                    connection.direction,
                    program.junction
                )
            })?;
            links.push(SignalLink {
                in_lane,
                out_lane,
                direction,
            });
        }

        if links.is_empty() {
            bail!("Signalised junction {} controls no links", program.junction);
        }
        for phase in &program.phases {
            if phase.chars().count() != links.len() {
                bail!(
                    "Phase {:?} at junction {} does not cover its {} links",
                    phase,
                    program.junction,
                    links.len()
                );
            }
        }

        self.signals.push(SignalizedJunction {
            junction,
            phases: program.phases.clone(),
            links,
        });
        Ok(())
    }

    pub fn junction_id(&self, name: &str) -> Result<JunctionId> {
        self.junction_index
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("Junction {} not found", name))
    }

    pub fn edge_id(&self, name: &str) -> Result<EdgeId> {
        self.edge_index
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("Edge {} not found", name))
    }

    pub fn lane_id(&self, name: &str) -> Result<LaneId> {
        self.lane_index
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("Lane {} not found", name))
    }

    pub fn junction(&self, id: JunctionId) -> &Junction {
        &self.junctions[id.index()]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn lane(&self, id: LaneId) -> &Lane {
        &self.lanes[id.index()]
    }

    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn signals(&self) -> &[SignalizedJunction] {
        &self.signals
    }

    pub fn junction_count(&self) -> usize {
        self.junctions.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether a signal program controls this junction
    pub fn is_signalized(&self, id: JunctionId) -> bool {
        self.signals.iter().any(|s| s.junction == id)
    }

    /// Edges leaving a junction
    pub fn out_edges(&self, id: JunctionId) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph
            .edges(NodeIndex::new(id.index()))
            .map(|edge| *edge.weight())
    }

    /// Cheapest edge from `from` to `to` under `metric`; among parallel
    /// edges this is the one a shortest-path table charges
    pub fn cheapest_edge(&self, from: JunctionId, to: JunctionId, metric: Metric) -> Option<EdgeId> {
        self.out_edges(from)
            .filter(|edge| self.edges[edge.index()].to == to)
            .min_by(|a, b| {
                self.edges[a.index()]
                    .weight(metric)
                    .total_cmp(&self.edges[b.index()].weight(metric))
            })
    }

    /// Edges that continue from the end of `id`
    pub fn successors(&self, id: EdgeId) -> impl Iterator<Item = EdgeId> + '_ {
        self.out_edges(self.edges[id.index()].to)
    }

    /// Largest single-edge weight in the network
    pub fn max_edge_weight(&self, metric: Metric) -> f64 {
        self.edges
            .iter()
            .map(|edge| edge.weight(metric))
            .fold(0.0, f64::max)
    }
}

//! Core types for the control core
//!
//! Network objects live in arenas and are addressed by dense indices.

use serde::{Deserialize, Serialize};

/// Index of a junction in the network arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JunctionId(pub usize);

/// Index of an edge in the network arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

/// Index of a lane in the network arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneId(pub usize);

impl JunctionId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl EdgeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl LaneId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A 2D position of a junction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Which static weight the shortest-path search minimises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Edge length in metres
    Distance,
    /// Free-flow travel time (length / speed limit) in seconds
    #[default]
    TravelTime,
}

/// Turning direction of a link through a signalised junction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnDirection {
    Straight,
    Left,
    Right,
    PartialLeft,
    PartialRight,
    Turnaround,
}

impl TurnDirection {
    /// Parses the engine's one-letter direction code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "s" => Some(TurnDirection::Straight),
            "l" => Some(TurnDirection::Left),
            "r" => Some(TurnDirection::Right),
            "L" => Some(TurnDirection::PartialLeft),
            "R" => Some(TurnDirection::PartialRight),
            "t" => Some(TurnDirection::Turnaround),
            _ => None,
        }
    }
}

/// Critical occupancy used when an edge does not declare one
pub const DEFAULT_CRITICAL_OCCUPANCY: f64 = 0.2;

/// Lane count of the built-in default edge type
pub const DEFAULT_NUM_LANES: usize = 1;

/// Speed limit of the built-in default edge type in m/s
pub const DEFAULT_SPEED: f64 = 13.9;

/// Name of the edge type used when an edge names none
pub const DEFAULT_EDGE_TYPE: &str = "default";

/// Routing cost assigned to a choice whose destination is unreachable
pub const UNREACHABLE_COST: f64 = 999.0;

/// Routing cost assigned to a choice whose route revisits a junction
pub const SELF_LOOP_COST: f64 = 999.0;

/// Builds the engine-side lane name for lane `index` of edge `edge`
pub fn lane_name(edge: &str, index: usize) -> String {
    format!("{}_{}", edge, index)
}

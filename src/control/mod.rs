//! Per-step traffic decision core
//!
//! Everything here is driven synchronously by an external simulation engine
//! through [`SimulationEngine`]: dynamic vehicle routing over a precomputed
//! shortest-path table, and adaptive control of signalised junctions.

pub mod config;
pub mod engine;
pub mod fleet;
pub mod network;
pub mod occupancy;
pub mod router;
pub mod session;
pub mod shortest_paths;
pub mod signals;
pub mod types;

pub use config::{ControllerConfig, RoutingConfig};
pub use engine::SimulationEngine;
pub use fleet::{VehicleFleet, VehicleRecord};
pub use network::{Edge, Junction, Lane, Network, NetworkDescription, SignalLink, SignalizedJunction};
pub use occupancy::OccupancyTracker;
pub use router::{coverage_cost, has_self_loop, occupancy_cost, Destination, Router, RouterMode};
pub use session::{ControlSession, RunSummary};
pub use shortest_paths::{EdgePathTable, JunctionPathTable, NodeKey, ShortestPathTable};
pub use types::{
    lane_name, EdgeId, JunctionId, LaneId, Metric, Position, TurnDirection, SELF_LOOP_COST, UNREACHABLE_COST,
};

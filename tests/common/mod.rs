//! Shared fixtures: a scripted in-memory engine and small networks
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashMap};

use signal_router::control::{Network, NetworkDescription, SimulationEngine};

/// Events the engine reports after one step
#[derive(Debug, Clone, Default)]
pub struct StepEvents {
    pub departed: Vec<String>,
    pub arrived: Vec<String>,
    pub approaching: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Clone)]
pub struct LaneState {
    pub vehicles: Vec<String>,
    pub occupancy: f64,
    pub length: f64,
    pub mean_vehicle_length: f64,
}

impl Default for LaneState {
    fn default() -> Self {
        Self {
            vehicles: Vec::new(),
            occupancy: 0.0,
            length: 100.0,
            mean_vehicle_length: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VehicleState {
    pub route: Vec<String>,
    pub vehicle_type: String,
    pub waiting_time: f64,
    pub edge: String,
}

/// Engine whose state is set directly by the test
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    pub step_length: f64,
    pub step: u64,
    /// Vehicles stay pending until this step is reached
    pub pending_until_step: u64,
    pub script: BTreeMap<u64, StepEvents>,
    pub current: StepEvents,
    pub lanes: HashMap<String, LaneState>,
    pub vehicles: HashMap<String, VehicleState>,
    pub phase_writes: Vec<(String, String)>,
    pub route_writes: Vec<(String, Vec<String>)>,
}

impl ScriptedEngine {
    pub fn new(step_length: f64) -> Self {
        Self {
            step_length,
            ..Default::default()
        }
    }

    pub fn lane_mut(&mut self, lane: &str) -> &mut LaneState {
        self.lanes.entry(lane.to_string()).or_default()
    }

    pub fn set_occupancy(&mut self, lane: &str, occupancy: f64) {
        self.lane_mut(lane).occupancy = occupancy;
    }

    /// Puts a vehicle on `lane` of the first edge of `route`
    pub fn place_vehicle(&mut self, id: &str, lane: &str, route: &[&str], waiting_time: f64) {
        self.vehicles.insert(
            id.to_string(),
            VehicleState {
                route: route.iter().map(|edge| edge.to_string()).collect(),
                vehicle_type: "HumanStandard".to_string(),
                waiting_time,
                edge: route[0].to_string(),
            },
        );
        self.lane_mut(lane).vehicles.push(id.to_string());
    }

    /// Queues `count` vehicles on `lane`, all heading for `route`
    pub fn queue_vehicles(&mut self, prefix: &str, count: usize, lane: &str, route: &[&str]) {
        for index in 0..count {
            self.place_vehicle(&format!("{}{}", prefix, index), lane, route, 0.0);
        }
    }

    pub fn add_vehicle(&mut self, id: &str, vehicle_type: &str, route: &[&str]) {
        self.vehicles.insert(
            id.to_string(),
            VehicleState {
                route: route.iter().map(|edge| edge.to_string()).collect(),
                vehicle_type: vehicle_type.to_string(),
                waiting_time: 0.0,
                edge: route[0].to_string(),
            },
        );
    }

    pub fn at_step(&mut self, step: u64, events: StepEvents) {
        self.script.insert(step, events);
    }

    pub fn last_phase(&self, junction: &str) -> Option<&str> {
        self.phase_writes
            .iter()
            .rev()
            .find(|(name, _)| name == junction)
            .map(|(_, phase)| phase.as_str())
    }

    pub fn phases_written(&self, junction: &str) -> Vec<&str> {
        self.phase_writes
            .iter()
            .filter(|(name, _)| name == junction)
            .map(|(_, phase)| phase.as_str())
            .collect()
    }

    fn vehicle(&self, vehicle: &str) -> Result<&VehicleState> {
        self.vehicles
            .get(vehicle)
            .ok_or_else(|| anyhow!("Unknown vehicle {}", vehicle))
    }
}

impl SimulationEngine for ScriptedEngine {
    fn simulation_step(&mut self) -> Result<()> {
        self.step += 1;
        self.current = self.script.remove(&self.step).unwrap_or_default();
        Ok(())
    }

    fn time(&self) -> Result<f64> {
        Ok(self.step as f64 * self.step_length)
    }

    fn pending_vehicle_count(&self) -> Result<usize> {
        Ok(if self.step < self.pending_until_step { 1 } else { 0 })
    }

    fn departed_vehicles(&self) -> Result<Vec<String>> {
        Ok(self.current.departed.clone())
    }

    fn arrived_vehicles(&self) -> Result<Vec<String>> {
        Ok(self.current.arrived.clone())
    }

    fn approaching_vehicles(&self) -> Result<Vec<(String, Vec<String>)>> {
        Ok(self.current.approaching.clone())
    }

    fn lane_vehicle_ids(&self, lane: &str) -> Result<Vec<String>> {
        Ok(self.lanes.get(lane).map(|l| l.vehicles.clone()).unwrap_or_default())
    }

    fn lane_occupancy(&self, lane: &str) -> Result<f64> {
        Ok(self.lanes.get(lane).map(|l| l.occupancy).unwrap_or(0.0))
    }

    fn lane_length(&self, lane: &str) -> Result<f64> {
        Ok(self.lanes.get(lane).map(|l| l.length).unwrap_or(100.0))
    }

    fn lane_mean_vehicle_length(&self, lane: &str) -> Result<f64> {
        Ok(self.lanes.get(lane).map(|l| l.mean_vehicle_length).unwrap_or(0.0))
    }

    fn vehicle_route(&self, vehicle: &str) -> Result<Vec<String>> {
        Ok(self.vehicle(vehicle)?.route.clone())
    }

    fn vehicle_type(&self, vehicle: &str) -> Result<String> {
        Ok(self.vehicle(vehicle)?.vehicle_type.clone())
    }

    fn vehicle_waiting_time(&self, vehicle: &str) -> Result<f64> {
        Ok(self.vehicle(vehicle)?.waiting_time)
    }

    fn vehicle_edge(&self, vehicle: &str) -> Result<String> {
        Ok(self.vehicle(vehicle)?.edge.clone())
    }

    fn set_phase_string(&mut self, junction: &str, phase: &str) -> Result<()> {
        self.phase_writes.push((junction.to_string(), phase.to_string()));
        Ok(())
    }

    fn set_vehicle_route(&mut self, vehicle: &str, route: &[String]) -> Result<()> {
        let state = self
            .vehicles
            .get_mut(vehicle)
            .ok_or_else(|| anyhow!("Unknown vehicle {}", vehicle))?;
        state.route = route.to_vec();
        self.route_writes.push((vehicle.to_string(), route.to_vec()));
        Ok(())
    }
}

pub fn build_network(json: &str) -> Network {
    let description = NetworkDescription::from_json(json).expect("Fixture should parse");
    Network::from_description(&description).expect("Fixture should be a valid network")
}

/// A single edge of length 100 at 10 m/s between A and B
pub fn single_edge_network() -> Network {
    build_network(
        r#"{
            "junctions": [
                {"id": "A", "x": 0, "y": 0},
                {"id": "B", "x": 100, "y": 0}
            ],
            "edges": [
                {"id": "ab", "from": "A", "to": "B", "length": 100, "speed": 10}
            ]
        }"#,
    )
}

/// A -> B, then two equal branches B -> C -> D and B -> F -> D, then D -> E.
/// B -> A allows a turnaround.
pub fn diamond_network() -> Network {
    build_network(
        r#"{
            "junctions": [
                {"id": "A", "x": 0, "y": 0},
                {"id": "B", "x": 100, "y": 0},
                {"id": "C", "x": 200, "y": 100},
                {"id": "F", "x": 200, "y": -100},
                {"id": "D", "x": 300, "y": 0},
                {"id": "E", "x": 400, "y": 0}
            ],
            "edges": [
                {"id": "ab", "from": "A", "to": "B", "length": 100, "speed": 10},
                {"id": "ba", "from": "B", "to": "A", "length": 100, "speed": 10},
                {"id": "bc", "from": "B", "to": "C", "length": 150, "speed": 10},
                {"id": "bf", "from": "B", "to": "F", "length": 150, "speed": 10},
                {"id": "cd", "from": "C", "to": "D", "length": 150, "speed": 10},
                {"id": "fd", "from": "F", "to": "D", "length": 150, "speed": 10},
                {"id": "de", "from": "D", "to": "E", "length": 100, "speed": 10}
            ]
        }"#,
    )
}

/// Signalised junction C with approaches from N, S, E and W.
///
/// Links: 0 N->S, 1 S->N, 2 E->W, 3 W->E. Green phases: N-S and E-W.
pub fn four_way_network() -> Network {
    build_network(
        r#"{
            "junctions": [
                {"id": "C", "x": 0, "y": 0, "type": "traffic_light"},
                {"id": "N", "x": 0, "y": 100},
                {"id": "S", "x": 0, "y": -100},
                {"id": "E", "x": 100, "y": 0},
                {"id": "W", "x": -100, "y": 0}
            ],
            "edges": [
                {"id": "n_in", "from": "N", "to": "C", "length": 100},
                {"id": "s_in", "from": "S", "to": "C", "length": 100},
                {"id": "e_in", "from": "E", "to": "C", "length": 100},
                {"id": "w_in", "from": "W", "to": "C", "length": 100},
                {"id": "c_n", "from": "C", "to": "N", "length": 100},
                {"id": "c_s", "from": "C", "to": "S", "length": 100},
                {"id": "c_e", "from": "C", "to": "E", "length": 100},
                {"id": "c_w", "from": "C", "to": "W", "length": 100}
            ],
            "signals": [
                {"junction": "C", "phases": ["GGrr", "yyrr", "rrGG", "rryy"]}
            ],
            "connections": [
                {"junction": "C", "in_lane": "n_in_0", "out_lane": "c_s_0", "link_index": 0, "direction": "s"},
                {"junction": "C", "in_lane": "s_in_0", "out_lane": "c_n_0", "link_index": 1, "direction": "s"},
                {"junction": "C", "in_lane": "e_in_0", "out_lane": "c_w_0", "link_index": 2, "direction": "s"},
                {"junction": "C", "in_lane": "w_in_0", "out_lane": "c_e_0", "link_index": 3, "direction": "s"}
            ]
        }"#,
    )
}

/// Queues vehicles on the four approaches of [`four_way_network`]
pub fn queue_four_way(engine: &mut ScriptedEngine, queues: [usize; 4]) {
    let approaches = [
        ("n", "n_in_0", ["n_in", "c_s"]),
        ("s", "s_in_0", ["s_in", "c_n"]),
        ("e", "e_in_0", ["e_in", "c_w"]),
        ("w", "w_in_0", ["w_in", "c_e"]),
    ];
    for (count, (prefix, lane, route)) in queues.into_iter().zip(approaches) {
        engine.queue_vehicles(prefix, count, lane, &route);
    }
}

//! Boundary with the external simulation engine
//!
//! The engine advances the traffic network one fixed step at a time and is
//! driven synchronously. All ids at this boundary are the engine's own
//! string ids; every call is fallible and a failure is fatal for the run.

use anyhow::Result;

/// Synchronous control channel to a microscopic traffic simulation
pub trait SimulationEngine {
    /// Advances the simulation by one step
    fn simulation_step(&mut self) -> Result<()>;

    /// Current simulation time in seconds
    fn time(&self) -> Result<f64>;

    /// Vehicles still running or waiting to depart
    fn pending_vehicle_count(&self) -> Result<usize>;

    /// Vehicles that entered the network during the last step
    fn departed_vehicles(&self) -> Result<Vec<String>>;

    /// Vehicles that reached their destination during the last step
    fn arrived_vehicles(&self) -> Result<Vec<String>>;

    /// Vehicles detected approaching a junction during the last step,
    /// grouped by the edge they are on
    fn approaching_vehicles(&self) -> Result<Vec<(String, Vec<String>)>>;

    /// Vehicles on a lane during the last step
    fn lane_vehicle_ids(&self, lane: &str) -> Result<Vec<String>>;

    /// Fraction of the lane covered by vehicles during the last step
    fn lane_occupancy(&self, lane: &str) -> Result<f64>;

    fn lane_length(&self, lane: &str) -> Result<f64>;

    /// Mean length of the vehicles on the lane, 0 when empty
    fn lane_mean_vehicle_length(&self, lane: &str) -> Result<f64>;

    fn vehicle_route(&self, vehicle: &str) -> Result<Vec<String>>;

    fn vehicle_type(&self, vehicle: &str) -> Result<String>;

    /// Time in seconds the vehicle has been standing still
    fn vehicle_waiting_time(&self, vehicle: &str) -> Result<f64>;

    /// Edge the vehicle is currently on
    fn vehicle_edge(&self, vehicle: &str) -> Result<String>;

    /// Sets the light string of a signalised junction
    fn set_phase_string(&mut self, junction: &str, phase: &str) -> Result<()>;

    /// Replaces the remaining route of a vehicle
    fn set_vehicle_route(&mut self, vehicle: &str, route: &[String]) -> Result<()>;
}

//! Configuration for the routing and signal-control subsystems
//!
//! Everything a run needs is passed in explicitly at construction time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::router::RouterMode;
use super::types::Metric;

/// Settings for the dynamic routing core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Static weight used by the shortest-path table
    pub metric: Metric,
    /// Edges shorter than this (in metres) get their occupancy folded with
    /// downstream edges
    pub min_edge_length: f64,
    /// Stop the downstream search at signalised junctions
    pub stop_at_signals: bool,
    /// Steepness of the congestion penalty above the critical occupancy
    pub sigma: f64,
    /// Weight between path cost and congestion cost for coverage routing
    pub default_alpha: f64,
    /// Router mode per vehicle type; `None` leaves the vehicle to the engine
    pub vehicle_type_modes: HashMap<String, Option<RouterMode>>,
    /// Seed for tie-breaking between equally good choices
    pub seed: Option<u64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let mut vehicle_type_modes = HashMap::new();
        vehicle_type_modes.insert("HumanCoverageRouted".to_string(), Some(RouterMode::CoverageBased));
        vehicle_type_modes.insert(
            "DriverlessCoverageRouted".to_string(),
            Some(RouterMode::CoverageBased),
        );
        vehicle_type_modes.insert("HumanStandard".to_string(), None);
        vehicle_type_modes.insert("DriverlessStandard".to_string(), None);

        Self {
            metric: Metric::TravelTime,
            min_edge_length: 10.0,
            stop_at_signals: true,
            sigma: 10.0,
            default_alpha: 0.5,
            vehicle_type_modes,
            seed: None,
        }
    }
}

/// Settings shared by every intersection controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Simulation step length in seconds
    pub step_length: f64,
    /// Amber duration in seconds when the phase changes
    pub amber_length: f64,
    /// Transition duration in seconds when the same phase is chosen again
    pub same_phase_amber_length: f64,
    /// Target fraction x* of each queue to clear during a green phase
    pub target_fraction: f64,
    /// Window for the arrival/departure rate estimates in seconds
    pub rate_window_secs: f64,
    /// Gap between queued vehicles in metres, for lane capacity
    pub min_gap: f64,
    /// Vehicle length assumed for empty lanes in metres
    pub default_vehicle_length: f64,
    /// Weight of give-way ('g') links in the phase matrix; `None` weighs them as 1
    pub give_way_discount: Option<f64>,
    /// Signalised junctions left to their static program
    pub exclude: Vec<String>,
    /// Seed for the controllers' tie-breaking
    pub seed: Option<u64>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            step_length: 0.1,
            amber_length: 4.0,
            same_phase_amber_length: 1.0,
            target_fraction: 1.0,
            rate_window_secs: 600.0,
            min_gap: 2.5,
            default_vehicle_length: 4.0,
            give_way_discount: None,
            exclude: Vec::new(),
            seed: None,
        }
    }
}

impl ControllerConfig {
    /// Number of samples kept by the rate estimators
    pub fn rate_window_steps(&self) -> usize {
        ((self.rate_window_secs / self.step_length).round() as usize).max(1)
    }
}

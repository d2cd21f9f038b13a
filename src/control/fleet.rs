//! Vehicles currently in the simulation and their routing preferences

use anyhow::{Context, Result};
use log::{debug, trace, warn};
use std::collections::HashMap;

use super::config::RoutingConfig;
use super::engine::SimulationEngine;
use super::network::Network;
use super::router::{Destination, Router, RouterMode};
use super::types::EdgeId;

/// A vehicle between its departure and arrival
#[derive(Debug, Clone)]
pub struct VehicleRecord {
    pub id: String,
    pub vehicle_type: String,
    /// Route most recently assigned to the vehicle
    pub route: Vec<String>,
    pub destination: EdgeId,
    /// `None` leaves routing to the engine
    pub mode: Option<RouterMode>,
    /// Coverage-routing weight, only set for coverage-routed vehicles
    pub alpha: Option<f64>,
}

/// Tracks departures and arrivals and reroutes vehicles at junction approaches
#[derive(Debug, Default)]
pub struct VehicleFleet {
    vehicles: HashMap<String, VehicleRecord>,
    type_modes: HashMap<String, Option<RouterMode>>,
    default_alpha: f64,
    /// Total routes written to the engine
    pub reroutes: usize,
}

impl VehicleFleet {
    pub fn new(config: &RoutingConfig) -> Self {
        Self {
            vehicles: HashMap::new(),
            type_modes: config.vehicle_type_modes.clone(),
            default_alpha: config.default_alpha,
            reroutes: 0,
        }
    }

    /// Registers a vehicle from its engine route; the last edge is its destination
    pub fn add_vehicle(
        &mut self,
        network: &Network,
        id: &str,
        vehicle_type: &str,
        route: Vec<String>,
    ) -> Result<()> {
        let last = route
            .last()
            .with_context(|| format!("Vehicle {} departed with an empty route", id))?;
        let destination = network.edge_id(last)?;

        let mode = match self.type_modes.get(vehicle_type) {
            Some(mode) => *mode,
            None => {
                warn!(
                    "Vehicle {} has unknown type {}; leaving its routing to the engine",
                    id, vehicle_type
                );
                None
            }
        };
        let alpha = (mode == Some(RouterMode::CoverageBased)).then_some(self.default_alpha);

        self.vehicles.insert(
            id.to_string(),
            VehicleRecord {
                id: id.to_string(),
                vehicle_type: vehicle_type.to_string(),
                route,
                destination,
                mode,
                alpha,
            },
        );
        Ok(())
    }

    pub fn remove_vehicle(&mut self, id: &str) -> Option<VehicleRecord> {
        self.vehicles.remove(id)
    }

    /// Applies the arrivals and departures of the last step
    pub fn sync<E: SimulationEngine + ?Sized>(&mut self, network: &Network, engine: &E) -> Result<()> {
        for vehicle in engine.arrived_vehicles()? {
            self.remove_vehicle(&vehicle);
        }
        for vehicle in engine.departed_vehicles()? {
            let route = engine.vehicle_route(&vehicle)?;
            let vehicle_type = engine.vehicle_type(&vehicle)?;
            self.add_vehicle(network, &vehicle, &vehicle_type, route)?;
        }
        Ok(())
    }

    /// Recomputes the route of every managed vehicle approaching a junction
    /// and writes it to the engine. Returns the number of routes written.
    pub fn reroute<E: SimulationEngine + ?Sized>(
        &mut self,
        network: &Network,
        router: &mut Router,
        engine: &mut E,
    ) -> Result<usize> {
        let mut written = 0;

        for (edge_name, vehicles) in engine.approaching_vehicles()? {
            let edge = network.edge_id(&edge_name)?;
            for vehicle in vehicles {
                let Some(record) = self.vehicles.get_mut(&vehicle) else {
                    trace!("Ignoring untracked vehicle {}", vehicle);
                    continue;
                };
                let Some(mode) = record.mode else {
                    continue;
                };
                if record.destination == edge {
                    continue;
                }

                let alpha = record.alpha.unwrap_or(self.default_alpha);
                match router.route(network, mode, edge, Destination::Edge(record.destination), alpha) {
                    Some(route) => {
                        let names = route
                            .iter()
                            .map(|edge| network.edge(*edge).name.clone())
                            .collect::<Vec<_>>();
                        engine.set_vehicle_route(&vehicle, &names)?;
                        debug!("Rerouted {} via {:?}", vehicle, names);
                        record.route = names;
                        written += 1;
                    }
                    None => warn!(
                        "Vehicle {} cannot reach {} from {}",
                        vehicle,
                        network.edge(record.destination).name,
                        edge_name
                    ),
                }
            }
        }

        self.reroutes += written;
        Ok(written)
    }

    pub fn get(&self, id: &str) -> Option<&VehicleRecord> {
        self.vehicles.get(id)
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

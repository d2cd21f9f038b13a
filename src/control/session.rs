//! Per-tick control loop tying routing and signal control to the engine

use anyhow::Result;
use log::{debug, info};
use std::rc::Rc;

use super::config::{ControllerConfig, RoutingConfig};
use super::engine::SimulationEngine;
use super::fleet::VehicleFleet;
use super::network::Network;
use super::router::Router;
use super::shortest_paths::JunctionPathTable;
use super::signals::{GreenTimeController, IntersectionControllerContainer, QueueController};

/// Totals of a finished run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub reroutes: usize,
    /// Engine time when the run stopped
    pub end_time: f64,
}

/// Drives an engine one step at a time with optional dynamic routing and
/// optional adaptive signals
pub struct ControlSession {
    network: Network,
    routing: Option<(Router, VehicleFleet)>,
    signals: Option<IntersectionControllerContainer>,
    steps: u64,
}

impl ControlSession {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            routing: None,
            signals: None,
            steps: 0,
        }
    }

    /// Enables dynamic routing with a freshly built shortest-path table
    pub fn with_routing(mut self, config: &RoutingConfig) -> Self {
        let router = Router::new(&self.network, config);
        self.routing = Some((router, VehicleFleet::new(config)));
        self
    }

    /// Enables dynamic routing over a previously built table
    pub fn with_routing_table(mut self, table: JunctionPathTable, config: &RoutingConfig) -> Result<Self> {
        let router = Router::with_table(&self.network, table, config)?;
        self.routing = Some((router, VehicleFleet::new(config)));
        Ok(self)
    }

    /// Puts every signalised junction under adaptive control
    pub fn with_signals(
        mut self,
        config: &ControllerConfig,
        green_time_policy: Rc<dyn GreenTimeController>,
        queue_policy: Rc<dyn QueueController>,
    ) -> Result<Self> {
        let container =
            IntersectionControllerContainer::from_network(&self.network, config, green_time_policy, queue_policy)?;
        self.signals = Some(container);
        Ok(self)
    }

    /// One control step: advance the engine, then sync vehicles, refresh
    /// occupancy once, reroute and update the controllers
    pub fn tick<E: SimulationEngine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        engine.simulation_step()?;
        self.steps += 1;

        if let Some((router, fleet)) = &mut self.routing {
            fleet.sync(&self.network, &*engine)?;
            router.refresh_occupancy(&self.network, &*engine)?;
            let written = fleet.reroute(&self.network, router, engine)?;
            if written > 0 {
                debug!("Step {}: rerouted {} vehicles", self.steps, written);
            }
        }

        if let Some(signals) = &mut self.signals {
            signals.update_all(engine)?;
        }
        Ok(())
    }

    /// Ticks until the engine has no pending vehicles or reaches `end_time`
    pub fn run<E: SimulationEngine + ?Sized>(&mut self, engine: &mut E, end_time: f64) -> Result<RunSummary> {
        let start = self.steps;
        while engine.pending_vehicle_count()? > 0 && engine.time()? < end_time {
            self.tick(engine)?;
        }

        let summary = RunSummary {
            steps: self.steps - start,
            reroutes: self.fleet().map(|fleet| fleet.reroutes).unwrap_or(0),
            end_time: engine.time()?,
        };
        info!(
            "Run finished after {} steps at t={:.1}s with {} reroutes",
            summary.steps, summary.end_time, summary.reroutes
        );
        Ok(summary)
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn router(&self) -> Option<&Router> {
        self.routing.as_ref().map(|(router, _)| router)
    }

    pub fn fleet(&self) -> Option<&VehicleFleet> {
        self.routing.as_ref().map(|(_, fleet)| fleet)
    }

    pub fn signals(&self) -> Option<&IntersectionControllerContainer> {
        self.signals.as_ref()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }
}

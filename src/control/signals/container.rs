//! Builds and steps the controllers of every signalised junction

use anyhow::{Context, Result};
use log::info;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::controller::IntersectionController;
use super::green_time::GreenTimeController;
use super::queue_policy::QueueController;
use crate::control::config::ControllerConfig;
use crate::control::engine::SimulationEngine;
use crate::control::network::Network;

/// Every intersection controller of a run, keyed by junction name
#[derive(Default)]
pub struct IntersectionControllerContainer {
    controllers: BTreeMap<String, IntersectionController>,
}

impl IntersectionControllerContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// One controller per signalised junction not listed in `config.exclude`,
    /// all sharing the same two policies
    pub fn from_network(
        network: &Network,
        config: &ControllerConfig,
        green_time_policy: Rc<dyn GreenTimeController>,
        queue_policy: Rc<dyn QueueController>,
    ) -> Result<Self> {
        let mut container = Self::new();
        for (index, signal) in network.signals().iter().enumerate() {
            let name = &network.junction(signal.junction).name;
            if config.exclude.contains(name) {
                info!("Leaving {} to its static program", name);
                continue;
            }

            let seed = config.seed.map(|seed| seed.wrapping_add(index as u64));
            let controller = IntersectionController::new(
                network,
                signal,
                config,
                Rc::clone(&green_time_policy),
                Rc::clone(&queue_policy),
                seed,
            )
            .with_context(|| format!("Failed to build the controller of {}", name))?;

            info!(
                "Controlling {} with {} phases over {} links ({}, {})",
                name,
                controller.phase_count(),
                controller.link_count(),
                queue_policy.name(),
                green_time_policy.name()
            );
            container.add(controller);
        }
        Ok(container)
    }

    pub fn add(&mut self, controller: IntersectionController) {
        self.controllers.insert(controller.name().to_string(), controller);
    }

    /// Steps every controller once
    pub fn update_all<E: SimulationEngine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        for controller in self.controllers.values_mut() {
            controller.update(engine)?;
        }
        Ok(())
    }

    pub fn get(&self, junction: &str) -> Option<&IntersectionController> {
        self.controllers.get(junction)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntersectionController> {
        self.controllers.values()
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

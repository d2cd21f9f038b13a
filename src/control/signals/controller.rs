//! Adaptive controller of one signalised junction
//!
//! The controller alternates between a green phase and an amber
//! transition. When a green phase runs out it takes a snapshot of the
//! queues, lets the green-time policy resize the phase just served and the
//! queue policy pick the next one, and bridges the two with an amber string.

use anyhow::{bail, Result};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use super::green_time::GreenTimeController;
use super::phase::{green_phases, PhaseMatrix, PhaseString};
use super::queue_policy::QueueController;
use crate::control::config::ControllerConfig;
use crate::control::engine::SimulationEngine;
use crate::control::network::{Network, SignalizedJunction};
use crate::control::types::{JunctionId, TurnDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalState {
    Green,
    Amber,
}

/// Sliding-window mean of a per-step count
#[derive(Debug, Clone)]
pub struct RateEstimate {
    window: usize,
    samples: VecDeque<f64>,
    mean: f64,
}

impl RateEstimate {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            samples: VecDeque::new(),
            mean: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.samples.push_back(value);
        if self.samples.len() > self.window {
            if let Some(oldest) = self.samples.pop_front() {
                self.mean += (value - oldest) / self.window as f64;
            }
        } else {
            let n = self.samples.len() as f64;
            self.mean = self.mean * (n - 1.0) / n + value / n;
        }
    }

    /// Mean count per step
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

/// Green time assigned to a phase when it ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreenTimeRecord {
    /// Controller time in seconds
    pub time: f64,
    pub phase: usize,
    pub green_time: f64,
}

/// Static link structure of a junction
#[derive(Debug, Clone)]
struct LinkLayout {
    in_lanes: Vec<String>,
    out_lanes: Vec<String>,
    directions: Vec<TurnDirection>,
    /// Distinct incoming lanes in link order
    incoming: Vec<String>,
    links_by_in_lane: HashMap<String, Vec<usize>>,
    /// in lane -> outgoing edge -> links
    links_by_out_edge: HashMap<String, HashMap<String, Vec<usize>>>,
}

impl LinkLayout {
    fn new(network: &Network, signal: &SignalizedJunction) -> Self {
        let mut layout = LinkLayout {
            in_lanes: Vec::with_capacity(signal.links.len()),
            out_lanes: Vec::with_capacity(signal.links.len()),
            directions: Vec::with_capacity(signal.links.len()),
            incoming: Vec::new(),
            links_by_in_lane: HashMap::new(),
            links_by_out_edge: HashMap::new(),
        };

        for (index, link) in signal.links.iter().enumerate() {
            let in_lane = network.lane(link.in_lane).name.clone();
            let out_lane = network.lane(link.out_lane);
            let out_edge = network.edge(out_lane.edge).name.clone();

            if !layout.links_by_in_lane.contains_key(&in_lane) {
                layout.incoming.push(in_lane.clone());
            }
            layout.links_by_in_lane.entry(in_lane.clone()).or_default().push(index);
            layout
                .links_by_out_edge
                .entry(in_lane.clone())
                .or_default()
                .entry(out_edge)
                .or_default()
                .push(index);

            layout.in_lanes.push(in_lane);
            layout.out_lanes.push(out_lane.name.clone());
            layout.directions.push(link.direction);
        }
        layout
    }
}

pub struct IntersectionController {
    name: String,
    junction: JunctionId,
    layout: LinkLayout,
    phases: Vec<PhaseString>,
    matrix: PhaseMatrix,

    step_length: f64,
    amber_length: f64,
    same_phase_amber_length: f64,
    target_fraction: f64,
    min_gap: f64,
    default_vehicle_length: f64,

    state: SignalState,
    started: bool,
    clock: f64,
    current_phase: usize,
    current_string: PhaseString,
    next_string: PhaseString,
    green_timer: f64,
    amber_timer: f64,
    green_times: Vec<f64>,
    history: Vec<GreenTimeRecord>,

    queue_lengths: Vec<f64>,
    capacities: Vec<f64>,
    waiting_times: Vec<f64>,
    max_waiting_times: Vec<f64>,
    lane_occupancy: HashMap<String, f64>,
    /// Vehicles the current phase should release (`a`)
    target: f64,
    /// Vehicles released so far in the current phase (`b`)
    released: f64,
    last_sample: HashMap<String, HashSet<String>>,
    departures: HashMap<String, RateEstimate>,
    arrivals: HashMap<String, RateEstimate>,

    queue_policy: Rc<dyn QueueController>,
    green_time_policy: Rc<dyn GreenTimeController>,
    rng: RefCell<StdRng>,
}

impl IntersectionController {
    pub fn new(
        network: &Network,
        signal: &SignalizedJunction,
        config: &ControllerConfig,
        green_time_policy: Rc<dyn GreenTimeController>,
        queue_policy: Rc<dyn QueueController>,
        seed: Option<u64>,
    ) -> Result<Self> {
        let name = network.junction(signal.junction).name.clone();
        let phases = green_phases(&signal.phases);
        if phases.is_empty() {
            bail!("Signal program of {} has no green phase", name);
        }
        let matrix = PhaseMatrix::from_phases(&phases, config.give_way_discount);
        let layout = LinkLayout::new(network, signal);
        let links = layout.in_lanes.len();

        let window = config.rate_window_steps();
        let rates = || -> HashMap<String, RateEstimate> {
            layout
                .incoming
                .iter()
                .map(|lane| (lane.clone(), RateEstimate::new(window)))
                .collect()
        };
        let departures = rates();
        let arrivals = rates();

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let initial_green = green_time_policy.initial_green_time();

        let mut controller = Self {
            name,
            junction: signal.junction,
            phases,
            matrix,
            step_length: config.step_length,
            amber_length: config.amber_length,
            same_phase_amber_length: config.same_phase_amber_length,
            target_fraction: config.target_fraction,
            min_gap: config.min_gap,
            default_vehicle_length: config.default_vehicle_length,
            state: SignalState::Green,
            started: false,
            clock: 0.0,
            current_phase: 0,
            current_string: PhaseString::all_red(links),
            next_string: PhaseString::all_red(links),
            green_timer: 0.0,
            amber_timer: 0.0,
            green_times: Vec::new(),
            history: Vec::new(),
            queue_lengths: vec![0.0; links],
            capacities: vec![0.0; links],
            waiting_times: vec![0.0; links],
            max_waiting_times: vec![0.0; links],
            lane_occupancy: layout.incoming.iter().map(|lane| (lane.clone(), 0.0)).collect(),
            target: 0.0,
            released: 0.0,
            last_sample: HashMap::new(),
            departures,
            arrivals,
            layout,
            queue_policy: Rc::clone(&queue_policy),
            green_time_policy,
            rng: RefCell::new(rng),
        };
        controller.green_times = vec![initial_green; controller.matrix.phase_count()];

        controller.current_phase = queue_policy.best_queue_set(&controller);
        controller.current_string = controller.phases[controller.current_phase].clone();
        controller.next_string = controller.current_string.clone();
        controller.green_timer = controller.green_times[controller.current_phase];
        Ok(controller)
    }

    /// Advances the controller by one simulation step
    pub fn update<E: SimulationEngine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        if !self.started {
            engine.set_phase_string(&self.name, &self.current_string.to_string())?;
            self.reset_samples(&*engine)?;
            self.started = true;
            return Ok(());
        }

        self.clock += self.step_length;
        match self.state {
            SignalState::Green if self.green_timer > 0.0 => {
                self.green_timer -= self.step_length;
                self.sample_lanes(&*engine)?;
            }
            SignalState::Green => self.end_green(engine)?,
            SignalState::Amber if self.amber_timer > 0.0 => {
                self.amber_timer -= self.step_length;
            }
            SignalState::Amber => {
                self.current_string = self.next_string.clone();
                engine.set_phase_string(&self.name, &self.current_string.to_string())?;
                self.green_timer = self.green_times[self.current_phase];
                self.state = SignalState::Green;
                self.reset_samples(&*engine)?;
            }
        }
        Ok(())
    }

    fn end_green<E: SimulationEngine + ?Sized>(&mut self, engine: &mut E) -> Result<()> {
        self.observe(&*engine)?;
        self.sample_lanes(&*engine)?;

        let green_time_policy = Rc::clone(&self.green_time_policy);
        if let Some(times) = green_time_policy.phase_green_times(self) {
            if times.len() == self.green_times.len() {
                self.green_times = times;
            }
        }
        let ended = self.current_phase;
        let green_time = green_time_policy.new_green_time(self);
        self.green_times[ended] = green_time;
        self.history.push(GreenTimeRecord {
            time: self.clock,
            phase: ended,
            green_time,
        });

        let queue_policy = Rc::clone(&self.queue_policy);
        let next = queue_policy.best_queue_set(self);
        let next_string = self.phases[next].clone();

        let (amber, amber_length) = if next_string == self.current_string {
            (next_string.clone(), self.same_phase_amber_length)
        } else {
            (self.current_string.amber_towards(&next_string), self.amber_length)
        };
        engine.set_phase_string(&self.name, &amber.to_string())?;
        debug!(
            "{}: phase {} -> {} via {} (green {:.1}s)",
            self.name, ended, next, amber, self.green_times[next]
        );

        self.current_phase = next;
        self.current_string = amber;
        self.next_string = next_string;
        self.target = self.target_release(next);
        self.released = 0.0;
        self.amber_timer = amber_length;
        self.state = SignalState::Amber;
        Ok(())
    }

    /// Vehicles phase `phase` should release: x* times its weighted queues
    fn target_release(&self, phase: usize) -> f64 {
        self.target_fraction * self.matrix.dot(phase, &self.queue_lengths)
    }

    /// Refreshes queues, free capacities, waiting times and lane occupancy
    fn observe<E: SimulationEngine + ?Sized>(&mut self, engine: &E) -> Result<()> {
        let links = self.layout.in_lanes.len();
        let mut queues = vec![0.0; links];
        let mut waiting = vec![0.0; links];
        let mut max_waiting = vec![0.0_f64; links];

        for lane in &self.layout.incoming {
            let vehicles = engine.lane_vehicle_ids(lane)?;
            self.lane_occupancy.insert(lane.clone(), engine.lane_occupancy(lane)?);

            for vehicle in vehicles {
                let used = self.links_for_vehicle(engine, lane, &vehicle)?;
                let wait = engine.vehicle_waiting_time(&vehicle)?;
                for link in used {
                    queues[link] += 1.0;
                    waiting[link] += wait;
                    max_waiting[link] = max_waiting[link].max(wait);
                }
            }
        }

        let mut capacities = vec![0.0; links];
        let mut free_space: HashMap<&str, f64> = HashMap::new();
        for (link, lane) in self.layout.out_lanes.iter().enumerate() {
            let space = match free_space.get(lane.as_str()) {
                Some(space) => *space,
                None => {
                    let space = self.free_spaces(engine, lane)?;
                    free_space.insert(lane.as_str(), space);
                    space
                }
            };
            capacities[link] = space;
        }

        self.queue_lengths = queues;
        self.waiting_times = waiting;
        self.max_waiting_times = max_waiting;
        self.capacities = capacities;
        Ok(())
    }

    /// Links a queued vehicle will use, from the next edge of its route.
    /// Vehicles with an unknown next edge count towards every link of their lane.
    fn links_for_vehicle<E: SimulationEngine + ?Sized>(
        &self,
        engine: &E,
        lane: &str,
        vehicle: &str,
    ) -> Result<Vec<usize>> {
        let route = engine.vehicle_route(vehicle)?;
        let current = engine.vehicle_edge(vehicle)?;

        let mut positions = route.iter().enumerate().filter(|(_, edge)| **edge == current);
        let next_edge = match (positions.next(), positions.next()) {
            (Some((index, _)), None) => route.get(index + 1),
            _ => None,
        };

        let by_edge = self.layout.links_by_out_edge.get(lane);
        let links = match (next_edge, by_edge) {
            (Some(edge), Some(by_edge)) => by_edge.get(edge).cloned().unwrap_or_default(),
            _ => self.layout.links_by_in_lane.get(lane).cloned().unwrap_or_default(),
        };
        Ok(links)
    }

    /// Vehicles that still fit on a lane, never negative
    fn free_spaces<E: SimulationEngine + ?Sized>(&self, engine: &E, lane: &str) -> Result<f64> {
        let length = engine.lane_length(lane)?;
        let count = engine.lane_vehicle_ids(lane)?.len() as f64;
        let mut vehicle_length = engine.lane_mean_vehicle_length(lane)?;
        if vehicle_length <= 0.0 {
            vehicle_length = self.default_vehicle_length;
        }
        let spaces = (length / (vehicle_length + self.min_gap)).floor() - count;
        Ok(spaces.max(0.0))
    }

    /// Records the vehicles of the open lanes without counting them
    fn reset_samples<E: SimulationEngine + ?Sized>(&mut self, engine: &E) -> Result<()> {
        self.last_sample.clear();
        for lane in self.open_lanes(self.current_phase) {
            let vehicles = engine.lane_vehicle_ids(&lane)?.into_iter().collect();
            self.last_sample.insert(lane, vehicles);
        }
        Ok(())
    }

    /// Diffs the vehicles of every open lane against the previous sample,
    /// counting departures towards `b` and feeding the rate estimates
    fn sample_lanes<E: SimulationEngine + ?Sized>(&mut self, engine: &E) -> Result<()> {
        for lane in self.open_lanes(self.current_phase) {
            let now: HashSet<String> = engine.lane_vehicle_ids(&lane)?.into_iter().collect();
            let (departed, arrived) = match self.last_sample.get(&lane) {
                Some(before) => (before.difference(&now).count(), now.difference(before).count()),
                None => (0, 0),
            };

            self.released += departed as f64;
            if let Some(rate) = self.departures.get_mut(&lane) {
                rate.push(departed as f64);
            }
            if let Some(rate) = self.arrivals.get_mut(&lane) {
                rate.push(arrived as f64);
            }
            self.last_sample.insert(lane, now);
        }
        Ok(())
    }

    /// Picks one of `candidates` uniformly with the controller's RNG
    pub fn choose_among(&self, candidates: &[usize]) -> Option<usize> {
        candidates.choose(&mut *self.rng.borrow_mut()).copied()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn junction(&self) -> JunctionId {
        self.junction
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Seconds since the first update
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn phase_matrix(&self) -> &PhaseMatrix {
        &self.matrix
    }

    pub fn phases(&self) -> &[PhaseString] {
        &self.phases
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn link_count(&self) -> usize {
        self.layout.in_lanes.len()
    }

    pub fn current_phase(&self) -> usize {
        self.current_phase
    }

    /// Light string last sent to the engine
    pub fn current_string(&self) -> &PhaseString {
        &self.current_string
    }

    pub fn green_timer(&self) -> f64 {
        self.green_timer
    }

    pub fn amber_timer(&self) -> f64 {
        self.amber_timer
    }

    pub fn green_time(&self, phase: usize) -> f64 {
        self.green_times[phase]
    }

    pub fn green_times(&self) -> &[f64] {
        &self.green_times
    }

    pub fn history(&self) -> &[GreenTimeRecord] {
        &self.history
    }

    pub fn queue_lengths(&self) -> &[f64] {
        &self.queue_lengths
    }

    /// Free vehicle spaces on the outgoing lane of every link
    pub fn capacities(&self) -> &[f64] {
        &self.capacities
    }

    /// Summed waiting time of the vehicles queued for every link
    pub fn waiting_times(&self) -> &[f64] {
        &self.waiting_times
    }

    /// Longest single waiting time per link
    pub fn max_waiting_times(&self) -> &[f64] {
        &self.max_waiting_times
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn released(&self) -> f64 {
        self.released
    }

    pub fn target_fraction(&self) -> f64 {
        self.target_fraction
    }

    pub fn incoming_lanes(&self) -> &[String] {
        &self.layout.incoming
    }

    pub fn in_lane(&self, link: usize) -> &str {
        &self.layout.in_lanes[link]
    }

    pub fn out_lane(&self, link: usize) -> &str {
        &self.layout.out_lanes[link]
    }

    pub fn direction(&self, link: usize) -> TurnDirection {
        self.layout.directions[link]
    }

    /// Both links feed the same outgoing lane
    pub fn share_out_lane(&self, a: usize, b: usize) -> bool {
        self.layout.out_lanes[a] == self.layout.out_lanes[b]
    }

    pub fn lane_occupancy(&self, lane: &str) -> f64 {
        self.lane_occupancy.get(lane).copied().unwrap_or(0.0)
    }

    /// Distinct incoming lanes green in a phase, in link order
    pub fn open_lanes(&self, phase: usize) -> Vec<String> {
        let mut lanes: Vec<String> = Vec::new();
        for link in self.matrix.open_links(phase) {
            let lane = &self.layout.in_lanes[link];
            if !lanes.contains(lane) {
                lanes.push(lane.clone());
            }
        }
        lanes
    }

    /// Departure rate of a lane in vehicles per second
    pub fn departure_rate(&self, lane: &str) -> f64 {
        self.departures
            .get(lane)
            .map(|rate| rate.mean() / self.step_length)
            .unwrap_or(0.0)
    }

    /// Arrival rate of a lane in vehicles per second
    pub fn arrival_rate(&self, lane: &str) -> f64 {
        self.arrivals
            .get(lane)
            .map(|rate| rate.mean() / self.step_length)
            .unwrap_or(0.0)
    }
}

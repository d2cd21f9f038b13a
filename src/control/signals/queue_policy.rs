//! Queue-selection policies: which phase gets the next green

use log::warn;

use super::controller::IntersectionController;
use super::phase::PhaseMatrix;

/// Benefits closer than this count as a tie
const TIE_TOLERANCE: f64 = 1e-9;

/// Strategy choosing the next phase of a controller
pub trait QueueController {
    fn name(&self) -> &str;

    /// Chooses a phase index using `phases` in place of the controller's own
    /// matrix, so decorators can restrict the choice
    fn select_phase(&self, controller: &IntersectionController, phases: &PhaseMatrix) -> usize;

    fn best_queue_set(&self, controller: &IntersectionController) -> usize {
        self.select_phase(controller, controller.phase_matrix())
    }
}

/// Highest-benefit phase with random tie-breaking.
///
/// Without any positive benefit the lowest-index feasible phase of `phases`
/// wins, so a controller never stalls.
pub fn pick_best(controller: &IntersectionController, phases: &PhaseMatrix, benefits: &[f64]) -> usize {
    let best = benefits
        .iter()
        .copied()
        .filter(|benefit| benefit.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if best <= 0.0 {
        return phases.first_feasible().unwrap_or(0);
    }

    let candidates = benefits
        .iter()
        .enumerate()
        .filter(|(_, benefit)| (best - **benefit).abs() <= TIE_TOLERANCE)
        .map(|(phase, _)| phase)
        .collect::<Vec<_>>();
    controller
        .choose_among(&candidates)
        .unwrap_or_else(|| phases.first_feasible().unwrap_or(0))
}

/// Serves the phase with the largest weighted queue
#[derive(Debug, Default, Clone, Copy)]
pub struct MaxQueue;

impl QueueController for MaxQueue {
    fn name(&self) -> &str {
        "max-queue"
    }

    fn select_phase(&self, controller: &IntersectionController, phases: &PhaseMatrix) -> usize {
        let benefits = phases.dot_all(controller.queue_lengths());
        pick_best(controller, phases, &benefits)
    }
}

/// Max-queue over the summed waiting time of every link instead of its
/// vehicle count
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitTimeMaxQueue;

impl QueueController for WaitTimeMaxQueue {
    fn name(&self) -> &str {
        "wait-time-max-queue"
    }

    fn select_phase(&self, controller: &IntersectionController, phases: &PhaseMatrix) -> usize {
        let benefits = phases.dot_all(controller.waiting_times());
        pick_best(controller, phases, &benefits)
    }
}

/// Max-queue that ignores links whose outgoing lane has no room left
#[derive(Debug, Default, Clone, Copy)]
pub struct CongestionAware;

impl CongestionAware {
    /// `phases` with every link into a full lane forced red
    pub fn discount(controller: &IntersectionController, phases: &PhaseMatrix) -> PhaseMatrix {
        let capacities = controller.capacities();
        phases.mask_links(|link| capacities[link] >= 1.0)
    }
}

impl QueueController for CongestionAware {
    fn name(&self) -> &str {
        "congestion-aware"
    }

    fn select_phase(&self, controller: &IntersectionController, phases: &PhaseMatrix) -> usize {
        let discounted = Self::discount(controller, phases);
        let benefits = discounted.dot_all(controller.queue_lengths());
        pick_best(controller, phases, &benefits)
    }
}

/// Maximises the demand a phase can actually serve.
///
/// Links of a phase that feed the same outgoing lane compete for its free
/// space: their combined queue is bounded by that space and shared out
/// evenly between them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemandCapacity;

impl DemandCapacity {
    /// Served demand of every phase
    pub fn benefits(controller: &IntersectionController, phases: &PhaseMatrix) -> Vec<f64> {
        let queues = controller.queue_lengths();
        let capacities = controller.capacities();
        let links = phases.link_count();

        (0..phases.phase_count())
            .map(|phase| {
                let open = |link: usize| phases.is_open(phase, link);
                let mut benefit = 0.0;
                for link in (0..links).filter(|link| open(*link)) {
                    let sharing = (0..links)
                        .filter(|other| open(*other) && controller.share_out_lane(link, *other))
                        .collect::<Vec<_>>();
                    let demand: f64 = sharing.iter().map(|other| queues[*other]).sum();
                    let bounded = demand.min(capacities[link]);
                    let share = bounded / sharing.len() as f64;
                    benefit += phases.weight(phase, link) * share;
                }
                benefit
            })
            .collect()
    }
}

impl QueueController for DemandCapacity {
    fn name(&self) -> &str {
        "demand-capacity"
    }

    fn select_phase(&self, controller: &IntersectionController, phases: &PhaseMatrix) -> usize {
        let benefits = Self::benefits(controller, phases);
        pick_best(controller, phases, &benefits)
    }
}

/// Occupancy transform of the pressure policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureShape {
    Linear,
    /// `4 * occ^4`, favours nearly full lanes
    Convex,
}

/// Serves the phase whose open incoming lanes are the most occupied
#[derive(Debug, Clone, Copy)]
pub struct OccupancyPressure {
    pub shape: PressureShape,
}

impl OccupancyPressure {
    pub fn linear() -> Self {
        Self {
            shape: PressureShape::Linear,
        }
    }

    pub fn convex() -> Self {
        Self {
            shape: PressureShape::Convex,
        }
    }

    fn pressure(&self, occupancy: f64) -> f64 {
        match self.shape {
            PressureShape::Linear => occupancy,
            PressureShape::Convex => 4.0 * occupancy.powi(4),
        }
    }
}

impl QueueController for OccupancyPressure {
    fn name(&self) -> &str {
        match self.shape {
            PressureShape::Linear => "occupancy-linear",
            PressureShape::Convex => "occupancy-convex",
        }
    }

    fn select_phase(&self, controller: &IntersectionController, phases: &PhaseMatrix) -> usize {
        let benefits = (0..phases.phase_count())
            .map(|phase| {
                let mut lanes: Vec<&str> = Vec::new();
                for link in phases.open_links(phase) {
                    let lane = controller.in_lane(link);
                    if !lanes.contains(&lane) {
                        lanes.push(lane);
                    }
                }
                lanes
                    .into_iter()
                    .map(|lane| self.pressure(controller.lane_occupancy(lane)))
                    .sum()
            })
            .collect::<Vec<f64>>();
        pick_best(controller, phases, &benefits)
    }
}

/// Cycles through the feasible phases in order
#[derive(Debug, Default, Clone, Copy)]
pub struct Alternating;

impl QueueController for Alternating {
    fn name(&self) -> &str {
        "alternating"
    }

    fn select_phase(&self, controller: &IntersectionController, phases: &PhaseMatrix) -> usize {
        let count = phases.phase_count();
        (1..=count)
            .map(|offset| (controller.current_phase() + offset) % count.max(1))
            .find(|phase| phases.is_feasible(*phase))
            .unwrap_or(0)
    }
}

/// Forces service for any vehicle that has waited longer than `max_wait`.
///
/// The link with the longest such wait restricts the choice to the phases
/// that open it; the wrapped policy picks among those.
pub struct DeadlockDetecting {
    pub max_wait: f64,
    pub inner: Box<dyn QueueController>,
}

impl DeadlockDetecting {
    pub fn new(max_wait: f64, inner: Box<dyn QueueController>) -> Self {
        Self { max_wait, inner }
    }

    /// Link holding the longest wait above the ceiling
    pub fn starved_link(&self, controller: &IntersectionController) -> Option<usize> {
        controller
            .max_waiting_times()
            .iter()
            .enumerate()
            .filter(|(_, wait)| **wait > self.max_wait)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(link, _)| link)
    }
}

impl QueueController for DeadlockDetecting {
    fn name(&self) -> &str {
        "deadlock-detecting"
    }

    fn select_phase(&self, controller: &IntersectionController, phases: &PhaseMatrix) -> usize {
        let Some(link) = self.starved_link(controller) else {
            return self.inner.select_phase(controller, phases);
        };

        let restricted = phases.only_phases_opening(link);
        if restricted.first_feasible().is_none() {
            return self.inner.select_phase(controller, phases);
        }

        warn!(
            "{}: link {} waited {:.1}s, forcing a phase that serves it",
            controller.name(),
            link,
            controller.max_waiting_times()[link]
        );
        let phase = self.inner.select_phase(controller, &restricted);
        if restricted.is_feasible(phase) {
            phase
        } else {
            restricted.first_feasible().unwrap_or(phase)
        }
    }
}

//! Green-time policies: how long a phase stays green next time
//!
//! Every policy compares what the phase was supposed to release (`a`)
//! with what it actually released (`b`), or sizes the phase from live
//! arrival and departure rates.

use super::controller::IntersectionController;

/// Strategy resizing the green time of the phase that just ended
pub trait GreenTimeController {
    fn name(&self) -> &str;

    /// Green time every phase starts with
    fn initial_green_time(&self) -> f64;

    /// New green time of the controller's current (just ended) phase
    fn new_green_time(&self, controller: &IntersectionController) -> f64;

    /// Green times of all phases at once, for policies that size every phase
    fn phase_green_times(&self, _controller: &IntersectionController) -> Option<Vec<f64>> {
        None
    }
}

/// Moves halfway towards the minimum when the phase over-served its target
/// and halfway towards the maximum when it under-served
#[derive(Debug, Clone, Copy)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl GreenTimeController for MinMax {
    fn name(&self) -> &str {
        "min-max"
    }

    fn initial_green_time(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    fn new_green_time(&self, controller: &IntersectionController) -> f64 {
        let current = controller.green_time(controller.current_phase());
        let (target, released) = (controller.target(), controller.released());
        if released > target {
            (current + self.min) / 2.0
        } else if released < target {
            (current + self.max) / 2.0
        } else {
            current
        }
    }
}

/// `G + K * ((a - b) / a) * G`, clamped to `[min, max]`
#[derive(Debug, Clone, Copy)]
pub struct Proportional {
    pub gain: f64,
    pub initial: f64,
    pub min: f64,
    pub max: f64,
}

impl Proportional {
    pub fn new(gain: f64, initial: f64, min: f64, max: f64) -> Self {
        Self { gain, initial, min, max }
    }
}

impl GreenTimeController for Proportional {
    fn name(&self) -> &str {
        "proportional"
    }

    fn initial_green_time(&self) -> f64 {
        self.initial
    }

    fn new_green_time(&self, controller: &IntersectionController) -> f64 {
        let current = controller.green_time(controller.current_phase());
        let target = controller.target();
        let error = if target != 0.0 {
            (target - controller.released()) / target * current
        } else {
            0.0
        };
        (current + self.gain * error).clamp(self.min, self.max)
    }
}

/// Sizes every phase as its target queue over the net service rate of
/// its open lanes, clamped to `[min, max]`.
///
/// An empty target gets `min`; a queue that is not shrinking gets `max`.
#[derive(Debug, Clone, Copy)]
pub struct ModelBased {
    pub min: f64,
    pub max: f64,
}

impl ModelBased {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    fn phase_time(&self, controller: &IntersectionController, phase: usize) -> f64 {
        let target = controller.target_fraction() * controller.phase_matrix().dot(phase, controller.queue_lengths());
        if target <= 0.0 {
            return self.min;
        }

        let lanes = controller.open_lanes(phase);
        let service: f64 = lanes.iter().map(|lane| controller.departure_rate(lane)).sum();
        let arrival: f64 = lanes.iter().map(|lane| controller.arrival_rate(lane)).sum();
        let net = service - arrival;
        if net <= 0.0 {
            return self.max;
        }
        (target / net).clamp(self.min, self.max)
    }
}

impl GreenTimeController for ModelBased {
    fn name(&self) -> &str {
        "model-based"
    }

    fn initial_green_time(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    fn new_green_time(&self, controller: &IntersectionController) -> f64 {
        self.phase_time(controller, controller.current_phase())
    }

    fn phase_green_times(&self, controller: &IntersectionController) -> Option<Vec<f64>> {
        Some(
            (0..controller.phase_count())
                .map(|phase| self.phase_time(controller, phase))
                .collect(),
        )
    }
}

/// Splits a fixed cycle `period` between phases by their share of the
/// total arrival rate; an even split when nothing arrives
#[derive(Debug, Clone, Copy)]
pub struct InflowRatio {
    pub period: f64,
    pub initial: f64,
}

impl InflowRatio {
    pub fn new(period: f64, initial: f64) -> Self {
        Self { period, initial }
    }

    fn phase_inflows(controller: &IntersectionController) -> Vec<f64> {
        (0..controller.phase_count())
            .map(|phase| {
                controller
                    .open_lanes(phase)
                    .iter()
                    .map(|lane| controller.arrival_rate(lane))
                    .sum()
            })
            .collect()
    }
}

impl GreenTimeController for InflowRatio {
    fn name(&self) -> &str {
        "inflow-ratio"
    }

    fn initial_green_time(&self) -> f64 {
        self.initial
    }

    fn new_green_time(&self, controller: &IntersectionController) -> f64 {
        self.phase_green_times(controller)
            .and_then(|times| times.get(controller.current_phase()).copied())
            .unwrap_or(self.initial)
    }

    fn phase_green_times(&self, controller: &IntersectionController) -> Option<Vec<f64>> {
        let inflows = Self::phase_inflows(controller);
        let total: f64 = inflows.iter().sum();
        let count = inflows.len().max(1) as f64;
        Some(
            inflows
                .iter()
                .map(|inflow| {
                    if total > 0.0 {
                        self.period * inflow / total
                    } else {
                        self.period / count
                    }
                })
                .collect(),
        )
    }
}

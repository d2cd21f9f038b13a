//! Adaptive traffic-signal control

pub mod container;
pub mod controller;
pub mod green_time;
pub mod phase;
pub mod queue_policy;

pub use container::IntersectionControllerContainer;
pub use controller::{GreenTimeRecord, IntersectionController, RateEstimate, SignalState};
pub use green_time::{GreenTimeController, InflowRatio, MinMax, ModelBased, Proportional};
pub use phase::{green_phases, Light, PhaseMatrix, PhaseString};
pub use queue_policy::{
    pick_best, Alternating, CongestionAware, DeadlockDetecting, DemandCapacity, MaxQueue, OccupancyPressure,
    PressureShape, QueueController, WaitTimeMaxQueue,
};

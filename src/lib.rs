//! Traffic Decision Library
//!
//! Routing and signal-control decisions for a microscopic traffic
//! simulation, computed once per simulation step.

pub mod control;

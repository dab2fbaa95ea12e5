//! Grid Traffic Simulation Library
//!
//! A headless traffic simulation on a grid city: routed agents and
//! wandering transports competing for cells.

pub mod simulation;

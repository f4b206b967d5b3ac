//! Per-vehicle agent tying a value engine to the simulator.
mod base;
mod config;
pub use base::DroneAgent;
pub use config::DroneAgentConfig;

//! Value estimation and parameter averaging for drone agents, implemented with
//! [candle](https://crates.io/crates/candle-core).
//!
//! * [`ValueEngine`] owns one Q-network with its optimizer.
//! * [`ParameterVector`] is a deep copy of the parameters of a network.
//! * [`ParameterAveragingSync`] reconciles the networks of a cohort of agents.
//! * [`DroneAgent`] ties a value engine to a simulated vehicle.
pub mod agent;
pub mod cnn;
pub mod model;
pub mod opt;
mod parameters;
pub mod store;
pub mod sync;
pub mod util;
pub mod value_engine;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

pub use agent::{DroneAgent, DroneAgentConfig};
pub use parameters::ParameterVector;
pub use sync::{ParameterAveragingSync, SyncModel};
pub use value_engine::{TrainScope, TrainStats, ValueEngine, ValueEngineConfig};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Default for Device {
    fn default() -> Self {
        Self::Cpu
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = anyhow::Error;

    fn try_from(device: Device) -> Result<Self> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}

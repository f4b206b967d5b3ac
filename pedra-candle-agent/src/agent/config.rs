//! Configuration of [`DroneAgent`](super::DroneAgent).
use crate::{cnn::CnnConfig, ValueEngineConfig};
use anyhow::Result;
use pedra_core::{sim::DepthConfig, GeometryConfig, MotionMode, RewardConfig};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// Configuration of [`DroneAgent`](super::DroneAgent).
///
/// `num_actions` overrides the output dimension of the Q-network.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DroneAgentConfig {
    pub(super) geometry: GeometryConfig,
    pub(super) reward: RewardConfig,
    pub(super) depth: DepthConfig,
    pub(super) value_engine: ValueEngineConfig<CnnConfig>,
    pub(super) num_actions: usize,
    pub(super) motion_mode: MotionMode,
    pub(super) seed: u64,

    /// Parameters loaded when the agent is built.
    pub(super) custom_load: Option<PathBuf>,
}

impl Default for DroneAgentConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryConfig::default(),
            reward: RewardConfig::default(),
            depth: DepthConfig::default(),
            value_engine: ValueEngineConfig::default().q_config(CnnConfig::default()),
            num_actions: 25,
            motion_mode: MotionMode::Discrete,
            seed: 42,
            custom_load: None,
        }
    }
}

impl DroneAgentConfig {
    pub fn geometry(mut self, v: GeometryConfig) -> Self {
        self.geometry = v;
        self
    }

    pub fn reward(mut self, v: RewardConfig) -> Self {
        self.reward = v;
        self
    }

    pub fn depth(mut self, v: DepthConfig) -> Self {
        self.depth = v;
        self
    }

    pub fn value_engine(mut self, v: ValueEngineConfig<CnnConfig>) -> Self {
        self.value_engine = v;
        self
    }

    /// Sets the number of actions, a perfect square.
    pub fn num_actions(mut self, v: usize) -> Self {
        self.num_actions = v;
        self
    }

    pub fn motion_mode(mut self, v: MotionMode) -> Self {
        self.motion_mode = v;
        self
    }

    /// Sets the seed of the jitter of discrete moves.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    pub fn custom_load(mut self, v: impl AsRef<Path>) -> Self {
        self.custom_load = Some(v.as_ref().to_path_buf());
        self
    }

    /// Constructs [`DroneAgentConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DroneAgentConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

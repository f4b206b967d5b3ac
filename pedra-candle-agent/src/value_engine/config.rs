use crate::{cnn::CnnConfig, opt::OptimizerConfig, util::OutDim, Device};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Parameters updated by training steps.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum TrainScope {
    /// All parameters.
    EndToEnd,

    /// Parameters whose names start with one of the prefixes, such as `["fc", "out"]`.
    Only(Vec<String>),
}

impl Default for TrainScope {
    fn default() -> Self {
        Self::EndToEnd
    }
}

impl TrainScope {
    /// Returns `true` if the parameter `name` is trained.
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::EndToEnd => true,
            Self::Only(prefixes) => prefixes.iter().any(|p| name.starts_with(p.as_str())),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`ValueEngine`](super::ValueEngine).
pub struct ValueEngineConfig<Q = CnnConfig>
where
    Q: OutDim,
{
    pub(super) q_config: Option<Q>,
    pub(super) opt_config: OptimizerConfig,
    #[serde(default)]
    pub(super) train_scope: TrainScope,
    #[serde(default)]
    pub(super) device: Device,
}

impl<Q> Default for ValueEngineConfig<Q>
where
    Q: OutDim,
{
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default(),
            train_scope: TrainScope::default(),
            device: Device::default(),
        }
    }
}

impl<Q> ValueEngineConfig<Q>
where
    Q: OutDim + Serialize + for<'de> Deserialize<'de>,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets the number of actions, the output dimension of the network.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(q_config) = &mut self.q_config {
            q_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the parameters updated by training.
    pub fn train_scope(mut self, v: TrainScope) -> Self {
        self.train_scope = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Constructs [`ValueEngineConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ValueEngineConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

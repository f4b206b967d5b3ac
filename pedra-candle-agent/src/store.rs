//! Persistence of parameter vectors keyed by agent identity.
use crate::ParameterVector;
use anyhow::{Context, Result};
use candle_core::Device;
use log::info;
use pedra_core::AgentIdentity;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Saves and loads parameter vectors of agents.
///
/// `tag` names a checkpoint, typically the episode number.
pub trait ParameterStore {
    /// Stores `params` of the agent under `tag`.
    fn save(&self, identity: &AgentIdentity, tag: &str, params: &ParameterVector) -> Result<()>;

    /// Loads the parameters of the agent stored under `tag`.
    fn load(&self, identity: &AgentIdentity, tag: &str, device: &Device)
        -> Result<ParameterVector>;
}

/// Stores parameters as safetensors files under a root directory.
///
/// The file of a checkpoint is `<root>/<vehicle>/<vehicle>_<tag>.safetensors`.
#[derive(Debug, Clone)]
pub struct FileParameterStore {
    root: PathBuf,
}

impl FileParameterStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path of the checkpoint.
    pub fn path(&self, identity: &AgentIdentity, tag: &str) -> PathBuf {
        let vehicle = identity.vehicle_name();
        self.root
            .join(vehicle)
            .join(format!("{}_{}.safetensors", vehicle, tag))
    }
}

impl ParameterStore for FileParameterStore {
    fn save(&self, identity: &AgentIdentity, tag: &str, params: &ParameterVector) -> Result<()> {
        let path = self.path(identity, tag);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        params.save(&path)?;
        info!("Saved parameters of {} to {:?}", identity, path);
        Ok(())
    }

    fn load(
        &self,
        identity: &AgentIdentity,
        tag: &str,
        device: &Device,
    ) -> Result<ParameterVector> {
        let path = self.path(identity, tag);
        let params = ParameterVector::load(&path, device)
            .with_context(|| format!("Failed to load parameters from {:?}", path))?;
        info!("Loaded parameters of {} from {:?}", identity, path);
        Ok(params)
    }
}

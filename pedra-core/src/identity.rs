use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a simulated vehicle and the policy group the agent belongs to.
///
/// `name` is the name of the network the agent trains, shared by every agent of
/// a cohort, and `vehicle_name` is the simulated body the agent drives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct AgentIdentity {
    name: String,
    vehicle_name: String,
}

impl AgentIdentity {
    /// Creates an identity.
    pub fn new(name: impl Into<String>, vehicle_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vehicle_name: vehicle_name.into(),
        }
    }

    /// Name of the network.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the vehicle in the simulator.
    pub fn vehicle_name(&self) -> &str {
        &self.vehicle_name
    }
}

impl fmt::Display for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.vehicle_name)
    }
}

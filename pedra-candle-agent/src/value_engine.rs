//! Value estimation with a Q-network.
//!
//! A [`ValueEngine`] owns its network, its variables and its optimizer. Nothing
//! is shared between engines: two agents built from the same configuration
//! hold independent parameters and are reconciled only through
//! [`ParameterVector`](crate::ParameterVector) copies.
mod base;
mod config;
pub use base::{TrainStats, ValueEngine};
pub use config::{TrainScope, ValueEngineConfig};

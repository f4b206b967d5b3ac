//! Backend-independent core of depth-driven drone agents.
//!
//! * [`geometry`] turns discrete actions into motion commands.
//! * [`reward`] turns depth maps into rewards and termination flags.
//! * [`sim`] defines the interfaces to the simulator and reads depth maps.
//! * [`record`] carries training metrics to recorders.
pub mod error;
pub mod geometry;
pub mod record;
pub mod reward;
pub mod sim;

mod identity;
pub use error::PedraError;
pub use geometry::{ActionGeometry, GeometryConfig, MotionCommand, MotionMode, Pose};
pub use identity::AgentIdentity;
pub use reward::{DepthRewardModel, RegionScores, RewardConfig, RewardSignal};

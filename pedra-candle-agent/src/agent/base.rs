use super::DroneAgentConfig;
use crate::{
    cnn::Cnn, store::ParameterStore, sync::SyncModel, util::prepare_state, ParameterVector,
    TrainStats, ValueEngine,
};
use anyhow::Result;
use candle_core::Tensor;
use log::{info, trace};
use ndarray::{Array2, ArrayView2};
use pedra_core::{
    geometry::grid_size,
    record::{Record, RecordValue, Recorder},
    sim::{self, CollisionSource, DepthSource, MotionExecutor, PoseSource, VisualSource},
    ActionGeometry, AgentIdentity, DepthRewardModel, MotionCommand, RewardSignal,
};
use rand::{rngs::SmallRng, SeedableRng};

/// Agent controlling one simulated vehicle with its own Q-network.
///
/// The simulator is passed to each call, so one client can serve several
/// agents.
pub struct DroneAgent {
    identity: AgentIdentity,
    config: DroneAgentConfig,
    engine: ValueEngine,
    geometry: ActionGeometry,
    reward_model: DepthRewardModel,
    rng: SmallRng,
    iter: usize,
}

impl DroneAgent {
    /// Constructs [`DroneAgent`].
    ///
    /// The Q-network has `num_actions` outputs. If `custom_load` is set, its
    /// parameters are loaded from that file.
    pub fn build(identity: AgentIdentity, config: DroneAgentConfig) -> Result<Self> {
        grid_size(config.num_actions)?;
        let mut engine =
            ValueEngine::<Cnn>::build(config.value_engine.clone().out_dim(config.num_actions))?;
        if let Some(path) = &config.custom_load {
            engine.load(path)?;
        }
        info!(
            "Built agent {} with {} actions in {:?} mode",
            identity, config.num_actions, config.motion_mode
        );

        Ok(Self {
            geometry: ActionGeometry::new(config.geometry.clone()),
            reward_model: DepthRewardModel::new(config.reward.clone()),
            rng: SmallRng::seed_from_u64(config.seed),
            identity,
            config,
            engine,
            iter: 0,
        })
    }

    pub fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    pub fn config(&self) -> &DroneAgentConfig {
        &self.config
    }

    pub fn engine(&self) -> &ValueEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ValueEngine {
        &mut self.engine
    }

    /// Number of [`DroneAgent::train_n`] calls so far.
    pub fn iter(&self) -> usize {
        self.iter
    }

    /// Moves the vehicle according to `action`.
    ///
    /// The pose is read from the simulator right before mapping the action.
    pub fn take_action<S>(&mut self, sim: &mut S, action: usize) -> Result<MotionCommand>
    where
        S: PoseSource + MotionExecutor + ?Sized,
    {
        let vehicle = self.identity.vehicle_name();
        let pose = sim.pose(vehicle)?;
        let command = self.geometry.map(
            action,
            self.config.num_actions,
            &pose,
            self.config.motion_mode,
            &mut self.rng,
        )?;
        trace!(
            "{}: action {} -> yaw {:.3}, {:?}",
            self.identity,
            action,
            command.yaw(),
            command
        );
        sim::execute(sim, vehicle, &command)?;
        Ok(command)
    }

    /// Raw depth map of the vehicle and its clipping threshold.
    pub fn depth<S: DepthSource + ?Sized>(&self, sim: &mut S) -> Result<(Array2<f32>, f32)> {
        sim::acquire_depth(sim, self.identity.vehicle_name(), &self.config.depth)
    }

    /// Camera image of the vehicle as a `(1, size, size, 3)` state.
    pub fn state<S: VisualSource + ?Sized>(&self, sim: &mut S) -> Result<Tensor> {
        let rgb = sim.rgb_frame(self.identity.vehicle_name())?;
        let size = self.engine.in_shape()[0];
        prepare_state(&rgb, size, self.engine.device())
    }

    pub fn collision<S: CollisionSource + ?Sized>(&self, sim: &mut S) -> Result<bool> {
        sim.has_collided(self.identity.vehicle_name())
    }

    /// Reward of a depth map with the configured crash threshold.
    pub fn reward(&self, depth: ArrayView2<f32>, threshold: f32, action: usize) -> RewardSignal {
        let crash_threshold = self.reward_model.config().crash_threshold;
        self.reward_model
            .reward(depth, action, crash_threshold, threshold)
    }

    pub fn q_values(&self, states: &Tensor) -> Result<Vec<Vec<f32>>> {
        self.engine.q_values(states)
    }

    pub fn select_action(&self, states: &Tensor) -> Result<Vec<usize>> {
        self.engine.select_action(states)
    }

    /// Applies a training step and writes its statistics to `recorder`.
    ///
    /// Values are recorded as `<vehicle>/<name>` with the iteration under
    /// `opt_steps`. The recorded `Loss` is `|loss| / batch_size`, while the
    /// returned [`TrainStats::loss`] is the mean loss itself. `epsilon` is the
    /// exploration rate of the caller and is only recorded.
    pub fn train_n<R: Recorder + ?Sized>(
        &mut self,
        states: &Tensor,
        targets: &[f32],
        actions: &[usize],
        lr: f64,
        epsilon: f32,
        recorder: &mut R,
    ) -> Result<TrainStats> {
        let stats = self.engine.train_step(states, targets, actions, lr)?;
        self.iter += 1;

        let vehicle = self.identity.vehicle_name();
        let batch_size = targets.len().max(1) as f32;
        let mut record = Record::from_scalar("opt_steps", self.iter as f32);
        for (name, value) in [
            ("Loss", stats.loss.abs() / batch_size),
            ("Epsilon", epsilon),
            ("Learning Rate", self.engine.learning_rate() as f32),
            ("MeanQ", stats.mean_q),
            ("MaxQ", stats.max_q),
        ]
        .iter()
        {
            record.insert(format!("{}/{}", vehicle, name), RecordValue::Scalar(*value));
        }
        recorder.write(record);

        Ok(stats)
    }

    /// Saves the network to `store` under `tag`.
    pub fn save_network<S: ParameterStore + ?Sized>(&self, store: &S, tag: &str) -> Result<()> {
        store.save(&self.identity, tag, &self.engine.snapshot_parameters()?)
    }

    /// Loads the network stored under `tag`.
    pub fn load_network<S: ParameterStore + ?Sized>(&mut self, store: &S, tag: &str) -> Result<()> {
        let params = store.load(&self.identity, tag, self.engine.device())?;
        self.engine.load_parameters(&params)
    }
}

impl SyncModel for DroneAgent {
    fn snapshot_parameters(&self) -> Result<ParameterVector> {
        self.engine.snapshot_parameters()
    }

    fn load_parameters(&mut self, params: &ParameterVector) -> Result<()> {
        self.engine.load_parameters(params)
    }
}

use super::ValueEngineConfig;
use crate::{
    cnn::Cnn,
    model::SubModel1,
    opt::Optimizer,
    util::{smooth_l1_loss, InShape, OutDim},
    ParameterVector,
};
use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{VarBuilder, VarMap};
use log::{info, trace};
use pedra_core::PedraError;
use serde::{de::DeserializeOwned, Serialize};
use std::{convert::TryInto, path::Path};

/// Loss and statistics of the predicted values of a training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainStats {
    /// Smooth L1 loss between predicted and target values at the taken actions.
    pub loss: f32,

    /// Mean of the predicted values over all samples and actions.
    pub mean_q: f32,

    /// Maximum of the predicted values over all samples and actions.
    pub max_q: f32,
}

/// Parameters of the output layer, one row per action.
const OUTPUT_LAYER: [&str; 2] = ["out.weight", "out.bias"];

/// Q-network with its variables and optimizer.
///
/// The output layer of the network is named `out`. States are `f32` tensors of shape `(batch, size, size, 3)`, or
/// `(size, size, 3)` for a single state.
pub struct ValueEngine<Q = Cnn>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + InShape + Clone,
{
    device: Device,
    varmap: VarMap,
    q: Q,
    q_config: Q::Config,
    opt: Optimizer,
    in_shape: Vec<usize>,
    out_dim: usize,
    n_opts: usize,
}

impl<Q> ValueEngine<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + InShape + Clone,
{
    /// Constructs [`ValueEngine`] with freshly initialized parameters.
    pub fn build(config: ValueEngineConfig<Q::Config>) -> Result<Self> {
        let ValueEngineConfig {
            q_config,
            opt_config,
            train_scope,
            device,
        } = config;
        let q_config = q_config.context("q_config is not set.")?;
        let device: Device = device.try_into()?;
        let in_shape = q_config.in_shape();
        let out_dim = q_config.get_out_dim();
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
            Q::build(vb, q_config.clone())?
        };

        let vars = {
            let data = varmap
                .data()
                .lock()
                .map_err(|_| PedraError::Lock("parameters of the network".to_string()))?;
            data.iter()
                .filter(|(name, _)| train_scope.contains(name))
                .map(|(_, var)| var.clone())
                .collect::<Vec<_>>()
        };
        if vars.is_empty() {
            return Err(anyhow!(
                "no parameter matches the train scope {:?}",
                train_scope
            ));
        }
        let opt = opt_config.build(vars)?;

        Ok(Self {
            device,
            varmap,
            q,
            q_config,
            opt,
            in_shape,
            out_dim,
            n_opts: 0,
        })
    }

    /// Number of actions.
    pub fn num_actions(&self) -> usize {
        self.out_dim
    }

    /// Shape of a single state.
    pub fn in_shape(&self) -> &[usize] {
        &self.in_shape
    }

    /// Configuration of the network.
    pub fn q_config(&self) -> &Q::Config {
        &self.q_config
    }

    /// Device on which the network runs.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Number of training steps applied so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    // Adds the batch dimension to a single state and checks the shape.
    fn batched(&self, states: &Tensor) -> Result<Tensor> {
        let dims = states.dims();
        let states = if dims == &self.in_shape[..] {
            states.unsqueeze(0)?
        } else if dims.len() == self.in_shape.len() + 1
            && dims[0] > 0
            && dims[1..] == self.in_shape[..]
        {
            states.clone()
        } else {
            return Err(PedraError::ShapeMismatch {
                expected: format!("[batch, {:?}]", self.in_shape),
                got: format!("{:?}", dims),
            }
            .into());
        };

        Ok(states.to_dtype(DType::F32)?.to_device(&self.device)?)
    }

    /// Returns the action values of the states, a tensor of shape `(batch, num_actions)`.
    pub fn infer(&self, states: &Tensor) -> Result<Tensor> {
        let states = self.batched(states)?;
        Ok(self.q.forward(&states)?.detach())
    }

    /// Returns the action values of the states as nested vectors.
    pub fn q_values(&self, states: &Tensor) -> Result<Vec<Vec<f32>>> {
        Ok(self.infer(states)?.to_vec2::<f32>()?)
    }

    /// Greedy actions of the states.
    ///
    /// Ties are broken towards the lowest action index.
    pub fn select_action(&self, states: &Tensor) -> Result<Vec<usize>> {
        let q = self.q_values(states)?;
        Ok(q.iter().map(|row| argmax(row)).collect())
    }

    /// Applies one gradient step towards `targets` at the taken actions.
    ///
    /// The loss only depends on the predicted value of `actions[i]` for sample
    /// `i`. Output-layer rows of actions missing from `actions` are written
    /// back after the step, so optimizer momentum and weight decay never move
    /// them. With the trunk frozen (`TrainScope::Only(["out"])`) the values of
    /// those actions are unchanged by every step. With
    /// [`TrainScope::EndToEnd`](super::TrainScope::EndToEnd) the shared trunk
    /// moves and their values can change.
    ///
    /// Inputs are validated before any parameter is touched.
    pub fn train_step(
        &mut self,
        states: &Tensor,
        targets: &[f32],
        actions: &[usize],
        lr: f64,
    ) -> Result<TrainStats> {
        let states = self.batched(states)?;
        let batch_size = states.dims()[0];
        if targets.len() != batch_size || actions.len() != batch_size {
            return Err(PedraError::ShapeMismatch {
                expected: format!("{} targets and actions", batch_size),
                got: format!("{} targets, {} actions", targets.len(), actions.len()),
            }
            .into());
        }
        if let Some(&action) = actions.iter().find(|&&a| a >= self.out_dim) {
            return Err(PedraError::InvalidAction {
                action,
                num_actions: self.out_dim,
            }
            .into());
        }

        let q = self.q.forward(&states)?;
        let ixs = actions.iter().map(|&a| a as u32).collect::<Vec<_>>();
        let ixs = Tensor::from_vec(ixs, (batch_size, 1), &self.device)?;
        let pred = q.gather(&ixs, 1)?.squeeze(1)?;
        let tgt = Tensor::from_slice(targets, batch_size, &self.device)?;
        let loss = smooth_l1_loss(&pred, &tgt)?;

        let untaken = self.untaken_mask(actions);
        let saved = match &untaken {
            Some(_) => self.copy_output_layer()?,
            None => vec![],
        };
        self.opt.set_learning_rate(lr);
        self.opt.backward_step(&loss)?;
        if let Some(mask) = untaken {
            restore_rows(saved, &mask)?;
        }
        self.n_opts += 1;

        let values = q.detach().flatten_all()?.to_vec1::<f32>()?;
        let stats = TrainStats {
            loss: loss.to_scalar::<f32>()?,
            mean_q: values.iter().sum::<f32>() / values.len() as f32,
            max_q: values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        };
        trace!("train step {}: {:?}", self.n_opts, stats);

        Ok(stats)
    }

    /// Learning rate of the last training step.
    pub fn learning_rate(&self) -> f64 {
        self.opt.learning_rate()
    }

    // Mask over actions, 1 for those missing from `actions`. `None` if all are taken.
    fn untaken_mask(&self, actions: &[usize]) -> Option<Vec<u8>> {
        let mut mask = vec![1u8; self.out_dim];
        for &a in actions {
            mask[a] = 0;
        }
        if mask.iter().any(|&m| m == 1) {
            Some(mask)
        } else {
            None
        }
    }

    // Output-layer variables with a copy of their current values.
    fn copy_output_layer(&self) -> Result<Vec<(Var, Tensor)>> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| PedraError::Lock("parameters of the network".to_string()))?;
        let saved = OUTPUT_LAYER
            .iter()
            .filter_map(|name| data.get(*name))
            .filter(|var| var.dims().first() == Some(&self.out_dim))
            .map(|var| -> Result<(Var, Tensor)> { Ok((var.clone(), var.as_tensor().copy()?)) })
            .collect::<Result<Vec<_>>>()?;
        Ok(saved)
    }

    /// Deep copy of all parameters.
    pub fn snapshot_parameters(&self) -> Result<ParameterVector> {
        ParameterVector::copy_from(&self.varmap)
    }

    /// Overwrites all parameters.
    ///
    /// Fails with [`PedraError::ParameterShapeMismatch`] and leaves the
    /// parameters unchanged if `params` does not fit the network.
    pub fn load_parameters(&mut self, params: &ParameterVector) -> Result<()> {
        params.copy_to(&self.varmap)
    }

    /// Saves the parameters as a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.snapshot_parameters()?.save(&path)?;
        info!("Save value engine to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters from a safetensors file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        let params = ParameterVector::load(&path, &self.device)?;
        self.load_parameters(&params)?;
        info!("Load value engine from {:?}", path.as_ref());
        Ok(())
    }
}

// Writes `saved` back into the rows of the variables selected by `mask`.
fn restore_rows(saved: Vec<(Var, Tensor)>, mask: &[u8]) -> Result<()> {
    for (var, before) in saved {
        let rows = Tensor::from_slice(mask, mask.len(), before.device())?;
        let rows = match before.rank() {
            1 => rows,
            _ => rows.unsqueeze(1)?.broadcast_as(before.shape())?,
        };
        let after = rows.where_cond(&before, var.as_tensor())?;
        var.set(&after)?;
    }
    Ok(())
}

// Index of the first maximum.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

//! Parameter averaging across a cohort of value engines.
use crate::{model::SubModel1, util::{InShape, OutDim}, ParameterVector, ValueEngine};
use anyhow::Result;
use candle_core::Tensor;
use log::{debug, info};
use pedra_core::PedraError;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, Mutex};

/// Models whose parameters can be snapshotted and overwritten.
pub trait SyncModel {
    /// Returns a deep copy of all parameters.
    fn snapshot_parameters(&self) -> Result<ParameterVector>;

    /// Overwrites all parameters, leaving them unchanged on error.
    fn load_parameters(&mut self, params: &ParameterVector) -> Result<()>;
}

impl<Q> SyncModel for ValueEngine<Q>
where
    Q: SubModel1<Input = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + OutDim + InShape + Clone,
{
    fn snapshot_parameters(&self) -> Result<ParameterVector> {
        ValueEngine::snapshot_parameters(self)
    }

    fn load_parameters(&mut self, params: &ParameterVector) -> Result<()> {
        ValueEngine::load_parameters(self, params)
    }
}

/// Replaces the parameters of every cohort member with the element-wise mean.
///
/// All members are snapshotted before the first write. If the layouts
/// differ, [`PedraError::CohortMismatch`] is returned and nothing is written.
pub struct ParameterAveragingSync;

impl ParameterAveragingSync {
    /// Averages a cohort the caller holds exclusively.
    pub fn average<M: SyncModel>(cohort: &mut [&mut M]) -> Result<()> {
        if cohort.len() < 2 {
            return Ok(());
        }
        let snapshots = cohort
            .iter()
            .map(|m| m.snapshot_parameters())
            .collect::<Result<Vec<_>>>()?;
        let mean = Self::mean(&snapshots)?;
        for m in cohort.iter_mut() {
            m.load_parameters(&mean)?;
        }
        info!("Averaged parameters of {} models", cohort.len());
        Ok(())
    }

    /// Averages a cohort of shared models.
    ///
    /// The locks of all members are held for the whole pass, so no member can
    /// be trained in between. Locks are taken in address order and duplicate
    /// handles count once.
    pub fn average_shared<M: SyncModel>(cohort: &[Arc<Mutex<M>>]) -> Result<()> {
        let mut handles: Vec<&Arc<Mutex<M>>> = Vec::with_capacity(cohort.len());
        for h in cohort.iter() {
            if !handles.iter().any(|h_| Arc::ptr_eq(h_, h)) {
                handles.push(h);
            }
        }
        handles.sort_by_key(|h| Arc::as_ptr(h) as usize);
        if handles.len() < cohort.len() {
            debug!(
                "{} duplicate handles in the cohort",
                cohort.len() - handles.len()
            );
        }

        let mut guards = handles
            .iter()
            .map(|h| {
                h.lock()
                    .map_err(|_| PedraError::Lock("cohort member".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut models = guards.iter_mut().map(|g| &mut **g).collect::<Vec<_>>();

        Self::average(&mut models)
    }

    // Element-wise mean over snapshots of the same layout.
    fn mean(snapshots: &[ParameterVector]) -> Result<ParameterVector> {
        let first = &snapshots[0];
        for (i, s) in snapshots.iter().enumerate().skip(1) {
            first
                .check_layout(s)
                .map_err(|e| PedraError::CohortMismatch(format!("member {}: {}", i, e)))?;
        }

        let n = snapshots.len();
        let tensors = first
            .iter()
            .map(|(name, t0)| -> Result<(String, Tensor)> {
                let mut ts = Vec::with_capacity(n);
                ts.push(t0.clone());
                for s in snapshots[1..].iter() {
                    let t = s.get(name).ok_or_else(|| {
                        PedraError::CohortMismatch(format!("{} is missing", name))
                    })?;
                    ts.push(t.to_device(t0.device())?.to_dtype(t0.dtype())?);
                }
                Ok((name.to_string(), Tensor::stack(&ts, 0)?.mean(0)?))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ParameterVector::from_named(tensors))
    }
}

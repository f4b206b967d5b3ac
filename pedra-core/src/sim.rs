//! Interfaces to the simulator.
//!
//! The simulator itself is not part of this crate. Agents talk to it through
//! the traits defined here, one per collaborator, so a client can implement
//! only what a given agent needs.
use crate::geometry::{MotionCommand, Pose, Quaternion, Vector3};
use anyhow::Result;
use image::RgbImage;
use log::{debug, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    thread,
    time::Duration,
};
use thiserror::Error;

/// Source of vehicle poses.
pub trait PoseSource {
    /// Current pose of the vehicle.
    fn pose(&mut self, vehicle_name: &str) -> Result<Pose>;
}

/// Executes motion commands.
pub trait MotionExecutor {
    /// Moves the vehicle to `pose` and returns when the pose is set.
    fn set_pose(&mut self, vehicle_name: &str, pose: &Pose) -> Result<()>;

    /// Starts flying with `velocity` for `duration` seconds, heading `yaw` radians.
    ///
    /// Returns without waiting for the motion to finish.
    fn move_by_velocity(
        &mut self,
        vehicle_name: &str,
        velocity: Vector3,
        duration: f64,
        yaw: f64,
    ) -> Result<()>;
}

/// Source of single-channel depth maps.
pub trait DepthSource {
    /// Raw depth map of the forward sensor of the vehicle.
    fn depth_frame(&mut self, vehicle_name: &str) -> Result<Array2<f32>>;
}

/// Source of camera images.
pub trait VisualSource {
    /// Raw RGB image of the forward camera of the vehicle.
    fn rgb_frame(&mut self, vehicle_name: &str) -> Result<RgbImage>;
}

/// Source of collision state.
pub trait CollisionSource {
    /// Returns `true` if the vehicle is in collision.
    fn has_collided(&mut self, vehicle_name: &str) -> Result<bool>;
}

/// Sends `command` to the executor.
///
/// Velocity pulses are followed by a zero-velocity command after `hold`
/// seconds, so this call blocks for that long.
pub fn execute<M: MotionExecutor + ?Sized>(
    executor: &mut M,
    vehicle_name: &str,
    command: &MotionCommand,
) -> Result<()> {
    match command {
        MotionCommand::Teleport { position, yaw } => {
            let pose = Pose::new(*position, Quaternion::from_yaw(*yaw));
            executor.set_pose(vehicle_name, &pose)
        }
        MotionCommand::VelocityPulse {
            velocity,
            yaw,
            duration,
            hold,
        } => {
            executor.move_by_velocity(vehicle_name, *velocity, *duration, *yaw)?;
            if *hold > 0.0 {
                thread::sleep(Duration::from_secs_f64(*hold));
            }
            executor.move_by_velocity(vehicle_name, Vector3::zeros(), *duration, *yaw)
        }
    }
}

/// Kind of environment, which determines how depth maps are read.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum EnvType {
    /// Depth is read from a visualization channel that sometimes returns defective frames.
    Indoor,

    /// Depth is read from a planar depth channel.
    Outdoor,
}

/// Configuration of depth acquisition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DepthConfig {
    pub env_type: EnvType,

    /// Depth beyond which values are clipped.
    pub threshold: f32,

    /// Maximum number of reads of an indoor depth frame.
    pub max_tries: usize,

    /// A frame containing this value and a mean below `min_mean` is defective.
    pub saturation_value: f32,

    pub min_mean: f32,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            env_type: EnvType::Indoor,
            threshold: 50.0,
            max_tries: 5,
            saturation_value: 255.0,
            min_mean: 0.05,
        }
    }
}

impl DepthConfig {
    /// Sets the environment type.
    pub fn env_type(mut self, v: EnvType) -> Self {
        self.env_type = v;
        self
    }

    /// Sets the clipping threshold.
    pub fn threshold(mut self, v: f32) -> Self {
        self.threshold = v;
        self
    }

    /// Sets the maximum number of reads.
    pub fn max_tries(mut self, v: usize) -> Self {
        self.max_tries = v;
        self
    }

    /// Constructs [`DepthConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DepthConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[derive(Error, Debug)]
#[error("defective depth frame (max = {max}, mean = {mean})")]
struct SensorGlitch {
    max: f32,
    mean: f32,
}

fn check_frame(depth: &Array2<f32>, config: &DepthConfig) -> Result<(), SensorGlitch> {
    let max = depth.iter().copied().fold(f32::MIN, f32::max);
    let mean = depth.mean().unwrap_or(0.0);
    if max >= config.saturation_value && mean < config.min_mean {
        Err(SensorGlitch { max, mean })
    } else {
        Ok(())
    }
}

/// Reads a raw depth map and returns it with the clipping threshold.
///
/// Indoor frames are re-read while defective, up to `max_tries` reads; the
/// last read is returned even if it is still defective.
pub fn acquire_depth<S: DepthSource + ?Sized>(
    source: &mut S,
    vehicle_name: &str,
    config: &DepthConfig,
) -> Result<(Array2<f32>, f32)> {
    let depth = match config.env_type {
        EnvType::Outdoor => source.depth_frame(vehicle_name)?,
        EnvType::Indoor => {
            let max_tries = config.max_tries.max(1);
            let mut tries = 1;
            loop {
                let depth = source.depth_frame(vehicle_name)?;
                match check_frame(&depth, config) {
                    Ok(()) => break depth,
                    Err(e) if tries >= max_tries => {
                        warn!("{}: accepting after {} reads: {}", vehicle_name, tries, e);
                        break depth;
                    }
                    Err(e) => {
                        debug!("{}: read {} of {}: {}", vehicle_name, tries, max_tries, e);
                        tries += 1;
                    }
                }
            }
        }
    };

    Ok((depth, config.threshold))
}

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    struct ScriptedDepth {
        glitches: usize,
        reads: usize,
    }

    impl DepthSource for ScriptedDepth {
        fn depth_frame(&mut self, _vehicle_name: &str) -> Result<Array2<f32>> {
            self.reads += 1;
            if self.reads <= self.glitches {
                let mut depth = Array2::zeros((20, 20));
                depth[[3, 4]] = 255.0;
                Ok(depth)
            } else {
                Ok(Array2::from_elem((20, 20), 30.0))
            }
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Vec<(Option<Pose>, Option<Vector3>)>,
    }

    impl MotionExecutor for RecordingExecutor {
        fn set_pose(&mut self, _vehicle_name: &str, pose: &Pose) -> Result<()> {
            self.calls.push((Some(*pose), None));
            Ok(())
        }

        fn move_by_velocity(
            &mut self,
            _vehicle_name: &str,
            velocity: Vector3,
            _duration: f64,
            _yaw: f64,
        ) -> Result<()> {
            self.calls.push((None, Some(velocity)));
            Ok(())
        }
    }

    #[test]
    fn test_retry_until_valid() -> Result<()> {
        let mut source = ScriptedDepth { glitches: 2, reads: 0 };
        let (depth, threshold) = acquire_depth(&mut source, "drone0", &DepthConfig::default())?;
        assert_eq!(source.reads, 3);
        assert_eq!(threshold, 50.0);
        assert_eq!(depth[[0, 0]], 30.0);
        Ok(())
    }

    #[test]
    fn test_accept_defective_frame_at_bound() -> Result<()> {
        let mut source = ScriptedDepth { glitches: 100, reads: 0 };
        let config = DepthConfig::default().max_tries(5);
        let (depth, _) = acquire_depth(&mut source, "drone0", &config)?;
        assert_eq!(source.reads, 5);
        assert_eq!(depth[[3, 4]], 255.0);
        Ok(())
    }

    #[test]
    fn test_outdoor_reads_once() -> Result<()> {
        let mut source = ScriptedDepth { glitches: 100, reads: 0 };
        let config = DepthConfig::default().env_type(EnvType::Outdoor);
        acquire_depth(&mut source, "drone0", &config)?;
        assert_eq!(source.reads, 1);
        Ok(())
    }

    #[test]
    fn test_velocity_pulse_is_stopped() -> Result<()> {
        let mut executor = RecordingExecutor::default();
        let command = MotionCommand::VelocityPulse {
            velocity: Vector3::new(0.4, 0.0, 0.0),
            yaw: 0.0,
            duration: 1.0,
            hold: 0.0,
        };
        execute(&mut executor, "drone0", &command)?;
        assert_eq!(
            executor.calls,
            vec![
                (None, Some(Vector3::new(0.4, 0.0, 0.0))),
                (None, Some(Vector3::zeros()))
            ]
        );

        let command = MotionCommand::Teleport {
            position: Vector3::new(1.0, 2.0, 3.0),
            yaw: 0.0,
        };
        execute(&mut executor, "drone0", &command)?;
        assert_eq!(
            executor.calls[2].0,
            Some(Pose::new(Vector3::new(1.0, 2.0, 3.0), Quaternion::from_yaw(0.0)))
        );
        Ok(())
    }
}

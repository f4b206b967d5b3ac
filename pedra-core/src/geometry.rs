//! Mapping of discrete actions to motion commands.
//!
//! The action space is a `k x k` grid of angular offsets around the forward
//! axis of the vehicle. Row `i` of the grid selects the vertical tilt `theta`
//! and column `j` the horizontal offset `psi`:
//!
//! ```text
//! theta = fov_v / k * (i - (k - 1) / 2)
//! psi   = fov_h / k * (j - (k - 1) / 2)
//! ```
mod config;
mod pose;
pub use config::{GeometryConfig, MotionMode};
pub use pose::{Pose, Quaternion, Vector3};

use crate::error::PedraError;
use anyhow::Result;
use rand::Rng;

/// A motion command for the motion executor.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCommand {
    /// Move the vehicle to `position`, facing `yaw`.
    Teleport { position: Vector3, yaw: f64 },

    /// Hold `velocity` for `hold` seconds, then stop.
    ///
    /// `duration` is the duration passed to the velocity command itself;
    /// the stop command overrides it after `hold` seconds.
    VelocityPulse {
        velocity: Vector3,
        yaw: f64,
        duration: f64,
        hold: f64,
    },
}

impl MotionCommand {
    /// Heading of the vehicle after the command, in radians.
    pub fn yaw(&self) -> f64 {
        match self {
            Self::Teleport { yaw, .. } => *yaw,
            Self::VelocityPulse { yaw, .. } => *yaw,
        }
    }
}

/// Returns `k` with `k * k == num_actions`.
pub fn grid_size(num_actions: usize) -> Result<usize> {
    let k = (num_actions as f64).sqrt().round() as usize;
    if num_actions == 0 || k.checked_mul(k) != Some(num_actions) {
        return Err(PedraError::InvalidActionSpace { num_actions }.into());
    }
    Ok(k)
}

/// Converts action indices into motion commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionGeometry {
    config: GeometryConfig,
}

impl ActionGeometry {
    /// Constructs the mapper.
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    /// Configuration of the mapper.
    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    /// Returns the angular offsets `(theta, psi)` of the grid cell of `action`.
    pub fn grid_offsets(&self, action: usize, num_actions: usize) -> Result<(f64, f64)> {
        let k = grid_size(num_actions)?;
        if action >= num_actions {
            return Err(PedraError::InvalidAction {
                action,
                num_actions,
            }
            .into());
        }

        let kf = k as f64;
        let center = (kf - 1.0) / 2.0;
        let row = (action / k) as f64;
        let col = (action % k) as f64;
        let theta = self.config.fov_v / kf * (row - center);
        let psi = self.config.fov_h / kf * (col - center);

        Ok((theta, psi))
    }

    /// Maps `action` to a motion command for a vehicle at `pose`.
    ///
    /// In [`MotionMode::Discrete`] the offsets are jittered with `rng` and the
    /// vehicle is moved `radius` along the selected direction. In
    /// [`MotionMode::Continuous`] no jitter is applied and a velocity pulse of
    /// magnitude `radius_infer` is produced.
    pub fn map<R: Rng + ?Sized>(
        &self,
        action: usize,
        num_actions: usize,
        pose: &Pose,
        mode: MotionMode,
        rng: &mut R,
    ) -> Result<MotionCommand> {
        let (theta, psi) = self.grid_offsets(action, num_actions)?;
        let alpha = pose.orientation.yaw();
        let k = grid_size(num_actions)? as f64;

        let command = match mode {
            MotionMode::Discrete => {
                let noise_theta = self.config.fov_v / k * self.config.jitter_fraction;
                let noise_psi = self.config.fov_h / k * self.config.jitter_fraction;
                let psi = psi + rng.gen_range(-1.0..=1.0) * noise_psi;
                let theta = theta + rng.gen_range(-1.0..=1.0) * noise_theta;
                let r = self.config.radius;
                let p = &pose.position;

                MotionCommand::Teleport {
                    position: Vector3::new(
                        p.x + r * (alpha + psi).cos(),
                        p.y + r * (alpha + psi).sin(),
                        p.z + r * theta.sin(),
                    ),
                    yaw: alpha + psi,
                }
            }
            MotionMode::Continuous => {
                let r = self.config.radius_infer;
                MotionCommand::VelocityPulse {
                    velocity: Vector3::new(
                        r * (alpha + psi).cos(),
                        r * (alpha + psi).sin(),
                        r * theta.sin(),
                    ),
                    yaw: alpha + psi,
                    duration: self.config.pulse_duration,
                    hold: self.config.pulse_hold,
                }
            }
        };

        Ok(command)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::SmallRng, SeedableRng};

    const EPS: f64 = 1e-12;

    fn no_jitter() -> ActionGeometry {
        ActionGeometry::new(GeometryConfig::default().jitter_fraction(0.0))
    }

    #[test]
    fn test_corner_offsets() -> Result<()> {
        let geometry = no_jitter();
        let fov_v = geometry.config().fov_v;
        let fov_h = geometry.config().fov_h;

        for k in 1..=7usize {
            let n = k * k;
            let kf = k as f64;
            let (theta, psi) = geometry.grid_offsets(0, n)?;
            assert!((theta + fov_v / (2.0 * kf) * (kf - 1.0)).abs() < EPS);
            assert!((psi + fov_h / (2.0 * kf) * (kf - 1.0)).abs() < EPS);

            let (theta, psi) = geometry.grid_offsets(n - 1, n)?;
            assert!((theta - fov_v / (2.0 * kf) * (kf - 1.0)).abs() < EPS);
            assert!((psi - fov_h / (2.0 * kf) * (kf - 1.0)).abs() < EPS);
        }
        Ok(())
    }

    #[test]
    fn test_center_is_straight_ahead() -> Result<()> {
        let geometry = no_jitter();
        let mut rng = SmallRng::seed_from_u64(0);
        let pose = Pose::new(Vector3::new(1.0, 2.0, -3.0), Quaternion::from_yaw(0.0));

        let (theta, psi) = geometry.grid_offsets(4, 9)?;
        assert_eq!((theta, psi), (0.0, 0.0));

        match geometry.map(4, 9, &pose, MotionMode::Discrete, &mut rng)? {
            MotionCommand::Teleport { position, yaw } => {
                assert!((position.x - 1.4).abs() < EPS);
                assert!((position.y - 2.0).abs() < EPS);
                assert!((position.z + 3.0).abs() < EPS);
                assert!(yaw.abs() < EPS);
            }
            c => panic!("unexpected command {:?}", c),
        }
        Ok(())
    }

    #[test]
    fn test_invalid_action_space() {
        let geometry = ActionGeometry::default();
        for n in [0usize, 2, 8, 10, 24, usize::MAX, (1 << 32) + 1].iter() {
            let err = geometry.grid_offsets(0, *n).unwrap_err();
            assert_eq!(
                err.downcast_ref::<PedraError>(),
                Some(&PedraError::InvalidActionSpace { num_actions: *n })
            );
        }
    }

    #[test]
    fn test_invalid_action() {
        let geometry = ActionGeometry::default();
        let err = geometry.grid_offsets(9, 9).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PedraError>(),
            Some(&PedraError::InvalidAction {
                action: 9,
                num_actions: 9
            })
        );
    }

    #[test]
    fn test_jitter_is_bounded_and_seeded() -> Result<()> {
        let geometry = ActionGeometry::default();
        let pose = Pose::new(Vector3::default(), Quaternion::from_yaw(0.3));
        let k = 5.0;
        let max_psi = geometry.config().fov_h / k / 6.0;

        let mut rng1 = SmallRng::seed_from_u64(42);
        let mut rng2 = SmallRng::seed_from_u64(42);
        for action in 0..25 {
            let c1 = geometry.map(action, 25, &pose, MotionMode::Discrete, &mut rng1)?;
            let c2 = geometry.map(action, 25, &pose, MotionMode::Discrete, &mut rng2)?;
            assert_eq!(c1, c2);

            let (_, psi) = geometry.grid_offsets(action, 25)?;
            assert!((c1.yaw() - 0.3 - psi).abs() <= max_psi + EPS);
        }
        Ok(())
    }

    #[test]
    fn test_velocity_pulse() -> Result<()> {
        let geometry = ActionGeometry::default();
        let mut rng = SmallRng::seed_from_u64(0);
        let yaw = std::f64::consts::FRAC_PI_2;
        let pose = Pose::new(Vector3::new(10.0, 10.0, 10.0), Quaternion::from_yaw(yaw));

        match geometry.map(4, 9, &pose, MotionMode::Continuous, &mut rng)? {
            MotionCommand::VelocityPulse {
                velocity,
                yaw: yaw_cmd,
                duration,
                hold,
            } => {
                assert!(velocity.x.abs() < 1e-9);
                assert!((velocity.y - 0.4).abs() < 1e-9);
                assert!(velocity.z.abs() < EPS);
                assert!((yaw_cmd - yaw).abs() < 1e-9);
                assert_eq!(duration, 1.0);
                assert_eq!(hold, 0.07);
            }
            c => panic!("unexpected command {:?}", c),
        }

        // Corner actions keep the magnitude of the velocity.
        let c = geometry.map(0, 9, &pose, MotionMode::Continuous, &mut rng)?;
        if let MotionCommand::VelocityPulse { velocity, .. } = c {
            let (theta, _) = geometry.grid_offsets(0, 9)?;
            let horizontal = (velocity.x.powi(2) + velocity.y.powi(2)).sqrt();
            assert!((horizontal - 0.4).abs() < 1e-9);
            assert!((velocity.z - 0.4 * theta.sin()).abs() < 1e-9);
        }
        Ok(())
    }
}

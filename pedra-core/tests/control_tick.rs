use anyhow::Result;
use ndarray::Array2;
use pedra_core::{
    geometry::{MotionCommand, Quaternion, Vector3},
    sim::{acquire_depth, DepthConfig, DepthSource},
    ActionGeometry, DepthRewardModel, GeometryConfig, MotionMode, Pose, RewardConfig,
    RewardSignal,
};
use rand::{rngs::SmallRng, SeedableRng};

// Left and right thirds at 45 m, center third at 5 m.
fn corridor_blocked_ahead() -> Array2<f32> {
    Array2::from_shape_fn((60, 90), |(_, j)| if (30..60).contains(&j) { 5.0 } else { 45.0 })
}

struct FixedDepth(Array2<f32>);

impl DepthSource for FixedDepth {
    fn depth_frame(&mut self, _vehicle_name: &str) -> Result<Array2<f32>> {
        Ok(self.0.clone())
    }
}

#[test]
fn obstacle_ahead_terminates_for_every_action() -> Result<()> {
    let mut source = FixedDepth(corridor_blocked_ahead());
    let (depth, threshold) = acquire_depth(&mut source, "drone0", &DepthConfig::default())?;
    assert_eq!(threshold, 50.0);

    let model = DepthRewardModel::new(RewardConfig::default());
    let scores = model.region_averages(depth.view(), threshold);
    assert!((scores.center - 0.1).abs() < 1e-6);

    for action in 0..25 {
        let signal = model.reward(depth.view(), action, 0.2, threshold);
        assert_eq!(
            signal,
            RewardSignal {
                reward: -1.0,
                done: true
            }
        );
    }
    Ok(())
}

#[test]
fn center_action_flies_straight_ahead() -> Result<()> {
    let geometry = ActionGeometry::new(GeometryConfig::default().jitter_fraction(0.0));
    let mut rng = SmallRng::seed_from_u64(7);
    let yaw = 0.25;
    let pose = Pose::new(Vector3::new(0.0, 0.0, -2.0), Quaternion::from_yaw(yaw));

    let (theta, psi) = geometry.grid_offsets(4, 9)?;
    assert_eq!((theta, psi), (0.0, 0.0));

    let command = geometry.map(4, 9, &pose, MotionMode::Discrete, &mut rng)?;
    match command {
        MotionCommand::Teleport { position, yaw: y } => {
            assert!((y - yaw).abs() < 1e-12);
            assert!((position.x - 0.4 * yaw.cos()).abs() < 1e-12);
            assert!((position.y - 0.4 * yaw.sin()).abs() < 1e-12);
            assert!((position.z + 2.0).abs() < 1e-12);
        }
        c => panic!("unexpected command {:?}", c),
    }
    Ok(())
}

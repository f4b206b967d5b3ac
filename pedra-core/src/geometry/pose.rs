use serde::{Deserialize, Serialize};

/// A vector in the simulator's world frame (`z` points down).
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zeros() -> Self {
        Self::default()
    }
}

/// Orientation as a unit quaternion `(w, x, y, z)`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl Quaternion {
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `yaw` radians around the vertical axis (zero pitch and roll).
    pub fn from_yaw(yaw: f64) -> Self {
        let (s, c) = (yaw / 2.0).sin_cos();
        Self::new(c, 0.0, 0.0, s)
    }

    /// Yaw angle (rotation around z) in radians.
    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}

/// Position and orientation of a vehicle.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Vector3, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_yaw_roundtrip_over_the_circle() {
        for i in -7..=7 {
            let yaw = i as f64 * PI / 8.0;
            assert!((Quaternion::from_yaw(yaw).yaw() - yaw).abs() < 1e-12);
        }
        assert_eq!(Quaternion::default().yaw(), 0.0);
    }

    #[test]
    fn test_yaw_ignores_pitch() {
        // 90 degrees of yaw followed by 30 degrees of pitch
        let (sy, cy) = (PI / 4.0).sin_cos();
        let (sp, cp) = (PI / 12.0).sin_cos();
        let q = Quaternion::new(cy * cp, -sy * sp, cy * sp, sy * cp);
        assert!((q.yaw() - PI / 2.0).abs() < 1e-9);
    }
}

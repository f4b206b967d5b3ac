use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    f64::consts::PI,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// How motion commands are executed by the simulator.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum MotionMode {
    /// The vehicle is teleported to the target pose (computer vision mode).
    Discrete,

    /// The vehicle flies a short velocity pulse (multirotor mode).
    Continuous,
}

impl Default for MotionMode {
    fn default() -> Self {
        Self::Discrete
    }
}

/// Configuration of [`ActionGeometry`](super::ActionGeometry).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GeometryConfig {
    /// Vertical field of view spanned by the action grid, in radians.
    pub fov_v: f64,

    /// Horizontal field of view spanned by the action grid, in radians.
    pub fov_h: f64,

    /// Step length of a teleport.
    pub radius: f64,

    /// Speed of a velocity pulse.
    pub radius_infer: f64,

    /// Magnitude of the uniform jitter as a fraction of the angular span of a cell.
    pub jitter_fraction: f64,

    /// Duration passed to the velocity command, in seconds.
    pub pulse_duration: f64,

    /// Time the velocity is held before the stop command, in seconds.
    pub pulse_hold: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            fov_v: 45.0 * PI / 180.0 / 1.5,
            fov_h: 80.0 * PI / 180.0 / 1.5,
            radius: 0.4,
            radius_infer: 0.4,
            jitter_fraction: 1.0 / 6.0,
            pulse_duration: 1.0,
            pulse_hold: 0.07,
        }
    }
}

impl GeometryConfig {
    /// Sets the vertical and horizontal fields of view in radians.
    pub fn fov(mut self, fov_v: f64, fov_h: f64) -> Self {
        self.fov_v = fov_v;
        self.fov_h = fov_h;
        self
    }

    /// Sets the step length of a teleport.
    pub fn radius(mut self, v: f64) -> Self {
        self.radius = v;
        self
    }

    /// Sets the speed of a velocity pulse.
    pub fn radius_infer(mut self, v: f64) -> Self {
        self.radius_infer = v;
        self
    }

    /// Sets the jitter fraction. `0.0` disables jitter.
    pub fn jitter_fraction(mut self, v: f64) -> Self {
        self.jitter_fraction = v;
        self
    }

    /// Sets the hold time of a velocity pulse.
    pub fn pulse_hold(mut self, v: f64) -> Self {
        self.pulse_hold = v;
        self
    }

    /// Constructs [`GeometryConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`GeometryConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_geometry_config() -> Result<()> {
        let config = GeometryConfig::default().radius(0.8).pulse_hold(0.0);
        let dir = TempDir::new("geometry_config")?;
        let path = dir.path().join("geometry.yaml");
        config.save(&path)?;
        let config_ = GeometryConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }
}

//! Reward and termination from a depth map.
//!
//! The depth map is clipped at `threshold` and scaled to `[0, 1]`. A window,
//! whose size shrinks as obstacles get closer, is placed slightly above the
//! center of the image, and two more windows of the same size are put on
//! its left and right. Each window is scored by the mean of its closest 5%
//! of pixels. The score of the center window is the reward; when it falls
//! below the crash threshold the episode ends with a reward of `-1`.
use anyhow::Result;
use log::trace;
use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    ops::Range,
    path::Path,
};

/// Configuration of [`DepthRewardModel`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RewardConfig {
    /// Minimum normalized center depth before the episode is terminated.
    pub crash_threshold: f32,

    /// Fraction of the closest pixels averaged in each window.
    pub fract_min: f32,

    /// Scale of the vertical offset of the windows. Values below 1 move
    /// the windows towards the top of the image.
    pub vertical_scale: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            crash_threshold: 0.07,
            fract_min: 0.05,
            vertical_scale: 0.9,
        }
    }
}

impl RewardConfig {
    /// Sets the crash threshold.
    pub fn crash_threshold(mut self, v: f32) -> Self {
        self.crash_threshold = v;
        self
    }

    /// Sets the fraction of the closest pixels averaged in each window.
    pub fn fract_min(mut self, v: f32) -> Self {
        self.fract_min = v;
        self
    }

    /// Constructs [`RewardConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`RewardConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Reward and termination flag of a control tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardSignal {
    pub reward: f32,
    pub done: bool,
}

/// Scores of the left, center and right windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionScores {
    pub left: f32,
    pub center: f32,
    pub right: f32,
}

/// Row range and column ranges of the three windows.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionWindows {
    pub rows: Range<usize>,
    pub left: Range<usize>,
    pub center: Range<usize>,
    pub right: Range<usize>,
}

impl RegionWindows {
    /// Places the windows on an image of `height x width` with coverage factor `n >= 1`.
    ///
    /// The center window starts at the offset `w` and spans `W / n` columns.
    /// The left and right windows are its neighbours, truncated at the image
    /// border. A side window truncated to nothing is replaced by the
    /// full-size window nearest to that border.
    pub fn new(height: usize, width: usize, n: f32, vertical_scale: f32) -> Self {
        let (hf, wf) = (height as f32, width as f32);
        let grid_h = hf / n;
        let grid_w = wf / n;

        let h = ((vertical_scale * hf * (n - 1.0) / (2.0 * n)).max(0.0) as usize).min(height);
        let w = ((wf * (n - 1.0) / (2.0 * n)).max(0.0) as usize).min(width);
        let col = |x: f32| (x.round().max(0.0) as usize).min(width);

        let row_end = ((h as f32 + grid_h).round() as usize).min(height).max(h);
        let center_end = col(w as f32 + grid_w);
        let mut left = col(w as f32 - grid_w)..w;
        let mut right = center_end..col(w as f32 + 2.0 * grid_w);

        let win = (grid_w.round() as usize).min(width);
        if left.is_empty() {
            let start = w.saturating_sub(win);
            left = start..start + win;
        }
        if right.is_empty() {
            let start = center_end.min(width - win);
            right = start..start + win;
        }

        Self {
            rows: h..row_end,
            left,
            center: w..center_end,
            right,
        }
    }
}

/// Computes rewards from depth maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthRewardModel {
    config: RewardConfig,
}

impl DepthRewardModel {
    /// Constructs the reward model.
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    /// Configuration of the reward model.
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Clips depth values at `threshold` and scales them to `[0, 1]`.
    pub fn preprocess(depth: ArrayView2<f32>, threshold: f32) -> Array2<f32> {
        depth.mapv(|d| d.min(threshold) / threshold)
    }

    /// Coverage factor of a normalized depth map: `max(mean * threshold / 3, 1)`.
    pub fn coverage(depth: ArrayView2<f32>, threshold: f32) -> f32 {
        let mean = depth.mean().unwrap_or(0.0);
        (mean * threshold / 3.0).max(1.0)
    }

    /// Scores of the left, center and right windows of a raw depth map.
    pub fn region_averages(&self, depth: ArrayView2<f32>, threshold: f32) -> RegionScores {
        let depth = Self::preprocess(depth, threshold);
        let n = Self::coverage(depth.view(), threshold);
        let (height, width) = depth.dim();
        let windows = RegionWindows::new(height, width, n, self.config.vertical_scale);
        let rows = windows.rows.clone();

        let score = |cols: Range<usize>| {
            self.lowest_fraction_mean(depth.slice(s![rows.clone(), cols]))
        };
        let scores = RegionScores {
            left: score(windows.left.clone()),
            center: score(windows.center.clone()),
            right: score(windows.right.clone()),
        };
        trace!("n = {}, windows = {:?}, scores = {:?}", n, windows, scores);

        scores
    }

    /// Reward and termination flag of a raw depth map.
    ///
    /// The reward does not depend on `action`.
    pub fn reward(
        &self,
        depth: ArrayView2<f32>,
        _action: usize,
        crash_threshold: f32,
        threshold: f32,
    ) -> RewardSignal {
        let scores = self.region_averages(depth, threshold);

        if scores.center < crash_threshold {
            RewardSignal {
                reward: -1.0,
                done: true,
            }
        } else {
            RewardSignal {
                reward: scores.center,
                done: false,
            }
        }
    }

    // Mean of the smallest `fract_min` of the values, at least one value.
    fn lowest_fraction_mean(&self, region: ArrayView2<f32>) -> f32 {
        if region.is_empty() {
            return 0.0;
        }
        let mut values = region.iter().copied().collect::<Vec<_>>();
        values.sort_by(|a, b| a.total_cmp(b));
        let n = ((self.config.fract_min * values.len() as f32).round() as usize)
            .max(1)
            .min(values.len());

        values[..n].iter().sum::<f32>() / n as f32
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::Array2;

    fn model() -> DepthRewardModel {
        DepthRewardModel::new(RewardConfig::default())
    }

    #[test]
    fn test_uniform_map_scores_equal() {
        let threshold = 50.0;
        for &d in [0.5f32, 3.0, 10.0, 24.0, 49.0].iter() {
            let depth = Array2::from_elem((60, 80), d);
            let v = d / threshold;
            let n = DepthRewardModel::coverage(
                DepthRewardModel::preprocess(depth.view(), threshold).view(),
                threshold,
            );
            let scores = model().region_averages(depth.view(), threshold);
            assert!((scores.left - v).abs() < 1e-6, "n = {}", n);
            assert!((scores.center - v).abs() < 1e-6, "n = {}", n);
            assert!((scores.right - v).abs() < 1e-6, "n = {}", n);
        }
    }

    #[test]
    fn test_far_values_are_clipped() {
        let depth = Array2::from_elem((30, 30), 500.0f32);
        let scores = model().region_averages(depth.view(), 50.0);
        assert_eq!(scores.center, 1.0);
    }

    #[test]
    fn test_degenerate_maps() {
        let m = model();
        let zeros = Array2::<f32>::zeros((40, 40));
        let scores = m.region_averages(zeros.view(), 50.0);
        assert_eq!(scores, RegionScores { left: 0.0, center: 0.0, right: 0.0 });

        let empty = Array2::<f32>::zeros((0, 0));
        let scores = m.region_averages(empty.view(), 50.0);
        assert_eq!(scores, RegionScores { left: 0.0, center: 0.0, right: 0.0 });

        let signal = m.reward(zeros.view(), 0, 0.07, 50.0);
        assert_eq!(signal, RewardSignal { reward: -1.0, done: true });
    }

    #[test]
    fn test_closest_pixels_dominate() {
        // 100 pixels in the center window, 5 of which are close.
        let mut depth = Array2::from_elem((10, 10), 1.0f32);
        for j in 0..5 {
            depth[[0, j]] = 0.2;
        }
        let m = model();
        let windows = RegionWindows::new(10, 10, 1.0, 0.9);
        assert_eq!(windows.rows, 0..10);
        assert_eq!(windows.center, 0..10);
        let v = m.lowest_fraction_mean(depth.slice(s![0..10, 0..10]));
        assert!((v - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_windows_shrink_and_stay_inside() {
        let windows = RegionWindows::new(100, 120, 4.0, 0.9);
        assert_eq!(windows.rows, 33..58);
        assert_eq!(windows.center, 45..75);
        assert_eq!(windows.left, 15..45);
        assert_eq!(windows.right, 75..105);

        let windows = RegionWindows::new(100, 120, 2.0, 0.9);
        assert_eq!(windows.rows, 22..72);
        assert_eq!(windows.center, 30..90);
        assert_eq!(windows.left, 0..30);
        assert_eq!(windows.right, 90..120);

        // Side windows cut away entirely fall back to full size.
        let windows = RegionWindows::new(40, 60, 1.0, 0.9);
        assert_eq!(windows.center, 0..60);
        assert_eq!(windows.left, 0..60);
        assert_eq!(windows.right, 0..60);
    }

    #[test]
    fn test_side_windows_do_not_overlap_center() {
        // Obstacle at 1 m over columns 27..61, open space at 12 m elsewhere.
        let depth = Array2::from_shape_fn((60, 90), |(_, j)| {
            if (27..61).contains(&j) {
                1.0f32
            } else {
                12.0
            }
        });
        let threshold = 50.0;
        let n = DepthRewardModel::coverage(
            DepthRewardModel::preprocess(depth.view(), threshold).view(),
            threshold,
        );
        let windows = RegionWindows::new(60, 90, n, 0.9);
        assert_eq!(windows.left, 0..27);
        assert_eq!(windows.center, 27..61);
        assert_eq!(windows.right, 61..90);

        let scores = model().region_averages(depth.view(), threshold);
        assert!((scores.left - 0.24).abs() < 1e-6);
        assert!((scores.center - 0.02).abs() < 1e-6);
        assert!((scores.right - 0.24).abs() < 1e-6);
    }

    #[test]
    fn test_reward_policy() {
        let m = model();
        let threshold = 50.0;
        let depth = Array2::from_elem((60, 90), 20.0f32);

        for action in 0..9 {
            let signal = m.reward(depth.view(), action, 0.2, threshold);
            assert!(!signal.done);
            assert!((signal.reward - 0.4).abs() < 1e-6);

            let signal = m.reward(depth.view(), action, 0.5, threshold);
            assert_eq!(signal, RewardSignal { reward: -1.0, done: true });
        }
    }
}

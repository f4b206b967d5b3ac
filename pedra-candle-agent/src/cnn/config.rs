use crate::util::{InShape, OutDim};
use serde::{Deserialize, Serialize};

/// Max pooling after a convolution.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub struct PoolConfig {
    pub kernel: usize,
    pub stride: usize,
}

/// A convolution followed by ReLU and optional max pooling.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ConvLayerConfig {
    pub out_channels: usize,
    pub kernel: usize,
    pub stride: usize,
    #[serde(default)]
    pub pool: Option<PoolConfig>,
}

impl ConvLayerConfig {
    /// A convolution without pooling.
    pub fn new(out_channels: usize, kernel: usize, stride: usize) -> Self {
        Self {
            out_channels,
            kernel,
            stride,
            pool: None,
        }
    }

    /// Adds max pooling.
    pub fn pool(mut self, kernel: usize, stride: usize) -> Self {
        self.pool = Some(PoolConfig { kernel, stride });
        self
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Cnn`](super::Cnn).
pub struct CnnConfig {
    pub(super) input_size: usize,
    pub(super) in_channels: usize,
    pub(super) conv_layers: Vec<ConvLayerConfig>,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
}

impl Default for CnnConfig {
    fn default() -> Self {
        Self {
            input_size: 103,
            in_channels: 3,
            conv_layers: vec![
                ConvLayerConfig::new(96, 7, 4).pool(3, 2),
                ConvLayerConfig::new(64, 5, 1).pool(3, 2),
                ConvLayerConfig::new(64, 3, 1),
            ],
            units: vec![1024],
            out_dim: 25,
        }
    }
}

impl CnnConfig {
    /// Creates a configuration.
    ///
    /// * `input_size` - Height and width of the input frames.
    /// * `conv_layers` - Convolutions applied in order.
    /// * `units` - Hidden units of the dense layers after the convolutions.
    /// * `out_dim` - Number of actions.
    pub fn new(
        input_size: usize,
        conv_layers: Vec<ConvLayerConfig>,
        units: Vec<usize>,
        out_dim: usize,
    ) -> Self {
        Self {
            input_size,
            in_channels: 3,
            conv_layers,
            units,
            out_dim,
        }
    }

    /// Sets the height and width of the input frames.
    pub fn input_size(mut self, v: usize) -> Self {
        self.input_size = v;
        self
    }
}

impl OutDim for CnnConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, v: usize) {
        self.out_dim = v;
    }
}

impl InShape for CnnConfig {
    fn in_shape(&self) -> Vec<usize> {
        vec![self.input_size, self.input_size, self.in_channels]
    }
}

//! Convolutional Q-network on square RGB frames.
//!
//! The input is a batch of frames in `(batch, height, width, 3)` layout with
//! values in `[0, 1]`. Each frame is standardized to zero mean and unit
//! variance before the convolutions. The default configuration is the
//! three-convolution, two-dense-layer network `C3F2`.
mod base;
mod config;
pub use base::Cnn;
pub use config::{CnnConfig, ConvLayerConfig, PoolConfig};

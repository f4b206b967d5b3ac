use super::{CnnConfig, PoolConfig};
use crate::model::SubModel1;
use candle_core::{bail, Device, Result, Tensor};
use candle_nn::{conv::Conv2dConfig, conv2d, linear, Conv2d, Linear, Module, VarBuilder};

/// Convolutional Q-network.
///
/// Parameter names are `conv{i}.*` and `fc{i}.*` (1-based) for the hidden
/// layers and `out.*` for the output layer.
pub struct Cnn {
    device: Device,
    convs: Vec<(Conv2d, Option<PoolConfig>)>,
    fcs: Vec<Linear>,
    out: Linear,
}

// (x - mean) / max(std, 1 / sqrt(N)) over each frame.
fn standardize(xs: &Tensor) -> Result<Tensor> {
    let n = xs.dims()[1..].iter().product::<usize>().max(1) as f64;
    let flat = xs.flatten_from(1)?;
    let mean = flat.mean_keepdim(1)?;
    let centered = flat.broadcast_sub(&mean)?;
    let std = centered.sqr()?.mean_keepdim(1)?.sqrt()?;
    let std = std.maximum(1.0 / n.sqrt())?;
    centered.broadcast_div(&std)?.reshape(xs.shape())
}

fn out_size(size: usize, kernel: usize, stride: usize) -> Result<usize> {
    if size < kernel || stride == 0 {
        bail!(
            "kernel {} with stride {} does not fit feature map of size {}",
            kernel,
            stride,
            size
        );
    }
    Ok((size - kernel) / stride + 1)
}

impl SubModel1 for Cnn {
    type Config = CnnConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, x: &Self::Input) -> Result<Tensor> {
        let x = x.to_device(&self.device)?.permute((0, 3, 1, 2))?.contiguous()?;
        let mut xs = standardize(&x)?;

        for (conv, pool) in self.convs.iter() {
            xs = conv.forward(&xs)?.relu()?;
            if let Some(pool) = pool {
                xs = xs.max_pool2d_with_stride(pool.kernel, pool.stride)?;
            }
        }
        xs = xs.flatten_from(1)?;
        for fc in self.fcs.iter() {
            xs = fc.forward(&xs)?.relu()?;
        }

        self.out.forward(&xs)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        let device = vb.device().clone();
        let mut channels = config.in_channels;
        let mut size = config.input_size;
        let mut convs = vec![];

        for (i, layer) in config.conv_layers.iter().enumerate() {
            let conv_config = Conv2dConfig {
                stride: layer.stride,
                ..Default::default()
            };
            let conv = conv2d(
                channels,
                layer.out_channels,
                layer.kernel,
                conv_config,
                vb.pp(format!("conv{}", i + 1)),
            )?;
            size = out_size(size, layer.kernel, layer.stride)?;
            if let Some(pool) = layer.pool {
                size = out_size(size, pool.kernel, pool.stride)?;
            }
            channels = layer.out_channels;
            convs.push((conv, layer.pool));
        }

        let mut in_dim = channels * size * size;
        let mut fcs = vec![];
        for (i, &units) in config.units.iter().enumerate() {
            fcs.push(linear(in_dim, units, vb.pp(format!("fc{}", i + 1)))?);
            in_dim = units;
        }
        let out = linear(in_dim, config.out_dim, vb.pp("out"))?;

        Ok(Self {
            device,
            convs,
            fcs,
            out,
        })
    }
}

//! Utilities.
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use image::{imageops::FilterType, RgbImage};

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Shape of a single input sample, without the batch dimension.
pub trait InShape {
    fn in_shape(&self) -> Vec<usize>;
}

/// See <https://pytorch.org/docs/stable/generated/torch.nn.SmoothL1Loss.html>.
///
/// Quadratic for errors below 1 and linear above, averaged over elements.
pub fn smooth_l1_loss(x: &Tensor, y: &Tensor) -> Result<Tensor, candle_core::Error> {
    let d = (x - y)?.abs()?;
    let m1 = d.lt(1.0)?.to_dtype(DType::F32)?;
    let m2 = (1.0 - &m1)?;
    (((0.5 * m1)? * d.powf(2.0))? + m2 * (d - 0.5))?.mean_all()
}

/// Converts a camera image into a `(1, size, size, 3)` state tensor.
///
/// The image is resized bilinearly and min-max normalized to `[0, 1]` over
/// all pixels and channels. A constant image becomes all zeros.
pub fn prepare_state(rgb: &RgbImage, size: usize, device: &Device) -> Result<Tensor> {
    let resized = image::imageops::resize(rgb, size as u32, size as u32, FilterType::Triangle);
    let raw = resized.into_raw();
    let (min, max) = raw
        .iter()
        .fold((u8::MAX, u8::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = (max - min).max(1) as f32;
    let data = raw
        .iter()
        .map(|&v| (v - min) as f32 / range)
        .collect::<Vec<_>>();

    Ok(Tensor::from_vec(data, (1, size, size, 3), device)?)
}

#[cfg(test)]
mod test {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_smooth_l1_loss() -> Result<()> {
        let x = Tensor::new(&[0.5f32, 3.0, -1.0], &Device::Cpu)?;
        let y = Tensor::new(&[0.0f32, 0.0, -1.0], &Device::Cpu)?;
        let loss = smooth_l1_loss(&x, &y)?.to_scalar::<f32>()?;
        // (0.125 + 2.5 + 0) / 3
        assert!((loss - 2.625 / 3.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_prepare_state() -> Result<()> {
        let rgb = RgbImage::from_fn(40, 30, |x, _| {
            let v = (x * 6) as u8;
            Rgb([v, v / 2, 10])
        });
        let state = prepare_state(&rgb, 16, &Device::Cpu)?;
        assert_eq!(state.dims(), &[1, 16, 16, 3]);
        let values = state.flatten_all()?.to_vec1::<f32>()?;
        let min = values.iter().cloned().fold(f32::MAX, f32::min);
        let max = values.iter().cloned().fold(f32::MIN, f32::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);

        let flat = RgbImage::from_pixel(8, 8, Rgb([7, 7, 7]));
        let state = prepare_state(&flat, 4, &Device::Cpu)?;
        assert!(state.flatten_all()?.to_vec1::<f32>()?.iter().all(|&v| v == 0.0));
        Ok(())
    }
}

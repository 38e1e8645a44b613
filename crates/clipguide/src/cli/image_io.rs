//! Conversions between image files and (N, 3, H, W) tensors in [0, 1].

use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};
use ndarray::{Array4, ArrayView3, Axis};

/// Decode an image file into a (1, 3, H, W) tensor with values in [0, 1].
pub fn load_image(path: &Path) -> anyhow::Result<Array4<f32>> {
    let image = image::open(path)
        .map_err(|e| anyhow::anyhow!("Failed to decode {}: {e}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Decoded image"
    );
    Ok(to_tensor(&image))
}

/// Convert a decoded image into a (1, 3, H, W) tensor.
pub fn to_tensor(image: &DynamicImage) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    Array4::from_shape_fn((1, 3, height as usize, width as usize), |(_, c, y, x)| {
        f32::from(rgb.get_pixel(x as u32, y as u32)[c]) / 255.0
    })
}

/// Convert a (3, H, W) tensor back to 8-bit RGB, clamping to [0, 1].
pub fn to_image(tensor: &ArrayView3<f32>) -> RgbImage {
    let (_, height, width) = tensor.dim();
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let px = |c: usize| (tensor[[c, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8;
        Rgb([px(0), px(1), px(2)])
    })
}

/// Write each batch item as `{prefix}_{index:03}.png` in `dir`.
pub fn save_batch(
    batch: &Array4<f32>,
    dir: &Path,
    prefix: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    batch
        .axis_iter(Axis(0))
        .enumerate()
        .map(|(i, item)| -> anyhow::Result<PathBuf> {
            let path = dir.join(format!("{prefix}_{i:03}.png"));
            to_image(&item)
                .save(&path)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
            Ok(path)
        })
        .collect()
}

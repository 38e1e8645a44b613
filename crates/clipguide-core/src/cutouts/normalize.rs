//! CLIP input normalization.
//!
//! CLIP visual encoders expect RGB in [0, 1] shifted and scaled by the
//! per-channel statistics of the CLIP training set.

use ndarray::{Array4, Axis};

/// CLIP normalization mean (per channel, RGB).
pub const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];

/// CLIP normalization std (per channel, RGB).
pub const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];

/// Per-channel `(x - mean) / std` over an NCHW batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipNormalize {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for ClipNormalize {
    fn default() -> Self {
        Self {
            mean: CLIP_MEAN,
            std: CLIP_STD,
        }
    }
}

impl ClipNormalize {
    /// Normalize a (N, 3, H, W) batch in place.
    pub fn apply(&self, batch: &mut Array4<f32>) {
        for (c, mut channel) in batch.axis_iter_mut(Axis(1)).enumerate().take(3) {
            let (mean, std) = (self.mean[c], self.std[c]);
            channel.mapv_inplace(|x| (x - mean) / std);
        }
    }

    /// Normalized copy of a batch.
    pub fn normalized(&self, batch: &Array4<f32>) -> Array4<f32> {
        let mut out = batch.clone();
        self.apply(&mut out);
        out
    }
}

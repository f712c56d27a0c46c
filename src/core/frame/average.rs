//! Pixel-wise averaging of sibling flat fields.

use super::{DecodedFrame, FrameHandle, PixelData};
use crate::error::DecodeError;
use rayon::prelude::*;

/// Average `frames` sample by sample.
///
/// The first frame defines the expected dimensions and becomes the
/// `source` of the result. All frames must share those dimensions.
pub fn average_frames(frames: &[FrameHandle]) -> Result<DecodedFrame, DecodeError> {
    let first = match frames {
        [] => {
            return Err(DecodeError::Failed {
                path: Default::default(),
                reason: "no frames to average".to_string(),
            })
        }
        [only] => return Ok((**only).clone()),
        [first, ..] => first,
    };

    let expected = first.dimensions();
    if let Some(odd) = frames.iter().find(|f| f.dimensions() != expected) {
        return Err(DecodeError::DimensionMismatch {
            path: odd.source.clone(),
            expected,
            actual: odd.dimensions(),
        });
    }

    let len = first.data.len();
    if let Some(short) = frames.iter().find(|f| f.data.len() != len) {
        return Err(DecodeError::Failed {
            path: short.source.clone(),
            reason: format!("{} samples, expected {}", short.data.len(), len),
        });
    }

    let count = frames.len() as f32;
    let averaged: Vec<f32> = (0..len)
        .into_par_iter()
        .map(|i| frames.iter().map(|f| f.data.sample(i)).sum::<f32>() / count)
        .collect();

    let (width, height, cpp) = expected;
    Ok(DecodedFrame {
        source: first.source.clone(),
        width,
        height,
        cpp,
        data: PixelData::Float(averaged),
        averaged_from: frames.iter().map(|f| f.averaged_from).sum(),
    })
}

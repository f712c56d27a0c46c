//! # Frame Module
//!
//! Decoded flat-field pixel data and the decoders that produce it.
//!
//! ## Ownership
//! A catalog entry owns the cache slot of its frame. Callers receive a
//! `FrameHandle` (an `Arc`), so a frame stays valid for a caller even
//! after the catalog that produced it was replaced.
//!
//! ## Decoders
//! - `RawLoaderDecoder` - real raw files via rawloader
//! - `InMemoryDecoder` - synthetic frames with a decode counter, for tests

mod average;
mod decoder;
mod memory;

pub use average::average_frames;
pub use decoder::RawLoaderDecoder;
pub use memory::InMemoryDecoder;

use crate::error::DecodeError;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared handle to a decoded frame
pub type FrameHandle = Arc<DecodedFrame>;

/// Sensor samples of a decoded frame
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Integer sensor values straight from the file
    Integer(Vec<u16>),
    /// Floating point values (float raws, averaged frames)
    Float(Vec<f32>),
}

impl PixelData {
    pub fn len(&self) -> usize {
        match self {
            PixelData::Integer(v) => v.len(),
            PixelData::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample `index` as a float
    pub fn sample(&self, index: usize) -> f32 {
        match self {
            PixelData::Integer(v) => v[index] as f32,
            PixelData::Float(v) => v[index],
        }
    }
}

/// Raw sensor data of one flat-field frame (or an average of several)
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// File the frame was decoded from (the primary file for averages)
    pub source: PathBuf,
    pub width: usize,
    pub height: usize,
    /// Components per pixel (1 for Bayer/X-Trans mosaics)
    pub cpp: usize,
    pub data: PixelData,
    /// Number of files that contributed to this frame
    pub averaged_from: usize,
}

impl DecodedFrame {
    pub fn new(
        source: impl Into<PathBuf>,
        width: usize,
        height: usize,
        cpp: usize,
        data: PixelData,
    ) -> Self {
        Self {
            source: source.into(),
            width,
            height,
            cpp,
            data,
            averaged_from: 1,
        }
    }

    /// (width, height, cpp)
    pub fn dimensions(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.cpp)
    }

    pub fn is_averaged(&self) -> bool {
        self.averaged_from > 1
    }

    /// Summary suitable for reporting, without the pixel payload
    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            source: self.source.clone(),
            width: self.width,
            height: self.height,
            cpp: self.cpp,
            averaged_from: self.averaged_from,
        }
    }
}

/// Pixel-free description of a frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameInfo {
    pub source: PathBuf,
    pub width: usize,
    pub height: usize,
    pub cpp: usize,
    pub averaged_from: usize,
}

/// Turns a raw file into a decoded frame.
///
/// Decoding is blocking and may be slow; callers wanting concurrency run
/// it on worker threads.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedFrame, DecodeError>;
}

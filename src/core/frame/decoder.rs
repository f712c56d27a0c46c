//! Raw decoding through rawloader.

use super::{DecodedFrame, FrameDecoder, PixelData};
use crate::error::DecodeError;
use std::path::Path;

/// Decoder for camera raw files backed by the rawloader crate
#[derive(Debug, Default, Clone)]
pub struct RawLoaderDecoder;

impl RawLoaderDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameDecoder for RawLoaderDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedFrame, DecodeError> {
        if !path.is_file() {
            return Err(DecodeError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }

        let loader = rawloader::RawLoader::new();
        let raw = loader
            .decode_file(path)
            .map_err(|e| DecodeError::Failed {
                path: path.to_path_buf(),
                reason: format!("{:?}", e),
            })?;

        let (width, height, cpp) = (raw.width, raw.height, raw.cpp);
        let data = match raw.data {
            rawloader::RawImageData::Integer(values) => PixelData::Integer(values),
            rawloader::RawImageData::Float(values) => PixelData::Float(values),
        };

        let expected = width * height * cpp;
        if data.len() < expected {
            return Err(DecodeError::Failed {
                path: path.to_path_buf(),
                reason: format!("{} samples, expected {}", data.len(), expected),
            });
        }

        tracing::debug!(
            path = %path.display(),
            width,
            height,
            "decoded flat field"
        );

        Ok(DecodedFrame::new(path, width, height, cpp, data))
    }
}

//! Synthetic decoder for tests and embedding.

use super::{DecodedFrame, FrameDecoder, PixelData};
use crate::error::DecodeError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

/// Decoder that fabricates frames and counts every decode call.
///
/// Unless a frame was registered for a path, it returns a 2x2 frame whose
/// samples all equal `fill_value`. Paths marked as failing return
/// `DecodeError::Failed`. Paths given a delay sleep before returning, to
/// stand in for slow raw files.
pub struct InMemoryDecoder {
    frames: Mutex<HashMap<PathBuf, DecodedFrame>>,
    failing: Mutex<HashSet<PathBuf>>,
    delays: Mutex<HashMap<PathBuf, Duration>>,
    calls: Mutex<HashMap<PathBuf, usize>>,
    total: AtomicUsize,
    fill_value: f32,
}

impl InMemoryDecoder {
    pub fn new() -> Self {
        Self::with_fill(1000.0)
    }

    /// Synthetic frames filled with `value`
    pub fn with_fill(value: f32) -> Self {
        Self {
            frames: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            fill_value: value,
        }
    }

    /// Serve `frame` for `path`
    pub fn with_frame(self, path: impl Into<PathBuf>, frame: DecodedFrame) -> Self {
        if let Ok(mut frames) = self.frames.lock() {
            frames.insert(path.into(), frame);
        }
        self
    }

    /// Make decoding `path` fail (or succeed again)
    pub fn set_failing(&self, path: impl Into<PathBuf>, failing: bool) {
        if let Ok(mut set) = self.failing.lock() {
            let path = path.into();
            if failing {
                set.insert(path);
            } else {
                set.remove(&path);
            }
        }
    }

    /// Make every decode of `path` take at least `delay`
    pub fn set_delay(&self, path: impl Into<PathBuf>, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.insert(path.into(), delay);
        }
    }

    /// Total number of decode calls, failed ones included
    pub fn decode_count(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Number of decode calls for one path
    pub fn decode_count_for(&self, path: &Path) -> usize {
        self.calls
            .lock()
            .map(|calls| calls.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Default for InMemoryDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for InMemoryDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedFrame, DecodeError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(path.to_path_buf()).or_insert(0) += 1;
        }

        let delay = self
            .delays
            .lock()
            .ok()
            .and_then(|delays| delays.get(path).copied());
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let fails = self
            .failing
            .lock()
            .map(|set| set.contains(path))
            .unwrap_or(false);
        if fails {
            return Err(DecodeError::Failed {
                path: path.to_path_buf(),
                reason: "simulated decode failure".to_string(),
            });
        }

        if let Some(frame) = self
            .frames
            .lock()
            .ok()
            .and_then(|frames| frames.get(path).cloned())
        {
            return Ok(frame);
        }

        Ok(DecodedFrame::new(
            path,
            2,
            2,
            1,
            PixelData::Float(vec![self.fill_value; 4]),
        ))
    }
}

//! Stereo f32 audio buffer with planar layout.

use alloc::vec;
use alloc::vec::Vec;

/// Default block size for audio processing.
pub const BLOCK_SIZE: usize = 256;

/// A two-channel f32 audio buffer in planar layout.
///
/// The left plane occupies `data[..frames]` and the right plane
/// `data[frames..]`. Mixers add into the buffer, so callers clear it with
/// [`StereoBuffer::silence`] between blocks.
#[derive(Clone, Debug)]
pub struct StereoBuffer {
    data: Vec<f32>,
    frames: usize,
}

impl StereoBuffer {
    /// Create a new silent buffer.
    pub fn new(frames: usize) -> Self {
        Self {
            data: vec![0.0; frames * 2],
            frames,
        }
    }

    /// Fill all samples with zero.
    pub fn silence(&mut self) {
        self.data.fill(0.0);
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn left(&self) -> &[f32] {
        &self.data[..self.frames]
    }

    pub fn right(&self) -> &[f32] {
        &self.data[self.frames..]
    }

    /// Mutable access to both planes at once.
    pub fn planes_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        self.data.split_at_mut(self.frames)
    }

    /// Scale all samples by `gain`.
    pub fn apply_gain(&mut self, gain: f32) {
        for s in &mut self.data {
            *s *= gain;
        }
    }

    /// Peak absolute sample value over both planes.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

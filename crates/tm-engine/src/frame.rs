//! Audio frame type.

use tm_ir::StereoBuffer;

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Convert a float frame, clipping to the 16-bit range.
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self {
            left: to_i16(left),
            right: to_i16(right),
        }
    }

    /// Append the first `count` frames of a mixed buffer.
    pub fn extend_from_buffer(out: &mut impl Extend<Frame>, buffer: &StereoBuffer, count: usize) {
        let count = count.min(buffer.frames());
        out.extend(
            buffer.left()[..count]
                .iter()
                .zip(&buffer.right()[..count])
                .map(|(&l, &r)| Frame::from_f32(l, r)),
        );
    }
}

fn to_i16(sample: f32) -> i16 {
    // NaN clamps to zero through the saturating cast
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_f32_scales_and_clips() {
        assert_eq!(Frame::from_f32(0.5, -0.5), Frame { left: 16384, right: -16384 });
        assert_eq!(Frame::from_f32(2.0, -2.0), Frame { left: 32767, right: -32768 });
        assert_eq!(Frame::from_f32(0.0, 0.0), Frame::silence());
    }

    #[test]
    fn extend_from_buffer_interleaves() {
        let mut buf = StereoBuffer::new(3);
        let (left, right) = buf.planes_mut();
        left[0] = 0.25;
        right[1] = -0.25;
        let mut frames = Vec::new();
        Frame::extend_from_buffer(&mut frames, &buf, 2);
        assert_eq!(frames, vec![Frame { left: 8192, right: 0 }, Frame { left: 0, right: -8192 }]);
    }
}

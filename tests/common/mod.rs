//! Synthetic MOD images for the integration tests.

#![allow(dead_code)]

use tm_formats::HEADER_SIZE;

pub struct SampleSpec {
    /// Sample bytes, also the declared length
    pub data: Vec<i8>,
    pub volume: u8,
    pub loop_start: usize,
    pub loop_length: usize,
}

impl SampleSpec {
    /// A looped sample holding one constant value.
    pub fn dc(value: i8, length: usize) -> Self {
        Self {
            data: vec![value; length],
            volume: 64,
            loop_start: 0,
            loop_length: length,
        }
    }

    /// A looped square wave, `period` bytes per cycle.
    pub fn square(length: usize, period: usize) -> Self {
        Self {
            data: (0..length)
                .map(|i| if i % period < period / 2 { 100 } else { -100 })
                .collect(),
            volume: 64,
            loop_start: 0,
            loop_length: length,
        }
    }
}

/// Pattern cell bytes for a Protracker period, 1-based sample number and effect.
pub fn cell(period: u16, sample: u8, fx: u8, param: u8) -> [u8; 4] {
    [
        (sample & 0xF0) | (period >> 8) as u8,
        period as u8,
        (sample << 4) | (fx & 0x0F),
        param,
    ]
}

/// Assemble a 4-channel `M.K.` image. `cells` are
/// `(pattern, row, channel, bytes)`.
pub fn build_mod(samples: &[SampleSpec], order: &[u8], cells: &[(usize, usize, usize, [u8; 4])]) -> Vec<u8> {
    const CHANNELS: usize = 4;

    let mut data = vec![0u8; HEADER_SIZE];
    data[..9].copy_from_slice(b"synthetic");
    for (i, s) in samples.iter().enumerate() {
        let ofs = 20 + i * 30;
        data[ofs + 22..ofs + 24].copy_from_slice(&((s.data.len() / 2) as u16).to_be_bytes());
        data[ofs + 25] = s.volume;
        data[ofs + 26..ofs + 28].copy_from_slice(&((s.loop_start / 2) as u16).to_be_bytes());
        data[ofs + 28..ofs + 30].copy_from_slice(&((s.loop_length / 2) as u16).to_be_bytes());
    }
    data[950] = order.len() as u8;
    data[951] = 127;
    data[952..952 + order.len()].copy_from_slice(order);
    data[1080..1084].copy_from_slice(b"M.K.");

    let num_patterns = order.iter().max().copied().unwrap_or(0) as usize + 1;
    let pattern_size = 64 * CHANNELS * 4;
    let mut patterns = vec![0u8; num_patterns * pattern_size];
    for &(pattern, row, channel, bytes) in cells {
        let ofs = pattern * pattern_size + (row * CHANNELS + channel) * 4;
        patterns[ofs..ofs + 4].copy_from_slice(&bytes);
    }
    data.extend_from_slice(&patterns);
    for s in samples {
        data.extend(s.data.iter().map(|&b| b as u8));
    }
    data
}

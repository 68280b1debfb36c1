//! Band-limited step (BLEP) resampler.
//!
//! Nearest-neighbour playback of a sample below the output rate produces a
//! staircase whose steps alias. Each time the sample value changes, a
//! minimum-phase band-limited step correction is mixed into a short ring
//! buffer, which is then drained onto the following output samples.

use alloc::vec::Vec;

use crate::blep_table::MIN_BLEP;

/// Zero crossings of the impulse (fixed by the table).
pub const BLEP_ZC: usize = 16;
/// Oversampling of the table (fixed by the table).
pub const BLEP_OS: usize = 16;
/// Table step per output sample.
pub const BLEP_SP: usize = 16;
/// Correction samples inserted per step.
pub const BLEP_NS: usize = BLEP_ZC * BLEP_OS / BLEP_SP;
/// Ring buffer mask: next power of two above `BLEP_NS`, minus one.
pub const BLEP_RNS: usize = 31;

#[derive(Clone, Debug)]
struct BlepChannel {
    speed: f64,
    last_speed: f64,
    last_position: i64,
    last_fraction: f64,
    last_value: f32,
    index: usize,
    samples_left: usize,
    buffer: [f32; BLEP_RNS + 1],
}

impl Default for BlepChannel {
    fn default() -> Self {
        Self {
            speed: 0.0,
            last_speed: 0.0,
            last_position: 0,
            last_fraction: 0.0,
            last_value: 0.0,
            index: 0,
            samples_left: 0,
            buffer: [0.0; BLEP_RNS + 1],
        }
    }
}

impl BlepChannel {
    fn add(&mut self, offset: f64, delta: f32) {
        if !(0.0..1.0).contains(&offset) {
            return;
        }
        let f = offset * BLEP_SP as f64;
        let whole = f as usize;
        let frac = (f - whole as f64) as f32;

        let mut src = whole;
        let mut i = self.index;
        for _ in 0..BLEP_NS {
            let x = MIN_BLEP[src];
            let y = MIN_BLEP[src + 1];
            self.buffer[i] += delta * (x + (y - x) * frac);
            src += BLEP_SP;
            i = (i + 1) & BLEP_RNS;
        }
        self.samples_left = BLEP_NS;
    }

    fn run(&mut self, value: f32) -> f32 {
        let out = value + self.buffer[self.index];
        self.buffer[self.index] = 0.0;
        self.index = (self.index + 1) & BLEP_RNS;
        self.samples_left -= 1;
        out
    }
}

/// Per-channel BLEP state.
#[derive(Clone, Debug, Default)]
pub struct BlepResampler {
    channels: Vec<BlepChannel>,
}

impl BlepResampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resize, keeping existing channels; new channels start cleared.
    pub fn set_num_channels(&mut self, num_channels: usize) {
        self.channels.resize_with(num_channels, BlepChannel::default);
    }

    pub fn reset_channel(&mut self, channel: usize) {
        if let Some(ch) = self.channels.get_mut(channel) {
            *ch = BlepChannel::default();
        }
    }

    /// Set the playback speed (source samples per output sample).
    ///
    /// At 1 or above the channel is upsampling-free and BLEP is bypassed.
    pub fn set_speed(&mut self, channel: usize, speed: f64) {
        let Some(ch) = self.channels.get_mut(channel) else {
            return;
        };
        ch.speed = speed;
        if speed >= 1.0 {
            ch.last_speed = 0.0;
        } else if ch.last_speed == 0.0 {
            ch.last_speed = speed;
        }
    }

    /// Band-limit one output sample.
    ///
    /// `value` is the nearest-neighbour sample value at integer source
    /// position `position`, `fraction` the fractional part of the position.
    pub fn mix_sample(&mut self, channel: usize, value: f32, position: i64, fraction: f64) -> f32 {
        let Some(ch) = self.channels.get_mut(channel) else {
            return value;
        };
        if ch.speed >= 1.0 {
            return value;
        }

        if position != ch.last_position {
            ch.last_position = position;
            ch.last_fraction = fraction;
            ch.last_speed = ch.speed;
        }

        if value != ch.last_value {
            if ch.last_speed > ch.last_fraction {
                let offset = ch.last_fraction / ch.last_speed;
                ch.add(offset, ch.last_value - value);
            }
            ch.last_value = value;
        }

        if ch.samples_left > 0 {
            ch.run(value)
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resampler(speed: f64) -> BlepResampler {
        let mut blep = BlepResampler::new();
        blep.set_num_channels(1);
        blep.set_speed(0, speed);
        blep
    }

    #[test]
    fn bypassed_at_unit_speed() {
        let mut blep = resampler(1.0);
        assert_eq!(blep.mix_sample(0, 0.5, 1, 0.0), 0.5);
        assert_eq!(blep.mix_sample(0, -0.5, 2, 0.0), -0.5);
    }

    #[test]
    fn constant_signal_is_untouched() {
        let mut blep = resampler(0.25);
        blep.mix_sample(0, 0.0, 0, 0.0);
        for i in 0..16 {
            assert_eq!(blep.mix_sample(0, 0.0, 1 + i / 4, (i % 4) as f64 * 0.25), 0.0);
        }
    }

    #[test]
    fn step_is_smoothed() {
        let mut blep = resampler(0.25);
        // Step from 0 to 1 a quarter sample after the position change
        blep.mix_sample(0, 0.0, 1, 0.0);
        let first = blep.mix_sample(0, 1.0, 2, 0.1);
        assert!(first < 1.0, "step should be softened, got {first}");
        assert!(first > -0.5);

        // Correction decays back to the plain value
        let mut last = first;
        for _ in 0..BLEP_NS {
            last = blep.mix_sample(0, 1.0, 2, 0.1);
        }
        assert!((last - 1.0).abs() < 0.01, "got {last}");
    }

    #[test]
    fn ring_buffer_drains() {
        let mut blep = resampler(0.5);
        blep.mix_sample(0, 0.0, 1, 0.0);
        blep.mix_sample(0, 1.0, 2, 0.2);
        for _ in 0..BLEP_NS {
            blep.mix_sample(0, 1.0, 2, 0.2);
        }
        let ch = &blep.channels[0];
        assert_eq!(ch.samples_left, 0);
        assert!(ch.buffer.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn offsets_outside_unit_range_are_ignored() {
        let mut ch = BlepChannel::default();
        ch.add(1.0, 1.0);
        ch.add(-0.1, 1.0);
        assert_eq!(ch.samples_left, 0);
    }

    #[test]
    fn unknown_channel_passes_through() {
        let mut blep = resampler(0.5);
        assert_eq!(blep.mix_sample(3, 0.7, 1, 0.0), 0.7);
    }
}

//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

slotmap::new_key_type! {
    /// Key for referencing samples uploaded to a wavetable.
    pub struct SampleKey;
}

/// Fixed-capacity text field. MOD names are at most 22 CP437 characters,
/// each of which encodes to at most 3 bytes of UTF-8.
pub type Name = ArrayString<66>;

/// An instrument sample as stored in the module.
#[derive(Clone, Debug, Default)]
pub struct InstrumentSample {
    /// Sample name
    pub name: Name,
    /// Finetune (-8..=7, eighths of a semitone)
    pub finetune: i8,
    /// Default volume (0-64)
    pub volume: u8,
    /// Loop start (in samples)
    pub loop_start: u32,
    /// Loop length (in samples, 0 = no loop)
    pub loop_length: u32,
    /// Audio data, `None` for empty slots
    pub data: Option<SampleData>,
}

impl InstrumentSample {
    /// Length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, SampleData::len)
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the sample has a loop.
    pub fn has_loop(&self) -> bool {
        self.loop_length > 0
    }
}

/// Sample audio data.
#[derive(Clone, Debug)]
pub enum SampleData {
    /// Signed 8-bit mono (the MOD encoding)
    Signed8(Vec<i8>),
    /// Unsigned 8-bit mono
    Unsigned8(Vec<u8>),
    /// Signed 16-bit mono
    Signed16(Vec<i16>),
    /// Unsigned 16-bit mono
    Unsigned16(Vec<u16>),
    /// 8-bit stereo samples (left, right)
    Stereo8(Vec<i8>, Vec<i8>),
    /// 16-bit stereo samples (left, right)
    Stereo16(Vec<i16>, Vec<i16>),
}

impl SampleData {
    /// Get the number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Signed8(v) => v.len(),
            SampleData::Unsigned8(v) => v.len(),
            SampleData::Signed16(v) => v.len(),
            SampleData::Unsigned16(v) => v.len(),
            SampleData::Stereo8(l, _) => l.len(),
            SampleData::Stereo16(l, _) => l.len(),
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of channels in the sample data.
    pub fn num_channels(&self) -> u16 {
        match self {
            SampleData::Stereo8(_, _) | SampleData::Stereo16(_, _) => 2,
            _ => 1,
        }
    }

    /// Mono frame at `pos` normalised to -1.0..1.0, or `None` for stereo
    /// data and positions past the end.
    pub fn get_f32(&self, pos: usize) -> Option<f32> {
        match self {
            SampleData::Signed8(v) => v.get(pos).map(|&s| s as f32 / 128.0),
            SampleData::Unsigned8(v) => v.get(pos).map(|&s| (s as f32 - 128.0) / 128.0),
            SampleData::Signed16(v) => v.get(pos).map(|&s| s as f32 / 32768.0),
            SampleData::Unsigned16(v) => v.get(pos).map(|&s| (s as f32 - 32768.0) / 32768.0),
            SampleData::Stereo8(_, _) | SampleData::Stereo16(_, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodings_normalise_to_unit_range() {
        assert_eq!(SampleData::Signed8(alloc::vec![-128, 64]).get_f32(0), Some(-1.0));
        assert_eq!(SampleData::Signed8(alloc::vec![-128, 64]).get_f32(1), Some(0.5));
        assert_eq!(SampleData::Unsigned8(alloc::vec![128]).get_f32(0), Some(0.0));
        assert_eq!(SampleData::Signed16(alloc::vec![16384]).get_f32(0), Some(0.5));
        assert_eq!(SampleData::Unsigned16(alloc::vec![0]).get_f32(0), Some(-1.0));
    }

    #[test]
    fn stereo_has_no_mono_view() {
        let data = SampleData::Stereo8(alloc::vec![1, 2], alloc::vec![3, 4]);
        assert_eq!(data.len(), 2);
        assert_eq!(data.num_channels(), 2);
        assert_eq!(data.get_f32(0), None);
    }

    #[test]
    fn empty_slot_has_zero_length() {
        let sample = InstrumentSample::default();
        assert!(sample.is_empty());
        assert!(!sample.has_loop());
    }
}

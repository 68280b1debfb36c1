//! Song structure and sequencing types.

use alloc::vec::Vec;

use crate::pattern::Pattern;
use crate::sample::{InstrumentSample, Name};

/// Instrument slots in a 31-sample module.
pub const NUM_SAMPLES: usize = 31;

/// A sample whose data ended before its declared length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IncompleteSample {
    /// Instrument slot (0-30)
    pub index: u8,
    /// Length declared in the header, in bytes
    pub expected_length: u32,
    /// Bytes actually present in the file
    pub actual_length: u32,
}

/// Properties of the module detected while loading.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Features {
    /// Some note lies outside the three Protracker octaves
    pub non_standard_notes: bool,
    /// The module uses 8xx or E8x panning
    pub pan_commands: bool,
    /// Samples truncated by the end of the file
    pub incomplete_samples: Vec<IncompleteSample>,
}

/// A parsed song.
#[derive(Clone, Debug)]
pub struct Track {
    /// Song title
    pub title: Name,
    /// Patterns, indexed by the sequence
    pub patterns: Vec<Pattern>,
    /// Order list of pattern indices (at most 128 entries)
    pub sequence: Vec<u8>,
    /// Instrument samples (always 31)
    pub samples: Vec<InstrumentSample>,
    /// Number of channels
    pub num_channels: u8,
    /// Sequence position to continue from after the last one; Protracker
    /// modules always restart at 0
    pub restart_position: u8,
    /// Features detected by the loader
    pub features: Features,
}

impl Default for Track {
    fn default() -> Self {
        Self {
            title: Name::new(),
            patterns: Vec::new(),
            sequence: Vec::new(),
            samples: alloc::vec![InstrumentSample::default(); NUM_SAMPLES],
            num_channels: 4,
            restart_position: 0,
            features: Features::default(),
        }
    }
}

impl Track {
    /// Create a new empty track.
    pub fn new(title: &str, num_channels: u8) -> Self {
        let mut track = Self {
            num_channels,
            ..Self::default()
        };
        let _ = track.title.try_push_str(title);
        track
    }

    /// Pattern played at a sequence position.
    pub fn pattern_at(&self, position: usize) -> Option<&Pattern> {
        let index = *self.sequence.get(position)?;
        self.patterns.get(index as usize)
    }

    /// Number of sequence positions.
    pub fn song_length(&self) -> usize {
        self.sequence.len()
    }
}

//! Pattern and note types.

use alloc::vec::Vec;
use crate::effects::Effect;

/// Rows in every MOD pattern.
pub const ROWS_PER_PATTERN: u16 = 64;

/// A pitched note: semitone within the octave and an octave relative to C-2.
///
/// Octave 0 semitone 0 is the note with Amiga period 428.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pitch {
    /// Semitone (0-11, 0 = C)
    pub semitone: u8,
    /// Octave relative to C-2 (-3..=3)
    pub octave: i8,
}

impl Pitch {
    pub const fn new(semitone: u8, octave: i8) -> Self {
        Self { semitone, octave }
    }

    /// Shift by a number of semitones, carrying into the octave.
    pub const fn transpose(self, semitones: u8) -> Self {
        let n = self.semitone + semitones;
        Self {
            semitone: n % 12,
            octave: self.octave + (n / 12) as i8,
        }
    }
}

/// A single cell in a pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Note {
    /// Pitch, or `None` when the cell carries no period
    pub pitch: Option<Pitch>,
    /// Sample index (0-30), or `None` when no sample number is given
    pub sample: Option<u8>,
    /// Effect id (0x00-0x1f, extended commands remapped to 0x10 + x)
    pub fx: u8,
    /// Effect parameter
    pub param: u8,
}

impl Note {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            pitch: None,
            sample: None,
            fx: 0,
            param: 0,
        }
    }

    /// Decode the effect column.
    pub const fn effect(&self) -> Effect {
        Effect::from_raw(self.fx, self.param)
    }

    /// Returns true if the cell is completely empty.
    pub fn is_empty(&self) -> bool {
        self.pitch.is_none() && self.sample.is_none() && self.fx == 0 && self.param == 0
    }
}

/// A pattern of rows across channels.
#[derive(Clone, Debug)]
pub struct Pattern {
    /// Number of rows (always 64 for MOD)
    pub rows: u16,
    /// Number of channels
    pub channels: u8,
    /// Pattern data, stored row-major: data[row * channels + channel]
    pub data: Vec<Note>,
}

impl Pattern {
    /// Create a new pattern with empty cells.
    pub fn new(rows: u16, channels: u8) -> Self {
        Self {
            rows,
            channels,
            data: alloc::vec![Note::empty(); rows as usize * channels as usize],
        }
    }

    /// Get a reference to a cell.
    pub fn cell(&self, row: u16, channel: u8) -> &Note {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// Get a mutable reference to a cell.
    pub fn cell_mut(&mut self, row: u16, channel: u8) -> &mut Note {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &mut self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// All cells in a row.
    pub fn row(&self, row: u16) -> &[Note] {
        let start = row as usize * self.channels as usize;
        &self.data[start..start + self.channels as usize]
    }
}

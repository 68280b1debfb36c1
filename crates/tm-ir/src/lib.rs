//! Core types for the tmodplay MOD player.
//!
//! The module loader emits a [`Track`], and the playroutine and mixer
//! consume it read-only for the lifetime of playback.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod effects;
mod pattern;
mod sample;
mod track;

pub use audio_buffer::{StereoBuffer, BLOCK_SIZE};
pub use effects::Effect;
pub use pattern::{Note, Pattern, Pitch, ROWS_PER_PATTERN};
pub use sample::{InstrumentSample, Name, SampleData, SampleKey};
pub use track::{Features, IncompleteSample, Track, NUM_SAMPLES};

//! Playroutine interface.
//!
//! A playroutine walks the track's sequence one tick at a time and programs
//! a [`Wavetable`] with the resulting channel state.

use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::wavetable::{ParseOptionError, Wavetable};

/// Amiga hardware region, selecting the Paula base clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Region {
    #[default]
    Pal,
    Ntsc,
}

/// Source of the tick duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TempoTimer {
    /// Amiga CIA timer, including its period rounding
    #[default]
    Cia,
    /// Exact `2.5 / bpm` seconds per tick
    Accurate,
}

impl FromStr for Region {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pal" => Ok(Region::Pal),
            "ntsc" => Ok(Region::Ntsc),
            _ => Err(ParseOptionError::new("region", s)),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Region::Pal => "pal",
            Region::Ntsc => "ntsc",
        })
    }
}

impl FromStr for TempoTimer {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cia" => Ok(TempoTimer::Cia),
            "accurate" => Ok(TempoTimer::Accurate),
            _ => Err(ParseOptionError::new("tempo timer", s)),
        }
    }
}

impl fmt::Display for TempoTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TempoTimer::Cia => "cia",
            TempoTimer::Accurate => "accurate",
        })
    }
}

/// Playroutine settings. `None` fields are left unchanged by
/// [`Playroutine::set_parameters`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayroutineParameters {
    pub region: Option<Region>,
    /// 0.0 (mono) - 1.0 (hard Amiga panning); only honoured before the
    /// first tick
    pub default_pan_width: Option<f32>,
    pub tempo_timer: Option<TempoTimer>,
}

/// Options for [`Playroutine::set_position`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PositionOptions {
    /// Silence every channel before moving
    pub stop_samples: bool,
    /// Treat the position as an offset from the current one
    pub relative_position: bool,
    /// Treat the row as an offset from the current one
    pub relative_row: bool,
}

/// Per-channel playback state for display.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelInfo {
    pub volume: f32,
    pub pan: f32,
    /// Index into the track's samples
    pub sample_index: Option<usize>,
    pub sample_position: f64,
    pub sample_rate: f64,
    pub speed: f64,
}

/// Sequencer state for display.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayroutineInfo {
    pub bpm: u32,
    pub speed: u32,
    pub position: usize,
    pub row: usize,
    pub tick: u32,
    pub channels: Vec<ChannelInfo>,
}

/// A tick-driven sequencer.
pub trait Playroutine {
    /// Rewind to the start of the song with default tempo and settings.
    fn reset(&mut self);

    fn parameters(&self) -> PlayroutineParameters;

    fn set_parameters(&mut self, params: &PlayroutineParameters, mixer: &mut dyn Wavetable);

    fn info(&self, mixer: &dyn Wavetable) -> PlayroutineInfo;

    /// Jump to a sequence position and row. Targets past the end of the
    /// song are ignored.
    fn set_position(
        &mut self,
        position: isize,
        row: isize,
        options: PositionOptions,
        mixer: &mut dyn Wavetable,
    );

    /// Run one tick, returning its duration in seconds.
    fn process_tick(&mut self, mixer: &mut dyn Wavetable) -> f64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_parse() {
        assert_eq!("NTSC".parse::<Region>(), Ok(Region::Ntsc));
        assert_eq!("accurate".parse::<TempoTimer>(), Ok(TempoTimer::Accurate));
        let err = "secam".parse::<Region>().unwrap_err();
        assert_eq!(err.to_string(), "unknown region `secam`");
    }

    #[test]
    fn defaults() {
        assert_eq!(Region::default(), Region::Pal);
        assert_eq!(TempoTimer::default(), TempoTimer::Cia);
        assert_eq!(TempoTimer::Cia.to_string(), "cia");
    }
}

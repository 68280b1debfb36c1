//! Wavetable mixer interface.
//!
//! The playroutine programs mixer channels exclusively through
//! [`Wavetable::set_mixer`]; [`MixerFlags`] select which fields of
//! [`MixerParams`] a call applies.

use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use tm_ir::{InstrumentSample, SampleKey, StereoBuffer};

bitflags::bitflags! {
    /// Mixer channel fields to update.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MixerFlags: u32 {
        const VOLUME = 0x0001;
        const PAN = 0x0002;
        const SPEED = 0x0004;
        const SAMPLE_CHANGE = 0x0010;
        const SAMPLE_POSITION = 0x0020;
    }
}

/// Values for a [`Wavetable::set_mixer`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MixerParams {
    /// Volume (0.0 - 1.0)
    pub volume: f32,
    /// Pan (-1.0 = left, 1.0 = right)
    pub pan: f32,
    /// Source sample rate in Hz; 0 halts the channel
    pub sample_rate: f64,
    /// Sample to play, `None` for silence
    pub sample: Option<SampleKey>,
    /// Start position in sample frames
    pub sample_position: f64,
}

/// Mixer-side view of one channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MixerChannelInfo {
    pub sample_position: f64,
    pub sample_rate: f64,
    /// Source samples per output sample
    pub speed: f64,
    /// Target volume while ramping, otherwise current volume
    pub volume: f32,
    pub pan: f32,
}

/// Resampling strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    /// Nearest neighbour with band-limited steps (authentic Amiga sound)
    Blep,
    #[default]
    Linear,
    /// 4-point cubic after Olli Niemitalo / Watte
    Watte,
}

/// Channel placement in the stereo field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StereoMode {
    /// All channels centred
    Mono,
    /// Hard Amiga L-R-R-L panning narrowed by the crossfeed
    Amiga,
    /// Channel pan from the playroutine
    #[default]
    Stereo,
}

/// Error for a string that names no known option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseOptionError {
    pub kind: &'static str,
    pub value: alloc::string::String,
}

impl ParseOptionError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

impl FromStr for Interpolation {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Interpolation::Nearest),
            "blep" => Ok(Interpolation::Blep),
            "linear" => Ok(Interpolation::Linear),
            "watte" => Ok(Interpolation::Watte),
            _ => Err(ParseOptionError::new("interpolation", s)),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Blep => "blep",
            Interpolation::Linear => "linear",
            Interpolation::Watte => "watte",
        })
    }
}

impl FromStr for StereoMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mono" => Ok(StereoMode::Mono),
            "amiga" => Ok(StereoMode::Amiga),
            "stereo" => Ok(StereoMode::Stereo),
            _ => Err(ParseOptionError::new("stereo mode", s)),
        }
    }
}

impl fmt::Display for StereoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StereoMode::Mono => "mono",
            StereoMode::Amiga => "amiga",
            StereoMode::Stereo => "stereo",
        })
    }
}

/// Mixer settings. `None` fields are left unchanged by
/// [`Wavetable::set_parameters`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WavetableParameters {
    /// 0.0 - 1.0, used by [`StereoMode::Amiga`]
    pub amiga_crossfeed: Option<f32>,
    /// 0.0 - 4.0
    pub amplification: Option<f32>,
    pub interpolation: Option<Interpolation>,
    pub stereo_mode: Option<StereoMode>,
}

/// The sample data encoding cannot be played by the mixer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unsupported sample data format ({channels} channels)")]
pub struct UnsupportedFormat {
    pub channels: u16,
}

/// Amiga hardware panning of a channel: L R R L, repeating.
pub fn amiga_channel_pan(channel: usize) -> f32 {
    const PANS: [f32; 4] = [-1.0, 1.0, 1.0, -1.0];
    PANS[channel % 4]
}

/// A multi-channel sample mixer.
pub trait Wavetable {
    /// Output sample rate in Hz.
    fn set_sample_rate(&mut self, sample_rate: f64);

    /// Resize the channel set; new channels start silent.
    fn set_num_channels(&mut self, num_channels: usize);

    /// Silence every channel, keeping uploaded samples.
    fn reset_mixer(&mut self);

    /// Convert a sample for playback. `Ok(None)` for samples without data.
    fn upload_sample(
        &mut self,
        sample: &InstrumentSample,
    ) -> Result<Option<SampleKey>, UnsupportedFormat>;

    fn remove_sample(&mut self, key: SampleKey);

    /// Current settings, every field populated.
    fn parameters(&self) -> WavetableParameters;

    fn set_parameters(&mut self, params: &WavetableParameters);

    /// Update a channel. Channels past the configured count are ignored.
    fn set_mixer(&mut self, channel: usize, flags: MixerFlags, params: &MixerParams);

    /// Mix `count` frames into `buffer` starting at frame `offset`.
    fn render(&mut self, buffer: &mut StereoBuffer, offset: usize, count: usize);

    fn mixer_info(&self) -> Vec<MixerChannelInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amiga_pan_pattern_repeats() {
        let pans: Vec<f32> = (0..8).map(amiga_channel_pan).collect();
        assert_eq!(pans, vec![-1.0, 1.0, 1.0, -1.0, -1.0, 1.0, 1.0, -1.0]);
    }

    #[test]
    fn options_parse_case_insensitively() {
        assert_eq!("BLEP".parse::<Interpolation>(), Ok(Interpolation::Blep));
        assert_eq!("watte".parse::<Interpolation>(), Ok(Interpolation::Watte));
        assert_eq!("Amiga".parse::<StereoMode>(), Ok(StereoMode::Amiga));
        assert!("cubic".parse::<Interpolation>().is_err());
    }

    #[test]
    fn display_round_trips_names() {
        assert_eq!(Interpolation::Linear.to_string(), "linear");
        assert_eq!(StereoMode::Mono.to_string(), "mono");
    }

    #[test]
    fn flag_bits_match_protocol() {
        assert_eq!(MixerFlags::VOLUME.bits(), 0x01);
        assert_eq!(MixerFlags::SAMPLE_CHANGE.bits(), 0x10);
        assert_eq!(MixerFlags::SAMPLE_POSITION.bits(), 0x20);
    }
}

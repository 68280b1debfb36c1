//! Playback engine for tmodplay.
//!
//! A Protracker playroutine steps through the track tick by tick and
//! programs a software wavetable mixer, which renders the channels into a
//! stereo buffer.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod blep;
mod blep_table;
mod channel;
mod frame;
pub mod frequency;
mod playroutine;
mod protracker;
mod renderer;
mod software;
mod wavetable;

pub use blep::BlepResampler;
pub use channel::ChannelState;
pub use frame::Frame;
pub use frequency::{floor_period, note_period};
pub use playroutine::{
    ChannelInfo, Playroutine, PlayroutineInfo, PlayroutineParameters, PositionOptions, Region,
    TempoTimer,
};
pub use protracker::ProtrackerPlayroutine;
pub use renderer::{Parameters, RenderError, Renderer};
pub use software::SoftwareWavetable;
pub use wavetable::{
    amiga_channel_pan, Interpolation, MixerChannelInfo, MixerFlags, MixerParams,
    ParseOptionError, StereoMode, UnsupportedFormat, Wavetable, WavetableParameters,
};

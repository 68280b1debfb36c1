//! Tick-driven renderer.
//!
//! Interleaves playroutine ticks with wavetable rendering so that each
//! tick's mixer changes land on the right output frame.

use alloc::sync::Arc;
use alloc::vec::Vec;

use tm_ir::{SampleKey, StereoBuffer, Track};

use crate::frame::Frame;
use crate::playroutine::{Playroutine, PlayroutineInfo, PlayroutineParameters, PositionOptions};
use crate::protracker::ProtrackerPlayroutine;
use crate::software::SoftwareWavetable;
use crate::wavetable::{UnsupportedFormat, Wavetable, WavetableParameters};

/// Renderer settings: both halves of the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Parameters {
    pub playroutine: PlayroutineParameters,
    pub wavetable: WavetableParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("sample {index} cannot be played: {source}")]
    Sample {
        index: usize,
        #[source]
        source: UnsupportedFormat,
    },
}

fn merge<T: Copy>(into: &mut Option<T>, from: Option<T>) {
    if from.is_some() {
        *into = from;
    }
}

/// The playback engine: a Protracker playroutine driving a software mixer.
pub struct Renderer {
    track: Arc<Track>,
    sample_rate: f64,
    wavetable: SoftwareWavetable,
    playroutine: ProtrackerPlayroutine,
    sample_keys: Vec<Option<SampleKey>>,
    /// Playroutine settings, re-applied after every reset
    playroutine_parameters: PlayroutineParameters,
    /// Output frames left in the current tick
    tick_frames_left: f64,
    playing: bool,
}

impl Renderer {
    /// Create a renderer for `track`, uploading its samples.
    pub fn new(track: Arc<Track>, sample_rate: u32) -> Result<Self, RenderError> {
        let mut wavetable = SoftwareWavetable::new();
        wavetable.set_sample_rate(sample_rate as f64);
        wavetable.set_num_channels(track.num_channels as usize);

        let sample_keys = track
            .samples
            .iter()
            .enumerate()
            .map(|(index, sample)| {
                wavetable
                    .upload_sample(sample)
                    .map_err(|source| RenderError::Sample { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let playroutine = ProtrackerPlayroutine::new(Arc::clone(&track), sample_keys.clone());

        Ok(Self {
            track,
            sample_rate: sample_rate as f64,
            wavetable,
            playroutine,
            sample_keys,
            playroutine_parameters: PlayroutineParameters::default(),
            tick_frames_left: 0.0,
            playing: false,
        })
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate as u32
    }

    /// Start playback from the beginning of the song.
    pub fn play(&mut self) {
        self.playroutine.reset();
        self.wavetable.reset_mixer();
        self.playroutine
            .set_parameters(&self.playroutine_parameters, &mut self.wavetable);
        self.tick_frames_left = 0.0;
        self.playing = true;
    }

    /// Stop playback. [`render`](Self::render) leaves the buffer untouched
    /// until the next [`play`](Self::play).
    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Whether the song halted itself with `F00`.
    pub fn is_halted(&self) -> bool {
        self.playroutine.is_halted()
    }

    pub fn parameters(&self) -> Parameters {
        Parameters {
            playroutine: self.playroutine.parameters(),
            wavetable: self.wavetable.parameters(),
        }
    }

    pub fn set_parameters(&mut self, params: &Parameters) {
        let stored = &mut self.playroutine_parameters;
        merge(&mut stored.region, params.playroutine.region);
        merge(&mut stored.default_pan_width, params.playroutine.default_pan_width);
        merge(&mut stored.tempo_timer, params.playroutine.tempo_timer);

        self.playroutine
            .set_parameters(&params.playroutine, &mut self.wavetable);
        self.wavetable.set_parameters(&params.wavetable);
    }

    pub fn set_position(&mut self, position: isize, row: isize, options: PositionOptions) {
        self.playroutine
            .set_position(position, row, options, &mut self.wavetable);
    }

    /// Sequence position and row, without building a full [`info`](Self::info).
    pub fn position(&self) -> (usize, usize) {
        self.playroutine.position()
    }

    pub fn info(&self) -> PlayroutineInfo {
        self.playroutine.info(&self.wavetable)
    }

    /// Mix `count` frames into `buffer` from frame `offset`, running
    /// playroutine ticks as they fall due.
    pub fn render(&mut self, buffer: &mut StereoBuffer, offset: usize, count: usize) {
        if !self.playing || self.sample_rate <= 0.0 {
            return;
        }
        let end = (offset + count).min(buffer.frames());
        let mut position = offset;

        while position < end {
            while self.tick_frames_left < 1.0 {
                self.tick_frames_left +=
                    self.playroutine.process_tick(&mut self.wavetable) * self.sample_rate;
            }
            let frames = ((end - position) as f64).min(libm::round(self.tick_frames_left)) as usize;
            self.wavetable.render(buffer, position, frames);
            position += frames;
            self.tick_frames_left -= frames as f64;
        }
    }

    /// Render `count` frames into a scratch buffer and append them as
    /// 16-bit frames.
    pub fn render_frames(
        &mut self,
        scratch: &mut StereoBuffer,
        out: &mut impl Extend<Frame>,
        count: usize,
    ) {
        let count = count.min(scratch.frames());
        scratch.silence();
        self.render(scratch, 0, count);
        Frame::extend_from_buffer(out, scratch, count);
    }

    /// Remove the track's samples from the mixer.
    pub fn unload(&mut self) {
        self.stop();
        self.wavetable.reset_mixer();
        for key in self.sample_keys.drain(..).flatten() {
            self.wavetable.remove_sample(key);
        }
    }
}

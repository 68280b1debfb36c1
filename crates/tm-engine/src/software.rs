//! Software wavetable mixer.
//!
//! Samples are converted to `f32` with guard samples around them so the
//! interpolators can read neighbours without bounds checks. Volume changes
//! ramp over 10 ms in the linear and Watte modes, and a sample or position
//! change fades the previous sound out on a shadow voice instead of cutting
//! it.

use alloc::vec;
use alloc::vec::Vec;

use slotmap::SlotMap;
use tm_ir::{InstrumentSample, SampleKey, StereoBuffer};

use crate::blep::BlepResampler;
use crate::wavetable::{
    amiga_channel_pan, Interpolation, MixerChannelInfo, MixerFlags, MixerParams, StereoMode,
    UnsupportedFormat, Wavetable, WavetableParameters,
};

/// Guard samples before the sample start.
const PRE_ROLL: usize = 1;

/// Samples after the end: two interpolation taps, plus one for positions
/// landing exactly on the end.
const POST_ROLL: usize = 3;

/// Volume ramp duration in milliseconds.
const VOLUME_RAMP_MS: f64 = 10.0;

/// Amplification that maps to unity channel gain.
const AMPLIFICATION_DIVISOR: f32 = 4.0;

/// A sample converted for playback.
#[derive(Clone, Debug)]
struct WavetableSample {
    /// Converted frames, starting at `PRE_ROLL`
    data: Vec<f32>,
    loop_start: f64,
    /// 0 when not looping
    loop_length: f64,
    /// Positions beyond this wrap or stop
    length: f64,
}

impl WavetableSample {
    fn from_instrument(sample: &InstrumentSample) -> Result<Option<Self>, UnsupportedFormat> {
        let Some(source) = sample.data.as_ref().filter(|d| !d.is_empty()) else {
            return Ok(None);
        };
        if source.num_channels() != 1 {
            return Err(UnsupportedFormat {
                channels: source.num_channels(),
            });
        }

        let looped = sample.loop_length > 0;
        let length = if looped {
            (sample.loop_start + sample.loop_length) as usize
        } else {
            source.len()
        };

        let mut data = vec![0.0f32; length + PRE_ROLL + POST_ROLL];
        for (i, slot) in data[PRE_ROLL..PRE_ROLL + length].iter_mut().enumerate() {
            *slot = source.get_f32(i).unwrap_or(0.0);
        }

        // Unroll the loop start past the end for interpolation
        let loop_start = sample.loop_start as usize + PRE_ROLL;
        if looped {
            let end = length + PRE_ROLL;
            let mut k = loop_start;
            for j in end..end + POST_ROLL {
                if k >= end {
                    k = loop_start;
                }
                data[j] = data[k];
                k += 1;
            }
        }

        Ok(Some(Self {
            data,
            loop_start: if looped { sample.loop_start as f64 } else { 0.0 },
            loop_length: sample.loop_length as f64,
            length: length as f64,
        }))
    }

    #[inline]
    fn wrap(&self, position: f64) -> f64 {
        ((position - self.loop_start) % self.loop_length) + self.loop_start
    }
}

/// Playback state shared by a channel and its fading shadow.
#[derive(Clone, Copy, Debug, Default)]
struct Voice {
    sample: Option<SampleKey>,
    /// Position relative to the sample start
    sample_position: f64,
    sample_rate: f64,
    speed: f64,
    volume: f32,
    left_volume: f32,
    right_volume: f32,
    volume_step: f32,
    left_volume_step: f32,
    right_volume_step: f32,
    volume_ramp_steps: usize,
}

/// Gains used by the BLEP path, which mixes at the target level.
#[derive(Clone, Copy, Debug, Default)]
struct PanGains {
    amp_volume: f32,
    left: f32,
    right: f32,
}

#[derive(Clone, Debug, Default)]
struct MixerChannel {
    voice: Voice,
    target_volume: f32,
    left_target_volume: f32,
    right_target_volume: f32,
    pan: f32,
    gains: PanGains,
    /// Previous sound fading out after a sample or position change
    cutoff: Option<Voice>,
}

impl MixerChannel {
    fn current_volume(&self) -> f32 {
        if self.voice.volume_ramp_steps > 0 {
            self.target_volume
        } else {
            self.voice.volume
        }
    }
}

/// Mix settings resolved from [`WavetableParameters`].
#[derive(Clone, Copy, Debug)]
struct Settings {
    amiga_crossfeed: f32,
    amplification: f32,
    interpolation: Interpolation,
    stereo_mode: StereoMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            amiga_crossfeed: 0.0,
            amplification: 1.0,
            interpolation: Interpolation::default(),
            stereo_mode: StereoMode::default(),
        }
    }
}

impl Settings {
    fn ramps(&self) -> bool {
        !matches!(self.interpolation, Interpolation::Nearest | Interpolation::Blep)
    }
}

/// The software mixer.
pub struct SoftwareWavetable {
    channels: Vec<MixerChannel>,
    samples: SlotMap<SampleKey, WavetableSample>,
    blep: BlepResampler,
    settings: Settings,
    sample_rate: f64,
    volume_ramp_step: f32,
}

impl Default for SoftwareWavetable {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareWavetable {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            samples: SlotMap::with_key(),
            blep: BlepResampler::new(),
            settings: Settings::default(),
            sample_rate: 0.0,
            volume_ramp_step: 1.0,
        }
    }

    /// Frames over which a full-scale volume change ramps.
    pub fn volume_ramp_frames(&self) -> f32 {
        1.0 / self.volume_ramp_step
    }

    /// Number of uploaded samples.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    fn reset_channel(&mut self, channel: usize) {
        self.blep.reset_channel(channel);
        if let Some(ch) = self.channels.get_mut(channel) {
            *ch = MixerChannel::default();
        }
    }

    fn apply_volume(&mut self, channel: usize, volume: f32, disable_ramping: bool) {
        let settings = self.settings;
        let ramp_step = self.volume_ramp_step;
        let ch = &mut self.channels[channel];

        let pan = match settings.stereo_mode {
            StereoMode::Mono => 0.0,
            StereoMode::Amiga => amiga_channel_pan(channel) * (1.0 - settings.amiga_crossfeed),
            StereoMode::Stereo => ch.pan,
        };

        ch.gains = PanGains {
            amp_volume: volume * (settings.amplification / AMPLIFICATION_DIVISOR),
            left: libm::sqrtf((1.0 - pan) / 2.0),
            right: libm::sqrtf((1.0 + pan) / 2.0),
        };
        ch.target_volume = volume;
        ch.left_target_volume = ch.gains.left * ch.gains.amp_volume;
        ch.right_target_volume = ch.gains.right * ch.gains.amp_volume;

        let voice = &mut ch.voice;
        let diff = (ch.left_target_volume - voice.left_volume)
            .abs()
            .max((ch.right_target_volume - voice.right_volume).abs());
        let steps = libm::floorf(diff / ramp_step);

        if disable_ramping || steps <= 0.0 || !settings.ramps() {
            voice.volume_ramp_steps = 0;
            voice.volume = ch.target_volume;
            voice.left_volume = ch.left_target_volume;
            voice.right_volume = ch.right_target_volume;
        } else {
            voice.volume_ramp_steps = steps as usize;
            voice.volume_step = (ch.target_volume - voice.volume) / steps;
            voice.left_volume_step = (ch.left_target_volume - voice.left_volume) / steps;
            voice.right_volume_step = (ch.right_target_volume - voice.right_volume) / steps;
        }
    }

    /// Move the current sound onto the channel's fading shadow voice.
    fn cutoff_sample(&mut self, channel: usize) {
        let settings = self.settings;
        let ramp_step = self.volume_ramp_step;
        let ch = &mut self.channels[channel];
        if !settings.ramps() {
            ch.cutoff = None;
            return;
        }

        let mut cutoff = ch.voice;
        let steps = libm::floorf(cutoff.left_volume.max(cutoff.right_volume) / ramp_step);
        if steps > 0.0 {
            cutoff.volume_ramp_steps = steps as usize;
            cutoff.volume_step = -cutoff.volume / steps;
            cutoff.left_volume_step = -cutoff.left_volume / steps;
            cutoff.right_volume_step = -cutoff.right_volume / steps;
            ch.cutoff = Some(cutoff);
        } else {
            ch.cutoff = None;
        }
    }
}

/// Render `voice` into `left`/`right` over `range`, ramping the volumes by
/// the voice's steps when `ramp` is set. Returns the final position.
#[allow(clippy::too_many_arguments)]
fn render_chunk(
    voice: &mut Voice,
    sample: &WavetableSample,
    mut position: f64,
    gains: PanGains,
    ramp: bool,
    interpolation: Interpolation,
    blep: &mut BlepResampler,
    channel: usize,
    left: &mut [f32],
    right: &mut [f32],
) -> f64 {
    let (volume_step, left_step, right_step) = if ramp {
        (voice.volume_step, voice.left_volume_step, voice.right_volume_step)
    } else {
        (0.0, 0.0, 0.0)
    };
    let data = &sample.data;

    for (out_l, out_r) in left.iter_mut().zip(right.iter_mut()) {
        voice.volume += volume_step;
        voice.left_volume += left_step;
        voice.right_volume += right_step;

        if position > sample.length {
            if sample.loop_length == 0.0 {
                return position;
            }
            position = sample.wrap(position);
        }

        let pos = position as usize + PRE_ROLL;
        let fraction = position - libm::floor(position);
        let x = fraction as f32;
        match interpolation {
            Interpolation::Nearest => {
                let sv = data[pos];
                *out_l += sv * voice.left_volume;
                *out_r += sv * voice.right_volume;
            }
            Interpolation::Blep => {
                let sv = blep.mix_sample(channel, data[pos] * gains.amp_volume, pos as i64, fraction);
                *out_l += sv * gains.left;
                *out_r += sv * gains.right;
            }
            Interpolation::Linear => {
                let (s0, s1) = (data[pos], data[pos + 1]);
                let sv = s0 + (s1 - s0) * x;
                *out_l += sv * voice.left_volume;
                *out_r += sv * voice.right_volume;
            }
            Interpolation::Watte => {
                let ym1py2 = data[pos - 1] + data[pos + 2];
                let c0 = data[pos];
                let y1 = data[pos + 1];
                let c1 = 1.5 * y1 - 0.5 * (c0 + ym1py2);
                let c2 = 0.5 * (ym1py2 - c0 - y1);
                let sv = (c2 * x + c1) * x + c0;
                *out_l += sv * voice.left_volume;
                *out_r += sv * voice.right_volume;
            }
        }

        position += voice.speed;
    }
    position
}

impl Wavetable for SoftwareWavetable {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.volume_ramp_step = (1.0 / (sample_rate / 1000.0 * VOLUME_RAMP_MS)) as f32;
    }

    fn set_num_channels(&mut self, num_channels: usize) {
        self.blep.set_num_channels(num_channels);
        self.channels.resize_with(num_channels, MixerChannel::default);
    }

    fn reset_mixer(&mut self) {
        for i in 0..self.channels.len() {
            self.reset_channel(i);
        }
    }

    fn upload_sample(
        &mut self,
        sample: &InstrumentSample,
    ) -> Result<Option<SampleKey>, UnsupportedFormat> {
        Ok(WavetableSample::from_instrument(sample)?.map(|ws| self.samples.insert(ws)))
    }

    fn remove_sample(&mut self, key: SampleKey) {
        self.samples.remove(key);
    }

    fn parameters(&self) -> WavetableParameters {
        WavetableParameters {
            amiga_crossfeed: Some(self.settings.amiga_crossfeed),
            amplification: Some(self.settings.amplification),
            interpolation: Some(self.settings.interpolation),
            stereo_mode: Some(self.settings.stereo_mode),
        }
    }

    fn set_parameters(&mut self, params: &WavetableParameters) {
        let mut apply_volume = false;
        if let Some(crossfeed) = params.amiga_crossfeed {
            self.settings.amiga_crossfeed = crossfeed.clamp(0.0, 1.0);
            apply_volume = true;
        }
        if let Some(amplification) = params.amplification {
            self.settings.amplification = amplification.clamp(0.0, 4.0);
            apply_volume = true;
        }
        if let Some(interpolation) = params.interpolation {
            self.settings.interpolation = interpolation;
        }
        if let Some(stereo_mode) = params.stereo_mode {
            self.settings.stereo_mode = stereo_mode;
            apply_volume = true;
        }
        if apply_volume {
            for i in 0..self.channels.len() {
                let volume = self.channels[i].current_volume();
                self.apply_volume(i, volume, false);
            }
        }
    }

    fn set_mixer(&mut self, channel: usize, flags: MixerFlags, params: &MixerParams) {
        if channel >= self.channels.len() {
            return;
        }
        let output_rate = self.sample_rate;
        let ch = &mut self.channels[channel];

        let mut volume = ch.current_volume();
        let mut apply_volume = false;
        let mut disable_ramping = false;

        if flags.contains(MixerFlags::VOLUME) {
            volume = params.volume.clamp(0.0, 1.0);
            apply_volume = true;
        }
        if flags.contains(MixerFlags::PAN) {
            ch.pan = params.pan.clamp(-1.0, 1.0);
            apply_volume = true;
        }
        if flags.contains(MixerFlags::SPEED) {
            if params.sample_rate > 0.0 {
                ch.voice.sample_rate = params.sample_rate;
                ch.voice.speed = params.sample_rate / output_rate;
            } else {
                ch.voice.sample_rate = 0.0;
                ch.voice.speed = 0.0;
            }
            self.blep.set_speed(channel, ch.voice.speed);
        }

        let mut new_position = ch.voice.sample_position;
        if flags.contains(MixerFlags::SAMPLE_POSITION) {
            new_position = params.sample_position.max(0.0);
        }
        let new_sample = if flags.contains(MixerFlags::SAMPLE_CHANGE) {
            params.sample.filter(|key| self.samples.contains_key(*key))
        } else {
            ch.voice.sample
        };

        let mut cutoff_done = false;
        if flags.contains(MixerFlags::SAMPLE_POSITION) && new_position != ch.voice.sample_position {
            self.cutoff_sample(channel);
            cutoff_done = true;
            let ch = &mut self.channels[channel];
            ch.voice.sample_position = new_position;
            if new_position == 0.0 {
                disable_ramping = true;
            } else {
                // Ramp in from silence
                ch.voice.volume = 0.0;
                ch.voice.left_volume = 0.0;
                ch.voice.right_volume = 0.0;
                apply_volume = true;
            }
        }

        if flags.contains(MixerFlags::SAMPLE_CHANGE) && new_sample != self.channels[channel].voice.sample {
            if !cutoff_done {
                self.cutoff_sample(channel);
            }
            self.channels[channel].voice.sample = new_sample;
            if new_position == 0.0 {
                disable_ramping = true;
            }
        }

        if apply_volume {
            self.apply_volume(channel, volume, disable_ramping);
        }
    }

    fn render(&mut self, buffer: &mut StereoBuffer, offset: usize, count: usize) {
        let end = (offset + count).min(buffer.frames());
        if offset >= end {
            return;
        }
        let count = end - offset;
        let (left, right) = buffer.planes_mut();
        let (left, right) = (&mut left[offset..end], &mut right[offset..end]);
        let interpolation = self.settings.interpolation;

        for (channel, ch) in self.channels.iter_mut().enumerate() {
            // Fade out the previous sound
            if let Some(cutoff) = ch.cutoff.as_mut() {
                let ramp = cutoff.volume_ramp_steps.min(count);
                if let Some(sample) = cutoff.sample.and_then(|key| self.samples.get(key)) {
                    if ramp > 0 {
                        let position = cutoff.sample_position;
                        cutoff.sample_position = render_chunk(
                            cutoff,
                            sample,
                            position,
                            ch.gains,
                            true,
                            interpolation,
                            &mut self.blep,
                            channel,
                            &mut left[..ramp],
                            &mut right[..ramp],
                        );
                    }
                    cutoff.volume_ramp_steps -= ramp;
                } else {
                    cutoff.volume_ramp_steps = 0;
                }
                if cutoff.volume_ramp_steps == 0 {
                    ch.cutoff = None;
                }
            }

            let Some(sample) = ch.voice.sample.and_then(|key| self.samples.get(key)) else {
                continue;
            };
            let mut position = ch.voice.sample_position;
            let mut chunk_start = 0;

            // Ramp toward the target volume to avoid clicks
            let ramp = ch.voice.volume_ramp_steps.min(count);
            if ramp > 0 {
                position = render_chunk(
                    &mut ch.voice,
                    sample,
                    position,
                    ch.gains,
                    true,
                    interpolation,
                    &mut self.blep,
                    channel,
                    &mut left[..ramp],
                    &mut right[..ramp],
                );
                chunk_start = ramp;
                ch.voice.volume_ramp_steps -= ramp;
                if ch.voice.volume_ramp_steps == 0 {
                    ch.voice.volume = ch.target_volume;
                    ch.voice.left_volume = ch.left_target_volume;
                    ch.voice.right_volume = ch.right_target_volume;
                }
            }

            let remaining = count - chunk_start;
            if remaining > 0 {
                if ch.voice.volume == 0.0 {
                    // Silent: skip ahead without mixing
                    position += remaining as f64 * ch.voice.speed;
                    if position > sample.length && sample.loop_length > 0.0 {
                        position = sample.wrap(position);
                    }
                } else {
                    position = render_chunk(
                        &mut ch.voice,
                        sample,
                        position,
                        ch.gains,
                        false,
                        interpolation,
                        &mut self.blep,
                        channel,
                        &mut left[chunk_start..],
                        &mut right[chunk_start..],
                    );
                }
            }

            ch.voice.sample_position = position;
        }
    }

    fn mixer_info(&self) -> Vec<MixerChannelInfo> {
        self.channels
            .iter()
            .map(|ch| MixerChannelInfo {
                sample_position: ch.voice.sample_position,
                sample_rate: ch.voice.sample_rate,
                speed: ch.voice.speed,
                volume: ch.current_volume(),
                pan: ch.pan,
            })
            .collect()
    }
}

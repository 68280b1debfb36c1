//! Channel state for the Protracker playroutine.
//!
//! Periods are kept ×16 (see [`crate::frequency`]); volumes are 0-64.

use tm_ir::{Note, Pitch};

use crate::frequency::{floor_period, note_period, PERIOD_MAX, PERIOD_MIN, PERIOD_SCALE, VIBRATO_SINE};
use crate::wavetable::MixerFlags;

/// Sequencer-side state of a single tracker channel.
#[derive(Clone, Debug, Default)]
pub struct ChannelState {
    /// Mixer fields changed during the current tick
    pub mixer_flags: MixerFlags,
    /// Last note that set the period (arpeggio base)
    pub last_pitch: Option<Pitch>,
    /// Cell of the current row
    pub note: Note,

    /// Channel volume (0-64)
    pub volume: i32,
    /// Volume sent to the mixer, includes tremolo
    pub play_volume: i32,
    /// Panning (-1.0 - 1.0)
    pub pan: f32,

    /// Sample selected by the last sample number
    pub sample_index: Option<usize>,
    /// Sample actually playing; lags `sample_index` during tone portamento
    pub instrument_sample: Option<usize>,
    pub finetune: i8,
    /// Offset stored by 9xx, in sample frames
    pub sample_offset: u32,
    /// Start position for the next trigger
    pub sample_position: u32,

    // Pitch state
    pub period: i32,
    /// Period sent to the mixer, includes vibrato and arpeggio
    pub play_period: i32,
    pub porta_direction: i32,
    pub porta_speed: u8,
    /// Tone portamento target, 0 when idle
    pub porta_target: i32,
    pub glissando: bool,

    // Effect memory
    /// Bits 0-1 vibrato waveform, bit 2 no retrigger; bits 4-7 the same
    /// for tremolo
    pub wave_control: u8,
    pub vibrato_position: u8,
    pub vibrato_param: u8,
    pub tremolo_position: u8,
    pub tremolo_param: u8,
}

/// Fill empty nibbles of an effect parameter from its last value.
fn with_memory(param: u8, memory: u8) -> u8 {
    let mut param = param;
    if param & 0x0f == 0 {
        param |= memory & 0x0f;
    }
    if param & 0xf0 == 0 {
        param |= memory & 0xf0;
    }
    param
}

/// Sawtooth multiplier; `position` selects the rising or falling half.
fn ramp(index: u8, position: u8) -> i32 {
    let value = (index as i32) << 3;
    if position < 0x80 {
        value
    } else {
        255 - value
    }
}

impl ChannelState {
    pub fn new(pan: f32) -> Self {
        Self {
            pan,
            ..Default::default()
        }
    }

    fn set_period(&mut self, period: i32) {
        self.period = period;
        self.play_period = period;
        self.mixer_flags |= MixerFlags::SPEED;
    }

    fn set_volume_level(&mut self, volume: i32) {
        self.volume = volume.clamp(0, 64);
        self.play_volume = self.volume;
        self.mixer_flags |= MixerFlags::VOLUME;
    }

    /// 0xy
    pub fn arpeggio(&mut self, param: u8, tick: u32) {
        let Some(pitch) = self.last_pitch else {
            return;
        };
        let pitch = match tick % 3 {
            1 => pitch.transpose(param >> 4),
            2 => pitch.transpose(param & 0x0f),
            _ => pitch,
        };
        self.play_period = note_period(pitch, self.finetune);
        self.mixer_flags |= MixerFlags::SPEED;
    }

    /// 1xx, E1x
    pub fn porta_up(&mut self, param: u8) {
        self.set_period((self.period - param as i32 * PERIOD_SCALE).max(PERIOD_MIN));
    }

    /// 2xx, E2x
    pub fn porta_down(&mut self, param: u8) {
        self.set_period((self.period + param as i32 * PERIOD_SCALE).clamp(0, PERIOD_MAX));
    }

    /// Stage a tone portamento toward `pitch`.
    pub fn set_porta_target(&mut self, pitch: Pitch) {
        let target = note_period(pitch, self.finetune);
        let direction = target - self.period;
        if direction != 0 && self.period > 0 {
            self.porta_target = target;
            self.porta_direction = direction.signum();
        } else {
            self.porta_target = 0;
        }
    }

    /// 3xx
    pub fn tone_porta(&mut self, param: u8) {
        if param != 0 {
            self.porta_speed = param;
        }
        if self.porta_target == 0 {
            return;
        }

        let period = self.period + self.porta_speed as i32 * PERIOD_SCALE * self.porta_direction;
        let overshoot = (self.porta_direction > 0 && period > self.porta_target)
            || (self.porta_direction < 0 && period < self.porta_target);
        if overshoot {
            self.period = self.porta_target;
            self.play_period = self.porta_target;
            self.porta_target = 0;
        } else {
            self.period = period;
            self.play_period = if self.glissando {
                floor_period(period, self.finetune)
            } else {
                period
            };
        }
        self.mixer_flags |= MixerFlags::SPEED;
    }

    /// 4xy
    pub fn vibrato(&mut self, param: u8) {
        let param = with_memory(param, self.vibrato_param);
        self.vibrato_param = param;

        let index = (self.vibrato_position >> 2) & 0x1f;
        let multiplier = match self.wave_control & 0x03 {
            0x00 => VIBRATO_SINE[index as usize] as i32,
            0x01 => ramp(index, self.vibrato_position),
            _ => 255,
        };
        let delta = PERIOD_SCALE * ((multiplier * (param & 0x0f) as i32) >> 7);
        self.play_period = if self.vibrato_position < 0x80 {
            self.period + delta
        } else {
            self.period - delta
        };
        self.mixer_flags |= MixerFlags::SPEED;
        self.vibrato_position = self.vibrato_position.wrapping_add((param >> 2) & 0x3c);
    }

    /// 7xy
    pub fn tremolo(&mut self, param: u8) {
        let param = with_memory(param, self.tremolo_param);
        self.tremolo_param = param;

        let index = (self.tremolo_position >> 2) & 0x1f;
        let multiplier = match self.wave_control & 0x30 {
            0x00 => VIBRATO_SINE[index as usize] as i32,
            // Protracker reads the vibrato position here
            0x10 => ramp(index, self.vibrato_position),
            _ => 255,
        };
        let delta = (multiplier * (param & 0x0f) as i32) >> 6;
        let volume = if self.tremolo_position < 0x80 {
            self.volume + delta
        } else {
            self.volume - delta
        };
        self.play_volume = volume.clamp(0, 64);
        self.mixer_flags |= MixerFlags::VOLUME;
        self.tremolo_position = self.tremolo_position.wrapping_add((param >> 2) & 0x3c);
    }

    /// 8xx
    pub fn set_fine_pan(&mut self, param: u8) {
        self.pan = (param as f32 - 127.5) / 127.5;
        self.mixer_flags |= MixerFlags::PAN;
    }

    /// E8x
    pub fn set_pan(&mut self, param: u8) {
        self.pan = param as f32 / 7.5 - 1.0;
        self.mixer_flags |= MixerFlags::PAN;
    }

    /// 9xx
    pub fn sample_offset(&mut self, param: u8) {
        if param != 0 {
            self.sample_offset = (param as u32) << 8;
        }
        self.sample_position = self.sample_offset;
    }

    /// Axy
    pub fn volume_slide(&mut self, param: u8) {
        let delta = match param & 0x0f {
            0 => (param >> 4) as i32,
            down => -(down as i32),
        };
        self.set_volume_level(self.volume + delta);
    }

    /// Cxx
    pub fn set_volume(&mut self, param: u8) {
        self.set_volume_level(param as i32);
    }

    /// EAx / EBx
    pub fn fine_volume(&mut self, delta: i32) {
        self.set_volume_level(self.volume + delta);
    }

    /// E4x
    pub fn set_vibrato_waveform(&mut self, param: u8) {
        self.wave_control = (self.wave_control & 0xf0) | (param & 0x0f);
    }

    /// E7x
    pub fn set_tremolo_waveform(&mut self, param: u8) {
        self.wave_control = (self.wave_control & 0x0f) | (param << 4);
    }

    /// E5x, sign-extending the nibble
    pub fn set_finetune(&mut self, param: u8) {
        let nibble = (param & 0x0f) as i8;
        self.finetune = if nibble >= 8 { nibble - 16 } else { nibble };
    }

    /// Restart the current sample from 0 at the channel period.
    fn restart(&mut self) {
        self.sample_position = 0;
        self.play_period = self.period;
        self.mixer_flags |= MixerFlags::SAMPLE_POSITION | MixerFlags::SPEED;
    }

    /// E9x
    pub fn retrigger(&mut self, param: u8, tick: u32) {
        if param == 0 || tick % param as u32 > 0 {
            return;
        }
        self.restart();
    }

    /// ECx
    pub fn note_cut(&mut self, param: u8, tick: u32) {
        if tick != param as u32 {
            return;
        }
        self.volume = 0;
        self.play_volume = 0;
        self.mixer_flags |= MixerFlags::VOLUME;
    }

    /// EDx
    pub fn note_delay(&mut self, param: u8, tick: u32) {
        if tick != param as u32 || self.note.pitch.is_none() {
            return;
        }
        self.restart();
    }
}

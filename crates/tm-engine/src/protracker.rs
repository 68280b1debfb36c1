//! Protracker playroutine.
//!
//! Emulates the Protracker 2/3 replayer tick by tick: the first tick of a
//! row latches notes and runs the "note" effects, the remaining ticks run
//! the continuous effects, and rows repeated by `EEx` run a reduced set.

use alloc::sync::Arc;
use alloc::vec::Vec;

use tm_ir::{Effect, Note, SampleKey, Track, ROWS_PER_PATTERN};

use crate::channel::ChannelState;
use crate::frequency::{note_period, NTSC_CLOCK, PAL_CLOCK};
use crate::playroutine::{
    ChannelInfo, Playroutine, PlayroutineInfo, PlayroutineParameters, PositionOptions, Region,
    TempoTimer,
};
use crate::wavetable::{amiga_channel_pan, MixerFlags, MixerParams, Wavetable};

const DEFAULT_BPM: u32 = 125;
const DEFAULT_SPEED: u32 = 6;

/// CIA timer constants per region. Protracker hardcodes these instead of
/// deriving them from the clock (PAL rounded down, NTSC up).
const CIA_PAL: f64 = 1_773_447.0;
const CIA_NTSC: f64 = 1_789_773.0;

bitflags::bitflags! {
    /// Pending sequence changes, resolved at the end of the row.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    struct SequenceFlags: u8 {
        const BREAK = 0x01;
        const SET_POSITION = 0x02;
        /// Advance one more row after the break
        const SKIP = 0x04;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Initialized,
    Running,
}

/// Which effect table a tick dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// First tick of a row
    FirstTick,
    /// First tick of a row repeated by a pattern delay
    PatternDelay,
    /// Every other tick
    Intra,
}

fn region_clock(region: Region) -> f64 {
    match region {
        Region::Pal => PAL_CLOCK,
        Region::Ntsc => NTSC_CLOCK,
    }
}

pub struct ProtrackerPlayroutine {
    track: Arc<Track>,
    /// Mixer keys of the track's samples, by sample index
    sample_keys: Vec<Option<SampleKey>>,
    channels: Vec<ChannelState>,
    state: State,

    region: Region,
    tempo_timer: TempoTimer,
    default_pan_width: f32,
    /// Paula clock ×8, matching the ×16 periods
    base_clock: f64,

    bpm: u32,
    speed: u32,
    tick_rate: f64,
    next_tick_rate: f64,

    position: usize,
    row: usize,
    tick: u32,

    break_row: usize,
    break_position: usize,
    pattern_delay: u32,
    pattern_delay_count: u32,
    loop_start_row: usize,
    loop_count: u8,
    sequence_flags: SequenceFlags,
}

impl ProtrackerPlayroutine {
    pub fn new(track: Arc<Track>, sample_keys: Vec<Option<SampleKey>>) -> Self {
        let mut routine = Self {
            track,
            sample_keys,
            channels: Vec::new(),
            state: State::Initialized,
            region: Region::Pal,
            tempo_timer: TempoTimer::Cia,
            default_pan_width: 0.0,
            base_clock: PAL_CLOCK * 8.0,
            bpm: DEFAULT_BPM,
            speed: DEFAULT_SPEED,
            tick_rate: 0.0,
            next_tick_rate: 0.0,
            position: 0,
            row: 0,
            tick: 0,
            break_row: 0,
            break_position: 0,
            pattern_delay: 0,
            pattern_delay_count: 0,
            loop_start_row: 0,
            loop_count: 0,
            sequence_flags: SequenceFlags::empty(),
        };
        routine.reset();
        routine
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Current sequence position and row.
    pub fn position(&self) -> (usize, usize) {
        (self.position, self.row)
    }

    /// Whether the song is halted by `F00`.
    pub fn is_halted(&self) -> bool {
        self.speed == 0
    }

    fn sample_rate_for(&self, period: i32) -> f64 {
        if period > 0 {
            self.base_clock / period as f64
        } else {
            0.0
        }
    }

    fn rows_at(&self, position: usize) -> usize {
        self.track
            .pattern_at(position)
            .map_or(ROWS_PER_PATTERN as usize, |p| p.rows as usize)
    }

    /// Fxx: speed below 32, otherwise BPM. With the accurate timer a new
    /// BPM applies to the current tick; the CIA timer picks it up on the
    /// next one.
    fn set_speed(&mut self, value: u32) {
        if value < 32 {
            self.speed = value;
            return;
        }
        self.bpm = value;
        self.next_tick_rate = match self.tempo_timer {
            TempoTimer::Accurate => {
                let rate = (125.0 / value as f64) * 0.02;
                self.tick_rate = rate;
                rate
            }
            TempoTimer::Cia => {
                let constant = match self.region {
                    Region::Pal => CIA_PAL,
                    Region::Ntsc => CIA_NTSC,
                };
                let cia_period = libm::floor(constant / value as f64);
                (cia_period + 1.0) / (self.base_clock / 80.0)
            }
        };
    }

    fn next_row(&mut self) {
        self.row += 1;
        if self.row >= self.rows_at(self.position) {
            self.row = 0;
            self.position += 1;
            if self.position >= self.track.song_length() {
                self.position = 0;
            }
        }
    }

    /// Advance the row counter at the end of a row, resolving breaks and
    /// pattern delays.
    fn end_row(&mut self) {
        self.tick = 0;

        if self.pattern_delay > 0 {
            self.pattern_delay_count = self.pattern_delay + 1;
            self.pattern_delay = 0;
        }
        if self.pattern_delay_count > 0 {
            self.pattern_delay_count -= 1;
        }
        if self.pattern_delay_count > 0 {
            return;
        }

        if !self
            .sequence_flags
            .intersects(SequenceFlags::BREAK | SequenceFlags::SET_POSITION)
        {
            self.next_row();
            return;
        }

        let mut position = self.position + 1;
        if self.sequence_flags.contains(SequenceFlags::SET_POSITION) {
            position = self.break_position;
            self.break_position = 0;
        }
        if position >= self.track.song_length() {
            position = 0;
        }
        self.position = position;
        self.row = self.break_row;
        self.sequence_flags
            .remove(SequenceFlags::BREAK | SequenceFlags::SET_POSITION);

        if self.sequence_flags.contains(SequenceFlags::SKIP) {
            self.sequence_flags.remove(SequenceFlags::SKIP);
            self.next_row();
        }
    }

    /// Latch a new row's note into a channel.
    fn trigger_note(&mut self, channel: usize, note: Note) {
        let ch = &mut self.channels[channel];
        ch.note = note;

        let sample = note
            .sample
            .map(usize::from)
            .and_then(|index| Some((index, self.track.samples.get(index)?)));
        if let Some((index, sample)) = sample {
            let previous = ch.sample_index;
            ch.mixer_flags |= MixerFlags::SAMPLE_CHANGE | MixerFlags::VOLUME;
            ch.volume = (sample.volume as i32).min(64);
            ch.play_volume = ch.volume;
            ch.finetune = sample.finetune.clamp(-8, 7);
            ch.sample_index = Some(index);

            // A tone portamento keeps the playing sample
            if !(previous.is_some() && note.pitch.is_some() && note.fx == 0x03) {
                ch.instrument_sample = Some(index);
                if note.fx != 0x09 {
                    ch.sample_offset = 0;
                }
            }
        }

        if let Some(pitch) = note.pitch {
            if note.fx == 0x03 || note.fx == 0x05 {
                ch.set_porta_target(pitch);
            } else {
                ch.last_pitch = Some(pitch);
                if note.fx == 0x15 {
                    ch.set_finetune(note.param);
                }
                ch.period = note_period(pitch, ch.finetune);
                ch.play_period = ch.period;

                if note.fx != 0x1D {
                    if ch.wave_control & 0x04 == 0 {
                        ch.vibrato_position = 0;
                    }
                    if ch.wave_control & 0x40 == 0 {
                        ch.tremolo_position = 0;
                    }
                    ch.mixer_flags |= MixerFlags::SAMPLE_CHANGE
                        | MixerFlags::SAMPLE_POSITION
                        | MixerFlags::SPEED;
                    ch.sample_position = if note.sample.is_some() {
                        0
                    } else {
                        ch.sample_offset
                    };
                }
            }
        }

        // Undo last row's vibrato and tremolo
        if ch.volume != ch.play_volume {
            ch.play_volume = ch.volume;
            ch.mixer_flags |= MixerFlags::VOLUME;
        }
        if ch.period != ch.play_period {
            ch.play_period = ch.period;
            ch.mixer_flags |= MixerFlags::SPEED;
        }
    }

    fn process_fx(&mut self, phase: Phase, channel: usize, note: &Note) {
        use Phase::{FirstTick as First, Intra, PatternDelay};

        let tick = self.tick;
        let ch = &mut self.channels[channel];
        match (phase, note.effect()) {
            (_, Effect::None) => {}

            (Intra | PatternDelay, Effect::Arpeggio(p)) => ch.arpeggio(p, tick),
            (Intra | PatternDelay, Effect::PortaUp(p)) => ch.porta_up(p),
            (Intra | PatternDelay, Effect::PortaDown(p)) => ch.porta_down(p),
            (Intra | PatternDelay, Effect::TonePorta(p)) => ch.tone_porta(p),
            (Intra | PatternDelay, Effect::Vibrato(p)) => ch.vibrato(p),
            (Intra | PatternDelay, Effect::TonePortaVolSlide(p)) => {
                ch.tone_porta(0);
                ch.volume_slide(p);
            }
            (Intra | PatternDelay, Effect::VibratoVolSlide(p)) => {
                ch.vibrato(0);
                ch.volume_slide(p);
            }
            (Intra | PatternDelay, Effect::Tremolo(p)) => ch.tremolo(p),
            (Intra | PatternDelay, Effect::VolumeSlide(p)) => ch.volume_slide(p),

            (First, Effect::FinePan(p)) => ch.set_fine_pan(p),
            (First, Effect::SampleOffset(p)) => ch.sample_offset(p),
            (First, Effect::SetVolume(p)) => ch.set_volume(p),
            (First, Effect::SetSpeed(p)) => self.set_speed(p as u32),
            (First, Effect::Glissando(p)) => ch.glissando = p > 0,
            (First, Effect::VibratoWaveform(p)) => ch.set_vibrato_waveform(p),
            (First, Effect::SetFinetune(p)) => ch.set_finetune(p),
            (First, Effect::PatternLoop(p)) => self.pattern_loop(p),
            (First, Effect::TremoloWaveform(p)) => ch.set_tremolo_waveform(p),
            (First, Effect::Pan(p)) => ch.set_pan(p),
            (First, Effect::PatternDelay(p)) => self.pattern_delay = p as u32,

            (First | PatternDelay, Effect::PositionJump(p)) => self.position_jump(p),
            (First | PatternDelay, Effect::PatternBreak(p)) => self.pattern_break(p),
            (First | PatternDelay, Effect::FinePortaUp(p)) => ch.porta_up(p),
            (First | PatternDelay, Effect::FinePortaDown(p)) => ch.porta_down(p),
            (First | PatternDelay, Effect::FineVolumeUp(p)) => ch.fine_volume(p as i32),
            (First | PatternDelay, Effect::FineVolumeDown(p)) => ch.fine_volume(-(p as i32)),

            (First | Intra, Effect::Retrigger(p)) => ch.retrigger(p, tick),
            (First | Intra, Effect::NoteCut(p)) => ch.note_cut(p, tick),
            (First | Intra, Effect::NoteDelay(p)) => ch.note_delay(p, tick),

            _ => {}
        }
    }

    /// Bxx
    fn position_jump(&mut self, param: u8) {
        self.break_position = param as usize;
        self.break_row = 0;
        self.sequence_flags |= SequenceFlags::BREAK | SequenceFlags::SET_POSITION;
    }

    /// Dxy
    fn pattern_break(&mut self, param: u8) {
        let row = (param >> 4) as usize * 10 + (param & 0x0f) as usize;
        self.break_row = if row > 63 { 0 } else { row };
        self.sequence_flags |= SequenceFlags::BREAK;
        if self.pattern_delay_count > 0 {
            self.sequence_flags |= SequenceFlags::SKIP;
        }
    }

    /// E6x
    fn pattern_loop(&mut self, param: u8) {
        if param == 0 {
            self.loop_start_row = self.row;
            return;
        }
        if self.loop_count == 0 {
            self.loop_count = param;
        } else {
            self.loop_count -= 1;
            if self.loop_count == 0 {
                return;
            }
        }
        self.break_row = self.loop_start_row;
        self.break_position = self.position;
        self.sequence_flags |= SequenceFlags::BREAK | SequenceFlags::SET_POSITION;
    }

    fn run_tick(&mut self, mixer: &mut dyn Wavetable) {
        let track = Arc::clone(&self.track);
        let Some(pattern) = track.pattern_at(self.position) else {
            return;
        };
        if self.row >= pattern.rows as usize {
            self.row = 0;
        }
        let notes = pattern.row(self.row as u16);

        for channel in 0..self.channels.len() {
            let note = notes.get(channel).copied().unwrap_or_default();
            self.channels[channel].mixer_flags = MixerFlags::empty();

            if self.tick == 0 && self.pattern_delay_count == 0 {
                self.trigger_note(channel, note);
                self.process_fx(Phase::FirstTick, channel, &note);
            } else if self.tick == 0 {
                self.process_fx(Phase::PatternDelay, channel, &note);
            } else {
                self.process_fx(Phase::Intra, channel, &note);
            }

            self.program_mixer(channel, mixer);
        }

        self.tick += 1;
        if self.tick >= self.speed {
            self.end_row();
        }
    }

    fn program_mixer(&self, channel: usize, mixer: &mut dyn Wavetable) {
        let ch = &self.channels[channel];
        let params = MixerParams {
            volume: ch.play_volume as f32 / 64.0,
            pan: ch.pan,
            sample_rate: self.sample_rate_for(ch.play_period),
            sample: ch
                .instrument_sample
                .and_then(|index| self.sample_keys.get(index).copied().flatten()),
            sample_position: ch.sample_position as f64,
        };
        mixer.set_mixer(channel, ch.mixer_flags, &params);
    }
}

impl Playroutine for ProtrackerPlayroutine {
    fn reset(&mut self) {
        self.state = State::Initialized;
        self.default_pan_width = 0.0;
        self.region = Region::Pal;
        self.base_clock = region_clock(self.region) * 8.0;
        self.tempo_timer = TempoTimer::Cia;
        self.set_speed(DEFAULT_BPM);
        self.tick_rate = self.next_tick_rate;
        self.set_speed(DEFAULT_SPEED);

        self.position = 0;
        self.row = 0;
        self.tick = 0;
        self.break_row = 0;
        self.break_position = 0;
        self.pattern_delay = 0;
        self.pattern_delay_count = 0;
        self.loop_start_row = 0;
        self.loop_count = 0;
        self.sequence_flags = SequenceFlags::empty();

        self.channels = (0..self.track.num_channels)
            .map(|_| ChannelState::new(0.0))
            .collect();
    }

    fn parameters(&self) -> PlayroutineParameters {
        PlayroutineParameters {
            region: Some(self.region),
            default_pan_width: Some(self.default_pan_width),
            tempo_timer: Some(self.tempo_timer),
        }
    }

    fn set_parameters(&mut self, params: &PlayroutineParameters, mixer: &mut dyn Wavetable) {
        if let Some(region) = params.region {
            self.region = region;
            self.base_clock = region_clock(region) * 8.0;
            self.set_speed(self.bpm);
            self.tick_rate = self.next_tick_rate;

            if self.state == State::Running {
                for (i, ch) in self.channels.iter().enumerate() {
                    let params = MixerParams {
                        sample_rate: self.sample_rate_for(ch.play_period),
                        ..Default::default()
                    };
                    mixer.set_mixer(i, MixerFlags::SPEED, &params);
                }
            }
        }

        if let Some(width) = params.default_pan_width {
            self.default_pan_width = width.clamp(0.0, 1.0);
            if self.state == State::Initialized {
                for (i, ch) in self.channels.iter_mut().enumerate() {
                    ch.pan = amiga_channel_pan(i) * self.default_pan_width;
                    let params = MixerParams {
                        pan: ch.pan,
                        ..Default::default()
                    };
                    mixer.set_mixer(i, MixerFlags::PAN, &params);
                }
            }
        }

        if let Some(tempo_timer) = params.tempo_timer {
            self.tempo_timer = tempo_timer;
            self.set_speed(self.bpm);
            self.tick_rate = self.next_tick_rate;
        }
    }

    fn info(&self, mixer: &dyn Wavetable) -> PlayroutineInfo {
        let mixer_channels = mixer.mixer_info();
        PlayroutineInfo {
            bpm: self.bpm,
            speed: self.speed,
            position: self.position,
            row: self.row,
            tick: self.tick,
            channels: self
                .channels
                .iter()
                .enumerate()
                .map(|(i, ch)| {
                    let m = mixer_channels.get(i).copied().unwrap_or_default();
                    ChannelInfo {
                        volume: m.volume,
                        pan: m.pan,
                        sample_index: ch.sample_index,
                        sample_position: m.sample_position,
                        sample_rate: m.sample_rate,
                        speed: m.speed,
                    }
                })
                .collect(),
        }
    }

    fn set_position(
        &mut self,
        position: isize,
        row: isize,
        options: PositionOptions,
        mixer: &mut dyn Wavetable,
    ) {
        let length = self.track.song_length() as isize;
        let mut position = if options.relative_position {
            self.position as isize + position
        } else {
            position
        };
        if !(0..length).contains(&position) {
            return;
        }

        let mut row = if options.relative_row {
            self.row as isize + row
        } else {
            row
        }
        .max(0);
        if row >= self.rows_at(position as usize) as isize {
            row = 0;
            position += 1;
        }
        if position >= length {
            return;
        }

        if options.stop_samples {
            for (i, ch) in self.channels.iter_mut().enumerate() {
                ch.sample_index = None;
                ch.instrument_sample = None;
                mixer.set_mixer(i, MixerFlags::SAMPLE_CHANGE, &MixerParams::default());
            }
        }

        self.tick = 0;
        self.row = row as usize;
        self.position = position as usize;
    }

    fn process_tick(&mut self, mixer: &mut dyn Wavetable) -> f64 {
        self.state = State::Running;

        if self.speed > 0 {
            self.run_tick(mixer);
        }

        let tick_rate = self.tick_rate;
        self.tick_rate = self.next_tick_rate;
        tick_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use tm_ir::{InstrumentSample, Pattern, Pitch, SampleData, StereoBuffer};

    use crate::wavetable::{MixerChannelInfo, UnsupportedFormat, WavetableParameters};

    /// Records mixer commands instead of mixing.
    #[derive(Default)]
    struct RecordingMixer {
        calls: Vec<(usize, MixerFlags, MixerParams)>,
    }

    impl RecordingMixer {
        fn take(&mut self, channel: usize) -> Vec<(MixerFlags, MixerParams)> {
            let calls = core::mem::take(&mut self.calls);
            calls
                .into_iter()
                .filter(|(c, _, _)| *c == channel)
                .map(|(_, f, p)| (f, p))
                .collect()
        }
    }

    impl Wavetable for RecordingMixer {
        fn set_sample_rate(&mut self, _: f64) {}
        fn set_num_channels(&mut self, _: usize) {}
        fn reset_mixer(&mut self) {}
        fn upload_sample(
            &mut self,
            _: &InstrumentSample,
        ) -> Result<Option<SampleKey>, UnsupportedFormat> {
            Ok(None)
        }
        fn remove_sample(&mut self, _: SampleKey) {}
        fn parameters(&self) -> WavetableParameters {
            WavetableParameters::default()
        }
        fn set_parameters(&mut self, _: &WavetableParameters) {}
        fn set_mixer(&mut self, channel: usize, flags: MixerFlags, params: &MixerParams) {
            self.calls.push((channel, flags, *params));
        }
        fn render(&mut self, _: &mut StereoBuffer, _: usize, _: usize) {}
        fn mixer_info(&self) -> Vec<MixerChannelInfo> {
            Vec::new()
        }
    }

    fn note(pitch: Option<Pitch>, sample: Option<u8>, fx: u8, param: u8) -> Note {
        Note { pitch, sample, fx, param }
    }

    fn fx(fx: u8, param: u8) -> Note {
        note(None, None, fx, param)
    }

    const C2: Option<Pitch> = Some(Pitch::new(0, 0));
    const D2: Option<Pitch> = Some(Pitch::new(2, 0));

    /// Build a 4-channel track; cells are (pattern, row, channel, note).
    fn routine(
        sequence: &[u8],
        cells: &[(usize, u16, u8, Note)],
    ) -> (ProtrackerPlayroutine, Vec<Option<SampleKey>>) {
        let mut track = Track::new("test", 4);
        let num_patterns = sequence.iter().max().copied().unwrap_or(0) as usize + 1;
        track.patterns = vec![Pattern::new(ROWS_PER_PATTERN, 4); num_patterns];
        track.sequence = sequence.to_vec();
        for &(pattern, row, channel, cell) in cells {
            *track.patterns[pattern].cell_mut(row, channel) = cell;
        }
        for (i, volume) in [(0, 48), (1, 64)] {
            track.samples[i] = InstrumentSample {
                volume,
                data: Some(SampleData::Signed8(vec![0; 64])),
                ..InstrumentSample::default()
            };
        }

        let mut keys = SlotMap::<SampleKey, ()>::with_key();
        let sample_keys: Vec<_> = (0..2).map(|_| Some(keys.insert(()))).collect();
        (ProtrackerPlayroutine::new(Arc::new(track), sample_keys.clone()), sample_keys)
    }

    fn run_ticks(pr: &mut ProtrackerPlayroutine, mixer: &mut RecordingMixer, ticks: usize) -> f64 {
        (0..ticks).map(|_| pr.process_tick(mixer)).sum()
    }

    #[test]
    fn cia_tick_duration() {
        let (pr, _) = routine(&[0], &[]);
        assert!((pr.tick_rate - 14188.0 / 709_379.0).abs() < 1e-12);
        assert_eq!((pr.bpm, pr.speed), (125, 6));
    }

    #[test]
    fn accurate_tick_duration() {
        let (mut pr, _) = routine(&[0], &[]);
        let mut mixer = RecordingMixer::default();
        pr.set_parameters(
            &PlayroutineParameters {
                tempo_timer: Some(TempoTimer::Accurate),
                ..Default::default()
            },
            &mut mixer,
        );
        assert!((pr.process_tick(&mut mixer) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn accurate_bpm_change_applies_same_tick() {
        let (mut pr, _) = routine(&[0], &[(0, 0, 1, fx(0x0F, 100))]);
        let mut mixer = RecordingMixer::default();
        pr.set_parameters(
            &PlayroutineParameters {
                tempo_timer: Some(TempoTimer::Accurate),
                ..Default::default()
            },
            &mut mixer,
        );
        assert!((pr.process_tick(&mut mixer) - 0.025).abs() < 1e-12);
        assert!((pr.process_tick(&mut mixer) - 0.025).abs() < 1e-12);
        assert_eq!(pr.bpm, 100);
    }

    #[test]
    fn cia_bpm_change_applies_next_tick() {
        let (mut pr, _) = routine(&[0], &[(0, 0, 1, fx(0x0F, 100))]);
        let mut mixer = RecordingMixer::default();
        assert!((pr.process_tick(&mut mixer) - 14188.0 / 709_379.0).abs() < 1e-12);
        let cia_period = libm::floor(CIA_PAL / 100.0);
        let expected = (cia_period + 1.0) / (PAL_CLOCK * 8.0 / 80.0);
        assert!((pr.process_tick(&mut mixer) - expected).abs() < 1e-12);
    }

    #[test]
    fn rows_advance_every_speed_ticks() {
        let (mut pr, _) = routine(&[0, 0], &[]);
        let mut mixer = RecordingMixer::default();
        run_ticks(&mut pr, &mut mixer, 5);
        assert_eq!(pr.position(), (0, 0));
        pr.process_tick(&mut mixer);
        assert_eq!(pr.position(), (0, 1));
        run_ticks(&mut pr, &mut mixer, 6 * 63);
        assert_eq!(pr.position(), (1, 0));
    }

    #[test]
    fn song_wraps_to_restart() {
        let (mut pr, _) = routine(&[0], &[(0, 0, 0, fx(0x0F, 1))]);
        let mut mixer = RecordingMixer::default();
        run_ticks(&mut pr, &mut mixer, 64);
        assert_eq!(pr.position(), (0, 0));
    }

    #[test]
    fn song_end_ignores_track_restart_position() {
        let (pr, keys) = routine(&[0, 1], &[(0, 0, 0, fx(0x0F, 1))]);
        let mut track = (**pr.track()).clone();
        track.restart_position = 1;
        let mut pr = ProtrackerPlayroutine::new(Arc::new(track), keys);
        let mut mixer = RecordingMixer::default();
        run_ticks(&mut pr, &mut mixer, 127);
        assert_eq!(pr.position(), (1, 63));
        pr.process_tick(&mut mixer);
        assert_eq!(pr.position(), (0, 0));
    }

    #[test]
    fn note_programs_mixer() {
        let (mut pr, keys) = routine(&[0], &[(0, 0, 0, note(C2, Some(0), 0, 0))]);
        let mut mixer = RecordingMixer::default();
        pr.process_tick(&mut mixer);

        let calls = mixer.take(0);
        assert_eq!(calls.len(), 1);
        let (flags, params) = calls[0];
        assert_eq!(
            flags,
            MixerFlags::SAMPLE_CHANGE
                | MixerFlags::SAMPLE_POSITION
                | MixerFlags::SPEED
                | MixerFlags::VOLUME
        );
        assert_eq!(params.sample, keys[0]);
        assert_eq!(params.volume, 0.75);
        assert_eq!(params.sample_position, 0.0);
        assert!((params.sample_rate - PAL_CLOCK / 428.0 / 2.0).abs() < 1e-6);

        // Later ticks only refresh
        pr.process_tick(&mut mixer);
        assert_eq!(mixer.take(0)[0].0, MixerFlags::empty());
    }

    #[test]
    fn volume_slide_over_row() {
        let (mut pr, _) = routine(
            &[0],
            &[
                (0, 0, 0, note(C2, Some(0), 0x0A, 0x04)),
                (0, 1, 0, fx(0x0A, 0x0F)),
            ],
        );
        let mut mixer = RecordingMixer::default();
        run_ticks(&mut pr, &mut mixer, 6);
        // 5 intra ticks of -4 from 48
        assert_eq!(pr.channels[0].volume, 28);
        run_ticks(&mut pr, &mut mixer, 6);
        assert_eq!(pr.channels[0].volume, 0);
    }

    #[test]
    fn speed_zero_halts() {
        let (mut pr, _) = routine(&[0], &[(0, 0, 0, fx(0x0F, 0))]);
        let mut mixer = RecordingMixer::default();
        pr.process_tick(&mut mixer);
        assert!(pr.is_halted());
        assert_eq!(pr.position(), (0, 1));
        mixer.calls.clear();

        let duration = run_ticks(&mut pr, &mut mixer, 10);
        assert_eq!(pr.position(), (0, 1));
        assert!(mixer.calls.is_empty());
        assert!((duration - 10.0 * pr.tick_rate).abs() < 1e-9);
    }

    #[test]
    fn pattern_break_to_decimal_row() {
        let (mut pr, _) = routine(&[0, 0], &[(0, 0, 2, fx(0x0D, 0x12))]);
        let mut mixer = RecordingMixer::default();
        run_ticks(&mut pr, &mut mixer, 6);
        assert_eq!(pr.position(), (1, 12));
    }

    #[test]
    fn pattern_break_past_last_row_goes_to_zero() {
        let (mut pr, _) = routine(&[0, 0], &[(0, 0, 2, fx(0x0D, 0x99))]);
        let mut mixer = RecordingMixer::default();
        run_ticks(&mut pr, &mut mixer, 6);
        assert_eq!(pr.position(), (1, 0));
    }

    #[test]
    fn position_jump_past_end_restarts() {
        let (mut pr, _) = routine(&[0, 1], &[(1, 3, 0, fx(0x0B, 0x05))]);
        let mut mixer = RecordingMixer::default();
        pr.set_position(1, 3, PositionOptions::default(), &mut mixer);
        run_ticks(&mut pr, &mut mixer, 6);
        assert_eq!(pr.position(), (0, 0));

        let (mut pr, _) = routine(&[0, 1], &[(0, 0, 0, fx(0x0B, 0x01))]);
        run_ticks(&mut pr, &mut mixer, 6);
        assert_eq!(pr.position(), (1, 0));
    }

    #[test]
    fn pattern_loop_repeats() {
        let (mut pr, _) = routine(
            &[0],
            &[
                (0, 0, 0, fx(0x16, 0)),
                (0, 0, 1, fx(0x0F, 1)),
                (0, 1, 0, fx(0x16, 2)),
            ],
        );
        let mut mixer = RecordingMixer::default();
        let mut rows = Vec::new();
        for _ in 0..7 {
            rows.push(pr.row);
            pr.process_tick(&mut mixer);
        }
        assert_eq!(rows, vec![0, 1, 0, 1, 0, 1, 2]);
    }

    #[test]
    fn pattern_delay_repeats_row() {
        let (mut pr, _) = routine(
            &[0],
            &[(0, 0, 0, fx(0x1E, 1)), (0, 0, 1, fx(0x0F, 2))],
        );
        let mut mixer = RecordingMixer::default();
        run_ticks(&mut pr, &mut mixer, 3);
        assert_eq!(pr.position(), (0, 0));
        pr.process_tick(&mut mixer);
        assert_eq!(pr.position(), (0, 1));
    }

    #[test]
    fn break_during_pattern_delay_skips_a_row() {
        let (mut pr, _) = routine(
            &[0, 0],
            &[
                (0, 0, 0, fx(0x1E, 1)),
                (0, 0, 1, fx(0x0D, 0x05)),
                (0, 0, 2, fx(0x0F, 1)),
            ],
        );
        let mut mixer = RecordingMixer::default();
        pr.process_tick(&mut mixer);
        assert_eq!(pr.position(), (0, 0));
        pr.process_tick(&mut mixer);
        assert_eq!(pr.position(), (1, 6));
    }

    #[test]
    fn tone_porta_keeps_playing_sample() {
        let (mut pr, keys) = routine(
            &[0],
            &[
                (0, 0, 0, note(C2, Some(0), 0x0F, 1)),
                (0, 1, 0, note(D2, Some(1), 0x03, 0x08)),
            ],
        );
        let mut mixer = RecordingMixer::default();
        pr.process_tick(&mut mixer);
        mixer.calls.clear();
        pr.process_tick(&mut mixer);

        let ch = &pr.channels[0];
        assert_eq!(ch.sample_index, Some(1));
        assert_eq!(ch.instrument_sample, Some(0));
        assert_eq!(ch.volume, 64);
        assert_eq!(ch.porta_target, note_period(Pitch::new(2, 0), 0));
        let (flags, params) = mixer.take(0)[0];
        assert!(!flags.contains(MixerFlags::SAMPLE_POSITION));
        assert_eq!(params.sample, keys[0]);
    }

    #[test]
    fn note_without_sample_uses_stored_offset() {
        let (mut pr, _) = routine(
            &[0],
            &[
                (0, 0, 0, note(C2, Some(0), 0x09, 0x02)),
                (0, 0, 1, fx(0x0F, 1)),
                (0, 1, 0, note(C2, None, 0, 0)),
            ],
        );
        let mut mixer = RecordingMixer::default();
        pr.process_tick(&mut mixer);
        // Sample number present: offset from 9xx only
        assert_eq!(mixer.take(0)[0].1.sample_position, 512.0);
        pr.process_tick(&mut mixer);
        assert_eq!(mixer.take(0)[0].1.sample_position, 512.0);
    }

    #[test]
    fn region_change_resends_rates_while_running() {
        let (mut pr, _) = routine(&[0], &[(0, 0, 0, note(C2, Some(0), 0, 0))]);
        let mut mixer = RecordingMixer::default();
        pr.process_tick(&mut mixer);
        mixer.calls.clear();

        pr.set_parameters(
            &PlayroutineParameters {
                region: Some(Region::Ntsc),
                ..Default::default()
            },
            &mut mixer,
        );
        assert_eq!(mixer.calls.len(), 4);
        let (channel, flags, params) = mixer.calls[0];
        assert_eq!((channel, flags), (0, MixerFlags::SPEED));
        assert!((params.sample_rate - NTSC_CLOCK / 856.0).abs() < 1e-6);
        assert_eq!(mixer.calls[1].2.sample_rate, 0.0);
    }

    #[test]
    fn pan_width_only_before_playback() {
        let (mut pr, _) = routine(&[0], &[]);
        let mut mixer = RecordingMixer::default();
        let width = |w| PlayroutineParameters {
            default_pan_width: Some(w),
            ..Default::default()
        };

        pr.set_parameters(&width(2.0), &mut mixer);
        let pans: Vec<f32> = mixer.calls.iter().map(|c| c.2.pan).collect();
        assert_eq!(pans, vec![-1.0, 1.0, 1.0, -1.0]);

        pr.process_tick(&mut mixer);
        mixer.calls.clear();
        pr.set_parameters(&width(0.5), &mut mixer);
        assert!(mixer.calls.is_empty());
        assert_eq!(pr.parameters().default_pan_width, Some(0.5));
    }

    #[test]
    fn set_position_bounds() {
        let (mut pr, _) = routine(&[0, 0], &[]);
        let mut mixer = RecordingMixer::default();
        let opts = PositionOptions::default();

        pr.set_position(5, 0, opts, &mut mixer);
        assert_eq!(pr.position(), (0, 0));
        pr.set_position(1, 70, opts, &mut mixer);
        assert_eq!(pr.position(), (0, 0));
        pr.set_position(0, 64, opts, &mut mixer);
        assert_eq!(pr.position(), (1, 0));

        let relative = PositionOptions {
            relative_position: true,
            relative_row: true,
            ..opts
        };
        pr.set_position(-1, 3, relative, &mut mixer);
        assert_eq!(pr.position(), (0, 3));
        pr.set_position(-1, 0, relative, &mut mixer);
        assert_eq!(pr.position(), (0, 3));
        assert!(mixer.calls.is_empty());
    }

    #[test]
    fn set_position_stops_samples() {
        let (mut pr, _) = routine(&[0], &[(0, 0, 0, note(C2, Some(0), 0, 0))]);
        let mut mixer = RecordingMixer::default();
        pr.process_tick(&mut mixer);
        mixer.calls.clear();

        let opts = PositionOptions {
            stop_samples: true,
            ..Default::default()
        };
        pr.set_position(0, 10, opts, &mut mixer);
        assert_eq!(pr.tick, 0);
        assert_eq!(pr.channels[0].sample_index, None);
        assert_eq!(mixer.calls.len(), 4);
        assert!(mixer
            .calls
            .iter()
            .all(|(_, f, p)| *f == MixerFlags::SAMPLE_CHANGE && p.sample.is_none()));
    }

    #[test]
    fn reset_restores_defaults() {
        let (mut pr, _) = routine(&[0], &[(0, 0, 0, fx(0x0F, 0x40))]);
        let mut mixer = RecordingMixer::default();
        pr.set_parameters(
            &PlayroutineParameters {
                region: Some(Region::Ntsc),
                ..Default::default()
            },
            &mut mixer,
        );
        run_ticks(&mut pr, &mut mixer, 8);
        pr.reset();
        assert_eq!((pr.bpm, pr.speed, pr.position, pr.row, pr.tick), (125, 6, 0, 0, 0));
        assert_eq!(pr.parameters().region, Some(Region::Pal));
        assert_eq!(pr.num_channels(), 4);
    }

    #[test]
    fn empty_sequence_only_reports_time() {
        let (mut pr, _) = routine(&[], &[]);
        let mut mixer = RecordingMixer::default();
        assert!(pr.process_tick(&mut mixer) > 0.0);
        assert!(mixer.calls.is_empty());
    }
}

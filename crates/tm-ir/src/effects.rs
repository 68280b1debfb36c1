//! Protracker effect commands.

/// A decoded effect column command.
///
/// Extended `Exy` commands are remapped by the loader to ids `0x10 + x`
/// with parameter `y`, so every variant carries the raw parameter byte
/// exactly as the playroutine consumes it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Effect {
    /// Empty `000` command
    #[default]
    None,

    // === Pitch ===
    /// 0xy: cycle between note, note+x, note+y each tick
    Arpeggio(u8),
    /// 1xx
    PortaUp(u8),
    /// 2xx
    PortaDown(u8),
    /// 3xx: slide toward the target note
    TonePorta(u8),
    /// 4xy: speed x, depth y
    Vibrato(u8),
    /// 5xy: tone portamento + volume slide
    TonePortaVolSlide(u8),
    /// 6xy: vibrato + volume slide
    VibratoVolSlide(u8),

    // === Volume & sequencing ===
    /// 7xy: speed x, depth y
    Tremolo(u8),
    /// 8xx: 0 = hard left, 255 = hard right
    FinePan(u8),
    /// 9xx: start offset in 256-byte units
    SampleOffset(u8),
    /// Axy: up x or down y
    VolumeSlide(u8),
    /// Bxx
    PositionJump(u8),
    /// Cxx
    SetVolume(u8),
    /// Dxy: decimal row in the next pattern
    PatternBreak(u8),
    /// Fxx: speed below 32, BPM from 32
    SetSpeed(u8),

    // === Extended (Exy) ===
    /// E0x: Amiga LED filter, not emulated
    Filter(u8),
    FinePortaUp(u8),
    FinePortaDown(u8),
    Glissando(u8),
    VibratoWaveform(u8),
    SetFinetune(u8),
    PatternLoop(u8),
    TremoloWaveform(u8),
    /// E8x: coarse pan, 0 = left, 15 = right
    Pan(u8),
    Retrigger(u8),
    FineVolumeUp(u8),
    FineVolumeDown(u8),
    NoteCut(u8),
    NoteDelay(u8),
    PatternDelay(u8),
    /// EFx: invert loop, not emulated
    InvertLoop(u8),
}

impl Effect {
    /// Decode an effect id (0x00-0x1f after E-remapping) and its parameter.
    ///
    /// Unknown ids decode to [`Effect::None`].
    pub const fn from_raw(fx: u8, param: u8) -> Self {
        match fx {
            0x00 if param == 0 => Effect::None,
            0x00 => Effect::Arpeggio(param),
            0x01 => Effect::PortaUp(param),
            0x02 => Effect::PortaDown(param),
            0x03 => Effect::TonePorta(param),
            0x04 => Effect::Vibrato(param),
            0x05 => Effect::TonePortaVolSlide(param),
            0x06 => Effect::VibratoVolSlide(param),
            0x07 => Effect::Tremolo(param),
            0x08 => Effect::FinePan(param),
            0x09 => Effect::SampleOffset(param),
            0x0A => Effect::VolumeSlide(param),
            0x0B => Effect::PositionJump(param),
            0x0C => Effect::SetVolume(param),
            0x0D => Effect::PatternBreak(param),
            0x0F => Effect::SetSpeed(param),
            0x10 => Effect::Filter(param),
            0x11 => Effect::FinePortaUp(param),
            0x12 => Effect::FinePortaDown(param),
            0x13 => Effect::Glissando(param),
            0x14 => Effect::VibratoWaveform(param),
            0x15 => Effect::SetFinetune(param),
            0x16 => Effect::PatternLoop(param),
            0x17 => Effect::TremoloWaveform(param),
            0x18 => Effect::Pan(param),
            0x19 => Effect::Retrigger(param),
            0x1A => Effect::FineVolumeUp(param),
            0x1B => Effect::FineVolumeDown(param),
            0x1C => Effect::NoteCut(param),
            0x1D => Effect::NoteDelay(param),
            0x1E => Effect::PatternDelay(param),
            0x1F => Effect::InvertLoop(param),
            _ => Effect::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_none() {
        assert_eq!(Effect::from_raw(0, 0), Effect::None);
        assert_eq!(Effect::from_raw(0, 0x37), Effect::Arpeggio(0x37));
    }

    #[test]
    fn extended_ids_decode() {
        assert_eq!(Effect::from_raw(0x1D, 3), Effect::NoteDelay(3));
        assert_eq!(Effect::from_raw(0x16, 0), Effect::PatternLoop(0));
        assert_eq!(Effect::from_raw(0x0E, 0x12), Effect::None);
        assert_eq!(Effect::from_raw(0x20, 1), Effect::None);
    }
}

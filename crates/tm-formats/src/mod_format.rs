//! ProTracker MOD format parser.

use std::io::Cursor;

use binrw::{BinRead, BinReaderExt};
use tm_ir::{
    Features, IncompleteSample, InstrumentSample, Note, Pattern, Pitch, SampleData, Track,
    NUM_SAMPLES, ROWS_PER_PATTERN,
};

use crate::cp437::decode_cp437;
use crate::FormatError;

/// Size of the fixed header; pattern data starts here.
pub const HEADER_SIZE: usize = 1084;

/// Amiga periods for note/octave conversion, three octaves either side of
/// the Protracker range.
const NOTE_PERIODS: [u16; 84] = [
    3424, 3232, 3048, 2880, 2712, 2560, 2416, 2280, 2152, 2032, 1920, 1812,
    1712, 1616, 1524, 1440, 1356, 1280, 1208, 1140, 1076, 1016, 960, 906,
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453,
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, // Octave 0
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113,
    107, 101, 95, 90, 85, 80, 75, 71, 67, 63, 60, 56,
    53, 50, 47, 45, 42, 40, 37, 35, 33, 31, 30, 28,
];

/// Index of period 428 (C-2), which becomes octave 0 semitone 0.
const NOTE_BASE: usize = 36;

#[derive(BinRead, Debug)]
#[br(big)]
struct ModHeader {
    title: [u8; 20],
    samples: [SampleHeader; NUM_SAMPLES],
    song_length: u8,
    /// Byte 951 (the NoiseTracker restart position) is not used by Protracker
    #[br(pad_before = 1)]
    order: [u8; 128],
    tag: [u8; 4],
}

#[derive(BinRead, Debug, Clone, Copy)]
#[br(big)]
struct SampleHeader {
    name: [u8; 22],
    /// Length in words
    length: u16,
    finetune: u8,
    volume: u8,
    /// Loop start in words
    loop_start: u16,
    /// Loop length in words
    loop_length: u16,
}

/// Load a MOD file from bytes.
pub fn load_mod(data: &[u8]) -> Result<Track, FormatError> {
    if data.len() < HEADER_SIZE {
        return Err(FormatError::TooShort(data.len()));
    }

    let header: ModHeader = Cursor::new(data).read_be()?;
    let num_channels = channels_for_tag(&header.tag)?;

    let mut track = Track::new("", num_channels);
    track.title = decode_cp437(&header.title);

    let song_length = (header.song_length as usize).min(header.order.len());
    track.sequence = header.order[..song_length].to_vec();

    // Every order entry counts, including those past the song length
    let num_patterns = header.order.iter().max().copied().unwrap_or(0) as usize + 1;
    let pattern_size = ROWS_PER_PATTERN as usize * num_channels as usize * 4;
    let sample_start = HEADER_SIZE + num_patterns * pattern_size;
    if data.len() < sample_start {
        return Err(FormatError::IncompletePatternData {
            expected: sample_start,
            actual: data.len(),
        });
    }

    track.patterns = data[HEADER_SIZE..sample_start]
        .chunks_exact(pattern_size)
        .map(|chunk| parse_pattern(chunk, num_channels, &mut track.features))
        .collect();

    let mut offset = sample_start;
    for (i, sh) in header.samples.iter().enumerate() {
        let (sample, consumed) = parse_sample(sh, &data[offset..], i as u8, &mut track.features);
        track.samples[i] = sample;
        offset += consumed;
    }

    tracing::debug!(
        title = track.title.as_str(),
        channels = num_channels,
        patterns = num_patterns,
        positions = song_length,
        "loaded MOD"
    );

    Ok(track)
}

/// Map the signature at offset 1080 to a channel count.
fn channels_for_tag(tag: &[u8; 4]) -> Result<u8, FormatError> {
    let digit = |b: u8| b.is_ascii_digit().then(|| b - b'0');
    let channels = match tag {
        b"M.K." | b"M!K!" | b"FLT4" => Some(4),
        b"OCTA" | b"CD81" => Some(8),
        [n, b'C', b'H', b'N'] => digit(*n),
        [hi, lo, b'C', b'H'] => digit(*hi).zip(digit(*lo)).map(|(h, l)| h * 10 + l),
        [b'T', b'D', b'Z', n] => digit(*n),
        _ => None,
    };
    channels
        .filter(|&n| n > 0)
        .ok_or(FormatError::UnknownTag(*tag))
}

fn parse_sample(
    sh: &SampleHeader,
    remaining: &[u8],
    index: u8,
    features: &mut Features,
) -> (InstrumentSample, usize) {
    let mut sample = InstrumentSample {
        name: decode_cp437(&sh.name),
        finetune: sign_extend_nibble(sh.finetune),
        volume: sh.volume.min(64),
        ..InstrumentSample::default()
    };

    let mut length = sh.length as usize * 2;
    if length > remaining.len() {
        tracing::warn!(
            index,
            expected = length,
            actual = remaining.len(),
            "sample data truncated by end of file"
        );
        features.incomplete_samples.push(IncompleteSample {
            index,
            expected_length: length as u32,
            actual_length: remaining.len() as u32,
        });
        length = remaining.len();
    }

    let loop_start = sh.loop_start as usize * 2;
    let loop_length = sh.loop_length as usize * 2;
    if loop_start >= length || loop_length <= 2 {
        sample.loop_start = 0;
        sample.loop_length = 0;
    } else {
        sample.loop_start = loop_start as u32;
        sample.loop_length = loop_length.min(length - loop_start) as u32;
    }

    if length > 0 {
        let pcm = remaining[..length].iter().map(|&b| b as i8).collect();
        sample.data = Some(SampleData::Signed8(pcm));
    }

    (sample, length)
}

fn sign_extend_nibble(value: u8) -> i8 {
    let n = (value & 0x0F) as i8;
    if n >= 8 { n - 16 } else { n }
}

/// Parse one pattern's worth of cells.
fn parse_pattern(data: &[u8], num_channels: u8, features: &mut Features) -> Pattern {
    let mut pattern = Pattern::new(ROWS_PER_PATTERN, num_channels);
    for (note, cell) in pattern.data.iter_mut().zip(data.chunks_exact(4)) {
        *note = parse_cell(cell);
        if let Some(pitch) = note.pitch {
            if !(-1..=1).contains(&pitch.octave) {
                features.non_standard_notes = true;
            }
        }
        if note.fx == 0x08 || note.fx == 0x18 {
            features.pan_commands = true;
        }
    }
    pattern
}

/// Parse a single pattern cell (4 bytes).
fn parse_cell(data: &[u8]) -> Note {
    // Byte 0: upper 4 bits of sample number, upper 4 bits of period
    // Byte 1: lower 8 bits of period
    // Byte 2: lower 4 bits of sample number, effect command
    // Byte 3: effect parameter
    let sample_number = (data[0] & 0xF0) | (data[2] >> 4);
    let period = (((data[0] & 0x0F) as u16) << 8) | data[1] as u16;

    let (mut fx, mut param) = (data[2] & 0x0F, data[3]);
    if fx == 0x0E {
        fx = 0x10 + (param >> 4);
        param &= 0x0F;
    }

    Note {
        pitch: period_to_pitch(period),
        sample: (1..=NUM_SAMPLES as u8)
            .contains(&sample_number)
            .then(|| sample_number - 1),
        fx,
        param,
    }
}

/// Convert an Amiga period to a pitch: the first table entry not above it.
fn period_to_pitch(period: u16) -> Option<Pitch> {
    let index = NOTE_PERIODS.iter().position(|&p| p <= period)?;
    let octave = (index as i32 - NOTE_BASE as i32).div_euclid(12) as i8;
    Some(Pitch::new((index % 12) as u8, octave))
}

//! WAV encoding for 16-bit stereo PCM.

use std::io::Write;

use tm_engine::Frame;

const NUM_CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = NUM_CHANNELS * (BITS_PER_SAMPLE / 8);

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> std::io::Result<()> {
    let data_size = frames.len() as u32 * BLOCK_ALIGN as u32;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, sample_rate)?;
    write_data_chunk(w, frames, data_size)
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(44 + frames.len() * BLOCK_ALIGN as usize);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + frames.len() as u32 * BLOCK_ALIGN as u32).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(&fmt_chunk(sample_rate));
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&(frames.len() as u32 * BLOCK_ALIGN as u32).to_le_bytes());
    for frame in frames {
        buf.extend_from_slice(&frame.left.to_le_bytes());
        buf.extend_from_slice(&frame.right.to_le_bytes());
    }
    buf
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

/// `fmt ` chunk for integer PCM, including its 8-byte header.
fn fmt_chunk(sample_rate: u32) -> [u8; 24] {
    let mut chunk = [0u8; 24];
    chunk[0..4].copy_from_slice(b"fmt ");
    chunk[4..8].copy_from_slice(&16u32.to_le_bytes());
    chunk[8..10].copy_from_slice(&1u16.to_le_bytes());
    chunk[10..12].copy_from_slice(&NUM_CHANNELS.to_le_bytes());
    chunk[12..16].copy_from_slice(&sample_rate.to_le_bytes());
    chunk[16..20].copy_from_slice(&(sample_rate * BLOCK_ALIGN as u32).to_le_bytes());
    chunk[20..22].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
    chunk[22..24].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    chunk
}

fn write_fmt_chunk(w: &mut impl Write, sample_rate: u32) -> std::io::Result<()> {
    w.write_all(&fmt_chunk(sample_rate))
}

fn write_data_chunk(w: &mut impl Write, frames: &[Frame], data_size: u32) -> std::io::Result<()> {
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for frame in frames {
        w.write_all(&frame.left.to_le_bytes())?;
        w.write_all(&frame.right.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn header_layout() {
        let frames = [Frame { left: 1, right: -1 }; 3];
        let wav = frames_to_wav(&frames, 44_100);
        assert_eq!(wav.len(), 44 + 12);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 36 + 12);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(u32_at(&wav, 24), 44_100);
        assert_eq!(u32_at(&wav, 28), 44_100 * 4);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 12);
        assert_eq!(&wav[44..48], &[1, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn writer_matches_buffer() {
        let frames: Vec<Frame> = (0..10)
            .map(|i| Frame {
                left: i * 100,
                right: -i * 100,
            })
            .collect();
        let mut written = Vec::new();
        write_wav(&mut written, &frames, 22_050).unwrap();
        assert_eq!(written, frames_to_wav(&frames, 22_050));
    }
}

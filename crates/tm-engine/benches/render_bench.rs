//! Benchmarks for the render loop.
//!
//! Run with: cargo bench -p tm-engine

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tm_engine::{Interpolation, Parameters, Renderer, WavetableParameters};
use tm_ir::{InstrumentSample, Note, Pattern, Pitch, SampleData, StereoBuffer, Track, BLOCK_SIZE};

const SAMPLE_RATE: u32 = 44_100;
const CHANNELS: u8 = 8;

/// A busy 8-channel track: a note with vibrato on every channel every
/// fourth row, all playing a looped saw wave.
fn busy_track() -> Track {
    let mut track = Track::new("bench", CHANNELS);
    let mut pattern = Pattern::new(64, CHANNELS);
    for row in (0..64).step_by(4) {
        for channel in 0..CHANNELS {
            *pattern.cell_mut(row, channel) = Note {
                pitch: Some(Pitch::new(channel % 12, (row / 16) as i8 - 1)),
                sample: Some(0),
                fx: 0x04,
                param: 0x46,
            };
        }
    }
    track.patterns.push(pattern);
    track.sequence.push(0);
    track.samples[0] = InstrumentSample {
        volume: 48,
        loop_start: 0,
        loop_length: 256,
        data: Some(SampleData::Signed8((0..256).map(|i| (i as i32 - 128) as i8).collect())),
        ..InstrumentSample::default()
    };
    track
}

fn bench_interpolation(c: &mut Criterion, name: &str, interpolation: Interpolation) {
    let track = Arc::new(busy_track());
    let mut buffer = StereoBuffer::new(BLOCK_SIZE);

    c.bench_function(name, |b| {
        let mut renderer = Renderer::new(Arc::clone(&track), SAMPLE_RATE).unwrap();
        renderer.set_parameters(&Parameters {
            wavetable: WavetableParameters {
                interpolation: Some(interpolation),
                ..Default::default()
            },
            ..Default::default()
        });
        renderer.play();
        b.iter(|| {
            for _ in 0..(SAMPLE_RATE as usize / BLOCK_SIZE) {
                buffer.silence();
                renderer.render(&mut buffer, 0, BLOCK_SIZE);
            }
            black_box(buffer.peak());
        });
    });
}

fn bench_render(c: &mut Criterion) {
    bench_interpolation(c, "render_1sec_nearest", Interpolation::Nearest);
    bench_interpolation(c, "render_1sec_blep", Interpolation::Blep);
    bench_interpolation(c, "render_1sec_linear", Interpolation::Linear);
    bench_interpolation(c, "render_1sec_watte", Interpolation::Watte);
}

criterion_group!(benches, bench_render);
criterion_main!(benches);

//! tmodplay CLI: headless playback and WAV export.
//!
//! Usage:
//!   tm-cli path/to/file.mod
//!   tm-cli path/to/file.mod --wav output.wav --seconds 120

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tm_engine::{
    Interpolation, PlayroutineParameters, Region, StereoMode, TempoTimer, WavetableParameters,
};
use tm_master::{Controller, Parameters, Track};
use tracing_subscriber::EnvFilter;

const WAV_SAMPLE_RATE: u32 = 44_100;

/// Play a Protracker module or render it to a WAV file.
#[derive(Debug, Parser)]
#[command(name = "tm-cli", version)]
struct Args {
    /// Module file to load
    file: PathBuf,

    /// Render to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Maximum length of the WAV render
    #[arg(long, default_value_t = 300)]
    seconds: u32,

    /// nearest, blep, linear or watte
    #[arg(long)]
    interpolation: Option<Interpolation>,

    /// mono, amiga or stereo
    #[arg(long)]
    stereo_mode: Option<StereoMode>,

    /// pal or ntsc
    #[arg(long)]
    region: Option<Region>,

    /// cia or accurate
    #[arg(long)]
    tempo_timer: Option<TempoTimer>,

    /// Default channel pan width, 0.0 (mono) to 1.0
    #[arg(long)]
    pan_width: Option<f32>,

    /// Crossfeed for the amiga stereo mode, 0.0 to 1.0
    #[arg(long)]
    crossfeed: Option<f32>,

    /// Output gain, 0.0 to 4.0
    #[arg(long)]
    amplification: Option<f32>,
}

impl Args {
    fn parameters(&self) -> Parameters {
        Parameters {
            playroutine: PlayroutineParameters {
                region: self.region,
                default_pan_width: self.pan_width,
                tempo_timer: self.tempo_timer,
            },
            wavetable: WavetableParameters {
                amiga_crossfeed: self.crossfeed,
                amplification: self.amplification,
                interpolation: self.interpolation,
                stereo_mode: self.stereo_mode,
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let data = std::fs::read(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let mut ctrl = Controller::new();
    ctrl.load_mod(&data)
        .with_context(|| format!("failed to load {}", args.file.display()))?;
    ctrl.set_parameters(args.parameters());

    print_summary(ctrl.track());

    match &args.wav {
        Some(path) => render_to_wav(&ctrl, path, args.seconds),
        None => play_audio(&mut ctrl),
    }
}

fn print_summary(track: &Track) {
    println!("Title:    {}", track.title);
    println!("Channels: {}", track.num_channels);
    println!("Patterns: {}", track.patterns.len());
    let sequence: Vec<String> = track.sequence.iter().map(|p| format!("{p:02}")).collect();
    println!("Sequence: {}", sequence.join(" "));
    println!();

    for (i, sample) in track.samples.iter().enumerate() {
        if sample.name.is_empty() && sample.is_empty() {
            continue;
        }
        print!(
            "{:02} {:<22} len {:>6} vol {:>2} fine {:>2}",
            i + 1,
            sample.name,
            sample.len(),
            sample.volume,
            sample.finetune
        );
        if sample.has_loop() {
            print!(" loop {}+{}", sample.loop_start, sample.loop_length);
        }
        println!();
    }
    println!();

    let features = &track.features;
    if features.non_standard_notes {
        println!("Uses notes outside the Protracker range");
    }
    if features.pan_commands {
        println!("Uses panning commands");
    }
    for incomplete in &features.incomplete_samples {
        println!(
            "Sample {} truncated: {} of {} bytes",
            incomplete.index + 1,
            incomplete.actual_length,
            incomplete.expected_length
        );
    }
}

fn play_audio(ctrl: &mut Controller) -> anyhow::Result<()> {
    ctrl.play().context("failed to start playback")?;
    println!("Playing...");
    println!();

    while ctrl.is_playing() {
        if let Some(pos) = ctrl.position() {
            print!("\rPos: {:03} | Row: {:02}", pos.position, pos.row);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    println!("\rDone.               ");
    Ok(())
}

fn render_to_wav(ctrl: &Controller, path: &Path, seconds: u32) -> anyhow::Result<()> {
    println!("Rendering to {} at {} Hz...", path.display(), WAV_SAMPLE_RATE);

    let wav = ctrl.render_to_wav(WAV_SAMPLE_RATE, seconds)?;
    std::fs::write(path, &wav).with_context(|| format!("failed to write {}", path.display()))?;

    let frames = (wav.len() - 44) / 4;
    let duration = frames as f64 / WAV_SAMPLE_RATE as f64;
    println!("Wrote {} frames ({:.1}s) to {}", frames, duration, path.display());
    Ok(())
}

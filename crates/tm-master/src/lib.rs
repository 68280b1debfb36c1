//! Headless controller for tmodplay.
//!
//! Provides a unified API for loading modules, real-time playback and
//! offline rendering that the CLI and other hosts can share.

mod wav;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tm_audio::{AudioError, AudioOutput, CpalOutput};
use tm_engine::{RenderError, Renderer};
use tm_ir::{StereoBuffer, BLOCK_SIZE};

// Re-export common types so callers don't need tm-ir/tm-engine directly.
pub use tm_engine::{Frame, Parameters};
pub use tm_formats::FormatError;
pub use tm_ir::Track;

pub use wav::{frames_to_wav, write_wav};

/// Error type for controller operations.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("audio thread exited during startup")]
    AudioThread,
}

/// Sequence position and row of the playing song.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackPosition {
    pub position: usize,
    pub row: usize,
}

impl PlaybackPosition {
    fn pack(self) -> u64 {
        ((self.position as u64) << 32) | self.row as u64
    }

    fn unpack(packed: u64) -> Self {
        Self {
            position: (packed >> 32) as usize,
            row: (packed & 0xFFFF_FFFF) as usize,
        }
    }
}

/// Headless player: owns a track and manages playback.
pub struct Controller {
    track: Arc<Track>,
    parameters: Parameters,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    position: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new() -> Self {
        Self {
            track: Arc::new(Track::new("", 4)),
            parameters: Parameters::default(),
            playback: None,
        }
    }

    // --- Track management ---

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn load_mod(&mut self, data: &[u8]) -> Result<(), ControllerError> {
        self.stop();
        let track = tm_formats::load_mod(data)?;
        tracing::info!(
            title = %track.title,
            channels = track.num_channels,
            patterns = track.patterns.len(),
            "loaded module"
        );
        self.track = Arc::new(track);
        Ok(())
    }

    pub fn parameters(&self) -> Parameters {
        self.parameters
    }

    /// Settings used by the next [`play`](Self::play) or offline render.
    pub fn set_parameters(&mut self, parameters: Parameters) {
        self.parameters = parameters;
    }

    // --- Real-time playback ---

    /// Start playing from the beginning on the default output device.
    pub fn play(&mut self) -> Result<(), ControllerError> {
        self.stop();

        let track = Arc::clone(&self.track);
        let parameters = self.parameters;
        let stop_signal = Arc::new(AtomicBool::new(false));
        let position = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let stop = stop_signal.clone();
        let pos = position.clone();
        let done = finished.clone();

        let thread = std::thread::spawn(move || {
            audio_thread(track, parameters, stop, pos, done, ready_tx);
        });

        let started = ready_rx.recv().unwrap_or(Err(ControllerError::AudioThread));
        if let Err(err) = started {
            let _ = thread.join();
            return Err(err);
        }

        tracing::debug!("playback started");
        self.playback = Some(PlaybackHandle {
            stop_signal,
            position,
            finished,
            thread: Some(thread),
        });
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                let _ = handle.join();
            }
            tracing::debug!("playback stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    pub fn position(&self) -> Option<PlaybackPosition> {
        let pb = self.playback.as_ref()?;
        if pb.finished.load(Ordering::Relaxed) {
            return None;
        }
        Some(PlaybackPosition::unpack(pb.position.load(Ordering::Relaxed)))
    }

    // --- Offline rendering ---

    /// Render up to `max_frames`, stopping early if the song halts.
    pub fn render_frames(
        &self,
        sample_rate: u32,
        max_frames: usize,
    ) -> Result<Vec<Frame>, ControllerError> {
        let mut renderer = Renderer::new(Arc::clone(&self.track), sample_rate)?;
        renderer.set_parameters(&self.parameters);
        renderer.play();

        let mut buffer = StereoBuffer::new(BLOCK_SIZE);
        let mut frames = Vec::with_capacity(max_frames);
        while !renderer.is_halted() && frames.len() < max_frames {
            let count = (max_frames - frames.len()).min(BLOCK_SIZE);
            renderer.render_frames(&mut buffer, &mut frames, count);
        }
        Ok(frames)
    }

    pub fn render_to_wav(
        &self,
        sample_rate: u32,
        max_seconds: u32,
    ) -> Result<Vec<u8>, ControllerError> {
        let max_frames = sample_rate as usize * max_seconds as usize;
        let frames = self.render_frames(sample_rate, max_frames)?;
        Ok(wav::frames_to_wav(&frames, sample_rate))
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_output(
    track: Arc<Track>,
    parameters: &Parameters,
) -> Result<(CpalOutput, Renderer), ControllerError> {
    let (mut output, consumer) = CpalOutput::new()?;
    let mut renderer = Renderer::new(track, output.sample_rate())?;
    renderer.set_parameters(parameters);
    renderer.play();

    output.build_stream(consumer)?;
    output.start()?;
    Ok((output, renderer))
}

#[cfg(feature = "alloc_check")]
fn render_block(renderer: &mut Renderer, buffer: &mut StereoBuffer, frames: &mut Vec<Frame>) {
    assert_no_alloc::assert_no_alloc(|| renderer.render_frames(buffer, frames, BLOCK_SIZE));
}

#[cfg(not(feature = "alloc_check"))]
fn render_block(renderer: &mut Renderer, buffer: &mut StereoBuffer, frames: &mut Vec<Frame>) {
    renderer.render_frames(buffer, frames, BLOCK_SIZE);
}

fn audio_thread(
    track: Arc<Track>,
    parameters: Parameters,
    stop_signal: Arc<AtomicBool>,
    position: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    ready: SyncSender<Result<(), ControllerError>>,
) {
    let (mut output, mut renderer) = match open_output(track, &parameters) {
        Ok(opened) => {
            let _ = ready.send(Ok(()));
            opened
        }
        Err(err) => {
            tracing::error!(%err, "failed to start playback");
            finished.store(true, Ordering::Relaxed);
            let _ = ready.send(Err(err));
            return;
        }
    };

    let mut buffer = StereoBuffer::new(BLOCK_SIZE);
    let mut frames = Vec::with_capacity(BLOCK_SIZE);

    while !renderer.is_halted() && !stop_signal.load(Ordering::Relaxed) {
        frames.clear();
        render_block(&mut renderer, &mut buffer, &mut frames);

        let (pos, row) = renderer.position();
        position.store(
            PlaybackPosition { position: pos, row }.pack(),
            Ordering::Relaxed,
        );

        if !output.write_spin(&frames, &stop_signal) {
            break;
        }
    }

    // Let the queued tail play out
    while output.buffered() > 0 && !stop_signal.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(5));
    }
    if let Err(err) = output.stop() {
        tracing::warn!(%err, "failed to pause audio stream");
    }

    tracing::debug!("audio thread finished");
    finished.store(true, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_ir::{InstrumentSample, Note, Pattern, Pitch, SampleData, ROWS_PER_PATTERN};

    fn controller_with_note(halt_row: Option<usize>) -> Controller {
        let mut track = Track::new("test", 4);
        let mut pattern = Pattern::new(ROWS_PER_PATTERN, 4);
        *pattern.cell_mut(0, 0) = Note {
            pitch: Some(Pitch::new(0, 1)),
            sample: Some(0),
            fx: 0,
            param: 0,
        };
        if let Some(row) = halt_row {
            *pattern.cell_mut(row as u16, 1) = Note {
                fx: 0x0F,
                param: 0,
                ..Note::default()
            };
        }
        track.patterns.push(pattern);
        track.sequence.push(0);
        track.samples[0] = InstrumentSample {
            volume: 64,
            loop_start: 0,
            loop_length: 16,
            data: Some(SampleData::Signed8(
                (0..16).map(|i| if i < 8 { 90 } else { -90 }).collect(),
            )),
            ..InstrumentSample::default()
        };
        let mut controller = Controller::new();
        controller.track = Arc::new(track);
        controller
    }

    #[test]
    fn position_packs_losslessly() {
        let pos = PlaybackPosition {
            position: 127,
            row: 63,
        };
        assert_eq!(PlaybackPosition::unpack(pos.pack()), pos);
    }

    #[test]
    fn render_frames_respects_limit() {
        let controller = controller_with_note(None);
        let frames = controller.render_frames(22_050, 5000).unwrap();
        assert_eq!(frames.len(), 5000);
        assert!(frames.iter().any(|f| f.left != 0));
    }

    #[test]
    fn render_frames_stops_when_halted() {
        let controller = controller_with_note(Some(2));
        let frames = controller.render_frames(22_050, 22_050 * 10).unwrap();
        assert!(!frames.is_empty());
        assert!(frames.len() < 22_050);
    }

    #[test]
    fn render_to_wav_has_header() {
        let controller = controller_with_note(None);
        let wav = controller.render_to_wav(8000, 1).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(wav.len(), 44 + 8000 * 4);
    }

    #[test]
    fn load_mod_rejects_garbage() {
        let mut controller = Controller::new();
        let err = controller.load_mod(&[0; 16]).unwrap_err();
        assert!(matches!(err, ControllerError::Format(FormatError::TooShort(16))));
        assert_eq!(controller.track().num_channels, 4);
    }

    #[test]
    fn idle_controller_reports_nothing() {
        let controller = Controller::new();
        assert!(!controller.is_playing());
        assert!(!controller.is_finished());
        assert_eq!(controller.position(), None);
    }
}

//! Audio output trait and error types.

use tm_engine::Frame;

/// Error type for audio operations.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("failed to query output configuration: {0}")]
    DeviceInit(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to create audio stream: {0}")]
    StreamCreate(#[from] cpal::BuildStreamError),
    #[error("failed to start playback: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("failed to pause playback: {0}")]
    Pause(#[from] cpal::PauseStreamError),
}

/// Trait for audio output backends.
pub trait AudioOutput {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Queue frames without blocking. Returns how many were accepted.
    fn write(&mut self, frames: &[Frame]) -> usize;

    /// Frames queued but not yet played.
    fn buffered(&self) -> usize;

    fn start(&mut self) -> Result<(), AudioError>;

    fn stop(&mut self) -> Result<(), AudioError>;
}

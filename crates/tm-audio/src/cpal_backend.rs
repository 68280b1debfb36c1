//! CPAL-based audio output backend.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tm_engine::Frame;

use crate::traits::{AudioError, AudioOutput};

/// Ring buffer length in seconds.
const BUFFER_SECONDS: f32 = 0.1;

/// CPAL-based audio output.
///
/// Frames are handed to the device callback through a lock-free ring
/// buffer; the callback plays silence whenever the buffer runs dry.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
    producer: HeapProd<Frame>,
    running: Arc<AtomicBool>,
}

impl CpalOutput {
    /// Open the default output device. The returned consumer must be
    /// passed to [`build_stream`](Self::build_stream).
    pub fn new() -> Result<(Self, HeapCons<Frame>), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let mut config: StreamConfig = device.default_output_config()?.into();
        // The callback writes interleaved stereo pairs
        config.channels = 2;

        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            "opened audio output"
        );

        let capacity = (config.sample_rate.0 as f32 * BUFFER_SECONDS) as usize;
        let (producer, consumer) = HeapRb::<Frame>::new(capacity.max(1)).split();

        let output = Self {
            device,
            config,
            stream: None,
            producer,
            running: Arc::new(AtomicBool::new(false)),
        };
        Ok((output, consumer))
    }

    /// Build and start the audio stream.
    pub fn build_stream(&mut self, mut consumer: HeapCons<Frame>) -> Result<(), AudioError> {
        let running = Arc::clone(&self.running);
        let channels = self.config.channels as usize;

        let stream = self.device.build_output_stream(
            &self.config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    data.fill(0.0);
                    return;
                }
                for chunk in data.chunks_mut(channels) {
                    let frame = consumer.try_pop().unwrap_or_default();
                    for (i, sample) in chunk.iter_mut().enumerate() {
                        *sample = match i {
                            0 => frame.left as f32 / 32768.0,
                            1 => frame.right as f32 / 32768.0,
                            _ => 0.0,
                        };
                    }
                }
            },
            |err| tracing::error!(%err, "audio stream error"),
            None,
        )?;

        stream.play()?;
        self.stream = Some(stream);
        Ok(())
    }

    /// Queue all of `frames`, spinning while the ring buffer is full.
    ///
    /// Returns `false` if `cancel` was raised before everything was queued.
    pub fn write_spin(&mut self, frames: &[Frame], cancel: &AtomicBool) -> bool {
        let mut written = 0;
        while written < frames.len() {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            let n = self.producer.push_slice(&frames[written..]);
            if n == 0 {
                std::hint::spin_loop();
            }
            written += n;
        }
        true
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn write(&mut self, frames: &[Frame]) -> usize {
        self.producer.push_slice(frames)
    }

    fn buffered(&self) -> usize {
        self.producer.occupied_len()
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.play()?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running.store(false, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            stream.pause()?;
        }
        Ok(())
    }
}

//! # Audio Capture Module
//!
//! Frame sources feed the tuner fixed-size blocks of signed 16-bit mono
//! samples. Two are provided: a CPAL (Cross-Platform Audio Library) source
//! for live input and a synthetic sine source for simulation and tests.
//!
//! ## Features
//! - Automatic input device and stream configuration selection
//! - `i16` streams used directly, `f32` streams converted to `i16`
//! - Multi-channel input reduced to its first channel
//! - Overflow detection when the consumer falls behind
//! - Bounded blocking reads (at most one frame duration)

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::FrameError;

/// Number of captured frames that may queue up before new ones are dropped.
const FRAME_QUEUE_DEPTH: usize = 4;

/// Anything that can hand the tuner one frame per cycle.
pub trait FrameSource {
    /// Samples per frame this source produces.
    fn frame_size(&self) -> usize;

    /// Returns the next frame. May block briefly while hardware buffers fill.
    fn read(&mut self) -> Result<Vec<i16>, FrameError>;
}

/// Live input from the default audio device.
pub struct CpalFrameSource {
    stream: cpal::Stream,
    receiver: Receiver<Vec<i16>>,
    overflowed: Arc<AtomicBool>,
    frame_size: usize,
    read_timeout: Duration,
}

impl CpalFrameSource {
    /// Opens the default input device at `sample_rate` and starts capturing.
    ///
    /// This function:
    /// 1. Selects the default audio input device
    /// 2. Picks a configuration whose rate range contains `sample_rate`
    /// 3. Starts a stream whose callback slices the input into frames
    ///
    /// # Returns
    /// * `Ok(source)` - Capturing source
    /// * `Err(e)` - No device, no usable configuration, or stream failure
    pub fn open(sample_rate: u32, frame_size: usize) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        log::info!("Using audio input device: {}", device.name()?);

        let configs = device
            .supported_input_configs()
            .context("querying input configurations")?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, sample_rate).ok_or_else(|| {
            anyhow!("No i16 or f32 input format supports {sample_rate} Hz")
        })?;

        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(sample_rate))
            .into();

        log::info!(
            "Selected {sample_format:?} input, {} channel(s) at {} Hz",
            config.channels,
            config.sample_rate.0
        );

        let (sender, receiver) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
        let overflowed = Arc::new(AtomicBool::new(false));

        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_stream::<i16>(
                &device,
                &config,
                frame_size,
                sender,
                overflowed.clone(),
                |s| s,
            )?,
            cpal::SampleFormat::F32 => build_stream::<f32>(
                &device,
                &config,
                frame_size,
                sender,
                overflowed.clone(),
                f32_to_i16,
            )?,
            other => return Err(anyhow!("Unsupported sample format {other:?}")),
        };

        stream.play().context("starting input stream")?;

        Ok(Self {
            stream,
            receiver,
            overflowed,
            frame_size,
            read_timeout: read_timeout(sample_rate, frame_size),
        })
    }

    /// Stops capturing and releases the device.
    pub fn close(self) -> Result<()> {
        self.stream.pause().context("pausing input stream")?;
        log::debug!("Input stream closed");
        Ok(())
    }
}

impl FrameSource for CpalFrameSource {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn read(&mut self) -> Result<Vec<i16>, FrameError> {
        if self.overflowed.swap(false, Ordering::Relaxed) {
            return Err(FrameError::Overflow);
        }
        match self.receiver.recv_timeout(self.read_timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(FrameError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(FrameError::Closed),
        }
    }
}

/// Longest a `read` waits: the time one frame takes to capture.
fn read_timeout(sample_rate: u32, frame_size: usize) -> Duration {
    Duration::from_secs_f64(frame_size as f64 / sample_rate as f64)
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Builds an input stream that accumulates callback data into frames.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    frame_size: usize,
    sender: Sender<Vec<i16>>,
    overflowed: Arc<AtomicBool>,
    to_i16: fn(T) -> i16,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + Send + 'static,
{
    let channels = config.channels.max(1) as usize;
    // This buffer will accumulate audio data from the callback.
    let mut pending: Vec<i16> = Vec::with_capacity(frame_size * 2);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            pending.extend(data.chunks(channels).map(|frame| to_i16(frame[0])));

            // While we have enough data for a full frame, hand it over.
            while pending.len() >= frame_size {
                let frame: Vec<i16> = pending.drain(..frame_size).collect();
                if let Err(TrySendError::Full(_)) = sender.try_send(frame) {
                    overflowed.store(true, Ordering::Relaxed);
                }
            }
        },
        |err| log::error!("An error occurred on the audio stream: {err}"),
        None,
    )?;
    Ok(stream)
}

/// Finds a supported configuration for the target sample rate.
///
/// Only `i16` and `f32` formats whose rate range contains `target_rate` are
/// considered. Mono beats multi-channel, and `i16` beats `f32`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| {
            matches!(
                c.sample_format(),
                cpal::SampleFormat::I16 | cpal::SampleFormat::F32
            )
        })
        .filter(|c| c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0)
        .min_by_key(|c| {
            let not_mono = c.channels() != 1;
            let not_i16 = c.sample_format() != cpal::SampleFormat::I16;
            (not_mono, not_i16, c.channels())
        })
}

/// Generates one frame of a sine wave starting at sample index `offset`.
pub fn sine_frame(
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    frame_size: usize,
    offset: u64,
) -> Vec<i16> {
    let step = 2.0 * std::f64::consts::PI * frequency as f64 / sample_rate as f64;
    (0..frame_size as u64)
        .map(|i| {
            let value = amplitude as f64 * (step * (offset + i) as f64).sin();
            value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
        })
        .collect()
}

/// Synthetic, phase-continuous sine input.
#[derive(Debug, Clone)]
pub struct SineFrameSource {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    frame_size: usize,
    position: u64,
    frames_left: Option<u64>,
}

impl SineFrameSource {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: u32, frame_size: usize) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate,
            frame_size,
            position: 0,
            frames_left: None,
        }
    }

    /// Closes the source after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frames_left = Some(frames);
        self
    }
}

impl FrameSource for SineFrameSource {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn read(&mut self) -> Result<Vec<i16>, FrameError> {
        if let Some(left) = self.frames_left.as_mut() {
            if *left == 0 {
                return Err(FrameError::Closed);
            }
            *left -= 1;
        }
        let frame = sine_frame(
            self.frequency,
            self.amplitude,
            self.sample_rate,
            self.frame_size,
            self.position,
        );
        self.position += self.frame_size as u64;
        Ok(frame)
    }
}

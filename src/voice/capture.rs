//! Fixed-length audio capture from the microphone
//!
//! Each capture opens the input device, records for the requested duration,
//! down-mixes to mono, resamples to the target rate and peak-normalizes.
//! Failures never propagate: the caller gets a silent frame of the expected
//! length tagged as degraded, so the listen loop keeps its cadence.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Sample, SampleFormat};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::Outcome;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Peak amplitude a frame is scaled towards
pub const TARGET_PEAK: f32 = 0.8;

/// Upper bound on the normalization gain
pub const MAX_GAIN: f32 = 4.0;

const RESAMPLE_CHUNK: usize = 1024;

/// One fixed-length mono recording
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Mono samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Samples per second
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Wrap mono samples
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Zero-filled frame of the given length
    #[must_use]
    pub fn silent(duration: Duration, sample_rate: u32) -> Self {
        Self::new(vec![0.0; frame_len(duration, sample_rate)], sample_rate)
    }

    /// Largest absolute amplitude
    #[must_use]
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()))
    }

    /// Root mean square energy
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let sum_squares: f32 = self.samples.iter().map(|s| s * s).sum();
        (sum_squares / self.samples.len() as f32).sqrt()
    }

    /// Whether the frame holds only zeros
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|s| *s == 0.0)
    }

    /// Gain that [`Self::normalize`] would apply
    #[must_use]
    pub fn normalization_gain(&self) -> f32 {
        let peak = self.peak();
        if peak > 0.0 {
            (TARGET_PEAK / peak).min(MAX_GAIN)
        } else {
            1.0
        }
    }

    /// Scale towards [`TARGET_PEAK`], capped at [`MAX_GAIN`]; returns the gain
    pub fn normalize(&mut self) -> f32 {
        let gain = self.normalization_gain();
        if self.peak() > 0.0 {
            for sample in &mut self.samples {
                *sample *= gain;
            }
        }
        gain
    }

    /// Encode as 16-bit mono WAV for transcription APIs
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        samples_to_wav(&self.samples, self.sample_rate)
    }

    /// Frame length in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Something that can record one audio frame
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Record `duration` of audio at `sample_rate`
    ///
    /// Never fails: a broken device yields a degraded silent frame.
    async fn capture_frame(&self, duration: Duration, sample_rate: u32) -> Outcome<AudioFrame>;
}

/// The local input device, opened fresh for every frame
#[derive(Debug, Clone, Copy, Default)]
pub struct Microphone {
    fallback_index: usize,
}

impl Microphone {
    /// Create a microphone source
    ///
    /// `fallback_index` picks a device from the full device list when no input
    /// device is found by enumeration or as the host default.
    #[must_use]
    pub const fn new(fallback_index: usize) -> Self {
        Self { fallback_index }
    }

    /// Record one frame on the current thread
    ///
    /// # Errors
    ///
    /// Returns error if no device can be opened or the stream fails
    pub fn record_blocking(&self, duration: Duration, sample_rate: u32) -> Result<AudioFrame> {
        let device = select_device(self.fallback_index)?;
        let supported = device
            .default_input_config()
            .map_err(|e| Error::Audio(e.to_string()))?;

        let sample_format = supported.sample_format();
        let config = supported.config();
        let channels = usize::from(config.channels);
        let device_rate = config.sample_rate.0;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            device_rate,
            channels,
            format = ?sample_format,
            "recording frame"
        );

        let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
        let on_error = |err: cpal::StreamError| tracing::error!(error = %err, "audio capture error");

        let stream = match sample_format {
            SampleFormat::F32 => {
                let buffer = Arc::clone(&buffer);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend_from_slice(data);
                        }
                    },
                    on_error,
                    None,
                )
            }
            SampleFormat::I16 => {
                let buffer = Arc::clone(&buffer);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend(data.iter().map(|&s| s.to_sample::<f32>()));
                        }
                    },
                    on_error,
                    None,
                )
            }
            SampleFormat::U16 => {
                let buffer = Arc::clone(&buffer);
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        if let Ok(mut buf) = buffer.lock() {
                            buf.extend(data.iter().map(|&s| s.to_sample::<f32>()));
                        }
                    },
                    on_error,
                    None,
                )
            }
            other => {
                return Err(Error::Audio(format!("unsupported sample format {other:?}")));
            }
        }
        .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        std::thread::sleep(duration);
        drop(stream);

        let interleaved = buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .map_err(|_| Error::Audio("capture buffer poisoned".to_string()))?;

        let mono = downmix(&interleaved, channels);
        let resampled = resample(&mono, device_rate, sample_rate)?;

        let samples = fit_length(resampled, frame_len(duration, sample_rate));
        let mut frame = AudioFrame::new(samples, sample_rate);
        let gain = frame.normalize();

        tracing::debug!(peak = frame.peak(), gain, "frame captured");
        Ok(frame)
    }
}

#[async_trait]
impl FrameSource for Microphone {
    async fn capture_frame(&self, duration: Duration, sample_rate: u32) -> Outcome<AudioFrame> {
        let microphone = *self;
        let recorded =
            tokio::task::spawn_blocking(move || microphone.record_blocking(duration, sample_rate))
                .await;

        match recorded {
            Ok(Ok(frame)) => Outcome::Ok(frame),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "capture failed, substituting silence");
                Outcome::degraded(AudioFrame::silent(duration, sample_rate), e.to_string())
            }
            Err(e) => {
                tracing::warn!(error = %e, "capture task aborted, substituting silence");
                Outcome::degraded(AudioFrame::silent(duration, sample_rate), e.to_string())
            }
        }
    }
}

/// Pick the input device
///
/// First enumerated device with input channels, then the host default,
/// then the device at `fallback_index` of the full list.
fn select_device(fallback_index: usize) -> Result<Device> {
    let host = cpal::default_host();

    if let Ok(devices) = host.input_devices() {
        for device in devices {
            let has_channels = device
                .default_input_config()
                .is_ok_and(|c| c.channels() > 0);
            if has_channels {
                return Ok(device);
            }
        }
    }

    if let Some(device) = host.default_input_device() {
        return Ok(device);
    }

    tracing::warn!(fallback_index, "no input device found, using fallback index");

    host.devices()
        .map_err(|e| Error::Audio(e.to_string()))?
        .nth(fallback_index)
        .ok_or_else(|| Error::Audio("no input device available".to_string()))
}

/// Expected sample count for a duration
#[must_use]
pub fn frame_len(duration: Duration, sample_rate: u32) -> usize {
    let samples = duration.as_millis() * u128::from(sample_rate) / 1000;
    usize::try_from(samples).unwrap_or(usize::MAX)
}

/// Average interleaved channels into one
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks(channels)
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}

/// Resample mono audio with a sinc resampler
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
pub fn resample(mono: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || mono.is_empty() {
        return Ok(mono.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        f64::from(to_rate) / f64::from(from_rate),
        2.0,
        params,
        RESAMPLE_CHUNK,
        1,
    )
    .map_err(|e| Error::Audio(e.to_string()))?;

    let mut output = Vec::new();
    for chunk in mono.chunks(RESAMPLE_CHUNK) {
        let mut block = chunk.to_vec();
        block.resize(RESAMPLE_CHUNK, 0.0);
        let waves_in = vec![block];
        let waves_out = resampler
            .process(&waves_in, None)
            .map_err(|e| Error::Audio(e.to_string()))?;
        output.extend(waves_out.into_iter().next().unwrap_or_default());
    }

    Ok(output)
}

/// Pad with zeros or truncate to exactly `len` samples
#[must_use]
pub fn fit_length(mut samples: Vec<f32>, len: usize) -> Vec<f32> {
    samples.resize(len, 0.0);
    samples
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, RingBuffer};
use ts_core::model::Recording;
use ts_core::request::CaptureRequest;
use ts_core::traits::AudioSource;

use crate::error::AudioError;

/// Extra time granted to the device beyond the requested duration.
const CAPTURE_GRACE: Duration = Duration::from_secs(2);
/// Polling interval while waiting for samples.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Blocking microphone capture via cpal.
///
/// A fresh input stream is opened for every trial; the cpal callback
/// downmixes to mono and pushes into a lock-free ring buffer sized for the
/// whole capture. The stream is dropped before `capture` returns.
///
/// # Example
/// ```no_run
/// use ts_audio::capture::MicrophoneSource;
/// use ts_core::request::CaptureRequest;
/// use ts_core::traits::AudioSource;
///
/// let mut mic = MicrophoneSource::new(None);
/// let rec = mic.capture(&CaptureRequest::new(2.0, 48_000.0).unwrap()).unwrap();
/// ```
#[derive(Clone, Debug, Default)]
pub struct MicrophoneSource {
    device_name: Option<String>,
}

impl MicrophoneSource {
    /// `device_name = None` selects the host's default input device.
    #[must_use]
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    fn open_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        match &self.device_name {
            None => host
                .default_input_device()
                .ok_or_else(|| AudioError::NoInputDevice.into()),
            Some(wanted) => host
                .input_devices()
                .context("Énumération des périphériques impossible")?
                .find(|d| d.name().is_ok_and(|n| &n == wanted))
                .ok_or_else(|| AudioError::DeviceNotFound(wanted.clone()).into()),
        }
    }
}

impl AudioSource for MicrophoneSource {
    fn capture(&mut self, request: &CaptureRequest) -> Result<Recording> {
        let needed = request.sample_count();
        if needed == 0 {
            return Ok(Recording::new(
                Vec::new(),
                request.duration_secs(),
                request.sample_rate_hz(),
            ));
        }

        let device = self.open_device()?;
        let default_config = device
            .default_input_config()
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;
        let channels = usize::from(default_config.channels().max(1));
        let config = cpal::StreamConfig {
            channels: default_config.channels(),
            sample_rate: cpal::SampleRate(request.sample_rate_hz()),
            buffer_size: cpal::BufferSize::Default,
        };

        let (mut producer, consumer) = RingBuffer::new(needed);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for chunk in data.chunks(channels) {
                        let mono: f32 = chunk.iter().sum::<f32>() / chunk.len() as f32;
                        if producer.push(mono).is_err() {
                            break;
                        }
                    }
                },
                |err| {
                    log::error!("Audio stream error: {err}");
                },
                None,
            )
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        log::info!(
            "Enregistrement {} s @ {} Hz ({} canaux)",
            request.duration_secs(),
            request.sample_rate_hz(),
            channels
        );
        stream
            .play()
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let deadline = Instant::now()
            + Duration::from_secs(u64::from(request.duration_secs()))
            + CAPTURE_GRACE;
        let samples = collect(consumer, needed, deadline);
        drop(stream);

        let samples = samples?;
        Ok(Recording::new(
            samples,
            request.duration_secs(),
            request.sample_rate_hz(),
        ))
    }

    fn name(&self) -> &'static str {
        "microphone"
    }
}

/// Drain `consumer` until `needed` samples arrived or `deadline` passes.
fn collect(mut consumer: Consumer<f32>, needed: usize, deadline: Instant) -> Result<Vec<f32>> {
    let mut samples = Vec::with_capacity(needed);
    while samples.len() < needed {
        let mut drained = false;
        while samples.len() < needed {
            let Ok(sample) = consumer.pop() else { break };
            samples.push(sample);
            drained = true;
        }
        if samples.len() >= needed {
            break;
        }
        if Instant::now() >= deadline {
            return Err(AudioError::StreamError(format!(
                "capture incomplète : {}/{} échantillons",
                samples.len(),
                needed
            ))
            .into());
        }
        if !drained {
            std::thread::sleep(POLL_INTERVAL);
        }
    }
    Ok(samples)
}

/// Names of the input devices of the default host.
///
/// # Errors
/// Returns an error if the host cannot enumerate its devices.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("Énumération des périphériques impossible")?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

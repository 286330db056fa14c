use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use ts_core::model::Recording;
use ts_core::request::{CaptureRequest, MAX_SAMPLE_RATE_HZ};
use ts_core::traits::AudioSource;

use crate::error::AudioError;

/// Decode an audio file into mono f32 samples.
///
/// Supports WAV, MP3, FLAC, OGG, AAC via symphonia. Files sampled above
/// 48 kHz are decimated by the smallest integer factor that brings them
/// under the ceiling.
///
/// # Errors
/// Returns an error if the file cannot be opened or decoded.
///
/// # Example
/// ```no_run
/// use ts_audio::decode::decode_file;
/// let (samples, sample_rate) = decode_file("violin.wav").unwrap();
/// ```
pub fn decode_file(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32)> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Cannot open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(
        Box::new(file),
        symphonia::core::io::MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .context("No default audio track found")?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track
        .codec_params
        .channels
        .map_or(1, symphonia::core::audio::Channels::count);

    let factor = decimation_factor(sample_rate);
    let final_sample_rate = sample_rate / factor as u32;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::DecodeError(e.to_string()))?;

    let track_id = track.id;
    let mut all_samples: Vec<f32> = Vec::new();
    let mut frame_idx = 0usize;
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut max_sample_frames: usize = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Audio decode packet error: {e}");
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Audio decode frame error: {e}");
                continue;
            }
        };

        // Grow the interleaved buffer only for larger packets.
        let spec = *decoded.spec();
        let num_frames = decoded.capacity();
        if sample_buf.is_none() || num_frames > max_sample_frames {
            sample_buf = Some(SampleBuffer::<f32>::new(num_frames as u64, spec));
            max_sample_frames = num_frames;
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);

        frame_idx = downmix_decimate(buf.samples(), channels, factor, frame_idx, &mut all_samples);
    }

    log::info!(
        "Decoded {} samples @ {}Hz (original {}Hz) from {}",
        all_samples.len(),
        final_sample_rate,
        sample_rate,
        path.display()
    );

    Ok((all_samples, final_sample_rate))
}

/// Average interleaved frames to mono, keeping every `factor`-th frame.
///
/// `frame_idx` counts frames across packets so the decimation phase survives
/// packet boundaries; the updated count is returned.
fn downmix_decimate(
    interleaved: &[f32],
    channels: usize,
    factor: usize,
    mut frame_idx: usize,
    out: &mut Vec<f32>,
) -> usize {
    for frame in interleaved.chunks(channels.max(1)) {
        if frame_idx % factor == 0 {
            out.push(frame.iter().sum::<f32>() / frame.len() as f32);
        }
        frame_idx += 1;
    }
    frame_idx
}

/// Smallest integer step keeping `sample_rate / step` within 48 kHz.
fn decimation_factor(sample_rate: u32) -> usize {
    sample_rate.div_ceil(MAX_SAMPLE_RATE_HZ).max(1) as usize
}

/// Pre-recorded source: successive trials read successive windows of a
/// decoded file, wrapping around at its end.
///
/// The recording carries the file's own (possibly decimated) sample rate;
/// the requested rate only matters to live sources.
///
/// # Example
/// ```no_run
/// use ts_audio::decode::FileSource;
/// use ts_core::request::CaptureRequest;
/// use ts_core::traits::AudioSource;
///
/// let mut source = FileSource::open("cello.flac").unwrap();
/// let rec = source.capture(&CaptureRequest::new(2.0, 48_000.0).unwrap()).unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    samples: Vec<f32>,
    sample_rate_hz: u32,
    cursor: usize,
}

impl FileSource {
    /// Decode `path` once; later captures slice the decoded track.
    ///
    /// # Errors
    /// Decode failures, or a file without any audio sample.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (samples, sample_rate_hz) = decode_file(&path)?;
        Self::from_samples(path, samples, sample_rate_hz)
    }

    /// Build a source over already decoded mono samples.
    ///
    /// # Errors
    /// [`AudioError::DecodeError`] if `samples` is empty.
    pub fn from_samples(path: PathBuf, samples: Vec<f32>, sample_rate_hz: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(AudioError::DecodeError(format!(
                "aucun échantillon dans {}",
                path.display()
            ))
            .into());
        }
        Ok(Self {
            path,
            samples,
            sample_rate_hz,
            cursor: 0,
        })
    }

    #[must_use]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_window(&mut self, len: usize) -> Vec<f32> {
        let total = self.samples.len();
        let window: Vec<f32> = (0..len)
            .map(|i| self.samples[(self.cursor + i) % total])
            .collect();
        self.cursor = (self.cursor + len) % total;
        window
    }
}

impl AudioSource for FileSource {
    fn capture(&mut self, request: &CaptureRequest) -> Result<Recording> {
        if request.sample_rate_hz() != self.sample_rate_hz {
            log::info!(
                "{} : taux du fichier {} Hz utilisé au lieu de {} Hz",
                self.path.display(),
                self.sample_rate_hz,
                request.sample_rate_hz()
            );
        }
        let len = request.duration_secs() as usize * self.sample_rate_hz as usize;
        let samples = self.next_window(len);
        Ok(Recording::new(
            samples,
            request.duration_secs(),
            self.sample_rate_hz,
        ))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(n: usize, rate: u32) -> FileSource {
        let samples = (0..n).map(|i| i as f32).collect();
        FileSource::from_samples(PathBuf::from("mem.wav"), samples, rate).unwrap()
    }

    #[test]
    fn decimation_keeps_rate_under_ceiling() {
        assert_eq!(decimation_factor(44_100), 1);
        assert_eq!(decimation_factor(48_000), 1);
        assert_eq!(decimation_factor(96_000), 2);
        assert_eq!(decimation_factor(88_200), 2);
        assert_eq!(decimation_factor(192_000), 4);
        assert_eq!(decimation_factor(0), 1);
    }

    #[test]
    fn downmix_keeps_phase_across_packets() {
        let mut out = Vec::new();
        // Stereo frames (1, 3), (5, 7), (9, 11) then (13, 15), (17, 19).
        let idx = downmix_decimate(&[1.0, 3.0, 5.0, 7.0, 9.0, 11.0], 2, 2, 0, &mut out);
        assert_eq!(idx, 3);
        let idx = downmix_decimate(&[13.0, 15.0, 17.0, 19.0], 2, 2, idx, &mut out);
        assert_eq!(idx, 5);
        assert_eq!(out, vec![2.0, 10.0, 18.0]);
    }

    #[test]
    fn windows_advance_and_wrap() {
        let mut src = source(5, 2);
        let req = CaptureRequest::new(1.0, 2.0).unwrap();
        let a = src.capture(&req).unwrap();
        let b = src.capture(&req).unwrap();
        let c = src.capture(&req).unwrap();
        assert_eq!(a.samples(), &[0.0, 1.0]);
        assert_eq!(b.samples(), &[2.0, 3.0]);
        assert_eq!(c.samples(), &[4.0, 0.0]);
    }

    #[test]
    fn recording_uses_file_rate() {
        let mut src = source(100, 10);
        let rec = src.capture(&CaptureRequest::new(3.0, 48_000.0).unwrap()).unwrap();
        assert_eq!(rec.sample_rate_hz(), 10);
        assert_eq!(rec.samples().len(), 30);
    }

    #[test]
    fn empty_file_is_rejected() {
        assert!(FileSource::from_samples(PathBuf::from("empty.wav"), vec![], 8000).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FileSource::open(dir.path().join("absent.wav")).is_err());
    }
}

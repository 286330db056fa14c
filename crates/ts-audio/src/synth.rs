use std::f64::consts::TAU;

use ts_core::model::Recording;
use ts_core::request::CaptureRequest;
use ts_core::traits::AudioSource;

/// A sine component of a synthetic tone.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Partial {
    pub frequency_hz: f64,
    pub amplitude: f64,
}

/// Deterministic sum-of-sines source.
///
/// Stands in for the microphone when no device is available and gives the
/// analysis stages a signal whose spectrum is known in advance.
///
/// # Example
/// ```
/// use ts_audio::synth::ToneSource;
/// let rec = ToneSource::sine(440.0).render(1, 8000);
/// assert_eq!(rec.samples().len(), 8000);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ToneSource {
    partials: Vec<Partial>,
}

impl ToneSource {
    /// Tone made of the given partials. An empty list renders silence.
    #[must_use]
    pub fn new(partials: Vec<Partial>) -> Self {
        Self { partials }
    }

    /// Single unit-amplitude sine.
    #[must_use]
    pub fn sine(frequency_hz: f64) -> Self {
        Self::new(vec![Partial {
            frequency_hz,
            amplitude: 1.0,
        }])
    }

    /// Harmonic series on `fundamental_hz` with amplitudes `1/k`.
    #[must_use]
    pub fn harmonic(fundamental_hz: f64, count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|k| Partial {
                    frequency_hz: fundamental_hz * k as f64,
                    amplitude: 1.0 / k as f64,
                })
                .collect(),
        )
    }

    #[must_use]
    pub fn partials(&self) -> &[Partial] {
        &self.partials
    }

    /// Render `duration_secs` seconds at `sample_rate_hz`.
    ///
    /// The sum is scaled so its peak stays within [-1, 1].
    #[must_use]
    pub fn render(&self, duration_secs: u32, sample_rate_hz: u32) -> Recording {
        let n = duration_secs as usize * sample_rate_hz as usize;
        let rate = f64::from(sample_rate_hz.max(1));
        let total: f64 = self.partials.iter().map(|p| p.amplitude.abs()).sum();
        let scale = if total > 1.0 { 1.0 / total } else { 1.0 };

        let samples = (0..n)
            .map(|i| {
                let t = i as f64 / rate;
                let v: f64 = self
                    .partials
                    .iter()
                    .map(|p| p.amplitude * (TAU * p.frequency_hz * t).sin())
                    .sum();
                (v * scale) as f32
            })
            .collect();

        Recording::new(samples, duration_secs, sample_rate_hz)
    }
}

impl AudioSource for ToneSource {
    fn capture(&mut self, request: &CaptureRequest) -> anyhow::Result<Recording> {
        log::debug!(
            "Synthèse de {} partiels, {} s @ {} Hz",
            self.partials.len(),
            request.duration_secs(),
            request.sample_rate_hz()
        );
        Ok(self.render(request.duration_secs(), request.sample_rate_hz()))
    }

    fn name(&self) -> &'static str {
        "tone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_stays_normalized() {
        let rec = ToneSource::harmonic(110.0, 6).render(1, 8000);
        assert!(rec.samples().iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn empty_tone_is_silence() {
        let rec = ToneSource::default().render(1, 100);
        assert_eq!(rec.samples().len(), 100);
        assert!(rec.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn capture_follows_request() {
        let req = CaptureRequest::new(2.0, 4000.0).unwrap();
        let rec = ToneSource::sine(50.0).capture(&req).unwrap();
        assert_eq!(rec.samples().len(), 8000);
        assert_eq!(rec.duration_secs(), 2);
        assert_eq!(rec.sample_rate_hz(), 4000);
    }
}

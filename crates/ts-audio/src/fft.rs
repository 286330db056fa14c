use realfft::RealFftPlanner;
use ts_core::error::AnalysisError;
use ts_core::model::{Recording, Spectrum};
use ts_core::request::{MAX_DURATION_SECS, MAX_SAMPLE_RATE_HZ};

/// Full-length real DFT of a recording, one-sided amplitude spectrum.
///
/// No windowing, no normalization: bin `k` carries `|X[k]|` at
/// `k * sample_rate / N` Hz, for `k` in `0 .. N/2`.
/// Plans are cached by the planner, so repeated trials of the same length
/// reuse the same FFT.
///
/// # Example
/// ```
/// use ts_audio::fft::SpectrumTransformer;
/// use ts_core::model::Recording;
///
/// let mut fft = SpectrumTransformer::new();
/// let rec = Recording::new(vec![0.0; 256], 1, 256);
/// let spectrum = fft.transform(&rec).unwrap();
/// assert_eq!(spectrum.len(), 128); // N/2
/// ```
pub struct SpectrumTransformer {
    planner: RealFftPlanner<f64>,
}

impl SpectrumTransformer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
        }
    }

    /// Transform a recording into its one-sided spectrum.
    ///
    /// # Errors
    /// [`AnalysisError::TypeMismatch`] if a sample is NaN or infinite,
    /// [`AnalysisError::OutOfRange`] if the recording is longer than 10 s or
    /// sampled above 48 kHz.
    pub fn transform(&mut self, recording: &Recording) -> Result<Spectrum, AnalysisError> {
        check_limits(recording)?;

        let samples = recording.samples();
        if let Some(pos) = samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::TypeMismatch(format!(
                "échantillon {pos} non numérique : {}",
                samples[pos]
            )));
        }

        let n = samples.len();
        let half = n / 2;
        if half == 0 {
            return Ok(Spectrum::default());
        }

        let plan = self.planner.plan_fft_forward(n);
        let mut input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
        let mut output = plan.make_output_vec();
        plan.process(&mut input, &mut output)
            .map_err(|e| AnalysisError::TypeMismatch(format!("buffer FFT : {e}")))?;

        let bin_hz = f64::from(recording.sample_rate_hz()) / n as f64;
        let frequencies: Vec<f64> = (0..half).map(|k| k as f64 * bin_hz).collect();
        let amplitudes: Vec<f64> = output[..half].iter().map(|c| c.norm()).collect();

        Spectrum::from_bins(frequencies, amplitudes)
    }
}

impl Default for SpectrumTransformer {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-check the capture ceilings the request validator already enforced.
fn check_limits(recording: &Recording) -> Result<(), AnalysisError> {
    if recording.duration_secs() > MAX_DURATION_SECS {
        return Err(AnalysisError::OutOfRange {
            field: "duration_secs",
            value: f64::from(recording.duration_secs()),
            max: f64::from(MAX_DURATION_SECS),
        });
    }
    if recording.sample_rate_hz() > MAX_SAMPLE_RATE_HZ {
        return Err(AnalysisError::OutOfRange {
            field: "sample_rate_hz",
            value: f64::from(recording.sample_rate_hz()),
            max: f64::from(MAX_SAMPLE_RATE_HZ),
        });
    }
    Ok(())
}

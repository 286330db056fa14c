use serde::Serialize;

use crate::error::AnalysisError;

/// A single-channel capture.
///
/// Owned by the pipeline for one trial, immutable once produced.
///
/// # Example
/// ```
/// use ts_core::model::Recording;
/// let rec = Recording::new(vec![0.0; 8000], 1, 8000);
/// assert_eq!(rec.nyquist_hz(), 4000.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Recording {
    samples: Vec<f32>,
    duration_secs: u32,
    sample_rate_hz: u32,
}

impl Recording {
    #[must_use]
    pub fn new(samples: Vec<f32>, duration_secs: u32, sample_rate_hz: u32) -> Self {
        Self {
            samples,
            duration_secs,
            sample_rate_hz,
        }
    }

    /// Mono samples, normalized [-1, 1].
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Highest frequency representable without aliasing.
    #[must_use]
    pub fn nyquist_hz(&self) -> f64 {
        f64::from(self.sample_rate_hz) / 2.0
    }
}

/// One-sided amplitude spectrum: index-paired frequencies and amplitudes,
/// ascending frequency, 0 .. Nyquist.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Spectrum {
    frequencies_hz: Vec<f64>,
    amplitudes: Vec<f64>,
}

impl Spectrum {
    /// Build a spectrum from paired bins.
    ///
    /// # Errors
    /// [`AnalysisError::TypeMismatch`] if the lengths differ, a value is not
    /// finite, a frequency is negative, or frequencies are not ascending.
    ///
    /// # Example
    /// ```
    /// use ts_core::model::Spectrum;
    /// let s = Spectrum::from_bins(vec![0.0, 10.0], vec![1.0, 3.0]).unwrap();
    /// assert_eq!(s.peak(), Some((10.0, 3.0)));
    /// assert!(Spectrum::from_bins(vec![0.0], vec![]).is_err());
    /// ```
    pub fn from_bins(frequencies_hz: Vec<f64>, amplitudes: Vec<f64>) -> Result<Self, AnalysisError> {
        if frequencies_hz.len() != amplitudes.len() {
            return Err(AnalysisError::TypeMismatch(format!(
                "{} fréquences pour {} amplitudes",
                frequencies_hz.len(),
                amplitudes.len()
            )));
        }
        if let Some(bad) = frequencies_hz
            .iter()
            .chain(&amplitudes)
            .find(|v| !v.is_finite())
        {
            return Err(AnalysisError::TypeMismatch(format!(
                "valeur spectrale non numérique : {bad}"
            )));
        }
        if frequencies_hz.first().is_some_and(|&f| f < 0.0) {
            return Err(AnalysisError::TypeMismatch(
                "fréquence négative dans un spectre unilatéral".into(),
            ));
        }
        if frequencies_hz.windows(2).any(|w| w[1] < w[0]) {
            return Err(AnalysisError::TypeMismatch(
                "les fréquences doivent être croissantes".into(),
            ));
        }
        Ok(Self {
            frequencies_hz,
            amplitudes,
        })
    }

    #[must_use]
    pub fn frequencies_hz(&self) -> &[f64] {
        &self.frequencies_hz
    }

    #[must_use]
    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies_hz.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies_hz.is_empty()
    }

    /// `(frequency, amplitude)` pairs in ascending frequency.
    pub fn bins(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies_hz
            .iter()
            .copied()
            .zip(self.amplitudes.iter().copied())
    }

    /// Loudest bin, lowest frequency on ties.
    #[must_use]
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.bins().fold(None, |best, bin| match best {
            Some((_, amp)) if amp >= bin.1 => best,
            _ => Some(bin),
        })
    }
}

/// A group of spectral bins lying within the tolerance of a reference bin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FrequencyCluster {
    /// Mean frequency of the members.
    pub representative_hz: f64,
    /// Loudest member amplitude.
    pub peak_amplitude: f64,
    /// Number of bins merged into the cluster.
    pub members: usize,
}

/// Dominant clusters of one trial, by non-increasing peak amplitude.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterSet {
    clusters: Vec<FrequencyCluster>,
    min_frequency_hz: f64,
    ranked_frequencies_hz: Vec<f64>,
}

impl ClusterSet {
    /// Wrap already ordered clusters.
    ///
    /// # Errors
    /// [`AnalysisError::EmptyInput`] if `clusters` is empty.
    pub fn new(
        clusters: Vec<FrequencyCluster>,
        ranked_frequencies_hz: Vec<f64>,
    ) -> Result<Self, AnalysisError> {
        let min_frequency_hz = clusters
            .iter()
            .map(|c| c.representative_hz)
            .min_by(f64::total_cmp)
            .ok_or(AnalysisError::EmptyInput)?;
        Ok(Self {
            clusters,
            min_frequency_hz,
            ranked_frequencies_hz,
        })
    }

    #[must_use]
    pub fn clusters(&self) -> &[FrequencyCluster] {
        &self.clusters
    }

    /// The `n` strongest clusters (fewer if the set is shorter).
    #[must_use]
    pub fn top(&self, n: usize) -> &[FrequencyCluster] {
        &self.clusters[..n.min(self.clusters.len())]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Lowest representative frequency among the retained clusters.
    #[must_use]
    pub fn min_frequency_hz(&self) -> f64 {
        self.min_frequency_hz
    }

    /// Every bin frequency, ordered by decreasing amplitude.
    #[must_use]
    pub fn ranked_frequencies_hz(&self) -> &[f64] {
        &self.ranked_frequencies_hz
    }

    /// The `n` loudest bin frequencies (fewer if the axis is shorter).
    #[must_use]
    pub fn ranked_head(&self, n: usize) -> &[f64] {
        &self.ranked_frequencies_hz[..n.min(self.ranked_frequencies_hz.len())]
    }
}

/// Mean relative-energy shares over a batch of trials.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AveragedResult {
    /// Cluster frequencies of the trial that completed the batch.
    pub frequencies_hz: Vec<f64>,
    /// Element-wise mean of the per-trial shares, one per harmonic.
    pub mean_shares: Vec<f64>,
    /// Trials averaged.
    pub trials: usize,
}

impl AveragedResult {
    /// Mean shares as percentages.
    #[must_use]
    pub fn percentages(&self) -> Vec<f64> {
        self.mean_shares.iter().map(|s| s * 100.0).collect()
    }
}

use ts_core::config::SessionConfig;
use ts_core::error::AnalysisError;
use ts_core::model::{AveragedResult, ClusterSet};

/// Default number of clusters entering the energy vector.
pub const DEFAULT_HARMONICS: usize = 10;
/// Default number of trials buffered before a mean is emitted.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 5;

/// Relative energy of a trial's strongest clusters.
///
/// `shares` always has `harmonics` entries; positions past the last
/// available cluster are zero. `frequencies_hz` holds the frequencies of the
/// clusters actually selected.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialEnergyVector {
    pub frequencies_hz: Vec<f64>,
    pub shares: Vec<f64>,
}

impl TrialEnergyVector {
    /// `amplitude² / Σ amplitude²` over the first `harmonics` clusters.
    ///
    /// # Errors
    /// [`AnalysisError::DivisionByZero`] if the selected clusters carry no
    /// energy, [`AnalysisError::OutOfRange`] if their energy overflows `f64`.
    ///
    /// # Example
    /// ```
    /// use ts_audio::aggregate::TrialEnergyVector;
    /// use ts_core::model::{ClusterSet, FrequencyCluster};
    ///
    /// let c = |hz, amp| FrequencyCluster { representative_hz: hz, peak_amplitude: amp, members: 1 };
    /// let set = ClusterSet::new(vec![c(100.0, 3.0), c(200.0, 1.0)], vec![]).unwrap();
    /// let v = TrialEnergyVector::from_clusters(&set, 3).unwrap();
    /// assert_eq!(v.shares, vec![0.9, 0.1, 0.0]);
    /// ```
    pub fn from_clusters(clusters: &ClusterSet, harmonics: usize) -> Result<Self, AnalysisError> {
        let top = clusters.top(harmonics);
        let energy: Vec<f64> = top.iter().map(|c| c.peak_amplitude.powi(2)).collect();
        let total: f64 = energy.iter().sum();
        if !total.is_finite() {
            return Err(AnalysisError::OutOfRange {
                field: "energy",
                value: total,
                max: f64::MAX,
            });
        }
        if total <= 0.0 {
            return Err(AnalysisError::DivisionByZero { harmonics });
        }

        let mut shares = vec![0.0; harmonics];
        for (share, e) in shares.iter_mut().zip(&energy) {
            *share = e / total;
        }
        Ok(Self {
            frequencies_hz: top.iter().map(|c| c.representative_hz).collect(),
            shares,
        })
    }
}

/// Trial vectors waiting for the next flush. Drained, never overwritten.
#[derive(Clone, Debug, Default)]
pub struct AggregationBuffer {
    vectors: Vec<TrialEnergyVector>,
}

impl AggregationBuffer {
    pub fn push(&mut self, vector: TrialEnergyVector) {
        self.vectors.push(vector);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Element-wise mean of the buffered shares, emptying the buffer.
    /// Frequencies come from the most recent vector.
    ///
    /// Returns `None` if the buffer was empty.
    pub fn drain_mean(&mut self) -> Option<AveragedResult> {
        let last = self.vectors.last()?;
        let frequencies_hz = last.frequencies_hz.clone();
        let width = self.vectors.iter().map(|v| v.shares.len()).max().unwrap_or(0);
        let trials = self.vectors.len();

        let mut mean_shares = vec![0.0; width];
        for vector in self.vectors.drain(..) {
            for (acc, s) in mean_shares.iter_mut().zip(&vector.shares) {
                *acc += s;
            }
        }
        for acc in &mut mean_shares {
            *acc /= trials as f64;
        }

        Some(AveragedResult {
            frequencies_hz,
            mean_shares,
            trials,
        })
    }

    pub fn clear(&mut self) {
        self.vectors.clear();
    }
}

/// Accumulates energy vectors across trials and emits their mean every
/// `flush_threshold` trials.
///
/// Each instance owns its buffer; independent sessions use independent
/// aggregators.
///
/// # Example
/// ```
/// use ts_audio::aggregate::TrialAggregator;
/// use ts_core::model::{ClusterSet, FrequencyCluster};
///
/// let c = FrequencyCluster { representative_hz: 440.0, peak_amplitude: 2.0, members: 3 };
/// let set = ClusterSet::new(vec![c], vec![440.0]).unwrap();
/// let mut agg = TrialAggregator::new(1, 2);
/// assert!(agg.accumulate(&set).unwrap().is_none());
/// let avg = agg.accumulate(&set).unwrap().unwrap();
/// assert_eq!(avg.mean_shares, vec![1.0]);
/// assert_eq!(agg.pending(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct TrialAggregator {
    harmonics: usize,
    flush_threshold: usize,
    buffer: AggregationBuffer,
}

impl TrialAggregator {
    /// Both parameters are raised to at least 1.
    #[must_use]
    pub fn new(harmonics: usize, flush_threshold: usize) -> Self {
        Self {
            harmonics: harmonics.max(1),
            flush_threshold: flush_threshold.max(1),
            buffer: AggregationBuffer::default(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.harmonics, config.flush_threshold)
    }

    #[must_use]
    pub fn harmonics(&self) -> usize {
        self.harmonics
    }

    #[must_use]
    pub fn flush_threshold(&self) -> usize {
        self.flush_threshold
    }

    /// Add one trial. Returns the averaged result on the call that fills the
    /// buffer up to the flush threshold, `None` otherwise.
    ///
    /// # Errors
    /// [`AnalysisError::DivisionByZero`] for a zero-energy trial. The buffer
    /// is left untouched and the next trial can proceed.
    /// [`AnalysisError::OutOfRange`] if the trial's energy overflows.
    pub fn accumulate(
        &mut self,
        clusters: &ClusterSet,
    ) -> Result<Option<AveragedResult>, AnalysisError> {
        let vector = TrialEnergyVector::from_clusters(clusters, self.harmonics)?;
        self.buffer.push(vector);
        log::debug!(
            "essai ajouté ({}/{})",
            self.buffer.len(),
            self.flush_threshold
        );

        if self.buffer.len() < self.flush_threshold {
            return Ok(None);
        }
        let result = self.buffer.drain_mean();
        if let Some(r) = &result {
            log::info!("moyenne émise sur {} essais", r.trials);
        }
        Ok(result)
    }

    /// Trials buffered since the last flush.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered trials without emitting a result.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

impl Default for TrialAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_HARMONICS, DEFAULT_FLUSH_THRESHOLD)
    }
}

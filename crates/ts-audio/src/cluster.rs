use ts_core::config::SessionConfig;
use ts_core::error::AnalysisError;
use ts_core::model::{ClusterSet, FrequencyCluster, Spectrum};

/// Default distance (Hz) from a reference bin for cluster membership.
pub const DEFAULT_TOLERANCE_HZ: f64 = 15.0;
/// Default number of clusters kept per trial.
pub const DEFAULT_CLUSTER_LIMIT: usize = 15;

/// Greedy descending-amplitude grouping of spectral bins.
///
/// The loudest unclustered bin becomes a reference; every unclustered bin
/// within `tolerance_hz` of it joins its cluster, whatever its rank. The
/// cluster reports the mean member frequency and the loudest member
/// amplitude. Equal amplitudes rank the lower frequency first.
///
/// # Example
/// ```
/// use ts_audio::cluster::FrequencyClusterer;
/// use ts_core::model::Spectrum;
///
/// let spectrum = Spectrum::from_bins(
///     vec![100.0, 105.0, 300.0],
///     vec![4.0, 2.0, 1.0],
/// ).unwrap();
/// let set = FrequencyClusterer::default().cluster(&spectrum).unwrap();
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.clusters()[0].representative_hz, 102.5);
/// assert_eq!(set.clusters()[0].peak_amplitude, 4.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyClusterer {
    tolerance_hz: f64,
    cluster_limit: usize,
}

/// Bins merged around one reference, as spectrum indices.
#[derive(Debug)]
struct Group {
    reference: usize,
    members: Vec<usize>,
}

impl FrequencyClusterer {
    /// `cluster_limit` is raised to 1, a negative tolerance to 0.
    #[must_use]
    pub fn new(tolerance_hz: f64, cluster_limit: usize) -> Self {
        Self {
            tolerance_hz: tolerance_hz.max(0.0),
            cluster_limit: cluster_limit.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.tolerance_hz, config.cluster_limit)
    }

    #[must_use]
    pub fn tolerance_hz(&self) -> f64 {
        self.tolerance_hz
    }

    #[must_use]
    pub fn cluster_limit(&self) -> usize {
        self.cluster_limit
    }

    /// Group the bins of `spectrum` into at most `cluster_limit` clusters,
    /// ordered by non-increasing peak amplitude.
    ///
    /// # Errors
    /// [`AnalysisError::EmptyInput`] if the spectrum has no bins.
    pub fn cluster(&self, spectrum: &Spectrum) -> Result<ClusterSet, AnalysisError> {
        if spectrum.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let freqs = spectrum.frequencies_hz();
        let amps = spectrum.amplitudes();
        let ranked = rank(spectrum);

        let clusters: Vec<FrequencyCluster> = self
            .groups(freqs, &ranked)
            .into_iter()
            .map(|group| {
                let count = group.members.len();
                let sum: f64 = group.members.iter().map(|&i| freqs[i]).sum();
                let peak = group
                    .members
                    .iter()
                    .map(|&i| amps[i])
                    .fold(amps[group.reference], f64::max);
                FrequencyCluster {
                    representative_hz: sum / count as f64,
                    peak_amplitude: peak,
                    members: count,
                }
            })
            .collect();

        for (i, c) in clusters.iter().enumerate() {
            log::debug!(
                "cluster {i}: {:.2} Hz, amplitude {:.4}, {} bins",
                c.representative_hz,
                c.peak_amplitude,
                c.members
            );
        }

        let ranked_frequencies = ranked.iter().map(|&i| freqs[i]).collect();
        ClusterSet::new(clusters, ranked_frequencies)
    }

    /// Form groups in rank order, stopping at `cluster_limit`.
    ///
    /// Groups are produced in their final order, so stopping early gives the
    /// same list as clustering everything and truncating.
    fn groups(&self, freqs: &[f64], ranked: &[usize]) -> Vec<Group> {
        let mut taken = vec![false; freqs.len()];
        let mut groups = Vec::with_capacity(self.cluster_limit);

        for &reference in ranked {
            if groups.len() == self.cluster_limit {
                break;
            }
            if taken[reference] {
                continue;
            }
            let (lo, hi) = self.window(freqs, freqs[reference]);
            let members: Vec<usize> = (lo..hi).filter(|&i| !taken[i]).collect();
            for &i in &members {
                taken[i] = true;
            }
            groups.push(Group { reference, members });
        }

        groups
    }

    /// Index range of bins with `|f - reference| <= tolerance` in an
    /// ascending frequency axis.
    fn window(&self, freqs: &[f64], reference: f64) -> (usize, usize) {
        let tol = self.tolerance_hz;
        let lo = freqs.partition_point(|&f| f < reference && reference - f > tol);
        let hi = freqs.partition_point(|&f| f <= reference || f - reference <= tol);
        (lo, hi)
    }
}

impl Default for FrequencyClusterer {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE_HZ, DEFAULT_CLUSTER_LIMIT)
    }
}

/// Bin indices by decreasing amplitude, lower frequency first on ties.
fn rank(spectrum: &Spectrum) -> Vec<usize> {
    let freqs = spectrum.frequencies_hz();
    let amps = spectrum.amplitudes();
    let mut ranked: Vec<usize> = (0..spectrum.len()).collect();
    ranked.sort_by(|&a, &b| {
        amps[b]
            .total_cmp(&amps[a])
            .then_with(|| freqs[a].total_cmp(&freqs[b]))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fft::SpectrumTransformer;
    use crate::synth::{Partial, ToneSource};

    fn spectrum(freqs: &[f64], amps: &[f64]) -> Spectrum {
        Spectrum::from_bins(freqs.to_vec(), amps.to_vec()).unwrap()
    }

    #[test]
    fn empty_spectrum_is_rejected() {
        let err = FrequencyClusterer::default()
            .cluster(&Spectrum::default())
            .unwrap_err();
        assert_eq!(err, AnalysisError::EmptyInput);
    }

    #[test]
    fn tied_amplitudes_pick_lowest_frequency_reference() {
        // 100 and 120 tie; 100 must lead and absorb 110, leaving 120 alone.
        let s = spectrum(&[100.0, 110.0, 120.0], &[5.0, 1.0, 5.0]);
        let set = FrequencyClusterer::new(15.0, 15).cluster(&s).unwrap();
        let c = set.clusters();
        assert_eq!(c.len(), 2);
        assert!((c[0].representative_hz - 105.0).abs() < 1e-12);
        assert_eq!(c[0].members, 2);
        assert!((c[1].representative_hz - 120.0).abs() < 1e-12);
        assert_eq!(c[1].members, 1);
        assert_eq!(set.ranked_frequencies_hz(), &[100.0, 120.0, 110.0]);
    }

    #[test]
    fn membership_is_relative_to_reference_not_pairwise() {
        let s = spectrum(&[90.0, 100.0, 110.0], &[1.0, 5.0, 1.0]);
        let set = FrequencyClusterer::new(10.0, 15).cluster(&s).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.clusters()[0].members, 3);
        assert!((set.clusters()[0].representative_hz - 100.0).abs() < 1e-12);
    }

    #[test]
    fn every_member_is_within_tolerance_of_its_reference() {
        let rec = ToneSource::harmonic(196.0, 8).render(1, 8000);
        let spectrum = SpectrumTransformer::new().transform(&rec).unwrap();
        let clusterer = FrequencyClusterer::new(15.0, 15);
        let freqs = spectrum.frequencies_hz();
        for group in clusterer.groups(freqs, &rank(&spectrum)) {
            let reference = freqs[group.reference];
            assert!(group.members.contains(&group.reference));
            for &m in &group.members {
                assert!((freqs[m] - reference).abs() <= 15.0);
            }
        }
    }

    #[test]
    fn clusters_are_limited_and_ordered() {
        let freqs: Vec<f64> = (0..40).map(|i| f64::from(i) * 100.0).collect();
        let amps: Vec<f64> = (0..40).map(|i| f64::from((i * 7) % 40)).collect();
        let set = FrequencyClusterer::new(15.0, 15)
            .cluster(&spectrum(&freqs, &amps))
            .unwrap();
        assert_eq!(set.len(), 15);
        assert!(set
            .clusters()
            .windows(2)
            .all(|w| w[0].peak_amplitude >= w[1].peak_amplitude));
        let min = set
            .clusters()
            .iter()
            .map(|c| c.representative_hz)
            .fold(f64::INFINITY, f64::min);
        assert!((set.min_frequency_hz() - min).abs() < f64::EPSILON);
        assert_eq!(set.ranked_frequencies_hz().len(), 40);
    }

    #[test]
    fn zero_tolerance_keeps_bins_apart() {
        let s = spectrum(&[10.0, 20.0, 30.0], &[1.0, 3.0, 2.0]);
        let set = FrequencyClusterer::new(0.0, 15).cluster(&s).unwrap();
        let hz: Vec<f64> = set.clusters().iter().map(|c| c.representative_hz).collect();
        assert_eq!(hz, vec![20.0, 30.0, 10.0]);
    }

    #[test]
    fn pure_tone_end_to_end() {
        let rec = ToneSource::sine(440.0).render(1, 8000);
        let spectrum = SpectrumTransformer::new().transform(&rec).unwrap();
        let set = FrequencyClusterer::default().cluster(&spectrum).unwrap();
        let top = set.clusters()[0];
        assert!((top.representative_hz - 440.0).abs() <= 15.0);
        assert!(set
            .clusters()
            .iter()
            .all(|c| c.peak_amplitude <= top.peak_amplitude));
    }

    #[test]
    fn two_tones_rank_by_amplitude() {
        let rec = ToneSource::new(vec![
            Partial { frequency_hz: 300.0, amplitude: 0.3 },
            Partial { frequency_hz: 1200.0, amplitude: 0.6 },
        ])
        .render(1, 8000);
        let spectrum = SpectrumTransformer::new().transform(&rec).unwrap();
        let set = FrequencyClusterer::default().cluster(&spectrum).unwrap();
        assert!((set.clusters()[0].representative_hz - 1200.0).abs() <= 15.0);
        assert!((set.clusters()[1].representative_hz - 300.0).abs() <= 15.0);
    }
}

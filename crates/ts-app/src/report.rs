use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use ts_core::model::{AveragedResult, ClusterSet, FrequencyCluster, Recording, Spectrum};
use ts_core::request::{CaptureRequest, Correction};
use ts_core::traits::Visualizer;

use crate::session::RANKED_HEAD;

/// Width of the bar charts, in characters.
const BAR_WIDTH: usize = 40;
/// Buckets per text spectrum chart.
const TEXT_BUCKETS: usize = 24;
/// Buckets of the JSON spectrum, spread over 0 .. Nyquist.
const JSON_BUCKETS: usize = 64;
/// Text spectrum views: full range, then zoomed on the low partials.
const SPECTRUM_VIEWS: [f64; 2] = [4500.0, 800.0];

/// Loudest amplitude within one frequency slice of a spectrum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SpectrumBucket {
    pub from_hz: f64,
    pub to_hz: f64,
    pub amplitude: f64,
}

/// Split `0 .. max_hz` into `buckets` equal slices, keeping the max
/// amplitude of the bins falling in each. Bins at or above `max_hz` are
/// ignored; empty slices have amplitude 0.
#[must_use]
pub fn spectrum_buckets(spectrum: &Spectrum, max_hz: f64, buckets: usize) -> Vec<SpectrumBucket> {
    if buckets == 0 || max_hz <= 0.0 {
        return Vec::new();
    }
    let width = max_hz / buckets as f64;
    let mut out: Vec<SpectrumBucket> = (0..buckets)
        .map(|i| SpectrumBucket {
            from_hz: i as f64 * width,
            to_hz: (i + 1) as f64 * width,
            amplitude: 0.0,
        })
        .collect();

    let end = spectrum.frequencies_hz().partition_point(|&f| f < max_hz);
    for (f, a) in spectrum.bins().take(end) {
        let idx = ((f / width) as usize).min(buckets - 1);
        out[idx].amplitude = out[idx].amplitude.max(a);
    }
    out
}

/// Peak and RMS level of a recording.
fn waveform_levels(samples: &[f32]) -> (f32, f32) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let peak = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
    let energy: f64 = samples.iter().map(|&s| f64::from(s).powi(2)).sum();
    let rms = (energy / samples.len() as f64).sqrt() as f32;
    (peak, rms)
}

/// Human-readable tables and bar charts.
pub struct TextReport<W: Write> {
    out: W,
}

impl<W: Write> TextReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn spectrum_chart(&mut self, spectrum: &Spectrum, max_hz: f64) -> Result<()> {
        let buckets = spectrum_buckets(spectrum, max_hz, TEXT_BUCKETS);
        let loudest = buckets.iter().fold(0.0_f64, |m, b| m.max(b.amplitude));
        writeln!(
            self.out,
            "Spectre 0-{max_hz:.0} Hz (max par tranche de {:.1} Hz)",
            max_hz / TEXT_BUCKETS as f64
        )?;
        for b in &buckets {
            let filled = if loudest > 0.0 {
                ((b.amplitude / loudest) * BAR_WIDTH as f64).round() as usize
            } else {
                0
            };
            writeln!(self.out, "{:>7.0} Hz |{}", b.from_hz, "#".repeat(filled))?;
        }
        Ok(())
    }
}

impl<W: Write> Visualizer for TextReport<W> {
    fn show_trial(
        &mut self,
        trial: usize,
        request: &CaptureRequest,
        recording: &Recording,
        spectrum: &Spectrum,
        clusters: &ClusterSet,
    ) -> Result<()> {
        writeln!(
            self.out,
            "Essai {trial} : {} échantillons @ {} Hz, {} bins",
            recording.samples().len(),
            recording.sample_rate_hz(),
            spectrum.len()
        )?;
        for correction in request.corrections() {
            writeln!(self.out, "  correction : {correction}")?;
        }
        let (peak, rms) = waveform_levels(recording.samples());
        writeln!(self.out, "Signal : crête {peak:.3}, RMS {rms:.3}")?;

        for max_hz in SPECTRUM_VIEWS {
            self.spectrum_chart(spectrum, max_hz)?;
        }

        writeln!(self.out, "  #  fréquence (Hz)   amplitude   bins")?;
        for (i, c) in clusters.clusters().iter().enumerate() {
            writeln!(
                self.out,
                "{:>3}  {:>14.2}  {:>10.3}  {:>5}",
                i + 1,
                c.representative_hz,
                c.peak_amplitude,
                c.members
            )?;
        }
        writeln!(
            self.out,
            "Fréquence la plus basse : {:.2} Hz",
            clusters.min_frequency_hz()
        )?;
        let head: Vec<String> = clusters
            .ranked_head(RANKED_HEAD)
            .iter()
            .map(|f| format!("{f:.1}"))
            .collect();
        writeln!(self.out, "Bins les plus forts : {}", head.join(", "))?;
        writeln!(self.out)?;
        Ok(())
    }

    fn show_average(&mut self, result: &AveragedResult) -> Result<()> {
        writeln!(self.out, "Moyenne sur {} essais", result.trials)?;
        for (i, pct) in result.percentages().iter().enumerate() {
            let freq = result
                .frequencies_hz
                .get(i)
                .map_or_else(|| "-".to_string(), |f| format!("{f:.1}"));
            let filled = ((pct / 100.0) * BAR_WIDTH as f64).round() as usize;
            writeln!(
                self.out,
                "{freq:>9} Hz |{:<width$}| {pct:5.1} %",
                "#".repeat(filled.min(BAR_WIDTH)),
                width = BAR_WIDTH
            )?;
        }
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Trial {
        trial: usize,
        sample_rate_hz: u32,
        samples: usize,
        peak: f32,
        rms: f32,
        corrections: &'a [Correction],
        bins: usize,
        spectrum: Vec<SpectrumBucket>,
        min_frequency_hz: f64,
        ranked_head_hz: &'a [f64],
        clusters: &'a [FrequencyCluster],
    },
    Average {
        #[serde(flatten)]
        result: &'a AveragedResult,
        percentages: Vec<f64>,
    },
}

/// One JSON object per line, for piping into other tools.
pub struct JsonReport<W: Write> {
    out: W,
}

impl<W: Write> JsonReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: &Event<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write> Visualizer for JsonReport<W> {
    fn show_trial(
        &mut self,
        trial: usize,
        request: &CaptureRequest,
        recording: &Recording,
        spectrum: &Spectrum,
        clusters: &ClusterSet,
    ) -> Result<()> {
        let (peak, rms) = waveform_levels(recording.samples());
        self.emit(&Event::Trial {
            trial,
            sample_rate_hz: recording.sample_rate_hz(),
            samples: recording.samples().len(),
            peak,
            rms,
            corrections: request.corrections(),
            bins: spectrum.len(),
            spectrum: spectrum_buckets(spectrum, recording.nyquist_hz(), JSON_BUCKETS),
            min_frequency_hz: clusters.min_frequency_hz(),
            ranked_head_hz: clusters.ranked_head(RANKED_HEAD),
            clusters: clusters.clusters(),
        })
    }

    fn show_average(&mut self, result: &AveragedResult) -> Result<()> {
        self.emit(&Event::Average {
            result,
            percentages: result.percentages(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        request: CaptureRequest,
        recording: Recording,
        spectrum: Spectrum,
        clusters: ClusterSet,
        average: AveragedResult,
    }

    /// Flat spectrum over 0 .. 4500 Hz (10 Hz bins) with one loud bin at 440 Hz.
    fn fixture() -> Fixture {
        let freqs: Vec<f64> = (0..450).map(|i| f64::from(i) * 10.0).collect();
        let amps: Vec<f64> = freqs
            .iter()
            .map(|&f| if (f - 440.0).abs() < 1e-9 { 50.0 } else { 1.0 })
            .collect();
        let ranked: Vec<f64> = (0..12).map(|i| 440.0 + f64::from(i)).collect();
        Fixture {
            request: CaptureRequest::new(15.0, 96_000.0).unwrap(),
            recording: Recording::new(vec![0.5, -1.0, 0.5, 0.0], 1, 9000),
            spectrum: Spectrum::from_bins(freqs, amps).unwrap(),
            clusters: ClusterSet::new(
                vec![
                    FrequencyCluster { representative_hz: 440.0, peak_amplitude: 50.0, members: 3 },
                    FrequencyCluster { representative_hz: 2.5, peak_amplitude: 1.0, members: 2 },
                ],
                ranked,
            )
            .unwrap(),
            average: AveragedResult {
                frequencies_hz: vec![440.0],
                mean_shares: vec![0.75, 0.25],
                trials: 5,
            },
        }
    }

    #[test]
    fn buckets_keep_max_amplitude() {
        let f = fixture();
        let buckets = spectrum_buckets(&f.spectrum, 800.0, 8);
        assert_eq!(buckets.len(), 8);
        let loudest = buckets
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.amplitude.total_cmp(&b.1.amplitude))
            .map(|(i, _)| i);
        assert_eq!(loudest, Some(4));
        assert!((buckets[4].from_hz - 400.0).abs() < 1e-9);
        assert!((buckets[4].amplitude - 50.0).abs() < f64::EPSILON);
        assert!((buckets[0].amplitude - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buckets_of_degenerate_range_are_empty() {
        let f = fixture();
        assert!(spectrum_buckets(&f.spectrum, 0.0, 8).is_empty());
        assert!(spectrum_buckets(&Spectrum::default(), 800.0, 4)
            .iter()
            .all(|b| b.amplitude == 0.0));
    }

    #[test]
    fn waveform_levels_of_short_signal() {
        let (peak, rms) = waveform_levels(&[0.5, -1.0, 0.5, 0.0]);
        assert!((peak - 1.0).abs() < f32::EPSILON);
        assert!((rms - 0.375_f32.sqrt()).abs() < 1e-6);
        assert_eq!(waveform_levels(&[]), (0.0, 0.0));
    }

    #[test]
    fn text_report_draws_both_spectrum_views() {
        let f = fixture();
        let mut report = TextReport::new(Vec::new());
        report
            .show_trial(1, &f.request, &f.recording, &f.spectrum, &f.clusters)
            .unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();

        assert!(text.contains("Spectre 0-4500 Hz"));
        assert!(text.contains("Spectre 0-800 Hz"));
        let full_bar = "#".repeat(BAR_WIDTH);
        // 440 Hz falls in the 375 Hz slice (187.5 Hz wide) and the 433 Hz slice (33.3 Hz wide).
        assert!(text.contains(&format!("    375 Hz |{full_bar}\n")));
        assert!(text.contains(&format!("    433 Hz |{full_bar}\n")));
        assert_eq!(text.matches(&format!("|{full_bar}\n")).count(), 2);
    }

    #[test]
    fn text_report_lists_clusters_and_diagnostics() {
        let f = fixture();
        let mut report = TextReport::new(Vec::new());
        report
            .show_trial(1, &f.request, &f.recording, &f.spectrum, &f.clusters)
            .unwrap();
        report.show_average(&f.average).unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();

        assert!(text.contains("Essai 1 : 4 échantillons @ 9000 Hz, 450 bins"));
        assert!(text.contains("Signal : crête 1.000, RMS 0.612"));
        assert_eq!(text.matches("  correction : ").count(), 2);
        assert!(text.contains("Fréquence la plus basse : 2.50 Hz"));
        assert!(text.contains("Bins les plus forts : 440.0, 441.0,"));
        assert!(!text.contains("450.0"));
        assert!(text.contains("Moyenne sur 5 essais"));
        assert!(text.contains(&format!("    440.0 Hz |{:<40}|  75.0 %", "#".repeat(30))));
        assert!(text.contains(&format!("        - Hz |{:<40}|  25.0 %", "#".repeat(10))));
    }

    #[test]
    fn json_report_writes_one_object_per_line() {
        let f = fixture();
        let mut report = JsonReport::new(Vec::new());
        report
            .show_trial(3, &f.request, &f.recording, &f.spectrum, &f.clusters)
            .unwrap();
        report.show_average(&f.average).unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "trial");
        assert_eq!(lines[0]["trial"], 3);
        assert_eq!(lines[0]["clusters"][1]["members"], 2);
        assert_eq!(lines[1]["event"], "average");
        assert_eq!(lines[1]["trials"], 5);
        assert_eq!(lines[1]["percentages"][0], 75.0);
    }

    #[test]
    fn json_trial_carries_spectrum_and_diagnostics() {
        let f = fixture();
        let mut report = JsonReport::new(Vec::new());
        report
            .show_trial(1, &f.request, &f.recording, &f.spectrum, &f.clusters)
            .unwrap();
        let text = String::from_utf8(report.into_inner()).unwrap();
        let trial: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();

        // 64 slices over 0 .. 4500 Hz: 440 Hz lands in slice 6 (421.9 .. 492.2 Hz).
        let spectrum = trial["spectrum"].as_array().unwrap();
        assert_eq!(spectrum.len(), JSON_BUCKETS);
        assert_eq!(spectrum[6]["amplitude"], 50.0);
        assert_eq!(spectrum[5]["amplitude"], 1.0);

        let head = trial["ranked_head_hz"].as_array().unwrap();
        assert_eq!(head.len(), RANKED_HEAD);
        assert_eq!(head[0], 440.0);

        let corrections = trial["corrections"].as_array().unwrap();
        assert_eq!(corrections.len(), 2);
        assert_eq!(corrections[0]["field"], "duration");
        assert_eq!(corrections[0]["kind"], "clamped");
        assert_eq!(corrections[0]["to"], 10.0);
        assert_eq!(corrections[1]["field"], "sample_rate");
        assert_eq!(trial["peak"], 1.0);
    }
}

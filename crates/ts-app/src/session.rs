use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use ts_audio::{FrequencyClusterer, SpectrumTransformer, TrialAggregator};
use ts_core::config::SessionConfig;
use ts_core::error::AnalysisError;
use ts_core::model::AveragedResult;
use ts_core::request::CaptureRequest;
use ts_core::traits::{AudioSource, Visualizer};

/// Loudest bins listed in trial diagnostics.
pub const RANKED_HEAD: usize = 10;

/// Outcome of a finished session.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSummary {
    /// Trials that reached the aggregator.
    pub completed: usize,
    /// Zero-energy trials dropped along the way.
    pub discarded: usize,
    /// Every averaged result emitted, in order.
    pub averages: Vec<AveragedResult>,
    /// Trials left in the aggregator when the session ended.
    pub pending: usize,
}

/// Drives validate → capture → transform → cluster → accumulate for a
/// fixed number of trials.
///
/// Fatal errors end the session. A zero-energy trial is reported, dropped,
/// and the next trial proceeds.
pub struct Session {
    duration_secs: f64,
    sample_rate_hz: f64,
    trials: usize,
    transformer: SpectrumTransformer,
    clusterer: FrequencyClusterer,
    aggregator: TrialAggregator,
    prompt: Option<Box<dyn BufRead>>,
}

impl Session {
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            duration_secs: config.duration_secs,
            sample_rate_hz: config.sample_rate_hz,
            trials: config.trials,
            transformer: SpectrumTransformer::new(),
            clusterer: FrequencyClusterer::from_config(config),
            aggregator: TrialAggregator::from_config(config),
            prompt: None,
        }
    }

    /// Wait for a line on `input` before each recording. End of input stops
    /// the session early.
    #[must_use]
    pub fn with_prompt(mut self, input: Box<dyn BufRead>) -> Self {
        self.prompt = Some(input);
        self
    }

    /// Run every trial.
    ///
    /// # Errors
    /// The first fatal error: rejected capture parameters, capture failure,
    /// analysis contract violation, or visualizer output failure.
    pub fn run(
        &mut self,
        source: &mut dyn AudioSource,
        visualizer: &mut dyn Visualizer,
    ) -> Result<SessionSummary> {
        let mut summary = SessionSummary::default();
        log::info!("Session : {} essais, source {}", self.trials, source.name());

        for trial in 1..=self.trials {
            if !self.wait_for_enter(trial)? {
                log::info!("Entrée fermée, fin de session après {} essais", trial - 1);
                break;
            }

            match self.run_trial(trial, source, visualizer) {
                Ok(average) => {
                    summary.completed += 1;
                    if let Some(avg) = average {
                        visualizer.show_average(&avg)?;
                        summary.averages.push(avg);
                    }
                }
                Err(e)
                    if e
                        .downcast_ref::<AnalysisError>()
                        .is_some_and(AnalysisError::is_recoverable) =>
                {
                    log::warn!("Essai {trial} ignoré : {e}");
                    summary.discarded += 1;
                }
                Err(e) => return Err(e.context(format!("Essai {trial} interrompu"))),
            }
        }

        summary.pending = self.aggregator.pending();
        log::info!(
            "Session terminée : {} essais, {} ignorés, {} moyennes",
            summary.completed,
            summary.discarded,
            summary.averages.len()
        );
        Ok(summary)
    }

    fn run_trial(
        &mut self,
        trial: usize,
        source: &mut dyn AudioSource,
        visualizer: &mut dyn Visualizer,
    ) -> Result<Option<AveragedResult>> {
        let request = CaptureRequest::new(self.duration_secs, self.sample_rate_hz)
            .context("Paramètres de capture rejetés")?;
        let recording = source
            .capture(&request)
            .with_context(|| format!("Capture impossible ({})", source.name()))?;
        log::info!(
            "Essai {trial}/{} : {} échantillons",
            self.trials,
            recording.samples().len()
        );

        let spectrum = self.transformer.transform(&recording)?;
        let clusters = self.clusterer.cluster(&spectrum)?;
        log::debug!(
            "Essai {trial} : bins classés {:?}",
            clusters.ranked_head(RANKED_HEAD)
        );
        visualizer.show_trial(trial, &request, &recording, &spectrum, &clusters)?;
        Ok(self.aggregator.accumulate(&clusters)?)
    }

    /// `false` once the prompt input is exhausted.
    fn wait_for_enter(&mut self, trial: usize) -> Result<bool> {
        let Some(input) = self.prompt.as_mut() else {
            return Ok(true);
        };
        eprint!(
            "Essai {trial}/{} : appuyez sur Entrée pour enregistrer... ",
            self.trials
        );
        std::io::stderr().flush()?;
        let mut line = String::new();
        Ok(input.read_line(&mut line)? > 0)
    }
}

use crate::model::{AveragedResult, ClusterSet, Recording, Spectrum};
use crate::request::CaptureRequest;

/// Fournit des enregistrements mono au pipeline.
///
/// Implémenté par : `MicrophoneSource`, `FileSource`, `ToneSource`.
///
/// # Example
/// ```
/// use ts_core::traits::AudioSource;
/// use ts_core::model::Recording;
/// use ts_core::request::CaptureRequest;
///
/// struct Silence;
/// impl AudioSource for Silence {
///     fn capture(&mut self, request: &CaptureRequest) -> anyhow::Result<Recording> {
///         Ok(Recording::new(
///             vec![0.0; request.sample_count()],
///             request.duration_secs(),
///             request.sample_rate_hz(),
///         ))
///     }
///     fn name(&self) -> &'static str { "silence" }
/// }
/// ```
pub trait AudioSource {
    /// Enregistre `request.duration_secs()` secondes.
    ///
    /// Bloque pendant toute la durée de la capture pour les sources live.
    /// Le périphérique est libéré avant le retour, même en cas d'erreur.
    ///
    /// # Errors
    /// Device, stream, or decode failures.
    fn capture(&mut self, request: &CaptureRequest) -> anyhow::Result<Recording>;

    /// Nom lisible pour les logs.
    fn name(&self) -> &'static str;
}

/// Affiche les résultats d'un essai et les moyennes.
///
/// # Example
/// ```
/// use ts_core::traits::Visualizer;
/// use ts_core::model::{AveragedResult, ClusterSet, Recording, Spectrum};
/// use ts_core::request::CaptureRequest;
///
/// struct Quiet;
/// impl Visualizer for Quiet {
///     fn show_trial(&mut self, _trial: usize, _request: &CaptureRequest, _rec: &Recording,
///                   _spectrum: &Spectrum, _clusters: &ClusterSet) -> anyhow::Result<()> { Ok(()) }
///     fn show_average(&mut self, _result: &AveragedResult) -> anyhow::Result<()> { Ok(()) }
/// }
/// ```
pub trait Visualizer {
    /// Per-trial display. `trial` is 1-based; `request` carries the
    /// corrections the validator applied.
    ///
    /// # Errors
    /// Output failures.
    fn show_trial(
        &mut self,
        trial: usize,
        request: &CaptureRequest,
        recording: &Recording,
        spectrum: &Spectrum,
        clusters: &ClusterSet,
    ) -> anyhow::Result<()>;

    /// Aggregate display, called each time a batch of trials completes.
    ///
    /// # Errors
    /// Output failures.
    fn show_average(&mut self, result: &AveragedResult) -> anyhow::Result<()>;
}

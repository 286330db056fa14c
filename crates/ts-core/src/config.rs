use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration complète d'une session d'essais.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use ts_core::config::SessionConfig;
/// let config = SessionConfig::default();
/// assert_eq!(config.flush_threshold, 5);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SessionConfig {
    // === Capture ===
    /// Durée demandée en secondes. Validée (pas clampée) avant chaque essai.
    pub duration_secs: f64,
    /// Taux d'échantillonnage demandé en Hz. Validé avant chaque essai.
    pub sample_rate_hz: f64,
    /// Input device name. None = default input device.
    pub device: Option<String>,

    // === Analyse ===
    /// Distance max (Hz) entre un bin et la référence de son groupe.
    pub tolerance_hz: f64,
    /// Number of clusters kept per trial.
    pub cluster_limit: usize,

    // === Agrégation ===
    /// Clusters entering the relative-energy vector.
    pub harmonics: usize,
    /// Trials buffered before the mean is emitted.
    pub flush_threshold: usize,

    // === Session ===
    /// Nombre d'essais.
    pub trials: usize,
    /// Attendre Entrée avant chaque enregistrement.
    pub prompt: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 2.0,
            sample_rate_hz: 48_000.0,
            device: None,
            tolerance_hz: 15.0,
            cluster_limit: 15,
            harmonics: 10,
            flush_threshold: 5,
            trials: 5,
            prompt: true,
        }
    }
}

impl SessionConfig {
    /// Clamp analysis and session fields to their valid ranges.
    /// Called after TOML deserialization and CLI overrides.
    ///
    /// Capture parameters are left alone: the request validator reports
    /// their corrections.
    pub fn clamp_all(&mut self) {
        if !self.tolerance_hz.is_finite() {
            self.tolerance_hz = Self::default().tolerance_hz;
        }
        self.tolerance_hz = self.tolerance_hz.clamp(0.0, 24_000.0);
        self.cluster_limit = self.cluster_limit.clamp(1, 1024);
        self.harmonics = self.harmonics.clamp(1, self.cluster_limit);
        self.flush_threshold = self.flush_threshold.clamp(1, 1000);
        self.trials = self.trials.clamp(1, 10_000);
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    capture: Option<CaptureSection>,
    analysis: Option<AnalysisSection>,
    aggregation: Option<AggregationSection>,
    session: Option<SessionSection>,
}

#[derive(Deserialize)]
struct CaptureSection {
    duration_secs: Option<f64>,
    sample_rate_hz: Option<f64>,
    device: Option<String>,
}

#[derive(Deserialize)]
struct AnalysisSection {
    tolerance_hz: Option<f64>,
    cluster_limit: Option<usize>,
}

#[derive(Deserialize)]
struct AggregationSection {
    harmonics: Option<usize>,
    flush_threshold: Option<usize>,
}

#[derive(Deserialize)]
struct SessionSection {
    trials: Option<usize>,
    prompt: Option<bool>,
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use ts_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<SessionConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content)
        .with_context(|| format!("Erreur de parsing TOML dans {}", path.display()))
}

/// Parse TOML content over the defaults.
///
/// # Errors
/// Returns an error if the content is not valid TOML for this schema.
pub fn parse_config(content: &str) -> Result<SessionConfig> {
    let file: ConfigFile = toml::from_str(content)?;
    let mut config = SessionConfig::default();

    if let Some(c) = file.capture {
        if let Some(v) = c.duration_secs {
            config.duration_secs = v;
        }
        if let Some(v) = c.sample_rate_hz {
            config.sample_rate_hz = v;
        }
        if c.device.is_some() {
            config.device = c.device;
        }
    }
    if let Some(a) = file.analysis {
        if let Some(v) = a.tolerance_hz {
            config.tolerance_hz = v;
        }
        if let Some(v) = a.cluster_limit {
            config.cluster_limit = v;
        }
    }
    if let Some(a) = file.aggregation {
        if let Some(v) = a.harmonics {
            config.harmonics = v;
        }
        if let Some(v) = a.flush_threshold {
            config.flush_threshold = v;
        }
    }
    if let Some(s) = file.session {
        if let Some(v) = s.trials {
            config.trials = v;
        }
        if let Some(v) = s.prompt {
            config.prompt = v;
        }
    }

    config.clamp_all();
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(parse_config("").unwrap(), SessionConfig::default());
    }

    #[test]
    fn partial_sections_override_defaults() {
        let config = parse_config(
            "[capture]\nduration_secs = 3\ndevice = \"Rode NT-USB\"\n\n[aggregation]\nflush_threshold = 3\n",
        )
        .unwrap();
        assert!((config.duration_secs - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.device.as_deref(), Some("Rode NT-USB"));
        assert_eq!(config.flush_threshold, 3);
        assert_eq!(config.harmonics, 10);
        assert!(config.prompt);
    }

    #[test]
    fn capture_values_are_not_clamped() {
        let config = parse_config("[capture]\nduration_secs = -30\nsample_rate_hz = 96000\n").unwrap();
        assert!((config.duration_secs + 30.0).abs() < f64::EPSILON);
        assert!((config.sample_rate_hz - 96_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn analysis_values_are_clamped() {
        let config = parse_config(
            "[analysis]\ntolerance_hz = -4.0\ncluster_limit = 0\n[aggregation]\nharmonics = 50\nflush_threshold = 0\n",
        )
        .unwrap();
        assert!(config.tolerance_hz.abs() < f64::EPSILON);
        assert_eq!(config.cluster_limit, 1);
        assert_eq!(config.harmonics, 1);
        assert_eq!(config.flush_threshold, 1);
    }

    #[test]
    fn unknown_type_is_an_error() {
        assert!(parse_config("[session]\ntrials = \"five\"\n").is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\ntrials = 8\nprompt = false").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.trials, 8);
        assert!(!config.prompt);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("absent.toml")).is_err());
    }
}

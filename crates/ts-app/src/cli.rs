use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use ts_core::config::SessionConfig;

/// timbrescope — spectre, harmoniques dominantes et timbre moyen sur plusieurs essais.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Source audio : "mic" pour microphone, ou chemin vers fichier audio.
    #[arg(long, conflicts_with = "tone")]
    pub input: Option<String>,

    /// Son synthétique : fréquence d'un partiel en Hz (répétable).
    #[arg(long, value_name = "HZ")]
    pub tone: Vec<f64>,

    /// Nom du périphérique d'entrée (voir --list-devices).
    #[arg(long)]
    pub device: Option<String>,

    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Durée de chaque enregistrement en secondes.
    #[arg(long, allow_hyphen_values = true)]
    pub duration: Option<f64>,

    /// Taux d'échantillonnage demandé en Hz.
    #[arg(long, allow_hyphen_values = true)]
    pub sample_rate: Option<f64>,

    /// Nombre d'essais.
    #[arg(long)]
    pub trials: Option<usize>,

    /// Tolérance de regroupement en Hz.
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Nombre maximal de clusters par essai.
    #[arg(long)]
    pub cluster_limit: Option<usize>,

    /// Harmoniques prises en compte dans la répartition d'énergie.
    #[arg(long)]
    pub harmonics: Option<usize>,

    /// Essais accumulés avant d'afficher la moyenne.
    #[arg(long)]
    pub flush_after: Option<usize>,

    /// Ne pas attendre Entrée avant chaque essai.
    #[arg(long, default_value_t = false)]
    pub no_prompt: bool,

    /// Format de sortie.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Lister les périphériques d'entrée et quitter.
    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Tableaux et histogrammes lisibles.
    Text,
    /// Un objet JSON par ligne.
    Json,
}

/// Where trial recordings come from.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceChoice {
    Microphone,
    File(PathBuf),
    Tone(Vec<f64>),
}

impl Cli {
    /// Resolve `--input` / `--tone` into a source. Microphone by default.
    #[must_use]
    pub fn source(&self) -> SourceChoice {
        if !self.tone.is_empty() {
            return SourceChoice::Tone(self.tone.clone());
        }
        match self.input.as_deref() {
            None | Some("default" | "mic" | "microphone") => SourceChoice::Microphone,
            Some(path) => SourceChoice::File(PathBuf::from(path)),
        }
    }

    /// Apply CLI values over the loaded configuration.
    ///
    /// Capture values are copied as given; they are validated per trial.
    pub fn apply_overrides(&self, config: &mut SessionConfig) {
        if let Some(v) = self.duration {
            config.duration_secs = v;
        }
        if let Some(v) = self.sample_rate {
            config.sample_rate_hz = v;
        }
        if self.device.is_some() {
            config.device.clone_from(&self.device);
        }
        if let Some(v) = self.trials {
            config.trials = v;
        }
        if let Some(v) = self.tolerance {
            config.tolerance_hz = v;
        }
        if let Some(v) = self.cluster_limit {
            config.cluster_limit = v;
        }
        if let Some(v) = self.harmonics {
            config.harmonics = v;
        }
        if let Some(v) = self.flush_after {
            config.flush_threshold = v;
        }
        if self.no_prompt {
            config.prompt = false;
        }
    }
}

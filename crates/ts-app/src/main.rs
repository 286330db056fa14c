use anyhow::{Context, Result};
use clap::Parser;
use ts_audio::{FileSource, MicrophoneSource, Partial, ToneSource};
use ts_core::config::SessionConfig;
use ts_core::traits::{AudioSource, Visualizer};

pub mod cli;
pub mod report;
pub mod session;

fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    // 3. Lister les périphériques et quitter
    if cli.list_devices {
        let devices = ts_audio::list_input_devices()?;
        if devices.is_empty() {
            println!("Aucun périphérique d'entrée.");
        }
        for name in devices {
            println!("{name}");
        }
        return Ok(());
    }

    // 4. Charger la config puis appliquer les overrides CLI
    let mut config = resolve_config(&cli)?;
    cli.apply_overrides(&mut config);
    config.clamp_all();

    // 5. Ouvrir la source audio
    let mut source = open_source(&cli, &config)?;

    // 6. Choisir la sortie
    let mut visualizer: Box<dyn Visualizer> = match cli.format {
        cli::OutputFormat::Text => Box::new(report::TextReport::new(std::io::stdout())),
        cli::OutputFormat::Json => Box::new(report::JsonReport::new(std::io::stdout())),
    };

    // 7. Boucle d'essais
    let mut session = session::Session::new(&config);
    if config.prompt {
        session = session.with_prompt(Box::new(std::io::stdin().lock()));
    }
    let summary = session.run(source.as_mut(), visualizer.as_mut())?;

    if summary.pending > 0 {
        log::warn!(
            "{} essais en attente non moyennés (seuil {})",
            summary.pending,
            config.flush_threshold
        );
    }
    Ok(())
}

/// Build the audio source selected on the command line.
fn open_source(cli: &cli::Cli, config: &SessionConfig) -> Result<Box<dyn AudioSource>> {
    match cli.source() {
        cli::SourceChoice::Microphone => {
            log::info!("Capture microphone");
            Ok(Box::new(MicrophoneSource::new(config.device.clone())))
        }
        cli::SourceChoice::File(path) => {
            if !path.exists() {
                anyhow::bail!("Audio source not found: {}", path.display());
            }
            log::info!("Analyse du fichier {}", path.display());
            let source = FileSource::open(&path)
                .with_context(|| format!("Lecture impossible : {}", path.display()))?;
            Ok(Box::new(source))
        }
        cli::SourceChoice::Tone(freqs) => {
            log::info!("Son synthétique : {freqs:?} Hz");
            let partials = freqs
                .into_iter()
                .map(|frequency_hz| Partial {
                    frequency_hz,
                    amplitude: 1.0,
                })
                .collect();
            Ok(Box::new(ToneSource::new(partials)))
        }
    }
}

/// Load --config, falling back to defaults when the file is missing.
fn resolve_config(cli: &cli::Cli) -> Result<SessionConfig> {
    if cli.config.exists() {
        ts_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli_with_config(path: &std::path::Path) -> cli::Cli {
        let path = path.to_string_lossy().into_owned();
        cli::Cli::try_parse_from(["timbrescope", "--config", path.as_str()]).unwrap()
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[aggregation]\nflush_threshold = 3\n[session]\ntrials = 9").unwrap();
        let config = resolve_config(&cli_with_config(file.path())).unwrap();
        assert_eq!(config.flush_threshold, 3);
        assert_eq!(config.trials, 9);
        assert_eq!(config.cluster_limit, 15);
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = resolve_config(&cli_with_config(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn broken_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\ntrials = \"many\"").unwrap();
        assert!(resolve_config(&cli_with_config(file.path())).is_err());
    }

    #[test]
    fn cli_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[session]\ntrials = 9\nprompt = true").unwrap();
        let path = file.path().to_string_lossy().into_owned();
        let cli = cli::Cli::try_parse_from([
            "timbrescope",
            "--config",
            path.as_str(),
            "--trials",
            "2",
            "--no-prompt",
        ])
        .unwrap();
        let mut config = resolve_config(&cli).unwrap();
        cli.apply_overrides(&mut config);
        assert_eq!(config.trials, 2);
        assert!(!config.prompt);
    }

    #[test]
    fn tone_source_is_built_from_cli() {
        let cli = cli::Cli::try_parse_from(["timbrescope", "--tone", "220", "--tone", "330"]).unwrap();
        let source = open_source(&cli, &SessionConfig::default()).unwrap();
        assert_eq!(source.name(), "tone");
    }

    #[test]
    fn missing_input_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.wav").to_string_lossy().into_owned();
        let cli = cli::Cli::try_parse_from(["timbrescope", "--input", path.as_str()]).unwrap();
        assert!(open_source(&cli, &SessionConfig::default()).is_err());
    }
}

//! Runtime configuration for the CLI

use crate::Cli;
use cinesense_classifiers::{AssetSource, RuntimeConfig};
use std::path::Path;

/// Picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG: &str = "cinesense.yaml";

/// Load configuration from file and CLI overrides
pub fn load(cli: &Cli) -> anyhow::Result<RuntimeConfig> {
    let mut config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => RuntimeConfig::from_file(DEFAULT_CONFIG)?,
        None => RuntimeConfig::default(),
    };

    apply_overrides(&mut config, cli);
    Ok(config)
}

fn apply_overrides(config: &mut RuntimeConfig, cli: &Cli) {
    if let Some(dir) = &cli.assets {
        config.assets.source = AssetSource::Local { dir: dir.clone() };
    }

    if let Some(repo) = &cli.hf_repo {
        config.assets.source = AssetSource::HuggingFace {
            repo: repo.clone(),
            revision: cli.hf_revision.clone(),
        };
    }

    if let Some(lexicon) = &cli.lexicon {
        config.lexicon_path = Some(lexicon.clone());
    }

    if cli.keyword_only {
        config.disable_neural = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_without_file() {
        let cli = Cli::parse_from(["cinesense", "detect"]);
        let config = load(&cli).unwrap();
        assert_eq!(config.confidence_gate, 0.6);
        assert!(!config.disable_neural);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let cli = Cli::parse_from(["cinesense", "--config", "/nonexistent/cinesense.yaml", "detect"]);
        assert!(load(&cli).is_err());
    }

    #[test]
    fn test_file_then_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.yaml");
        std::fs::write(
            &path,
            "confidence_gate: 0.7\nassets:\n  source:\n    type: huggingface\n    repo: acme/reviews\n",
        )
        .unwrap();

        let cli = Cli::parse_from([
            "cinesense",
            "--config",
            path.to_str().unwrap(),
            "--assets",
            "/srv/models",
            "--keyword-only",
            "detect",
        ]);
        let config = load(&cli).unwrap();

        assert_eq!(config.confidence_gate, 0.7);
        assert!(config.disable_neural);
        match config.assets.source {
            AssetSource::Local { dir } => assert_eq!(dir, PathBuf::from("/srv/models")),
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_hf_override() {
        let cli = Cli::parse_from([
            "cinesense",
            "--hf-repo",
            "acme/reviews",
            "--hf-revision",
            "v2",
            "detect",
        ]);
        let config = load(&cli).unwrap();
        match config.assets.source {
            AssetSource::HuggingFace { repo, revision } => {
                assert_eq!(repo, "acme/reviews");
                assert_eq!(revision, "v2");
            }
            other => panic!("unexpected source {other:?}"),
        }
    }
}

//! Runtime configuration for the sentiment orchestrator

use cinesense_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the whole sentiment runtime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Where the neural model assets live
    #[serde(default)]
    pub assets: AssetConfig,

    /// Optional keyword lexicon JSON; the built-in lexicon is used when absent
    #[serde(default)]
    pub lexicon_path: Option<PathBuf>,

    /// Minimum confidence (exclusive) for accepting a non-terminal backend result
    #[serde(default = "default_confidence_gate")]
    pub confidence_gate: f64,

    /// Result cache bound; 0 keeps every distinct input
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Pin individual capability flags instead of probing
    #[serde(default)]
    pub hardware: HardwareOverrides,

    /// Skip both neural backends
    #[serde(default)]
    pub disable_neural: bool,
}

/// Asset location and file names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    #[serde(default)]
    pub source: AssetSource,

    /// Integration config file name inside the source
    #[serde(default = "default_integration_config")]
    pub integration_config: String,

    /// Vocabulary file name inside the source
    #[serde(default = "default_vocabulary")]
    pub vocabulary: String,
}

/// Asset source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssetSource {
    /// Directory on the local filesystem
    Local { dir: PathBuf },

    /// Model repository on the Hugging Face Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

/// Per-flag capability overrides; `None` means "probe the environment"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareOverrides {
    #[serde(default)]
    pub gpu: Option<bool>,
    #[serde(default)]
    pub neural_accelerator: Option<bool>,
    #[serde(default)]
    pub vector_optimization: Option<bool>,
    #[serde(default)]
    pub accelerated_runtime: Option<bool>,
    #[serde(default)]
    pub distribution_service: Option<bool>,
}

impl HardwareOverrides {
    /// True when no flag is pinned
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn default_confidence_gate() -> f64 {
    0.6
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_integration_config() -> String {
    "integration_config.json".to_string()
}

fn default_vocabulary() -> String {
    "vocab.json".to_string()
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("./models/sentiment")
}

impl Default for AssetSource {
    fn default() -> Self {
        Self::Local {
            dir: default_models_dir(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            source: AssetSource::default(),
            integration_config: default_integration_config(),
            vocabulary: default_vocabulary(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            assets: AssetConfig::default(),
            lexicon_path: None,
            confidence_gate: default_confidence_gate(),
            cache_capacity: default_cache_capacity(),
            hardware: HardwareOverrides::default(),
            disable_neural: false,
        }
    }
}

impl RuntimeConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid runtime config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "failed to read runtime config {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Point the runtime at a local asset directory
    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets.source = AssetSource::Local { dir: dir.into() };
        self
    }

    /// Use a custom keyword lexicon
    pub fn with_lexicon(mut self, path: impl Into<PathBuf>) -> Self {
        self.lexicon_path = Some(path.into());
        self
    }

    /// Pin capability flags
    pub fn with_hardware(mut self, overrides: HardwareOverrides) -> Self {
        self.hardware = overrides;
        self
    }

    /// Run with the keyword backend only
    pub fn keyword_only(mut self) -> Self {
        self.disable_neural = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_gate) {
            return Err(Error::config(format!(
                "confidence_gate must be within [0, 1], got {}",
                self.confidence_gate
            )));
        }
        Ok(())
    }
}

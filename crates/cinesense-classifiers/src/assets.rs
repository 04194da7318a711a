//! Model asset loading: integration config, vocabulary, and model weights

use crate::config::{AssetConfig, AssetSource};
use cinesense_core::{Error, Result, SentimentLabel};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

/// Integration config shipped next to the model
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    /// Weights file name, relative to the asset source
    #[serde(default = "default_model_file")]
    pub model_file: String,

    #[serde(default)]
    pub input_config: InputConfig,

    #[serde(default)]
    pub output_config: OutputConfig,

    #[serde(default)]
    pub performance: PerformanceConfig,

    /// Encoder hyper-parameters (BERT `config.json` layout)
    #[serde(default)]
    pub architecture: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputConfig {
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessingConfig {
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_true")]
    pub remove_punctuation: bool,
    /// Sequence length including `[CLS]` and `[SEP]`
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    #[serde(default)]
    pub output_shape: Vec<usize>,
    #[serde(default = "default_class_labels")]
    pub class_labels: Vec<String>,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceConfig {
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    /// GPU delegate
    #[serde(default = "default_true")]
    pub use_accelerator_a: bool,
    /// Neural-accelerator delegate
    #[serde(default = "default_true")]
    pub use_accelerator_b: bool,
}

fn default_model_file() -> String {
    "model.safetensors".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_length() -> usize {
    128
}
fn default_class_labels() -> Vec<String> {
    vec![
        "negative".to_string(),
        "neutral".to_string(),
        "positive".to_string(),
    ]
}
fn default_confidence_threshold() -> f64 {
    0.6
}
fn default_num_threads() -> usize {
    4
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            remove_punctuation: true,
            max_length: default_max_length(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_shape: Vec::new(),
            class_labels: default_class_labels(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            num_threads: default_num_threads(),
            use_accelerator_a: true,
            use_accelerator_b: true,
        }
    }
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            model_file: default_model_file(),
            input_config: InputConfig::default(),
            output_config: OutputConfig::default(),
            performance: PerformanceConfig::default(),
            architecture: None,
        }
    }
}

impl IntegrationConfig {
    /// Parse and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of classes the model emits
    pub fn num_labels(&self) -> usize {
        self.output_config.class_labels.len()
    }

    /// Class labels resolved to sentiment labels, in logit order
    pub fn label_order(&self) -> Result<Vec<SentimentLabel>> {
        self.output_config
            .class_labels
            .iter()
            .map(|label| {
                SentimentLabel::from_class_label(label)
                    .ok_or_else(|| Error::config(format!("unknown class label '{label}'")))
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let max_length = self.input_config.preprocessing.max_length;
        if max_length < 3 {
            return Err(Error::config(format!(
                "maxLength must leave room for [CLS], [SEP] and one token, got {max_length}"
            )));
        }
        if self.output_config.class_labels.is_empty() {
            return Err(Error::config("classLabels must not be empty"));
        }
        self.label_order()?;
        if let Some(&last) = self.output_config.output_shape.last() {
            if last != self.num_labels() {
                return Err(Error::config(format!(
                    "outputShape {:?} does not match {} class labels",
                    self.output_config.output_shape,
                    self.num_labels()
                )));
            }
        }
        let threshold = self.output_config.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config(format!(
                "confidenceThreshold must be within [0, 1], got {threshold}"
            )));
        }
        Ok(())
    }
}

/// Token to id table with the four required special tokens
#[derive(Debug, Clone)]
pub struct Vocabulary {
    ids: HashMap<String, u32>,
    pub pad_id: u32,
    pub unk_id: u32,
    pub cls_id: u32,
    pub sep_id: u32,
}

impl Vocabulary {
    /// Parse a JSON object of `token -> id`
    pub fn from_json(json: &str) -> Result<Self> {
        let ids: HashMap<String, u32> = serde_json::from_str(json)?;
        Self::from_map(ids)
    }

    pub fn from_map(ids: HashMap<String, u32>) -> Result<Self> {
        let special = |token: &str| {
            ids.get(token)
                .copied()
                .ok_or_else(|| Error::asset(format!("vocabulary is missing {token}")))
        };

        Ok(Self {
            pad_id: special(PAD_TOKEN)?,
            unk_id: special(UNK_TOKEN)?,
            cls_id: special(CLS_TOKEN)?,
            sep_id: special(SEP_TOKEN)?,
            ids,
        })
    }

    /// Id for `token`, or the unknown id
    pub fn id(&self, token: &str) -> u32 {
        self.ids.get(token).copied().unwrap_or(self.unk_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Everything a neural backend loads once at initialization
#[derive(Debug, Clone)]
pub struct ModelAssets {
    pub integration: IntegrationConfig,
    pub vocabulary: Vocabulary,
    /// Weights file, memory-mapped by the engine loader
    pub model_path: PathBuf,
}

impl ModelAssets {
    /// Load integration config, vocabulary, and model, in that order, failing on the first error
    pub fn load(config: &AssetConfig) -> Result<Self> {
        let locator = AssetLocator::new(config.source.clone());

        let integration_path = locator.resolve(&config.integration_config)?;
        let integration = IntegrationConfig::from_json(&read_asset(&integration_path)?)?;

        let vocabulary_path = locator.resolve(&config.vocabulary)?;
        let vocabulary = Vocabulary::from_json(&read_asset(&vocabulary_path)?)?;

        let model_path = locator.resolve(&integration.model_file)?;
        let metadata = std::fs::metadata(&model_path).map_err(|e| {
            Error::asset(format!("model file {} unavailable: {e}", model_path.display()))
        })?;
        if metadata.len() == 0 {
            return Err(Error::asset(format!(
                "model file {} is empty",
                model_path.display()
            )));
        }

        tracing::info!(
            model = %model_path.display(),
            vocab_size = vocabulary.len(),
            labels = ?integration.output_config.class_labels,
            "Model assets loaded"
        );

        Ok(Self {
            integration,
            vocabulary,
            model_path,
        })
    }
}

fn read_asset(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::asset(format!("failed to read {}: {e}", path.display())))
}

/// Resolves asset file names against a source
pub struct AssetLocator {
    source: AssetSource,
}

impl AssetLocator {
    pub fn new(source: AssetSource) -> Self {
        Self { source }
    }

    /// Local path of `file`, downloading it first for hub sources
    pub fn resolve(&self, file: &str) -> Result<PathBuf> {
        match &self.source {
            AssetSource::Local { dir } => {
                let path = dir.join(file);
                if !path.exists() {
                    return Err(Error::asset(format!(
                        "asset not found: {}",
                        path.display()
                    )));
                }
                Ok(path)
            }
            AssetSource::HuggingFace { repo, revision } => {
                tracing::debug!("Fetching {} from {} @ {}", file, repo, revision);

                let api = Api::new()
                    .map_err(|e| Error::asset(format!("Failed to initialize HF API: {e}")))?;
                let repo = api.repo(Repo::with_revision(
                    repo.clone(),
                    RepoType::Model,
                    revision.clone(),
                ));

                repo.get(file)
                    .map_err(|e| Error::asset(format!("Failed to download {file}: {e}")))
            }
        }
    }
}

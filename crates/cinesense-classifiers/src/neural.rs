//! Transformer-backed sentiment backend
//!
//! Two variants share the same pre- and post-processing and differ only in
//! how the execution context is built: the accelerated variant asks for a
//! GPU or neural-accelerator device and drops to CPU execution if that
//! fails, the CPU variant always runs on the host CPU.

use crate::assets::{IntegrationConfig, ModelAssets, PreprocessingConfig, Vocabulary};
use crate::config::AssetConfig;
use crate::engine::{
    CandleEngineLoader, EngineLoader, ExecutionOptions, ExecutionTarget, InferenceEngine,
};
use crate::hardware::HardwareCapabilities;
use cinesense_core::{Error, Result, SentimentLabel, SentimentResult};
use parking_lot::RwLock;
use regex::Regex;
use std::sync::Arc;
use std::time::Instant;

/// Which execution context a backend builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeuralVariant {
    Accelerated,
    CpuOnly,
}

impl NeuralVariant {
    /// Tag used in diagnostic terms and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accelerated => "accelerated",
            Self::CpuOnly => "cpu",
        }
    }
}

/// Model input for one text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Text normalization and word-level encoding
struct Preprocessor {
    settings: PreprocessingConfig,
    punctuation: Regex,
}

impl Preprocessor {
    fn new(settings: PreprocessingConfig) -> Result<Self> {
        let punctuation = Regex::new(r"[^\p{L}\p{N}\s]")
            .map_err(|e| Error::internal(format!("invalid punctuation pattern: {e}")))?;
        Ok(Self {
            settings,
            punctuation,
        })
    }

    /// Optional lowercase, optional punctuation strip, truncate to `max_length` characters
    fn normalize(&self, text: &str) -> String {
        let mut text = if self.settings.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };
        if self.settings.remove_punctuation {
            text = self.punctuation.replace_all(&text, "").into_owned();
        }
        text.chars().take(self.settings.max_length).collect()
    }

    /// `[CLS] w1 .. wn [SEP]` padded to `max_length`, with `n <= max_length - 2`
    fn encode(&self, normalized: &str, vocab: &Vocabulary) -> EncodedInput {
        let max_length = self.settings.max_length;
        let mut input_ids = Vec::with_capacity(max_length);
        input_ids.push(vocab.cls_id);
        input_ids.extend(
            normalized
                .split_whitespace()
                .take(max_length.saturating_sub(2))
                .map(|word| vocab.id(word)),
        );
        input_ids.push(vocab.sep_id);

        let real = input_ids.len();
        let mut attention_mask = vec![1u32; real];
        input_ids.resize(max_length, vocab.pad_id);
        attention_mask.resize(max_length, 0);

        EncodedInput {
            input_ids,
            attention_mask,
        }
    }
}

/// Everything an initialized backend holds
struct LoadedContext {
    integration: IntegrationConfig,
    vocabulary: Vocabulary,
    labels: Vec<SentimentLabel>,
    preprocessor: Preprocessor,
    engine: Box<dyn InferenceEngine>,
    options: ExecutionOptions,
}

impl LoadedContext {
    fn build(assets: ModelAssets, engine: Box<dyn InferenceEngine>, options: ExecutionOptions) -> Result<Self> {
        let labels = assets.integration.label_order()?;
        let preprocessor = Preprocessor::new(assets.integration.input_config.preprocessing.clone())?;
        Ok(Self {
            integration: assets.integration,
            vocabulary: assets.vocabulary,
            labels,
            preprocessor,
            engine,
            options,
        })
    }
}

/// Neural sentiment backend (accelerated or CPU-only)
pub struct NeuralInferenceBackend {
    variant: NeuralVariant,
    assets: AssetConfig,
    capabilities: HardwareCapabilities,
    loader: Arc<dyn EngineLoader>,
    context: RwLock<Option<Arc<LoadedContext>>>,
}

impl NeuralInferenceBackend {
    /// Backend that will load from `assets` with the Candle engine
    pub fn new(variant: NeuralVariant, assets: AssetConfig, capabilities: HardwareCapabilities) -> Self {
        Self::with_loader(variant, assets, capabilities, Arc::new(CandleEngineLoader))
    }

    /// Backend with a custom engine loader
    pub fn with_loader(
        variant: NeuralVariant,
        assets: AssetConfig,
        capabilities: HardwareCapabilities,
        loader: Arc<dyn EngineLoader>,
    ) -> Self {
        Self {
            variant,
            assets,
            capabilities,
            loader,
            context: RwLock::new(None),
        }
    }

    pub fn variant(&self) -> NeuralVariant {
        self.variant
    }

    pub fn is_ready(&self) -> bool {
        self.context.read().is_some()
    }

    /// Execution target of the live context, if initialized
    pub fn execution_target(&self) -> Option<ExecutionTarget> {
        self.context.read().as_ref().map(|ctx| ctx.options.target)
    }

    /// Load assets and build the execution context.
    ///
    /// Idempotent: returns immediately once ready.
    pub fn initialize(&self) -> Result<()> {
        let mut slot = self.context.write();
        if slot.is_some() {
            return Ok(());
        }

        let assets = ModelAssets::load(&self.assets)?;
        let (engine, options) = self.build_engine(&assets)?;
        let context = LoadedContext::build(assets, engine, options)?;

        tracing::info!(
            backend = self.variant.as_str(),
            device = %options.target,
            threads = options.num_threads,
            "Neural backend ready"
        );
        *slot = Some(Arc::new(context));
        Ok(())
    }

    /// `initialize` reporting success as a flag
    pub fn initialize_ready(&self) -> bool {
        match self.initialize() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(backend = self.variant.as_str(), "Initialization failed: {}", e);
                false
            }
        }
    }

    fn cpu_options(&self, integration: &IntegrationConfig) -> ExecutionOptions {
        ExecutionOptions::cpu(
            integration.performance.num_threads,
            self.capabilities.vector_optimization,
        )
    }

    fn accelerated_target(&self, integration: &IntegrationConfig) -> Option<ExecutionTarget> {
        let performance = &integration.performance;
        if self.capabilities.gpu && performance.use_accelerator_a {
            Some(ExecutionTarget::Cuda(0))
        } else if self.capabilities.neural_accelerator && performance.use_accelerator_b {
            Some(ExecutionTarget::Metal(0))
        } else {
            None
        }
    }

    fn build_engine(&self, assets: &ModelAssets) -> Result<(Box<dyn InferenceEngine>, ExecutionOptions)> {
        let cpu = self.cpu_options(&assets.integration);

        if self.variant == NeuralVariant::CpuOnly {
            let engine = self.loader.load(assets, &cpu)?;
            return Ok((engine, cpu));
        }

        match self.accelerated_target(&assets.integration) {
            Some(target) => {
                let options = ExecutionOptions {
                    target,
                    accelerator_delegate: true,
                    ..cpu
                };
                match self.loader.load(assets, &options) {
                    Ok(engine) => return Ok((engine, options)),
                    Err(e) => tracing::warn!(
                        device = %target,
                        "Accelerated context unavailable, building CPU context: {}",
                        e
                    ),
                }
            }
            None => tracing::warn!("No accelerator delegate enabled, building CPU context"),
        }

        let engine = self.loader.load(assets, &cpu)?;
        Ok((engine, cpu))
    }

    /// Release the execution context and mapped weights. Safe to call repeatedly.
    pub fn cleanup(&self) {
        if self.context.write().take().is_some() {
            tracing::info!(backend = self.variant.as_str(), "Neural backend released");
        }
    }

    /// Classify `text`, reporting failures as `Err`
    pub fn try_analyze(&self, text: &str) -> Result<SentimentResult> {
        let context = self
            .context
            .read()
            .clone()
            .ok_or_else(|| Error::initialization("model not initialized"))?;

        if text.trim().is_empty() {
            return Ok(SentimentResult::neutral());
        }

        let start = Instant::now();
        let result = self
            .infer(&context, text)
            .map_err(|e| match e {
                Error::Inference(_) => e,
                other => Error::inference(other.to_string()),
            })?;
        Ok(result.with_processing_time(start.elapsed().as_millis() as u64))
    }

    /// Classify `text`. Failures become error results.
    pub fn analyze(&self, text: &str) -> SentimentResult {
        match self.try_analyze(text) {
            Ok(result) => result,
            Err(Error::Initialization(msg)) => SentimentResult::error(msg),
            Err(e) => SentimentResult::error(e.to_string()),
        }
    }

    fn infer(&self, context: &LoadedContext, text: &str) -> Result<SentimentResult> {
        let normalized = context.preprocessor.normalize(text);
        let encoded = context.preprocessor.encode(&normalized, &context.vocabulary);

        let logits = context
            .engine
            .forward(&encoded.input_ids, &encoded.attention_mask)?;
        if logits.len() != context.labels.len() {
            return Err(Error::inference(format!(
                "expected {} logits, model returned {}",
                context.labels.len(),
                logits.len()
            )));
        }
        if logits.iter().any(|l| !l.is_finite()) {
            return Err(Error::inference("model returned non-finite logits"));
        }

        let probabilities = softmax(&logits);
        let (best, probability) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| Error::inference("empty probability vector"))?;

        let tag = self.variant.as_str();
        let threshold = context.integration.output_config.confidence_threshold;
        if probability >= threshold {
            let label = context.labels[best];
            tracing::debug!(backend = tag, %label, probability, "Neural classification");
            Ok(SentimentResult::labeled(
                label,
                probability,
                vec![format!("{tag}:{label}")],
            ))
        } else {
            tracing::debug!(backend = tag, probability, threshold, "Neural result below threshold");
            Ok(SentimentResult::neutral_with(
                probability,
                vec![format!("{tag}:low_confidence")],
            ))
        }
    }
}

impl Drop for NeuralInferenceBackend {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssetSource;
    use crate::hardware::ProbeFlags;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    const VOCAB: &str = r#"{"[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3, "great": 4, "film": 5}"#;

    struct FixedEngine {
        logits: Vec<f32>,
        target: ExecutionTarget,
        seen: Mutex<Vec<Vec<u32>>>,
    }

    impl InferenceEngine for FixedEngine {
        fn forward(&self, input_ids: &[u32], _attention_mask: &[u32]) -> Result<Vec<f32>> {
            self.seen.lock().push(input_ids.to_vec());
            Ok(self.logits.clone())
        }

        fn target(&self) -> ExecutionTarget {
            self.target
        }
    }

    /// Loader that refuses accelerated targets and records every request
    struct ScriptedLoader {
        logits: Vec<f32>,
        accept_accelerated: bool,
        requests: Mutex<Vec<ExecutionTarget>>,
    }

    impl ScriptedLoader {
        fn new(logits: Vec<f32>, accept_accelerated: bool) -> Self {
            Self {
                logits,
                accept_accelerated,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl EngineLoader for ScriptedLoader {
        fn load(&self, _assets: &ModelAssets, options: &ExecutionOptions) -> Result<Box<dyn InferenceEngine>> {
            self.requests.lock().push(options.target);
            if options.target.is_accelerated() && !self.accept_accelerated {
                return Err(Error::initialization("no device"));
            }
            Ok(Box::new(FixedEngine {
                logits: self.logits.clone(),
                target: options.target,
                seen: Mutex::new(Vec::new()),
            }))
        }
    }

    fn asset_dir(integration: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("integration_config.json"), integration).unwrap();
        std::fs::write(dir.path().join("vocab.json"), VOCAB).unwrap();
        std::fs::write(dir.path().join("model.safetensors"), b"weights").unwrap();
        dir
    }

    fn asset_config(dir: &tempfile::TempDir) -> AssetConfig {
        AssetConfig {
            source: AssetSource::Local {
                dir: dir.path().to_path_buf(),
            },
            ..Default::default()
        }
    }

    fn gpu_caps() -> HardwareCapabilities {
        HardwareCapabilities::from_flags(ProbeFlags {
            gpu: true,
            ..Default::default()
        })
    }

    fn backend(
        variant: NeuralVariant,
        dir: &tempfile::TempDir,
        loader: Arc<ScriptedLoader>,
    ) -> NeuralInferenceBackend {
        NeuralInferenceBackend::with_loader(variant, asset_config(dir), gpu_caps(), loader)
    }

    fn vocab() -> Vocabulary {
        Vocabulary::from_json(VOCAB).unwrap()
    }

    #[test]
    fn test_softmax_uniform() {
        let probs = softmax(&[1.0, 1.0, 1.0]);
        assert_eq!(probs.len(), 3);
        for p in &probs {
            assert!((p - 1.0 / 3.0).abs() < 1e-9);
        }
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1001.0, 999.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(probs[1] > probs[0] && probs[0] > probs[2]);
    }

    #[test]
    fn test_normalize_and_encode() {
        let pre = Preprocessor::new(PreprocessingConfig {
            lowercase: true,
            remove_punctuation: true,
            max_length: 6,
        })
        .unwrap();

        let normalized = pre.normalize("GREAT film!!");
        assert_eq!(normalized, "great film");

        let encoded = pre.encode(&normalized, &vocab());
        assert_eq!(encoded.input_ids, vec![2, 4, 5, 3, 0, 0]);
        assert_eq!(encoded.attention_mask, vec![1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_encode_truncates_content_tokens() {
        let pre = Preprocessor::new(PreprocessingConfig {
            lowercase: true,
            remove_punctuation: false,
            max_length: 4,
        })
        .unwrap();

        let encoded = pre.encode("great film great", &vocab());
        assert_eq!(encoded.input_ids, vec![2, 4, 5, 3]);
        assert_eq!(encoded.attention_mask, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let pre = Preprocessor::new(PreprocessingConfig::default()).unwrap();
        let encoded = pre.encode("zzz", &vocab());
        assert_eq!(&encoded.input_ids[..3], &[2, 1, 3]);
        assert_eq!(encoded.input_ids.len(), 128);
    }

    #[test]
    fn test_uninitialized_returns_error() {
        let dir = asset_dir("{}");
        let backend = backend(
            NeuralVariant::CpuOnly,
            &dir,
            Arc::new(ScriptedLoader::new(vec![0.0, 0.0, 5.0], true)),
        );

        let result = backend.analyze("great");
        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("model not initialized"));
    }

    #[test]
    fn test_confident_prediction() {
        let dir = asset_dir("{}");
        let backend = backend(
            NeuralVariant::CpuOnly,
            &dir,
            Arc::new(ScriptedLoader::new(vec![0.0, 0.0, 5.0], true)),
        );
        backend.initialize().unwrap();

        let result = backend.analyze("Great film!");
        assert!(result.is_success());
        assert_eq!(result.label(), SentimentLabel::Positive);
        assert!(result.confidence() > 0.98);
        assert_eq!(result.matched_terms(), &["cpu:positive".to_string()]);
        assert!(result.processing_time_ms().is_some());
    }

    #[test]
    fn test_low_confidence_degrades_to_neutral() {
        let dir = asset_dir("{}");
        let backend = backend(
            NeuralVariant::CpuOnly,
            &dir,
            Arc::new(ScriptedLoader::new(vec![1.0, 1.0, 1.0], true)),
        );
        backend.initialize().unwrap();

        let result = backend.analyze("great");
        assert!(result.is_success());
        assert_eq!(result.label(), SentimentLabel::Neutral);
        assert!((result.confidence() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.matched_terms(), &["cpu:low_confidence".to_string()]);
    }

    #[test]
    fn test_custom_label_order_and_threshold() {
        let dir = asset_dir(
            r#"{"outputConfig": {"classLabels": ["positive", "negative"], "confidenceThreshold": 0.9}}"#,
        );
        let backend = backend(
            NeuralVariant::CpuOnly,
            &dir,
            Arc::new(ScriptedLoader::new(vec![0.0, 3.0], true)),
        );
        backend.initialize().unwrap();

        let result = backend.analyze("terrible");
        assert_eq!(result.label(), SentimentLabel::Negative);
        assert!(result.confidence() >= 0.9);
    }

    #[test]
    fn test_blank_input_skips_inference() {
        let dir = asset_dir("{}");
        let backend = backend(
            NeuralVariant::CpuOnly,
            &dir,
            Arc::new(ScriptedLoader::new(vec![5.0, 0.0, 0.0], true)),
        );
        backend.initialize().unwrap();

        let result = backend.analyze("   ");
        assert_eq!(result.label(), SentimentLabel::Neutral);
        assert_eq!(result.confidence(), cinesense_core::DEFAULT_NEUTRAL_CONFIDENCE);
    }

    #[test]
    fn test_wrong_logit_count_is_inference_error() {
        let dir = asset_dir("{}");
        let backend = backend(
            NeuralVariant::CpuOnly,
            &dir,
            Arc::new(ScriptedLoader::new(vec![1.0, 2.0], true)),
        );
        backend.initialize().unwrap();

        let result = backend.analyze("great");
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().starts_with("inference failed:"));
        // Still initialized after a failed call
        assert!(backend.is_ready());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = asset_dir("{}");
        let loader = Arc::new(ScriptedLoader::new(vec![0.0, 0.0, 1.0], true));
        let backend = backend(NeuralVariant::CpuOnly, &dir, loader.clone());

        backend.initialize().unwrap();
        backend.initialize().unwrap();
        assert_eq!(loader.requests.lock().len(), 1);
    }

    #[test]
    fn test_missing_assets_fail_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let backend = NeuralInferenceBackend::with_loader(
            NeuralVariant::Accelerated,
            AssetConfig {
                source: AssetSource::Local {
                    dir: dir.path().to_path_buf(),
                },
                ..Default::default()
            },
            gpu_caps(),
            Arc::new(ScriptedLoader::new(vec![0.0; 3], true)),
        );

        assert!(!backend.initialize_ready());
        assert!(!backend.is_ready());
    }

    #[test]
    fn test_accelerated_uses_gpu_when_available() {
        let dir = asset_dir("{}");
        let loader = Arc::new(ScriptedLoader::new(vec![0.0, 0.0, 4.0], true));
        let backend = backend(NeuralVariant::Accelerated, &dir, loader.clone());

        backend.initialize().unwrap();
        assert_eq!(backend.execution_target(), Some(ExecutionTarget::Cuda(0)));
        assert_eq!(
            backend.analyze("great").matched_terms(),
            &["accelerated:positive".to_string()]
        );
    }

    #[test]
    fn test_accelerated_falls_back_to_cpu_context() {
        let dir = asset_dir("{}");
        let loader = Arc::new(ScriptedLoader::new(vec![0.0, 0.0, 4.0], false));
        let backend = backend(NeuralVariant::Accelerated, &dir, loader.clone());

        backend.initialize().unwrap();
        assert!(backend.is_ready());
        assert_eq!(backend.execution_target(), Some(ExecutionTarget::Cpu));
        assert_eq!(
            *loader.requests.lock(),
            vec![ExecutionTarget::Cuda(0), ExecutionTarget::Cpu]
        );
    }

    #[test]
    fn test_accelerator_flags_respect_config() {
        let dir = asset_dir(r#"{"performance": {"useAcceleratorA": false}}"#);
        let loader = Arc::new(ScriptedLoader::new(vec![0.0, 0.0, 4.0], true));
        let backend = backend(NeuralVariant::Accelerated, &dir, loader.clone());

        backend.initialize().unwrap();
        assert_eq!(backend.execution_target(), Some(ExecutionTarget::Cpu));
        assert_eq!(*loader.requests.lock(), vec![ExecutionTarget::Cpu]);
    }

    #[test]
    fn test_cleanup_is_repeatable() {
        let dir = asset_dir("{}");
        let backend = backend(
            NeuralVariant::CpuOnly,
            &dir,
            Arc::new(ScriptedLoader::new(vec![0.0, 0.0, 4.0], true)),
        );
        backend.initialize().unwrap();

        backend.cleanup();
        backend.cleanup();
        assert!(!backend.is_ready());
        assert!(!backend.analyze("great").is_success());
    }

    #[test]
    fn test_infer_with_prebuilt_context() {
        let engine = FixedEngine {
            logits: vec![0.0, 0.0, 2.0],
            target: ExecutionTarget::Cpu,
            seen: Mutex::new(Vec::new()),
        };
        let assets = ModelAssets {
            integration: IntegrationConfig::from_json(
                r#"{"inputConfig": {"preprocessing": {"maxLength": 5}}}"#,
            )
            .unwrap(),
            vocabulary: Vocabulary::from_map(
                [("[PAD]", 0u32), ("[UNK]", 1), ("[CLS]", 2), ("[SEP]", 3)]
                    .iter()
                    .map(|(k, v)| (k.to_string(), *v))
                    .collect::<HashMap<_, _>>(),
            )
            .unwrap(),
            model_path: "unused".into(),
        };
        let context =
            LoadedContext::build(assets, Box::new(engine), ExecutionOptions::cpu(1, false)).unwrap();
        let backend = NeuralInferenceBackend::with_loader(
            NeuralVariant::CpuOnly,
            AssetConfig::default(),
            HardwareCapabilities::none(),
            Arc::new(CandleEngineLoader),
        );

        let result = backend.infer(&context, "a b").unwrap();
        assert_eq!(result.label(), SentimentLabel::Positive);
    }
}

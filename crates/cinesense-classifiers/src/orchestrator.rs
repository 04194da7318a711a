//! Sentiment orchestrator
//!
//! Owns the backends, picks which ones to bring up from the detected
//! hardware tier, and walks them in a fixed order for every request:
//! accelerated neural, CPU neural, keyword. A non-terminal backend's result
//! is only accepted when it succeeded with confidence above the gate; the
//! keyword backend always answers.

use crate::cache::ResultCache;
use crate::config::RuntimeConfig;
use crate::engine::{CandleEngineLoader, EngineLoader};
use crate::hardware::{HardwareCapabilities, HardwareCapabilityDetector};
use crate::keyword::KeywordFallbackBackend;
use crate::lexicon::KeywordLexicon;
use crate::neural::{NeuralInferenceBackend, NeuralVariant};
use cinesense_core::{Error, Result, RuntimeTier, SentimentResult};
use cinesense_telemetry::PerformanceMonitor;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

/// A constructed backend
#[derive(Clone)]
pub enum Backend {
    AcceleratedNeural(Arc<NeuralInferenceBackend>),
    CpuNeural(Arc<NeuralInferenceBackend>),
    Keyword(Arc<KeywordFallbackBackend>),
}

impl Backend {
    /// Name used in logs, metrics and status
    pub fn name(&self) -> &'static str {
        match self {
            Self::AcceleratedNeural(_) => "accelerated",
            Self::CpuNeural(_) => "cpu",
            Self::Keyword(_) => "keyword",
        }
    }

    /// Position in the request walk
    fn priority(&self) -> u8 {
        match self {
            Self::AcceleratedNeural(_) => 0,
            Self::CpuNeural(_) => 1,
            Self::Keyword(_) => 2,
        }
    }

    pub fn is_ready(&self) -> bool {
        match self {
            Self::AcceleratedNeural(backend) | Self::CpuNeural(backend) => backend.is_ready(),
            Self::Keyword(backend) => backend.is_ready(),
        }
    }

    /// Whether this backend's answer is accepted unconditionally
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Keyword(_))
    }

    /// Run the backend. Neural inference runs on the blocking pool.
    async fn analyze(&self, text: &str) -> Result<SentimentResult> {
        match self {
            Self::AcceleratedNeural(backend) | Self::CpuNeural(backend) => {
                let backend = backend.clone();
                let text = text.to_string();
                tokio::task::spawn_blocking(move || backend.analyze(&text))
                    .await
                    .map_err(|e| Error::inference(format!("inference task failed: {e}")))
            }
            Self::Keyword(backend) => Ok(backend.analyze(text)),
        }
    }

    fn cleanup(&self) {
        match self {
            Self::AcceleratedNeural(backend) | Self::CpuNeural(backend) => backend.cleanup(),
            Self::Keyword(_) => {}
        }
    }
}

/// Orchestrator lifecycle
enum RuntimeState {
    Uninitialized,
    Ready(ReadyState),
}

struct ReadyState {
    capabilities: HardwareCapabilities,
    achieved_tier: RuntimeTier,
    /// Sorted by [`Backend::priority`]; always ends with the keyword backend
    backends: Vec<Backend>,
}

/// Point-in-time view of the orchestrator
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub initialized: bool,
    pub capabilities: Option<HardwareCapabilities>,
    pub recommended_tier: Option<RuntimeTier>,
    pub achieved_tier: Option<RuntimeTier>,
    pub ready_backends: Vec<&'static str>,
    pub cache_len: usize,
}

/// Adaptive sentiment service
pub struct SentimentOrchestrator {
    config: RuntimeConfig,
    detector: Arc<HardwareCapabilityDetector>,
    loader: Arc<dyn EngineLoader>,
    state: RwLock<RuntimeState>,
    init_lock: Mutex<()>,
    cache: ResultCache,
    monitor: PerformanceMonitor,
}

impl SentimentOrchestrator {
    /// Orchestrator probing the running host and executing with Candle
    pub fn new(config: RuntimeConfig) -> Self {
        let detector = HardwareCapabilityDetector::new().with_overrides(config.hardware);
        Self::with_components(config, detector, Arc::new(CandleEngineLoader))
    }

    /// Orchestrator with a custom detector and engine loader
    pub fn with_components(
        config: RuntimeConfig,
        detector: HardwareCapabilityDetector,
        loader: Arc<dyn EngineLoader>,
    ) -> Self {
        Self {
            cache: ResultCache::new(config.cache_capacity),
            config,
            detector: Arc::new(detector),
            loader,
            state: RwLock::new(RuntimeState::Uninitialized),
            init_lock: Mutex::new(()),
            monitor: PerformanceMonitor::new(),
        }
    }

    /// Share an existing monitor
    pub fn with_monitor(mut self, monitor: PerformanceMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    pub async fn is_initialized(&self) -> bool {
        matches!(*self.state.read().await, RuntimeState::Ready(_))
    }

    /// Detect capabilities and bring up backends.
    ///
    /// Concurrent callers initialize once; later calls return `true`
    /// without reloading. The keyword backend is always brought up, so
    /// this only returns `false` if detection itself could not run.
    pub async fn initialize(&self) -> bool {
        let _guard = self.init_lock.lock().await;
        if self.is_initialized().await {
            return true;
        }

        let detector = self.detector.clone();
        let capabilities = match tokio::task::spawn_blocking(move || detector.detect()).await {
            Ok(capabilities) => capabilities,
            Err(e) => {
                tracing::error!("Hardware detection task failed: {}", e);
                return false;
            }
        };

        let (neural, achieved_tier) = self.bring_up_neural(&capabilities).await;

        let lexicon = KeywordLexicon::load_or_default(self.config.lexicon_path.as_deref());
        let keyword = Backend::Keyword(Arc::new(KeywordFallbackBackend::new_or_default(lexicon)));

        let mut backends: Vec<Backend> = neural.into_iter().collect();
        backends.push(keyword);
        backends.sort_by_key(Backend::priority);

        tracing::info!(
            recommended = %capabilities.recommended_tier,
            achieved = %achieved_tier,
            backends = ?backends.iter().map(Backend::name).collect::<Vec<_>>(),
            "Sentiment runtime initialized"
        );

        *self.state.write().await = RuntimeState::Ready(ReadyState {
            capabilities,
            achieved_tier,
            backends,
        });
        true
    }

    /// Walk down from the recommended tier until a neural backend comes up
    async fn bring_up_neural(
        &self,
        capabilities: &HardwareCapabilities,
    ) -> (Option<Backend>, RuntimeTier) {
        if self.config.disable_neural {
            tracing::info!("Neural backends disabled by configuration");
            return (None, RuntimeTier::KeywordFallback);
        }

        let mut attempted: Vec<NeuralVariant> = Vec::new();
        let mut tier = Some(capabilities.recommended_tier);

        while let Some(current) = tier {
            tier = current.next_lower();

            let Some(variant) = variant_for(current) else {
                break;
            };
            if attempted.contains(&variant) {
                continue;
            }
            attempted.push(variant);

            let backend = Arc::new(NeuralInferenceBackend::with_loader(
                variant,
                self.config.assets.clone(),
                *capabilities,
                self.loader.clone(),
            ));

            let init = backend.clone();
            let outcome = tokio::task::spawn_blocking(move || init.initialize())
                .await
                .map_err(|e| Error::initialization(format!("initialization task failed: {e}")))
                .and_then(|result| result);

            match outcome {
                Ok(()) => {
                    let achieved = achieved_tier(current, &backend, capabilities);
                    let backend = match variant {
                        NeuralVariant::Accelerated => Backend::AcceleratedNeural(backend),
                        NeuralVariant::CpuOnly => Backend::CpuNeural(backend),
                    };
                    return (Some(backend), achieved);
                }
                Err(e) => {
                    tracing::warn!(
                        tier = %current,
                        backend = variant.as_str(),
                        "Backend failed to initialize, trying next tier: {}",
                        e
                    );
                }
            }
        }

        (None, RuntimeTier::KeywordFallback)
    }

    /// Classify `text`
    pub async fn analyze(&self, text: &str) -> SentimentResult {
        let backends = match &*self.state.read().await {
            RuntimeState::Ready(ready) => ready.backends.clone(),
            RuntimeState::Uninitialized => {
                return SentimentResult::error("runtime not initialized");
            }
        };

        if text.trim().is_empty() {
            return SentimentResult::neutral();
        }

        if let Some(cached) = self.cache.get(text) {
            self.monitor.record_cache_hit();
            return cached;
        }

        let start = Instant::now();
        let Some((backend, result)) = self.walk(&backends, text).await else {
            return SentimentResult::error("no backend available");
        };

        self.cache.insert(text, result.clone());
        self.monitor.record_analysis(
            text.chars().count(),
            start.elapsed().as_micros() as u64,
            result.is_success(),
        );
        self.monitor.record_backend_accepted(backend);
        result
    }

    async fn walk(&self, backends: &[Backend], text: &str) -> Option<(&'static str, SentimentResult)> {
        let gate = self.config.confidence_gate;

        for backend in backends.iter().filter(|b| b.is_ready()) {
            let result = match backend.analyze(text).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(backend = backend.name(), "Backend call failed: {}", e);
                    continue;
                }
            };

            if backend.is_terminal() || (result.is_success() && result.confidence() > gate) {
                tracing::debug!(
                    backend = backend.name(),
                    label = %result.label(),
                    confidence = result.confidence(),
                    "Result accepted"
                );
                return Some((backend.name(), result));
            }

            tracing::debug!(
                backend = backend.name(),
                confidence = result.confidence(),
                error = result.error_message(),
                "Result rejected, trying next backend"
            );
        }

        None
    }

    /// Classify each text in order, one at a time
    pub async fn analyze_batch<S: AsRef<str>>(&self, texts: &[S]) -> Vec<SentimentResult> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.analyze(text.as_ref()).await);
        }
        results
    }

    /// Release every backend, clear the cache and return to uninitialized
    pub async fn cleanup(&self) {
        let _guard = self.init_lock.lock().await;
        let previous = std::mem::replace(&mut *self.state.write().await, RuntimeState::Uninitialized);

        if let RuntimeState::Ready(ready) = previous {
            for backend in &ready.backends {
                backend.cleanup();
            }
            tracing::info!("Sentiment runtime released");
        }
        self.cache.clear();
    }

    /// Current lifecycle, tiers and backends
    pub async fn status(&self) -> RuntimeStatus {
        let cache_len = self.cache.len();
        match &*self.state.read().await {
            RuntimeState::Ready(ready) => RuntimeStatus {
                initialized: true,
                capabilities: Some(ready.capabilities),
                recommended_tier: Some(ready.capabilities.recommended_tier),
                achieved_tier: Some(ready.achieved_tier),
                ready_backends: ready
                    .backends
                    .iter()
                    .filter(|b| b.is_ready())
                    .map(Backend::name)
                    .collect(),
                cache_len,
            },
            RuntimeState::Uninitialized => RuntimeStatus {
                initialized: false,
                capabilities: None,
                recommended_tier: None,
                achieved_tier: None,
                ready_backends: Vec::new(),
                cache_len,
            },
        }
    }

    /// Probe the host again
    pub fn capabilities(&self) -> HardwareCapabilities {
        self.detector.detect()
    }
}

/// Neural backend serving `tier`, if any
fn variant_for(tier: RuntimeTier) -> Option<NeuralVariant> {
    match tier {
        RuntimeTier::AcceleratedTop | RuntimeTier::AcceleratedSecondary => {
            Some(NeuralVariant::Accelerated)
        }
        RuntimeTier::GpuCpu | RuntimeTier::CpuVector | RuntimeTier::CpuBasic => {
            Some(NeuralVariant::CpuOnly)
        }
        RuntimeTier::KeywordFallback => None,
    }
}

/// Tier actually reached once `backend` came up while serving `tier`
fn achieved_tier(
    tier: RuntimeTier,
    backend: &NeuralInferenceBackend,
    capabilities: &HardwareCapabilities,
) -> RuntimeTier {
    let on_accelerator = backend
        .execution_target()
        .map(|target| target.is_accelerated())
        .unwrap_or(false);

    if !tier.is_accelerated() || on_accelerator {
        tier
    } else if capabilities.vector_optimization {
        RuntimeTier::CpuVector
    } else {
        RuntimeTier::CpuBasic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::ModelAssets;
    use crate::engine::{ExecutionOptions, ExecutionTarget, InferenceEngine};
    use crate::hardware::{ProbeFlags, StaticProbe};
    use cinesense_core::SentimentLabel;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedEngine {
        logits: Vec<f32>,
        target: ExecutionTarget,
    }

    impl InferenceEngine for FixedEngine {
        fn forward(&self, _input_ids: &[u32], _attention_mask: &[u32]) -> Result<Vec<f32>> {
            Ok(self.logits.clone())
        }

        fn target(&self) -> ExecutionTarget {
            self.target
        }
    }

    struct FixedLoader {
        logits: Vec<f32>,
        accept_accelerated: bool,
        loads: AtomicU32,
    }

    impl FixedLoader {
        fn new(logits: Vec<f32>, accept_accelerated: bool) -> Arc<Self> {
            Arc::new(Self {
                logits,
                accept_accelerated,
                loads: AtomicU32::new(0),
            })
        }
    }

    impl EngineLoader for FixedLoader {
        fn load(&self, _assets: &ModelAssets, options: &ExecutionOptions) -> Result<Box<dyn InferenceEngine>> {
            if options.target.is_accelerated() && !self.accept_accelerated {
                return Err(Error::initialization("device unavailable"));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FixedEngine {
                logits: self.logits.clone(),
                target: options.target,
            }))
        }
    }

    struct PanickingEngine(ExecutionTarget);

    impl InferenceEngine for PanickingEngine {
        fn forward(&self, _input_ids: &[u32], _attention_mask: &[u32]) -> Result<Vec<f32>> {
            panic!("kernel crashed");
        }

        fn target(&self) -> ExecutionTarget {
            self.0
        }
    }

    struct PanickingLoader;

    impl EngineLoader for PanickingLoader {
        fn load(&self, _assets: &ModelAssets, options: &ExecutionOptions) -> Result<Box<dyn InferenceEngine>> {
            Ok(Box::new(PanickingEngine(options.target)))
        }
    }

    fn asset_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("integration_config.json"), "{}").unwrap();
        std::fs::write(
            dir.path().join("vocab.json"),
            r#"{"[PAD]": 0, "[UNK]": 1, "[CLS]": 2, "[SEP]": 3}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("model.safetensors"), b"weights").unwrap();
        dir
    }

    fn top_tier_flags() -> ProbeFlags {
        ProbeFlags {
            gpu: true,
            accelerated_runtime: true,
            distribution_service: true,
            vector_optimization: true,
            ..Default::default()
        }
    }

    fn orchestrator(
        config: RuntimeConfig,
        flags: ProbeFlags,
        loader: Arc<FixedLoader>,
    ) -> SentimentOrchestrator {
        SentimentOrchestrator::with_components(
            config,
            HardwareCapabilityDetector::with_probe(Box::new(StaticProbe(flags))),
            loader,
        )
    }

    #[tokio::test]
    async fn test_uninitialized_returns_error() {
        let orch = SentimentOrchestrator::new(RuntimeConfig::default().keyword_only());
        let result = orch.analyze("great movie").await;
        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("runtime not initialized"));
    }

    #[tokio::test]
    async fn test_panicking_inference_falls_through_to_keyword() {
        let dir = asset_dir();
        let orch = SentimentOrchestrator::with_components(
            RuntimeConfig::default().with_asset_dir(dir.path()),
            HardwareCapabilityDetector::with_probe(Box::new(StaticProbe(top_tier_flags()))),
            Arc::new(PanickingLoader),
        );
        assert!(orch.initialize().await);
        assert_eq!(orch.status().await.ready_backends, vec!["accelerated", "keyword"]);

        let result = orch.analyze("an amazing film").await;
        assert!(result.is_success());
        assert_eq!(result.label(), SentimentLabel::Positive);
        assert!(result.matched_terms().iter().any(|t| t == "positive:amazing"));

        // The runtime stays usable after the failed tasks
        assert!(orch.analyze("a boring film").await.is_success());
    }

    #[tokio::test]
    async fn test_keyword_only() {
        let orch = orchestrator(
            RuntimeConfig::default().keyword_only(),
            top_tier_flags(),
            FixedLoader::new(vec![0.0, 0.0, 5.0], true),
        );
        assert!(orch.initialize().await);

        let status = orch.status().await;
        assert_eq!(status.achieved_tier, Some(RuntimeTier::KeywordFallback));
        assert_eq!(status.recommended_tier, Some(RuntimeTier::AcceleratedTop));
        assert_eq!(status.ready_backends, vec!["keyword"]);

        let result = orch.analyze("This movie is absolutely amazing!").await;
        assert_eq!(result.label(), SentimentLabel::Positive);
    }

    #[tokio::test]
    async fn test_failed_neural_falls_back_to_keyword() {
        let empty = tempfile::tempdir().unwrap();
        let orch = orchestrator(
            RuntimeConfig::default().with_asset_dir(empty.path()),
            top_tier_flags(),
            FixedLoader::new(vec![0.0, 0.0, 5.0], true),
        );
        assert!(orch.initialize().await);

        let status = orch.status().await;
        assert_eq!(status.achieved_tier, Some(RuntimeTier::KeywordFallback));
        assert_eq!(status.ready_backends, vec!["keyword"]);

        let result = orch.analyze("anything").await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn test_confident_neural_result_is_accepted() {
        let dir = asset_dir();
        let orch = orchestrator(
            RuntimeConfig::default().with_asset_dir(dir.path()),
            top_tier_flags(),
            FixedLoader::new(vec![0.0, 0.0, 5.0], true),
        );
        assert!(orch.initialize().await);
        assert_eq!(
            orch.status().await.achieved_tier,
            Some(RuntimeTier::AcceleratedTop)
        );

        let result = orch.analyze("xyz qqq").await;
        assert_eq!(result.label(), SentimentLabel::Positive);
        assert_eq!(result.matched_terms(), &["accelerated:positive".to_string()]);

        let snapshot = orch.monitor().snapshot();
        assert_eq!(snapshot.accepted_by_backend["accelerated"], 1);
    }

    #[tokio::test]
    async fn test_low_confidence_walks_to_keyword() {
        let dir = asset_dir();
        let orch = orchestrator(
            RuntimeConfig::default().with_asset_dir(dir.path()),
            top_tier_flags(),
            FixedLoader::new(vec![1.0, 1.0, 1.0], true),
        );
        assert!(orch.initialize().await);

        let result = orch.analyze("what a terrible boring film").await;
        assert_eq!(result.label(), SentimentLabel::Negative);
        assert!(!result
            .matched_terms()
            .iter()
            .any(|t| t.contains("low_confidence")));
        assert_eq!(orch.monitor().snapshot().accepted_by_backend["keyword"], 1);
    }

    #[tokio::test]
    async fn test_gate_is_strict() {
        let dir = asset_dir();
        let config = RuntimeConfig {
            confidence_gate: 1.0,
            ..RuntimeConfig::default().with_asset_dir(dir.path())
        };
        let orch = orchestrator(
            config,
            top_tier_flags(),
            FixedLoader::new(vec![0.0, 0.0, 50.0], true),
        );
        assert!(orch.initialize().await);

        // Probability rounds to exactly 1.0, which does not exceed the gate
        let result = orch.analyze("xyz qqq").await;
        assert!(result.matched_terms().is_empty());
        assert_eq!(result.label(), SentimentLabel::Neutral);
    }

    #[tokio::test]
    async fn test_accelerated_on_cpu_reports_cpu_tier() {
        let dir = asset_dir();
        let orch = orchestrator(
            RuntimeConfig::default().with_asset_dir(dir.path()),
            top_tier_flags(),
            FixedLoader::new(vec![0.0, 0.0, 5.0], false),
        );
        assert!(orch.initialize().await);

        let status = orch.status().await;
        assert_eq!(status.recommended_tier, Some(RuntimeTier::AcceleratedTop));
        assert_eq!(status.achieved_tier, Some(RuntimeTier::CpuVector));
        assert_eq!(status.ready_backends, vec!["accelerated", "keyword"]);
    }

    #[tokio::test]
    async fn test_cpu_tier_uses_cpu_backend() {
        let dir = asset_dir();
        let flags = ProbeFlags {
            vector_optimization: true,
            ..Default::default()
        };
        let orch = orchestrator(
            RuntimeConfig::default().with_asset_dir(dir.path()),
            flags,
            FixedLoader::new(vec![5.0, 0.0, 0.0], true),
        );
        assert!(orch.initialize().await);

        let status = orch.status().await;
        assert_eq!(status.achieved_tier, Some(RuntimeTier::CpuBasic));
        assert_eq!(status.ready_backends, vec!["cpu", "keyword"]);

        let result = orch.analyze("xyz").await;
        assert_eq!(result.label(), SentimentLabel::Negative);
        assert_eq!(result.matched_terms(), &["cpu:negative".to_string()]);
    }

    #[tokio::test]
    async fn test_blank_text_bypasses_cache() {
        let orch = SentimentOrchestrator::new(RuntimeConfig::default().keyword_only());
        assert!(orch.initialize().await);

        let result = orch.analyze("   \n").await;
        assert_eq!(result.label(), SentimentLabel::Neutral);
        assert!(result.is_success());
        assert_eq!(result.confidence(), cinesense_core::DEFAULT_NEUTRAL_CONFIDENCE);
        assert_eq!(orch.status().await.cache_len, 0);
    }

    #[tokio::test]
    async fn test_repeat_analysis_hits_cache() {
        let orch = SentimentOrchestrator::new(RuntimeConfig::default().keyword_only());
        assert!(orch.initialize().await);

        let first = orch.analyze("A great film").await;
        let second = orch.analyze("A great film").await;
        assert_eq!(first, second);

        let snapshot = orch.monitor().snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.total_analyses, 1);
        assert_eq!(orch.status().await.cache_len, 1);
    }

    #[tokio::test]
    async fn test_initialize_runs_once() {
        let dir = asset_dir();
        let loader = FixedLoader::new(vec![0.0, 0.0, 5.0], true);
        let orch = Arc::new(orchestrator(
            RuntimeConfig::default().with_asset_dir(dir.path()),
            top_tier_flags(),
            loader.clone(),
        ));

        let calls = (0..4).map(|_| {
            let orch = orch.clone();
            async move { orch.initialize().await }
        });
        let outcomes = futures::future::join_all(calls).await;
        assert!(outcomes.into_iter().all(|ok| ok));
        assert!(orch.initialize().await);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_resets() {
        let dir = asset_dir();
        let orch = orchestrator(
            RuntimeConfig::default().with_asset_dir(dir.path()),
            top_tier_flags(),
            FixedLoader::new(vec![0.0, 0.0, 5.0], true),
        );
        assert!(orch.initialize().await);
        orch.analyze("great").await;

        orch.cleanup().await;
        orch.cleanup().await;

        let status = orch.status().await;
        assert!(!status.initialized);
        assert_eq!(status.cache_len, 0);
        assert!(!orch.analyze("great").await.is_success());

        assert!(orch.initialize().await);
        assert!(orch.analyze("great").await.is_success());
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let orch = SentimentOrchestrator::new(RuntimeConfig::default().keyword_only());
        assert!(orch.initialize().await);

        let results = orch
            .analyze_batch(&["amazing and wonderful", "", "awful and boring"])
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].label(), SentimentLabel::Positive);
        assert_eq!(results[1].label(), SentimentLabel::Neutral);
        assert_eq!(results[2].label(), SentimentLabel::Negative);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_analysis() {
        let dir = asset_dir();
        let orch = Arc::new(orchestrator(
            RuntimeConfig {
                cache_capacity: 8,
                ..RuntimeConfig::default().with_asset_dir(dir.path())
            },
            top_tier_flags(),
            FixedLoader::new(vec![0.0, 0.0, 5.0], true),
        ));
        assert!(orch.initialize().await);

        let calls = (0..64).map(|i| {
            let orch = orch.clone();
            async move { orch.analyze(&format!("review number {}", i % 16)).await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_success()));
        assert!(results.iter().all(|r| r.label() == SentimentLabel::Positive));
        assert!(orch.status().await.cache_len <= 8);

        let snapshot = orch.monitor().snapshot();
        assert_eq!(snapshot.total_analyses + snapshot.cache_hits, 64);
    }

    #[test]
    fn test_variant_mapping() {
        assert_eq!(
            variant_for(RuntimeTier::AcceleratedSecondary),
            Some(NeuralVariant::Accelerated)
        );
        assert_eq!(variant_for(RuntimeTier::GpuCpu), Some(NeuralVariant::CpuOnly));
        assert_eq!(variant_for(RuntimeTier::CpuBasic), Some(NeuralVariant::CpuOnly));
        assert_eq!(variant_for(RuntimeTier::KeywordFallback), None);
    }
}

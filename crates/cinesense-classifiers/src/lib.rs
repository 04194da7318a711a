//! CineSense Classifiers
//!
//! Adaptive sentiment inference for movie reviews and similar free-form text.
//!
//! The runtime picks backends from the detected hardware tier:
//! - Accelerated neural: BERT classifier on a GPU or neural-accelerator device
//! - CPU neural: the same classifier on the host CPU
//! - Keyword: deterministic lexicon scorer, always available
//!
//! [`SentimentOrchestrator`] walks these in order for every request, caches
//! accepted results, and records latency in a [`PerformanceMonitor`].
//!
//! [`PerformanceMonitor`]: cinesense_telemetry::PerformanceMonitor

pub mod analyzer;
pub mod assets;
pub mod cache;
pub mod config;
pub mod engine;
pub mod hardware;
pub mod keyword;
pub mod lexicon;
pub mod neural;
pub mod orchestrator;

pub use analyzer::{SentimentAnalyzer, SharedAnalyzer};
pub use assets::{IntegrationConfig, ModelAssets, Vocabulary};
pub use cache::ResultCache;
pub use config::{AssetConfig, AssetSource, HardwareOverrides, RuntimeConfig};
pub use engine::{
    CandleBertEngine, CandleEngineLoader, EngineLoader, ExecutionOptions, ExecutionTarget,
    InferenceEngine,
};
pub use hardware::{
    CapabilityProbe, HardwareCapabilities, HardwareCapabilityDetector, ProbeFlags, StaticProbe,
    SystemProbe,
};
pub use keyword::KeywordFallbackBackend;
pub use lexicon::{KeywordLexicon, KeywordSentimentModel};
pub use neural::{NeuralInferenceBackend, NeuralVariant};
pub use orchestrator::{Backend, RuntimeStatus, SentimentOrchestrator};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::analyzer::SentimentAnalyzer;
    pub use crate::config::RuntimeConfig;
    pub use crate::hardware::{HardwareCapabilities, HardwareCapabilityDetector};
    pub use crate::keyword::KeywordFallbackBackend;
    pub use crate::orchestrator::{RuntimeStatus, SentimentOrchestrator};
    pub use cinesense_core::{RuntimeTier, SentimentLabel, SentimentResult};
}

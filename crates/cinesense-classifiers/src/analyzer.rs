//! Analyzer trait consumed by presentation layers

use crate::orchestrator::SentimentOrchestrator;
use async_trait::async_trait;
use cinesense_core::SentimentResult;
use std::sync::Arc;

/// Trait for sentiment services
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    /// Bring the service to a ready state
    async fn initialize(&self) -> bool;

    /// Classify one text. Never fails; errors are reported in the result.
    async fn analyze(&self, text: &str) -> SentimentResult;

    /// Classify several texts sequentially, preserving order
    async fn analyze_batch(&self, texts: &[String]) -> Vec<SentimentResult> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.analyze(text).await);
        }
        results
    }

    /// Release resources and return to the uninitialized state
    async fn cleanup(&self);
}

#[async_trait]
impl SentimentAnalyzer for SentimentOrchestrator {
    async fn initialize(&self) -> bool {
        SentimentOrchestrator::initialize(self).await
    }

    async fn analyze(&self, text: &str) -> SentimentResult {
        SentimentOrchestrator::analyze(self, text).await
    }

    async fn analyze_batch(&self, texts: &[String]) -> Vec<SentimentResult> {
        SentimentOrchestrator::analyze_batch(self, texts).await
    }

    async fn cleanup(&self) {
        SentimentOrchestrator::cleanup(self).await
    }
}

/// Shared analyzer handle
pub type SharedAnalyzer = Arc<dyn SentimentAnalyzer>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use cinesense_core::SentimentLabel;

    #[tokio::test]
    async fn test_orchestrator_behind_trait_object() {
        let analyzer: SharedAnalyzer = Arc::new(SentimentOrchestrator::new(
            RuntimeConfig::default().keyword_only(),
        ));

        assert!(analyzer.initialize().await);
        let results = analyzer
            .analyze_batch(&["loved it, brilliant".to_string(), "dull mess".to_string()])
            .await;
        assert_eq!(results[0].label(), SentimentLabel::Positive);
        assert_eq!(results[1].label(), SentimentLabel::Negative);

        analyzer.cleanup().await;
        assert!(!analyzer.analyze("loved it").await.is_success());
    }
}

//! Core types for CineSense

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence assigned to a neutral result when no evidence is available
pub const DEFAULT_NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Sentiment polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Lowercase name used in diagnostic tags and config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }

    /// Parse a class label as written in model configs (`"positive"`, `"POS"`, `"LABEL_2"` is not accepted)
    pub fn from_class_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "positive" | "pos" => Some(Self::Positive),
            "negative" | "neg" => Some(Self::Negative),
            "neutral" | "neu" => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single classification.
///
/// Values are immutable once built; the only way in is through the named
/// factories, which clamp confidence into `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentResult {
    label: SentimentLabel,
    confidence: f64,
    matched_terms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl SentimentResult {
    fn build(label: SentimentLabel, confidence: f64, matched_terms: Vec<String>) -> Self {
        Self {
            label,
            confidence: clamp_confidence(confidence),
            matched_terms,
            processing_time_ms: None,
            error_message: None,
        }
    }

    /// Positive result with the given confidence and diagnostic terms
    pub fn positive(confidence: f64, matched_terms: Vec<String>) -> Self {
        Self::build(SentimentLabel::Positive, confidence, matched_terms)
    }

    /// Negative result with the given confidence and diagnostic terms
    pub fn negative(confidence: f64, matched_terms: Vec<String>) -> Self {
        Self::build(SentimentLabel::Negative, confidence, matched_terms)
    }

    /// Neutral result at the default baseline confidence
    pub fn neutral() -> Self {
        Self::build(
            SentimentLabel::Neutral,
            DEFAULT_NEUTRAL_CONFIDENCE,
            Vec::new(),
        )
    }

    /// Neutral result with an explicit confidence
    pub fn neutral_with(confidence: f64, matched_terms: Vec<String>) -> Self {
        Self::build(SentimentLabel::Neutral, confidence, matched_terms)
    }

    /// Build a result for an arbitrary label
    pub fn labeled(label: SentimentLabel, confidence: f64, matched_terms: Vec<String>) -> Self {
        Self::build(label, confidence, matched_terms)
    }

    /// Failed analysis. Carries a neutral label and zero confidence.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            label: SentimentLabel::Neutral,
            confidence: 0.0,
            matched_terms: Vec::new(),
            processing_time_ms: None,
            error_message: Some(message.into()),
        }
    }

    /// Copy of this result stamped with the elapsed analysis time
    pub fn with_processing_time(mut self, millis: u64) -> Self {
        self.processing_time_ms = Some(millis);
        self
    }

    pub fn label(&self) -> SentimentLabel {
        self.label
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn matched_terms(&self) -> &[String] {
        &self.matched_terms
    }

    pub fn processing_time_ms(&self) -> Option<u64> {
        self.processing_time_ms
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// True iff no error message is attached
    pub fn is_success(&self) -> bool {
        self.error_message.is_none()
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Inference backend preference level, ordered from most to least preferred.
///
/// The derived `Ord` is the preference order: `AcceleratedTop < ... < KeywordFallback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeTier {
    /// Accelerated runtime on a GPU
    AcceleratedTop,
    /// Accelerated runtime on a dedicated neural accelerator
    AcceleratedSecondary,
    /// GPU present without the accelerated runtime
    GpuCpu,
    /// Neural accelerator present without the accelerated runtime
    CpuVector,
    /// Plain CPU with vector-optimized kernels
    CpuBasic,
    /// Rule-based scoring only
    KeywordFallback,
}

impl RuntimeTier {
    /// All tiers in preference order
    pub const ALL: [RuntimeTier; 6] = [
        Self::AcceleratedTop,
        Self::AcceleratedSecondary,
        Self::GpuCpu,
        Self::CpuVector,
        Self::CpuBasic,
        Self::KeywordFallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceleratedTop => "accelerated_top",
            Self::AcceleratedSecondary => "accelerated_secondary",
            Self::GpuCpu => "gpu_cpu",
            Self::CpuVector => "cpu_vector",
            Self::CpuBasic => "cpu_basic",
            Self::KeywordFallback => "keyword_fallback",
        }
    }

    /// The next less-preferred tier, `None` at the bottom of the order
    pub fn next_lower(&self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|t| t == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Tiers served by the accelerated neural backend
    pub fn is_accelerated(&self) -> bool {
        matches!(self, Self::AcceleratedTop | Self::AcceleratedSecondary)
    }

    /// Tiers that need a neural backend at all
    pub fn uses_neural(&self) -> bool {
        !matches!(self, Self::KeywordFallback)
    }
}

impl fmt::Display for RuntimeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

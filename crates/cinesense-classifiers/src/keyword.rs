//! Rule-based sentiment backend (terminal fallback)
//!
//! Scores text against a [`KeywordSentimentModel`]: additive keyword hits,
//! multiplicative intensity modifiers and movie-domain context bonuses. It
//! needs no model assets and never produces an error result.

use crate::lexicon::{KeywordLexicon, KeywordSentimentModel};
use aho_corasick::{AhoCorasick, MatchKind};
use cinesense_core::{Error, Result, SentimentLabel, SentimentResult};
use std::collections::HashSet;
use std::time::Instant;

/// Extra bonus for a context hit on top of `context_weight`.
///
/// The combined per-term bonus with the default lexicon is 0.3 + 0.5 = 0.8.
pub const CONTEXT_PATTERN_BONUS: f64 = 0.5;

/// Confidence gained per unit of margin between the top two scores
const ENHANCED_MARGIN_SCALE: f64 = 0.15;

/// Confidence gained per unit of margin in simple mode
const SIMPLE_MARGIN_SCALE: f64 = 0.1;

/// Substring matcher that reports which patterns occur at least once
struct SubstringSet {
    matcher: Option<AhoCorasick>,
}

impl SubstringSet {
    fn build(patterns: &[String]) -> Result<Self> {
        if patterns.is_empty() {
            return Ok(Self { matcher: None });
        }
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(patterns)
            .map_err(|e| Error::internal(format!("Failed to build keyword matcher: {e}")))?;
        Ok(Self {
            matcher: Some(matcher),
        })
    }

    /// Indices of patterns present in `haystack`
    fn present(&self, haystack: &str) -> HashSet<usize> {
        match &self.matcher {
            Some(matcher) => matcher
                .find_overlapping_iter(haystack)
                .map(|m| m.pattern().as_usize())
                .collect(),
            None => HashSet::new(),
        }
    }
}

/// Raw scores accumulated for one text
#[derive(Debug, Default, Clone, PartialEq)]
struct Scores {
    positive: f64,
    negative: f64,
    neutral: f64,
    terms: Vec<String>,
}

/// Keyword-based fallback sentiment backend
pub struct KeywordFallbackBackend {
    model: KeywordSentimentModel,
    modifiers: SubstringSet,
    movie_terms: SubstringSet,
    positive_context: SubstringSet,
    negative_context: SubstringSet,
}

impl KeywordFallbackBackend {
    /// Create a backend over the given lexicon
    pub fn new(model: KeywordSentimentModel) -> Result<Self> {
        let modifier_terms: Vec<String> = model
            .intensity_modifiers
            .iter()
            .map(|m| m.term.clone())
            .collect();

        Ok(Self {
            modifiers: SubstringSet::build(&modifier_terms)?,
            movie_terms: SubstringSet::build(&model.context_boosters.movie_terms)?,
            positive_context: SubstringSet::build(&model.context_boosters.positive_context)?,
            negative_context: SubstringSet::build(&model.context_boosters.negative_context)?,
            model,
        })
    }

    /// Create a backend over `model`, or the built-in lexicon if its matchers cannot be built
    pub fn new_or_default(model: KeywordSentimentModel) -> Self {
        match Self::new(model) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!("Keyword lexicon rejected, using built-in lexicon: {}", e);
                Self::default()
            }
        }
    }

    /// The lexicon this backend scores with
    pub fn model(&self) -> &KeywordSentimentModel {
        &self.model
    }

    /// Always ready; present for symmetry with the neural backends
    pub fn is_ready(&self) -> bool {
        true
    }

    /// Classify `text`. Never returns an error result.
    pub fn analyze(&self, text: &str) -> SentimentResult {
        if text.trim().is_empty() {
            return SentimentResult::neutral();
        }

        let start = Instant::now();
        let lowered = text.to_lowercase();

        let result = match self.score_enhanced(&lowered) {
            Ok(scores) => self.decide_enhanced(scores),
            Err(e) => {
                tracing::debug!("Enhanced keyword scoring failed, using simple mode: {}", e);
                self.score_simple(&lowered)
            }
        };

        result.with_processing_time(start.elapsed().as_millis() as u64)
    }

    fn tokens(lowered: &str) -> impl Iterator<Item = &str> {
        lowered
            .split_whitespace()
            .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|token| !token.is_empty())
    }

    /// Keyword counts only; neutral indicators are recorded but not counted here
    fn count_keywords(&self, lowered: &str) -> Scores {
        let weight = self.model.algorithm.keyword_weight;
        let mut scores = Scores::default();

        for token in Self::tokens(lowered) {
            if self.model.positive_keywords.contains(token) {
                scores.positive += weight;
                scores.terms.push(format!("positive:{token}"));
            }
            if self.model.negative_keywords.contains(token) {
                scores.negative += weight;
                scores.terms.push(format!("negative:{token}"));
            } else if self.model.neutral_indicators.contains(token) {
                scores.neutral += 0.5 * weight;
                scores.terms.push(format!("neutral:{token}"));
            }
        }

        scores
    }

    fn score_enhanced(&self, lowered: &str) -> Result<Scores> {
        let mut scores = self.count_keywords(lowered);
        let algorithm = &self.model.algorithm;

        let present = self.modifiers.present(lowered);
        for (idx, modifier) in self.model.intensity_modifiers.iter().enumerate() {
            if !present.contains(&idx) {
                continue;
            }
            let weight = modifier.weight * algorithm.modifier_weight;
            if weight < 0.0 {
                let factor = weight.abs();
                let inverted_positive = scores.negative * factor;
                scores.negative = scores.positive * factor;
                scores.positive = inverted_positive;
            } else {
                scores.positive *= weight;
                scores.negative *= weight;
            }
            scores.terms.push(format!("modifier:{}", modifier.term));
        }

        let bonus = algorithm.context_weight + CONTEXT_PATTERN_BONUS;
        let boosters = &self.model.context_boosters;

        let positive_hits = self.positive_context.present(lowered);
        for (idx, term) in boosters.positive_context.iter().enumerate() {
            if positive_hits.contains(&idx) {
                scores.positive += bonus;
                scores.terms.push(format!("context+:{term}"));
            }
        }

        let negative_hits = self.negative_context.present(lowered);
        for (idx, term) in boosters.negative_context.iter().enumerate() {
            if negative_hits.contains(&idx) {
                scores.negative += bonus;
                scores.terms.push(format!("context-:{term}"));
            }
        }

        let movie_hits = self.movie_terms.present(lowered);
        for (idx, term) in boosters.movie_terms.iter().enumerate() {
            if movie_hits.contains(&idx) {
                scores.terms.push(format!("movie:{term}"));
            }
        }

        if ![scores.positive, scores.negative, scores.neutral]
            .iter()
            .all(|s| s.is_finite())
        {
            return Err(Error::internal(format!(
                "non-finite keyword score (positive={}, negative={}, neutral={})",
                scores.positive, scores.negative, scores.neutral
            )));
        }

        Ok(scores)
    }

    fn decide_enhanced(&self, scores: Scores) -> SentimentResult {
        let algorithm = &self.model.algorithm;
        let total = scores.positive + scores.negative + scores.neutral;
        if total == 0.0 {
            return SentimentResult::neutral();
        }

        let mut ranked = [
            (SentimentLabel::Positive, scores.positive),
            (SentimentLabel::Negative, scores.negative),
            (SentimentLabel::Neutral, scores.neutral),
        ];
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        let (label, winning) = ranked[0];
        let second = ranked[1].1;

        if winning <= second {
            return SentimentResult::neutral_with(algorithm.base_confidence, scores.terms);
        }

        let confidence = (algorithm.base_confidence + (winning - second) * ENHANCED_MARGIN_SCALE)
            .min(algorithm.max_confidence)
            .max(algorithm.min_confidence);
        SentimentResult::labeled(label, confidence, scores.terms)
    }

    fn score_simple(&self, lowered: &str) -> SentimentResult {
        let algorithm = &self.model.algorithm;
        let scores = self.count_keywords(lowered);
        let terms: Vec<String> = scores
            .terms
            .into_iter()
            .filter(|t| !t.starts_with("neutral:"))
            .collect();

        if scores.positive == scores.negative {
            return SentimentResult::neutral();
        }

        let margin = (scores.positive - scores.negative).abs();
        let confidence =
            (algorithm.base_confidence + margin * SIMPLE_MARGIN_SCALE).min(algorithm.max_confidence);

        if scores.positive > scores.negative {
            SentimentResult::positive(confidence, terms)
        } else {
            SentimentResult::negative(confidence, terms)
        }
    }
}

impl Default for KeywordFallbackBackend {
    fn default() -> Self {
        Self::new(KeywordLexicon::default_model()).expect("built-in lexicon must compile")
    }
}

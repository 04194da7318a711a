//! Keyword lexicon for rule-based sentiment scoring
//!
//! A lexicon is pure data: three keyword sets, ordered intensity modifiers,
//! movie-domain context boosters and the scoring constants. It can be loaded
//! from a JSON blob or taken from the built-in multilingual default.

use cinesense_core::{Error, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

/// Descriptive information about a lexicon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_model_version")]
    pub version: String,
    #[serde(default)]
    pub languages: Vec<String>,
}

fn default_model_name() -> String {
    "keyword-sentiment".to_string()
}

fn default_model_version() -> String {
    "1.0".to_string()
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            version: default_model_version(),
            languages: Vec::new(),
        }
    }
}

/// Scoring constants. Must satisfy `min_confidence <= base_confidence <= max_confidence`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f64,
    #[serde(default = "default_context_weight")]
    pub context_weight: f64,
    #[serde(default = "default_modifier_weight")]
    pub modifier_weight: f64,
    #[serde(default = "default_neutral_threshold")]
    pub neutral_threshold: f64,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    #[serde(default = "default_max_confidence")]
    pub max_confidence: f64,
}

fn default_base_confidence() -> f64 {
    0.6
}
fn default_keyword_weight() -> f64 {
    1.0
}
fn default_context_weight() -> f64 {
    0.3
}
fn default_modifier_weight() -> f64 {
    1.0
}
fn default_neutral_threshold() -> f64 {
    0.1
}
fn default_min_confidence() -> f64 {
    0.1
}
fn default_max_confidence() -> f64 {
    0.95
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            base_confidence: default_base_confidence(),
            keyword_weight: default_keyword_weight(),
            context_weight: default_context_weight(),
            modifier_weight: default_modifier_weight(),
            neutral_threshold: default_neutral_threshold(),
            min_confidence: default_min_confidence(),
            max_confidence: default_max_confidence(),
        }
    }
}

impl AlgorithmConfig {
    fn validate(&self) -> Result<()> {
        let ordered = self.min_confidence <= self.base_confidence
            && self.base_confidence <= self.max_confidence;
        let in_range = (0.0..=1.0).contains(&self.min_confidence)
            && (0.0..=1.0).contains(&self.max_confidence);
        if !ordered || !in_range {
            return Err(Error::config(format!(
                "lexicon confidences must satisfy 0 <= min ({}) <= base ({}) <= max ({}) <= 1",
                self.min_confidence, self.base_confidence, self.max_confidence
            )));
        }
        Ok(())
    }
}

/// A word that scales (or, with a negative weight, inverts) keyword scores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensityModifier {
    pub term: String,
    pub weight: f64,
}

/// Movie-domain phrases matched by substring against the whole text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextBoosters {
    #[serde(default)]
    pub movie_terms: Vec<String>,
    #[serde(default, alias = "strong_positive")]
    pub positive_context: Vec<String>,
    #[serde(default, alias = "strong_negative")]
    pub negative_context: Vec<String>,
}

/// Complete keyword sentiment model
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordSentimentModel {
    pub model_info: ModelInfo,
    pub positive_keywords: HashSet<String>,
    pub negative_keywords: HashSet<String>,
    pub neutral_indicators: HashSet<String>,
    /// Applied in this order
    pub intensity_modifiers: Vec<IntensityModifier>,
    pub context_boosters: ContextBoosters,
    pub algorithm: AlgorithmConfig,
}

/// Keyword list as it appears in lexicon files: flat, or grouped by language
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WordList {
    Flat(Vec<String>),
    ByLanguage(BTreeMap<String, Vec<String>>),
}

impl Default for WordList {
    fn default() -> Self {
        Self::Flat(Vec::new())
    }
}

impl WordList {
    fn into_set(self) -> HashSet<String> {
        let words: Box<dyn Iterator<Item = String>> = match self {
            Self::Flat(words) => Box::new(words.into_iter()),
            Self::ByLanguage(groups) => Box::new(groups.into_values().flatten()),
        };
        words
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect()
    }
}

/// On-disk lexicon layout
#[derive(Debug, Deserialize)]
struct LexiconFile {
    #[serde(default)]
    model_info: ModelInfo,
    #[serde(default)]
    positive_keywords: WordList,
    #[serde(default)]
    negative_keywords: WordList,
    #[serde(default)]
    neutral_indicators: WordList,
    #[serde(default, deserialize_with = "ordered_modifiers")]
    intensity_modifiers: Vec<IntensityModifier>,
    #[serde(default)]
    context_patterns: ContextBoosters,
    #[serde(default)]
    algorithm: AlgorithmConfig,
}

/// Read a JSON object of `term -> weight` keeping document order
fn ordered_modifiers<'de, D>(deserializer: D) -> std::result::Result<Vec<IntensityModifier>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ModifierVisitor;

    impl<'de> Visitor<'de> for ModifierVisitor {
        type Value = Vec<IntensityModifier>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of modifier term to weight")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut modifiers = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((term, weight)) = map.next_entry::<String, f64>()? {
                let term = term.trim().to_lowercase();
                if term.is_empty() || modifiers.iter().any(|m: &IntensityModifier| m.term == term) {
                    continue;
                }
                modifiers.push(IntensityModifier { term, weight });
            }
            Ok(modifiers)
        }
    }

    deserializer.deserialize_map(ModifierVisitor)
}

fn lowercase_all(terms: Vec<String>) -> Vec<String> {
    terms
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Factories for keyword sentiment models
pub struct KeywordLexicon;

impl KeywordLexicon {
    /// Parse a lexicon JSON blob
    pub fn from_json(json: &str) -> Result<KeywordSentimentModel> {
        let file: LexiconFile = serde_json::from_str(json)?;
        file.algorithm.validate()?;

        Ok(KeywordSentimentModel {
            model_info: file.model_info,
            positive_keywords: file.positive_keywords.into_set(),
            negative_keywords: file.negative_keywords.into_set(),
            neutral_indicators: file.neutral_indicators.into_set(),
            intensity_modifiers: file.intensity_modifiers,
            context_boosters: ContextBoosters {
                movie_terms: lowercase_all(file.context_patterns.movie_terms),
                positive_context: lowercase_all(file.context_patterns.positive_context),
                negative_context: lowercase_all(file.context_patterns.negative_context),
            },
            algorithm: file.algorithm,
        })
    }

    /// Load a lexicon file
    pub fn from_file(path: impl AsRef<Path>) -> Result<KeywordSentimentModel> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::asset(format!(
                "failed to read lexicon {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Load `path` if given and valid, otherwise the built-in lexicon
    pub fn load_or_default(path: Option<&Path>) -> KeywordSentimentModel {
        match path {
            Some(path) => match Self::from_file(path) {
                Ok(model) => {
                    tracing::info!(
                        path = %path.display(),
                        name = %model.model_info.name,
                        "Loaded keyword lexicon"
                    );
                    model
                }
                Err(e) => {
                    tracing::warn!("Falling back to built-in lexicon: {}", e);
                    Self::default_model()
                }
            },
            None => Self::default_model(),
        }
    }

    /// Built-in multilingual movie-review lexicon
    pub fn default_model() -> KeywordSentimentModel {
        let set = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<HashSet<_>>();
        let list = |words: &[&str]| words.iter().map(|w| w.to_string()).collect::<Vec<_>>();

        let positive_keywords = set(&[
            // en
            "good", "great", "excellent", "amazing", "awesome", "fantastic", "wonderful",
            "love", "loved", "brilliant", "superb", "outstanding", "enjoyed", "beautiful",
            "perfect", "best", "fun", "funny", "captivating", "stunning", "impressive",
            "delightful", "masterful", "moving", "recommend",
            // es
            "bueno", "buena", "excelente", "increíble", "genial", "maravillosa", "encantó",
            // fr
            "bon", "bonne", "magnifique", "génial", "superbe", "formidable",
            // de
            "gut", "toll", "wunderbar", "großartig", "spannend",
            // pt
            "ótimo", "ótima", "maravilhoso", "incrível",
        ]);

        let negative_keywords = set(&[
            // en
            "bad", "terrible", "awful", "boring", "worst", "horrible", "hate", "hated",
            "disappointing", "disappointed", "waste", "dull", "poor", "weak", "predictable",
            "stupid", "mess", "annoying", "pointless", "overrated",
            // es
            "malo", "mala", "aburrida", "aburrido", "pésima", "horrible",
            // fr
            "mauvais", "nul", "ennuyeux", "décevant",
            // de
            "schlecht", "langweilig", "enttäuschend",
            // pt
            "ruim", "chato", "péssimo",
        ]);

        let neutral_indicators = set(&[
            "okay", "ok", "average", "fine", "decent", "normal", "standard", "regular",
            "passable", "moyen", "durchschnittlich", "mediano", "mediana",
        ]);

        let intensity_modifiers = [
            ("absolutely", 1.5),
            ("extremely", 1.8),
            ("incredibly", 1.7),
            ("truly", 1.4),
            ("highly", 1.4),
            ("very", 1.3),
            ("really", 1.2),
            ("muy", 1.3),
            ("très", 1.3),
            ("sehr", 1.3),
            ("slightly", 0.7),
            ("somewhat", 0.8),
            ("barely", 0.5),
            ("not", -1.0),
            ("n't", -1.0),
            ("never", -1.0),
            ("nunca", -1.0),
            ("jamais", -1.0),
            ("nicht", -1.0),
        ]
        .iter()
        .map(|(term, weight)| IntensityModifier {
            term: term.to_string(),
            weight: *weight,
        })
        .collect();

        let context_boosters = ContextBoosters {
            movie_terms: list(&[
                "movie", "film", "cinema", "plot", "actor", "actress", "director", "scene",
                "soundtrack", "cast", "película", "filme",
            ]),
            positive_context: list(&[
                "masterpiece", "must see", "must-see", "must watch", "oscar worthy",
                "edge of my seat", "obra maestra", "chef-d'œuvre", "meisterwerk",
            ]),
            negative_context: list(&[
                "waste of time", "fell asleep", "walked out", "plot holes", "money back",
                "pérdida de tiempo", "zeitverschwendung",
            ]),
        };

        KeywordSentimentModel {
            model_info: ModelInfo {
                name: "cinesense-default-lexicon".to_string(),
                version: "1.0".to_string(),
                languages: list(&["en", "es", "fr", "de", "pt"]),
            },
            positive_keywords,
            negative_keywords,
            neutral_indicators,
            intensity_modifiers,
            context_boosters,
            algorithm: AlgorithmConfig::default(),
        }
    }
}

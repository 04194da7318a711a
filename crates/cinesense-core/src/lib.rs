//! CineSense Core
//!
//! Core types and utilities shared across CineSense components.
//!
//! This crate provides:
//! - The sentiment data model (labels, immutable results)
//! - Runtime tiers used for backend recommendation and fallback ordering
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{RuntimeTier, SentimentLabel, SentimentResult, DEFAULT_NEUTRAL_CONFIDENCE};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{RuntimeTier, SentimentLabel, SentimentResult};
}

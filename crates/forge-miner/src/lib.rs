//! Pattern mining and automation suggestions
//!
//! Analyzes the state-change history over a sliding window and proposes
//! ranked draft automations:
//!
//! 1. discretize transitions into hour-of-day x weekday buckets
//! 2. count per-entity transition frequencies
//! 3. detect lagged co-occurrence between entity pairs
//! 4. rank by confidence, filter by support, truncate
//! 5. render each survivor into a draft automation via the synthesizer
//!
//! Mining operates on an immutable [`forge_store::EventLogSnapshot`] and may
//! run concurrently with validation and deployment; batches can be
//! cooperatively cancelled between entities, never mid-batch.

mod patterns;
mod suggestions;

use chrono::Duration;

pub use patterns::{ActivityProfile, CandidatePattern, PatternMiner};
pub use suggestions::{
    SuggestError, SuggestResult, SuggestionCandidate, SuggestionEngine, SuggestionStatus,
};

/// Mining knobs, consumed as-is; the caller pre-validates them
#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Sliding analysis window
    pub window: Duration,
    /// Maximum trigger-to-effect lag for a co-occurrence
    pub lag: Duration,
    /// Minimum co-occurrence count for a pattern to qualify
    pub suggestion_threshold: u64,
    /// Maximum suggestions returned per run
    pub max_suggestions: usize,
    /// Minimum confidence for a pattern to qualify
    pub min_confidence: f64,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            window: Duration::days(7),
            lag: Duration::seconds(60),
            suggestion_threshold: 3,
            max_suggestions: 5,
            min_confidence: 0.0,
        }
    }
}

//! Suggestion engine: mined patterns rendered into draft automations

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use forge_document::ConfigDocument;
use forge_store::EventLogSnapshot;
use forge_synthesizer::{DocumentSynthesizer, SynthError};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::patterns::{CandidatePattern, PatternMiner};
use crate::MinerConfig;

/// Suggestion errors
#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("failed to render draft automation: {0}")]
    Synthesis(#[from] SynthError),
}

/// Result type for suggestion operations
pub type SuggestResult<T> = Result<T, SuggestError>;

/// Review status of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuggestionStatus {
    /// Awaiting explicit confirmation; never deployed from this state
    #[default]
    Proposed,
    /// Confirmed by the caller; may proceed to validation and testing
    Accepted,
    /// Rejected by the caller
    Dismissed,
}

/// A ranked automation suggestion
#[derive(Debug, Clone)]
pub struct SuggestionCandidate {
    /// The mined pattern behind the suggestion
    pub pattern: CandidatePattern,
    /// Co-occurrence count
    pub support: u64,
    /// support / trigger transitions, in [0, 1]
    pub confidence: f64,
    /// Short human-readable summary
    pub title: String,
    /// Longer explanation with the statistics spelled out
    pub description: String,
    /// Synthesizer-rendered draft automation
    pub draft: ConfigDocument,
    /// Review status
    pub status: SuggestionStatus,
}

impl SuggestionCandidate {
    /// Confirm the suggestion for the validation/test pipeline
    pub fn accept(&mut self) {
        self.status = SuggestionStatus::Accepted;
    }

    /// Reject the suggestion
    pub fn dismiss(&mut self) {
        self.status = SuggestionStatus::Dismissed;
    }
}

/// The suggestion engine
pub struct SuggestionEngine {
    miner: PatternMiner,
    synthesizer: Arc<DocumentSynthesizer>,
    config: MinerConfig,
}

impl SuggestionEngine {
    /// Create an engine with the given knobs and synthesizer
    pub fn new(config: MinerConfig, synthesizer: Arc<DocumentSynthesizer>) -> Self {
        Self {
            miner: PatternMiner::new(config.clone()),
            synthesizer,
            config,
        }
    }

    /// Snapshot the store over the configured window and suggest from it
    pub fn suggest_from_store(
        &self,
        store: &forge_store::EntityStateStore,
    ) -> SuggestResult<Vec<SuggestionCandidate>> {
        let snapshot = store.events_window(self.config.window);
        self.suggest(&snapshot)
    }

    /// Mine the snapshot and render the top suggestions
    pub fn suggest(&self, snapshot: &EventLogSnapshot) -> SuggestResult<Vec<SuggestionCandidate>> {
        let never = AtomicBool::new(false);
        self.suggest_with_cancel(snapshot, &never)
    }

    /// Like [`SuggestionEngine::suggest`], checking `cancel` between mining
    /// batches
    #[instrument(skip(self, snapshot, cancel))]
    pub fn suggest_with_cancel(
        &self,
        snapshot: &EventLogSnapshot,
        cancel: &AtomicBool,
    ) -> SuggestResult<Vec<SuggestionCandidate>> {
        let patterns = self.miner.analyze_with_cancel(snapshot, cancel);

        let mut suggestions = Vec::new();
        for pattern in patterns.into_iter().take(self.config.max_suggestions) {
            suggestions.push(self.render(pattern)?);
        }

        debug!(count = suggestions.len(), "suggestions rendered");
        Ok(suggestions)
    }

    fn render(&self, pattern: CandidatePattern) -> SuggestResult<SuggestionCandidate> {
        let title = format!(
            "Turn {} {} when {} turns {}",
            pattern.effect_state, pattern.effect_entity, pattern.trigger_entity, pattern.trigger_state
        );
        let description = format!(
            "{} was observed following {} within the lag window {} times \
             ({:.0}% of that entity's transitions). Review before deploying.",
            pattern.effect_entity,
            pattern.trigger_entity,
            pattern.support,
            pattern.confidence * 100.0
        );

        let trigger = self.synthesizer.state_trigger(
            &pattern.trigger_entity.to_string(),
            &pattern.trigger_state,
        )?;
        let action = self
            .synthesizer
            .control_action(&pattern.effect_entity, &pattern.effect_state)?;
        let draft =
            self.synthesizer
                .build_automation(title.clone(), vec![trigger], Vec::new(), vec![action])?;

        Ok(SuggestionCandidate {
            support: pattern.support,
            confidence: pattern.confidence,
            title,
            description,
            draft,
            pattern,
            status: SuggestionStatus::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::transition;
    use chrono::{Duration, Utc};
    use forge_document::{Action, DocumentBody, DocumentKind, Trigger};
    use forge_store::EntityStateStore;
    use forge_templates::TemplateLibrary;
    use std::collections::HashMap;

    fn engine_and_snapshot(threshold: u64) -> (SuggestionEngine, EventLogSnapshot) {
        let store = Arc::new(EntityStateStore::new());
        let now = Utc::now();
        for (id, state) in [
            ("binary_sensor.motion", "off"),
            ("light.hallway", "off"),
        ] {
            store
                .load_record(forge_core::EntityRecord::new(
                    id.parse().unwrap(),
                    state,
                    HashMap::new(),
                    now,
                ));
        }

        // Motion followed by the hallway light, five evenings in a row
        let base = Utc::now() - Duration::days(6);
        for day in 0..5 {
            let t = base + Duration::days(day);
            store
                .record_event(transition("binary_sensor.motion", "off", "on", t))
                .unwrap();
            store
                .record_event(transition(
                    "light.hallway",
                    "off",
                    "on",
                    t + Duration::seconds(15),
                ))
                .unwrap();
            store
                .record_event(transition(
                    "binary_sensor.motion",
                    "on",
                    "off",
                    t + Duration::seconds(180),
                ))
                .unwrap();
        }
        let snapshot = store.events_window(Duration::days(30));

        let synthesizer = Arc::new(DocumentSynthesizer::new(
            Arc::new(TemplateLibrary::builtin()),
            store,
        ));
        let engine = SuggestionEngine::new(
            MinerConfig {
                suggestion_threshold: threshold,
                ..MinerConfig::default()
            },
            synthesizer,
        );
        (engine, snapshot)
    }

    #[test]
    fn test_single_candidate_with_expected_support() {
        let (engine, snapshot) = engine_and_snapshot(3);
        let suggestions = engine.suggest(&snapshot).unwrap();

        assert_eq!(suggestions.len(), 1);
        let s = &suggestions[0];
        assert_eq!(s.support, 5);
        assert_eq!(s.status, SuggestionStatus::Proposed);
        assert!(s.confidence > 0.0 && s.confidence <= 1.0);
        assert_eq!(s.title, "Turn on light.hallway when binary_sensor.motion turns on");
    }

    #[test]
    fn test_draft_is_complete_automation() {
        let (engine, snapshot) = engine_and_snapshot(3);
        let suggestions = engine.suggest(&snapshot).unwrap();
        let draft = &suggestions[0].draft;

        assert_eq!(draft.kind, DocumentKind::Automation);
        let DocumentBody::Automation(auto) = &draft.body else {
            panic!("expected automation body");
        };
        assert!(matches!(auto.triggers[0], Trigger::State(_)));
        let Action::Service(service) = &auto.actions[0] else {
            panic!("expected service action");
        };
        assert_eq!(service.service, "light.turn_on");
        assert!(draft.logical_id.starts_with("auto_"));
    }

    #[test]
    fn test_raising_threshold_never_increases_count() {
        let (engine_low, snapshot) = engine_and_snapshot(3);
        let (engine_high, _) = engine_and_snapshot(6);

        let low = engine_low.suggest(&snapshot).unwrap().len();
        let high = engine_high.suggest(&snapshot).unwrap().len();
        assert!(high <= low);
        assert_eq!(high, 0);
    }

    #[test]
    fn test_status_transitions() {
        let (engine, snapshot) = engine_and_snapshot(3);
        let mut suggestions = engine.suggest(&snapshot).unwrap();

        suggestions[0].accept();
        assert_eq!(suggestions[0].status, SuggestionStatus::Accepted);
        suggestions[0].dismiss();
        assert_eq!(suggestions[0].status, SuggestionStatus::Dismissed);
    }

    #[test]
    fn test_cancelled_mining_yields_no_suggestions() {
        let (engine, snapshot) = engine_and_snapshot(3);
        let cancelled = AtomicBool::new(true);
        let suggestions = engine.suggest_with_cancel(&snapshot, &cancelled).unwrap();
        assert!(suggestions.is_empty());
    }
}

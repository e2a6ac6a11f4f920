//! Drives one journal submission from local screening to a committed entry.
//!
//! Every accepted submission ends in a commit. When the analysis service is
//! unreachable or declines the entry, the entry is still recorded with the
//! local risk assessment and fallback response text ("degraded" commit).

use crate::analysis::{AnalysisError, AnalysisService};
use crate::entry::{JournalEntry, SuggestedAction};
use crate::resources::{ResourceBundle, ResourceSelector};
use crate::risk::{RiskCategory, RiskClassifier};
use crate::store::EntryStore;
use chrono::Local;
use std::sync::{Arc, Mutex};

/// Response recorded when the analysis service cannot be reached.
pub const FALLBACK_RESPONSE: &str =
    "I couldn't process your journal entry right now, but it has been saved. Please try again later.";

/// Response recorded when the service succeeds without any response text.
pub const EMPTY_RESPONSE: &str = "I'm glad to hear from you today! How can I help support you?";

/// Sentiment recorded when the service succeeds without a label.
pub const DEFAULT_SENTIMENT: &str = "balanced";

const CREATED_AT_FORMAT: &str = "%A, %B %-d, %Y %-I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Evaluating,
    AwaitingRemote,
    Merging,
    Committed,
    Degraded,
}

impl SubmissionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            SubmissionState::Evaluating | SubmissionState::AwaitingRemote | SubmissionState::Merging
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Journal entry is empty")]
    EmptyEntry,
}

/// What the caller gets back from a submission.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    pub entry: JournalEntry,
    /// Present only when the merged risk signal is set.
    pub resources: Option<ResourceBundle>,
    /// Category the local classifier matched, if any.
    pub local_category: Option<RiskCategory>,
    /// Why the analysis service could not be used, for degraded commits.
    pub remote_failure: Option<String>,
    /// Advisories the user should see, e.g. a failed save.
    pub warnings: Vec<String>,
}

impl SubmissionOutcome {
    pub fn is_degraded(&self) -> bool {
        self.remote_failure.is_some()
    }
}

struct Merged {
    is_concerning: bool,
    sentiment: Option<String>,
    response: String,
    suggestions: Vec<SuggestedAction>,
    server_resources: Option<ResourceBundle>,
    remote_failure: Option<String>,
}

pub struct SubmissionOrchestrator {
    classifier: RiskClassifier,
    analysis: Arc<dyn AnalysisService>,
    selector: ResourceSelector,
    store: Arc<tokio::sync::Mutex<EntryStore>>,
    state: Mutex<SubmissionState>,
    // held for a whole submission so commits land in call order
    single_flight: tokio::sync::Mutex<()>,
}

impl SubmissionOrchestrator {
    pub fn new(
        analysis: Arc<dyn AnalysisService>,
        store: Arc<tokio::sync::Mutex<EntryStore>>,
    ) -> Self {
        Self {
            classifier: RiskClassifier::new(),
            analysis,
            selector: ResourceSelector::new(),
            store,
            state: Mutex::new(SubmissionState::Idle),
            single_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_selector(mut self, selector: ResourceSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn store(&self) -> Arc<tokio::sync::Mutex<EntryStore>> {
        Arc::clone(&self.store)
    }

    pub fn state(&self) -> SubmissionState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(SubmissionState::Idle)
    }

    fn transition(&self, next: SubmissionState) {
        if let Ok(mut state) = self.state.lock() {
            log::debug!("Submission state {:?} -> {:?}", *state, next);
            *state = next;
        }
    }

    pub async fn submit(&self, text: &str) -> Result<SubmissionOutcome, SubmissionError> {
        if text.trim().is_empty() {
            return Err(SubmissionError::EmptyEntry);
        }

        let _guard = self.single_flight.lock().await;

        self.transition(SubmissionState::Evaluating);
        let local_category = self.classifier.first_match(text);
        let local_flag = local_category.is_some();
        if let Some(category) = local_category {
            log::info!("Local classifier flagged entry ({category})");
        }

        self.transition(SubmissionState::AwaitingRemote);
        let remote = self.analysis.analyze(text).await;

        let merged = match remote {
            Ok(report) => {
                self.transition(SubmissionState::Merging);
                if local_flag && !report.is_concerning {
                    log::info!("Analysis service did not flag a locally flagged entry; keeping flag");
                }
                Merged {
                    is_concerning: report.is_concerning || local_flag,
                    sentiment: Some(
                        report
                            .sentiment
                            .filter(|s| !s.trim().is_empty())
                            .unwrap_or_else(|| DEFAULT_SENTIMENT.to_string()),
                    ),
                    response: report
                        .response
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| EMPTY_RESPONSE.to_string()),
                    suggestions: report.suggestions.unwrap_or_default(),
                    server_resources: report.resources,
                    remote_failure: None,
                }
            }
            Err(e) => {
                log::warn!("{e}; recording entry with fallback response");
                Merged {
                    is_concerning: local_flag,
                    sentiment: None,
                    response: degraded_response(&e),
                    suggestions: Vec::new(),
                    server_resources: None,
                    remote_failure: Some(e.to_string()),
                }
            }
        };

        let resources = if merged.is_concerning {
            Some(self.selector.select(merged.server_resources))
        } else {
            None
        };

        let now = Local::now();
        let mut store = self.store.lock().await;
        let entry = JournalEntry {
            id: store.next_id(&now),
            content: text.to_string(),
            created_at: now.format(CREATED_AT_FORMAT).to_string(),
            sentiment: merged.sentiment,
            is_concerning: merged.is_concerning,
            ai_response: merged.response,
            suggestions: merged.suggestions,
        };

        let mut warnings = Vec::new();
        if let Err(e) = store.commit(entry.clone()) {
            warnings.push(format!("{e}. This entry may not be available after restarting."));
        }
        drop(store);

        self.transition(if merged.remote_failure.is_some() {
            SubmissionState::Degraded
        } else {
            SubmissionState::Committed
        });

        Ok(SubmissionOutcome {
            entry,
            resources,
            local_category,
            remote_failure: merged.remote_failure,
            warnings,
        })
    }
}

fn degraded_response(error: &AnalysisError) -> String {
    error
        .fallback_response()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(FALLBACK_RESPONSE)
        .to_string()
}

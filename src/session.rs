use crate::entry::JournalEntry;
use crate::orchestrator::{SubmissionError, SubmissionOrchestrator, SubmissionOutcome};
use crate::resources::{ResourceBundle, ResourceSelector};
use crate::risk::{RiskCategory, RiskClassifier};
use crate::store::{StoreError, StoreSummary};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Write something before submitting")]
    EmptyDraft,
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("No saved entry with id {0}")]
    UnknownEntry(String),
    #[error("Clearing all entries needs explicit confirmation")]
    ClearNotConfirmed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the journal screen is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Draft,
    Result,
    Viewing(String),
}

/// Composition root between the presentation layer and the pipeline.
pub struct Session {
    orchestrator: SubmissionOrchestrator,
    classifier: RiskClassifier,
    selector: ResourceSelector,
    draft: String,
    view: View,
    last_outcome: Option<SubmissionOutcome>,
}

impl Session {
    pub fn new(orchestrator: SubmissionOrchestrator) -> Self {
        Self {
            orchestrator,
            classifier: RiskClassifier::new(),
            selector: ResourceSelector::new(),
            draft: String::new(),
            view: View::Draft,
            last_outcome: None,
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Append dictated text, separated from what is already there by one space.
    pub fn append_transcript(&mut self, transcript: &str) {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return;
        }
        if !self.draft.is_empty() && !self.draft.ends_with(char::is_whitespace) {
            self.draft.push(' ');
        }
        self.draft.push_str(transcript);
    }

    /// Advisory check while composing. Callers debounce.
    pub fn advisory(&self) -> Option<RiskCategory> {
        self.classifier.first_match(&self.draft)
    }

    pub fn can_submit(&self) -> bool {
        !self.draft.trim().is_empty() && !self.orchestrator.state().is_in_flight()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn last_outcome(&self) -> Option<&SubmissionOutcome> {
        self.last_outcome.as_ref()
    }

    pub async fn submit(&mut self) -> Result<&SubmissionOutcome, SessionError> {
        if self.draft.trim().is_empty() {
            return Err(SessionError::EmptyDraft);
        }

        let outcome = self.orchestrator.submit(&self.draft).await?;
        for warning in &outcome.warnings {
            log::warn!("{warning}");
        }
        self.view = View::Result;
        Ok(self.last_outcome.insert(outcome))
    }

    /// Discard the draft and the last result and start a fresh entry.
    pub fn new_entry(&mut self) {
        self.draft.clear();
        self.last_outcome = None;
        self.view = View::Draft;
    }

    pub async fn entries(&self) -> Vec<JournalEntry> {
        self.orchestrator.store().lock().await.entries().to_vec()
    }

    pub async fn summary(&self) -> StoreSummary {
        self.orchestrator.store().lock().await.summary()
    }

    pub async fn load_warnings(&self) -> Vec<String> {
        self.orchestrator.store().lock().await.load_warnings().to_vec()
    }

    pub async fn select_entry(&mut self, id: &str) -> Result<JournalEntry, SessionError> {
        let store = self.orchestrator.store();
        let store = store.lock().await;
        let entry = store
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownEntry(id.to_string()))?;
        self.view = View::Viewing(entry.id.clone());
        Ok(entry)
    }

    pub async fn selected_entry(&self) -> Option<JournalEntry> {
        match &self.view {
            View::Viewing(id) => self.orchestrator.store().lock().await.get(id).cloned(),
            _ => None,
        }
    }

    /// Leave the saved-entry view; the draft is kept.
    pub fn close_entry(&mut self) {
        if matches!(self.view, View::Viewing(_)) {
            self.view = if self.last_outcome.is_some() {
                View::Result
            } else {
                View::Draft
            };
        }
    }

    /// Support resources for a saved entry; only concerning entries get any.
    pub fn resources_for(&self, entry: &JournalEntry) -> Option<ResourceBundle> {
        entry.is_concerning.then(|| self.selector.select(None))
    }

    pub async fn clear_all(&mut self, confirmed: bool) -> Result<(), SessionError> {
        if !confirmed {
            return Err(SessionError::ClearNotConfirmed);
        }
        self.orchestrator.store().lock().await.clear_all()?;
        if matches!(self.view, View::Viewing(_)) {
            self.view = View::Draft;
        }
        Ok(())
    }
}

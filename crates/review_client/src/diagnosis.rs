//! Per-document diagnosis lifecycle: load, generate, version history and
//! feedback.
//!
//! History is the single source of truth and is kept newest first; the
//! current diagnosis is `history[0]` unless the latest generation attempt
//! failed, in which case the failure message takes its place.

use std::collections::HashSet;

use chrono::Utc;
use shared::{
    domain::{DiagnosisId, SummaryId},
    protocol::{
        DiagnosisVersion, Feedback, FeedbackRequest, GenerateDiagnosisRequest,
        GenerateDiagnosisResponse, Summary,
    },
};
use tracing::{info, warn};

use crate::{api::ReviewApi, error::ClientError};

pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate diagnosis.";
pub const FEEDBACK_CONFIRMATION: &str = "Thank you for your feedback!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Loading,
    Idle,
    Generating,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentDiagnosis<'a> {
    None,
    Stored(&'a DiagnosisVersion),
    Failed(&'a str),
}

/// Optional per-document loads that may fail without blocking the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubResource {
    Diagnosis,
    Feedback,
    History,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackForm {
    pub helpful: Option<bool>,
    pub comment: String,
}

/// Proof that a generation was started; hand it back to
/// [`DiagnosisWorkflow::finish_generate`].
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    epoch: u64,
    request: GenerateDiagnosisRequest,
}

impl GenerationTicket {
    pub fn request(&self) -> &GenerateDiagnosisRequest {
        &self.request
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Stored,
    Failed(ClientError),
    Discarded,
}

#[derive(Debug)]
pub struct DiagnosisWorkflow {
    summary_id: SummaryId,
    phase: WorkflowPhase,
    epoch: u64,
    summary: Option<Summary>,
    summary_error: Option<ClientError>,
    history: Vec<DiagnosisVersion>,
    generation_failure: Option<String>,
    existing_feedback: Option<Feedback>,
    degraded: Vec<SubResource>,
    form: FeedbackForm,
    confirmation: Option<String>,
}

impl DiagnosisWorkflow {
    pub fn new(summary_id: SummaryId) -> Self {
        Self {
            summary_id,
            phase: WorkflowPhase::Loading,
            epoch: 0,
            summary: None,
            summary_error: None,
            history: Vec::new(),
            generation_failure: None,
            existing_feedback: None,
            degraded: Vec::new(),
            form: FeedbackForm::default(),
            confirmation: None,
        }
    }

    /// Convenience for `new` followed by `load`.
    pub async fn open(api: &dyn ReviewApi, summary_id: SummaryId) -> Self {
        let mut workflow = Self::new(summary_id);
        // A fresh workflow is in `Loading`, the one phase `load` always accepts.
        let _ = workflow.load(api).await;
        workflow
    }

    pub fn summary_id(&self) -> SummaryId {
        self.summary_id
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    /// Why the summary could not be shown (not found, or a transport failure).
    pub fn summary_error(&self) -> Option<&ClientError> {
        self.summary_error.as_ref()
    }

    pub fn history(&self) -> &[DiagnosisVersion] {
        &self.history
    }

    pub fn existing_feedback(&self) -> Option<&Feedback> {
        self.existing_feedback.as_ref()
    }

    /// Sub-resources whose load failed for a reason other than "not found".
    pub fn degraded(&self) -> &[SubResource] {
        &self.degraded
    }

    pub fn feedback_form(&self) -> &FeedbackForm {
        &self.form
    }

    pub fn confirmation(&self) -> Option<&str> {
        self.confirmation.as_deref()
    }

    pub fn current(&self) -> CurrentDiagnosis<'_> {
        if let Some(message) = &self.generation_failure {
            return CurrentDiagnosis::Failed(message);
        }
        match self.history.first() {
            Some(version) => CurrentDiagnosis::Stored(version),
            None => CurrentDiagnosis::None,
        }
    }

    pub fn can_generate(&self) -> bool {
        self.phase == WorkflowPhase::Idle && self.summary.is_some()
    }

    /// Loads the summary, then diagnosis, feedback and history concurrently.
    /// Always ends in `Idle`; only calling it while generating or closed is
    /// an error.
    pub async fn load(&mut self, api: &dyn ReviewApi) -> Result<(), ClientError> {
        match self.phase {
            WorkflowPhase::Loading | WorkflowPhase::Idle => {}
            WorkflowPhase::Generating => {
                return Err(ClientError::InvalidState(
                    "cannot reload while a diagnosis is being generated".into(),
                ))
            }
            WorkflowPhase::Closed => {
                return Err(ClientError::InvalidState("document view is closed".into()))
            }
        }
        self.phase = WorkflowPhase::Loading;
        let id = self.summary_id;

        match api.get_summary(id).await {
            Ok(summary) => {
                self.summary = Some(summary);
                self.summary_error = None;
            }
            Err(err) => {
                warn!(summary_id = %id, error = %err, "diagnosis: summary load failed");
                self.summary = None;
                self.summary_error = Some(err);
                self.history.clear();
                self.existing_feedback = None;
                self.generation_failure = None;
                self.degraded.clear();
                self.confirmation = None;
                self.phase = WorkflowPhase::Idle;
                return Ok(());
            }
        }

        let (current, feedback, history) = tokio::join!(
            api.current_diagnosis(id),
            api.feedback(id),
            api.diagnosis_history(id),
        );

        self.degraded.clear();
        self.generation_failure = None;
        self.history = match history {
            Ok(history) => history,
            Err(err) => {
                self.absorb(SubResource::History, &err);
                Vec::new()
            }
        };
        match current {
            Ok(current) => self.merge_version(current.into()),
            Err(err) => self.absorb(SubResource::Diagnosis, &err),
        }
        sort_newest_first(&mut self.history);
        self.existing_feedback = match feedback {
            Ok(feedback) => Some(feedback),
            Err(err) => {
                self.absorb(SubResource::Feedback, &err);
                None
            }
        };

        info!(
            summary_id = %id,
            versions = self.history.len(),
            has_feedback = self.existing_feedback.is_some(),
            "diagnosis: document loaded"
        );
        self.phase = WorkflowPhase::Idle;
        Ok(())
    }

    /// Moves `Idle -> Generating`. Rejected while a generation is running.
    pub fn begin_generate(&mut self) -> Result<GenerationTicket, ClientError> {
        match self.phase {
            WorkflowPhase::Idle => {}
            WorkflowPhase::Generating => {
                return Err(ClientError::InvalidState(
                    "a diagnosis is already being generated".into(),
                ))
            }
            WorkflowPhase::Loading => {
                return Err(ClientError::InvalidState("document is still loading".into()))
            }
            WorkflowPhase::Closed => {
                return Err(ClientError::InvalidState("document view is closed".into()))
            }
        }
        let summary = self
            .summary
            .as_ref()
            .ok_or_else(|| ClientError::InvalidState("summary not loaded".into()))?;

        let request = GenerateDiagnosisRequest {
            summary: summary.body.clone(),
            summary_id: summary.id,
        };
        self.phase = WorkflowPhase::Generating;
        self.generation_failure = None;
        info!(summary_id = %self.summary_id, "diagnosis: generation started");
        Ok(GenerationTicket {
            epoch: self.epoch,
            request,
        })
    }

    /// Applies the collaborator's answer. Results for a closed view are dropped.
    pub fn finish_generate(
        &mut self,
        ticket: GenerationTicket,
        result: Result<GenerateDiagnosisResponse, ClientError>,
    ) -> GenerationOutcome {
        if ticket.epoch != self.epoch || self.phase != WorkflowPhase::Generating {
            warn!(summary_id = %self.summary_id, "diagnosis: discarding stale generation result");
            return GenerationOutcome::Discarded;
        }
        self.phase = WorkflowPhase::Idle;
        match result {
            Ok(response) => {
                self.history.insert(
                    0,
                    DiagnosisVersion {
                        id: None,
                        result: response.diagnosis,
                        created_at: Utc::now(),
                    },
                );
                info!(summary_id = %self.summary_id, versions = self.history.len(), "diagnosis: new version stored");
                GenerationOutcome::Stored
            }
            Err(err) => {
                warn!(summary_id = %self.summary_id, error = %err, "diagnosis: generation failed");
                self.generation_failure = Some(GENERATION_FAILED_MESSAGE.to_string());
                GenerationOutcome::Failed(err)
            }
        }
    }

    /// Full generate cycle, including the history refresh after success.
    pub async fn generate(&mut self, api: &dyn ReviewApi) -> Result<GenerationOutcome, ClientError> {
        let ticket = self.begin_generate()?;
        let result = api.generate_diagnosis(ticket.request()).await;
        let outcome = self.finish_generate(ticket, result);
        if outcome == GenerationOutcome::Stored {
            self.refresh_history(api).await;
        }
        Ok(outcome)
    }

    /// Replaces history with the server's, keeping locally appended versions
    /// the server has not echoed yet. Only server entries this workflow has
    /// not seen before can echo a local version, one each. Failures keep the
    /// local history.
    pub async fn refresh_history(&mut self, api: &dyn ReviewApi) {
        match api.diagnosis_history(self.summary_id).await {
            Ok(server) => {
                let known: HashSet<DiagnosisId> =
                    self.history.iter().filter_map(|v| v.id).collect();
                let mut unseen: Vec<&DiagnosisVersion> = server
                    .iter()
                    .filter(|v| !v.id.is_some_and(|id| known.contains(&id)))
                    .collect();
                let mut pending = Vec::new();
                for local in self.history.drain(..).filter(|v| v.id.is_none()) {
                    match unseen.iter().position(|v| v.result == local.result) {
                        Some(index) => {
                            unseen.swap_remove(index);
                        }
                        None => pending.push(local),
                    }
                }
                self.history = server;
                self.history.extend(pending);
                sort_newest_first(&mut self.history);
            }
            Err(err) => {
                warn!(summary_id = %self.summary_id, error = %err, "diagnosis: history refresh failed");
            }
        }
    }

    pub fn set_helpful(&mut self, helpful: Option<bool>) {
        self.form.helpful = helpful;
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.form.comment = comment.into();
    }

    /// Validates locally, then posts the form. On success the form is
    /// cleared; `existing_feedback` is left as loaded.
    pub async fn submit_feedback(&mut self, api: &dyn ReviewApi) -> Result<Feedback, ClientError> {
        self.confirmation = None;
        if self.phase == WorkflowPhase::Closed {
            return Err(ClientError::InvalidState("document view is closed".into()));
        }
        if self.history.is_empty() {
            return Err(ClientError::Validation(
                "generate a diagnosis before leaving feedback".into(),
            ));
        }
        let helpful = self.form.helpful.ok_or_else(|| {
            ClientError::Validation("please choose whether the diagnosis was helpful".into())
        })?;

        let request = FeedbackRequest {
            summary_id: self.summary_id,
            helpful,
            comment: self.form.comment.clone(),
        };
        let created = api.submit_feedback(&request).await.inspect_err(|err| {
            warn!(summary_id = %self.summary_id, error = %err, "diagnosis: feedback submission failed");
        })?;

        info!(summary_id = %self.summary_id, helpful, "diagnosis: feedback submitted");
        self.form = FeedbackForm::default();
        self.confirmation = Some(FEEDBACK_CONFIRMATION.to_string());
        Ok(created)
    }

    /// Navigation away: outstanding results arriving later are discarded.
    pub fn close(&mut self) {
        self.epoch += 1;
        self.phase = WorkflowPhase::Closed;
    }

    fn absorb(&mut self, resource: SubResource, err: &ClientError) {
        if err.is_not_found() {
            return;
        }
        warn!(summary_id = %self.summary_id, ?resource, error = %err, "diagnosis: optional load failed");
        self.degraded.push(resource);
    }

    fn merge_version(&mut self, version: DiagnosisVersion) {
        let known = self
            .history
            .iter()
            .any(|v| v.result == version.result && v.created_at == version.created_at);
        if !known {
            self.history.push(version);
        }
    }
}

fn sort_newest_first(history: &mut [DiagnosisVersion]) {
    history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

#[cfg(test)]
#[path = "tests/diagnosis_tests.rs"]
mod tests;

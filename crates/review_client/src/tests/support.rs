//! In-memory collaborator used by controller tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use shared::{
    domain::{FeedbackId, PatientId, SearchField, SummaryId},
    protocol::{
        Account, CurrentDiagnosisResponse, DiagnosisVersion, Feedback, FeedbackRequest,
        GenerateDiagnosisRequest, GenerateDiagnosisResponse, LoginRequest, Patient,
        RegisterRequest, Summary, SummaryPage, TokenResponse,
    },
};
use tokio::sync::oneshot;

use crate::{api::ReviewApi, error::ClientError, query::ListRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    List,
    Summary,
    Current,
    History,
    Generate,
    Feedback,
    SubmitFeedback,
    Patient,
}

type PageResult = Result<SummaryPage, ClientError>;

#[derive(Default)]
pub(crate) struct FakeApi {
    pub summaries: Vec<Summary>,
    pub patients: Vec<Patient>,
    pub generated_text: String,
    pub history: Mutex<Vec<DiagnosisVersion>>,
    pub current: Mutex<Option<CurrentDiagnosisResponse>>,
    pub feedback: Mutex<Option<Feedback>>,
    pub submitted: Mutex<Vec<FeedbackRequest>>,
    pub generate_requests: Mutex<Vec<GenerateDiagnosisRequest>>,
    pub list_calls: Mutex<Vec<ListRequest>>,
    history_lags: AtomicBool,
    failing: Mutex<HashSet<Op>>,
    list_gates: Mutex<HashMap<String, oneshot::Receiver<PageResult>>>,
    generate_gate: Mutex<Option<oneshot::Receiver<()>>>,
    calls: Mutex<Vec<Op>>,
}

pub(crate) fn summary(index: usize, keywords: &[&str]) -> Summary {
    Summary {
        id: SummaryId::new_v4(),
        patient_id: Some(PatientId::new(format!("p-{}", index % 3))),
        file_name: format!("note-{index:02}.txt"),
        body: format!("Summary body {index}"),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
            + ChronoDuration::minutes(index as i64),
        notes: None,
    }
}

pub(crate) fn version(result: &str, minutes: i64) -> DiagnosisVersion {
    DiagnosisVersion {
        id: Some(shared::domain::DiagnosisId::new_v4()),
        result: result.to_string(),
        created_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap()
            + ChronoDuration::minutes(minutes),
    }
}

impl FakeApi {
    pub fn with_summaries(summaries: Vec<Summary>) -> Self {
        Self {
            summaries,
            generated_text: "Likely viral upper respiratory infection.".into(),
            ..Self::default()
        }
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    /// Holds list responses for `term` until the returned sender fires.
    pub fn gate_list(&self, term: &str) -> oneshot::Sender<PageResult> {
        let (tx, rx) = oneshot::channel();
        self.list_gates.lock().unwrap().insert(term.to_string(), rx);
        tx
    }

    /// Generated diagnoses stop showing up in the history endpoint.
    pub fn lag_history(&self) {
        self.history_lags.store(true, Ordering::SeqCst);
    }

    pub fn gate_generate(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.generate_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn page_for(&self, request: &ListRequest) -> SummaryPage {
        let matching: Vec<&Summary> = self
            .summaries
            .iter()
            .filter(|summary| match &request.filter {
                None => true,
                Some(filter) => match filter.field {
                    SearchField::Keyword => summary.keywords.iter().any(|k| *k == filter.term),
                    SearchField::FileName => summary.file_name.contains(&filter.term),
                    SearchField::PatientId => summary
                        .patient_id
                        .as_ref()
                        .is_some_and(|id| id.as_str() == filter.term),
                },
            })
            .collect();
        let per_page = request.per_page as usize;
        let skip = (request.page as usize - 1) * per_page;
        SummaryPage {
            total: matching.len() as u64,
            summaries: matching.into_iter().skip(skip).take(per_page).cloned().collect(),
        }
    }

    fn enter(&self, op: Op) -> Result<(), ClientError> {
        self.calls.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(&op) {
            return Err(ClientError::Transport(format!("{op:?} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewApi for FakeApi {
    async fn list_summaries(&self, request: &ListRequest) -> Result<SummaryPage, ClientError> {
        self.list_calls.lock().unwrap().push(request.clone());
        self.enter(Op::List)?;
        let key = request
            .filter
            .as_ref()
            .map(|filter| filter.term.clone())
            .unwrap_or_default();
        let gate = self.list_gates.lock().unwrap().remove(&key);
        match gate {
            Some(gate) => gate
                .await
                .unwrap_or_else(|_| Err(ClientError::Transport("gate dropped".into()))),
            None => Ok(self.page_for(request)),
        }
    }

    async fn get_summary(&self, id: SummaryId) -> Result<Summary, ClientError> {
        self.enter(Op::Summary)?;
        self.summaries
            .iter()
            .find(|summary| summary.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Summary not found".into()))
    }

    async fn current_diagnosis(
        &self,
        _summary_id: SummaryId,
    ) -> Result<CurrentDiagnosisResponse, ClientError> {
        self.enter(Op::Current)?;
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::NotFound("no diagnosis".into()))
    }

    async fn diagnosis_history(
        &self,
        _summary_id: SummaryId,
    ) -> Result<Vec<DiagnosisVersion>, ClientError> {
        self.enter(Op::History)?;
        Ok(self.history.lock().unwrap().clone())
    }

    async fn generate_diagnosis(
        &self,
        request: &GenerateDiagnosisRequest,
    ) -> Result<GenerateDiagnosisResponse, ClientError> {
        self.generate_requests.lock().unwrap().push(request.clone());
        let gate = self.generate_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.enter(Op::Generate)?;
        let created = DiagnosisVersion {
            id: Some(shared::domain::DiagnosisId::new_v4()),
            result: self.generated_text.clone(),
            created_at: Utc::now(),
        };
        if !self.history_lags.load(Ordering::SeqCst) {
            self.history.lock().unwrap().push(created);
        }
        Ok(GenerateDiagnosisResponse {
            diagnosis: self.generated_text.clone(),
        })
    }

    async fn feedback(&self, _summary_id: SummaryId) -> Result<Feedback, ClientError> {
        self.enter(Op::Feedback)?;
        self.feedback
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::NotFound("no feedback".into()))
    }

    async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<Feedback, ClientError> {
        self.enter(Op::SubmitFeedback)?;
        self.submitted.lock().unwrap().push(request.clone());
        Ok(Feedback {
            id: FeedbackId::new_v4(),
            summary_id: request.summary_id,
            helpful: request.helpful,
            comment: Some(request.comment.clone()),
            created_at: Utc::now(),
        })
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, ClientError> {
        self.enter(Op::Patient)?;
        Ok(self.patients.clone())
    }

    async fn get_patient(&self, id: &PatientId) -> Result<Patient, ClientError> {
        self.enter(Op::Patient)?;
        self.patients
            .iter()
            .find(|patient| &patient.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Patient not found".into()))
    }

    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ClientError> {
        if request.password == "secret" {
            Ok(TokenResponse {
                access_token: format!("token-for-{}", request.email),
                token_type: None,
            })
        } else {
            Err(ClientError::Unauthorized("Invalid email or password.".into()))
        }
    }

    async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ClientError> {
        Ok(TokenResponse {
            access_token: format!("token-for-{}", request.username),
            token_type: Some("bearer".into()),
        })
    }

    async fn account(&self) -> Result<Account, ClientError> {
        Err(ClientError::Unauthorized("not signed in".into()))
    }
}

//! HTTP surface of the collaborator service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{PatientId, SummaryId},
    protocol::{
        Account, CurrentDiagnosisResponse, DiagnosisVersion, Feedback, FeedbackRequest,
        GenerateDiagnosisRequest, GenerateDiagnosisResponse, LoginRequest, Patient,
        RegisterRequest, Summary, SummaryPage, TokenResponse,
    },
};
use tracing::debug;
use url::Url;

use crate::{auth::AuthStore, error::ClientError, query::ListRequest};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ReviewApi: Send + Sync {
    async fn list_summaries(&self, request: &ListRequest) -> Result<SummaryPage, ClientError>;
    async fn get_summary(&self, id: SummaryId) -> Result<Summary, ClientError>;
    async fn current_diagnosis(
        &self,
        summary_id: SummaryId,
    ) -> Result<CurrentDiagnosisResponse, ClientError>;
    async fn diagnosis_history(
        &self,
        summary_id: SummaryId,
    ) -> Result<Vec<DiagnosisVersion>, ClientError>;
    async fn generate_diagnosis(
        &self,
        request: &GenerateDiagnosisRequest,
    ) -> Result<GenerateDiagnosisResponse, ClientError>;
    async fn feedback(&self, summary_id: SummaryId) -> Result<Feedback, ClientError>;
    async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<Feedback, ClientError>;
    async fn list_patients(&self) -> Result<Vec<Patient>, ClientError>;
    async fn get_patient(&self, id: &PatientId) -> Result<Patient, ClientError>;
    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ClientError>;
    async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ClientError>;
    async fn account(&self) -> Result<Account, ClientError>;
}

pub struct HttpReviewClient {
    http: Client,
    base_url: Url,
    timeout: Duration,
    auth: AuthStore,
}

impl HttpReviewClient {
    pub fn new(server_url: &str, timeout: Duration, auth: AuthStore) -> Result<Self, ClientError> {
        let trimmed = server_url.trim();
        if trimmed.is_empty() {
            return Err(ClientError::Validation("server url must not be empty".into()));
        }
        let base_url = Url::parse(trimmed)
            .map_err(|e| ClientError::Validation(format!("invalid server url '{trimmed}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Validation(format!(
                "server url '{trimmed}' cannot carry a path"
            )));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            timeout,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, %url, "api: issuing request");
        let builder = self.http.request(method, url);
        match self.auth.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status.as_u16(), &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::from_reqwest(e, self.timeout))
    }

    /// Some collaborator endpoints answer "nothing yet" with `200 null`.
    async fn send_optional<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, ClientError> {
        self.send::<Option<T>>(builder)
            .await?
            .ok_or_else(|| ClientError::NotFound(what.to_string()))
    }
}

#[async_trait]
impl ReviewApi for HttpReviewClient {
    async fn list_summaries(&self, request: &ListRequest) -> Result<SummaryPage, ClientError> {
        let builder = self
            .request(Method::GET, &["summaries"])
            .query(&request.query_pairs());
        self.send(builder).await
    }

    async fn get_summary(&self, id: SummaryId) -> Result<Summary, ClientError> {
        let id = id.to_string();
        self.send(self.request(Method::GET, &["summaries", &id]))
            .await
    }

    async fn current_diagnosis(
        &self,
        summary_id: SummaryId,
    ) -> Result<CurrentDiagnosisResponse, ClientError> {
        let id = summary_id.to_string();
        self.send_optional(
            self.request(Method::GET, &["diagnosis", &id]),
            "no diagnosis for summary",
        )
        .await
    }

    async fn diagnosis_history(
        &self,
        summary_id: SummaryId,
    ) -> Result<Vec<DiagnosisVersion>, ClientError> {
        let id = summary_id.to_string();
        self.send(self.request(Method::GET, &["diagnoses", &id]))
            .await
    }

    async fn generate_diagnosis(
        &self,
        request: &GenerateDiagnosisRequest,
    ) -> Result<GenerateDiagnosisResponse, ClientError> {
        self.send(self.request(Method::POST, &["diagnose"]).json(request))
            .await
    }

    async fn feedback(&self, summary_id: SummaryId) -> Result<Feedback, ClientError> {
        let id = summary_id.to_string();
        self.send_optional(
            self.request(Method::GET, &["feedback", &id]),
            "no feedback for summary",
        )
        .await
    }

    async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<Feedback, ClientError> {
        self.send(self.request(Method::POST, &["feedback"]).json(request))
            .await
    }

    async fn list_patients(&self) -> Result<Vec<Patient>, ClientError> {
        self.send(self.request(Method::GET, &["patients"])).await
    }

    async fn get_patient(&self, id: &PatientId) -> Result<Patient, ClientError> {
        self.send(self.request(Method::GET, &["patients", id.as_str()]))
            .await
    }

    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, ClientError> {
        self.send(self.request(Method::POST, &["login"]).json(request))
            .await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<TokenResponse, ClientError> {
        self.send(self.request(Method::POST, &["register"]).json(request))
            .await
    }

    async fn account(&self) -> Result<Account, ClientError> {
        self.send(self.request(Method::GET, &["account"])).await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;

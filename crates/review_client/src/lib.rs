//! Client core for browsing clinical summaries and reviewing their generated
//! diagnoses. Views own the controllers in this crate and render their state;
//! all network access goes through [`ReviewApi`].

pub mod api;
pub mod auth;
pub mod diagnosis;
pub mod error;
pub mod fetch;
pub mod patient;
pub mod query;

pub use api::{HttpReviewClient, ReviewApi, DEFAULT_REQUEST_TIMEOUT};
pub use auth::{AuthState, AuthStore};
pub use diagnosis::{CurrentDiagnosis, DiagnosisWorkflow, GenerationOutcome, WorkflowPhase};
pub use error::{ClientError, ErrorKind};
pub use fetch::{FetchCoordinator, FetchOutcome, SummaryListState};
pub use patient::PatientView;
pub use query::{ListFilter, ListRequest, QueryChange, QueryController, QueryState, DEFAULT_PAGE_SIZE};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

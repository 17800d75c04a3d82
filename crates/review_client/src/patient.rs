//! Patient header plus that patient's first page of documents.

use shared::{
    domain::PatientId,
    protocol::{Patient, SummaryPage},
};
use tracing::warn;

use crate::{api::ReviewApi, error::ClientError, query::ListRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientView {
    pub patient: Patient,
    pub summaries: SummaryPage,
    /// Set when the documents could not be listed; the header still shows.
    pub summaries_error: Option<ClientError>,
}

impl PatientView {
    pub async fn load(
        api: &dyn ReviewApi,
        patient_id: &PatientId,
        per_page: u32,
    ) -> Result<Self, ClientError> {
        let request = ListRequest::for_patient(patient_id, per_page);
        let (patient, summaries) = tokio::join!(api.get_patient(patient_id), api.list_summaries(&request));
        let patient = patient?;

        let (summaries, summaries_error) = match summaries {
            Ok(page) => (page, None),
            Err(err) => {
                warn!(patient_id = %patient_id, error = %err, "patient: summaries unavailable");
                (
                    SummaryPage {
                        summaries: Vec::new(),
                        total: 0,
                    },
                    Some(err),
                )
            }
        };
        Ok(Self {
            patient,
            summaries,
            summaries_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::SearchField;

    use super::*;
    use crate::test_support::{summary, FakeApi, Op};

    fn patient(id: &str) -> Patient {
        Patient {
            id: PatientId::new(id),
            name: "Jane Roe".into(),
            age: Some(54),
            gender: None,
            contact: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn loads_patient_and_their_documents() {
        let mut api = FakeApi::with_summaries((1..=7).map(|i| summary(i, &["fever"])).collect());
        api.patients = vec![patient("p-1")];

        let view = PatientView::load(&api, &PatientId::new("p-1"), 10)
            .await
            .expect("patient view");
        assert_eq!(view.patient.name, "Jane Roe");
        assert_eq!(view.summaries.total, 3);
        assert!(view.summaries_error.is_none());

        let calls = api.list_calls.lock().unwrap();
        let filter = calls[0].filter.as_ref().expect("filter");
        assert_eq!(filter.field, SearchField::PatientId);
        assert_eq!(filter.term, "p-1");
        assert_eq!(calls[0].page, 1);
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found() {
        let api = FakeApi::default();
        let err = PatientView::load(&api, &PatientId::new("nobody"), 10)
            .await
            .expect_err("missing");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn document_failure_leaves_list_empty() {
        let mut api = FakeApi::with_summaries(vec![summary(1, &[])]);
        api.patients = vec![patient("p-1")];
        api.fail(Op::List);

        let view = PatientView::load(&api, &PatientId::new("p-1"), 10)
            .await
            .expect("header still loads");
        assert!(view.summaries.summaries.is_empty());
        assert!(matches!(view.summaries_error, Some(ClientError::Transport(_))));
    }
}

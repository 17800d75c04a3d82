//! Drives `GET /summaries` from the query state and reconciles responses.
//!
//! Every issued request gets a token from a monotonically increasing counter.
//! Only the completion carrying the latest token may touch
//! [`SummaryListState`]; anything older is discarded on arrival.

use std::sync::Arc;

use shared::protocol::{Summary, SummaryPage};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    api::ReviewApi,
    error::ClientError,
    query::{ListRequest, QueryController},
};

/// Read-only view of the last applied list result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryListState {
    items: Vec<Summary>,
    total: u64,
    loading: bool,
    last_failure: Option<ClientError>,
    loaded_request: Option<ListRequest>,
}

impl SummaryListState {
    pub fn items(&self) -> &[Summary] {
        &self.items
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_failure(&self) -> Option<&ClientError> {
        self.last_failure.as_ref()
    }

    /// The request whose response is currently displayed.
    pub fn loaded_request(&self) -> Option<&ListRequest> {
        self.loaded_request.as_ref()
    }

    /// True once a fetch has landed and matched nothing.
    pub fn is_empty_result(&self) -> bool {
        !self.loading && self.loaded_request.is_some() && self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { request: ListRequest, total: u64 },
    Failed { request: ListRequest, error: ClientError },
    Discarded { token: u64 },
}

#[derive(Debug)]
struct FetchCompletion {
    token: u64,
    request: ListRequest,
    result: Result<SummaryPage, ClientError>,
}

pub struct FetchCoordinator {
    api: Arc<dyn ReviewApi>,
    latest_token: u64,
    last_issued: Option<ListRequest>,
    in_flight: Vec<JoinHandle<()>>,
    completions_tx: mpsc::UnboundedSender<FetchCompletion>,
    completions_rx: mpsc::UnboundedReceiver<FetchCompletion>,
    state: SummaryListState,
}

impl FetchCoordinator {
    pub fn new(api: Arc<dyn ReviewApi>) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            api,
            latest_token: 0,
            last_issued: None,
            in_flight: Vec::new(),
            completions_tx,
            completions_rx,
            state: SummaryListState::default(),
        }
    }

    pub fn state(&self) -> &SummaryListState {
        &self.state
    }

    pub fn latest_token(&self) -> u64 {
        self.latest_token
    }

    /// Issues a fetch if the controller's request differs from the last one
    /// issued. Returns the new token when a fetch went out.
    pub fn sync(&mut self, controller: &QueryController) -> Option<u64> {
        let request = controller.request();
        if self.last_issued.as_ref() == Some(&request) {
            return None;
        }
        Some(self.issue(request))
    }

    /// Re-issues the current request even if it was already sent.
    pub fn refresh(&mut self, controller: &QueryController) -> u64 {
        self.issue(controller.request())
    }

    fn issue(&mut self, request: ListRequest) -> u64 {
        self.latest_token += 1;
        let token = self.latest_token;
        self.in_flight.retain(|task| !task.is_finished());
        self.last_issued = Some(request.clone());
        self.state.loading = true;
        debug!(token, page = request.page, filter = ?request.filter, "fetch: issuing list request");

        let api = Arc::clone(&self.api);
        let tx = self.completions_tx.clone();
        let handle = tokio::spawn(async move {
            let result = api.list_summaries(&request).await;
            let _ = tx.send(FetchCompletion {
                token,
                request,
                result,
            });
        });
        self.in_flight.push(handle);
        token
    }

    /// Waits for the next completion and reconciles it. Pends while nothing
    /// is in flight, so callers select on it alongside input.
    pub async fn next_outcome(&mut self, controller: &mut QueryController) -> FetchOutcome {
        match self.completions_rx.recv().await {
            Some(completion) => self.apply(completion, controller),
            // The coordinator owns a sender, so the channel never closes.
            None => std::future::pending().await,
        }
    }

    /// Syncs, then waits until the issued request lands or fails. `None` when
    /// the current request was already issued.
    pub async fn settle(&mut self, controller: &mut QueryController) -> Option<FetchOutcome> {
        self.sync(controller)?;
        loop {
            match self.next_outcome(controller).await {
                FetchOutcome::Discarded { .. } => continue,
                outcome => return Some(outcome),
            }
        }
    }

    fn apply(&mut self, completion: FetchCompletion, controller: &mut QueryController) -> FetchOutcome {
        let FetchCompletion {
            token,
            request,
            result,
        } = completion;

        if token != self.latest_token {
            warn!(token, latest = self.latest_token, "fetch: discarding superseded response");
            return FetchOutcome::Discarded { token };
        }

        self.state.loading = false;
        match result {
            Ok(page) => {
                let total = page.total;
                info!(token, total, items = page.summaries.len(), "fetch: list applied");
                self.state.items = page.summaries;
                self.state.total = total;
                self.state.last_failure = None;
                self.state.loaded_request = Some(request.clone());
                controller.accept_total(&request, total);
                FetchOutcome::Applied { request, total }
            }
            Err(error) => {
                warn!(token, error = %error, "fetch: list request failed");
                self.state.last_failure = Some(error.clone());
                // Allow the same request to be retried by the next sync.
                self.last_issued = None;
                FetchOutcome::Failed { request, error }
            }
        }
    }

    /// Drops interest in everything outstanding, e.g. when the view closes.
    pub fn cancel(&mut self) {
        self.latest_token += 1;
        self.last_issued = None;
        self.state.loading = false;
        for task in self.in_flight.drain(..) {
            task.abort();
        }
        while self.completions_rx.try_recv().is_ok() {}
        debug!(token = self.latest_token, "fetch: cancelled outstanding requests");
    }
}

impl Drop for FetchCoordinator {
    fn drop(&mut self) {
        for task in self.in_flight.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/fetch_tests.rs"]
mod tests;

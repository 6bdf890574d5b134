use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use engine_logging::{engine_debug, engine_error};

use crate::client::{ApiClient, ApiSettings, ReqwestApiClient};
use crate::{ApiCall, EngineEvent, FetchError, RequestId};

enum EngineCommand {
    Submit { request_id: RequestId, call: ApiCall },
}

/// Runs backend calls on a tokio runtime thread and reports each completion.
///
/// Completions arrive in whatever order the backend answers.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    engine_error!("Could not start engine runtime: {}", err);
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                let client = client.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(client.as_ref(), command, event_tx).await;
                });
            }
        });

        Self { cmd_tx, event_rx }
    }

    pub fn with_settings(settings: ApiSettings) -> Result<Self, FetchError> {
        let client = ReqwestApiClient::new(settings)?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn submit(&self, request_id: RequestId, call: ApiCall) {
        let _ = self.cmd_tx.send(EngineCommand::Submit { request_id, call });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn handle_command(
    client: &dyn ApiClient,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::Submit { request_id, call } => {
            let result = match &call {
                ApiCall::FetchDiscussion { item } => client.fetch_discussion(item).await,
                ApiCall::Mutation(mutation) => client.send_mutation(mutation).await,
                ApiCall::FetchPage {
                    query,
                    page,
                    page_size,
                } => client.fetch_page(query, *page, *page_size).await,
                ApiCall::ReportFact {
                    subject_id,
                    fact_kind,
                } => client.report_fact(subject_id, fact_kind).await,
            };
            if let Err(err) = &result {
                engine_debug!("Request {} failed: {}", request_id, err);
            }
            let _ = event_tx.send(EngineEvent::Completed { request_id, result });
        }
    }
}

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use engine_logging::{engine_error, engine_info, engine_warn};
use readsync_core::{AwardKey, Effect, ItemId, Msg, MutationId, MutationRequest, RequestSeq};
use readsync_engine::{ApiCall, EngineEvent, EngineHandle, MutationCall, RequestId};

use super::persistence::LedgerStore;

/// What a pending engine request was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    Discussion {
        item: ItemId,
        reconcile: Option<MutationId>,
    },
    Mutation {
        mutation_id: MutationId,
    },
    Page {
        seq: RequestSeq,
        page: u32,
    },
    Fact {
        key: AwardKey,
    },
}

/// Turns core effects into engine requests and ledger writes, and engine
/// completions back into messages.
pub struct EffectRunner {
    engine: EngineHandle,
    ledger: LedgerStore,
    next_request: RequestId,
    pending: HashMap<RequestId, Origin>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, ledger: LedgerStore) -> Self {
        Self {
            engine,
            ledger,
            next_request: 0,
            pending: HashMap::new(),
        }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// No backend request is outstanding.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn run(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::FetchDiscussion { item, reconcile } => {
                    let call = ApiCall::FetchDiscussion { item: item.clone() };
                    self.submit(Origin::Discussion { item, reconcile }, call);
                }
                Effect::SendMutation {
                    mutation_id,
                    item,
                    request,
                } => {
                    engine_info!("SendMutation id={} kind={}", mutation_id, request.fact_kind());
                    let call = ApiCall::Mutation(map_mutation(item, request));
                    self.submit(Origin::Mutation { mutation_id }, call);
                }
                Effect::FetchPage {
                    seq,
                    query,
                    page,
                    page_size,
                } => {
                    let call = ApiCall::FetchPage {
                        query,
                        page,
                        page_size,
                    };
                    self.submit(Origin::Page { seq, page }, call);
                }
                Effect::ReportFact { key } => {
                    let call = ApiCall::ReportFact {
                        subject_id: key.subject_id.clone(),
                        fact_kind: key.fact_kind.clone(),
                    };
                    self.submit(Origin::Fact { key }, call);
                }
                Effect::PersistAward { key } => {
                    if let Err(err) = self.ledger.record(key) {
                        engine_error!("Failed to persist award: {}", err);
                    }
                }
                Effect::ClearLedger => {
                    if let Err(err) = self.ledger.clear() {
                        engine_error!("Failed to clear award ledger: {}", err);
                    }
                }
            }
        }
    }

    /// Wait up to `timeout` for the next completion and turn it into a message.
    pub fn poll(&mut self, timeout: Duration) -> Option<Msg> {
        let EngineEvent::Completed { request_id, result } = self.engine.recv_timeout(timeout)?;
        let Some(origin) = self.pending.remove(&request_id) else {
            engine_warn!("Completion for unknown request {}", request_id);
            return None;
        };
        let msg = match (origin, result) {
            (Origin::Discussion { item, reconcile }, Ok(body)) => Msg::DiscussionLoaded {
                item,
                reconcile,
                body,
                received_at: Utc::now(),
            },
            (Origin::Discussion { item, reconcile }, Err(err)) => Msg::DiscussionFailed {
                item,
                reconcile,
                message: err.to_string(),
            },
            (Origin::Mutation { mutation_id }, Ok(body)) => Msg::MutationConfirmed {
                mutation_id,
                body,
                received_at: Utc::now(),
            },
            (Origin::Mutation { mutation_id }, Err(err)) => {
                engine_warn!("Mutation {} failed: {}", mutation_id, err);
                Msg::MutationFailed {
                    mutation_id,
                    message: err.to_string(),
                }
            }
            (Origin::Page { seq, page }, Ok(body)) => Msg::PageLoaded { seq, page, body },
            (Origin::Page { seq, .. }, Err(err)) => Msg::PageFailed {
                seq,
                message: err.to_string(),
            },
            (Origin::Fact { key }, Ok(body)) => Msg::RewardReceived { key, body },
            (Origin::Fact { key }, Err(err)) => Msg::RewardFailed {
                key,
                message: err.to_string(),
            },
        };
        Some(msg)
    }

    fn submit(&mut self, origin: Origin, call: ApiCall) {
        self.next_request += 1;
        let request_id = self.next_request;
        self.pending.insert(request_id, origin);
        self.engine.submit(request_id, call);
    }
}

fn map_mutation(item: ItemId, request: MutationRequest) -> MutationCall {
    match request {
        MutationRequest::CreateReview { text } => MutationCall::CreateReview { item, text },
        MutationRequest::Reply { parent_id, text } => MutationCall::Reply {
            item,
            parent_id,
            text,
        },
        MutationRequest::Edit { node_id, text } => MutationCall::Edit {
            review_id: node_id,
            text,
        },
        MutationRequest::Delete { node_id } => MutationCall::Delete { review_id: node_id },
    }
}

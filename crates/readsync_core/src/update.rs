use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::reward::AwardKey;
use crate::{Effect, Msg, MutationRequest, ScreenState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: ScreenState, msg: Msg) -> (ScreenState, Vec<Effect>) {
    let effects = match msg {
        Msg::ItemOpened { item } => state.open_item(item),
        Msg::RefreshRequested => state.refresh(),
        Msg::DiscussionLoaded {
            item,
            reconcile,
            body,
            received_at,
        } => state.discussion_loaded(&item, reconcile, &body, received_at),
        Msg::DiscussionFailed {
            item,
            reconcile,
            message,
        } => state.discussion_failed(&item, reconcile, &message),
        Msg::PostRoot { text, at } => {
            state.begin_mutation(MutationRequest::CreateReview { text }, at)
        }
        Msg::PostReply {
            parent_id,
            text,
            at,
        } => state.begin_mutation(MutationRequest::Reply { parent_id, text }, at),
        Msg::EditRequested { node_id, text, at } => {
            state.begin_mutation(MutationRequest::Edit { node_id, text }, at)
        }
        Msg::DeleteRequested { node_id, at } => {
            state.begin_mutation(MutationRequest::Delete { node_id }, at)
        }
        Msg::MutationConfirmed {
            mutation_id,
            body,
            received_at,
        } => state.confirm_mutation(mutation_id, &body, received_at),
        Msg::MutationFailed {
            mutation_id,
            message,
        } => state.fail_mutation(mutation_id, &message),
        Msg::QueryChanged { query } => state.change_query(query),
        Msg::PageRequested { page } => state.request_page(page),
        Msg::PageLoaded { seq, page, body } => state.page_loaded(seq, page, &body),
        Msg::PageFailed { seq, message } => state.page_failed(seq, &message),
        Msg::FactReported { key } => report_fact(&mut state, key),
        Msg::RewardReceived { key, body } => {
            state.facts_in_flight.remove(&key);
            if state.grant_raw(key.clone(), &body) {
                vec![Effect::PersistAward { key }]
            } else {
                Vec::new()
            }
        }
        Msg::RewardFailed { key, message } => {
            state.facts_in_flight.remove(&key);
            engine_warn!(
                "Reporting {}/{} failed: {}",
                key.subject_id,
                key.fact_kind,
                message
            );
            Vec::new()
        }
        Msg::LedgerRestored(ledger) => {
            engine_debug!("Restored {} awarded facts", ledger.len());
            state.ledger.merge(ledger);
            state.mark_dirty();
            Vec::new()
        }
        Msg::SignedOut => {
            engine_info!("Signed out; clearing award ledger");
            state.ledger = Default::default();
            state.facts_in_flight.clear();
            state.rewards.queue_mut().clear();
            state.mark_dirty();
            vec![Effect::ClearLedger]
        }
        Msg::Tick { now } => {
            if state.rewards.queue_mut().tick(now) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::BannerDismissed { now } => {
            if state.rewards.queue_mut().dismiss(now) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

/// One report per fact: skip keys already awarded or still awaiting the backend.
fn report_fact(state: &mut ScreenState, key: AwardKey) -> Vec<Effect> {
    if state.ledger.contains(&key) {
        engine_debug!(
            "{}/{} already rewarded; not reporting",
            key.subject_id,
            key.fact_kind
        );
        return Vec::new();
    }
    if !state.facts_in_flight.insert(key.clone()) {
        engine_debug!(
            "{}/{} already being reported",
            key.subject_id,
            key.fact_kind
        );
        return Vec::new();
    }
    vec![Effect::ReportFact { key }]
}

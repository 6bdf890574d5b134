use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{Author, DiscussionNode, ItemId};
use crate::normalize::RewardPayload;
use crate::paging::PageEstimator;
use crate::reward::{AwardKey, AwardLedger, RewardPipeline};
use crate::tree::ReviewTree;
use crate::view_model::{NodeRowView, ScreenViewModel, SearchView};
use crate::{MutationId, MutationRequest, RequestSeq};

/// Everything one screen knows about its item, search session and rewards.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScreenState {
    pub(crate) viewer: Author,
    pub(crate) item: Option<ItemId>,
    pub(crate) tree: ReviewTree,
    pub(crate) loading: bool,
    pub(crate) in_flight: Option<PendingMutation>,
    pub(crate) local_ids: u64,
    pub(crate) mutation_ids: MutationId,
    pub(crate) search: SearchSession,
    pub(crate) ledger: AwardLedger,
    pub(crate) facts_in_flight: BTreeSet<AwardKey>,
    pub(crate) rewards: RewardPipeline,
    dirty: bool,
}

/// The single outstanding discussion mutation for the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingMutation {
    pub(crate) id: MutationId,
    pub(crate) item: ItemId,
    pub(crate) request: MutationRequest,
    /// Tree as it was before the optimistic change. Reconciliation compares
    /// against this one; reloads never replace it.
    pub(crate) baseline: ReviewTree,
    /// Newest server tree seen while pending, without the optimistic change.
    pub(crate) server: ReviewTree,
    /// Locally built node for create/reply.
    pub(crate) provisional: Option<DiscussionNode>,
    pub(crate) requested_at: DateTime<Utc>,
    pub(crate) reconciling: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct SearchSession {
    pub(crate) query: Option<String>,
    pub(crate) seq: RequestSeq,
    pub(crate) estimator: PageEstimator,
    pub(crate) results: Vec<Value>,
    pub(crate) loading: bool,
    /// Page being refetched after an overshoot; its response is adopted as is.
    pub(crate) settling: Option<u32>,
}

impl ScreenState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_viewer(mut self, viewer: Author) -> Self {
        self.viewer = viewer;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.search.estimator = PageEstimator::new(page_size);
        self
    }

    pub fn with_banner_interval(mut self, interval: Duration) -> Self {
        self.rewards = RewardPipeline::new(interval);
        self
    }

    pub fn tree(&self) -> &ReviewTree {
        &self.tree
    }

    pub fn ledger(&self) -> &AwardLedger {
        &self.ledger
    }

    pub fn estimator(&self) -> &PageEstimator {
        &self.search.estimator
    }

    pub fn mutation_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn view(&self) -> ScreenViewModel {
        let provisional_id = self
            .in_flight
            .as_ref()
            .and_then(|pending| pending.provisional.as_ref())
            .map(|node| node.id.as_str());
        let nodes = self
            .tree
            .iter_depth_first()
            .map(|(depth, node)| NodeRowView {
                id: node.id.clone(),
                depth,
                author: node.author.display_name.clone(),
                text: node.text.clone(),
                edited: node.updated_at > node.created_at,
                provisional: provisional_id == Some(node.id.as_str()),
            })
            .collect::<Vec<_>>();

        let search = self.search.query.as_ref().map(|query| {
            let estimator = &self.search.estimator;
            let estimate = estimator.estimate();
            SearchView {
                query: query.clone(),
                loading: self.search.loading,
                page: estimate.page,
                label: estimator.display_label(),
                certain: estimate.certain,
                selectable_pages: estimator.selectable_pages(),
                can_go_next: estimator.can_go_next(),
                can_go_previous: estimator.can_go_previous(),
                results: self.search.results.clone(),
            }
        });

        let queue = self.rewards.queue();
        ScreenViewModel {
            item: self.item.clone(),
            loading: self.loading,
            node_count: nodes.len(),
            nodes,
            saving: self.in_flight.is_some(),
            search,
            banner: queue.visible().cloned(),
            pending_banners: queue.pending(),
            awarded_facts: self.ledger.len(),
            dirty: self.dirty,
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns whether a render is due and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn surface_error(&mut self, message: impl Into<String>) {
        self.rewards.queue_mut().enqueue_error(message);
        self.mark_dirty();
    }

    pub(crate) fn next_local_id(&mut self) -> String {
        self.local_ids += 1;
        format!("local-{}", self.local_ids)
    }

    pub(crate) fn next_mutation_id(&mut self) -> MutationId {
        self.mutation_ids += 1;
        self.mutation_ids
    }

    /// Gate an already classified reward through the ledger.
    pub(crate) fn grant(&mut self, key: AwardKey, payload: RewardPayload) -> bool {
        let ledger = std::mem::take(&mut self.ledger);
        let (ledger, event) = self.rewards.apply(ledger, payload, key);
        self.ledger = ledger;
        self.after_grant(event.is_some())
    }

    pub(crate) fn grant_raw(&mut self, key: AwardKey, body: &Value) -> bool {
        let ledger = std::mem::take(&mut self.ledger);
        let (ledger, event) = self.rewards.apply_raw(ledger, body, key);
        self.ledger = ledger;
        self.after_grant(event.is_some())
    }

    fn after_grant(&mut self, granted: bool) -> bool {
        if granted {
            self.mark_dirty();
        }
        granted
    }
}

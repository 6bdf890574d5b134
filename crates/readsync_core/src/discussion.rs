//! Discussion handlers: optimistic mutations and their reconciliation.
//!
//! A failed mutation call is not rolled back on the spot. The tree is
//! refetched first; if the write landed anyway the refetched tree wins.

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info, engine_warn};
use serde_json::Value;

use crate::effect::{Effect, MutationId, MutationRequest};
use crate::model::{DiscussionNode, ItemId};
use crate::normalize::{normalize_discussion, normalize_mutation_echo, MutationEcho};
use crate::reward::AwardKey;
use crate::state::{PendingMutation, ScreenState};
use crate::tree::{ReviewTree, TreeError};

const SAVE_FAILED: &str = "Could not save your change";

impl ScreenState {
    pub(crate) fn open_item(&mut self, item: ItemId) -> Vec<Effect> {
        self.item = Some(item.clone());
        self.tree = ReviewTree::new();
        self.in_flight = None;
        self.loading = true;
        self.mark_dirty();
        vec![Effect::FetchDiscussion {
            item,
            reconcile: None,
        }]
    }

    pub(crate) fn refresh(&mut self) -> Vec<Effect> {
        let Some(item) = self.item.clone() else {
            return Vec::new();
        };
        self.loading = true;
        self.mark_dirty();
        vec![Effect::FetchDiscussion {
            item,
            reconcile: None,
        }]
    }

    pub(crate) fn begin_mutation(
        &mut self,
        request: MutationRequest,
        at: DateTime<Utc>,
    ) -> Vec<Effect> {
        let Some(item) = self.item.clone() else {
            engine_debug!("Ignoring {} with no item open", request.fact_kind());
            return Vec::new();
        };
        if self.in_flight.is_some() {
            self.surface_error("Another change is still being saved");
            return Vec::new();
        }
        if request.text().is_some_and(|text| text.trim().is_empty()) {
            self.surface_error("Review text is required");
            return Vec::new();
        }

        let provisional = match request.text() {
            Some(text) if request.inserts() => {
                let text = text.to_string();
                Some(DiscussionNode::new(
                    self.next_local_id(),
                    text,
                    self.viewer.clone(),
                    at,
                ))
            }
            _ => None,
        };

        let next = match apply_optimistic(&self.tree, &request, provisional.as_ref(), at) {
            Ok(next) => next,
            Err(TreeError::NotFound(id)) if matches!(request, MutationRequest::Delete { .. }) => {
                engine_debug!("Delete of {} skipped; node already gone", id);
                return Vec::new();
            }
            Err(err) => {
                self.surface_error(err.to_string());
                return Vec::new();
            }
        };

        let mutation_id = self.next_mutation_id();
        let baseline = std::mem::replace(&mut self.tree, next);
        self.in_flight = Some(PendingMutation {
            id: mutation_id,
            item: item.clone(),
            request: request.clone(),
            server: baseline.clone(),
            baseline,
            provisional,
            requested_at: at,
            reconciling: false,
        });
        self.mark_dirty();
        vec![Effect::SendMutation {
            mutation_id,
            item,
            request,
        }]
    }

    pub(crate) fn confirm_mutation(
        &mut self,
        mutation_id: MutationId,
        body: &Value,
        received_at: DateTime<Utc>,
    ) -> Vec<Effect> {
        let Some(pending) = self.take_pending(mutation_id, false) else {
            return Vec::new();
        };
        let MutationEcho { node, reward } = normalize_mutation_echo(body, received_at);

        let request = pending.request.clone();
        let subject = match &request {
            MutationRequest::CreateReview { .. } | MutationRequest::Reply { .. } => {
                let provisional_id = pending.provisional.as_ref().map(|p| p.id.clone());
                let (Some(node), Some(provisional_id)) = (node, provisional_id) else {
                    engine_warn!(
                        "Mutation {} echo carried no record; reconciling",
                        mutation_id
                    );
                    return self.start_reconcile(pending);
                };
                let subject = if matches!(request, MutationRequest::CreateReview { .. }) {
                    pending.item.clone()
                } else {
                    node.id.clone()
                };
                self.adopt_echo(&provisional_id, node);
                subject
            }
            MutationRequest::Edit { node_id, .. } => {
                if let Some(node) = node {
                    match self.tree.edit_text(node_id, node.text, node.updated_at) {
                        Ok(next) => self.tree = next,
                        Err(err) => engine_warn!("Could not apply edit echo: {}", err),
                    }
                }
                node_id.clone()
            }
            MutationRequest::Delete { node_id } => node_id.clone(),
        };
        self.mark_dirty();

        let Some(payload) = reward else {
            return Vec::new();
        };
        let key = AwardKey::new(subject, request.fact_kind());
        if self.grant(key.clone(), payload) {
            vec![Effect::PersistAward { key }]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn fail_mutation(&mut self, mutation_id: MutationId, message: &str) -> Vec<Effect> {
        let Some(pending) = self.take_pending(mutation_id, false) else {
            return Vec::new();
        };
        engine_info!(
            "Mutation {} failed ({}); refetching to see whether it landed",
            mutation_id,
            message
        );
        self.start_reconcile(pending)
    }

    pub(crate) fn discussion_loaded(
        &mut self,
        item: &str,
        reconcile: Option<MutationId>,
        body: &Value,
        received_at: DateTime<Utc>,
    ) -> Vec<Effect> {
        if self.item.as_deref() != Some(item) {
            engine_debug!("Dropping discussion for {}; no longer on screen", item);
            return Vec::new();
        }
        let refetched = normalize_discussion(body, received_at)
            .map_err(|err| err.to_string())
            .and_then(|roots| ReviewTree::from_roots(roots).map_err(|err| err.to_string()));

        match reconcile {
            Some(mutation_id) => {
                if let Some(pending) = self.take_pending(mutation_id, true) {
                    match refetched {
                        Ok(tree) => self.resolve_reconcile(pending, tree),
                        Err(err) => self.roll_back(pending, &err),
                    }
                }
            }
            None => match refetched {
                Ok(tree) => self.adopt_loaded(tree),
                Err(err) => {
                    self.loading = false;
                    self.surface_error(format!("Could not read discussion: {err}"));
                }
            },
        }
        Vec::new()
    }

    pub(crate) fn discussion_failed(
        &mut self,
        item: &str,
        reconcile: Option<MutationId>,
        message: &str,
    ) -> Vec<Effect> {
        if self.item.as_deref() != Some(item) {
            return Vec::new();
        }
        match reconcile {
            Some(mutation_id) => {
                if let Some(pending) = self.take_pending(mutation_id, true) {
                    self.roll_back(pending, message);
                }
            }
            None => {
                self.loading = false;
                self.surface_error(format!("Could not load discussion: {message}"));
            }
        }
        Vec::new()
    }

    fn take_pending(&mut self, mutation_id: MutationId, reconciling: bool) -> Option<PendingMutation> {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|p| p.id == mutation_id && p.reconciling == reconciling);
        if current {
            self.in_flight.take()
        } else {
            engine_debug!("Ignoring stale result for mutation {}", mutation_id);
            None
        }
    }

    fn start_reconcile(&mut self, mut pending: PendingMutation) -> Vec<Effect> {
        pending.reconciling = true;
        let effect = Effect::FetchDiscussion {
            item: pending.item.clone(),
            reconcile: Some(pending.id),
        };
        self.in_flight = Some(pending);
        self.mark_dirty();
        vec![effect]
    }

    fn adopt_echo(&mut self, provisional_id: &str, node: DiscussionNode) {
        let result = if node.id != provisional_id && self.tree.contains(&node.id) {
            // A refresh already brought the server copy in.
            self.tree.delete_node(provisional_id)
        } else {
            self.tree.confirm_node(provisional_id, node)
        };
        match result {
            Ok(next) => self.tree = next,
            Err(err) => engine_warn!("Could not confirm {}: {}", provisional_id, err),
        }
    }

    fn adopt_loaded(&mut self, tree: ReviewTree) {
        self.loading = false;
        self.mark_dirty();
        let Some(pending) = self.in_flight.as_mut() else {
            self.tree = tree;
            return;
        };
        if pending.reconciling {
            engine_debug!("Holding plain reload until mutation {} reconciles", pending.id);
            return;
        }
        // Re-apply the outstanding change on top of the fresher server tree.
        match apply_optimistic(
            &tree,
            &pending.request,
            pending.provisional.as_ref(),
            pending.requested_at,
        ) {
            Ok(next) => {
                pending.server = tree;
                self.tree = next;
            }
            Err(err) => {
                engine_debug!("Pending change no longer applies ({}); showing server tree", err);
                pending.server = tree.clone();
                self.tree = tree;
            }
        }
    }

    fn resolve_reconcile(&mut self, pending: PendingMutation, refetched: ReviewTree) {
        let before = pending.baseline.node_count();
        let after = refetched.node_count();
        let landed = match &pending.request {
            MutationRequest::CreateReview { .. } | MutationRequest::Reply { .. } => after > before,
            MutationRequest::Delete { .. } => after < before,
            MutationRequest::Edit { node_id, text } => refetched
                .find(node_id)
                .is_some_and(|node| &node.text == text),
        };
        if landed {
            engine_info!(
                "Mutation {} landed despite the failure signal ({} -> {} nodes)",
                pending.id,
                before,
                after
            );
        } else {
            engine_warn!("Mutation {} did not land; rolling back", pending.id);
            self.surface_error(SAVE_FAILED);
        }
        self.tree = refetched;
        self.loading = false;
        self.mark_dirty();
    }

    fn roll_back(&mut self, pending: PendingMutation, reason: &str) {
        engine_warn!(
            "Could not verify mutation {} ({}); rolling back",
            pending.id,
            reason
        );
        self.tree = pending.server;
        self.surface_error(SAVE_FAILED);
    }
}

fn apply_optimistic(
    tree: &ReviewTree,
    request: &MutationRequest,
    provisional: Option<&DiscussionNode>,
    at: DateTime<Utc>,
) -> Result<ReviewTree, TreeError> {
    match (request, provisional) {
        (MutationRequest::CreateReview { .. }, Some(node)) => tree.insert_root(node.clone()),
        (MutationRequest::Reply { parent_id, .. }, Some(node)) => {
            tree.insert_reply(parent_id, node.clone())
        }
        (MutationRequest::Edit { node_id, text }, _) => tree.edit_text(node_id, text.clone(), at),
        (MutationRequest::Delete { node_id }, _) => tree.delete_node(node_id),
        (MutationRequest::CreateReview { .. } | MutationRequest::Reply { .. }, None) => {
            Ok(tree.clone())
        }
    }
}

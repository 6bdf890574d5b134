use crate::model::{ItemId, NodeId};
use crate::reward::AwardKey;

pub type MutationId = u64;
pub type RequestSeq = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Load the discussion for `item`. `reconcile` is set when the result
    /// decides the fate of a failed mutation.
    FetchDiscussion {
        item: ItemId,
        reconcile: Option<MutationId>,
    },
    SendMutation {
        mutation_id: MutationId,
        item: ItemId,
        request: MutationRequest,
    },
    FetchPage {
        seq: RequestSeq,
        query: String,
        page: u32,
        page_size: u32,
    },
    /// Tell the backend a rewardable fact happened.
    ReportFact { key: AwardKey },
    /// Durably add `key` to the award ledger.
    PersistAward { key: AwardKey },
    ClearLedger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRequest {
    CreateReview { text: String },
    Reply { parent_id: NodeId, text: String },
    Edit { node_id: NodeId, text: String },
    Delete { node_id: NodeId },
}

impl MutationRequest {
    pub fn fact_kind(&self) -> &'static str {
        match self {
            MutationRequest::CreateReview { .. } => "review_posted",
            MutationRequest::Reply { .. } => "reply_posted",
            MutationRequest::Edit { .. } => "review_edited",
            MutationRequest::Delete { .. } => "review_deleted",
        }
    }

    pub(crate) fn text(&self) -> Option<&str> {
        match self {
            MutationRequest::CreateReview { text }
            | MutationRequest::Reply { text, .. }
            | MutationRequest::Edit { text, .. } => Some(text),
            MutationRequest::Delete { .. } => None,
        }
    }

    pub(crate) fn inserts(&self) -> bool {
        matches!(
            self,
            MutationRequest::CreateReview { .. } | MutationRequest::Reply { .. }
        )
    }
}

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::{ItemId, NodeId};
use crate::reward::{AwardKey, AwardLedger};
use crate::{MutationId, RequestSeq};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Screen now shows `item`; its discussion is (re)loaded.
    ItemOpened { item: ItemId },
    /// Viewer asked to reload the current discussion.
    RefreshRequested,
    /// Discussion fetch came back.
    DiscussionLoaded {
        item: ItemId,
        reconcile: Option<MutationId>,
        body: Value,
        received_at: DateTime<Utc>,
    },
    DiscussionFailed {
        item: ItemId,
        reconcile: Option<MutationId>,
        message: String,
    },
    /// Viewer posted a new top-level review.
    PostRoot { text: String, at: DateTime<Utc> },
    /// Viewer replied to an existing node.
    PostReply {
        parent_id: NodeId,
        text: String,
        at: DateTime<Utc>,
    },
    EditRequested {
        node_id: NodeId,
        text: String,
        at: DateTime<Utc>,
    },
    DeleteRequested { node_id: NodeId, at: DateTime<Utc> },
    /// Backend accepted a mutation; `body` is its echo.
    MutationConfirmed {
        mutation_id: MutationId,
        body: Value,
        received_at: DateTime<Utc>,
    },
    /// The mutation call failed on our side. The write may still have landed.
    MutationFailed {
        mutation_id: MutationId,
        message: String,
    },
    /// Search text or filters changed.
    QueryChanged { query: String },
    PageRequested { page: u32 },
    PageLoaded {
        seq: RequestSeq,
        page: u32,
        body: Value,
    },
    PageFailed { seq: RequestSeq, message: String },
    /// Viewer did something that may earn a reward (finished a book, ...).
    FactReported { key: AwardKey },
    RewardReceived { key: AwardKey, body: Value },
    RewardFailed { key: AwardKey, message: String },
    /// Ledger loaded from durable storage.
    LedgerRestored(AwardLedger),
    SignedOut,
    /// UI tick; drives banner expiry.
    Tick { now: Instant },
    BannerDismissed { now: Instant },
    /// Fallback for placeholder wiring.
    NoOp,
}

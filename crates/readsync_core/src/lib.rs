//! Readsync core: pure reconciliation state for one reading screen.
//!
//! Network payloads come in as messages, get normalized, and are folded into
//! the discussion tree, the search estimate and the award ledger. Anything
//! that needs I/O goes back out as an [`Effect`].
mod discussion;
mod effect;
mod model;
mod msg;
mod normalize;
mod paging;
mod reward;
mod search;
mod state;
mod tree;
mod update;
mod view_model;

pub use effect::{Effect, MutationId, MutationRequest, RequestSeq};
pub use model::{
    Achievement, Author, DiscussionNode, ItemId, NodeId, Notification, NotificationKind,
    RewardEvent, UNKNOWN_AUTHOR,
};
pub use msg::Msg;
pub use normalize::{
    normalize_discussion, normalize_listing, normalize_mutation_echo, normalize_record,
    normalize_reward, parse_timestamp, ListingPage, MutationEcho, NormalizeError, RewardPayload,
};
pub use paging::{PageEstimate, PageEstimator, PageOutcome, DEFAULT_PAGE_SIZE};
pub use reward::{
    apply_reward, AwardKey, AwardLedger, Banner, NotificationQueue, RewardPipeline,
    BANNER_INTERVAL,
};
pub use state::ScreenState;
pub use tree::{DepthFirst, ReviewTree, TreeError};
pub use update::update;
pub use view_model::{NodeRowView, ScreenViewModel, SearchView};

use std::ops::RangeInclusive;

use serde_json::Value;

use crate::model::{ItemId, NodeId};
use crate::reward::Banner;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScreenViewModel {
    pub item: Option<ItemId>,
    pub loading: bool,
    /// Discussion rows in display order.
    pub nodes: Vec<NodeRowView>,
    pub node_count: usize,
    /// A discussion mutation is awaiting the backend.
    pub saving: bool,
    pub search: Option<SearchView>,
    pub banner: Option<Banner>,
    pub pending_banners: usize,
    pub awarded_facts: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRowView {
    pub id: NodeId,
    pub depth: usize,
    pub author: String,
    pub text: String,
    pub edited: bool,
    pub provisional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchView {
    pub query: String,
    pub loading: bool,
    pub page: u32,
    pub label: String,
    pub certain: bool,
    pub selectable_pages: RangeInclusive<u32>,
    pub can_go_next: bool,
    pub can_go_previous: bool,
    pub results: Vec<Value>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type NodeId = String;
pub type ItemId = String;

/// Display name used when a record carries no usable author.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Option<String>,
    pub display_name: String,
}

impl Author {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            display_name: display_name.into(),
        }
    }

    pub fn unknown() -> Self {
        Self {
            id: None,
            display_name: UNKNOWN_AUTHOR.to_string(),
        }
    }
}

impl Default for Author {
    fn default() -> Self {
        Self::unknown()
    }
}

/// One review or reply. Children keep append order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionNode {
    pub id: NodeId,
    pub text: String,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub children: Vec<DiscussionNode>,
}

impl DiscussionNode {
    /// A childless node stamped with the same creation and update time.
    pub fn new(
        id: impl Into<NodeId>,
        text: impl Into<String>,
        author: Author,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author,
            created_at: at,
            updated_at: at,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<DiscussionNode>) -> Self {
        self.children = children;
        self
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    pub(crate) fn collect_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node.id.as_str());
            stack.extend(node.children.iter());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Success,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Notification {
    pub show: bool,
    pub message: String,
    pub kind: NotificationKind,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points: u32,
}

/// Canonical gamification signal, whichever payload generation produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardEvent {
    pub notification: Notification,
    pub achievements: Vec<Achievement>,
}

//! Discussion tree for a single item.
//!
//! Every mutation takes `&self` and hands back a new tree, leaving the input
//! untouched so a failed operation never leaves a half-applied change behind.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{DiscussionNode, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("node {0} not found in discussion tree")]
    NotFound(NodeId),
    #[error("node id {0} already present in discussion tree")]
    DuplicateId(NodeId),
}

/// Ordered forest of top-level reviews, each owning its replies.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReviewTree {
    roots: Vec<DiscussionNode>,
}

impl ReviewTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-normalized roots. Ids must be unique.
    pub fn from_roots(roots: Vec<DiscussionNode>) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for root in roots {
            tree.ensure_absent(&root)?;
            tree.roots.push(root);
        }
        Ok(tree)
    }

    pub fn roots(&self) -> &[DiscussionNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.iter_depth_first().count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn find(&self, id: &str) -> Option<&DiscussionNode> {
        self.iter_depth_first()
            .map(|(_, node)| node)
            .find(|node| node.id == id)
    }

    pub fn depth_of(&self, id: &str) -> Option<usize> {
        self.iter_depth_first()
            .find(|(_, node)| node.id == id)
            .map(|(depth, _)| depth)
    }

    /// Pre-order walk yielding `(depth, node)`, roots at depth 0.
    pub fn iter_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            stack: self.roots.iter().rev().map(|node| (0, node)).collect(),
        }
    }

    pub fn insert_root(&self, node: DiscussionNode) -> Result<Self, TreeError> {
        self.ensure_absent(&node)?;
        let mut next = self.clone();
        next.roots.push(node);
        Ok(next)
    }

    pub fn insert_reply(&self, parent_id: &str, node: DiscussionNode) -> Result<Self, TreeError> {
        if !self.contains(parent_id) {
            return Err(TreeError::NotFound(parent_id.to_string()));
        }
        self.ensure_absent(&node)?;
        let mut next = self.clone();
        let parent = find_mut(&mut next.roots, parent_id)
            .ok_or_else(|| TreeError::NotFound(parent_id.to_string()))?;
        parent.children.push(node);
        Ok(next)
    }

    /// Replace body text and update time on one node; its replies stay as they are.
    pub fn edit_text(
        &self,
        node_id: &str,
        new_text: impl Into<String>,
        new_updated_at: DateTime<Utc>,
    ) -> Result<Self, TreeError> {
        let mut next = self.clone();
        let node = find_mut(&mut next.roots, node_id)
            .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
        node.text = new_text.into();
        node.updated_at = new_updated_at.max(node.created_at);
        Ok(next)
    }

    /// Remove a node together with its whole subtree.
    pub fn delete_node(&self, node_id: &str) -> Result<Self, TreeError> {
        let mut next = self.clone();
        remove(&mut next.roots, node_id).ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
        Ok(next)
    }

    /// Swap a provisional node for the server's copy, keeping its position and replies.
    pub fn confirm_node(&self, provisional_id: &str, echo: DiscussionNode) -> Result<Self, TreeError> {
        if echo.id != provisional_id && self.contains(&echo.id) {
            return Err(TreeError::DuplicateId(echo.id));
        }
        let mut next = self.clone();
        let node = find_mut(&mut next.roots, provisional_id)
            .ok_or_else(|| TreeError::NotFound(provisional_id.to_string()))?;
        node.id = echo.id;
        node.text = echo.text;
        node.author = echo.author;
        node.created_at = echo.created_at;
        node.updated_at = echo.updated_at;
        Ok(next)
    }

    fn ensure_absent(&self, node: &DiscussionNode) -> Result<(), TreeError> {
        let mut incoming = Vec::new();
        node.collect_ids(&mut incoming);
        for (index, id) in incoming.iter().enumerate() {
            if self.contains(id) || incoming[..index].contains(id) {
                return Err(TreeError::DuplicateId((*id).to_string()));
            }
        }
        Ok(())
    }
}

pub struct DepthFirst<'a> {
    stack: Vec<(usize, &'a DiscussionNode)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a DiscussionNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}

fn find_mut<'a>(nodes: &'a mut [DiscussionNode], id: &str) -> Option<&'a mut DiscussionNode> {
    for node in nodes.iter_mut() {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_mut(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

fn remove(nodes: &mut Vec<DiscussionNode>, id: &str) -> Option<DiscussionNode> {
    if let Some(index) = nodes.iter().position(|node| node.id == id) {
        return Some(nodes.remove(index));
    }
    nodes
        .iter_mut()
        .find_map(|node| remove(&mut node.children, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;
    use chrono::TimeZone;

    fn node(id: &str) -> DiscussionNode {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        DiscussionNode::new(id, format!("text {id}"), Author::unknown(), at)
    }

    #[test]
    fn depth_first_order_is_preorder() {
        let tree = ReviewTree::new()
            .insert_root(node("a").with_children(vec![node("a1"), node("a2")]))
            .unwrap()
            .insert_root(node("b"))
            .unwrap();
        let order: Vec<_> = tree
            .iter_depth_first()
            .map(|(depth, n)| (depth, n.id.as_str()))
            .collect();
        assert_eq!(order, vec![(0, "a"), (1, "a1"), (1, "a2"), (0, "b")]);
    }

    #[test]
    fn insert_rejects_ids_repeated_inside_incoming_subtree() {
        let dup = node("x").with_children(vec![node("y"), node("y")]);
        assert_eq!(
            ReviewTree::new().insert_root(dup),
            Err(TreeError::DuplicateId("y".into()))
        );
    }

    #[test]
    fn confirm_keeps_children_and_position() {
        let tree = ReviewTree::new()
            .insert_root(node("a"))
            .unwrap()
            .insert_root(node("local-1"))
            .unwrap()
            .insert_reply("local-1", node("r"))
            .unwrap();
        let mut echo = node("42");
        echo.text = "server text".into();
        let tree = tree.confirm_node("local-1", echo).unwrap();
        assert_eq!(tree.roots()[1].id, "42");
        assert_eq!(tree.roots()[1].text, "server text");
        assert_eq!(tree.roots()[1].children[0].id, "r");
    }

    #[test]
    fn edit_never_moves_updated_before_created() {
        let tree = ReviewTree::new().insert_root(node("a")).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let tree = tree.edit_text("a", "new", earlier).unwrap();
        let a = tree.find("a").unwrap();
        assert_eq!(a.text, "new");
        assert_eq!(a.updated_at, a.created_at);
    }

    fn shapes() -> Vec<ReviewTree> {
        let chain = node("c0").with_children(vec![
            node("c1").with_children(vec![node("c2").with_children(vec![node("c3")])])
        ]);
        let bushy = vec![
            node("a").with_children(vec![node("a1"), node("a2").with_children(vec![node("a21")])]),
            node("b"),
            node("c").with_children(vec![node("c1")]),
        ];
        vec![
            ReviewTree::new(),
            ReviewTree::from_roots(vec![node("solo")]).unwrap(),
            ReviewTree::from_roots(vec![node("p"), node("q"), node("r")]).unwrap(),
            ReviewTree::from_roots(vec![chain]).unwrap(),
            ReviewTree::from_roots(bushy).unwrap(),
        ]
    }

    fn ids(tree: &ReviewTree) -> Vec<String> {
        tree.iter_depth_first().map(|(_, n)| n.id.clone()).collect()
    }

    #[test]
    fn absent_ids_fail_and_leave_the_tree_alone() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        for tree in shapes() {
            let before = tree.clone();
            assert_eq!(
                tree.delete_node("missing"),
                Err(TreeError::NotFound("missing".into()))
            );
            assert_eq!(
                tree.edit_text("missing", "x", at),
                Err(TreeError::NotFound("missing".into()))
            );
            assert_eq!(
                tree.insert_reply("missing", node("fresh")),
                Err(TreeError::NotFound("missing".into()))
            );
            assert_eq!(tree, before);
        }
    }

    #[test]
    fn insert_root_rejects_ids_already_in_the_tree() {
        for tree in shapes() {
            let before = tree.clone();
            for id in ids(&tree) {
                assert_eq!(
                    tree.insert_root(node(&id)),
                    Err(TreeError::DuplicateId(id.clone()))
                );
                let wrapped = node("outer").with_children(vec![node(&id)]);
                assert_eq!(tree.insert_root(wrapped), Err(TreeError::DuplicateId(id)));
            }
            assert_eq!(tree, before);
        }
    }

    #[test]
    fn delete_removes_exactly_the_subtree() {
        for tree in shapes() {
            let size = tree.node_count();
            for id in ids(&tree) {
                let removed = tree.find(&id).unwrap().subtree_size();
                let next = tree.delete_node(&id).unwrap();
                assert_eq!(next.node_count(), size - removed);
                assert!(!next.contains(&id));
            }
        }
    }

    #[test]
    fn reply_then_delete_drops_reply_and_descendants() {
        for tree in shapes() {
            let size = tree.node_count();
            for parent in ids(&tree) {
                let reply = node("new-reply").with_children(vec![node("new-leaf")]);
                let grown = tree.insert_reply(&parent, reply).unwrap();
                assert_eq!(grown.node_count(), size + 2);
                assert_eq!(
                    grown.depth_of("new-leaf"),
                    tree.depth_of(&parent).map(|depth| depth + 2)
                );

                let parent_size = grown.find(&parent).unwrap().subtree_size();
                let pruned = grown.delete_node(&parent).unwrap();
                assert_eq!(pruned.node_count(), size + 2 - parent_size);
                assert!(!pruned.contains("new-reply"));
                assert!(!pruned.contains("new-leaf"));
            }
        }
    }
}

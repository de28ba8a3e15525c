//! Unbalanced binary search tree over dictionary words.
//!
//! Nodes live in an arena addressed by index; insertion and every traversal
//! use an explicit loop or worklist, so depth is bounded only by memory even
//! for adversarial (sorted) input.

use serde::{Deserialize, Serialize};

use super::fingerprint::fingerprint;
use crate::types::DictionaryEntry;

/// Which child slot a node occupies under its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Lexicographically smaller than the parent.
    Left,
    /// Lexicographically greater than the parent.
    Right,
}

/// A parent → child link of the rendered tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeLink {
    /// Parent label.
    pub parent: String,
    /// Child label.
    pub child: String,
    /// Slot of the child under the parent.
    pub side: Side,
}

impl TreeLink {
    fn new(parent: &str, child: &str, side: Side) -> Self {
        Self {
            parent: parent.to_string(),
            child: child.to_string(),
            side,
        }
    }
}

#[derive(Debug, Clone)]
struct TreeNode {
    label: String,
    left: Option<usize>,
    right: Option<usize>,
}

impl TreeNode {
    fn leaf(label: &str) -> Self {
        Self {
            label: label.to_string(),
            left: None,
            right: None,
        }
    }
}

/// Binary search tree keyed by byte-wise lexicographic order.
///
/// Words are inserted in the order given. No rebalancing is done. A word
/// already in the tree is skipped: the first occurrence keeps its position,
/// and the skipped word is recorded in [`SearchTree::skipped`].
#[derive(Debug, Clone, Default)]
pub struct SearchTree {
    nodes: Vec<TreeNode>,
    root: Option<usize>,
    skipped: Vec<String>,
}

impl SearchTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree by inserting words in order.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for word in words {
            tree.insert(word.as_ref());
        }
        tree
    }

    /// Build a tree from dictionary entries in store order.
    pub fn from_entries(entries: &[DictionaryEntry]) -> Self {
        Self::from_words(entries.iter().map(|e| e.word.as_str()))
    }

    /// Insert a word. Returns `false` if it was already present.
    pub fn insert(&mut self, word: &str) -> bool {
        let Some(mut cursor) = self.root else {
            self.root = Some(self.push(word));
            return true;
        };

        loop {
            let node = &self.nodes[cursor];
            let (slot, side) = match word.cmp(node.label.as_str()) {
                std::cmp::Ordering::Less => (node.left, Side::Left),
                std::cmp::Ordering::Greater => (node.right, Side::Right),
                std::cmp::Ordering::Equal => {
                    tracing::debug!(word, "Duplicate word skipped in tree build");
                    self.skipped.push(word.to_string());
                    return false;
                }
            };
            match slot {
                Some(next) => cursor = next,
                None => {
                    let child = self.push(word);
                    let parent = &mut self.nodes[cursor];
                    match side {
                        Side::Left => parent.left = Some(child),
                        Side::Right => parent.right = Some(child),
                    }
                    return true;
                }
            }
        }
    }

    fn push(&mut self, word: &str) -> usize {
        self.nodes.push(TreeNode::leaf(word));
        self.nodes.len() - 1
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Label of the root node.
    pub fn root(&self) -> Option<&str> {
        self.root.map(|idx| self.nodes[idx].label.as_str())
    }

    /// Words skipped as duplicates, in input order.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Whether the tree holds `word`.
    pub fn contains(&self, word: &str) -> bool {
        let mut cursor = self.root;
        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            cursor = match word.cmp(node.label.as_str()) {
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
                std::cmp::Ordering::Equal => return true,
            };
        }
        false
    }

    /// All parent → child links in pre-order (node, left subtree, right subtree).
    ///
    /// For each parent the left link precedes the right link.
    pub fn links(&self) -> Vec<TreeLink> {
        let mut links = Vec::with_capacity(self.nodes.len().saturating_sub(1));
        let mut stack: Vec<usize> = self.root.into_iter().collect();

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if let Some(left) = node.left {
                links.push(TreeLink::new(&node.label, &self.nodes[left].label, Side::Left));
            }
            if let Some(right) = node.right {
                links.push(TreeLink::new(&node.label, &self.nodes[right].label, Side::Right));
            }
            // Right pushed first so the left subtree is visited first.
            stack.extend(node.right);
            stack.extend(node.left);
        }
        links
    }

    /// Words in sorted order.
    pub fn in_order(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = Vec::new();
        let mut cursor = self.root;

        loop {
            while let Some(idx) = cursor {
                stack.push(idx);
                cursor = self.nodes[idx].left;
            }
            let Some(idx) = stack.pop() else { break };
            out.push(self.nodes[idx].label.as_str());
            cursor = self.nodes[idx].right;
        }
        out
    }

    /// Number of nodes on the longest root-to-leaf path (0 for empty).
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();

        while let Some((idx, depth)) = stack.pop() {
            height = height.max(depth);
            let node = &self.nodes[idx];
            stack.extend(node.left.map(|c| (c, depth + 1)));
            stack.extend(node.right.map(|c| (c, depth + 1)));
        }
        height
    }

    /// Stable fingerprint of the tree shape.
    pub fn fingerprint(&self) -> String {
        fingerprint(&(self.root(), self.links()))
    }
}

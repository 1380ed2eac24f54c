//! Id-ordered node arena.

use std::sync::Arc;

use super::node::{Node, NodeId};
use crate::processor::Processor;

/// All nodes of a graph, kept sorted by id for binary-search lookup.
///
/// Cloning shares the nodes; equality compares node identity.
#[derive(Clone, Debug, Default)]
pub struct Nodes {
    array: Vec<Arc<Node>>,
}

impl Nodes {
    /// Nodes in ascending id order.
    pub fn as_slice(&self) -> &[Arc<Node>] {
        &self.array
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.array.len()
    }

    /// Returns true if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.array.is_empty()
    }

    /// Iterates nodes in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.array.iter()
    }

    fn position(&self, id: NodeId) -> Result<usize, usize> {
        self.array.binary_search_by_key(&id, |n| n.id())
    }

    /// Looks up a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Arc<Node>> {
        self.position(id).ok().map(|i| &self.array[i])
    }

    /// Inserts a new node. Returns `None` if `id` is taken.
    pub fn add(&mut self, processor: Box<dyn Processor>, id: NodeId) -> Option<Arc<Node>> {
        let pos = self.position(id).err()?;
        let node = Arc::new(Node::new(id, processor));
        self.array.insert(pos, Arc::clone(&node));
        Some(node)
    }

    /// Removes a node, returning the graph's handle to it.
    pub fn remove(&mut self, id: NodeId) -> Option<Arc<Node>> {
        let pos = self.position(id).ok()?;
        Some(self.array.remove(pos))
    }
}

impl PartialEq for Nodes {
    fn eq(&self, other: &Self) -> bool {
        self.array.len() == other.array.len()
            && self
                .array
                .iter()
                .zip(&other.array)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }
}

impl Eq for Nodes {}

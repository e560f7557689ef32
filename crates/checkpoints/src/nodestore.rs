use crate::{Hash32, TokenId};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct NodeId {
    /// 0 = leaf, depth - 1 = root
    pub height: u16,
    /// Position within the level: `key >> height`
    pub index: TokenId,
}

impl NodeId {
    pub fn new(height: usize, index: TokenId) -> Self {
        Self { height: height as u16, index }
    }
}

pub trait NodeStore: Send + Sync {
    fn get(&self, id: &NodeId) -> Option<Hash32>;
    fn insert(&mut self, id: NodeId, hash: Hash32);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Simple in-memory store
#[derive(Default, Clone, Debug)]
pub struct InMemoryNodeStore {
    nodes: HashMap<NodeId, Hash32>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self { nodes: HashMap::new() }
    }
}

impl NodeStore for InMemoryNodeStore {
    fn get(&self, id: &NodeId) -> Option<Hash32> {
        self.nodes.get(id).copied()
    }

    fn insert(&mut self, id: NodeId, hash: Hash32) {
        self.nodes.insert(id, hash);
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

//! Tracks paged LODs holding loaded children and expires the ones left unrendered

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::core::types::Result;
use crate::scene::{Node, NodeId, NodeRef};

/// Set of paged LOD nodes to sweep for stale children.
///
/// Entries are weak, so a LOD dropped from the scene simply disappears on the
/// next sweep.
#[derive(Debug, Default)]
pub struct ExpiryRegistry {
    entries: BTreeMap<NodeId, Weak<Node>>,
    max_evictions: Option<usize>,
}

impl ExpiryRegistry {
    pub fn new(max_evictions: Option<usize>) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_evictions,
        }
    }

    /// Start tracking `node`. Returns false if it was already tracked.
    pub fn register(&mut self, node: &NodeRef) -> Result<bool> {
        // fails for anything that is not a paged LOD
        node.with_paged_lod(|_| ())?;
        Ok(self
            .entries
            .insert(node.id(), Arc::downgrade(node))
            .is_none())
    }

    /// Track every paged LOD in the subtree under `root`, `root` included.
    ///
    /// Only resident children of paged LODs are walked. Returns the number of
    /// newly tracked LODs.
    pub fn register_subtree(&mut self, root: &NodeRef) -> usize {
        let mut added = 0;
        let mut stack = vec![Arc::clone(root)];
        while let Some(node) = stack.pop() {
            if node.is_paged_lod() && self.register(&node).unwrap_or(false) {
                added += 1;
            }
            stack.extend(node.children());
        }
        added
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict children last touched before `expiry_time`, at most one per LOD.
    pub fn sweep(&mut self, expiry_time: f64) -> Vec<NodeRef> {
        let before = self.entries.len();
        self.entries.retain(|_, lod| lod.strong_count() > 0);
        if self.entries.len() != before {
            log::trace!("Pruned {} dropped LODs", before - self.entries.len());
        }

        let mut evicted = Vec::new();
        for lod in self.entries.values() {
            if self.max_evictions.is_some_and(|max| evicted.len() >= max) {
                break;
            }
            let Some(lod) = lod.upgrade() else {
                continue;
            };
            if let Ok(nodes) = lod.with_paged_lod(|p| p.evict_stale(expiry_time)) {
                evicted.extend(nodes);
            }
        }
        evicted
    }
}

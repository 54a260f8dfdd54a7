//! Load requests, their priority, and the priority-ordered queue the pager drains

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Weak;

use crate::core::FrameStamp;
use crate::scene::{Node, NodeId};
use crate::streaming::slot::{PageInfo, RangeEntry};

/// Urgency of loading `page` for a viewer at `distance`.
///
/// The raw fraction is 1.0 at the near edge of `range` and falls to 0.0 at the
/// far edge; it is then shaped by the slot's offset and scale. A zero-width
/// range is treated as fully urgent.
pub fn load_priority(range: &RangeEntry, page: &PageInfo, distance: f32) -> f32 {
    let width = range.width();
    let fraction = if width == 0.0 {
        1.0
    } else {
        (range.max - distance) / width
    };
    page.priority_offset + fraction * page.priority_scale
}

/// Request to load the node for one slot of a paged LOD
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source_id: String,
    /// Node the result is attached to. Weak so a pending load never keeps it alive.
    pub target: Weak<Node>,
    pub target_id: NodeId,
    pub slot: usize,
    pub priority: f32, // Higher = more important
    pub frame: Option<FrameStamp>,
}

impl LoadRequest {
    /// Identity used for de-duplication.
    pub fn key(&self) -> (NodeId, usize) {
        (self.target_id, self.slot)
    }
}

/// Receives load requests emitted during traversal. Must not block.
pub trait LoadRequestHandler {
    fn request_load(&self, request: LoadRequest);
}

/// Queued request ordered by priority, then by arrival.
#[derive(Debug)]
struct QueuedLoad {
    request: LoadRequest,
    sequence: u64,
}

impl Eq for QueuedLoad {}

impl PartialEq for QueuedLoad {
    fn eq(&self, other: &Self) -> bool {
        self.sequence == other.sequence
    }
}

impl Ord for QueuedLoad {
    fn cmp(&self, other: &Self) -> Ordering {
        // max-heap: higher priority first, older request first on ties
        self.request
            .priority
            .total_cmp(&other.request.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for QueuedLoad {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of load requests waiting for a worker
#[derive(Debug, Default)]
pub struct LoadQueue {
    heap: BinaryHeap<QueuedLoad>,
    next_sequence: u64,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: LoadRequest) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedLoad { request, sequence });
    }

    /// Highest priority request
    pub fn pop(&mut self) -> Option<LoadRequest> {
        self.heap.pop().map(|q| q.request)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

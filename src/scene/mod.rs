//! Scene hierarchy: shared nodes and the per-frame traversal

pub mod node;
pub mod visitor;

pub use node::{LocalTransform, Node, NodeContent, NodeId, NodeRef};
pub use visitor::{RenderItem, Traversal, TraversalMode, VisitorKind};

//! Scene graph node types
//!
//! Nodes are shared (`NodeRef = Arc<Node>`): a node lives as long as its longest
//! holder, whether that is a parent, a paged LOD slot, or the application.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use glam::{Mat4, Quat, Vec3};

use crate::core::Error;
use crate::core::types::Result;
use crate::math::{Aabb, BoundingSphere};
use crate::streaming::PagedLod;

use super::visitor::{Traversal, TraversalMode};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a scene node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared handle to a node.
pub type NodeRef = Arc<Node>;

/// Local transform relative to the parent node.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl LocalTransform {
    /// Identity transform (no translation, rotation, or scaling).
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a translation-only transform.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Convert to a 4x4 matrix.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.position,
        )
    }
}

/// What a node contains.
#[derive(Debug)]
pub enum NodeContent {
    /// Renderable geometry, known only by its bounds.
    Leaf { bounds: Aabb },

    /// Ordered children, all traversed.
    Group(RwLock<Vec<NodeRef>>),

    /// Distance-selected children with demand paging.
    PagedLod(Mutex<PagedLod>),
}

/// A single node in the scene hierarchy.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    transform: LocalTransform,
    matrix: Mat4,
    content: NodeContent,
}

impl Node {
    fn new(name: impl Into<String>, content: NodeContent) -> Self {
        Self {
            id: NodeId::next(),
            name: name.into(),
            transform: LocalTransform::identity(),
            matrix: Mat4::IDENTITY,
            content,
        }
    }

    /// Geometry leaf with the given local bounds.
    pub fn leaf(name: impl Into<String>, bounds: Aabb) -> Self {
        Self::new(name, NodeContent::Leaf { bounds })
    }

    /// Empty group.
    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeContent::Group(RwLock::new(Vec::new())))
    }

    /// Node wrapping a paged LOD.
    pub fn paged_lod(name: impl Into<String>, lod: PagedLod) -> Self {
        Self::new(name, NodeContent::PagedLod(Mutex::new(lod)))
    }

    pub fn with_transform(mut self, transform: LocalTransform) -> Self {
        self.matrix = transform.to_mat4();
        self.transform = transform;
        self
    }

    pub fn into_ref(self) -> NodeRef {
        Arc::new(self)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> &LocalTransform {
        &self.transform
    }

    /// Local transform as a matrix.
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn is_paged_lod(&self) -> bool {
        matches!(self.content, NodeContent::PagedLod(_))
    }

    /// Run `f` with exclusive access to this node's paged LOD.
    pub fn with_paged_lod<R>(&self, f: impl FnOnce(&mut PagedLod) -> R) -> Result<R> {
        match &self.content {
            NodeContent::PagedLod(lod) => Ok(f(&mut lock(lod))),
            _ => Err(Error::NotPagedLod(self.id)),
        }
    }

    /// Append a child to a group.
    pub fn add_child(&self, child: NodeRef) -> Result<()> {
        let NodeContent::Group(children) = &self.content else {
            return Err(Error::NotGroup(self.id));
        };
        let mut children = write(children);
        if children.iter().any(|c| Arc::ptr_eq(c, &child)) {
            return Err(Error::AlreadyAttached(child.id));
        }
        children.push(child);
        Ok(())
    }

    /// Remove a child from a group by identity.
    pub fn remove_child(&self, child: &NodeRef) -> Result<()> {
        let NodeContent::Group(children) = &self.content else {
            return Err(Error::NotGroup(self.id));
        };
        let mut children = write(children);
        let pos = children
            .iter()
            .position(|c| Arc::ptr_eq(c, child))
            .ok_or(Error::NotFound(child.id))?;
        children.remove(pos);
        Ok(())
    }

    /// Snapshot of the current children (resident ones for a paged LOD).
    pub fn children(&self) -> Vec<NodeRef> {
        match &self.content {
            NodeContent::Leaf { .. } => Vec::new(),
            NodeContent::Group(children) => read(children).clone(),
            NodeContent::PagedLod(lod) => lock(lod).resident_children().cloned().collect(),
        }
    }

    /// Bound in this node's own space, before its local transform.
    pub fn local_bound(&self) -> BoundingSphere {
        match &self.content {
            NodeContent::Leaf { bounds } => BoundingSphere::from_aabb(bounds),
            NodeContent::Group(children) => union_of(read(children).iter()),
            NodeContent::PagedLod(lod) => lock(lod).compute_bound(),
        }
    }

    /// Bound in the parent's space.
    pub fn bound(&self) -> BoundingSphere {
        self.local_bound().transformed(&self.matrix)
    }

    /// Visit this node and, depending on its content and `mode`, its children.
    pub fn accept(self: &Arc<Self>, visitor: &mut Traversal<'_>, mode: TraversalMode) {
        visitor.push_matrix(&self.matrix);
        match &self.content {
            NodeContent::Leaf { .. } => visitor.render(self),
            NodeContent::Group(children) => {
                let children = read(children).clone();
                for child in &children {
                    child.accept(visitor, mode);
                }
            }
            NodeContent::PagedLod(lod) => lock(lod).traverse(self, visitor, mode),
        }
        visitor.pop_matrix();
    }
}

/// Union of the parent-space bounds of `nodes`.
pub(crate) fn union_of<'a>(nodes: impl Iterator<Item = &'a NodeRef>) -> BoundingSphere {
    let mut bound = BoundingSphere::INVALID;
    for node in nodes {
        bound.expand_by_sphere(&node.bound());
    }
    bound
}

// Lock helpers; poisoning is recovered rather than propagated.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(PoisonError::into_inner)
}

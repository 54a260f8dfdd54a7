//! Per-frame traversal of the node hierarchy.
//!
//! A `Traversal` carries everything a node needs while it is visited: the eye
//! point, the frame stamp, whether the pass is time-sensitive, the loader
//! handle, and the accumulated world transform. Leaves that are reached are
//! recorded as `RenderItem`s.

use glam::{Mat4, Vec3};

use crate::core::FrameStamp;
use crate::streaming::LoadRequestHandler;

use super::node::{Node, NodeId, NodeRef};

/// Which children a traversal visits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraversalMode {
    /// Every resident child, ignoring distance. No stamping, no load requests.
    AllChildren,
    /// Distance-selected children only.
    #[default]
    ActiveChildren,
}

/// Kind of pass. Only cull passes update last-touched times.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VisitorKind {
    #[default]
    Cull,
    Update,
    Other,
}

/// A leaf reached by a traversal.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderItem {
    pub node: NodeId,
    pub world: Mat4,
}

/// Traversal state for one pass over the hierarchy.
pub struct Traversal<'a> {
    eye: Vec3,
    kind: VisitorKind,
    frame: Option<FrameStamp>,
    handler: Option<&'a dyn LoadRequestHandler>,
    matrix_stack: Vec<Mat4>,
    rendered: Vec<RenderItem>,
}

impl<'a> Traversal<'a> {
    pub fn new(eye: Vec3, kind: VisitorKind) -> Self {
        Self {
            eye,
            kind,
            frame: None,
            handler: None,
            matrix_stack: Vec::new(),
            rendered: Vec::new(),
        }
    }

    pub fn with_frame_stamp(mut self, frame: FrameStamp) -> Self {
        self.frame = Some(frame);
        self
    }

    pub fn with_request_handler(mut self, handler: &'a dyn LoadRequestHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Move the eye for the next pass.
    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
    }

    pub fn set_frame_stamp(&mut self, frame: FrameStamp) {
        self.frame = Some(frame);
    }

    /// Walk the hierarchy from `root`, replacing the previous pass's output.
    pub fn run(&mut self, root: &NodeRef, mode: TraversalMode) -> &[RenderItem] {
        self.rendered.clear();
        self.matrix_stack.clear();
        root.accept(self, mode);
        &self.rendered
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn kind(&self) -> VisitorKind {
        self.kind
    }

    pub fn frame_stamp(&self) -> Option<FrameStamp> {
        self.frame
    }

    /// Reference time of the current frame, 0.0 without a frame stamp.
    pub fn frame_time(&self) -> f64 {
        self.frame.map_or(0.0, |f| f.reference_time)
    }

    pub fn is_time_sensitive(&self) -> bool {
        self.kind == VisitorKind::Cull
    }

    pub fn request_handler(&self) -> Option<&'a dyn LoadRequestHandler> {
        self.handler
    }

    /// Current local-to-world matrix.
    pub fn world_matrix(&self) -> Mat4 {
        self.matrix_stack.last().copied().unwrap_or(Mat4::IDENTITY)
    }

    /// Distance from the eye to a point in the current local space.
    pub fn distance_to_eye(&self, local_point: Vec3) -> f32 {
        self.world_matrix().transform_point3(local_point).distance(self.eye)
    }

    pub fn push_matrix(&mut self, local: &Mat4) {
        let world = self.world_matrix() * *local;
        self.matrix_stack.push(world);
    }

    pub fn pop_matrix(&mut self) {
        self.matrix_stack.pop();
    }

    pub fn render(&mut self, node: &Node) {
        self.rendered.push(RenderItem {
            node: node.id(),
            world: self.world_matrix(),
        });
    }

    pub fn rendered(&self) -> &[RenderItem] {
        &self.rendered
    }

    pub fn rendered_ids(&self) -> Vec<NodeId> {
        self.rendered.iter().map(|r| r.node).collect()
    }
}

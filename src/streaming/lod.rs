//! Demand-paged level of detail
//!
//! A `PagedLod` owns an ordered list of slots. Each slot pairs a distance range
//! with paging metadata and, once loaded, a resident child. Resident slots
//! always form a prefix: slot `i` can only become resident after slots `0..i`,
//! and only the trailing resident slot can expire. Each frame the cull pass
//! renders the children whose range contains the eye distance, stamps them,
//! and asks the loader for the next unfilled slot when the wanted level is not
//! resident yet.

use std::sync::Arc;

use glam::Vec3;

use crate::core::Error;
use crate::core::types::Result;
use crate::math::BoundingSphere;
use crate::scene::node::union_of;
use crate::scene::{NodeRef, Traversal, TraversalMode};
use crate::streaming::priority::{LoadRequest, load_priority};
use crate::streaming::slot::{PageInfo, RangeEntry, Slot};

/// Where distances are measured from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CenterMode {
    /// The user centre. A non-negative user radius also overrides the bound.
    #[default]
    UserDefined,
    /// Centre of the bound computed from resident children.
    BoundingSphereCenter,
}

/// A load the selection wants issued.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingLoad {
    pub slot: usize,
    pub source_id: String,
    pub priority: f32,
}

/// Outcome of one distance selection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    /// Slot indices to render, in render order.
    pub rendered: Vec<usize>,
    /// A matched range has no resident child.
    pub needs_load: bool,
    /// Request for the next unfilled slot, when it has a source to load from.
    pub load: Option<PendingLoad>,
}

/// Paged LOD state. Lives inside a `Node` (see `Node::paged_lod`).
#[derive(Clone, Debug)]
pub struct PagedLod {
    slots: Vec<Slot>,
    non_expirable: usize,
    center_mode: CenterMode,
    user_center: Vec3,
    radius: f32,
}

impl Default for PagedLod {
    fn default() -> Self {
        Self::new()
    }
}

impl PagedLod {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            non_expirable: 0,
            center_mode: CenterMode::UserDefined,
            user_center: Vec3::ZERO,
            radius: -1.0,
        }
    }

    /// Number of declared slots (N).
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    /// Number of leading resident slots (R).
    pub fn num_resident(&self) -> usize {
        self.slots.iter().take_while(|s| s.is_resident()).count()
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn resident_children(&self) -> impl Iterator<Item = &NodeRef> {
        self.slots.iter().map_while(|s| s.resident.as_ref())
    }

    /// Slot index of a resident child, by identity.
    pub fn child_index(&self, node: &NodeRef) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.resident.as_ref().is_some_and(|r| Arc::ptr_eq(r, node)))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.slots.len() {
            return Err(Error::Index {
                index,
                len: self.slots.len(),
            });
        }
        Ok(())
    }

    pub fn set_source_id(&mut self, index: usize, source_id: impl Into<String>) -> Result<()> {
        self.check_index(index)?;
        self.slots[index].page.source_id = source_id.into();
        Ok(())
    }

    pub fn set_priority_offset(&mut self, index: usize, offset: f32) -> Result<()> {
        self.check_index(index)?;
        self.slots[index].page.priority_offset = offset;
        Ok(())
    }

    pub fn set_priority_scale(&mut self, index: usize, scale: f32) -> Result<()> {
        self.check_index(index)?;
        self.slots[index].page.priority_scale = scale;
        Ok(())
    }

    /// Set the range of slot `index`, growing the table when needed.
    ///
    /// Slots created to reach `index` get a zero-width range at `range.min` and
    /// default metadata.
    pub fn set_range(&mut self, index: usize, range: RangeEntry) -> Result<()> {
        range.validate()?;
        if index >= self.slots.len() {
            let fill = RangeEntry::empty(range.min);
            self.slots
                .resize_with(index + 1, || Slot::new(fill, PageInfo::default()));
        }
        self.slots[index].range = range;
        Ok(())
    }

    /// Insert an empty slot at `index`.
    ///
    /// Only positions at or after the resident prefix are accepted.
    pub fn insert_range(&mut self, index: usize, range: RangeEntry) -> Result<()> {
        range.validate()?;
        let len = self.slots.len();
        if index < self.num_resident() || index > len {
            return Err(Error::Index { index, len });
        }
        self.slots.insert(index, Slot::new(range, PageInfo::default()));
        Ok(())
    }

    /// Declare a LOD level with its range and paging metadata in one step.
    ///
    /// With a child, the child becomes resident in the next unfilled slot (whose
    /// range and metadata are replaced), or in a new slot when all are filled.
    /// Without a child, a new slot awaiting load is appended. Returns the slot index.
    pub fn declare_level(
        &mut self,
        child: Option<NodeRef>,
        range: RangeEntry,
        source_id: impl Into<String>,
        priority_offset: f32,
        priority_scale: f32,
    ) -> Result<usize> {
        range.validate()?;
        let source_id = source_id.into();

        let Some(child) = child else {
            self.slots.push(Slot::new(
                range,
                PageInfo::paged(source_id, priority_offset, priority_scale),
            ));
            return Ok(self.slots.len() - 1);
        };

        if self.child_index(&child).is_some() {
            return Err(Error::AlreadyAttached(child.id()));
        }

        let index = self.num_resident();
        if index == self.slots.len() {
            self.slots.push(Slot::new(range, PageInfo::default()));
        }
        let slot = &mut self.slots[index];
        slot.range = range;
        slot.page.source_id = source_id;
        slot.page.priority_offset = priority_offset;
        slot.page.priority_scale = priority_scale;
        slot.resident = Some(child);
        Ok(index)
    }

    /// Attach a permanent child covering `range`.
    pub fn add_child(&mut self, child: NodeRef, range: RangeEntry) -> Result<usize> {
        self.declare_level(Some(child), range, String::new(), 0.0, 0.0)
    }

    /// Remove a resident child and its whole slot.
    pub fn remove_child(&mut self, node: &NodeRef) -> Result<()> {
        let index = self.child_index(node).ok_or(Error::NotFound(node.id()))?;
        self.slots.remove(index);
        self.clamp_non_expirable();
        Ok(())
    }

    /// Remove slot `index`, resident or not.
    pub fn remove_slot(&mut self, index: usize) -> Result<Slot> {
        self.check_index(index)?;
        let slot = self.slots.remove(index);
        self.clamp_non_expirable();
        Ok(slot)
    }

    /// Make `node`, loaded from `source_id`, resident in slot `index`.
    ///
    /// The slot must be the next unfilled one and still page `source_id`.
    /// `attached_at` becomes the slot's last-touched time so a fresh child is
    /// not expired before it had a chance to be rendered.
    pub fn attach(
        &mut self,
        index: usize,
        source_id: &str,
        node: NodeRef,
        attached_at: f64,
    ) -> Result<()> {
        self.check_index(index)?;
        let expected = self.num_resident();
        if index != expected {
            return Err(Error::SlotMismatch {
                expected,
                got: index,
            });
        }
        let paged = &self.slots[index].page.source_id;
        if paged != source_id {
            return Err(Error::SourceMismatch {
                slot: index,
                expected: paged.clone(),
                got: source_id.to_string(),
            });
        }
        if self.child_index(&node).is_some() {
            return Err(Error::AlreadyAttached(node.id()));
        }

        let slot = &mut self.slots[index];
        slot.resident = Some(node);
        slot.page.last_touched = attached_at;
        Ok(())
    }

    /// Number of leading resident children that never expire.
    pub fn non_expirable(&self) -> usize {
        self.non_expirable
    }

    pub fn set_non_expirable(&mut self, count: usize) -> Result<()> {
        let resident = self.num_resident();
        if count > resident {
            return Err(Error::Index {
                index: count,
                len: resident,
            });
        }
        self.non_expirable = count;
        Ok(())
    }

    fn clamp_non_expirable(&mut self) {
        self.non_expirable = self.non_expirable.min(self.num_resident());
    }

    /// Detach the trailing resident child if it is paged and was last touched before `expiry_time`.
    ///
    /// At most one child is evicted per call. The slot keeps its range and
    /// metadata, so the same source is requested again when it is next needed.
    pub fn evict_stale(&mut self, expiry_time: f64) -> Vec<NodeRef> {
        let resident = self.num_resident();
        if resident <= self.non_expirable {
            return Vec::new();
        }

        let slot = &mut self.slots[resident - 1];
        if !slot.page.is_paged() || slot.page.last_touched >= expiry_time {
            return Vec::new();
        }

        slot.resident
            .take()
            .map(|node| {
                log::debug!(
                    "Expired {} from slot {} ('{}', last touched {:.2})",
                    node.id(),
                    resident - 1,
                    slot.page.source_id,
                    slot.page.last_touched
                );
                node
            })
            .into_iter()
            .collect()
    }

    pub fn center_mode(&self) -> CenterMode {
        self.center_mode
    }

    pub fn set_center_mode(&mut self, mode: CenterMode) {
        self.center_mode = mode;
    }

    pub fn user_center(&self) -> Vec3 {
        self.user_center
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Fix the bound to a user sphere, independent of what is resident.
    pub fn set_user_bounds(&mut self, center: Vec3, radius: f32) {
        self.center_mode = CenterMode::UserDefined;
        self.user_center = center;
        self.radius = radius;
    }

    /// Bound in local space.
    pub fn compute_bound(&self) -> BoundingSphere {
        if self.center_mode == CenterMode::UserDefined && self.radius >= 0.0 {
            return BoundingSphere::new(self.user_center, self.radius);
        }
        union_of(self.resident_children())
    }

    /// Point distances are measured from, in local space.
    pub fn center(&self) -> Vec3 {
        match self.center_mode {
            CenterMode::UserDefined => self.user_center,
            CenterMode::BoundingSphereCenter => self.compute_bound().center,
        }
    }

    /// Choose slots to render for `distance`, stamping them when `time_sensitive`.
    pub fn select(&mut self, distance: f32, frame_time: f64, time_sensitive: bool) -> Selection {
        let resident = self.num_resident();
        let mut selection = Selection::default();
        let mut last_rendered = None;

        for (i, slot) in self.slots.iter_mut().enumerate() {
            if !slot.range.contains(distance) {
                continue;
            }
            if i < resident {
                if time_sensitive {
                    slot.page.last_touched = frame_time;
                }
                selection.rendered.push(i);
                last_rendered = Some(i);
            } else {
                selection.needs_load = true;
            }
        }

        if !selection.needs_load {
            return selection;
        }

        // keep showing the finest resident level while the wanted one streams in
        if resident > 0 && last_rendered != Some(resident - 1) {
            if time_sensitive {
                self.slots[resident - 1].page.last_touched = frame_time;
            }
            selection.rendered.push(resident - 1);
        }

        let next = &self.slots[resident];
        if next.page.is_paged() {
            selection.load = Some(PendingLoad {
                slot: resident,
                source_id: next.page.source_id.clone(),
                priority: load_priority(&next.range, &next.page, distance),
            });
        } else {
            log::trace!("Slot {} has no source to load from", resident);
        }
        selection
    }

    /// Traverse on behalf of the node `this` that owns this LOD.
    pub fn traverse(&mut self, this: &NodeRef, visitor: &mut Traversal<'_>, mode: TraversalMode) {
        match mode {
            TraversalMode::AllChildren => {
                for child in self.resident_children() {
                    child.accept(visitor, mode);
                }
            }
            TraversalMode::ActiveChildren => {
                let distance = visitor.distance_to_eye(self.center());
                let selection =
                    self.select(distance, visitor.frame_time(), visitor.is_time_sensitive());

                for &i in &selection.rendered {
                    if let Some(child) = &self.slots[i].resident {
                        child.accept(visitor, mode);
                    }
                }

                if let (Some(load), Some(handler)) = (selection.load, visitor.request_handler()) {
                    log::trace!(
                        "Requesting '{}' for {} slot {} (priority {:.3})",
                        load.source_id,
                        this.id(),
                        load.slot,
                        load.priority
                    );
                    handler.request_load(LoadRequest {
                        source_id: load.source_id,
                        target: Arc::downgrade(this),
                        target_id: this.id(),
                        slot: load.slot,
                        priority: load.priority,
                        frame: visitor.frame_stamp(),
                    });
                }
            }
        }
    }
}

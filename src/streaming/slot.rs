//! LOD slots: distance range, paging metadata and resident child kept as one record

use crate::core::Error;
use crate::core::types::Result;
use crate::scene::NodeRef;

/// Half-open distance interval `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RangeEntry {
    pub min: f32,
    pub max: f32,
}

impl RangeEntry {
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Zero-width range at `at`. Matches no distance.
    pub fn empty(at: f32) -> Self {
        Self { min: at, max: at }
    }

    pub fn contains(&self, distance: f32) -> bool {
        self.min <= distance && distance < self.max
    }

    pub fn width(&self) -> f32 {
        self.max - self.min
    }

    /// Rejects NaN bounds and `min > max`.
    pub fn validate(&self) -> Result<()> {
        if self.min.is_nan() || self.max.is_nan() || self.min > self.max {
            return Err(Error::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Paging metadata for one slot.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PageInfo {
    /// Empty for permanent children; otherwise what the loader is asked for.
    pub source_id: String,
    pub priority_offset: f32,
    pub priority_scale: f32,
    /// Reference time of the last cull pass that rendered this slot.
    pub last_touched: f64,
}

impl PageInfo {
    pub fn paged(source_id: impl Into<String>, priority_offset: f32, priority_scale: f32) -> Self {
        Self {
            source_id: source_id.into(),
            priority_offset,
            priority_scale,
            last_touched: 0.0,
        }
    }

    /// Whether the slot can be loaded on demand and expired.
    pub fn is_paged(&self) -> bool {
        !self.source_id.is_empty()
    }
}

/// One declared LOD level.
#[derive(Clone, Debug)]
pub struct Slot {
    pub range: RangeEntry,
    pub page: PageInfo,
    pub resident: Option<NodeRef>,
}

impl Slot {
    pub fn new(range: RangeEntry, page: PageInfo) -> Self {
        Self {
            range,
            page,
            resident: None,
        }
    }

    pub fn is_resident(&self) -> bool {
        self.resident.is_some()
    }
}

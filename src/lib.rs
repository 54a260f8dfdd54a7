//! Paged LOD - demand-paged level-of-detail nodes for scene graphs

pub mod core;
pub mod math;
pub mod scene;
pub mod streaming;

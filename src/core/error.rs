//! Error types for paged LOD management

use thiserror::Error;

use crate::scene::NodeId;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("slot index {index} out of range (slots: {len})")]
    Index { index: usize, len: usize },

    #[error("node {0} is not a child of this LOD")]
    NotFound(NodeId),

    #[error("node {0} is already attached")]
    AlreadyAttached(NodeId),

    #[error("slot {got} is not the next slot awaiting a load (expected {expected})")]
    SlotMismatch { expected: usize, got: usize },

    #[error("slot {slot} pages '{expected}', not '{got}'")]
    SourceMismatch { slot: usize, expected: String, got: String },

    #[error("invalid range [{min}, {max})")]
    InvalidRange { min: f32, max: f32 },

    #[error("node {0} is not a paged LOD")]
    NotPagedLod(NodeId),

    #[error("node {0} is not a group")]
    NotGroup(NodeId),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

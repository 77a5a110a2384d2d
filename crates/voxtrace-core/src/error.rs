use glam::IVec3;
use thiserror::Error;

use crate::types::TraversalSample;

/// Errors raised while constructing a voxel field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("voxel field dimension must be non-zero")]
    ZeroDimension,

    #[error("voxel field dimension {dimension} exceeds maximum {max}")]
    DimensionTooLarge { dimension: u32, max: u32 },

    #[error("voxel buffer has {actual} entries, expected {expected} (dimension^3)")]
    BufferSize { expected: usize, actual: usize },
}

/// A disagreement between an octree and the field it was built from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("occupancy mismatch at {coord}: field has {expected}, octree has {actual}")]
    OccupancyMismatch { coord: IVec3, expected: u8, actual: u8 },

    #[error("descriptor {index} has leaf bits {leaf:#010b} outside valid mask {valid:#010b}")]
    LeafWithoutValid { index: usize, valid: u8, leaf: u8 },

    #[error("descriptor {index} points past the descriptor array (child block {target})")]
    DanglingChildPointer { index: usize, target: usize },
}

/// First point at which the octree traversal disagrees with the flat one.
/// `index` is a position in the octree traversal's path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalDivergence {
    #[error("octree sample {index} ({sample:?}) does not appear in the flat path")]
    MissingSample {
        index: usize,
        sample: TraversalSample,
    },

    #[error("octree sample {index} at {voxel} has occupancy {octree}, flat path has {flat}")]
    OccupancyMismatch {
        index: usize,
        voxel: IVec3,
        flat: u8,
        octree: u8,
    },

    #[error("paths terminate differently at octree index {index}: flat {flat:?}, octree {octree:?}")]
    TerminalMismatch {
        index: usize,
        flat: Option<TraversalSample>,
        octree: Option<TraversalSample>,
    },
}

impl TraversalDivergence {
    /// Index into the octree path of the first diverging sample.
    pub fn index(&self) -> usize {
        match self {
            Self::MissingSample { index, .. }
            | Self::OccupancyMismatch { index, .. }
            | Self::TerminalMismatch { index, .. } => *index,
        }
    }
}

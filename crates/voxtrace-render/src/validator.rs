use voxtrace_core::constants::FILLED;
use voxtrace_core::error::ValidationError;
use voxtrace_core::field::VoxelView;

use crate::octree::Octree;

/// Check descriptor structure: leaf bits inside valid bits, and every child
/// block (near or through a far word) inside the array and after its parent.
/// Only descriptors reachable from the root are checked.
pub fn validate_descriptors(octree: &Octree) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let len = octree.node_count();

    for index in octree.descriptor_indices() {
        let Some(descriptor) = octree.descriptor(index) else {
            continue;
        };
        if !descriptor.is_consistent() {
            errors.push(ValidationError::LeafWithoutValid {
                index,
                valid: descriptor.valid_mask(),
                leaf: descriptor.leaf_mask(),
            });
        }

        let count = descriptor.branch_count();
        if count == 0 {
            continue;
        }
        match octree.child_block(index) {
            Some(block) if block > index && block + count <= len => {}
            Some(block) => errors.push(ValidationError::DanglingChildPointer {
                index,
                target: block,
            }),
            // Far word past the end of the array
            None => errors.push(ValidationError::DanglingChildPointer {
                index,
                target: index + descriptor.pointer_offset() as usize,
            }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Compare every voxel of `field` with the octree built from it.
///
/// Non-zero field values count as filled. All mismatches are collected
/// rather than stopping at the first.
pub fn validate_octree(octree: &Octree, field: VoxelView<'_>) -> Result<(), Vec<ValidationError>> {
    // Point queries on a broken tree would be meaningless
    validate_descriptors(octree)?;

    let errors: Vec<ValidationError> = field
        .iter()
        .filter_map(|(coord, value)| {
            let expected = if value != 0 { FILLED } else { 0 };
            let actual = octree.get_voxel(coord);
            (expected != actual).then_some(ValidationError::OccupancyMismatch {
                coord,
                expected,
                actual,
            })
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Convenience wrapper over [`validate_octree`].
pub fn is_valid(octree: &Octree, field: VoxelView<'_>) -> bool {
    validate_octree(octree, field).is_ok()
}

impl Octree {
    /// Check this octree against the field it was built from.
    pub fn validate(&self, field: VoxelView<'_>) -> Result<(), Vec<ValidationError>> {
        validate_octree(self, field)
    }

    pub fn is_valid(&self, field: VoxelView<'_>) -> bool {
        is_valid(self, field)
    }
}

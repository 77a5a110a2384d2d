//! Dense voxel occupancy storage.
//!
//! `VoxelField` owns the buffer; everything downstream (octree builder,
//! validator, flat raycaster) reads through a borrowed `VoxelView`.

use crate::constants::{EMPTY, MAX_OCTREE_DEPTH};
use crate::error::FieldError;
use crate::math::{in_bounds, is_power_of_two, linear_index};
use crate::types::VoxelCoord;
use glam::IVec3;

/// Cube of occupancy bytes indexed `x + dim * (y + dim * z)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelField {
    dimension: u32,
    voxels: Vec<u8>,
}

impl VoxelField {
    /// Create an all-empty field.
    ///
    /// A dimension that is not a power of two is accepted (and logged by
    /// whoever builds an octree from it); zero or oversized dimensions are not.
    pub fn new(dimension: u32) -> Result<Self, FieldError> {
        Self::check_dimension(dimension)?;
        let len = (dimension as usize).pow(3);
        Ok(Self {
            dimension,
            voxels: vec![EMPTY; len],
        })
    }

    /// Wrap an existing buffer. Its length must be `dimension^3`.
    pub fn from_voxels(dimension: u32, voxels: Vec<u8>) -> Result<Self, FieldError> {
        Self::check_dimension(dimension)?;
        let expected = (dimension as usize).pow(3);
        if voxels.len() != expected {
            return Err(FieldError::BufferSize {
                expected,
                actual: voxels.len(),
            });
        }
        Ok(Self { dimension, voxels })
    }

    /// Fill a field by evaluating `f` at every coordinate.
    pub fn from_fn(
        dimension: u32,
        mut f: impl FnMut(VoxelCoord) -> u8,
    ) -> Result<Self, FieldError> {
        let mut field = Self::new(dimension)?;
        let dim = dimension as i32;
        for z in 0..dim {
            for y in 0..dim {
                for x in 0..dim {
                    let coord = IVec3::new(x, y, z);
                    let idx = linear_index(coord, dimension);
                    field.voxels[idx] = f(coord);
                }
            }
        }
        Ok(field)
    }

    fn check_dimension(dimension: u32) -> Result<(), FieldError> {
        if dimension == 0 {
            return Err(FieldError::ZeroDimension);
        }
        let max = 1u32 << MAX_OCTREE_DEPTH;
        if dimension > max {
            return Err(FieldError::DimensionTooLarge { dimension, max });
        }
        Ok(())
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Whether the dimension satisfies the power-of-two invariant.
    pub fn is_power_of_two(&self) -> bool {
        is_power_of_two(self.dimension)
    }

    /// Occupancy at `coord`, 0 outside the field.
    pub fn get(&self, coord: VoxelCoord) -> u8 {
        self.view().get(coord)
    }

    /// Set occupancy at `coord`. Returns false (and changes nothing) when
    /// `coord` is outside the field.
    pub fn set(&mut self, coord: VoxelCoord, value: u8) -> bool {
        if !in_bounds(coord, self.dimension) {
            return false;
        }
        let idx = linear_index(coord, self.dimension);
        self.voxels[idx] = value;
        true
    }

    /// Number of non-zero voxels.
    pub fn filled_count(&self) -> usize {
        self.voxels.iter().filter(|&&v| v != EMPTY).count()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.voxels
    }

    /// Borrowed read-only view for builders and raycasters.
    pub fn view(&self) -> VoxelView<'_> {
        VoxelView {
            dimension: self.dimension,
            voxels: &self.voxels,
        }
    }
}

/// Non-owning view of a voxel field.
#[derive(Debug, Clone, Copy)]
pub struct VoxelView<'a> {
    dimension: u32,
    voxels: &'a [u8],
}

impl<'a> VoxelView<'a> {
    /// View an arbitrary buffer. Its length must be `dimension^3`.
    pub fn new(dimension: u32, voxels: &'a [u8]) -> Result<Self, FieldError> {
        if dimension == 0 {
            return Err(FieldError::ZeroDimension);
        }
        let expected = (dimension as usize).pow(3);
        if voxels.len() != expected {
            return Err(FieldError::BufferSize {
                expected,
                actual: voxels.len(),
            });
        }
        Ok(Self { dimension, voxels })
    }

    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Occupancy at `coord`, 0 outside the field.
    pub fn get(&self, coord: VoxelCoord) -> u8 {
        if in_bounds(coord, self.dimension) {
            self.voxels[linear_index(coord, self.dimension)]
        } else {
            EMPTY
        }
    }

    /// Iterate every coordinate in the field together with its occupancy,
    /// x fastest.
    pub fn iter(&self) -> impl Iterator<Item = (VoxelCoord, u8)> + 'a {
        let dim = self.dimension as usize;
        let voxels = self.voxels;
        voxels.iter().enumerate().map(move |(i, &v)| {
            let x = i % dim;
            let y = (i / dim) % dim;
            let z = i / (dim * dim);
            (IVec3::new(x as i32, y as i32, z as i32), v)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty() {
        let field = VoxelField::new(8).unwrap();
        assert_eq!(field.as_slice().len(), 512);
        assert_eq!(field.filled_count(), 0);
        assert!(field.is_power_of_two());
    }

    #[test]
    fn test_rejects_bad_sizes() {
        assert_eq!(VoxelField::new(0), Err(FieldError::ZeroDimension));
        assert_eq!(
            VoxelField::from_voxels(4, vec![0; 10]),
            Err(FieldError::BufferSize {
                expected: 64,
                actual: 10
            })
        );
        assert!(matches!(
            VoxelField::new(1 << 20),
            Err(FieldError::DimensionTooLarge { .. })
        ));
    }

    #[test]
    fn test_non_power_of_two_accepted() {
        let field = VoxelField::new(6).unwrap();
        assert!(!field.is_power_of_two());
        assert_eq!(field.as_slice().len(), 216);
    }

    #[test]
    fn test_set_get_layout() {
        let mut field = VoxelField::new(4).unwrap();
        assert!(field.set(IVec3::new(1, 2, 3), 7));
        assert_eq!(field.get(IVec3::new(1, 2, 3)), 7);
        assert_eq!(field.as_slice()[1 + 4 * (2 + 4 * 3)], 7);
        assert!(!field.set(IVec3::new(4, 0, 0), 1));
        assert_eq!(field.get(IVec3::new(-1, 0, 0)), 0);
    }

    #[test]
    fn test_from_fn_and_iter_agree() {
        let field = VoxelField::from_fn(4, |c| (c.x + c.y * 4 + c.z * 16) as u8).unwrap();
        for (coord, value) in field.view().iter() {
            assert_eq!(value, (coord.x + coord.y * 4 + coord.z * 16) as u8);
            assert_eq!(field.get(coord), value);
        }
        assert_eq!(field.view().iter().count(), 64);
    }

    #[test]
    fn test_view_over_foreign_buffer() {
        let buf = vec![0u8; 27];
        let view = VoxelView::new(3, &buf).unwrap();
        assert_eq!(view.dimension(), 3);
        assert!(VoxelView::new(3, &buf[..26]).is_err());
    }
}

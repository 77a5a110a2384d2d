use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::math;

/// Voxel coordinate in field space.
pub type VoxelCoord = IVec3;

/// Camera orientation in radians. `(0, 0)` looks forward after the
/// fixed camera correction is applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CameraDirection {
    pub pitch: f32,
    pub yaw: f32,
}

impl CameraDirection {
    pub fn new(pitch: f32, yaw: f32) -> Self {
        Self { pitch, yaw }
    }
}

/// A ray query: world-space origin plus direction.
///
/// The direction does not need to be normalized; only its per-axis ratios
/// matter to the traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Build the ray a camera at `position` looking along `camera` casts.
    pub fn from_camera(position: Vec3, camera: CameraDirection) -> Self {
        Self {
            origin: position,
            direction: math::ray_direction(camera),
        }
    }

    /// Voxel containing the ray origin.
    pub fn origin_voxel(&self) -> VoxelCoord {
        self.origin.floor().as_ivec3()
    }
}

/// One entry of a ray's travel path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraversalSample {
    pub voxel: VoxelCoord,
    pub occupancy: u8,
}

impl TraversalSample {
    pub fn new(voxel: VoxelCoord, occupancy: u8) -> Self {
        Self { voxel, occupancy }
    }

    /// Whether the ray stopped on a filled voxel at this sample.
    pub fn is_hit(&self) -> bool {
        self.occupancy != 0
    }
}

impl From<(VoxelCoord, u8)> for TraversalSample {
    fn from((voxel, occupancy): (VoxelCoord, u8)) -> Self {
        Self { voxel, occupancy }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_voxel_floors() {
        let ray = Ray::new(Vec3::new(0.5, 3.99, -0.25), Vec3::X);
        assert_eq!(ray.origin_voxel(), IVec3::new(0, 3, -1));
    }

    #[test]
    fn test_sample_hit() {
        assert!(TraversalSample::new(IVec3::ZERO, 1).is_hit());
        assert!(!TraversalSample::new(IVec3::ZERO, 0).is_hit());
        let from_tuple: TraversalSample = (IVec3::new(4, 4, 4), 1).into();
        assert_eq!(from_tuple, TraversalSample::new(IVec3::new(4, 4, 4), 1));
    }
}

use std::iter::FusedIterator;

use glam::{IVec3, Vec3};
use voxtrace_core::constants::MAX_RAY_STEPS;
use voxtrace_core::field::VoxelView;
use voxtrace_core::math::{delta_t, face_mask, in_bounds, initial_intersection, step_signs};
use voxtrace_core::types::{Ray, TraversalSample, VoxelCoord};

/// Voxel-by-voxel DDA over a dense field. Reference path for the octree
/// raycaster.
///
/// Yields one sample per voxel entered. Ends after the first filled voxel,
/// when the ray leaves the field, or after [`MAX_RAY_STEPS`] steps.
#[derive(Debug, Clone)]
pub struct FlatTraversal<'a> {
    field: VoxelView<'a>,
    origin: Vec3,
    step: IVec3,
    delta_t: Vec3,
    intersection_t: Vec3,
    voxel: VoxelCoord,
    steps: u32,
    finished: bool,
}

impl<'a> FlatTraversal<'a> {
    pub fn new(field: VoxelView<'a>, ray: &Ray) -> Self {
        let step = step_signs(ray.direction);
        let delta_t = delta_t(ray.direction);
        let voxel = ray.origin_voxel();
        Self {
            field,
            origin: ray.origin,
            step,
            delta_t,
            intersection_t: initial_intersection(ray.origin, voxel, 0, step, delta_t),
            voxel,
            steps: 0,
            finished: step == IVec3::ZERO,
        }
    }

    /// Number of DDA iterations taken so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Voxel the ray is currently in.
    pub fn voxel(&self) -> VoxelCoord {
        self.voxel
    }
}

impl Iterator for FlatTraversal<'_> {
    type Item = TraversalSample;

    fn next(&mut self) -> Option<TraversalSample> {
        if self.finished {
            return None;
        }
        if self.steps >= MAX_RAY_STEPS {
            self.finished = true;
            return None;
        }
        self.steps += 1;

        let mask = face_mask(self.intersection_t);
        self.voxel += IVec3::select(mask, self.step, IVec3::ZERO);
        self.intersection_t =
            initial_intersection(self.origin, self.voxel, 0, self.step, self.delta_t);

        if !in_bounds(self.voxel, self.field.dimension()) {
            self.finished = true;
            return None;
        }

        let sample = TraversalSample::new(self.voxel, self.field.get(self.voxel));
        if sample.is_hit() {
            self.finished = true;
        }
        Some(sample)
    }
}

impl FusedIterator for FlatTraversal<'_> {}

/// Start a flat traversal of `field` along `ray`.
pub fn cast_ray_flat<'a>(field: VoxelView<'a>, ray: &Ray) -> FlatTraversal<'a> {
    FlatTraversal::new(field, ray)
}

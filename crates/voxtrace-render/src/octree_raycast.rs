use std::iter::FusedIterator;

use glam::{IVec3, Vec3};
use voxtrace_core::constants::{EMPTY, IDX_AXIS_MASKS, MAX_RAY_STEPS};
use voxtrace_core::math::{
    axis_exit_t, cell_at_scale, child_index, delta_t, face_index_bits, face_mask, in_bounds,
    initial_intersection, step_signs,
};
use voxtrace_core::types::{Ray, TraversalSample, VoxelCoord};

use crate::octree::Octree;
use crate::stack::TraversalStack;

/// Hierarchical DDA over an [`Octree`].
///
/// Each step crosses one cell at the current scale, so empty octs are
/// skipped in a single step. After a step the traversal backtracks out of
/// every oct the ray left, then descends again from the deepest oct still
/// containing it until it lands in an empty octant or a leaf.
///
/// Yields one sample per cell entered, at the voxel where the ray enters
/// it. Termination mirrors [`FlatTraversal`](crate::flat_raycast::FlatTraversal).
#[derive(Debug, Clone)]
pub struct OctreeTraversal<'a> {
    octree: &'a Octree,
    origin: Vec3,
    direction: Vec3,
    origin_voxel: VoxelCoord,
    step: IVec3,
    delta_t: Vec3,
    /// Parametric distance to each far face of `cell`.
    intersection_t: Vec3,
    stack: TraversalStack,
    /// Current cell, in units of `2^scale`.
    cell: IVec3,
    scale: u32,
    steps: u32,
    finished: bool,
}

impl<'a> OctreeTraversal<'a> {
    pub fn new(octree: &'a Octree, ray: &Ray) -> Self {
        let step = step_signs(ray.direction);
        let delta_t = delta_t(ray.direction);
        let origin_voxel = ray.origin_voxel();

        // Inside a filled leaf the ray still has to step out voxel by voxel,
        // like the flat traversal does.
        let (stack, scale) = if in_bounds(origin_voxel, octree.dimension()) {
            let query = octree.locate(origin_voxel);
            let scale = if query.occupancy == EMPTY { query.scale } else { 0 };
            (query.stack, scale)
        } else {
            (octree.root_stack(origin_voxel), 0)
        };
        let cell = cell_at_scale(origin_voxel, scale);

        Self {
            octree,
            origin: ray.origin,
            direction: ray.direction,
            origin_voxel,
            step,
            delta_t,
            intersection_t: initial_intersection(ray.origin, cell, scale, step, delta_t),
            stack,
            cell,
            scale,
            steps: 0,
            finished: step == IVec3::ZERO,
        }
    }

    /// Number of DDA iterations taken so far.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Scale of the cell the ray is currently in.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Voxel step covered by one DDA iteration at the current scale.
    pub fn jump_power(&self) -> i32 {
        1 << self.scale
    }

    pub fn stack(&self) -> &TraversalStack {
        &self.stack
    }

    /// Fine voxel coordinate along `axis` where the ray enters the next cell.
    ///
    /// Stepped axes land just past the current cell. For the others, count
    /// the voxel boundaries crossed by `t_exit`, using the same closed-form
    /// boundary distances as the flat traversal so both agree on ties.
    fn entry_axis(&self, axis: usize, lo: i32, hi: i32, stepped: bool, t_exit: f32) -> i32 {
        let step = self.step[axis];
        if stepped {
            return if step > 0 { hi + 1 } else { lo - 1 };
        }
        if step == 0 {
            return self.origin_voxel[axis].clamp(lo, hi);
        }

        let origin = self.origin[axis];
        let dt = self.delta_t[axis];
        let exit = |v: i32| axis_exit_t(origin, v, 0, step, dt);
        let estimate = (origin + self.direction[axis] * t_exit).floor() as i32;
        let mut v = estimate.clamp(lo, hi);
        if step > 0 {
            while v > lo && exit(v - 1) > t_exit {
                v -= 1;
            }
            while v < hi && exit(v) <= t_exit {
                v += 1;
            }
        } else {
            while v < hi && exit(v + 1) > t_exit {
                v += 1;
            }
            while v > lo && exit(v) <= t_exit {
                v -= 1;
            }
        }
        v
    }

    /// Toggle the child index bits for the axes the ray moved along. A bit
    /// that wraps means the ray left the parent oct on that axis: pop and
    /// retry at the coarser level.
    fn backtrack(&mut self, previous: VoxelCoord, entry: VoxelCoord) {
        loop {
            let depth = self.stack.depth();
            let Some(top) = self.stack.top_mut() else {
                return;
            };
            let child_scale = top.child_scale();
            let moved =
                cell_at_scale(previous, child_scale).cmpne(cell_at_scale(entry, child_scale));
            let toggle = face_index_bits(moved);
            if toggle == 0 {
                return;
            }
            let old_child = child_index(previous, child_scale);
            top.child = old_child ^ toggle;

            let wrapped = wrapped_bits(old_child, toggle, self.step);
            if wrapped == 0 || depth == 1 {
                return;
            }
            self.stack.pop();
        }
    }
}

/// Toggled index bits that overflow the parent: moving up from a set bit or
/// down from a clear one.
fn wrapped_bits(child: u8, toggle: u8, step: IVec3) -> u8 {
    let mut wrapped = 0;
    for (axis, &bit) in IDX_AXIS_MASKS.iter().enumerate() {
        if toggle & bit != 0 && (step[axis] > 0) == (child & bit != 0) {
            wrapped |= bit;
        }
    }
    wrapped
}

impl Iterator for OctreeTraversal<'_> {
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
        let t_exit = self.intersection_t.min_element();
        let size = self.jump_power();
        let lo = self.cell * size;
        let hi = lo + IVec3::splat(size - 1);
        let stepped = [mask.x, mask.y, mask.z];
        let entry = IVec3::new(
            self.entry_axis(0, lo.x, hi.x, stepped[0], t_exit),
            self.entry_axis(1, lo.y, hi.y, stepped[1], t_exit),
            self.entry_axis(2, lo.z, hi.z, stepped[2], t_exit),
        );

        if !in_bounds(entry, self.octree.dimension()) {
            self.finished = true;
            return None;
        }

        self.backtrack(lo, entry);
        let (occupancy, scale) = self.octree.descend(&mut self.stack, entry);
        self.scale = scale;
        self.cell = cell_at_scale(entry, scale);
        self.intersection_t =
            initial_intersection(self.origin, self.cell, scale, self.step, self.delta_t);

        let sample = TraversalSample::new(entry, occupancy);
        if sample.is_hit() {
            self.finished = true;
        }
        Some(sample)
    }
}

impl FusedIterator for OctreeTraversal<'_> {}

/// Start an octree traversal along `ray`.
pub fn cast_ray_octree<'a>(octree: &'a Octree, ray: &Ray) -> OctreeTraversal<'a> {
    OctreeTraversal::new(octree, ray)
}

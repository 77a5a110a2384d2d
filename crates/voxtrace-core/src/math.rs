use crate::constants::{CAMERA_CORRECTION, IDX_AXIS_MASKS, MIN_OCTREE_EXTENT};
use crate::types::{CameraDirection, VoxelCoord};
use glam::{BVec3, IVec3, Vec3};

/// Whether `dimension` is `2^k` for some integer `k`.
pub fn is_power_of_two(dimension: u32) -> bool {
    dimension != 0 && dimension & (dimension - 1) == 0
}

/// Side length of the cube an octree over a `dimension`-sized field spans.
/// Non-power-of-two dimensions are padded up to the next power of two.
pub fn octree_extent(dimension: u32) -> u32 {
    dimension.max(MIN_OCTREE_EXTENT).next_power_of_two()
}

/// log2 of an octree extent (the root's scale).
pub fn extent_scale(extent: u32) -> u32 {
    extent.trailing_zeros()
}

/// Rotate about the Y axis (camera pitch convention).
pub fn rotate_pitch(v: Vec3, angle: f32) -> Vec3 {
    let (s, c) = angle.sin_cos();
    Vec3::new(v.z * s + v.x * c, v.y, v.z * c - v.x * s)
}

/// Rotate about the Z axis (camera yaw convention).
pub fn rotate_yaw(v: Vec3, angle: f32) -> Vec3 {
    let (s, c) = angle.sin_cos();
    Vec3::new(v.x * c - v.y * s, v.x * s + v.y * c, v.z)
}

/// Direction a camera looks along: `+X` rotated by pitch, then yaw, then
/// the fixed [`CAMERA_CORRECTION`].
pub fn ray_direction(camera: CameraDirection) -> Vec3 {
    let dir = rotate_pitch(Vec3::X, camera.pitch);
    let dir = rotate_yaw(dir, camera.yaw);
    rotate_pitch(dir, CAMERA_CORRECTION)
}

/// Per-axis step sign in {-1, 0, 1}. Zero components never step.
pub fn step_signs(direction: Vec3) -> IVec3 {
    let sign = |d: f32| (d > 0.0) as i32 - (d < 0.0) as i32;
    IVec3::new(sign(direction.x), sign(direction.y), sign(direction.z))
}

/// Parametric distance needed to cross one voxel along each axis.
/// Axes the ray does not move along get `f32::INFINITY`.
pub fn delta_t(direction: Vec3) -> Vec3 {
    let delta = |d: f32| {
        if d == 0.0 {
            f32::INFINITY
        } else {
            (1.0 / d).abs()
        }
    };
    Vec3::new(delta(direction.x), delta(direction.y), delta(direction.z))
}

/// Parametric distance from `origin` to the far face of `cell` along each
/// axis the ray travels, where `cell` is a coordinate at `scale`
/// (side length `2^scale`).
///
/// The origin's fractional offset inside the cell is mirrored onto the
/// side the ray is travelling towards, so the result is never negative
/// for an origin inside the cell.
pub fn initial_intersection(
    origin: Vec3,
    cell: IVec3,
    scale: u32,
    step: IVec3,
    delta_t: Vec3,
) -> Vec3 {
    Vec3::new(
        axis_exit_t(origin.x, cell.x, scale, step.x, delta_t.x),
        axis_exit_t(origin.y, cell.y, scale, step.y, delta_t.y),
        axis_exit_t(origin.z, cell.z, scale, step.z, delta_t.z),
    )
}

/// Single-axis form of [`initial_intersection`].
///
/// Computed in closed form from the integer boundary plane, so a coarse
/// cell and the fine voxel sharing its far face produce identical values.
pub fn axis_exit_t(origin: f32, cell: i32, scale: u32, step: i32, delta_t: f32) -> f32 {
    let size = 1i32 << scale;
    let distance = match step {
        1 => ((cell + 1) * size) as f32 - origin,
        -1 => origin - (cell * size) as f32,
        _ => return f32::INFINITY,
    };
    distance.max(0.0) * delta_t
}

/// Axes whose next boundary crossing is nearest. Ties step together, so a
/// ray through an exact corner moves along several axes at once.
pub fn face_mask(intersection_t: Vec3) -> BVec3 {
    let t = intersection_t;
    BVec3::new(
        t.x <= t.y.min(t.z),
        t.y <= t.z.min(t.x),
        t.z <= t.x.min(t.y),
    )
}

/// Child index bits (`x | y << 1 | z << 2`) toggled by a face mask.
pub fn face_index_bits(mask: BVec3) -> u8 {
    let mut bits = 0u8;
    for (axis, stepped) in [mask.x, mask.y, mask.z].into_iter().enumerate() {
        if stepped {
            bits |= IDX_AXIS_MASKS[axis];
        }
    }
    bits
}

/// Index (0-7) of the child octant containing `voxel`, for children of
/// side length `2^child_scale`.
pub fn child_index(voxel: VoxelCoord, child_scale: u32) -> u8 {
    let bit = |v: i32| ((v >> child_scale) & 1) as u8;
    bit(voxel.x) | bit(voxel.y) << 1 | bit(voxel.z) << 2
}

/// Coordinate of the cell of side `2^scale` containing `voxel`.
/// Floors towards negative infinity, so voxels left of the origin map to
/// negative cells.
pub fn cell_at_scale(voxel: VoxelCoord, scale: u32) -> IVec3 {
    IVec3::new(voxel.x >> scale, voxel.y >> scale, voxel.z >> scale)
}

/// Offset of child `index` inside its parent, in units of the child size.
pub fn child_offset(index: u8) -> IVec3 {
    IVec3::new(
        (index & 1) as i32,
        ((index >> 1) & 1) as i32,
        ((index >> 2) & 1) as i32,
    )
}

/// Whether every component of `voxel` lies in `[0, dimension)`.
pub fn in_bounds(voxel: VoxelCoord, dimension: u32) -> bool {
    let dim = dimension as i32;
    voxel.cmpge(IVec3::ZERO).all() && voxel.cmplt(IVec3::splat(dim)).all()
}

/// Row-major index `x + dim * (y + dim * z)` of an in-bounds voxel.
pub fn linear_index(voxel: VoxelCoord, dimension: u32) -> usize {
    let dim = dimension as usize;
    voxel.x as usize + dim * (voxel.y as usize + dim * voxel.z as usize)
}

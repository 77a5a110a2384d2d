//! Single source of truth for shared constants.
//! The descriptor layout values must match whatever renderer consumes
//! `Octree::descriptor_words`.

/// Maximum number of DDA iterations a single ray may take.
pub const MAX_RAY_STEPS: u32 = 700;

/// Rotation (radians) applied after pitch and yaw so that a camera at
/// `(pitch, yaw) = (0, 0)` looks "forward" instead of down +X.
pub const CAMERA_CORRECTION: f32 = -1.57;

/// Deepest octree supported. Extent is at most `2^MAX_OCTREE_DEPTH`.
pub const MAX_OCTREE_DEPTH: u32 = 15;

/// Capacity of a traversal stack: one frame per level plus the root.
pub const TRAVERSAL_STACK_CAPACITY: usize = MAX_OCTREE_DEPTH as usize + 1;

/// Child index bit toggled by a step along X.
pub const IDX_SET_X_MASK: u8 = 0b001;

/// Child index bit toggled by a step along Y.
pub const IDX_SET_Y_MASK: u8 = 0b010;

/// Child index bit toggled by a step along Z.
pub const IDX_SET_Z_MASK: u8 = 0b100;

/// Index bit per axis, in x, y, z order.
pub const IDX_AXIS_MASKS: [u8; 3] = [IDX_SET_X_MASK, IDX_SET_Y_MASK, IDX_SET_Z_MASK];

/// Descriptor bits [0:14]: child pointer offset.
pub const CHILD_POINTER_MASK: u32 = 0x7FFF;

/// Descriptor bit 15: the offset locates a far pointer word holding the
/// absolute child block index.
pub const FAR_POINTER_FLAG: u32 = 0x8000;

/// Descriptor bits [16:23]: validity mask.
pub const VALID_MASK_SHIFT: u32 = 16;

/// Descriptor bits [24:31]: leaf mask.
pub const LEAF_MASK_SHIFT: u32 = 24;

/// Smallest extent an octree is built with (root must have children).
pub const MIN_OCTREE_EXTENT: u32 = 2;

/// Occupancy value stored for filled voxels after ingestion.
pub const FILLED: u8 = 1;

/// Occupancy value for empty space.
pub const EMPTY: u8 = 0;

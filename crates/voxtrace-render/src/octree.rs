use glam::IVec3;
use voxtrace_core::constants::{CHILD_POINTER_MASK, EMPTY, FILLED};
use voxtrace_core::field::VoxelView;
use voxtrace_core::math::{
    child_index, child_offset, extent_scale, in_bounds, is_power_of_two, octree_extent,
};
use voxtrace_core::types::VoxelCoord;

use crate::descriptor::Descriptor;
use crate::stack::{Frame, TraversalStack};

/// Temporary tree used while classifying the field. Homogeneous octants
/// collapse to `Empty` or `Full` before any descriptor is emitted.
enum BuildNode {
    Empty,
    Full,
    Branch {
        children: Box<[BuildNode; 8]>,
        /// Words (descriptors and far pointers) laid out below this node's
        /// own descriptor.
        area: usize,
    },
}

impl BuildNode {
    fn classify(field: &VoxelView<'_>, origin: IVec3, scale: u32) -> Self {
        if scale == 0 {
            return if field.get(origin) != EMPTY {
                BuildNode::Full
            } else {
                BuildNode::Empty
            };
        }
        Self::collapse(Self::classify_children(field, origin, scale))
    }

    fn classify_children(field: &VoxelView<'_>, origin: IVec3, scale: u32) -> [BuildNode; 8] {
        let child_scale = scale - 1;
        std::array::from_fn(|i| {
            let child_origin = origin + child_offset(i as u8) * (1 << child_scale);
            Self::classify(field, child_origin, child_scale)
        })
    }

    fn collapse(children: [BuildNode; 8]) -> Self {
        if children.iter().all(|c| matches!(c, BuildNode::Empty)) {
            BuildNode::Empty
        } else if children.iter().all(|c| matches!(c, BuildNode::Full)) {
            BuildNode::Full
        } else {
            let area = BlockLayout::of(&children).area;
            BuildNode::Branch {
                children: Box::new(children),
                area,
            }
        }
    }

    /// (valid, leaf) masks for a set of children.
    fn masks(children: &[BuildNode; 8]) -> (u8, u8) {
        let mut valid = 0u8;
        let mut leaf = 0u8;
        for (i, child) in children.iter().enumerate() {
            match child {
                BuildNode::Empty => {}
                BuildNode::Full => {
                    valid |= 1 << i;
                    leaf |= 1 << i;
                }
                BuildNode::Branch { .. } => valid |= 1 << i,
            }
        }
        (valid, leaf)
    }

    /// Branch children in child-index order.
    fn branches(children: &[BuildNode; 8]) -> impl Iterator<Item = (&[BuildNode; 8], usize)> {
        children.iter().filter_map(|child| match child {
            BuildNode::Branch { children, area } => Some((&**children, *area)),
            _ => None,
        })
    }
}

/// Placement of the word area below one descriptor: its child block, then
/// one far pointer word per block member whose own child block is out of
/// 15-bit reach, then each member's area in order.
struct BlockLayout {
    /// Block slots that need a far pointer word.
    far_slots: u8,
    /// Total words in the area.
    area: usize,
}

impl BlockLayout {
    fn of(children: &[BuildNode; 8]) -> Self {
        let areas: Vec<usize> = BuildNode::branches(children).map(|(_, area)| area).collect();
        let count = areas.len();
        if count == 0 {
            return Self {
                far_slots: 0,
                area: 0,
            };
        }

        // More far words push every block further out, so iterate to a
        // fixed point; the far set only grows and is bounded by the block.
        let mut far_words = 0;
        loop {
            let mut far_slots = 0u8;
            let mut preceding = 0;
            for (slot, &area) in areas.iter().enumerate() {
                let offset = count - slot + far_words + preceding;
                if area > 0 && offset > CHILD_POINTER_MASK as usize {
                    far_slots |= 1 << slot;
                }
                preceding += area;
            }
            let needed = far_slots.count_ones() as usize;
            if needed == far_words {
                return Self {
                    far_slots,
                    area: count + far_words + preceding,
                };
            }
            far_words = needed;
        }
    }
}

/// Summary counts for logging and benchmarks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OctreeStats {
    /// Descriptors reachable from the root.
    pub descriptors: usize,
    pub leaves: usize,
    /// Far pointer words, one per descriptor with the far flag set.
    pub far_pointers: usize,
    /// Length of the word array.
    pub words: usize,
}

/// Result of a point query: the descent path and the occupancy it found.
#[derive(Debug, Clone)]
pub struct PointQuery {
    /// Frames from the root to the deepest oct containing the point. The top
    /// frame's `child` is the octant the point falls in.
    pub stack: TraversalStack,
    /// 1 if the point is inside a filled leaf, 0 otherwise.
    pub occupancy: u8,
    /// Scale of the child octant the descent stopped in.
    pub scale: u32,
}

/// Sparse voxel octree of packed descriptors. Word 0 is the root descriptor
/// and spans the whole (power-of-two) extent. Immutable once generated.
///
/// The word array interleaves descriptors with far pointer words. A
/// descriptor with the far flag set points at a word holding the absolute
/// index of its child block; far words always follow the block of the
/// descriptor that uses them.
#[derive(Debug, Clone)]
pub struct Octree {
    words: Vec<Descriptor>,
    dimension: u32,
    extent: u32,
}

impl Octree {
    /// Build an octree from a dense field.
    ///
    /// A dimension that is not a power of two is logged and padded up to the
    /// next power of two; voxels outside the field count as empty.
    pub fn generate(field: VoxelView<'_>) -> Self {
        let dimension = field.dimension();
        if !is_power_of_two(dimension) {
            log::error!(
                "Octree dimension {dimension} is not a power of 2; padding to {}",
                octree_extent(dimension)
            );
        }
        let extent = octree_extent(dimension);
        let root_children = BuildNode::classify_children(&field, IVec3::ZERO, extent_scale(extent));

        let mut octree = Self {
            words: vec![Descriptor::EMPTY],
            dimension,
            extent,
        };
        octree.emit(0, &root_children, None);

        let stats = octree.stats();
        log::info!(
            "Generated octree: extent {}, {} descriptors, {} leaves, {} far pointers",
            extent,
            stats.descriptors,
            stats.leaves,
            stats.far_pointers
        );
        octree
    }

    /// Write the descriptor at `index` and lay out its area depth-first.
    /// The area starts at the current end of the array. `far_word` is the
    /// slot the parent reserved when this descriptor's block is out of
    /// near reach.
    fn emit(&mut self, index: usize, children: &[BuildNode; 8], far_word: Option<usize>) {
        let (valid, leaf) = BuildNode::masks(children);
        let mut descriptor = Descriptor::new(valid, leaf);
        let layout = BlockLayout::of(children);
        let block = self.words.len();
        let count = descriptor.branch_count();

        if count > 0 {
            match far_word {
                Some(slot) => {
                    self.words[slot] = Descriptor::from_raw(block as u32);
                    descriptor.set_child_pointer((slot - index) as u32, true);
                }
                None => descriptor.set_child_pointer((block - index) as u32, false),
            }

            let far_words = layout.far_slots.count_ones() as usize;
            self.words.resize(block + count + far_words, Descriptor::EMPTY);
            let mut next_far = block + count;
            for (slot, (grandchildren, _)) in BuildNode::branches(children).enumerate() {
                let far_word = if layout.far_slots & (1 << slot) != 0 {
                    next_far += 1;
                    Some(next_far - 1)
                } else {
                    None
                };
                self.emit(block + slot, grandchildren, far_word);
            }
            debug_assert_eq!(self.words.len(), block + layout.area);
        }

        self.words[index] = descriptor;
    }

    /// Reassemble an octree from raw words, e.g. ones read back from a
    /// renderer. Nothing is checked here; run
    /// [`validate_descriptors`](crate::validator::validate_descriptors)
    /// before traversing untrusted data.
    pub fn from_raw_parts(words: Vec<u32>, dimension: u32) -> Self {
        let mut words: Vec<Descriptor> = words.into_iter().map(Descriptor::from_raw).collect();
        if words.is_empty() {
            words.push(Descriptor::EMPTY);
        }
        Self {
            words,
            dimension,
            extent: octree_extent(dimension),
        }
    }

    /// Side length of the field the octree was built from.
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Side length of the cube the root spans (power of two).
    pub fn extent(&self) -> u32 {
        self.extent
    }

    /// Scale of the root oct, `log2(extent)`.
    pub fn max_scale(&self) -> u32 {
        extent_scale(self.extent)
    }

    pub fn root(&self) -> Descriptor {
        self.words[0]
    }

    /// Word at `index`. Only meaningful as a descriptor if it is reachable
    /// from the root as one.
    pub fn descriptor(&self, index: usize) -> Option<Descriptor> {
        self.words.get(index).copied()
    }

    /// Indices of every descriptor reachable from the root, depth-first.
    /// Far pointer words are skipped, as is any block that is out of
    /// range or not strictly after its parent.
    pub fn descriptor_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        let mut pending = vec![0];
        while let Some(index) = pending.pop() {
            indices.push(index);
            let count = self.words[index].branch_count();
            if let Some(block) = self.child_block(index) {
                if block > index && block + count <= self.words.len() {
                    pending.extend((block..block + count).rev());
                }
            }
        }
        indices
    }

    /// Raw words for upload to a renderer.
    pub fn descriptor_words(&self) -> &[u32] {
        bytemuck::cast_slice(&self.words)
    }

    /// Number of words in the array, descriptors and far pointers.
    pub fn node_count(&self) -> usize {
        self.words.len()
    }

    /// Index of the first descriptor in `index`'s child block. None if the
    /// descriptor has no branch children or its far word is missing.
    pub fn child_block(&self, index: usize) -> Option<usize> {
        let descriptor = self.descriptor(index)?;
        if descriptor.branch_count() == 0 {
            return None;
        }
        let target = index + descriptor.pointer_offset() as usize;
        if descriptor.is_far() {
            self.descriptor(target).map(|word| word.raw() as usize)
        } else {
            Some(target)
        }
    }

    /// Index of the descriptor for branch child `child` of descriptor
    /// `index`. None for empty or leaf children.
    pub fn child_descriptor_index(&self, index: usize, child: u8) -> Option<usize> {
        let descriptor = self.descriptor(index)?;
        if !descriptor.is_branch(child) {
            return None;
        }
        let target = self.child_block(index)? + descriptor.child_slot(child);
        (target < self.words.len()).then_some(target)
    }

    pub fn stats(&self) -> OctreeStats {
        let mut stats = OctreeStats {
            words: self.words.len(),
            ..OctreeStats::default()
        };
        for index in self.descriptor_indices() {
            let descriptor = self.words[index];
            stats.descriptors += 1;
            stats.leaves += descriptor.leaf_mask().count_ones() as usize;
            if descriptor.is_far() && descriptor.branch_count() > 0 {
                stats.far_pointers += 1;
            }
        }
        stats
    }

    fn root_frame(&self, voxel: VoxelCoord) -> Frame {
        let scale = self.max_scale();
        Frame {
            descriptor: self.root(),
            index: 0,
            child: child_index(voxel, scale - 1),
            scale,
            origin: IVec3::ZERO,
        }
    }

    /// Descend from the root towards `voxel` as far as the tree goes.
    ///
    /// Stops at the first child octant that is empty or a leaf. The voxel
    /// does not need to be filled; for empty space the result still tells
    /// the caller how large the empty octant around it is.
    pub fn locate(&self, voxel: VoxelCoord) -> PointQuery {
        let mut stack = self.root_stack(voxel);
        let (occupancy, scale) = self.descend(&mut stack, voxel);
        PointQuery {
            stack,
            occupancy,
            scale,
        }
    }

    /// Stack holding only the root frame, positioned at `voxel`'s octant.
    pub(crate) fn root_stack(&self, voxel: VoxelCoord) -> TraversalStack {
        let mut stack = TraversalStack::new();
        stack.push(self.root_frame(voxel));
        stack
    }

    /// Continue a descent from the top of `stack` towards `voxel`, which must
    /// lie inside the top frame's oct. Returns the occupancy and scale of
    /// the child octant the descent stopped in.
    pub(crate) fn descend(&self, stack: &mut TraversalStack, voxel: VoxelCoord) -> (u8, u32) {
        loop {
            let Some(top) = stack.top_mut() else {
                return (EMPTY, self.max_scale());
            };
            let child_scale = top.child_scale();
            let child = child_index(voxel, child_scale);
            top.child = child;
            let top = *top;

            if !top.descriptor.is_valid(child) {
                return (EMPTY, child_scale);
            }
            if top.descriptor.is_leaf(child) {
                return (FILLED, child_scale);
            }
            if child_scale == 0 {
                log::warn!(
                    "Descriptor {} has a branch child at voxel scale; treating as empty",
                    top.index
                );
                return (EMPTY, 0);
            }
            let Some(index) = self.child_descriptor_index(top.index as usize, child) else {
                log::warn!(
                    "Descriptor {} has branch child {child} with no descriptor; treating as empty",
                    top.index
                );
                return (EMPTY, child_scale);
            };
            stack.push(Frame {
                descriptor: self.words[index],
                index: index as u32,
                child: 0,
                scale: child_scale,
                origin: top.child_origin(child),
            });
        }
    }

    /// Occupancy of `voxel`: 1 inside a filled leaf, 0 elsewhere, 0 outside
    /// the field.
    pub fn get_voxel(&self, voxel: VoxelCoord) -> u8 {
        if !in_bounds(voxel, self.dimension) {
            return EMPTY;
        }
        self.locate(voxel).occupancy
    }
}

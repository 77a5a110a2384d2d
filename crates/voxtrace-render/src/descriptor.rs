use bytemuck::{Pod, Zeroable};
use voxtrace_core::constants::{
    CHILD_POINTER_MASK, FAR_POINTER_FLAG, LEAF_MASK_SHIFT, VALID_MASK_SHIFT,
};

/// Packed 32-bit record describing the 8 children of one oct.
///
/// Bit layout:
///   [0:14]  child pointer offset
///   [15]    far flag (offset locates a far pointer word instead of the block)
///   [16:23] validity mask, one bit per child
///   [24:31] leaf mask, one bit per child
///
/// A child with its valid bit clear is empty space. A child with both bits
/// set is a fully filled leaf. A valid non-leaf child has a descriptor of
/// its own in the block the child pointer locates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Descriptor(u32);

impl Descriptor {
    /// Descriptor whose children are all empty.
    pub const EMPTY: Self = Self(0);

    pub fn new(valid_mask: u8, leaf_mask: u8) -> Self {
        debug_assert_eq!(
            leaf_mask & !valid_mask,
            0,
            "leaf bits must be a subset of valid bits"
        );
        Self((valid_mask as u32) << VALID_MASK_SHIFT | (leaf_mask as u32) << LEAF_MASK_SHIFT)
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    /// Low 16 bits: pointer offset plus far flag.
    pub fn child_pointer(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    pub fn pointer_offset(self) -> u32 {
        self.0 & CHILD_POINTER_MASK
    }

    pub fn is_far(self) -> bool {
        self.0 & FAR_POINTER_FLAG != 0
    }

    /// Set the child pointer. `offset` must fit in 15 bits.
    pub fn set_child_pointer(&mut self, offset: u32, far: bool) {
        debug_assert!(offset <= CHILD_POINTER_MASK, "child pointer offset {offset} overflows");
        let far_bit = if far { FAR_POINTER_FLAG } else { 0 };
        self.0 = (self.0 & 0xFFFF_0000) | (offset & CHILD_POINTER_MASK) | far_bit;
    }

    pub fn valid_mask(self) -> u8 {
        (self.0 >> VALID_MASK_SHIFT) as u8
    }

    pub fn leaf_mask(self) -> u8 {
        (self.0 >> LEAF_MASK_SHIFT) as u8
    }

    /// Children that have a descriptor of their own.
    pub fn branch_mask(self) -> u8 {
        self.valid_mask() & !self.leaf_mask()
    }

    pub fn is_valid(self, child: u8) -> bool {
        self.valid_mask() & (1 << child) != 0
    }

    pub fn is_leaf(self, child: u8) -> bool {
        self.leaf_mask() & (1 << child) != 0
    }

    pub fn is_branch(self, child: u8) -> bool {
        self.branch_mask() & (1 << child) != 0
    }

    /// Position of `child`'s descriptor inside the child block.
    pub fn child_slot(self, child: u8) -> usize {
        (self.branch_mask() & ((1u8 << child) - 1)).count_ones() as usize
    }

    /// Number of descriptors in the child block.
    pub fn branch_count(self) -> usize {
        self.branch_mask().count_ones() as usize
    }

    /// Leaf bits never appear without their valid bit.
    pub fn is_consistent(self) -> bool {
        self.leaf_mask() & !self.valid_mask() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_round_trip_layout() {
        let d = Descriptor::new(0b1010_0101, 0b0000_0101);
        assert_eq!(d.valid_mask(), 0b1010_0101);
        assert_eq!(d.leaf_mask(), 0b0000_0101);
        assert_eq!(d.branch_mask(), 0b1010_0000);
        assert_eq!(d.raw(), 0x05A5_0000);
        assert!(d.is_consistent());
    }

    #[test]
    fn test_child_pointer_keeps_masks() {
        let mut d = Descriptor::new(0xFF, 0x0F);
        d.set_child_pointer(1234, false);
        assert_eq!(d.pointer_offset(), 1234);
        assert!(!d.is_far());
        assert_eq!(d.valid_mask(), 0xFF);
        assert_eq!(d.leaf_mask(), 0x0F);

        d.set_child_pointer(7, true);
        assert!(d.is_far());
        assert_eq!(d.pointer_offset(), 7);
        assert_eq!(d.child_pointer(), 0x8007);
    }

    #[test]
    fn test_child_slots_skip_leaves_and_empties() {
        // children 1, 4, 6 are branches; 2 is a leaf; the rest are empty
        let d = Descriptor::new(0b0101_0110, 0b0000_0100);
        assert_eq!(d.branch_count(), 3);
        assert_eq!(d.child_slot(1), 0);
        assert_eq!(d.child_slot(4), 1);
        assert_eq!(d.child_slot(6), 2);
        assert!(d.is_leaf(2) && d.is_valid(2) && !d.is_branch(2));
        assert!(!d.is_valid(0));
    }

    #[test]
    fn test_inconsistent_raw_descriptor_detected() {
        let d = Descriptor::from_raw(0x0100_0000); // leaf bit 0 without valid bit 0
        assert!(!d.is_consistent());
    }

    #[test]
    fn test_pod_layout() {
        assert_eq!(std::mem::size_of::<Descriptor>(), 4);
        let descriptors = [Descriptor::new(1, 1)];
        let words: &[u32] = bytemuck::cast_slice(&descriptors);
        assert_eq!(words, &[0x0101_0000]);
    }
}

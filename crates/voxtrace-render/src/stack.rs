use glam::IVec3;
use voxtrace_core::constants::TRAVERSAL_STACK_CAPACITY;
use voxtrace_core::math::child_offset;

use crate::descriptor::Descriptor;

/// One level of an octree descent: the oct being examined, which of its
/// children the traversal is in, and where the oct sits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Frame {
    pub descriptor: Descriptor,
    /// Index of `descriptor` in the octree's descriptor array.
    pub index: u32,
    /// Child index (0-7) currently occupied.
    pub child: u8,
    /// log2 of the oct's side length. Children have `scale - 1`.
    pub scale: u32,
    /// Minimum corner of the oct in voxel space.
    pub origin: IVec3,
}

impl Frame {
    pub fn child_scale(&self) -> u32 {
        self.scale - 1
    }

    /// Minimum corner of child `child`.
    pub fn child_origin(&self, child: u8) -> IVec3 {
        self.origin + child_offset(child) * (1 << self.child_scale())
    }
}

/// Fixed-capacity stack of descent frames, root at the bottom.
///
/// Depth never exceeds the octree depth, so exceeding the capacity is a bug
/// in the caller and panics.
#[derive(Debug, Clone)]
pub struct TraversalStack {
    frames: [Frame; TRAVERSAL_STACK_CAPACITY],
    len: usize,
}

impl Default for TraversalStack {
    fn default() -> Self {
        Self::new()
    }
}

impl TraversalStack {
    pub fn new() -> Self {
        Self {
            frames: [Frame::default(); TRAVERSAL_STACK_CAPACITY],
            len: 0,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        assert!(
            self.len < TRAVERSAL_STACK_CAPACITY,
            "traversal stack overflow (capacity {TRAVERSAL_STACK_CAPACITY})"
        );
        self.frames[self.len] = frame;
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<Frame> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(self.frames[self.len])
    }

    pub fn top(&self) -> Option<&Frame> {
        let i = self.len.checked_sub(1)?;
        Some(&self.frames[i])
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        let i = self.len.checked_sub(1)?;
        Some(&mut self.frames[i])
    }

    /// Number of frames (root counts as one).
    pub fn depth(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Frames from the root down.
    pub fn frames(&self) -> &[Frame] {
        &self.frames[..self.len]
    }

    /// Per-level child indices from the root down.
    pub fn idx_stack(&self) -> impl Iterator<Item = u8> + '_ {
        self.frames().iter().map(|f| f.child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(scale: u32, child: u8) -> Frame {
        Frame {
            scale,
            child,
            ..Frame::default()
        }
    }

    #[test]
    fn test_push_pop_order() {
        let mut stack = TraversalStack::new();
        assert!(stack.is_empty());
        stack.push(frame(3, 1));
        stack.push(frame(2, 5));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.top().map(|f| f.child), Some(5));
        assert_eq!(stack.idx_stack().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(stack.pop().map(|f| f.scale), Some(2));
        assert_eq!(stack.pop().map(|f| f.scale), Some(3));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_top_mut_updates_child() {
        let mut stack = TraversalStack::new();
        stack.push(frame(1, 0));
        if let Some(top) = stack.top_mut() {
            top.child ^= 0b101;
        }
        assert_eq!(stack.top().map(|f| f.child), Some(0b101));
    }

    #[test]
    #[should_panic(expected = "traversal stack overflow")]
    fn test_overflow_panics() {
        let mut stack = TraversalStack::new();
        for _ in 0..=TRAVERSAL_STACK_CAPACITY {
            stack.push(Frame::default());
        }
    }

    #[test]
    fn test_frame_child_origin() {
        let f = Frame {
            scale: 2,
            origin: IVec3::new(4, 0, 8),
            ..Frame::default()
        };
        assert_eq!(f.child_origin(0), IVec3::new(4, 0, 8));
        assert_eq!(f.child_origin(0b111), IVec3::new(6, 2, 10));
    }
}

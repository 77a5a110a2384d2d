pub mod descriptor;
pub mod equivalence;
pub mod flat_raycast;
pub mod octree;
pub mod octree_raycast;
pub mod stack;
pub mod validator;

pub use descriptor::Descriptor;
pub use equivalence::{check_equivalence, compare_traversals};
pub use flat_raycast::{cast_ray_flat, FlatTraversal};
pub use octree::{Octree, OctreeStats, PointQuery};
pub use octree_raycast::{cast_ray_octree, OctreeTraversal};
pub use stack::{Frame, TraversalStack};
pub use validator::{validate_descriptors, validate_octree};

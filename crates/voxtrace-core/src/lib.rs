pub mod constants;
pub mod error;
pub mod field;
pub mod math;
pub mod types;

pub use error::{FieldError, TraversalDivergence, ValidationError};
pub use field::{VoxelField, VoxelView};
pub use types::{CameraDirection, Ray, TraversalSample, VoxelCoord};

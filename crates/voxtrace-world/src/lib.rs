use std::sync::Arc;

use glam::{Vec2, Vec3};
use voxtrace_core::constants::{EMPTY, FILLED};
use voxtrace_core::error::{FieldError, TraversalDivergence, ValidationError};
use voxtrace_core::field::{VoxelField, VoxelView};
use voxtrace_core::math::{is_power_of_two, rotate_pitch, rotate_yaw};
use voxtrace_core::types::{CameraDirection, Ray, TraversalSample, VoxelCoord};
use voxtrace_render::equivalence::check_equivalence;
use voxtrace_render::flat_raycast::cast_ray_flat;
use voxtrace_render::octree::Octree;
use voxtrace_render::octree_raycast::cast_ray_octree;

/// Tunables for a [`Map`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapSettings {
    /// Camera orientation for the traversal self-test run after each build.
    pub self_test_camera: CameraDirection,
    /// Camera position for the traversal self-test.
    pub self_test_position: Vec3,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            self_test_camera: CameraDirection::new(0.95, 0.81),
            self_test_position: Vec3::new(10.5, 10.5, 10.5),
        }
    }
}

/// Owns a binary voxel field and the octree built from it.
///
/// The octree is published as an `Arc` so raycasts on other threads keep a
/// consistent snapshot. Edits go to the field and mark the map dirty; they
/// become visible to octree queries after [`Map::rebuild_octree`].
pub struct Map {
    field: VoxelField,
    octree: Arc<Octree>,
    dirty: bool,
    light_direction: Vec3,
    settings: MapSettings,
}

impl Map {
    /// Copy `source` into a fresh `dimension`-sized binary field and build
    /// its octree. Source voxels outside `dimension` are dropped; missing
    /// ones are empty.
    pub fn new(dimension: u32, source: VoxelView<'_>) -> Result<Self, FieldError> {
        Self::with_settings(dimension, source, MapSettings::default())
    }

    pub fn with_settings(
        dimension: u32,
        source: VoxelView<'_>,
        settings: MapSettings,
    ) -> Result<Self, FieldError> {
        if !is_power_of_two(dimension) {
            log::error!("Map dimension {dimension} is not a power of 2");
        }

        let field = VoxelField::from_fn(dimension, |coord| {
            if source.get(coord) != EMPTY {
                FILLED
            } else {
                EMPTY
            }
        })?;
        log::info!(
            "Copied {} filled voxels into {dimension}^3 map",
            field.filled_count()
        );

        let octree = Arc::new(Self::build(&field));
        let map = Self {
            field,
            octree,
            dirty: false,
            light_direction: Vec3::new(-1.0, -1.0, -1.5).normalize(),
            settings,
        };
        // Failures are logged; the map stays usable either way
        let _ = map.self_test();
        Ok(map)
    }

    fn build(field: &VoxelField) -> Octree {
        log::info!("Generating octree");
        let octree = Octree::generate(field.view());

        log::info!("Validating octree");
        match octree.validate(field.view()) {
            Ok(()) => log::info!("Octree validated"),
            Err(errors) => {
                log::error!("Octree validation failed with {} mismatches", errors.len());
                for error in errors.iter().take(8) {
                    log::error!("  {error}");
                }
            }
        }
        octree
    }

    /// Side length of the map.
    pub fn dimension(&self) -> u32 {
        self.field.dimension()
    }

    /// Map size along each axis.
    pub fn dimensions(&self) -> glam::UVec3 {
        glam::UVec3::splat(self.dimension())
    }

    pub fn field(&self) -> &VoxelField {
        &self.field
    }

    /// Current octree snapshot.
    pub fn octree(&self) -> Arc<Octree> {
        Arc::clone(&self.octree)
    }

    pub fn settings(&self) -> &MapSettings {
        &self.settings
    }

    /// Write a voxel. Non-zero values are stored as filled. Returns false if
    /// `pos` is outside the map. The octree is not updated until
    /// [`Map::rebuild_octree`].
    pub fn set_voxel(&mut self, pos: VoxelCoord, value: u8) -> bool {
        let value = if value != EMPTY { FILLED } else { EMPTY };
        let changed = self.field.get(pos) != value;
        let written = self.field.set(pos, value);
        if written && changed {
            self.dirty = true;
        }
        written
    }

    /// Occupancy at `pos` according to the current octree.
    pub fn get_voxel(&self, pos: VoxelCoord) -> u8 {
        self.octree.get_voxel(pos)
    }

    /// Whether the field has edits the octree does not reflect yet.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rebuild the octree from the field and publish it. Snapshots handed
    /// out earlier keep the previous tree.
    pub fn rebuild_octree(&mut self) -> Arc<Octree> {
        self.octree = Arc::new(Self::build(&self.field));
        self.dirty = false;
        Arc::clone(&self.octree)
    }

    /// Unit vector of the global light.
    pub fn light_direction(&self) -> Vec3 {
        self.light_direction
    }

    /// Rotate the global light: `delta.x` turns it about Z, `delta.y` tilts
    /// it about Y. Angles in radians.
    pub fn move_light(&mut self, delta: Vec2) {
        let rotated = rotate_pitch(rotate_yaw(self.light_direction, delta.x), delta.y);
        self.light_direction = rotated.try_normalize().unwrap_or(self.light_direction);
    }

    /// Trace `ray` through the octree.
    pub fn cast_ray(&self, ray: &Ray) -> Vec<TraversalSample> {
        cast_ray_octree(&self.octree, ray).collect()
    }

    /// Trace `ray` voxel by voxel through the field.
    pub fn cast_ray_flat(&self, ray: &Ray) -> Vec<TraversalSample> {
        cast_ray_flat(self.field.view(), ray).collect()
    }

    /// Compare both raycasters on the configured self-test ray.
    pub fn self_test(&self) -> Result<(), TraversalDivergence> {
        let ray = Ray::from_camera(
            self.settings.self_test_position,
            self.settings.self_test_camera,
        );
        if self.dirty {
            log::warn!("Running traversal self-test on a dirty map; octree is stale");
        }
        let result = check_equivalence(self.field.view(), &self.octree, &ray);
        if result.is_ok() {
            log::info!("Traversal self-test passed");
        }
        result
    }

    /// Validate the current octree against the field.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        self.octree.validate(self.field.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;

    fn sphere(dim: u32, radius: f32) -> VoxelField {
        let center = Vec3::splat(dim as f32 / 2.0);
        VoxelField::from_fn(dim, |c| {
            let p = c.as_vec3() + Vec3::splat(0.5);
            (p.distance(center) <= radius) as u8
        })
        .unwrap()
    }

    #[test]
    fn test_new_copies_and_binarizes() {
        let source = VoxelField::from_fn(8, |c| if c.y == 2 { 9 } else { 0 }).unwrap();
        let map = Map::new(8, source.view()).unwrap();
        assert_eq!(map.dimension(), 8);
        assert_eq!(map.dimensions(), glam::UVec3::splat(8));
        assert_eq!(map.field().get(IVec3::new(3, 2, 5)), 1);
        assert_eq!(map.get_voxel(IVec3::new(3, 2, 5)), 1);
        assert_eq!(map.get_voxel(IVec3::new(3, 3, 5)), 0);
        assert!(!map.is_dirty());
        assert_eq!(map.validate(), Ok(()));
    }

    #[test]
    fn test_new_from_larger_source_crops() {
        let source = VoxelField::from_fn(16, |c| (c.x == 12 || c.x == 1) as u8).unwrap();
        let map = Map::new(8, source.view()).unwrap();
        assert_eq!(map.field().filled_count(), 64);
        assert_eq!(map.get_voxel(IVec3::new(1, 7, 7)), 1);
    }

    #[test]
    fn test_new_rejects_zero_dimension() {
        let source = VoxelField::new(4).unwrap();
        assert!(matches!(
            Map::new(0, source.view()),
            Err(FieldError::ZeroDimension)
        ));
    }

    #[test]
    fn test_edit_then_rebuild() {
        let source = VoxelField::new(8).unwrap();
        let mut map = Map::new(8, source.view()).unwrap();
        let before = map.octree();

        assert!(map.set_voxel(IVec3::new(4, 4, 4), 3));
        assert!(map.is_dirty());
        assert_eq!(map.get_voxel(IVec3::new(4, 4, 4)), 0);

        let after = map.rebuild_octree();
        assert!(!map.is_dirty());
        assert_eq!(map.get_voxel(IVec3::new(4, 4, 4)), 1);
        // Earlier snapshot is untouched
        assert_eq!(before.get_voxel(IVec3::new(4, 4, 4)), 0);
        assert_eq!(after.get_voxel(IVec3::new(4, 4, 4)), 1);
    }

    #[test]
    fn test_set_voxel_out_of_bounds_and_noop() {
        let source = VoxelField::new(4).unwrap();
        let mut map = Map::new(4, source.view()).unwrap();
        assert!(!map.set_voxel(IVec3::new(4, 0, 0), 1));
        assert!(map.set_voxel(IVec3::new(1, 1, 1), 0));
        assert!(!map.is_dirty());
    }

    #[test]
    fn test_raycasts_agree_on_sphere() {
        let source = sphere(32, 9.0);
        let map = Map::new(32, source.view()).unwrap();
        let ray = Ray::new(Vec3::new(0.5, 16.2, 15.7), Vec3::X);
        let flat = map.cast_ray_flat(&ray);
        let traced = map.cast_ray(&ray);
        assert!(traced.len() < flat.len());
        assert_eq!(flat.last(), traced.last());
        assert!(traced.last().is_some_and(|s| s.is_hit()));
        assert_eq!(map.self_test(), Ok(()));
    }

    #[test]
    fn test_move_light_keeps_unit_length() {
        let source = VoxelField::new(2).unwrap();
        let mut map = Map::new(2, source.view()).unwrap();
        let start = map.light_direction();
        assert!((start.length() - 1.0).abs() < 1e-5);

        map.move_light(Vec2::new(0.3, -0.2));
        let moved = map.light_direction();
        assert!((moved.length() - 1.0).abs() < 1e-5);
        assert!(moved.distance(start) > 1e-3);

        map.move_light(Vec2::ZERO);
        assert!(map.light_direction().distance(moved) < 1e-6);
    }

    #[test]
    fn test_non_power_of_two_map_is_usable() {
        let source = sphere(6, 2.0);
        let map = Map::new(6, source.view()).unwrap();
        assert_eq!(map.validate(), Ok(()));
        assert_eq!(map.get_voxel(IVec3::new(3, 3, 3)), 1);
    }
}

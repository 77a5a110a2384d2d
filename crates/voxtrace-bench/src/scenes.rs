use glam::Vec3;
use voxtrace_core::error::FieldError;
use voxtrace_core::field::VoxelField;
use voxtrace_core::types::{CameraDirection, Ray};

/// Shape of the occupancy field a scene is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    /// Nothing filled; every ray runs to the boundary.
    Empty,
    /// One filled voxel in the middle.
    SingleVoxel,
    /// Solid ball filling most of the field.
    Sphere,
    /// Rolling heightfield along Z.
    Terrain,
    /// Sparse white noise, roughly one voxel in `density`.
    Noise { density: u32 },
}

/// Configuration for a single benchmark scene.
pub struct SceneConfig {
    pub name: &'static str,
    pub kind: SceneKind,
    pub seed: u32,
}

/// Return the standard suite of benchmark scenes, from trivially empty to
/// worst-case noise.
pub fn standard_scenes() -> Vec<SceneConfig> {
    vec![
        SceneConfig {
            name: "empty",
            kind: SceneKind::Empty,
            seed: 1,
        },
        SceneConfig {
            name: "single-voxel",
            kind: SceneKind::SingleVoxel,
            seed: 2,
        },
        SceneConfig {
            name: "sphere",
            kind: SceneKind::Sphere,
            seed: 3,
        },
        SceneConfig {
            name: "terrain",
            kind: SceneKind::Terrain,
            seed: 4,
        },
        SceneConfig {
            name: "noise-sparse",
            kind: SceneKind::Noise { density: 500 },
            seed: 5,
        },
        SceneConfig {
            name: "noise-dense",
            kind: SceneKind::Noise { density: 20 },
            seed: 6,
        },
    ]
}

/// Hash a voxel position and seed into a deterministic pseudo-random u32.
pub fn scene_hash(x: i32, y: i32, z: i32, seed: u32) -> u32 {
    let mut state = (x as u32)
        .wrapping_mul(0x9E3779B9)
        .wrapping_add((y as u32).wrapping_mul(0x517CC1B7))
        .wrapping_add((z as u32).wrapping_mul(0x6C62272E))
        .wrapping_add(seed.wrapping_mul(0x2545F491));

    // PCG-style mixing rounds
    state = state ^ (state >> 16);
    state = state.wrapping_mul(0x45D9F3B);
    state = state ^ (state >> 16);
    state = state.wrapping_mul(0x45D9F3B);
    state ^ (state >> 16)
}

/// Convert a hash value to a float in [0, 1).
pub fn hash_to_unit(hash: u32) -> f32 {
    (hash >> 8) as f32 / 16_777_216.0 // 2^24
}

/// Build the occupancy field for `config` at the given size.
pub fn generate_field(config: &SceneConfig, dimension: u32) -> Result<VoxelField, FieldError> {
    let dim = dimension as f32;
    let center = Vec3::splat(dim / 2.0);
    let seed = config.seed;

    match config.kind {
        SceneKind::Empty => VoxelField::new(dimension),
        SceneKind::SingleVoxel => {
            let mut field = VoxelField::new(dimension)?;
            field.set(center.as_ivec3(), 1);
            Ok(field)
        }
        SceneKind::Sphere => {
            let radius = dim * 0.4;
            VoxelField::from_fn(dimension, |c| {
                ((c.as_vec3() + 0.5).distance(center) <= radius) as u8
            })
        }
        SceneKind::Terrain => {
            let phase = hash_to_unit(scene_hash(0, 0, 0, seed)) * std::f32::consts::TAU;
            VoxelField::from_fn(dimension, |c| {
                let (x, y) = (c.x as f32 / dim, c.y as f32 / dim);
                let wave = (x * 9.0 + phase).sin() * (y * 7.0 - phase).cos();
                let jitter = hash_to_unit(scene_hash(c.x, c.y, 0, seed)) * 0.03;
                let height = dim * (0.3 + 0.12 * wave + jitter);
                ((c.z as f32) < height) as u8
            })
        }
        SceneKind::Noise { density } => VoxelField::from_fn(dimension, |c| {
            (scene_hash(c.x, c.y, c.z, seed) % density.max(1) == 0) as u8
        }),
    }
}

/// Deterministic set of camera rays with origins inside the field and
/// arbitrary orientations.
pub fn generate_rays(dimension: u32, count: u32, seed: u32) -> Vec<Ray> {
    let dim = dimension as f32;
    (0..count as i32)
        .map(|i| {
            let h = |k: i32| hash_to_unit(scene_hash(i, k, 0, seed));
            let position = Vec3::new(h(0), h(1), h(2)) * dim;
            let camera = CameraDirection::new(
                h(3) * std::f32::consts::TAU,
                h(4) * std::f32::consts::TAU,
            );
            Ray::from_camera(position, camera)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(scene_hash(5, 10, 3, 42), scene_hash(5, 10, 3, 42));
        assert_ne!(scene_hash(0, 0, 0, 0), scene_hash(1, 0, 0, 0));
        let u = hash_to_unit(u32::MAX);
        assert!((0.0..1.0).contains(&u));
    }

    #[test]
    fn test_scene_fields() {
        let scenes = standard_scenes();
        for config in &scenes {
            let field = generate_field(config, 16).unwrap();
            assert_eq!(field.dimension(), 16, "scene {}", config.name);
        }

        let single = generate_field(&scenes[1], 16).unwrap();
        assert_eq!(single.filled_count(), 1);
        assert_eq!(single.get(IVec3::splat(8)), 1);

        let sphere = generate_field(&scenes[2], 16).unwrap();
        assert_eq!(sphere.get(IVec3::splat(8)), 1);
        assert_eq!(sphere.get(IVec3::ZERO), 0);

        let terrain = generate_field(&scenes[3], 32).unwrap();
        assert_eq!(terrain.get(IVec3::new(5, 5, 0)), 1);
        assert_eq!(terrain.get(IVec3::new(5, 5, 31)), 0);
    }

    #[test]
    fn test_rays_inside_field() {
        let rays = generate_rays(32, 100, 7);
        assert_eq!(rays.len(), 100);
        for ray in &rays {
            assert!(ray.origin.cmpge(Vec3::ZERO).all() && ray.origin.cmplt(Vec3::splat(32.0)).all());
            assert!((ray.direction.length() - 1.0).abs() < 1e-4);
        }
        assert_eq!(rays, generate_rays(32, 100, 7));
    }
}

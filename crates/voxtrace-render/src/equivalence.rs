use voxtrace_core::constants::MAX_RAY_STEPS;
use voxtrace_core::error::TraversalDivergence;
use voxtrace_core::field::VoxelView;
use voxtrace_core::types::{Ray, TraversalSample};

use crate::flat_raycast::cast_ray_flat;
use crate::octree::Octree;
use crate::octree_raycast::cast_ray_octree;

/// Check that an octree path agrees with the flat path for the same ray.
///
/// Every octree sample must appear in the flat path, in order, with the same
/// hit status, and both paths must end the same way. When the flat path ran
/// out of steps without a hit, the octree may continue past it.
pub fn compare_traversals(
    flat: &[TraversalSample],
    octree: &[TraversalSample],
) -> Result<(), TraversalDivergence> {
    let flat_exhausted =
        flat.len() >= MAX_RAY_STEPS as usize && flat.last().is_some_and(|s| !s.is_hit());

    let mut cursor = 0;
    for (index, sample) in octree.iter().enumerate() {
        let Some(offset) = flat[cursor..].iter().position(|f| f.voxel == sample.voxel) else {
            if flat_exhausted {
                return Ok(());
            }
            return Err(TraversalDivergence::MissingSample {
                index,
                sample: *sample,
            });
        };
        let matched = flat[cursor + offset];
        if matched.is_hit() != sample.is_hit() {
            return Err(TraversalDivergence::OccupancyMismatch {
                index,
                voxel: sample.voxel,
                flat: matched.occupancy,
                octree: sample.occupancy,
            });
        }
        cursor += offset + 1;
    }

    let flat_hit = flat.last().filter(|s| s.is_hit());
    let octree_hit = octree.last().filter(|s| s.is_hit());
    let terminates_alike = match (flat_hit, octree_hit) {
        (Some(f), Some(o)) => f.voxel == o.voxel,
        (None, None) => true,
        // The octree may find a hit the exhausted flat path never reached
        (None, Some(_)) => flat_exhausted,
        (Some(_), None) => false,
    };
    if terminates_alike {
        Ok(())
    } else {
        Err(TraversalDivergence::TerminalMismatch {
            index: octree.len(),
            flat: flat.last().copied(),
            octree: octree.last().copied(),
        })
    }
}

/// Run both raycasters on `ray` and compare their paths. Divergence is
/// logged at ERROR with the first diverging octree index.
pub fn check_equivalence(
    field: VoxelView<'_>,
    octree: &Octree,
    ray: &Ray,
) -> Result<(), TraversalDivergence> {
    let flat: Vec<TraversalSample> = cast_ray_flat(field, ray).collect();
    let traced: Vec<TraversalSample> = cast_ray_octree(octree, ray).collect();

    compare_traversals(&flat, &traced).inspect_err(|divergence| {
        log::error!(
            "Octree traversal diverged at index {} for ray {:?}: {divergence}",
            divergence.index(),
            ray
        );
        log::debug!("flat path: {flat:?}");
        log::debug!("octree path: {traced:?}");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec3, Vec3};
    use voxtrace_core::field::VoxelField;
    use voxtrace_core::math::ray_direction;
    use voxtrace_core::types::CameraDirection;

    fn sample(x: i32, y: i32, z: i32, occupancy: u8) -> TraversalSample {
        TraversalSample::new(IVec3::new(x, y, z), occupancy)
    }

    /// Deterministic integer hash for reproducible test scenes.
    fn hash(x: u32, y: u32, z: u32, seed: u32) -> u32 {
        let mut h = seed
            .wrapping_mul(747_796_405)
            .wrapping_add(x.wrapping_mul(2_891_336_453))
            .wrapping_add(y.wrapping_mul(1_181_783_497))
            .wrapping_add(z.wrapping_mul(3_363_461_237));
        h = ((h >> ((h >> 28) + 4)) ^ h).wrapping_mul(277_803_737);
        (h >> 22) ^ h
    }

    fn unit(h: u32) -> f32 {
        (h % 10_000) as f32 / 10_000.0
    }

    #[test]
    fn test_subsequence_accepted() {
        let flat = [sample(1, 0, 0, 0), sample(2, 0, 0, 0), sample(3, 0, 0, 1)];
        let octree = [sample(2, 0, 0, 0), sample(3, 0, 0, 1)];
        assert_eq!(compare_traversals(&flat, &octree), Ok(()));
        assert_eq!(compare_traversals(&flat, &octree[1..]), Ok(()));
    }

    #[test]
    fn test_missing_sample_reported() {
        let flat = [sample(1, 0, 0, 0), sample(2, 0, 0, 1)];
        let octree = [sample(1, 1, 0, 0), sample(2, 0, 0, 1)];
        let err = compare_traversals(&flat, &octree).unwrap_err();
        assert!(matches!(err, TraversalDivergence::MissingSample { index: 0, .. }));
    }

    #[test]
    fn test_out_of_order_reported() {
        let flat = [sample(1, 0, 0, 0), sample(2, 0, 0, 0), sample(3, 0, 0, 0)];
        let octree = [sample(2, 0, 0, 0), sample(1, 0, 0, 0)];
        let err = compare_traversals(&flat, &octree).unwrap_err();
        assert_eq!(err.index(), 1);
    }

    #[test]
    fn test_occupancy_mismatch_reported() {
        let flat = [sample(1, 0, 0, 0), sample(2, 0, 0, 0)];
        let octree = [sample(2, 0, 0, 1)];
        let err = compare_traversals(&flat, &octree).unwrap_err();
        assert!(matches!(
            err,
            TraversalDivergence::OccupancyMismatch {
                index: 0,
                flat: 0,
                octree: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_terminal_mismatch_reported() {
        // Octree stops early without reaching the hit
        let flat = [sample(1, 0, 0, 0), sample(2, 0, 0, 1)];
        let octree = [sample(1, 0, 0, 0)];
        let err = compare_traversals(&flat, &octree).unwrap_err();
        assert_eq!(
            err,
            TraversalDivergence::TerminalMismatch {
                index: 1,
                flat: Some(sample(2, 0, 0, 1)),
                octree: Some(sample(1, 0, 0, 0)),
            }
        );
    }

    #[test]
    fn test_exhausted_flat_path_compares_prefix() {
        let flat: Vec<TraversalSample> = (0..MAX_RAY_STEPS as i32)
            .map(|x| sample(x, 0, 0, 0))
            .collect();
        let octree = [sample(512, 0, 0, 0), sample(900, 0, 0, 1)];
        assert_eq!(compare_traversals(&flat, &octree), Ok(()));
    }

    #[test]
    fn test_single_voxel_scene() {
        let mut field = VoxelField::new(8).unwrap();
        field.set(IVec3::new(4, 4, 4), 1);
        let octree = Octree::generate(field.view());
        let ray = Ray::new(Vec3::splat(0.5), Vec3::ONE);
        assert_eq!(check_equivalence(field.view(), &octree, &ray), Ok(()));

        let flat: Vec<_> = cast_ray_flat(field.view(), &ray).collect();
        let traced: Vec<_> = cast_ray_octree(&octree, &ray).collect();
        assert_eq!(flat.last(), Some(&sample(4, 4, 4, 1)));
        assert_eq!(traced.last(), Some(&sample(4, 4, 4, 1)));
    }

    #[test]
    fn test_axis_and_diagonal_rays() {
        let field = VoxelField::from_fn(16, |c| {
            (hash(c.x as u32, c.y as u32, c.z as u32, 11) % 23 == 0) as u8
        })
        .unwrap();
        let octree = Octree::generate(field.view());
        let directions = [
            Vec3::X,
            -Vec3::Y,
            Vec3::Z,
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 1.0),
            Vec3::new(1.0, -1.0, -1.0),
        ];
        for origin in [Vec3::splat(0.5), Vec3::new(8.5, 7.5, 3.5), Vec3::splat(15.5)] {
            for direction in directions {
                let ray = Ray::new(origin, direction);
                assert_eq!(
                    check_equivalence(field.view(), &octree, &ray),
                    Ok(()),
                    "ray {ray:?}"
                );
            }
        }
    }

    #[test]
    fn test_random_scenes_and_rays() {
        for (dim, seed, density) in [(8, 1, 9), (16, 2, 31), (32, 3, 97), (32, 4, 400), (64, 5, 2000)] {
            let field = VoxelField::from_fn(dim, |c| {
                (hash(c.x as u32, c.y as u32, c.z as u32, seed) % density == 0) as u8
            })
            .unwrap();
            let octree = Octree::generate(field.view());
            let extent = dim as f32;

            for i in 0..64u32 {
                let h = |k: u32| hash(i, k, seed, 77);
                let position = Vec3::new(unit(h(0)), unit(h(1)), unit(h(2))) * extent;
                let camera = CameraDirection::new(
                    unit(h(3)) * std::f32::consts::TAU,
                    unit(h(4)) * std::f32::consts::TAU,
                );
                let ray = Ray::new(position, ray_direction(camera));
                assert_eq!(
                    check_equivalence(field.view(), &octree, &ray),
                    Ok(()),
                    "dim {dim} seed {seed} ray {i}: {ray:?}"
                );
            }
        }
    }

    #[test]
    fn test_non_power_of_two_scene() {
        let field = VoxelField::from_fn(6, |c| (c.x + c.y + c.z == 9) as u8).unwrap();
        let octree = Octree::generate(field.view());
        for direction in [Vec3::X, Vec3::new(1.0, 0.5, 0.25), Vec3::new(-0.3, 1.0, 0.7)] {
            let ray = Ray::new(Vec3::new(0.5, 1.5, 0.5), direction);
            assert_eq!(check_equivalence(field.view(), &octree, &ray), Ok(()));
        }
    }

    #[test]
    fn test_octants_behind_far_words() {
        // Noisy lower half; the later lower octants are reached through far
        // words. Rays start in the empty upper half and head down into it.
        let field = VoxelField::from_fn(128, |c| {
            (c.z < 64 && hash(c.x as u32, c.y as u32, c.z as u32, 8) % 3 == 0) as u8
        })
        .unwrap();
        let octree = Octree::generate(field.view());
        assert!(octree.stats().far_pointers > 0);

        for i in 0..128u32 {
            let h = |k: u32| unit(hash(i, k, 8, 91));
            let position = Vec3::new(h(0) * 128.0, h(1) * 128.0, 64.0 + h(2) * 64.0);
            let direction = Vec3::new(h(3) - 0.5, h(4) - 0.5, -0.2 - h(5));
            let ray = Ray::new(position, direction);
            assert_eq!(
                check_equivalence(field.view(), &octree, &ray),
                Ok(()),
                "ray {i}: {ray:?}"
            );
        }
    }
}

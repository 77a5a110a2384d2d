use std::time::Instant;

use rayon::prelude::*;
use voxtrace_core::error::FieldError;
use voxtrace_core::types::Ray;
use voxtrace_render::equivalence::check_equivalence;
use voxtrace_render::flat_raycast::cast_ray_flat;
use voxtrace_render::octree_raycast::cast_ray_octree;
use voxtrace_world::Map;

use crate::scenes::{self, SceneConfig};

/// Timing data for a single benchmark run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TimingSeries {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Result of a single scene benchmark.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BenchmarkResult {
    pub scene_name: String,
    pub dimension: u32,
    pub filled_voxels: usize,
    pub descriptors: usize,
    pub ray_count: u32,
    pub rounds: u32,
    /// Samples produced per round by the flat raycaster.
    pub flat_samples: usize,
    /// Samples produced per round by the octree raycaster.
    pub octree_samples: usize,
    /// Rays whose octree path disagreed with the flat one.
    pub divergences: usize,
    pub flat: TimingSeries,
    pub octree: TimingSeries,
}

impl BenchmarkResult {
    /// Flat mean time over octree mean time.
    pub fn speedup(&self) -> f64 {
        if self.octree.mean_ms > 0.0 {
            self.flat.mean_ms / self.octree.mean_ms
        } else {
            0.0
        }
    }
}

/// Casts a fixed ray set through each scene, once per raycaster per round.
pub struct BenchmarkRunner {
    dimension: u32,
    ray_count: u32,
    rounds: u32,
}

impl BenchmarkRunner {
    pub fn new(dimension: u32, ray_count: u32, rounds: u32) -> Self {
        Self {
            dimension,
            ray_count,
            rounds,
        }
    }

    /// Run a single benchmark scene and return timing results.
    pub fn run_scene(&self, config: &SceneConfig) -> Result<BenchmarkResult, FieldError> {
        log::info!(
            "Running scene '{}' ({}^3, {} rays)...",
            config.name,
            self.dimension,
            self.ray_count
        );

        let source = scenes::generate_field(config, self.dimension)?;
        let map = Map::new(self.dimension, source.view())?;
        let octree = map.octree();
        let field = map.field().view();
        let rays = scenes::generate_rays(self.dimension, self.ray_count, config.seed);

        log::info!(
            "  {} filled voxels, {} descriptors",
            map.field().filled_count(),
            octree.node_count()
        );

        let mut flat_times = Vec::with_capacity(self.rounds as usize);
        let mut octree_times = Vec::with_capacity(self.rounds as usize);
        let mut flat_samples = 0;
        let mut octree_samples = 0;

        for _ in 0..self.rounds {
            let start = Instant::now();
            flat_samples = cast_all(&rays, |ray| cast_ray_flat(field, ray).count());
            flat_times.push(start.elapsed().as_secs_f64() * 1000.0);

            let start = Instant::now();
            octree_samples = cast_all(&rays, |ray| cast_ray_octree(&octree, ray).count());
            octree_times.push(start.elapsed().as_secs_f64() * 1000.0);
        }

        let divergences = rays
            .par_iter()
            .filter(|ray| check_equivalence(field, &octree, ray).is_err())
            .count();
        if divergences > 0 {
            log::error!(
                "  {divergences} of {} rays diverged in scene '{}'",
                rays.len(),
                config.name
            );
        }

        let flat = compute_timings(&flat_times);
        let octree_timings = compute_timings(&octree_times);
        log::info!(
            "  Done: flat mean={:.2}ms, octree mean={:.2}ms, p95={:.2}ms",
            flat.mean_ms,
            octree_timings.mean_ms,
            octree_timings.p95_ms
        );

        Ok(BenchmarkResult {
            scene_name: config.name.to_string(),
            dimension: self.dimension,
            filled_voxels: map.field().filled_count(),
            descriptors: octree.node_count(),
            ray_count: self.ray_count,
            rounds: self.rounds,
            flat_samples,
            octree_samples,
            divergences,
            flat,
            octree: octree_timings,
        })
    }
}

/// Trace every ray in parallel and return the total sample count.
fn cast_all(rays: &[Ray], trace: impl Fn(&Ray) -> usize + Send + Sync) -> usize {
    rays.par_iter().map(trace).sum()
}

/// Compute timing statistics from a list of frame times in milliseconds.
pub fn compute_timings(times: &[f64]) -> TimingSeries {
    if times.is_empty() {
        return TimingSeries {
            mean_ms: 0.0,
            median_ms: 0.0,
            p95_ms: 0.0,
            p99_ms: 0.0,
            min_ms: 0.0,
            max_ms: 0.0,
        };
    }

    let mut sorted = times.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    let median = if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    };
    let p95_idx = ((n as f64) * 0.95).ceil() as usize;
    let p99_idx = ((n as f64) * 0.99).ceil() as usize;

    TimingSeries {
        mean_ms: mean,
        median_ms: median,
        p95_ms: sorted[p95_idx.min(n - 1)],
        p99_ms: sorted[p99_idx.min(n - 1)],
        min_ms: sorted[0],
        max_ms: sorted[n - 1],
    }
}

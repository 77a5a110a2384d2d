use std::path::PathBuf;
use std::process;
use std::str::FromStr;

use voxtrace_bench::report;
use voxtrace_bench::runner::BenchmarkRunner;
use voxtrace_bench::scenes;

const DEFAULT_ROUNDS: u32 = 5;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    let mut baseline_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut regression_threshold = 10.0f64;
    let mut dimension = 128u32;
    let mut ray_count = 4096u32;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--baseline" => {
                i += 1;
                baseline_path = Some(PathBuf::from(flag_value::<String>(&args, i, "--baseline")));
            }
            "--output" => {
                i += 1;
                output_path = Some(PathBuf::from(flag_value::<String>(&args, i, "--output")));
            }
            "--regression-threshold" => {
                i += 1;
                regression_threshold = flag_value(&args, i, "--regression-threshold");
            }
            "--dimension" => {
                i += 1;
                dimension = flag_value(&args, i, "--dimension");
            }
            "--rays" => {
                i += 1;
                ray_count = flag_value(&args, i, "--rays");
            }
            "--help" | "-h" => {
                eprintln!("Usage: trace-bench [OPTIONS]");
                eprintln!("  --dimension <n>                Field side length (default: 128)");
                eprintln!("  --rays <n>                     Rays per scene (default: 4096)");
                eprintln!("  --baseline <path>              Load baseline JSON for comparison");
                eprintln!("  --output <path>                Save current results as JSON baseline");
                eprintln!(
                    "  --regression-threshold <pct>   Regression threshold percentage (default: 10)"
                );
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    let runner = BenchmarkRunner::new(dimension, ray_count, DEFAULT_ROUNDS);

    let mut results = Vec::new();
    for config in &scenes::standard_scenes() {
        match runner.run_scene(config) {
            Ok(result) => results.push(result),
            Err(e) => {
                log::error!("Scene '{}' failed: {e}", config.name);
                process::exit(1);
            }
        }
    }

    // Print markdown summary
    println!("\n## Traversal Benchmark Results\n");
    println!("{}", report::format_markdown(&results));

    if let Some(ref path) = output_path {
        let baseline = report::Baseline {
            timestamp: run_timestamp(),
            dimension,
            results: results.clone(),
        };
        match report::save_baseline(path, &baseline) {
            Ok(()) => log::info!("Saved baseline to {}", path.display()),
            Err(e) => log::error!("Failed to save baseline to {}: {e}", path.display()),
        }
    }

    if let Some(ref path) = baseline_path {
        if let Some(baseline) = report::load_baseline(path) {
            let regressions = report::compare(&results, &baseline, regression_threshold);
            println!(
                "{}",
                report::format_comparison(&regressions, regression_threshold)
            );
            if !regressions.is_empty() {
                eprintln!(
                    "ERROR: {} regressions detected, exiting with code 1",
                    regressions.len()
                );
                process::exit(1);
            }
        } else {
            log::warn!("Baseline file not found: {}", path.display());
        }
    }

    let divergent: usize = results.iter().map(|r| r.divergences).sum();
    if divergent > 0 {
        eprintln!("ERROR: {divergent} rays diverged between raycasters");
        process::exit(1);
    }

    log::info!("Benchmark complete.");
}

/// Parse the value following a flag, exiting with a message if it is
/// missing or malformed.
fn flag_value<T: FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let Some(raw) = args.get(i) else {
        eprintln!("Missing value for {flag}");
        process::exit(1);
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            eprintln!("Invalid value for {flag}: {raw}");
            process::exit(1);
        }
    }
}

/// Seconds since the Unix epoch, used to tag baselines.
fn run_timestamp() -> String {
    let secs = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("bench-{secs}")
}

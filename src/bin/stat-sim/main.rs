// Replicate Statistics Demo Runner: seeded Monte Carlo over years x replicates
// One worker per replicate, each owning its aggregators, merged at the end
//
// Usage:
//   cargo run --release --bin stat-sim                          # 1950:2000, 10 reps
//   cargo run --release --bin stat-sim -- --years 1900:1950     # Custom year range
//   cargo run --release --bin stat-sim -- --reps 30 --seed 42   # Replicates and base seed
//   cargo run --release --bin stat-sim -- --config run.json     # Load SimulationConfig
//   cargo run --release --bin stat-sim -- --out stats-out       # Output directory

mod events;

use events::EventGenerator;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use replicate_stats::*;
use std::path::PathBuf;
use std::time::Instant;

const SIZE_TITLE: &str = "EventSize";
const TOTAL_TITLE: &str = "AnnualTotal";
const QUIET_TITLE: &str = "QuietYears";

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    first_year: i32,
    last_year: i32,
    reps: usize,
    seed: u64,
    lambda: f64,
    mean_size: f64,
    out: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs {
        first_year: 1950,
        last_year: 2000,
        reps: 10,
        seed: 0,
        lambda: 3.0,
        mean_size: 250.0,
        out: None,
        config: None,
    };

    let mut i = 0;
    while i < args.len() {
        let value = args.get(i + 1);
        match args[i].as_str() {
            "--years" => {
                if let Some((a, b)) = value.and_then(|v| v.split_once(':')) {
                    cli.first_year = a.parse().unwrap_or(cli.first_year);
                    cli.last_year = b.parse().unwrap_or(cli.last_year);
                }
                i += 1;
            }
            "--reps" => {
                cli.reps = value.and_then(|v| v.parse().ok()).unwrap_or(cli.reps);
                i += 1;
            }
            "--seed" => {
                cli.seed = value.and_then(|v| v.parse().ok()).unwrap_or(0);
                i += 1;
            }
            "--lambda" => {
                cli.lambda = value.and_then(|v| v.parse().ok()).unwrap_or(cli.lambda);
                i += 1;
            }
            "--mean-size" => {
                cli.mean_size = value.and_then(|v| v.parse().ok()).unwrap_or(cli.mean_size);
                i += 1;
            }
            "--out" => {
                cli.out = value.map(PathBuf::from);
                i += 1;
            }
            "--config" => {
                cli.config = value.map(PathBuf::from);
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
            }
        }
        i += 1;
    }

    cli
}

// ─── Per-Replicate Worker ───────────────────────────────────────────────────

struct RepMetrics {
    sizes: MetricAggregator,
    totals: MetricAggregator,
    quiet: MetricAggregator,
}

/// Each replicate draws from its own stream, offset from the base seed.
fn replicate_seed(base: u64, rep: usize) -> u64 {
    base.wrapping_add(rep as u64)
}

fn run_replicate(
    config: &SimulationConfig,
    registry: &StatRegistry,
    cli: &CliArgs,
    rep: usize,
) -> Result<RepMetrics, StatError> {
    let blank = |title: &str| -> Result<MetricAggregator, StatError> {
        let flags = registry.get(title).map(MetricAggregator::flags).unwrap_or_default();
        MetricAggregator::new(title, flags, config)
    };
    let mut metrics = RepMetrics {
        sizes: blank(SIZE_TITLE)?,
        totals: blank(TOTAL_TITLE)?,
        quiet: blank(QUIET_TITLE)?,
    };

    let rng = ChaCha8Rng::seed_from_u64(replicate_seed(cli.seed, rep));
    let mut generator = EventGenerator::new(rng, cli.lambda, cli.mean_size);

    for year in config.years() {
        let sizes = generator.generate_year();
        if sizes.is_empty() {
            metrics.quiet.increment_tally();
        }
        for &size in &sizes {
            metrics.sizes.add(year, rep, size)?;
        }
        metrics.totals.add(year, rep, sizes.iter().sum())?;
    }
    Ok(metrics)
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn run(cli: &CliArgs) -> Result<(), StatError> {
    let mut config = match &cli.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::new(cli.first_year, cli.last_year, cli.reps)?
            .with_output_dir("stat-results"),
    };
    if let Some(out) = &cli.out {
        config.output_dir = out.clone();
    }

    let mut registry = StatRegistry::new(config.clone())?;
    registry.add_metric(
        SIZE_TITLE,
        OutputFlags::OUT_EVENTS
            | OutputFlags::OUT_YEAR
            | OutputFlags::OUT_REP
            | OutputFlags::OUT_FORMAT
            | OutputFlags::OUT_NUM
            | OutputFlags::OUT_MEAN
            | OutputFlags::OUT_STD_DEV
            | OutputFlags::OUT_MAX,
    )?;
    registry.add_metric(
        TOTAL_TITLE,
        OutputFlags::OUT_DATA | OutputFlags::OUT_YEAR | OutputFlags::OUT_FORMAT | OutputFlags::OUT_MEAN,
    )?;
    registry.add_metric(QUIET_TITLE, OutputFlags::NONE)?;

    println!("\n  Replicate Statistics Demo");
    println!(
        "  PRNG: ChaCha8Rng | Years: {}..={} | Reps: {} | Base seed: {}",
        config.first_year, config.last_year, config.max_reps, cli.seed
    );
    println!("  Output: {}\n", config.output_dir.display());

    let start = Instant::now();
    let results: Vec<Result<RepMetrics, StatError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..config.max_reps)
            .map(|rep| {
                let (config, registry) = (&config, &registry);
                scope.spawn(move || run_replicate(config, registry, cli, rep))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("replicate worker panicked"))
            .collect()
    });

    for result in results {
        let worker = result?;
        for (title, part) in [
            (SIZE_TITLE, &worker.sizes),
            (TOTAL_TITLE, &worker.totals),
            (QUIET_TITLE, &worker.quiet),
        ] {
            if let Some(metric) = registry.get_mut(title) {
                metric.merge(part)?;
            }
        }
    }
    let elapsed = start.elapsed();

    println!("  {:<14} {:>10} {:>14} {:>14}", "Metric", "Events", "Sum/years", "Sum/reps");
    println!("  {}", "-".repeat(56));
    for metric in registry.iter() {
        println!(
            "  {:<14} {:>10} {:>14.1} {:>14.1}",
            metric.title(),
            metric.event_count(),
            metric.sum_across_years(),
            metric.sum_across_reps(),
        );
    }
    if let Some(quiet) = registry.get(QUIET_TITLE) {
        println!("\n  Years without events: {}", quiet.tally());
    }
    println!("  Simulated in {:.1} ms", elapsed.as_secs_f64() * 1000.0);

    let written = registry.save_all()?;
    let json = registry.save_json("summary")?;
    for path in written.iter().chain(std::iter::once(&json)) {
        println!("  Wrote {}", path.display());
    }
    println!();
    Ok(())
}

fn main() {
    let cli = parse_args();
    if let Err(e) = run(&cli) {
        eprintln!("  Error: {}", e);
        std::process::exit(1);
    }
}

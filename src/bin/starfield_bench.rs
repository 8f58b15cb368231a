// src/bin/starfield_bench.rs
//
// Headless run: create the default star field, advance it a fixed number of
// 1/120 s steps and log how long that took.

use std::process;
use std::time::Instant;

use clap::Parser;
use log::{error, info};
use rs_starfield::simulation::SimulationWorld;
use rs_starfield::utils::{Executor, SimError, SimulationConfig, SUBSTEP};

/// Runs the default star field headless and reports milliseconds per step.
#[derive(Parser, Debug)]
#[command(name = "starfield_bench")]
struct Args {
    /// Number of 1/120 s steps to run.
    steps: usize,
    /// Run columns on a dedicated pool with this many workers.
    #[arg(long)]
    threads: Option<usize>,
    /// Run columns on the global rayon pool.
    #[arg(long, conflicts_with = "threads")]
    rayon: bool,
}

impl Args {
    fn executor(&self) -> Executor {
        match (self.threads, self.rayon) {
            (Some(threads), _) => Executor::ThreadPool { threads },
            (None, true) => Executor::Rayon,
            (None, false) => Executor::Inline,
        }
    }
}

fn run(steps: usize, executor: Executor) -> Result<(), SimError> {
    let config = SimulationConfig::default().with_executor(executor);
    let mut world = SimulationWorld::new(config)?;

    let started = Instant::now();
    let placed = world.create()?;
    info!("Placed {} stars in {:?}", placed, started.elapsed());

    let started = Instant::now();
    let mut migrated = 0;
    let mut lost = 0;
    for _ in 0..steps {
        let report = world.step(SUBSTEP)?;
        migrated += report.migrated;
        lost += report.escaped + report.rejected;
    }
    let elapsed = started.elapsed();
    let per_step = elapsed.as_secs_f64() * 1000.0 / steps.max(1) as f64;
    info!(
        "{} steps in {:?} ({:.3} ms/step), {} migrations, {} stars lost, {} remain",
        steps,
        elapsed,
        per_step,
        migrated,
        lost,
        world.total_count()
    );
    println!("{:.3} ms/step", per_step);
    world.shutdown();
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(args.steps, args.executor()) {
        error!("Benchmark failed: {}", e);
        process::exit(1);
    }
}

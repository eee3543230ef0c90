use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use junction_sim::simulation::{
    self, spawn_file_producer, spawn_random_producer, IntersectionScheduler, RandomSpawner,
    SimConfig, Validate,
};

#[derive(Parser)]
#[command(name = "junction_sim")]
#[command(about = "Four-way junction traffic simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.1")]
    delta: f32,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read vehicles from this file instead of generating them
    #[arg(long)]
    spawn_file: Option<PathBuf>,

    /// Vehicles per simulated second for the random generator
    #[arg(long)]
    spawn_rate: Option<f32>,

    /// Simulated seconds per wall-clock second. 0 runs a spawn file unpaced.
    #[arg(long, default_value = "50")]
    realtime_factor: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    run_headless(&cli)
}

fn load_config(cli: &Cli) -> Result<SimConfig> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::from_toml_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(rate) = cli.spawn_rate {
        config.generator.spawn_rate = rate;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(cli: &Cli) -> Result<()> {
    anyhow::ensure!(cli.delta > 0.0, "--delta must be positive");
    anyhow::ensure!(
        cli.spawn_file.is_some() || cli.realtime_factor > 0.0,
        "--realtime-factor must be positive when generating random traffic"
    );
    let config = load_config(cli)?;

    println!("Running junction simulation in headless mode...");
    println!("Ticks: {}, Delta: {}s", cli.ticks, cli.delta);

    // Calculate how many ticks equal 1 second of simulation time
    let ticks_per_second = ((1.0 / cli.delta).ceil() as u32).max(1);
    println!("Running {} ticks per second (simulated time)", ticks_per_second);
    println!();

    let (producer, feed) = simulation::channel(config.scheduler.spawn_capacity);
    let handle = match &cli.spawn_file {
        Some(path) => spawn_file_producer(path, producer)?,
        None => {
            let spawner = match cli.seed {
                Some(seed) => RandomSpawner::new_with_seed(
                    seed.wrapping_add(1),
                    config.generator.emergency_probability,
                ),
                None => RandomSpawner::new(config.generator.emergency_probability),
            };
            spawn_random_producer(
                producer,
                spawner,
                config.generator.spawn_rate,
                cli.realtime_factor,
                None,
            )
        }
    };

    let mut scheduler = match cli.seed {
        Some(seed) => IntersectionScheduler::new_with_seed(config, seed)?,
        None => IntersectionScheduler::new(config)?,
    };
    scheduler.attach_feed(feed);

    let pacing = if cli.realtime_factor > 0.0 {
        Some(Duration::from_secs_f32(cli.delta / cli.realtime_factor))
    } else {
        None
    };

    let mut tick = 0;
    while tick < cli.ticks {
        // Run ticks_per_second ticks (or remaining ticks if fewer)
        let ticks_to_run = ticks_per_second.min(cli.ticks - tick);

        for _ in 0..ticks_to_run {
            tick += 1;
            scheduler
                .tick(cli.delta)
                .with_context(|| format!("Simulation failed at tick {}", tick))?;
            if let Some(pause) = pacing {
                std::thread::sleep(pause);
            }
        }

        println!("--- After tick {} ({:.1}s simulated time) ---", tick, scheduler.time);
        scheduler.print_summary();
        println!();
    }

    // Dropping the feed unblocks a producer waiting on a full channel
    handle.stop();
    drop(scheduler.detach_feed());
    let sent = handle.join()?;
    info!("Spawn producer sent {} messages", sent);

    println!("=== Final State ===");
    scheduler.print_summary();
    scheduler.log_final_summary();
    Ok(())
}

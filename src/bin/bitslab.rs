//! bitslab command-line driver
//!
//! Exercises a slab pool from the command line:
//! - Print the pool geometry
//! - Fill the pool and report occupancy
//! - Walk through the fill/spill/release scenario with logging enabled
//!
//! # Examples
//!
//! ```bash
//! # Show layout and metadata encoding
//! bitslab layout
//!
//! # Allocate 40 objects, release every third, print JSON stats
//! bitslab fill 40 --release-every 3 --json
//!
//! # Use a config file and debug logging
//! bitslab --config pool.toml --log-level debug scenario
//! ```

use anyhow::Context;
use bitslab::slab::{
    PoolStats, SlabMeta, SlabPool, OBJECTS_PER_SLAB, POOL_CAPACITY, POOL_SIZE, SLAB_COUNT,
    SLAB_SIZE, SLOT_SIZE,
};
use bitslab::PoolConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// bitslab - bitmask-driven fixed-size object slab allocator
#[derive(Parser, Debug)]
#[command(name = "bitslab")]
#[command(version = bitslab::VERSION)]
#[command(about = "Bitmask-driven fixed-size object slab allocator", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Pool configuration file (TOML)
    #[arg(long, global = true, env = "BITSLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Also write logs to daily rolling files in this directory
    #[arg(long, global = true, env = "BITSLAB_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print pool geometry and the fresh metadata encoding
    Layout,

    /// Allocate objects and report pool occupancy
    Fill(FillArgs),

    /// Fill slab 0, spill into slab 1, then release the first object
    Scenario,

    /// Show version
    Version,
}

#[derive(Args, Debug)]
struct FillArgs {
    /// Number of allocations to attempt
    #[arg(default_value_t = POOL_CAPACITY)]
    count: usize,

    /// Release every n-th allocated object afterwards (0 disables)
    #[arg(long, default_value = "0")]
    release_every: usize,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    let config = match &cli.config {
        Some(path) => PoolConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PoolConfig::default(),
    };

    match cli.command {
        Commands::Layout => layout_command(&config),
        Commands::Fill(args) => fill_command(&config, args),
        Commands::Scenario => scenario_command(&config),
        Commands::Version => {
            println!("bitslab {}", bitslab::VERSION);
            Ok(())
        }
    }
}

/// Setup console logging, plus rolling files when a log directory is given
fn setup_logging(cli: &Cli) -> anyhow::Result<()> {
    let log_level = cli
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::WARN);

    let file_layer = match &cli.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "bitslab.log");
            Some(fmt::layer().with_writer(file_appender).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(file_layer)
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(())
}

fn layout_command(config: &PoolConfig) -> anyhow::Result<()> {
    let base = config.base_address;
    println!("Pool base:        {:#x}", base);
    println!("Pool size:        {} bytes", POOL_SIZE);
    println!("Slabs:            {} x {} bytes", SLAB_COUNT, SLAB_SIZE);
    println!("Objects per slab: {} x {} bytes (slot 0 is metadata)", OBJECTS_PER_SLAB, SLOT_SIZE);
    println!("Capacity:         {} objects", POOL_CAPACITY);
    println!("Fresh metadata:   {:#018x}", SlabMeta::fresh().encode());
    Ok(())
}

fn fill_command(config: &PoolConfig, args: FillArgs) -> anyhow::Result<()> {
    let mut pool = SlabPool::new(config)?;

    let mut allocated = Vec::with_capacity(args.count.min(POOL_CAPACITY));
    for _ in 0..args.count {
        match pool.try_allocate() {
            Ok(address) => allocated.push(address),
            Err(e) => {
                warn!("Stopped after {} allocations: {}", allocated.len(), e);
                break;
            }
        }
    }

    if args.release_every > 0 {
        for address in allocated.iter().step_by(args.release_every) {
            pool.release(*address)?;
        }
    }
    pool.verify()?;

    let stats = pool.stats();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_stats(&stats);
    }
    Ok(())
}

fn scenario_command(config: &PoolConfig) -> anyhow::Result<()> {
    let mut pool = SlabPool::new(config)?;

    let first = pool.try_allocate()?;
    info!("First allocation at {}", first);
    for _ in 1..OBJECTS_PER_SLAB {
        pool.try_allocate()?;
    }
    info!("Slab 0 is now {:?}", pool.slab_state(0));

    let spilled = pool.try_allocate()?;
    info!("Next allocation spilled to {}", spilled);

    pool.release(first)?;
    info!(
        "Released {}: slab 0 is {:?} with {} free",
        first,
        pool.slab_state(0),
        pool.slab_meta(0).map_or(0, |m| m.free_count)
    );

    if let Err(e) = pool.release(first) {
        info!("Second release of {} refused: {}", first, e);
    }

    pool.verify()?;
    print_stats(&pool.stats());
    Ok(())
}

fn print_stats(stats: &PoolStats) {
    println!("Pool at {}", stats.base);
    println!(
        "  full={:#06x} partial={:#06x} empty={:#06x}",
        stats.masks.full, stats.masks.partial, stats.masks.empty
    );
    println!("  allocated={} available={}", stats.allocated, stats.available);
    for slab in &stats.slabs {
        println!(
            "  slab {:>2}: {:<7} free={:>2} mask={:016b}{}",
            slab.index,
            slab.state,
            slab.free_count,
            slab.free_mask,
            if slab.intact { "" } else { " CORRUPTED" }
        );
    }
}

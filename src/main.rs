use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use grid_traffic::simulation::{load_map, parse_map, Grid, SimConfig, SimWorld};

const BUNDLED_MAP: &str = include_str!("../maps/five_agents.txt");

#[derive(Parser)]
#[command(name = "grid_traffic")]
#[command(about = "Grid city traffic simulation with routed agents and random transports")]
struct Cli {
    /// Map file to load (digits 0-4, one row per line). Uses the bundled map if omitted.
    #[arg(long)]
    map: Option<PathBuf>,

    /// Seed for reproducible transport traffic
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many ticks even if agents remain
    #[arg(long, default_value = "10000")]
    max_ticks: u32,

    /// Delay between ticks in milliseconds
    #[arg(long, default_value = "100")]
    delay_ms: u64,

    /// Chance per tick that a free transport spawn produces a transport
    #[arg(long, default_value = "0.04")]
    spawn_probability: f64,

    /// Draw the map after every tick
    #[arg(long)]
    render: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,grid_traffic=info"),
    )
    .init();

    let cli = Cli::parse();

    let codes = match &cli.map {
        Some(path) => {
            load_map(path).with_context(|| format!("Failed to load map {}", path.display()))?
        }
        None => parse_map(BUNDLED_MAP).context("Bundled map is invalid")?,
    };
    let grid = Grid::from_codes(&codes).context("Failed to build grid")?;

    let config = SimConfig {
        spawn_probability: cli.spawn_probability,
        seed: cli.seed,
        ..SimConfig::default()
    };

    let mut world = SimWorld::new(grid, config).context("Failed to start simulation")?;
    run(&mut world, cli.max_ticks, cli.delay_ms, cli.render)?;

    println!("=== Final State ===");
    world.print_summary();
    world.draw_map();

    println!("--- Finished Agents ---");
    for agent in world.finished_agents() {
        println!("  {}", agent);
    }
    for spawn in world.stranded_agents() {
        println!("  stranded at {}", spawn);
    }

    world.shutdown();
    Ok(())
}

/// Tick until every agent is done or the tick limit is hit
fn run(world: &mut SimWorld, max_ticks: u32, delay_ms: u64, render: bool) -> Result<()> {
    info!("Running until all agents finish (limit {} ticks)", max_ticks);

    if render {
        world.draw_map();
    }

    while !world.is_finished() {
        if world.tick_count() >= u64::from(max_ticks) {
            info!("Tick limit reached with {} agents remaining", world.live_agent_count());
            break;
        }

        world
            .tick()
            .with_context(|| format!("Tick {} failed", world.tick_count()))?;

        if render {
            world.draw_map();
        }
        if delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(delay_ms));
        }
    }

    info!("=== SIMULATION COMPLETE ===");
    info!("Ticks: {}", world.tick_count());
    info!("Agents finished: {}", world.finished_agents().len());
    Ok(())
}

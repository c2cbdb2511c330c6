use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use episim::config::{Config, SimParams};
use episim::engine::Engine;
use episim::optimizer::Optimizer;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// TOML configuration file; defaults to the reference scenario.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one simulation and report its case counts.
    Simulate,

    /// Search for a containment policy with the genetic algorithm.
    Optimize,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let cfg = match &args.config {
        Some(path) => Config::from_file(path).context("failed to load config")?,
        None => Config {
            simulation: SimParams::reference(),
            search: None,
        },
    };
    log::info!("{cfg:#?}");

    match args.command {
        Command::Simulate => {
            let mut engine = Engine::new(cfg.simulation).context("failed to construct engine")?;
            let outcome = engine.run();
            log::info!(
                "finished with {} cumulated cases and {} new cases at termination",
                outcome.cumulated_cases,
                outcome.new_cases
            );
        }
        Command::Optimize => {
            let Some(search) = cfg.search else {
                bail!("config has no [search] table");
            };
            let mut opt =
                Optimizer::new(cfg.simulation, search).context("failed to construct optimizer")?;
            let best = opt.run().context("failed to run policy search")?;
            log::info!(
                "best policy {:?} with fitness {:.6}",
                best.genome,
                best.fitness
            );
        }
    }

    Ok(())
}

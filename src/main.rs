use clap::Parser;
use pokemon_line_finder::{run, CliOptions, Input, SearchMode};
use std::path::PathBuf;

/// Finds winning lines of play against a scripted opponent
#[derive(Parser, Debug)]
#[command(name = "pokemon-line-finder")]
#[command(version, about, long_about = None)]
struct Args {
    /// Scenario JSON with `player`, `opponent` and optional `options`
    #[arg(long, conflicts_with = "gauntlet", required_unless_present = "gauntlet")]
    scenario: Option<PathBuf>,

    /// Gauntlet JSON: one player roster against many trainers
    #[arg(long)]
    gauntlet: Option<PathBuf>,

    /// worst-case, probabilistic or random
    #[arg(long)]
    mode: Option<SearchMode>,

    #[arg(long)]
    max_depth: Option<u32>,

    #[arg(long)]
    max_lines: Option<usize>,

    /// Seed for random mode
    #[arg(long)]
    seed: Option<u64>,

    /// Stop searching after this many milliseconds
    #[arg(long)]
    time_budget_ms: Option<u64>,

    /// Write JSON here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let input = match (args.scenario, args.gauntlet) {
        (Some(path), _) => Input::Scenario(path),
        (None, Some(path)) => Input::Gauntlet(path),
        (None, None) => anyhow::bail!("either --scenario or --gauntlet is required"),
    };
    run(CliOptions {
        input,
        mode: args.mode,
        max_depth: args.max_depth,
        max_lines: args.max_lines,
        seed: args.seed,
        time_budget_ms: args.time_budget_ms,
        output_path: args.output,
    })
}

pub mod abilities;
pub mod ai;
pub mod battle;
pub mod damage;
pub mod error;
pub mod gauntlet;
pub mod items;
pub mod model;
pub mod risk;
pub mod rng;
pub mod search;
pub mod types;

pub use crate::battle::{simulate_turn, BattleAction, BattleState, Side, TurnOutcome};
pub use crate::error::EngineError;
pub use crate::risk::LineOfPlay;
pub use crate::search::{find_lines, CancelToken, Prioritize, SearchMode, SearchOptions};

use crate::gauntlet::{run_gauntlet, Trainer};
use crate::model::PokemonInstance;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFile {
    pub player: Vec<PokemonInstance>,
    pub opponent: Vec<PokemonInstance>,
    #[serde(default)]
    pub options: Option<SearchOptions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GauntletFile {
    pub player: Vec<PokemonInstance>,
    pub trainers: Vec<Trainer>,
    #[serde(default)]
    pub options: Option<SearchOptions>,
}

#[derive(Debug, Clone)]
pub enum Input {
    Scenario(PathBuf),
    Gauntlet(PathBuf),
}

/// Command-line overrides layered over the options stored in the input file.
#[derive(Debug, Clone)]
pub struct CliOptions {
    pub input: Input,
    pub mode: Option<SearchMode>,
    pub max_depth: Option<u32>,
    pub max_lines: Option<usize>,
    pub seed: Option<u64>,
    pub time_budget_ms: Option<u64>,
    pub output_path: Option<PathBuf>,
}

impl CliOptions {
    fn apply(&self, options: Option<SearchOptions>) -> SearchOptions {
        let mut options = options.unwrap_or_default();
        if let Some(mode) = self.mode {
            options.search_mode = mode;
        }
        if let Some(depth) = self.max_depth {
            options.max_depth = depth;
        }
        if let Some(lines) = self.max_lines {
            options.max_lines = lines;
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if self.time_budget_ms.is_some() {
            options.time_budget_ms = self.time_budget_ms;
        }
        options
    }
}

fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {what} file at {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse JSON from {}", path.display()))
}

pub fn load_scenario(path: &Path) -> anyhow::Result<ScenarioFile> {
    load_json(path, "scenario")
}

pub fn load_gauntlet(path: &Path) -> anyhow::Result<GauntletFile> {
    let parsed: GauntletFile = load_json(path, "gauntlet")?;
    if parsed.trainers.is_empty() {
        anyhow::bail!("{} lists no trainers", path.display());
    }
    Ok(parsed)
}

fn write_output(json: &str, path: Option<&Path>, summary: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            println!("Wrote {summary} to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub fn run(opts: CliOptions) -> anyhow::Result<()> {
    match &opts.input {
        Input::Scenario(path) => {
            let scenario = load_scenario(path)?;
            let options = opts.apply(scenario.options);
            let lines = find_lines(scenario.player, scenario.opponent, &options)
                .with_context(|| format!("Search failed for {}", path.display()))?;
            let json = serde_json::to_string_pretty(&lines)?;
            write_output(&json, opts.output_path.as_deref(), &format!("{} line(s)", lines.len()))
        }
        Input::Gauntlet(path) => {
            let gauntlet = load_gauntlet(path)?;
            let options = opts.apply(gauntlet.options);
            let entries = run_gauntlet(&gauntlet.player, &gauntlet.trainers, &options, &CancelToken::new());
            let json = serde_json::to_string_pretty(&entries)?;
            write_output(&json, opts.output_path.as_deref(), &format!("{} trainer result(s)", entries.len()))
        }
    }
}

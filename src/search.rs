use crate::ai::AiConfig;
use crate::battle::{legal_actions, simulate_turn, BattleAction, BattleState, Side, TurnOutcome};
use crate::error::Result;
use crate::model::PokemonInstance;
use crate::risk::{evaluate_line, success_probability, LineOfPlay};
use crate::rng::{RngMode, SeededRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    WorstCase,
    Probabilistic,
    #[default]
    Random,
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "worst-case" | "worstcase" => Ok(SearchMode::WorstCase),
            "probabilistic" => Ok(SearchMode::Probabilistic),
            "random" => Ok(SearchMode::Random),
            other => Err(format!(
                "unknown search mode {other} (use worst-case, probabilistic or random)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Prioritize {
    #[default]
    Safety,
    Speed,
    PpConservation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// Full turns explored below the starting state.
    pub max_depth: u32,
    pub max_lines: usize,
    pub allow_deaths: bool,
    /// 0 with `allow_deaths` means no limit.
    pub max_deaths: usize,
    pub allow_crit_dependence: bool,
    pub allow_accuracy_dependence: bool,
    /// Percent, 0..=100.
    pub min_success_probability: f64,
    pub search_mode: SearchMode,
    pub prioritize: Prioritize,
    pub beam_width: usize,
    pub seed: u64,
    pub time_budget_ms: Option<u64>,
    pub ai: AiConfig,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            max_depth: 6,
            max_lines: 5,
            allow_deaths: true,
            max_deaths: 0,
            allow_crit_dependence: false,
            allow_accuracy_dependence: false,
            min_success_probability: 0.0,
            search_mode: SearchMode::Random,
            prioritize: Prioritize::Safety,
            beam_width: 3,
            seed: 0,
            time_budget_ms: None,
            ai: AiConfig::default(),
        }
    }
}

impl SearchOptions {
    /// Player casualties a line may take, `None` when unlimited.
    pub fn death_limit(&self) -> Option<usize> {
        match (self.allow_deaths, self.max_deaths) {
            (false, _) => Some(0),
            (true, 0) => None,
            (true, n) => Some(n),
        }
    }
}

/// Shared flag that stops a running search. Lines found so far are still returned.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct StateKey {
    turn: u32,
    actives: [(usize, String, u32); 2],
}

impl StateKey {
    fn of(state: &BattleState) -> Self {
        let entry = |side: Side| {
            let team = state.side(side);
            let mon = team.active();
            (team.active, mon.species.clone(), mon.current_hp)
        };
        StateKey {
            turn: state.turn,
            actives: [entry(Side::Player), entry(Side::Opponent)],
        }
    }
}

struct Candidate {
    action: BattleAction,
    score: f64,
    worst_case: TurnOutcome,
}

struct LineFinder<'a> {
    initial: &'a BattleState,
    options: &'a SearchOptions,
    cancel: &'a CancelToken,
    deadline: Option<Instant>,
    rng: SeededRng,
    visited: HashSet<StateKey>,
    lines: Vec<LineOfPlay>,
    stopped: bool,
    expanded: usize,
}

impl<'a> LineFinder<'a> {
    fn new(initial: &'a BattleState, options: &'a SearchOptions, cancel: &'a CancelToken) -> Self {
        LineFinder {
            initial,
            options,
            cancel,
            deadline: options
                .time_budget_ms
                .map(|ms| Instant::now() + Duration::from_millis(ms)),
            rng: SeededRng::new(options.seed),
            visited: HashSet::new(),
            lines: Vec::new(),
            stopped: false,
            expanded: 0,
        }
    }

    fn out_of_time(&self) -> bool {
        self.cancel.is_cancelled()
            || self
                .deadline
                .map(|deadline| Instant::now() >= deadline)
                .unwrap_or(false)
    }

    fn explore(&mut self, state: &BattleState, path: &mut Vec<TurnOutcome>, probability: f64) {
        if self.stopped {
            return;
        }
        if self.out_of_time() {
            log::warn!(
                "search interrupted after {} nodes with {} line(s) found",
                self.expanded,
                self.lines.len()
            );
            self.stopped = true;
            return;
        }
        let casualties = state.side(Side::Player).fainted_count();
        if let Some(limit) = self.options.death_limit() {
            if casualties > limit {
                log::debug!("prune: {casualties} casualties over limit {limit}");
                return;
            }
        }
        match state.winner() {
            Some(Side::Player) => {
                self.record(path);
                return;
            }
            Some(Side::Opponent) => return,
            None => {}
        }
        let depth = state.turn.saturating_sub(self.initial.turn);
        if depth >= self.options.max_depth {
            log::debug!("prune: depth {depth} reached on turn {}", state.turn);
            return;
        }
        if !self.visited.insert(StateKey::of(state)) {
            return;
        }
        self.expanded += 1;

        for candidate in self.rank_actions(state) {
            if self.stopped {
                return;
            }
            let outcome = match self.options.search_mode {
                SearchMode::WorstCase => Ok(candidate.worst_case),
                SearchMode::Probabilistic => {
                    simulate_turn(state, &candidate.action, &mut RngMode::MostLikely, &self.options.ai)
                }
                SearchMode::Random => simulate_turn(
                    state,
                    &candidate.action,
                    &mut RngMode::Random(&mut self.rng),
                    &self.options.ai,
                ),
            };
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(err) => {
                    log::debug!("skip {:?}: {err}", candidate.action);
                    continue;
                }
            };
            let running = probability * success_probability(&outcome.risks) / 100.0;
            if running * 100.0 < self.options.min_success_probability {
                log::debug!(
                    "prune: {:?} drops success to {:.1}%",
                    candidate.action,
                    running * 100.0
                );
                continue;
            }
            let next = outcome.state.clone();
            path.push(outcome);
            self.explore(&next, path, running);
            path.pop();
        }
    }

    /// Scores every legal action by its worst-case result and keeps the beam.
    fn rank_actions(&self, state: &BattleState) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = legal_actions(state, Side::Player)
            .into_iter()
            .filter_map(|action| {
                match simulate_turn(state, &action, &mut RngMode::WorstCase, &self.options.ai) {
                    Ok(worst_case) => Some(Candidate {
                        score: self.score(state, &worst_case),
                        action,
                        worst_case,
                    }),
                    Err(err) => {
                        log::debug!("skip {action:?}: {err}");
                        None
                    }
                }
            })
            .collect();
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        candidates.truncate(self.options.beam_width.max(1));
        candidates
    }

    fn score(&self, before: &BattleState, outcome: &TurnOutcome) -> f64 {
        let after = &outcome.state;
        let player = after.side(Side::Player);
        let opponent = after.side(Side::Opponent);
        let knocked_out = opponent.fainted_count() as f64 - before.side(Side::Opponent).fainted_count() as f64;
        let lost = player.fainted_count() as f64 - before.side(Side::Player).fainted_count() as f64;
        let opponent_missing = (1.0 - opponent.hp_fraction()) * 100.0;

        let mut score = 1000.0 * knocked_out + 10.0 * opponent_missing - 500.0 * lost
            + 5.0 * player.hp_fraction() * 100.0
            + 100.0 * player.alive_count() as f64;

        match self.options.prioritize {
            Prioritize::Safety => {}
            Prioritize::Speed => {
                let dealt = before.side(Side::Opponent).hp_fraction() - opponent.hp_fraction();
                score += 5.0 * dealt * 100.0;
            }
            Prioritize::PpConservation => {
                if let BattleAction::Move { index, .. } = outcome.player_action {
                    let mon = player.active();
                    let remaining = mon.pp.get(index).copied().unwrap_or(0) as u32;
                    let max = mon.moves.get(index).map(|m| m.pp).unwrap_or(0) as u32;
                    if remaining * 2 < max {
                        score -= 20.0;
                    }
                }
            }
        }
        score
    }

    fn record(&mut self, path: &[TurnOutcome]) {
        let line = evaluate_line(self.initial, path.to_vec(), &self.options.ai);
        if !line.victory {
            return;
        }
        if !line.guaranteed_success {
            if line.requires_crits && !self.options.allow_crit_dependence {
                log::debug!("reject line: depends on a critical hit");
                return;
            }
            if line.requires_hits && !self.options.allow_accuracy_dependence {
                log::debug!("reject line: depends on accuracy");
                return;
            }
            if line.success_probability < self.options.min_success_probability {
                log::debug!("reject line: {:.1}% success", line.success_probability);
                return;
            }
        }
        log::debug!(
            "line found in {} turn(s), guaranteed: {}",
            line.turn_count(),
            line.guaranteed_success
        );
        self.lines.push(line);
        if self.lines.len() >= self.options.max_lines {
            self.stopped = true;
        }
    }
}

fn rank_lines(a: &LineOfPlay, b: &LineOfPlay) -> Ordering {
    b.guaranteed_success
        .cmp(&a.guaranteed_success)
        .then_with(|| a.player_casualties.len().cmp(&b.player_casualties.len()))
        .then_with(|| b.success_probability.total_cmp(&a.success_probability))
        .then_with(|| a.turn_count().cmp(&b.turn_count()))
}

/// Searches from an existing state. Never fails: no solution is an empty list.
pub fn find_lines_from(state: &BattleState, options: &SearchOptions, cancel: &CancelToken) -> Vec<LineOfPlay> {
    if options.max_lines == 0 {
        return Vec::new();
    }
    let started = Instant::now();
    let mut finder = LineFinder::new(state, options, cancel);
    let mut path = Vec::new();
    finder.explore(state, &mut path, 1.0);
    let mut lines = finder.lines;
    lines.sort_by(rank_lines);
    log::info!(
        "{:?} search expanded {} node(s) and kept {} line(s) in {:?}",
        options.search_mode,
        finder.expanded,
        lines.len(),
        started.elapsed()
    );
    lines
}

pub fn find_lines_with_cancel(
    player: Vec<PokemonInstance>,
    opponent: Vec<PokemonInstance>,
    options: &SearchOptions,
    cancel: &CancelToken,
) -> Result<Vec<LineOfPlay>> {
    let state = BattleState::new(player, opponent)?;
    Ok(find_lines_from(&state, options, cancel))
}

/// Finds up to `options.max_lines` winning lines for the player, best first.
pub fn find_lines(
    player: Vec<PokemonInstance>,
    opponent: Vec<PokemonInstance>,
    options: &SearchOptions,
) -> Result<Vec<LineOfPlay>> {
    find_lines_with_cancel(player, opponent, options, &CancelToken::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_fill_defaults_from_partial_json() {
        let options: SearchOptions =
            serde_json::from_str(r#"{ "maxDepth": 3, "searchMode": "worst-case", "prioritize": "pp-conservation" }"#)
                .unwrap();
        assert_eq!(options.max_depth, 3);
        assert_eq!(options.search_mode, SearchMode::WorstCase);
        assert_eq!(options.prioritize, Prioritize::PpConservation);
        assert_eq!(options.max_lines, 5);
        assert_eq!(options.beam_width, 3);
        assert!(options.ai.emulate_speed_check_carryover);
    }

    #[test]
    fn death_limit_follows_allow_deaths() {
        let mut options = SearchOptions::default();
        assert_eq!(options.death_limit(), None);
        options.max_deaths = 2;
        assert_eq!(options.death_limit(), Some(2));
        options.allow_deaths = false;
        assert_eq!(options.death_limit(), Some(0));
    }

    #[test]
    fn search_mode_parses_cli_names() {
        assert_eq!("worst-case".parse::<SearchMode>(), Ok(SearchMode::WorstCase));
        assert_eq!("Probabilistic".parse::<SearchMode>(), Ok(SearchMode::Probabilistic));
        assert!("chaos".parse::<SearchMode>().is_err());
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}

use crate::ai::AiConfig;
use crate::battle::{simulate_turn, BattleAction, BattleState, Side, TurnOutcome};
use crate::rng::RngMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskKind {
    AccuracyMiss,
    DamageRoll,
    SecondaryEffect,
    SpeedTie,
    CriticalHit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Severe,
    Catastrophic,
}

/// A chance event the line depended on. `probability` is the percent chance
/// of the outcome that would have hurt the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    pub kind: RiskKind,
    pub probability: f64,
    pub impact: Impact,
    pub description: String,
    pub turn: u32,
}

impl Risk {
    pub fn is_key(&self) -> bool {
        self.impact >= Impact::Severe
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    pub fn from_probability(success_probability: f64) -> RiskLevel {
        if success_probability >= 95.0 {
            RiskLevel::Low
        } else if success_probability >= 80.0 {
            RiskLevel::Medium
        } else if success_probability >= 50.0 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineOfPlay {
    pub turns: Vec<TurnOutcome>,
    pub victory: bool,
    pub player_casualties: Vec<String>,
    pub opponent_casualties: Vec<String>,
    pub risk_level: RiskLevel,
    pub guaranteed_success: bool,
    pub success_probability: f64,
    pub requires_crits: bool,
    pub requires_hits: bool,
    pub requires_secondary_effects: bool,
    pub key_risks: Vec<Risk>,
    pub steps: Vec<String>,
}

impl LineOfPlay {
    pub fn actions(&self) -> Vec<BattleAction> {
        self.turns.iter().map(|t| t.player_action.clone()).collect()
    }

    pub fn turn_count(&self) -> u32 {
        self.turns.iter().filter(|t| t.opponent_action.is_some()).count() as u32
    }
}

/// Re-simulates `actions` from `initial` with every chance event going against
/// the player. True only if the replay ends in a player victory.
pub fn replay_worst_case(initial: &BattleState, actions: &[BattleAction], ai: &AiConfig) -> bool {
    let mut state = initial.clone();
    let mut mode = RngMode::WorstCase;
    for action in actions {
        if state.winner().is_some() {
            break;
        }
        match simulate_turn(&state, action, &mut mode, ai) {
            Ok(outcome) => state = outcome.state,
            Err(err) => {
                log::debug!("worst-case replay diverged on turn {}: {err}", state.turn);
                return false;
            }
        }
    }
    state.winner() == Some(Side::Player)
}

/// Product of the chances that no severe or catastrophic risk went wrong, in percent.
pub fn success_probability(risks: &[Risk]) -> f64 {
    risks
        .iter()
        .filter(|r| r.is_key())
        .map(|r| 1.0 - r.probability / 100.0)
        .product::<f64>()
        * 100.0
}

fn casualties(state: &BattleState, side: Side) -> Vec<String> {
    state
        .side(side)
        .roster
        .iter()
        .filter(|mon| mon.is_fainted())
        .map(|mon| mon.species.clone())
        .collect()
}

fn depends_on(risks: &[Risk], kind: RiskKind) -> bool {
    risks.iter().any(|r| r.kind == kind && r.impact > Impact::Minor)
}

/// Classifies a finished line that started from `initial`.
pub fn evaluate_line(initial: &BattleState, turns: Vec<TurnOutcome>, ai: &AiConfig) -> LineOfPlay {
    let final_state = turns.last().map(|t| &t.state).unwrap_or(initial);
    let victory = final_state.winner() == Some(Side::Player);
    let player_casualties = casualties(final_state, Side::Player);
    let opponent_casualties = casualties(final_state, Side::Opponent);

    let actions: Vec<BattleAction> = turns.iter().map(|t| t.player_action.clone()).collect();
    let guaranteed_success = victory && replay_worst_case(initial, &actions, ai);

    let risks: Vec<Risk> = turns.iter().flat_map(|t| t.risks.iter().cloned()).collect();
    let success_probability = if guaranteed_success {
        100.0
    } else if victory {
        success_probability(&risks)
    } else {
        0.0
    };
    let risk_level = if guaranteed_success {
        RiskLevel::None
    } else {
        RiskLevel::from_probability(success_probability)
    };

    let steps = turns
        .iter()
        .map(|t| format!("Turn {}: {}", t.turn, t.log.join(" ")))
        .collect();

    LineOfPlay {
        victory,
        player_casualties,
        opponent_casualties,
        risk_level,
        guaranteed_success,
        success_probability,
        requires_crits: depends_on(&risks, RiskKind::CriticalHit),
        requires_hits: depends_on(&risks, RiskKind::AccuracyMiss),
        requires_secondary_effects: depends_on(&risks, RiskKind::SecondaryEffect),
        key_risks: risks.into_iter().filter(|r| r.is_key()).collect(),
        steps,
        turns,
    }
}

use crate::battle::Side;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Source of uniform draws in `[0, 1)`.
pub trait BattleRng {
    fn next_f64(&mut self) -> f64;
}

pub struct SeededRng {
    inner: SmallRng,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        SeededRng {
            inner: SmallRng::seed_from_u64(seed),
        }
    }
}

impl BattleRng for SeededRng {
    fn next_f64(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }
}

/// Replays a fixed list of draws, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRng {
    pub fn new(values: Vec<f64>) -> Self {
        ScriptedRng { values, cursor: 0 }
    }
}

impl BattleRng for ScriptedRng {
    fn next_f64(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value.clamp(0.0, 0.999_999)
    }
}

/// How chance events are resolved during a simulation.
///
/// `Random` samples the injected source. `MostLikely` and `WorstCase` never
/// draw: the first takes the more likely outcome (ties go against the player),
/// the second always takes the outcome that is worst for the player.
pub enum RngMode<'a> {
    Random(&'a mut dyn BattleRng),
    MostLikely,
    WorstCase,
}

impl<'a> RngMode<'a> {
    pub fn reborrow(&mut self) -> RngMode<'_> {
        match self {
            RngMode::Random(rng) => RngMode::Random(&mut **rng),
            RngMode::MostLikely => RngMode::MostLikely,
            RngMode::WorstCase => RngMode::WorstCase,
        }
    }

    pub fn is_worst_case(&self) -> bool {
        matches!(self, RngMode::WorstCase)
    }

    pub fn is_random(&self) -> bool {
        matches!(self, RngMode::Random(_))
    }

    /// Resolves an event that happens with `percent` probability and helps `beneficiary`.
    pub fn chance(&mut self, percent: f64, beneficiary: Side) -> bool {
        if percent >= 100.0 {
            return true;
        }
        if percent <= 0.0 {
            return false;
        }
        match self {
            RngMode::Random(rng) => rng.next_f64() * 100.0 < percent,
            RngMode::MostLikely => {
                if percent == 50.0 {
                    beneficiary == Side::Opponent
                } else {
                    percent > 50.0
                }
            }
            RngMode::WorstCase => beneficiary == Side::Opponent,
        }
    }

    /// Damage roll percentage (85..=100) for a move used by `attacker`.
    pub fn damage_roll(&mut self, attacker: Side) -> u8 {
        match self {
            RngMode::Random(rng) => 85 + ((rng.next_f64() * 16.0) as u8).min(15),
            RngMode::MostLikely => 92,
            RngMode::WorstCase => match attacker {
                Side::Player => 85,
                Side::Opponent => 100,
            },
        }
    }

    /// Integer in `min..=max` where larger values help `favours`.
    pub fn range(&mut self, min: u8, max: u8, favours: Side) -> u8 {
        if max <= min {
            return min;
        }
        let span = (max - min) as f64 + 1.0;
        match self {
            RngMode::Random(rng) => min + ((rng.next_f64() * span) as u8).min(max - min),
            RngMode::MostLikely => min + (max - min) / 2,
            RngMode::WorstCase => match favours {
                Side::Player => min,
                Side::Opponent => max,
            },
        }
    }

    /// Turns `sleeper` stays asleep (2..=4).
    pub fn sleep_turns(&mut self, sleeper: Side) -> u8 {
        match self {
            RngMode::Random(rng) => 2 + ((rng.next_f64() * 3.0) as u8).min(2),
            RngMode::MostLikely => 2,
            RngMode::WorstCase => match sleeper {
                Side::Player => 4,
                Side::Opponent => 2,
            },
        }
    }

    /// Uses of a rampage move (2..=3).
    pub fn rampage_turns(&mut self) -> u8 {
        match self {
            RngMode::Random(rng) => 2 + ((rng.next_f64() * 2.0) as u8).min(1),
            RngMode::MostLikely => 2,
            RngMode::WorstCase => 3,
        }
    }

    pub fn pick_index(&mut self, len: usize) -> usize {
        match self {
            RngMode::Random(rng) if len > 1 => ((rng.next_f64() * len as f64) as usize).min(len - 1),
            _ => 0,
        }
    }

    /// Winner of a speed tie.
    pub fn speed_tie(&mut self) -> Side {
        match self {
            RngMode::Random(rng) => {
                if rng.next_f64() < 0.5 {
                    Side::Player
                } else {
                    Side::Opponent
                }
            }
            _ => Side::Opponent,
        }
    }
}

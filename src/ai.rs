use crate::battle::{BattleAction, BattleState, Side, MAX_SPIKES, MAX_TOXIC_SPIKES};
use crate::damage::{check_block, damage_range, DamageField, DamageRange};
use crate::items::normalize_id;
use crate::model::{Move, MoveCategory, MoveEffect, PokemonInstance};
use crate::rng::RngMode;
use serde::{Deserialize, Serialize};

/// Moves scoring at or below this are considered useless, which opens up a switch.
pub const INEFFECTIVE_THRESHOLD: i32 = -5;
pub const USELESS: i32 = -20;
pub const STATUS_DEFAULT: i32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiConfig {
    /// Once one teammate is judged faster than the foe, treat every later teammate as faster too.
    pub emulate_speed_check_carryover: bool,
    /// Percent chance the AI takes a switch once every switch condition holds.
    pub switch_chance: f64,
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig {
            emulate_speed_check_carryover: true,
            switch_chance: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveScore {
    pub index: usize,
    pub name: String,
    pub score: i32,
    pub expected_damage: u32,
    pub reasons: Vec<String>,
}

impl MoveScore {
    fn add(&mut self, points: i32, reason: &str) {
        self.score += points;
        self.reasons.push(format!("{points:+} {reason}"));
    }

    fn set(&mut self, points: i32, reason: &str) {
        self.score = points;
        self.reasons.push(format!("={points} {reason}"));
    }
}

#[derive(Debug, Clone)]
pub struct AiDecision {
    pub action: BattleAction,
    pub scores: Vec<MoveScore>,
}

fn expected_hits(mv: &Move) -> u8 {
    mv.hits.map(|h| (h.min + h.max) / 2).unwrap_or(1)
}

fn max_hits(mv: &Move) -> u8 {
    mv.hits.map(|h| h.max).unwrap_or(1)
}

fn usable_attacks(mon: &PokemonInstance) -> impl Iterator<Item = &Move> {
    mon.moves
        .iter()
        .zip(&mon.pp)
        .filter(|(mv, pp)| **pp > 0 && mv.is_attack())
        .map(|(mv, _)| mv)
}

/// Whether any usable attack of `attacker` can knock out `defender` on its best roll.
pub fn can_ko(attacker: &PokemonInstance, defender: &PokemonInstance, field: &DamageField) -> bool {
    usable_attacks(attacker).any(|mv| {
        damage_range(attacker, defender, mv, field, false, max_hits(mv))
            .map(|r| r.can_ko())
            .unwrap_or(false)
    })
}

fn kill_range(attacker: &PokemonInstance, defender: &PokemonInstance, mv: &Move, field: &DamageField) -> Option<DamageRange> {
    damage_range(attacker, defender, mv, field, false, max_hits(mv))
}

fn expected_damage(attacker: &PokemonInstance, defender: &PokemonInstance, mv: &Move, field: &DamageField) -> u32 {
    damage_range(attacker, defender, mv, field, false, expected_hits(mv))
        .map(|r| (r.average().round() as u32).min(defender.current_hp))
        .unwrap_or(0)
}

/// Scores every usable move of `side`'s active combatant against the opposing active.
pub fn score_moves(state: &BattleState, side: Side, mode: &mut RngMode) -> Vec<MoveScore> {
    let foe_side = side.opponent();
    let me = state.active(side);
    let foe = state.active(foe_side);
    let to_foe = state.damage_field(foe_side);
    let to_me = state.damage_field(side);

    let my_speed = state.effective_speed(side, me);
    let foe_speed = state.effective_speed(foe_side, foe);
    let outspeeds = state.moves_before(side, my_speed, foe_speed);
    let threatened = can_ko(foe, me, &to_me);

    let mut scores: Vec<MoveScore> = me
        .moves
        .iter()
        .enumerate()
        .filter(|(i, _)| me.pp.get(*i).copied().unwrap_or(0) > 0)
        .map(|(index, mv)| MoveScore {
            index,
            name: mv.name.clone(),
            score: 0,
            expected_damage: if mv.is_attack() {
                expected_damage(me, foe, mv, &to_foe)
            } else {
                0
            },
            reasons: Vec::new(),
        })
        .collect();

    // ties go to the lowest slot
    let highest = scores
        .iter()
        .filter(|s| s.expected_damage > 0)
        .max_by(|a, b| a.expected_damage.cmp(&b.expected_damage).then(b.index.cmp(&a.index)))
        .map(|s| s.index);

    for score in &mut scores {
        let mv = &me.moves[score.index];
        if mv.is_attack() {
            if check_block(mv, foe, &to_foe).is_err() || score.expected_damage == 0 {
                score.set(USELESS, "no effect");
                continue;
            }
            if highest == Some(score.index) {
                if mode.chance(20.0, side) {
                    score.add(8, "highest damage");
                } else {
                    score.add(6, "highest damage");
                }
            }
            let kills = kill_range(me, foe, mv, &to_foe)
                .map(|r| r.can_ko())
                .unwrap_or(false);
            if kills {
                if outspeeds || mv.priority > 0 {
                    score.add(6, "fast kill");
                } else {
                    score.add(3, "slow kill");
                }
                if me.ability().boosts_on_kill() {
                    score.add(1, "kill boosts ability");
                }
            }
            if mv.priority > 0 && !outspeeds && threatened {
                score.add(11, "priority while threatened");
            }
        } else {
            score_status_move(score, mv, state, side, mode, outspeeds, my_speed < foe_speed, threatened);
        }
    }
    scores
}

fn tiered(mode: &mut RngMode, side: Side, high_chance: f64, low: i32, high: i32) -> i32 {
    if mode.chance(high_chance, side) {
        high
    } else {
        low
    }
}

#[allow(clippy::too_many_arguments)]
fn score_status_move(
    score: &mut MoveScore,
    mv: &Move,
    state: &BattleState,
    side: Side,
    mode: &mut RngMode,
    outspeeds: bool,
    slower: bool,
    threatened: bool,
) {
    let mine = state.side(side);
    let theirs = state.side(side.opponent());
    let me = mine.active();
    let foe = theirs.active();
    score.set(STATUS_DEFAULT, "status move");

    if mv.inflicts_status_on_target() {
        if let Some(infliction) = &mv.status {
            if !foe.can_receive_status(infliction.status) {
                score.set(USELESS, "target cannot be statused");
                return;
            }
        }
    }

    let foe_has = |category: MoveCategory| {
        foe.moves
            .iter()
            .zip(&foe.pp)
            .any(|(m, &pp)| pp > 0 && m.category == category && m.is_attack())
    };

    match mv.effect {
        MoveEffect::StealthRock => {
            if theirs.hazards.stealth_rock {
                score.set(USELESS, "rocks already up");
            } else {
                score.set(tiered(mode, side, 25.0, 8, 9), "stealth rock");
            }
        }
        MoveEffect::Spikes => {
            if theirs.hazards.spikes >= MAX_SPIKES {
                score.set(USELESS, "spikes maxed");
            } else {
                score.set(tiered(mode, side, 25.0, 6, 7), "spikes");
            }
        }
        MoveEffect::ToxicSpikes => {
            if theirs.hazards.toxic_spikes >= MAX_TOXIC_SPIKES {
                score.set(USELESS, "toxic spikes maxed");
            } else {
                score.set(tiered(mode, side, 25.0, 6, 7), "toxic spikes");
            }
        }
        MoveEffect::StickyWeb => {
            if theirs.hazards.sticky_web {
                score.set(USELESS, "web already up");
            } else {
                score.set(tiered(mode, side, 25.0, 6, 7), "sticky web");
            }
        }
        MoveEffect::Reflect | MoveEffect::LightScreen | MoveEffect::AuroraVeil => {
            let (up, relevant) = match mv.effect {
                MoveEffect::Reflect => (mine.screens.reflect > 0, foe_has(MoveCategory::Physical)),
                MoveEffect::LightScreen => {
                    (mine.screens.light_screen > 0, foe_has(MoveCategory::Special))
                }
                _ => (
                    mine.screens.aurora_veil > 0,
                    foe_has(MoveCategory::Physical) || foe_has(MoveCategory::Special),
                ),
            };
            if up {
                score.set(USELESS, "screen already up");
            } else if relevant {
                score.set(tiered(mode, side, 50.0, 6, 7), "screen");
            } else {
                score.set(INEFFECTIVE_THRESHOLD, "screen blocks nothing");
            }
        }
        MoveEffect::TrickRoom => {
            if slower {
                score.set(10, "trick room while slower");
            } else {
                score.set(USELESS, "trick room while faster");
            }
        }
        MoveEffect::Tailwind => {
            if mine.tailwind > 0 {
                score.set(USELESS, "tailwind already up");
            } else if slower {
                score.set(9, "tailwind while slower");
            } else {
                score.set(5, "tailwind");
            }
        }
        MoveEffect::Weather(weather) => {
            if state.weather == Some(weather) {
                score.set(USELESS, "weather already set");
            }
        }
        MoveEffect::Terrain(terrain) => {
            if state.terrain == Some(terrain) {
                score.set(USELESS, "terrain already set");
            }
        }
        MoveEffect::Recovery => {
            if me.is_full_hp() {
                score.set(USELESS, "already at full HP");
            } else if me.hp_fraction() <= 0.66 {
                score.set(tiered(mode, side, 50.0, 7, 9), "recovery");
            }
        }
        MoveEffect::None => {
            if mv.is_speed_control() {
                if !outspeeds {
                    score.set(tiered(mode, side, 50.0, 6, 7), "speed control while slower");
                }
            } else if mv.is_setup() {
                if threatened {
                    score.set(INEFFECTIVE_THRESHOLD, "setup while threatened");
                } else {
                    score.set(tiered(mode, side, 50.0, 6, 8), "safe setup");
                }
            }
        }
    }
}

/// Picks one move among those tied for the best score.
fn pick_move(scores: &[MoveScore], me: &PokemonInstance, mode: &mut RngMode) -> Option<usize> {
    let best = scores.iter().map(|s| s.score).max()?;
    let tied: Vec<&MoveScore> = scores.iter().filter(|s| s.score == best).collect();
    if mode.is_random() {
        let pick = mode.pick_index(tied.len());
        return tied.get(pick).map(|s| s.index);
    }
    tied.iter()
        .copied()
        .min_by(|a, b| {
            b.expected_damage
                .cmp(&a.expected_damage)
                .then_with(|| {
                    let a_status = me.moves[a.index].is_status();
                    let b_status = me.moves[b.index].is_status();
                    a_status.cmp(&b_status)
                })
                .then_with(|| a.index.cmp(&b.index))
        })
        .map(|s| s.index)
}

/// Whether some benched teammate is worth switching to.
fn viable_switch_exists(state: &BattleState, side: Side, config: &AiConfig) -> bool {
    let mine = state.side(side);
    let foe_side = side.opponent();
    let foe = state.active(foe_side);
    let foe_speed = state.effective_speed(foe_side, foe);
    let to_foe = state.damage_field(foe_side);
    let to_me = state.damage_field(side);
    let mut seen_faster = false;

    for (index, mon) in mine.roster.iter().enumerate() {
        if index == mine.active || mon.is_fainted() {
            continue;
        }
        let mut faster = state.effective_speed(side, mon) > foe_speed;
        if config.emulate_speed_check_carryover {
            faster |= seen_faster;
            seen_faster |= faster;
        }
        let kills = can_ko(mon, foe, &to_foe);
        let survives = !can_ko(foe, mon, &to_me);
        if (faster && kills) || survives {
            return true;
        }
    }
    false
}

fn switch_in_score(state: &BattleState, side: Side, mon: &PokemonInstance) -> i32 {
    match normalize_id(&mon.species).as_str() {
        "ditto" | "wobbuffet" | "wynaut" => return 2,
        _ => {}
    }
    let foe_side = side.opponent();
    let foe = state.active(foe_side);
    let outspeeds = state.effective_speed(side, mon) > state.effective_speed(foe_side, foe);
    let kills = can_ko(mon, foe, &state.damage_field(foe_side));
    let survives = !can_ko(foe, mon, &state.damage_field(side));
    match (outspeeds, kills, survives) {
        (true, true, _) => 5,
        (false, true, true) => 4,
        (true, false, true) => 3,
        (_, _, true) => 2,
        _ => 0,
    }
}

/// Best benched replacement for `side`, lowest roster index on ties.
pub fn choose_switch_target(state: &BattleState, side: Side) -> Option<usize> {
    let mine = state.side(side);
    let mut best: Option<(usize, i32)> = None;
    for (index, mon) in mine.roster.iter().enumerate() {
        if index == mine.active || mon.is_fainted() {
            continue;
        }
        let score = switch_in_score(state, side, mon);
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

/// Chooses the next action for `side`'s active combatant.
pub fn choose_action(
    state: &BattleState,
    side: Side,
    mode: &mut RngMode,
    config: &AiConfig,
) -> AiDecision {
    let me = state.active(side);
    if me.is_fainted() {
        let action = choose_switch_target(state, side)
            .map(|target| BattleAction::Switch { target })
            .unwrap_or(BattleAction::Recharge);
        return AiDecision {
            action,
            scores: Vec::new(),
        };
    }

    let scores = score_moves(state, side, mode);
    let nothing_works = scores.iter().all(|s| s.score <= INEFFECTIVE_THRESHOLD);
    if nothing_works
        && me.hp_fraction() >= 0.5
        && viable_switch_exists(state, side, config)
        && mode.chance(config.switch_chance, side)
    {
        if let Some(target) = choose_switch_target(state, side) {
            log::debug!("{} switches out to slot {target}", me.species);
            return AiDecision {
                action: BattleAction::Switch { target },
                scores,
            };
        }
    }

    let action = match pick_move(&scores, me, mode) {
        Some(index) => BattleAction::Move {
            index,
            name: me.moves[index].name.clone(),
        },
        None => match choose_switch_target(state, side) {
            Some(target) => BattleAction::Switch { target },
            None => BattleAction::Recharge,
        },
    };
    log::debug!("{} chose {:?}", me.species, action);
    AiDecision { action, scores }
}

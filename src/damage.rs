use crate::abilities::Ability;
use crate::items::{EXPERT_BELT_MULT, LIFE_ORB_MULT, TYPE_BOOST_ITEM_MULT};
use crate::model::{Move, MoveCategory, PokemonInstance, StatusCondition, Terrain, Weather};
use crate::types::{accuracy_stage_multiplier, apply_stage, type_effectiveness, Type, MAX_STAGE, MIN_STAGE};
use serde::Serialize;

/// Field conditions seen by one attack: global weather/terrain plus the defender's screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageField {
    pub weather: Option<Weather>,
    pub terrain: Option<Terrain>,
    pub reflect: bool,
    pub light_screen: bool,
    pub aurora_veil: bool,
}

/// Why a move deals no damage at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DamageBlock {
    StatusMove,
    TypeImmunity,
    AbilityImmunity,
    WeatherFailure,
    SemiInvulnerable,
}

pub const ROLL_COUNT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageRange {
    /// Total damage for each roll from 85 to 100.
    pub rolls: Vec<u32>,
    pub min: u32,
    pub max: u32,
    /// Rolls out of 16 that knock the defender out from its current HP.
    pub ko_rolls: u8,
}

impl DamageRange {
    pub fn ko_probability(&self) -> f64 {
        self.ko_rolls as f64 * 100.0 / ROLL_COUNT as f64
    }

    pub fn always_kos(&self) -> bool {
        self.ko_rolls as usize == ROLL_COUNT
    }

    pub fn can_ko(&self) -> bool {
        self.ko_rolls > 0
    }

    pub fn average(&self) -> f64 {
        if self.rolls.is_empty() {
            return 0.0;
        }
        self.rolls.iter().map(|&d| d as f64).sum::<f64>() / self.rolls.len() as f64
    }
}

/// Resolution of one move use, kept on the turn outcome for explainability.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageCalc {
    pub move_name: String,
    pub accuracy: f64,
    pub crit_chance: f64,
    pub hit: bool,
    pub critical: bool,
    pub roll: u8,
    pub hits: u8,
    pub effectiveness: f64,
    pub damage: u32,
    pub blocked: Option<DamageBlock>,
    pub range: Option<DamageRange>,
}

impl DamageCalc {
    pub fn new(mv: &Move) -> Self {
        DamageCalc {
            move_name: mv.name.clone(),
            accuracy: 100.0,
            crit_chance: 0.0,
            hit: false,
            critical: false,
            roll: 100,
            hits: 0,
            effectiveness: 1.0,
            damage: 0,
            blocked: None,
            range: None,
        }
    }
}

pub(crate) fn chain_modifier(previous: f64, next: f64) -> f64 {
    let previous = (previous * 4096.0).floor() as u64;
    let next = (next * 4096.0).floor() as u64;
    let chained = (previous * next + 2048) >> 12;
    chained as f64 / 4096.0
}

pub(crate) fn apply_modifier(value: u32, modifier: f64) -> u32 {
    if modifier <= 0.0 {
        return 0;
    }
    let modifier = (modifier * 4096.0).floor() as u64;
    ((value as u64 * modifier + 2047) / 4096) as u32
}

/// Crit probability in percent by crit stage.
pub fn crit_chance(mv: &Move) -> f64 {
    if mv.is_status() {
        return 0.0;
    }
    match mv.crit_stage {
        0 => 4.17,
        1 => 12.5,
        2 => 50.0,
        _ => 100.0,
    }
}

/// Hit chance in percent after accuracy and evasion stages.
pub fn accuracy(mv: &Move, attacker: &PokemonInstance, defender: &PokemonInstance) -> f64 {
    match mv.accuracy {
        None => 100.0,
        Some(acc) => {
            let stage = (attacker.stages.accuracy - defender.stages.evasion).clamp(MIN_STAGE, MAX_STAGE);
            (acc as f64 * accuracy_stage_multiplier(stage)).min(100.0)
        }
    }
}

/// Type effectiveness of `mv` against `defender`, or the reason it cannot deal damage.
pub fn check_block(
    mv: &Move,
    defender: &PokemonInstance,
    field: &DamageField,
) -> Result<f64, DamageBlock> {
    if mv.is_status() {
        return Err(DamageBlock::StatusMove);
    }
    match field.weather {
        Some(Weather::HarshSun) if mv.move_type == Type::Water => {
            return Err(DamageBlock::WeatherFailure)
        }
        Some(Weather::HeavyRain) if mv.move_type == Type::Fire => {
            return Err(DamageBlock::WeatherFailure)
        }
        _ => {}
    }
    let effectiveness = type_effectiveness(mv.move_type, &defender.types);
    if effectiveness == 0.0 {
        return Err(DamageBlock::TypeImmunity);
    }
    if defender.ability().immune_type() == Some(mv.move_type) {
        return Err(DamageBlock::AbilityImmunity);
    }
    Ok(effectiveness)
}

fn base_power(mv: &Move, attacker: &PokemonInstance) -> u32 {
    if attacker.ability() == Ability::Technician && mv.power <= 60 {
        apply_modifier(mv.power, 1.5)
    } else {
        mv.power
    }
}

fn attack_stat(mv: &Move, attacker: &PokemonInstance, critical: bool) -> u32 {
    let physical = mv.category == MoveCategory::Physical;
    let (raw, stage) = if physical {
        (attacker.stats.atk, attacker.stages.atk)
    } else {
        (attacker.stats.spa, attacker.stages.spa)
    };
    // crits ignore the attacker's drops
    let stage = if critical { stage.max(0) } else { stage };
    let mut value = apply_stage(raw, stage);

    let mut modifier = 1.0;
    if let Some(item) = attacker.item_effect() {
        let item_mult = if physical { item.atk_mult } else { item.spa_mult };
        if let Some(mult) = item_mult {
            modifier = chain_modifier(modifier, mult);
        }
    }
    let ability = attacker.ability();
    if physical {
        if matches!(ability, Ability::HugePower | Ability::PurePower) {
            modifier = chain_modifier(modifier, 2.0);
        }
        if ability == Ability::Guts && attacker.status.is_some() {
            modifier = chain_modifier(modifier, 1.5);
        }
        if attacker.status == Some(StatusCondition::Burn) && ability != Ability::Guts {
            modifier = chain_modifier(modifier, 0.5);
        }
    }
    value = apply_modifier(value, modifier);
    value.max(1)
}

fn defense_stat(
    mv: &Move,
    defender: &PokemonInstance,
    field: &DamageField,
    critical: bool,
) -> u32 {
    let physical = mv.category == MoveCategory::Physical;
    let (raw, stage) = if physical {
        (defender.stats.def, defender.stages.def)
    } else {
        (defender.stats.spd, defender.stages.spd)
    };
    // crits ignore the defender's boosts
    let stage = if critical { stage.min(0) } else { stage };
    let mut value = apply_stage(raw, stage);

    let mut modifier = 1.0;
    if let Some(item) = defender.item_effect() {
        let item_mult = if physical { item.def_mult } else { item.spd_mult };
        if let Some(mult) = item_mult {
            modifier = chain_modifier(modifier, mult);
        }
    }
    if !physical && field.weather == Some(Weather::Sand) && defender.has_type(Type::Rock) {
        modifier = chain_modifier(modifier, 1.5);
    }
    value = apply_modifier(value, modifier);
    value.max(1)
}

fn weather_modifier(move_type: Type, weather: Option<Weather>) -> f64 {
    match (weather, move_type) {
        (Some(w), Type::Fire) if w.is_sunny() => 1.5,
        (Some(w), Type::Water) if w.is_sunny() => 0.5,
        (Some(w), Type::Water) if w.is_rainy() => 1.5,
        (Some(w), Type::Fire) if w.is_rainy() => 0.5,
        _ => 1.0,
    }
}

fn terrain_modifier(
    mv: &Move,
    attacker: &PokemonInstance,
    defender: &PokemonInstance,
    terrain: Option<Terrain>,
) -> f64 {
    match terrain {
        Some(Terrain::Electric) if mv.move_type == Type::Electric && attacker.is_grounded() => 1.3,
        Some(Terrain::Grassy) if mv.move_type == Type::Grass && attacker.is_grounded() => 1.3,
        Some(Terrain::Psychic) if mv.move_type == Type::Psychic && attacker.is_grounded() => 1.3,
        Some(Terrain::Misty) if mv.move_type == Type::Dragon && defender.is_grounded() => 0.5,
        _ => 1.0,
    }
}

fn screen_applies(mv: &Move, field: &DamageField) -> bool {
    field.aurora_veil
        || match mv.category {
            MoveCategory::Physical => field.reflect,
            MoveCategory::Special => field.light_screen,
            MoveCategory::Status => false,
        }
}

fn ability_modifier(
    mv: &Move,
    attacker: &PokemonInstance,
    defender: &PokemonInstance,
    effectiveness: f64,
) -> f64 {
    let mut modifier = 1.0;
    let attacker_ability = attacker.ability();
    let third = attacker.max_hp() / 3;
    if attacker_ability.pinch_type() == Some(mv.move_type) && attacker.current_hp <= third {
        modifier = chain_modifier(modifier, 1.5);
    }
    if attacker_ability == Ability::Defeatist && attacker.current_hp * 2 <= attacker.max_hp() {
        modifier = chain_modifier(modifier, 0.5);
    }
    match defender.ability() {
        Ability::Multiscale | Ability::ShadowShield if defender.is_full_hp() => {
            modifier = chain_modifier(modifier, 0.5);
        }
        Ability::ThickFat if matches!(mv.move_type, Type::Fire | Type::Ice) => {
            modifier = chain_modifier(modifier, 0.5);
        }
        Ability::Heatproof if mv.move_type == Type::Fire => {
            modifier = chain_modifier(modifier, 0.5);
        }
        Ability::Filter | Ability::SolidRock | Ability::PrismArmor if effectiveness > 1.0 => {
            modifier = chain_modifier(modifier, 0.75);
        }
        Ability::DrySkin if mv.move_type == Type::Fire => {
            modifier = chain_modifier(modifier, 1.25);
        }
        _ => {}
    }
    modifier
}

fn item_modifier(mv: &Move, attacker: &PokemonInstance, effectiveness: f64) -> f64 {
    let Some(item) = attacker.item_effect() else {
        return 1.0;
    };
    let mut modifier = 1.0;
    if item.life_orb {
        modifier = chain_modifier(modifier, LIFE_ORB_MULT);
    }
    if item.expert_belt && effectiveness > 1.0 {
        modifier = chain_modifier(modifier, EXPERT_BELT_MULT);
    }
    if item.type_boost == Some(mv.move_type) {
        modifier = chain_modifier(modifier, TYPE_BOOST_ITEM_MULT);
    }
    modifier
}

/// Damage of a single hit for a fixed crit flag and roll (85..=100).
pub fn hit_damage(
    attacker: &PokemonInstance,
    defender: &PokemonInstance,
    mv: &Move,
    field: &DamageField,
    critical: bool,
    roll: u8,
) -> Result<u32, DamageBlock> {
    let effectiveness = check_block(mv, defender, field)?;

    let level = attacker.level as u64;
    let power = base_power(mv, attacker) as u64;
    let attack = attack_stat(mv, attacker, critical) as u64;
    let defense = defense_stat(mv, defender, field, critical) as u64;
    let mut damage = ((((2 * level / 5 + 2) * power * attack / defense) / 50) + 2) as u32;

    let field_modifier = chain_modifier(
        weather_modifier(mv.move_type, field.weather),
        terrain_modifier(mv, attacker, defender, field.terrain),
    );
    damage = apply_modifier(damage, field_modifier);
    if critical {
        damage = (damage as f64 * 1.5).floor() as u32;
    }
    damage = damage * roll.clamp(85, 100) as u32 / 100;
    if attacker.has_type(mv.move_type) {
        let stab = if attacker.ability() == Ability::Adaptability {
            2.0
        } else {
            1.5
        };
        damage = apply_modifier(damage, stab);
    }
    damage = (damage as f64 * effectiveness).floor() as u32;
    if !critical && screen_applies(mv, field) {
        damage = apply_modifier(damage, 0.5);
    }
    let final_modifier = chain_modifier(
        ability_modifier(mv, attacker, defender, effectiveness),
        item_modifier(mv, attacker, effectiveness),
    );
    damage = apply_modifier(damage, final_modifier);
    Ok(damage.max(1))
}

/// Full-HP Sturdy or an unused sash leaves the holder at 1 HP.
pub fn survives_lethal_hit(defender: &PokemonInstance) -> bool {
    defender.is_full_hp()
        && (defender.ability() == Ability::Sturdy
            || defender.item_effect().map(|i| i.sash_like).unwrap_or(false))
}

pub fn cap_lethal_damage(defender: &PokemonInstance, damage: u32) -> u32 {
    if damage >= defender.current_hp && survives_lethal_hit(defender) {
        defender.current_hp.saturating_sub(1)
    } else {
        damage
    }
}

/// Damage for every roll, totalled over `hits`, and how many rolls knock out.
pub fn damage_range(
    attacker: &PokemonInstance,
    defender: &PokemonInstance,
    mv: &Move,
    field: &DamageField,
    critical: bool,
    hits: u8,
) -> Option<DamageRange> {
    let hits = hits.max(1) as u32;
    let mut rolls = Vec::with_capacity(ROLL_COUNT);
    for roll in 85..=100u8 {
        let per_hit = hit_damage(attacker, defender, mv, field, critical, roll).ok()?;
        rolls.push(per_hit * hits);
    }
    let ko_rolls = rolls
        .iter()
        .filter(|&&total| {
            let landed = if hits == 1 {
                cap_lethal_damage(defender, total)
            } else {
                total
            };
            landed >= defender.current_hp
        })
        .count() as u8;
    Some(DamageRange {
        min: rolls.iter().copied().min().unwrap_or(0),
        max: rolls.iter().copied().max().unwrap_or(0),
        rolls,
        ko_rolls,
    })
}

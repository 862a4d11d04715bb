use crate::abilities::Ability;
use crate::error::{EngineError, Result};
use crate::items::{item_effect, normalize_id, ItemEffect};
use crate::types::{Type, MAX_STAGE, MIN_STAGE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveCategory {
    Physical,
    Special,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCondition {
    Burn,
    Freeze,
    Paralysis,
    Poison,
    #[serde(alias = "toxic")]
    BadlyPoisoned,
    Sleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Weather {
    Sun,
    Rain,
    Sand,
    Hail,
    HarshSun,
    HeavyRain,
}

impl Weather {
    /// Extreme weather set by an ability; it never counts down.
    pub fn is_extreme(self) -> bool {
        matches!(self, Weather::HarshSun | Weather::HeavyRain)
    }

    pub fn is_sunny(self) -> bool {
        matches!(self, Weather::Sun | Weather::HarshSun)
    }

    pub fn is_rainy(self) -> bool {
        matches!(self, Weather::Rain | Weather::HeavyRain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    Electric,
    Grassy,
    Psychic,
    Misty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoostStat {
    Atk,
    Def,
    Spa,
    Spd,
    Spe,
    Accuracy,
    Evasion,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatStages {
    #[serde(default)]
    pub atk: i8,
    #[serde(default)]
    pub def: i8,
    #[serde(default)]
    pub spa: i8,
    #[serde(default)]
    pub spd: i8,
    #[serde(default)]
    pub spe: i8,
    #[serde(default)]
    pub accuracy: i8,
    #[serde(default)]
    pub evasion: i8,
}

impl StatStages {
    pub fn get(&self, stat: BoostStat) -> i8 {
        match stat {
            BoostStat::Atk => self.atk,
            BoostStat::Def => self.def,
            BoostStat::Spa => self.spa,
            BoostStat::Spd => self.spd,
            BoostStat::Spe => self.spe,
            BoostStat::Accuracy => self.accuracy,
            BoostStat::Evasion => self.evasion,
        }
    }

    fn slot_mut(&mut self, stat: BoostStat) -> &mut i8 {
        match stat {
            BoostStat::Atk => &mut self.atk,
            BoostStat::Def => &mut self.def,
            BoostStat::Spa => &mut self.spa,
            BoostStat::Spd => &mut self.spd,
            BoostStat::Spe => &mut self.spe,
            BoostStat::Accuracy => &mut self.accuracy,
            BoostStat::Evasion => &mut self.evasion,
        }
    }

    /// Applies `delta` clamped to [-6, 6] and returns the change that actually stuck.
    pub fn apply(&mut self, stat: BoostStat, delta: i8) -> i8 {
        let slot = self.slot_mut(stat);
        let before = *slot;
        *slot = before.saturating_add(delta).clamp(MIN_STAGE, MAX_STAGE);
        *slot - before
    }

    fn clamp_all(&mut self) {
        for stat in [
            BoostStat::Atk,
            BoostStat::Def,
            BoostStat::Spa,
            BoostStat::Spd,
            BoostStat::Spe,
            BoostStat::Accuracy,
            BoostStat::Evasion,
        ] {
            self.apply(stat, 0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub hp: u32,
    pub atk: u32,
    pub def: u32,
    pub spa: u32,
    pub spd: u32,
    pub spe: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectTarget {
    #[serde(rename = "self")]
    User,
    Target,
}

fn default_chance() -> u8 {
    100
}

fn default_effect_target() -> EffectTarget {
    EffectTarget::Target
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatChange {
    #[serde(default = "default_effect_target")]
    pub target: EffectTarget,
    pub stat: BoostStat,
    pub stages: i8,
    #[serde(default = "default_chance")]
    pub chance: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusInfliction {
    pub status: StatusCondition,
    #[serde(default = "default_chance")]
    pub chance: u8,
    #[serde(default = "default_effect_target")]
    pub target: EffectTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MultiTurn {
    /// Charges on the first turn, strikes on the second.
    Charge,
    /// Like `Charge`, but the user cannot be hit while charging.
    SemiInvulnerable,
    /// Strikes immediately, then the user must recharge.
    Recharge,
    /// Locks the user into the move for two or three uses.
    Rampage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitCount {
    pub min: u8,
    pub max: u8,
}

/// Field-level effect of a move, resolved from its name when the roster is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "value")]
pub enum MoveEffect {
    #[default]
    None,
    StealthRock,
    Spikes,
    ToxicSpikes,
    StickyWeb,
    Reflect,
    LightScreen,
    AuroraVeil,
    TrickRoom,
    Tailwind,
    Weather(Weather),
    Terrain(Terrain),
    Recovery,
}

static MOVE_EFFECTS: phf::Map<&'static str, MoveEffect> = phf::phf_map! {
    "stealthrock" => MoveEffect::StealthRock,
    "spikes" => MoveEffect::Spikes,
    "toxicspikes" => MoveEffect::ToxicSpikes,
    "stickyweb" => MoveEffect::StickyWeb,
    "reflect" => MoveEffect::Reflect,
    "lightscreen" => MoveEffect::LightScreen,
    "auroraveil" => MoveEffect::AuroraVeil,
    "trickroom" => MoveEffect::TrickRoom,
    "tailwind" => MoveEffect::Tailwind,
    "sunnyday" => MoveEffect::Weather(Weather::Sun),
    "raindance" => MoveEffect::Weather(Weather::Rain),
    "sandstorm" => MoveEffect::Weather(Weather::Sand),
    "hail" => MoveEffect::Weather(Weather::Hail),
    "snowscape" => MoveEffect::Weather(Weather::Hail),
    "electricterrain" => MoveEffect::Terrain(Terrain::Electric),
    "grassyterrain" => MoveEffect::Terrain(Terrain::Grassy),
    "psychicterrain" => MoveEffect::Terrain(Terrain::Psychic),
    "mistyterrain" => MoveEffect::Terrain(Terrain::Misty),
    "recover" => MoveEffect::Recovery,
    "roost" => MoveEffect::Recovery,
    "softboiled" => MoveEffect::Recovery,
    "slackoff" => MoveEffect::Recovery,
    "milkdrink" => MoveEffect::Recovery,
    "shoreup" => MoveEffect::Recovery,
    "moonlight" => MoveEffect::Recovery,
    "morningsun" => MoveEffect::Recovery,
    "synthesis" => MoveEffect::Recovery,
};

impl MoveEffect {
    pub fn from_name(name: &str) -> MoveEffect {
        MOVE_EFFECTS
            .get(normalize_id(name).as_str())
            .copied()
            .unwrap_or_default()
    }
}

fn default_accuracy() -> Option<u8> {
    Some(100)
}

fn default_pp() -> u8 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub name: String,
    #[serde(rename = "type")]
    pub move_type: Type,
    pub category: MoveCategory,
    #[serde(default)]
    pub power: u32,
    /// `None` never misses.
    #[serde(default = "default_accuracy")]
    pub accuracy: Option<u8>,
    #[serde(default)]
    pub priority: i8,
    #[serde(default = "default_pp")]
    pub pp: u8,
    #[serde(default)]
    pub crit_stage: u8,
    #[serde(default)]
    pub stat_changes: Vec<StatChange>,
    #[serde(default)]
    pub status: Option<StatusInfliction>,
    #[serde(default)]
    pub flinch_chance: u8,
    #[serde(default)]
    pub recoil_percent: u8,
    #[serde(default)]
    pub drain_percent: u8,
    #[serde(default)]
    pub heal_percent: u8,
    #[serde(default)]
    pub multi_turn: Option<MultiTurn>,
    #[serde(default)]
    pub hits: Option<HitCount>,
    #[serde(default)]
    pub effect: MoveEffect,
}

impl Move {
    pub fn new(name: &str, move_type: Type, category: MoveCategory, power: u32) -> Self {
        Move {
            name: name.to_string(),
            move_type,
            category,
            power,
            accuracy: Some(100),
            priority: 0,
            pp: default_pp(),
            crit_stage: 0,
            stat_changes: Vec::new(),
            status: None,
            flinch_chance: 0,
            recoil_percent: 0,
            drain_percent: 0,
            heal_percent: 0,
            multi_turn: None,
            hits: None,
            effect: MoveEffect::from_name(name),
        }
    }

    pub fn is_status(&self) -> bool {
        self.category == MoveCategory::Status || self.power == 0
    }

    pub fn is_attack(&self) -> bool {
        !self.is_status()
    }

    /// Status move that only raises the user's stats.
    pub fn is_setup(&self) -> bool {
        self.is_status()
            && !self.stat_changes.is_empty()
            && self
                .stat_changes
                .iter()
                .all(|c| c.target == EffectTarget::User && c.stages > 0)
    }

    /// Status move that slows the target down, by a Speed drop or paralysis.
    pub fn is_speed_control(&self) -> bool {
        self.is_status()
            && (self.stat_changes.iter().any(|c| {
                c.target == EffectTarget::Target && c.stat == BoostStat::Spe && c.stages < 0
            }) || matches!(
                self.status,
                Some(StatusInfliction {
                    status: StatusCondition::Paralysis,
                    ..
                })
            ))
    }

    pub fn inflicts_status_on_target(&self) -> bool {
        matches!(
            self.status,
            Some(StatusInfliction {
                target: EffectTarget::Target,
                ..
            })
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum LockReason {
    ChoiceItem,
    Rampage { turns_left: u8 },
}

/// What a combatant is bound to do next turn. The variants are mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "state")]
pub enum Commitment {
    #[default]
    Free,
    Charging {
        move_index: usize,
    },
    Recharging,
    Locked {
        move_index: usize,
        reason: LockReason,
    },
}

fn default_level() -> u8 {
    50
}

fn full_hp_marker() -> u32 {
    u32::MAX
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonInstance {
    pub species: String,
    #[serde(default = "default_level")]
    pub level: u8,
    pub types: Vec<Type>,
    pub stats: Stats,
    pub moves: Vec<Move>,
    /// Remaining PP per move slot; filled from the moves when empty.
    #[serde(default)]
    pub pp: Vec<u8>,
    #[serde(default = "full_hp_marker")]
    pub current_hp: u32,
    #[serde(default)]
    pub status: Option<StatusCondition>,
    #[serde(default)]
    pub sleep_turns: u8,
    #[serde(default)]
    pub toxic_counter: u8,
    #[serde(default)]
    pub stages: StatStages,
    #[serde(default)]
    pub item: Option<String>,
    #[serde(default)]
    pub item_consumed: bool,
    #[serde(default)]
    pub ability: Option<String>,
    #[serde(default)]
    pub commitment: Commitment,
    #[serde(skip)]
    pub flinched: bool,
}

impl PokemonInstance {
    pub fn new(species: &str, types: Vec<Type>, stats: Stats, moves: Vec<Move>) -> Self {
        let pp = moves.iter().map(|m| m.pp).collect();
        PokemonInstance {
            species: species.to_string(),
            level: default_level(),
            types,
            current_hp: stats.hp,
            stats,
            moves,
            pp,
            status: None,
            sleep_turns: 0,
            toxic_counter: 0,
            stages: StatStages::default(),
            item: None,
            item_consumed: false,
            ability: None,
            commitment: Commitment::Free,
            flinched: false,
        }
    }

    /// Validates a loaded combatant and fills in derived fields.
    pub fn prepare(&mut self) -> Result<()> {
        if self.moves.len() > 4 {
            return Err(EngineError::InvalidMoveSet {
                species: self.species.clone(),
            });
        }
        for mv in &mut self.moves {
            if mv.effect == MoveEffect::None {
                mv.effect = MoveEffect::from_name(&mv.name);
            }
        }
        self.pp.resize(self.moves.len(), u8::MAX);
        for (remaining, mv) in self.pp.iter_mut().zip(&self.moves) {
            *remaining = (*remaining).min(mv.pp);
        }
        self.current_hp = self.current_hp.min(self.stats.hp);
        self.stages.clamp_all();
        if let Some(ability) = &self.ability {
            if self.ability() == Ability::Other {
                log::debug!("{}: ability '{ability}' has no modelled effect", self.species);
            }
        }
        if let Some(item) = &self.item {
            // logs unknown items
            let _ = item_effect(item);
        }
        Ok(())
    }

    pub fn max_hp(&self) -> u32 {
        self.stats.hp
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }

    pub fn is_full_hp(&self) -> bool {
        self.current_hp >= self.max_hp()
    }

    pub fn hp_fraction(&self) -> f64 {
        if self.max_hp() == 0 {
            return 0.0;
        }
        self.current_hp as f64 / self.max_hp() as f64
    }

    pub fn ability(&self) -> Ability {
        self.ability
            .as_deref()
            .map(Ability::from_name)
            .unwrap_or(Ability::Other)
    }

    /// Held item effect, or `None` once the item has been consumed.
    pub fn item_effect(&self) -> Option<&'static ItemEffect> {
        if self.item_consumed {
            return None;
        }
        self.item.as_deref().and_then(item_effect)
    }

    pub fn has_type(&self, t: Type) -> bool {
        self.types.contains(&t)
    }

    pub fn is_grounded(&self) -> bool {
        let iron_ball = self
            .item_effect()
            .map(|e| e.speed_mult == Some(0.5))
            .unwrap_or(false);
        iron_ball || !(self.has_type(Type::Flying) || self.ability() == Ability::Levitate)
    }

    pub fn is_semi_invulnerable(&self) -> bool {
        match self.commitment {
            Commitment::Charging { move_index } => self
                .moves
                .get(move_index)
                .map(|m| m.multi_turn == Some(MultiTurn::SemiInvulnerable))
                .unwrap_or(false),
            _ => false,
        }
    }

    pub fn has_usable_move(&self) -> bool {
        self.pp.iter().any(|&pp| pp > 0)
    }

    /// Whether `status` can be applied right now. Types immune to a condition reject it.
    pub fn can_receive_status(&self, status: StatusCondition) -> bool {
        if self.is_fainted() || self.status.is_some() {
            return false;
        }
        match status {
            StatusCondition::Burn => !self.has_type(Type::Fire),
            StatusCondition::Freeze => !self.has_type(Type::Ice),
            StatusCondition::Paralysis => !self.has_type(Type::Electric),
            StatusCondition::Poison | StatusCondition::BadlyPoisoned => {
                !(self.has_type(Type::Poison) || self.has_type(Type::Steel))
            }
            StatusCondition::Sleep => true,
        }
    }

    /// Applies a non-volatile status. `sleep_turns` is only read for sleep.
    pub fn inflict_status(&mut self, status: StatusCondition, sleep_turns: u8) -> bool {
        if !self.can_receive_status(status) {
            return false;
        }
        self.status = Some(status);
        match status {
            StatusCondition::Sleep => self.sleep_turns = sleep_turns,
            StatusCondition::BadlyPoisoned => self.toxic_counter = 0,
            _ => {}
        }
        true
    }

    pub fn cure_status(&mut self) {
        self.status = None;
        self.sleep_turns = 0;
        self.toxic_counter = 0;
    }

    pub fn apply_boost(&mut self, stat: BoostStat, delta: i8) -> i8 {
        self.stages.apply(stat, delta)
    }

    /// Returns the HP actually removed.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.current_hp);
        self.current_hp -= dealt;
        dealt
    }

    /// Returns the HP actually restored. Fainted combatants cannot be healed.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if self.is_fainted() {
            return 0;
        }
        let healed = amount.min(self.max_hp() - self.current_hp);
        self.current_hp += healed;
        healed
    }

    /// Volatile state lost when leaving the field.
    pub fn clear_on_switch(&mut self) {
        self.stages = StatStages::default();
        self.commitment = Commitment::Free;
        self.flinched = false;
        if self.status == Some(StatusCondition::BadlyPoisoned) {
            self.toxic_counter = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PokemonInstance {
        let stats = Stats {
            hp: 100,
            atk: 50,
            def: 50,
            spa: 50,
            spd: 50,
            spe: 50,
        };
        PokemonInstance::new(
            "Sample",
            vec![Type::Normal],
            stats,
            vec![Move::new("Tackle", Type::Normal, MoveCategory::Physical, 40)],
        )
    }

    #[test]
    fn stages_clamp_on_every_application() {
        let mut mon = sample();
        assert_eq!(mon.apply_boost(BoostStat::Atk, 12), 6);
        assert_eq!(mon.stages.atk, 6);
        assert_eq!(mon.apply_boost(BoostStat::Atk, 2), 0);
        assert_eq!(mon.apply_boost(BoostStat::Atk, -127), -12);
        assert_eq!(mon.stages.atk, -6);
    }

    #[test]
    fn prepare_rejects_five_moves() {
        let mut mon = sample();
        let tackle = mon.moves[0].clone();
        mon.moves = vec![tackle; 5];
        assert!(matches!(
            mon.prepare(),
            Err(EngineError::InvalidMoveSet { .. })
        ));
    }

    #[test]
    fn deserialized_mon_starts_at_full_hp_with_full_pp() {
        let json = r#"{
            "species": "Pidgey",
            "types": ["normal", "flying"],
            "stats": {"hp": 90, "atk": 45, "def": 40, "spa": 35, "spd": 35, "spe": 56},
            "moves": [{"name": "Gust", "type": "flying", "category": "special", "power": 40, "pp": 35}]
        }"#;
        let mut mon: PokemonInstance = serde_json::from_str(json).expect("valid json");
        mon.prepare().expect("valid mon");
        assert_eq!(mon.current_hp, 90);
        assert_eq!(mon.pp, vec![35]);
        assert_eq!(mon.level, 50);
        assert!(!mon.is_grounded());
    }

    #[test]
    fn move_effects_resolve_from_names() {
        assert_eq!(MoveEffect::from_name("Stealth Rock"), MoveEffect::StealthRock);
        assert_eq!(
            MoveEffect::from_name("Rain Dance"),
            MoveEffect::Weather(Weather::Rain)
        );
        assert_eq!(MoveEffect::from_name("Flamethrower"), MoveEffect::None);
    }

    #[test]
    fn type_immunities_block_status() {
        let mut mon = sample();
        mon.types = vec![Type::Steel];
        assert!(!mon.inflict_status(StatusCondition::BadlyPoisoned, 0));
        assert!(mon.inflict_status(StatusCondition::Burn, 0));
        assert!(!mon.inflict_status(StatusCondition::Paralysis, 0));
    }
}

use crate::abilities::Ability;
use crate::ai::{self, AiConfig, MoveScore};
use crate::damage::{
    accuracy, cap_lethal_damage, check_block, crit_chance, damage_range, hit_damage,
    survives_lethal_hit, DamageBlock, DamageCalc, DamageField, DamageRange,
};
use crate::error::{EngineError, Result};
use crate::items::ResidualItem;
use crate::model::{
    BoostStat, Commitment, EffectTarget, LockReason, Move, MoveEffect, MultiTurn,
    PokemonInstance, StatChange, StatusCondition, Terrain, Weather,
};
use crate::risk::{Impact, Risk, RiskKind};
use crate::rng::RngMode;
use crate::types::{apply_stage, type_effectiveness, Type};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const MAX_SPIKES: u8 = 3;
pub const MAX_TOXIC_SPIKES: u8 = 2;
pub const FIELD_DURATION: u8 = 5;
/// Switches and item use resolve before any move.
const SWITCH_PRIORITY: i8 = 7;
const TOXIC_CAP: u8 = 15;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player,
    Opponent,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Player, Side::Opponent];

    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Opponent,
            Side::Opponent => Side::Player,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Player => 0,
            Side::Opponent => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hazards {
    pub stealth_rock: bool,
    pub spikes: u8,
    pub toxic_spikes: u8,
    pub sticky_web: bool,
}

/// Turns remaining on each screen; 0 means down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Screens {
    pub reflect: u8,
    pub light_screen: u8,
    pub aurora_veil: u8,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SideState {
    pub roster: Vec<Arc<PokemonInstance>>,
    pub active: usize,
    pub hazards: Hazards,
    pub screens: Screens,
    pub tailwind: u8,
}

impl SideState {
    fn new(roster: Vec<PokemonInstance>) -> Self {
        SideState {
            roster: roster.into_iter().map(Arc::new).collect(),
            active: 0,
            hazards: Hazards::default(),
            screens: Screens::default(),
            tailwind: 0,
        }
    }

    pub fn active(&self) -> &PokemonInstance {
        &self.roster[self.active]
    }

    /// Copy-on-write access: only the touched combatant is duplicated.
    pub fn active_mut(&mut self) -> &mut PokemonInstance {
        Arc::make_mut(&mut self.roster[self.active])
    }

    pub fn alive_count(&self) -> usize {
        self.roster.iter().filter(|m| !m.is_fainted()).count()
    }

    pub fn fainted_count(&self) -> usize {
        self.roster.len() - self.alive_count()
    }

    pub fn all_fainted(&self) -> bool {
        self.alive_count() == 0
    }

    /// Remaining HP of the whole roster as a fraction of its total.
    pub fn hp_fraction(&self) -> f64 {
        let max: u64 = self.roster.iter().map(|m| m.max_hp() as u64).sum();
        if max == 0 {
            return 0.0;
        }
        let current: u64 = self.roster.iter().map(|m| m.current_hp as u64).sum();
        current as f64 / max as f64
    }

    pub fn can_switch_to(&self, target: usize) -> bool {
        target != self.active && self.roster.get(target).map(|m| !m.is_fainted()).unwrap_or(false)
    }

    fn tick(&mut self) {
        self.screens.reflect = self.screens.reflect.saturating_sub(1);
        self.screens.light_screen = self.screens.light_screen.saturating_sub(1);
        self.screens.aurora_veil = self.screens.aurora_veil.saturating_sub(1);
        self.tailwind = self.tailwind.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleState {
    pub turn: u32,
    pub sides: [SideState; 2],
    pub weather: Option<Weather>,
    /// 0 with weather set means it never ends.
    pub weather_turns: u8,
    pub terrain: Option<Terrain>,
    pub terrain_turns: u8,
    pub trick_room: u8,
}

fn label(side: Side, mon: &PokemonInstance) -> String {
    match side {
        Side::Player => mon.species.clone(),
        Side::Opponent => format!("Opposing {}", mon.species),
    }
}

impl BattleState {
    pub fn new(player: Vec<PokemonInstance>, opponent: Vec<PokemonInstance>) -> Result<Self> {
        if player.is_empty() {
            return Err(EngineError::InvalidTeam { side: Side::Player });
        }
        if opponent.is_empty() {
            return Err(EngineError::InvalidTeam {
                side: Side::Opponent,
            });
        }
        let mut player = player;
        let mut opponent = opponent;
        for mon in player.iter_mut().chain(opponent.iter_mut()) {
            mon.prepare()?;
        }
        let mut state = BattleState {
            turn: 1,
            sides: [SideState::new(player), SideState::new(opponent)],
            weather: None,
            weather_turns: 0,
            terrain: None,
            terrain_turns: 0,
            trick_room: 0,
        };
        // faster lead announces first, so the slower lead's weather sticks
        let player_speed = state.effective_speed(Side::Player, state.active(Side::Player));
        let opponent_speed = state.effective_speed(Side::Opponent, state.active(Side::Opponent));
        let order = if opponent_speed > player_speed {
            [Side::Opponent, Side::Player]
        } else {
            [Side::Player, Side::Opponent]
        };
        for side in order {
            for line in state.apply_entry_ability(side) {
                log::debug!("{line}");
            }
        }
        Ok(state)
    }

    pub fn side(&self, side: Side) -> &SideState {
        &self.sides[side.index()]
    }

    pub fn side_mut(&mut self, side: Side) -> &mut SideState {
        &mut self.sides[side.index()]
    }

    pub fn active(&self, side: Side) -> &PokemonInstance {
        self.side(side).active()
    }

    pub fn active_mut(&mut self, side: Side) -> &mut PokemonInstance {
        self.side_mut(side).active_mut()
    }

    pub fn winner(&self) -> Option<Side> {
        if self.side(Side::Player).all_fainted() {
            Some(Side::Opponent)
        } else if self.side(Side::Opponent).all_fainted() {
            Some(Side::Player)
        } else {
            None
        }
    }

    pub fn is_over(&self) -> bool {
        self.winner().is_some()
    }

    /// Conditions an attack aimed at `defender` is resolved under.
    pub fn damage_field(&self, defender: Side) -> DamageField {
        let screens = self.side(defender).screens;
        DamageField {
            weather: self.weather,
            terrain: self.terrain,
            reflect: screens.reflect > 0,
            light_screen: screens.light_screen > 0,
            aurora_veil: screens.aurora_veil > 0,
        }
    }

    /// Speed of `mon` on `side` after stages, item, ability, paralysis and Tailwind.
    pub fn effective_speed(&self, side: Side, mon: &PokemonInstance) -> u32 {
        let mut speed = apply_stage(mon.stats.spe, mon.stages.spe) as f64;
        if let Some(mult) = mon.item_effect().and_then(|i| i.speed_mult) {
            speed *= mult;
        }
        let ability = mon.ability();
        let doubled = match ability {
            Ability::SwiftSwim => self.weather.map(|w| w.is_rainy()).unwrap_or(false),
            Ability::Chlorophyll => self.weather.map(|w| w.is_sunny()).unwrap_or(false),
            Ability::SandRush => self.weather == Some(Weather::Sand),
            Ability::SlushRush => self.weather == Some(Weather::Hail),
            Ability::SurgeSurfer => self.terrain == Some(Terrain::Electric),
            _ => false,
        };
        if doubled {
            speed *= 2.0;
        }
        if ability == Ability::QuickFeet && mon.status.is_some() {
            speed *= 1.5;
        } else if mon.status == Some(StatusCondition::Paralysis) {
            speed *= 0.5;
        }
        if self.side(side).tailwind > 0 {
            speed *= 2.0;
        }
        speed.floor() as u32
    }

    /// Whether `side` strictly moves first at equal priority, Trick Room included.
    pub fn moves_before(&self, _side: Side, speed: u32, other_speed: u32) -> bool {
        if self.trick_room > 0 {
            speed < other_speed
        } else {
            speed > other_speed
        }
    }

    /// Sets weather for `turns` (0 = permanent). Extreme weather can only be replaced by extreme weather.
    pub fn set_weather(&mut self, weather: Weather, turns: u8) -> bool {
        if self.weather == Some(weather) {
            return false;
        }
        if self.weather.map(|w| w.is_extreme()).unwrap_or(false) && !weather.is_extreme() {
            return false;
        }
        self.weather = Some(weather);
        self.weather_turns = turns;
        true
    }

    pub fn set_terrain(&mut self, terrain: Terrain) -> bool {
        if self.terrain == Some(terrain) {
            return false;
        }
        self.terrain = Some(terrain);
        self.terrain_turns = FIELD_DURATION;
        true
    }

    /// Runs the switch-in ability of `side`'s active combatant.
    pub fn apply_entry_ability(&mut self, side: Side) -> Vec<String> {
        let mut lines = Vec::new();
        let mon = self.active(side);
        if mon.is_fainted() {
            return lines;
        }
        let name = label(side, mon);
        let ability = mon.ability();
        if ability == Ability::Intimidate {
            let foe_side = side.opponent();
            if !self.active(foe_side).is_fainted() {
                let foe_name = label(foe_side, self.active(foe_side));
                if self.active_mut(foe_side).apply_boost(BoostStat::Atk, -1) != 0 {
                    lines.push(format!("{name}'s Intimidate cuts {foe_name}'s attack!"));
                }
            }
        }
        if let Some(weather) = ability.entry_weather() {
            let turns = if weather.is_extreme() { 0 } else { FIELD_DURATION };
            if self.set_weather(weather, turns) {
                lines.push(format!("{name}'s ability set the weather to {weather:?}."));
            }
        }
        if let Some(terrain) = ability.entry_terrain() {
            if self.set_terrain(terrain) {
                lines.push(format!("{name}'s ability set {terrain:?} Terrain."));
            }
        }
        lines
    }

    /// Entry hazards on `side` hit its freshly switched-in combatant.
    pub fn apply_hazards(&mut self, side: Side) -> Vec<String> {
        let mut lines = Vec::new();
        let hazards = self.side(side).hazards;
        let mon = self.active(side);
        if mon.is_fainted() || mon.item_effect().map(|i| i.ignores_hazards).unwrap_or(false) {
            return lines;
        }
        let name = label(side, mon);
        let grounded = mon.is_grounded();
        let magic_guard = mon.ability() == Ability::MagicGuard;
        let max_hp = mon.max_hp();
        let mut chip = 0u32;
        if hazards.stealth_rock && !magic_guard {
            let mult = type_effectiveness(Type::Rock, &mon.types);
            chip += ((max_hp as f64 * mult / 8.0).floor() as u32).max(1);
            lines.push(format!("Pointed stones dug into {name}!"));
        }
        if hazards.spikes > 0 && grounded && !magic_guard {
            let divisor = match hazards.spikes {
                1 => 8,
                2 => 6,
                _ => 4,
            };
            chip += (max_hp / divisor).max(1);
            lines.push(format!("{name} is hurt by the spikes!"));
        }
        let poison_type = mon.has_type(Type::Poison);
        let target = self.active_mut(side);
        target.take_damage(chip);
        if hazards.toxic_spikes > 0 && grounded && !target.is_fainted() {
            if poison_type {
                self.side_mut(side).hazards.toxic_spikes = 0;
                lines.push(format!("{name} absorbed the toxic spikes."));
            } else {
                let status = if hazards.toxic_spikes >= 2 {
                    StatusCondition::BadlyPoisoned
                } else {
                    StatusCondition::Poison
                };
                if target.inflict_status(status, 0) {
                    lines.push(format!("{name} was poisoned by the toxic spikes!"));
                }
            }
        }
        if hazards.sticky_web && grounded {
            let target = self.active_mut(side);
            if !target.is_fainted() && target.apply_boost(BoostStat::Spe, -1) != 0 {
                lines.push(format!("{name} was caught in a sticky web!"));
            }
        }
        if self.active(side).is_fainted() {
            lines.push(format!("{name} fainted!"));
        }
        lines
    }

    fn tick_field(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(weather) = self.weather {
            if self.weather_turns > 0 {
                self.weather_turns -= 1;
                if self.weather_turns == 0 {
                    self.weather = None;
                    lines.push(format!("The {weather:?} subsided."));
                }
            }
        }
        if self.terrain.is_some() {
            self.terrain_turns = self.terrain_turns.saturating_sub(1);
            if self.terrain_turns == 0 {
                self.terrain = None;
                lines.push("The terrain returned to normal.".to_string());
            }
        }
        if self.trick_room > 0 {
            self.trick_room -= 1;
            if self.trick_room == 0 {
                lines.push("The twisted dimensions returned to normal!".to_string());
            }
        }
        for side in &mut self.sides {
            side.tick();
        }
        lines
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", content = "amount", rename_all = "kebab-case")]
pub enum ItemUse {
    HealHp(u32),
    HealPercent(u8),
    CureStatus,
    FullRestore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BattleAction {
    Move { index: usize, name: String },
    Switch { target: usize },
    UseItem { item: ItemUse },
    Recharge,
}

impl BattleAction {
    pub fn describe(&self, state: &BattleState, side: Side) -> String {
        match self {
            BattleAction::Move { name, .. } => format!("use {name}"),
            BattleAction::Switch { target } => {
                let species = state
                    .side(side)
                    .roster
                    .get(*target)
                    .map(|m| m.species.as_str())
                    .unwrap_or("?");
                format!("switch to {species}")
            }
            BattleAction::UseItem { item } => format!("use item {item:?}"),
            BattleAction::Recharge => "recharge".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub turn: u32,
    pub player_action: BattleAction,
    /// `None` for a faint replacement, which takes no turn.
    pub opponent_action: Option<BattleAction>,
    pub first: Side,
    pub player_damage: Option<DamageCalc>,
    pub opponent_damage: Option<DamageCalc>,
    pub player_fainted: bool,
    pub opponent_fainted: bool,
    pub state: BattleState,
    pub risks: Vec<Risk>,
    pub ai_scores: Vec<MoveScore>,
    pub log: Vec<String>,
}

fn move_action(mon: &PokemonInstance, index: usize) -> BattleAction {
    BattleAction::Move {
        index,
        name: mon.moves.get(index).map(|m| m.name.clone()).unwrap_or_default(),
    }
}

/// The action a commitment forces, if any.
fn forced_action(mon: &PokemonInstance) -> Option<BattleAction> {
    match mon.commitment {
        Commitment::Recharging => Some(BattleAction::Recharge),
        Commitment::Charging { move_index }
        | Commitment::Locked {
            move_index,
            reason: LockReason::Rampage { .. },
        } => Some(move_action(mon, move_index)),
        Commitment::Locked {
            reason: LockReason::ChoiceItem,
            ..
        }
        | Commitment::Free => None,
    }
}

fn usable_moves(mon: &PokemonInstance) -> Vec<BattleAction> {
    let choice_lock = match mon.commitment {
        Commitment::Locked {
            move_index,
            reason: LockReason::ChoiceItem,
        } if mon.pp.get(move_index).copied().unwrap_or(0) > 0 => Some(move_index),
        _ => None,
    };
    mon.pp
        .iter()
        .enumerate()
        .filter(|(index, pp)| **pp > 0 && choice_lock.map(|locked| locked == *index).unwrap_or(true))
        .map(|(index, _)| move_action(mon, index))
        .collect()
}

/// Actions `side` may choose this step, moves in slot order followed by switches.
pub fn legal_actions(state: &BattleState, side: Side) -> Vec<BattleAction> {
    if state.is_over() {
        return Vec::new();
    }
    let team = state.side(side);
    let mon = team.active();
    let switches = (0..team.roster.len())
        .filter(|&i| team.can_switch_to(i))
        .map(|target| BattleAction::Switch { target });
    if mon.is_fainted() {
        return switches.collect();
    }
    if let Some(forced) = forced_action(mon) {
        return vec![forced];
    }
    let mut actions = usable_moves(mon);
    actions.extend(switches);
    actions
}

/// Checks a requested action against the current state, applying forced commitments.
fn normalize_action(state: &BattleState, side: Side, requested: &BattleAction) -> Result<BattleAction> {
    let team = state.side(side);
    let mon = team.active();
    if let Some(forced) = forced_action(mon) {
        return Ok(forced);
    }
    match requested {
        BattleAction::Move { index, .. } => {
            let available = usable_moves(mon);
            available
                .into_iter()
                .find(|a| matches!(a, BattleAction::Move { index: i, .. } if i == index))
                .ok_or_else(|| {
                    EngineError::InvalidAction(format!("{} cannot use move slot {index}", mon.species))
                })
        }
        BattleAction::Switch { target } => {
            if team.can_switch_to(*target) {
                Ok(requested.clone())
            } else {
                Err(EngineError::InvalidAction(format!("cannot switch to slot {target}")))
            }
        }
        BattleAction::UseItem { .. } => Ok(requested.clone()),
        BattleAction::Recharge => Err(EngineError::InvalidAction(format!(
            "{} has nothing to recharge",
            mon.species
        ))),
    }
}

fn action_priority(state: &BattleState, side: Side, action: &BattleAction) -> i8 {
    match action {
        BattleAction::Switch { .. } | BattleAction::UseItem { .. } => SWITCH_PRIORITY,
        BattleAction::Move { index, .. } => state
            .active(side)
            .moves
            .get(*index)
            .map(|m| m.priority)
            .unwrap_or(0),
        BattleAction::Recharge => 0,
    }
}

/// Which side acts first, and whether a speed tie decided it.
pub fn determine_order(
    state: &BattleState,
    player_action: &BattleAction,
    opponent_action: &BattleAction,
    mode: &mut RngMode,
) -> (Side, bool) {
    let player_priority = action_priority(state, Side::Player, player_action);
    let opponent_priority = action_priority(state, Side::Opponent, opponent_action);
    if player_priority != opponent_priority {
        let first = if player_priority > opponent_priority {
            Side::Player
        } else {
            Side::Opponent
        };
        return (first, false);
    }
    let player_speed = state.effective_speed(Side::Player, state.active(Side::Player));
    let opponent_speed = state.effective_speed(Side::Opponent, state.active(Side::Opponent));
    if player_speed == opponent_speed {
        return (mode.speed_tie(), true);
    }
    if state.moves_before(Side::Player, player_speed, opponent_speed) {
        (Side::Player, false)
    } else {
        (Side::Opponent, false)
    }
}

struct Turn<'m, 'r> {
    state: BattleState,
    mode: &'m mut RngMode<'r>,
    risks: Vec<Risk>,
    log: Vec<String>,
    damage: [Option<DamageCalc>; 2],
    acted: [bool; 2],
    /// Whether the current active of each side has already been announced as fainted.
    fainted: [bool; 2],
    knocked_out: [bool; 2],
}

impl<'m, 'r> Turn<'m, 'r> {
    fn new(state: &BattleState, mode: &'m mut RngMode<'r>) -> Self {
        Turn {
            state: state.clone(),
            mode,
            risks: Vec::new(),
            log: Vec::new(),
            damage: [None, None],
            acted: [false, false],
            fainted: [false, false],
            knocked_out: [false, false],
        }
    }

    fn name(&self, side: Side) -> String {
        label(side, self.state.active(side))
    }

    fn risk(&mut self, kind: RiskKind, probability: f64, impact: Impact, description: String) {
        self.risks.push(Risk {
            kind,
            probability,
            impact,
            description,
            turn: self.state.turn,
        });
    }

    fn check_faint(&mut self, side: Side) {
        if !self.fainted[side.index()] && self.state.active(side).is_fainted() {
            self.fainted[side.index()] = true;
            self.knocked_out[side.index()] = true;
            let name = self.name(side);
            self.log.push(format!("{name} fainted!"));
        }
    }

    fn perform(&mut self, side: Side, action: &BattleAction) {
        self.acted[side.index()] = true;
        match action {
            BattleAction::Switch { target } => self.switch_in(side, *target),
            BattleAction::UseItem { item } => self.use_item(side, *item),
            BattleAction::Recharge => {
                let name = self.name(side);
                self.log.push(format!("{name} must recharge!"));
                self.state.active_mut(side).commitment = Commitment::Free;
            }
            BattleAction::Move { index, .. } => self.use_move(side, *index),
        }
    }

    fn switch_in(&mut self, side: Side, target: usize) {
        let leaving = self.name(side);
        if !self.state.active(side).is_fainted() {
            self.log.push(format!("{leaving}, come back!"));
        }
        self.state.active_mut(side).clear_on_switch();
        self.state.side_mut(side).active = target;
        self.fainted[side.index()] = false;
        let entering = self.name(side);
        self.log.push(format!("Go! {entering}!"));
        let hazard_lines = self.state.apply_hazards(side);
        self.log.extend(hazard_lines);
        self.check_faint(side);
        if self.fainted[side.index()] {
            return;
        }
        let ability_lines = self.state.apply_entry_ability(side);
        self.log.extend(ability_lines);
    }

    fn use_item(&mut self, side: Side, item: ItemUse) {
        let name = self.name(side);
        let mon = self.state.active_mut(side);
        match item {
            ItemUse::HealHp(amount) => {
                let healed = mon.heal(amount);
                self.log.push(format!("{name} restored {healed} HP."));
            }
            ItemUse::HealPercent(percent) => {
                let healed = mon.heal(mon.max_hp() * percent.min(100) as u32 / 100);
                self.log.push(format!("{name} restored {healed} HP."));
            }
            ItemUse::CureStatus => {
                mon.cure_status();
                self.log.push(format!("{name} was cured of its status."));
            }
            ItemUse::FullRestore => {
                let healed = mon.heal(mon.max_hp());
                mon.cure_status();
                self.log.push(format!("{name} was fully restored ({healed} HP)."));
            }
        }
    }

    /// Status checks before moving. Returns false when the turn is lost.
    fn can_act(&mut self, side: Side) -> bool {
        let name = self.name(side);
        if self.state.active(side).flinched {
            self.log.push(format!("{name} flinched and couldn't move!"));
            return false;
        }
        match self.state.active(side).status {
            Some(StatusCondition::Sleep) => {
                let mon = self.state.active_mut(side);
                mon.sleep_turns = mon.sleep_turns.saturating_sub(1);
                if mon.sleep_turns == 0 {
                    mon.cure_status();
                    self.log.push(format!("{name} woke up!"));
                } else {
                    self.log.push(format!("{name} is fast asleep."));
                    return false;
                }
            }
            Some(StatusCondition::Freeze) => {
                if self.mode.chance(20.0, side) {
                    self.state.active_mut(side).cure_status();
                    self.log.push(format!("{name} thawed out!"));
                    if side == Side::Player {
                        self.risk(
                            RiskKind::SecondaryEffect,
                            80.0,
                            Impact::Moderate,
                            format!("{name} needed to thaw out"),
                        );
                    }
                } else {
                    self.log.push(format!("{name} is frozen solid!"));
                    return false;
                }
            }
            Some(StatusCondition::Paralysis) => {
                if self.mode.chance(25.0, side.opponent()) {
                    self.log.push(format!("{name} is paralyzed! It can't move!"));
                    return false;
                }
                if side == Side::Player {
                    self.risk(
                        RiskKind::SecondaryEffect,
                        25.0,
                        Impact::Moderate,
                        format!("{name} avoided full paralysis"),
                    );
                }
            }
            _ => {}
        }
        true
    }

    fn use_move(&mut self, side: Side, index: usize) {
        let prior = self.state.active(side).commitment;
        if !self.can_act(side) {
            if !matches!(
                prior,
                Commitment::Locked {
                    reason: LockReason::ChoiceItem,
                    ..
                }
            ) {
                self.state.active_mut(side).commitment = Commitment::Free;
            }
            return;
        }
        let Some(mv) = self.state.active(side).moves.get(index).cloned() else {
            return;
        };
        let continuing = matches!(
            prior,
            Commitment::Charging { .. }
                | Commitment::Locked {
                    reason: LockReason::Rampage { .. },
                    ..
                }
        );
        if !continuing {
            let mon = self.state.active_mut(side);
            if let Some(pp) = mon.pp.get_mut(index) {
                *pp = pp.saturating_sub(1);
            }
        }
        let name = self.name(side);
        self.log.push(format!("{name} used {}!", mv.name));

        let charges = matches!(
            mv.multi_turn,
            Some(MultiTurn::Charge) | Some(MultiTurn::SemiInvulnerable)
        );
        if charges && !matches!(prior, Commitment::Charging { .. }) {
            self.state.active_mut(side).commitment = Commitment::Charging { move_index: index };
            let verb = if mv.multi_turn == Some(MultiTurn::SemiInvulnerable) {
                "vanished from sight"
            } else {
                "is charging up"
            };
            self.log.push(format!("{name} {verb}!"));
            self.damage[side.index()] = Some(DamageCalc::new(&mv));
            return;
        }

        let landed = if mv.is_attack() {
            self.resolve_attack(side, &mv)
        } else {
            self.resolve_status_move(side, &mv)
        };
        self.settle_commitment(side, index, &mv, prior, landed);
    }

    fn settle_commitment(&mut self, side: Side, index: usize, mv: &Move, prior: Commitment, landed: bool) {
        if self.state.active(side).is_fainted() {
            return;
        }
        let mut next = match mv.multi_turn {
            Some(MultiTurn::Recharge) if landed => Commitment::Recharging,
            Some(MultiTurn::Rampage) => match prior {
                Commitment::Locked {
                    reason: LockReason::Rampage { turns_left },
                    ..
                } => {
                    let left = turns_left.saturating_sub(1);
                    if left == 0 {
                        Commitment::Free
                    } else {
                        Commitment::Locked {
                            move_index: index,
                            reason: LockReason::Rampage { turns_left: left },
                        }
                    }
                }
                _ => Commitment::Locked {
                    move_index: index,
                    reason: LockReason::Rampage {
                        turns_left: self.mode.rampage_turns() - 1,
                    },
                },
            },
            _ => Commitment::Free,
        };
        let mon = self.state.active_mut(side);
        if next == Commitment::Free && mon.item_effect().map(|i| i.choice).unwrap_or(false) {
            next = Commitment::Locked {
                move_index: index,
                reason: LockReason::ChoiceItem,
            };
        }
        mon.commitment = next;
    }

    fn roll_hit(&mut self, side: Side, acc: f64) -> bool {
        acc >= 100.0 || self.mode.chance(acc, side)
    }

    fn fail(&mut self) -> bool {
        self.log.push("But it failed!".to_string());
        false
    }

    fn resolve_attack(&mut self, side: Side, mv: &Move) -> bool {
        let foe = side.opponent();
        let field = self.state.damage_field(foe);
        let mut calc = DamageCalc::new(mv);
        let foe_name = self.name(foe);

        if self.state.active(foe).is_fainted() {
            self.log.push("But there was no target...".to_string());
            self.damage[side.index()] = Some(calc);
            return false;
        }
        if self.state.active(foe).is_semi_invulnerable() {
            calc.blocked = Some(DamageBlock::SemiInvulnerable);
            self.log.push(format!("{foe_name} avoided the attack!"));
            self.damage[side.index()] = Some(calc);
            return false;
        }
        let effectiveness = match check_block(mv, self.state.active(foe), &field) {
            Ok(e) => e,
            Err(block) => {
                calc.blocked = Some(block);
                calc.effectiveness = 0.0;
                let text = match block {
                    DamageBlock::WeatherFailure => "But the attack evaporated in the weather!".to_string(),
                    _ => format!("It doesn't affect {foe_name}..."),
                };
                self.log.push(text);
                self.damage[side.index()] = Some(calc);
                return false;
            }
        };
        calc.effectiveness = effectiveness;

        let acc = accuracy(mv, self.state.active(side), self.state.active(foe));
        let cc = crit_chance(mv);
        calc.accuracy = acc;
        calc.crit_chance = cc;

        let hits = match mv.hits {
            Some(h) => self.mode.range(h.min, h.max, side),
            None => 1,
        };
        let (attacker, defender) = (self.state.active(side), self.state.active(foe));
        let plain_range = damage_range(attacker, defender, mv, &field, false, hits);
        let crit_range = damage_range(attacker, defender, mv, &field, true, hits);

        if !self.roll_hit(side, acc) {
            let name = self.name(side);
            self.log.push(format!("{name}'s attack missed!"));
            if side == Side::Opponent {
                let would_ko = plain_range.as_ref().map(|r| r.can_ko()).unwrap_or(false);
                let impact = if would_ko {
                    Impact::Catastrophic
                } else {
                    Impact::Minor
                };
                self.risk(
                    RiskKind::AccuracyMiss,
                    acc,
                    impact,
                    format!("{name} could have hit with {}", mv.name),
                );
            }
            calc.range = plain_range;
            self.damage[side.index()] = Some(calc);
            return false;
        }
        calc.hit = true;

        let critical = self.mode.chance(cc, side);
        let roll = self.mode.damage_roll(side);
        calc.critical = critical;
        calc.roll = roll;
        let range = if critical { crit_range.clone() } else { plain_range.clone() };

        let mut dealt = 0u32;
        let mut landed_hits = 0u8;
        for _ in 0..hits {
            if self.state.active(foe).is_fainted() {
                break;
            }
            let per_hit = match hit_damage(
                self.state.active(side),
                self.state.active(foe),
                mv,
                &field,
                critical,
                roll,
            ) {
                Ok(d) => d,
                Err(_) => break,
            };
            let defender = self.state.active(foe);
            let capped = cap_lethal_damage(defender, per_hit);
            let endured = capped < per_hit && survives_lethal_hit(defender);
            let sturdy = defender.ability() == Ability::Sturdy;
            let target = self.state.active_mut(foe);
            dealt += target.take_damage(capped);
            landed_hits += 1;
            if endured {
                if sturdy {
                    self.log.push(format!("{foe_name} endured the hit!"));
                } else {
                    self.state.active_mut(foe).item_consumed = true;
                    self.log.push(format!("{foe_name} hung on using its Focus Sash!"));
                }
            }
        }
        calc.hits = landed_hits;
        calc.damage = dealt;
        calc.range = range.clone();

        if critical {
            self.log.push("A critical hit!".to_string());
        }
        if effectiveness > 1.0 {
            self.log.push("It's super effective!".to_string());
        } else if effectiveness < 1.0 {
            self.log.push("It's not very effective...".to_string());
        }
        if hits > 1 {
            self.log.push(format!("Hit {landed_hits} time(s)!"));
        }
        let remaining = self.state.active(foe).current_hp;
        let max_hp = self.state.active(foe).max_hp();
        self.log.push(format!("{foe_name} lost {dealt} HP ({remaining}/{max_hp} left)."));

        if mv.move_type == Type::Fire && self.state.active(foe).status == Some(StatusCondition::Freeze) {
            self.state.active_mut(foe).cure_status();
            self.log.push(format!("{foe_name} thawed out!"));
        }

        let knocked_out = self.state.active(foe).is_fainted();
        self.record_attack_risks(
            side,
            mv,
            (acc, cc),
            critical,
            knocked_out,
            [range.as_ref(), plain_range.as_ref(), crit_range.as_ref()],
        );
        self.check_faint(foe);
        if knocked_out {
            self.on_knock_out(side);
        }

        if dealt > 0 {
            self.apply_secondaries(side, mv);
            self.apply_attack_aftermath(side, mv, dealt);
        }
        self.check_berry(foe);
        self.check_faint(side);
        self.damage[side.index()] = Some(calc);
        true
    }

    /// `ranges` holds the range actually used, the non-crit range and the crit range.
    fn record_attack_risks(
        &mut self,
        side: Side,
        mv: &Move,
        (acc, cc): (f64, f64),
        critical: bool,
        knocked_out: bool,
        ranges: [Option<&DamageRange>; 3],
    ) {
        let [used, plain, crit] = ranges;
        let name = self.name(side);
        match side {
            Side::Player => {
                if acc < 100.0 {
                    let impact = if knocked_out {
                        Impact::Severe
                    } else {
                        Impact::Moderate
                    };
                    self.risk(
                        RiskKind::AccuracyMiss,
                        100.0 - acc,
                        impact,
                        format!("{name}'s {} must hit ({acc:.0}%)", mv.name),
                    );
                }
                if knocked_out {
                    if let Some(range) = used {
                        if !range.always_kos() {
                            self.risk(
                                RiskKind::DamageRoll,
                                100.0 - range.ko_probability(),
                                Impact::Severe,
                                format!("{name}'s {} needs a high roll to KO", mv.name),
                            );
                        }
                    }
                    if critical && !plain.map(|r| r.can_ko()).unwrap_or(false) {
                        self.risk(
                            RiskKind::CriticalHit,
                            100.0 - cc,
                            Impact::Severe,
                            format!("{name}'s {} needs a critical hit to KO", mv.name),
                        );
                    }
                }
            }
            Side::Opponent => {
                if knocked_out {
                    return;
                }
                if let Some(range) = used {
                    if range.can_ko() {
                        self.risk(
                            RiskKind::DamageRoll,
                            range.ko_probability(),
                            Impact::Catastrophic,
                            format!("{name}'s {} could roll high enough to KO", mv.name),
                        );
                    }
                }
                if !critical && cc > 0.0 && crit.map(|r| r.can_ko()).unwrap_or(false) {
                    self.risk(
                        RiskKind::CriticalHit,
                        cc,
                        Impact::Catastrophic,
                        format!("{name}'s {} could crit for a KO", mv.name),
                    );
                }
            }
        }
    }

    fn on_knock_out(&mut self, side: Side) {
        let name = self.name(side);
        let mon = self.state.active_mut(side);
        if mon.is_fainted() {
            return;
        }
        let stat = match mon.ability() {
            Ability::Moxie => BoostStat::Atk,
            Ability::BeastBoost => {
                let s = mon.stats;
                [
                    (s.atk, BoostStat::Atk),
                    (s.def, BoostStat::Def),
                    (s.spa, BoostStat::Spa),
                    (s.spd, BoostStat::Spd),
                    (s.spe, BoostStat::Spe),
                ]
                .into_iter()
                .fold((0, BoostStat::Atk), |best, cur| if cur.0 > best.0 { cur } else { best })
                .1
            }
            _ => return,
        };
        if mon.apply_boost(stat, 1) != 0 {
            self.log.push(format!("{name}'s {stat:?} rose!"));
        }
    }

    /// Rolls a secondary effect with `chance` percent that helps `side`.
    fn roll_secondary(&mut self, side: Side, chance: u8, what: &str, landed_impact: Impact) -> bool {
        if chance >= 100 {
            return true;
        }
        let happened = self.mode.chance(chance as f64, side);
        let name = self.name(side);
        match side {
            Side::Player if happened => self.risk(
                RiskKind::SecondaryEffect,
                100.0 - chance as f64,
                landed_impact,
                format!("{name} relied on {what} ({chance}%)"),
            ),
            Side::Opponent if !happened => self.risk(
                RiskKind::SecondaryEffect,
                chance as f64,
                Impact::Minor,
                format!("{name} could have caused {what} ({chance}%)"),
            ),
            _ => {}
        }
        happened
    }

    fn apply_secondaries(&mut self, side: Side, mv: &Move) {
        let foe = side.opponent();
        if let Some(infliction) = mv.status.clone() {
            let target_side = match infliction.target {
                EffectTarget::User => side,
                EffectTarget::Target => foe,
            };
            if self.state.active(target_side).can_receive_status(infliction.status) {
                let what = format!("{:?}", infliction.status).to_lowercase();
                if self.roll_secondary(side, infliction.chance, &what, Impact::Moderate) {
                    self.inflict(target_side, infliction.status);
                }
            }
        }
        for change in &mv.stat_changes {
            self.apply_stat_change(side, change);
        }
        if mv.flinch_chance > 0 && !self.state.active(foe).is_fainted() && !self.acted[foe.index()] {
            if self.roll_secondary(side, mv.flinch_chance, "a flinch", Impact::Severe) {
                self.state.active_mut(foe).flinched = true;
            }
        }
    }

    fn apply_stat_change(&mut self, side: Side, change: &StatChange) {
        let target_side = match change.target {
            EffectTarget::User => side,
            EffectTarget::Target => side.opponent(),
        };
        if self.state.active(target_side).is_fainted() {
            return;
        }
        if change.chance < 100 {
            let what = format!("a {:?} change", change.stat);
            if !self.roll_secondary(side, change.chance, &what, Impact::Moderate) {
                return;
            }
        }
        let name = self.name(target_side);
        let applied = self.state.active_mut(target_side).apply_boost(change.stat, change.stages);
        let text = match applied {
            0 => format!("{name}'s {:?} won't go any further!", change.stat),
            n if n > 0 => format!("{name}'s {:?} rose by {n}!", change.stat),
            n => format!("{name}'s {:?} fell by {}!", change.stat, -n),
        };
        self.log.push(text);
    }

    fn inflict(&mut self, side: Side, status: StatusCondition) -> bool {
        let turns = if status == StatusCondition::Sleep {
            self.mode.sleep_turns(side)
        } else {
            0
        };
        let name = self.name(side);
        if self.state.active_mut(side).inflict_status(status, turns) {
            self.log.push(format!("{name} is now afflicted with {status:?}!"));
            self.check_lum(side);
            true
        } else {
            false
        }
    }

    fn apply_attack_aftermath(&mut self, side: Side, mv: &Move, dealt: u32) {
        let name = self.name(side);
        let mon = self.state.active(side);
        if mon.is_fainted() {
            return;
        }
        let magic_guard = mon.ability() == Ability::MagicGuard;
        let life_orb = mon.item_effect().map(|i| i.life_orb).unwrap_or(false);
        let max_hp = mon.max_hp();
        if mv.drain_percent > 0 {
            let amount = (dealt * mv.drain_percent as u32 / 100).max(1);
            let healed = self.state.active_mut(side).heal(amount);
            if healed > 0 {
                self.log.push(format!("{name} drained {healed} HP."));
            }
        }
        if mv.recoil_percent > 0 && !magic_guard {
            let amount = (dealt * mv.recoil_percent as u32 / 100).max(1);
            self.state.active_mut(side).take_damage(amount);
            self.log.push(format!("{name} is damaged by recoil ({amount} HP)."));
        }
        if life_orb && !magic_guard {
            let amount = (max_hp / 10).max(1);
            self.state.active_mut(side).take_damage(amount);
            self.log.push(format!("{name} lost {amount} HP to its Life Orb."));
        }
        self.check_berry(side);
    }

    fn resolve_status_move(&mut self, side: Side, mv: &Move) -> bool {
        let foe = side.opponent();
        let name = self.name(side);
        let targets_foe = mv.inflicts_status_on_target()
            || mv
                .stat_changes
                .iter()
                .any(|c| c.target == EffectTarget::Target);
        if targets_foe {
            if self.state.active(foe).is_fainted() {
                self.log.push("But there was no target...".to_string());
                return false;
            }
            let foe_name = self.name(foe);
            if self.state.active(foe).is_semi_invulnerable() {
                self.log.push(format!("{foe_name} avoided the attack!"));
                return false;
            }
            let acc = accuracy(mv, self.state.active(side), self.state.active(foe));
            if !self.roll_hit(side, acc) {
                self.log.push(format!("{name}'s {} missed!", mv.name));
                return false;
            }
            if side == Side::Player && acc < 100.0 {
                self.risk(
                    RiskKind::AccuracyMiss,
                    100.0 - acc,
                    Impact::Moderate,
                    format!("{name}'s {} must hit ({acc:.0}%)", mv.name),
                );
            }
        }

        let mut succeeded = self.apply_field_effect(side, mv);
        if mv.heal_percent > 0 && mv.effect != MoveEffect::Recovery {
            succeeded |= self.heal_percent(side, mv.heal_percent);
        }
        if let Some(infliction) = mv.status.clone() {
            let target_side = match infliction.target {
                EffectTarget::User => side,
                EffectTarget::Target => foe,
            };
            if self.state.active(target_side).can_receive_status(infliction.status) {
                let what = format!("{:?}", infliction.status).to_lowercase();
                if self.roll_secondary(side, infliction.chance, &what, Impact::Moderate) {
                    succeeded |= self.inflict(target_side, infliction.status);
                }
            } else {
                self.fail();
            }
        }
        for change in &mv.stat_changes {
            self.apply_stat_change(side, change);
            succeeded = true;
        }
        succeeded
    }

    fn heal_percent(&mut self, side: Side, percent: u8) -> bool {
        let name = self.name(side);
        let mon = self.state.active_mut(side);
        let healed = mon.heal(mon.max_hp() * percent as u32 / 100);
        if healed > 0 {
            self.log.push(format!("{name} restored {healed} HP."));
            true
        } else {
            self.log.push(format!("{name}'s HP is full!"));
            false
        }
    }

    fn apply_field_effect(&mut self, side: Side, mv: &Move) -> bool {
        let foe = side.opponent();
        match mv.effect {
            MoveEffect::None => false,
            MoveEffect::StealthRock => {
                let hazards = &mut self.state.side_mut(foe).hazards;
                if hazards.stealth_rock {
                    return self.fail();
                }
                hazards.stealth_rock = true;
                self.log.push("Pointed stones float in the air!".to_string());
                true
            }
            MoveEffect::Spikes => {
                let hazards = &mut self.state.side_mut(foe).hazards;
                if hazards.spikes >= MAX_SPIKES {
                    return self.fail();
                }
                hazards.spikes += 1;
                self.log.push("Spikes were scattered on the ground!".to_string());
                true
            }
            MoveEffect::ToxicSpikes => {
                let hazards = &mut self.state.side_mut(foe).hazards;
                if hazards.toxic_spikes >= MAX_TOXIC_SPIKES {
                    return self.fail();
                }
                hazards.toxic_spikes += 1;
                self.log.push("Poison spikes were scattered on the ground!".to_string());
                true
            }
            MoveEffect::StickyWeb => {
                let hazards = &mut self.state.side_mut(foe).hazards;
                if hazards.sticky_web {
                    return self.fail();
                }
                hazards.sticky_web = true;
                self.log.push("A sticky web spreads out on the ground!".to_string());
                true
            }
            MoveEffect::Reflect | MoveEffect::LightScreen | MoveEffect::AuroraVeil => {
                let screens = &mut self.state.side_mut(side).screens;
                let slot = match mv.effect {
                    MoveEffect::Reflect => &mut screens.reflect,
                    MoveEffect::LightScreen => &mut screens.light_screen,
                    _ => &mut screens.aurora_veil,
                };
                if *slot > 0 {
                    return self.fail();
                }
                *slot = FIELD_DURATION;
                self.log.push(format!("{} went up!", mv.name));
                true
            }
            MoveEffect::TrickRoom => {
                if self.state.trick_room > 0 {
                    self.state.trick_room = 0;
                    self.log.push("The twisted dimensions returned to normal!".to_string());
                } else {
                    self.state.trick_room = FIELD_DURATION;
                    self.log.push("The dimensions were twisted!".to_string());
                }
                true
            }
            MoveEffect::Tailwind => {
                let team = self.state.side_mut(side);
                if team.tailwind > 0 {
                    return self.fail();
                }
                team.tailwind = FIELD_DURATION;
                self.log.push("The Tailwind blew from behind!".to_string());
                true
            }
            MoveEffect::Weather(weather) => {
                if !self.state.set_weather(weather, FIELD_DURATION) {
                    return self.fail();
                }
                self.log.push(format!("The weather became {weather:?}."));
                true
            }
            MoveEffect::Terrain(terrain) => {
                if !self.state.set_terrain(terrain) {
                    return self.fail();
                }
                self.log.push(format!("{terrain:?} Terrain covered the field."));
                true
            }
            MoveEffect::Recovery => {
                let percent = if mv.heal_percent > 0 { mv.heal_percent } else { 50 };
                self.heal_percent(side, percent)
            }
        }
    }

    fn check_berry(&mut self, side: Side) {
        let mon = self.state.active(side);
        if mon.is_fainted() {
            return;
        }
        let sitrus = mon
            .item_effect()
            .map(|i| i.residual == Some(ResidualItem::SitrusBerry))
            .unwrap_or(false);
        if sitrus && mon.current_hp * 2 <= mon.max_hp() {
            let name = self.name(side);
            let mon = self.state.active_mut(side);
            let healed = mon.heal(mon.max_hp() / 4);
            mon.item_consumed = true;
            self.log.push(format!("{name} ate its Sitrus Berry and restored {healed} HP."));
        }
    }

    fn check_lum(&mut self, side: Side) {
        let mon = self.state.active(side);
        let lum = mon
            .item_effect()
            .map(|i| i.residual == Some(ResidualItem::LumBerry))
            .unwrap_or(false);
        if lum && mon.status.is_some() && !mon.is_fainted() {
            let name = self.name(side);
            let mon = self.state.active_mut(side);
            mon.cure_status();
            mon.item_consumed = true;
            self.log.push(format!("{name}'s Lum Berry cured its status."));
        }
    }

    fn chip(&mut self, side: Side, amount: u32, reason: &str) {
        let name = self.name(side);
        let lost = self.state.active_mut(side).take_damage(amount.max(1));
        if lost > 0 {
            self.log.push(format!("{name} is hurt by {reason} ({lost} HP)."));
        }
        self.check_faint(side);
    }

    fn end_of_turn(&mut self) {
        let weather = self.state.weather;
        for side in Side::BOTH {
            let mon = self.state.active(side);
            if mon.is_fainted() || mon.ability() == Ability::MagicGuard {
                continue;
            }
            let immune = match weather {
                Some(Weather::Sand) => [Type::Rock, Type::Ground, Type::Steel]
                    .iter()
                    .any(|t| mon.has_type(*t)),
                Some(Weather::Hail) => mon.has_type(Type::Ice),
                _ => true,
            };
            if !immune {
                let amount = mon.max_hp() / 16;
                let reason = format!("the {:?}", weather.unwrap_or(Weather::Sand)).to_lowercase();
                self.chip(side, amount, &reason);
            }
        }

        if self.state.terrain == Some(Terrain::Grassy) {
            for side in Side::BOTH {
                let mon = self.state.active(side);
                if mon.is_fainted() || !mon.is_grounded() {
                    continue;
                }
                let name = self.name(side);
                let mon = self.state.active_mut(side);
                let healed = mon.heal((mon.max_hp() / 16).max(1));
                if healed > 0 {
                    self.log.push(format!("{name} was healed by the grassy terrain."));
                }
            }
        }

        for side in Side::BOTH {
            let mon = self.state.active(side);
            if mon.is_fainted() || mon.ability() == Ability::MagicGuard {
                continue;
            }
            let max_hp = mon.max_hp();
            let status = mon.status;
            match status {
                Some(StatusCondition::Burn) => self.chip(side, max_hp / 16, "its burn"),
                Some(StatusCondition::Poison) => self.chip(side, max_hp / 8, "poison"),
                Some(StatusCondition::BadlyPoisoned) => {
                    let mon = self.state.active_mut(side);
                    mon.toxic_counter = (mon.toxic_counter + 1).min(TOXIC_CAP);
                    let amount = max_hp * mon.toxic_counter as u32 / 16;
                    self.chip(side, amount, "poison");
                }
                _ => {}
            }
        }

        for side in Side::BOTH {
            self.residual_item(side);
        }
    }

    fn residual_item(&mut self, side: Side) {
        let mon = self.state.active(side);
        if mon.is_fainted() {
            return;
        }
        let Some(residual) = mon.item_effect().and_then(|i| i.residual) else {
            return;
        };
        let name = self.name(side);
        let max_hp = mon.max_hp();
        match residual {
            ResidualItem::Leftovers => {
                let healed = self.state.active_mut(side).heal((max_hp / 16).max(1));
                if healed > 0 {
                    self.log.push(format!("{name} restored a little HP using its Leftovers."));
                }
            }
            ResidualItem::BlackSludge => {
                if mon.has_type(Type::Poison) {
                    let healed = self.state.active_mut(side).heal((max_hp / 16).max(1));
                    if healed > 0 {
                        self.log.push(format!("{name} restored a little HP using its Black Sludge."));
                    }
                } else if mon.ability() != Ability::MagicGuard {
                    self.chip(side, max_hp / 8, "its Black Sludge");
                }
            }
            ResidualItem::SitrusBerry => self.check_berry(side),
            ResidualItem::LumBerry => self.check_lum(side),
            ResidualItem::FlameOrb => {
                self.inflict(side, StatusCondition::Burn);
            }
            ResidualItem::ToxicOrb => {
                self.inflict(side, StatusCondition::BadlyPoisoned);
            }
        }
    }

    fn record_speed_tie(&mut self, winner: Side) {
        if winner == Side::Player {
            self.risk(
                RiskKind::SpeedTie,
                50.0,
                Impact::Moderate,
                "won a speed tie".to_string(),
            );
        } else {
            self.risk(
                RiskKind::SpeedTie,
                50.0,
                Impact::Minor,
                "lost a speed tie".to_string(),
            );
        }
    }

    fn finish(
        self,
        turn: u32,
        player_action: BattleAction,
        opponent_action: Option<BattleAction>,
        first: Side,
        ai_scores: Vec<MoveScore>,
    ) -> TurnOutcome {
        let [player_damage, opponent_damage] = self.damage;
        TurnOutcome {
            turn,
            player_action,
            opponent_action,
            first,
            player_damage,
            opponent_damage,
            player_fainted: self.knocked_out[Side::Player.index()],
            opponent_fainted: self.knocked_out[Side::Opponent.index()],
            state: self.state,
            risks: self.risks,
            ai_scores,
            log: self.log,
        }
    }
}

/// Resolves one step of the battle for the player's `action`.
///
/// When the player's active combatant is fainted the only valid action is a
/// switch, which is resolved on its own without consuming a turn.
pub fn simulate_turn(
    state: &BattleState,
    action: &BattleAction,
    mode: &mut RngMode,
    ai_config: &AiConfig,
) -> Result<TurnOutcome> {
    if state.is_over() {
        return Err(EngineError::InvalidAction("the battle is already over".to_string()));
    }
    let turn_number = state.turn;

    if state.active(Side::Player).is_fainted() {
        let BattleAction::Switch { target } = action else {
            return Err(EngineError::InvalidAction(
                "a fainted combatant must be replaced by a switch".to_string(),
            ));
        };
        if !state.side(Side::Player).can_switch_to(*target) {
            return Err(EngineError::InvalidAction(format!("cannot switch to slot {target}")));
        }
        let mut turn = Turn::new(state, mode);
        turn.switch_in(Side::Player, *target);
        return Ok(turn.finish(turn_number, action.clone(), None, Side::Player, Vec::new()));
    }

    let player_action = normalize_action(state, Side::Player, action)?;
    let (opponent_action, ai_scores) = match forced_action(state.active(Side::Opponent)) {
        Some(forced) => (forced, Vec::new()),
        None => {
            let decision = ai::choose_action(state, Side::Opponent, mode, ai_config);
            (decision.action, decision.scores)
        }
    };

    let (first, tie) = determine_order(state, &player_action, &opponent_action, mode);
    let mut turn = Turn::new(state, mode);
    let both_moves = matches!(player_action, BattleAction::Move { .. })
        && matches!(opponent_action, BattleAction::Move { .. });
    if tie && both_moves {
        turn.record_speed_tie(first);
    }

    let ordered = match first {
        Side::Player => [(Side::Player, &player_action), (Side::Opponent, &opponent_action)],
        Side::Opponent => [(Side::Opponent, &opponent_action), (Side::Player, &player_action)],
    };
    for (side, act) in ordered {
        if turn.state.is_over() {
            break;
        }
        // a fainted active can still be replaced, but not act
        if turn.state.active(side).is_fainted() && !matches!(act, BattleAction::Switch { .. }) {
            continue;
        }
        turn.perform(side, act);
    }

    if !turn.state.is_over() {
        turn.end_of_turn();
    }
    let field_lines = turn.state.tick_field();
    turn.log.extend(field_lines);
    for side in Side::BOTH {
        if turn.state.active(side).flinched {
            turn.state.active_mut(side).flinched = false;
        }
    }

    while !turn.state.is_over() && turn.state.active(Side::Opponent).is_fainted() {
        let Some(target) = ai::choose_switch_target(&turn.state, Side::Opponent) else {
            break;
        };
        turn.switch_in(Side::Opponent, target);
    }
    turn.state.turn += 1;
    Ok(turn.finish(turn_number, player_action, Some(opponent_action), first, ai_scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MoveCategory, Stats};

    fn mon(species: &str, spe: u32, moves: Vec<Move>) -> PokemonInstance {
        PokemonInstance::new(
            species,
            vec![Type::Normal],
            Stats {
                hp: 100,
                atk: 100,
                def: 100,
                spa: 100,
                spd: 100,
                spe,
            },
            moves,
        )
    }

    fn tackle() -> Move {
        Move::new("Tackle", Type::Normal, MoveCategory::Physical, 40)
    }

    #[test]
    fn empty_rosters_are_rejected() {
        let err = BattleState::new(vec![], vec![mon("A", 10, vec![tackle()])]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTeam { side: Side::Player }));
        let err = BattleState::new(vec![mon("A", 10, vec![tackle()])], vec![]).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTeam { side: Side::Opponent }));
    }

    #[test]
    fn legal_actions_list_moves_then_switches() {
        let mut empty = tackle();
        empty.name = "Growl".into();
        let mut lead = mon("Lead", 10, vec![tackle(), empty]);
        lead.pp[1] = 0;
        let mut fainted = mon("Down", 10, vec![tackle()]);
        fainted.current_hp = 0;
        let bench = mon("Bench", 10, vec![tackle()]);
        let state = BattleState::new(vec![lead, fainted, bench], vec![mon("Foe", 10, vec![tackle()])]).unwrap();
        let actions = legal_actions(&state, Side::Player);
        assert_eq!(
            actions,
            vec![
                BattleAction::Move { index: 0, name: "Tackle".into() },
                BattleAction::Switch { target: 2 },
            ]
        );
    }

    #[test]
    fn branch_copies_share_untouched_combatants() {
        let state = BattleState::new(
            vec![mon("Lead", 200, vec![tackle()]), mon("Bench", 10, vec![tackle()])],
            vec![mon("Foe", 10, vec![tackle()])],
        )
        .unwrap();
        let action = BattleAction::Move { index: 0, name: "Tackle".into() };
        let outcome = simulate_turn(&state, &action, &mut RngMode::WorstCase, &AiConfig::default()).unwrap();
        let before = &state.side(Side::Player).roster;
        let after = &outcome.state.side(Side::Player).roster;
        assert!(Arc::ptr_eq(&before[1], &after[1]));
        assert!(!Arc::ptr_eq(&before[0], &after[0]));
        assert_eq!(state.active(Side::Opponent).current_hp, 100);
    }

    #[test]
    fn trick_room_reverses_speed_order() {
        let mut state = BattleState::new(
            vec![mon("Slow", 10, vec![tackle()])],
            vec![mon("Fast", 200, vec![tackle()])],
        )
        .unwrap();
        let action = BattleAction::Move { index: 0, name: "Tackle".into() };
        let (first, _) = determine_order(&state, &action, &action, &mut RngMode::WorstCase);
        assert_eq!(first, Side::Opponent);
        state.trick_room = FIELD_DURATION;
        let (first, _) = determine_order(&state, &action, &action, &mut RngMode::WorstCase);
        assert_eq!(first, Side::Player);
    }

    #[test]
    fn weather_counts_down_but_extreme_weather_stays() {
        let mut state = BattleState::new(
            vec![mon("A", 10, vec![tackle()])],
            vec![mon("B", 10, vec![tackle()])],
        )
        .unwrap();
        assert!(state.set_weather(Weather::Rain, FIELD_DURATION));
        for _ in 0..FIELD_DURATION {
            state.tick_field();
        }
        assert_eq!(state.weather, None);
        assert!(state.set_weather(Weather::HarshSun, 0));
        assert!(!state.set_weather(Weather::Rain, FIELD_DURATION));
        for _ in 0..10 {
            state.tick_field();
        }
        assert_eq!(state.weather, Some(Weather::HarshSun));
    }
}
